//! Shire compiles prompt scripts and applies model responses back to code.
//!
//! A script mixes front-matter configuration, prompt text, `$variables` and
//! `/commands`. [`compiler::Compiler`] turns it into a prompt,
//! [`runner::ShireRunner`] sends that prompt to a model, and [`diff`]
//! reconciles a streamed answer against the original text.

pub mod collab;
pub mod command;
pub mod compiler;
pub mod config;
pub mod diff;
pub mod error;
pub mod lang;
pub mod pipeline;
pub mod postprocess;
pub mod runner;
pub mod script;
pub mod session;
pub mod settings;
pub mod snippet;
pub mod template;
pub mod variable;

/// Convenience macro for `filter_map`ing a pattern that contains a single item.
/// Returns `Some(item)` if the item matches the pattern, `None` otherwise.
#[macro_export]
macro_rules! fmap_match {
    ($($pattern:tt)+) => {
        |item| match item {
            $($pattern)+(item) => Some(item),
            _ => None,
        }
    }
}
