//! Process-wide state shared between runs, keyed by script path.
//!
//! A [`SessionStore`] is created when a session starts, passed to the
//! compiler and runner, and cleared when the session ends.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

/// One run of a script: what was sent and what came back.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Conversation {
    pub script_path: String,

    /// The compiled prompt.
    pub compiled: String,

    pub llm_response: String,

    /// Output of the run as the user saw it, including errors.
    pub ide_output: String,

    /// Whether a fix-it prompt was already built for this conversation.
    pub already_re_run: bool,
}

/// The value of a pipeline variable after one of its steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableSnapshot {
    pub variable: String,

    /// The step, in source form.
    pub function: String,

    pub value: String,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    conversations: Mutex<HashMap<String, Conversation>>,
    snapshots: Mutex<HashMap<String, Vec<VariableSnapshot>>>,
    compile_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a conversation for a script, replacing any earlier one.
    pub fn start_conversation(&self, script_path: &str, compiled: &str) {
        let conversation = Conversation {
            script_path: script_path.to_string(),
            compiled: compiled.to_string(),
            ..Default::default()
        };
        lock(&self.conversations).insert(script_path.to_string(), conversation);
    }

    pub fn update_llm_response(&self, script_path: &str, response: &str) {
        if let Some(conversation) = lock(&self.conversations).get_mut(script_path) {
            conversation.llm_response = response.to_string();
        }
    }

    pub fn update_ide_output(&self, script_path: &str, output: &str) {
        if let Some(conversation) = lock(&self.conversations).get_mut(script_path) {
            conversation.ide_output = output.to_string();
        }
    }

    pub fn conversation(&self, script_path: &str) -> Option<Conversation> {
        lock(&self.conversations).get(script_path).cloned()
    }

    /// Build a prompt asking the model to fix a failed run.
    ///
    /// Returns `None` when the script has no conversation, or when a fix was
    /// already requested for it.
    pub fn try_fix_prompt(&self, script_path: &str) -> Option<String> {
        let mut conversations = lock(&self.conversations);
        let conversation = conversations.get_mut(script_path)?;
        if conversation.already_re_run {
            return None;
        }
        conversation.already_re_run = true;

        Some(format!(
            "The script below failed when it ran. Find the cause and fix the script.\n\n\
             ## Origin script\n\n```shire\n{}\n```\n\n\
             ## Run result\n\n```\n{}\n```\n",
            conversation.compiled.trim_end(),
            conversation.ide_output.trim_end(),
        ))
    }

    pub fn record_snapshot(&self, script_path: &str, snapshot: VariableSnapshot) {
        lock(&self.snapshots)
            .entry(script_path.to_string())
            .or_default()
            .push(snapshot);
    }

    pub fn snapshots(&self, script_path: &str) -> Vec<VariableSnapshot> {
        lock(&self.snapshots).get(script_path).cloned().unwrap_or_default()
    }

    pub fn clear_snapshots(&self, script_path: &str) {
        lock(&self.snapshots).remove(script_path);
    }

    /// The lock serializing compiles of one script.
    pub fn compile_lock(&self, script_path: &str) -> Arc<Mutex<()>> {
        lock(&self.compile_locks)
            .entry(script_path.to_string())
            .or_default()
            .clone()
    }

    /// End the session, dropping every conversation and snapshot.
    pub fn clear(&self) {
        lock(&self.conversations).clear();
        lock(&self.snapshots).clear();
        lock(&self.compile_locks).clear();
    }
}
