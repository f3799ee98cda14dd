//! Template interpolation for pipeline arguments.
//!
//! Supports:
//! - `$0` - The element currently being processed
//! - `$name` / `${name}` - A variable from the symbol table

use std::collections::HashMap;

/// Values available to a template.
///
/// Keys are `"0"` for the current element and variable names otherwise.
pub type Captures = HashMap<String, String>;

/// Interpolate a template string with the given captures.
///
/// Missing captures are left as-is in the template.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use shire::template::interpolate;
///
/// let mut captures = HashMap::new();
/// captures.insert("0".to_string(), "src/lib.rs".to_string());
/// captures.insert("lang".to_string(), "rust".to_string());
///
/// let result = interpolate("read $0 as ${lang}", &captures);
/// assert_eq!(result, "read src/lib.rs as rust");
/// ```
pub fn interpolate(template: &str, captures: &Captures) -> String {
    interpolate_with(template, |key| captures.get(key).cloned())
}

/// Interpolate using a lookup function instead of a fixed map.
pub fn interpolate_with(template: &str, mut lookup: impl FnMut(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(dollar) = rest.find('$') {
        result.push_str(&rest[..dollar]);
        let after = &rest[dollar + 1..];

        let (key, consumed) = if let Some(inner) = after.strip_prefix('{') {
            match inner.find('}') {
                Some(close) => (&inner[..close], close + 2),
                None => ("", 0),
            }
        } else {
            let len = after
                .find(|c: char| !(c.is_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..len], len)
        };

        match (key.is_empty(), lookup(key.trim())) {
            (false, Some(value)) => result.push_str(&value),
            _ => result.push_str(&rest[dollar..dollar + 1 + consumed]),
        }
        rest = &after[consumed..];
    }

    result.push_str(rest);
    result
}
