//! Placeholder substitution for message templates.
//!
//! Templates reference variables as `{$name}`. Unknown names are left in the
//! output untouched so a typo in a custom template stays visible.

use std::collections::HashMap;

/// Variables available to a single rendered message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternMapping {
    values: HashMap<String, String>,
}

impl PatternMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable, builder style.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Set or replace a variable.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// Render `template` against `mapping`.
///
/// Single left-to-right pass: substituted values are never scanned again.
pub fn substitute_pattern(template: &str, mapping: &PatternMapping) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{$") {
        result.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];

        match after_open.find('}') {
            Some(end) if end > 0 => {
                let name = &after_open[..end];
                match mapping.get(name) {
                    Some(value) => result.push_str(value),
                    None => result.push_str(&rest[start..start + 2 + end + 1]),
                }
                rest = &after_open[end + 1..];
            }
            _ => {
                // "{$}" or an unterminated placeholder.
                result.push_str("{$");
                rest = after_open;
            }
        }
    }

    result.push_str(rest);
    result
}
