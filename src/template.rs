//! Naming templates: literal text plus `{variable}` placeholders.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Conventional starting template.
pub const DEFAULT_TEMPLATE: &str = "{date}_{topic}.{ext}";

/// A placeholder is any non-empty brace-delimited run without a closing
/// brace inside; unbalanced braces simply never match.
static VARIABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^}]+)\}").expect("placeholder pattern is valid"));

/// A user-authored naming pattern such as `"{date}_{topic}.{ext}"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameTemplate {
    template: String,
}

impl RenameTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Placeholder names in scan order. Duplicates are reported verbatim, so
    /// callers see `["a", "a"]` for `"{a}-{a}"`.
    pub fn variable_names(&self) -> Vec<String> {
        VARIABLE
            .captures_iter(&self.template)
            .map(|caps| caps[1].to_string())
            .collect()
    }

    /// Substitute `values` into the template in a single left-to-right pass.
    ///
    /// Placeholders without a matching key stay in the output verbatim, and
    /// replacement text is never re-scanned, so a value containing `{braces}`
    /// cannot trigger further expansion.
    pub fn apply(&self, values: &HashMap<String, String>) -> String {
        VARIABLE
            .replace_all(&self.template, |caps: &Captures| match values.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }
}

impl Default for RenameTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

impl fmt::Display for RenameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}
