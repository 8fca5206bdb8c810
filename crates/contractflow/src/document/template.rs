//! Placeholder substitution for contract templates.
//!
//! This is plain textual replacement, not a template language: every
//! `{{key}}` with a value in the field map is replaced, everything else is
//! left exactly as written.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static RE_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([A-Za-z0-9_]+)\}\}").unwrap());

/// Field name → value.
pub type FieldMap = BTreeMap<String, String>;

/// Replaces every `{{key}}` whose key has a value in `fields`.
///
/// Substitution is a single pass over the template, so values are inserted
/// literally and never expanded again. Placeholders without a value stay
/// verbatim.
pub fn substitute(template: &str, fields: &FieldMap) -> String {
    RE_PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| match fields.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Lists the distinct placeholder names in `template`, in order of first
/// appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for caps in RE_PLACEHOLDER.captures_iter(template) {
        let name = caps[1].to_string();
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}
