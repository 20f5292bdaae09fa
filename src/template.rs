//! URI template substitution.
//!
//! Limit URIs carry `{name}` placeholders for route and query parameters.
//! Substitution replaces the placeholders whose names are bound and leaves
//! every other placeholder in place as the literal `{name}`, so a partially
//! bound URI is still a readable template.

use std::collections::BTreeMap;

/// Substitute bound placeholders in `template` with values from `params`.
///
/// Unknown placeholders and unterminated braces are copied through unchanged.
pub fn format_uri(template: &str, params: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                match params.get(name) {
                    Some(value) if !name.contains('{') => out.push_str(value),
                    _ => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}
