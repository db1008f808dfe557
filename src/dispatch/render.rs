//! Variable substitution for template bodies.

use std::collections::HashMap;

/// Substitute `{{key}}` placeholders in a template body.
///
/// Every literal occurrence of a placeholder whose key exists in `variables`
/// is replaced; keys are matched case-sensitively. Placeholders with no
/// matching key are left verbatim. Substituted values are emitted as-is — a
/// value that itself looks like a placeholder is never expanded again, so the
/// output is independent of variable iteration order.
pub fn render(body: &str, variables: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(body.len());
    let mut rest = body;

    while let Some(start) = rest.find("{{") {
        let Some(end) = rest[start + 2..].find("}}") else {
            break;
        };

        let key = &rest[start + 2..start + 2 + end];
        out.push_str(&rest[..start]);

        match variables.get(key) {
            Some(value) => out.push_str(value),
            None => out.push_str(&rest[start..start + end + 4]),
        }

        rest = &rest[start + end + 4..];
    }

    out.push_str(rest);
    out
}
