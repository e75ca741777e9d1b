//! `{{NAME}}` placeholder substitution for artifact templates.

/// Replaces every `{{NAME}}` in `template` with its value.
///
/// Placeholders without a value are left untouched.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    values
        .iter()
        .fold(template.to_string(), |acc, (name, value)| {
            acc.replace(&format!("{{{{{name}}}}}"), value)
        })
}

/// Names of the placeholders still present in `text`.
pub fn unresolved(text: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            break;
        };
        let name = &after[..end];
        if !name.is_empty() && name.chars().all(|c| c.is_ascii_uppercase() || c == '_') {
            names.push(name.to_string());
        }
        rest = &after[end + 2..];
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_replaces_all_occurrences() {
        let rendered = render(
            r#"{"ws":"{{WORKSPACE_ID}}","again":"{{WORKSPACE_ID}}","key":"{{POLYGON_API_KEY}}"}"#,
            &[("WORKSPACE_ID", "ws-1"), ("POLYGON_API_KEY", "secret")],
        );
        assert_eq!(rendered, r#"{"ws":"ws-1","again":"ws-1","key":"secret"}"#);
        assert!(unresolved(&rendered).is_empty());
    }

    #[test]
    fn test_unresolved_lists_missing_values() {
        let rendered = render("{{A_B}} {{KQLDATABASE_ID}} {{lower}}", &[("A_B", "x")]);
        assert_eq!(unresolved(&rendered), vec!["KQLDATABASE_ID".to_string()]);
    }
}
