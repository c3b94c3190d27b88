//! Field and label selector helpers

use std::collections::BTreeMap;

use kube::api::ListParams;

use crate::error::{AppError, AppResult};

/// `metadata.name=<name>`
pub fn name_field_selector(name: &str) -> String {
    format!("metadata.name={}", name)
}

/// `spec.nodeName=<node>`, the pods scheduled on a node
pub fn node_field_selector(node: &str) -> String {
    format!("spec.nodeName={}", node)
}

/// Substitute `{name}` in a selector template such as `name in ({name})`
pub fn expand_name_template(selector: &str, name: &str) -> String {
    selector.replace("{name}", name)
}

/// Build list parameters from an optional name and label selector. Blank
/// values filter nothing.
pub fn list_params(name: Option<&str>, label_selector: Option<&str>) -> ListParams {
    let mut params = ListParams::default();
    if let Some(name) = name.filter(|n| !n.is_empty()) {
        params = params.fields(&name_field_selector(name));
    }
    if let Some(labels) = label_selector.filter(|l| !l.is_empty()) {
        params = params.labels(labels);
    }
    params
}

/// Parse `k=v,k2=v2` into a map. Blank input yields an empty map.
pub fn parse_key_values(input: &str) -> AppResult<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for pair in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            AppError::Configuration(format!(
                "selector '{}' is not a key=value pair in '{}'",
                pair, input
            ))
        })?;
        out.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(out)
}

/// Split a comma separated list, dropping empty entries
pub fn split_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_values() {
        let parsed = parse_key_values("app=web, tier = front").unwrap();
        assert_eq!(parsed.get("app").map(String::as_str), Some("web"));
        assert_eq!(parsed.get("tier").map(String::as_str), Some("front"));
        assert!(parse_key_values("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_key_values_rejects_bare_key() {
        assert!(matches!(
            parse_key_values("app=web,broken"),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn test_list_params() {
        let params = list_params(Some("n1"), Some("role=worker"));
        assert_eq!(params.field_selector.as_deref(), Some("metadata.name=n1"));
        assert_eq!(params.label_selector.as_deref(), Some("role=worker"));

        let params = list_params(None, Some(""));
        assert!(params.label_selector.is_none());

        let params = list_params(Some(""), Some("app=web"));
        assert!(params.field_selector.is_none());
        assert_eq!(params.label_selector.as_deref(), Some("app=web"));
    }

    #[test]
    fn test_expand_name_template() {
        assert_eq!(
            expand_name_template("name in ({name})", "web"),
            "name in (web)"
        );
        assert_eq!(split_list("a, b,,c"), vec!["a", "b", "c"]);
    }
}
