//! Administration of the tenant → rate limit class mapping.

use tracing::info;

use crate::error::Result;
use crate::resolver::{class_key, configured_class, DEFAULT_CLASS};
use crate::store::KeyValueStore;

/// Look up a tenant's class and optionally change it.
///
/// Returns the class configured before any change, `default` when unset.
/// Setting the class to `default` clears the mapping; setting it to the
/// class already in effect writes nothing.
pub async fn limit_class(
    store: &dyn KeyValueStore,
    tenant_id: &str,
    new_class: Option<&str>,
) -> Result<String> {
    let key = class_key(tenant_id);
    let old_class = configured_class(store.get(&key).await?);

    if let Some(new_class) = new_class.filter(|c| !c.is_empty() && *c != old_class) {
        if new_class == DEFAULT_CLASS {
            store.delete(&key).await?;
        } else {
            store.set(&key, new_class).await?;
        }
        info!(tenant = %tenant_id, from = %old_class, to = %new_class, "Rate limit class changed");
    }

    Ok(old_class)
}

/// Render the outcome of a [`limit_class`] call for the console.
pub fn report_limit_class(tenant_id: &str, previous: &str, requested: Option<&str>) -> String {
    let mut out = format!("Tenant {}:\n", tenant_id);
    match requested.filter(|c| !c.is_empty()) {
        Some(new_class) => {
            out.push_str(&format!("  Previous rate-limit class: {}\n", previous));
            out.push_str(&format!("  New rate-limit class: {}\n", new_class));
        }
        None => out.push_str(&format!("  Configured rate-limit class: {}\n", previous)),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::RecordingStore;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn store_with(class: Option<&str>) -> RecordingStore {
        let inner = Arc::new(MemoryStore::new());
        if let Some(class) = class {
            tokio_test::block_on(inner.set("limit-class:spam", class)).unwrap();
        }
        RecordingStore::new(inner)
    }

    #[test]
    fn test_get() {
        let store = store_with(Some("old_class"));
        let result = tokio_test::block_on(limit_class(&store, "spam", None)).unwrap();

        assert_eq!(result, "old_class");
        assert_eq!(store.calls(), vec!["get limit-class:spam".to_string()]);
    }

    #[test]
    fn test_get_unset() {
        let store = store_with(None);
        let result = tokio_test::block_on(limit_class(&store, "spam", None)).unwrap();

        assert_eq!(result, "default");
        assert_eq!(store.calls(), vec!["get limit-class:spam".to_string()]);
    }

    #[test]
    fn test_get_empty_is_default() {
        let store = store_with(Some(""));
        let result = tokio_test::block_on(limit_class(&store, "spam", None)).unwrap();

        assert_eq!(result, "default");
    }

    #[test]
    fn test_delete_empty_is_noop() {
        let store = store_with(Some(""));
        let result = tokio_test::block_on(limit_class(&store, "spam", Some("default"))).unwrap();

        assert_eq!(result, "default");
        assert_eq!(store.calls(), vec!["get limit-class:spam".to_string()]);
    }

    #[test]
    fn test_set() {
        let store = store_with(Some("old_class"));
        let result = tokio_test::block_on(limit_class(&store, "spam", Some("new_class"))).unwrap();

        assert_eq!(result, "old_class");
        assert_eq!(
            store.calls(),
            vec![
                "get limit-class:spam".to_string(),
                "set limit-class:spam new_class".to_string(),
            ]
        );
    }

    #[test]
    fn test_set_unset() {
        let store = store_with(None);
        let result = tokio_test::block_on(limit_class(&store, "spam", Some("new_class"))).unwrap();

        assert_eq!(result, "default");
        assert_eq!(store.calls()[1], "set limit-class:spam new_class");
    }

    #[test]
    fn test_set_same_class_is_noop() {
        let store = store_with(Some("old_class"));
        tokio_test::block_on(limit_class(&store, "spam", Some("old_class"))).unwrap();

        assert_eq!(store.calls(), vec!["get limit-class:spam".to_string()]);
    }

    #[test]
    fn test_delete() {
        let store = store_with(Some("old_class"));
        let result = tokio_test::block_on(limit_class(&store, "spam", Some("default"))).unwrap();

        assert_eq!(result, "old_class");
        assert_eq!(
            store.calls(),
            vec![
                "get limit-class:spam".to_string(),
                "delete limit-class:spam".to_string(),
            ]
        );
    }

    #[test]
    fn test_delete_unset() {
        let store = store_with(None);
        let result = tokio_test::block_on(limit_class(&store, "spam", Some("default"))).unwrap();

        assert_eq!(result, "default");
        assert_eq!(store.calls(), vec!["get limit-class:spam".to_string()]);
    }

    #[test]
    fn test_report_configured() {
        assert_eq!(
            report_limit_class("tenant", "old_class", None),
            "Tenant tenant:\n  Configured rate-limit class: old_class\n"
        );
    }

    #[test]
    fn test_report_updated() {
        assert_eq!(
            report_limit_class("tenant", "old_class", Some("new_class")),
            "Tenant tenant:\n  Previous rate-limit class: old_class\n  New rate-limit class: new_class\n"
        );
    }
}
