//! Removal of server-assigned metadata

use crate::resource::Instance;

/// Metadata keys the API server assigns and that must not be restored
pub const SERVER_MANAGED_FIELDS: [&str; 3] = ["creationTimestamp", "resourceVersion", "uid"];

/// Return a copy of `instance` without server-assigned metadata
///
/// Only the keys in [`SERVER_MANAGED_FIELDS`] are removed from `metadata`;
/// everything else, unknown fields included, is kept verbatim.
pub fn sanitize(instance: &Instance) -> Instance {
    let mut sanitized = instance.clone();
    if let Some(metadata) = sanitized.get_mut("metadata").and_then(|m| m.as_object_mut()) {
        for field in SERVER_MANAGED_FIELDS {
            metadata.remove(field);
        }
    }
    sanitized
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn live_instance() -> Instance {
        json!({
            "apiVersion": "example.io/v1",
            "kind": "Widget",
            "metadata": {
                "name": "w1",
                "namespace": "default",
                "uid": "abc",
                "resourceVersion": "5",
                "creationTimestamp": "2020-01-01T00:00:00Z",
                "labels": {"app": "demo"},
                "annotations": {"note": "keep"},
                "ownerReferences": [{"kind": "Gadget", "name": "g1", "uid": "owner-uid"}],
                "generation": 3
            },
            "spec": {"size": 3, "uid": "spec-level-uid"},
            "status": {"ready": true}
        })
    }

    #[test]
    fn test_strips_only_server_managed_fields() {
        let sanitized = sanitize(&live_instance());

        let mut expected = live_instance();
        let meta = expected["metadata"].as_object_mut().unwrap();
        meta.remove("uid");
        meta.remove("resourceVersion");
        meta.remove("creationTimestamp");

        assert_eq!(sanitized, expected);
        // Nested uids outside of metadata are application data
        assert_eq!(sanitized["spec"]["uid"], "spec-level-uid");
        assert_eq!(sanitized["metadata"]["ownerReferences"][0]["uid"], "owner-uid");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let once = sanitize(&live_instance());
        let twice = sanitize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_does_not_touch_input() {
        let original = live_instance();
        let _ = sanitize(&original);
        assert_eq!(original["metadata"]["uid"], "abc");
    }

    #[test]
    fn test_instance_without_metadata_passes_through() {
        let odd = json!({"spec": {"size": 1}});
        assert_eq!(sanitize(&odd), odd);

        let non_map_metadata = json!({"metadata": "weird"});
        assert_eq!(sanitize(&non_map_metadata), non_map_metadata);
    }
}
