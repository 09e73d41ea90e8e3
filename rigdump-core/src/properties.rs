//! Custom property extraction
//!
//! Reads the key/value annotations attached to armatures, bones, pose bones
//! and bone collections. A key that fails to read never aborts the bag.

use serde_json::{Map, Value as JsonValue};

use crate::scene::Annotated;
use crate::value::coerce;

/// Host-internal key holding UI metadata for the other annotations
pub const RESERVED_KEY: &str = "_RNA_UI";

/// Placeholder for annotations whose value could not be read
pub const UNREADABLE: &str = "Unable to access";

/// Extract annotations as a JSON mapping.
///
/// Entities without the annotation capability yield an empty mapping.
pub fn extract_properties(entity: Option<&dyn Annotated>) -> Map<String, JsonValue> {
    let mut props = Map::new();
    let Some(entity) = entity else {
        return props;
    };

    for key in entity.annotation_keys() {
        if key == RESERVED_KEY {
            continue;
        }
        let value = match entity.annotation(&key) {
            Ok(value) => coerce(&value),
            Err(err) => {
                tracing::debug!("custom property {} unreadable: {}", key, err);
                JsonValue::String(UNREADABLE.to_string())
            }
        };
        props.insert(key, value);
    }

    props
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{AnnotationBag, Slot};
    use crate::value::HostValue;
    use serde_json::json;

    #[test]
    fn test_no_capability() {
        assert!(extract_properties(None).is_empty());
    }

    #[test]
    fn test_extract_in_order() {
        let bag = AnnotationBag::new()
            .with("ik_fk_switch", HostValue::Float(0.99999999))
            .with(RESERVED_KEY, HostValue::String("ui".into()))
            .with("rig_id", HostValue::String("a1b2".into()));

        let props = extract_properties(Some(&bag));
        let keys: Vec<&str> = props.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["ik_fk_switch", "rig_id"]);
        assert_eq!(props["ik_fk_switch"], json!(1.0));
        assert_eq!(props["rig_id"], json!("a1b2"));
    }

    #[test]
    fn test_unreadable_key_gets_placeholder() {
        let bag = AnnotationBag::new()
            .with(
                "driver_cache",
                Slot::Inaccessible {
                    inaccessible: "pointer to freed data".to_string(),
                },
            )
            .with("visible", HostValue::Bool(true));

        let props = extract_properties(Some(&bag));
        assert_eq!(props.len(), 2);
        assert_eq!(props["driver_cache"], json!(UNREADABLE));
        assert_eq!(props["visible"], json!(true));
    }
}
