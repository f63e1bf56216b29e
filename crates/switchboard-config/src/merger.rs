//! Configuration layer merging
//!
//! Layers are merged as documents before they are typed, so a later layer only
//! overrides the keys it actually sets.

use serde_json::map::Entry;
use serde_json::Value;

/// Merge configuration layers in order
///
/// Objects merge key by key, any other value in a later layer replaces the
/// earlier one. An empty list merges to an empty object.
pub fn merge_layers(layers: impl IntoIterator<Item = Value>) -> Value {
    layers
        .into_iter()
        .fold(Value::Object(Default::default()), |mut base, overlay| {
            merge_into(&mut base, overlay);
            base
        })
}

fn merge_into(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.entry(key) {
                    Entry::Occupied(mut existing) => merge_into(existing.get_mut(), value),
                    Entry::Vacant(slot) => {
                        slot.insert(value);
                    }
                }
            }
        }
        // Empty documents parse to null and must not erase earlier layers
        (_, Value::Null) => {}
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_override() {
        let merged = merge_layers(vec![
            json!({"modules": {"directory": "modules", "auto_load": true}}),
            json!({"modules": {"auto_load": false}}),
        ]);

        assert_eq!(
            merged,
            json!({"modules": {"directory": "modules", "auto_load": false}})
        );
    }

    #[test]
    fn test_scalars_and_arrays_replace() {
        let merged = merge_layers(vec![
            json!({"level": "info", "tags": ["a", "b"]}),
            json!({"level": "debug", "tags": ["c"]}),
        ]);

        assert_eq!(merged, json!({"level": "debug", "tags": ["c"]}));
    }

    #[test]
    fn test_empty_layer_keeps_base() {
        let merged = merge_layers(vec![json!({"level": "info"}), Value::Null]);
        assert_eq!(merged, json!({"level": "info"}));
    }
}
