//! Deep merge of configuration maps.

use serde_json::Value;
use watchpost_core::Configuration;

/// Merges `overlay` into a copy of `base`.
///
/// Nested objects are merged key by key; any other value in `overlay`
/// (including arrays and `null`) replaces the one in `base`.
pub fn deep_merge(base: &Configuration, overlay: &Configuration) -> Configuration {
    let mut merged = base.clone();
    merge_into(&mut merged, overlay);
    merged
}

fn merge_into(target: &mut Configuration, overlay: &Configuration) {
    for (key, value) in overlay {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_into(existing, incoming);
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    fn map(value: Value) -> Configuration {
        match value {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn overlay_wins_on_conflict() {
        let base = map(json!({"timeout": 5, "ports": [80]}));
        let overlay = map(json!({"timeout": 10, "target": "http://x"}));
        let merged = deep_merge(&base, &overlay);
        assert_eq!(
            Value::Object(merged),
            json!({"timeout": 10, "ports": [80], "target": "http://x"})
        );
    }

    #[test]
    fn nested_objects_merge() {
        let base = map(json!({"auth": {"user": "a", "scheme": "basic"}}));
        let overlay = map(json!({"auth": {"user": "b"}}));
        let merged = deep_merge(&base, &overlay);
        assert_eq!(merged["auth"], json!({"user": "b", "scheme": "basic"}));
    }

    #[test]
    fn arrays_are_replaced_not_concatenated() {
        let base = map(json!({"ports": [80, 443]}));
        let overlay = map(json!({"ports": [8080]}));
        assert_eq!(deep_merge(&base, &overlay)["ports"], json!([8080]));
    }

    #[test]
    fn object_replaces_scalar() {
        let base = map(json!({"auth": "none"}));
        let overlay = map(json!({"auth": {"user": "b"}}));
        assert_eq!(deep_merge(&base, &overlay)["auth"], json!({"user": "b"}));
    }

    fn flat_config() -> impl Strategy<Value = Configuration> {
        prop::collection::btree_map("[a-e]", any::<i64>(), 0..6).prop_map(|m| {
            m.into_iter()
                .map(|(k, v)| (k, Value::from(v)))
                .collect::<Configuration>()
        })
    }

    proptest! {
        #[test]
        fn every_overlay_key_wins(base in flat_config(), overlay in flat_config()) {
            let merged = deep_merge(&base, &overlay);
            for (k, v) in &overlay {
                prop_assert_eq!(merged.get(k), Some(v));
            }
            for (k, v) in &base {
                if !overlay.contains_key(k) {
                    prop_assert_eq!(merged.get(k), Some(v));
                }
            }
            prop_assert!(merged.len() <= base.len() + overlay.len());
        }

        #[test]
        fn merging_with_empty_is_identity(base in flat_config()) {
            prop_assert_eq!(deep_merge(&base, &Configuration::new()), base.clone());
            prop_assert_eq!(deep_merge(&Configuration::new(), &base), base);
        }
    }
}
