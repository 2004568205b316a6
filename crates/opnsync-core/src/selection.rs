// ── Selection normalisation ──
//
// Multi/single-select fields come back from the appliance as a map of
// candidates, e.g. `{"hdr": {"value": "Header", "selected": 1}, ...}`,
// but are written as the plain comma-joined list of selected keys.
// Reads are collapsed to the written form so diffs compare like with like.

use serde_json::Value;

use crate::model::AttrMap;

/// Collapse every selection mapping in `attrs`, recursively.
///
/// Idempotent: canonical strings are scalars and pass through untouched.
pub fn normalize(attrs: &AttrMap) -> AttrMap {
    attrs
        .iter()
        .map(|(key, value)| (key.clone(), normalize_value(value)))
        .collect()
}

/// Normalise a single value.
pub fn normalize_value(value: &Value) -> Value {
    match value {
        Value::Object(map) if is_selection(map) => Value::String(selected_keys(map)),
        Value::Object(map) => Value::Object(normalize(map)),
        other => other.clone(),
    }
}

/// A selection mapping is a map whose every value is a map carrying both
/// `value` and `selected`. An empty map qualifies: it is a select field
/// with no candidates.
fn is_selection(map: &AttrMap) -> bool {
    map.values().all(|candidate| {
        candidate
            .as_object()
            .is_some_and(|c| c.contains_key("value") && c.contains_key("selected"))
    })
}

fn selected_keys(map: &AttrMap) -> String {
    map.iter()
        .filter(|(_, candidate)| candidate.get("selected").is_some_and(is_truthy))
        .map(|(key, _)| key.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

/// `selected` is an integer flag; some endpoints send it as a string or bool.
fn is_truthy(flag: &Value) -> bool {
    match flag {
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(s) => s.trim().parse::<i64>().ok() == Some(1),
        Value::Bool(b) => *b,
        _ => false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn map(value: Value) -> AttrMap {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn collapses_selection_to_selected_keys() {
        let input = map(json!({
            "a": {
                "x": { "value": "X", "selected": 1 },
                "y": { "value": "Y", "selected": 0 }
            }
        }));

        assert_eq!(normalize(&input), map(json!({ "a": "x" })));
    }

    #[test]
    fn keeps_candidate_order() {
        let input = map(json!({
            "linkedAcls": {
                "c3": { "value": "third", "selected": 1 },
                "a1": { "value": "first", "selected": 1 },
                "b2": { "value": "second", "selected": 0 },
                "d4": { "value": "fourth", "selected": 1 }
            }
        }));

        assert_eq!(normalize(&input)["linkedAcls"], json!("c3,a1,d4"));
    }

    #[test]
    fn nothing_selected_is_empty_string() {
        let input = map(json!({
            "mode": {
                "http": { "value": "HTTP", "selected": 0 },
                "tcp": { "value": "TCP", "selected": 0 }
            }
        }));

        assert_eq!(normalize(&input)["mode"], json!(""));
    }

    #[test]
    fn recurses_into_plain_maps() {
        let input = map(json!({
            "settings": {
                "main": {
                    "enabled": "1",
                    "listenPort": "10050",
                    "logLevel": {
                        "3": { "value": "warning", "selected": 1 },
                        "4": { "value": "debug", "selected": 0 }
                    }
                }
            }
        }));

        assert_eq!(
            normalize(&input),
            map(json!({
                "settings": {
                    "main": {
                        "enabled": "1",
                        "listenPort": "10050",
                        "logLevel": "3"
                    }
                }
            }))
        );
    }

    #[test]
    fn scalars_and_sequences_pass_through() {
        let input = map(json!({
            "name": "block-foo",
            "port": 443,
            "enabled": true,
            "tags": ["a", "b"],
            "nothing": null
        }));

        assert_eq!(normalize(&input), input);
    }

    #[test]
    fn empty_candidate_map_is_empty_string() {
        let remote = normalize(&map(json!({ "linkedServers": {} })));
        assert_eq!(remote["linkedServers"], json!(""));

        // A declared empty selection converges instead of diffing forever.
        let desired = map(json!({ "linkedServers": "" }));
        assert!(crate::diff::diff(&desired, &remote).is_empty());
    }

    #[test]
    fn string_and_bool_flags_are_understood() {
        let input = map(json!({
            "f": {
                "a": { "value": "A", "selected": "1" },
                "b": { "value": "B", "selected": true },
                "c": { "value": "C", "selected": "0" },
                "d": { "value": "D", "selected": 2 }
            }
        }));

        assert_eq!(normalize(&input)["f"], json!("a,b"));
    }

    #[test]
    fn mixed_map_is_not_a_selection() {
        let input = map(json!({
            "f": {
                "a": { "value": "A", "selected": 1 },
                "note": "plain"
            }
        }));

        // Not every value is a candidate, so recurse instead: the inner
        // candidate map itself is not a selection either.
        assert_eq!(normalize(&input), input);
    }

    #[test]
    fn normalize_is_idempotent() {
        let input = map(json!({
            "a": {
                "x": { "value": "X", "selected": 1 },
                "y": { "value": "Y", "selected": 1 }
            },
            "nested": {
                "b": {
                    "p": { "value": "P", "selected": 0 },
                    "q": { "value": "Q", "selected": 1 }
                },
                "plain": "v"
            },
            "list": [1, 2]
        }));

        let once = normalize(&input);
        assert_eq!(normalize(&once), once);
    }
}
