// ── Attribute diffing ──
//
// The appliance stores every scalar as a string. Desired attributes are
// converted to that wire form before comparing and before sending, so a
// manifest may say `enabled: true` or `port: 443` naturally.

use serde::Serialize;
use serde_json::Value;

use crate::model::AttrMap;

/// One differing attribute. Nested settings keys use dotted paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub path: String,
    /// Remote value, `None` when the key is missing remotely.
    pub from: Option<String>,
    pub to: String,
}

/// Convert a scalar (or list) to the string the appliance stores.
pub fn wire_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => String::from(if *b { "1" } else { "0" }),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(wire_string).collect::<Vec<_>>().join(","),
        Value::Object(_) => value.to_string(),
    }
}

/// Convert a whole attribute map to wire form, keeping nested maps.
pub fn to_wire(attrs: &AttrMap) -> AttrMap {
    attrs
        .iter()
        .map(|(key, value)| {
            let wire = match value {
                Value::Object(map) => Value::Object(to_wire(map)),
                other => Value::String(wire_string(other)),
            };
            (key.clone(), wire)
        })
        .collect()
}

/// Fields of `desired` whose wire form differs from `actual`.
///
/// Keys only present remotely are ignored: a manifest manages the
/// attributes it names and nothing else.
pub fn diff(desired: &AttrMap, actual: &AttrMap) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    diff_into(desired, actual, "", &mut changes);
    changes
}

fn diff_into(desired: &AttrMap, actual: &AttrMap, prefix: &str, out: &mut Vec<FieldChange>) {
    for (key, want) in desired {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        let have = actual.get(key);

        match (want, have) {
            (Value::Object(want_map), Some(Value::Object(have_map))) => {
                diff_into(want_map, have_map, &path, out);
            }
            (Value::Object(want_map), _) => {
                diff_into(want_map, &AttrMap::new(), &path, out);
            }
            (_, Some(have)) => {
                let to = wire_string(want);
                let from = wire_string(have);
                if to != from {
                    out.push(FieldChange {
                        path,
                        from: Some(from),
                        to,
                    });
                }
            }
            (_, None) => out.push(FieldChange {
                path,
                from: None,
                to: wire_string(want),
            }),
        }
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
    fn wire_forms() {
        assert_eq!(wire_string(&json!(true)), "1");
        assert_eq!(wire_string(&json!(false)), "0");
        assert_eq!(wire_string(&json!(443)), "443");
        assert_eq!(wire_string(&json!(null)), "");
        assert_eq!(wire_string(&json!(["a", "b", 3])), "a,b,3");
    }

    #[test]
    fn equal_in_wire_form_is_no_change() {
        let desired = map(json!({ "enabled": true, "port": 443, "name": "web" }));
        let actual = map(json!({ "enabled": "1", "port": "443", "name": "web", "extra": "x" }));
        assert!(diff(&desired, &actual).is_empty());
    }

    #[test]
    fn reports_changed_and_missing_fields() {
        let desired = map(json!({ "mode": "http", "description": "new" }));
        let actual = map(json!({ "mode": "tcp" }));

        assert_eq!(
            diff(&desired, &actual),
            vec![
                FieldChange {
                    path: "mode".into(),
                    from: Some("tcp".into()),
                    to: "http".into(),
                },
                FieldChange {
                    path: "description".into(),
                    from: None,
                    to: "new".into(),
                },
            ]
        );
    }

    #[test]
    fn nested_settings_use_dotted_paths() {
        let desired = map(json!({ "settings": { "main": { "listenPort": 10051 } } }));
        let actual = map(json!({ "settings": { "main": { "listenPort": "10050", "enabled": "1" } } }));

        let changes = diff(&desired, &actual);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "settings.main.listenPort");
        assert_eq!(changes[0].from.as_deref(), Some("10050"));
        assert_eq!(changes[0].to, "10051");
    }

    #[test]
    fn to_wire_keeps_nesting() {
        let attrs = map(json!({ "enabled": true, "main": { "port": 1 } }));
        assert_eq!(
            to_wire(&attrs),
            map(json!({ "enabled": "1", "main": { "port": "1" } }))
        );
    }
}
