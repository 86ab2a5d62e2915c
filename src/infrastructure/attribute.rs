//! Path addressing over resource attribute trees
//!
//! Attributes are plain `serde_json::Value` trees. A path is a dot separated
//! list of segments: map keys, or numeric indexes into sequences. A non-numeric
//! segment applied to a sequence is applied to every element of it, so
//! `ingress.cidr_blocks` reaches the CIDR blocks of every ingress rule.

use serde_json::Value;

/// Collect every scalar reachable through `path`, rendered as strings
///
/// Returns an empty vector when the path does not exist.
pub fn walk_and_get(path: &str, value: &Value) -> Vec<String> {
    let segments: Vec<&str> = path.split('.').collect();
    if path.is_empty() {
        return Vec::new();
    }

    let mut found = Vec::new();
    walk(&segments, value, &mut found);
    found
}

fn walk(segments: &[&str], value: &Value, found: &mut Vec<String>) {
    let Some((segment, rest)) = segments.split_first() else {
        collect_scalars(value, found);
        return;
    };

    match value {
        Value::Object(map) => {
            if let Some(child) = map.get(*segment) {
                walk(rest, child, found);
            }
        }
        Value::Array(items) => match segment.parse::<usize>() {
            Ok(index) => {
                if let Some(child) = items.get(index) {
                    walk(rest, child, found);
                }
            }
            Err(_) => {
                for item in items {
                    walk(segments, item, found);
                }
            }
        },
        _ => {}
    }
}

fn collect_scalars(value: &Value, found: &mut Vec<String>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_scalars(item, found);
            }
        }
        other => {
            if let Some(text) = scalar_to_string(other) {
                found.push(text);
            }
        }
    }
}

/// Render a scalar the way filter values are written on the command line
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Whether a value carries no information (null, "", [] or {})
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Remove every node for which `keep` returns false
///
/// `keep` receives the full dotted path of the node (sequence elements use
/// their index) and the node after its own children were pruned.
pub fn retain_paths<F>(value: &mut Value, keep: &F)
where
    F: Fn(&str, &Value) -> bool,
{
    retain_under(value, "", keep);
}

fn retain_under<F>(value: &mut Value, prefix: &str, keep: &F)
where
    F: Fn(&str, &Value) -> bool,
{
    match value {
        Value::Object(map) => {
            let keys: Vec<String> = map.keys().cloned().collect();
            for key in keys {
                let path = join_path(prefix, &key);
                let remove = match map.get_mut(&key) {
                    Some(child) => {
                        retain_under(child, &path, keep);
                        !keep(&path, child)
                    }
                    None => false,
                };
                if remove {
                    map.remove(&key);
                }
            }
        }
        Value::Array(items) => {
            let mut index = 0;
            items.retain_mut(|child| {
                let path = join_path(prefix, &index.to_string());
                index += 1;
                retain_under(child, &path, keep);
                keep(&path, child)
            });
        }
        _ => {}
    }
}

fn join_path(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", prefix, segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "id": "sg-1",
            "tags": { "Env": "prod", "Team": "core" },
            "port": 443,
            "enabled": true,
            "ingress": [
                { "cidr_blocks": ["10.0.0.0/8", "192.168.0.0/16"], "protocol": "tcp" },
                { "cidr_blocks": ["0.0.0.0/0"], "protocol": "udp" }
            ]
        })
    }

    #[test]
    fn test_walk_nested_map() {
        assert_eq!(walk_and_get("tags.Env", &sample()), vec!["prod"]);
    }

    #[test]
    fn test_walk_numeric_index() {
        assert_eq!(walk_and_get("ingress.1.protocol", &sample()), vec!["udp"]);
        assert_eq!(
            walk_and_get("ingress.0.cidr_blocks.1", &sample()),
            vec!["192.168.0.0/16"]
        );
    }

    #[test]
    fn test_walk_fans_out_over_sequences() {
        assert_eq!(
            walk_and_get("ingress.cidr_blocks", &sample()),
            vec!["10.0.0.0/8", "192.168.0.0/16", "0.0.0.0/0"]
        );
    }

    #[test]
    fn test_walk_renders_scalars() {
        assert_eq!(walk_and_get("port", &sample()), vec!["443"]);
        assert_eq!(walk_and_get("enabled", &sample()), vec!["true"]);
    }

    #[test]
    fn test_walk_missing_path() {
        assert!(walk_and_get("tags.Owner", &sample()).is_empty());
        assert!(walk_and_get("ingress.5.protocol", &sample()).is_empty());
        assert!(walk_and_get("", &sample()).is_empty());
        assert!(walk_and_get("port.value", &sample()).is_empty());
    }

    #[test]
    fn test_retain_paths_removes_matching_nodes() {
        let mut value = sample();
        retain_paths(&mut value, &|path: &str, _: &Value| {
            path != "tags.Team" && path != "ingress.0.protocol"
        });

        assert_eq!(value["tags"], json!({ "Env": "prod" }));
        assert_eq!(
            value["ingress"][0],
            json!({ "cidr_blocks": ["10.0.0.0/8", "192.168.0.0/16"] })
        );
        assert_eq!(value["ingress"][1]["protocol"], json!("udp"));
    }

    #[test]
    fn test_retain_paths_sees_pruned_children() {
        let mut value = json!({ "tags": { "Team": "core" }, "name": "web" });
        retain_paths(&mut value, &|path: &str, node: &Value| {
            path != "tags.Team" && !is_empty_value(node)
        });

        assert_eq!(value, json!({ "name": "web" }));
    }
}
