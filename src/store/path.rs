//! Dotted field paths over JSON documents

use serde_json::{Map, Value};

/// Looks up `a.b.c` in a document.
pub fn get<'a>(doc: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Object(obj) => obj.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Sets `a.b.c`, creating intermediate objects.
///
/// Returns false if an intermediate segment is a non-object value.
pub fn set(doc: &mut Map<String, Value>, path: &str, value: Value) -> bool {
    match path.split_once('.') {
        None => {
            doc.insert(path.to_string(), value);
            true
        }
        Some((head, rest)) => {
            let child = doc
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            match child {
                Value::Object(inner) => set(inner, rest, value),
                _ => false,
            }
        }
    }
}

/// Removes `a.b.c`, returning the old value.
pub fn remove(doc: &mut Map<String, Value>, path: &str) -> Option<Value> {
    match path.split_once('.') {
        None => doc.remove(path),
        Some((head, rest)) => match doc.get_mut(head)? {
            Value::Object(inner) => remove(inner, rest),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Map<String, Value> {
        json!({"a": {"b": {"c": 1}}, "list": [10, 20]})
            .as_object()
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_get_nested_and_indexed() {
        let d = doc();
        assert_eq!(get(&d, "a.b.c"), Some(&json!(1)));
        assert_eq!(get(&d, "list.1"), Some(&json!(20)));
        assert_eq!(get(&d, "a.x"), None);
    }

    #[test]
    fn test_set_creates_parents() {
        let mut d = doc();
        assert!(set(&mut d, "x.y", json!(true)));
        assert_eq!(get(&d, "x.y"), Some(&json!(true)));
        assert!(!set(&mut d, "list.y", json!(1)));
    }

    #[test]
    fn test_remove() {
        let mut d = doc();
        assert_eq!(remove(&mut d, "a.b.c"), Some(json!(1)));
        assert_eq!(get(&d, "a.b"), Some(&json!({})));
    }
}
