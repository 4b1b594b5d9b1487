//! Field path evaluator.
//!
//! Paths use dot-notation for object keys and bracket indices for
//! sequences: `lines[0].sku`, `address.city`, `tags[2]`. Resolution never
//! fails; a missing intermediate segment simply resolves to `None`.

use serde_json::{Map, Value};

/// Largest bracket index a path may write to. Assigning pads the array with
/// nulls up to the index, so writes past this bound are dropped.
pub const MAX_INDEX: usize = 1_000;

/// One step of a parsed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// A parsed field path, keeping its source text for error messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    raw: String,
    segments: Vec<PathSegment>,
}

impl FieldPath {
    pub fn parse(raw: &str) -> Self {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = raw.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '.' => flush_key(&mut current, &mut segments),
                '[' => {
                    flush_key(&mut current, &mut segments);
                    let mut inner = String::new();
                    for next in chars.by_ref() {
                        if next == ']' {
                            break;
                        }
                        inner.push(next);
                    }
                    let inner = inner.trim().trim_matches(|q| q == '"' || q == '\'');
                    match inner.parse::<usize>() {
                        Ok(idx) => segments.push(PathSegment::Index(idx)),
                        Err(_) if !inner.is_empty() => {
                            segments.push(PathSegment::Key(inner.to_string()))
                        }
                        Err(_) => {}
                    }
                }
                other => current.push(other),
            }
        }
        flush_key(&mut current, &mut segments);

        Self {
            raw: raw.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// The first bracket index above [`MAX_INDEX`], if any.
    pub fn oversized_index(&self) -> Option<usize> {
        self.segments.iter().find_map(|segment| match segment {
            PathSegment::Index(idx) if *idx > MAX_INDEX => Some(*idx),
            _ => None,
        })
    }

    /// Resolve this path against `data`.
    ///
    /// Returns `None` when any segment is missing or the value at an
    /// intermediate segment is not a container.
    pub fn resolve<'a>(&self, data: &'a Value) -> Option<&'a Value> {
        let mut current = data;
        for segment in &self.segments {
            current = match (segment, current) {
                (PathSegment::Key(key), Value::Object(map)) => map.get(key)?,
                (PathSegment::Index(idx), Value::Array(items)) => items.get(*idx)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Write `value` at this path inside `target`, creating intermediate
    /// objects and arrays as needed.
    pub fn assign(&self, target: &mut Map<String, Value>, value: Value) {
        let Some((first, rest)) = self.segments.split_first() else {
            return;
        };
        match first {
            PathSegment::Key(key) => {
                let slot = target.entry(key.clone()).or_insert(Value::Null);
                assign_into(slot, rest, value);
            }
            // A top-level index has no object key to hang off; store it
            // under its textual form.
            PathSegment::Index(idx) => {
                let slot = target.entry(idx.to_string()).or_insert(Value::Null);
                assign_into(slot, rest, value);
            }
        }
    }
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

fn flush_key(current: &mut String, segments: &mut Vec<PathSegment>) {
    if !current.is_empty() {
        segments.push(PathSegment::Key(std::mem::take(current)));
    }
}

fn assign_into(slot: &mut Value, segments: &[PathSegment], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *slot = value;
        return;
    };
    match first {
        PathSegment::Key(key) => {
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(map) = slot {
                let child = map.entry(key.clone()).or_insert(Value::Null);
                assign_into(child, rest, value);
            }
        }
        PathSegment::Index(idx) if *idx > MAX_INDEX => {}
        PathSegment::Index(idx) => {
            if !slot.is_array() {
                *slot = Value::Array(Vec::new());
            }
            if let Value::Array(items) = slot {
                if items.len() <= *idx {
                    items.resize(*idx + 1, Value::Null);
                }
                assign_into(&mut items[*idx], rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_dots_and_brackets() {
        let path = FieldPath::parse("lines[2].item.sku");
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Key("lines".into()),
                PathSegment::Index(2),
                PathSegment::Key("item".into()),
                PathSegment::Key("sku".into()),
            ]
        );
    }

    #[test]
    fn resolves_nested_values() {
        let data = json!({"lines": [{"sku": "A"}, {"sku": "B"}], "customer": {"name": "Acme"}});
        assert_eq!(
            FieldPath::parse("lines[1].sku").resolve(&data),
            Some(&json!("B"))
        );
        assert_eq!(
            FieldPath::parse("customer.name").resolve(&data),
            Some(&json!("Acme"))
        );
    }

    #[test]
    fn missing_intermediate_is_none() {
        let data = json!({"customer": null, "lines": []});
        assert!(FieldPath::parse("customer.name").resolve(&data).is_none());
        assert!(FieldPath::parse("lines[0].sku").resolve(&data).is_none());
        assert!(FieldPath::parse("nope.deeper").resolve(&data).is_none());
    }

    #[test]
    fn explicit_null_leaf_resolves_to_null() {
        let data = json!({"price": null});
        assert_eq!(FieldPath::parse("price").resolve(&data), Some(&Value::Null));
    }

    #[test]
    fn assign_creates_containers() {
        let mut out = Map::new();
        FieldPath::parse("dimensions.size[1]").assign(&mut out, json!(5));
        FieldPath::parse("sku").assign(&mut out, json!("X-1"));
        assert_eq!(
            Value::Object(out),
            json!({"dimensions": {"size": [null, 5]}, "sku": "X-1"})
        );
    }

    #[test]
    fn quoted_bracket_keys_are_object_keys() {
        let data = json!({"attrs": {"color code": "red"}});
        assert_eq!(
            FieldPath::parse("attrs['color code']").resolve(&data),
            Some(&json!("red"))
        );
    }

    #[test]
    fn oversized_indexes_are_flagged_and_not_written() {
        let path = FieldPath::parse("lines[4000000000].sku");
        assert_eq!(path.oversized_index(), Some(4_000_000_000));
        assert_eq!(FieldPath::parse("lines[1000].sku").oversized_index(), None);

        let mut out = Map::new();
        path.assign(&mut out, json!("A"));
        assert_eq!(Value::Object(out), json!({"lines": null}));
    }
}
