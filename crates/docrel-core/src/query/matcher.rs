//! Condition evaluation and value ordering for stored documents

use std::cmp::Ordering;

use docrel_core_types::DocId;
use serde_json::Value;

use crate::model::{Fields, ID_KEY};
use crate::query::options::{Direction, FindOptions, SortKey};

const OP_IN: &str = "$in";
const OP_NE: &str = "$ne";

/// Check whether a stored document satisfies every condition
///
/// Semantics per key:
/// - `_id` compares against the document identity
/// - a `null` expectation matches a missing or null field
/// - an array field matches when any element equals the expectation
/// - `{"$in": [..]}` matches when the field (or any array element) is listed
/// - `{"$ne": v}` matches when the plain equality rule does not
pub fn matches(id: &DocId, fields: &Fields, conditions: &Fields) -> bool {
    conditions.iter().all(|(key, expected)| {
        if key == ID_KEY {
            let actual = Value::String(id.to_string());
            return value_matches(Some(&actual), expected);
        }
        value_matches(fields.get(key), expected)
    })
}

/// Check conditions plus the optional identity restriction
pub fn matches_options(id: &DocId, fields: &Fields, options: &FindOptions) -> bool {
    options.ids.as_ref().map_or(true, |ids| ids.contains(id)) && matches(id, fields, &options.conditions)
}

fn value_matches(actual: Option<&Value>, expected: &Value) -> bool {
    if let Value::Object(operator) = expected {
        if let Some(Value::Array(candidates)) = operator.get(OP_IN) {
            return candidates.iter().any(|c| equals(actual, c));
        }
        if let Some(excluded) = operator.get(OP_NE) {
            return !equals(actual, excluded);
        }
    }
    equals(actual, expected)
}

fn equals(actual: Option<&Value>, expected: &Value) -> bool {
    match (actual, expected) {
        (None, Value::Null) | (Some(Value::Null), Value::Null) => true,
        (None, _) => false,
        (Some(Value::Array(items)), Value::Array(_)) => {
            actual == Some(expected) || items.iter().any(|item| item == expected)
        }
        (Some(Value::Array(items)), scalar) => items.iter().any(|item| item == scalar),
        (Some(value), expected) => value == expected,
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values: null < bool < number < string < array < object
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (left, right) in x.iter().zip(y.iter()) {
                let ord = compare_values(left, right);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Compare two documents by a list of sort keys. Missing fields sort as null.
pub fn compare_by(
    sort: &[SortKey],
    (a_id, a): (&DocId, &Fields),
    (b_id, b): (&DocId, &Fields),
) -> Ordering {
    for key in sort {
        let ord = if key.field == ID_KEY {
            a_id.cmp(b_id)
        } else {
            let left = a.get(&key.field).unwrap_or(&Value::Null);
            let right = b.get(&key.field).unwrap_or(&Value::Null);
            compare_values(left, right)
        };
        let ord = match key.direction {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fields_from;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        fields_from(value).unwrap()
    }

    fn conditions(value: Value) -> Fields {
        fields_from(value).unwrap()
    }

    #[test]
    fn test_array_field_matches_contained_value() {
        let id = DocId::from("u1");
        let doc = fields(json!({"list_ids": ["a", "b"]}));
        assert!(matches(&id, &doc, &conditions(json!({"list_ids": "a"}))));
        assert!(!matches(&id, &doc, &conditions(json!({"list_ids": "c"}))));
    }

    #[test]
    fn test_id_in_operator() {
        let id = DocId::from("u1");
        let doc = Fields::new();
        assert!(matches(&id, &doc, &conditions(json!({"_id": {"$in": ["u0", "u1"]}}))));
        assert!(!matches(&id, &doc, &conditions(json!({"_id": {"$in": []}}))));
    }

    #[test]
    fn test_null_matches_missing_field() {
        let id = DocId::from("c1");
        let doc = fields(json!({"body": "hi"}));
        assert!(matches(&id, &doc, &conditions(json!({"commentable_id": null}))));
        assert!(!matches(&id, &doc, &conditions(json!({"body": null}))));
    }

    #[test]
    fn test_ids_restrict_on_top_of_conditions() {
        let doc = fields(json!({"name": "a"}));
        let options = FindOptions::new()
            .condition("_id", json!({"$in": ["u1", "u2"]}))
            .only_ids(vec![DocId::from("u2"), DocId::from("u3")]);
        assert!(!matches_options(&DocId::from("u1"), &doc, &options));
        assert!(matches_options(&DocId::from("u2"), &doc, &options));
        assert!(!matches_options(&DocId::from("u3"), &doc, &options));
    }

    #[test]
    fn test_ne_operator() {
        let id = DocId::from("c1");
        let doc = fields(json!({"approved": true}));
        assert!(matches(&id, &doc, &conditions(json!({"approved": {"$ne": false}}))));
        assert!(!matches(&id, &doc, &conditions(json!({"approved": {"$ne": true}}))));
    }

    #[test]
    fn test_value_order_across_types() {
        assert_eq!(compare_values(&json!(null), &json!(false)), Ordering::Less);
        assert_eq!(compare_values(&json!(10), &json!("a")), Ordering::Less);
        assert_eq!(compare_values(&json!(2), &json!(10)), Ordering::Less);
        assert_eq!(compare_values(&json!("b"), &json!("a")), Ordering::Greater);
    }

    #[test]
    fn test_compare_by_multiple_keys() {
        let a = fields(json!({"rank": 1, "name": "b"}));
        let b = fields(json!({"rank": 1, "name": "a"}));
        let sort = vec![SortKey::asc("rank"), SortKey::desc("name")];
        let (ia, ib) = (DocId::from("1"), DocId::from("2"));
        assert_eq!(compare_by(&sort, (&ia, &a), (&ib, &b)), Ordering::Less);
    }
}
