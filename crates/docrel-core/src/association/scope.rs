//! Relation filters
//!
//! Pure functions from (owner, association, caller options) to the options
//! handed to the generic finder. The relation filter is applied after the
//! caller's options are merged, so callers can narrow a relation but never
//! widen or redirect it.

use serde_json::{json, Value};

use crate::association::config::{ArrayEnd, AssociationConfig, AssociationKind};
use crate::model::{Document, Fields, ID_KEY};
use crate::query::FindOptions;

/// Conditions selecting the owner's peers
///
/// `None` when the owner cannot have persisted peers: it has no identity yet
/// and the relation is keyed by it, or it is a holder with an empty array.
pub fn scope_conditions(config: &AssociationConfig, owner: &Document) -> Option<Fields> {
    let mut scope = Fields::new();
    match &config.kind {
        AssociationKind::PolymorphicOneToMany { as_name } => {
            let id = owner.id()?;
            scope.insert(format!("{as_name}_type"), Value::String(owner.model().to_string()));
            scope.insert(format!("{as_name}_id"), Value::String(id.to_string()));
        }
        AssociationKind::ArrayManyToMany(ArrayEnd::Source { in_key, .. }) => {
            let id = owner.id()?;
            scope.insert(in_key.clone(), Value::String(id.to_string()));
        }
        AssociationKind::ArrayManyToMany(ArrayEnd::Holder { in_key }) => {
            let ids: Vec<Value> = owner
                .id_array(in_key)
                .into_iter()
                .map(|id| Value::String(id.to_string()))
                .collect();
            if ids.is_empty() {
                return None;
            }
            scope.insert(ID_KEY.to_string(), json!({ "$in": ids }));
        }
    }
    Some(scope)
}

/// Declared defaults, then caller options, then the relation filter
pub fn scoped_options(
    config: &AssociationConfig,
    owner: &Document,
    caller: &FindOptions,
) -> Option<FindOptions> {
    let scope = scope_conditions(config, owner)?;
    Some(config.finder_options.merged_with(caller).scoped(scope))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fields_from;
    use crate::query::SortKey;
    use docrel_core_types::DocId;

    fn config(kind: AssociationKind) -> AssociationConfig {
        AssociationConfig {
            name: "rel".to_string(),
            owner_model: "Post".to_string(),
            target_model: "Comment".to_string(),
            kind,
            finder_options: FindOptions::new()
                .condition("approved", json!(true))
                .sort(SortKey::asc("position")),
        }
    }

    fn saved(model: &str, id: &str, fields: Value) -> Document {
        Document::persisted(model, DocId::from(id), fields_from(fields).unwrap())
    }

    #[test]
    fn test_polymorphic_scope() {
        let config = config(AssociationKind::PolymorphicOneToMany {
            as_name: "commentable".to_string(),
        });
        let owner = saved("Post", "p1", json!({}));
        let options = scoped_options(&config, &owner, &FindOptions::new()).unwrap();

        assert_eq!(options.conditions.get("commentable_type"), Some(&json!("Post")));
        assert_eq!(options.conditions.get("commentable_id"), Some(&json!("p1")));
        assert_eq!(options.conditions.get("approved"), Some(&json!(true)));
        assert_eq!(options.sort, vec![SortKey::asc("position")]);
    }

    #[test]
    fn test_caller_cannot_override_relation_key() {
        let config = config(AssociationKind::ArrayManyToMany(ArrayEnd::Source {
            source: "lists".to_string(),
            in_key: "list_ids".to_string(),
        }));
        let owner = saved("List", "l1", json!({}));
        let caller = FindOptions::new()
            .condition("list_ids", json!("l2"))
            .condition("approved", json!(false));
        let options = scoped_options(&config, &owner, &caller).unwrap();

        assert_eq!(options.conditions.get("list_ids"), Some(&json!("l1")));
        assert_eq!(options.conditions.get("approved"), Some(&json!(false)));
    }

    #[test]
    fn test_new_owner_has_no_id_scope() {
        let config = config(AssociationKind::PolymorphicOneToMany {
            as_name: "commentable".to_string(),
        });
        let owner = Document::new("Post", Fields::new());
        assert!(scope_conditions(&config, &owner).is_none());
    }

    #[test]
    fn test_holder_scope_uses_owner_array() {
        let config = config(AssociationKind::ArrayManyToMany(ArrayEnd::Holder {
            in_key: "list_ids".to_string(),
        }));
        let owner = Document::new("User", fields_from(json!({"list_ids": ["a", "b"]})).unwrap());
        let scope = scope_conditions(&config, &owner).unwrap();
        assert_eq!(scope.get("_id"), Some(&json!({"$in": ["a", "b"]})));

        let empty = Document::new("User", fields_from(json!({"list_ids": []})).unwrap());
        assert!(scope_conditions(&config, &empty).is_none());
    }
}
