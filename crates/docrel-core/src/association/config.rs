use serde::Serialize;

use crate::errors::{DocRelError, Result};
use crate::query::FindOptions;

/// Which end of an array-backed many-to-many relation an association is
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "end", rename_all = "snake_case")]
pub enum ArrayEnd {
    /// Owner stores `in_key: [peer ids]`
    Holder { in_key: String },
    /// Peers store the owner id in their `in_key` array; `source` names the
    /// holder association on the peer model that points back here
    Source { source: String, in_key: String },
}

/// Closed set of relation kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssociationKind {
    /// Peers store `<as>_type` and `<as>_id`
    PolymorphicOneToMany { as_name: String },
    ArrayManyToMany(ArrayEnd),
}

/// Immutable, validated declaration of one association
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssociationConfig {
    pub name: String,
    pub owner_model: String,
    pub target_model: String,
    pub kind: AssociationKind,
    /// Defaults merged under every scoped query
    pub finder_options: FindOptions,
}

impl AssociationConfig {
    /// Short kind label used in errors and logs
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            AssociationKind::PolymorphicOneToMany { .. } => KIND_POLYMORPHIC,
            AssociationKind::ArrayManyToMany(ArrayEnd::Source { .. }) => KIND_MANY_TO_MANY,
            AssociationKind::ArrayManyToMany(ArrayEnd::Holder { .. }) => KIND_IN_ARRAY,
        }
    }

    /// `<as>_type`, for polymorphic associations
    pub fn type_key(&self) -> Option<String> {
        match &self.kind {
            AssociationKind::PolymorphicOneToMany { as_name } => Some(format!("{as_name}_type")),
            AssociationKind::ArrayManyToMany(_) => None,
        }
    }

    /// `<as>_id`, for polymorphic associations
    pub fn id_key(&self) -> Option<String> {
        match &self.kind {
            AssociationKind::PolymorphicOneToMany { as_name } => Some(format!("{as_name}_id")),
            AssociationKind::ArrayManyToMany(_) => None,
        }
    }

    /// Array field holding ids, for either array end
    pub fn in_key(&self) -> Option<&str> {
        match &self.kind {
            AssociationKind::ArrayManyToMany(ArrayEnd::Holder { in_key })
            | AssociationKind::ArrayManyToMany(ArrayEnd::Source { in_key, .. }) => Some(in_key),
            AssociationKind::PolymorphicOneToMany { .. } => None,
        }
    }

    /// Holder association on the target model, for the source end
    pub fn source(&self) -> Option<&str> {
        match &self.kind {
            AssociationKind::ArrayManyToMany(ArrayEnd::Source { source, .. }) => Some(source),
            _ => None,
        }
    }

    /// `(<as>_type, <as>_id)`, failing for any other kind
    ///
    /// # Errors
    ///
    /// Returns `AssociationKindMismatch` unless polymorphic.
    pub fn require_polymorphic_keys(&self) -> Result<(String, String)> {
        match (self.type_key(), self.id_key()) {
            (Some(type_key), Some(id_key)) => Ok((type_key, id_key)),
            _ => Err(self.mismatch(KIND_POLYMORPHIC)),
        }
    }

    /// Array field name, failing for a polymorphic association
    ///
    /// # Errors
    ///
    /// Returns `AssociationKindMismatch` unless an array end.
    pub fn require_in_key(&self) -> Result<String> {
        self.in_key()
            .map(str::to_string)
            .ok_or_else(|| self.mismatch(KIND_MANY_TO_MANY))
    }

    /// Reciprocal holder association name, failing unless the source end
    ///
    /// # Errors
    ///
    /// Returns `AssociationKindMismatch` unless the source end.
    pub fn require_source(&self) -> Result<&str> {
        self.source().ok_or_else(|| self.mismatch(KIND_MANY_TO_MANY))
    }

    fn mismatch(&self, expected: &'static str) -> DocRelError {
        DocRelError::AssociationKindMismatch {
            model: self.owner_model.clone(),
            association: self.name.clone(),
            expected,
        }
    }

    /// Whether saving the owner must flush this association's pending writes
    pub fn needs_post_save_hook(&self) -> bool {
        matches!(
            self.kind,
            AssociationKind::PolymorphicOneToMany { .. }
                | AssociationKind::ArrayManyToMany(ArrayEnd::Source { .. })
        )
    }
}

pub const KIND_POLYMORPHIC: &str = "polymorphic";
pub const KIND_MANY_TO_MANY: &str = "many_to_many";
pub const KIND_IN_ARRAY: &str = "in_array";

#[cfg(test)]
mod tests {
    use super::*;

    fn polymorphic() -> AssociationConfig {
        AssociationConfig {
            name: "comments".to_string(),
            owner_model: "Post".to_string(),
            target_model: "Comment".to_string(),
            kind: AssociationKind::PolymorphicOneToMany {
                as_name: "commentable".to_string(),
            },
            finder_options: FindOptions::default(),
        }
    }

    #[test]
    fn test_polymorphic_keys() {
        let config = polymorphic();
        assert_eq!(config.type_key().as_deref(), Some("commentable_type"));
        assert_eq!(config.id_key().as_deref(), Some("commentable_id"));
        assert_eq!(config.in_key(), None);
        assert!(config.needs_post_save_hook());
    }

    #[test]
    fn test_wrong_kind_keys_are_rejected() {
        let config = polymorphic();
        assert!(config.require_polymorphic_keys().is_ok());
        assert!(matches!(
            config.require_in_key(),
            Err(DocRelError::AssociationKindMismatch { expected: KIND_MANY_TO_MANY, .. })
        ));
        assert!(matches!(
            config.require_source(),
            Err(DocRelError::AssociationKindMismatch { ref association, .. }) if association == "comments"
        ));
    }

    #[test]
    fn test_holder_has_no_hook() {
        let config = AssociationConfig {
            name: "lists".to_string(),
            owner_model: "User".to_string(),
            target_model: "List".to_string(),
            kind: AssociationKind::ArrayManyToMany(ArrayEnd::Holder {
                in_key: "list_ids".to_string(),
            }),
            finder_options: FindOptions::default(),
        };
        assert_eq!(config.kind_name(), KIND_IN_ARRAY);
        assert_eq!(config.in_key(), Some("list_ids"));
        assert!(!config.needs_post_save_hook());
    }

    #[test]
    fn test_kind_serializes_tagged() {
        let json = serde_json::to_value(&polymorphic().kind).unwrap();
        assert_eq!(json["kind"], "polymorphic_one_to_many");
        assert_eq!(json["as_name"], "commentable");
    }
}
