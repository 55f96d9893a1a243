use docrel_core_types::DocId;

use crate::model::DocRef;

/// What a finder call should return
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// One document by identity
    Id(DocId),
    /// Several documents by identity, in store order
    Ids(Vec<DocId>),
    /// First document under the effective sort
    First,
    /// Last document under the effective sort
    Last,
    /// Every matching document
    All,
}

impl Selector {
    pub fn returns_many(&self) -> bool {
        matches!(self, Selector::Ids(_) | Selector::All)
    }
}

impl From<DocId> for Selector {
    fn from(id: DocId) -> Self {
        Selector::Id(id)
    }
}

impl From<Vec<DocId>> for Selector {
    fn from(ids: Vec<DocId>) -> Self {
        Selector::Ids(ids)
    }
}

/// Finder result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Found {
    One(Option<DocRef>),
    Many(Vec<DocRef>),
}

impl Found {
    /// Single result; the first element of a many-result
    pub fn one(self) -> Option<DocRef> {
        match self {
            Found::One(doc) => doc,
            Found::Many(docs) => docs.into_iter().next(),
        }
    }

    /// Results as a list; a missing single result is an empty list
    pub fn many(self) -> Vec<DocRef> {
        match self {
            Found::One(doc) => doc.into_iter().collect(),
            Found::Many(docs) => docs,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Found::One(doc) => doc.is_none(),
            Found::Many(docs) => docs.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_found_conversions() {
        assert_eq!(Found::One(None).many(), Vec::<DocRef>::new());
        assert_eq!(Found::Many(vec![DocRef(3), DocRef(4)]).one(), Some(DocRef(3)));
        assert!(Found::Many(Vec::new()).is_empty());
    }

    #[test]
    fn test_selector_arity() {
        assert!(Selector::All.returns_many());
        assert!(!Selector::First.returns_many());
        assert!(Selector::from(vec![DocId::from("a")]).returns_many());
    }
}
