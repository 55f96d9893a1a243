use docrel_core_types::DocId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::Fields;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn reversed(self) -> Self {
        match self {
            Direction::Asc => Direction::Desc,
            Direction::Desc => Direction::Asc,
        }
    }
}

/// One sort criterion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub direction: Direction,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }

    pub fn reversed(&self) -> Self {
        Self {
            field: self.field.clone(),
            direction: self.direction.reversed(),
        }
    }
}

/// Options accepted by every find, count, paginate and delete call
///
/// `conditions` is an equality filter keyed by field name, with `_id`
/// addressing the identity and `{"$in": [..]}` / `{"$ne": v}` operators.
/// `ids`, when set, further restricts matches to those identities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindOptions {
    #[serde(default)]
    pub conditions: Fields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<DocId>>,
    #[serde(default)]
    pub sort: Vec<SortKey>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub skip: usize,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or overwrite) an equality condition
    pub fn condition(mut self, key: impl Into<String>, value: Value) -> Self {
        self.conditions.insert(key.into(), value);
        self
    }

    /// Restrict matches to these identities (in addition to conditions)
    pub fn only_ids(mut self, ids: Vec<DocId>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Append a sort criterion
    pub fn sort(mut self, key: SortKey) -> Self {
        self.sort.push(key);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    /// Merge caller options over these defaults
    ///
    /// Caller conditions win on conflicting keys. A non-empty caller sort
    /// replaces the default sort. Caller limit and skip override when set.
    pub fn merged_with(&self, caller: &FindOptions) -> FindOptions {
        let mut merged = self.clone();
        for (key, value) in &caller.conditions {
            merged.conditions.insert(key.clone(), value.clone());
        }
        if caller.ids.is_some() {
            merged.ids = caller.ids.clone();
        }
        if !caller.sort.is_empty() {
            merged.sort = caller.sort.clone();
        }
        if caller.limit.is_some() {
            merged.limit = caller.limit;
        }
        if caller.skip > 0 {
            merged.skip = caller.skip;
        }
        merged
    }

    /// Apply a relation filter on top of everything else
    pub fn scoped(mut self, scope: Fields) -> FindOptions {
        for (key, value) in scope {
            self.conditions.insert(key, value);
        }
        self
    }

    /// Same filter and sort, without limit or skip
    pub fn unbounded(&self) -> FindOptions {
        FindOptions {
            conditions: self.conditions.clone(),
            ids: self.ids.clone(),
            sort: self.sort.clone(),
            limit: None,
            skip: 0,
        }
    }
}
