//! Find options, condition matching and result shapes shared by the store,
//! the session finder and the association proxies.

pub mod matcher;
pub mod options;
pub mod page;
pub mod selector;

pub use matcher::{compare_values, matches, matches_options};
pub use options::{Direction, FindOptions, SortKey};
pub use page::{Page, Pagination};
pub use selector::{Found, Selector};
