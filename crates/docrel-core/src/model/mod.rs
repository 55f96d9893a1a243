pub mod document;

pub use document::{fields_from, DocRef, Document, Fields, ID_KEY};
