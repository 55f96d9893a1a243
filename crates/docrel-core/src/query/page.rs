use serde::{Deserialize, Serialize};

/// Page request (1-based page number)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: usize,
    pub per_page: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 25,
        }
    }
}

impl Pagination {
    pub fn new(page: usize, per_page: usize) -> Self {
        Self { page, per_page }
    }

    /// Page number clamped to at least 1
    pub fn current_page(&self) -> usize {
        self.page.max(1)
    }

    /// Page size clamped to at least 1
    pub fn page_size(&self) -> usize {
        self.per_page.max(1)
    }

    /// Number of documents to skip to reach this page, saturating
    pub fn offset(&self) -> usize {
        (self.current_page() - 1).saturating_mul(self.page_size())
    }

    pub fn total_pages(&self, total_entries: usize) -> usize {
        total_entries.div_ceil(self.page_size())
    }
}

/// One page of results plus totals for the whole filtered set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_entries: usize,
    pub total_pages: usize,
    pub current_page: usize,
    pub per_page: usize,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_entries: usize, pagination: Pagination) -> Self {
        Self {
            items,
            total_entries,
            total_pages: pagination.total_pages(total_entries),
            current_page: pagination.current_page(),
            per_page: pagination.page_size(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total_entries: self.total_entries,
            total_pages: self.total_pages,
            current_page: self.current_page,
            per_page: self.per_page,
        }
    }
}
