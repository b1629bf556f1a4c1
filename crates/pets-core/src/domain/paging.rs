//! Paged listing for `cat.getAll` and `owner.getAll`.

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Sort direction, serialised as `"ASC"` / `"DESC"`.  Lower-case spellings
/// are accepted on input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    #[serde(rename = "ASC", alias = "asc", alias = "Asc")]
    Asc,
    #[serde(rename = "DESC", alias = "desc", alias = "Desc")]
    Desc,
}

/// Which slice of a collection to return and how to order it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    /// Zero-based page index.
    pub page: u32,
    /// Page size; must be greater than zero.
    pub size: u32,
    /// Field name to sort by.  Unknown names fall back to `id`.
    #[serde(default = "default_sort_by")]
    pub sort_by: String,
    #[serde(default)]
    pub sort_dir: SortDirection,
}

fn default_sort_by() -> String {
    "id".to_string()
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page,
            size,
            sort_by: default_sort_by(),
            sort_dir: SortDirection::Asc,
        }
    }

    /// Builder-style sort override.
    pub fn sorted_by(mut self, field: impl Into<String>, dir: SortDirection) -> Self {
        self.sort_by = field.into();
        self.sort_dir = dir;
        self
    }

    /// # Errors
    ///
    /// Returns [`DomainError::Validation`] when `size` is zero.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.size == 0 {
            return Err(DomainError::validation("page size must be greater than zero"));
        }
        Ok(())
    }
}

/// One page of results plus totals for the whole collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_elements: u64,
    pub total_pages: u32,
}

impl<T> Page<T> {
    /// Cuts the requested page out of an already sorted collection.
    ///
    /// A page index past the end yields an empty `content` with correct
    /// totals.
    pub fn from_sorted(items: Vec<T>, request: &PageRequest) -> Self {
        let total = items.len();
        let size = request.size.max(1) as usize;
        let total_pages = total.div_ceil(size) as u32;
        let start = (request.page as usize).saturating_mul(size);
        let content: Vec<T> = items.into_iter().skip(start).take(size).collect();
        Self {
            content,
            page: request.page,
            size: request.size,
            total_elements: total as u64,
            total_pages,
        }
    }

    /// An empty page echoing the request.
    pub fn empty(request: &PageRequest) -> Self {
        Self {
            content: Vec::new(),
            page: request.page,
            size: request.size,
            total_elements: 0,
            total_pages: 0,
        }
    }

    /// Converts every element while keeping the totals.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_sorted_returns_requested_slice() {
        // Arrange
        let items: Vec<u32> = (0..10).collect();
        let req = PageRequest::new(1, 4);

        // Act
        let page = Page::from_sorted(items, &req);

        // Assert
        assert_eq!(page.content, vec![4, 5, 6, 7]);
        assert_eq!(page.total_elements, 10);
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn test_from_sorted_past_the_end_is_empty_with_totals() {
        let page = Page::from_sorted(vec![1, 2, 3], &PageRequest::new(5, 2));
        assert!(page.content.is_empty());
        assert_eq!(page.total_elements, 3);
        assert_eq!(page.total_pages, 2);
    }

    #[test]
    fn test_zero_size_is_rejected() {
        assert!(PageRequest::new(0, 0).validate().is_err());
    }

    #[test]
    fn test_sort_direction_accepts_lower_case() {
        let req: PageRequest =
            serde_json::from_str(r#"{"page":0,"size":5,"sortBy":"name","sortDir":"desc"}"#)
                .unwrap();
        assert_eq!(req.sort_dir, SortDirection::Desc);
        assert_eq!(req.sort_by, "name");
    }

    #[test]
    fn test_missing_sort_fields_default_to_id_ascending() {
        let req: PageRequest = serde_json::from_str(r#"{"page":0,"size":5}"#).unwrap();
        assert_eq!(req.sort_by, "id");
        assert_eq!(req.sort_dir, SortDirection::Asc);
    }
}
