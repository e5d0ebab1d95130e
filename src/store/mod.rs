// Query operations, grouped per area as trait extensions on `Database`.

pub mod admins;
pub mod analytics;
pub mod conversations;
pub mod users;

pub use admins::AdminStore;
pub use analytics::{AnalyticsStore, DatabaseStats, TopUser};
pub use conversations::{ConversationExportRow, ConversationFilter, ConversationStore};
pub use users::UserStore;

use serde_json::{json, Value};

/// One page of an ordered, filtered result set.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total_items: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: i64, per_page: i64, total_items: i64) -> Self {
        let total_pages = if total_items == 0 {
            0
        } else {
            (total_items + per_page - 1) / per_page
        };
        Page {
            items,
            page,
            per_page,
            total_items,
            total_pages,
        }
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn pagination_json(&self) -> Value {
        json!({
            "page": self.page,
            "per_page": self.per_page,
            "total_items": self.total_items,
            "total_pages": self.total_pages,
            "has_next": self.has_next(),
            "has_prev": self.has_prev(),
        })
    }
}

/// Clamp a requested page number and compute the row offset.
pub(crate) fn page_offset(page: i64, per_page: i64) -> (i64, i64) {
    let page = page.max(1);
    (page, (page - 1) * per_page)
}

#[cfg(test)]
pub(crate) mod testutil {
    use crate::database::Database;
    use tempfile::TempDir;

    pub fn test_db() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let db = Database::open(&dir.path().join("test.db")).unwrap();
        (dir, db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_math() {
        let page: Page<i32> = Page::new(vec![1, 2, 3], 1, 3, 7);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next());
        assert!(!page.has_prev());

        let last: Page<i32> = Page::new(vec![7], 3, 3, 7);
        assert!(!last.has_next());
        assert!(last.has_prev());

        let empty: Page<i32> = Page::new(vec![], 1, 20, 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next());
    }

    #[test]
    fn page_offset_clamps() {
        assert_eq!(page_offset(0, 20), (1, 0));
        assert_eq!(page_offset(-3, 20), (1, 0));
        assert_eq!(page_offset(3, 20), (3, 40));
    }
}
