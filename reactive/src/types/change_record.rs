//! Change notification types.
//!
//! Provides `ChangeType`, `ChangeRecord`, and `ChangeNotification` for tracking
//! row modifications.

use super::Row;

// =============================================================================
// Change Notification Types
// =============================================================================

/// Type of change to a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    /// A new row was inserted.
    Insert,
    /// An existing row was modified.
    Update,
    /// A row was removed.
    Delete,
}

/// A record of a single row change.
///
/// Inserts carry only `after`, deletes only `before`, updates both.
#[derive(Debug, Clone)]
pub struct ChangeRecord {
    /// The type of change.
    pub change_type: ChangeType,
    /// The row image before the change.
    pub before: Option<Row>,
    /// The row image after the change.
    pub after: Option<Row>,
}

impl ChangeRecord {
    #[must_use]
    pub const fn insert(row: Row) -> Self {
        Self {
            change_type: ChangeType::Insert,
            before: None,
            after: Some(row),
        }
    }

    #[must_use]
    pub const fn update(before: Row, after: Row) -> Self {
        Self {
            change_type: ChangeType::Update,
            before: Some(before),
            after: Some(after),
        }
    }

    #[must_use]
    pub const fn delete(row: Row) -> Self {
        Self {
            change_type: ChangeType::Delete,
            before: Some(row),
            after: None,
        }
    }

    /// Iterate over the row images this change touches.
    pub fn images(&self) -> impl Iterator<Item = &Row> {
        self.before.iter().chain(self.after.iter())
    }
}

/// Notification of changes, broadcast to all change feeds.
///
/// One notification is sent per mutating call on a table. Feeds filter it
/// down to the queries they observe.
#[derive(Debug, Clone)]
pub struct ChangeNotification {
    /// The table the changes were applied to.
    pub table: String,
    /// The changes applied by this call.
    pub changes: Vec<ChangeRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_images_of_insert() {
        let change = ChangeRecord::insert(Row::new().with("a", 1));
        assert_eq!(change.change_type, ChangeType::Insert);
        assert_eq!(change.images().count(), 1);
    }

    #[test]
    fn test_images_of_update_yield_before_then_after() {
        let change = ChangeRecord::update(Row::new().with("a", 1), Row::new().with("a", 2));
        let images: Vec<&Row> = change.images().collect();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].get("a").as_number(), Some(1.0));
        assert_eq!(images[1].get("a").as_number(), Some(2.0));
    }

    #[test]
    fn test_images_of_delete() {
        let change = ChangeRecord::delete(Row::new());
        assert_eq!(change.change_type, ChangeType::Delete);
        assert!(change.after.is_none());
        assert_eq!(change.images().count(), 1);
    }
}
