//! Select query descriptors.
//!
//! A `SelectQuery` names a source table, a projection and an optional
//! predicate, plus ordering and paging. Its `(table, projection)` pair is the
//! query's *shape*: queries of equal shape produce rows of the same layout.

use std::cmp::Ordering;
use std::fmt;

use super::predicate::Predicate;
use crate::types::{ChangeRecord, ChangeType, Row};

/// Which columns a query returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// Every column of the table.
    All,
    /// The named columns, in this order.
    Columns(Vec<String>),
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "*"),
            Self::Columns(columns) => write!(f, "{}", columns.join(", ")),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Ascending,
    Descending,
}

/// The layout of a query's output: source table plus projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryShape {
    pub table: String,
    pub projection: Projection,
}

impl fmt::Display for QueryShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT {} FROM {}", self.projection, self.table)
    }
}

/// A query against one table.
#[derive(Debug, Clone)]
pub struct SelectQuery {
    shape: QueryShape,
    predicate: Option<Predicate>,
    order_by: Vec<(String, Order)>,
    skip: Option<usize>,
    limit: Option<usize>,
}

impl SelectQuery {
    /// Select every column of `table`.
    #[must_use]
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            shape: QueryShape {
                table: table.into(),
                projection: Projection::All,
            },
            predicate: None,
            order_by: Vec::new(),
            skip: None,
            limit: None,
        }
    }

    /// Restrict the output to the named columns.
    #[must_use]
    pub fn columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.shape.projection = Projection::Columns(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Filter rows. `None` keeps every row, matching an empty description.
    #[must_use]
    pub fn filter(mut self, predicate: Option<Predicate>) -> Self {
        self.predicate = predicate;
        self
    }

    /// Shorthand for `filter(Some(predicate))`.
    #[must_use]
    pub fn where_(self, predicate: Predicate) -> Self {
        self.filter(Some(predicate))
    }

    /// Append a sort key. Earlier keys take precedence.
    #[must_use]
    pub fn order_by(mut self, column: impl Into<String>, order: Order) -> Self {
        self.order_by.push((column.into(), order));
        self
    }

    #[must_use]
    pub const fn skip(mut self, count: usize) -> Self {
        self.skip = Some(count);
        self
    }

    #[must_use]
    pub const fn limit(mut self, count: usize) -> Self {
        self.limit = Some(count);
        self
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.shape.table
    }

    #[must_use]
    pub const fn shape(&self) -> &QueryShape {
        &self.shape
    }

    #[must_use]
    pub const fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }

    /// Check whether a row passes the filter.
    #[must_use]
    pub fn selects(&self, row: &Row) -> bool {
        self.predicate.as_ref().is_none_or(|p| p.eval(row))
    }

    /// Filter, sort, page and project a table's rows.
    ///
    /// Sorting is stable, so rows with equal keys keep table order.
    #[must_use]
    pub fn apply<'a>(&self, rows: impl IntoIterator<Item = &'a Row>) -> Vec<Row> {
        let mut selected: Vec<&Row> = rows.into_iter().filter(|r| self.selects(r)).collect();

        if !self.order_by.is_empty() {
            selected.sort_by(|a, b| self.compare_rows(a, b));
        }

        let skip = self.skip.unwrap_or(0);
        let limit = self.limit.unwrap_or(usize::MAX);
        selected
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|row| self.project(row))
            .collect()
    }

    fn compare_rows(&self, a: &Row, b: &Row) -> Ordering {
        for (column, order) in &self.order_by {
            let ordering = a.get(column).sort_cmp(b.get(column));
            let ordering = match order {
                Order::Ascending => ordering,
                Order::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    fn project(&self, row: &Row) -> Row {
        match &self.shape.projection {
            Projection::All => row.clone(),
            Projection::Columns(columns) => row.project(columns),
        }
    }

    /// Decide whether a change can alter this query's output.
    ///
    /// A change matters when one of its row images passes the filter. An
    /// update that keeps a row inside the filter only matters if a projected
    /// value or a sort key changed. Paged queries treat every passing change
    /// as relevant, since any of them can shift the window.
    #[must_use]
    pub fn affected_by(&self, change: &ChangeRecord) -> bool {
        let before = change.before.as_ref().filter(|r| self.selects(r));
        let after = change.after.as_ref().filter(|r| self.selects(r));

        match (change.change_type, before, after) {
            (_, None, None) => false,
            (ChangeType::Update, Some(before), Some(after))
                if self.skip.is_none() && self.limit.is_none() =>
            {
                self.project(before) != self.project(after)
                    || self
                        .order_by
                        .iter()
                        .any(|(column, _)| before.get(column) != after.get(column))
            }
            _ => true,
        }
    }
}

impl fmt::Display for SelectQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.shape)?;
        if let Some(predicate) = &self.predicate {
            write!(f, " WHERE {predicate}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::{ColumnResolver, TableSchema};
    use crate::types::ValueType;

    fn schema() -> TableSchema {
        TableSchema::new("T")
            .with_column("id", ValueType::Number)
            .with_column("name", ValueType::String)
    }

    fn rows() -> Vec<Row> {
        (0..10)
            .map(|i| Row::new().with("id", i).with("name", format!("name:{}", i % 3)))
            .collect()
    }

    #[test]
    fn test_apply_filters_and_projects() {
        let id = schema().column("id").expect("id");
        let query = SelectQuery::from("T").columns(["id"]).where_(id.gte(7));
        let out = query.apply(&rows());
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|r| !r.contains("name")));
        assert_eq!(out[0].get("id").as_number(), Some(7.0));
    }

    #[test]
    fn test_apply_orders_skips_and_limits() {
        let query = SelectQuery::from("T")
            .order_by("name", Order::Descending)
            .order_by("id", Order::Ascending)
            .skip(1)
            .limit(3);
        let out = query.apply(&rows());
        let ids: Vec<f64> = out.iter().filter_map(|r| r.get("id").as_number()).collect();
        // name:2 rows are 2, 5, 8; then name:1 rows start at 1.
        assert_eq!(ids, vec![5.0, 8.0, 1.0]);
    }

    #[test]
    fn test_shape_equality_ignores_predicate() {
        let id = schema().column("id").expect("id");
        let a = SelectQuery::from("T").where_(id.lt(5));
        let b = SelectQuery::from("T").where_(id.gte(5));
        let c = SelectQuery::from("T").columns(["id"]);
        assert_eq!(a.shape(), b.shape());
        assert_ne!(a.shape(), c.shape());
        assert_eq!(c.shape().to_string(), "SELECT id FROM T");
    }

    #[test]
    fn test_affected_by() {
        let id = schema().column("id").expect("id");
        let query = SelectQuery::from("T").columns(["id"]).where_(id.lt(5));

        let inside = Row::new().with("id", 1).with("name", "a");
        let outside = Row::new().with("id", 9).with("name", "a");
        let renamed = Row::new().with("id", 1).with("name", "b");
        let moved = Row::new().with("id", 2).with("name", "a");

        assert!(query.affected_by(&ChangeRecord::insert(inside.clone())));
        assert!(!query.affected_by(&ChangeRecord::insert(outside.clone())));
        assert!(query.affected_by(&ChangeRecord::delete(inside.clone())));
        // Only an unprojected column changed.
        assert!(!query.affected_by(&ChangeRecord::update(inside.clone(), renamed)));
        assert!(query.affected_by(&ChangeRecord::update(inside.clone(), moved)));
        // Row leaves the filtered set.
        assert!(query.affected_by(&ChangeRecord::update(inside, outside)));
    }

    #[test]
    fn test_sort_key_change_is_relevant() {
        let query = SelectQuery::from("T")
            .columns(["id"])
            .order_by("name", Order::Ascending);
        let before = Row::new().with("id", 1).with("name", "a");
        let resorted = Row::new().with("id", 1).with("name", "z");
        assert!(query.affected_by(&ChangeRecord::update(before.clone(), resorted)));

        let unsorted = SelectQuery::from("T").columns(["id"]);
        let after = Row::new().with("id", 1).with("name", "z");
        assert!(!unsorted.affected_by(&ChangeRecord::update(before, after)));
    }

    #[test]
    fn test_paged_query_sees_every_matching_update() {
        let query = SelectQuery::from("T").columns(["id"]).limit(2);
        let before = Row::new().with("id", 1).with("name", "a");
        let after = Row::new().with("id", 1).with("name", "b");
        assert!(query.affected_by(&ChangeRecord::update(before, after)));
    }
}
