//! Query options, match operators and result shapes.

use crate::types::Resource;
use serde::{Deserialize, Serialize};

/// Iteration direction over a store or index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Ascending key order.
    #[default]
    Asc,
    /// Descending key order.
    Desc,
}

/// Match operator for indexed queries.
///
/// All comparisons are case-insensitive and run against the textual value
/// extracted by the index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// First record whose index value equals the search.
    #[default]
    Equals,
    /// All records whose index value equals the search.
    EqualsMany,
    /// All records whose index value contains the search.
    Includes,
    /// All records whose index value differs from the search.
    NotEquals,
    /// All records whose index value does not contain the search.
    NotIncludes,
}

impl Operator {
    /// Returns true if this operator yields a single record.
    #[must_use]
    pub fn is_single(self) -> bool {
        matches!(self, Operator::Equals)
    }

    /// Tests an index value against the search text.
    ///
    /// Both arguments must already be lowercased.
    #[must_use]
    pub fn matches(self, candidate: &str, search: &str) -> bool {
        match self {
            Operator::Equals | Operator::EqualsMany => candidate == search,
            Operator::Includes => candidate.contains(search),
            Operator::NotEquals => candidate != search,
            Operator::NotIncludes => !candidate.contains(search),
        }
    }
}

/// Pagination and ordering for scans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CursorOptions {
    /// Iteration direction.
    pub direction: Direction,
    /// Maximum number of results. `None` (or zero) means no cap.
    pub limit: Option<usize>,
    /// Number of matches skipped before collecting.
    pub offset: usize,
}

impl CursorOptions {
    /// Creates options with no cap, no offset, ascending.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the direction.
    #[must_use]
    pub const fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Sets the result cap.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the number of skipped matches.
    #[must_use]
    pub const fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Returns the effective cap, treating zero as "no cap".
    #[must_use]
    pub fn effective_limit(&self) -> Option<usize> {
        self.limit.filter(|limit| *limit > 0)
    }

    /// Applies direction, offset and limit to an ascending sequence.
    pub fn paginate<T>(&self, mut items: Vec<T>) -> Vec<T> {
        if self.direction == Direction::Desc {
            items.reverse();
        }
        let limit = self.effective_limit().unwrap_or(usize::MAX);
        items.into_iter().skip(self.offset).take(limit).collect()
    }
}

/// Options for an indexed query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Match operator. Connections default to [`Operator::Equals`].
    pub operator: Option<Operator>,
    /// Iteration direction.
    pub direction: Direction,
    /// Maximum number of results.
    pub limit: Option<usize>,
    /// Number of matches skipped before collecting.
    pub offset: usize,
}

impl SearchOptions {
    /// Creates empty search options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the match operator.
    #[must_use]
    pub const fn operator(mut self, operator: Operator) -> Self {
        self.operator = Some(operator);
        self
    }

    /// Sets the direction.
    #[must_use]
    pub const fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Sets the result cap.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the number of skipped matches.
    #[must_use]
    pub const fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Returns the operator, falling back to [`Operator::Equals`].
    #[must_use]
    pub fn operator_or_default(&self) -> Operator {
        self.operator.unwrap_or_default()
    }

    /// Returns the pagination part of these options.
    #[must_use]
    pub fn cursor(&self) -> CursorOptions {
        CursorOptions {
            direction: self.direction,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// Result of an indexed query.
///
/// [`Operator::Equals`] produces `Single`; every other operator produces
/// `Many`.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// At most one record.
    Single(Option<Resource>),
    /// Zero or more records.
    Many(Vec<Resource>),
}

impl QueryResult {
    /// Builds the result shape for `operator` from paginated matches.
    #[must_use]
    pub fn shaped(operator: Operator, records: Vec<Resource>) -> Self {
        if operator.is_single() {
            QueryResult::Single(records.into_iter().next())
        } else {
            QueryResult::Many(records)
        }
    }

    /// The empty result for `operator`.
    #[must_use]
    pub fn empty(operator: Operator) -> Self {
        Self::shaped(operator, Vec::new())
    }

    /// Returns the first record.
    #[must_use]
    pub fn into_single(self) -> Option<Resource> {
        match self {
            QueryResult::Single(record) => record,
            QueryResult::Many(records) => records.into_iter().next(),
        }
    }

    /// Returns all records.
    #[must_use]
    pub fn into_many(self) -> Vec<Resource> {
        match self {
            QueryResult::Single(record) => record.into_iter().collect(),
            QueryResult::Many(records) => records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operators_match_lowercased_text() {
        assert!(Operator::Equals.matches("alice", "alice"));
        assert!(!Operator::Equals.matches("alicia", "alice"));
        assert!(Operator::Includes.matches("alicia", "ali"));
        assert!(Operator::NotEquals.matches("bob", "alice"));
        assert!(Operator::NotIncludes.matches("bob", "ali"));
        assert!(!Operator::NotIncludes.matches("alice", "ali"));
    }

    #[test]
    fn paginate_offset_then_limit() {
        let options = CursorOptions::new().offset(1).limit(2);
        assert_eq!(options.paginate(vec![1, 2, 3, 4]), vec![2, 3]);
    }

    #[test]
    fn paginate_descending() {
        let options = CursorOptions::new().direction(Direction::Desc).limit(2);
        assert_eq!(options.paginate(vec![1, 2, 3]), vec![3, 2]);
    }

    #[test]
    fn zero_limit_means_no_cap() {
        let options = CursorOptions::new().limit(0);
        assert_eq!(options.paginate(vec![1, 2, 3]), vec![1, 2, 3]);
    }

    #[test]
    fn search_options_deserialize_snake_case() {
        let options: SearchOptions =
            serde_json::from_str(r#"{"operator":"equals_many","limit":5}"#).unwrap();
        assert_eq!(options.operator, Some(Operator::EqualsMany));
        assert_eq!(options.limit, Some(5));
        assert_eq!(options.offset, 0);
        assert_eq!(options.direction, Direction::Asc);
    }

    #[test]
    fn equals_shapes_single() {
        let result = QueryResult::empty(Operator::Equals);
        assert_eq!(result, QueryResult::Single(None));
        let result = QueryResult::empty(Operator::Includes);
        assert_eq!(result, QueryResult::Many(Vec::new()));
    }
}
