//! Statement Executor - the seam between the engine and the backing store
//!
//! Queries carry their text and positionally bound parameters separately;
//! values never get spliced into SQL text.

use async_trait::async_trait;

use crate::error::MigrateResult;

/// A SQL statement with positionally bound text parameters (`$1`, `$2`, ...)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    text: String,
    params: Vec<String>,
}

impl Query {
    /// A statement without parameters. It is sent unprepared, so the text may
    /// hold several SQL commands.
    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Vec::new(),
        }
    }

    /// A prepared statement with bound values
    pub fn bound<I, S>(text: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            text: text.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn has_params(&self) -> bool {
        !self.params.is_empty()
    }
}

/// Ordered statements executed as one atomic unit
#[derive(Debug, Clone, Default)]
pub struct Batch {
    queries: Vec<Query>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, query: Query) {
        self.queries.push(query);
    }

    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Query> {
        self.queries.iter()
    }
}

impl Extend<Query> for Batch {
    fn extend<T: IntoIterator<Item = Query>>(&mut self, iter: T) {
        self.queries.extend(iter);
    }
}

impl FromIterator<Query> for Batch {
    fn from_iter<T: IntoIterator<Item = Query>>(iter: T) -> Self {
        Self {
            queries: iter.into_iter().collect(),
        }
    }
}

/// Runs queries against the backing store
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    /// Run a read query and return its first column as text, one value per row
    async fn fetch_column(&self, query: &Query) -> MigrateResult<Vec<String>>;

    /// Run every query of the batch inside a single transaction.
    ///
    /// Either the whole batch commits or nothing does.
    async fn execute_batch(&self, batch: &Batch) -> MigrateResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bound_query_keeps_values_out_of_text() {
        let query = Query::bound("DELETE FROM t WHERE version = $1", ["20200101000000"]);
        assert_eq!(query.text(), "DELETE FROM t WHERE version = $1");
        assert_eq!(query.params(), ["20200101000000".to_string()]);
        assert!(query.has_params());
        assert!(!Query::raw("SELECT 1").has_params());
    }

    #[test]
    fn test_batch_preserves_order() {
        let mut batch: Batch = vec![Query::raw("a"), Query::raw("b")].into_iter().collect();
        batch.push(Query::raw("c"));
        batch.extend([Query::raw("d")]);
        let texts: Vec<_> = batch.iter().map(Query::text).collect();
        assert_eq!(texts, ["a", "b", "c", "d"]);
        assert_eq!(batch.len(), 4);
    }
}
