use crate::error::SqlError;

/// A dynamically-typed SQL parameter value.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Integer(i64),
    Text(String),
}

/// A row returned from a SQL query — column name to value.
#[derive(Debug, Clone)]
pub struct Row {
    pub columns: Vec<(String, Value)>,
}

impl Row {
    /// Get a column value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Get a text column value by name.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(Value::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Get an integer column value by name.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(Value::Integer(i)) => Some(*i),
            _ => None,
        }
    }
}

/// SqlStore provides a SQL execution interface backed by an embedded database.
///
/// Writes to a single row are atomic. There is no multi-statement
/// transaction in this interface; callers that need read-modify-write
/// consistency guard their UPDATEs with a predicate (e.g. a version
/// column) and inspect the affected-row count returned by [`SqlStore::exec`].
pub trait SqlStore: Send + Sync {
    /// Execute a query and return rows.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SqlError>;

    /// Execute a statement (INSERT/UPDATE/DELETE) and return affected row count.
    ///
    /// A guarded UPDATE that matched no rows returns 0 — that is the signal
    /// a conditional write lost its race (or the row is gone).
    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SqlError>;

    /// Execute a batch of DDL/setup statements without parameters.
    fn exec_batch(&self, statements: &[&str]) -> Result<(), SqlError> {
        for stmt in statements {
            self.exec(stmt, &[])?;
        }
        Ok(())
    }
}
