pub mod block;
pub mod occupancy;
pub mod room;
pub mod schema;
pub mod student;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use dorm_core::{ListResult, ServiceError, merge_patch, now_rfc3339};
use dorm_sql::{SqlStore, Value};

use crate::model::GenderPolicy;

/// Bound on read-validate-write cycles before a room mutation gives up
/// with [`HousingError::Contention`].
pub(crate) const WRITE_ATTEMPTS: usize = 3;

/// Housing service error type.
///
/// NotFound and the occupancy conflicts are deterministic business
/// outcomes; `Contention` is the only transient kind and the only one a
/// caller may sensibly retry.
#[derive(Debug, Error)]
pub enum HousingError {
    #[error("room '{0}' not found")]
    RoomNotFound(String),

    #[error("student '{0}' not found")]
    StudentNotFound(String),

    #[error("block '{0}' not found")]
    BlockNotFound(String),

    #[error("student '{student}' is not an occupant of room '{room}'")]
    OccupantNotInRoom { room: String, student: String },

    #[error("student '{student}' is already assigned to room '{room}'")]
    AlreadyAssigned { student: String, room: String },

    #[error("room '{room}' is already at capacity ({capacity})")]
    RoomFull { room: String, capacity: u32 },

    #[error("room '{room}' only admits {policy} students")]
    GenderMismatch { room: String, policy: GenderPolicy },

    #[error("cannot set capacity of room '{room}' to {requested}: {occupants} occupants currently assigned")]
    CapacityBelowOccupancy {
        room: String,
        requested: u32,
        occupants: usize,
    },

    #[error("room '{0}' is being modified concurrently, try again")]
    Contention(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Storage(String),

    #[error("{0}")]
    Internal(String),
}

impl From<HousingError> for ServiceError {
    fn from(e: HousingError) -> Self {
        let msg = e.to_string();
        match e {
            HousingError::RoomNotFound(_)
            | HousingError::StudentNotFound(_)
            | HousingError::BlockNotFound(_)
            | HousingError::OccupantNotInRoom { .. } => ServiceError::NotFound(msg),
            HousingError::AlreadyAssigned { .. }
            | HousingError::RoomFull { .. }
            | HousingError::GenderMismatch { .. }
            | HousingError::CapacityBelowOccupancy { .. }
            | HousingError::Conflict(_) => ServiceError::Conflict(msg),
            HousingError::Contention(_) => ServiceError::Contention(msg),
            HousingError::Validation(_) => ServiceError::Validation(msg),
            HousingError::Storage(_) => ServiceError::Storage(msg),
            HousingError::Internal(_) => ServiceError::Internal(msg),
        }
    }
}

/// Map a missing row in `table` to the entity-specific NotFound kind.
fn not_found(table: &str, id: &str) -> HousingError {
    match table {
        "rooms" => HousingError::RoomNotFound(id.to_string()),
        "students" => HousingError::StudentNotFound(id.to_string()),
        "blocks" => HousingError::BlockNotFound(id.to_string()),
        _ => HousingError::Internal(format!("unknown table {}/{}", table, id)),
    }
}

/// The housing service. Holds the storage backend and business logic.
pub struct HousingService {
    pub(crate) sql: Arc<dyn SqlStore>,
}

impl HousingService {
    /// Create a new HousingService, initializing the DB schema.
    pub fn new(sql: Arc<dyn SqlStore>) -> Result<Arc<Self>, HousingError> {
        schema::init_schema(sql.as_ref())?;
        Ok(Arc::new(Self { sql }))
    }

    // ── Generic CRUD helpers ──

    /// Insert a record as JSON into a table with indexed columns.
    pub(crate) fn insert_record<T: Serialize>(
        &self,
        table: &str,
        id: &str,
        record: &T,
        indexes: &[(&str, Value)],
    ) -> Result<(), HousingError> {
        let json = serde_json::to_string(record)
            .map_err(|e| HousingError::Internal(e.to_string()))?;

        let mut cols = vec!["id", "data"];
        let mut placeholders = vec!["?1".to_string(), "?2".to_string()];
        let mut params = vec![Value::Text(id.to_string()), Value::Text(json)];

        for (i, (col, val)) in indexes.iter().enumerate() {
            let idx = i + 3;
            cols.push(col);
            placeholders.push(format!("?{}", idx));
            params.push(val.clone());
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            cols.join(", "),
            placeholders.join(", "),
        );

        self.sql.exec(&sql, &params).map_err(|e| {
            let msg = e.to_string();
            if msg.contains("UNIQUE constraint") {
                HousingError::Conflict(msg)
            } else {
                HousingError::Storage(msg)
            }
        })?;

        Ok(())
    }

    /// Get a record by id, deserializing the JSON `data` column.
    pub(crate) fn get_record<T: DeserializeOwned>(
        &self,
        table: &str,
        id: &str,
    ) -> Result<T, HousingError> {
        let sql = format!("SELECT data FROM {} WHERE id = ?1", table);
        let rows = self.sql
            .query(&sql, &[Value::Text(id.to_string())])
            .map_err(|e| HousingError::Storage(e.to_string()))?;
        let row = rows
            .first()
            .ok_or_else(|| not_found(table, id))?;
        let data = row
            .get_str("data")
            .ok_or_else(|| HousingError::Internal("missing data column".into()))?;
        serde_json::from_str(data).map_err(|e| HousingError::Internal(e.to_string()))
    }

    /// Update a record's JSON data and indexed columns.
    pub(crate) fn update_record<T: Serialize>(
        &self,
        table: &str,
        id: &str,
        record: &T,
        indexes: &[(&str, Value)],
    ) -> Result<(), HousingError> {
        let json = serde_json::to_string(record)
            .map_err(|e| HousingError::Internal(e.to_string()))?;

        let mut sets = vec!["data = ?1".to_string()];
        let mut params: Vec<Value> = vec![Value::Text(json)];

        for (i, (col, val)) in indexes.iter().enumerate() {
            let idx = i + 2;
            sets.push(format!("{} = ?{}", col, idx));
            params.push(val.clone());
        }

        let id_idx = params.len() + 1;
        params.push(Value::Text(id.to_string()));

        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            table,
            sets.join(", "),
            id_idx,
        );

        let affected = self.sql.exec(&sql, &params).map_err(|e| {
            let msg = e.to_string();
            if msg.contains("UNIQUE constraint") {
                HousingError::Conflict(msg)
            } else {
                HousingError::Storage(msg)
            }
        })?;

        if affected == 0 {
            return Err(not_found(table, id));
        }

        Ok(())
    }

    /// Delete a record by id.
    pub(crate) fn delete_record(&self, table: &str, id: &str) -> Result<(), HousingError> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", table);
        let affected = self.sql
            .exec(&sql, &[Value::Text(id.to_string())])
            .map_err(|e| HousingError::Storage(e.to_string()))?;
        if affected == 0 {
            return Err(not_found(table, id));
        }
        Ok(())
    }

    /// List records with optional filters, pagination, and total count.
    pub(crate) fn list_records<T: DeserializeOwned + Serialize>(
        &self,
        table: &str,
        filters: &[(&str, Value)],
        limit: usize,
        offset: usize,
    ) -> Result<ListResult<T>, HousingError> {
        let mut where_clauses = Vec::new();
        let mut params = Vec::new();

        for (i, (col, val)) in filters.iter().enumerate() {
            let idx = i + 1;
            where_clauses.push(format!("{} = ?{}", col, idx));
            params.push(val.clone());
        }

        let where_sql = if where_clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", where_clauses.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) as cnt FROM {}{}", table, where_sql);
        let count_rows = self.sql
            .query(&count_sql, &params)
            .map_err(|e| HousingError::Storage(e.to_string()))?;
        let total = count_rows
            .first()
            .and_then(|r| r.get_i64("cnt"))
            .unwrap_or(0) as usize;

        let limit_idx = params.len() + 1;
        let offset_idx = params.len() + 2;
        params.push(Value::Integer(limit as i64));
        params.push(Value::Integer(offset as i64));

        let sql = format!(
            "SELECT data FROM {}{} ORDER BY created_at DESC LIMIT ?{} OFFSET ?{}",
            table, where_sql, limit_idx, offset_idx,
        );

        let rows = self.sql
            .query(&sql, &params)
            .map_err(|e| HousingError::Storage(e.to_string()))?;

        let mut items = Vec::new();
        for row in &rows {
            let data = row
                .get_str("data")
                .ok_or_else(|| HousingError::Internal("missing data column".into()))?;
            let item: T =
                serde_json::from_str(data).map_err(|e| HousingError::Internal(e.to_string()))?;
            items.push(item);
        }

        Ok(ListResult { items, total })
    }

    /// Count records with optional filters.
    pub(crate) fn count_records(
        &self,
        table: &str,
        filters: &[(&str, Value)],
    ) -> Result<i64, HousingError> {
        let mut where_clauses = Vec::new();
        let mut params = Vec::new();

        for (i, (col, val)) in filters.iter().enumerate() {
            let idx = i + 1;
            where_clauses.push(format!("{} = ?{}", col, idx));
            params.push(val.clone());
        }

        let where_sql = if where_clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", where_clauses.join(" AND "))
        };

        let sql = format!("SELECT COUNT(*) as cnt FROM {}{}", table, where_sql);
        let rows = self.sql
            .query(&sql, &params)
            .map_err(|e| HousingError::Storage(e.to_string()))?;

        Ok(rows.first().and_then(|r| r.get_i64("cnt")).unwrap_or(0))
    }

    /// Apply a JSON merge-patch to a record, stripping protected fields
    /// and stamping `updated_at`.
    pub(crate) fn apply_patch<T: Serialize + DeserializeOwned>(
        current: &T,
        patch: serde_json::Value,
        protected: &[&str],
    ) -> Result<T, HousingError> {
        let mut base = serde_json::to_value(current)
            .map_err(|e| HousingError::Internal(e.to_string()))?;

        let mut patch = patch;
        if let Some(obj) = patch.as_object_mut() {
            for key in protected {
                obj.remove(*key);
            }
            obj.insert("updated_at".into(), serde_json::json!(now_rfc3339()));
        }

        merge_patch(&mut base, &patch);
        serde_json::from_value(base)
            .map_err(|e| HousingError::Validation(format!("invalid patch: {}", e)))
    }
}
