use dorm_core::{ListParams, ListResult, new_id, now_rfc3339};
use dorm_sql::Value;

use crate::model::{Block, CreateBlock};
use crate::service::{HousingError, HousingService};

impl HousingService {
    /// Create a new block.
    pub fn create_block(&self, input: CreateBlock) -> Result<Block, HousingError> {
        let now = now_rfc3339();
        let block = Block {
            id: new_id(),
            name: input.name,
            description: input.description,
            created_at: now.clone(),
            updated_at: now.clone(),
        };

        let indexes: Vec<(&str, Value)> = vec![
            ("name", Value::Text(block.name.clone())),
            ("created_at", Value::Text(now.clone())),
            ("updated_at", Value::Text(now)),
        ];

        self.insert_record("blocks", &block.id, &block, &indexes)
            .map_err(|e| match e {
                HousingError::Conflict(_) => HousingError::Conflict(format!(
                    "block '{}' already exists",
                    block.name,
                )),
                other => other,
            })?;
        Ok(block)
    }

    /// Get a block by id.
    pub fn get_block(&self, id: &str) -> Result<Block, HousingError> {
        self.get_record("blocks", id)
    }

    /// Resolve a block by name.
    pub fn find_block_by_name(&self, name: &str) -> Result<Block, HousingError> {
        let rows = self.sql
            .query(
                "SELECT data FROM blocks WHERE name = ?1",
                &[Value::Text(name.to_string())],
            )
            .map_err(|e| HousingError::Storage(e.to_string()))?;
        let row = rows
            .first()
            .ok_or_else(|| HousingError::BlockNotFound(name.to_string()))?;
        let data = row
            .get_str("data")
            .ok_or_else(|| HousingError::Internal("missing data column".into()))?;
        serde_json::from_str(data).map_err(|e| HousingError::Internal(e.to_string()))
    }

    /// List blocks with pagination.
    pub fn list_blocks(&self, params: &ListParams) -> Result<ListResult<Block>, HousingError> {
        self.list_records("blocks", &[], params.limit, params.offset)
    }

    /// Update a block with JSON merge-patch. Renaming is refused while
    /// rooms reference the block — rooms point at it by name.
    pub fn update_block(
        &self,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<Block, HousingError> {
        let current = self.get_block(id)?;
        let updated: Block = Self::apply_patch(&current, patch, &["id", "created_at"])?;

        if updated.name != current.name {
            let rooms = self.count_records(
                "rooms",
                &[("building", Value::Text(current.name.clone()))],
            )?;
            if rooms > 0 {
                return Err(HousingError::Conflict(format!(
                    "block '{}' has {} room(s); it cannot be renamed",
                    current.name, rooms,
                )));
            }
        }

        let indexes: Vec<(&str, Value)> = vec![
            ("name", Value::Text(updated.name.clone())),
            ("updated_at", Value::Text(updated.updated_at.clone())),
        ];
        self.update_record("blocks", id, &updated, &indexes)?;
        Ok(updated)
    }

    /// Delete a block. Refused while rooms reference it.
    pub fn delete_block(&self, id: &str) -> Result<(), HousingError> {
        let block = self.get_block(id)?;
        let rooms = self.count_records(
            "rooms",
            &[("building", Value::Text(block.name.clone()))],
        )?;
        if rooms > 0 {
            return Err(HousingError::Conflict(format!(
                "block '{}' has {} room(s); delete them first",
                block.name, rooms,
            )));
        }
        self.delete_record("blocks", id)
    }
}
