use serde::{Deserialize, Serialize};

/// A dormitory block (building). Rooms reference a block by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Unique identifier (UUIDv4, no dashes).
    pub id: String,

    /// Block display name, unique.
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// RFC 3339 creation timestamp.
    pub created_at: String,

    /// RFC 3339 last update timestamp.
    pub updated_at: String,
}

/// Input for creating a new block.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBlock {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}
