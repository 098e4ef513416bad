use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::student::{Gender, Student};

/// Who a room admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenderPolicy {
    Male,
    Female,
    Coed,
}

impl GenderPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenderPolicy::Male => "male",
            GenderPolicy::Female => "female",
            GenderPolicy::Coed => "coed",
        }
    }

    /// Whether a student of the given gender may live in this room.
    pub fn admits(&self, gender: Gender) -> bool {
        match self {
            GenderPolicy::Coed => true,
            GenderPolicy::Male => gender == Gender::Male,
            GenderPolicy::Female => gender == Gender::Female,
        }
    }
}

impl fmt::Display for GenderPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Room category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomType {
    Standard,
    Deluxe,
    Suite,
}

impl RoomType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomType::Standard => "standard",
            RoomType::Deluxe => "deluxe",
            RoomType::Suite => "suite",
        }
    }
}

/// Room status — derived from occupancy, never set directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Available,
    Full,
}

impl Default for RoomStatus {
    fn default() -> Self {
        Self::Available
    }
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Available => "available",
            RoomStatus::Full => "full",
        }
    }
}

/// A dormitory room.
///
/// The room owns its occupant list — it is the authoritative side of the
/// room/student relationship. `status` is a function of `occupants` vs
/// `capacity` and is recomputed by [`Room::refresh_status`] after every
/// mutation; the generic update path strips it from client patches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    /// Unique identifier (UUIDv4, no dashes).
    pub id: String,

    /// Block name this room belongs to.
    pub building: String,

    /// Room number, unique within the block.
    pub number: String,

    pub floor: i64,

    pub room_type: RoomType,

    /// Gender restriction for occupants.
    pub gender: GenderPolicy,

    /// Maximum number of occupants. Always at least 1.
    pub capacity: u32,

    #[serde(default)]
    pub status: RoomStatus,

    /// Student record ids, in assignment order.
    #[serde(default)]
    pub occupants: Vec<String>,

    /// RFC 3339 creation timestamp.
    pub created_at: String,

    /// RFC 3339 last update timestamp.
    pub updated_at: String,
}

impl Room {
    /// Human-readable room reference, e.g. "Block A/203".
    pub fn label(&self) -> String {
        format!("{}/{}", self.building, self.number)
    }

    pub fn is_full(&self) -> bool {
        self.occupants.len() as u32 >= self.capacity
    }

    /// Recompute `status` from the occupant count.
    pub fn refresh_status(&mut self) {
        self.status = if self.is_full() {
            RoomStatus::Full
        } else {
            RoomStatus::Available
        };
    }
}

/// Input for creating a new room.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRoom {
    pub building: String,
    pub number: String,
    #[serde(default)]
    pub floor: i64,
    pub room_type: RoomType,
    pub gender: GenderPolicy,
    pub capacity: u32,
}

/// Input for assigning a student to a room, by the human-readable
/// student number (e.g. "RU/1270/18"), not the internal record id.
#[derive(Debug, Clone, Deserialize)]
pub struct AssignStudent {
    pub student_no: String,
}

/// Input for the dedicated capacity-change endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeCapacity {
    pub capacity: u32,
}

/// A room with its occupant records resolved.
#[derive(Debug, Clone, Serialize)]
pub struct RoomDetail {
    pub room: Room,
    pub occupants: Vec<Student>,
}
