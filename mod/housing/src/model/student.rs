use serde::{Deserialize, Serialize};

/// Student gender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

/// A student housing record.
///
/// `student_no` is the externally-assigned, human-readable identity
/// (e.g. "RU/1270/18"); `id` is the internal record id.
///
/// `room_id` is a denormalized back-reference to the room that lists this
/// student as an occupant. It lives in the `room_id` column only — the
/// persisted JSON document never contains it — so generic student updates
/// (which rewrite the document) cannot touch it. Only the occupancy
/// operations write it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    /// Unique identifier (UUIDv4, no dashes).
    pub id: String,

    /// Externally-assigned student number, unique.
    pub student_no: String,

    /// Full name.
    pub name: String,

    pub gender: Gender,

    pub department: String,

    /// Year of study.
    pub level: u32,

    /// Id of the room this student occupies, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,

    /// RFC 3339 creation timestamp.
    pub created_at: String,

    /// RFC 3339 last update timestamp.
    pub updated_at: String,
}

/// Input for creating a new student record.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateStudent {
    pub student_no: String,
    pub name: String,
    pub gender: Gender,
    pub department: String,
    pub level: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unassigned_student_serializes_without_room_id() {
        let s = Student {
            id: "s1".into(),
            student_no: "RU/1270/18".into(),
            name: "Alice".into(),
            gender: Gender::Female,
            department: "Physics".into(),
            level: 2,
            room_id: None,
            created_at: "2024-01-01T00:00:00Z".into(),
            updated_at: "2024-01-01T00:00:00Z".into(),
        };
        let json = serde_json::to_value(&s).unwrap();
        assert!(json.get("room_id").is_none());

        let back: Student = serde_json::from_value(json).unwrap();
        assert_eq!(back.room_id, None);
        assert_eq!(s, back);
    }

    #[test]
    fn illegal_gender_rejected() {
        let res: Result<Gender, _> = serde_json::from_str("\"other\"");
        assert!(res.is_err());
    }
}
