use dorm_core::{ListParams, ListResult, new_id, now_rfc3339};
use dorm_sql::Value;

use crate::model::{CreateRoom, Room, RoomDetail, RoomStatus};
use crate::service::{HousingError, HousingService, WRITE_ATTEMPTS};

impl HousingService {
    /// Create a new room. The building must name an existing block.
    pub fn create_room(&self, input: CreateRoom) -> Result<Room, HousingError> {
        if input.capacity == 0 {
            return Err(HousingError::Validation(
                "room capacity must be at least 1".into(),
            ));
        }
        self.find_block_by_name(&input.building)?;

        let now = now_rfc3339();
        let room = Room {
            id: new_id(),
            building: input.building,
            number: input.number,
            floor: input.floor,
            room_type: input.room_type,
            gender: input.gender,
            capacity: input.capacity,
            status: RoomStatus::Available,
            occupants: Vec::new(),
            created_at: now.clone(),
            updated_at: now.clone(),
        };

        let indexes: Vec<(&str, Value)> = vec![
            ("building", Value::Text(room.building.clone())),
            ("number", Value::Text(room.number.clone())),
            ("floor", Value::Integer(room.floor)),
            ("room_type", Value::Text(room.room_type.as_str().into())),
            ("gender", Value::Text(room.gender.as_str().into())),
            ("capacity", Value::Integer(i64::from(room.capacity))),
            ("status", Value::Text(room.status.as_str().into())),
            ("created_at", Value::Text(now.clone())),
            ("updated_at", Value::Text(now)),
        ];

        self.insert_record("rooms", &room.id, &room, &indexes)
            .map_err(|e| match e {
                HousingError::Conflict(_) => HousingError::Conflict(format!(
                    "room {} already exists in block '{}'",
                    room.number, room.building,
                )),
                other => other,
            })?;
        Ok(room)
    }

    /// Get a room by id.
    pub fn get_room(&self, id: &str) -> Result<Room, HousingError> {
        Ok(self.load_room(id)?.0)
    }

    /// Get a room with its occupant records resolved.
    pub fn get_room_detail(&self, id: &str) -> Result<RoomDetail, HousingError> {
        let (room, _) = self.load_room(id)?;
        self.room_detail(room)
    }

    /// List rooms with pagination.
    pub fn list_rooms(&self, params: &ListParams) -> Result<ListResult<Room>, HousingError> {
        self.list_records("rooms", &[], params.limit, params.offset)
    }

    /// Update a room with JSON merge-patch.
    ///
    /// `status` and `occupants` are derived/owned by the occupancy
    /// operations and are stripped from the patch. A capacity edit is
    /// re-checked against current occupancy, a gender-policy edit against
    /// the genders of current occupants.
    pub fn update_room(
        &self,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<Room, HousingError> {
        for _ in 0..WRITE_ATTEMPTS {
            let (current, version) = self.load_room(id)?;
            let mut updated: Room = Self::apply_patch(
                &current,
                patch.clone(),
                &["id", "status", "occupants", "version", "created_at"],
            )?;

            if updated.capacity == 0 {
                return Err(HousingError::Validation(
                    "room capacity must be at least 1".into(),
                ));
            }
            if (current.occupants.len() as u32) > updated.capacity {
                return Err(HousingError::CapacityBelowOccupancy {
                    room: current.label(),
                    requested: updated.capacity,
                    occupants: current.occupants.len(),
                });
            }
            if updated.building != current.building {
                self.find_block_by_name(&updated.building)?;
            }
            if updated.gender != current.gender {
                for student in self.occupant_students(&current)? {
                    if !updated.gender.admits(student.gender) {
                        return Err(HousingError::GenderMismatch {
                            room: current.label(),
                            policy: updated.gender,
                        });
                    }
                }
            }

            updated.refresh_status();
            if self.commit_room(&updated, version)? {
                return Ok(updated);
            }
        }
        Err(HousingError::Contention(id.to_string()))
    }

    /// Delete a room. Refused while occupants remain — admins must remove
    /// or vacate them first.
    pub fn delete_room(&self, id: &str) -> Result<(), HousingError> {
        for _ in 0..WRITE_ATTEMPTS {
            let (room, version) = self.load_room(id)?;
            if !room.occupants.is_empty() {
                return Err(HousingError::Conflict(format!(
                    "room '{}' still has {} occupant(s); remove or vacate them first",
                    room.label(),
                    room.occupants.len(),
                )));
            }
            // Version-guarded delete: a concurrent assign bumps the version
            // and voids this delete instead of orphaning the new occupant.
            let affected = self.sql
                .exec(
                    "DELETE FROM rooms WHERE id = ?1 AND version = ?2",
                    &[Value::Text(id.to_string()), Value::Integer(version)],
                )
                .map_err(|e| HousingError::Storage(e.to_string()))?;
            if affected == 1 {
                return Ok(());
            }
        }
        Err(HousingError::Contention(id.to_string()))
    }

    // ── Versioned room access ──

    /// Load a room plus the version its next write must be conditioned on.
    pub(crate) fn load_room(&self, id: &str) -> Result<(Room, i64), HousingError> {
        let rows = self.sql
            .query(
                "SELECT data, version FROM rooms WHERE id = ?1",
                &[Value::Text(id.to_string())],
            )
            .map_err(|e| HousingError::Storage(e.to_string()))?;
        let row = rows
            .first()
            .ok_or_else(|| HousingError::RoomNotFound(id.to_string()))?;
        let data = row
            .get_str("data")
            .ok_or_else(|| HousingError::Internal("missing data column".into()))?;
        let room: Room =
            serde_json::from_str(data).map_err(|e| HousingError::Internal(e.to_string()))?;
        let version = row
            .get_i64("version")
            .ok_or_else(|| HousingError::Internal("missing version column".into()))?;
        Ok((room, version))
    }

    /// Conditionally write a room observed at `expected_version`.
    ///
    /// Returns `Ok(false)` when another writer committed first (the row's
    /// version has moved on) — the caller re-reads and re-validates.
    pub(crate) fn commit_room(
        &self,
        room: &Room,
        expected_version: i64,
    ) -> Result<bool, HousingError> {
        let json =
            serde_json::to_string(room).map_err(|e| HousingError::Internal(e.to_string()))?;
        let affected = self.sql
            .exec(
                "UPDATE rooms SET data = ?1, building = ?2, number = ?3, floor = ?4, \
                 room_type = ?5, gender = ?6, capacity = ?7, status = ?8, updated_at = ?9, \
                 version = version + 1 WHERE id = ?10 AND version = ?11",
                &[
                    Value::Text(json),
                    Value::Text(room.building.clone()),
                    Value::Text(room.number.clone()),
                    Value::Integer(room.floor),
                    Value::Text(room.room_type.as_str().into()),
                    Value::Text(room.gender.as_str().into()),
                    Value::Integer(i64::from(room.capacity)),
                    Value::Text(room.status.as_str().into()),
                    Value::Text(room.updated_at.clone()),
                    Value::Text(room.id.clone()),
                    Value::Integer(expected_version),
                ],
            )
            .map_err(|e| {
                let msg = e.to_string();
                if msg.contains("UNIQUE constraint") {
                    HousingError::Conflict(format!(
                        "room {} already exists in block '{}'",
                        room.number, room.building,
                    ))
                } else {
                    HousingError::Storage(msg)
                }
            })?;
        Ok(affected == 1)
    }

    /// Resolve a room's occupant ids into student records.
    pub(crate) fn room_detail(&self, room: Room) -> Result<RoomDetail, HousingError> {
        let occupants = self.occupant_students(&room)?;
        Ok(RoomDetail { room, occupants })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dorm_core::ListParams;
    use dorm_sql::{SqlStore, SqliteStore};

    use crate::model::{
        CreateBlock, CreateRoom, CreateStudent, Gender, GenderPolicy, RoomStatus, RoomType,
    };
    use crate::service::{HousingError, HousingService};

    fn test_service() -> Arc<HousingService> {
        let sql: Arc<dyn SqlStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        HousingService::new(sql).unwrap()
    }

    fn with_block(svc: &HousingService, name: &str) {
        svc.create_block(CreateBlock {
            name: name.to_string(),
            description: None,
        })
        .unwrap();
    }

    fn create_room(svc: &HousingService, number: &str, capacity: u32) -> crate::model::Room {
        svc.create_room(CreateRoom {
            building: "Block A".into(),
            number: number.into(),
            floor: 2,
            room_type: RoomType::Standard,
            gender: GenderPolicy::Coed,
            capacity,
        })
        .unwrap()
    }

    fn create_student(svc: &HousingService, no: &str, gender: Gender) -> crate::model::Student {
        svc.create_student(CreateStudent {
            student_no: no.into(),
            name: format!("Student {}", no),
            gender,
            department: "Physics".into(),
            level: 2,
        })
        .unwrap()
    }

    #[test]
    fn test_room_crud() {
        let svc = test_service();
        with_block(&svc, "Block A");

        let room = create_room(&svc, "203", 2);
        assert_eq!(room.status, RoomStatus::Available);
        assert_eq!(room.capacity, 2);

        let fetched = svc.get_room(&room.id).unwrap();
        assert_eq!(fetched, room);

        let list = svc.list_rooms(&ListParams::default()).unwrap();
        assert_eq!(list.total, 1);

        let updated = svc
            .update_room(&room.id, serde_json::json!({"floor": 3}))
            .unwrap();
        assert_eq!(updated.floor, 3);

        svc.delete_room(&room.id).unwrap();
        assert!(matches!(
            svc.get_room(&room.id),
            Err(HousingError::RoomNotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_number_in_block_rejected() {
        let svc = test_service();
        with_block(&svc, "Block A");
        create_room(&svc, "203", 2);

        let result = svc.create_room(CreateRoom {
            building: "Block A".into(),
            number: "203".into(),
            floor: 2,
            room_type: RoomType::Deluxe,
            gender: GenderPolicy::Male,
            capacity: 1,
        });
        assert!(matches!(result, Err(HousingError::Conflict(_))));
    }

    #[test]
    fn test_room_requires_existing_block() {
        let svc = test_service();
        let result = svc.create_room(CreateRoom {
            building: "Nowhere".into(),
            number: "1".into(),
            floor: 0,
            room_type: RoomType::Standard,
            gender: GenderPolicy::Coed,
            capacity: 1,
        });
        assert!(matches!(result, Err(HousingError::BlockNotFound(_))));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let svc = test_service();
        with_block(&svc, "Block A");
        let result = svc.create_room(CreateRoom {
            building: "Block A".into(),
            number: "1".into(),
            floor: 0,
            room_type: RoomType::Standard,
            gender: GenderPolicy::Coed,
            capacity: 0,
        });
        assert!(matches!(result, Err(HousingError::Validation(_))));
    }

    #[test]
    fn test_update_cannot_touch_derived_fields() {
        let svc = test_service();
        with_block(&svc, "Block A");
        let room = create_room(&svc, "203", 2);

        // A patch naming status/occupants is stripped, not applied.
        let updated = svc
            .update_room(
                &room.id,
                serde_json::json!({"status": "full", "occupants": ["ghost"]}),
            )
            .unwrap();
        assert_eq!(updated.status, RoomStatus::Available);
        assert!(updated.occupants.is_empty());
    }

    #[test]
    fn test_update_capacity_below_occupancy_rejected() {
        let svc = test_service();
        with_block(&svc, "Block A");
        let room = create_room(&svc, "203", 3);
        let s1 = create_student(&svc, "RU/0001/24", Gender::Female);
        let s2 = create_student(&svc, "RU/0002/24", Gender::Female);
        svc.assign_student(&room.id, &s1.student_no).unwrap();
        svc.assign_student(&room.id, &s2.student_no).unwrap();

        let result = svc.update_room(&room.id, serde_json::json!({"capacity": 1}));
        assert!(matches!(
            result,
            Err(HousingError::CapacityBelowOccupancy { requested: 1, occupants: 2, .. })
        ));
        assert_eq!(svc.get_room(&room.id).unwrap().capacity, 3);
    }

    #[test]
    fn test_update_gender_policy_checked_against_occupants() {
        let svc = test_service();
        with_block(&svc, "Block A");
        let room = create_room(&svc, "203", 2);
        let s1 = create_student(&svc, "RU/0001/24", Gender::Male);
        svc.assign_student(&room.id, &s1.student_no).unwrap();

        let result = svc.update_room(&room.id, serde_json::json!({"gender": "female"}));
        assert!(matches!(result, Err(HousingError::GenderMismatch { .. })));

        // Same-gender restriction is fine.
        let updated = svc
            .update_room(&room.id, serde_json::json!({"gender": "male"}))
            .unwrap();
        assert_eq!(updated.gender, GenderPolicy::Male);
    }

    #[test]
    fn test_update_with_invalid_enum_rejected() {
        let svc = test_service();
        with_block(&svc, "Block A");
        let room = create_room(&svc, "203", 2);
        let result = svc.update_room(&room.id, serde_json::json!({"room_type": "penthouse"}));
        assert!(matches!(result, Err(HousingError::Validation(_))));
    }

    #[test]
    fn test_delete_with_occupants_refused() {
        let svc = test_service();
        with_block(&svc, "Block A");
        let room = create_room(&svc, "203", 2);
        let s1 = create_student(&svc, "RU/0001/24", Gender::Female);
        svc.assign_student(&room.id, &s1.student_no).unwrap();

        let result = svc.delete_room(&room.id);
        assert!(matches!(result, Err(HousingError::Conflict(_))));
        assert!(svc.get_room(&room.id).is_ok());
    }
}
