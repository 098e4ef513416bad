use dorm_core::{ListParams, ListResult, new_id, now_rfc3339};
use dorm_sql::{Row, Value};

use crate::model::{CreateStudent, Room, Student};
use crate::service::{HousingError, HousingService};

impl HousingService {
    /// Create a new student record. Room assignment happens separately,
    /// through the occupancy operations.
    pub fn create_student(&self, input: CreateStudent) -> Result<Student, HousingError> {
        let now = now_rfc3339();
        let student = Student {
            id: new_id(),
            student_no: input.student_no,
            name: input.name,
            gender: input.gender,
            department: input.department,
            level: input.level,
            room_id: None,
            created_at: now.clone(),
            updated_at: now.clone(),
        };

        let indexes: Vec<(&str, Value)> = vec![
            ("student_no", Value::Text(student.student_no.clone())),
            ("name", Value::Text(student.name.clone())),
            ("gender", Value::Text(student.gender.as_str().into())),
            ("department", Value::Text(student.department.clone())),
            ("level", Value::Integer(i64::from(student.level))),
            ("created_at", Value::Text(now.clone())),
            ("updated_at", Value::Text(now)),
        ];

        self.insert_record("students", &student.id, &student, &indexes)
            .map_err(|e| match e {
                HousingError::Conflict(_) => HousingError::Conflict(format!(
                    "student number '{}' is already registered",
                    student.student_no,
                )),
                other => other,
            })?;
        Ok(student)
    }

    /// Get a student by internal record id.
    pub fn get_student(&self, id: &str) -> Result<Student, HousingError> {
        let rows = self.sql
            .query(
                "SELECT data, room_id FROM students WHERE id = ?1",
                &[Value::Text(id.to_string())],
            )
            .map_err(|e| HousingError::Storage(e.to_string()))?;
        let row = rows
            .first()
            .ok_or_else(|| HousingError::StudentNotFound(id.to_string()))?;
        student_from_row(row)
    }

    /// Resolve a student by the human-readable student number.
    pub fn find_student_by_no(&self, student_no: &str) -> Result<Student, HousingError> {
        let rows = self.sql
            .query(
                "SELECT data, room_id FROM students WHERE student_no = ?1",
                &[Value::Text(student_no.to_string())],
            )
            .map_err(|e| HousingError::Storage(e.to_string()))?;
        let row = rows
            .first()
            .ok_or_else(|| HousingError::StudentNotFound(student_no.to_string()))?;
        student_from_row(row)
    }

    /// List students with pagination.
    pub fn list_students(
        &self,
        params: &ListParams,
    ) -> Result<ListResult<Student>, HousingError> {
        let total = self.count_records("students", &[])? as usize;
        let rows = self.sql
            .query(
                "SELECT data, room_id FROM students ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
                &[
                    Value::Integer(params.limit as i64),
                    Value::Integer(params.offset as i64),
                ],
            )
            .map_err(|e| HousingError::Storage(e.to_string()))?;

        let mut items = Vec::new();
        for row in &rows {
            items.push(student_from_row(row)?);
        }
        Ok(ListResult { items, total })
    }

    /// Update a student with JSON merge-patch.
    ///
    /// `room_id` is stripped from the patch: the back-reference is written
    /// only by the occupancy operations.
    pub fn update_student(
        &self,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<Student, HousingError> {
        let current = self.get_student(id)?;
        let updated: Student =
            Self::apply_patch(&current, patch, &["id", "room_id", "created_at"])?;

        let indexes: Vec<(&str, Value)> = vec![
            ("student_no", Value::Text(updated.student_no.clone())),
            ("name", Value::Text(updated.name.clone())),
            ("gender", Value::Text(updated.gender.as_str().into())),
            ("department", Value::Text(updated.department.clone())),
            ("level", Value::Integer(i64::from(updated.level))),
            ("updated_at", Value::Text(updated.updated_at.clone())),
        ];

        self.update_record("students", id, &detached(&updated), &indexes)
            .map_err(|e| match e {
                HousingError::Conflict(_) => HousingError::Conflict(format!(
                    "student number '{}' is already registered",
                    updated.student_no,
                )),
                other => other,
            })?;
        Ok(updated)
    }

    /// Delete a student. Refused while the student occupies a room.
    pub fn delete_student(&self, id: &str) -> Result<(), HousingError> {
        let student = self.get_student(id)?;
        if let Some(room_id) = &student.room_id {
            return Err(HousingError::Conflict(format!(
                "student '{}' is still assigned to room '{}'; remove them first",
                student.student_no, room_id,
            )));
        }
        // Guarded delete: a claim landing after the check above voids the
        // delete instead of orphaning a room's occupant entry.
        let affected = self.sql
            .exec(
                "DELETE FROM students WHERE id = ?1 AND room_id IS NULL",
                &[Value::Text(id.to_string())],
            )
            .map_err(|e| HousingError::Storage(e.to_string()))?;
        if affected == 0 {
            return Err(HousingError::Conflict(format!(
                "student '{}' was assigned to a room concurrently; remove them first",
                student.student_no,
            )));
        }
        Ok(())
    }

    /// Resolve a room's occupant ids into student records. Ids that no
    /// longer resolve are skipped.
    pub(crate) fn occupant_students(&self, room: &Room) -> Result<Vec<Student>, HousingError> {
        let mut out = Vec::new();
        for sid in &room.occupants {
            match self.get_student(sid) {
                Ok(s) => out.push(s),
                Err(HousingError::StudentNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }
}

/// Hydrate a student from a `data, room_id` row. The back-reference comes
/// from the column, never from the JSON document.
fn student_from_row(row: &Row) -> Result<Student, HousingError> {
    let data = row
        .get_str("data")
        .ok_or_else(|| HousingError::Internal("missing data column".into()))?;
    let mut student: Student =
        serde_json::from_str(data).map_err(|e| HousingError::Internal(e.to_string()))?;
    student.room_id = row.get_str("room_id").map(str::to_string);
    Ok(student)
}

/// Copy a student with the back-reference cleared, for persisting the JSON
/// document. The `room_id` column is the only stored copy of the reference.
fn detached(student: &Student) -> Student {
    let mut s = student.clone();
    s.room_id = None;
    s
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dorm_core::ListParams;
    use dorm_sql::{SqlStore, SqliteStore};

    use crate::model::{CreateBlock, CreateRoom, CreateStudent, Gender, GenderPolicy, RoomType};
    use crate::service::{HousingError, HousingService};

    fn test_service() -> Arc<HousingService> {
        let sql: Arc<dyn SqlStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        HousingService::new(sql).unwrap()
    }

    fn create_student(svc: &HousingService, no: &str) -> crate::model::Student {
        svc.create_student(CreateStudent {
            student_no: no.into(),
            name: format!("Student {}", no),
            gender: Gender::Female,
            department: "Physics".into(),
            level: 2,
        })
        .unwrap()
    }

    #[test]
    fn test_student_crud() {
        let svc = test_service();
        let s = create_student(&svc, "RU/1270/18");
        assert_eq!(s.room_id, None);

        let by_no = svc.find_student_by_no("RU/1270/18").unwrap();
        assert_eq!(by_no.id, s.id);

        let list = svc.list_students(&ListParams::default()).unwrap();
        assert_eq!(list.total, 1);

        let updated = svc
            .update_student(&s.id, serde_json::json!({"department": "Chemistry"}))
            .unwrap();
        assert_eq!(updated.department, "Chemistry");

        svc.delete_student(&s.id).unwrap();
        assert!(matches!(
            svc.get_student(&s.id),
            Err(HousingError::StudentNotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_student_no_rejected() {
        let svc = test_service();
        create_student(&svc, "RU/1270/18");
        let result = svc.create_student(CreateStudent {
            student_no: "RU/1270/18".into(),
            name: "Someone Else".into(),
            gender: Gender::Male,
            department: "History".into(),
            level: 1,
        });
        assert!(matches!(result, Err(HousingError::Conflict(_))));
    }

    #[test]
    fn test_update_cannot_set_back_reference() {
        let svc = test_service();
        let s = create_student(&svc, "RU/1270/18");

        let updated = svc
            .update_student(&s.id, serde_json::json!({"room_id": "fabricated"}))
            .unwrap();
        assert_eq!(updated.room_id, None);
        assert_eq!(svc.get_student(&s.id).unwrap().room_id, None);
    }

    #[test]
    fn test_generic_update_preserves_assignment() {
        let svc = test_service();
        svc.create_block(CreateBlock {
            name: "Block A".into(),
            description: None,
        })
        .unwrap();
        let room = svc
            .create_room(CreateRoom {
                building: "Block A".into(),
                number: "203".into(),
                floor: 2,
                room_type: RoomType::Standard,
                gender: GenderPolicy::Coed,
                capacity: 2,
            })
            .unwrap();
        let s = create_student(&svc, "RU/1270/18");
        svc.assign_student(&room.id, &s.student_no).unwrap();

        // A profile edit must not disturb the occupancy-managed reference.
        let updated = svc
            .update_student(&s.id, serde_json::json!({"name": "Renamed"}))
            .unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.room_id, Some(room.id.clone()));
        assert_eq!(svc.get_student(&s.id).unwrap().room_id, Some(room.id));
    }

    #[test]
    fn test_delete_loses_race_against_assignment() {
        use std::sync::Mutex;

        use dorm_sql::{Row, SqlError, Value};

        // Claims the student for a room right before the delete statement
        // runs, the interleaving a concurrent assign produces.
        struct ClaimBeforeDeleteStore {
            inner: SqliteStore,
            claim: Mutex<Option<(String, String)>>,
        }

        impl SqlStore for ClaimBeforeDeleteStore {
            fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SqlError> {
                self.inner.query(sql, params)
            }

            fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SqlError> {
                if sql.starts_with("DELETE FROM students") {
                    if let Some((student_id, room_id)) = self.claim.lock().unwrap().take() {
                        self.inner.exec(
                            "UPDATE students SET room_id = ?1 WHERE id = ?2",
                            &[Value::Text(room_id), Value::Text(student_id)],
                        )?;
                    }
                }
                self.inner.exec(sql, params)
            }
        }

        let store = Arc::new(ClaimBeforeDeleteStore {
            inner: SqliteStore::open_in_memory().unwrap(),
            claim: Mutex::new(None),
        });
        let sql: Arc<dyn SqlStore> = store.clone();
        let svc = HousingService::new(sql).unwrap();
        let s = svc
            .create_student(CreateStudent {
                student_no: "RU/1270/18".into(),
                name: "Alice".into(),
                gender: Gender::Female,
                department: "Physics".into(),
                level: 2,
            })
            .unwrap();

        *store.claim.lock().unwrap() = Some((s.id.clone(), "r1".into()));
        let result = svc.delete_student(&s.id);
        assert!(matches!(result, Err(HousingError::Conflict(_))));

        // The record survives as the room's occupant.
        assert_eq!(svc.get_student(&s.id).unwrap().room_id, Some("r1".into()));
    }

    #[test]
    fn test_delete_assigned_student_refused() {
        let svc = test_service();
        svc.create_block(CreateBlock {
            name: "Block A".into(),
            description: None,
        })
        .unwrap();
        let room = svc
            .create_room(CreateRoom {
                building: "Block A".into(),
                number: "203".into(),
                floor: 2,
                room_type: RoomType::Standard,
                gender: GenderPolicy::Coed,
                capacity: 2,
            })
            .unwrap();
        let s = create_student(&svc, "RU/1270/18");
        svc.assign_student(&room.id, &s.student_no).unwrap();

        assert!(matches!(
            svc.delete_student(&s.id),
            Err(HousingError::Conflict(_))
        ));
    }
}
