//! Room occupancy operations.
//!
//! The room document owns the occupant list; the student row carries the
//! back-reference in its `room_id` column. Every operation here is a
//! read-validate-write cycle against the room, committed with a
//! version-conditioned UPDATE. A failed condition means another writer got
//! in between; the cycle re-reads and re-validates, bounded by
//! [`WRITE_ATTEMPTS`], so two concurrent assigns can never both pass the
//! capacity check against the same stale occupant count.

use dorm_core::now_rfc3339;
use dorm_sql::Value;
use tracing::{debug, warn};

use crate::model::{Room, RoomDetail, Student};
use crate::service::{HousingError, HousingService, WRITE_ATTEMPTS};

impl HousingService {
    /// Assign a student (by student number) to a room.
    ///
    /// Validation order, first failing check wins: room exists → student
    /// exists → student unassigned anywhere → room below capacity →
    /// gender compatible. On success the room's occupant list and the
    /// student's back-reference are both updated; on any failure neither
    /// is.
    pub fn assign_student(
        &self,
        room_id: &str,
        student_no: &str,
    ) -> Result<RoomDetail, HousingError> {
        for attempt in 0..WRITE_ATTEMPTS {
            let (room, version) = self.load_room(room_id)?;
            let student = self.find_student_by_no(student_no)?;

            if let Some(current) = student.room_id.clone() {
                return Err(self.already_assigned(&student, &current));
            }
            if room.is_full() {
                return Err(HousingError::RoomFull {
                    room: room.label(),
                    capacity: room.capacity,
                });
            }
            if !room.gender.admits(student.gender) {
                return Err(HousingError::GenderMismatch {
                    room: room.label(),
                    policy: room.gender,
                });
            }

            // Claim the student row first. The `room_id IS NULL` guard is
            // the system-wide at-most-one-room invariant: two concurrent
            // assigns of the same student both pass the check above, but
            // only one claim lands.
            let claimed = self.sql
                .exec(
                    "UPDATE students SET room_id = ?1, updated_at = ?2 \
                     WHERE id = ?3 AND room_id IS NULL",
                    &[
                        Value::Text(room.id.clone()),
                        Value::Text(now_rfc3339()),
                        Value::Text(student.id.clone()),
                    ],
                )
                .map_err(|e| HousingError::Storage(e.to_string()))?;
            if claimed == 0 {
                let fresh = self.find_student_by_no(student_no)?;
                match fresh.room_id.clone() {
                    Some(current) => return Err(self.already_assigned(&fresh, &current)),
                    // The winning claim was already removed again; nothing
                    // blocks this assignment, so run the cycle once more.
                    None => {
                        debug!(student = %fresh.id, attempt, "claim raced an assign-then-remove, retrying");
                        continue;
                    }
                }
            }

            let mut updated = room.clone();
            updated.occupants.push(student.id.clone());
            updated.refresh_status();
            updated.updated_at = now_rfc3339();

            match self.commit_room(&updated, version) {
                Ok(true) => return self.room_detail(updated),
                // Lost the room write: release the claim and go around again.
                Ok(false) => {
                    self.release_claim(&student.id, &room.id)?;
                    debug!(room = %room.id, attempt, "assignment lost a concurrent room write, retrying");
                }
                // The claim is still held on a failed commit. Release it
                // before surfacing the error, or the student stays pointed
                // at a room that never listed them.
                Err(e) => {
                    if let Err(release_err) = self.release_claim(&student.id, &room.id) {
                        warn!(
                            student = %student.id,
                            room = %room.id,
                            error = %release_err,
                            "failed to release claim after commit error",
                        );
                    }
                    return Err(e);
                }
            }
        }
        Err(HousingError::Contention(room_id.to_string()))
    }

    /// Remove a student (by internal record id) from a room.
    ///
    /// Removing a student who is not listed in this room is an error, not
    /// a no-op — a caller holding a stale occupant list must find out.
    pub fn remove_student(
        &self,
        room_id: &str,
        student_id: &str,
    ) -> Result<RoomDetail, HousingError> {
        for attempt in 0..WRITE_ATTEMPTS {
            let (room, version) = self.load_room(room_id)?;
            let Some(pos) = room.occupants.iter().position(|id| id == student_id) else {
                return Err(HousingError::OccupantNotInRoom {
                    room: room.label(),
                    student: student_id.to_string(),
                });
            };

            let mut updated = room.clone();
            updated.occupants.remove(pos);
            updated.refresh_status();
            updated.updated_at = now_rfc3339();

            if self.commit_room(&updated, version)? {
                // The room write is committed; a release failure here is
                // surfaced but cannot roll it back.
                self.release_claim(student_id, &room.id)?;
                return self.room_detail(updated);
            }
            debug!(room = %room.id, attempt, "removal lost a concurrent room write, retrying");
        }
        Err(HousingError::Contention(room_id.to_string()))
    }

    /// Change a room's capacity.
    ///
    /// Rejected outright if the new capacity is below the current occupant
    /// count — occupants are never silently evicted or truncated.
    pub fn change_capacity(
        &self,
        room_id: &str,
        new_capacity: u32,
    ) -> Result<Room, HousingError> {
        if new_capacity == 0 {
            return Err(HousingError::Validation(
                "room capacity must be at least 1".into(),
            ));
        }
        for _ in 0..WRITE_ATTEMPTS {
            let (room, version) = self.load_room(room_id)?;
            if (room.occupants.len() as u32) > new_capacity {
                return Err(HousingError::CapacityBelowOccupancy {
                    room: room.label(),
                    requested: new_capacity,
                    occupants: room.occupants.len(),
                });
            }
            let mut updated = room;
            updated.capacity = new_capacity;
            updated.refresh_status();
            updated.updated_at = now_rfc3339();
            if self.commit_room(&updated, version)? {
                return Ok(updated);
            }
        }
        Err(HousingError::Contention(room_id.to_string()))
    }

    /// Detach every occupant of a room.
    ///
    /// The occupant list is cleared in one conditional commit; the
    /// back-references are released afterwards. Vacating an already-empty
    /// room succeeds.
    pub fn vacate_room(&self, room_id: &str) -> Result<Room, HousingError> {
        for _ in 0..WRITE_ATTEMPTS {
            let (room, version) = self.load_room(room_id)?;
            if room.occupants.is_empty() {
                return Ok(room);
            }
            let mut updated = room.clone();
            let detached = std::mem::take(&mut updated.occupants);
            updated.refresh_status();
            updated.updated_at = now_rfc3339();

            if self.commit_room(&updated, version)? {
                // The room write is committed; a release failure here is
                // surfaced but cannot roll it back.
                for student_id in &detached {
                    self.release_claim(student_id, &room.id)?;
                }
                return Ok(updated);
            }
        }
        Err(HousingError::Contention(room_id.to_string()))
    }

    /// Clear a student's back-reference, but only if it still points at
    /// the given room.
    fn release_claim(&self, student_id: &str, room_id: &str) -> Result<(), HousingError> {
        self.sql
            .exec(
                "UPDATE students SET room_id = NULL, updated_at = ?1 \
                 WHERE id = ?2 AND room_id = ?3",
                &[
                    Value::Text(now_rfc3339()),
                    Value::Text(student_id.to_string()),
                    Value::Text(room_id.to_string()),
                ],
            )
            .map_err(|e| HousingError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Build the AlreadyAssigned conflict, naming the student's current
    /// room where it can still be resolved.
    fn already_assigned(&self, student: &Student, room_id: &str) -> HousingError {
        let room = self
            .load_room(room_id)
            .map(|(r, _)| r.label())
            .unwrap_or_else(|_| room_id.to_string());
        HousingError::AlreadyAssigned {
            student: student.student_no.clone(),
            room,
        }
    }
}
