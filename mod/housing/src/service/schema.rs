use dorm_sql::SqlStore;

use crate::service::HousingError;

/// Initialize the SQLite schema for all housing resources.
pub fn init_schema(sql: &dyn SqlStore) -> Result<(), HousingError> {
    let statements = [
        // Blocks: dormitory buildings
        "CREATE TABLE IF NOT EXISTS blocks (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",

        // Rooms: the occupancy aggregate. `version` is the optimistic-
        // concurrency counter; every room write is conditioned on it.
        // The occupant list lives in the JSON `data` document.
        "CREATE TABLE IF NOT EXISTS rooms (
            id TEXT PRIMARY KEY,
            building TEXT NOT NULL,
            number TEXT NOT NULL,
            floor INTEGER NOT NULL DEFAULT 0,
            room_type TEXT NOT NULL,
            gender TEXT NOT NULL,
            capacity INTEGER NOT NULL,
            status TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (building, number)
        )",
        "CREATE INDEX IF NOT EXISTS idx_rooms_building ON rooms(building)",
        "CREATE INDEX IF NOT EXISTS idx_rooms_status ON rooms(status)",
        "CREATE INDEX IF NOT EXISTS idx_rooms_gender ON rooms(gender)",

        // Students: `room_id` is the back-reference to the occupied room.
        // It is a real column (not part of the JSON document) and is only
        // written by the occupancy operations.
        "CREATE TABLE IF NOT EXISTS students (
            id TEXT PRIMARY KEY,
            student_no TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            gender TEXT NOT NULL,
            department TEXT NOT NULL,
            level INTEGER NOT NULL,
            room_id TEXT,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_students_room ON students(room_id)",
        "CREATE INDEX IF NOT EXISTS idx_students_name ON students(name)",
    ];

    sql.exec_batch(&statements)
        .map_err(|e| HousingError::Storage(e.to_string()))
}
