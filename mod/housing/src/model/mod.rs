pub mod block;
pub mod room;
pub mod student;

pub use block::{Block, CreateBlock};
pub use room::{
    AssignStudent, ChangeCapacity, CreateRoom, GenderPolicy, Room, RoomDetail, RoomStatus,
    RoomType,
};
pub use student::{CreateStudent, Gender, Student};
