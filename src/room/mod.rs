//! Room state and lifecycle management

pub mod manager;
pub mod room;

pub use manager::{LeaveOutcome, RoomManager};
pub use room::Room;
