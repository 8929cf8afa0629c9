//! Utility functions for the lobby service

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique room ID
pub fn generate_room_id() -> Uuid {
    Uuid::new_v4()
}

/// Generate a new unique connection ID
pub fn generate_connection_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique_ids() {
        let id1 = generate_room_id();
        let id2 = generate_room_id();
        assert_ne!(id1, id2);

        let conn1 = generate_connection_id();
        let conn2 = generate_connection_id();
        assert_ne!(conn1, conn2);
    }
}
