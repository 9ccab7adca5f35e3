//! UUID v7 utilities for time-ordered identifiers.
//!
//! Event, notification, and timeline rows all use UUIDv7 identifiers, which
//! embed a millisecond-precision timestamp. That gives primary keys a natural
//! creation order and makes "most recent entry" index scans cheap.

use uuid::Uuid;

/// Generate a new UUIDv7 identifier.
///
/// UUIDv7 embeds a Unix timestamp (milliseconds) in the first 48 bits,
/// providing natural time-ordering.
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

/// Check whether a UUID is version 7.
pub fn is_v7(id: &Uuid) -> bool {
    id.get_version_num() == 7
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_v7_is_v7() {
        let id = new_v7();
        assert!(is_v7(&id));
    }

    #[test]
    fn test_new_v7_ordering() {
        let a = new_v7();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = new_v7();
        assert!(a < b, "later v7 UUIDs sort after earlier ones");
    }

    #[test]
    fn test_is_v7_rejects_v4() {
        assert!(!is_v7(&Uuid::new_v4()));
    }
}
