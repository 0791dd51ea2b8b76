//! Type-safe cache key builders

use std::fmt;
use uuid::Uuid;

pub const VERSION: &str = "v1";

pub mod chat {
    use super::*;

    pub const NAMESPACE: &str = "chat";

    /// Every key for one user shares this prefix, so a single
    /// `invalidate_prefix` call clears all of their cached listings.
    pub fn user_prefix(user_id: Uuid) -> String {
        format!("{}:{}:{}:", VERSION, NAMESPACE, user_id)
    }

    #[derive(Debug, Clone)]
    pub struct ChatListKey {
        pub user_id: Uuid,
    }

    impl ChatListKey {
        pub fn new(user_id: Uuid) -> Self {
            Self { user_id }
        }
    }

    impl fmt::Display for ChatListKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}:{}:{}:list", VERSION, NAMESPACE, self.user_id)
        }
    }

    #[derive(Debug, Clone)]
    pub struct UnreadSummaryKey {
        pub user_id: Uuid,
    }

    impl UnreadSummaryKey {
        pub fn new(user_id: Uuid) -> Self {
            Self { user_id }
        }
    }

    impl fmt::Display for UnreadSummaryKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}:{}:{}:unread", VERSION, NAMESPACE, self.user_id)
        }
    }
}
