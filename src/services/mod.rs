pub mod chats;
pub mod notification;
pub mod payments;
pub mod webhooks;
