pub mod chat;
pub mod handlers;
