pub mod chat;
pub mod error;
pub mod health;
pub mod info;
pub mod webhooks;
