pub mod assembler;
pub mod auth;
pub mod chat_creation;
pub mod message_channel;
pub mod participants;
pub mod users;
