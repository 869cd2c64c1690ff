pub mod account;
pub mod chat;
pub mod like;
pub mod saved;
pub mod wisdom;
