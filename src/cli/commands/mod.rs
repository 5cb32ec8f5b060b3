pub mod chat;
pub mod collections;
pub mod config;
pub mod tools;
