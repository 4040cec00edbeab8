pub mod config;
pub mod contact_message;
pub mod notification;
pub mod secrets;
pub mod sender;
pub mod service;
