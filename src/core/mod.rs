pub mod cache;
pub mod chat;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod keyring;
pub mod message;
pub mod session;
pub mod storage;
pub mod token;
