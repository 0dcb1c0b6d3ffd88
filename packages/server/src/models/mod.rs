pub mod auth;
pub mod file;
pub mod shared;
pub mod storage;
pub mod user;
