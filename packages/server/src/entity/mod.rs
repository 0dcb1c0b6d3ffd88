pub mod file;
pub mod storage;
pub mod user;
