pub mod auth;
pub mod files;
pub mod storages;
pub mod users;
