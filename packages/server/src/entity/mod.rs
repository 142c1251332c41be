pub mod api_key;
pub mod file;
pub mod user;
