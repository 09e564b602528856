pub mod api;
pub mod auth;
pub mod client;
pub mod clock;
pub mod db;
pub mod schema;
pub mod settings;
pub mod tables;
pub mod tracker;

pub const BASE_URL: &str = "http://localhost:3000";
pub const TASKS_API: &str = "api/tasks";
pub const NOTES_API: &str = "api/notes";
pub const TRACKER_API: &str = "api/tracker";
