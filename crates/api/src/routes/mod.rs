pub mod admin;
pub mod assessment;
pub mod auth;
pub mod content;
pub mod progress;
