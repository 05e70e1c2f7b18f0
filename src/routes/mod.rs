pub mod admin;
pub mod api;
pub mod dashboard;
pub mod public;
