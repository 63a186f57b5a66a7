//! Services exposed to the command layer.

pub mod admin;

pub use admin::AdminService;
