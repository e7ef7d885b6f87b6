pub mod admin;
pub mod attendance;
pub mod reports;
pub mod status;
