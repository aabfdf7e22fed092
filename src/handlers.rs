pub mod auth;
pub mod personnel;
pub mod tasks;
pub mod users;
pub mod weapons;
