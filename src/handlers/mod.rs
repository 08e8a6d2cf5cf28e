pub mod auth;
pub mod blob;
pub mod feedback;
pub mod file;
pub mod points;
pub mod purchase;
