pub mod feedback;
pub mod file;
pub mod transaction;
pub mod user;

pub use feedback::*;
pub use file::*;
pub use transaction::*;
pub use user::*;
