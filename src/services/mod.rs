pub mod auth;
pub mod feedback;
pub mod file;
pub mod points;
pub mod purchase;

#[cfg(test)]
pub(crate) mod testutil;

pub use auth::AuthService;
pub use feedback::FeedbackService;
pub use file::FileService;
pub use points::LedgerService;
pub use purchase::PurchaseService;
