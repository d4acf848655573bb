pub mod auth;
pub mod cli;
pub mod email_content;
pub mod error;
pub mod format;
pub mod gmail_api;
pub mod types;

pub use error::Error;
