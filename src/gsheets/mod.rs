pub mod auth;
pub mod client;
pub mod error;
pub mod layout;

pub use client::{ClientBuilder, DEFAULT_SHEET};
pub use error::ExportError;
