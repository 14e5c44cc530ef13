//! Optional HTTP client for the extraction and estimation collaborator.

pub mod client;
pub mod types;

pub use client::*;
pub use types::*;
