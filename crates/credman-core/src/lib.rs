//! Credman Core
//!
//! Core domain types, the error taxonomy, and the canonical secret data
//! model shared by every backend. This crate has minimal dependencies and
//! defines the vocabulary used across the other crates.

pub mod error;
pub mod secret;
pub mod session;

pub use error::{Error, Result};
pub use secret::{CustomField, LoginBlock, Secret, SecretMetadata};
pub use session::{CredentialSpec, ManagerKind, ManagerSession};
