//! Shared types and models for the retail inventory ledger
//!
//! This crate contains the domain types, document lifecycles and validation
//! rules shared by the backend and any other component of the system.

pub mod lifecycle;
pub mod models;
pub mod types;
pub mod validation;

pub use lifecycle::*;
pub use models::*;
pub use types::*;
pub use validation::*;
