//! Domain models for the retail inventory ledger

mod audit;
mod catalog;
mod purchase;
mod sale;
mod stock;
mod transfer;

pub use audit::*;
pub use catalog::*;
pub use purchase::*;
pub use sale::*;
pub use stock::*;
pub use transfer::*;
