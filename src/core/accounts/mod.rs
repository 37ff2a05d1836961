// src/core/accounts/mod.rs

//! The account directory: the account model, the snapshot loader, and the shared
//! registry that enforces one live session per account.

pub mod account;
pub mod loader;
pub mod registry;

pub use account::{Account, AccountStatus};
pub use loader::{load, load_from_file};
pub use registry::{AccountRegistry, LoginOutcome};
