//! # teamhub-core
//!
//! Core crate for TeamHub. Contains configuration schemas, typed
//! identifiers, the clock abstraction used by presence timing, and the
//! unified error system.
//!
//! This crate has **no** internal dependencies on other TeamHub crates.

pub mod clock;
pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use clock::{Clock, RuntimeClock, SystemClock};
pub use error::AppError;
pub use result::AppResult;
