//! Core type definitions used across the TeamHub workspace.

pub mod id;

pub use id::*;
