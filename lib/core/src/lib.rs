//! Core types shared across the gatehouse crates.
//!
//! This crate provides the foundational identifier types and the
//! rootcause-based `Result` alias used by the stores and the server.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ParseIdError, SessionId};
