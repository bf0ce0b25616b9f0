//! gatehouse HTTP server.
//!
//! This crate serves the Discord admin login flow and the admin API for the
//! allow-list and Discord settings.

pub mod admin;
pub mod app;
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod error;
