// ABOUTME: Library root for rollsafe - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod deploy;
pub mod diagnostics;
pub mod error;
pub mod health;
pub mod http;
pub mod output;
pub mod platform;
pub mod smoke;
pub mod types;
