//! Shared utilities for Altara
//!
//! This crate provides common functionality used across the Altara workspace:
//! tracing setup and credential loading from the environment.

pub mod config;
pub mod logging;

pub use config::{Credentials, env_var};
pub use logging::{LogFormat, init_tracing, init_tracing_with};
