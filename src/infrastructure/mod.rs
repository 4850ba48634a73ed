//! Infrastructure - cold path only
//!
//! This module contains non-latency-critical code:
//! - Configuration management
//! - Logging

pub mod config;
pub mod logging;
