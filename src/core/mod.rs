//! Core types for request metering
//!
//! This module contains the fundamental types used throughout the system:
//! - Event: one recorded request arrival (URL + timestamp)
//! - EventPool: insertion-ordered pool answering trailing-window counts

pub mod event;
pub mod pool;

pub use event::{Event, METER_WINDOW};
pub use pool::EventPool;
