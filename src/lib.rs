//! mediascout - media stream discovery
//!
//! The binary drives [`ms_discover`] sessions through the ffprobe runtime.
//! This library crate exposes the report rendering for integration testing.

pub mod report;
