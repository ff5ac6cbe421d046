//! Core types shared across instructa facilities
//!
//! This crate provides foundational constants used by both error handling
//! and logging facilities:
//!
//! - **Schema constants**: Canonical field keys and event names

pub mod schema;
