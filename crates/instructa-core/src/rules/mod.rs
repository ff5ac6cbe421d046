//! Validation rules applied before any SQL is composed

pub mod batch;
pub mod identifier;

pub use batch::validate_batch;
pub use identifier::{quote_identifier, validate_identifier};
