//! Utility functions and helpers.

pub mod kql;
pub mod template;

pub use kql::KqlCommandKind;
