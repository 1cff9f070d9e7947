//! Data Transfer Objects
//!
//! Request bodies accepted by the HTTP surface and transient values that only
//! live for the duration of a sync pass.

pub mod build;
pub mod pipeline;
