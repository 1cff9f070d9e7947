//! Pipehub Core
//!
//! Core types shared by the Pipehub provider clients and the orchestrator.
//!
//! This crate contains:
//! - Domain types: Applications, mirrored Pipelines, normalized builds and users
//! - DTOs: Request bodies and transient values passed between layers

pub mod domain;
pub mod dto;
