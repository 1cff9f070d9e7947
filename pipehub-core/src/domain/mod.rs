//! Core domain types
//!
//! This module contains the business entities shared between the provider
//! clients (which produce normalized builds) and the orchestrator (which
//! persists applications, pipelines and users).

pub mod application;
pub mod build;
pub mod parameter;
pub mod pipeline;
pub mod user;
