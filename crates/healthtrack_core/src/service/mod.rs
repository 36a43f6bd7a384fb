//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository and snapshot calls into use-case level APIs.
//! - Keep the routing layer decoupled from storage details.

pub mod workout_service;
