//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep controller layers decoupled from storage details.

pub mod org_form;
pub mod org_selection;
pub mod org_service;
pub mod shibboleth_service;
