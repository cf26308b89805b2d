//! Subsystems built on the core store: trust, rule inference, enforcement,
//! response rendering and vindication.

pub mod analyzer;
pub mod dik;
pub mod guardrails;
pub mod importer;
pub mod matcher;
pub mod projects;
pub mod responder;
pub mod vindication;
