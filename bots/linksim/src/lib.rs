//! Demo outreach bot against the scripted session backend.

pub mod campaign;
pub mod config;
pub mod session;
