//! Phone Number Validation Service
//!
//! This library provides the core functionality for the
//! phone-validator-api system: bulk phone number validation over an
//! external engine invoked as a subprocess with a file-based protocol.
//! Bulk uploads become queued jobs with polled status; manually
//! entered numbers run inline through the same engine pass.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
