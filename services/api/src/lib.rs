//! services/api/src/lib.rs
//!
//! The `api` service: configuration, adapters for the core ports and the HTTP layer.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
