//! HTTP upload backend.
//!
//! Speaks the `/upload/check`, `/upload/file` and `/upload/merge`
//! endpoints described in [`ferryload_protocol`] using `reqwest`.

pub mod client;

pub use client::{Error, HttpBackend};
