//! Auraflix - video upload and range streaming server
//!
//! This library crate exposes the server, catalog and configuration for
//! integration testing. Media handling lives in `auraflix-media`.

pub mod catalog;
pub mod config;
pub mod server;
