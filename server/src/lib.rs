//! Pulse real-time presence and messaging relay.
//! This crate exposes internal modules for integration testing.
//! The binary entry point is in main.rs.

pub mod config;
pub mod db;
pub mod error;
pub mod presence;
pub mod relay;
pub mod routes;
pub mod state;
pub mod ws;
