//! Silica: headless 2D collision demo and its configuration
//!
//! The engine crates live under `crates/`; this package wires them to a
//! layered configuration and a fixed-step simulation loop.

pub mod config;
pub mod scene;
pub mod systems;
