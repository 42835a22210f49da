//! Scene construction utilities
//!
//! This module builds the hero-and-walls collision demo.

mod scene_builder;

pub use scene_builder::{DemoScene, SceneBuilder};
