//! Fixed-step simulation system
//!
//! Each frame runs the scene's behaviours, then one collision check.

use silica_core::{ColliderError, CollisionStats, Scene, SceneCollider};

/// Counters accumulated over every frame run so far
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SimulationTotals {
    pub frames: u32,
    pub contacts: usize,
    pub callbacks: usize,
    pub callback_failures: usize,
    pub reinserted: usize,
    pub overlap_tests: usize,
}

impl SimulationTotals {
    fn add(&mut self, stats: &CollisionStats) {
        self.frames += 1;
        self.contacts += stats.contacts;
        self.callbacks += stats.callbacks;
        self.callback_failures += stats.callback_failures;
        self.reinserted += stats.reinserted;
        self.overlap_tests += stats.overlap_tests;
    }
}

/// Drives a scene and its collider at a fixed timestep
pub struct SimulationSystem {
    timestep: f32,
    stats_interval: u32,
    totals: SimulationTotals,
}

impl SimulationSystem {
    /// Create a simulation stepping `timestep` seconds per frame
    ///
    /// Stats are logged every `stats_interval` frames; 0 disables them.
    pub fn new(timestep: f32, stats_interval: u32) -> Self {
        Self {
            timestep,
            stats_interval,
            totals: SimulationTotals::default(),
        }
    }

    pub fn timestep(&self) -> f32 {
        self.timestep
    }

    pub fn totals(&self) -> &SimulationTotals {
        &self.totals
    }

    /// Run one frame
    pub fn step(
        &mut self,
        scene: &mut Scene,
        collider: &mut SceneCollider,
    ) -> Result<CollisionStats, ColliderError> {
        scene.update(self.timestep);
        let stats = collider.check_collisions(scene)?;
        self.totals.add(&stats);

        if self.stats_interval > 0 && self.totals.frames % self.stats_interval == 0 {
            log::info!(
                "Frame {}: {} proxies, {} candidate pairs, {} contacts, {} overlap tests, tree height {}",
                self.totals.frames,
                stats.proxies,
                stats.candidate_pairs,
                stats.contacts,
                stats.overlap_tests,
                collider.tree().height()
            );
        }
        Ok(stats)
    }

    /// Run `frames` frames, stopping at the first collider error
    pub fn run(
        &mut self,
        scene: &mut Scene,
        collider: &mut SceneCollider,
        frames: u32,
    ) -> Result<SimulationTotals, ColliderError> {
        for _ in 0..frames {
            self.step(scene, collider)?;
        }
        Ok(self.totals)
    }
}

impl Default for SimulationSystem {
    fn default() -> Self {
        Self::new(1.0 / 60.0, 0)
    }
}
