//! Utility functions and types

pub mod eigen;
pub mod metric;
pub mod vector;

pub use eigen::SymmetricEigen;
pub use metric::DistanceMetric;
pub use vector::VectorOps;

use std::time::{Duration, Instant};

/// Wall-clock timer for stage logging
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed().as_secs_f64() * 1000.0
    }
}
