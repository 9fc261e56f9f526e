//! Slow-start chunk-size window.
//!
//! Every completed chunk reports its round-trip time. Fast round-trips
//! grow the window (quadratically while well under the threshold,
//! linearly close to it); slow ones shrink it. The window never drops
//! below the base unit and never exceeds the configured ceiling.

use std::time::Duration;

use crate::config::WindowConfig;

/// Adaptive chunk-size controller for a single session.
#[derive(Debug, Clone)]
pub struct WindowController {
    config: WindowConfig,
    chunk_size: u64,
    ack_count: u64,
    threshold_ms: u64,
}

impl WindowController {
    /// Starts at one base unit with an ack count of 1.
    pub fn new(config: WindowConfig) -> Self {
        Self {
            chunk_size: config.base_chunk_size,
            ack_count: 1,
            threshold_ms: config.threshold_ms,
            config,
        }
    }

    /// Size of the next chunk to send.
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Consecutive uncongested round-trips plus one.
    pub fn ack_count(&self) -> u64 {
        self.ack_count
    }

    pub fn threshold_ms(&self) -> u64 {
        self.threshold_ms
    }

    /// Feeds one observed round-trip into the window and returns the new
    /// chunk size.
    pub fn record(&mut self, elapsed: Duration) -> u64 {
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let base = self.config.base_chunk_size;
        let threshold = self.threshold_ms;

        if elapsed_ms < threshold {
            // Below three quarters of the threshold: grow by ack^2 units.
            if elapsed_ms.saturating_mul(4) < threshold.saturating_mul(3) {
                let step = self
                    .ack_count
                    .saturating_mul(self.ack_count)
                    .saturating_mul(base);
                self.chunk_size = self.chunk_size.saturating_add(step);
            } else {
                self.chunk_size = self.chunk_size.saturating_add(base);
            }
            self.ack_count = self.ack_count.saturating_add(1);
        } else if elapsed_ms > threshold {
            if self.ack_count == 1 {
                self.chunk_size = (u128::from(self.chunk_size) * 2 / 3) as u64;
            } else {
                self.chunk_size /= 2;
                self.ack_count = 1;
                self.threshold_ms = self.config.threshold_ms;
            }
        }

        self.chunk_size = self
            .chunk_size
            .clamp(base, self.config.max_chunk_size.max(base));
        self.chunk_size
    }
}
