use std::collections::HashMap;

use serde_derive::{Deserialize, Serialize};

use crate::circular_queue::CircularQueue;
use crate::TrackId;

const MPS_TO_KMH: f32 = 3.6;

/// How the time covered by a window is measured.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SpeedTiming {
    /// `samples / frame_rate`, assumes every frame of the track was observed.
    #[default]
    FrameCount,
    /// Difference between the newest and the oldest sample timestamps.
    Timestamps,
}

/// Ground-plane position sample: `y` along the road and when it was seen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundPosition {
    pub y: f32,
    pub ts: f64,
}

/// Speed from the endpoints of a per-track rolling window of ground positions.
#[derive(Debug, Clone)]
pub struct SpeedEstimator {
    frame_rate: f32,
    capacity: usize,
    timing: SpeedTiming,
    windows: HashMap<TrackId, CircularQueue<GroundPosition>>,
}

impl SpeedEstimator {
    pub fn new(frame_rate: f32, capacity: usize, timing: SpeedTiming) -> Self {
        Self {
            frame_rate,
            capacity: capacity.max(1),
            timing,
            windows: HashMap::new(),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples needed before a speed is reported: half the window, rounded up.
    #[inline]
    pub fn warmup(&self) -> usize {
        (self.capacity + 1) / 2
    }

    /// Pushes a sample and returns the speed in km/h, or `None` while the
    /// window is still warming up. Ground units are taken as meters.
    ///
    /// A non-finite position (an anchor on or beyond the horizon line) is not
    /// stored and yields `None`.
    pub fn update(&mut self, track_id: TrackId, ground_y: f32, ts: f64) -> Option<f32> {
        if !ground_y.is_finite() {
            return None;
        }

        let capacity = self.capacity;
        let warmup = self.warmup();
        let window = self
            .windows
            .entry(track_id)
            .or_insert_with(|| CircularQueue::with_capacity(capacity));

        window.push(GroundPosition { y: ground_y, ts });

        if window.len() < warmup {
            return None;
        }

        let newest = window.newest()?;
        let oldest = window.oldest()?;
        let distance = (newest.y - oldest.y).abs();

        let elapsed = match self.timing {
            SpeedTiming::FrameCount => {
                if !(self.frame_rate > 0.0) {
                    return None;
                }

                window.len() as f32 / self.frame_rate
            }
            SpeedTiming::Timestamps => (newest.ts - oldest.ts) as f32,
        };

        if !(elapsed > 0.0) {
            return None;
        }

        Some(distance / elapsed * MPS_TO_KMH)
    }

    /// Number of samples currently held for the track.
    #[inline]
    pub fn samples(&self, track_id: TrackId) -> usize {
        self.windows.get(&track_id).map_or(0, |w| w.len())
    }

    #[inline]
    pub fn window(&self, track_id: TrackId) -> Option<impl Iterator<Item = &GroundPosition>> {
        self.windows.get(&track_id).map(|w| w.asc_iter())
    }

    /// Drops the window; a later sample for the same id starts from empty.
    #[inline]
    pub fn forget(&mut self, track_id: TrackId) {
        self.windows.remove(&track_id);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}
