use serde_derive::{Deserialize, Serialize};

use crate::detection::{Detection, PlateRegion};

/// Everything the external detectors produced for one video frame.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Frame {
    pub timestamp: f64, // in seconds
    #[serde(default)]
    pub vehicles: Vec<Detection>,
    #[serde(default)]
    pub plates: Vec<PlateRegion>,
}

impl Frame {
    #[inline]
    pub fn new(timestamp: f64) -> Self {
        Self {
            timestamp,
            ..Default::default()
        }
    }

    #[inline]
    pub fn with_vehicle(mut self, det: Detection) -> Self {
        self.vehicles.push(det);
        self
    }

    #[inline]
    pub fn with_plate(mut self, plate: PlateRegion) -> Self {
        self.plates.push(plate);
        self
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Detection> {
        self.vehicles.iter()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }
}
