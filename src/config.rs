use std::io::Read;
use std::path::Path;

use serde_derive::{Deserialize, Serialize};

use crate::error::Error;
use crate::speed::SpeedTiming;

/// Image-plane quadrilateral and the ground-plane rectangle it covers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Calibration {
    pub source: [[f32; 2]; 4],
    pub target: [[f32; 2]; 4],
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            source: [[576., 555.], [1054., 512.], [3080., 1155.], [1017., 1493.]],
            // 2 m wide, 38 m long stretch of lane
            target: [[0., 0.], [2., 0.], [2., 38.], [0., 38.]],
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DispatchConfig {
    pub queue_capacity: usize,
    pub max_attempts: u32,
    /// Delay before the first retry, doubled on every further one.
    pub retry_backoff_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            max_attempts: 3,
            retry_backoff_ms: 500,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub frame_rate: f32,
    pub window_capacity: usize,
    pub speed_timing: SpeedTiming,
    pub speed_history_limit: Option<usize>,

    pub overspeed_threshold_kmh: f32,
    pub alert_cooldown_secs: f64,
    pub pending_stale_secs: f64,

    pub plate_min_len: usize,
    pub similarity_commit_threshold: f32,
    pub confidence_freeze_threshold: f32,
    pub reference_plates: Vec<String>,

    pub calibration: Calibration,
    pub dispatch: DispatchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            frame_rate: 30.0,
            window_capacity: 30,
            speed_timing: SpeedTiming::FrameCount,
            speed_history_limit: None,
            overspeed_threshold_kmh: 30.0,
            alert_cooldown_secs: 30.0,
            pending_stale_secs: 4.0,
            plate_min_len: 7,
            similarity_commit_threshold: 0.75,
            confidence_freeze_threshold: 0.95,
            reference_plates: Vec::new(),
            calibration: Calibration::default(),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl Config {
    /// Reads JSON; missing fields take their defaults.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, Error> {
        let config: Config = serde_json::from_reader(reader)?;
        config.validate()?;

        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = std::fs::File::open(path)?;

        Self::from_reader(std::io::BufReader::new(file))
    }

    pub fn validate(&self) -> Result<(), Error> {
        fn check(ok: bool, msg: &str) -> Result<(), Error> {
            if ok {
                Ok(())
            } else {
                Err(Error::InvalidConfig(msg.to_string()))
            }
        }

        let unit = |x: f32| (0.0..=1.0).contains(&x);

        check(
            self.frame_rate.is_finite() && self.frame_rate > 0.0,
            "frame_rate must be positive",
        )?;
        check(self.window_capacity >= 1, "window_capacity must be at least 1")?;
        check(
            self.speed_history_limit != Some(0),
            "speed_history_limit must be at least 1",
        )?;
        check(
            self.overspeed_threshold_kmh >= 0.0,
            "overspeed_threshold_kmh must not be negative",
        )?;
        check(
            self.alert_cooldown_secs >= 0.0,
            "alert_cooldown_secs must not be negative",
        )?;
        check(
            self.pending_stale_secs >= 0.0,
            "pending_stale_secs must not be negative",
        )?;
        check(
            unit(self.similarity_commit_threshold),
            "similarity_commit_threshold must be within [0, 1]",
        )?;
        check(
            unit(self.confidence_freeze_threshold),
            "confidence_freeze_threshold must be within [0, 1]",
        )?;
        check(
            self.dispatch.queue_capacity >= 1,
            "dispatch.queue_capacity must be at least 1",
        )?;
        check(
            self.dispatch.max_attempts >= 1,
            "dispatch.max_attempts must be at least 1",
        )?;

        Ok(())
    }
}
