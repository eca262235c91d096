use serde_derive::Serialize;

/// Everything known about one tracked vehicle.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct VehicleTrackState {
    /// Speed samples in km/h, oldest first. Unbounded unless a history limit
    /// is configured.
    pub speeds: Vec<f32>,
    pub sample_count: usize,
    pub max_speed: f32,
    pub current_speed: Option<f32>,

    pub plate_text: Option<String>,
    pub plate_confidence: f32,

    pub last_identity_alert: Option<f64>,
    pub last_overspeed_alert: Option<f64>,

    pub first_seen: f64,
    pub last_update: f64,
}

impl VehicleTrackState {
    pub fn new(now: f64) -> Self {
        Self {
            speeds: Vec::new(),
            sample_count: 0,
            max_speed: 0.0,
            current_speed: None,
            plate_text: None,
            plate_confidence: 0.0,
            last_identity_alert: None,
            last_overspeed_alert: None,
            first_seen: now,
            last_update: now,
        }
    }

    #[inline]
    pub fn touch(&mut self, now: f64) {
        self.last_update = now;
    }

    /// Appends a sample, dropping the oldest ones beyond `limit`. Negative or
    /// non-finite samples are ignored.
    pub fn record_speed(&mut self, speed: f32, limit: Option<usize>) {
        if !speed.is_finite() || speed < 0.0 {
            return;
        }

        self.speeds.push(speed);
        self.sample_count += 1;
        self.current_speed = Some(speed);

        if speed > self.max_speed {
            self.max_speed = speed;
        }

        if let Some(limit) = limit {
            if self.speeds.len() > limit {
                let excess = self.speeds.len() - limit;
                self.speeds.drain(..excess);
            }
        }
    }

    #[inline]
    pub fn has_plate(&self) -> bool {
        self.plate_text.as_deref().map_or(false, |p| !p.is_empty())
    }

    #[inline]
    pub fn plate(&self) -> &str {
        self.plate_text.as_deref().unwrap_or("")
    }

    /// Adopts a reading when no identity is set yet or when it is more
    /// confident than the current one. Returns whether it was adopted.
    pub fn offer_plate(&mut self, text: &str, confidence: f32) -> bool {
        if text.is_empty() {
            return false;
        }

        if self.plate_text.is_none() || confidence > self.plate_confidence {
            self.plate_text = Some(text.to_string());
            self.plate_confidence = confidence.max(self.plate_confidence);
            return true;
        }

        false
    }

    /// Speed to report in an alert: the latest sample, or the maximum when
    /// there is none yet.
    #[inline]
    pub fn alert_speed(&self) -> f32 {
        self.current_speed.unwrap_or(self.max_speed)
    }

    #[inline]
    pub fn idle_for(&self, now: f64) -> f64 {
        now - self.last_update
    }
}
