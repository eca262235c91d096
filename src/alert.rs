//! Alert policy per track.
//!
//! Two alert classes, each with its own cool-down. Overspeed alerts wait for a
//! plate when none is known yet; waiting tracks sit in a pending set that is
//! swept once per frame and released as soon as a plate shows up or the track
//! has gone quiet long enough that no plate is likely to follow.

use std::collections::{BTreeSet, HashMap};

use serde_derive::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Error;
use crate::state::VehicleTrackState;
use crate::TrackId;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertClass {
    Identity,
    Overspeed,
}

/// Payload handed to the notification transport.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AlertEvent {
    #[serde(rename = "tracker_id")]
    pub track_id: TrackId,
    #[serde(rename = "speed")]
    pub speed_kmh: f32,
    /// Empty when no plate is known.
    #[serde(rename = "number_plate")]
    pub plate_text: String,
    pub class: AlertClass,
    pub timestamp: f64,
}

impl AlertEvent {
    fn new(
        track_id: TrackId,
        class: AlertClass,
        speed_kmh: f32,
        state: &VehicleTrackState,
        now: f64,
    ) -> Self {
        Self {
            track_id,
            speed_kmh,
            plate_text: state.plate().to_string(),
            class,
            timestamp: now,
        }
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Where a track stands, derived from its timestamps and the pending set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertPhase {
    Quiet,
    IdentityCoolingDown,
    OverspeedCoolingDown,
    PendingIdentity,
}

#[derive(Debug, Clone)]
pub struct AlertScheduler {
    overspeed_threshold: f32,
    cooldown: f64,
    freeze_threshold: f32,
    stale_after: f64,
    pending: BTreeSet<TrackId>,
}

impl AlertScheduler {
    pub fn new(
        overspeed_threshold: f32,
        cooldown: f64,
        freeze_threshold: f32,
        stale_after: f64,
    ) -> Self {
        Self {
            overspeed_threshold,
            cooldown,
            freeze_threshold,
            stale_after,
            pending: BTreeSet::new(),
        }
    }

    #[inline]
    fn cooled_down(&self, last: Option<f64>, now: f64) -> bool {
        last.map_or(true, |t| now - t >= self.cooldown)
    }

    /// Runs both rules for a track whose speed or identity just changed.
    /// `speed` is this frame's estimate; without one only the identity rule
    /// runs. `observed_confidence` is the best plate confidence read this frame.
    pub fn evaluate(
        &mut self,
        track_id: TrackId,
        state: &mut VehicleTrackState,
        speed: Option<f32>,
        observed_confidence: f32,
        now: f64,
        out: &mut Vec<AlertEvent>,
    ) {
        self.check_identity(track_id, state, now, out);

        if let Some(speed) = speed {
            self.check_overspeed(track_id, state, speed, observed_confidence, now, out);
        }
    }

    pub fn check_identity(
        &self,
        track_id: TrackId,
        state: &mut VehicleTrackState,
        now: f64,
        out: &mut Vec<AlertEvent>,
    ) -> bool {
        if !state.has_plate() || !self.cooled_down(state.last_identity_alert, now) {
            return false;
        }

        state.last_identity_alert = Some(now);

        let speed = state.alert_speed();
        let event = AlertEvent::new(track_id, AlertClass::Identity, speed, state, now);
        info!(track_id, plate = %event.plate_text, "identity alert");
        out.push(event);

        true
    }

    /// Returns true when an alert was emitted, false when nothing happened or
    /// the track was deferred.
    pub fn check_overspeed(
        &mut self,
        track_id: TrackId,
        state: &mut VehicleTrackState,
        speed: f32,
        observed_confidence: f32,
        now: f64,
        out: &mut Vec<AlertEvent>,
    ) -> bool {
        if speed <= self.overspeed_threshold || speed.is_nan() {
            return false;
        }

        if !self.cooled_down(state.last_overspeed_alert, now) {
            return false;
        }

        if state.has_plate() || observed_confidence > self.freeze_threshold {
            self.pending.remove(&track_id);
            self.emit_overspeed(track_id, state, speed, now, out);
            return true;
        }

        if self.pending.insert(track_id) {
            debug!(track_id, speed, "overspeed deferred until plate is known");
        }

        false
    }

    fn emit_overspeed(
        &self,
        track_id: TrackId,
        state: &mut VehicleTrackState,
        speed: f32,
        now: f64,
        out: &mut Vec<AlertEvent>,
    ) {
        state.last_overspeed_alert = Some(now);

        let event = AlertEvent::new(track_id, AlertClass::Overspeed, speed, state, now);
        info!(track_id, speed, plate = %event.plate_text, "overspeed alert");
        out.push(event);
    }

    /// Releases deferred overspeed alerts. A pending track is dispatched with
    /// its maximum speed once it has a plate, a near certain plate confidence,
    /// or has not been seen for the staleness interval. Tracks that vanished
    /// from `states` or got alerted in the meantime leave the set silently.
    pub fn sweep(
        &mut self,
        states: &mut HashMap<TrackId, VehicleTrackState>,
        now: f64,
        out: &mut Vec<AlertEvent>,
    ) {
        let pending = std::mem::take(&mut self.pending);

        for track_id in pending {
            let state = match states.get_mut(&track_id) {
                Some(state) => state,
                None => continue,
            };

            if !self.cooled_down(state.last_overspeed_alert, now) {
                continue;
            }

            let release = state.has_plate()
                || state.idle_for(now) >= self.stale_after
                || state.plate_confidence > self.freeze_threshold;

            if release {
                let speed = state.max_speed;
                self.emit_overspeed(track_id, state, speed, now, out);
            } else {
                self.pending.insert(track_id);
            }
        }
    }

    #[inline]
    pub fn is_pending(&self, track_id: TrackId) -> bool {
        self.pending.contains(&track_id)
    }

    /// Pending track ids in ascending order.
    #[inline]
    pub fn pending(&self) -> impl Iterator<Item = TrackId> + '_ {
        self.pending.iter().copied()
    }

    #[inline]
    pub fn forget(&mut self, track_id: TrackId) {
        self.pending.remove(&track_id);
    }

    pub fn phase(&self, track_id: TrackId, state: &VehicleTrackState, now: f64) -> AlertPhase {
        if self.is_pending(track_id) {
            AlertPhase::PendingIdentity
        } else if !self.cooled_down(state.last_overspeed_alert, now) {
            AlertPhase::OverspeedCoolingDown
        } else if !self.cooled_down(state.last_identity_alert, now) {
            AlertPhase::IdentityCoolingDown
        } else {
            AlertPhase::Quiet
        }
    }
}
