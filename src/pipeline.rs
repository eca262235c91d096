use std::collections::HashMap;

use nalgebra as na;
use tracing::{debug, trace};

use crate::alert::{AlertEvent, AlertPhase, AlertScheduler};
use crate::config::Config;
use crate::detection::associate_plates;
use crate::error::Error;
use crate::frame::Frame;
use crate::plate::PlateIdentityResolver;
use crate::speed::SpeedEstimator;
use crate::state::VehicleTrackState;
use crate::view_transform::ViewTransform;
use crate::TrackId;

/// Owns every per-track structure and runs one frame at a time: speed,
/// identity fusion, then alert rules.
pub struct Pipeline {
    config: Config,
    view: ViewTransform<f32>,
    speed: SpeedEstimator,
    plates: PlateIdentityResolver,
    alerts: AlertScheduler,
    states: HashMap<TrackId, VehicleTrackState>,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self, Error> {
        config.validate()?;

        let view =
            ViewTransform::from_arrays(config.calibration.source, config.calibration.target)?;

        let speed = SpeedEstimator::new(
            config.frame_rate,
            config.window_capacity,
            config.speed_timing,
        );

        let plates = PlateIdentityResolver::new(
            config.plate_min_len,
            config.similarity_commit_threshold,
            config.confidence_freeze_threshold,
        )
        .with_reference_plates(&config.reference_plates);

        let alerts = AlertScheduler::new(
            config.overspeed_threshold_kmh,
            config.alert_cooldown_secs,
            config.confidence_freeze_threshold,
            config.pending_stale_secs,
        );

        Ok(Self {
            config,
            view,
            speed,
            plates,
            alerts,
            states: HashMap::new(),
        })
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn add_reference_plates<I, S>(&mut self, plates: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.plates.add_reference_plates(plates);
    }

    pub fn process_frame(&mut self, frame: &Frame) -> Vec<AlertEvent> {
        let now = frame.timestamp;
        let mut out = Vec::new();

        let anchors: Vec<na::Point2<f32>> =
            frame.iter().map(|det| det.bbox.bottom_center()).collect();
        let ground = self.view.transform(&anchors);
        let readings = associate_plates(&frame.vehicles, &frame.plates);

        for (det, pos) in frame.iter().zip(ground) {
            let track_id = det.track_id;
            let state = self
                .states
                .entry(track_id)
                .or_insert_with(|| VehicleTrackState::new(now));

            state.touch(now);

            let speed = self.speed.update(track_id, pos.y, now);
            if let Some(speed) = speed {
                state.record_speed(speed, self.config.speed_history_limit);
            }

            let mut identity_changed = false;
            let mut observed_confidence = 0.0f32;

            for (_, plate) in readings.iter().filter(|(id, _)| *id == track_id) {
                let raw = match plate.text.as_deref() {
                    Some(raw) => raw,
                    None => continue,
                };

                let reading = self.plates.update(track_id, raw, now);
                if reading.is_empty() {
                    continue;
                }

                observed_confidence = observed_confidence.max(reading.confidence);

                if state.offer_plate(&reading.text, reading.confidence) {
                    debug!(
                        track_id,
                        plate = %reading.text,
                        confidence = reading.confidence,
                        "identity updated"
                    );
                    identity_changed = true;
                }
            }

            trace!(track_id, y = pos.y, ?speed, "track observed");

            if speed.is_some() || identity_changed {
                self.alerts.evaluate(
                    track_id,
                    state,
                    speed,
                    observed_confidence,
                    now,
                    &mut out,
                );
            }
        }

        self.alerts.sweep(&mut self.states, now, &mut out);

        out
    }

    /// Releases pending overspeed alerts without a new frame, e.g. from a
    /// timer while the road is empty.
    pub fn sweep(&mut self, now: f64) -> Vec<AlertEvent> {
        let mut out = Vec::new();
        self.alerts.sweep(&mut self.states, now, &mut out);
        out
    }

    /// Removes tracks not observed for longer than `max_age` seconds and
    /// returns their final state. Pending alerts of removed tracks are
    /// dropped, so sweep first if they should still go out.
    pub fn prune_stale(&mut self, now: f64, max_age: f64) -> Vec<(TrackId, VehicleTrackState)> {
        let stale: Vec<TrackId> = self
            .states
            .iter()
            .filter(|(_, s)| s.idle_for(now) > max_age)
            .map(|(id, _)| *id)
            .collect();

        let mut removed = Vec::with_capacity(stale.len());

        for track_id in stale {
            self.speed.forget(track_id);
            self.plates.forget(track_id);
            self.alerts.forget(track_id);

            if let Some(state) = self.states.remove(&track_id) {
                removed.push((track_id, state));
            }
        }

        if !removed.is_empty() {
            debug!(count = removed.len(), "pruned stale tracks");
        }

        removed.sort_by_key(|(id, _)| *id);
        removed
    }

    #[inline]
    pub fn state(&self, track_id: TrackId) -> Option<&VehicleTrackState> {
        self.states.get(&track_id)
    }

    #[inline]
    pub fn states(&self) -> impl Iterator<Item = (&TrackId, &VehicleTrackState)> {
        self.states.iter()
    }

    #[inline]
    pub fn pending(&self) -> impl Iterator<Item = TrackId> + '_ {
        self.alerts.pending()
    }

    pub fn phase(&self, track_id: TrackId, now: f64) -> Option<AlertPhase> {
        let state = self.states.get(&track_id)?;

        Some(self.alerts.phase(track_id, state, now))
    }

    #[inline]
    pub fn resolver(&self) -> &PlateIdentityResolver {
        &self.plates
    }

    #[inline]
    pub fn speed_estimator(&self) -> &SpeedEstimator {
        &self.speed
    }

    #[inline]
    pub fn view_transform(&self) -> &ViewTransform<f32> {
        &self.view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BBox;
    use crate::detection::{Detection, PlateRegion};

    // identity calibration: image coordinates are ground meters
    fn config() -> Config {
        let mut c = Config::default();
        c.calibration.source = [[0., 0.], [1., 0.], [1., 1.], [0., 1.]];
        c.calibration.target = c.calibration.source;
        c.frame_rate = 2.0;
        c.window_capacity = 2;
        c
    }

    fn vehicle(id: TrackId, bottom: f32) -> Detection {
        Detection::new(id, BBox::ltrb(0.0, bottom - 20.0, 40.0, bottom))
    }

    #[test]
    fn empty_frame_touches_nothing() {
        let mut p = Pipeline::new(config()).unwrap();
        assert!(p.process_frame(&Frame::new(0.0)).is_empty());
        assert_eq!(p.states().count(), 0);
    }

    #[test]
    fn creates_state_on_first_sight() {
        let mut p = Pipeline::new(config()).unwrap();
        p.process_frame(&Frame::new(3.0).with_vehicle(vehicle(11, 100.0)));

        let s = p.state(11).unwrap();
        assert_eq!(s.first_seen, 3.0);
        assert_eq!(s.last_update, 3.0);
        assert_eq!(p.speed_estimator().samples(11), 1);
    }

    #[test]
    fn plate_inside_vehicle_sets_identity_and_alerts() {
        let mut p = Pipeline::new(config()).unwrap();
        p.add_reference_plates(["AB12CD3456"]);

        let frame = Frame::new(0.0)
            .with_vehicle(vehicle(4, 100.0))
            .with_plate(PlateRegion::new(BBox::ltrb(5.0, 85.0, 35.0, 95.0), "ab12cd3455"));

        let alerts = p.process_frame(&frame);
        let s = p.state(4).unwrap();

        assert_eq!(s.plate(), "AB12CD3456");
        assert!((s.plate_confidence - 0.9).abs() < 1e-6);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].plate_text, "AB12CD3456");
        assert_eq!(p.phase(4, 1.0), Some(AlertPhase::IdentityCoolingDown));
    }

    #[test]
    fn plate_outside_vehicle_is_ignored() {
        let mut p = Pipeline::new(config()).unwrap();
        p.add_reference_plates(["AB12CD3456"]);

        let frame = Frame::new(0.0)
            .with_vehicle(vehicle(4, 100.0))
            .with_plate(PlateRegion::new(BBox::ltrb(30.0, 85.0, 60.0, 95.0), "AB12CD3456"));

        assert!(p.process_frame(&frame).is_empty());
        assert!(!p.state(4).unwrap().has_plate());
    }

    #[test]
    fn prune_forgets_everything_about_a_track() {
        let mut c = config();
        c.pending_stale_secs = 100.0;
        let mut p = Pipeline::new(c).unwrap();
        p.add_reference_plates(["AB12CD3456"]);

        // track 1 overspeeds without a plate, track 3 gets a committed plate
        p.process_frame(
            &Frame::new(0.0)
                .with_vehicle(vehicle(1, 100.0))
                .with_vehicle(Detection::new(3, BBox::ltrb(200.0, 80.0, 240.0, 100.0)))
                .with_plate(PlateRegion::new(
                    BBox::ltrb(205.0, 85.0, 235.0, 95.0),
                    "AB12CD3456",
                )),
        );
        p.process_frame(&Frame::new(1.0).with_vehicle(vehicle(1, 40.0)));
        assert_eq!(p.pending().collect::<Vec<_>>(), vec![1]);
        assert!(p.resolver().entry(3).is_some());

        p.process_frame(&Frame::new(5.0).with_vehicle(vehicle(2, 10.0)));
        assert_eq!(p.pending().count(), 1);

        let removed = p.prune_stale(5.0, 2.0);
        assert_eq!(removed.iter().map(|(id, _)| *id).collect::<Vec<_>>(), vec![1, 3]);
        assert!((removed[0].1.max_speed - 216.0).abs() < 1e-3);

        assert!(p.state(1).is_none());
        assert!(p.state(3).is_none());
        assert!(p.state(2).is_some());
        assert_eq!(p.speed_estimator().samples(1), 0);
        assert_eq!(p.pending().count(), 0);
        assert!(p.resolver().entry(1).is_none());
        assert!(p.resolver().entry(3).is_none());
        assert!(p.sweep(200.0).is_empty());
    }

    #[test]
    fn invalid_config_is_refused() {
        let mut c = config();
        c.frame_rate = 0.0;
        assert!(matches!(Pipeline::new(c), Err(Error::InvalidConfig(_))));

        let mut c = config();
        c.calibration.source = [[0., 0.]; 4];
        assert!(matches!(Pipeline::new(c), Err(Error::DegenerateCalibration)));
    }
}
