//! Per-track plate identity from noisy OCR reads.
//!
//! Each read is matched against a registry of known plates. The best match is
//! kept per track and only replaced by a match at least as similar; once a
//! track's match is near certain it is frozen.

use std::collections::HashMap;

use serde_derive::Serialize;

use crate::similarity;
use crate::TrackId;

/// Result of feeding one OCR read to the resolver. Empty text with zero
/// confidence means the read was rejected.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct PlateReading {
    pub text: String,
    pub confidence: f32,
}

impl PlateReading {
    #[inline]
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }

    #[inline]
    pub fn rejected() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Committed match for one track.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PlateHistoryEntry {
    pub plate_text: String,
    pub similarity: f32,
    pub updated_at: f64,
}

impl From<&PlateHistoryEntry> for PlateReading {
    fn from(e: &PlateHistoryEntry) -> Self {
        PlateReading::new(e.plate_text.clone(), e.similarity)
    }
}

#[derive(Debug, Clone)]
pub struct PlateIdentityResolver {
    reference: Vec<String>,
    history: HashMap<TrackId, PlateHistoryEntry>,
    min_len: usize,
    commit_threshold: f32,
    freeze_threshold: f32,
}

impl PlateIdentityResolver {
    pub fn new(min_len: usize, commit_threshold: f32, freeze_threshold: f32) -> Self {
        Self {
            reference: Vec::new(),
            history: HashMap::new(),
            min_len,
            commit_threshold,
            freeze_threshold,
        }
    }

    pub fn with_reference_plates<I, S>(mut self, plates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.add_reference_plates(plates);
        self
    }

    /// Registry entries are stored uppercase, in insertion order.
    pub fn add_reference_plates<I, S>(&mut self, plates: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.reference
            .extend(plates.into_iter().map(|p| p.as_ref().to_uppercase()));
    }

    #[inline]
    pub fn reference_plates(&self) -> &[String] {
        &self.reference
    }

    /// Alphanumeric only and at least `min_len` characters.
    pub fn is_valid(&self, text: &str) -> bool {
        !text.is_empty()
            && text.chars().all(char::is_alphanumeric)
            && text.chars().count() >= self.min_len
    }

    /// Most similar registry entry; the first of equally similar entries wins.
    pub fn best_match(&self, text: &str) -> Option<(&str, f32)> {
        let mut best: Option<(&str, f32)> = None;

        for plate in &self.reference {
            let similarity = similarity::ratio(text, plate);

            if similarity > best.map_or(0.0, |(_, s)| s) {
                best = Some((plate.as_str(), similarity));
            }
        }

        best
    }

    pub fn update(&mut self, track_id: TrackId, raw: &str, now: f64) -> PlateReading {
        if raw.is_empty() {
            return PlateReading::rejected();
        }

        let text = raw.to_uppercase();
        if !self.is_valid(&text) {
            tracing::trace!(track_id, raw, "plate read rejected");
            return PlateReading::rejected();
        }

        if let Some(entry) = self.history.get(&track_id) {
            if entry.similarity > self.freeze_threshold {
                return entry.into();
            }
        }

        let (matched, similarity) = match self.best_match(&text) {
            Some((plate, similarity)) => (Some(plate.to_string()), similarity),
            None => (None, 0.0),
        };

        if let Some(entry) = self.history.get(&track_id) {
            if entry.similarity > similarity {
                return entry.into();
            }
        }

        match matched {
            Some(plate) if similarity > self.commit_threshold => {
                tracing::debug!(
                    track_id,
                    read = %text,
                    plate = %plate,
                    similarity,
                    "plate committed"
                );

                self.history.insert(
                    track_id,
                    PlateHistoryEntry {
                        plate_text: plate.clone(),
                        similarity,
                        updated_at: now,
                    },
                );

                PlateReading::new(plate, similarity)
            }
            _ => PlateReading::new(text, similarity),
        }
    }

    #[inline]
    pub fn entry(&self, track_id: TrackId) -> Option<&PlateHistoryEntry> {
        self.history.get(&track_id)
    }

    #[inline]
    pub fn history(&self) -> impl Iterator<Item = (&TrackId, &PlateHistoryEntry)> {
        self.history.iter()
    }

    #[inline]
    pub fn forget(&mut self, track_id: TrackId) {
        self.history.remove(&track_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(plates: &[&str]) -> PlateIdentityResolver {
        PlateIdentityResolver::new(7, 0.75, 0.95).with_reference_plates(plates.iter())
    }

    #[test]
    fn corrects_single_character_error() {
        let mut r = resolver(&["AB12CD3456"]);
        let reading = r.update(1, "AB12CD3455", 0.0);

        assert_eq!(reading.text, "AB12CD3456");
        assert!(reading.confidence >= 0.75);
        assert_eq!(r.entry(1).unwrap().plate_text, "AB12CD3456");
    }

    #[test]
    fn rejects_short_empty_and_symbols() {
        let mut r = resolver(&["AB12CD3456"]);

        assert_eq!(r.update(1, "X1", 0.0), PlateReading::new("", 0.0));
        assert_eq!(r.update(1, "", 0.0), PlateReading::rejected());
        assert_eq!(r.update(1, "AB12-CD3456", 0.0), PlateReading::rejected());
        assert!(r.entry(1).is_none());
    }

    #[test]
    fn normalizes_case() {
        let mut r = resolver(&["pb11db4699"]);
        assert_eq!(r.reference_plates(), &["PB11DB4699".to_string()]);

        let reading = r.update(4, "pb11db4699", 0.0);
        assert_eq!(reading, PlateReading::new("PB11DB4699", 1.0));
    }

    #[test]
    fn weak_match_returns_raw_text_uncommitted() {
        let mut r = resolver(&["HR01AR4949"]);
        let reading = r.update(2, "ZZ99QQ0000", 0.0);

        assert_eq!(reading.text, "ZZ99QQ0000");
        assert!(reading.confidence <= 0.75);
        assert!(r.entry(2).is_none());
    }

    #[test]
    fn empty_registry_never_commits() {
        let mut r = resolver(&[]);
        assert_eq!(r.update(2, "PB11DB4699", 0.0), PlateReading::new("PB11DB4699", 0.0));
        assert!(r.entry(2).is_none());
    }

    #[test]
    fn confidence_never_regresses() {
        let mut r = resolver(&["AB12CD3456", "PB11DB4699"]);

        let first = r.update(3, "AB12CD3455", 0.0);
        assert_eq!(first.text, "AB12CD3456");

        // a worse read of another plate keeps the stored identity
        let second = r.update(3, "PB11XX4699", 1.0);
        assert_eq!(second, first);
        assert_eq!(r.entry(3).unwrap().updated_at, 0.0);

        let mut last = 0.0;
        for (i, raw) in ["AB12CD3455", "AB12CD0000", "AB12CD3456", "ZZZZZZZZZ"]
            .iter()
            .enumerate()
        {
            let reading = r.update(3, raw, i as f64);
            assert!(reading.confidence >= last, "{} regressed", raw);
            last = reading.confidence;
        }
    }

    #[test]
    fn frozen_identity_ignores_new_reads() {
        let mut r = resolver(&["AB12CD3456", "PB11DB4699"]);

        assert_eq!(r.update(5, "AB12CD3456", 0.0).confidence, 1.0);

        let reading = r.update(5, "PB11DB4699", 1.0);
        assert_eq!(reading, PlateReading::new("AB12CD3456", 1.0));
    }

    #[test]
    fn first_of_equal_matches_wins() {
        let r = resolver(&["AB12CD3450", "AB12CD3451"]);
        let (plate, similarity) = r.best_match("AB12CD3459").unwrap();

        assert_eq!(plate, "AB12CD3450");
        assert!((similarity - 0.9).abs() < 1e-6);
    }

    #[test]
    fn tracks_do_not_share_history() {
        let mut r = resolver(&["AB12CD3456"]);
        r.update(1, "AB12CD3456", 0.0);

        assert!(r.entry(2).is_none());
        r.forget(1);
        assert!(r.entry(1).is_none());
        assert_eq!(r.history().count(), 0);
    }
}
