use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb};
use crate::TrackId;

/// Vehicle box as reported by the external tracker.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    #[serde(rename = "id")]
    pub track_id: TrackId,
    pub bbox: BBox<Ltrb>,
    #[serde(rename = "p", default)]
    pub confidence: f32,
    #[serde(rename = "c", default)]
    pub class: i32,
}

impl Detection {
    #[inline]
    pub fn new(track_id: TrackId, bbox: BBox<Ltrb>) -> Self {
        Self {
            track_id,
            bbox,
            confidence: 1.0,
            class: 0,
        }
    }
}

/// Plate region from the external plate detector, with the recognizer's text
/// (characters already ordered left to right) when it produced any.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PlateRegion {
    pub bbox: BBox<Ltrb>,
    #[serde(rename = "p", default)]
    pub confidence: f32,
    #[serde(default)]
    pub text: Option<String>,
}

impl PlateRegion {
    #[inline]
    pub fn new(bbox: BBox<Ltrb>, text: impl Into<String>) -> Self {
        Self {
            bbox,
            confidence: 1.0,
            text: Some(text.into()),
        }
    }
}

/// Pairs every plate with each vehicle whose box fully contains it. Vehicles
/// are visited in order, plates in order within each vehicle.
pub fn associate_plates<'a>(
    vehicles: &[Detection],
    plates: &'a [PlateRegion],
) -> Vec<(TrackId, &'a PlateRegion)> {
    let mut pairs = Vec::new();

    for vehicle in vehicles {
        for plate in plates {
            if vehicle.bbox.contains(&plate.bbox) {
                pairs.push((vehicle.track_id, plate));
            }
        }
    }

    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plates_follow_their_vehicle() {
        let vehicles = [
            Detection::new(1, BBox::ltrb(0.0, 0.0, 100.0, 100.0)),
            Detection::new(2, BBox::ltrb(200.0, 0.0, 300.0, 100.0)),
        ];
        let plates = [
            PlateRegion::new(BBox::ltrb(220.0, 80.0, 260.0, 95.0), "PB11DB4699"),
            PlateRegion::new(BBox::ltrb(20.0, 80.0, 60.0, 95.0), "HR01AR4949"),
            // straddles both boxes, belongs to neither
            PlateRegion::new(BBox::ltrb(90.0, 80.0, 210.0, 95.0), "XX00XX0000"),
        ];

        let pairs = associate_plates(&vehicles, &plates);
        let ids: Vec<_> = pairs
            .iter()
            .map(|(id, p)| (*id, p.text.as_deref().unwrap_or("")))
            .collect();

        assert_eq!(ids, vec![(1, "HR01AR4949"), (2, "PB11DB4699")]);
    }

    #[test]
    fn nested_vehicles_share_a_plate() {
        let vehicles = [
            Detection::new(1, BBox::ltrb(0.0, 0.0, 100.0, 100.0)),
            Detection::new(2, BBox::ltrb(10.0, 10.0, 90.0, 90.0)),
        ];
        let plates = [PlateRegion::new(BBox::ltrb(30.0, 60.0, 70.0, 80.0), "PB01A4470")];

        let pairs = associate_plates(&vehicles, &plates);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].0, 1);
        assert_eq!(pairs[1].0, 2);
    }

    #[test]
    fn deserializes_compact_form() {
        let det: Detection =
            serde_json::from_str(r#"{"id": 7, "bbox": [1, 2, 3, 4], "p": 0.5}"#).unwrap();
        assert_eq!(det.track_id, 7);
        assert_eq!(det.bbox.as_slice(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(det.class, 0);
    }
}
