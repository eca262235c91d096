use thiserror::Error;

use crate::TrackId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Calibration quadrilateral is degenerate: homography could not be solved")]
    DegenerateCalibration,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Alert transport failed: {0}")]
    Transport(String),

    #[error("Alert queue is full, alert for track {0} dropped")]
    QueueFull(TrackId),

    #[error("Alert queue is closed")]
    QueueClosed,
}
