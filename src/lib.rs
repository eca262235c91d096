pub mod alert;
pub mod bbox;
pub mod config;
pub mod detection;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod plate;
pub mod similarity;
pub mod speed;
pub mod state;
pub mod view_transform;

mod circular_queue;

pub use alert::{AlertClass, AlertEvent, AlertPhase, AlertScheduler};
pub use config::Config;
pub use detection::{Detection, PlateRegion};
pub use dispatch::{AlertDispatcher, AlertTransport, LogTransport};
pub use error::Error;
pub use frame::Frame;
pub use pipeline::Pipeline;
pub use plate::{PlateIdentityResolver, PlateReading};
pub use speed::{SpeedEstimator, SpeedTiming};
pub use state::VehicleTrackState;
pub use view_transform::ViewTransform;

use nalgebra as na;
use std::fmt;

/// Identifier assigned by the external tracker.
pub type TrackId = u64;

pub trait Float:
    num_traits::FromPrimitive + na::RealField + Copy + fmt::Debug + PartialEq + 'static
{
}

impl<T> Float for T where
    T: num_traits::FromPrimitive + na::RealField + Copy + fmt::Debug + PartialEq + 'static
{
}
