//! Common types shared by the radar frame crates and services.

pub mod bbox;
pub mod error;
pub mod naming;
pub mod time;

pub use bbox::{BoundsParseError, GeoBounds};
pub use error::{FrameError, FrameResult};
pub use naming::{CandidateLocation, FrameNaming};
pub use time::{Cadence, FrameTimestamp, TimeError};
