pub mod action;
pub mod error;
pub mod log;
pub mod logbook;
pub mod message;
pub mod time;
pub mod update;

pub use action::{Action, ActionKind};
pub use error::{MergeError, ParseError, ParseErrorKind};
pub use log::Log;
pub use logbook::{Logbook, TimestampMap, UniqueTripId};
pub use message::{IndexedTrip, RawMessage, StopTimeUpdate, VehicleStatus};
pub use time::EpochSeconds;
pub use update::{RawUpdate, SanitisedUpdate};
