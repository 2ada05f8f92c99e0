use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::time::EpochSeconds;

/// The exhaustive taxonomy of non-fatal parse errors. Every dropped or
/// repaired item the sanitiser (or the decoder it wraps) encounters is
/// tagged with exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorKind {
    ParsingIntoProtobufRaisedException,
    ParsingIntoProtobufRaisedRuntimeWarning,
    FeedUpdateHasNullTimestamp,
    FeedUpdatesWithDuplicateTimestamps,
    FeedUpdateGoesBackwardsInTime,
    MessageWithNullTripId,
    TripHasTripUpdateWithNoStopsRemaining,
    TripIdWithTripUpdateButNoVehicleUpdate,
}

impl ParseErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ParseErrorKind::ParsingIntoProtobufRaisedException => {
                "parsing_into_protobuf_raised_exception"
            }
            ParseErrorKind::ParsingIntoProtobufRaisedRuntimeWarning => {
                "parsing_into_protobuf_raised_runtime_warning"
            }
            ParseErrorKind::FeedUpdateHasNullTimestamp => "feed_update_has_null_timestamp",
            ParseErrorKind::FeedUpdatesWithDuplicateTimestamps => {
                "feed_updates_with_duplicate_timestamps"
            }
            ParseErrorKind::FeedUpdateGoesBackwardsInTime => "feed_update_goes_backwards_in_time",
            ParseErrorKind::MessageWithNullTripId => "message_with_null_trip_id",
            ParseErrorKind::TripHasTripUpdateWithNoStopsRemaining => {
                "trip_has_trip_update_with_no_stops_remaining"
            }
            ParseErrorKind::TripIdWithTripUpdateButNoVehicleUpdate => {
                "trip_id_with_trip_update_but_no_vehicle_update"
            }
        }
    }
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single accumulated, non-fatal parse error: a taxonomy tag plus a
/// free-form detail bag (update index, timestamp(s), trip id(s), ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub details: Map<String, Value>,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind) -> Self {
        Self {
            kind,
            details: Map::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_owned(), value.into());
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:?}", self.kind, self.details)
    }
}

impl std::error::Error for ParseError {}

/// The only fatal conditions this crate raises: caller errors, not feed
/// noise. `logify` never returns one of these — ill-formed feed data always
/// degrades to a `ParseError` instead. Only the merger, given a caller-
/// supplied window ordering that doesn't hold together, raises one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    NonContiguousWindows {
        earlier_max: EpochSeconds,
        later_min: EpochSeconds,
    },
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeError::NonContiguousWindows {
                earlier_max,
                later_min,
            } => write!(
                f,
                "merge windows overlap: earlier window's last observation at {} is not before the later window's first observation at {}",
                earlier_max, later_min
            ),
        }
    }
}

impl std::error::Error for MergeError {}
