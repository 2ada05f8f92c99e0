//! Feed Decoder: bytes (or an already-decoded `FeedMessage`) -> `RawUpdate`.
//!
//! The protobuf wire parsing itself is delegated entirely to `prost` and the
//! `gtfs-realtime` crate's generated bindings for the public GTFS-Realtime
//! schema; this module only normalises the two external failure modes into
//! `ParseError`s and flattens the decoded `FeedMessage` into our own
//! `RawMessage` shape.

use gtfs_realtime::vehicle_position::VehicleStopStatus;
use gtfs_realtime::FeedMessage;
use model::{ParseError, ParseErrorKind, RawMessage, RawUpdate, StopTimeUpdate, VehicleStatus};
use prost::Message as _;

/// Raw input to the decoder: either undecoded wire bytes, or a
/// `FeedMessage` a caller has already run through the external protobuf
/// parser themselves. `DecodedWithWarning` lets such a caller tell us their
/// parser flagged partial data loss on an otherwise-successful decode; we
/// treat that the same as a hard failure: partial data loss on a snapshot
/// is worse than no snapshot at all, since the builder would silently infer
/// arrivals from gaps that were never really there.
pub enum FeedInput {
    Bytes(Vec<u8>),
    Decoded(Box<FeedMessage>),
    DecodedWithWarning(Box<FeedMessage>),
}

impl From<Vec<u8>> for FeedInput {
    fn from(bytes: Vec<u8>) -> Self {
        FeedInput::Bytes(bytes)
    }
}

impl From<FeedMessage> for FeedInput {
    fn from(feed: FeedMessage) -> Self {
        FeedInput::Decoded(Box::new(feed))
    }
}

pub fn decode(input: FeedInput) -> Result<RawUpdate, ParseError> {
    match input {
        FeedInput::Bytes(bytes) => match FeedMessage::decode(bytes.as_slice()) {
            Ok(feed) => Ok(flatten(feed)),
            Err(why) => Err(ParseError::new(ParseErrorKind::ParsingIntoProtobufRaisedException)
                .with_detail("reason", why.to_string())),
        },
        FeedInput::Decoded(feed) => Ok(flatten(*feed)),
        FeedInput::DecodedWithWarning(_) => {
            log::warn!("dropping update: upstream decoder raised a runtime warning");
            Err(ParseError::new(
                ParseErrorKind::ParsingIntoProtobufRaisedRuntimeWarning,
            ))
        }
    }
}

fn flatten(feed: FeedMessage) -> RawUpdate {
    let timestamp = feed.header.timestamp.unwrap_or(0) as i64;
    let mut messages = Vec::new();

    for entity in feed.entity {
        if let Some(trip_update) = entity.trip_update {
            let trip_id = trip_update.trip.trip_id.unwrap_or_default();
            let route_id = trip_update.trip.route_id;
            let stops = trip_update
                .stop_time_update
                .into_iter()
                .map(|stu| StopTimeUpdate {
                    stop_id: stu.stop_id.unwrap_or_default(),
                    arrival: stu.arrival.and_then(|event| event.time),
                    departure: stu.departure.and_then(|event| event.time),
                })
                .collect();
            messages.push(RawMessage::TripUpdate {
                trip_id,
                route_id,
                stops,
            });
        }

        if let Some(vehicle) = entity.vehicle {
            let trip_id = vehicle
                .trip
                .as_ref()
                .and_then(|trip| trip.trip_id.clone())
                .unwrap_or_default();
            let stop_id = vehicle.stop_id.clone().unwrap_or_default();
            let current_status = match vehicle.current_status() {
                VehicleStopStatus::StoppedAt => VehicleStatus::StoppedAt,
                VehicleStopStatus::InTransitTo => VehicleStatus::InTransitTo,
                VehicleStopStatus::IncomingAt => VehicleStatus::IncomingAt,
            };
            let message_timestamp = vehicle.timestamp.map(|t| t as i64).unwrap_or(timestamp);
            messages.push(RawMessage::VehicleUpdate {
                trip_id,
                stop_id,
                current_status,
                timestamp: message_timestamp,
            });
        }
    }

    RawUpdate { timestamp, messages }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_bytes_raise_exception_kind() {
        let err = decode(FeedInput::Bytes(vec![0xff, 0x00, 0x01])).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::ParsingIntoProtobufRaisedException);
    }

    #[test]
    fn runtime_warning_is_treated_as_hard_failure() {
        let feed = FeedMessage::default();
        let err = decode(FeedInput::DecodedWithWarning(Box::new(feed))).unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::ParsingIntoProtobufRaisedRuntimeWarning
        );
    }

    #[test]
    fn empty_feed_decodes_to_empty_update() {
        let feed = FeedMessage::default();
        let update = decode(FeedInput::Decoded(Box::new(feed))).unwrap();
        assert_eq!(update.timestamp, 0);
        assert!(update.messages.is_empty());
    }
}
