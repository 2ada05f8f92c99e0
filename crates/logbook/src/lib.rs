pub mod build;
pub mod config;
pub mod decode;
pub mod index;
pub mod merge;
pub mod ops;
pub mod sanitise;

pub use build::Builder;
pub use config::Config;
pub use decode::FeedInput;
pub use merge::merge;
pub use model::{
    Action, ActionKind, Log, Logbook, MergeError, ParseError, ParseErrorKind, TimestampMap,
    UniqueTripId,
};
pub use sanitise::Sanitiser;

/// Runs the full pipeline — decode, sanitise, build — over one stream of
/// feed inputs, in a single pass per item. This is the crate's only
/// entry point most callers need.
pub fn logify(
    stream: impl IntoIterator<Item = FeedInput>,
) -> (Logbook, TimestampMap, Vec<ParseError>) {
    let mut sanitiser = Sanitiser::new();
    let mut builder = Builder::new();
    let mut parse_errors = Vec::new();

    for (update_index, input) in stream.into_iter().enumerate() {
        let raw_update = match decode::decode(input) {
            Ok(raw_update) => raw_update,
            Err(err) => {
                parse_errors.push(err);
                continue;
            }
        };
        match sanitiser.step(raw_update, update_index, &mut parse_errors) {
            None => continue,
            Some(sanitised) => builder.consume(sanitised),
        }
    }

    let (logbook, timestamps) = builder.finish();
    (logbook, timestamps, parse_errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gtfs_realtime::{vehicle_position::VehicleStopStatus, FeedEntity, FeedHeader, FeedMessage, TripDescriptor, TripUpdate, VehiclePosition};

    fn feed(timestamp: u64, trip_id: &str, stop_ids: &[&str], status: VehicleStopStatus) -> FeedMessage {
        let trip = TripDescriptor {
            trip_id: Some(trip_id.to_owned()),
            route_id: Some("R1".to_owned()),
            ..Default::default()
        };
        let stop_time_update = stop_ids
            .iter()
            .map(|stop_id| gtfs_realtime::trip_update::StopTimeUpdate {
                stop_id: Some((*stop_id).to_owned()),
                ..Default::default()
            })
            .collect();
        let trip_update = TripUpdate {
            trip: trip.clone(),
            stop_time_update,
            timestamp: Some(timestamp),
            ..Default::default()
        };
        let vehicle = VehiclePosition {
            trip: Some(trip),
            stop_id: stop_ids.first().map(|s| (*s).to_owned()),
            current_status: Some(status as i32),
            timestamp: Some(timestamp),
            ..Default::default()
        };
        FeedMessage {
            header: FeedHeader {
                gtfs_realtime_version: "2.0".to_owned(),
                timestamp: Some(timestamp),
                ..Default::default()
            },
            entity: vec![FeedEntity {
                id: "1".to_owned(),
                trip_update: Some(trip_update),
                vehicle: Some(vehicle),
                ..Default::default()
            }],
        }
    }

    #[test]
    fn logify_runs_decode_sanitise_build_in_one_pass() {
        let stream = vec![
            FeedInput::from(feed(100, "X", &["A", "B", "C"], VehicleStopStatus::InTransitTo)),
            FeedInput::from(feed(200, "X", &["B", "C"], VehicleStopStatus::InTransitTo)),
        ];
        let (logbook, _timestamps, parse_errors) = logify(stream);
        assert!(parse_errors.is_empty());
        assert_eq!(logbook.len(), 1);
        let (_, log) = logbook.iter().next().unwrap();
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn logify_accumulates_parse_errors_without_stopping() {
        let stream = vec![
            FeedInput::from(feed(100, "X", &["A"], VehicleStopStatus::InTransitTo)),
            FeedInput::from(feed(100, "X", &["A", "B"], VehicleStopStatus::InTransitTo)),
            FeedInput::from(feed(200, "X", &["B"], VehicleStopStatus::InTransitTo)),
        ];
        let (logbook, _timestamps, parse_errors) = logify(stream);
        assert_eq!(parse_errors.len(), 1);
        assert_eq!(
            parse_errors[0].kind,
            ParseErrorKind::FeedUpdatesWithDuplicateTimestamps
        );
        assert_eq!(logbook.len(), 1);
    }
}
