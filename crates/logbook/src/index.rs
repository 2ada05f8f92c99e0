//! Trip Indexer: groups one update's messages by `trip_id` and rejects
//! anything that isn't a complete, admissible pair.

use indexmap::IndexMap;
use model::{EpochSeconds, IndexedTrip, ParseError, ParseErrorKind, RawMessage, StopTimeUpdate, VehicleStatus};

struct TripUpdateHalf {
    route_id: Option<String>,
    stops: Vec<StopTimeUpdate>,
}

struct VehicleUpdateHalf {
    stop_id: String,
    current_status: VehicleStatus,
}

/// Groups `messages` by `trip_id`, in first-appearance order, and keeps only
/// trips with exactly one `TripUpdate` (with ≥1 remaining stop) and exactly
/// one `VehicleUpdate`. Every message dropped along the way is recorded in
/// `errors`.
pub fn index(
    messages: Vec<RawMessage>,
    update_index: usize,
    update_timestamp: EpochSeconds,
    errors: &mut Vec<ParseError>,
) -> IndexMap<String, IndexedTrip> {
    let mut order: Vec<String> = Vec::new();
    let mut trip_updates: IndexMap<String, TripUpdateHalf> = IndexMap::new();
    let mut vehicle_updates: IndexMap<String, VehicleUpdateHalf> = IndexMap::new();

    for message in messages {
        let trip_id = message.trip_id();
        if trip_id.is_empty() {
            log::warn!("dropping message in update {update_index}: empty trip_id");
            errors.push(
                ParseError::new(ParseErrorKind::MessageWithNullTripId)
                    .with_detail("update_index", update_index as i64),
            );
            continue;
        }
        let trip_id = trip_id.to_owned();
        if !trip_updates.contains_key(&trip_id) && !vehicle_updates.contains_key(&trip_id) {
            order.push(trip_id.clone());
        }
        match message {
            RawMessage::TripUpdate {
                route_id, stops, ..
            } => {
                trip_updates.insert(trip_id, TripUpdateHalf { route_id, stops });
            }
            RawMessage::VehicleUpdate {
                stop_id,
                current_status,
                ..
            } => {
                vehicle_updates.insert(
                    trip_id,
                    VehicleUpdateHalf {
                        stop_id,
                        current_status,
                    },
                );
            }
        }
    }

    let mut trips = IndexMap::new();
    for trip_id in order {
        let trip_update = trip_updates.shift_remove(&trip_id);
        let vehicle_update = vehicle_updates.shift_remove(&trip_id);

        match (trip_update, vehicle_update) {
            (Some(tu), Some(vu)) => {
                if tu.stops.is_empty() {
                    log::warn!(
                        "dropping trip {trip_id} in update {update_index}: no stops remaining"
                    );
                    errors.push(
                        ParseError::new(ParseErrorKind::TripHasTripUpdateWithNoStopsRemaining)
                            .with_detail("update_index", update_index as i64)
                            .with_detail("trip_id", trip_id),
                    );
                    continue;
                }
                trips.insert(
                    trip_id,
                    IndexedTrip {
                        route_id: tu.route_id,
                        stops: tu.stops,
                        vehicle_stop_id: vu.stop_id,
                        current_status: vu.current_status,
                    },
                );
            }
            (Some(_), None) | (None, Some(_)) => {
                log::warn!(
                    "dropping trip {trip_id} in update {update_index}: unpaired trip/vehicle update"
                );
                errors.push(
                    ParseError::new(ParseErrorKind::TripIdWithTripUpdateButNoVehicleUpdate)
                        .with_detail("update_index", update_index as i64)
                        .with_detail("trip_id", trip_id)
                        .with_detail("timestamp", update_timestamp),
                );
            }
            (None, None) => unreachable!("trip_id appeared in order without a message"),
        }
    }

    trips
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(id: &str) -> StopTimeUpdate {
        StopTimeUpdate {
            stop_id: id.to_owned(),
            arrival: None,
            departure: None,
        }
    }

    #[test]
    fn pairs_matching_trip_and_vehicle_updates() {
        let messages = vec![
            RawMessage::TripUpdate {
                trip_id: "X".into(),
                route_id: Some("R".into()),
                stops: vec![stop("A"), stop("B")],
            },
            RawMessage::VehicleUpdate {
                trip_id: "X".into(),
                stop_id: "A".into(),
                current_status: VehicleStatus::InTransitTo,
                timestamp: 100,
            },
        ];
        let mut errors = Vec::new();
        let trips = index(messages, 0, 100, &mut errors);
        assert!(errors.is_empty());
        assert_eq!(trips.len(), 1);
        assert!(trips.contains_key("X"));
    }

    #[test]
    fn drops_orphan_trip_update() {
        let messages = vec![RawMessage::TripUpdate {
            trip_id: "X".into(),
            route_id: None,
            stops: vec![stop("A")],
        }];
        let mut errors = Vec::new();
        let trips = index(messages, 0, 100, &mut errors);
        assert!(trips.is_empty());
        assert_eq!(
            errors[0].kind,
            ParseErrorKind::TripIdWithTripUpdateButNoVehicleUpdate
        );
    }

    #[test]
    fn drops_trip_with_no_stops_remaining() {
        let messages = vec![
            RawMessage::TripUpdate {
                trip_id: "X".into(),
                route_id: None,
                stops: vec![],
            },
            RawMessage::VehicleUpdate {
                trip_id: "X".into(),
                stop_id: "A".into(),
                current_status: VehicleStatus::StoppedAt,
                timestamp: 100,
            },
        ];
        let mut errors = Vec::new();
        let trips = index(messages, 0, 100, &mut errors);
        assert!(trips.is_empty());
        assert_eq!(
            errors[0].kind,
            ParseErrorKind::TripHasTripUpdateWithNoStopsRemaining
        );
    }

    #[test]
    fn drops_messages_with_empty_trip_id() {
        let messages = vec![RawMessage::VehicleUpdate {
            trip_id: String::new(),
            stop_id: "A".into(),
            current_status: VehicleStatus::StoppedAt,
            timestamp: 100,
        }];
        let mut errors = Vec::new();
        let trips = index(messages, 0, 100, &mut errors);
        assert!(trips.is_empty());
        assert_eq!(errors[0].kind, ParseErrorKind::MessageWithNullTripId);
    }
}
