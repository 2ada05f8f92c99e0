use serde::{Deserialize, Serialize};

use crate::time::EpochSeconds;

/// The vehicle's reported relationship to its current or imminent stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleStatus {
    StoppedAt,
    InTransitTo,
    IncomingAt,
}

/// One entry of a `TripUpdate`'s future stop sequence.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopTimeUpdate {
    pub stop_id: String,
    pub arrival: Option<EpochSeconds>,
    pub departure: Option<EpochSeconds>,
}

/// A decoded GTFS-Realtime message, keyed externally by `trip_id`. Mirrors
/// the two message variants of the wire format: a schedule-side update and a
/// vehicle-position-side update for the same trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawMessage {
    TripUpdate {
        trip_id: String,
        route_id: Option<String>,
        /// Future stops only, in the order the provider announced them.
        stops: Vec<StopTimeUpdate>,
    },
    VehicleUpdate {
        trip_id: String,
        stop_id: String,
        current_status: VehicleStatus,
        timestamp: EpochSeconds,
    },
}

impl RawMessage {
    pub fn trip_id(&self) -> &str {
        match self {
            RawMessage::TripUpdate { trip_id, .. } => trip_id,
            RawMessage::VehicleUpdate { trip_id, .. } => trip_id,
        }
    }
}

/// One admissible trip within a single update: a paired `TripUpdate` and
/// `VehicleUpdate`, already passed through the trip indexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedTrip {
    pub route_id: Option<String>,
    pub stops: Vec<StopTimeUpdate>,
    pub vehicle_stop_id: String,
    pub current_status: VehicleStatus,
}
