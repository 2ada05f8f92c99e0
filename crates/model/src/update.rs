use indexmap::IndexMap;

use crate::message::{IndexedTrip, RawMessage};
use crate::time::EpochSeconds;

/// A decoded snapshot before sanitisation: a timestamp and the raw messages
/// the decoder pulled out of the feed, in wire order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawUpdate {
    pub timestamp: EpochSeconds,
    pub messages: Vec<RawMessage>,
}

/// A snapshot that has survived the stream sanitiser and the trip indexer:
/// only admissible trips remain, grouped by feed `trip_id` and ordered by
/// first appearance in the message list.
#[derive(Debug, Clone, Default)]
pub struct SanitisedUpdate {
    pub timestamp: EpochSeconds,
    pub trips: IndexMap<String, IndexedTrip>,
}
