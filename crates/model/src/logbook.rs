use std::collections::HashMap;

use indexmap::IndexMap;
use uuid::Uuid;

use crate::log::Log;
use crate::time::EpochSeconds;

/// Opaque identifier for one physical trip, stable across a logbook and
/// distinct from the feed-provided `trip_id`, which may be recycled.
pub type UniqueTripId = Uuid;

/// A mapping from unique trip id to `Log`. Keys are globally unique within
/// one logbook. Insertion order is preserved (first-seen order of the
/// physical trip) since several `Ops` functions group or iterate logs in a
/// stable, reproducible order.
#[derive(Debug, Clone, Default)]
pub struct Logbook(pub IndexMap<UniqueTripId, Log>);

impl Logbook {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, UniqueTripId, Log> {
        self.0.iter()
    }

    pub fn get(&self, id: &UniqueTripId) -> Option<&Log> {
        self.0.get(id)
    }

    pub fn insert(&mut self, id: UniqueTripId, log: Log) -> Option<Log> {
        self.0.insert(id, log)
    }

    pub fn total_rows(&self) -> usize {
        self.0.values().map(|log| log.len()).sum()
    }
}

impl IntoIterator for Logbook {
    type Item = (UniqueTripId, Log);
    type IntoIter = indexmap::map::IntoIter<UniqueTripId, Log>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Logbook {
    type Item = (&'a UniqueTripId, &'a Log);
    type IntoIter = indexmap::map::Iter<'a, UniqueTripId, Log>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<(UniqueTripId, Log)> for Logbook {
    fn from_iter<T: IntoIterator<Item = (UniqueTripId, Log)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Parallel mapping from unique trip id to the last `latest_information_time`
/// that contained information about that trip. Required by the merger to
/// decide whether a trip in a later window is a genuine continuation.
#[derive(Debug, Clone, Default)]
pub struct TimestampMap(pub HashMap<UniqueTripId, EpochSeconds>);

impl TimestampMap {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn get(&self, id: &UniqueTripId) -> Option<EpochSeconds> {
        self.0.get(id).copied()
    }

    pub fn insert(&mut self, id: UniqueTripId, timestamp: EpochSeconds) {
        self.0.insert(id, timestamp);
    }
}
