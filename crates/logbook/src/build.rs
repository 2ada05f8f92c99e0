//! Logbook Builder: the stream-differential state machine that turns a
//! sequence of sanitised updates into a `Logbook`.
//!
//! Two maps carry all mutable state across updates: `alias` (feed trip_id ->
//! unique id) and `in_flight` (unique id -> in-progress `LogBuilder`). Both
//! are scoped to one `Builder` instance; there is no global state.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use model::{Action, ActionKind, EpochSeconds, IndexedTrip, Log, Logbook, SanitisedUpdate, TimestampMap, UniqueTripId, VehicleStatus};
use uuid::Uuid;

/// Accumulates the log for one physical trip across updates. Rows are keyed
/// by `stop_id` and ordered by first appearance, matching the logbook's row
/// ordering guarantee.
#[derive(Debug, Default)]
pub(crate) struct LogBuilder {
    route_id: Option<String>,
    rows: IndexMap<String, Action>,
}

impl LogBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Rehydrates a `LogBuilder` from a finished `Log`, for the merger's use:
    /// splicing a later window's first update against an earlier window's
    /// open tail runs exactly this same reconciliation logic.
    pub(crate) fn from_log(log: Log) -> Self {
        let route_id = log.0.last().and_then(|a| a.route_id.clone());
        let rows = log
            .0
            .into_iter()
            .map(|action| (action.stop_id.clone(), action))
            .collect();
        Self { route_id, rows }
    }

    fn set_route_id(&mut self, route_id: Option<String>) {
        if route_id.is_some() {
            self.route_id = route_id;
        }
        let latest = self.route_id.clone();
        for action in self.rows.values_mut() {
            action.route_id = latest.clone();
        }
    }

    /// Closes every currently-open row whose stop is absent from
    /// `new_suffix`, per the disappearance rule shared by Phase B and the
    /// merger's boundary splice.
    fn close_disappeared(&mut self, new_suffix: &HashSet<&str>, tk: EpochSeconds) {
        let currently_open: Vec<String> = self
            .rows
            .iter()
            .filter(|(_, action)| action.is_open())
            .map(|(stop_id, _)| stop_id.clone())
            .collect();

        for stop_id in currently_open {
            if new_suffix.contains(stop_id.as_str()) {
                continue;
            }
            let action = self.rows.get_mut(&stop_id).expect("row just listed as open");
            if action.action == ActionKind::StoppedAt {
                action.maximum_time = Some(tk);
            } else {
                action.action = ActionKind::StoppedOrSkipped;
                action.maximum_time = Some(tk);
            }
            action.latest_information_time = tk;
        }
    }

    /// Phase B: reconciles the trip's existing rows against one update's
    /// observed suffix.
    pub(crate) fn apply_update(&mut self, trip: &IndexedTrip, tk: EpochSeconds, feed_trip_id: &str) {
        self.set_route_id(trip.route_id.clone());

        let new_suffix: HashSet<&str> = trip.stops.iter().map(|s| s.stop_id.as_str()).collect();
        self.close_disappeared(&new_suffix, tk);

        // S₀ is the VehicleUpdate's reported current stop, not necessarily
        // the first entry of the TripUpdate's own stop sequence — the two
        // usually agree, but a feed is free to report them independently.
        // Fall back to position 0 if the reported stop isn't in the suffix
        // at all (e.g. it has already been announced as passed).
        let current_stop_matches_suffix = new_suffix.contains(trip.vehicle_stop_id.as_str());

        for (position, stop) in trip.stops.iter().enumerate() {
            let is_current_stop = if current_stop_matches_suffix {
                stop.stop_id == trip.vehicle_stop_id
            } else {
                position == 0
            };
            let computed_kind = if is_current_stop {
                match trip.current_status {
                    VehicleStatus::StoppedAt => ActionKind::StoppedAt,
                    VehicleStatus::InTransitTo | VehicleStatus::IncomingAt => ActionKind::EnRouteTo,
                }
            } else {
                ActionKind::EnRouteTo
            };
            // A stop reported as already-arrived can't have arrived after tk.
            let arrival_bound = stop.arrival.map_or(tk, |arrival| arrival.min(tk));

            match self.rows.get_mut(&stop.stop_id) {
                Some(existing) if existing.action == ActionKind::StoppedOrSkipped => {
                    // A previously-passed stop reappearing in the suffix can't
                    // happen from a well-formed feed; leave the frozen row alone.
                }
                Some(existing) if existing.action == ActionKind::StoppedAt => {
                    // Monotonicity: never revert STOPPED_AT back to EN_ROUTE_TO.
                    if computed_kind == ActionKind::StoppedAt {
                        existing.minimum_time = Some(
                            existing.minimum_time.map_or(arrival_bound, |m| m.min(arrival_bound)),
                        );
                    }
                    existing.latest_information_time = tk;
                }
                Some(existing) => {
                    if computed_kind == ActionKind::StoppedAt {
                        existing.action = ActionKind::StoppedAt;
                        existing.minimum_time = Some(arrival_bound);
                        existing.maximum_time = None;
                    } else {
                        existing.minimum_time = Some(tk);
                    }
                    existing.latest_information_time = tk;
                }
                None => {
                    let (minimum_time, maximum_time) = match computed_kind {
                        ActionKind::StoppedAt => (Some(arrival_bound), None),
                        _ => (Some(tk), None),
                    };
                    self.rows.insert(
                        stop.stop_id.clone(),
                        Action {
                            trip_id: feed_trip_id.to_owned(),
                            route_id: self.route_id.clone(),
                            action: computed_kind,
                            minimum_time,
                            maximum_time,
                            stop_id: stop.stop_id.clone(),
                            latest_information_time: tk,
                        },
                    );
                }
            }
        }
    }

    /// Phase C: closes every still-open row as of a trip's disappearance.
    pub(crate) fn terminate(&mut self, tk: EpochSeconds) {
        for action in self.rows.values_mut() {
            if !action.is_open() {
                continue;
            }
            match action.action {
                ActionKind::EnRouteTo => {
                    action.action = ActionKind::StoppedOrSkipped;
                    action.maximum_time = Some(tk);
                }
                ActionKind::StoppedAt => {
                    action.maximum_time = Some(tk);
                }
                ActionKind::StoppedOrSkipped => {}
            }
            action.latest_information_time = tk;
        }
    }

    pub(crate) fn into_log(self) -> Log {
        Log(self.rows.into_values().collect())
    }

    /// Splices a continuation found in a later time window onto this
    /// trip's open tail: the same disappearance-closing reconciliation
    /// `apply_update` applies live, replayed against `candidate`'s own
    /// first-seen suffix (already computed correctly by whichever `Builder`
    /// produced it) instead of a raw update, since the merger only ever sees
    /// finished logs.
    pub(crate) fn splice_continuation(&mut self, candidate: Log) {
        let first_seen_time = match candidate.first_seen() {
            Some(t) => t,
            None => return,
        };
        let new_suffix: HashSet<&str> = candidate
            .0
            .iter()
            .filter(|action| action.latest_information_time == first_seen_time)
            .map(|action| action.stop_id.as_str())
            .collect();
        self.close_disappeared(&new_suffix, first_seen_time);

        let route_id = candidate.0.last().and_then(|a| a.route_id.clone());
        for action in candidate.0 {
            self.rows.insert(action.stop_id.clone(), action);
        }
        self.set_route_id(route_id);
    }
}

/// The Logbook Builder. Consumes sanitised updates one at a time and yields
/// a finished `Logbook` plus a `TimestampMap` once the stream is exhausted.
#[derive(Debug, Default)]
pub struct Builder {
    in_flight: IndexMap<UniqueTripId, LogBuilder>,
    alias: HashMap<String, UniqueTripId>,
    finished: Logbook,
    timestamps: TimestampMap,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn consume(&mut self, update: SanitisedUpdate) {
        let tk = update.timestamp;

        // Phase C ahead of Phase A's minting: a feed id terminated this same
        // update is freed from the alias before any "new" id is resolved
        // against it, which is what makes recycled-id collisions resolve
        // cleanly (Phase D).
        let terminating_feed_ids: Vec<String> = self
            .alias
            .keys()
            .filter(|feed_id| !update.trips.contains_key(feed_id.as_str()))
            .cloned()
            .collect();

        for feed_id in terminating_feed_ids {
            if let Some(uid) = self.alias.remove(&feed_id) {
                if let Some(mut builder) = self.in_flight.shift_remove(&uid) {
                    builder.terminate(tk);
                    log::debug!(
                        "trip {feed_id} (unique id {uid}) terminated at t={tk}: absent from the update"
                    );
                    self.timestamps.insert(uid, tk);
                    self.finished.insert(uid, builder.into_log());
                }
            }
        }

        // Phase A (minting, via entry()'s default) + Phase B (reconciliation).
        for (feed_id, trip) in update.trips.iter() {
            let uid = *self.alias.entry(feed_id.clone()).or_insert_with(|| {
                let minted = Uuid::new_v4();
                log::debug!("trip {feed_id} minted fresh unique id {minted} at t={tk}");
                minted
            });
            let builder = self.in_flight.entry(uid).or_insert_with(LogBuilder::new);
            builder.apply_update(trip, tk, feed_id);
            self.timestamps.insert(uid, tk);
        }
    }

    /// Finalisation: every still in-flight trip is moved to the logbook
    /// unchanged, tail actions left as `EN_ROUTE_TO` — these are the
    /// incomplete trips a caller may later stitch with the merger.
    pub fn finish(self) -> (Logbook, TimestampMap) {
        let Builder {
            in_flight,
            alias: _,
            mut finished,
            timestamps,
        } = self;
        for (uid, builder) in in_flight {
            finished.insert(uid, builder.into_log());
        }
        (finished, timestamps)
    }
}
