//! Logbook Ops: pure functions over finished logbooks — cancellation
//! trimming, partial-trip discard, partition-by-key, and serialisation.

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use indexmap::IndexMap;
use model::{Action, ActionKind, EpochSeconds, Log, Logbook, TimestampMap, UniqueTripId};

/// Mean of the gaps between distinct observation instants recorded in a
/// `TimestampMap`. Used to scale `cut_cancellations`' threshold to a feed's
/// actual polling cadence. Computed once per run and reused across repeated
/// `cut_cancellations` calls so the threshold — and therefore idempotence —
/// doesn't drift as trimming removes rows.
pub fn estimate_mean_update_gap(timestamps: &TimestampMap) -> f64 {
    let mut instants: Vec<EpochSeconds> = timestamps.0.values().copied().collect();
    instants.sort_unstable();
    instants.dedup();
    if instants.len() < 2 {
        return f64::INFINITY;
    }
    let span = (instants[instants.len() - 1] - instants[0]) as f64;
    span / (instants.len() - 1) as f64
}

/// The earliest observation instant across an entire logbook — the
/// timestamp of the run's first accepted update, as far as it can be
/// recovered from finished logs alone.
pub fn first_observed_timestamp(logbook: &Logbook) -> Option<EpochSeconds> {
    logbook.iter().filter_map(|(_, log)| log.first_seen()).min()
}

/// Rebuilds a `TimestampMap` from a logbook alone: for each trip, the
/// `Builder` always stamps every row it touches with the update's own
/// timestamp, so the latest `latest_information_time` among a trip's rows
/// is exactly the value the original run recorded for it.
pub fn timestamps_from_logbook(logbook: &Logbook) -> TimestampMap {
    let mut timestamps = TimestampMap::new();
    for (uid, log) in logbook.iter() {
        if let Some(last_seen) = log.iter().map(|a| a.latest_information_time).max() {
            timestamps.insert(*uid, last_seen);
        }
    }
    timestamps
}

/// Strips, from the tail of each log, the maximal run of `STOPPED_OR_SKIPPED`
/// rows whose `(max_time - min_time)` interval is shorter than
/// `threshold_seconds`. Stops at the first `STOPPED_AT` row, or at a row
/// whose interval meets the threshold. Idempotent: `threshold_seconds` is
/// fixed by the caller rather than re-derived from the (possibly already
/// trimmed) logbook.
pub fn cut_cancellations(logbook: Logbook, threshold_seconds: f64) -> Logbook {
    logbook
        .into_iter()
        .map(|(uid, log)| (uid, trim_cancellation_tail(log, threshold_seconds)))
        .collect()
}

fn trim_cancellation_tail(mut log: Log, threshold_seconds: f64) -> Log {
    while let Some(last) = log.0.last() {
        if last.action != ActionKind::StoppedOrSkipped {
            break;
        }
        let interval = match (last.minimum_time, last.maximum_time) {
            (Some(min), Some(max)) => (max - min) as f64,
            _ => break,
        };
        if interval < threshold_seconds {
            log.0.pop();
        } else {
            break;
        }
    }
    log
}

fn is_partial(log: &Log, first_update_timestamp: EpochSeconds) -> bool {
    let starts_at_window_open = log
        .0
        .first()
        .and_then(|action| action.minimum_time)
        == Some(first_update_timestamp);
    starts_at_window_open || log.ends_en_route()
}

/// Removes every log whose first row's `minimum_time` equals
/// `first_update_timestamp` (it was already in progress when observation
/// began) or whose last row is still `EN_ROUTE_TO` (it hadn't finished when
/// observation ended).
pub fn discard_partial_logs(logbook: Logbook, first_update_timestamp: EpochSeconds) -> Logbook {
    logbook
        .into_iter()
        .filter(|(_, log)| !is_partial(log, first_update_timestamp))
        .collect()
}

/// Splits a logbook into (complete, incomplete) by the same criterion as
/// `discard_partial_logs`.
pub fn partition_on_incomplete(
    logbook: Logbook,
    first_update_timestamp: EpochSeconds,
) -> (Logbook, Logbook) {
    let mut complete = Logbook::new();
    let mut incomplete = Logbook::new();
    for (uid, log) in logbook {
        if is_partial(&log, first_update_timestamp) {
            incomplete.insert(uid, log);
        } else {
            complete.insert(uid, log);
        }
    }
    (complete, incomplete)
}

fn majority_route(log: &Log) -> Option<String> {
    let mut counts: IndexMap<Option<String>, usize> = IndexMap::new();
    for action in log.iter() {
        *counts.entry(action.route_id.clone()).or_insert(0) += 1;
    }
    let mut best: Option<(Option<String>, usize)> = None;
    for (route, count) in counts {
        let replace = match &best {
            Some((_, best_count)) => count > *best_count,
            None => true,
        };
        if replace {
            best = Some((route, count));
        }
    }
    best.and_then(|(route, _)| route)
}

/// Groups logs by the majority `route_id` observed across their rows. Logs
/// with no resolvable route id are grouped under `None`.
pub fn partition_on_route(logbook: Logbook) -> IndexMap<Option<String>, Logbook> {
    let mut groups: IndexMap<Option<String>, Logbook> = IndexMap::new();
    for (uid, log) in logbook {
        let route = majority_route(&log);
        groups.entry(route).or_default().insert(uid, log);
    }
    groups
}

const CSV_HEADER: &[&str] = &[
    "trip_id",
    "route_id",
    "action",
    "minimum_time",
    "maximum_time",
    "stop_id",
    "latest_information_time",
    "unique_trip_id",
];

#[derive(Debug)]
pub enum OpsError {
    Csv(csv::Error),
    MalformedRow { line: u64, reason: String },
}

impl fmt::Display for OpsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpsError::Csv(err) => write!(f, "csv error: {}", err),
            OpsError::MalformedRow { line, reason } => {
                write!(f, "malformed row at line {}: {}", line, reason)
            }
        }
    }
}

impl std::error::Error for OpsError {}

impl From<csv::Error> for OpsError {
    fn from(err: csv::Error) -> Self {
        OpsError::Csv(err)
    }
}

/// Serialises a logbook to the stable CSV schema: rows grouped by
/// `unique_trip_id`, in stop order within each group.
pub fn to_csv<W: Write>(logbook: &Logbook, writer: W) -> Result<(), OpsError> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(CSV_HEADER)?;
    for (uid, log) in logbook.iter() {
        for action in log.iter() {
            out.write_record(&[
                action.trip_id.clone(),
                action.route_id.clone().unwrap_or_default(),
                action.action.to_string(),
                render_time(action.minimum_time),
                render_time(action.maximum_time),
                action.stop_id.clone(),
                action.latest_information_time.to_string(),
                uid.to_string(),
            ])?;
        }
    }
    out.flush().map_err(|e| OpsError::Csv(e.into()))?;
    Ok(())
}

fn render_time(time: Option<EpochSeconds>) -> String {
    time.map(|t| t.to_string()).unwrap_or_default()
}

fn parse_time(field: &str, line: u64, column: &str) -> Result<Option<EpochSeconds>, OpsError> {
    if field.is_empty() {
        return Ok(None);
    }
    field
        .parse::<EpochSeconds>()
        .map(Some)
        .map_err(|_| OpsError::MalformedRow {
            line,
            reason: format!("{} is not a valid integer timestamp: {:?}", column, field),
        })
}

/// Parses a logbook from the CSV schema written by `to_csv`. Rows are
/// grouped back by `unique_trip_id`, preserving the order groups first
/// appear in the file.
pub fn from_csv<R: Read>(reader: R) -> Result<Logbook, OpsError> {
    let mut input = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let mut logbook = Logbook::new();

    for (line, record) in input.records().enumerate() {
        let line = line as u64 + 2; // header occupies line 1
        let record = record?;
        if record.len() != CSV_HEADER.len() {
            return Err(OpsError::MalformedRow {
                line,
                reason: format!("expected {} fields, found {}", CSV_HEADER.len(), record.len()),
            });
        }

        let trip_id = record[0].to_owned();
        let route_id = if record[1].is_empty() {
            None
        } else {
            Some(record[1].to_owned())
        };
        let action_kind =
            ActionKind::from_str(&record[2]).map_err(|_| OpsError::MalformedRow {
                line,
                reason: format!("unrecognised action kind: {:?}", &record[2]),
            })?;
        let minimum_time = parse_time(&record[3], line, "minimum_time")?;
        let maximum_time = parse_time(&record[4], line, "maximum_time")?;
        let stop_id = record[5].to_owned();
        let latest_information_time =
            record[6]
                .parse::<EpochSeconds>()
                .map_err(|_| OpsError::MalformedRow {
                    line,
                    reason: format!("latest_information_time is not a valid integer: {:?}", &record[6]),
                })?;
        let unique_trip_id =
            UniqueTripId::parse_str(&record[7]).map_err(|_| OpsError::MalformedRow {
                line,
                reason: format!("unique_trip_id is not a valid uuid: {:?}", &record[7]),
            })?;

        let action = Action {
            trip_id,
            route_id,
            action: action_kind,
            minimum_time,
            maximum_time,
            stop_id,
            latest_information_time,
        };

        logbook
            .0
            .entry(unique_trip_id)
            .or_default()
            .0
            .push(action);
    }

    Ok(logbook)
}

/// Renders an epoch-seconds timestamp as a GTFS `HH:MM:SS` clock time. GTFS
/// allows hours beyond 24 for trips that roll past midnight relative to
/// their service day; we have no service-day boundary to anchor against
/// here, so this just renders the wall-clock time of day in UTC.
fn format_gtfs_time(epoch_seconds: EpochSeconds) -> String {
    chrono::DateTime::from_timestamp(epoch_seconds, 0)
        .map(|datetime| datetime.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "00:00:00".to_owned())
}

/// Exports a logbook as a GTFS static `stop_times.txt`. Rows with a null
/// arrival or departure, and `EN_ROUTE_TO` rows, are omitted — GTFS has no
/// way to express an in-progress or unbounded stop.
pub fn to_gtfs_stop_times<W: Write>(logbook: &Logbook, writer: W) -> Result<(), OpsError> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(["trip_id", "arrival_time", "departure_time", "stop_id", "stop_sequence"])?;
    for (_, log) in logbook.iter() {
        let mut sequence = 1u32;
        for action in log.iter() {
            if action.action == ActionKind::EnRouteTo {
                continue;
            }
            let (Some(minimum), Some(maximum)) = (action.minimum_time, action.maximum_time) else {
                continue;
            };
            out.write_record(&[
                action.trip_id.clone(),
                format_gtfs_time(minimum),
                format_gtfs_time(maximum),
                action.stop_id.clone(),
                sequence.to_string(),
            ])?;
            sequence += 1;
        }
    }
    out.flush().map_err(|e| OpsError::Csv(e.into()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn action(
        trip_id: &str,
        stop_id: &str,
        kind: ActionKind,
        minimum_time: Option<i64>,
        maximum_time: Option<i64>,
        latest_information_time: i64,
    ) -> Action {
        Action {
            trip_id: trip_id.to_owned(),
            route_id: Some("R1".to_owned()),
            action: kind,
            minimum_time,
            maximum_time,
            stop_id: stop_id.to_owned(),
            latest_information_time,
        }
    }

    #[test]
    fn cut_cancellations_trims_short_trailing_skips() {
        let uid = Uuid::new_v4();
        let mut logbook = Logbook::new();
        logbook.insert(
            uid,
            Log(vec![
                action("X", "A", ActionKind::StoppedAt, Some(0), Some(10), 10),
                action("X", "B", ActionKind::StoppedOrSkipped, Some(10), Some(15), 15),
                action("X", "C", ActionKind::StoppedOrSkipped, Some(15), Some(20), 20),
            ]),
        );
        let trimmed = cut_cancellations(logbook, 100.0);
        let log = trimmed.get(&uid).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].stop_id, "A");
    }

    #[test]
    fn cut_cancellations_is_idempotent() {
        let uid = Uuid::new_v4();
        let mut logbook = Logbook::new();
        logbook.insert(
            uid,
            Log(vec![
                action("X", "A", ActionKind::StoppedAt, Some(0), Some(10), 10),
                action("X", "B", ActionKind::StoppedOrSkipped, Some(10), Some(500), 500),
            ]),
        );
        let once = cut_cancellations(logbook.clone(), 50.0);
        let twice = cut_cancellations(once.clone(), 50.0);
        assert_eq!(once.total_rows(), twice.total_rows());
    }

    #[test]
    fn discard_partial_logs_removes_window_open_and_en_route_tails() {
        let first_ts = 100;
        let mut logbook = Logbook::new();
        logbook.insert(
            Uuid::new_v4(),
            Log(vec![action(
                "X",
                "A",
                ActionKind::StoppedOrSkipped,
                Some(100),
                Some(200),
                200,
            )]),
        );
        let keep_uid = Uuid::new_v4();
        logbook.insert(
            keep_uid,
            Log(vec![action(
                "Y",
                "A",
                ActionKind::StoppedOrSkipped,
                Some(150),
                Some(200),
                200,
            )]),
        );
        let result = discard_partial_logs(logbook, first_ts);
        assert_eq!(result.len(), 1);
        assert!(result.get(&keep_uid).is_some());
    }

    #[test]
    fn csv_round_trips() {
        let mut logbook = Logbook::new();
        logbook.insert(
            Uuid::new_v4(),
            Log(vec![
                action("X", "A", ActionKind::StoppedAt, Some(100), Some(110), 110),
                action("X", "B", ActionKind::EnRouteTo, Some(110), None, 110),
            ]),
        );
        let mut buffer = Vec::new();
        to_csv(&logbook, &mut buffer).unwrap();
        let parsed = from_csv(buffer.as_slice()).unwrap();
        assert_eq!(parsed.total_rows(), logbook.total_rows());
        for (uid, log) in logbook.iter() {
            let parsed_log = parsed.get(uid).unwrap();
            assert_eq!(parsed_log.0, log.0);
        }
    }

    #[test]
    fn gtfs_export_omits_en_route_and_null_time_rows() {
        let mut logbook = Logbook::new();
        logbook.insert(
            Uuid::new_v4(),
            Log(vec![
                action("X", "A", ActionKind::StoppedAt, Some(100), Some(110), 110),
                action("X", "B", ActionKind::EnRouteTo, Some(110), None, 110),
            ]),
        );
        let mut buffer = Vec::new();
        to_gtfs_stop_times(&logbook, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text.lines().count(), 2); // header + the one StoppedAt row
        assert!(!text.contains(",B,"));
    }
}
