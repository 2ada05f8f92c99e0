//! Logbook Merger: stitches logbooks built from disjoint, contiguous time
//! windows into one consistent history.

use std::collections::HashSet;

use indexmap::IndexMap;
use model::{EpochSeconds, Logbook, MergeError, TimestampMap, UniqueTripId};

use crate::build::LogBuilder;

fn window_bounds(logbook: &Logbook, timestamps: &TimestampMap) -> Option<(EpochSeconds, EpochSeconds)> {
    let min = logbook.iter().filter_map(|(_, log)| log.first_seen()).min();
    let max = timestamps.0.values().copied().max();
    match (min, max) {
        (Some(min), Some(max)) => Some((min, max)),
        _ => None,
    }
}

/// Joins a list of `(logbook, timestamps)` pairs, given in strict ascending
/// time-window order, into one logbook. Returns `MergeError::NonContiguousWindows`
/// if two adjacent windows overlap.
pub fn merge(
    windows: Vec<(Logbook, TimestampMap)>,
) -> Result<(Logbook, TimestampMap), MergeError> {
    let mut windows = windows.into_iter();
    let (mut acc_logbook, mut acc_timestamps) = match windows.next() {
        Some(first) => first,
        None => return Ok((Logbook::new(), TimestampMap::new())),
    };

    for (logbook, timestamps) in windows {
        if let (Some(acc_max), Some((cur_min, _))) = (
            acc_timestamps.0.values().copied().max(),
            window_bounds(&logbook, &timestamps),
        ) {
            if acc_max >= cur_min {
                return Err(MergeError::NonContiguousWindows {
                    earlier_max: acc_max,
                    later_min: cur_min,
                });
            }
        }

        // The earliest-seen unique id per feed trip_id in this window: if a
        // feed id was recycled within the window itself, only its first
        // occurrence is eligible to continue a trip from the accumulator.
        let mut earliest_by_feed: IndexMap<String, (UniqueTripId, EpochSeconds)> = IndexMap::new();
        for (uid, log) in logbook.iter() {
            let feed_id = match log.trip_id() {
                Some(id) => id.to_owned(),
                None => continue,
            };
            let ts = timestamps.get(uid).unwrap_or(i64::MAX);
            earliest_by_feed
                .entry(feed_id)
                .and_modify(|(existing_uid, existing_ts)| {
                    if ts < *existing_ts {
                        *existing_uid = *uid;
                        *existing_ts = ts;
                    }
                })
                .or_insert((*uid, ts));
        }

        let open_tails: Vec<UniqueTripId> = acc_logbook
            .iter()
            .filter(|(_, log)| log.ends_en_route())
            .map(|(uid, _)| *uid)
            .collect();

        let mut consumed: HashSet<UniqueTripId> = HashSet::new();

        for acc_uid in open_tails {
            let feed_id = match acc_logbook.get(&acc_uid).and_then(|log| log.trip_id()) {
                Some(id) => id.to_owned(),
                None => continue,
            };
            let Some(&(candidate_uid, candidate_ts)) = earliest_by_feed.get(&feed_id) else {
                continue;
            };
            let acc_ts = acc_timestamps.get(&acc_uid).unwrap_or(i64::MIN);
            if candidate_ts <= acc_ts {
                continue;
            }

            let candidate_log = logbook
                .get(&candidate_uid)
                .cloned()
                .expect("candidate uid came from this window's logbook");
            let acc_log = acc_logbook
                .get(&acc_uid)
                .cloned()
                .expect("acc uid came from the accumulator");

            let mut builder = LogBuilder::from_log(acc_log);
            builder.splice_continuation(candidate_log);
            acc_logbook.insert(acc_uid, builder.into_log());
            acc_timestamps.insert(acc_uid, candidate_ts);
            consumed.insert(candidate_uid);
        }

        for (uid, log) in logbook.into_iter() {
            if consumed.contains(&uid) {
                continue;
            }
            if let Some(ts) = timestamps.get(&uid) {
                acc_timestamps.insert(uid, ts);
            }
            acc_logbook.insert(uid, log);
        }
    }

    Ok((acc_logbook, acc_timestamps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{Action, ActionKind, Log};
    use uuid::Uuid;

    fn action(
        trip_id: &str,
        stop_id: &str,
        action: ActionKind,
        minimum_time: Option<i64>,
        maximum_time: Option<i64>,
        latest_information_time: i64,
    ) -> Action {
        Action {
            trip_id: trip_id.to_owned(),
            route_id: Some("R".to_owned()),
            action,
            minimum_time,
            maximum_time,
            stop_id: stop_id.to_owned(),
            latest_information_time,
        }
    }

    #[test]
    fn scenario_6_merge_across_window_boundary() {
        let acc_uid = Uuid::new_v4();
        let mut l1 = Logbook::new();
        l1.insert(
            acc_uid,
            Log(vec![
                action("X", "A", ActionKind::EnRouteTo, Some(200), None, 200),
                action("X", "B", ActionKind::EnRouteTo, Some(200), None, 200),
                action("X", "C", ActionKind::EnRouteTo, Some(200), None, 200),
            ]),
        );
        let mut t1 = TimestampMap::new();
        t1.insert(acc_uid, 200);

        let l2_uid = Uuid::new_v4();
        let mut l2 = Logbook::new();
        l2.insert(
            l2_uid,
            Log(vec![
                action("X", "B", ActionKind::StoppedAt, Some(300), None, 300),
                action("X", "C", ActionKind::EnRouteTo, Some(300), None, 300),
            ]),
        );
        let mut t2 = TimestampMap::new();
        t2.insert(l2_uid, 300);

        let (merged, _timestamps) = merge(vec![(l1, t1), (l2, t2)]).unwrap();
        assert_eq!(merged.len(), 1);
        let (uid, log) = merged.iter().next().unwrap();
        assert_eq!(*uid, acc_uid);
        assert_eq!(log.len(), 3);

        assert_eq!(log[0].stop_id, "A");
        assert_eq!(log[0].action, ActionKind::StoppedOrSkipped);
        assert_eq!(log[0].minimum_time, Some(200));
        assert_eq!(log[0].maximum_time, Some(300));

        assert_eq!(log[1].stop_id, "B");
        assert_eq!(log[1].action, ActionKind::StoppedAt);
        assert_eq!(log[1].minimum_time, Some(300));
        assert_eq!(log[1].maximum_time, None);

        assert_eq!(log[2].stop_id, "C");
        assert_eq!(log[2].action, ActionKind::EnRouteTo);
        assert_eq!(log[2].minimum_time, Some(300));
        assert_eq!(log[2].maximum_time, None);
    }

    #[test]
    fn unmatched_trips_pass_through_unchanged() {
        let uid = Uuid::new_v4();
        let mut l1 = Logbook::new();
        l1.insert(
            uid,
            Log(vec![action(
                "Y",
                "A",
                ActionKind::StoppedOrSkipped,
                Some(100),
                Some(200),
                200,
            )]),
        );
        let mut t1 = TimestampMap::new();
        t1.insert(uid, 200);

        let l2 = Logbook::new();
        let (merged, _) = merge(vec![(l1, t1), (l2, TimestampMap::new())]).unwrap();
        assert_eq!(merged.len(), 1);
        assert!(merged.get(&uid).is_some());
    }

    #[test]
    fn overlapping_windows_are_rejected() {
        let uid = Uuid::new_v4();
        let mut l1 = Logbook::new();
        l1.insert(
            uid,
            Log(vec![action(
                "X",
                "A",
                ActionKind::EnRouteTo,
                Some(200),
                None,
                200,
            )]),
        );
        let mut t1 = TimestampMap::new();
        t1.insert(uid, 200);

        let uid2 = Uuid::new_v4();
        let mut l2 = Logbook::new();
        l2.insert(
            uid2,
            Log(vec![action(
                "X",
                "A",
                ActionKind::EnRouteTo,
                Some(150),
                None,
                150,
            )]),
        );
        let mut t2 = TimestampMap::new();
        t2.insert(uid2, 150);

        let err = merge(vec![(l1, t1), (l2, t2)]).unwrap_err();
        assert_eq!(
            err,
            MergeError::NonContiguousWindows {
                earlier_max: 200,
                later_min: 150,
            }
        );
    }
}
