//! Stream Sanitiser: enforces update-level invariants (non-null, strictly
//! increasing timestamps) ahead of the trip indexer and the builder.

use model::{EpochSeconds, ParseError, ParseErrorKind, RawUpdate, SanitisedUpdate};

use crate::index;

/// Applies the timestamp-level sanitisation rules to one update at a time,
/// remembering the last kept timestamp across calls. All repairs are
/// deletions: a rejected update yields `None` and an error, never a patched
/// substitute.
#[derive(Debug, Default)]
pub struct Sanitiser {
    last_kept_timestamp: Option<EpochSeconds>,
}

impl Sanitiser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(
        &mut self,
        update: RawUpdate,
        update_index: usize,
        errors: &mut Vec<ParseError>,
    ) -> Option<SanitisedUpdate> {
        if update.timestamp <= 0 {
            log::warn!("dropping update {update_index}: null timestamp");
            errors.push(
                ParseError::new(ParseErrorKind::FeedUpdateHasNullTimestamp)
                    .with_detail("update_index", update_index as i64),
            );
            return None;
        }

        if let Some(last) = self.last_kept_timestamp {
            if update.timestamp == last {
                log::warn!(
                    "dropping update {update_index}: duplicate timestamp {}",
                    update.timestamp
                );
                errors.push(
                    ParseError::new(ParseErrorKind::FeedUpdatesWithDuplicateTimestamps)
                        .with_detail("update_index", update_index as i64)
                        .with_detail("timestamp", update.timestamp),
                );
                return None;
            }
            if update.timestamp < last {
                log::warn!(
                    "dropping update {update_index}: timestamp {} goes backwards from {last}",
                    update.timestamp
                );
                errors.push(
                    ParseError::new(ParseErrorKind::FeedUpdateGoesBackwardsInTime)
                        .with_detail("update_index", update_index as i64)
                        .with_detail("timestamp", update.timestamp)
                        .with_detail("previous_timestamp", last),
                );
                return None;
            }
        }

        self.last_kept_timestamp = Some(update.timestamp);
        let trips = index::index(update.messages, update_index, update.timestamp, errors);
        Some(SanitisedUpdate {
            timestamp: update.timestamp,
            trips,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::RawMessage;

    fn bare_update(timestamp: EpochSeconds) -> RawUpdate {
        RawUpdate {
            timestamp,
            messages: Vec::new(),
        }
    }

    #[test]
    fn rejects_null_timestamp() {
        let mut sanitiser = Sanitiser::new();
        let mut errors = Vec::new();
        let result = sanitiser.step(bare_update(0), 0, &mut errors);
        assert!(result.is_none());
        assert_eq!(errors[0].kind, ParseErrorKind::FeedUpdateHasNullTimestamp);
    }

    #[test]
    fn drops_duplicate_timestamp_keeping_first() {
        let mut sanitiser = Sanitiser::new();
        let mut errors = Vec::new();
        assert!(sanitiser.step(bare_update(100), 0, &mut errors).is_some());
        assert!(sanitiser.step(bare_update(100), 1, &mut errors).is_none());
        assert_eq!(
            errors[0].kind,
            ParseErrorKind::FeedUpdatesWithDuplicateTimestamps
        );
    }

    #[test]
    fn drops_update_that_goes_backwards() {
        let mut sanitiser = Sanitiser::new();
        let mut errors = Vec::new();
        assert!(sanitiser.step(bare_update(200), 0, &mut errors).is_some());
        assert!(sanitiser.step(bare_update(150), 1, &mut errors).is_none());
        assert_eq!(
            errors[0].kind,
            ParseErrorKind::FeedUpdateGoesBackwardsInTime
        );
    }

    #[test]
    fn keeps_strictly_increasing_updates() {
        let mut sanitiser = Sanitiser::new();
        let mut errors = Vec::new();
        assert!(sanitiser.step(bare_update(100), 0, &mut errors).is_some());
        assert!(sanitiser.step(bare_update(200), 1, &mut errors).is_some());
        assert!(errors.is_empty());
    }

    #[test]
    fn delegates_message_level_rules_to_indexer() {
        let mut sanitiser = Sanitiser::new();
        let mut errors = Vec::new();
        let update = RawUpdate {
            timestamp: 100,
            messages: vec![RawMessage::TripUpdate {
                trip_id: String::new(),
                route_id: None,
                stops: Vec::new(),
            }],
        };
        let result = sanitiser.step(update, 0, &mut errors).unwrap();
        assert!(result.trips.is_empty());
        assert_eq!(errors[0].kind, ParseErrorKind::MessageWithNullTripId);
    }
}
