use std::fmt;

use serde::{Deserialize, Serialize};

use crate::time::EpochSeconds;

/// What a trip did at one stop, as best as the snapshot stream can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    /// Known to have been at the stop.
    StoppedAt,
    /// Last seen heading there; still in flight.
    EnRouteTo,
    /// Passed through between two snapshots — stopped or skipped, the
    /// stream alone can't tell which.
    StoppedOrSkipped,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::StoppedAt => "STOPPED_AT",
            ActionKind::EnRouteTo => "EN_ROUTE_TO",
            ActionKind::StoppedOrSkipped => "STOPPED_OR_SKIPPED",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownActionKind;

impl fmt::Display for UnknownActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unrecognised action kind")
    }
}

impl std::error::Error for UnknownActionKind {}

impl std::str::FromStr for ActionKind {
    type Err = UnknownActionKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STOPPED_AT" => Ok(ActionKind::StoppedAt),
            "EN_ROUTE_TO" => Ok(ActionKind::EnRouteTo),
            "STOPPED_OR_SKIPPED" => Ok(ActionKind::StoppedOrSkipped),
            _ => Err(UnknownActionKind),
        }
    }
}

/// One row in a trip's log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub trip_id: String,
    pub route_id: Option<String>,
    pub action: ActionKind,
    pub minimum_time: Option<EpochSeconds>,
    pub maximum_time: Option<EpochSeconds>,
    pub stop_id: String,
    pub latest_information_time: EpochSeconds,
}

impl Action {
    pub fn is_open(&self) -> bool {
        match self.action {
            ActionKind::EnRouteTo => true,
            ActionKind::StoppedAt => self.maximum_time.is_none(),
            ActionKind::StoppedOrSkipped => false,
        }
    }
}
