use std::ops::{Deref, DerefMut};

use crate::action::Action;

/// An ordered, non-empty (once finished) sequence of `Action`s for one
/// physical trip. Row order is fixed by first appearance of each stop in
/// the trip update stream, not by time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Log(pub Vec<Action>);

impl Log {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn trip_id(&self) -> Option<&str> {
        self.0.first().map(|action| action.trip_id.as_str())
    }

    pub fn route_id(&self) -> Option<&str> {
        self.0.last().and_then(|action| action.route_id.as_deref())
    }

    /// The log's first observed timestamp: the earliest
    /// `latest_information_time` among its rows, which equals the
    /// timestamp of the update that first mentioned this trip.
    pub fn first_seen(&self) -> Option<i64> {
        self.0.iter().map(|a| a.latest_information_time).min()
    }

    pub fn ends_en_route(&self) -> bool {
        self.0
            .last()
            .map(|a| a.action == crate::action::ActionKind::EnRouteTo)
            .unwrap_or(false)
    }
}

impl Deref for Log {
    type Target = Vec<Action>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Log {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl FromIterator<Action> for Log {
    fn from_iter<T: IntoIterator<Item = Action>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Log {
    type Item = Action;
    type IntoIter = std::vec::IntoIter<Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Log {
    type Item = &'a Action;
    type IntoIter = std::slice::Iter<'a, Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
