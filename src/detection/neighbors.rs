//! Closest-in-time neighbor selection
//!
//! Picks, for a user's current event, the latest event strictly before it and
//! the earliest event strictly after it. Events with the same id as the
//! current one are ignored, and so are events carrying exactly the current
//! timestamp: simultaneous access says nothing about travel and is left out
//! of both roles.
//!
//! When two candidates tie on the best timestamp, the one with the smaller
//! event id wins, so the outcome never depends on scan order.

use std::cmp::Ordering;

use crate::models::{Event, RelatedEventInfo};

/// Accumulates the closest preceding and following events as candidates are
/// offered one at a time
#[derive(Debug, Clone)]
pub struct NeighborSelector {
    related: RelatedEventInfo,
}

impl NeighborSelector {
    pub fn new(current: Event) -> Self {
        NeighborSelector {
            related: RelatedEventInfo::new(current),
        }
    }

    /// Select neighbors from a candidate set in one pass
    pub fn select<'a, I>(current: Event, candidates: I) -> RelatedEventInfo
    where
        I: IntoIterator<Item = &'a Event>,
    {
        let mut selector = NeighborSelector::new(current);
        for candidate in candidates {
            selector.offer(candidate);
        }
        selector.finish()
    }

    /// Consider one candidate event
    pub fn offer(&mut self, candidate: &Event) {
        let current = &self.related.current;
        if candidate.id() == current.id() {
            return;
        }

        match candidate.timestamp().cmp(&current.timestamp()) {
            Ordering::Less => {
                let replace = match &self.related.previous {
                    None => true,
                    Some(best) => closer_preceding(candidate, best),
                };
                if replace {
                    self.related.previous = Some(candidate.clone());
                }
            }
            Ordering::Greater => {
                let replace = match &self.related.subsequent {
                    None => true,
                    Some(best) => closer_following(candidate, best),
                };
                if replace {
                    self.related.subsequent = Some(candidate.clone());
                }
            }
            Ordering::Equal => {}
        }
    }

    pub fn finish(self) -> RelatedEventInfo {
        self.related
    }
}

fn closer_preceding(candidate: &Event, best: &Event) -> bool {
    match candidate.timestamp().cmp(&best.timestamp()) {
        Ordering::Greater => true,
        Ordering::Equal => candidate.id() < best.id(),
        Ordering::Less => false,
    }
}

fn closer_following(candidate: &Event, best: &Event) -> bool {
    match candidate.timestamp().cmp(&best.timestamp()) {
        Ordering::Less => true,
        Ordering::Equal => candidate.id() < best.id(),
        Ordering::Greater => false,
    }
}
