//! Synthetic ingestion payloads
//!
//! Produces a stream of [`EventInfo`] records for a small cast of users
//! hopping between three well-known addresses, with timestamps scattered
//! up to 100 hours either side of 2018-01-01T00:00:00Z. Useful for load
//! testing the daemon and for seeding a demo database.

use rand::rngs::ThreadRng;
use rand::Rng;
use uuid::Builder;

use crate::models::EventInfo;

pub const DEFAULT_USERS: [&str; 7] = ["bob", "mark", "johnny", "mary", "kevin", "mike", "case"];
pub const DEFAULT_IPS: [&str; 3] = ["206.81.252.6", "24.242.71.20", "91.207.175.104"];

/// 2018-01-01T00:00:00Z
pub const DEFAULT_START_TIME: i64 = 1_514_764_800;

const SECONDS_PER_HOUR: i64 = 3600;
const TIME_CHANGES: [i64; 10] = [-1, -2, -3, -4, -5, 1, 2, 3, 4, 5];
const MAX_MULTIPLIER: i64 = 20;

/// Random event source
pub struct EventGenerator<R: Rng = ThreadRng> {
    users: Vec<String>,
    ips: Vec<String>,
    start_time: i64,
    rng: R,
}

impl EventGenerator<ThreadRng> {
    pub fn new() -> Self {
        Self::with_rng(rand::thread_rng())
    }
}

impl Default for EventGenerator<ThreadRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> EventGenerator<R> {
    /// Generator drawing from `rng`, with the default users and addresses
    pub fn with_rng(rng: R) -> Self {
        EventGenerator {
            users: DEFAULT_USERS.iter().map(|u| u.to_string()).collect(),
            ips: DEFAULT_IPS.iter().map(|ip| ip.to_string()).collect(),
            start_time: DEFAULT_START_TIME,
            rng,
        }
    }

    /// Replace the user list; an empty list is ignored
    pub fn users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let users: Vec<String> = users.into_iter().map(Into::into).collect();
        if !users.is_empty() {
            self.users = users;
        }
        self
    }

    /// Replace the address list; an empty list is ignored
    pub fn ips<I, S>(mut self, ips: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ips: Vec<String> = ips.into_iter().map(Into::into).collect();
        if !ips.is_empty() {
            self.ips = ips;
        }
        self
    }

    pub fn start_time(mut self, start_time: i64) -> Self {
        self.start_time = start_time;
        self
    }

    /// One random event for `username`
    pub fn event_for(&mut self, username: &str) -> EventInfo {
        let ip = self.ips[self.rng.gen_range(0..self.ips.len())].clone();
        let change = TIME_CHANGES[self.rng.gen_range(0..TIME_CHANGES.len())];
        let hours = change * self.rng.gen_range(1..=MAX_MULTIPLIER);
        let id = Builder::from_random_bytes(self.rng.gen()).into_uuid();

        EventInfo {
            uuid: id.to_string(),
            username: username.to_string(),
            timestamp: self.start_time.saturating_add(hours * SECONDS_PER_HOUR),
            ip,
        }
    }

    /// `per_user` events for every user, interleaved round-robin
    pub fn generate(&mut self, per_user: usize) -> Vec<EventInfo> {
        let users = self.users.clone();
        let mut events = Vec::with_capacity(per_user * users.len());
        for _ in 0..per_user {
            for user in &users {
                events.push(self.event_for(user));
            }
        }
        events
    }
}
