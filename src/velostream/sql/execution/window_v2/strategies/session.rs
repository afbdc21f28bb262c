//! Session Window Strategy Implementation
//!
//! One session per group key. A session stays open while records keep arriving
//! within `gap` of its latest record and closes once `gap` passes with no record.
//! A record arriving after the gap closes the old session and opens a new one.
//!
//! ```text
//! gap = 5s
//! t=0 t=2 t=4          t=20 t=21
//! [ session 1: 0..9 )  [ session 2: 20..26 )
//! ```
//!
//! A session's window is `[first record, last record + gap)`. Records older than
//! the session start but within the gap extend the session backwards.

use crate::velostream::sql::execution::internal::GroupKey;
use crate::velostream::sql::execution::window_v2::traits::WindowStrategy;
use crate::velostream::sql::execution::window_v2::types::{
    Assignment, ClosedWindow, WindowAssignment, WindowBounds, WindowId, WindowIdAllocator,
};
use rustc_hash::FxHashMap;

#[derive(Debug)]
struct Session {
    id: WindowId,
    start: i64,
    last: i64,
}

#[derive(Debug)]
pub struct SessionWindowStrategy {
    gap_ms: i64,
    sessions: FxHashMap<GroupKey, Session>,
    order: Vec<GroupKey>,
    ids: WindowIdAllocator,
}

impl SessionWindowStrategy {
    pub fn new(gap_ms: i64) -> Self {
        Self {
            gap_ms: gap_ms.max(1),
            sessions: FxHashMap::default(),
            order: Vec::new(),
            ids: WindowIdAllocator::default(),
        }
    }

    fn bounds(&self, session: &Session) -> WindowBounds {
        WindowBounds::new(session.start, session.last.saturating_add(self.gap_ms))
    }

    fn close_session(&self, session: &Session) -> ClosedWindow {
        ClosedWindow {
            id: session.id,
            bounds: self.bounds(session),
        }
    }

    fn take_where(&mut self, due: impl Fn(&Session) -> bool) -> Vec<ClosedWindow> {
        let mut closed = Vec::new();
        let mut kept = Vec::with_capacity(self.order.len());
        for key in std::mem::take(&mut self.order) {
            let expired = self.sessions.get(&key).is_some_and(&due);
            if expired {
                if let Some(session) = self.sessions.remove(&key) {
                    closed.push(self.close_session(&session));
                }
            } else if self.sessions.contains_key(&key) {
                kept.push(key);
            }
        }
        self.order = kept;
        closed
    }
}

impl WindowStrategy for SessionWindowStrategy {
    fn assign(&mut self, timestamp: i64, group: &GroupKey) -> Assignment {
        let mut closed = Vec::new();

        let expired = self
            .sessions
            .get(group)
            .is_some_and(|s| timestamp > s.last.saturating_add(self.gap_ms));
        if expired {
            if let Some(session) = self.sessions.remove(group) {
                self.order.retain(|key| key != group);
                closed.push(self.close_session(&session));
            }
        }

        if !self.sessions.contains_key(group) {
            let session = Session {
                id: self.ids.allocate(),
                start: timestamp,
                last: timestamp,
            };
            self.sessions.insert(group.clone(), session);
            self.order.push(group.clone());
        }

        let mut windows = Vec::with_capacity(1);
        if let Some(session) = self.sessions.get_mut(group) {
            session.start = session.start.min(timestamp);
            session.last = session.last.max(timestamp);
            windows.push(WindowAssignment {
                id: session.id,
                bounds: WindowBounds::new(session.start, session.last.saturating_add(self.gap_ms)),
            });
        }

        Assignment { windows, closed }
    }

    fn close_due(&mut self, now: i64) -> Vec<ClosedWindow> {
        let gap = self.gap_ms;
        self.take_where(|session| session.last.saturating_add(gap) <= now)
    }

    fn close_all(&mut self) -> Vec<ClosedWindow> {
        self.take_where(|_| true)
    }

    fn open_windows(&self) -> usize {
        self.sessions.len()
    }

    fn window_type(&self) -> &'static str {
        "SESSION"
    }
}
