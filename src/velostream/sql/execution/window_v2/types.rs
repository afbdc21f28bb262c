//! Shared Types for Window Processing V2

use std::fmt;

/// Identifier of one window instance, unique within its strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// Half-open interval `[start, end)` in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowBounds {
    pub start: i64,
    pub end: i64,
}

impl WindowBounds {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp < self.end
    }

    pub fn as_tuple(&self) -> (i64, i64) {
        (self.start, self.end)
    }
}

/// A window instance the record was assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowAssignment {
    pub id: WindowId,
    pub bounds: WindowBounds,
}

/// A window instance that stopped accepting records and must fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosedWindow {
    pub id: WindowId,
    pub bounds: WindowBounds,
}

/// Result of assigning one record.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Windows the record belongs to
    pub windows: Vec<WindowAssignment>,
    /// Windows the record's arrival closed (a session whose gap was exceeded)
    pub closed: Vec<ClosedWindow>,
}

/// Monotonic id source for a strategy.
#[derive(Debug, Default)]
pub struct WindowIdAllocator {
    next: u64,
}

impl WindowIdAllocator {
    pub fn allocate(&mut self) -> WindowId {
        let id = WindowId(self.next);
        self.next += 1;
        id
    }
}
