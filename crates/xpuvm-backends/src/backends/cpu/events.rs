//! Event table for the CPU backend
//!
//! Commands execute eagerly on the host, so their data effects are visible
//! as soon as they are enqueued. Completion status is tracked separately:
//! in immediate mode every command completes on enqueue; in deferred mode
//! commands stay `Queued` until [`EventTable::complete`] or a host wait
//! finishes them. Markers complete when every event they wait on completes.
//! A marker with an empty wait list covers everything enqueued since the
//! previous such marker, and that marker itself.
//!
//! Once such a full marker is complete, every older event is complete too,
//! so the table retires them. Retired handles stay valid as wait-list
//! entries and always read as complete; their timestamps are gone.

use crate::backend::{EventHandle, EventProfile, EventStatus};
use crate::error::{BackendError, Result};
use std::collections::{BTreeMap, HashSet};
use std::ops::Range;
use std::time::Instant;

/// Kind of command behind an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Write,
    Read,
    Launch,
    Marker,
}

#[derive(Debug, Clone)]
struct EventRecord {
    kind: EventKind,
    complete: bool,
    deps: Vec<EventHandle>,
    queued_ns: u64,
    start_ns: u64,
    end_ns: u64,
}

pub struct EventTable {
    origin: Instant,
    events: BTreeMap<u64, EventRecord>,
    next_id: u64,
    deferred: bool,
    /// Events a full marker would wait on
    frontier: Vec<EventHandle>,
    /// Most recent full marker not yet used as a retirement cut
    last_full: Option<u64>,
    /// Ids dropped from the table after completing
    retired: Range<u64>,
}

impl EventTable {
    pub fn new(deferred: bool) -> Self {
        Self {
            origin: Instant::now(),
            events: BTreeMap::new(),
            next_id: 1,
            deferred,
            frontier: Vec::new(),
            last_full: None,
            retired: 1..1,
        }
    }

    pub fn set_deferred(&mut self, deferred: bool) {
        self.deferred = deferred;
    }

    /// Nanoseconds since the table was created
    pub fn now_ns(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }

    /// Record a command that ran between `queued_ns` and now
    pub fn record(&mut self, kind: EventKind, queued_ns: u64, deps: &[EventHandle]) -> Result<EventHandle> {
        self.check_all(deps)?;
        let handle = EventHandle::new(self.next_id);
        self.next_id += 1;
        let end_ns = self.now_ns();
        self.events.insert(
            handle.id(),
            EventRecord {
                kind,
                complete: !self.deferred,
                deps: deps.to_vec(),
                queued_ns,
                start_ns: queued_ns,
                end_ns,
            },
        );
        self.frontier.push(handle);
        Ok(handle)
    }

    /// Record a marker over `wait`, or over all prior work when empty
    pub fn marker(&mut self, wait: &[EventHandle]) -> Result<(EventHandle, Vec<EventHandle>)> {
        let full = wait.is_empty();
        let deps: Vec<EventHandle> = if full { self.frontier.clone() } else { wait.to_vec() };
        let queued_ns = self.now_ns();
        self.check_all(&deps)?;
        let mut complete = true;
        for dep in &deps {
            complete &= self.is_complete(*dep)?;
        }

        let handle = EventHandle::new(self.next_id);
        self.next_id += 1;
        self.events.insert(
            handle.id(),
            EventRecord {
                kind: EventKind::Marker,
                complete,
                deps: deps.clone(),
                queued_ns,
                start_ns: queued_ns,
                end_ns: queued_ns,
            },
        );
        if full {
            self.frontier = vec![handle];
            self.last_full = Some(handle.id());
            self.retire_covered()?;
        } else {
            self.frontier.push(handle);
        }
        Ok((handle, deps))
    }

    fn check_all(&self, events: &[EventHandle]) -> Result<()> {
        for event in events {
            self.lookup(*event)?;
        }
        Ok(())
    }

    /// The live record of `event`, or `None` once retired
    fn lookup(&self, event: EventHandle) -> Result<Option<&EventRecord>> {
        match self.events.get(&event.id()) {
            Some(record) => Ok(Some(record)),
            None if self.retired.contains(&event.id()) => Ok(None),
            None => Err(BackendError::InvalidEvent(event.id())),
        }
    }

    pub fn is_complete(&self, event: EventHandle) -> Result<bool> {
        let mut pending = vec![event];
        let mut seen = HashSet::new();
        while let Some(next) = pending.pop() {
            let Some(record) = self.lookup(next)? else {
                continue;
            };
            if record.complete {
                continue;
            }
            if record.kind != EventKind::Marker {
                return Ok(false);
            }
            if seen.insert(next.id()) {
                pending.extend(record.deps.iter().copied());
            }
        }
        Ok(true)
    }

    /// Events `event` was enqueued behind; empty once retired
    pub fn dependencies(&self, event: EventHandle) -> Result<Vec<EventHandle>> {
        Ok(self.lookup(event)?.map(|r| r.deps.clone()).unwrap_or_default())
    }

    pub fn profile(&self, event: EventHandle) -> Result<EventProfile> {
        let Some(record) = self.lookup(event)? else {
            return Ok(EventProfile {
                status: EventStatus::Complete,
                queued_ns: 0,
                submit_ns: 0,
                start_ns: 0,
                end_ns: 0,
            });
        };
        let status = if self.is_complete(event)? {
            EventStatus::Complete
        } else {
            EventStatus::Queued
        };
        Ok(EventProfile {
            status,
            queued_ns: record.queued_ns,
            submit_ns: record.start_ns,
            start_ns: record.start_ns,
            end_ns: record.end_ns,
        })
    }

    /// Mark a command complete; markers complete through their dependencies
    pub fn complete(&mut self, event: EventHandle) -> Result<()> {
        let now = self.now_ns();
        if self.lookup(event)?.is_none() {
            return Ok(());
        }
        if let Some(record) = self.events.get_mut(&event.id()) {
            if !record.complete {
                record.complete = true;
                record.end_ns = record.end_ns.max(now);
            }
        }
        Ok(())
    }

    /// Complete `event` and everything it waits on
    pub fn drain(&mut self, event: EventHandle) -> Result<()> {
        let mut pending = vec![event];
        let mut seen = HashSet::new();
        let mut reached = Vec::new();
        while let Some(next) = pending.pop() {
            let Some(record) = self.lookup(next)? else {
                continue;
            };
            if record.complete || !seen.insert(next.id()) {
                continue;
            }
            reached.push(next);
            pending.extend(record.deps.iter().copied());
        }
        // dependencies finish before the events waiting on them
        for handle in reached.into_iter().rev() {
            self.complete(handle)?;
        }
        self.retire_covered()
    }

    /// Drop every event older than the last full marker once it completes
    fn retire_covered(&mut self) -> Result<()> {
        let Some(cut) = self.last_full else {
            return Ok(());
        };
        if !self.is_complete(EventHandle::new(cut))? {
            return Ok(());
        }
        self.events = self.events.split_off(&cut);
        self.retired.end = cut;
        if let Some(record) = self.events.get_mut(&cut) {
            record.complete = true;
            record.deps.clear();
        }
        self.last_full = None;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.frontier.clear();
        self.last_full = None;
        self.retired = self.next_id..self.next_id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immediate_mode_completes_on_record() {
        let mut table = EventTable::new(false);
        let e = table.record(EventKind::Write, 0, &[]).unwrap();
        assert!(table.is_complete(e).unwrap());
        assert_eq!(table.profile(e).unwrap().status, EventStatus::Complete);
    }

    #[test]
    fn test_marker_waits_for_all_dependencies() {
        let mut table = EventTable::new(true);
        let a = table.record(EventKind::Launch, 0, &[]).unwrap();
        let b = table.record(EventKind::Launch, 0, &[]).unwrap();
        let (marker, deps) = table.marker(&[a, b]).unwrap();
        assert_eq!(deps, vec![a, b]);

        assert!(!table.is_complete(marker).unwrap());
        table.complete(a).unwrap();
        assert!(!table.is_complete(marker).unwrap());
        table.complete(b).unwrap();
        assert!(table.is_complete(marker).unwrap());
    }

    #[test]
    fn test_empty_marker_covers_prior_work() {
        let mut table = EventTable::new(true);
        let a = table.record(EventKind::Read, 0, &[]).unwrap();
        let (first, deps) = table.marker(&[]).unwrap();
        assert_eq!(deps, vec![a]);

        let b = table.record(EventKind::Launch, 0, &[]).unwrap();
        let (_, deps) = table.marker(&[]).unwrap();
        assert_eq!(deps, vec![first, b]);
    }

    #[test]
    fn test_marker_over_finished_work_is_complete() {
        let mut table = EventTable::new(false);
        let a = table.record(EventKind::Launch, 0, &[]).unwrap();
        let (marker, _) = table.marker(&[a]).unwrap();
        assert!(table.is_complete(marker).unwrap());
    }

    #[test]
    fn test_drain_and_unknown_events() {
        let mut table = EventTable::new(true);
        let a = table.record(EventKind::Write, 0, &[]).unwrap();
        let (marker, _) = table.marker(&[a]).unwrap();
        table.drain(marker).unwrap();
        assert!(table.is_complete(a).unwrap());
        assert!(matches!(
            table.marker(&[EventHandle::new(99)]),
            Err(BackendError::InvalidEvent(99))
        ));
    }

    #[test]
    fn test_full_marker_retires_finished_work() {
        let mut table = EventTable::new(false);
        let mut last = None;
        for _ in 0..1000 {
            let write = table.record(EventKind::Write, 0, &[]).unwrap();
            table.record(EventKind::Launch, 0, &[write]).unwrap();
            let (marker, _) = table.marker(&[]).unwrap();
            last = Some((write, marker));
        }
        assert_eq!(table.len(), 1);

        // retired handles still work as dependencies and read as complete
        let (write, marker) = last.unwrap();
        assert!(table.is_complete(write).unwrap());
        assert_eq!(table.profile(write).unwrap().status, EventStatus::Complete);
        assert!(table.dependencies(write).unwrap().is_empty());
        let (partial, _) = table.marker(&[write, marker]).unwrap();
        assert!(table.is_complete(partial).unwrap());
        assert_eq!(table.dependencies(partial).unwrap(), vec![write, marker]);
    }

    #[test]
    fn test_deferred_work_is_retired_after_a_wait() {
        let mut table = EventTable::new(true);
        let mut marker = None;
        for _ in 0..10 {
            table.record(EventKind::Launch, 0, &[]).unwrap();
            marker = Some(table.marker(&[]).unwrap().0);
        }
        assert_eq!(table.len(), 20);

        table.drain(marker.unwrap()).unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.is_complete(marker.unwrap()).unwrap());
    }

    #[test]
    fn test_long_marker_chain_drains() {
        let mut table = EventTable::new(true);
        let first = table.record(EventKind::Launch, 0, &[]).unwrap();
        let mut tail = first;
        for _ in 0..5_000 {
            tail = table.marker(&[tail]).unwrap().0;
        }
        assert!(!table.is_complete(tail).unwrap());
        table.drain(tail).unwrap();
        assert!(table.is_complete(first).unwrap());
    }

    #[test]
    fn test_clear_invalidates_old_handles() {
        let mut table = EventTable::new(false);
        let a = table.record(EventKind::Write, 0, &[]).unwrap();
        table.marker(&[]).unwrap();
        table.clear();
        assert!(matches!(table.is_complete(a), Err(BackendError::InvalidEvent(_))));
    }
}
