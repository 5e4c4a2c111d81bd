//! Event lists filled by ADD_DEPENDENCY and drained by consumers
//!
//! Each list is a fixed-capacity array plus a cursor. Consumers (transfers,
//! launches, barriers) pass the filled prefix as their wait list and then
//! reset the cursor.

use crate::error::{Error, Result};
use xpuvm_backends::EventHandle;

#[derive(Debug, Clone)]
pub struct EventList {
    events: Vec<EventHandle>,
    capacity: usize,
}

impl EventList {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn as_slice(&self) -> &[EventHandle] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn push(&mut self, event: EventHandle) -> bool {
        if self.events.len() >= self.capacity {
            return false;
        }
        self.events.push(event);
        true
    }

    fn reset(&mut self) {
        self.events.clear();
    }
}

/// All event lists of one interpreter
#[derive(Debug, Clone)]
pub struct EventTracker {
    lists: Vec<EventList>,
}

impl EventTracker {
    /// `count` lists of `capacity` events each
    pub fn new(count: usize, capacity: usize) -> Self {
        Self {
            lists: (0..count).map(|_| EventList::new(capacity)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    fn list_mut(&mut self, index: u32) -> Result<&mut EventList> {
        let count = self.lists.len();
        self.lists
            .get_mut(index as usize)
            .ok_or_else(|| Error::malformed(format!("event list {} out of range ({} lists)", index, count)))
    }

    pub fn list(&self, index: u32) -> Result<&EventList> {
        self.lists
            .get(index as usize)
            .ok_or_else(|| Error::malformed(format!("event list {} out of range ({} lists)", index, self.lists.len())))
    }

    pub fn reset_all(&mut self) {
        self.lists.iter_mut().for_each(EventList::reset);
    }

    /// Reset the cursor of a consumed list; `None` is a no-op
    pub fn reset(&mut self, index: Option<u32>) -> Result<()> {
        if let Some(index) = index {
            self.list_mut(index)?.reset();
        }
        Ok(())
    }

    pub fn push(&mut self, index: u32, event: EventHandle) -> Result<()> {
        let list = self.list_mut(index)?;
        if !list.push(event) {
            return Err(Error::EventListOverflow {
                list: index as usize,
                capacity: list.capacity(),
            });
        }
        Ok(())
    }

    /// Events a consumer must wait on
    ///
    /// Empty when dependencies are disabled or no list is named.
    pub fn wait_list(&self, index: Option<u32>, use_dependencies: bool) -> Result<Vec<EventHandle>> {
        match index {
            Some(index) if use_dependencies => Ok(self.list(index)?.as_slice().to_vec()),
            _ => Ok(Vec::new()),
        }
    }
}
