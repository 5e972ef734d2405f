//! Single-slot blocking hand-off between two threads.

use crate::util::{DenoiseError, DenoiseResult};
use std::sync::{Condvar, Mutex, MutexGuard};

struct Slot<T> {
    item: Option<T>,
    keep_running: bool,
}

/// One slot shared by a producer and a consumer.
///
/// `put` blocks while the slot is full and `take` blocks while it is empty.
/// After [`Handoff::close`] no more items are accepted; the consumer still
/// receives an item that was already in the slot, then `None`.
pub struct Handoff<T> {
    stage: &'static str,
    slot: Mutex<Slot<T>>,
    input_ready: Condvar,
    output_ready: Condvar,
}

impl<T> Handoff<T> {
    /// `stage` names the hand-off in [`DenoiseError::PipelineClosed`].
    pub fn new(stage: &'static str) -> Self {
        Self {
            stage,
            slot: Mutex::new(Slot {
                item: None,
                keep_running: true,
            }),
            input_ready: Condvar::new(),
            output_ready: Condvar::new(),
        }
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    /// Waits for the slot to empty, then stores `item`.
    pub fn put(&self, item: T) -> DenoiseResult<()> {
        let mut slot = self.lock()?;
        while slot.keep_running && slot.item.is_some() {
            slot = self.input_ready.wait(slot).map_err(|_| self.closed())?;
        }
        if !slot.keep_running {
            return Err(self.closed());
        }
        slot.item = Some(item);
        self.output_ready.notify_one();
        Ok(())
    }

    /// Waits for an item. Returns `None` once the hand-off is closed and
    /// empty.
    pub fn take(&self) -> DenoiseResult<Option<T>> {
        let mut slot = self.lock()?;
        while slot.keep_running && slot.item.is_none() {
            slot = self.output_ready.wait(slot).map_err(|_| self.closed())?;
        }
        let item = slot.item.take();
        if item.is_some() {
            self.input_ready.notify_one();
        }
        Ok(item)
    }

    /// Stops accepting items and wakes every waiter.
    pub fn close(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            slot.keep_running = false;
        }
        self.input_ready.notify_all();
        self.output_ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.slot.lock().map(|slot| !slot.keep_running).unwrap_or(true)
    }

    fn lock(&self) -> DenoiseResult<MutexGuard<'_, Slot<T>>> {
        self.slot.lock().map_err(|_| self.closed())
    }

    fn closed(&self) -> DenoiseError {
        DenoiseError::PipelineClosed { stage: self.stage }
    }
}
