//! Input buffer pool for the render port.
//!
//! A fixed set of hardware-allocated buffers, created while the component
//! moves Loaded→Idle and freed while it moves back. Buffers are handed out
//! round-robin; with a single buffer the same one is returned every time.
//!
//! # Buffer Lifecycle
//!
//! ```text
//! 1. acquire_for_fill  -> FreeForFill, offered to the caller
//! 2. caller writes the frame into the payload
//! 3. submit_filled     -> EmptyThisBuffer, SubmittedToHardware
//! 4. EmptyBufferDone   -> buffer-returned notification
//! 5. acquire_for_fill reclaims it (waiting for step 4 under WaitForReturn)
//! ```

use std::time::Duration;

use tracing::{debug, trace, warn};

use vr_common::{RenderError, RenderResult, ReturnPolicy};

use crate::component::{BufferHeader, IlComponent};
use crate::events::EventSync;

/// Who may touch a buffer right now.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Ownership {
    FreeForFill,
    SubmittedToHardware,
}

#[derive(Debug)]
struct Slot {
    header: BufferHeader,
    owner: Ownership,
}

// ---------------------------------------------------------------------------
// Buffer pool
// ---------------------------------------------------------------------------

pub struct BufferPool {
    port: u32,
    slots: Vec<Slot>,
    buffer_size: u32,
    /// Next slot handed out by `acquire_for_fill`.
    next: usize,
    /// Slot currently offered to the caller.
    offered: Option<usize>,
    policy: ReturnPolicy,
    return_timeout: Duration,
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("port", &self.port)
            .field("buffers", &self.slots.len())
            .field("buffer_size", &self.buffer_size)
            .field("submitted", &self.submitted())
            .field("policy", &self.policy)
            .finish()
    }
}

impl BufferPool {
    pub fn new(port: u32, policy: ReturnPolicy, return_timeout: Duration) -> Self {
        Self {
            port,
            slots: Vec::new(),
            buffer_size: 0,
            next: 0,
            offered: None,
            policy,
            return_timeout,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    pub fn ownership(&self, index: usize) -> Option<Ownership> {
        self.slots.get(index).map(|slot| slot.owner)
    }

    /// Number of buffers currently with the hardware.
    pub fn submitted(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.owner == Ownership::SubmittedToHardware)
            .count()
    }

    /// Slot offered to the caller by the last `acquire_for_fill`.
    pub fn offered(&self) -> Option<usize> {
        self.offered
    }

    /// Hardware identities of all buffers, in slot order.
    pub fn buffer_ids(&self) -> Vec<usize> {
        self.slots.iter().map(|slot| slot.header.id()).collect()
    }

    /// Allocate `count` buffers of `size` bytes. A no-op when buffers exist.
    ///
    /// If an allocation fails, every buffer allocated by this call is freed
    /// again and the pool stays empty.
    pub fn allocate(&mut self, component: &mut dyn IlComponent, count: u32, size: u32) -> RenderResult<()> {
        if !self.slots.is_empty() {
            debug!(
                port = self.port,
                buffers = self.slots.len(),
                "Buffers already allocated, skipping allocation"
            );
            return Ok(());
        }
        if count == 0 || size == 0 {
            return Err(RenderError::Protocol(format!(
                "cannot allocate {count} buffers of {size} bytes"
            )));
        }

        let mut slots = Vec::with_capacity(count as usize);
        for index in 0..count {
            match component.allocate_buffer(self.port, size) {
                Ok(header) => {
                    debug!(
                        index,
                        capacity = header.capacity(),
                        buffer = format_args!("{:#x}", header.id()),
                        "Allocated input buffer"
                    );
                    slots.push(Slot {
                        header,
                        owner: Ownership::FreeForFill,
                    });
                }
                Err(status) => {
                    let err = status.into_error("AllocateBuffer");
                    warn!(
                        index,
                        count,
                        %status,
                        kind = %err.kind(),
                        "Buffer allocation failed, rolling back"
                    );
                    for slot in slots.drain(..) {
                        if let Err(free_status) = component.free_buffer(self.port, slot.header) {
                            warn!(status = %free_status, "FreeBuffer failed during rollback");
                        }
                    }
                    return Err(err);
                }
            }
        }

        self.slots = slots;
        self.buffer_size = size;
        self.next = 0;
        self.offered = None;
        Ok(())
    }

    /// Free every buffer and empty the pool. Safe on an empty pool.
    ///
    /// Keeps freeing past individual failures and reports the first one.
    pub fn release(&mut self, component: &mut dyn IlComponent, events: &EventSync) -> RenderResult<()> {
        if self.slots.is_empty() {
            return Ok(());
        }

        let count = self.slots.len();
        let mut first_error = None;
        for (index, slot) in self.slots.drain(..).enumerate() {
            if slot.owner == Ownership::SubmittedToHardware {
                trace!(index, "Freeing a buffer still held by the hardware");
            }
            if let Err(status) = component.free_buffer(self.port, slot.header) {
                let err = status.into_error("FreeBuffer");
                warn!(index, %status, kind = %err.kind(), "FreeBuffer failed");
                first_error.get_or_insert(err);
            }
        }
        events.clear_returned();
        self.buffer_size = 0;
        self.next = 0;
        self.offered = None;
        debug!(port = self.port, count, "Input buffers released");

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Pick the next buffer to fill and make sure the caller owns it.
    ///
    /// Asking again before submitting returns the same buffer.
    pub fn prepare_fill(&mut self, events: &EventSync) -> RenderResult<usize> {
        if self.slots.is_empty() {
            return Err(RenderError::Protocol(
                "no input buffers allocated".to_string(),
            ));
        }
        if let Some(index) = self.offered {
            return Ok(index);
        }

        let index = self.next;
        let slot = &mut self.slots[index];
        if slot.owner == Ownership::SubmittedToHardware {
            let id = slot.header.id();
            match self.policy {
                ReturnPolicy::WaitForReturn => events.wait_buffer_returned(id, self.return_timeout)?,
                ReturnPolicy::FireAndForget => {
                    if !events.take_returned(id) {
                        trace!(index, "Reusing a buffer before its return notification");
                    }
                }
            }
            slot.owner = Ownership::FreeForFill;
        }

        self.next = (index + 1) % self.slots.len();
        self.offered = Some(index);
        Ok(index)
    }

    /// Writable payload of slot `index`.
    pub fn buffer_mut(&mut self, index: usize) -> RenderResult<&mut [u8]> {
        match self.slots.get_mut(index) {
            Some(slot) if slot.owner == Ownership::FreeForFill => Ok(slot.header.data_mut()),
            Some(_) => Err(RenderError::Protocol(format!(
                "buffer {index} is owned by the hardware"
            ))),
            None => Err(RenderError::Protocol(format!("no buffer at index {index}"))),
        }
    }

    /// Acquire the next buffer and return its index and writable payload.
    pub fn acquire_for_fill(&mut self, events: &EventSync) -> RenderResult<(usize, &mut [u8])> {
        let index = self.prepare_fill(events)?;
        let data = self.buffer_mut(index)?;
        Ok((index, data))
    }

    /// Hand slot `index`, filled with `filled_len` bytes, to the hardware.
    pub fn submit_filled(&mut self, component: &mut dyn IlComponent, index: usize, filled_len: u32) -> RenderResult<()> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or_else(|| RenderError::Protocol(format!("no buffer at index {index}")))?;
        if slot.owner == Ownership::SubmittedToHardware {
            return Err(RenderError::Protocol(format!(
                "buffer {index} submitted again before the hardware returned it"
            )));
        }
        if filled_len as usize > slot.header.capacity() {
            return Err(RenderError::Protocol(format!(
                "filled length {filled_len} exceeds buffer capacity {}",
                slot.header.capacity()
            )));
        }

        slot.header.set_fill(filled_len, 0);
        component
            .empty_this_buffer(&slot.header)
            .map_err(|status| status.into_error("EmptyThisBuffer"))?;
        slot.owner = Ownership::SubmittedToHardware;
        if self.offered == Some(index) {
            self.offered = None;
        }
        trace!(index, filled_len, "Input buffer submitted");
        Ok(())
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        if !self.slots.is_empty() {
            warn!(
                port = self.port,
                buffers = self.slots.len(),
                "Buffer pool dropped with allocated buffers; they are freed with the component"
            );
        }
    }
}
