//! Event synchronizer: asynchronous IL notifications and blocking waits.
//!
//! The component calls back from its own thread. Callbacks only update the
//! [`Mirror`] under a mutex and wake every waiter; the controlling thread
//! blocks on a condition variable until its predicate holds, the deadline
//! passes, or the synchronizer is cancelled.
//!
//! ```text
//!  IL thread                          controlling thread
//!  ─────────                          ──────────────────
//!  EventHandler / EmptyBufferDone      wait_state_reached(Idle, 2s)
//!    └─ notify(Notification)             └─ lock mirror
//!         ├─ lock mirror, update            loop {
//!         └─ condvar.notify_all()  ───────►   predicate? → Ok
//!                                             wait_until(deadline)
//!                                           }
//! ```

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

use vr_common::{ComponentState, ErrorKind, RenderError, RenderResult};

use crate::ffi::{
    state_from_raw, OMX_COMMAND_PORT_DISABLE, OMX_COMMAND_PORT_ENABLE, OMX_COMMAND_STATE_SET,
    OMX_EVENT_CMD_COMPLETE, OMX_EVENT_ERROR,
};
use crate::status::OmxStatus;

/// A decoded hardware notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    /// A state-set command completed; the component is now in this state.
    StateChanged(ComponentState),
    /// A port-enable command completed.
    PortEnabled { port: u32 },
    /// A port-disable command completed.
    PortDisabled { port: u32 },
    /// Any other command completed (flush, mark).
    CommandComplete { command: u32, data: u32 },
    /// The component consumed an input buffer and hands it back.
    InputBufferReturned { buffer: usize },
    /// An output buffer was produced. Unused by a render sink.
    OutputBufferProduced { buffer: usize },
    /// The component reported an error.
    Error { status: OmxStatus, data: u32 },
    /// An event kind this core does not know about.
    Unrecognized { event: u32, data1: u32, data2: u32 },
}

impl Notification {
    /// Decode the arguments of an `EventHandler` callback.
    pub fn from_raw_event(event: u32, data1: u32, data2: u32) -> Self {
        match (event, data1) {
            (OMX_EVENT_CMD_COMPLETE, OMX_COMMAND_STATE_SET) => match state_from_raw(data2) {
                Some(state) => Notification::StateChanged(state),
                None => Notification::Unrecognized {
                    event,
                    data1,
                    data2,
                },
            },
            (OMX_EVENT_CMD_COMPLETE, OMX_COMMAND_PORT_ENABLE) => {
                Notification::PortEnabled { port: data2 }
            }
            (OMX_EVENT_CMD_COMPLETE, OMX_COMMAND_PORT_DISABLE) => {
                Notification::PortDisabled { port: data2 }
            }
            (OMX_EVENT_CMD_COMPLETE, command) => Notification::CommandComplete {
                command,
                data: data2,
            },
            (OMX_EVENT_ERROR, code) => Notification::Error {
                status: OmxStatus(code),
                data: data2,
            },
            _ => Notification::Unrecognized {
                event,
                data1,
                data2,
            },
        }
    }
}

/// Counters of delivered notifications.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventStats {
    pub commands_completed: u64,
    pub buffers_returned: u64,
    pub outputs_produced: u64,
    pub errors: u64,
    pub unrecognized: u64,
}

/// Software mirror of hardware-owned state.
#[derive(Debug, Default)]
pub struct Mirror {
    state: Option<ComponentState>,
    ports: HashMap<u32, bool>,
    returned: HashSet<usize>,
    last_error: Option<OmxStatus>,
    /// First fatal or unknown error event; sticks until `reset`.
    fatal: Option<OmxStatus>,
    error_seq: u64,
    cancelled: bool,
    stats: EventStats,
}

impl Mirror {
    pub fn state(&self) -> Option<ComponentState> {
        self.state
    }

    pub fn port_enabled(&self, port: u32) -> Option<bool> {
        self.ports.get(&port).copied()
    }

    pub fn is_returned(&self, buffer: usize) -> bool {
        self.returned.contains(&buffer)
    }
}

/// Receives notifications and provides bounded blocking waits on them.
#[derive(Debug, Default)]
pub struct EventSync {
    mirror: Mutex<Mirror>,
    cond: Condvar,
}

impl EventSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a notification. Safe to call from any thread; never panics on
    /// unexpected input.
    pub fn notify(&self, notification: Notification) {
        let mut mirror = self.mirror.lock();
        match notification {
            Notification::StateChanged(state) => {
                debug!(%state, "Component state change confirmed");
                mirror.state = Some(state);
                mirror.stats.commands_completed += 1;
            }
            Notification::PortEnabled { port } => {
                debug!(port, "Port enable confirmed");
                mirror.ports.insert(port, true);
                mirror.stats.commands_completed += 1;
            }
            Notification::PortDisabled { port } => {
                debug!(port, "Port disable confirmed");
                mirror.ports.insert(port, false);
                mirror.stats.commands_completed += 1;
            }
            Notification::CommandComplete { command, data } => {
                debug!(command, data, "Command complete");
                mirror.stats.commands_completed += 1;
            }
            Notification::InputBufferReturned { buffer } => {
                trace!(buffer = format_args!("{buffer:#x}"), "Input buffer returned");
                mirror.returned.insert(buffer);
                mirror.stats.buffers_returned += 1;
            }
            Notification::OutputBufferProduced { buffer } => {
                debug!(buffer = format_args!("{buffer:#x}"), "Output buffer produced (ignored)");
                mirror.stats.outputs_produced += 1;
            }
            Notification::Error { status, data } => {
                warn!(%status, data, "Component reported an error event");
                mirror.last_error = Some(status);
                if mirror.fatal.is_none() && event_kind(status).is_fatal() {
                    mirror.fatal = Some(status);
                }
                mirror.error_seq += 1;
                mirror.stats.errors += 1;
            }
            Notification::Unrecognized {
                event,
                data1,
                data2,
            } => {
                warn!(
                    event,
                    data1 = format_args!("{data1:#x}"),
                    data2 = format_args!("{data2:#x}"),
                    "Unrecognized component event"
                );
                mirror.stats.unrecognized += 1;
            }
        }
        drop(mirror);
        self.cond.notify_all();
    }

    /// Record a state read directly from the hardware.
    pub fn observe_state(&self, state: ComponentState) {
        self.mirror.lock().state = Some(state);
        self.cond.notify_all();
    }

    /// Record a port enabled flag read directly from the hardware.
    pub fn observe_port(&self, port: u32, enabled: bool) {
        self.mirror.lock().ports.insert(port, enabled);
        self.cond.notify_all();
    }

    /// Last mirrored component state.
    pub fn state(&self) -> Option<ComponentState> {
        self.mirror.lock().state
    }

    pub fn port_enabled(&self, port: u32) -> Option<bool> {
        self.mirror.lock().port_enabled(port)
    }

    pub fn last_error(&self) -> Option<OmxStatus> {
        self.mirror.lock().last_error
    }

    /// Fatal error event received since the last `reset`, whether or not a
    /// wait was running when it arrived.
    pub fn fatal_error(&self) -> Option<OmxStatus> {
        self.mirror.lock().fatal
    }

    pub fn stats(&self) -> EventStats {
        self.mirror.lock().stats.clone()
    }

    /// Remove `buffer` from the returned set. `true` if it had been returned.
    pub fn take_returned(&self, buffer: usize) -> bool {
        self.mirror.lock().returned.remove(&buffer)
    }

    /// Forget every returned-buffer record (the buffers were freed).
    pub fn clear_returned(&self) {
        self.mirror.lock().returned.clear();
    }

    /// Unblock every current and future waiter with `Cancelled`.
    pub fn cancel(&self) {
        self.mirror.lock().cancelled = true;
        self.cond.notify_all();
    }

    /// Start over for a fresh component handle.
    pub fn reset(&self) {
        let mut mirror = self.mirror.lock();
        let stats = std::mem::take(&mut mirror.stats);
        *mirror = Mirror {
            stats,
            ..Mirror::default()
        };
    }

    /// Block until the mirrored state equals `target`.
    pub fn wait_state_reached(&self, target: ComponentState, timeout: Duration) -> RenderResult<()> {
        self.wait_until(
            || format!("component state {target}"),
            timeout,
            |m| m.state == Some(target),
        )
    }

    /// Block until the mirrored enabled flag of `port` equals `want`.
    pub fn wait_port_enabled(&self, port: u32, want: bool, timeout: Duration) -> RenderResult<()> {
        self.wait_until(
            || format!("port {port} {}", if want { "enabled" } else { "disabled" }),
            timeout,
            |m| m.port_enabled(port) == Some(want),
        )
    }

    /// Block until the hardware hands `buffer` back, consuming the record.
    pub fn wait_buffer_returned(&self, buffer: usize, timeout: Duration) -> RenderResult<()> {
        self.wait_until(
            || format!("return of buffer {buffer:#x}"),
            timeout,
            |m| m.is_returned(buffer),
        )?;
        self.take_returned(buffer);
        Ok(())
    }

    /// Current error sequence number. Errors delivered after this mark abort
    /// waits started from it.
    pub fn error_mark(&self) -> u64 {
        self.mirror.lock().error_seq
    }

    /// Core wait loop shared by all predicates.
    ///
    /// A fatal error event aborts every wait, including ones started after it.
    /// Other error notifications abort the wait only when they arrive during
    /// it and are not transient. Unrecognized notifications only wake the loop.
    pub fn wait_until<D, P>(&self, describe: D, timeout: Duration, mut predicate: P) -> RenderResult<()>
    where
        D: Fn() -> String,
        P: FnMut(&Mirror) -> bool,
    {
        let mark = self.error_mark();
        self.wait_marked(&describe, mark, timeout, &mut predicate)
    }

    /// Wait on notifications, falling back to a direct hardware query every
    /// `requery` in case a notification is lost.
    ///
    /// `query` returns `true` when the hardware already satisfies the
    /// condition; it is responsible for seeding the mirror in that case.
    pub fn wait_with_requery<D, P, Q>(
        &self,
        describe: D,
        timeout: Duration,
        requery: Duration,
        mut predicate: P,
        mut query: Q,
    ) -> RenderResult<()>
    where
        D: Fn() -> String,
        P: FnMut(&Mirror) -> bool,
        Q: FnMut() -> RenderResult<bool>,
    {
        let deadline = Instant::now() + timeout;
        let mark = self.error_mark();

        loop {
            let slice = deadline.saturating_duration_since(Instant::now()).min(requery);
            match self.wait_marked(&describe, mark, slice, &mut predicate) {
                Ok(()) => return Ok(()),
                Err(e) if e.is_timeout() => {
                    if query()? {
                        trace!(what = %describe(), "Condition confirmed by direct query");
                        return Ok(());
                    }
                    if Instant::now() >= deadline {
                        return Err(RenderError::TimedOut {
                            what: describe(),
                            waited: timeout,
                        });
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn wait_marked<D, P>(&self, describe: &D, mark: u64, timeout: Duration, predicate: &mut P) -> RenderResult<()>
    where
        D: Fn() -> String,
        P: FnMut(&Mirror) -> bool,
    {
        let deadline = Instant::now() + timeout;
        let mut mirror = self.mirror.lock();

        loop {
            if let Some(status) = mirror.fatal {
                return Err(hardware_event(status, describe()));
            }
            if predicate(&mirror) {
                return Ok(());
            }
            if mirror.cancelled {
                return Err(RenderError::Cancelled(describe()));
            }
            if mirror.error_seq != mark {
                if let Some(status) = mirror.last_error {
                    if event_kind(status) != ErrorKind::Transient {
                        return Err(hardware_event(status, describe()));
                    }
                }
            }
            if self.cond.wait_until(&mut mirror, deadline).timed_out() {
                if predicate(&mirror) {
                    return Ok(());
                }
                return Err(RenderError::TimedOut {
                    what: describe(),
                    waited: timeout,
                });
            }
        }
    }
}

/// Class of an error event. A success code delivered as an error is unknown.
fn event_kind(status: OmxStatus) -> ErrorKind {
    status.classify().unwrap_or(ErrorKind::Unknown)
}

fn hardware_event(status: OmxStatus, waiting_for: String) -> RenderError {
    RenderError::HardwareEvent {
        code: status.code(),
        name: status.name(),
        kind: event_kind(status),
        waiting_for,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn deliver_later(events: &Arc<EventSync>, delay: Duration, n: Notification) -> thread::JoinHandle<()> {
        let events = Arc::clone(events);
        thread::spawn(move || {
            thread::sleep(delay);
            events.notify(n);
        })
    }

    #[test]
    fn decode_state_set_complete() {
        let n = Notification::from_raw_event(OMX_EVENT_CMD_COMPLETE, OMX_COMMAND_STATE_SET, 2);
        assert_eq!(n, Notification::StateChanged(ComponentState::Idle));
    }

    #[test]
    fn decode_port_commands() {
        assert_eq!(
            Notification::from_raw_event(OMX_EVENT_CMD_COMPLETE, OMX_COMMAND_PORT_ENABLE, 90),
            Notification::PortEnabled { port: 90 }
        );
        assert_eq!(
            Notification::from_raw_event(OMX_EVENT_CMD_COMPLETE, OMX_COMMAND_PORT_DISABLE, 90),
            Notification::PortDisabled { port: 90 }
        );
    }

    #[test]
    fn decode_error_and_unknown() {
        assert_eq!(
            Notification::from_raw_event(OMX_EVENT_ERROR, 0x8000_1009, 0),
            Notification::Error {
                status: OmxStatus::HARDWARE,
                data: 0
            }
        );
        assert!(matches!(
            Notification::from_raw_event(0x7F00_0001, 1, 2),
            Notification::Unrecognized { event: 0x7F00_0001, .. }
        ));
        assert!(matches!(
            Notification::from_raw_event(OMX_EVENT_CMD_COMPLETE, OMX_COMMAND_STATE_SET, 99),
            Notification::Unrecognized { .. }
        ));
    }

    #[test]
    fn wait_succeeds_when_state_arrives() {
        let events = Arc::new(EventSync::new());
        let h = deliver_later(
            &events,
            Duration::from_millis(20),
            Notification::StateChanged(ComponentState::Idle),
        );
        events
            .wait_state_reached(ComponentState::Idle, Duration::from_secs(2))
            .unwrap();
        h.join().unwrap();
        assert_eq!(events.state(), Some(ComponentState::Idle));
    }

    #[test]
    fn wait_times_out_when_state_never_arrives() {
        let events = EventSync::new();
        events.observe_state(ComponentState::Loaded);
        let start = Instant::now();
        let err = events
            .wait_state_reached(ComponentState::Executing, Duration::from_millis(50))
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(err.to_string().contains("Executing"));
    }

    #[test]
    fn already_satisfied_returns_immediately() {
        let events = EventSync::new();
        events.observe_port(90, true);
        events
            .wait_port_enabled(90, true, Duration::from_millis(1))
            .unwrap();
    }

    #[test]
    fn unrecognized_event_does_not_abort_wait() {
        let events = Arc::new(EventSync::new());
        let a = deliver_later(
            &events,
            Duration::from_millis(5),
            Notification::Unrecognized {
                event: 0x7F00_0002,
                data1: 0,
                data2: 0,
            },
        );
        let b = deliver_later(
            &events,
            Duration::from_millis(30),
            Notification::PortDisabled { port: 0 },
        );
        events
            .wait_port_enabled(0, false, Duration::from_secs(2))
            .unwrap();
        a.join().unwrap();
        b.join().unwrap();
        assert_eq!(events.stats().unrecognized, 1);
    }

    #[test]
    fn fatal_error_event_aborts_wait() {
        let events = Arc::new(EventSync::new());
        let h = deliver_later(
            &events,
            Duration::from_millis(10),
            Notification::Error {
                status: OmxStatus::HARDWARE,
                data: 0,
            },
        );
        let err = events
            .wait_state_reached(ComponentState::Idle, Duration::from_secs(2))
            .unwrap_err();
        h.join().unwrap();
        assert_eq!(err.kind(), ErrorKind::Fatal);
        assert!(matches!(err, RenderError::HardwareEvent { .. }));
    }

    #[test]
    fn transient_error_event_keeps_waiting() {
        let events = Arc::new(EventSync::new());
        let a = deliver_later(
            &events,
            Duration::from_millis(5),
            Notification::Error {
                status: OmxStatus::UNDERFLOW,
                data: 0,
            },
        );
        let b = deliver_later(
            &events,
            Duration::from_millis(30),
            Notification::StateChanged(ComponentState::Executing),
        );
        events
            .wait_state_reached(ComponentState::Executing, Duration::from_secs(2))
            .unwrap();
        a.join().unwrap();
        b.join().unwrap();
        assert_eq!(events.last_error(), Some(OmxStatus::UNDERFLOW));
    }

    #[test]
    fn non_fatal_error_before_wait_does_not_poison_it() {
        let events = EventSync::new();
        events.notify(Notification::Error {
            status: OmxStatus::INSUFFICIENT_RESOURCES,
            data: 0,
        });
        events.observe_state(ComponentState::Loaded);
        events
            .wait_state_reached(ComponentState::Loaded, Duration::from_millis(10))
            .unwrap();
        assert_eq!(events.fatal_error(), None);
    }

    #[test]
    fn fatal_error_between_waits_sticks() {
        let events = EventSync::new();
        events.observe_state(ComponentState::Loaded);
        events.notify(Notification::Error {
            status: OmxStatus::HARDWARE,
            data: 0,
        });
        events.notify(Notification::Error {
            status: OmxStatus::UNDERFLOW,
            data: 0,
        });
        assert_eq!(events.fatal_error(), Some(OmxStatus::HARDWARE));

        let err = events
            .wait_state_reached(ComponentState::Loaded, Duration::from_millis(10))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Fatal);
        assert!(err.to_string().contains("OMX_ErrorHardware"));

        let err = events
            .wait_with_requery(
                || "port 90 enabled".to_string(),
                Duration::from_millis(20),
                Duration::from_millis(5),
                |m| m.port_enabled(90) == Some(true),
                || Ok(true),
            )
            .unwrap_err();
        assert!(matches!(err, RenderError::HardwareEvent { .. }));

        events.reset();
        assert_eq!(events.fatal_error(), None);
        events.observe_state(ComponentState::Loaded);
        events
            .wait_state_reached(ComponentState::Loaded, Duration::from_millis(10))
            .unwrap();
    }

    #[test]
    fn unknown_error_event_is_fatal() {
        let events = EventSync::new();
        events.notify(Notification::Error {
            status: OmxStatus(0x9000_0001),
            data: 0,
        });
        assert_eq!(events.fatal_error(), Some(OmxStatus(0x9000_0001)));
    }

    #[test]
    fn cancel_unblocks_waiters() {
        let events = Arc::new(EventSync::new());
        let waiter = {
            let events = Arc::clone(&events);
            thread::spawn(move || events.wait_state_reached(ComponentState::Idle, Duration::from_secs(10)))
        };
        thread::sleep(Duration::from_millis(20));
        events.cancel();
        let result = waiter.join().unwrap();
        assert!(matches!(result, Err(RenderError::Cancelled(_))));
    }

    #[test]
    fn buffer_return_is_consumed_once() {
        let events = Arc::new(EventSync::new());
        let h = deliver_later(
            &events,
            Duration::from_millis(10),
            Notification::InputBufferReturned { buffer: 0x1000 },
        );
        events
            .wait_buffer_returned(0x1000, Duration::from_secs(2))
            .unwrap();
        h.join().unwrap();
        assert!(!events.take_returned(0x1000));
        assert_eq!(events.stats().buffers_returned, 1);
    }

    #[test]
    fn reset_clears_mirror_but_keeps_stats() {
        let events = EventSync::new();
        events.notify(Notification::StateChanged(ComponentState::Idle));
        events.cancel();
        events.reset();
        assert_eq!(events.state(), None);
        assert_eq!(events.stats().commands_completed, 1);
        events.observe_state(ComponentState::Loaded);
        events
            .wait_state_reached(ComponentState::Loaded, Duration::from_millis(1))
            .unwrap();
    }

    #[test]
    fn requery_confirms_lost_notification() {
        let events = EventSync::new();
        let mut queries = 0;
        events
            .wait_with_requery(
                || "port 90 enabled".to_string(),
                Duration::from_secs(2),
                Duration::from_millis(5),
                |m| m.port_enabled(90) == Some(true),
                || {
                    queries += 1;
                    Ok(queries >= 3)
                },
            )
            .unwrap();
        assert_eq!(queries, 3);
    }

    #[test]
    fn requery_times_out_with_full_duration() {
        let events = EventSync::new();
        let err = events
            .wait_with_requery(
                || "component state Idle".to_string(),
                Duration::from_millis(30),
                Duration::from_millis(5),
                |m| m.state() == Some(ComponentState::Idle),
                || Ok(false),
            )
            .unwrap_err();
        match err {
            RenderError::TimedOut { waited, .. } => assert_eq!(waited, Duration::from_millis(30)),
            other => panic!("expected timeout, got {other}"),
        }
    }

    #[test]
    fn requery_keeps_error_mark_across_slices() {
        let events = Arc::new(EventSync::new());
        let h = deliver_later(
            &events,
            Duration::from_millis(12),
            Notification::Error {
                status: OmxStatus::INSUFFICIENT_RESOURCES,
                data: 0,
            },
        );
        let err = events
            .wait_with_requery(
                || "component state Idle".to_string(),
                Duration::from_secs(2),
                Duration::from_millis(5),
                |m| m.state() == Some(ComponentState::Idle),
                || Ok(false),
            )
            .unwrap_err();
        h.join().unwrap();
        assert_eq!(err.kind(), ErrorKind::ResourceExhaustion);
    }
}
