//! Delivery gate for machine links.
//!
//! Link handlers enter the gate before forwarding and leave when done. A
//! closed gate turns deliveries away; `drain` waits for the ones already
//! inside.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct GateState {
    open: bool,
    in_flight: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Gate {
    state: Mutex<GateState>,
    settled: Condvar,
}

/// Held by a delivery while it is inside the gate.
pub(crate) struct Pass<'a> {
    gate: &'a Gate,
}

impl Drop for Pass<'_> {
    fn drop(&mut self) {
        let mut state = self.gate.state.lock();
        state.in_flight -= 1;
        if state.in_flight == 0 {
            self.gate.settled.notify_all();
        }
    }
}

impl Gate {
    pub(crate) fn open(&self) {
        self.state.lock().open = true;
    }

    pub(crate) fn close(&self) {
        self.state.lock().open = false;
    }

    pub(crate) fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// Enter if open.
    pub(crate) fn enter(&self) -> Option<Pass<'_>> {
        let mut state = self.state.lock();
        if !state.open {
            return None;
        }
        state.in_flight += 1;
        Some(Pass { gate: self })
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.state.lock().in_flight
    }

    /// Wait until nothing is in flight or `timeout` passes. Returns whether
    /// the gate settled.
    pub(crate) fn drain(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.in_flight > 0 {
            if self.settled.wait_until(&mut state, deadline).timed_out() {
                return state.in_flight == 0;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn closed_gate_turns_away() {
        let gate = Gate::default();
        assert!(gate.enter().is_none());
        gate.open();
        assert!(gate.enter().is_some());
        gate.close();
        assert!(gate.enter().is_none());
    }

    #[test]
    fn pass_counts_in_flight() {
        let gate = Gate::default();
        gate.open();
        let first = gate.enter().unwrap();
        let second = gate.enter().unwrap();
        assert_eq!(gate.in_flight(), 2);
        drop(first);
        drop(second);
        assert_eq!(gate.in_flight(), 0);
        assert!(gate.drain(Duration::from_millis(1)));
    }

    #[test]
    fn drain_times_out_while_held() {
        let gate = Gate::default();
        gate.open();
        let _pass = gate.enter().unwrap();
        gate.close();
        assert!(!gate.drain(Duration::from_millis(20)));
    }

    #[test]
    fn drain_waits_for_release() {
        let gate = Arc::new(Gate::default());
        gate.open();
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();

        let worker = {
            let gate = Arc::clone(&gate);
            std::thread::spawn(move || {
                let _pass = gate.enter().unwrap();
                entered_tx.send(()).unwrap();
                std::thread::sleep(Duration::from_millis(50));
            })
        };

        entered_rx.recv().unwrap();
        gate.close();
        assert!(gate.drain(Duration::from_secs(5)));
        assert_eq!(gate.in_flight(), 0);
        worker.join().unwrap();
    }
}
