//! Module interfaces
//!
//! Every subsystem in `robot_exec` implements [`Component`] and is driven by a [`ComponentTask`],
//! which owns the subsystem's inbound channel and runs the receive, dispatch, act loop on its own
//! thread.
//!
//! Each cycle the task waits a bounded time for a message. If a state change is among the
//! messages visible this cycle it is handed to [`Component::on_state_change`] first. Then
//! [`Component::run`] is always called, with the received message or the synthetic timeout, so
//! long running behaviours keep progressing when no traffic arrives.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

// Internal
use crate::time::Clock;
use comms_if::chan::ChannelReceiver;
use comms_if::msg::{Message, RobotState};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A subsystem owning one piece of hardware.
pub trait Component: Send {
    /// Name used for the thread and in logs.
    fn name(&self) -> &str;

    /// Handle a robot state change. Called before `run` in the cycle the change is seen.
    fn on_state_change(&mut self, state: RobotState, now_s: f64);

    /// Per cycle action for the current mode.
    ///
    /// `msg` is the message received this cycle, which is a timeout message if nothing arrived.
    /// Errors must be handled here and never escape the loop.
    fn run(&mut self, msg: &Message, now_s: f64);

    /// Return true once to have every pending inbound message dropped after this cycle.
    ///
    /// Used after a long action to discard level-triggered commands which piled up meanwhile.
    fn take_clear_request(&mut self) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Runs a component's loop against its inbound channel.
pub struct ComponentTask<C: Component> {
    component: C,
    inbound: ChannelReceiver,
    pending: VecDeque<Message>,
    recv_timeout: Duration,
    clock: Arc<dyn Clock>,
    num_cycles: u64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<C: Component + 'static> ComponentTask<C> {
    pub fn new(
        component: C,
        inbound: ChannelReceiver,
        recv_timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            component,
            inbound,
            pending: VecDeque::new(),
            recv_timeout,
            clock,
            num_cycles: 0,
        }
    }

    pub fn component(&self) -> &C {
        &self.component
    }

    pub fn component_mut(&mut self) -> &mut C {
        &mut self.component
    }

    pub fn num_cycles(&self) -> u64 {
        self.num_cycles
    }

    /// Drop every message that has been received but not yet processed, and anything still
    /// waiting in the channel.
    pub fn clear_messages(&mut self) -> usize {
        let num = self.pending.len() + self.inbound.clear();
        self.pending.clear();
        num
    }

    /// Execute one cycle of the loop.
    pub fn cycle(&mut self) {
        // Block for the first message, then gather everything else already visible
        if self.pending.is_empty() {
            self.pending.push_back(self.inbound.receive(self.recv_timeout));
        }
        while let Some(m) = self.inbound.try_receive() {
            self.pending.push_back(m);
        }

        let now_s = self.clock.now_s();

        let state_change_idx = self
            .pending
            .iter()
            .position(|m| m.command.is_state_change());

        let msg = match state_change_idx {
            Some(i) => match self.pending.remove(i) {
                Some(m) => {
                    if let Some(state) = m.command.robot_state() {
                        debug!("{} entering state {:?}", self.component.name(), state);
                        self.component.on_state_change(state, now_s);
                    }
                    m
                }
                None => Message::timeout(),
            },
            None => self.pending.pop_front().unwrap_or_else(Message::timeout),
        };

        self.component.run(&msg, now_s);
        self.num_cycles += 1;

        if self.component.take_clear_request() {
            let num = self.clear_messages();
            if num > 0 {
                debug!("{} cleared {} pending messages", self.component.name(), num);
            }
        }
    }

    /// Run cycles until `stop` is set, returning the component.
    pub fn run_until(mut self, stop: Arc<AtomicBool>) -> C {
        info!("{} task started", self.component.name());

        while !stop.load(Ordering::Relaxed) {
            self.cycle();
        }

        info!(
            "{} task stopped after {} cycles",
            self.component.name(),
            self.num_cycles
        );

        self.component
    }

    /// Spawn the loop on its own named thread.
    pub fn spawn(self, stop: Arc<AtomicBool>) -> std::io::Result<JoinHandle<C>> {
        let name = format!("t{}", self.component.name());
        thread::Builder::new()
            .name(name)
            .spawn(move || self.run_until(stop))
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
