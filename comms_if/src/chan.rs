//! # Named message channels
//!
//! Each subsystem provisions exactly one inbound channel at startup through the [`ChannelHub`].
//! Any number of senders can then be looked up by name. Messages are encoded into fixed-size frames
//! on send, so a message is always copied by value into the channel.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, warn};
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;
use thiserror::Error;

use crate::msg::{Message, MessageError, Response, MAX_REPLY_NAME_LEN, MESSAGE_SIZE};

// ------------------------------------------------------------------------------------------------
// TYPES
// ------------------------------------------------------------------------------------------------

/// An encoded message.
pub type Frame = [u8; MESSAGE_SIZE];

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Registry of every channel in the process.
///
/// Channels are created once and never re-created while the hub is alive.
#[derive(Default)]
pub struct ChannelHub {
    senders: Mutex<HashMap<String, Sender<Frame>>>,
}

/// Sending half of a named channel.
#[derive(Clone)]
pub struct ChannelSender {
    name: String,
    tx: Sender<Frame>,
}

/// The reading half of a named channel, owned by a single subsystem.
pub struct ChannelReceiver {
    name: String,
    rx: Receiver<Frame>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ChanError {
    #[error("Channel {0:?} has already been provisioned")]
    AlreadyProvisioned(String),

    #[error("Channel {0:?} has not been provisioned")]
    NotProvisioned(String),

    #[error("Channel name {0:?} is too long to be used as a reply address")]
    NameTooLong(String),

    #[error("The channel registry lock is poisoned")]
    RegistryPoisoned,

    #[error("Channel {0:?} has been closed")]
    Closed(String),

    #[error("Could not encode the message: {0}")]
    EncodeError(MessageError),

    #[error("Round trip on {0:?} abandoned before a response arrived")]
    Abandoned(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ChannelHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the named channel and return its receiving end.
    pub fn provision(&self, name: &str) -> Result<ChannelReceiver, ChanError> {
        if name.len() > MAX_REPLY_NAME_LEN {
            return Err(ChanError::NameTooLong(name.to_string()));
        }

        let mut senders = self
            .senders
            .lock()
            .map_err(|_| ChanError::RegistryPoisoned)?;

        if senders.contains_key(name) {
            return Err(ChanError::AlreadyProvisioned(name.to_string()));
        }

        let (tx, rx) = mpsc::channel();
        senders.insert(name.to_string(), tx);

        debug!("Channel {:?} provisioned", name);

        Ok(ChannelReceiver {
            name: name.to_string(),
            rx,
        })
    }

    /// Get a sender for the named channel.
    pub fn sender(&self, name: &str) -> Result<ChannelSender, ChanError> {
        let senders = self
            .senders
            .lock()
            .map_err(|_| ChanError::RegistryPoisoned)?;

        match senders.get(name) {
            Some(tx) => Ok(ChannelSender {
                name: name.to_string(),
                tx: tx.clone(),
            }),
            None => Err(ChanError::NotProvisioned(name.to_string())),
        }
    }

    /// Send a message to the named channel.
    pub fn send(&self, name: &str, msg: &Message) -> Result<(), ChanError> {
        self.sender(name)?.send(msg)
    }

    /// Names of all provisioned channels, sorted.
    pub fn names(&self) -> Vec<String> {
        match self.senders.lock() {
            Ok(s) => {
                let mut names: Vec<String> = s.keys().cloned().collect();
                names.sort();
                names
            }
            Err(_) => vec![],
        }
    }

    /// Send a message and block until a response arrives on `reply`.
    ///
    /// Stale responses already waiting on `reply` are discarded before sending. While waiting the
    /// reply channel is polled every `poll` and `abandon` is checked, if it returns true the wait
    /// ends with [`ChanError::Abandoned`]. Non-response messages arriving on `reply` are dropped.
    pub fn send_with_response<F>(
        &self,
        name: &str,
        msg: Message,
        reply: &ChannelReceiver,
        poll: Duration,
        mut abandon: F,
    ) -> Result<Response, ChanError>
    where
        F: FnMut() -> bool,
    {
        let dropped = reply.clear();
        if dropped > 0 {
            debug!("Dropped {} stale messages from {:?}", dropped, reply.name());
        }

        self.send(name, &msg.with_reply_to(reply.name()))?;

        loop {
            let rsp = reply.receive(poll);

            if let Some(r) = rsp.command.response() {
                return Ok(r);
            }

            if rsp.command != crate::msg::Command::SystemMsgTimeout {
                debug!(
                    "Ignoring {:?} on reply channel {:?}",
                    rsp.command,
                    reply.name()
                );
            }

            if abandon() {
                return Err(ChanError::Abandoned(name.to_string()));
            }
        }
    }
}

impl ChannelSender {
    /// Enqueue a copy of the message, never blocks.
    pub fn send(&self, msg: &Message) -> Result<(), ChanError> {
        let frame = msg.encode().map_err(ChanError::EncodeError)?;

        self.tx
            .send(frame)
            .map_err(|_| ChanError::Closed(self.name.clone()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl ChannelReceiver {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait at most `timeout` for the next message.
    ///
    /// If nothing arrives the synthetic [`Message::timeout`] is returned, this is the normal idle
    /// tick of a subsystem rather than an error.
    pub fn receive(&self, timeout: Duration) -> Message {
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => self.decode(&frame),
            Err(RecvTimeoutError::Timeout) => Message::timeout(),
            Err(RecvTimeoutError::Disconnected) => {
                // Keep the bounded wait even if every sender has gone
                thread::sleep(timeout);
                Message::timeout()
            }
        }
    }

    /// Get the next message if one is already waiting.
    pub fn try_receive(&self) -> Option<Message> {
        match self.rx.try_recv() {
            Ok(frame) => Some(self.decode(&frame)),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Discard every pending message, returning how many were dropped.
    pub fn clear(&self) -> usize {
        let mut num = 0;
        while self.rx.try_recv().is_ok() {
            num += 1;
        }
        num
    }

    fn decode(&self, frame: &Frame) -> Message {
        match Message::decode(frame) {
            Ok(m) => m,
            Err(e) => {
                warn!("Bad frame on channel {:?}: {}", self.name, e);
                Message::unknown()
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
