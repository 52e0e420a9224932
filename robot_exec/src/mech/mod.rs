//! # Mechanisms
//!
//! The ball handling and climbing mechanisms: arm, shooter, hanger and tail. Each is a
//! [`Component`](util::module::Component) with its own channel, run by a
//! [`ComponentTask`](util::module::ComponentTask) in the same way as the drivetrain.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod arm;
pub mod hanger;
mod params;
pub mod shooter;
pub mod tail;

pub use arm::{Arm, ArmHw};
pub use hanger::{Hanger, HangerHw};
pub use params::*;
pub use shooter::{Shooter, ShooterHw};
pub use tail::Tail;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::warn;

use comms_if::{
    chan::ChannelHub,
    msg::{Message, Response},
};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Answer a request, if the sender asked for an answer.
pub(crate) fn reply(hub: &ChannelHub, reply_to: Option<&str>, rsp: Response) {
    if let Some(channel) = reply_to {
        if let Err(e) = hub.send(channel, &Message::response(rsp)) {
            warn!("Could not send {:?} to {:?}: {}", rsp, channel, e);
        }
    }
}
