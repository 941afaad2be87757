//! Queued, interrupt-aware driver core for I2C GPIO expanders.
//!
//! An [`Expander`] wraps one [`Chip`] driver and serializes every operation on it through a FIFO
//! queue.  Pins are declared as inputs or outputs with optional inverted logic; inputs are polled
//! manually with [`Expander::do_poll()`] or whenever the chip's interrupt line fires, see
//! [`InterruptBridge`].  Changed inputs are reported to subscribed [`Listener`]s.
#![cfg_attr(not(test), no_std)]

mod bus;
mod common;
pub mod dev;
mod error;
mod event;
mod expander;
mod interrupt;
mod pin;
mod queue;

pub use common::{Chip, Direction, Levels};
pub use error::{Error, ErrorKind};
pub use event::{InputChange, Listener, MAX_LISTENERS};
pub use expander::{Expander, QUEUE_DEPTH};
pub use interrupt::{
    BridgeError, EdgeSource, InterruptBridge, LineId, Registration, MAX_USERS_PER_LINE,
};
pub use pin::MAX_PINS;

pub use dev::any::{AnyChip, ChipKind, UnknownChip};
pub use dev::cat9555::Cat9555;
pub use dev::mcp23008::Mcp23008;
pub use dev::mcp23017::Mcp23017;
pub use dev::pcf8574::Pcf8574;
pub use dev::pcf8575::Pcf8575;
