//! The device module contains the drivers for each of the supported expander chips.
//!
//! All drivers implement [`Chip`](crate::Chip) on top of an async
//! [`I2c`](embedded_hal_async::i2c::I2c) bus.  Use [`AnyChip`](any::AnyChip) to pick the driver at
//! runtime.

pub mod any;
pub mod cat9555;
pub mod mcp23008;
pub mod mcp23017;
pub mod pcf8574;
pub mod pcf8575;
