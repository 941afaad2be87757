/// Capability set every supported chip implements.
///
/// All masks are bit-per-pin with pin 0 in the least significant bit.  The values passed to and
/// returned from a driver are *physical* levels: inversion is resolved by the
/// [`Expander`](crate::Expander) before calling into the driver.
///
/// Errors are returned unchanged to the caller of the expander operation; drivers must not retry.
#[allow(async_fn_in_trait)]
pub trait Chip {
    type Error: core::fmt::Debug;

    /// Number of pins of this chip, either 8 or 16.
    fn pin_count(&self) -> u8;

    /// One-time device bring-up.
    ///
    /// Drivers should disable hardware polarity inversion, put all pins into input mode, write
    /// `initial_state` into the output latch and, where the chip supports it, disable
    /// interrupt-on-change.
    async fn initialize(&mut self, initial_state: u32) -> Result<(), Self::Error>;

    /// Read the levels of all pins in a single transaction.
    async fn read_state(&mut self) -> Result<u32, Self::Error>;

    /// Write the output latch of all pins in a single transaction.
    async fn write_state(&mut self, state: u32) -> Result<(), Self::Error>;

    /// Configure all pins in `input_mask` as inputs and all others as outputs.
    ///
    /// Chips with pull-up registers enable the pull-ups for exactly the pins in `input_mask`.
    /// Chips without a direction register leave this as a no-op.
    async fn write_direction(&mut self, input_mask: u32) -> Result<(), Self::Error> {
        let _ = input_mask;
        Ok(())
    }

    /// Enable interrupt-on-change for the pins in `mask` and disable it for all others.
    async fn write_interrupt_control(&mut self, mask: u32) -> Result<(), Self::Error> {
        let _ = mask;
        Ok(())
    }
}

/// Direction of a single pin.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Not yet assigned; the hardware keeps its reset default, which is input on every supported
    /// chip.
    #[default]
    Undefined,
    Input,
    Output,
}

/// Levels for a group of pins: either one level broadcast to every pin or one bit per pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Levels {
    All(bool),
    Mask(u32),
}

impl Levels {
    /// Resolve to a bitmask for a chip with `all` being the mask of existing pins.
    pub(crate) fn to_mask(self, all: u32) -> u32 {
        match self {
            Levels::All(true) => all,
            Levels::All(false) => 0,
            Levels::Mask(mask) => mask,
        }
    }
}

impl From<bool> for Levels {
    fn from(value: bool) -> Self {
        Levels::All(value)
    }
}

impl From<u8> for Levels {
    fn from(mask: u8) -> Self {
        Levels::Mask(mask.into())
    }
}

impl From<u16> for Levels {
    fn from(mask: u16) -> Self {
        Levels::Mask(mask.into())
    }
}

impl From<u32> for Levels {
    fn from(mask: u32) -> Self {
        Levels::Mask(mask)
    }
}
