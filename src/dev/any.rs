//! Runtime selection of the chip driver, e.g. from a configuration file.
use core::fmt;
use core::str::FromStr;

use crate::bus::address;
use crate::common::Chip;
use crate::dev::{cat9555::Cat9555, mcp23008::Mcp23008, mcp23017::Mcp23017};
use crate::dev::{pcf8574::Pcf8574, pcf8575::Pcf8575};
use embedded_hal_async::i2c::I2c;

/// Supported chips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChipKind {
    Pcf8574,
    Pcf8574a,
    Pcf8575,
    Mcp23008,
    Mcp23017,
    Cat9555,
}

impl ChipKind {
    pub const ALL: [ChipKind; 6] = [
        ChipKind::Pcf8574,
        ChipKind::Pcf8574a,
        ChipKind::Pcf8575,
        ChipKind::Mcp23008,
        ChipKind::Mcp23017,
        ChipKind::Cat9555,
    ];

    pub fn pin_count(self) -> u8 {
        match self {
            ChipKind::Pcf8574 | ChipKind::Pcf8574a | ChipKind::Mcp23008 => 8,
            ChipKind::Pcf8575 | ChipKind::Mcp23017 | ChipKind::Cat9555 => 16,
        }
    }

    /// Address with all address pins tied low.
    pub fn base_address(self) -> u8 {
        match self {
            ChipKind::Pcf8574a => 0x38,
            _ => 0x20,
        }
    }

    /// Part name as printed on the package.
    pub fn name(self) -> &'static str {
        match self {
            ChipKind::Pcf8574 => "PCF8574",
            ChipKind::Pcf8574a => "PCF8574A",
            ChipKind::Pcf8575 => "PCF8575",
            ChipKind::Mcp23008 => "MCP23008",
            ChipKind::Mcp23017 => "MCP23017",
            ChipKind::Cat9555 => "CAT9555",
        }
    }
}

impl fmt::Display for ChipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The part name did not match any supported chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown expander chip")]
pub struct UnknownChip;

impl FromStr for ChipKind {
    type Err = UnknownChip;

    /// Parse a part name, ignoring ASCII case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChipKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or(UnknownChip)
    }
}

/// Any supported chip, selected at runtime.
pub enum AnyChip<I2C> {
    Pcf8574(Pcf8574<I2C>),
    Pcf8575(Pcf8575<I2C>),
    Mcp23008(Mcp23008<I2C>),
    Mcp23017(Mcp23017<I2C>),
    Cat9555(Cat9555<I2C>),
}

impl<I2C: I2c> AnyChip<I2C> {
    pub fn new(kind: ChipKind, i2c: I2C, a0: bool, a1: bool, a2: bool) -> Self {
        Self::with_address(kind, i2c, address(kind.base_address(), a0, a1, a2))
    }

    pub fn with_address(kind: ChipKind, i2c: I2C, addr: u8) -> Self {
        match kind {
            ChipKind::Pcf8574 | ChipKind::Pcf8574a => {
                AnyChip::Pcf8574(Pcf8574::with_address(i2c, addr))
            }
            ChipKind::Pcf8575 => AnyChip::Pcf8575(Pcf8575::with_address(i2c, addr)),
            ChipKind::Mcp23008 => AnyChip::Mcp23008(Mcp23008::with_address(i2c, addr)),
            ChipKind::Mcp23017 => AnyChip::Mcp23017(Mcp23017::with_address(i2c, addr)),
            ChipKind::Cat9555 => AnyChip::Cat9555(Cat9555::with_address(i2c, addr)),
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $chip:ident => $call:expr) => {
        match $self {
            AnyChip::Pcf8574($chip) => $call,
            AnyChip::Pcf8575($chip) => $call,
            AnyChip::Mcp23008($chip) => $call,
            AnyChip::Mcp23017($chip) => $call,
            AnyChip::Cat9555($chip) => $call,
        }
    };
}

impl<I2C: I2c> Chip for AnyChip<I2C> {
    type Error = I2C::Error;

    fn pin_count(&self) -> u8 {
        dispatch!(self, chip => chip.pin_count())
    }

    async fn initialize(&mut self, initial_state: u32) -> Result<(), Self::Error> {
        dispatch!(self, chip => chip.initialize(initial_state).await)
    }

    async fn read_state(&mut self) -> Result<u32, Self::Error> {
        dispatch!(self, chip => chip.read_state().await)
    }

    async fn write_state(&mut self, state: u32) -> Result<(), Self::Error> {
        dispatch!(self, chip => chip.write_state(state).await)
    }

    async fn write_direction(&mut self, input_mask: u32) -> Result<(), Self::Error> {
        dispatch!(self, chip => chip.write_direction(input_mask).await)
    }

    async fn write_interrupt_control(&mut self, mask: u32) -> Result<(), Self::Error> {
        dispatch!(self, chip => chip.write_interrupt_control(mask).await)
    }
}

#[cfg(test)]
mod tests {
    use super::{AnyChip, ChipKind, UnknownChip};
    use crate::common::Chip;
    use crate::Expander;
    use embassy_futures::block_on;
    use embedded_hal_mock::eh1::i2c as mock_i2c;

    #[test]
    fn parse_kinds() {
        assert_eq!("mcp23017".parse(), Ok(ChipKind::Mcp23017));
        assert_eq!(" PCF8574A ".parse(), Ok(ChipKind::Pcf8574a));
        assert_eq!("pca9999".parse::<ChipKind>(), Err(UnknownChip));
        for kind in ChipKind::ALL {
            assert_eq!(kind.to_string().parse(), Ok(kind));
        }
        assert_eq!(ChipKind::Cat9555.pin_count(), 16);
        assert_eq!(ChipKind::Mcp23008.pin_count(), 8);
    }

    #[test]
    fn dispatch() {
        let expectations = [
            mock_i2c::Transaction::write(0x3b, vec![0xff]),
            mock_i2c::Transaction::read(0x3b, vec![0xf0]),
        ];
        let mut bus = mock_i2c::Mock::new(&expectations);

        let mut chip = AnyChip::new(ChipKind::Pcf8574a, bus.clone(), true, true, false);
        assert_eq!(chip.pin_count(), 8);
        block_on(chip.initialize(0xff)).unwrap();
        block_on(chip.write_direction(0x0f)).unwrap();
        assert_eq!(block_on(chip.read_state()).unwrap(), 0xf0);

        bus.done();
    }

    #[test]
    fn expander_on_mcp23017() {
        let expectations = [
            // initialize(false)
            mock_i2c::Transaction::write(0x20, vec![0x0a, 0x44]),
            mock_i2c::Transaction::write(0x20, vec![0x02, 0x00, 0x00]),
            mock_i2c::Transaction::write(0x20, vec![0x04, 0x00, 0x00]),
            mock_i2c::Transaction::write(0x20, vec![0x08, 0x00, 0x00]),
            mock_i2c::Transaction::write(0x20, vec![0x14, 0x00, 0x00]),
            mock_i2c::Transaction::write(0x20, vec![0x00, 0xff, 0xff]),
            // output_pin(0, false, Some(true))
            mock_i2c::Transaction::write(0x20, vec![0x00, 0xfe, 0xff]),
            mock_i2c::Transaction::write(0x20, vec![0x0c, 0xfe, 0xff]),
            mock_i2c::Transaction::write(0x20, vec![0x04, 0x00, 0x00]),
            mock_i2c::Transaction::write(0x20, vec![0x14, 0xff, 0xff]),
            // input_pin(9, true)
            mock_i2c::Transaction::write(0x20, vec![0x00, 0xfe, 0xff]),
            mock_i2c::Transaction::write(0x20, vec![0x0c, 0xfe, 0xff]),
            mock_i2c::Transaction::write(0x20, vec![0x04, 0x00, 0x00]),
            mock_i2c::Transaction::write(0x20, vec![0x14, 0xff, 0xff]),
            mock_i2c::Transaction::write_read(0x20, vec![0x12], vec![0xff, 0xfd]),
        ];
        let mut bus = mock_i2c::Mock::new(&expectations);

        let expander = Expander::new(AnyChip::new(
            ChipKind::Mcp23017,
            bus.clone(),
            false,
            false,
            false,
        ));
        block_on(expander.initialize(false)).unwrap();
        block_on(expander.output_pin(0, false, Some(true))).unwrap();
        // pin 9 reads low, which is high when inverted
        assert_eq!(block_on(expander.input_pin(9, true)).unwrap(), 0x0201);

        bus.done();
    }
}
