//! Support for the `MCP23017` "16-Bit I/O Expander with Serial Interface"
//!
//! Datasheet: https://ww1.microchip.com/downloads/en/devicedoc/20001952c.pdf
//!
//! The MCP23017 offers two eight-bit GPIO ports.  It has three
//! address pins, so eight devices can coexist on an I2C bus.
//!
//! The interrupt outputs of both ports are mirrored and open-drain, so either INTA or INTB can be
//! wired to a shared interrupt line.
//!
//! Register pairs are written and read in one transaction, port A first, relying on BANK=0 and
//! the chip's address auto-increment.  In 16-bit values the lower byte corresponds to port A and
//! the upper byte to port B.
use crate::bus::{address, I2cExt};
use crate::common::Chip;
use embedded_hal_async::i2c::I2c;

#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// N.B.: These values are for BANK=0, which is the reset state of
/// the chip (and this driver does not change).
///
/// Only the port A register of each pair is listed; port B follows at the next address.
enum Regs {
    /// IODIR: input/output direction: 0=output; 1=input
    IODIRA = 0x00,
    /// IPOL: input polarity: 0=register values match input pins; 1=opposite
    IPOLA = 0x02,
    /// GPINTEN: interrupt-on-change: 0=disable; 1=enable
    GPINTENA = 0x04,
    /// DEFVAL: default values for interrupt-on-change
    DEFVALA = 0x06,
    /// INTCON: interrupt-on-change config: 0=compare to previous pin value;
    ///   1=compare to corresponding bit in DEFVAL
    INTCONA = 0x08,
    /// IOCON: configuration register, shared by both ports
    /// - Pin 7: BANK (which driver assumes stays 0)
    /// - Pin 6: MIRROR: if enabled, INTA and INTB are logically ORed
    /// - Pin 5: SEQOP: 0=address pointer increments
    /// - Pin 2: ODR: 1=interrupt pins are open-drain outputs
    IOCON = 0x0a,
    /// GPPU: weak pull-ups for pins configured as inputs
    GPPUA = 0x0c,
    /// INTF: interrupt flags
    INTFA = 0x0e,
    /// INTCAP: pin values captured at the time of the interrupt
    INTCAPA = 0x10,
    /// GPIO: reflects logic level on pins
    GPIOA = 0x12,
    /// OLAT: output latches
    OLATA = 0x14,
}

impl From<Regs> for u8 {
    fn from(r: Regs) -> u8 {
        r as u8
    }
}

const IOCON_MIRROR: u8 = 1 << 6;
const IOCON_ODR: u8 = 1 << 2;

/// `MCP23017` "16-Bit I/O Expander with Serial Interface"
pub struct Mcp23017<I2C> {
    i2c: I2C,
    addr: u8,
}

impl<I2C: I2c> Mcp23017<I2C> {
    pub fn new(i2c: I2C, a0: bool, a1: bool, a2: bool) -> Self {
        Self::with_address(i2c, address(0x20, a0, a1, a2))
    }

    pub fn with_address(i2c: I2C, addr: u8) -> Self {
        Self { i2c, addr }
    }

    pub fn address(&self) -> u8 {
        self.addr
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2c> Chip for Mcp23017<I2C> {
    type Error = I2C::Error;

    fn pin_count(&self) -> u8 {
        16
    }

    async fn initialize(&mut self, initial_state: u32) -> Result<(), Self::Error> {
        self.i2c
            .write_reg(self.addr, Regs::IOCON, IOCON_MIRROR | IOCON_ODR)
            .await?;
        self.i2c.write_reg_pair(self.addr, Regs::IPOLA, 0x0000).await?;
        self.i2c
            .write_reg_pair(self.addr, Regs::GPINTENA, 0x0000)
            .await?;
        self.i2c
            .write_reg_pair(self.addr, Regs::INTCONA, 0x0000)
            .await?;
        self.write_state(initial_state).await?;
        self.i2c
            .write_reg_pair(self.addr, Regs::IODIRA, 0xffff)
            .await
    }

    async fn read_state(&mut self) -> Result<u32, Self::Error> {
        Ok(self.i2c.read_reg_pair(self.addr, Regs::GPIOA).await?.into())
    }

    async fn write_state(&mut self, state: u32) -> Result<(), Self::Error> {
        self.i2c
            .write_reg_pair(self.addr, Regs::OLATA, state as u16)
            .await
    }

    async fn write_direction(&mut self, input_mask: u32) -> Result<(), Self::Error> {
        self.i2c
            .write_reg_pair(self.addr, Regs::IODIRA, input_mask as u16)
            .await?;
        self.i2c
            .write_reg_pair(self.addr, Regs::GPPUA, input_mask as u16)
            .await
    }

    async fn write_interrupt_control(&mut self, mask: u32) -> Result<(), Self::Error> {
        self.i2c
            .write_reg_pair(self.addr, Regs::GPINTENA, mask as u16)
            .await
    }
}

#[cfg(test)]
mod tests {
    use crate::common::Chip;
    use embassy_futures::block_on;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c as mock_i2c;

    #[test]
    fn mcp23017() {
        let expectations = [
            // initialize
            mock_i2c::Transaction::write(0x22, vec![0x0a, 0x44]),
            mock_i2c::Transaction::write(0x22, vec![0x02, 0x00, 0x00]),
            mock_i2c::Transaction::write(0x22, vec![0x04, 0x00, 0x00]),
            mock_i2c::Transaction::write(0x22, vec![0x08, 0x00, 0x00]),
            mock_i2c::Transaction::write(0x22, vec![0x14, 0x00, 0x00]),
            mock_i2c::Transaction::write(0x22, vec![0x00, 0xff, 0xff]),
            // gpa0 and gpb0 outputs
            mock_i2c::Transaction::write(0x22, vec![0x00, 0xfe, 0xfe]),
            mock_i2c::Transaction::write(0x22, vec![0x0c, 0xfe, 0xfe]),
            mock_i2c::Transaction::write(0x22, vec![0x04, 0xfe, 0xfe]),
            // output gpb0 high
            mock_i2c::Transaction::write(0x22, vec![0x14, 0xfe, 0xff]),
            // input gpa7 low
            mock_i2c::Transaction::write_read(0x22, vec![0x12], vec![0x7f, 0xff]),
        ];
        let mut bus = mock_i2c::Mock::new(&expectations);

        let mut mcp = super::Mcp23017::new(bus.clone(), false, true, false);
        assert_eq!(mcp.pin_count(), 16);
        block_on(mcp.initialize(0x0000)).unwrap();
        block_on(mcp.write_direction(0xfefe)).unwrap();
        block_on(mcp.write_interrupt_control(0xfefe)).unwrap();
        block_on(mcp.write_state(0xfffe)).unwrap();
        assert_eq!(block_on(mcp.read_state()).unwrap(), 0xff7f);

        bus.done();
    }

    #[test]
    fn bus_error_stops_initialization() {
        let expectations = [
            mock_i2c::Transaction::write(0x20, vec![0x0a, 0x44]).with_error(ErrorKind::Other),
        ];
        let mut bus = mock_i2c::Mock::new(&expectations);

        let mut mcp = super::Mcp23017::new(bus.clone(), false, false, false);
        assert_eq!(block_on(mcp.initialize(0x0000)), Err(ErrorKind::Other));

        bus.done();
    }
}
