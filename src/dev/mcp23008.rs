//! Support for the `MCP23008` "8-Bit I/O Expander with Serial Interface"
//!
//! Datasheet: https://ww1.microchip.com/downloads/en/DeviceDoc/21919e.pdf
//!
//! The interrupt output is configured as open-drain, so several chips can share one interrupt
//! line.  Interrupt-on-change compares against the previous pin value.
use crate::bus::{address, I2cExt};
use crate::common::Chip;
use embedded_hal_async::i2c::I2c;

#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Regs {
    /// IODIR: input/output direction: 0=output; 1=input
    Iodir = 0x00,
    /// IPOL: input polarity: 0=register values match input pins; 1=opposite
    Ipol = 0x01,
    /// GPINTEN: interrupt-on-change: 0=disable; 1=enable
    Gpinten = 0x02,
    /// DEFVAL: default values for interrupt-on-change
    Defval = 0x03,
    /// INTCON: interrupt-on-change config: 0=compare to previous pin value;
    ///   1=compare to corresponding bit in DEFVAL
    Intcon = 0x04,
    /// IOCON: configuration register; bit 2 (ODR) makes INT an open-drain output
    Iocon = 0x05,
    /// GPPU: weak pull-ups for pins configured as inputs
    Gppu = 0x06,
    /// INTF: interrupt flags
    Intf = 0x07,
    /// INTCAP: pin values captured at the time of the interrupt
    Intcap = 0x08,
    /// GPIO: reflects logic level on pins
    Gpio = 0x09,
    /// OLAT: output latches
    Olat = 0x0a,
}

impl From<Regs> for u8 {
    fn from(r: Regs) -> u8 {
        r as u8
    }
}

const IOCON_ODR: u8 = 1 << 2;

/// `MCP23008` "8-Bit I/O Expander with Serial Interface"
pub struct Mcp23008<I2C> {
    i2c: I2C,
    addr: u8,
}

impl<I2C: I2c> Mcp23008<I2C> {
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

impl<I2C: I2c> Chip for Mcp23008<I2C> {
    type Error = I2C::Error;

    fn pin_count(&self) -> u8 {
        8
    }

    async fn initialize(&mut self, initial_state: u32) -> Result<(), Self::Error> {
        self.i2c.write_reg(self.addr, Regs::Iocon, IOCON_ODR).await?;
        self.i2c.write_reg(self.addr, Regs::Ipol, 0x00).await?;
        self.i2c.write_reg(self.addr, Regs::Gpinten, 0x00).await?;
        self.i2c.write_reg(self.addr, Regs::Intcon, 0x00).await?;
        self.write_state(initial_state).await?;
        self.i2c.write_reg(self.addr, Regs::Iodir, 0xff).await
    }

    async fn read_state(&mut self) -> Result<u32, Self::Error> {
        Ok(self.i2c.read_reg(self.addr, Regs::Gpio).await?.into())
    }

    async fn write_state(&mut self, state: u32) -> Result<(), Self::Error> {
        self.i2c
            .write_reg(self.addr, Regs::Olat, state as u8)
            .await
    }

    async fn write_direction(&mut self, input_mask: u32) -> Result<(), Self::Error> {
        self.i2c
            .write_reg(self.addr, Regs::Iodir, input_mask as u8)
            .await?;
        self.i2c
            .write_reg(self.addr, Regs::Gppu, input_mask as u8)
            .await
    }

    async fn write_interrupt_control(&mut self, mask: u32) -> Result<(), Self::Error> {
        self.i2c
            .write_reg(self.addr, Regs::Gpinten, mask as u8)
            .await
    }
}

#[cfg(test)]
mod tests {
    use crate::common::Chip;
    use embassy_futures::block_on;
    use embedded_hal_mock::eh1::i2c as mock_i2c;

    #[test]
    fn mcp23008() {
        let expectations = [
            // initialize
            mock_i2c::Transaction::write(0x22, vec![0x05, 0x04]),
            mock_i2c::Transaction::write(0x22, vec![0x01, 0x00]),
            mock_i2c::Transaction::write(0x22, vec![0x02, 0x00]),
            mock_i2c::Transaction::write(0x22, vec![0x04, 0x00]),
            mock_i2c::Transaction::write(0x22, vec![0x0a, 0xa5]),
            mock_i2c::Transaction::write(0x22, vec![0x00, 0xff]),
            // gp0 output, rest input
            mock_i2c::Transaction::write(0x22, vec![0x00, 0xfe]),
            mock_i2c::Transaction::write(0x22, vec![0x06, 0xfe]),
            mock_i2c::Transaction::write(0x22, vec![0x02, 0xfe]),
            mock_i2c::Transaction::write(0x22, vec![0x0a, 0xff]),
            mock_i2c::Transaction::write_read(0x22, vec![0x09], vec![0x7f]),
        ];
        let mut bus = mock_i2c::Mock::new(&expectations);

        let mut mcp = super::Mcp23008::new(bus.clone(), false, true, false);
        block_on(mcp.initialize(0xa5)).unwrap();
        block_on(mcp.write_direction(0xfe)).unwrap();
        block_on(mcp.write_interrupt_control(0xfe)).unwrap();
        block_on(mcp.write_state(0xff)).unwrap();
        assert_eq!(block_on(mcp.read_state()).unwrap(), 0x7f);

        bus.done();
    }
}
