//! Support for the `CAT9555` "16-bit I2C and SMBus I/O port with interrupt"
//!
//! The register map is the one of the `PCA9555`: input, output, polarity inversion and
//! configuration registers, each as a port 0 / port 1 pair.  Pairs are transferred port 0 first.
//! The interrupt output fires on any input change and cannot be masked.
use crate::bus::{address, I2cExt};
use crate::common::Chip;
use embedded_hal_async::i2c::I2c;

#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Regs {
    InputPort0 = 0x00,
    InputPort1 = 0x01,
    OutputPort0 = 0x02,
    OutputPort1 = 0x03,
    PolarityInversion0 = 0x04,
    PolarityInversion1 = 0x05,
    Configuration0 = 0x06,
    Configuration1 = 0x07,
}

impl From<Regs> for u8 {
    fn from(r: Regs) -> u8 {
        r as u8
    }
}

/// `CAT9555` "16-bit I2C and SMBus I/O port with interrupt"
pub struct Cat9555<I2C> {
    i2c: I2C,
    addr: u8,
}

impl<I2C: I2c> Cat9555<I2C> {
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

impl<I2C: I2c> Chip for Cat9555<I2C> {
    type Error = I2C::Error;

    fn pin_count(&self) -> u8 {
        16
    }

    async fn initialize(&mut self, initial_state: u32) -> Result<(), Self::Error> {
        self.i2c
            .write_reg_pair(self.addr, Regs::PolarityInversion0, 0x0000)
            .await?;
        self.write_state(initial_state).await?;
        self.write_direction(0xffff).await
    }

    async fn read_state(&mut self) -> Result<u32, Self::Error> {
        Ok(self
            .i2c
            .read_reg_pair(self.addr, Regs::InputPort0)
            .await?
            .into())
    }

    async fn write_state(&mut self, state: u32) -> Result<(), Self::Error> {
        self.i2c
            .write_reg_pair(self.addr, Regs::OutputPort0, state as u16)
            .await
    }

    async fn write_direction(&mut self, input_mask: u32) -> Result<(), Self::Error> {
        self.i2c
            .write_reg_pair(self.addr, Regs::Configuration0, input_mask as u16)
            .await
    }
}

#[cfg(test)]
mod tests {
    use crate::common::Chip;
    use embassy_futures::block_on;
    use embedded_hal_mock::eh1::i2c as mock_i2c;

    #[test]
    fn cat9555() {
        let expectations = [
            // initialize
            mock_i2c::Transaction::write(0x24, vec![0x04, 0x00, 0x00]),
            mock_i2c::Transaction::write(0x24, vec![0x02, 0xff, 0x00]),
            mock_i2c::Transaction::write(0x24, vec![0x06, 0xff, 0xff]),
            // io0_0 output
            mock_i2c::Transaction::write(0x24, vec![0x06, 0xfe, 0xff]),
            mock_i2c::Transaction::write(0x24, vec![0x02, 0xfe, 0xff]),
            // interrupt control is a no-op
            mock_i2c::Transaction::write_read(0x24, vec![0x00], vec![0x80, 0x01]),
        ];
        let mut bus = mock_i2c::Mock::new(&expectations);

        let mut cat = super::Cat9555::new(bus.clone(), false, false, true);
        block_on(cat.initialize(0x00ff)).unwrap();
        block_on(cat.write_direction(0xfffe)).unwrap();
        block_on(cat.write_state(0xfffe)).unwrap();
        block_on(cat.write_interrupt_control(0xfffe)).unwrap();
        assert_eq!(block_on(cat.read_state()).unwrap(), 0x0180);

        bus.done();
    }
}
