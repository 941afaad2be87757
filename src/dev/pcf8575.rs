//! Support for the `PCF8575` "Remote 16-bit I/O expander for I2C-bus with interrupt"
//!
//! Like the `PCF8574`, all pins are quasi-bidirectional and there are no registers.  The port is
//! transferred as two bytes, P0x (pins 0..7) first and P1x (pins 8..15) second.
use crate::bus::address;
use crate::common::Chip;
use embedded_hal_async::i2c::I2c;

/// `PCF8575` "Remote 16-bit I/O expander for I2C-bus with interrupt"
pub struct Pcf8575<I2C> {
    i2c: I2C,
    addr: u8,
}

impl<I2C: I2c> Pcf8575<I2C> {
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

impl<I2C: I2c> Chip for Pcf8575<I2C> {
    type Error = I2C::Error;

    fn pin_count(&self) -> u8 {
        16
    }

    async fn initialize(&mut self, initial_state: u32) -> Result<(), Self::Error> {
        self.write_state(initial_state).await
    }

    async fn read_state(&mut self) -> Result<u32, Self::Error> {
        let mut buf = [0x00; 2];
        self.i2c.read(self.addr, &mut buf).await?;
        Ok(u16::from_le_bytes(buf).into())
    }

    async fn write_state(&mut self, state: u32) -> Result<(), Self::Error> {
        self.i2c
            .write(self.addr, &(state as u16).to_le_bytes())
            .await
    }
}

#[cfg(test)]
mod tests {
    use crate::common::Chip;
    use embassy_futures::block_on;
    use embedded_hal_mock::eh1::i2c as mock_i2c;

    #[test]
    fn pcf8575() {
        let expectations = [
            mock_i2c::Transaction::write(0x21, vec![0b11111111, 0b11111111]),
            mock_i2c::Transaction::write(0x21, vec![0b11111011, 0b11111111]),
            mock_i2c::Transaction::read(0x21, vec![0b01000000, 0b00000000]),
            mock_i2c::Transaction::write(0x21, vec![0b11111011, 0b11111011]),
            mock_i2c::Transaction::read(0x21, vec![0b11111111, 0b10111111]),
        ];
        let mut bus = mock_i2c::Mock::new(&expectations);

        let mut pcf = super::Pcf8575::new(bus.clone(), true, false, false);
        assert_eq!(pcf.pin_count(), 16);
        block_on(pcf.initialize(0xffff)).unwrap();
        block_on(pcf.write_state(0xfffb)).unwrap();
        assert_eq!(block_on(pcf.read_state()).unwrap(), 0x0040);
        block_on(pcf.write_state(0xfbfb)).unwrap();
        assert_eq!(block_on(pcf.read_state()).unwrap(), 0xbfff);

        bus.done();
    }
}
