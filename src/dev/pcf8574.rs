//! Support for the `PCF8574` & `PCF8574A` "Remote 8-bit I/O expander for I2C-bus with interrupt"
//!
//! The port has no direction register: every pin is quasi-bidirectional.  Writing a 1 releases
//! the pin to a weak pull-up so it can be read as an input, writing a 0 drives it low.  The whole
//! port is read and written as one byte.
//!
//! The interrupt output is always active and is cleared by reading the port.
use crate::bus::address;
use crate::common::Chip;
use embedded_hal_async::i2c::I2c;

/// `PCF8574` "Remote 8-bit I/O expander for I2C-bus with interrupt"
pub struct Pcf8574<I2C> {
    i2c: I2C,
    addr: u8,
}

impl<I2C: I2c> Pcf8574<I2C> {
    pub fn new(i2c: I2C, a0: bool, a1: bool, a2: bool) -> Self {
        Self::with_address(i2c, address(0x20, a0, a1, a2))
    }

    /// The `PCF8574A`, which only differs in its address range.
    pub fn new_a(i2c: I2C, a0: bool, a1: bool, a2: bool) -> Self {
        Self::with_address(i2c, address(0x38, a0, a1, a2))
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

impl<I2C: I2c> Chip for Pcf8574<I2C> {
    type Error = I2C::Error;

    fn pin_count(&self) -> u8 {
        8
    }

    async fn initialize(&mut self, initial_state: u32) -> Result<(), Self::Error> {
        self.write_state(initial_state).await
    }

    async fn read_state(&mut self) -> Result<u32, Self::Error> {
        let mut buf = [0x00];
        self.i2c.read(self.addr, &mut buf).await?;
        Ok(buf[0].into())
    }

    async fn write_state(&mut self, state: u32) -> Result<(), Self::Error> {
        self.i2c.write(self.addr, &[state as u8]).await
    }
}

#[cfg(test)]
mod tests {
    use crate::common::Chip;
    use embassy_futures::block_on;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c as mock_i2c;

    #[test]
    fn pcf8574() {
        let expectations = [
            mock_i2c::Transaction::write(0x21, vec![0b11111111]),
            mock_i2c::Transaction::write(0x21, vec![0b11111011]),
            mock_i2c::Transaction::read(0x21, vec![0b01000000]),
            mock_i2c::Transaction::read(0x21, vec![0b10111111]),
        ];
        let mut bus = mock_i2c::Mock::new(&expectations);

        let mut pcf = super::Pcf8574::new(bus.clone(), true, false, false);
        assert_eq!(pcf.pin_count(), 8);
        block_on(pcf.initialize(0xff)).unwrap();
        // only the low byte reaches the chip
        block_on(pcf.write_state(0xff_fb)).unwrap();
        assert_eq!(block_on(pcf.read_state()).unwrap(), 0x40);
        assert_eq!(block_on(pcf.read_state()).unwrap(), 0xbf);

        bus.done();
    }

    #[test]
    fn pcf8574a() {
        let expectations = [
            mock_i2c::Transaction::write(0x3c, vec![0b00000000]),
            mock_i2c::Transaction::read(0x3c, vec![0x00]).with_error(ErrorKind::Other),
        ];
        let mut bus = mock_i2c::Mock::new(&expectations);

        let mut pcf = super::Pcf8574::new_a(bus.clone(), false, false, true);
        assert_eq!(pcf.address(), 0x3c);
        block_on(pcf.initialize(0x00)).unwrap();
        assert_eq!(block_on(pcf.read_state()), Err(ErrorKind::Other));

        bus.done();
    }
}
