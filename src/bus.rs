use embedded_hal_async::i2c::I2c;

/// Register access helpers shared by the chip drivers.
///
/// Register pairs (`*_pair`) are transferred low byte first, relying on the chip auto-incrementing
/// its register pointer within one transaction.
pub(crate) trait I2cExt: I2c {
    async fn write_reg<R: Into<u8>>(
        &mut self,
        addr: u8,
        reg: R,
        value: u8,
    ) -> Result<(), Self::Error> {
        self.write(addr, &[reg.into(), value]).await
    }

    async fn write_reg_pair<R: Into<u8>>(
        &mut self,
        addr: u8,
        reg: R,
        value: u16,
    ) -> Result<(), Self::Error> {
        let [low, high] = value.to_le_bytes();
        self.write(addr, &[reg.into(), low, high]).await
    }

    async fn read_reg<R: Into<u8>>(&mut self, addr: u8, reg: R) -> Result<u8, Self::Error> {
        let mut buf = [0x00];
        self.write_read(addr, &[reg.into()], &mut buf).await?;
        Ok(buf[0])
    }

    async fn read_reg_pair<R: Into<u8>>(&mut self, addr: u8, reg: R) -> Result<u16, Self::Error> {
        let mut buf = [0x00; 2];
        self.write_read(addr, &[reg.into()], &mut buf).await?;
        Ok(u16::from_le_bytes(buf))
    }
}

impl<I2C: I2c> I2cExt for I2C {}

/// Compute a 7-bit address from a base address and the three hardware address pins.
pub(crate) fn address(base: u8, a0: bool, a1: bool, a2: bool) -> u8 {
    base | ((a2 as u8) << 2) | ((a1 as u8) << 1) | (a0 as u8)
}
