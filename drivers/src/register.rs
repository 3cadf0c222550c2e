//! Register primitives shared by the register-mapped drivers in this crate.
//!
//! Every primitive is one logical bus sequence on a device handle borrowed
//! mutably, so nothing else on the same handle can run between the read and
//! the write of a read-modify-write.

use log::trace;

/// A bit field inside an 8-bit register.
///
/// Registers that pack several settings (for example the two LDO setpoints
/// sharing one byte) are described with one `BitField` per setting, and all
/// writes go through [`BitField::merge`] so sibling fields survive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitField {
    /// Position of the least significant bit of the field
    pub offset: u8,
    /// Number of bits in the field
    pub width: u8,
}

impl BitField {
    pub const fn new(offset: u8, width: u8) -> Self {
        Self { offset, width }
    }

    /// Largest code the field can hold
    pub const fn max(self) -> u8 {
        ((1u16 << self.width) - 1) as u8
    }

    /// Mask of the field's bits in register position
    pub const fn mask(self) -> u8 {
        self.max() << self.offset
    }

    /// Extracts the field's code from a register byte
    pub const fn extract(self, register: u8) -> u8 {
        (register & self.mask()) >> self.offset
    }

    /// Replaces the field inside `register` with `code`, leaving every other bit untouched.
    /// Bits of `code` that do not fit the field are dropped.
    pub const fn merge(self, register: u8, code: u8) -> u8 {
        (register & !self.mask()) | ((code << self.offset) & self.mask())
    }
}

/// Assembles a 12-bit ADC value as `(high << 4) | low`.
/// The result never exceeds 0xFFF.
pub const fn combine12(high: u8, low: u8) -> u16 {
    ((high as u16) << 4) | low as u16
}

/// Assembles a 24-bit big-endian value.
pub const fn combine24(bytes: [u8; 3]) -> u32 {
    ((bytes[0] as u32) << 16) | ((bytes[1] as u32) << 8) | bytes[2] as u32
}

#[derive(Debug)]
pub struct BlockingRegisterDevice<I2C> {
    i2c: I2C,
    pub(crate) adr: u8,
}

impl<I2C> BlockingRegisterDevice<I2C>
where
    I2C: embedded_hal::i2c::I2c,
{
    pub fn new(i2c: I2C, adr: u8) -> Self {
        Self { i2c, adr }
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    fn read_registers(&mut self, register: u8, buffer: &mut [u8]) -> Result<(), I2C::Error> {
        self.i2c.write_read(self.adr, &[register], buffer)?;
        trace!("read {:#04x}: {:02x?}", register, buffer);
        Ok(())
    }

    pub fn read_register(&mut self, register: u8) -> Result<u8, I2C::Error> {
        let mut buffer = [0u8];
        self.read_registers(register, &mut buffer)?;
        Ok(buffer[0])
    }

    pub fn read_register12(&mut self, register: u8) -> Result<u16, I2C::Error> {
        let mut buffer = [0u8; 2];
        self.read_registers(register, &mut buffer)?;
        Ok(combine12(buffer[0], buffer[1]))
    }

    pub fn read_register24(&mut self, register: u8) -> Result<u32, I2C::Error> {
        let mut buffer = [0u8; 3];
        self.read_registers(register, &mut buffer)?;
        Ok(combine24(buffer))
    }

    pub fn write_register(&mut self, register: u8, data: u8) -> Result<(), I2C::Error> {
        trace!("write {:#04x}: {:#04x}", register, data);
        self.i2c.write(self.adr, &[register, data])
    }

    pub fn get_register_bits(&mut self, register: u8, mask: u8) -> Result<bool, I2C::Error> {
        let val = self.read_register(register)?;
        Ok((val & mask) != 0)
    }

    pub fn set_register_bits(&mut self, register: u8, mask: u8) -> Result<(), I2C::Error> {
        let val = self.read_register(register)?;
        self.write_register(register, val | mask)
    }

    pub fn clear_register_bits(&mut self, register: u8, mask: u8) -> Result<(), I2C::Error> {
        let val = self.read_register(register)?;
        self.write_register(register, val & !mask)
    }

    pub fn write_register_bits(
        &mut self,
        register: u8,
        mask: u8,
        set: bool,
    ) -> Result<(), I2C::Error> {
        if set {
            self.set_register_bits(register, mask)
        } else {
            self.clear_register_bits(register, mask)
        }
    }

    pub fn read_register_field(&mut self, register: u8, field: BitField) -> Result<u8, I2C::Error> {
        let val = self.read_register(register)?;
        Ok(field.extract(val))
    }

    /// Mask-preserve-and-merge write of one field
    pub fn update_register_field(
        &mut self,
        register: u8,
        field: BitField,
        code: u8,
    ) -> Result<(), I2C::Error> {
        let val = self.read_register(register)?;
        self.write_register(register, field.merge(val, code))
    }
}

#[cfg(feature = "async")]
#[derive(Debug)]
pub struct AsyncRegisterDevice<I2C> {
    i2c: I2C,
    pub(crate) adr: u8,
}

#[cfg(feature = "async")]
impl<I2C> AsyncRegisterDevice<I2C>
where
    I2C: embedded_hal_async::i2c::I2c,
{
    pub fn new(i2c: I2C, adr: u8) -> Self {
        Self { i2c, adr }
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    async fn read_registers(&mut self, register: u8, buffer: &mut [u8]) -> Result<(), I2C::Error> {
        self.i2c.write_read(self.adr, &[register], buffer).await?;
        trace!("read {:#04x}: {:02x?}", register, buffer);
        Ok(())
    }

    pub async fn read_register(&mut self, register: u8) -> Result<u8, I2C::Error> {
        let mut buffer = [0u8];
        self.read_registers(register, &mut buffer).await?;
        Ok(buffer[0])
    }

    pub async fn read_register12(&mut self, register: u8) -> Result<u16, I2C::Error> {
        let mut buffer = [0u8; 2];
        self.read_registers(register, &mut buffer).await?;
        Ok(combine12(buffer[0], buffer[1]))
    }

    pub async fn read_register24(&mut self, register: u8) -> Result<u32, I2C::Error> {
        let mut buffer = [0u8; 3];
        self.read_registers(register, &mut buffer).await?;
        Ok(combine24(buffer))
    }

    pub async fn write_register(&mut self, register: u8, data: u8) -> Result<(), I2C::Error> {
        trace!("write {:#04x}: {:#04x}", register, data);
        self.i2c.write(self.adr, &[register, data]).await
    }

    pub async fn get_register_bits(&mut self, register: u8, mask: u8) -> Result<bool, I2C::Error> {
        let val = self.read_register(register).await?;
        Ok((val & mask) != 0)
    }

    pub async fn set_register_bits(&mut self, register: u8, mask: u8) -> Result<(), I2C::Error> {
        let val = self.read_register(register).await?;
        self.write_register(register, val | mask).await
    }

    pub async fn clear_register_bits(&mut self, register: u8, mask: u8) -> Result<(), I2C::Error> {
        let val = self.read_register(register).await?;
        self.write_register(register, val & !mask).await
    }

    pub async fn write_register_bits(
        &mut self,
        register: u8,
        mask: u8,
        set: bool,
    ) -> Result<(), I2C::Error> {
        if set {
            self.set_register_bits(register, mask).await
        } else {
            self.clear_register_bits(register, mask).await
        }
    }

    pub async fn read_register_field(
        &mut self,
        register: u8,
        field: BitField,
    ) -> Result<u8, I2C::Error> {
        let val = self.read_register(register).await?;
        Ok(field.extract(val))
    }

    /// Mask-preserve-and-merge write of one field
    pub async fn update_register_field(
        &mut self,
        register: u8,
        field: BitField,
        code: u8,
    ) -> Result<(), I2C::Error> {
        let val = self.read_register(register).await?;
        self.write_register(register, field.merge(val, code)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeBus;

    #[test]
    fn test_bit_field_masks() {
        assert_eq!(BitField::new(0, 7).mask(), 0x7F);
        assert_eq!(BitField::new(0, 6).max(), 0x3F);
        assert_eq!(BitField::new(4, 4).mask(), 0xF0);
        assert_eq!(BitField::new(2, 2).mask(), 0x0C);
        assert_eq!(BitField::new(5, 2).extract(0b0110_0000), 3);
    }

    #[test]
    fn test_bit_field_merge_keeps_siblings() {
        let high = BitField::new(4, 4);
        assert_eq!(high.merge(0xA5, 0x3), 0x35);
        // oversized code is cut to the field width
        assert_eq!(high.merge(0x05, 0x1F), 0xF5);
        assert_eq!(BitField::new(2, 2).merge(0b1111_0011, 0b01), 0b1111_0111);
    }

    #[test]
    fn test_combine12() {
        assert_eq!(combine12(0x12, 0x03), 0x123);
        assert_eq!(combine12(0xFF, 0xFF), 0xFFF);
        // the second byte is OR-ed in whole
        assert_eq!(combine12(0x01, 0x23), 0x033);
        assert_eq!(combine12(0x05, 0xA3), 0x0F3);
    }

    #[test]
    fn test_combine24() {
        assert_eq!(combine24([0x01, 0x02, 0x03]), 0x010203);
    }

    #[test]
    fn test_multi_byte_reads_are_single_transactions() {
        let mut bus = FakeBus::new();
        bus.regs[0x78] = 0x12;
        bus.regs[0x79] = 0x03;
        bus.regs[0x70] = 0x00;
        bus.regs[0x71] = 0x10;
        bus.regs[0x72] = 0x20;
        let mut dev = BlockingRegisterDevice::new(bus, 0x34);
        assert_eq!(dev.read_register12(0x78).unwrap(), 0x123);
        assert_eq!(dev.read_register24(0x70).unwrap(), 0x1020);
        let bus = dev.release();
        assert_eq!(bus.transactions, 2);
    }

    #[test]
    fn test_set_and_clear_bits() {
        let mut bus = FakeBus::new();
        bus.regs[0x12] = 0b0100_0001;
        let mut dev = BlockingRegisterDevice::new(bus, 0x34);
        dev.set_register_bits(0x12, 0b0000_0100).unwrap();
        assert!(dev.get_register_bits(0x12, 0b0000_0100).unwrap());
        dev.clear_register_bits(0x12, 0b0100_0000).unwrap();
        assert_eq!(dev.read_register(0x12).unwrap(), 0b0000_0101);
    }

    #[test]
    fn test_update_field_preserves_other_bits() {
        let mut bus = FakeBus::new();
        bus.regs[0x28] = 0x4C;
        let mut dev = BlockingRegisterDevice::new(bus, 0x34);
        dev.update_register_field(0x28, BitField::new(4, 4), 0x9).unwrap();
        assert_eq!(dev.read_register(0x28).unwrap(), 0x9C);
        assert_eq!(dev.read_register_field(0x28, BitField::new(0, 4)).unwrap(), 0xC);
    }

    #[test]
    fn test_transport_error_is_returned() {
        let mut bus = FakeBus::new();
        bus.fail = true;
        let mut dev = BlockingRegisterDevice::new(bus, 0x34);
        assert!(dev.read_register(0x00).is_err());
        assert!(dev.set_register_bits(0x12, 0x01).is_err());
    }
}
