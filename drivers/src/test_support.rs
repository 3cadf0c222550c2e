//! In-memory register file standing in for the I2C bus in unit tests.

extern crate std;

use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};
use std::vec::Vec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FakeBusError;

impl embedded_hal::i2c::Error for FakeBusError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// 256 byte register file with address auto-increment.
///
/// Registers listed in `write_one_to_clear` behave like hardware latches:
/// writing a 1 clears the bit, writing a 0 leaves it alone.
#[derive(Debug)]
pub(crate) struct FakeBus {
    pub regs: [u8; 256],
    pub write_one_to_clear: &'static [u8],
    /// Every register write as (register, value), in bus order
    pub writes: Vec<(u8, u8)>,
    pub transactions: usize,
    pub fail: bool,
    pub last_address: Option<u8>,
    pointer: u8,
}

impl FakeBus {
    pub fn new() -> Self {
        Self {
            regs: [0u8; 256],
            write_one_to_clear: &[0x46],
            writes: Vec::new(),
            transactions: 0,
            fail: false,
            last_address: None,
            pointer: 0,
        }
    }

    fn store(&mut self, register: u8, value: u8) {
        self.writes.push((register, value));
        let slot = &mut self.regs[register as usize];
        if self.write_one_to_clear.contains(&register) {
            *slot &= !value;
        } else {
            *slot = value;
        }
    }

    fn run(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), FakeBusError> {
        if self.fail {
            return Err(FakeBusError);
        }
        self.transactions += 1;
        self.last_address = Some(address);
        for operation in operations {
            match operation {
                Operation::Write(bytes) => {
                    if let Some((register, data)) = bytes.split_first() {
                        self.pointer = *register;
                        for value in data {
                            self.store(self.pointer, *value);
                            self.pointer = self.pointer.wrapping_add(1);
                        }
                    }
                }
                Operation::Read(buffer) => {
                    for byte in buffer.iter_mut() {
                        *byte = self.regs[self.pointer as usize];
                        self.pointer = self.pointer.wrapping_add(1);
                    }
                }
            }
        }
        Ok(())
    }
}

impl ErrorType for FakeBus {
    type Error = FakeBusError;
}

impl embedded_hal::i2c::I2c for FakeBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.run(address, operations)
    }
}

#[cfg(feature = "async")]
impl embedded_hal_async::i2c::I2c for FakeBus {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.run(address, operations)
    }
}
