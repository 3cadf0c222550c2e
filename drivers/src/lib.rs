#![no_std]
//! AXP192 Power Management IC Library
//!
//! Register-level control of the AXP192 found on M5Stack and similar boards:
//! DC-DC and LDO rails, GPIO function multiplexing, ADC telemetry, a battery
//! level estimate, charging and power key handling.
//!
//! ```ignore
//! use pmic_drivers::axp192::{blocking::Axp192, Rail};
//!
//! let mut pmu = Axp192::new(i2c);
//! pmu.set_rail_voltage(Rail::Ldo2, 3.3)?;
//! pmu.set_all_adc_enabled(true)?;
//! let level = pmu.battery_level()?;
//! ```

/// AXP192 power management IC driver.
pub mod axp192;

mod register;

pub use register::{combine12, combine24, BitField, BlockingRegisterDevice};

#[cfg(feature = "async")]
pub use register::AsyncRegisterDevice;

#[cfg(test)]
mod test_support;

#[cfg(test)]
extern crate alloc;
