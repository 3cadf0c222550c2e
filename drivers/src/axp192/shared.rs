use core::cell::RefCell;

use embassy_sync::blocking_mutex::{raw::RawMutex, Mutex};
use embedded_hal::i2c::I2c;

use super::blocking::Axp192;

/// [`Axp192`] behind a blocking mutex, for boards where several tasks or
/// interrupt handlers talk to the chip.
///
/// Every closure passed to [`SharedAxp192::lock`] runs with exclusive access,
/// so the read-modify-write sequences inside one driver call (or several
/// calls in the same closure) never interleave with another caller's.
///
/// ```ignore
/// static PMU: StaticCell<SharedAxp192<CriticalSectionRawMutex, I2C>> = StaticCell::new();
/// let pmu = PMU.init(SharedAxp192::new(Axp192::new(i2c)));
/// pmu.lock(|pmu| pmu.set_gpio_pwm_output(1, 128))?;
/// ```
pub struct SharedAxp192<M: RawMutex, I2C> {
    inner: Mutex<M, RefCell<Axp192<I2C>>>,
}

impl<M, I2C> SharedAxp192<M, I2C>
where
    M: RawMutex,
    I2C: I2c,
{
    pub fn new(pmu: Axp192<I2C>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(pmu)),
        }
    }

    /// Runs `f` with exclusive access to the driver
    ///
    /// # Panics
    /// When called again from inside `f`.
    pub fn lock<R>(&self, f: impl FnOnce(&mut Axp192<I2C>) -> R) -> R {
        self.inner.lock(|pmu| f(&mut pmu.borrow_mut()))
    }

    pub fn into_inner(self) -> Axp192<I2C> {
        self.inner.into_inner().into_inner()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::axp192::{PowerOutputControl, Rail};
    use crate::test_support::FakeBus;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

    #[test]
    fn test_concurrent_updates_of_one_register() {
        let shared: SharedAxp192<CriticalSectionRawMutex, _> =
            SharedAxp192::new(Axp192::new(FakeBus::new()));
        std::thread::scope(|s| {
            s.spawn(|| {
                for i in 0..200 {
                    shared
                        .lock(|pmu| pmu.set_exten_enabled(i % 2 == 1))
                        .unwrap();
                }
            });
            s.spawn(|| {
                for i in 0..200 {
                    let volts = if i % 2 == 1 { 3.3 } else { 0.0 };
                    shared
                        .lock(|pmu| pmu.set_rail_voltage(Rail::Dcdc1, volts))
                        .unwrap();
                }
            });
            s.spawn(|| {
                for i in 0..200 {
                    shared
                        .lock(|pmu| pmu.set_gpio_pwm_output(1 + i % 2, i as u8))
                        .unwrap();
                }
            });
        });
        let mut pmu = shared.into_inner();
        assert_eq!(
            pmu.enabled_outputs().unwrap(),
            PowerOutputControl::EXTEN | PowerOutputControl::DCDC1
        );
        assert!(pmu.is_gpio_pwm_output(1).unwrap());
        assert!(pmu.is_gpio_pwm_output(2).unwrap());
        assert_eq!(pmu.gpio_pwm_duty(2).unwrap(), 199);
        assert_eq!(pmu.gpio_pwm_duty(1).unwrap(), 198);
    }

    #[test]
    fn test_lock_returns_closure_result() {
        let mut bus = FakeBus::new();
        bus.regs[0x00] = 0b0010_0000;
        let shared: SharedAxp192<CriticalSectionRawMutex, _> = SharedAxp192::new(Axp192::new(bus));
        assert_eq!(shared.lock(|pmu| pmu.is_vbus_present()), Ok(true));
        assert_eq!(shared.lock(|pmu| pmu.is_acin_present()), Ok(false));
    }
}
