use core::fmt::{self, Debug, Display, Formatter};

use bitflags::bitflags;
use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};

use crate::register::BitField;

/// Default (and only) I2C address of the AXP192
pub const AXP192_ADDRESS: u8 = 0x34;

pub(crate) const REG_INPUT_POWER_STATE: u8 = 0x00;
pub(crate) const REG_POWER_CHARGE_STATUS: u8 = 0x01;
pub(crate) const REG_OUTPUT_CONTROL: u8 = 0x12;
pub(crate) const REG_DCDC2_VOLTAGE: u8 = 0x25;
pub(crate) const REG_DCDC1_VOLTAGE: u8 = 0x26;
pub(crate) const REG_DCDC3_VOLTAGE: u8 = 0x27;
pub(crate) const REG_LDO23_VOLTAGE: u8 = 0x28;
pub(crate) const REG_POWER_OFF_VOLTAGE: u8 = 0x31;
pub(crate) const REG_POWER_OFF_CONTROL: u8 = 0x32;
pub(crate) const REG_CHARGE_CONTROL1: u8 = 0x33;
pub(crate) const REG_BACKUP_BATTERY: u8 = 0x35;
pub(crate) const REG_IRQ_STATUS3: u8 = 0x46;
pub(crate) const REG_ADC_ENABLE1: u8 = 0x82;
pub(crate) const REG_GPIO0_FUNCTION: u8 = 0x90;
pub(crate) const REG_GPIO0_LDO_VOLTAGE: u8 = 0x91;
pub(crate) const REG_GPIO1_FUNCTION: u8 = 0x92;
pub(crate) const REG_GPIO2_FUNCTION: u8 = 0x93;
pub(crate) const REG_GPIO34_FUNCTION: u8 = 0x95;
pub(crate) const REG_PWM1_PRESCALER: u8 = 0x99;
pub(crate) const REG_PWM2_PRESCALER: u8 = 0x9C;

pub(crate) const POWER_OFF_BIT: u8 = 1 << 7;
pub(crate) const CHARGING_ENABLE_BIT: u8 = 1 << 7;
pub(crate) const BACKUP_CHARGING_ENABLE_BIT: u8 = 1 << 7;

pub(crate) const ADC_ALL_ENABLED: u8 = 0xFF;
pub(crate) const ADC_ALL_DISABLED: u8 = 0x00;

pub(crate) const SWITCH_OFF_VOLTAGE_FIELD: BitField = BitField::new(0, 3);
pub(crate) const CHARGE_TARGET_FIELD: BitField = BitField::new(5, 2);
pub(crate) const GPIO0_LDO_FIELD: BitField = BitField::new(4, 4);

pub(crate) const SWITCH_OFF_VOL_BASE: u16 = 2600;
pub(crate) const SWITCH_OFF_VOL_STEP: u16 = 100;

pub(crate) const GPIO0_LDO_VOL_BASE: u16 = 1800;
pub(crate) const GPIO0_LDO_VOL_STEP: u16 = 100;

/// Prescaler written on every PWM setup, the frequency is not configurable here
pub(crate) const PWM_PRESCALER: u8 = 0xFF;

pub(crate) const FUNCTION_FLOATING: u8 = 0b111;
pub(crate) const FUNCTION_LOW_OUTPUT: u8 = 0b101;
pub(crate) const FUNCTION_LDO_OR_PWM: u8 = 0b010;

/// Charge current above which the battery counts as charging in the level estimate
const CHARGING_CURRENT_THRESHOLD_MA: f32 = 15.0;
/// Surface charge raises the measured voltage by about 0.1 V while charging
const CHARGING_LEVEL_PENALTY: f32 = 10.0;

/// Errors that can occur when interacting with the AXP192
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PmuError<E> {
    /// The bus transaction failed, the error comes straight from the bus
    I2c(E),
    /// GPIO number outside 0-4
    InvalidPin(u8),
    /// The GPIO exists but cannot be put in this mode
    UnsupportedMode { pin: u8, mode: GpioMode },
    /// NaN or infinite voltage request
    InvalidVoltage,
}

impl<E> PmuError<E> {
    /// True for errors raised before any bus access because of a bad argument
    pub fn is_invalid_argument(&self) -> bool {
        !matches!(self, PmuError::I2c(_))
    }
}

impl<E> From<E> for PmuError<E> {
    fn from(error: E) -> Self {
        PmuError::I2c(error)
    }
}

impl<E: Debug> Display for PmuError<E> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            PmuError::I2c(e) => write!(f, "I2C error: {:?}", e),
            PmuError::InvalidPin(pin) => write!(f, "GPIO{} does not exist", pin),
            PmuError::UnsupportedMode { pin, mode } => {
                write!(f, "GPIO{} does not support {} mode", pin, mode)
            }
            PmuError::InvalidVoltage => write!(f, "Invalid voltage"),
        }
    }
}

bitflags! {
    /// Register 0x12, DC-DC/LDO/EXTEN output enables
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PowerOutputControl: u8 {
        const EXTEN = 1 << 6;
        const DCDC2 = 1 << 4;
        const LDO3  = 1 << 3;
        const LDO2  = 1 << 2;
        const DCDC3 = 1 << 1;
        const DCDC1 = 1 << 0;
    }
}

bitflags! {
    /// Register 0x00
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InputPowerStatus: u8 {
        const ACIN_PRESENT = 1 << 7;
        const VBUS_PRESENT = 1 << 5;
    }
}

bitflags! {
    /// Register 0x01
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ChargeStatus: u8 {
        const CHARGING        = 1 << 6;
        const BATTERY_PRESENT = 1 << 5;
    }
}

bitflags! {
    /// Register 0x46, power key (PEK) interrupts. Write 1 to clear.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PowerKeyIrq: u8 {
        const SHORT_PRESS = 1 << 1;
        const LONG_PRESS  = 1 << 0;
    }
}

#[cfg(feature = "defmt")]
macro_rules! impl_flags_format {
    ($($flags:ty),*) => {
        $(
            impl defmt::Format for $flags {
                fn format(&self, f: defmt::Formatter) {
                    self.iter_names().for_each(|(name, _)| {
                        defmt::write!(f, "{} ", name);
                    });
                }
            }
        )*
    };
}

#[cfg(feature = "defmt")]
impl_flags_format!(PowerOutputControl, InputPowerStatus, ChargeStatus, PowerKeyIrq);

/// Voltage rails with a programmable setpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Rail {
    /// 0.7-3.875V in 25mV steps
    Dcdc1,
    /// 0.7-2.275V in 25mV steps
    Dcdc2,
    /// 0.7-3.875V in 25mV steps
    Dcdc3,
    /// 1.8-3.3V in 100mV steps
    Ldo2,
    /// 1.8-3.3V in 100mV steps
    Ldo3,
}

/// Where a rail lives in the register file and how its code scales
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RailLayout {
    pub enable: PowerOutputControl,
    pub register: u8,
    pub field: BitField,
    pub base_mv: u16,
    pub step_mv: u16,
    /// LDOs stay on at exactly their base voltage, DC-DCs turn off there
    pub enabled_at_base: bool,
}

impl Rail {
    pub const ALL: [Rail; 5] = [Rail::Dcdc1, Rail::Dcdc2, Rail::Dcdc3, Rail::Ldo2, Rail::Ldo3];

    pub const fn layout(self) -> RailLayout {
        match self {
            Rail::Dcdc1 => RailLayout {
                enable: PowerOutputControl::DCDC1,
                register: REG_DCDC1_VOLTAGE,
                field: BitField::new(0, 7),
                base_mv: 700,
                step_mv: 25,
                enabled_at_base: false,
            },
            Rail::Dcdc2 => RailLayout {
                enable: PowerOutputControl::DCDC2,
                register: REG_DCDC2_VOLTAGE,
                field: BitField::new(0, 6),
                base_mv: 700,
                step_mv: 25,
                enabled_at_base: false,
            },
            Rail::Dcdc3 => RailLayout {
                enable: PowerOutputControl::DCDC3,
                register: REG_DCDC3_VOLTAGE,
                field: BitField::new(0, 7),
                base_mv: 700,
                step_mv: 25,
                enabled_at_base: false,
            },
            Rail::Ldo2 => RailLayout {
                enable: PowerOutputControl::LDO2,
                register: REG_LDO23_VOLTAGE,
                field: BitField::new(4, 4),
                base_mv: 1800,
                step_mv: 100,
                enabled_at_base: true,
            },
            Rail::Ldo3 => RailLayout {
                enable: PowerOutputControl::LDO3,
                register: REG_LDO23_VOLTAGE,
                field: BitField::new(0, 4),
                base_mv: 1800,
                step_mv: 100,
                enabled_at_base: true,
            },
        }
    }

    /// Highest voltage the rail can be programmed to
    pub fn max_voltage(self) -> f32 {
        rail_voltage(self, self.layout().field.max())
    }
}

impl Display for Rail {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Rail::Dcdc1 => write!(f, "DCDC1"),
            Rail::Dcdc2 => write!(f, "DCDC2"),
            Rail::Dcdc3 => write!(f, "DCDC3"),
            Rail::Ldo2 => write!(f, "LDO2"),
            Rail::Ldo3 => write!(f, "LDO3"),
        }
    }
}

/// Rounds a voltage to whole millivolts.
/// `as` saturates, so negative input gives 0 and NaN gives 0.
pub fn volts_to_millivolts(volts: f32) -> u16 {
    libm::roundf(volts * 1000.0) as u16
}

/// Rejects NaN and infinite requests before any bus access
pub(crate) fn finite_volts<E>(volts: f32) -> Result<f32, PmuError<E>> {
    if volts.is_finite() {
        Ok(volts)
    } else {
        Err(PmuError::InvalidVoltage)
    }
}

/// Field code for a requested rail voltage, clamped to the field.
/// `None` means the rail has to be switched off instead.
///
/// On/off is decided on the exact distance from the base voltage, only the
/// code is computed from the distance rounded to whole millivolts.
pub fn rail_code(rail: Rail, volts: f32) -> Option<u8> {
    let layout = rail.layout();
    let delta = volts - layout.base_mv as f32 / 1000.0;
    let enabled = if layout.enabled_at_base {
        delta >= 0.0
    } else {
        delta > 0.0
    };
    if !enabled {
        return None;
    }
    let steps = volts_to_millivolts(delta) / layout.step_mv;
    Some(steps.min(layout.field.max() as u16) as u8)
}

/// Voltage of an enabled rail holding `code`
pub fn rail_voltage(rail: Rail, code: u8) -> f32 {
    let layout = rail.layout();
    let code = code & layout.field.max();
    (layout.base_mv + layout.step_mv * code as u16) as f32 / 1000.0
}

/// GPIO pins of the AXP192
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum GpioPin {
    Gpio0 = 0,
    Gpio1 = 1,
    Gpio2 = 2,
    Gpio3 = 3,
    Gpio4 = 4,
}

/// Functional modes driven through the GPIO function registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GpioMode {
    /// Floating with pull-down, used to sense an external supply
    Floating,
    /// Digital low output, also the "off" state of the LDO output
    LowOutput,
    /// Low-noise LDO output, GPIO0 only
    LdoOutput,
    /// PWM output at VINT level, GPIO1 and GPIO2 only
    PwmOutput,
}

impl GpioMode {
    pub(crate) const fn function_code(self) -> u8 {
        match self {
            GpioMode::Floating => FUNCTION_FLOATING,
            GpioMode::LowOutput => FUNCTION_LOW_OUTPUT,
            GpioMode::LdoOutput | GpioMode::PwmOutput => FUNCTION_LDO_OR_PWM,
        }
    }
}

impl Display for GpioMode {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            GpioMode::Floating => write!(f, "floating"),
            GpioMode::LowOutput => write!(f, "low output"),
            GpioMode::LdoOutput => write!(f, "LDO voltage output"),
            GpioMode::PwmOutput => write!(f, "PWM output"),
        }
    }
}

impl GpioPin {
    /// Function select register and the pin's field inside it
    pub const fn function_field(self) -> (u8, BitField) {
        match self {
            GpioPin::Gpio0 => (REG_GPIO0_FUNCTION, BitField::new(0, 3)),
            GpioPin::Gpio1 => (REG_GPIO1_FUNCTION, BitField::new(0, 3)),
            GpioPin::Gpio2 => (REG_GPIO2_FUNCTION, BitField::new(0, 3)),
            GpioPin::Gpio3 => (REG_GPIO34_FUNCTION, BitField::new(0, 2)),
            GpioPin::Gpio4 => (REG_GPIO34_FUNCTION, BitField::new(2, 2)),
        }
    }

    pub const fn supports(self, mode: GpioMode) -> bool {
        match (self, mode) {
            (GpioPin::Gpio0 | GpioPin::Gpio1 | GpioPin::Gpio2, GpioMode::Floating)
            | (GpioPin::Gpio0 | GpioPin::Gpio1 | GpioPin::Gpio2, GpioMode::LowOutput)
            | (GpioPin::Gpio0, GpioMode::LdoOutput)
            | (GpioPin::Gpio1 | GpioPin::Gpio2, GpioMode::PwmOutput) => true,
            _ => false,
        }
    }

    /// Prescaler register of the pin's PWM generator, the duty register follows it
    pub(crate) const fn pwm_prescaler_register(self) -> Option<u8> {
        match self {
            GpioPin::Gpio1 => Some(REG_PWM1_PRESCALER),
            GpioPin::Gpio2 => Some(REG_PWM2_PRESCALER),
            _ => None,
        }
    }
}

pub(crate) fn gpio_pin<E>(pin: u8) -> Result<GpioPin, PmuError<E>> {
    GpioPin::try_from(pin).map_err(|_| PmuError::InvalidPin(pin))
}

/// Validates `pin` for `mode` without touching the bus
pub(crate) fn gpio_for_mode<E>(pin: u8, mode: GpioMode) -> Result<GpioPin, PmuError<E>> {
    let gpio = gpio_pin(pin)?;
    if !gpio.supports(mode) {
        return Err(PmuError::UnsupportedMode { pin, mode });
    }
    Ok(gpio)
}

/// GPIO3 and GPIO4 function setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Gpio34Function {
    /// 00: External charging control
    ExternalChargeControl = 0b00,
    /// 01: NMOS open drain output
    NmosOpenDrain = 0b01,
    /// 10: Universal input
    UniversalInput = 0b10,
    /// 11: ADC input (GPIO3), undefined on GPIO4
    #[num_enum(default)]
    AdcInput = 0b11,
}

pub(crate) fn gpio34<E>(pin: u8) -> Result<GpioPin, PmuError<E>> {
    match gpio_pin(pin)? {
        gpio @ (GpioPin::Gpio3 | GpioPin::Gpio4) => Ok(gpio),
        _ => Err(PmuError::InvalidPin(pin)),
    }
}

/// Code for the GPIO0 LDO output, `None` when the request (1.8V or less)
/// means low output
pub fn gpio0_ldo_code(volts: f32) -> Option<u8> {
    let delta = volts - GPIO0_LDO_VOL_BASE as f32 / 1000.0;
    if delta.is_nan() || delta <= 0.0 {
        return None;
    }
    let steps = volts_to_millivolts(delta) / GPIO0_LDO_VOL_STEP;
    Some(steps.min(GPIO0_LDO_FIELD.max() as u16) as u8)
}

pub fn gpio0_ldo_voltage(code: u8) -> f32 {
    (GPIO0_LDO_VOL_BASE + GPIO0_LDO_VOL_STEP * (code & GPIO0_LDO_FIELD.max()) as u16) as f32
        / 1000.0
}

/// ADC channels. All of them read 0 unless the ADCs are enabled through
/// register 0x82 first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TelemetryChannel {
    /// V
    AcinVoltage,
    /// mA
    AcinCurrent,
    /// V
    VbusVoltage,
    /// mA
    VbusCurrent,
    /// V
    ApsVoltage,
    /// V
    BatteryVoltage,
    /// mA
    BatteryChargeCurrent,
    /// mA
    BatteryDischargeCurrent,
    /// mW
    BatteryPower,
    /// °C
    InternalTemperature,
}

impl TelemetryChannel {
    pub const fn register(self) -> u8 {
        match self {
            TelemetryChannel::AcinVoltage => 0x56,
            TelemetryChannel::AcinCurrent => 0x58,
            TelemetryChannel::VbusVoltage => 0x5A,
            TelemetryChannel::VbusCurrent => 0x5C,
            TelemetryChannel::ApsVoltage => 0x7E,
            TelemetryChannel::BatteryVoltage => 0x78,
            TelemetryChannel::BatteryChargeCurrent => 0x7A,
            TelemetryChannel::BatteryDischargeCurrent => 0x7C,
            TelemetryChannel::BatteryPower => 0x70,
            TelemetryChannel::InternalTemperature => 0x5E,
        }
    }

    /// Width of the raw ADC value in bits
    pub const fn width(self) -> u8 {
        match self {
            TelemetryChannel::BatteryPower => 24,
            _ => 12,
        }
    }

    /// Scales a raw ADC value to the channel's unit
    pub fn decode(self, raw: u32) -> f32 {
        let raw = raw as f32;
        match self {
            TelemetryChannel::AcinVoltage | TelemetryChannel::VbusVoltage => raw * 1.7 / 1000.0,
            TelemetryChannel::AcinCurrent => raw * 0.625,
            TelemetryChannel::VbusCurrent => raw * 0.375,
            TelemetryChannel::ApsVoltage => raw * 1.4 / 1000.0,
            TelemetryChannel::BatteryVoltage => raw * 0.0011,
            TelemetryChannel::BatteryChargeCurrent | TelemetryChannel::BatteryDischargeCurrent => {
                raw * 0.5
            }
            TelemetryChannel::BatteryPower => raw * 1.1 * 0.5 / 1000.0,
            TelemetryChannel::InternalTemperature => raw * 0.1 - 144.7,
        }
    }

    pub const fn unit(self) -> &'static str {
        match self {
            TelemetryChannel::AcinVoltage
            | TelemetryChannel::VbusVoltage
            | TelemetryChannel::ApsVoltage
            | TelemetryChannel::BatteryVoltage => "V",
            TelemetryChannel::AcinCurrent
            | TelemetryChannel::VbusCurrent
            | TelemetryChannel::BatteryChargeCurrent
            | TelemetryChannel::BatteryDischargeCurrent => "mA",
            TelemetryChannel::BatteryPower => "mW",
            TelemetryChannel::InternalTemperature => "°C",
        }
    }
}

/// Battery charge target voltage (register 0x33 bits 6-5)
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ChargeTargetVoltage {
    Volt4V10 = 0,
    Volt4V15 = 1,
    Volt4V20 = 2,
    #[num_enum(default)]
    Volt4V36 = 3,
}

impl ChargeTargetVoltage {
    pub const fn volts(self) -> f32 {
        match self {
            ChargeTargetVoltage::Volt4V10 => 4.1,
            ChargeTargetVoltage::Volt4V15 => 4.15,
            ChargeTargetVoltage::Volt4V20 => 4.2,
            ChargeTargetVoltage::Volt4V36 => 4.36,
        }
    }
}

impl Display for ChargeTargetVoltage {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}V", self.volts())
    }
}

/// Battery switch-off threshold for a 3-bit code
pub fn switch_off_voltage_from_code(code: u8) -> f32 {
    let code = SWITCH_OFF_VOLTAGE_FIELD.extract(code);
    (SWITCH_OFF_VOL_BASE + SWITCH_OFF_VOL_STEP * code as u16) as f32 / 1000.0
}

/// Code for a switch-off threshold, clamped to 2.6-3.3V
pub fn switch_off_voltage_code(millivolts: u16) -> u8 {
    let steps = millivolts.saturating_sub(SWITCH_OFF_VOL_BASE) / SWITCH_OFF_VOL_STEP;
    steps.min(SWITCH_OFF_VOLTAGE_FIELD.max() as u16) as u8
}

/// Approximate battery level in percent.
///
/// Linear between the switch-off threshold (`vmin`) and the charge target
/// (`vmax`), minus 10% while a charge current above 15mA flows. This is a
/// rough heuristic, not a fuel gauge.
pub fn estimate_battery_level(voltage: f32, charge_current_ma: f32, vmin: f32, vmax: f32) -> f32 {
    let span = vmax - vmin;
    if span.is_nan() || span <= 0.0 {
        return 0.0;
    }
    let mut level = (voltage - vmin) / span * 100.0;
    if charge_current_ma > CHARGING_CURRENT_THRESHOLD_MA {
        level -= CHARGING_LEVEL_PENALTY;
    }
    if !level.is_finite() {
        return 0.0;
    }
    level.clamp(0.0, 100.0)
}

/// Power key presses latched since the last read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerKeyEvents {
    pub short_press: bool,
    pub long_press: bool,
}

impl PowerKeyEvents {
    pub(crate) fn from_irq(irq: PowerKeyIrq) -> Self {
        Self {
            short_press: irq.contains(PowerKeyIrq::SHORT_PRESS),
            long_press: irq.contains(PowerKeyIrq::LONG_PRESS),
        }
    }

    pub fn any(&self) -> bool {
        self.short_press || self.long_press
    }
}

#[cfg(feature = "async")]
pub mod asynch;
pub mod blocking;
pub mod shared;

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32, eps: f32) -> bool {
        libm::fabsf(a - b) <= eps
    }

    #[test]
    fn test_rail_table() {
        assert_eq!(Rail::Dcdc1.layout().field.max(), 0x7F);
        assert_eq!(Rail::Dcdc2.layout().field.max(), 0x3F);
        assert_eq!(Rail::Dcdc3.layout().field.max(), 0x7F);
        assert_eq!(Rail::Ldo2.layout().field.mask(), 0xF0);
        assert_eq!(Rail::Ldo3.layout().field.mask(), 0x0F);
        assert!(approx(Rail::Dcdc2.max_voltage(), 2.275, 1e-4));
        assert!(approx(Rail::Ldo3.max_voltage(), 3.3, 1e-4));
    }

    #[test]
    fn test_volts_to_millivolts() {
        assert_eq!(volts_to_millivolts(3.3), 3300);
        assert_eq!(volts_to_millivolts(2.6000001), 2600);
        assert_eq!(volts_to_millivolts(0.0), 0);
        assert_eq!(volts_to_millivolts(-0.1), 0);
    }

    #[test]
    fn test_finite_volts() {
        assert_eq!(finite_volts::<()>(-0.5), Ok(-0.5));
        assert_eq!(finite_volts::<()>(f32::NAN), Err(PmuError::InvalidVoltage));
        assert_eq!(
            finite_volts::<()>(f32::NEG_INFINITY),
            Err(PmuError::InvalidVoltage)
        );
    }

    #[test]
    fn test_rail_code_disable_threshold() {
        // DC-DCs switch off at or below base, LDOs only below it
        assert_eq!(rail_code(Rail::Dcdc1, 0.7), None);
        assert_eq!(rail_code(Rail::Dcdc1, 0.0), None);
        assert_eq!(rail_code(Rail::Dcdc1, -0.5), None);
        assert_eq!(rail_code(Rail::Ldo2, 1.8), Some(0));
        assert_eq!(rail_code(Rail::Ldo2, 1.799), None);
        assert_eq!(rail_code(Rail::Ldo3, -3.0), None);
    }

    #[test]
    fn test_rail_code_threshold_uses_exact_delta() {
        // less than half a millivolt off the base still decides on/off
        assert_eq!(rail_code(Rail::Dcdc1, 0.7004), Some(0));
        assert_eq!(rail_code(Rail::Ldo2, 1.7996), None);
        assert_eq!(rail_code(Rail::Ldo3, 1.7996), None);
    }

    #[test]
    fn test_rail_code_truncates_and_clamps() {
        assert_eq!(rail_code(Rail::Dcdc3, 3.3), Some(104));
        assert_eq!(rail_code(Rail::Dcdc3, 3.324), Some(104));
        assert_eq!(rail_code(Rail::Dcdc2, 5.0), Some(0x3F));
        assert_eq!(rail_code(Rail::Ldo3, 5.0), Some(0x0F));
        assert_eq!(rail_code(Rail::Ldo3, 2.85), Some(10));
    }

    #[test]
    fn test_rail_round_trip_within_one_step() {
        for rail in Rail::ALL {
            let layout = rail.layout();
            let step = layout.step_mv as f32 / 1000.0;
            let mut mv = layout.base_mv + layout.step_mv;
            while mv <= layout.base_mv + layout.step_mv * layout.field.max() as u16 {
                let requested = mv as f32 / 1000.0;
                let code = rail_code(rail, requested).unwrap();
                let volts = rail_voltage(rail, code);
                assert!(volts <= requested + 1e-4, "{} {}mV", rail, mv);
                assert!(requested - volts < step, "{} {}mV", rail, mv);
                mv += 7;
            }
        }
    }

    #[test]
    fn test_gpio_mode_support() {
        assert!(GpioPin::Gpio0.supports(GpioMode::LdoOutput));
        assert!(!GpioPin::Gpio0.supports(GpioMode::PwmOutput));
        assert!(GpioPin::Gpio2.supports(GpioMode::PwmOutput));
        assert!(!GpioPin::Gpio1.supports(GpioMode::LdoOutput));
        assert!(!GpioPin::Gpio3.supports(GpioMode::Floating));
        assert!(!GpioPin::Gpio4.supports(GpioMode::LowOutput));
    }

    #[test]
    fn test_gpio_validation() {
        assert_eq!(gpio_pin::<()>(5), Err(PmuError::InvalidPin(5)));
        assert_eq!(
            gpio_for_mode::<()>(0, GpioMode::PwmOutput),
            Err(PmuError::UnsupportedMode {
                pin: 0,
                mode: GpioMode::PwmOutput
            })
        );
        assert_eq!(gpio_for_mode::<()>(2, GpioMode::Floating), Ok(GpioPin::Gpio2));
        assert_eq!(gpio34::<()>(1), Err(PmuError::InvalidPin(1)));
        assert_eq!(gpio34::<()>(4), Ok(GpioPin::Gpio4));
    }

    #[test]
    fn test_gpio0_ldo_code() {
        assert_eq!(gpio0_ldo_code(1.8), None);
        assert_eq!(gpio0_ldo_code(-1.0), None);
        assert_eq!(gpio0_ldo_code(1.8004), Some(0));
        assert_eq!(gpio0_ldo_code(3.3), Some(15));
        assert_eq!(gpio0_ldo_code(3.5), Some(15));
        assert_eq!(gpio0_ldo_code(2.5), Some(7));
        assert!(approx(gpio0_ldo_voltage(7), 2.5, 1e-4));
    }

    #[test]
    fn test_telemetry_decode() {
        assert!(approx(TelemetryChannel::AcinVoltage.decode(3000), 5.1, 1e-3));
        assert!(approx(TelemetryChannel::AcinCurrent.decode(160), 100.0, 1e-3));
        assert!(approx(TelemetryChannel::VbusCurrent.decode(200), 75.0, 1e-3));
        assert!(approx(TelemetryChannel::ApsVoltage.decode(3000), 4.2, 1e-3));
        assert!(approx(TelemetryChannel::BatteryVoltage.decode(3500), 3.85, 1e-3));
        assert!(approx(TelemetryChannel::BatteryDischargeCurrent.decode(300), 150.0, 1e-3));
        assert!(approx(TelemetryChannel::BatteryPower.decode(100_000), 55.0, 1e-2));
        assert!(approx(TelemetryChannel::InternalTemperature.decode(1847), 40.0, 1e-2));
        assert_eq!(TelemetryChannel::BatteryPower.width(), 24);
        assert_eq!(TelemetryChannel::InternalTemperature.unit(), "°C");
    }

    #[test]
    fn test_charge_target_table() {
        assert_eq!(ChargeTargetVoltage::from(0u8).volts(), 4.1);
        assert_eq!(ChargeTargetVoltage::from(1u8).volts(), 4.15);
        assert_eq!(ChargeTargetVoltage::from(2u8).volts(), 4.2);
        assert_eq!(ChargeTargetVoltage::from(3u8).volts(), 4.36);
        // anything past the table reads as the highest target
        assert_eq!(ChargeTargetVoltage::from(9u8), ChargeTargetVoltage::Volt4V36);
        assert_eq!(u8::from(ChargeTargetVoltage::Volt4V20), 2);
    }

    #[test]
    fn test_gpio34_function_decode() {
        assert_eq!(Gpio34Function::from(0u8), Gpio34Function::ExternalChargeControl);
        assert_eq!(Gpio34Function::from(1u8), Gpio34Function::NmosOpenDrain);
        assert_eq!(Gpio34Function::from(2u8), Gpio34Function::UniversalInput);
        assert_eq!(Gpio34Function::from(3u8), Gpio34Function::AdcInput);
        assert_eq!(u8::from(Gpio34Function::UniversalInput), 0b10);
    }

    #[test]
    fn test_switch_off_voltage() {
        assert!(approx(switch_off_voltage_from_code(0), 2.6, 1e-4));
        assert!(approx(switch_off_voltage_from_code(7), 3.3, 1e-4));
        // bits above the 3-bit field are ignored
        assert!(approx(switch_off_voltage_from_code(0b1111_1011), 2.9, 1e-4));
        assert_eq!(switch_off_voltage_code(3000), 4);
        assert_eq!(switch_off_voltage_code(2000), 0);
        assert_eq!(switch_off_voltage_code(4000), 7);
    }

    #[test]
    fn test_battery_level() {
        assert!(approx(estimate_battery_level(3.65, 0.0, 3.0, 4.2), 54.1667, 1e-2));
        // charging penalty
        assert!(approx(estimate_battery_level(3.65, 100.0, 3.0, 4.2), 44.1667, 1e-2));
        // exactly 15mA is not charging
        assert!(approx(estimate_battery_level(3.6, 15.0, 3.0, 4.2), 50.0, 1e-2));
    }

    #[test]
    fn test_battery_level_bounds() {
        let voltages = [0.0, 2.5, 2.6, 3.0, 3.7, 4.1, 4.36, 4.5, 6.0];
        let currents = [0.0, 10.0, 15.0, 15.5, 500.0];
        for v in voltages {
            for i in currents {
                for code in 0..8u8 {
                    for target in 0..4u8 {
                        let level = estimate_battery_level(
                            v,
                            i,
                            switch_off_voltage_from_code(code),
                            ChargeTargetVoltage::from(target).volts(),
                        );
                        assert!((0.0..=100.0).contains(&level));
                    }
                }
            }
        }
        assert_eq!(estimate_battery_level(f32::NAN, 0.0, 3.0, 4.2), 0.0);
        assert_eq!(estimate_battery_level(3.5, 0.0, 4.2, 4.2), 0.0);
    }

    #[test]
    fn test_power_key_events_from_irq() {
        let events = PowerKeyEvents::from_irq(PowerKeyIrq::from_bits_truncate(0b11));
        assert!(events.short_press && events.long_press);
        assert!(!PowerKeyEvents::from_irq(PowerKeyIrq::empty()).any());
    }
}
