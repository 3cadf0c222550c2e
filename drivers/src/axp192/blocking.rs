use super::*;
use crate::BlockingRegisterDevice;
use embedded_hal::i2c::I2c;
use log::debug;

/// AXP192 power management IC driver.
///
/// Exposes the chip's capabilities (rails, GPIO functions, ADC telemetry,
/// charging and power control). Mapping those to board functions such as a
/// backlight or a vibration motor is left to the board code.
///
/// # Features
/// - DCDC1-3 and LDO2-3 setpoints, 0V meaning off
/// - GPIO0-4 function multiplexing, GPIO0 LDO output, GPIO1-2 PWM
/// - ACIN/VBUS/APS/battery voltage, current, power and die temperature
/// - Approximate battery level
/// - Power key latch, power off, charging and EXTEN control
#[derive(Debug)]
pub struct Axp192<I2C> {
    dev: BlockingRegisterDevice<I2C>,
}

impl<I2C> Axp192<I2C>
where
    I2C: I2c,
{
    /// Creates a driver for the chip at its default address (0x34)
    pub fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, AXP192_ADDRESS)
    }

    /// Creates a driver for a chip at a non-default address
    pub fn with_address(i2c: I2C, adr: u8) -> Self {
        Self {
            dev: BlockingRegisterDevice::new(i2c, adr),
        }
    }

    /// Gives the bus back
    pub fn release(self) -> I2C {
        self.dev.release()
    }

    // Register 0x00, 0x01
    // Input power state, power mode and charge status

    pub fn input_power_status(&mut self) -> Result<InputPowerStatus, PmuError<I2C::Error>> {
        let val = self.dev.read_register(REG_INPUT_POWER_STATE)?;
        Ok(InputPowerStatus::from_bits_truncate(val))
    }

    /// True when voltage is present on ACIN
    pub fn is_acin_present(&mut self) -> Result<bool, PmuError<I2C::Error>> {
        Ok(self
            .input_power_status()?
            .contains(InputPowerStatus::ACIN_PRESENT))
    }

    /// True when voltage is present on VBUS
    pub fn is_vbus_present(&mut self) -> Result<bool, PmuError<I2C::Error>> {
        Ok(self
            .input_power_status()?
            .contains(InputPowerStatus::VBUS_PRESENT))
    }

    pub fn charge_status(&mut self) -> Result<ChargeStatus, PmuError<I2C::Error>> {
        let val = self.dev.read_register(REG_POWER_CHARGE_STATUS)?;
        Ok(ChargeStatus::from_bits_truncate(val))
    }

    pub fn is_battery_connected(&mut self) -> Result<bool, PmuError<I2C::Error>> {
        Ok(self.charge_status()?.contains(ChargeStatus::BATTERY_PRESENT))
    }

    pub fn is_battery_charging(&mut self) -> Result<bool, PmuError<I2C::Error>> {
        Ok(self.charge_status()?.contains(ChargeStatus::CHARGING))
    }

    // Register 0x12
    // DC-DC1/2/3, LDO2/3 and EXTEN output enables

    pub fn enabled_outputs(&mut self) -> Result<PowerOutputControl, PmuError<I2C::Error>> {
        let val = self.dev.read_register(REG_OUTPUT_CONTROL)?;
        Ok(PowerOutputControl::from_bits_truncate(val))
    }

    /// True when the rail's enable bit is set
    pub fn is_rail_enabled(&mut self, rail: Rail) -> Result<bool, PmuError<I2C::Error>> {
        Ok(self.enabled_outputs()?.contains(rail.layout().enable))
    }

    /// True when the EXTEN output (external 5V boost) is on
    pub fn is_exten_enabled(&mut self) -> Result<bool, PmuError<I2C::Error>> {
        Ok(self.enabled_outputs()?.contains(PowerOutputControl::EXTEN))
    }

    /// Switches the EXTEN output without touching any rail enable
    pub fn set_exten_enabled(&mut self, enabled: bool) -> Result<(), PmuError<I2C::Error>> {
        debug!("EXTEN enabled: {}", enabled);
        self.dev.write_register_bits(
            REG_OUTPUT_CONTROL,
            PowerOutputControl::EXTEN.bits(),
            enabled,
        )?;
        Ok(())
    }

    // Register 0x25-0x28
    // DC-DC2, DC-DC1, DC-DC3 and LDO2/LDO3 output voltage

    /// Sets a rail's output voltage in volts
    ///
    /// A request at or below the rail's base voltage (0.7V for the DC-DCs,
    /// below 1.8V for the LDOs), negative values included, switches the rail
    /// off and leaves its stored code alone. Anything above is truncated to
    /// the step size and clamped to the rail's maximum, then the rail is
    /// switched on. Only NaN and infinity are rejected.
    ///
    /// # Arguments
    /// * `rail` - Rail to program
    /// * `volts` - Setpoint in V, 0 to switch off
    pub fn set_rail_voltage(&mut self, rail: Rail, volts: f32) -> Result<(), PmuError<I2C::Error>> {
        let volts = finite_volts(volts)?;
        let layout = rail.layout();
        match rail_code(rail, volts) {
            None => {
                debug!("{} off", rail);
                self.dev
                    .clear_register_bits(REG_OUTPUT_CONTROL, layout.enable.bits())?;
            }
            Some(code) => {
                debug!("{} set to {}V (code {:#04x})", rail, volts, code);
                self.dev
                    .update_register_field(layout.register, layout.field, code)?;
                self.dev
                    .set_register_bits(REG_OUTPUT_CONTROL, layout.enable.bits())?;
            }
        }
        Ok(())
    }

    /// Gets a rail's output voltage in volts, 0 when the rail is off
    pub fn rail_voltage(&mut self, rail: Rail) -> Result<f32, PmuError<I2C::Error>> {
        if !self.is_rail_enabled(rail)? {
            return Ok(0.0);
        }
        let layout = rail.layout();
        let code = self.dev.read_register_field(layout.register, layout.field)?;
        Ok(rail_voltage(rail, code))
    }

    // Register 0x31
    // Battery switch-off voltage

    /// Battery voltage at which the chip powers down, in V
    pub fn battery_switch_off_voltage(&mut self) -> Result<f32, PmuError<I2C::Error>> {
        let val = self.dev.read_register(REG_POWER_OFF_VOLTAGE)?;
        Ok(switch_off_voltage_from_code(val))
    }

    /// Sets the battery switch-off voltage, clamped to 2.6-3.3V in 0.1V steps
    pub fn set_battery_switch_off_voltage(
        &mut self,
        volts: f32,
    ) -> Result<(), PmuError<I2C::Error>> {
        let volts = finite_volts(volts)?;
        self.dev.update_register_field(
            REG_POWER_OFF_VOLTAGE,
            SWITCH_OFF_VOLTAGE_FIELD,
            switch_off_voltage_code(volts_to_millivolts(volts)),
        )?;
        Ok(())
    }

    // Register 0x32
    // Power off, battery detection, CHGLED

    /// Switches the chip off, and with it every rail it supplies.
    /// There is no way back from software.
    pub fn power_off(&mut self) -> Result<(), PmuError<I2C::Error>> {
        debug!("Power off");
        self.dev
            .set_register_bits(REG_POWER_OFF_CONTROL, POWER_OFF_BIT)?;
        Ok(())
    }

    // Register 0x33
    // Charging enable, charge target voltage

    pub fn is_charging_enabled(&mut self) -> Result<bool, PmuError<I2C::Error>> {
        let result = self
            .dev
            .get_register_bits(REG_CHARGE_CONTROL1, CHARGING_ENABLE_BIT)?;
        Ok(result)
    }

    pub fn set_charging_enabled(&mut self, enabled: bool) -> Result<(), PmuError<I2C::Error>> {
        debug!("Charging enabled: {}", enabled);
        self.dev
            .write_register_bits(REG_CHARGE_CONTROL1, CHARGING_ENABLE_BIT, enabled)?;
        Ok(())
    }

    /// Voltage at which the battery counts as fully charged
    pub fn charge_target_voltage(&mut self) -> Result<ChargeTargetVoltage, PmuError<I2C::Error>> {
        let code = self
            .dev
            .read_register_field(REG_CHARGE_CONTROL1, CHARGE_TARGET_FIELD)?;
        Ok(ChargeTargetVoltage::from(code))
    }

    pub fn set_charge_target_voltage(
        &mut self,
        target: ChargeTargetVoltage,
    ) -> Result<(), PmuError<I2C::Error>> {
        debug!("Charge target voltage: {}", target);
        self.dev
            .update_register_field(REG_CHARGE_CONTROL1, CHARGE_TARGET_FIELD, target.into())?;
        Ok(())
    }

    // Register 0x35
    // Backup battery charging

    pub fn is_backup_battery_charging_enabled(&mut self) -> Result<bool, PmuError<I2C::Error>> {
        let result = self
            .dev
            .get_register_bits(REG_BACKUP_BATTERY, BACKUP_CHARGING_ENABLE_BIT)?;
        Ok(result)
    }

    pub fn set_backup_battery_charging_enabled(
        &mut self,
        enabled: bool,
    ) -> Result<(), PmuError<I2C::Error>> {
        self.dev
            .write_register_bits(REG_BACKUP_BATTERY, BACKUP_CHARGING_ENABLE_BIT, enabled)?;
        Ok(())
    }

    // Register 0x46
    // IRQ status 3, power key presses

    /// Reads and clears the power key latch
    ///
    /// Returns the presses latched since the previous call. When any was
    /// latched both bits are written back as 1 to clear them, so a second
    /// call without a new press reports nothing.
    pub fn power_key_events(&mut self) -> Result<PowerKeyEvents, PmuError<I2C::Error>> {
        let val = self.dev.read_register(REG_IRQ_STATUS3)?;
        let events = PowerKeyEvents::from_irq(PowerKeyIrq::from_bits_truncate(val));
        if events.any() {
            debug!("Power key {:?}, clearing latch", events);
            self.dev
                .write_register(REG_IRQ_STATUS3, PowerKeyIrq::all().bits())?;
        }
        Ok(events)
    }

    // Register 0x56-0x7E
    // ADC data

    /// Reads and scales one ADC channel
    ///
    /// The ADCs have to be enabled with [`Self::set_all_adc_enabled`] first,
    /// otherwise the channels read 0.
    pub fn read_telemetry(
        &mut self,
        channel: TelemetryChannel,
    ) -> Result<f32, PmuError<I2C::Error>> {
        let raw = match channel.width() {
            24 => self.dev.read_register24(channel.register())?,
            _ => self.dev.read_register12(channel.register())? as u32,
        };
        Ok(channel.decode(raw))
    }

    /// ACIN voltage in V
    pub fn acin_voltage(&mut self) -> Result<f32, PmuError<I2C::Error>> {
        self.read_telemetry(TelemetryChannel::AcinVoltage)
    }

    /// ACIN current in mA
    pub fn acin_current(&mut self) -> Result<f32, PmuError<I2C::Error>> {
        self.read_telemetry(TelemetryChannel::AcinCurrent)
    }

    /// VBUS voltage in V
    pub fn vbus_voltage(&mut self) -> Result<f32, PmuError<I2C::Error>> {
        self.read_telemetry(TelemetryChannel::VbusVoltage)
    }

    /// VBUS current in mA
    pub fn vbus_current(&mut self) -> Result<f32, PmuError<I2C::Error>> {
        self.read_telemetry(TelemetryChannel::VbusCurrent)
    }

    /// APS (internal supply) voltage in V
    pub fn aps_voltage(&mut self) -> Result<f32, PmuError<I2C::Error>> {
        self.read_telemetry(TelemetryChannel::ApsVoltage)
    }

    /// Battery voltage in V, 0 without a battery
    pub fn battery_voltage(&mut self) -> Result<f32, PmuError<I2C::Error>> {
        self.read_telemetry(TelemetryChannel::BatteryVoltage)
    }

    /// Battery charge current in mA
    pub fn battery_charge_current(&mut self) -> Result<f32, PmuError<I2C::Error>> {
        self.read_telemetry(TelemetryChannel::BatteryChargeCurrent)
    }

    /// Battery discharge current in mA
    pub fn battery_discharge_current(&mut self) -> Result<f32, PmuError<I2C::Error>> {
        self.read_telemetry(TelemetryChannel::BatteryDischargeCurrent)
    }

    /// Instantaneous battery power in mW
    pub fn battery_power(&mut self) -> Result<f32, PmuError<I2C::Error>> {
        self.read_telemetry(TelemetryChannel::BatteryPower)
    }

    /// Die temperature in °C
    pub fn internal_temperature(&mut self) -> Result<f32, PmuError<I2C::Error>> {
        self.read_telemetry(TelemetryChannel::InternalTemperature)
    }

    /// Approximate battery level in percent (0-100)
    ///
    /// See [`estimate_battery_level`]; needs the ADCs enabled.
    pub fn battery_level(&mut self) -> Result<f32, PmuError<I2C::Error>> {
        let voltage = self.battery_voltage()?;
        let charge_current = self.battery_charge_current()?;
        let vmin = self.battery_switch_off_voltage()?;
        let vmax = self.charge_target_voltage()?.volts();
        Ok(estimate_battery_level(voltage, charge_current, vmin, vmax))
    }

    // Register 0x82
    // ADC enable 1

    /// True when every ADC of register 0x82 is on
    pub fn is_all_adc_enabled(&mut self) -> Result<bool, PmuError<I2C::Error>> {
        Ok(self.dev.read_register(REG_ADC_ENABLE1)? == ADC_ALL_ENABLED)
    }

    pub fn set_all_adc_enabled(&mut self, enabled: bool) -> Result<(), PmuError<I2C::Error>> {
        let val = if enabled {
            ADC_ALL_ENABLED
        } else {
            ADC_ALL_DISABLED
        };
        self.dev.write_register(REG_ADC_ENABLE1, val)?;
        Ok(())
    }

    // Register 0x90-0x9D
    // GPIO function select, GPIO0 LDO voltage, PWM1/PWM2

    /// Raw function code of any GPIO
    pub fn gpio_function_code(&mut self, pin: u8) -> Result<u8, PmuError<I2C::Error>> {
        let (register, field) = gpio_pin(pin)?.function_field();
        Ok(self.dev.read_register_field(register, field)?)
    }

    fn set_gpio_function(
        &mut self,
        gpio: GpioPin,
        function: u8,
    ) -> Result<(), PmuError<I2C::Error>> {
        let (register, field) = gpio.function_field();
        self.dev.update_register_field(register, field, function)?;
        Ok(())
    }

    fn set_gpio_mode(&mut self, gpio: GpioPin, mode: GpioMode) -> Result<(), PmuError<I2C::Error>> {
        debug!("GPIO{} set to {}", u8::from(gpio), mode);
        self.set_gpio_function(gpio, mode.function_code())
    }

    fn gpio_mode_function(
        &mut self,
        pin: u8,
        mode: GpioMode,
    ) -> Result<(GpioPin, u8), PmuError<I2C::Error>> {
        let gpio = gpio_for_mode(pin, mode)?;
        let (register, field) = gpio.function_field();
        let function = self.dev.read_register_field(register, field)?;
        Ok((gpio, function))
    }

    /// Puts GPIO0-2 in floating mode
    pub fn set_gpio_floating(&mut self, pin: u8) -> Result<(), PmuError<I2C::Error>> {
        let gpio = gpio_for_mode(pin, GpioMode::Floating)?;
        self.set_gpio_mode(gpio, GpioMode::Floating)
    }

    pub fn is_gpio_floating(&mut self, pin: u8) -> Result<bool, PmuError<I2C::Error>> {
        let (_, function) = self.gpio_mode_function(pin, GpioMode::Floating)?;
        // 0b11x is floating
        Ok(function & 0b110 == 0b110)
    }

    /// Drives GPIO0-2 low
    pub fn set_gpio_output_low(&mut self, pin: u8) -> Result<(), PmuError<I2C::Error>> {
        let gpio = gpio_for_mode(pin, GpioMode::LowOutput)?;
        self.set_gpio_mode(gpio, GpioMode::LowOutput)
    }

    pub fn is_gpio_output_low(&mut self, pin: u8) -> Result<bool, PmuError<I2C::Error>> {
        let (_, function) = self.gpio_mode_function(pin, GpioMode::LowOutput)?;
        Ok(function == FUNCTION_LOW_OUTPUT)
    }

    /// Turns GPIO0 into an LDO output
    ///
    /// The output covers 1.8-3.3V in 0.1V steps, requests are truncated to
    /// the step and clamped to 3.3V. Requests of 1.8V or less put the pin in
    /// low output mode instead.
    ///
    /// # Arguments
    /// * `pin` - Must be 0
    /// * `volts` - Output voltage in V
    pub fn set_gpio_ldo_output(&mut self, pin: u8, volts: f32) -> Result<(), PmuError<I2C::Error>> {
        let gpio = gpio_for_mode(pin, GpioMode::LdoOutput)?;
        let volts = finite_volts(volts)?;
        match gpio0_ldo_code(volts) {
            None => self.set_gpio_mode(gpio, GpioMode::LowOutput),
            Some(code) => {
                self.dev
                    .update_register_field(REG_GPIO0_LDO_VOLTAGE, GPIO0_LDO_FIELD, code)?;
                self.set_gpio_mode(gpio, GpioMode::LdoOutput)
            }
        }
    }

    pub fn is_gpio_ldo_output(&mut self, pin: u8) -> Result<bool, PmuError<I2C::Error>> {
        let (_, function) = self.gpio_mode_function(pin, GpioMode::LdoOutput)?;
        Ok(function == FUNCTION_LDO_OR_PWM)
    }

    /// GPIO0 LDO output voltage in V, 0 when the pin is in another mode
    pub fn gpio_ldo_voltage(&mut self, pin: u8) -> Result<f32, PmuError<I2C::Error>> {
        if !self.is_gpio_ldo_output(pin)? {
            return Ok(0.0);
        }
        let code = self
            .dev
            .read_register_field(REG_GPIO0_LDO_VOLTAGE, GPIO0_LDO_FIELD)?;
        Ok(gpio0_ldo_voltage(code))
    }

    /// Turns GPIO1 or GPIO2 into a PWM output
    ///
    /// The high level is VINT (2.5V). The prescaler is fixed to 0xFF.
    ///
    /// # Arguments
    /// * `pin` - 1 or 2
    /// * `duty` - 0-255, 255 fully on
    pub fn set_gpio_pwm_output(&mut self, pin: u8, duty: u8) -> Result<(), PmuError<I2C::Error>> {
        let gpio = gpio_for_mode(pin, GpioMode::PwmOutput)?;
        let Some(prescaler) = gpio.pwm_prescaler_register() else {
            return Err(PmuError::UnsupportedMode {
                pin,
                mode: GpioMode::PwmOutput,
            });
        };
        self.dev.write_register(prescaler, PWM_PRESCALER)?;
        self.dev.write_register(prescaler + 1, duty)?;
        self.set_gpio_mode(gpio, GpioMode::PwmOutput)
    }

    pub fn is_gpio_pwm_output(&mut self, pin: u8) -> Result<bool, PmuError<I2C::Error>> {
        let (_, function) = self.gpio_mode_function(pin, GpioMode::PwmOutput)?;
        Ok(function == FUNCTION_LDO_OR_PWM)
    }

    /// PWM duty of GPIO1 or GPIO2, 0 when the pin is in another mode
    pub fn gpio_pwm_duty(&mut self, pin: u8) -> Result<u8, PmuError<I2C::Error>> {
        let (gpio, function) = self.gpio_mode_function(pin, GpioMode::PwmOutput)?;
        match gpio.pwm_prescaler_register() {
            Some(prescaler) if function == FUNCTION_LDO_OR_PWM => {
                Ok(self.dev.read_register(prescaler + 1)?)
            }
            _ => Ok(0),
        }
    }

    /// Selects the function of GPIO3 or GPIO4
    pub fn set_gpio34_function(
        &mut self,
        pin: u8,
        function: Gpio34Function,
    ) -> Result<(), PmuError<I2C::Error>> {
        let gpio = gpio34(pin)?;
        debug!("GPIO{} function {:?}", pin, function);
        self.set_gpio_function(gpio, function.into())
    }

    pub fn gpio34_function(&mut self, pin: u8) -> Result<Gpio34Function, PmuError<I2C::Error>> {
        let (register, field) = gpio34(pin)?.function_field();
        let code = self.dev.read_register_field(register, field)?;
        Ok(Gpio34Function::from(code))
    }
}
