use super::*;
use crate::AsyncRegisterDevice;
use embedded_hal_async::i2c::I2c;
use log::debug;

/// Async version of [`super::blocking::Axp192`], same operations and semantics
#[derive(Debug)]
pub struct Axp192Async<I2C> {
    dev: AsyncRegisterDevice<I2C>,
}

impl<I2C> Axp192Async<I2C>
where
    I2C: I2c,
{
    pub fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, AXP192_ADDRESS)
    }

    pub fn with_address(i2c: I2C, adr: u8) -> Self {
        Self {
            dev: AsyncRegisterDevice::new(i2c, adr),
        }
    }

    pub fn release(self) -> I2C {
        self.dev.release()
    }

    pub async fn input_power_status(&mut self) -> Result<InputPowerStatus, PmuError<I2C::Error>> {
        let val = self.dev.read_register(REG_INPUT_POWER_STATE).await?;
        Ok(InputPowerStatus::from_bits_truncate(val))
    }

    pub async fn is_acin_present(&mut self) -> Result<bool, PmuError<I2C::Error>> {
        Ok(self
            .input_power_status()
            .await?
            .contains(InputPowerStatus::ACIN_PRESENT))
    }

    pub async fn is_vbus_present(&mut self) -> Result<bool, PmuError<I2C::Error>> {
        Ok(self
            .input_power_status()
            .await?
            .contains(InputPowerStatus::VBUS_PRESENT))
    }

    pub async fn charge_status(&mut self) -> Result<ChargeStatus, PmuError<I2C::Error>> {
        let val = self.dev.read_register(REG_POWER_CHARGE_STATUS).await?;
        Ok(ChargeStatus::from_bits_truncate(val))
    }

    pub async fn is_battery_connected(&mut self) -> Result<bool, PmuError<I2C::Error>> {
        Ok(self
            .charge_status()
            .await?
            .contains(ChargeStatus::BATTERY_PRESENT))
    }

    pub async fn is_battery_charging(&mut self) -> Result<bool, PmuError<I2C::Error>> {
        Ok(self.charge_status().await?.contains(ChargeStatus::CHARGING))
    }

    pub async fn enabled_outputs(&mut self) -> Result<PowerOutputControl, PmuError<I2C::Error>> {
        let val = self.dev.read_register(REG_OUTPUT_CONTROL).await?;
        Ok(PowerOutputControl::from_bits_truncate(val))
    }

    pub async fn is_rail_enabled(&mut self, rail: Rail) -> Result<bool, PmuError<I2C::Error>> {
        Ok(self.enabled_outputs().await?.contains(rail.layout().enable))
    }

    pub async fn is_exten_enabled(&mut self) -> Result<bool, PmuError<I2C::Error>> {
        Ok(self
            .enabled_outputs()
            .await?
            .contains(PowerOutputControl::EXTEN))
    }

    pub async fn set_exten_enabled(&mut self, enabled: bool) -> Result<(), PmuError<I2C::Error>> {
        debug!("EXTEN enabled: {}", enabled);
        self.dev
            .write_register_bits(REG_OUTPUT_CONTROL, PowerOutputControl::EXTEN.bits(), enabled)
            .await?;
        Ok(())
    }

    /// Sets a rail's output voltage in volts, 0 (or the DC-DC base) switches it off
    pub async fn set_rail_voltage(
        &mut self,
        rail: Rail,
        volts: f32,
    ) -> Result<(), PmuError<I2C::Error>> {
        let volts = finite_volts(volts)?;
        let layout = rail.layout();
        match rail_code(rail, volts) {
            None => {
                debug!("{} off", rail);
                self.dev
                    .clear_register_bits(REG_OUTPUT_CONTROL, layout.enable.bits())
                    .await?;
            }
            Some(code) => {
                debug!("{} set to {}V (code {:#04x})", rail, volts, code);
                self.dev
                    .update_register_field(layout.register, layout.field, code)
                    .await?;
                self.dev
                    .set_register_bits(REG_OUTPUT_CONTROL, layout.enable.bits())
                    .await?;
            }
        }
        Ok(())
    }

    pub async fn rail_voltage(&mut self, rail: Rail) -> Result<f32, PmuError<I2C::Error>> {
        if !self.is_rail_enabled(rail).await? {
            return Ok(0.0);
        }
        let layout = rail.layout();
        let code = self
            .dev
            .read_register_field(layout.register, layout.field)
            .await?;
        Ok(rail_voltage(rail, code))
    }

    pub async fn battery_switch_off_voltage(&mut self) -> Result<f32, PmuError<I2C::Error>> {
        let val = self.dev.read_register(REG_POWER_OFF_VOLTAGE).await?;
        Ok(switch_off_voltage_from_code(val))
    }

    pub async fn set_battery_switch_off_voltage(
        &mut self,
        volts: f32,
    ) -> Result<(), PmuError<I2C::Error>> {
        let volts = finite_volts(volts)?;
        self.dev
            .update_register_field(
                REG_POWER_OFF_VOLTAGE,
                SWITCH_OFF_VOLTAGE_FIELD,
                switch_off_voltage_code(volts_to_millivolts(volts)),
            )
            .await?;
        Ok(())
    }

    pub async fn power_off(&mut self) -> Result<(), PmuError<I2C::Error>> {
        debug!("Power off");
        self.dev
            .set_register_bits(REG_POWER_OFF_CONTROL, POWER_OFF_BIT)
            .await?;
        Ok(())
    }

    pub async fn is_charging_enabled(&mut self) -> Result<bool, PmuError<I2C::Error>> {
        let result = self
            .dev
            .get_register_bits(REG_CHARGE_CONTROL1, CHARGING_ENABLE_BIT)
            .await?;
        Ok(result)
    }

    pub async fn set_charging_enabled(&mut self, enabled: bool) -> Result<(), PmuError<I2C::Error>> {
        debug!("Charging enabled: {}", enabled);
        self.dev
            .write_register_bits(REG_CHARGE_CONTROL1, CHARGING_ENABLE_BIT, enabled)
            .await?;
        Ok(())
    }

    pub async fn charge_target_voltage(
        &mut self,
    ) -> Result<ChargeTargetVoltage, PmuError<I2C::Error>> {
        let code = self
            .dev
            .read_register_field(REG_CHARGE_CONTROL1, CHARGE_TARGET_FIELD)
            .await?;
        Ok(ChargeTargetVoltage::from(code))
    }

    pub async fn set_charge_target_voltage(
        &mut self,
        target: ChargeTargetVoltage,
    ) -> Result<(), PmuError<I2C::Error>> {
        debug!("Charge target voltage: {}", target);
        self.dev
            .update_register_field(REG_CHARGE_CONTROL1, CHARGE_TARGET_FIELD, target.into())
            .await?;
        Ok(())
    }

    pub async fn is_backup_battery_charging_enabled(
        &mut self,
    ) -> Result<bool, PmuError<I2C::Error>> {
        let result = self
            .dev
            .get_register_bits(REG_BACKUP_BATTERY, BACKUP_CHARGING_ENABLE_BIT)
            .await?;
        Ok(result)
    }

    pub async fn set_backup_battery_charging_enabled(
        &mut self,
        enabled: bool,
    ) -> Result<(), PmuError<I2C::Error>> {
        self.dev
            .write_register_bits(REG_BACKUP_BATTERY, BACKUP_CHARGING_ENABLE_BIT, enabled)
            .await?;
        Ok(())
    }

    /// Reads and clears the power key latch
    pub async fn power_key_events(&mut self) -> Result<PowerKeyEvents, PmuError<I2C::Error>> {
        let val = self.dev.read_register(REG_IRQ_STATUS3).await?;
        let events = PowerKeyEvents::from_irq(PowerKeyIrq::from_bits_truncate(val));
        if events.any() {
            debug!("Power key {:?}, clearing latch", events);
            self.dev
                .write_register(REG_IRQ_STATUS3, PowerKeyIrq::all().bits())
                .await?;
        }
        Ok(events)
    }

    pub async fn read_telemetry(
        &mut self,
        channel: TelemetryChannel,
    ) -> Result<f32, PmuError<I2C::Error>> {
        let raw = match channel.width() {
            24 => self.dev.read_register24(channel.register()).await?,
            _ => self.dev.read_register12(channel.register()).await? as u32,
        };
        Ok(channel.decode(raw))
    }

    pub async fn acin_voltage(&mut self) -> Result<f32, PmuError<I2C::Error>> {
        self.read_telemetry(TelemetryChannel::AcinVoltage).await
    }

    pub async fn acin_current(&mut self) -> Result<f32, PmuError<I2C::Error>> {
        self.read_telemetry(TelemetryChannel::AcinCurrent).await
    }

    pub async fn vbus_voltage(&mut self) -> Result<f32, PmuError<I2C::Error>> {
        self.read_telemetry(TelemetryChannel::VbusVoltage).await
    }

    pub async fn vbus_current(&mut self) -> Result<f32, PmuError<I2C::Error>> {
        self.read_telemetry(TelemetryChannel::VbusCurrent).await
    }

    pub async fn aps_voltage(&mut self) -> Result<f32, PmuError<I2C::Error>> {
        self.read_telemetry(TelemetryChannel::ApsVoltage).await
    }

    pub async fn battery_voltage(&mut self) -> Result<f32, PmuError<I2C::Error>> {
        self.read_telemetry(TelemetryChannel::BatteryVoltage).await
    }

    pub async fn battery_charge_current(&mut self) -> Result<f32, PmuError<I2C::Error>> {
        self.read_telemetry(TelemetryChannel::BatteryChargeCurrent)
            .await
    }

    pub async fn battery_discharge_current(&mut self) -> Result<f32, PmuError<I2C::Error>> {
        self.read_telemetry(TelemetryChannel::BatteryDischargeCurrent)
            .await
    }

    pub async fn battery_power(&mut self) -> Result<f32, PmuError<I2C::Error>> {
        self.read_telemetry(TelemetryChannel::BatteryPower).await
    }

    pub async fn internal_temperature(&mut self) -> Result<f32, PmuError<I2C::Error>> {
        self.read_telemetry(TelemetryChannel::InternalTemperature)
            .await
    }

    /// Approximate battery level in percent (0-100)
    pub async fn battery_level(&mut self) -> Result<f32, PmuError<I2C::Error>> {
        let voltage = self.battery_voltage().await?;
        let charge_current = self.battery_charge_current().await?;
        let vmin = self.battery_switch_off_voltage().await?;
        let vmax = self.charge_target_voltage().await?.volts();
        Ok(estimate_battery_level(voltage, charge_current, vmin, vmax))
    }

    pub async fn is_all_adc_enabled(&mut self) -> Result<bool, PmuError<I2C::Error>> {
        Ok(self.dev.read_register(REG_ADC_ENABLE1).await? == ADC_ALL_ENABLED)
    }

    pub async fn set_all_adc_enabled(&mut self, enabled: bool) -> Result<(), PmuError<I2C::Error>> {
        let val = if enabled {
            ADC_ALL_ENABLED
        } else {
            ADC_ALL_DISABLED
        };
        self.dev.write_register(REG_ADC_ENABLE1, val).await?;
        Ok(())
    }

    pub async fn gpio_function_code(&mut self, pin: u8) -> Result<u8, PmuError<I2C::Error>> {
        let (register, field) = gpio_pin(pin)?.function_field();
        Ok(self.dev.read_register_field(register, field).await?)
    }

    async fn set_gpio_function(
        &mut self,
        gpio: GpioPin,
        function: u8,
    ) -> Result<(), PmuError<I2C::Error>> {
        let (register, field) = gpio.function_field();
        self.dev
            .update_register_field(register, field, function)
            .await?;
        Ok(())
    }

    async fn set_gpio_mode(
        &mut self,
        gpio: GpioPin,
        mode: GpioMode,
    ) -> Result<(), PmuError<I2C::Error>> {
        debug!("GPIO{} set to {}", u8::from(gpio), mode);
        self.set_gpio_function(gpio, mode.function_code()).await
    }

    async fn gpio_mode_function(
        &mut self,
        pin: u8,
        mode: GpioMode,
    ) -> Result<(GpioPin, u8), PmuError<I2C::Error>> {
        let gpio = gpio_for_mode(pin, mode)?;
        let (register, field) = gpio.function_field();
        let function = self.dev.read_register_field(register, field).await?;
        Ok((gpio, function))
    }

    pub async fn set_gpio_floating(&mut self, pin: u8) -> Result<(), PmuError<I2C::Error>> {
        let gpio = gpio_for_mode(pin, GpioMode::Floating)?;
        self.set_gpio_mode(gpio, GpioMode::Floating).await
    }

    pub async fn is_gpio_floating(&mut self, pin: u8) -> Result<bool, PmuError<I2C::Error>> {
        let (_, function) = self.gpio_mode_function(pin, GpioMode::Floating).await?;
        Ok(function & 0b110 == 0b110)
    }

    pub async fn set_gpio_output_low(&mut self, pin: u8) -> Result<(), PmuError<I2C::Error>> {
        let gpio = gpio_for_mode(pin, GpioMode::LowOutput)?;
        self.set_gpio_mode(gpio, GpioMode::LowOutput).await
    }

    pub async fn is_gpio_output_low(&mut self, pin: u8) -> Result<bool, PmuError<I2C::Error>> {
        let (_, function) = self.gpio_mode_function(pin, GpioMode::LowOutput).await?;
        Ok(function == FUNCTION_LOW_OUTPUT)
    }

    /// GPIO0 LDO output, 1.8V or less falls back to low output
    pub async fn set_gpio_ldo_output(
        &mut self,
        pin: u8,
        volts: f32,
    ) -> Result<(), PmuError<I2C::Error>> {
        let gpio = gpio_for_mode(pin, GpioMode::LdoOutput)?;
        let volts = finite_volts(volts)?;
        match gpio0_ldo_code(volts) {
            None => self.set_gpio_mode(gpio, GpioMode::LowOutput).await,
            Some(code) => {
                self.dev
                    .update_register_field(REG_GPIO0_LDO_VOLTAGE, GPIO0_LDO_FIELD, code)
                    .await?;
                self.set_gpio_mode(gpio, GpioMode::LdoOutput).await
            }
        }
    }

    pub async fn is_gpio_ldo_output(&mut self, pin: u8) -> Result<bool, PmuError<I2C::Error>> {
        let (_, function) = self.gpio_mode_function(pin, GpioMode::LdoOutput).await?;
        Ok(function == FUNCTION_LDO_OR_PWM)
    }

    pub async fn gpio_ldo_voltage(&mut self, pin: u8) -> Result<f32, PmuError<I2C::Error>> {
        if !self.is_gpio_ldo_output(pin).await? {
            return Ok(0.0);
        }
        let code = self
            .dev
            .read_register_field(REG_GPIO0_LDO_VOLTAGE, GPIO0_LDO_FIELD)
            .await?;
        Ok(gpio0_ldo_voltage(code))
    }

    pub async fn set_gpio_pwm_output(
        &mut self,
        pin: u8,
        duty: u8,
    ) -> Result<(), PmuError<I2C::Error>> {
        let gpio = gpio_for_mode(pin, GpioMode::PwmOutput)?;
        let Some(prescaler) = gpio.pwm_prescaler_register() else {
            return Err(PmuError::UnsupportedMode {
                pin,
                mode: GpioMode::PwmOutput,
            });
        };
        self.dev.write_register(prescaler, PWM_PRESCALER).await?;
        self.dev.write_register(prescaler + 1, duty).await?;
        self.set_gpio_mode(gpio, GpioMode::PwmOutput).await
    }

    pub async fn is_gpio_pwm_output(&mut self, pin: u8) -> Result<bool, PmuError<I2C::Error>> {
        let (_, function) = self.gpio_mode_function(pin, GpioMode::PwmOutput).await?;
        Ok(function == FUNCTION_LDO_OR_PWM)
    }

    pub async fn gpio_pwm_duty(&mut self, pin: u8) -> Result<u8, PmuError<I2C::Error>> {
        let (gpio, function) = self.gpio_mode_function(pin, GpioMode::PwmOutput).await?;
        match gpio.pwm_prescaler_register() {
            Some(prescaler) if function == FUNCTION_LDO_OR_PWM => {
                Ok(self.dev.read_register(prescaler + 1).await?)
            }
            _ => Ok(0),
        }
    }

    pub async fn set_gpio34_function(
        &mut self,
        pin: u8,
        function: Gpio34Function,
    ) -> Result<(), PmuError<I2C::Error>> {
        let gpio = gpio34(pin)?;
        debug!("GPIO{} function {:?}", pin, function);
        self.set_gpio_function(gpio, function.into()).await
    }

    pub async fn gpio34_function(
        &mut self,
        pin: u8,
    ) -> Result<Gpio34Function, PmuError<I2C::Error>> {
        let (register, field) = gpio34(pin)?.function_field();
        let code = self.dev.read_register_field(register, field).await?;
        Ok(Gpio34Function::from(code))
    }
}
