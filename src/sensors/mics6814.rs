use super::gpio::GpioLine;
use super::{GasSensor, SensorError, SensorResult};
use crate::reading::GasResistances;
use anyhow::{anyhow, Result};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use gpio_cdev::Chip;
use linux_embedded_hal::{Delay, I2cdev};
use std::path::Path;

const ADS1015_ADDRESS: u8 = 0x49;
const REG_CONVERSION: u8 = 0x00;
const REG_CONFIG: u8 = 0x01;

const CONFIG_START_SINGLE: u16 = 0x8000;
const CONFIG_PGA_4_096V: u16 = 0x0200;
const CONFIG_MODE_SINGLE_SHOT: u16 = 0x0100;
const CONFIG_RATE_1600SPS: u16 = 0x0080;
const CONFIG_COMPARATOR_OFF: u16 = 0x0003;
const FULL_SCALE_VOLTS: f64 = 4.096;

const CONVERSION_POLLS: usize = 10;
const CONVERSION_POLL_US: u32 = 700;

const SUPPLY_VOLTS: f64 = 3.3;
const LOAD_OHMS: f64 = 56_000.0;
const HEATER_GPIO: u32 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Oxidising = 0,
    Reducing = 1,
    Nh3 = 2,
}

impl Channel {
    // Single-ended AINx against GND.
    fn mux_bits(self) -> u16 {
        (0b100 | self as u16) << 12
    }
}

/// MICS6814 gas sensor sampled through the ADS1015 ADC on the Enviro+ board.
pub struct Mics6814<I, D> {
    i2c: I,
    delay: D,
    _heater: Option<GpioLine>,
}

impl Mics6814<I2cdev, Delay> {
    pub fn open(bus: &Path, chip: &mut Chip) -> Result<Self> {
        let heater = GpioLine::output(chip, HEATER_GPIO, true)?;
        let i2c = I2cdev::new(bus)
            .map_err(|err| anyhow!("failed to open I2C bus {}: {err}", bus.display()))?;
        let mut sensor = Self::new(i2c, Delay);
        sensor._heater = Some(heater);
        Ok(sensor)
    }
}

impl<I, D> Mics6814<I, D>
where
    I: I2c,
    D: DelayNs,
{
    pub fn new(i2c: I, delay: D) -> Self {
        Self {
            i2c,
            delay,
            _heater: None,
        }
    }

    fn read_voltage(&mut self, channel: Channel) -> SensorResult<f64> {
        let config = CONFIG_START_SINGLE
            | channel.mux_bits()
            | CONFIG_PGA_4_096V
            | CONFIG_MODE_SINGLE_SHOT
            | CONFIG_RATE_1600SPS
            | CONFIG_COMPARATOR_OFF;
        let [msb, lsb] = config.to_be_bytes();
        self.i2c
            .write(ADS1015_ADDRESS, &[REG_CONFIG, msb, lsb])
            .map_err(|err| i2c_error("start conversion", err))?;

        let mut ready = false;
        for _ in 0..CONVERSION_POLLS {
            self.delay.delay_us(CONVERSION_POLL_US);
            let status = self.read_register(REG_CONFIG)?;
            if status & CONFIG_START_SINGLE != 0 {
                ready = true;
                break;
            }
        }
        if !ready {
            return Err(SensorError::fatal(format!(
                "ADS1015 conversion on {channel:?} never completed"
            )));
        }

        let raw = self.read_register(REG_CONVERSION)?;
        Ok(conversion_to_volts(raw))
    }

    fn read_register(&mut self, register: u8) -> SensorResult<u16> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(ADS1015_ADDRESS, &[register], &mut buf)
            .map_err(|err| i2c_error("read register", err))?;
        Ok(u16::from_be_bytes(buf))
    }
}

impl<I, D> GasSensor for Mics6814<I, D>
where
    I: I2c,
    D: DelayNs,
{
    fn read_all(&mut self) -> SensorResult<GasResistances> {
        let oxidising = self.read_voltage(Channel::Oxidising)?;
        let reducing = self.read_voltage(Channel::Reducing)?;
        let nh3 = self.read_voltage(Channel::Nh3)?;
        Ok(GasResistances {
            oxidising: volts_to_ohms(oxidising),
            reducing: volts_to_ohms(reducing),
            nh3: volts_to_ohms(nh3),
        })
    }
}

fn i2c_error(action: &str, err: impl std::fmt::Debug) -> SensorError {
    SensorError::fatal(format!("ADS1015 {action} failed: {err:?}"))
}

// 12-bit result, left aligned in the 16-bit register.
fn conversion_to_volts(raw: u16) -> f64 {
    let counts = (raw as i16) >> 4;
    f64::from(counts) * FULL_SCALE_VOLTS / 2048.0
}

fn volts_to_ohms(volts: f64) -> f64 {
    let divisor = SUPPLY_VOLTS - volts;
    if divisor == 0.0 {
        return 0.0;
    }
    volts * LOAD_OHMS / divisor
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};

    /// Answers every conversion with a fixed count per channel.
    struct FakeAdc {
        counts: [i16; 3],
        selected: usize,
        configs: Vec<u16>,
        pointer: u8,
    }

    impl FakeAdc {
        fn new(counts: [i16; 3]) -> Self {
            Self {
                counts,
                selected: 0,
                configs: Vec::new(),
                pointer: 0,
            }
        }
    }

    impl ErrorType for FakeAdc {
        type Error = ErrorKind;
    }

    impl I2c for FakeAdc {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            assert_eq!(address, ADS1015_ADDRESS);
            for op in operations.iter_mut() {
                match op {
                    Operation::Write(bytes) => {
                        self.pointer = bytes[0];
                        if bytes.len() == 3 {
                            let config = u16::from_be_bytes([bytes[1], bytes[2]]);
                            self.selected = usize::from(((config >> 12) & 0b011) as u8);
                            self.configs.push(config);
                        }
                    }
                    Operation::Read(buf) => {
                        let value = match self.pointer {
                            REG_CONFIG => CONFIG_START_SINGLE,
                            _ => (self.counts[self.selected] << 4) as u16,
                        };
                        buf.copy_from_slice(&value.to_be_bytes());
                    }
                }
            }
            Ok(())
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    #[test]
    fn converts_left_aligned_counts_to_volts() {
        assert!((conversion_to_volts(1000 << 4) - 2.0).abs() < 1e-9);
        assert!((conversion_to_volts(0xfff0) + 0.002).abs() < 1e-9);
        assert_eq!(conversion_to_volts(0), 0.0);
    }

    #[test]
    fn voltage_divider_to_resistance() {
        let ohms = volts_to_ohms(1.1);
        assert!((ohms - 28_000.0).abs() < 1e-6);
        assert_eq!(volts_to_ohms(SUPPLY_VOLTS), 0.0);
    }

    #[test]
    fn samples_each_channel_in_turn() {
        // 500 counts -> 1.0 V, 825 counts -> 1.65 V, 250 counts -> 0.5 V
        let mut gas = Mics6814::new(FakeAdc::new([500, 825, 250]), NoDelay);
        let reading = gas.read_all().unwrap();

        assert!((reading.oxidising - 1.0 * 56_000.0 / 2.3).abs() < 1e-6);
        assert!((reading.reducing - 56_000.0).abs() < 1e-6);
        assert!((reading.nh3 - 0.5 * 56_000.0 / 2.8).abs() < 1e-6);

        let muxes: Vec<u16> = gas.i2c.configs.iter().map(|c| (c >> 12) & 0b111).collect();
        assert_eq!(muxes, vec![0b100, 0b101, 0b110]);
        assert!(gas
            .i2c
            .configs
            .iter()
            .all(|c| c & CONFIG_MODE_SINGLE_SHOT != 0 && c & 0x0e00 == CONFIG_PGA_4_096V));
    }
}
