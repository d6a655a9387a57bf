use super::gpio::GpioLine;
use super::{ParticulateSensor, SensorError, SensorResult, TransientError};
use crate::reading::ParticulateSample;
use anyhow::{anyhow, Result};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use gpio_cdev::Chip;
use linux_embedded_hal::Delay;
use serialport::{ClearBuffer, SerialPort};
use std::io::{self, Read};
use std::time::{Duration, Instant};

const START_OF_FRAME: [u8; 2] = [0x42, 0x4d];
const FRAME_BYTES: usize = 32;
const FRAME_LENGTH: u16 = 28;
const DATA_WORDS: usize = 13;

const BAUD_RATE: u32 = 9600;
const SERIAL_TIMEOUT: Duration = Duration::from_secs(4);
const FRAME_TIMEOUT: Duration = Duration::from_secs(5);
const RESET_PULSE_MS: u32 = 100;

const ENABLE_GPIO: u32 = 22;
const RESET_GPIO: u32 = 27;

/// Byte stream the sensor talks on, with a way to drop whatever is buffered.
pub trait SerialLink: Read {
    fn discard_input(&mut self) -> io::Result<()>;
}

impl SerialLink for Box<dyn SerialPort> {
    fn discard_input(&mut self) -> io::Result<()> {
        self.clear(ClearBuffer::Input).map_err(io::Error::from)
    }
}

/// Plantower PMS5003 particulate sensor on a UART.
pub struct Pms5003<S, P, D> {
    port: S,
    reset_pin: P,
    delay: D,
    frame_timeout: Duration,
    _enable_pin: Option<GpioLine>,
}

impl Pms5003<Box<dyn SerialPort>, GpioLine, Delay> {
    pub fn open(serial_path: &str, chip: &mut Chip) -> Result<Self> {
        let enable_pin = GpioLine::output(chip, ENABLE_GPIO, true)?;
        let reset_pin = GpioLine::output(chip, RESET_GPIO, true)?;
        let port = serialport::new(serial_path, BAUD_RATE)
            .timeout(SERIAL_TIMEOUT)
            .open()
            .map_err(|err| anyhow!("failed to open PMS5003 serial port {serial_path}: {err}"))?;

        let mut sensor = Self::new(port, reset_pin, Delay);
        sensor._enable_pin = Some(enable_pin);
        Ok(sensor)
    }
}

impl<S, P, D> Pms5003<S, P, D>
where
    S: SerialLink,
    P: OutputPin,
    D: DelayNs,
{
    pub fn new(port: S, reset_pin: P, delay: D) -> Self {
        Self {
            port,
            reset_pin,
            delay,
            frame_timeout: FRAME_TIMEOUT,
            _enable_pin: None,
        }
    }

    fn read_frame(&mut self) -> SensorResult<[u8; FRAME_BYTES]> {
        let deadline = Instant::now() + self.frame_timeout;
        let mut previous = 0u8;
        loop {
            if Instant::now() >= deadline {
                return Err(TransientError::Timeout(
                    "could not find start of frame".to_string(),
                )
                .into());
            }
            let mut byte = [0u8; 1];
            self.read_exact(&mut byte)?;
            if previous == START_OF_FRAME[0] && byte[0] == START_OF_FRAME[1] {
                break;
            }
            previous = byte[0];
        }

        let mut frame = [0u8; FRAME_BYTES];
        frame[..2].copy_from_slice(&START_OF_FRAME);
        self.read_exact(&mut frame[2..])?;
        Ok(frame)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> SensorResult<()> {
        self.port.read_exact(buf).map_err(|err| match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::UnexpectedEof => {
                TransientError::Timeout(err.to_string()).into()
            }
            _ => SensorError::fatal(format!("PMS5003 serial read failed: {err}")),
        })
    }
}

impl<S, P, D> ParticulateSensor for Pms5003<S, P, D>
where
    S: SerialLink,
    P: OutputPin,
    D: DelayNs,
{
    fn read(&mut self) -> SensorResult<ParticulateSample> {
        let frame = self.read_frame()?;
        decode_frame(&frame)
    }

    fn reset(&mut self) -> SensorResult<()> {
        self.reset_pin
            .set_low()
            .map_err(|err| SensorError::fatal(format!("PMS5003 reset line: {err:?}")))?;
        self.port
            .discard_input()
            .map_err(|err| SensorError::fatal(format!("PMS5003 serial flush failed: {err}")))?;
        self.delay.delay_ms(RESET_PULSE_MS);
        self.reset_pin
            .set_high()
            .map_err(|err| SensorError::fatal(format!("PMS5003 reset line: {err:?}")))?;
        Ok(())
    }
}

/// Validates a raw frame and extracts the standard-particle (CF=1) mass concentrations.
fn decode_frame(frame: &[u8; FRAME_BYTES]) -> SensorResult<ParticulateSample> {
    if frame[..2] != START_OF_FRAME {
        return Err(SensorError::fatal("PMS5003 frame missing start marker"));
    }
    let length = u16::from_be_bytes([frame[2], frame[3]]);
    if length != FRAME_LENGTH {
        return Err(SensorError::fatal(format!(
            "PMS5003 frame length {length}, expected {FRAME_LENGTH}"
        )));
    }

    let expected = u16::from_be_bytes([frame[FRAME_BYTES - 2], frame[FRAME_BYTES - 1]]);
    let computed = frame[..FRAME_BYTES - 2]
        .iter()
        .fold(0u16, |sum, byte| sum.wrapping_add(u16::from(*byte)));
    if expected != computed {
        return Err(TransientError::ChecksumMismatch { expected, computed }.into());
    }

    let mut words = [0u16; DATA_WORDS];
    for (idx, word) in words.iter_mut().enumerate() {
        let offset = 4 + idx * 2;
        *word = u16::from_be_bytes([frame[offset], frame[offset + 1]]);
    }

    Ok(ParticulateSample {
        pm1: words[0],
        pm25: words[1],
        pm10: words[2],
    })
}
