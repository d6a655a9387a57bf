use anyhow::{anyhow, Result};
use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};
use gpio_cdev::{Chip, LineHandle, LineRequestFlags};

const CONSUMER: &str = "enviro-forwarder";

/// Output line requested through the GPIO character device.
pub struct GpioLine {
    offset: u32,
    handle: LineHandle,
}

impl GpioLine {
    pub fn output(chip: &mut Chip, offset: u32, initial_high: bool) -> Result<Self> {
        let line = chip
            .get_line(offset)
            .map_err(|err| anyhow!("failed to get GPIO line {offset}: {err}"))?;
        let handle = line
            .request(LineRequestFlags::OUTPUT, u8::from(initial_high), CONSUMER)
            .map_err(|err| anyhow!("failed to request GPIO line {offset} as output: {err}"))?;
        Ok(Self { offset, handle })
    }

    fn set(&mut self, value: u8) -> Result<(), GpioError> {
        self.handle.set_value(value).map_err(|err| GpioError {
            offset: self.offset,
            message: err.to_string(),
        })
    }
}

#[derive(Debug)]
pub struct GpioError {
    pub offset: u32,
    pub message: String,
}

impl embedded_hal::digital::Error for GpioError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

impl ErrorType for GpioLine {
    type Error = GpioError;
}

impl OutputPin for GpioLine {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(0)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(1)
    }
}

pub fn open_chip(path: &std::path::Path) -> Result<Chip> {
    Chip::new(path).map_err(|err| anyhow!("failed to open GPIO chip {}: {err}", path.display()))
}
