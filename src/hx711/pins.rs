//! Clock and data line handling for the hx711 serial interface.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::Error;

/// Time SCK is held high (and then low) for each clock pulse.
/// The datasheet asks for at least 0.2 µs and at most 50 µs high.
pub const PULSE_DELAY_US: u32 = 1;

/// Owns the PD_SCK output, the DOUT input and a delay source.
pub struct Pins<SCK, DT, D> {
    sck: SCK,
    dt: DT,
    delay: D,
}

impl<SCK, DT, D> Pins<SCK, DT, D>
where
    SCK: OutputPin,
    DT: InputPin,
    D: DelayNs,
{
    pub fn new(sck: SCK, dt: DT, delay: D) -> Self {
        Self { sck, dt, delay }
    }

    /// DOUT is pulled low by the chip once a conversion is waiting.
    pub fn is_data_low(&mut self) -> Result<bool, Error> {
        self.dt.is_low().map_err(Error::pin)
    }

    /// Clock one bit out of the chip. The bit is valid while SCK is high.
    pub fn read_bit(&mut self) -> Result<bool, Error> {
        self.sck.set_high().map_err(Error::pin)?;
        self.delay.delay_us(PULSE_DELAY_US);

        let bit = self.dt.is_high().map_err(Error::pin)?;

        self.sck.set_low().map_err(Error::pin)?;
        self.delay.delay_us(PULSE_DELAY_US);

        Ok(bit)
    }

    /// A clock pulse that ignores DOUT, used for the gain select pulses.
    pub fn pulse(&mut self) -> Result<(), Error> {
        self.sck.set_high().map_err(Error::pin)?;
        self.delay.delay_us(PULSE_DELAY_US);
        self.sck.set_low().map_err(Error::pin)?;
        self.delay.delay_us(PULSE_DELAY_US);
        Ok(())
    }

    pub fn clock_low(&mut self) -> Result<(), Error> {
        self.sck.set_low().map_err(Error::pin)
    }

    /// Drive SCK high and keep it there for `us` microseconds.
    pub fn hold_clock_high(&mut self, us: u32) -> Result<(), Error> {
        self.sck.set_high().map_err(Error::pin)?;
        self.delay.delay_us(us);
        Ok(())
    }

    pub fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }

    pub fn release(self) -> (SCK, DT, D) {
        (self.sck, self.dt, self.delay)
    }
}
