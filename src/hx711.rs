mod pins;

pub use pins::{Pins, PULSE_DELAY_US};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::{debug, info, warn};
use serde::Deserialize;

use crate::config::Settings;
use crate::sampler::RawSource;
use crate::Error;

pub const HX711_MINIMUM: i32 = -(1 << 23);
pub const HX711_MAXIMUM: i32 = (1 << 23) - 1;
pub const DEFAULT_READY_TIMEOUT_MS: u32 = 1000;

const DATA_BITS: u32 = 24;
// SCK held high for more than 60 µs powers the chip down
const POWER_DOWN_HOLD_US: u32 = 100;
const READY_POLL_MS: u32 = 1;

/// Input channel of the hx711 multiplexer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    #[default]
    A,
    B,
}

/// Channel and gain selection. The discriminant is the number of clock
/// pulses sent after the 24 data bits.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GainMode {
    #[default]
    A128 = 1, // extra pulses
    B32 = 2,
    A64 = 3,
}

impl GainMode {
    /// Channel A supports gains of 128 and 64, channel B only 32.
    pub const fn new(channel: Channel, gain: u8) -> Option<Self> {
        match (channel, gain) {
            (Channel::A, 128) => Some(GainMode::A128),
            (Channel::A, 64) => Some(GainMode::A64),
            (Channel::B, 32) => Some(GainMode::B32),
            _ => None,
        }
    }

    pub const fn extra_pulses(self) -> u8 {
        self as u8
    }

    pub const fn channel(self) -> Channel {
        match self {
            GainMode::A128 | GainMode::A64 => Channel::A,
            GainMode::B32 => Channel::B,
        }
    }

    pub const fn gain(self) -> u8 {
        match self {
            GainMode::A128 => 128,
            GainMode::A64 => 64,
            GainMode::B32 => 32,
        }
    }
}

/// Sign-extend a 24 bit two's complement frame.
pub const fn decode_frame(raw: u32) -> i32 {
    ((raw << 8) as i32) >> 8
}

/// Bit-banged hx711 driver.
///
/// The gain selected by the pulses that follow a frame only applies to the
/// next conversion, so the driver tracks the mode the chip is currently
/// converting with and discards one frame whenever that differs from the
/// requested mode, or is unknown after a failed frame.
pub struct HX711<SCK, DT, D> {
    pins: Pins<SCK, DT, D>,
    last_reading: i32,
    gain_mode: GainMode,
    latched_mode: Option<GainMode>,
    ready_timeout_ms: u32,
    powered: bool,
}

impl<SCK, DT, D> HX711<SCK, DT, D>
where
    SCK: OutputPin,
    DT: InputPin,
    D: DelayNs,
{
    /// Takes ownership of the pins and drives SCK low, which leaves the chip
    /// powered up on channel A with gain 128.
    pub fn new(sck_pin: SCK, dt_pin: DT, delay: D) -> Result<Self, Error> {
        let mut pins = Pins::new(sck_pin, dt_pin, delay);
        pins.clock_low()?;
        Ok(Self {
            pins,
            last_reading: 0,
            gain_mode: GainMode::A128,
            latched_mode: Some(GainMode::A128),
            ready_timeout_ms: DEFAULT_READY_TIMEOUT_MS,
            powered: true,
        })
    }

    pub fn is_ready(&mut self) -> Result<bool, Error> {
        // if the dt pin is low, device is ready for read
        self.pins.is_data_low()
    }

    /// Poll DT until a conversion is available or the ready timeout expires.
    pub fn wait_ready(&mut self) -> Result<(), Error> {
        let mut waited_ms = 0;
        while !self.is_ready()? {
            if waited_ms >= self.ready_timeout_ms {
                warn!("hx711 not ready after {} ms", waited_ms);
                return Err(Error::NotReady { waited_ms });
            }
            self.pins.delay_ms(READY_POLL_MS);
            waited_ms += READY_POLL_MS;
        }
        Ok(())
    }

    /// Read one conversion using the current gain mode, blocking until the
    /// chip is ready.
    pub fn read(&mut self) -> Result<i32, Error> {
        // waking the chip changes the latched mode, so compare afterwards
        if !self.powered {
            self.power_up()?;
        }
        if self.latched_mode != Some(self.gain_mode) {
            let latched = self.latched_mode;
            let stale = self.read_frame()?;
            debug!(
                "hx711 discarded {} converted with {:?}, now {:?}",
                stale, latched, self.gain_mode
            );
        }

        let value = self.read_frame()?;
        if value == HX711_MINIMUM || value == HX711_MAXIMUM {
            warn!("hx711 saturated: {}", value);
            return Err(Error::Saturated { raw: value });
        }
        self.last_reading = value;
        Ok(value)
    }

    fn read_frame(&mut self) -> Result<i32, Error> {
        self.wait_ready()?;

        let mode = self.gain_mode;
        let pins = &mut self.pins;
        // SCK must not stay high for 60 µs, so nothing may preempt the frame
        let raw = critical_section::with(|_| {
            let mut value: u32 = 0;
            // bits arrive MSB first
            for _ in 0..DATA_BITS {
                value = (value << 1) | u32::from(pins.read_bit()?);
            }
            // select gain and channel for the next conversion
            for _ in 0..mode.extra_pulses() {
                pins.pulse()?;
            }
            Ok::<u32, Error>(value)
        });
        let raw = match raw {
            Ok(raw) => raw,
            Err(err) => {
                self.abort_frame();
                return Err(err);
            }
        };
        self.latched_mode = Some(mode);

        let value = decode_frame(raw);
        debug!("hx711 frame {:#08x} = {}", raw, value);
        Ok(value)
    }

    // A frame cut short leaves SCK possibly high and the chip mid-shift, so
    // power cycle it. The latch stays unknown if that fails too.
    fn abort_frame(&mut self) {
        self.latched_mode = None;
        self.powered = true;
        if let Err(err) = self.reset() {
            warn!("hx711 recovery after failed frame: {}", err);
            self.powered = false;
        }
    }

    /// Last successful reading.
    pub fn get_last_raw(&self) -> i32 {
        self.last_reading
    }

    pub fn get_gain_mode(&self) -> GainMode {
        self.gain_mode
    }

    /// Takes effect on the next `read`.
    pub fn set_gain_mode(&mut self, new_mode: GainMode) {
        self.gain_mode = new_mode;
    }

    pub fn ready_timeout_ms(&self) -> u32 {
        self.ready_timeout_ms
    }

    pub fn set_ready_timeout_ms(&mut self, timeout_ms: u32) {
        self.ready_timeout_ms = timeout_ms;
    }

    /// Apply the gain mode and ready timeout of validated settings.
    pub fn configure(&mut self, settings: &Settings) {
        self.set_gain_mode(settings.gain_mode);
        self.set_ready_timeout_ms(settings.ready_timeout_ms);
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    /// Does nothing if the chip is already powered down, since pulling SCK
    /// low first would wake it.
    pub fn power_down(&mut self) -> Result<(), Error> {
        if !self.powered {
            return Ok(());
        }
        self.pins.clock_low()?;
        self.pins.hold_clock_high(POWER_DOWN_HOLD_US)?;
        self.powered = false;
        Ok(())
    }

    /// Wakes the chip. It comes back on channel A with gain 128.
    pub fn power_up(&mut self) -> Result<(), Error> {
        self.pins.clock_low()?;
        if !self.powered {
            self.latched_mode = Some(GainMode::A128);
            self.powered = true;
        }
        Ok(())
    }

    pub fn reset(&mut self) -> Result<(), Error> {
        self.power_down()?;
        self.power_up()?;
        info!("hx711 reset, gain mode {:?}", self.gain_mode);
        Ok(())
    }

    /// Power the chip down and hand the pins back to the caller.
    pub fn release(mut self) -> (SCK, DT, D) {
        if let Err(err) = self.power_down() {
            warn!("hx711 power down on release failed: {}", err);
        }
        self.pins.release()
    }
}

impl<SCK, DT, D> RawSource for HX711<SCK, DT, D>
where
    SCK: OutputPin,
    DT: InputPin,
    D: DelayNs,
{
    fn read_raw(&mut self) -> Result<i32, Error> {
        self.read()
    }

    fn reset(&mut self) -> Result<(), Error> {
        HX711::reset(self)
    }

    fn power_down(&mut self) -> Result<(), Error> {
        HX711::power_down(self)
    }
}
