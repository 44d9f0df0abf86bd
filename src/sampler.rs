//! Averaging, tare and calibration on top of a raw converter.

use log::info;
use serde::Serialize;

use crate::{Error, LoadCell};

/// Something that produces signed raw conversions, such as the hx711 driver.
pub trait RawSource {
    /// One raw conversion.
    fn read_raw(&mut self) -> Result<i32, Error>;

    /// Power cycle the converter back to a known state.
    fn reset(&mut self) -> Result<(), Error>;

    fn power_down(&mut self) -> Result<(), Error>;
}

/// How a measurement is taken.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SamplerConfig {
    /// Frames averaged per measurement.
    pub samples: usize,
    /// Power cycle the converter before each measurement.
    pub reset_before_read: bool,
    /// Leave the converter powered down between measurements.
    pub power_down_when_idle: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            samples: 3,
            reset_before_read: true,
            power_down_when_idle: true,
        }
    }
}

/// A weight reading, serialized as `{"weight": ..}`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Reading {
    pub weight: f32,
}

pub struct Sampler<S> {
    source: S,
    config: SamplerConfig,
    offset: f32, // tare
    scale: f32,  // calibration value
}

impl<S: RawSource> Sampler<S> {
    pub fn new(source: S, config: SamplerConfig) -> Self {
        Self {
            source,
            config,
            offset: 0.0,
            scale: 1.0,
        }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub fn set_offset(&mut self, offset: f32) {
        self.offset = offset;
    }

    /// Mean of `num_samples` raw conversions.
    pub fn average(&mut self, num_samples: usize) -> Result<f32, Error> {
        if num_samples == 0 {
            return Err(Error::NoSamples);
        }
        let mut sum: i64 = 0;
        for _ in 0..num_samples {
            sum += i64::from(self.source.read_raw()?);
        }
        Ok((sum as f64 / num_samples as f64) as f32)
    }

    /// Average the configured number of samples, relative to the tare and
    /// divided by the scale.
    pub fn measure(&mut self) -> Result<Reading, Error> {
        let samples = self.config.samples;
        let average = self.session(|s| s.average(samples))?;
        Ok(Reading {
            weight: self.apply(average),
        })
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    fn apply(&self, raw: f32) -> f32 {
        (raw - self.offset) / self.scale
    }

    // Runs `op` between the configured reset and power down. The power down
    // happens even when `op` fails, and `op`'s error takes precedence.
    fn session<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let result = if self.config.reset_before_read {
            self.source.reset().and_then(|()| op(self))
        } else {
            op(self)
        };

        if !self.config.power_down_when_idle {
            return result;
        }
        let powered_down = self.source.power_down();
        let value = result?;
        powered_down?;
        Ok(value)
    }
}

impl<S: RawSource> LoadCell for Sampler<S> {
    type Offset = f32;
    type Scale = f32;
    type Error = Error;

    fn read(&mut self) -> Result<i32, Error> {
        self.source.read_raw()
    }

    fn read_scaled(&mut self) -> Result<f32, Error> {
        let raw = self.read()?;
        Ok(self.apply(raw as f32))
    }

    fn tare(&mut self, num_samples: usize) -> Result<(), Error> {
        let offset = self.session(|s| s.average(num_samples))?;
        info!("tare offset set to {}", offset);
        self.offset = offset;
        Ok(())
    }

    fn get_offset(&self) -> f32 {
        self.offset
    }

    fn set_scale(&mut self, scale: f32) {
        self.scale = scale;
    }

    fn get_scale(&self) -> f32 {
        self.scale
    }
}
