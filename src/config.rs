//! Load cell attributes as the sensor component receives them.
//!
//! Attribute maps carry every number as a double, so integer settings are
//! parsed as `f64` and checked in [`LoadCellConfig::validate`].

use serde::Deserialize;
use thiserror::Error;

use crate::hx711::{Channel, GainMode, DEFAULT_READY_TIMEOUT_MS};
use crate::sampler::{RawSource, Sampler, SamplerConfig};
use crate::LoadCell;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    #[error("gain {gain} is not available on channel {channel:?}")]
    UnsupportedGain { channel: Channel, gain: f64 },

    #[error("{key} must be a whole number, got {value}")]
    NotAnInteger { key: &'static str, value: f64 },

    #[error("{key} is out of range: {value}")]
    OutOfRange { key: &'static str, value: f64 },

    #[error("numberOfReadings must be at least 1")]
    NoReadings,

    #[error("doutPin and sckPin are both {pin}")]
    SharedPin { pin: u8 },

    #[error("scale must be a finite, non-zero number, got {0}")]
    InvalidScale(f64),

    #[error("tare_offset must be finite, got {0}")]
    InvalidOffset(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoadCellConfig {
    pub gain: f64,
    #[serde(rename = "doutPin")]
    pub dout_pin: f64,
    #[serde(rename = "sckPin")]
    pub sck_pin: f64,
    #[serde(rename = "numberOfReadings")]
    pub number_of_readings: f64,
    pub tare_offset: f64,
    pub channel: Channel,
    pub scale: f64,
    #[serde(rename = "readyTimeoutMs")]
    pub ready_timeout_ms: f64,
}

impl Default for LoadCellConfig {
    fn default() -> Self {
        Self {
            gain: 64.0,
            dout_pin: 5.0,
            sck_pin: 6.0,
            number_of_readings: 3.0,
            tare_offset: 0.0,
            channel: Channel::A,
            scale: 1.0,
            ready_timeout_ms: DEFAULT_READY_TIMEOUT_MS as f64,
        }
    }
}

/// A checked [`LoadCellConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    pub gain_mode: GainMode,
    pub dout_pin: u8,
    pub sck_pin: u8,
    pub sampler: SamplerConfig,
    pub tare_offset: f32,
    pub scale: f32,
    pub ready_timeout_ms: u32,
}

impl LoadCellConfig {
    pub fn validate(&self) -> Result<Settings, ConfigError> {
        let gain_mode = whole::<u8>("gain", self.gain)
            .ok()
            .and_then(|gain| GainMode::new(self.channel, gain))
            .ok_or(ConfigError::UnsupportedGain {
                channel: self.channel,
                gain: self.gain,
            })?;

        let dout_pin = whole::<u8>("doutPin", self.dout_pin)?;
        let sck_pin = whole::<u8>("sckPin", self.sck_pin)?;
        if dout_pin == sck_pin {
            return Err(ConfigError::SharedPin { pin: dout_pin });
        }

        let samples = whole::<usize>("numberOfReadings", self.number_of_readings)?;
        if samples == 0 {
            return Err(ConfigError::NoReadings);
        }

        if !self.scale.is_finite() || self.scale == 0.0 {
            return Err(ConfigError::InvalidScale(self.scale));
        }
        if !self.tare_offset.is_finite() {
            return Err(ConfigError::InvalidOffset(self.tare_offset));
        }

        Ok(Settings {
            gain_mode,
            dout_pin,
            sck_pin,
            sampler: SamplerConfig {
                samples,
                ..SamplerConfig::default()
            },
            tare_offset: self.tare_offset as f32,
            scale: self.scale as f32,
            ready_timeout_ms: whole::<u32>("readyTimeoutMs", self.ready_timeout_ms)?,
        })
    }
}

fn whole<T: TryFrom<u64>>(key: &'static str, value: f64) -> Result<T, ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::NotAnInteger { key, value });
    }
    if value < 0.0 || value > u64::MAX as f64 {
        return Err(ConfigError::OutOfRange { key, value });
    }
    let integer = value as u64;
    if integer as f64 != value {
        return Err(ConfigError::NotAnInteger { key, value });
    }
    T::try_from(integer).map_err(|_| ConfigError::OutOfRange { key, value })
}

impl<S: RawSource> Sampler<S> {
    /// Sampler with the configured readings count, tare offset and scale.
    pub fn from_settings(source: S, settings: &Settings) -> Self {
        let mut sampler = Sampler::new(source, settings.sampler);
        sampler.set_offset(settings.tare_offset);
        sampler.set_scale(settings.scale);
        sampler
    }
}
