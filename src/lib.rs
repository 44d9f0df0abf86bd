#![no_std]

#[cfg(test)]
extern crate std;

pub mod config;
mod error;
pub mod hx711;
pub mod sampler;

#[cfg(test)]
mod mock;

pub use config::{ConfigError, LoadCellConfig, Settings};
pub use error::Error;
pub use sampler::{RawSource, Reading, Sampler, SamplerConfig};

pub trait LoadCell {
    type Offset;
    type Scale;
    type Error;

    /// Read the raw value from the load cell
    fn read(&mut self) -> Result<i32, Self::Error>;

    /// Read the value after applying the offset and scaling.
    fn read_scaled(&mut self) -> Result<Self::Scale, Self::Error>;

    /// Zero the load cell offset by averaging `num_samples` readings
    fn tare(&mut self, num_samples: usize) -> Result<(), Self::Error>;

    /// Get the load cell offset.
    fn get_offset(&self) -> Self::Offset;

    /// Set the scale (AKA calibrate the scale).
    /// Use this to ensure that 1kg ~ 1kg
    fn set_scale(&mut self, scale: Self::Scale);

    /// Get the scale.
    fn get_scale(&self) -> Self::Scale;
}
