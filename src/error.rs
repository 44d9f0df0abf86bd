use embedded_hal::digital::ErrorKind;
use thiserror::Error;

/// Errors raised while talking to the hx711 or sampling from it.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A GPIO operation on the SCK or DT line failed.
    #[error("gpio error: {0:?}")]
    Pin(ErrorKind),

    /// DT never went low, so no conversion became available.
    #[error("hx711 not ready after {waited_ms} ms")]
    NotReady { waited_ms: u32 },

    /// The converter returned one of its rail codes (input out of range).
    #[error("hx711 reading saturated at {raw}")]
    Saturated { raw: i32 },

    /// An average over zero samples was requested.
    #[error("at least one sample is required")]
    NoSamples,
}

impl Error {
    pub(crate) fn pin<E: embedded_hal::digital::Error>(err: E) -> Self {
        Error::Pin(err.kind())
    }
}
