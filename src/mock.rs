//! Simulated hx711 behind embedded-hal pins, for tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorKind, ErrorType, InputPin, OutputPin};

const POWER_DOWN_NS: u64 = 60_000;

#[derive(Debug)]
pub struct Fault;

impl embedded_hal::digital::Error for Fault {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// A frame the driver clocked out completely.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub code: u32,
    /// Extra pulses that were in effect when this conversion was made.
    pub converted_with: u8,
    pub extra_pulses: u32,
}

pub struct Chip {
    pub conversions: VecDeque<u32>,
    /// Readiness polls that report busy before each conversion is ready.
    pub settle_polls: u32,
    pub powered: bool,
    pub power_cycles: u32,
    pub frames: Vec<Frame>,
    pub max_high_ns: u64,
    pub fail_dt: bool,
    /// Fail DT reads only while a frame is being clocked out.
    pub fail_dt_in_frame: bool,
    pub fail_sck: bool,
    latched_pulses: u8,
    polls_left: Option<u32>,
    sck_high: bool,
    high_ns: u64,
    shifting: Option<u32>,
    pulses: u32,
}

impl Chip {
    pub fn with_codes(codes: &[u32]) -> Self {
        Self {
            conversions: codes.iter().copied().collect(),
            settle_polls: 0,
            powered: true,
            power_cycles: 0,
            frames: Vec::new(),
            max_high_ns: 0,
            fail_dt: false,
            fail_dt_in_frame: false,
            fail_sck: false,
            latched_pulses: 1,
            polls_left: None,
            sck_high: false,
            high_ns: 0,
            shifting: None,
            pulses: 0,
        }
    }

    /// Record the frame in flight, if the driver finished clocking it.
    pub fn settle(&mut self) {
        if let Some(code) = self.shifting.take() {
            if self.pulses > 24 {
                let extra = self.pulses - 24;
                self.frames.push(Frame {
                    code,
                    converted_with: self.latched_pulses,
                    extra_pulses: extra,
                });
                self.latched_pulses = extra as u8;
            }
            self.pulses = 0;
            self.polls_left = None;
        }
    }

    fn data_ready(&mut self) -> bool {
        if self.conversions.is_empty() {
            return false;
        }
        let left = self.polls_left.get_or_insert(self.settle_polls);
        if *left == 0 {
            true
        } else {
            *left -= 1;
            false
        }
    }

    fn dout_high(&mut self) -> bool {
        if !self.powered {
            return true;
        }
        if self.sck_high {
            return match self.shifting {
                Some(code) if (1..=24).contains(&self.pulses) => {
                    (code >> (24 - self.pulses)) & 1 == 1
                }
                _ => true,
            };
        }
        if self.shifting.is_some() {
            if self.pulses < 24 {
                return true;
            }
            self.settle();
        }
        !self.data_ready()
    }

    fn rising_edge(&mut self) {
        self.sck_high = true;
        self.high_ns = 0;
        if !self.powered {
            return;
        }
        if self.shifting.is_some() {
            self.pulses += 1;
        } else if self.polls_left == Some(0) {
            self.shifting = self.conversions.pop_front();
            self.pulses = 1;
        }
    }

    fn falling_edge(&mut self) {
        self.sck_high = false;
        if !self.powered {
            self.powered = true;
            self.power_cycles += 1;
            self.latched_pulses = 1;
            self.polls_left = None;
        }
    }

    fn elapse(&mut self, ns: u64) {
        if !self.sck_high || !self.powered {
            return;
        }
        self.high_ns += ns;
        self.max_high_ns = self.max_high_ns.max(self.high_ns);
        if self.high_ns > POWER_DOWN_NS {
            // the long high was a power down request, not a clock pulse
            if self.pulses > 24 {
                self.pulses -= 1;
            }
            self.settle();
            self.shifting = None;
            self.pulses = 0;
            self.powered = false;
        }
    }
}

pub type Shared = Rc<RefCell<Chip>>;

pub struct Sck(Shared);
pub struct Dt(Shared);
pub struct Delay(Shared);

impl ErrorType for Sck {
    type Error = Fault;
}

impl ErrorType for Dt {
    type Error = Fault;
}

impl OutputPin for Sck {
    fn set_low(&mut self) -> Result<(), Fault> {
        let mut chip = self.0.borrow_mut();
        if chip.fail_sck {
            return Err(Fault);
        }
        chip.falling_edge();
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Fault> {
        let mut chip = self.0.borrow_mut();
        if chip.fail_sck {
            return Err(Fault);
        }
        if !chip.sck_high {
            chip.rising_edge();
        }
        Ok(())
    }
}

impl InputPin for Dt {
    fn is_high(&mut self) -> Result<bool, Fault> {
        let mut chip = self.0.borrow_mut();
        if chip.fail_dt || (chip.fail_dt_in_frame && chip.sck_high) {
            return Err(Fault);
        }
        Ok(chip.dout_high())
    }

    fn is_low(&mut self) -> Result<bool, Fault> {
        self.is_high().map(|high| !high)
    }
}

impl DelayNs for Delay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.borrow_mut().elapse(u64::from(ns));
    }
}

pub fn simulated(chip: Chip) -> (Shared, Sck, Dt, Delay) {
    let chip = Rc::new(RefCell::new(chip));
    (
        chip.clone(),
        Sck(chip.clone()),
        Dt(chip.clone()),
        Delay(chip),
    )
}
