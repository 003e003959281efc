//! Ephemeral source-port selection.
//!
//! Port selection is an injectable capability rather than inline stack state
//! so tests can pin it down deterministically.

use std::ops::RangeInclusive;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// The IANA dynamic/private port range.
pub const EPHEMERAL_RANGE: RangeInclusive<u16> = 49152..=65535;

pub trait PortSource {
    fn next_port(&mut self) -> u16;
}

impl<F: FnMut() -> u16> PortSource for F {
    fn next_port(&mut self) -> u16 {
        self()
    }
}

/// Uniformly random ports from a fixed range.
#[derive(Debug)]
pub struct RandomPorts {
    range: RangeInclusive<u16>,
    rng: SmallRng,
}

impl RandomPorts {
    pub fn new(range: RangeInclusive<u16>) -> Self {
        Self {
            range,
            rng: SmallRng::from_entropy(),
        }
    }

    /// Deterministic variant for tests.
    pub fn seeded(range: RangeInclusive<u16>, seed: u64) -> Self {
        Self {
            range,
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomPorts {
    fn default() -> Self {
        Self::new(EPHEMERAL_RANGE)
    }
}

impl PortSource for RandomPorts {
    fn next_port(&mut self) -> u16 {
        self.rng.gen_range(self.range.clone())
    }
}
