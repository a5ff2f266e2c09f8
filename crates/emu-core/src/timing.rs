//! The emulator's single time base.
//!
//! One crystal drives everything: `MasterClock` names its frequency,
//! `Ticks` counts its cycles, and `Tickable` is implemented by anything
//! that does work as it advances. There is no second clock domain to
//! reconcile; components that run slower divide the master rate.

/// A count of master clock ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ticks(u64);

impl Ticks {
    #[must_use]
    pub const fn new(count: u64) -> Self {
        Self(count)
    }

    /// The raw tick count.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// The crystal a system derives all timing from.
#[derive(Debug, Clone, Copy)]
pub struct MasterClock {
    frequency_hz: u64,
}

impl MasterClock {
    #[must_use]
    pub const fn new(frequency_hz: u64) -> Self {
        Self { frequency_hz }
    }

    /// Crystal frequency in Hz.
    #[must_use]
    pub const fn frequency_hz(self) -> u64 {
        self.frequency_hz
    }

    /// Whole ticks in one frame at the given refresh rate.
    #[must_use]
    pub const fn ticks_per_frame(self, frames_per_second: u64) -> Ticks {
        Ticks::new(self.frequency_hz / frames_per_second)
    }
}

/// A component advanced by master clock ticks.
pub trait Tickable {
    /// Advance by one tick.
    fn tick(&mut self);

    /// Advance by `count` ticks.
    ///
    /// Override only when a batch can be computed faster without changing
    /// the per-tick results.
    fn tick_n(&mut self, count: Ticks) {
        for _ in 0..count.get() {
            self.tick();
        }
    }
}
