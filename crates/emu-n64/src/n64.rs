//! Top-level N64 system.
//!
//! The VR4300 runs at 93.75 MHz. One `step()` is one CPU pipeline cycle;
//! the host blits the framebuffer between batches of cycles, reading the
//! RCP cells the VI register stores published.

use std::path::Path;

use emu_core::{MasterClock, Observable, Tickable, Value};

use cpu_vr4300::{Exception, Vr4300};
use thiserror::Error;

use crate::bus::N64Bus;
use crate::cartridge::{Rom, RomError};
use crate::rcp::PixelFormat;

/// CPU crystal frequency.
const CRYSTAL_HZ: u64 = 93_750_000;

/// Nominal refresh rate used for frame-sized batches of cycles.
const REFRESH_HZ: u64 = 60;

/// Framebuffer dimensions the boot path configures.
pub const FB_WIDTH: usize = 320;
pub const FB_HEIGHT: usize = 240;

/// Failure to bring up the system.
#[derive(Debug, Error)]
pub enum N64Error {
    #[error(transparent)]
    Rom(#[from] RomError),

    #[error("CPU fault during reset: {0}")]
    Cpu(#[from] Exception),
}

/// N64 system: the CPU plus everything on its bus.
pub struct N64 {
    cpu: Vr4300,
    bus: N64Bus,
    clock: MasterClock,
    /// Retired pipeline cycles since power-on.
    cycle_count: u64,
}

impl Default for N64 {
    fn default() -> Self {
        Self::new()
    }
}

impl N64 {
    /// Create a powered-on system with no cartridge. The pipeline stays
    /// unprimed until a cartridge is inserted.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cpu: Vr4300::new(),
            bus: N64Bus::new(),
            clock: MasterClock::new(CRYSTAL_HZ),
            cycle_count: 0,
        }
    }

    /// Load a cartridge from disk and reset.
    pub fn load_cartridge<P: AsRef<Path>>(&mut self, path: P) -> Result<(), N64Error> {
        self.insert_cartridge(Rom::from_file(path)?)
    }

    /// Insert an already-loaded cartridge and reset.
    pub fn insert_cartridge(&mut self, rom: Rom) -> Result<(), N64Error> {
        self.bus.load_rom(rom.into_data());
        self.reset()?;
        Ok(())
    }

    /// Reset: clear the bus's volatile state, zero the CPU and re-prime the
    /// pipeline if a cartridge is mapped.
    pub fn reset(&mut self) -> Result<(), Exception> {
        self.bus.reset();
        self.cycle_count = 0;
        self.cpu.reset(&mut self.bus)
    }

    /// Advance one CPU pipeline cycle.
    pub fn step(&mut self) -> Result<(), Exception> {
        let result = self.cpu.cycle(&mut self.bus);
        if result.is_ok() {
            self.cycle_count += 1;
        }
        result
    }

    /// Run one frame's worth of cycles, stopping early on a CPU fault.
    /// Returns the number of cycles retired.
    pub fn run_frame(&mut self) -> Result<u64, Exception> {
        let frame_ticks = self.clock.ticks_per_frame(REFRESH_HZ).get();
        for retired in 0..frame_ticks {
            if let Err(cause) = self.step() {
                log::error!("CPU halted after {retired} cycles: {cause}");
                return Err(cause);
            }
        }
        Ok(frame_ticks)
    }

    /// The published framebuffer, once boot code has configured VI_ORIGIN.
    ///
    /// Returns the RDRAM window for a 320x240 image in the selected pixel
    /// format; `None` until an origin is published or if the window would
    /// run past RDRAM.
    #[must_use]
    pub fn framebuffer(&self) -> Option<&[u8]> {
        let origin = self.bus.rcp.framebuffer_origin? as usize;
        let len = FB_WIDTH * FB_HEIGHT * self.bus.rcp.pixel_format.bytes_per_pixel();
        self.bus.rdram.get(origin..origin + len)
    }

    /// Pixel format selected through VI_CTRL.
    #[must_use]
    pub fn pixel_format(&self) -> PixelFormat {
        self.bus.rcp.pixel_format
    }

    /// Reference to the CPU.
    #[must_use]
    pub fn cpu(&self) -> &Vr4300 {
        &self.cpu
    }

    /// Mutable reference to the CPU.
    pub fn cpu_mut(&mut self) -> &mut Vr4300 {
        &mut self.cpu
    }

    /// Reference to the bus.
    #[must_use]
    pub fn bus(&self) -> &N64Bus {
        &self.bus
    }

    /// Mutable reference to the bus.
    pub fn bus_mut(&mut self) -> &mut N64Bus {
        &mut self.bus
    }

    /// Retired pipeline cycles since the last reset.
    #[must_use]
    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    /// The CPU master clock.
    #[must_use]
    pub fn clock(&self) -> MasterClock {
        self.clock
    }
}

impl Tickable for N64 {
    fn tick(&mut self) {
        // A halted CPU stays halted; the diagnostic is available through
        // `cpu().halt_cause()`.
        if !self.cpu.is_halted() {
            let _ = self.step();
        }
    }
}

impl Observable for N64 {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("cpu.") {
            return self.cpu.query(rest);
        }
        match path {
            "cycles" => Some(Value::U64(self.cycle_count)),
            "framebuffer_origin" => self
                .bus
                .rcp
                .framebuffer_origin
                .map(Value::U32),
            "pixel_format" => Some(Value::String(format!("{:?}", self.bus.rcp.pixel_format))),
            _ => self.cpu.query(path),
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "cpu.<vr4300_paths>",
            "cycles",
            "framebuffer_origin",
            "pixel_format",
        ]
    }
}
