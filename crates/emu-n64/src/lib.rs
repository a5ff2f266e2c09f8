//! Nintendo 64 emulator core.
//!
//! Composes the VR4300 CPU (`cpu-vr4300`) with the system bus: RDRAM,
//! cartridge ROM, PIF, SP memory and the memory-mapped register blocks.
//! The RCP proper is stubbed: its registers latch, and the two cells the
//! boot path actually drives (framebuffer origin, pixel format) are
//! published for the host's blitter.

pub mod addresses;
mod bus;
mod cartridge;
mod n64;
mod rcp;

pub use bus::N64Bus;
pub use cartridge::{Rom, RomError};
pub use n64::{FB_HEIGHT, FB_WIDTH, N64, N64Error};
pub use rcp::{PixelFormat, Rcp};
