//! Shared traits and types for the emulator workspace.
//!
//! Two concerns live here: the single master time base every component
//! derives its rate from, and the read-only state inspection surface.

mod observable;
mod timing;

pub use observable::{Observable, Value};
pub use timing::{MasterClock, Tickable, Ticks};
