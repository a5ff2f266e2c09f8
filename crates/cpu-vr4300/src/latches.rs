//! Pipeline latches: the records between adjacent pipeline stages.
//!
//! Each latch holds the output of the earlier stage for the next cycle.
//! The driver advances stages in reverse order, so every stage reads its
//! upstream latch as left by the *previous* cycle without any double
//! buffering.

use crate::bus::AccessSize;
use crate::instruction::Instruction;

/// Which dispatch table EX indexes.
///
/// A fetched word of zero selects the NOP table; everything else the real
/// opcode table. Selecting by table instead of branching keeps the EX hot
/// path a plain double-indexed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchTarget {
    /// The 64-entry table of no-op handlers.
    #[default]
    Nop,
    /// The real primary opcode table.
    Op,
}

/// A register-file destination for a pipeline effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dest {
    /// General-purpose register.
    Gpr(u8),
    /// Coprocessor 0 register.
    Cp0(u8),
}

/// The pending effect of an instruction, produced by EX.
///
/// Every handler assigns exactly one of these. `Bypass` and `DirectPc`
/// have already taken effect during EX (register forwarding / PC update)
/// and exist only so the latch records what happened; DC and WB ignore
/// them. `Store` and `LateLoad` are the two effects with work left to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Effect {
    /// Nothing pending (NOP, not-taken branch, trap predicate not met).
    #[default]
    None,
    /// Register write already applied in EX via the bypass network.
    Bypass {
        /// Where the value went.
        dest: Dest,
        /// The forwarded value.
        value: u64,
    },
    /// PC rewrite already applied in EX (branch/jump).
    DirectPc {
        /// The new PC.
        target: u64,
    },
    /// Memory store, translated in EX, written through the bus in WB.
    Store {
        /// Physical address.
        paddr: u32,
        /// Cache attribute from translation (carried, never consulted).
        cached: bool,
        /// Value, low `size` bytes significant.
        value: u64,
        /// Store width.
        size: AccessSize,
    },
    /// Register load: DC translates, reads memory and extends to 64 bits.
    LateLoad {
        /// Destination register.
        dest: Dest,
        /// Untranslated effective address.
        vaddr: u32,
        /// Load width.
        size: AccessSize,
        /// Sign-extend the loaded value instead of zero-extending.
        sign_extend: bool,
    },
}

/// The finalized effect after DC, consumed by WB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Commit {
    /// Nothing to write back.
    #[default]
    None,
    /// Memory store write-through.
    Store {
        paddr: u32,
        cached: bool,
        value: u64,
        size: AccessSize,
    },
    /// Register write (a completed load).
    Register { dest: Dest, value: u64 },
}

/// IC → RF latch: the fetched instruction word.
#[derive(Debug, Clone, Copy, Default)]
pub struct IcRf {
    /// The word fetched at the old PC.
    pub instruction: Instruction,
}

/// RF → EX latch: the instruction plus prefetched operands.
#[derive(Debug, Clone, Copy, Default)]
pub struct RfEx {
    /// The instruction being issued.
    pub instruction: Instruction,
    /// Dispatch table selector (NOP table iff the word was zero).
    pub target: DispatchTarget,
    /// Primary opcode, forced to zero alongside a NOP target.
    pub op: u8,
    /// Value of GPR[rs] read during RF.
    pub rs_value: u64,
    /// Value of GPR[rt] read during RF.
    pub rt_value: u64,
    /// Index the rs value came from.
    pub rs_index: u8,
    /// Index the rt value came from.
    pub rt_index: u8,
}

/// EX → DC latch: the pending effect.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExDc {
    /// Effect produced by the handler.
    pub effect: Effect,
}

/// DC → WB latch: the finalized effect.
#[derive(Debug, Clone, Copy, Default)]
pub struct DcWb {
    /// What WB must commit.
    pub commit: Commit,
}
