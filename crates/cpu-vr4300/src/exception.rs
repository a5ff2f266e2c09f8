//! CPU exception taxonomy.
//!
//! These surface from `Vr4300::cycle` when an instruction cannot retire.
//! They are host-facing diagnostics, not emulated CP0 exception delivery:
//! the core halts, and the caller decides what to report.

use thiserror::Error;

/// An execution failure raised by an instruction handler.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    /// Two's-complement overflow in ADD/ADDI/SUB/DADD/DADDI/DSUB.
    /// The destination register is left unmodified.
    #[error("integer overflow")]
    IntegerOverflow,

    /// Misaligned memory operand or misaligned jump target.
    #[error("address error at virtual address {vaddr:#010X}")]
    InstructionAddressError {
        /// The offending virtual address.
        vaddr: u32,
    },

    /// A 64-bit operation executed in 32-bit User or Supervisor mode.
    #[error("reserved instruction")]
    ReservedInstruction,

    /// An architectural trap predicate (TGE/TGEU/TLT/TLTU/TEQ/TNE) held.
    #[error("trap")]
    Trap,

    /// Decoded but unimplemented: the opcode is recognised and refuses to
    /// execute silently. `pc` is the address of the offending instruction.
    #[error("unimplemented opcode {opcode} at pc {pc:#018X}")]
    NotImplemented {
        /// Symbolic opcode name.
        opcode: &'static str,
        /// Address of the instruction that decoded to this opcode.
        pc: u64,
    },
}
