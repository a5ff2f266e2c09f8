//! The VR4300 core: register state and the five-stage pipeline driver.
//!
//! One `cycle()` call advances every stage once, in reverse order
//! (WB → DC → EX → RF → IC) so that each stage reads its upstream latch as
//! the previous cycle left it, giving real pipeline register semantics
//! without double buffering. GPR 0 is re-zeroed before every stage, so no handler
//! needs to special-case writes to it.
//!
//! The PC is pre-incremented during IC: by the time an instruction reaches
//! EX, `pc` points two slots past it. Branch arithmetic and the jump-and-
//! link return address both build on that fact.

use emu_core::{Observable, Value};

use crate::bus::{AccessSize, SystemBus};
use crate::decode;
use crate::exception::Exception;
use crate::instruction::Instruction;
use crate::latches::{Commit, DcWb, Dest, DispatchTarget, Effect, ExDc, IcRf, RfEx};
use crate::registers::{CP0_COMPARE, CP0_COUNT, OperatingMode, RegisterFile};
use crate::translate::translate_vaddr;

/// The PIF boot vector, in kseg1.
pub const BOOT_VECTOR: u64 = 0xBFC0_0000;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Normal execution.
    Running,
    /// Halted by an unrecoverable exception; the payload is the diagnostic.
    Halted(Exception),
}

/// NEC VR4300 (MIPS III) CPU core.
#[derive(Debug, Clone)]
pub struct Vr4300 {
    /// General-purpose registers.
    pub gpr: RegisterFile,
    /// Coprocessor 0 registers. Only COUNT and COMPARE have semantics.
    pub cp0: RegisterFile,
    /// Program counter. Pre-incremented during IC.
    pub pc: u64,

    // === Pipeline latches ===
    pub(crate) icrf: IcRf,
    pub(crate) rfex: RfEx,
    pub(crate) exdc: ExDc,
    pub(crate) dcwb: DcWb,

    /// Load-use interlock: set when the instruction behind a load reads the
    /// load's destination. Holds IC and RF for one cycle.
    pub(crate) ldi: bool,

    // === Mode state ===
    pub(crate) mode64: bool,
    pub(crate) opmode: OperatingMode,

    state: State,
    /// Sticky COUNT == COMPARE observable. Delivery is the host's problem.
    timer_interrupt: bool,
}

impl Default for Vr4300 {
    fn default() -> Self {
        Self::new()
    }
}

impl Vr4300 {
    /// Create a core in reset state. The pipeline is not primed until
    /// `reset` runs against a ready bus.
    #[must_use]
    pub fn new() -> Self {
        Self {
            gpr: RegisterFile::new(),
            cp0: RegisterFile::new(),
            pc: BOOT_VECTOR,
            icrf: IcRf::default(),
            rfex: RfEx::default(),
            exdc: ExDc::default(),
            dcwb: DcWb::default(),
            ldi: false,
            mode64: false,
            opmode: OperatingMode::Kernel,
            state: State::Running,
            timer_interrupt: false,
        }
    }

    /// Reset: zero the register files, return the PC to the boot vector
    /// and, if the bus can serve fetches, prime the pipeline.
    pub fn reset<B: SystemBus>(&mut self, bus: &mut B) -> Result<(), Exception> {
        self.pc = BOOT_VECTOR;
        self.ldi = false;
        self.state = State::Running;
        self.timer_interrupt = false;
        self.gpr.clear();
        self.cp0.clear();
        if bus.is_ready() {
            self.fill_pipeline(bus)?;
        }
        Ok(())
    }

    /// Cold-start the pipeline: four partial cycles, enabling one more
    /// stage each time, so IC/RF/EX/DC all hold valid state before the
    /// first full cycle.
    fn fill_pipeline<B: SystemBus>(&mut self, bus: &mut B) -> Result<(), Exception> {
        self.icrf = IcRf::default();
        self.rfex = RfEx::default();
        self.exdc = ExDc::default();
        self.dcwb = DcWb::default();
        for filled in 0..4 {
            if filled >= 3 {
                self.dc(bus)?;
            }
            if filled >= 2 {
                self.ex()?;
            }
            if filled >= 1 {
                self.rf();
            }
            self.ic(bus)?;
        }
        Ok(())
    }

    /// Advance one pipeline cycle.
    ///
    /// On failure the core is halted: the EX/DC effect has been suppressed,
    /// the diagnostic is recorded, and every further call returns it again.
    pub fn cycle<B: SystemBus>(&mut self, bus: &mut B) -> Result<(), Exception> {
        if let State::Halted(cause) = self.state {
            return Err(cause);
        }
        match self.advance(bus) {
            Ok(()) => Ok(()),
            Err(cause) => {
                self.state = State::Halted(cause);
                Err(cause)
            }
        }
    }

    fn advance<B: SystemBus>(&mut self, bus: &mut B) -> Result<(), Exception> {
        self.gpr.write(0, 0);
        self.wb(bus);
        self.gpr.write(0, 0);
        self.dc(bus)?;
        self.gpr.write(0, 0);
        self.ex()?;
        if !self.ldi {
            self.gpr.write(0, 0);
            self.rf();
            self.gpr.write(0, 0);
            self.ic(bus)?;
        }
        self.tick_count();
        Ok(())
    }

    // =========================================================================
    // Stages
    // =========================================================================

    /// IC: fetch at the current PC, then advance it.
    fn ic<B: SystemBus>(&mut self, bus: &mut B) -> Result<(), Exception> {
        let translated = translate_vaddr(self.pc as u32).map_err(|_| Exception::NotImplemented {
            opcode: "TLB translation",
            pc: self.pc,
        })?;
        self.icrf.instruction = Instruction(bus.fetch(translated.paddr));
        self.pc = self.pc.wrapping_add(4);
        Ok(())
    }

    /// RF: select the dispatch table and prefetch the operand registers.
    fn rf(&mut self) {
        let instr = self.icrf.instruction;
        if instr.is_nop() {
            self.rfex.target = DispatchTarget::Nop;
            self.rfex.op = 0;
        } else {
            self.rfex.target = DispatchTarget::Op;
            self.rfex.op = instr.op();
        }
        self.rfex.rs_index = instr.rs();
        self.rfex.rt_index = instr.rt();
        self.rfex.rs_value = self.gpr.read(usize::from(instr.rs()));
        self.rfex.rt_value = self.gpr.read(usize::from(instr.rt()));
        self.rfex.instruction = instr;
    }

    /// EX: dispatch through the two-level table. A handler failure
    /// suppresses the pending effect before surfacing.
    fn ex(&mut self) -> Result<(), Exception> {
        self.exdc.effect = Effect::None;
        let handler = decode::TABLES[self.rfex.target as usize][usize::from(self.rfex.op)];
        if let Err(cause) = handler(self) {
            self.exdc.effect = Effect::None;
            return Err(cause);
        }
        Ok(())
    }

    /// DC: complete late register loads; pass stores through.
    ///
    /// When the load-use interlock is armed, the loaded value is written
    /// early (the held RF re-reads the register file afterwards) and the
    /// interlock is released.
    fn dc<B: SystemBus>(&mut self, bus: &mut B) -> Result<(), Exception> {
        self.dcwb.commit = match self.exdc.effect {
            Effect::LateLoad {
                dest,
                vaddr,
                size,
                sign_extend,
            } => {
                let translated = translate_vaddr(vaddr).map_err(|_| self.tlb_miss())?;
                let raw = bus.read(translated.paddr, size);
                let value = if sign_extend {
                    sign_extend_sized(raw, size)
                } else {
                    raw
                };
                if self.ldi {
                    self.commit_register(dest, value);
                    self.ldi = false;
                    Commit::None
                } else {
                    Commit::Register { dest, value }
                }
            }
            Effect::Store {
                paddr,
                cached,
                value,
                size,
            } => Commit::Store {
                paddr,
                cached,
                value,
                size,
            },
            Effect::None | Effect::Bypass { .. } | Effect::DirectPc { .. } => Commit::None,
        };
        Ok(())
    }

    /// WB: commit the finalized effect.
    fn wb<B: SystemBus>(&mut self, bus: &mut B) {
        match self.dcwb.commit {
            Commit::Store {
                paddr, value, size, ..
            } => bus.write(paddr, value, size),
            Commit::Register { dest, value } => self.commit_register(dest, value),
            Commit::None => {}
        }
    }

    // =========================================================================
    // Effect plumbing
    // =========================================================================

    /// Write a register through the sized commit primitive.
    pub(crate) fn commit_register(&mut self, dest: Dest, value: u64) {
        match dest {
            Dest::Gpr(index) => self.gpr.write_masked(usize::from(index), value, AccessSize::Double),
            Dest::Cp0(index) => self.cp0.write_masked(usize::from(index), value, AccessSize::Double),
        }
    }

    /// Forward a result to its destination immediately (EX-stage bypass).
    /// WB never re-applies it.
    pub(crate) fn bypass(&mut self, dest: Dest, value: u64) {
        self.commit_register(dest, value);
        self.exdc.effect = Effect::Bypass { dest, value };
    }

    /// Redirect the PC immediately. The in-flight delay slot is unaffected;
    /// the next IC fetches from the new address.
    pub(crate) fn write_pc(&mut self, target: u64) {
        self.pc = target;
        self.exdc.effect = Effect::DirectPc { target };
    }

    /// Arm the load-use interlock if the next instruction (in IC/RF) reads
    /// this load's destination, and force the issue slot to the NOP table
    /// so EX doesn't re-issue the load during the stall.
    pub(crate) fn detect_ldi(&mut self) {
        let next = self.icrf.instruction;
        let dest = self.rfex.rt_index;
        self.ldi = next.rs() == dest || next.rt() == dest;
        self.rfex.target = DispatchTarget::Nop;
        self.rfex.op = 0;
    }

    /// Address of the instruction currently in EX (the PC is two fetches
    /// ahead of it).
    pub(crate) fn instr_pc(&self) -> u64 {
        self.pc.wrapping_sub(8)
    }

    /// Diagnostic for a data address outside the mapped kernel windows.
    /// Carries the faulting instruction's PC, not the data address.
    pub(crate) fn tlb_miss(&self) -> Exception {
        Exception::NotImplemented {
            opcode: "TLB translation",
            pc: self.instr_pc(),
        }
    }

    /// COUNT ticks once per cycle; matching COMPARE latches the timer
    /// interrupt observable.
    fn tick_count(&mut self) {
        let count = self.cp0.read(CP0_COUNT).wrapping_add(1);
        self.cp0.write(CP0_COUNT, count);
        if count as u32 == self.cp0.read_word(CP0_COMPARE) {
            self.timer_interrupt = true;
        }
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Current program counter.
    #[must_use]
    pub fn pc(&self) -> u64 {
        self.pc
    }

    /// True once an exception has halted the core.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        matches!(self.state, State::Halted(_))
    }

    /// The exception that halted the core, if any.
    #[must_use]
    pub fn halt_cause(&self) -> Option<Exception> {
        match self.state {
            State::Running => None,
            State::Halted(cause) => Some(cause),
        }
    }

    /// True once COUNT has matched COMPARE. Sticky until cleared.
    #[must_use]
    pub fn timer_interrupt_pending(&self) -> bool {
        self.timer_interrupt
    }

    /// Acknowledge the timer interrupt observable.
    pub fn clear_timer_interrupt(&mut self) {
        self.timer_interrupt = false;
    }
}

/// Sign-extend the low `size` bytes of `value` to 64 bits.
fn sign_extend_sized(value: u64, size: AccessSize) -> u64 {
    match size {
        AccessSize::Byte => value as u8 as i8 as i64 as u64,
        AccessSize::Half => value as u16 as i16 as i64 as u64,
        AccessSize::Word => value as u32 as i32 as i64 as u64,
        AccessSize::Double => value,
    }
}

impl Observable for Vr4300 {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(index) = path.strip_prefix("gpr.") {
            let index: usize = index.parse().ok()?;
            return (index < 32).then(|| Value::U64(self.gpr.read(index)));
        }
        match path {
            "pc" => Some(Value::U64(self.pc)),
            "cp0.count" => Some(Value::U64(self.cp0.read(CP0_COUNT))),
            "cp0.compare" => Some(Value::U64(self.cp0.read(CP0_COMPARE))),
            "halted" => Some(Value::Bool(self.is_halted())),
            "timer_interrupt" => Some(Value::Bool(self.timer_interrupt)),
            "ldi" => Some(Value::Bool(self.ldi)),
            // Operand registers staged for the instruction in EX.
            "issue.rs" => Some(Value::U32(u32::from(self.rfex.rs_index))),
            "issue.rt" => Some(Value::U32(u32::from(self.rfex.rt_index))),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "pc",
            "gpr.<0-31>",
            "cp0.count",
            "cp0.compare",
            "halted",
            "timer_interrupt",
            "ldi",
            "issue.rs",
            "issue.rt",
        ]
    }
}
