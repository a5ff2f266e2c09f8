//! Pipeline-level tests for VR4300 instruction behavior.
//!
//! Programs are hand-assembled into a flat test bus and run for a fixed
//! number of cycles. The fresh pipeline issues NOPs from the empty latches,
//! so instruction k reaches EX at cycle k + 3 and everything settles well
//! within the generous cycle counts used here.

use cpu_vr4300::{AccessSize, Exception, SystemBus, Vr4300};

/// Flat test bus: RAM at physical 0, a boot ROM window at the PIF base.
struct TestBus {
    ram: Vec<u8>,
    boot: Vec<u8>,
}

const BOOT_BASE: u32 = 0x1FC0_0000;

impl TestBus {
    fn new() -> Self {
        Self {
            ram: vec![0; 64 * 1024],
            boot: vec![0; 4 * 1024],
        }
    }

    /// Place a program at the start of RAM (kseg1 0xA000_0000).
    fn with_program(words: &[u32]) -> Self {
        let mut bus = Self::new();
        for (i, word) in words.iter().enumerate() {
            bus.ram[i * 4..i * 4 + 4].copy_from_slice(&word.to_be_bytes());
        }
        bus
    }

    /// Place a program at the boot vector.
    fn with_boot_program(words: &[u32]) -> Self {
        let mut bus = Self::new();
        for (i, word) in words.iter().enumerate() {
            bus.boot[i * 4..i * 4 + 4].copy_from_slice(&word.to_be_bytes());
        }
        bus
    }

    fn region(&mut self, paddr: u32) -> Option<(&mut Vec<u8>, usize)> {
        if (paddr as usize) < self.ram.len() {
            Some((&mut self.ram, paddr as usize))
        } else if paddr >= BOOT_BASE && ((paddr - BOOT_BASE) as usize) < self.boot.len() {
            Some((&mut self.boot, (paddr - BOOT_BASE) as usize))
        } else {
            None
        }
    }
}

impl SystemBus for TestBus {
    fn read(&mut self, paddr: u32, size: AccessSize) -> u64 {
        let n = size.bytes();
        match self.region(paddr) {
            Some((mem, offset)) if offset + n <= mem.len() => {
                let mut buf = [0u8; 8];
                buf[8 - n..].copy_from_slice(&mem[offset..offset + n]);
                u64::from_be_bytes(buf)
            }
            _ => 0,
        }
    }

    fn write(&mut self, paddr: u32, value: u64, size: AccessSize) {
        let n = size.bytes();
        let bytes = value.to_be_bytes();
        if let Some((mem, offset)) = self.region(paddr)
            && offset + n <= mem.len()
        {
            mem[offset..offset + n].copy_from_slice(&bytes[8 - n..]);
        }
    }
}

// ---------------------------------------------------------------------------
// Encoding helpers
// ---------------------------------------------------------------------------

fn itype(op: u32, rs: u32, rt: u32, imm: u16) -> u32 {
    op << 26 | rs << 21 | rt << 16 | u32::from(imm)
}

fn rtype(rs: u32, rt: u32, rd: u32, sa: u32, funct: u32) -> u32 {
    rs << 21 | rt << 16 | rd << 11 | sa << 6 | funct
}

fn lui(rt: u32, imm: u16) -> u32 {
    itype(0x0F, 0, rt, imm)
}

fn ori(rt: u32, rs: u32, imm: u16) -> u32 {
    itype(0x0D, rs, rt, imm)
}

fn addi(rt: u32, rs: u32, imm: u16) -> u32 {
    itype(0x08, rs, rt, imm)
}

fn addiu(rt: u32, rs: u32, imm: u16) -> u32 {
    itype(0x09, rs, rt, imm)
}

fn lw(rt: u32, base: u32, offset: u16) -> u32 {
    itype(0x23, base, rt, offset)
}

fn sw(rt: u32, base: u32, offset: u16) -> u32 {
    itype(0x2B, base, rt, offset)
}

fn sh(rt: u32, base: u32, offset: u16) -> u32 {
    itype(0x29, base, rt, offset)
}

fn beql(rs: u32, rt: u32, offset: i16) -> u32 {
    itype(0x14, rs, rt, offset as u16)
}

fn bne(rs: u32, rt: u32, offset: i16) -> u32 {
    itype(0x05, rs, rt, offset as u16)
}

fn j(target: u32) -> u32 {
    0x02 << 26 | (target >> 2)
}

fn jal(target: u32) -> u32 {
    0x03 << 26 | (target >> 2)
}

fn jr(rs: u32) -> u32 {
    rtype(rs, 0, 0, 0, 0x08)
}

fn sll(rd: u32, rt: u32, sa: u32) -> u32 {
    rtype(0, rt, rd, sa, 0x00)
}

fn dsll32(rd: u32, rt: u32, sa: u32) -> u32 {
    rtype(0, rt, rd, sa, 0x3C)
}

fn dsra32(rd: u32, rt: u32, sa: u32) -> u32 {
    rtype(0, rt, rd, sa, 0x3F)
}

fn addu(rd: u32, rs: u32, rt: u32) -> u32 {
    rtype(rs, rt, rd, 0, 0x21)
}

fn slt(rd: u32, rs: u32, rt: u32) -> u32 {
    rtype(rs, rt, rd, 0, 0x2A)
}

fn sltu(rd: u32, rs: u32, rt: u32) -> u32 {
    rtype(rs, rt, rd, 0, 0x2B)
}

fn mult(rs: u32, rt: u32) -> u32 {
    rtype(rs, rt, 0, 0, 0x18)
}

/// MTC0: CP0[rt] <- GPR[rd].
fn mtc0(cp0_rt: u32, gpr_rd: u32) -> u32 {
    0x10 << 26 | 0b00100 << 21 | cp0_rt << 16 | gpr_rd << 11
}

/// MFC0: GPR[rt] <- CP0[rd].
fn mfc0(gpr_rt: u32, cp0_rd: u32) -> u32 {
    0x10 << 26 | gpr_rt << 16 | cp0_rd << 11
}

const NOP: u32 = 0;

/// Start execution at kseg1 RAM base without priming the pipeline; the
/// empty latches drain as NOPs over the first few cycles.
fn start(program: &[u32]) -> (Vr4300, TestBus) {
    let bus = TestBus::with_program(program);
    let mut cpu = Vr4300::new();
    cpu.pc = 0xA000_0000;
    (cpu, bus)
}

/// Run `cycles` pipeline cycles, failing the test on any CPU exception.
fn run(cpu: &mut Vr4300, bus: &mut TestBus, cycles: usize) {
    for cycle in 0..cycles {
        if let Err(cause) = cpu.cycle(bus) {
            panic!("unexpected CPU fault at cycle {cycle}: {cause}");
        }
    }
}

/// Run until the CPU halts, returning the halt cause.
fn run_to_halt(cpu: &mut Vr4300, bus: &mut TestBus, max_cycles: usize) -> Exception {
    for _ in 0..max_cycles {
        if let Err(cause) = cpu.cycle(bus) {
            return cause;
        }
    }
    panic!("CPU did not halt within {max_cycles} cycles");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn gpr_zero_stays_zero() {
    // Writes aimed at r0 must never be observable.
    let program = [
        ori(0, 0, 0xFFFF), // ORI r0, r0, 0xFFFF
        addiu(0, 0, 1),    // ADDIU r0, r0, 1
        ori(1, 0, 5),      // ORI r1, r0, 5 (reads r0 as zero)
    ];
    let (mut cpu, mut bus) = start(&program);
    for _ in 0..12 {
        cpu.cycle(&mut bus).expect("no fault");
        assert_eq!(cpu.gpr.read(0), 0, "GPR 0 nonzero after a cycle");
    }
    assert_eq!(cpu.gpr.read(1), 5);
}

#[test]
fn lui_sign_extends() {
    let program = [
        lui(1, 0x1234), // bit 31 clear: zero high half
        lui(2, 0x8000), // bit 31 set: ones high half
    ];
    let (mut cpu, mut bus) = start(&program);
    run(&mut cpu, &mut bus, 10);
    assert_eq!(cpu.gpr.read(1), 0x0000_0000_1234_0000);
    assert_eq!(cpu.gpr.read(2), 0xFFFF_FFFF_8000_0000);
}

#[test]
fn addiu_carries_into_upper_half() {
    // 0xFFFF + 1 carries into bit 16; ADDIU sign-extends its immediate, so
    // the carry source is a positive one.
    let program = [
        ori(2, 0, 0xFFFF), // r2 = 0xFFFF
        addiu(3, 2, 1),    // r3 = 0x1_0000
    ];
    let (mut cpu, mut bus) = start(&program);
    run(&mut cpu, &mut bus, 10);
    assert_eq!(cpu.gpr.read(3), 0x0001_0000);
}

#[test]
fn addiu_negative_immediate() {
    let program = [
        ori(2, 0, 0x00FF),     // r2 = 255
        addiu(3, 2, 0xFF01),   // imm sign-extends to -255: r3 = 0
        addiu(4, 0, 0x8000),   // r4 = sign-extended 0xFFFF8000
    ];
    let (mut cpu, mut bus) = start(&program);
    run(&mut cpu, &mut bus, 12);
    assert_eq!(cpu.gpr.read(3), 0);
    assert_eq!(cpu.gpr.read(4), 0xFFFF_FFFF_FFFF_8000);
}

#[test]
fn addi_overflow_halts_and_preserves_rt() {
    // r5 = 0x7FFF_FFFF, then ADDI r6, r5, 1 overflows at bit 31.
    let program = [
        lui(4, 0x7FFF),    // r4 = 0x7FFF_0000
        ori(5, 4, 0xFFFF), // r5 = 0x7FFF_FFFF
        ori(6, 0, 0x1111), // sentinel in r6
        addi(6, 5, 1),     // overflow; r6 must keep the sentinel
    ];
    let (mut cpu, mut bus) = start(&program);
    let cause = run_to_halt(&mut cpu, &mut bus, 40);
    assert_eq!(cause, Exception::IntegerOverflow);
    assert!(cpu.is_halted());
    assert_eq!(cpu.gpr.read(6), 0x1111, "rt modified despite overflow");
    // A halted core keeps reporting its diagnostic.
    assert_eq!(cpu.cycle(&mut bus), Err(Exception::IntegerOverflow));
}

#[test]
fn alu_sign_extension_property() {
    // Any 32-bit result with bit 31 set reads back with ones in 63..32.
    let program = [
        ori(1, 0, 1),      // r1 = 1
        sll(2, 1, 31),     // r2 = 0x8000_0000 sign-extended
        addu(3, 2, 1),     // r3 = 0x8000_0001 sign-extended
    ];
    let (mut cpu, mut bus) = start(&program);
    run(&mut cpu, &mut bus, 12);
    assert_eq!(cpu.gpr.read(2), 0xFFFF_FFFF_8000_0000);
    assert_eq!(cpu.gpr.read(3), 0xFFFF_FFFF_8000_0001);
}

#[test]
fn doubleword_shifts() {
    let program = [
        ori(1, 0, 1),       // r1 = 1
        dsll32(2, 1, 0),    // r2 = 1 << 32
        dsra32(3, 2, 0),    // r3 = 1
    ];
    let (mut cpu, mut bus) = start(&program);
    run(&mut cpu, &mut bus, 12);
    assert_eq!(cpu.gpr.read(2), 1u64 << 32);
    assert_eq!(cpu.gpr.read(3), 1);
}

#[test]
fn set_on_less_than() {
    let program = [
        addiu(1, 0, 0xFFFF), // r1 = -1
        ori(2, 0, 1),        // r2 = 1
        slt(3, 1, 2),        // signed: -1 < 1 -> 1
        sltu(4, 1, 2),       // unsigned: 0xFFFF..FF < 1 -> 0
    ];
    let (mut cpu, mut bus) = start(&program);
    run(&mut cpu, &mut bus, 12);
    assert_eq!(cpu.gpr.read(3), 1);
    assert_eq!(cpu.gpr.read(4), 0);
}

#[test]
fn store_load_roundtrip_sign_extends() {
    // SW 0xDEADBEEF to RDRAM, LW it back: big-endian in memory, sign-
    // extended in the register.
    let program = [
        lui(1, 0xDEAD),     // r1 = 0xFFFF_FFFF_DEAD_0000
        ori(1, 1, 0xBEEF),  // r1 = 0xFFFF_FFFF_DEAD_BEEF
        lui(2, 0xA000),     // r2 low word = 0xA000_0000 (kseg1 base)
        sw(1, 2, 0x1000),   // [0x1000] = 0xDEADBEEF
        lw(7, 2, 0x1000),   // r7 = sign-extended word
    ];
    let (mut cpu, mut bus) = start(&program);
    run(&mut cpu, &mut bus, 20);
    assert_eq!(
        &bus.ram[0x1000..0x1004],
        &[0xDE, 0xAD, 0xBE, 0xEF],
        "store must land big-endian"
    );
    assert_eq!(cpu.gpr.read(7), 0xFFFF_FFFF_DEAD_BEEF);
}

#[test]
fn store_load_roundtrip_all_sizes() {
    // SH/SW/SD each round-trip through aligned RDRAM addresses.
    let program = [
        lui(2, 0xA000),     // base
        ori(1, 0, 0xCAFE),  // r1 = 0xCAFE
        sh(1, 2, 0x100),    // halfword store
        lui(3, 0x0102),     //
        ori(3, 3, 0x0304),  // r3 = 0x0102_0304
        sw(3, 2, 0x200),    // word store
        itype(0x3F, 2, 3, 0x300), // SD r3 (Kernel mode: legal)
        itype(0x25, 2, 8, 0x100), // LHU r8
        itype(0x27, 2, 9, 0x200), // LWU r9
        itype(0x37, 2, 10, 0x300), // LD r10
    ];
    let (mut cpu, mut bus) = start(&program);
    run(&mut cpu, &mut bus, 28);
    assert_eq!(&bus.ram[0x100..0x102], &[0xCA, 0xFE]);
    assert_eq!(cpu.gpr.read(8), 0xCAFE);
    assert_eq!(cpu.gpr.read(9), 0x0102_0304);
    assert_eq!(cpu.gpr.read(10), 0x0102_0304, "doubleword round trip");
}

#[test]
fn load_use_stall_forwards_loaded_value() {
    // ADDU directly after LW reads the loaded value, not a stale zero.
    let program = [
        lui(2, 0xA000),
        ori(2, 2, 0x0100),  // r2 = 0xA000_0100
        lw(1, 2, 0),        // r1 = [0x100]
        addu(3, 1, 0),      // depends on r1, interlocked
    ];
    let mut bus = TestBus::with_program(&program);
    bus.ram[0x100..0x104].copy_from_slice(&0x1234_5678u32.to_be_bytes());
    let mut cpu = Vr4300::new();
    cpu.pc = 0xA000_0000;
    run(&mut cpu, &mut bus, 20);
    assert_eq!(cpu.gpr.read(1), 0x1234_5678);
    assert_eq!(cpu.gpr.read(3), 0x1234_5678, "stall did not forward the load");
}

#[test]
fn branch_likely_annuls_delay_slot() {
    // BEQL with a false predicate squashes its delay slot.
    let program = [
        ori(1, 0, 1),        // r1 = 1
        beql(0, 1, 4),       // r0 != r1: not taken, annul
        ori(5, 0, 0xFFFF),   // delay slot, must not retire
        ori(6, 0, 7),        // must retire
    ];
    let (mut cpu, mut bus) = start(&program);
    run(&mut cpu, &mut bus, 14);
    assert_eq!(cpu.gpr.read(5), 0, "annulled delay slot had an effect");
    assert_eq!(cpu.gpr.read(6), 7);
}

#[test]
fn branch_taken_executes_delay_slot() {
    // BNE taken: the delay slot retires, the skipped slot does not.
    let program = [
        ori(1, 0, 1),       // r1 = 1
        bne(0, 1, 2),       // taken: target = branch + 4 + 8
        ori(5, 0, 0xAA),    // delay slot, retires
        ori(6, 0, 0xBB),    // skipped
        ori(7, 0, 0xCC),    // branch target
    ];
    let (mut cpu, mut bus) = start(&program);
    run(&mut cpu, &mut bus, 14);
    assert_eq!(cpu.gpr.read(5), 0xAA, "delay slot must execute");
    assert_eq!(cpu.gpr.read(6), 0, "skipped instruction executed");
    assert_eq!(cpu.gpr.read(7), 0xCC);
}

#[test]
fn jump_combines_pc_region_and_target() {
    // J keeps the upper 4 bits of PC: from 0xA000_0xxx the target field
    // lands the jump at 0xA000_0000 | (target << 2).
    let program = [
        j(0x200),           // to 0xA000_0200
        NOP,                // delay slot
        ori(6, 0, 0xBB),    // fall-through, must be skipped
    ];
    let mut bus = TestBus::with_program(&program);
    // Landing pad at word 0x200/4 = 0x80.
    bus.ram[0x200..0x204].copy_from_slice(&ori(9, 0, 0x1234).to_be_bytes());
    let mut cpu = Vr4300::new();
    cpu.pc = 0xA000_0000;
    run(&mut cpu, &mut bus, 14);
    assert_eq!(cpu.gpr.read(9), 0x1234);
    assert_eq!(cpu.gpr.read(6), 0, "instruction after delay slot executed");
}

#[test]
fn jal_links_and_jr_returns() {
    let program = [
        jal(0x40),          // r31 = 0xA000_0008; jump to sub
        NOP,                // delay slot
        ori(10, 0, 0xAA),   // return lands here
    ];
    let mut bus = TestBus::with_program(&program);
    // Subroutine at 0x40: mark r9, JR r31, delay NOP.
    bus.ram[0x40..0x44].copy_from_slice(&ori(9, 0, 0x55).to_be_bytes());
    bus.ram[0x44..0x48].copy_from_slice(&jr(31).to_be_bytes());
    bus.ram[0x48..0x4C].copy_from_slice(&NOP.to_be_bytes());
    let mut cpu = Vr4300::new();
    cpu.pc = 0xA000_0000;
    run(&mut cpu, &mut bus, 24);
    assert_eq!(cpu.gpr.read(31), 0xA000_0008, "link register");
    assert_eq!(cpu.gpr.read(9), 0x55, "subroutine body");
    assert_eq!(cpu.gpr.read(10), 0xAA, "return target");
}

#[test]
fn jr_to_misaligned_target_faults() {
    let program = [
        ori(1, 0, 0x0102),  // not word-aligned
        jr(1),
    ];
    let (mut cpu, mut bus) = start(&program);
    let cause = run_to_halt(&mut cpu, &mut bus, 20);
    assert_eq!(cause, Exception::InstructionAddressError { vaddr: 0x0102 });
}

#[test]
fn misaligned_loads_and_stores_fault() {
    let program = [
        lui(2, 0xA000),
        lw(1, 2, 0x0002),   // word load at offset 2
    ];
    let (mut cpu, mut bus) = start(&program);
    let cause = run_to_halt(&mut cpu, &mut bus, 20);
    assert_eq!(cause, Exception::InstructionAddressError { vaddr: 0xA000_0002 });

    // SH checks the virtual address (odd -> fault).
    let program = [
        lui(2, 0xA000),
        sh(1, 2, 0x0101),
    ];
    let (mut cpu, mut bus) = start(&program);
    let cause = run_to_halt(&mut cpu, &mut bus, 20);
    assert_eq!(cause, Exception::InstructionAddressError { vaddr: 0xA000_0101 });
}

#[test]
fn store_to_unmapped_segment_reports_instruction_pc() {
    // SW through r0: the effective address 0x100 lands in kuseg, which is
    // untranslatable. The diagnostic names the store's own PC, not the
    // data address.
    let program = [
        ori(1, 0, 0x1234),
        sw(1, 0, 0x100),
    ];
    let (mut cpu, mut bus) = start(&program);
    let cause = run_to_halt(&mut cpu, &mut bus, 20);
    assert_eq!(
        cause,
        Exception::NotImplemented {
            opcode: "TLB translation",
            pc: 0xA000_0004,
        }
    );
}

#[test]
fn load_from_unmapped_segment_faults_in_dc() {
    // The load latches cleanly in EX; the translation miss surfaces when
    // DC performs the memory read.
    let program = [lw(1, 0, 0x100)];
    let (mut cpu, mut bus) = start(&program);
    let cause = run_to_halt(&mut cpu, &mut bus, 20);
    match cause {
        Exception::NotImplemented { opcode, pc } => {
            assert_eq!(opcode, "TLB translation");
            // The PC is a code address near the load, never the 0x100
            // data address.
            assert!(pc >= 0xA000_0000, "diagnostic leaked the data address: {pc:#X}");
        }
        other => panic!("expected a translation miss, got {other}"),
    }
    assert!(cpu.is_halted());
}

#[test]
fn count_compare_latches_timer_interrupt() {
    let program = [
        ori(1, 0, 20),  // r1 = 20
        mtc0(11, 1),    // COMPARE = 20
        mfc0(5, 9),     // r5 = COUNT at EX time
    ];
    let (mut cpu, mut bus) = start(&program);
    run(&mut cpu, &mut bus, 10);
    assert!(!cpu.timer_interrupt_pending(), "premature timer interrupt");
    assert!(cpu.gpr.read(5) > 0, "COUNT should be ticking");
    run(&mut cpu, &mut bus, 15);
    assert!(cpu.timer_interrupt_pending(), "COUNT met COMPARE");
    cpu.clear_timer_interrupt();
    assert!(!cpu.timer_interrupt_pending());
}

#[test]
fn unimplemented_opcode_reports_name_and_pc() {
    let program = [
        NOP,
        mult(1, 2), // MULT is decoded but refuses to execute
    ];
    let (mut cpu, mut bus) = start(&program);
    let cause = run_to_halt(&mut cpu, &mut bus, 20);
    match cause {
        Exception::NotImplemented { opcode, pc } => {
            assert_eq!(opcode, "MULT");
            assert_eq!(pc, 0xA000_0004, "diagnostic PC should name the MULT slot");
        }
        other => panic!("expected NotImplemented, got {other}"),
    }
}

#[test]
fn reset_primes_pipeline_from_boot_vector() {
    // After reset against a ready bus, IC/RF/EX/DC hold real state: the
    // first boot instruction has already passed EX.
    let program = [
        ori(1, 0, 42),
        ori(2, 0, 43),
        NOP,
        NOP,
    ];
    let mut bus = TestBus::with_boot_program(&program);
    let mut cpu = Vr4300::new();
    cpu.reset(&mut bus).expect("priming");
    assert_eq!(cpu.gpr.read(1), 42, "first instruction executes during priming");
    run(&mut cpu, &mut bus, 4);
    assert_eq!(cpu.gpr.read(2), 43);
}
