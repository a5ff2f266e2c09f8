//! MIPS III instruction handlers.
//!
//! Every handler runs during EX against the RF/EX latch and assigns exactly
//! one pipeline effect: nothing, a bypassed register write (applied here,
//! never re-applied in WB), a memory store (applied in WB), a late register
//! load (applied in DC), or a direct PC update. Handlers never touch the
//! bus: loads record their effective address for DC, stores translate and
//! latch the physical address for WB.
//!
//! By the time a handler runs, the PC has already advanced 8 bytes past the
//! instruction's own address (its fetch plus the delay slot's fetch), which
//! is why branch targets subtract 4 and jump-and-link saves `pc` as-is.

use crate::bus::AccessSize;
use crate::exception::Exception;
use crate::latches::{Dest, Effect};
use crate::cpu::Vr4300;
use crate::registers::OperatingMode;

/// Sign-extend a 16-bit immediate to 64 bits.
const fn sext16(imm: u16) -> u64 {
    imm as i16 as i64 as u64
}

/// Sign-extend a 32-bit word to 64 bits.
const fn sext32(word: u32) -> u64 {
    word as i32 as i64 as u64
}

/// Declare handlers for opcodes that are recognised but refuse to execute.
macro_rules! unimplemented_ops {
    ($($name:ident => $mnemonic:literal),* $(,)?) => {
        $(
            pub(crate) fn $name(&mut self) -> Result<(), Exception> {
                Err(Exception::NotImplemented {
                    opcode: $mnemonic,
                    pc: self.instr_pc(),
                })
            }
        )*
    };
}

impl Vr4300 {
    // =========================================================================
    // ALU immediate
    // =========================================================================

    /// ADDI: 32-bit signed add of rs and the sign-extended immediate.
    /// Raises `IntegerOverflow` on two's-complement overflow at bit 31;
    /// rt is untouched in that case.
    pub(crate) fn op_addi(&mut self) -> Result<(), Exception> {
        let imm = self.rfex.instruction.immediate() as i16 as i32;
        let (result, overflow) = (self.rfex.rs_value as i32).overflowing_add(imm);
        if overflow {
            return Err(Exception::IntegerOverflow);
        }
        self.bypass(Dest::Gpr(self.rfex.instruction.rt()), sext32(result as u32));
        Ok(())
    }

    /// ADDIU: as ADDI without the overflow exception.
    pub(crate) fn op_addiu(&mut self) -> Result<(), Exception> {
        let imm = self.rfex.instruction.immediate() as i16 as i32;
        let result = (self.rfex.rs_value as i32).wrapping_add(imm);
        self.bypass(Dest::Gpr(self.rfex.instruction.rt()), sext32(result as u32));
        Ok(())
    }

    /// DADDI: 64-bit signed add, overflow at bit 63.
    pub(crate) fn op_daddi(&mut self) -> Result<(), Exception> {
        let imm = self.rfex.instruction.immediate() as i16 as i64;
        let (result, overflow) = (self.rfex.rs_value as i64).overflowing_add(imm);
        if overflow {
            return Err(Exception::IntegerOverflow);
        }
        self.bypass(Dest::Gpr(self.rfex.instruction.rt()), result as u64);
        Ok(())
    }

    /// DADDIU: as DADDI without the overflow exception.
    pub(crate) fn op_daddiu(&mut self) -> Result<(), Exception> {
        let imm = self.rfex.instruction.immediate() as i16 as i64;
        let result = (self.rfex.rs_value as i64).wrapping_add(imm);
        self.bypass(Dest::Gpr(self.rfex.instruction.rt()), result as u64);
        Ok(())
    }

    /// ANDI: zero-extended immediate.
    pub(crate) fn op_andi(&mut self) -> Result<(), Exception> {
        let imm = u64::from(self.rfex.instruction.immediate());
        self.bypass(
            Dest::Gpr(self.rfex.instruction.rt()),
            self.rfex.rs_value & imm,
        );
        Ok(())
    }

    /// ORI: zero-extended immediate.
    pub(crate) fn op_ori(&mut self) -> Result<(), Exception> {
        let imm = u64::from(self.rfex.instruction.immediate());
        self.bypass(
            Dest::Gpr(self.rfex.instruction.rt()),
            self.rfex.rs_value | imm,
        );
        Ok(())
    }

    /// XORI: zero-extended immediate.
    pub(crate) fn op_xori(&mut self) -> Result<(), Exception> {
        let imm = u64::from(self.rfex.instruction.immediate());
        self.bypass(
            Dest::Gpr(self.rfex.instruction.rt()),
            self.rfex.rs_value ^ imm,
        );
        Ok(())
    }

    /// LUI: immediate into bits 31..16, then sign-extend the word.
    pub(crate) fn op_lui(&mut self) -> Result<(), Exception> {
        let word = u32::from(self.rfex.instruction.immediate()) << 16;
        self.bypass(Dest::Gpr(self.rfex.instruction.rt()), sext32(word));
        Ok(())
    }

    /// SLTI: signed compare against the sign-extended immediate.
    pub(crate) fn op_slti(&mut self) -> Result<(), Exception> {
        let imm = self.rfex.instruction.immediate() as i16 as i64;
        let result = u64::from((self.rfex.rs_value as i64) < imm);
        self.bypass(Dest::Gpr(self.rfex.instruction.rt()), result);
        Ok(())
    }

    /// SLTIU: unsigned compare against the sign-extended immediate.
    pub(crate) fn op_sltiu(&mut self) -> Result<(), Exception> {
        let imm = sext16(self.rfex.instruction.immediate());
        let result = u64::from(self.rfex.rs_value < imm);
        self.bypass(Dest::Gpr(self.rfex.instruction.rt()), result);
        Ok(())
    }

    // =========================================================================
    // SPECIAL: register ALU
    // =========================================================================

    /// ADD: 32-bit signed add, overflow at bit 31. rd untouched on overflow.
    pub(crate) fn sp_add(&mut self) -> Result<(), Exception> {
        let (result, overflow) =
            (self.rfex.rs_value as i32).overflowing_add(self.rfex.rt_value as i32);
        if overflow {
            return Err(Exception::IntegerOverflow);
        }
        self.bypass(Dest::Gpr(self.rfex.instruction.rd()), sext32(result as u32));
        Ok(())
    }

    /// ADDU: as ADD without the overflow exception.
    pub(crate) fn sp_addu(&mut self) -> Result<(), Exception> {
        let result = (self.rfex.rs_value as i32).wrapping_add(self.rfex.rt_value as i32);
        self.bypass(Dest::Gpr(self.rfex.instruction.rd()), sext32(result as u32));
        Ok(())
    }

    /// SUB: 32-bit signed subtract, overflow at bit 31.
    pub(crate) fn sp_sub(&mut self) -> Result<(), Exception> {
        let (result, overflow) =
            (self.rfex.rs_value as i32).overflowing_sub(self.rfex.rt_value as i32);
        if overflow {
            return Err(Exception::IntegerOverflow);
        }
        self.bypass(Dest::Gpr(self.rfex.instruction.rd()), sext32(result as u32));
        Ok(())
    }

    /// SUBU: as SUB without the overflow exception.
    pub(crate) fn sp_subu(&mut self) -> Result<(), Exception> {
        let result = (self.rfex.rs_value as i32).wrapping_sub(self.rfex.rt_value as i32);
        self.bypass(Dest::Gpr(self.rfex.instruction.rd()), sext32(result as u32));
        Ok(())
    }

    pub(crate) fn sp_and(&mut self) -> Result<(), Exception> {
        self.bypass(
            Dest::Gpr(self.rfex.instruction.rd()),
            self.rfex.rs_value & self.rfex.rt_value,
        );
        Ok(())
    }

    pub(crate) fn sp_or(&mut self) -> Result<(), Exception> {
        self.bypass(
            Dest::Gpr(self.rfex.instruction.rd()),
            self.rfex.rs_value | self.rfex.rt_value,
        );
        Ok(())
    }

    pub(crate) fn sp_xor(&mut self) -> Result<(), Exception> {
        self.bypass(
            Dest::Gpr(self.rfex.instruction.rd()),
            self.rfex.rs_value ^ self.rfex.rt_value,
        );
        Ok(())
    }

    pub(crate) fn sp_nor(&mut self) -> Result<(), Exception> {
        self.bypass(
            Dest::Gpr(self.rfex.instruction.rd()),
            !(self.rfex.rs_value | self.rfex.rt_value),
        );
        Ok(())
    }

    /// SLT: signed 64-bit compare.
    pub(crate) fn sp_slt(&mut self) -> Result<(), Exception> {
        let result = u64::from((self.rfex.rs_value as i64) < (self.rfex.rt_value as i64));
        self.bypass(Dest::Gpr(self.rfex.instruction.rd()), result);
        Ok(())
    }

    /// SLTU: unsigned 64-bit compare.
    pub(crate) fn sp_sltu(&mut self) -> Result<(), Exception> {
        let result = u64::from(self.rfex.rs_value < self.rfex.rt_value);
        self.bypass(Dest::Gpr(self.rfex.instruction.rd()), result);
        Ok(())
    }

    // =========================================================================
    // SPECIAL: shifts
    // =========================================================================

    /// SLL: word shift left by sa, result sign-extended.
    pub(crate) fn sp_sll(&mut self) -> Result<(), Exception> {
        let word = (self.rfex.rt_value as u32) << self.rfex.instruction.sa();
        self.bypass(Dest::Gpr(self.rfex.instruction.rd()), sext32(word));
        Ok(())
    }

    /// SRL: word logical shift right by sa, result sign-extended.
    pub(crate) fn sp_srl(&mut self) -> Result<(), Exception> {
        let word = (self.rfex.rt_value as u32) >> self.rfex.instruction.sa();
        self.bypass(Dest::Gpr(self.rfex.instruction.rd()), sext32(word));
        Ok(())
    }

    /// SRA: arithmetic shift of the full register, truncated to a word and
    /// sign-extended. Identical to a word-wide SRA for canonical inputs.
    pub(crate) fn sp_sra(&mut self) -> Result<(), Exception> {
        let word = ((self.rfex.rt_value as i64) >> self.rfex.instruction.sa()) as u32;
        self.bypass(Dest::Gpr(self.rfex.instruction.rd()), sext32(word));
        Ok(())
    }

    /// SLLV: word shift left by the low 5 bits of rs.
    pub(crate) fn sp_sllv(&mut self) -> Result<(), Exception> {
        let amount = (self.rfex.rs_value & 0x1F) as u32;
        let word = (self.rfex.rt_value as u32) << amount;
        self.bypass(Dest::Gpr(self.rfex.instruction.rd()), sext32(word));
        Ok(())
    }

    /// SRLV: word logical shift right by the low 5 bits of rs.
    pub(crate) fn sp_srlv(&mut self) -> Result<(), Exception> {
        let amount = (self.rfex.rs_value & 0x1F) as u32;
        let word = (self.rfex.rt_value as u32) >> amount;
        self.bypass(Dest::Gpr(self.rfex.instruction.rd()), sext32(word));
        Ok(())
    }

    /// SRAV: arithmetic shift right by the low 5 bits of rs.
    pub(crate) fn sp_srav(&mut self) -> Result<(), Exception> {
        let amount = self.rfex.rs_value & 0x1F;
        let word = ((self.rfex.rt_value as i64) >> amount) as u32;
        self.bypass(Dest::Gpr(self.rfex.instruction.rd()), sext32(word));
        Ok(())
    }

    /// DSLL: doubleword shift left by sa.
    pub(crate) fn sp_dsll(&mut self) -> Result<(), Exception> {
        let result = self.rfex.rt_value << self.rfex.instruction.sa();
        self.bypass(Dest::Gpr(self.rfex.instruction.rd()), result);
        Ok(())
    }

    /// DSLL32: doubleword shift left by sa + 32.
    pub(crate) fn sp_dsll32(&mut self) -> Result<(), Exception> {
        let result = self.rfex.rt_value << (self.rfex.instruction.sa() + 32);
        self.bypass(Dest::Gpr(self.rfex.instruction.rd()), result);
        Ok(())
    }

    /// DSLLV: doubleword shift left by the low 6 bits of rs.
    pub(crate) fn sp_dsllv(&mut self) -> Result<(), Exception> {
        let amount = self.rfex.rs_value & 0x3F;
        let result = self.rfex.rt_value << amount;
        self.bypass(Dest::Gpr(self.rfex.instruction.rd()), result);
        Ok(())
    }

    /// DSRA32: doubleword arithmetic shift right by sa + 32.
    pub(crate) fn sp_dsra32(&mut self) -> Result<(), Exception> {
        let result = (self.rfex.rt_value as i64) >> (self.rfex.instruction.sa() + 32);
        self.bypass(Dest::Gpr(self.rfex.instruction.rd()), result as u64);
        Ok(())
    }

    // =========================================================================
    // SPECIAL: jumps through registers
    // =========================================================================

    /// JR: jump to the address in rs. The target must be word-aligned.
    pub(crate) fn sp_jr(&mut self) -> Result<(), Exception> {
        let target = self.rfex.rs_value;
        if target & 0b11 != 0 {
            return Err(Exception::InstructionAddressError {
                vaddr: target as u32,
            });
        }
        self.write_pc(target);
        Ok(())
    }

    /// JALR: link into rd (31 if rd is 0), then jump through rs.
    ///
    /// The jump target comes from the RF/EX latch, so rd == rs still jumps
    /// to the pre-link value.
    pub(crate) fn sp_jalr(&mut self) -> Result<(), Exception> {
        let rd = self.rfex.instruction.rd();
        let link = if rd == 0 { 31 } else { rd };
        let return_addr = self.pc;
        self.gpr.write(usize::from(link), return_addr);
        self.sp_jr()
    }

    // =========================================================================
    // SPECIAL: trap predicates
    // =========================================================================

    /// TGE: trap if rs >= rt, signed.
    pub(crate) fn sp_tge(&mut self) -> Result<(), Exception> {
        if (self.rfex.rs_value as i64) >= (self.rfex.rt_value as i64) {
            return Err(Exception::Trap);
        }
        Ok(())
    }

    /// TGEU: trap if rs >= rt, unsigned.
    pub(crate) fn sp_tgeu(&mut self) -> Result<(), Exception> {
        if self.rfex.rs_value >= self.rfex.rt_value {
            return Err(Exception::Trap);
        }
        Ok(())
    }

    /// TLT: trap if rs < rt, signed.
    pub(crate) fn sp_tlt(&mut self) -> Result<(), Exception> {
        if (self.rfex.rs_value as i64) < (self.rfex.rt_value as i64) {
            return Err(Exception::Trap);
        }
        Ok(())
    }

    /// TLTU: trap if rs < rt, unsigned.
    pub(crate) fn sp_tltu(&mut self) -> Result<(), Exception> {
        if self.rfex.rs_value < self.rfex.rt_value {
            return Err(Exception::Trap);
        }
        Ok(())
    }

    /// TEQ: trap if rs == rt.
    pub(crate) fn sp_teq(&mut self) -> Result<(), Exception> {
        if self.rfex.rs_value == self.rfex.rt_value {
            return Err(Exception::Trap);
        }
        Ok(())
    }

    /// TNE: trap if rs != rt.
    pub(crate) fn sp_tne(&mut self) -> Result<(), Exception> {
        if self.rfex.rs_value != self.rfex.rt_value {
            return Err(Exception::Trap);
        }
        Ok(())
    }

    // =========================================================================
    // Branches
    // =========================================================================

    /// Redirect the PC to the branch target.
    ///
    /// `pc` already points two instructions past the branch; subtracting 4
    /// lands the target arithmetic on the delay-slot successor.
    fn branch_taken(&mut self) {
        let offset = (self.rfex.instruction.immediate() as i16 as i64) << 2;
        let target = self.pc.wrapping_sub(4).wrapping_add(offset as u64);
        self.write_pc(target);
    }

    /// Annul the delay slot by zeroing the fetched word in IC/RF, routing
    /// the next EX through the NOP table.
    fn annul_delay_slot(&mut self) {
        self.icrf.instruction = crate::instruction::Instruction::NOP;
    }

    pub(crate) fn op_beq(&mut self) -> Result<(), Exception> {
        if self.rfex.rs_value == self.rfex.rt_value {
            self.branch_taken();
        }
        Ok(())
    }

    pub(crate) fn op_bne(&mut self) -> Result<(), Exception> {
        if self.rfex.rs_value != self.rfex.rt_value {
            self.branch_taken();
        }
        Ok(())
    }

    /// BEQL: branch-likely, so the delay slot is annulled when not taken.
    pub(crate) fn op_beql(&mut self) -> Result<(), Exception> {
        if self.rfex.rs_value == self.rfex.rt_value {
            self.branch_taken();
        } else {
            self.annul_delay_slot();
        }
        Ok(())
    }

    pub(crate) fn op_bnel(&mut self) -> Result<(), Exception> {
        if self.rfex.rs_value != self.rfex.rt_value {
            self.branch_taken();
        } else {
            self.annul_delay_slot();
        }
        Ok(())
    }

    pub(crate) fn op_blezl(&mut self) -> Result<(), Exception> {
        if (self.rfex.rs_value as i64) <= 0 {
            self.branch_taken();
        } else {
            self.annul_delay_slot();
        }
        Ok(())
    }

    pub(crate) fn op_bgtz(&mut self) -> Result<(), Exception> {
        if (self.rfex.rs_value as i64) > 0 {
            self.branch_taken();
        }
        Ok(())
    }

    // =========================================================================
    // Jumps
    // =========================================================================

    /// J: upper 4 bits of the current PC joined with target << 2.
    pub(crate) fn op_j(&mut self) -> Result<(), Exception> {
        let target = (self.pc & 0xF000_0000) | (u64::from(self.rfex.instruction.target()) << 2);
        self.write_pc(target);
        Ok(())
    }

    /// JAL: link into GPR 31, then J. `pc` is already the return address.
    pub(crate) fn op_jal(&mut self) -> Result<(), Exception> {
        self.gpr.write(31, self.pc);
        self.op_j()
    }

    // =========================================================================
    // Loads
    // =========================================================================

    /// Common load path: compute the effective address, latch a late
    /// register write for DC, and arm the load-use interlock.
    fn load(&mut self, size: AccessSize, align_mask: u32, sign_extend: bool) -> Result<(), Exception> {
        let instr = self.rfex.instruction;
        let offset = instr.immediate() as i16 as i32 as u32;
        let vaddr = (self.rfex.rs_value as u32).wrapping_add(offset);
        if vaddr & align_mask != 0 {
            return Err(Exception::InstructionAddressError { vaddr });
        }
        self.exdc.effect = Effect::LateLoad {
            dest: Dest::Gpr(instr.rt()),
            vaddr,
            size,
            sign_extend,
        };
        self.detect_ldi();
        Ok(())
    }

    /// LB delegates to the unsigned byte load.
    pub(crate) fn op_lb(&mut self) -> Result<(), Exception> {
        self.op_lbu()
    }

    pub(crate) fn op_lbu(&mut self) -> Result<(), Exception> {
        self.load(AccessSize::Byte, 0, false)
    }

    /// LH delegates to the unsigned halfword load path via LHU.
    pub(crate) fn op_lh(&mut self) -> Result<(), Exception> {
        self.op_lhu()
    }

    pub(crate) fn op_lhu(&mut self) -> Result<(), Exception> {
        self.load(AccessSize::Half, 0b1, false)
    }

    /// LW: word load, result sign-extended to 64 bits.
    pub(crate) fn op_lw(&mut self) -> Result<(), Exception> {
        self.load(AccessSize::Word, 0b11, true)
    }

    pub(crate) fn op_lwu(&mut self) -> Result<(), Exception> {
        self.load(AccessSize::Word, 0b11, false)
    }

    /// LD: 64-bit load, legal in 64-bit mode or Kernel mode only.
    pub(crate) fn op_ld(&mut self) -> Result<(), Exception> {
        if !self.mode64 && self.opmode != OperatingMode::Kernel {
            return Err(Exception::ReservedInstruction);
        }
        self.load(AccessSize::Double, 0b111, false)
    }

    // =========================================================================
    // Stores
    // =========================================================================

    /// Common store path: compute and translate the effective address in
    /// EX, latch the physical store for WB.
    fn store(&mut self, value: u64, size: AccessSize, align_mask: u32) -> Result<(), Exception> {
        let offset = self.rfex.instruction.immediate() as i16 as i32 as u32;
        let vaddr = (self.rfex.rs_value as u32).wrapping_add(offset);
        if vaddr & align_mask != 0 {
            return Err(Exception::InstructionAddressError { vaddr });
        }
        let translated =
            crate::translate::translate_vaddr(vaddr).map_err(|_| self.tlb_miss())?;
        self.exdc.effect = Effect::Store {
            paddr: translated.paddr,
            cached: translated.cached,
            value,
            size,
        };
        Ok(())
    }

    pub(crate) fn op_sh(&mut self) -> Result<(), Exception> {
        let value = self.rfex.rt_value & 0xFFFF;
        self.store(value, AccessSize::Half, 0b1)
    }

    pub(crate) fn op_sw(&mut self) -> Result<(), Exception> {
        let value = self.rfex.rt_value & 0xFFFF_FFFF;
        self.store(value, AccessSize::Word, 0b11)
    }

    /// SD: 64-bit store, mode-gated like LD.
    pub(crate) fn op_sd(&mut self) -> Result<(), Exception> {
        if !self.mode64 && self.opmode != OperatingMode::Kernel {
            return Err(Exception::ReservedInstruction);
        }
        let value = self.rfex.rt_value;
        self.store(value, AccessSize::Double, 0b111)
    }

    // =========================================================================
    // Coprocessor 0
    // =========================================================================

    /// COP0 dispatches on the rs field: MFC0 and MTC0 are the only
    /// implemented sub-functions.
    pub(crate) fn op_cop0(&mut self) -> Result<(), Exception> {
        let instr = self.rfex.instruction;
        match instr.rs() {
            // MFC0: rt <- sign-extended low word of CP0[rd]
            0b00000 => {
                let value = sext32(self.cp0.read_word(usize::from(instr.rd())));
                self.bypass(Dest::Gpr(instr.rt()), value);
                Ok(())
            }
            // MTC0: CP0[rt] <- sign-extended low word of GPR[rd]
            0b00100 => {
                let value = sext32(self.gpr.read_word(usize::from(instr.rd())));
                self.bypass(Dest::Cp0(instr.rt()), value);
                Ok(())
            }
            _ => Err(Exception::NotImplemented {
                opcode: "COP0",
                pc: self.instr_pc(),
            }),
        }
    }

    // =========================================================================
    // NOP and the unimplemented remainder
    // =========================================================================

    /// NOP: retire with no effect. Also fills every NOP-table slot.
    pub(crate) fn op_nop(&mut self) -> Result<(), Exception> {
        Ok(())
    }

    unimplemented_ops! {
        op_regimm => "REGIMM",
        op_blez => "BLEZ",
        op_bgtzl => "BGTZL",
        op_cop1 => "COP1",
        op_cop2 => "COP2",
        op_ldl => "LDL",
        op_ldr => "LDR",
        op_lwl => "LWL",
        op_lwr => "LWR",
        op_sb => "SB",
        op_swl => "SWL",
        op_swr => "SWR",
        op_sdl => "SDL",
        op_sdr => "SDR",
        op_cache => "CACHE",
        op_ll => "LL",
        op_lwc1 => "LWC1",
        op_lwc2 => "LWC2",
        op_lld => "LLD",
        op_ldc1 => "LDC1",
        op_ldc2 => "LDC2",
        op_sc => "SC",
        op_swc1 => "SWC1",
        op_swc2 => "SWC2",
        op_scd => "SCD",
        op_sdc1 => "SDC1",
        op_sdc2 => "SDC2",
        op_reserved => "RESERVED",
        sp_syscall => "SYSCALL",
        sp_break => "BREAK",
        sp_sync => "SYNC",
        sp_mfhi => "MFHI",
        sp_mthi => "MTHI",
        sp_mflo => "MFLO",
        sp_mtlo => "MTLO",
        sp_dsrlv => "DSRLV",
        sp_dsrav => "DSRAV",
        sp_mult => "MULT",
        sp_multu => "MULTU",
        sp_div => "DIV",
        sp_divu => "DIVU",
        sp_dmult => "DMULT",
        sp_dmultu => "DMULTU",
        sp_ddiv => "DDIV",
        sp_ddivu => "DDIVU",
        sp_dadd => "DADD",
        sp_daddu => "DADDU",
        sp_dsub => "DSUB",
        sp_dsubu => "DSUBU",
        sp_dsrl => "DSRL",
        sp_dsra => "DSRA",
        sp_dsrl32 => "DSRL32",
        sp_reserved => "SPECIAL-RESERVED",
    }
}
