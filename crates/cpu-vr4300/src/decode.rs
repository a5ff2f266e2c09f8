//! Opcode dispatch tables.
//!
//! Dispatch is a two-level indirect table: `TABLES[target][op]`, where
//! `target` selects the NOP table (fetched word was zero) or the real
//! primary table. SPECIAL re-indexes a second 64-entry table by `funct`;
//! COP0 sub-dispatches on its `rs` field inside the handler. Routing the
//! zero word through a full table keeps the EX hot path branch-free and
//! lets annulled delay slots and interlock bubbles retire like any other
//! instruction.

use crate::cpu::Vr4300;
use crate::exception::Exception;

/// An instruction handler. Runs during EX against the RF/EX latch.
pub(crate) type InstrFn = fn(&mut Vr4300) -> Result<(), Exception>;

/// 64 no-op entries, selected when the fetched word is zero.
pub(crate) static NOP_TABLE: [InstrFn; 64] = [Vr4300::op_nop as InstrFn; 64];

/// Primary opcode table, indexed by bits 31..26.
pub(crate) static OPCODE_TABLE: [InstrFn; 64] = [
    Vr4300::sp_dispatch, // 0x00 SPECIAL
    Vr4300::op_regimm,   // 0x01 REGIMM
    Vr4300::op_j,        // 0x02 J
    Vr4300::op_jal,      // 0x03 JAL
    Vr4300::op_beq,      // 0x04 BEQ
    Vr4300::op_bne,      // 0x05 BNE
    Vr4300::op_blez,     // 0x06 BLEZ
    Vr4300::op_bgtz,     // 0x07 BGTZ
    Vr4300::op_addi,     // 0x08 ADDI
    Vr4300::op_addiu,    // 0x09 ADDIU
    Vr4300::op_slti,     // 0x0A SLTI
    Vr4300::op_sltiu,    // 0x0B SLTIU
    Vr4300::op_andi,     // 0x0C ANDI
    Vr4300::op_ori,      // 0x0D ORI
    Vr4300::op_xori,     // 0x0E XORI
    Vr4300::op_lui,      // 0x0F LUI
    Vr4300::op_cop0,     // 0x10 COP0
    Vr4300::op_cop1,     // 0x11 COP1
    Vr4300::op_cop2,     // 0x12 COP2
    Vr4300::op_reserved, // 0x13
    Vr4300::op_beql,     // 0x14 BEQL
    Vr4300::op_bnel,     // 0x15 BNEL
    Vr4300::op_blezl,    // 0x16 BLEZL
    Vr4300::op_bgtzl,    // 0x17 BGTZL
    Vr4300::op_daddi,    // 0x18 DADDI
    Vr4300::op_daddiu,   // 0x19 DADDIU
    Vr4300::op_ldl,      // 0x1A LDL
    Vr4300::op_ldr,      // 0x1B LDR
    Vr4300::op_reserved, // 0x1C
    Vr4300::op_reserved, // 0x1D
    Vr4300::op_reserved, // 0x1E
    Vr4300::op_reserved, // 0x1F
    Vr4300::op_lb,       // 0x20 LB
    Vr4300::op_lh,       // 0x21 LH
    Vr4300::op_lwl,      // 0x22 LWL
    Vr4300::op_lw,       // 0x23 LW
    Vr4300::op_lbu,      // 0x24 LBU
    Vr4300::op_lhu,      // 0x25 LHU
    Vr4300::op_lwr,      // 0x26 LWR
    Vr4300::op_lwu,      // 0x27 LWU
    Vr4300::op_sb,       // 0x28 SB
    Vr4300::op_sh,       // 0x29 SH
    Vr4300::op_swl,      // 0x2A SWL
    Vr4300::op_sw,       // 0x2B SW
    Vr4300::op_sdl,      // 0x2C SDL
    Vr4300::op_sdr,      // 0x2D SDR
    Vr4300::op_swr,      // 0x2E SWR
    Vr4300::op_cache,    // 0x2F CACHE
    Vr4300::op_ll,       // 0x30 LL
    Vr4300::op_lwc1,     // 0x31 LWC1
    Vr4300::op_lwc2,     // 0x32 LWC2
    Vr4300::op_reserved, // 0x33
    Vr4300::op_lld,      // 0x34 LLD
    Vr4300::op_ldc1,     // 0x35 LDC1
    Vr4300::op_ldc2,     // 0x36 LDC2
    Vr4300::op_ld,       // 0x37 LD
    Vr4300::op_sc,       // 0x38 SC
    Vr4300::op_swc1,     // 0x39 SWC1
    Vr4300::op_swc2,     // 0x3A SWC2
    Vr4300::op_reserved, // 0x3B
    Vr4300::op_scd,      // 0x3C SCD
    Vr4300::op_sdc1,     // 0x3D SDC1
    Vr4300::op_sdc2,     // 0x3E SDC2
    Vr4300::op_sd,       // 0x3F SD
];

/// SPECIAL sub-function table, indexed by bits 5..0.
pub(crate) static SPECIAL_TABLE: [InstrFn; 64] = [
    Vr4300::sp_sll,      // 0x00 SLL
    Vr4300::sp_reserved, // 0x01
    Vr4300::sp_srl,      // 0x02 SRL
    Vr4300::sp_sra,      // 0x03 SRA
    Vr4300::sp_sllv,     // 0x04 SLLV
    Vr4300::sp_reserved, // 0x05
    Vr4300::sp_srlv,     // 0x06 SRLV
    Vr4300::sp_srav,     // 0x07 SRAV
    Vr4300::sp_jr,       // 0x08 JR
    Vr4300::sp_jalr,     // 0x09 JALR
    Vr4300::sp_reserved, // 0x0A
    Vr4300::sp_reserved, // 0x0B
    Vr4300::sp_syscall,  // 0x0C SYSCALL
    Vr4300::sp_break,    // 0x0D BREAK
    Vr4300::sp_reserved, // 0x0E
    Vr4300::sp_sync,     // 0x0F SYNC
    Vr4300::sp_mfhi,     // 0x10 MFHI
    Vr4300::sp_mthi,     // 0x11 MTHI
    Vr4300::sp_mflo,     // 0x12 MFLO
    Vr4300::sp_mtlo,     // 0x13 MTLO
    Vr4300::sp_dsllv,    // 0x14 DSLLV
    Vr4300::sp_reserved, // 0x15
    Vr4300::sp_dsrlv,    // 0x16 DSRLV
    Vr4300::sp_dsrav,    // 0x17 DSRAV
    Vr4300::sp_mult,     // 0x18 MULT
    Vr4300::sp_multu,    // 0x19 MULTU
    Vr4300::sp_div,      // 0x1A DIV
    Vr4300::sp_divu,     // 0x1B DIVU
    Vr4300::sp_dmult,    // 0x1C DMULT
    Vr4300::sp_dmultu,   // 0x1D DMULTU
    Vr4300::sp_ddiv,     // 0x1E DDIV
    Vr4300::sp_ddivu,    // 0x1F DDIVU
    Vr4300::sp_add,      // 0x20 ADD
    Vr4300::sp_addu,     // 0x21 ADDU
    Vr4300::sp_sub,      // 0x22 SUB
    Vr4300::sp_subu,     // 0x23 SUBU
    Vr4300::sp_and,      // 0x24 AND
    Vr4300::sp_or,       // 0x25 OR
    Vr4300::sp_xor,      // 0x26 XOR
    Vr4300::sp_nor,      // 0x27 NOR
    Vr4300::sp_reserved, // 0x28
    Vr4300::sp_reserved, // 0x29
    Vr4300::sp_slt,      // 0x2A SLT
    Vr4300::sp_sltu,     // 0x2B SLTU
    Vr4300::sp_dadd,     // 0x2C DADD
    Vr4300::sp_daddu,    // 0x2D DADDU
    Vr4300::sp_dsub,     // 0x2E DSUB
    Vr4300::sp_dsubu,    // 0x2F DSUBU
    Vr4300::sp_tge,      // 0x30 TGE
    Vr4300::sp_tgeu,     // 0x31 TGEU
    Vr4300::sp_tlt,      // 0x32 TLT
    Vr4300::sp_tltu,     // 0x33 TLTU
    Vr4300::sp_teq,      // 0x34 TEQ
    Vr4300::sp_reserved, // 0x35
    Vr4300::sp_tne,      // 0x36 TNE
    Vr4300::sp_reserved, // 0x37
    Vr4300::sp_dsll,     // 0x38 DSLL
    Vr4300::sp_reserved, // 0x39
    Vr4300::sp_dsrl,     // 0x3A DSRL
    Vr4300::sp_dsra,     // 0x3B DSRA
    Vr4300::sp_dsll32,   // 0x3C DSLL32
    Vr4300::sp_reserved, // 0x3D
    Vr4300::sp_dsrl32,   // 0x3E DSRL32
    Vr4300::sp_dsra32,   // 0x3F DSRA32
];

/// The two-level outer table: index 0 = NOP table, 1 = opcode table.
pub(crate) static TABLES: [&[InstrFn; 64]; 2] = [&NOP_TABLE, &OPCODE_TABLE];

impl Vr4300 {
    /// SPECIAL: re-dispatch on the funct field.
    pub(crate) fn sp_dispatch(&mut self) -> Result<(), Exception> {
        SPECIAL_TABLE[usize::from(self.rfex.instruction.funct())](self)
    }
}
