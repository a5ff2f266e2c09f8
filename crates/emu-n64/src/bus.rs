//! N64 system bus: physical address routing and HW-IO side effects.
//!
//! Implements `cpu_vr4300::SystemBus`. Routes physical addresses to RDRAM,
//! SP memory, the memory-mapped register blocks, cartridge ROM and the PIF.
//! All backing storage is plain big-endian bytes; a sized store writes the
//! last `size` bytes of the value's big-endian form and a sized load
//! assembles them back, so sub-word traffic stays consistent across widths.
//!
//! Three register stores have side effects beyond the byte write: the PI
//! DMA kick and the two VI cells the graphics collaborator reads. They are
//! dispatched after the write lands, so the triggering register also holds
//! its latched value.

use cpu_vr4300::{AccessSize, SystemBus};

use crate::addresses::{
    AI_REG_BASE, AI_REG_SIZE, CART_ROM_BASE, CART_ROM_END, PI_CART_ADDR_REG, PI_DRAM_ADDR_REG,
    PI_REG_BASE, PI_REG_SIZE, PI_WR_LEN_REG, PIF_BASE, PIF_RAM_OFFSET, PIF_SIZE, RDRAM_SIZE,
    RSP_REG_BASE, RSP_REG_SIZE, SI_REG_BASE, SI_REG_SIZE, SP_MEM_BASE, SP_MEM_SIZE, VI_CTRL_REG,
    VI_ORIGIN_REG, VI_REG_BASE, VI_REG_SIZE,
};
use crate::rcp::{PixelFormat, Rcp};

/// Read `size` bytes big-endian at `offset`, zero-extended. Out-of-range
/// reads return zero (open bus).
fn read_sized(mem: &[u8], offset: usize, size: AccessSize) -> u64 {
    let n = size.bytes();
    if offset + n > mem.len() {
        return 0;
    }
    let mut buf = [0u8; 8];
    buf[8 - n..].copy_from_slice(&mem[offset..offset + n]);
    u64::from_be_bytes(buf)
}

/// Write the low `size` bytes of `value` big-endian at `offset`.
/// Out-of-range writes are dropped.
fn write_sized(mem: &mut [u8], offset: usize, value: u64, size: AccessSize) {
    let n = size.bytes();
    if offset + n > mem.len() {
        return;
    }
    let bytes = value.to_be_bytes();
    mem[offset..offset + n].copy_from_slice(&bytes[8 - n..]);
}

/// The N64 bus, implementing `cpu_vr4300::SystemBus`.
pub struct N64Bus {
    /// RDRAM including the expansion pak (8 MiB at physical zero).
    pub rdram: Vec<u8>,
    /// Cartridge ROM image, big-endian. Empty until a cartridge loads.
    rom: Vec<u8>,
    /// PIF ROM + RAM (RAM is the last 64 bytes).
    pub pif: Vec<u8>,
    /// SP DMEM/IMEM.
    pub sp_mem: Vec<u8>,
    /// RSP register stubs.
    rsp_regs: [u8; RSP_REG_SIZE],
    /// Video Interface registers.
    vi_regs: [u8; VI_REG_SIZE],
    /// Audio Interface registers.
    ai_regs: [u8; AI_REG_SIZE],
    /// Peripheral Interface registers.
    pi_regs: [u8; PI_REG_SIZE],
    /// Serial Interface registers.
    si_regs: [u8; SI_REG_SIZE],
    /// Collaborator-visible RCP state (framebuffer origin, pixel format).
    pub rcp: Rcp,
}

impl Default for N64Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl N64Bus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rdram: vec![0; RDRAM_SIZE],
            rom: Vec::new(),
            pif: vec![0; PIF_SIZE],
            sp_mem: vec![0; SP_MEM_SIZE],
            rsp_regs: [0; RSP_REG_SIZE],
            vi_regs: [0; VI_REG_SIZE],
            ai_regs: [0; AI_REG_SIZE],
            pi_regs: [0; PI_REG_SIZE],
            si_regs: [0; SI_REG_SIZE],
            rcp: Rcp::default(),
        }
    }

    /// Map a cartridge ROM image (already big-endian).
    pub fn load_rom(&mut self, rom: Vec<u8>) {
        self.rom = rom;
    }

    /// The mapped cartridge image.
    #[must_use]
    pub fn rom(&self) -> &[u8] {
        &self.rom
    }

    /// Zero the volatile state, keeping the cartridge mapped.
    pub fn reset(&mut self) {
        self.rdram.fill(0);
        self.pif[PIF_RAM_OFFSET..].fill(0);
        self.sp_mem.fill(0);
        self.rsp_regs = [0; RSP_REG_SIZE];
        self.vi_regs = [0; VI_REG_SIZE];
        self.ai_regs = [0; AI_REG_SIZE];
        self.pi_regs = [0; PI_REG_SIZE];
        self.si_regs = [0; SI_REG_SIZE];
        self.rcp = Rcp::default();
    }

    /// Resolve a physical address to its backing region and offset.
    /// The Rust face of the original pointer-returning redirect.
    fn region_mut(&mut self, paddr: u32) -> Option<(&mut [u8], usize)> {
        let paddr_us = paddr as usize;
        match paddr {
            _ if paddr_us < RDRAM_SIZE => Some((&mut self.rdram, paddr_us)),
            _ if (SP_MEM_BASE..SP_MEM_BASE + SP_MEM_SIZE as u32).contains(&paddr) => {
                Some((&mut self.sp_mem, (paddr - SP_MEM_BASE) as usize))
            }
            _ if (RSP_REG_BASE..RSP_REG_BASE + RSP_REG_SIZE as u32).contains(&paddr) => {
                Some((&mut self.rsp_regs, (paddr - RSP_REG_BASE) as usize))
            }
            _ if (VI_REG_BASE..VI_REG_BASE + VI_REG_SIZE as u32).contains(&paddr) => {
                Some((&mut self.vi_regs, (paddr - VI_REG_BASE) as usize))
            }
            _ if (AI_REG_BASE..AI_REG_BASE + AI_REG_SIZE as u32).contains(&paddr) => {
                Some((&mut self.ai_regs, (paddr - AI_REG_BASE) as usize))
            }
            _ if (PI_REG_BASE..PI_REG_BASE + PI_REG_SIZE as u32).contains(&paddr) => {
                Some((&mut self.pi_regs, (paddr - PI_REG_BASE) as usize))
            }
            _ if (SI_REG_BASE..SI_REG_BASE + SI_REG_SIZE as u32).contains(&paddr) => {
                Some((&mut self.si_regs, (paddr - SI_REG_BASE) as usize))
            }
            _ if (CART_ROM_BASE..=CART_ROM_END).contains(&paddr) => {
                let offset = (paddr - CART_ROM_BASE) as usize;
                if offset < self.rom.len() {
                    Some((self.rom.as_mut_slice(), offset))
                } else {
                    None
                }
            }
            _ if (PIF_BASE..PIF_BASE + PIF_SIZE as u32).contains(&paddr) => {
                Some((&mut self.pif, (paddr - PIF_BASE) as usize))
            }
            _ => None,
        }
    }

    /// Store side effects for the three registers that do more than latch.
    fn hwio_store(&mut self, paddr: u32, value: u64) {
        match paddr {
            PI_WR_LEN_REG => self.pi_dma(value),
            VI_CTRL_REG => match value & 0b11 {
                0b10 => self.rcp.pixel_format = PixelFormat::Rgb555,
                0b11 => self.rcp.pixel_format = PixelFormat::Rgba8888,
                _ => {}
            },
            VI_ORIGIN_REG => {
                self.rcp.framebuffer_origin = Some((value & 0x00FF_FFFF) as u32);
            }
            _ => {}
        }
    }

    /// PI DMA: copy `len + 1` bytes from cartridge ROM at the latched cart
    /// address to RDRAM at the latched DRAM address.
    fn pi_dma(&mut self, len_value: u64) {
        let dram_addr =
            (read_sized(&self.pi_regs, (PI_DRAM_ADDR_REG - PI_REG_BASE) as usize, AccessSize::Word)
                as usize)
                & 0x00FF_FFFF;
        let cart_addr =
            read_sized(&self.pi_regs, (PI_CART_ADDR_REG - PI_REG_BASE) as usize, AccessSize::Word)
                as u32;
        let rom_offset = (cart_addr & 0x0FFF_FFFF) as usize;
        let requested = ((len_value as usize) & 0x00FF_FFFF) + 1;
        let len = requested
            .min(self.rom.len().saturating_sub(rom_offset))
            .min(self.rdram.len().saturating_sub(dram_addr));
        if len == 0 {
            log::debug!("PI DMA with nothing to copy (cart {cart_addr:#010X}, len {requested})");
            return;
        }
        self.rdram[dram_addr..dram_addr + len]
            .copy_from_slice(&self.rom[rom_offset..rom_offset + len]);
        log::debug!("PI DMA: {len} bytes cart {cart_addr:#010X} -> rdram {dram_addr:#08X}");
    }
}

impl SystemBus for N64Bus {
    fn read(&mut self, paddr: u32, size: AccessSize) -> u64 {
        match self.region_mut(paddr) {
            Some((mem, offset)) => read_sized(mem, offset, size),
            None => {
                log::debug!("read from unmapped physical address {paddr:#010X}");
                0
            }
        }
    }

    fn write(&mut self, paddr: u32, value: u64, size: AccessSize) {
        if (CART_ROM_BASE..=CART_ROM_END).contains(&paddr) {
            log::debug!("ignored write to cartridge ROM at {paddr:#010X}");
            return;
        }
        match self.region_mut(paddr) {
            Some((mem, offset)) => write_sized(mem, offset, value, size),
            None => {
                log::debug!("write to unmapped physical address {paddr:#010X}");
                return;
            }
        }
        self.hwio_store(paddr, value);
    }

    fn is_ready(&self) -> bool {
        !self.rom.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addresses::{PI_STATUS_REG, VI_WIDTH_REG};

    #[test]
    fn rdram_roundtrip_every_size() {
        let mut bus = N64Bus::new();
        for (size, value) in [
            (AccessSize::Byte, 0xAB),
            (AccessSize::Half, 0xABCD),
            (AccessSize::Word, 0xDEAD_BEEF),
            (AccessSize::Double, 0x0123_4567_89AB_CDEF),
        ] {
            bus.write(0x1000, value, size);
            assert_eq!(bus.read(0x1000, size), value, "{size:?} round trip");
        }
    }

    #[test]
    fn stores_land_big_endian() {
        let mut bus = N64Bus::new();
        bus.write(0x2000, 0xDEAD_BEEF, AccessSize::Word);
        assert_eq!(&bus.rdram[0x2000..0x2004], &[0xDE, 0xAD, 0xBE, 0xEF]);
        // Sub-word loads see the addressed bytes.
        assert_eq!(bus.read(0x2000, AccessSize::Byte), 0xDE);
        assert_eq!(bus.read(0x2002, AccessSize::Half), 0xBEEF);
    }

    #[test]
    fn narrow_store_touches_only_addressed_bytes() {
        let mut bus = N64Bus::new();
        bus.write(0x3000, 0x1122_3344, AccessSize::Word);
        bus.write(0x3001, 0xFF, AccessSize::Byte);
        assert_eq!(&bus.rdram[0x3000..0x3004], &[0x11, 0xFF, 0x33, 0x44]);
    }

    #[test]
    fn register_blocks_latch() {
        let mut bus = N64Bus::new();
        bus.write(VI_WIDTH_REG, 320, AccessSize::Word);
        bus.write(PI_STATUS_REG, 0x3, AccessSize::Word);
        assert_eq!(bus.read(VI_WIDTH_REG, AccessSize::Word), 320);
        assert_eq!(bus.read(PI_STATUS_REG, AccessSize::Word), 0x3);
    }

    #[test]
    fn rom_reads_and_ignores_writes() {
        let mut bus = N64Bus::new();
        bus.load_rom(vec![0x11, 0x22, 0x33, 0x44]);
        assert_eq!(bus.read(CART_ROM_BASE, AccessSize::Word), 0x1122_3344);
        bus.write(CART_ROM_BASE, 0, AccessSize::Word);
        assert_eq!(bus.read(CART_ROM_BASE, AccessSize::Word), 0x1122_3344);
    }

    #[test]
    fn unmapped_reads_as_zero() {
        let mut bus = N64Bus::new();
        assert_eq!(bus.read(0x0900_0000, AccessSize::Word), 0);
        bus.write(0x0900_0000, 0xFFFF_FFFF, AccessSize::Word); // dropped
        assert_eq!(bus.read(0x0900_0000, AccessSize::Word), 0);
    }

    #[test]
    fn pif_ram_is_writable() {
        let mut bus = N64Bus::new();
        let pif_ram = PIF_BASE + PIF_RAM_OFFSET as u32;
        bus.write(pif_ram, 0xCAFE_F00D, AccessSize::Word);
        assert_eq!(bus.read(pif_ram, AccessSize::Word), 0xCAFE_F00D);
    }

    #[test]
    fn pi_dma_copies_cart_to_rdram() {
        let mut bus = N64Bus::new();
        let rom: Vec<u8> = (0u8..=255).cycle().take(0x1000).collect();
        bus.load_rom(rom);
        // Latch the transfer addresses, then kick with the length register.
        bus.write(PI_DRAM_ADDR_REG, 0x100, AccessSize::Word);
        bus.write(PI_CART_ADDR_REG, CART_ROM_BASE as u64 + 0x40, AccessSize::Word);
        bus.write(PI_WR_LEN_REG, 0x3F, AccessSize::Word); // len + 1 = 64 bytes
        assert_eq!(&bus.rdram[0x100..0x140], &bus.rom()[0x40..0x80]);
        // Byte before and after the window untouched.
        assert_eq!(bus.rdram[0xFF], 0);
        assert_eq!(bus.rdram[0x140], 0);
    }

    #[test]
    fn pi_dma_clamps_runaway_length() {
        let mut bus = N64Bus::new();
        bus.load_rom(vec![0xAA; 0x100]);
        bus.write(PI_DRAM_ADDR_REG, 0, AccessSize::Word);
        bus.write(PI_CART_ADDR_REG, u64::from(CART_ROM_BASE), AccessSize::Word);
        bus.write(PI_WR_LEN_REG, 0x00FF_FFFF, AccessSize::Word);
        // Copy stops at the ROM's end instead of panicking.
        assert_eq!(&bus.rdram[..0x100], &[0xAA; 0x100]);
        assert_eq!(bus.rdram[0x100], 0);
    }

    #[test]
    fn vi_ctrl_selects_pixel_format() {
        let mut bus = N64Bus::new();
        bus.write(VI_CTRL_REG, 0b10, AccessSize::Word);
        assert_eq!(bus.rcp.pixel_format, PixelFormat::Rgb555);
        bus.write(VI_CTRL_REG, 0b11, AccessSize::Word);
        assert_eq!(bus.rcp.pixel_format, PixelFormat::Rgba8888);
        // Other low-bit patterns leave the format alone.
        bus.write(VI_CTRL_REG, 0b00, AccessSize::Word);
        assert_eq!(bus.rcp.pixel_format, PixelFormat::Rgba8888);
    }

    #[test]
    fn vi_origin_publishes_framebuffer_base() {
        let mut bus = N64Bus::new();
        assert!(bus.rcp.framebuffer_origin.is_none());
        bus.write(VI_ORIGIN_REG, 0x0010_0000, AccessSize::Word);
        assert_eq!(bus.rcp.framebuffer_origin, Some(0x0010_0000));
        // Only bits 23..0 participate.
        bus.write(VI_ORIGIN_REG, 0xFF20_0000, AccessSize::Word);
        assert_eq!(bus.rcp.framebuffer_origin, Some(0x0020_0000));
    }

    #[test]
    fn readiness_follows_cartridge() {
        let mut bus = N64Bus::new();
        assert!(!bus.is_ready());
        bus.load_rom(vec![0; 4]);
        assert!(bus.is_ready());
    }
}
