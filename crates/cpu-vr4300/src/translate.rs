//! Virtual to physical address translation.
//!
//! Only the fixed kernel windows are mapped. kseg0 and kseg1 are direct
//! windows onto the low 512 MiB of physical memory; both collapse to the
//! same physical range here and both report uncached, because no cache
//! model sits behind the translation. kuseg/ksseg and the TLB-mapped
//! segments are not implemented; boot-path code never leaves the ksegs.
//!
//! A miss reports only the offending address. The pipeline stage that
//! asked for the translation knows which instruction it was working for
//! and wraps the miss into a proper diagnostic.

/// Base of the cached direct-mapped window.
pub const KSEG0_START: u32 = 0x8000_0000;
/// Base of the uncached direct-mapped window.
pub const KSEG1_START: u32 = 0xA000_0000;

/// Result of a successful translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslatedAddress {
    /// Physical address.
    pub paddr: u32,
    /// True when the access goes through the data cache. Always false in
    /// this core; the flag is carried so store effects keep their shape.
    pub cached: bool,
}

/// A virtual address outside the directly-mapped kernel windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnmappedAddress {
    /// The address that missed kseg0/kseg1.
    pub vaddr: u32,
}

/// Translate a 32-bit virtual address.
///
/// kseg0 and kseg1 subtract their window base; the combined form
/// `addr - KSEG0_START - ((addr >> 29) & 1) * 0x2000_0000` handles both.
/// Everything else is unmapped territory for this core.
pub fn translate_vaddr(vaddr: u32) -> Result<TranslatedAddress, UnmappedAddress> {
    match vaddr >> 29 {
        // kseg0: 0x8000_0000-0x9FFF_FFFF, kseg1: 0xA000_0000-0xBFFF_FFFF
        0b100 | 0b101 => Ok(TranslatedAddress {
            paddr: vaddr - KSEG0_START - ((vaddr >> 29) & 1) * 0x2000_0000,
            cached: false,
        }),
        _ => Err(UnmappedAddress { vaddr }),
    }
}
