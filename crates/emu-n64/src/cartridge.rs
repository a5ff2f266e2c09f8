//! Cartridge ROM loading.
//!
//! N64 dumps circulate in three byte orders, distinguished by the first
//! word of the image: `.z64` is the native big-endian layout, `.v64` is
//! 16-bit byte-swapped, `.n64` is 32-bit little-endian. The loader
//! normalizes everything to big-endian so the bus can serve fetches
//! directly.

use std::path::Path;

use thiserror::Error;

/// The first word of a native big-endian dump.
const Z64_MAGIC: u32 = 0x8037_1240;
/// The same word, 16-bit byte-swapped.
const V64_MAGIC: u32 = 0x3780_4012;
/// The same word, 32-bit reversed.
const N64_MAGIC: u32 = 0x4012_3780;

/// Offset and length of the internal name field in the ROM header.
const NAME_OFFSET: usize = 0x20;
const NAME_LEN: usize = 20;

/// Cartridge loading failure.
#[derive(Debug, Error)]
pub enum RomError {
    #[error("failed to read ROM file: {0}")]
    Io(#[from] std::io::Error),

    #[error("ROM image too short ({0} bytes)")]
    TooShort(usize),

    #[error("unrecognised ROM magic {0:#010X}")]
    BadMagic(u32),
}

/// A loaded cartridge image, normalized to big-endian.
#[derive(Debug, Clone)]
pub struct Rom {
    data: Vec<u8>,
}

impl Rom {
    /// Load and normalize a ROM image from disk.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RomError> {
        let data = std::fs::read(path.as_ref())?;
        let rom = Self::from_bytes(data)?;
        log::info!(
            "loaded cartridge \"{}\" ({} bytes)",
            rom.name(),
            rom.data.len()
        );
        Ok(rom)
    }

    /// Normalize an in-memory ROM image.
    pub fn from_bytes(mut data: Vec<u8>) -> Result<Self, RomError> {
        if data.len() < NAME_OFFSET + NAME_LEN {
            return Err(RomError::TooShort(data.len()));
        }
        let magic = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        match magic {
            Z64_MAGIC => {}
            V64_MAGIC => {
                for pair in data.chunks_exact_mut(2) {
                    pair.swap(0, 1);
                }
            }
            N64_MAGIC => {
                for quad in data.chunks_exact_mut(4) {
                    quad.reverse();
                }
            }
            other => return Err(RomError::BadMagic(other)),
        }
        Ok(Self { data })
    }

    /// The internal 20-character name from the ROM header, trimmed.
    #[must_use]
    pub fn name(&self) -> String {
        self.data[NAME_OFFSET..NAME_OFFSET + NAME_LEN]
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { ' ' })
            .collect::<String>()
            .trim()
            .to_string()
    }

    /// The normalized big-endian image.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the ROM, yielding the image.
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn z64_image() -> Vec<u8> {
        let mut data = vec![0u8; 0x1000];
        data[0..4].copy_from_slice(&Z64_MAGIC.to_be_bytes());
        data[NAME_OFFSET..NAME_OFFSET + 9].copy_from_slice(b"TEST CART");
        data
    }

    #[test]
    fn z64_passes_through() {
        let image = z64_image();
        let rom = Rom::from_bytes(image.clone()).expect("valid z64");
        assert_eq!(rom.data(), &image[..]);
        assert_eq!(rom.name(), "TEST CART");
    }

    #[test]
    fn v64_byte_swaps() {
        let mut image = z64_image();
        for pair in image.chunks_exact_mut(2) {
            pair.swap(0, 1);
        }
        let rom = Rom::from_bytes(image).expect("valid v64");
        assert_eq!(&rom.data()[0..4], &Z64_MAGIC.to_be_bytes());
        assert_eq!(rom.name(), "TEST CART");
    }

    #[test]
    fn n64_word_swaps() {
        let mut image = z64_image();
        for quad in image.chunks_exact_mut(4) {
            quad.reverse();
        }
        let rom = Rom::from_bytes(image).expect("valid n64");
        assert_eq!(&rom.data()[0..4], &Z64_MAGIC.to_be_bytes());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut image = z64_image();
        image[0] = 0x12;
        assert!(matches!(
            Rom::from_bytes(image),
            Err(RomError::BadMagic(_))
        ));
    }

    #[test]
    fn rejects_short_image() {
        assert!(matches!(
            Rom::from_bytes(vec![0x80, 0x37]),
            Err(RomError::TooShort(2))
        ));
    }
}
