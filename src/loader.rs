//! LC-3 object image loader.
//!
//! An image is a sequence of big-endian 16-bit words: the first word is
//! the origin address, the rest is program content placed contiguously
//! from that origin. The encoding is fixed big-endian regardless of host
//! byte order. Loading several images into the same memory merges them,
//! later loads overwriting overlapping addresses.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::cpu::memory::{Memory, MEMORY_SIZE};

/// Where an image landed, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    /// Origin address from the image header.
    pub origin: u16,
    /// Number of words placed into memory.
    pub words: usize,
}

/// Load the image at `path` into `mem`.
pub fn load_image(path: &Path, mem: &mut Memory) -> Result<ImageInfo, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_reader(BufReader::new(file), mem)
}

/// Load an image from any byte stream into `mem`.
///
/// Words are placed at origin, origin+1, ... until the stream runs out or
/// the top of the address space (0xFFFF) has been written; data beyond
/// the boundary is discarded, as is a trailing odd byte.
pub fn load_from_reader<R: Read>(mut reader: R, mem: &mut Memory) -> Result<ImageInfo, LoadError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;

    if bytes.len() < 2 {
        return Err(LoadError::MissingOrigin);
    }
    let origin = u16::from_be_bytes([bytes[0], bytes[1]]);

    let mut addr = origin as usize;
    let mut words = 0;
    for chunk in bytes[2..].chunks_exact(2) {
        if addr >= MEMORY_SIZE {
            break;
        }
        mem.write(addr as u16, u16::from_be_bytes([chunk[0], chunk[1]]));
        addr += 1;
        words += 1;
    }

    Ok(ImageInfo { origin, words })
}

/// Errors raised while loading an image. All are fatal to the caller.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open image {path}: {source}")]
    Open {
        path: PathBuf,
        source: io::Error,
    },

    #[error("failed to read image: {0}")]
    Io(#[from] io::Error),

    #[error("image too short: missing origin word")]
    MissingOrigin,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_big_endian_placement() {
        // Origin 0x3000, words [1, 2]. Byte order in the file is fixed,
        // so this must hold on any host.
        let image = [0x30, 0x00, 0x00, 0x01, 0x00, 0x02];
        let mut mem = Memory::new();

        let info = load_from_reader(Cursor::new(image), &mut mem).unwrap();

        assert_eq!(info, ImageInfo { origin: 0x3000, words: 2 });
        assert_eq!(mem.peek(0x3000), 1);
        assert_eq!(mem.peek(0x3001), 2);
        assert_eq!(mem.peek(0x3002), 0);
    }

    #[test]
    fn test_multi_byte_words() {
        let image = [0x40, 0x00, 0x12, 0x34, 0xAB, 0xCD];
        let mut mem = Memory::new();

        load_from_reader(Cursor::new(image), &mut mem).unwrap();

        assert_eq!(mem.peek(0x4000), 0x1234);
        assert_eq!(mem.peek(0x4001), 0xABCD);
    }

    #[test]
    fn test_excess_past_boundary_is_discarded() {
        // Origin 0xFFFE leaves room for exactly two words.
        let image = [0xFF, 0xFE, 0x00, 0x0A, 0x00, 0x0B, 0x00, 0x0C];
        let mut mem = Memory::new();

        let info = load_from_reader(Cursor::new(image), &mut mem).unwrap();

        assert_eq!(info.words, 2);
        assert_eq!(mem.peek(0xFFFE), 0x0A);
        assert_eq!(mem.peek(0xFFFF), 0x0B);
        // The third word fell off the end of the address space.
        assert_eq!(mem.peek(0x0000), 0);
    }

    #[test]
    fn test_trailing_odd_byte_is_discarded() {
        let image = [0x30, 0x00, 0x00, 0x07, 0xFF];
        let mut mem = Memory::new();

        let info = load_from_reader(Cursor::new(image), &mut mem).unwrap();

        assert_eq!(info.words, 1);
        assert_eq!(mem.peek(0x3000), 7);
        assert_eq!(mem.peek(0x3001), 0);
    }

    #[test]
    fn test_missing_origin() {
        let mut mem = Memory::new();
        assert!(matches!(
            load_from_reader(Cursor::new([]), &mut mem),
            Err(LoadError::MissingOrigin)
        ));
        assert!(matches!(
            load_from_reader(Cursor::new([0x30]), &mut mem),
            Err(LoadError::MissingOrigin)
        ));
    }

    #[test]
    fn test_empty_program_after_origin() {
        let mut mem = Memory::new();
        let info = load_from_reader(Cursor::new([0x30, 0x00]), &mut mem).unwrap();
        assert_eq!(info, ImageInfo { origin: 0x3000, words: 0 });
    }

    #[test]
    fn test_images_merge_with_later_overwriting() {
        let mut mem = Memory::new();
        load_from_reader(Cursor::new([0x30, 0x00, 0x00, 0x01, 0x00, 0x02]), &mut mem).unwrap();
        load_from_reader(Cursor::new([0x30, 0x01, 0x00, 0x09]), &mut mem).unwrap();

        assert_eq!(mem.peek(0x3000), 1);
        assert_eq!(mem.peek(0x3001), 9); // overwritten by the second image
    }

    #[test]
    fn test_open_failure_names_the_path() {
        let mut mem = Memory::new();
        let err = load_image(Path::new("/nonexistent/image.obj"), &mut mem).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/image.obj"));
    }
}
