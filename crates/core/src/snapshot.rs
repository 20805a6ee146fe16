//! Opaque machine-state snapshots.
//!
//! The reverse engine never looks inside a snapshot; it only stores the
//! [`SnapshotBlob`] handed out by [`Snapshotable::capture`] and gives it back
//! to [`Snapshotable::restore`]. Machines that keep their state in `serde`
//! structs can use [`SnapshotBlob::encode`] / [`SnapshotBlob::decode`].
//!
//! ## Blob format
//!
//! ```text
//! +------------------+
//! | Magic "RVSN"     |  4 bytes
//! +------------------+
//! | Format version   |  u32 little-endian (currently 1)
//! +------------------+
//! | Compressed data  |  deflate-compressed bincode payload
//! +------------------+
//! ```

use crate::error::SnapshotError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// Magic bytes identifying an encoded snapshot.
const MAGIC: &[u8; 4] = b"RVSN";
/// Current snapshot format version.
const FORMAT_VERSION: u32 = 1;
/// Magic + version.
const HEADER_LEN: usize = 8;

/// A frozen machine state. Owned exclusively by the chunk that holds it.
#[derive(Clone, PartialEq, Eq)]
pub struct SnapshotBlob {
    bytes: Box<[u8]>,
}

impl SnapshotBlob {
    /// Wrap raw bytes produced by some other snapshot format.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        SnapshotBlob { bytes: bytes.into_boxed_slice() }
    }

    /// Serialize `state` with bincode and deflate it at `level` (0..=10).
    pub fn encode<T: Serialize>(state: &T, level: u8) -> Result<Self, SnapshotError> {
        let payload = bincode::serialize(state).map_err(SnapshotError::Encode)?;
        let compressed = miniz_oxide::deflate::compress_to_vec(&payload, level.min(10));

        let mut out = Vec::with_capacity(HEADER_LEN + compressed.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&compressed);
        Ok(SnapshotBlob::from_bytes(out))
    }

    /// Inverse of [`SnapshotBlob::encode`], verifying magic and version.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, SnapshotError> {
        let data = &self.bytes;
        if data.len() < HEADER_LEN {
            return Err(SnapshotError::Truncated(data.len()));
        }
        if &data[0..4] != MAGIC {
            return Err(SnapshotError::BadMagic);
        }
        let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        if version != FORMAT_VERSION {
            return Err(SnapshotError::UnsupportedVersion { found: version, expected: FORMAT_VERSION });
        }

        let decompressed = miniz_oxide::inflate::decompress_to_vec(&data[HEADER_LEN..])
            .map_err(|e| SnapshotError::Decompress(format!("{:?}", e)))?;

        bincode::deserialize(&decompressed).map_err(SnapshotError::Decode)
    }

    pub fn as_bytes(&self) -> &[u8] { &self.bytes }

    pub fn len(&self) -> usize { self.bytes.len() }

    pub fn is_empty(&self) -> bool { self.bytes.is_empty() }
}

impl fmt::Debug for SnapshotBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SnapshotBlob({} bytes)", self.bytes.len())
    }
}

/// Anything whose full state can be frozen and thawed atomically.
///
/// `restore` must bring back the machine's clock together with the rest of
/// its state.
pub trait Snapshotable {
    fn capture(&self) -> Result<SnapshotBlob, SnapshotError>;
    fn restore(&mut self, blob: &SnapshotBlob) -> Result<(), SnapshotError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct CpuRegs {
        pc: u16,
        sp: u16,
        ram: Vec<u8>,
    }

    #[test]
    fn test_encode_decode() {
        let regs = CpuRegs { pc: 0x1234, sp: 0x0AFF, ram: vec![7; 2048] };
        let blob = SnapshotBlob::encode(&regs, 6).unwrap();
        assert_eq!(&blob.as_bytes()[0..4], b"RVSN");
        // 2 KB of identical bytes must deflate well
        assert!(blob.len() < 256);
        assert_eq!(blob.decode::<CpuRegs>().unwrap(), regs);
    }

    #[test]
    fn test_bad_header() {
        let short = SnapshotBlob::from_bytes(vec![1, 2, 3]);
        assert!(matches!(short.decode::<CpuRegs>(), Err(SnapshotError::Truncated(3))));

        let bad = SnapshotBlob::from_bytes(b"XXXX\x01\x00\x00\x00".to_vec());
        assert!(matches!(bad.decode::<CpuRegs>(), Err(SnapshotError::BadMagic)));

        let future = SnapshotBlob::from_bytes(b"RVSN\x09\x00\x00\x00".to_vec());
        assert!(matches!(
            future.decode::<CpuRegs>(),
            Err(SnapshotError::UnsupportedVersion { found: 9, expected: 1 })
        ));
    }
}
