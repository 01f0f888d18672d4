//! GGUF model files
//!
//! Cheap header checks run before handing a path to llama.cpp, so obviously
//! wrong files are rejected with a readable message instead of an FFI failure.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use thiserror::Error;

/// GGUF magic bytes (little-endian: "GGUF")
pub const GGUF_MAGIC: u32 = 0x46554747;

/// magic(4) + version(4) + tensor_count(8) + metadata_kv_count(8)
const HEADER_LEN: u64 = 24;

/// Errors that can occur while inspecting a model file
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Failed to open model file: {0}")]
    FileOpen(#[from] std::io::Error),

    #[error("Not a GGUF file: magic bytes mismatch (expected 0x{:08X}, got 0x{:08X})", GGUF_MAGIC, .0)]
    InvalidMagic(u32),

    #[error("Unsupported GGUF version: {0}")]
    UnsupportedVersion(u32),

    #[error("File too small to be a GGUF model")]
    FileTooSmall,
}

/// Header fields of a GGUF file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GgufHeader {
    pub version: u32,
    pub tensor_count: u64,
    pub metadata_kv_count: u64,
}

/// Reads and checks the GGUF header at `path`.
pub fn validate_gguf<P: AsRef<Path>>(path: P) -> Result<GgufHeader, ModelError> {
    let file = File::open(path)?;
    if file.metadata()?.len() < HEADER_LEN {
        return Err(ModelError::FileTooSmall);
    }
    let mut reader = BufReader::new(file);

    let magic = u32::from_le_bytes(read_array(&mut reader)?);
    if magic != GGUF_MAGIC {
        return Err(ModelError::InvalidMagic(magic));
    }

    let version = u32::from_le_bytes(read_array(&mut reader)?);
    if !(2..=3).contains(&version) {
        return Err(ModelError::UnsupportedVersion(version));
    }

    Ok(GgufHeader {
        version,
        tensor_count: u64::from_le_bytes(read_array(&mut reader)?),
        metadata_kv_count: u64::from_le_bytes(read_array(&mut reader)?),
    })
}

fn read_array<const N: usize>(reader: &mut impl Read) -> std::io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}
