//! Framing codec for cache entries.
//!
//! Every entry is serialized with:
//! - JSON for the body
//! - Length-prefixed framing
//! - CRC32 checksum for corruption detection
//! - Version byte for forward compatibility

use std::io::{Error as IoError, ErrorKind, Read, Result as IoResult, Write};

use crc32fast::Hasher;
use serde::{de::DeserializeOwned, Serialize};

/// Current frame version.
const FRAME_VERSION: u8 = 1;

/// Magic bytes identifying a datalink cache file.
pub const MAGIC: [u8; 4] = *b"DLNK";

/// Length of the file header in bytes.
pub const HEADER_LEN: u64 = 5;

/// Largest body accepted on either side (64 MiB).
const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Version byte plus length prefix.
const PREFIX_LEN: usize = 5;

/// Bytes a frame adds around its body.
const FRAME_OVERHEAD: usize = PREFIX_LEN + 4;

fn invalid(msg: String) -> IoError {
    IoError::new(ErrorKind::InvalidData, msg)
}

fn checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

fn check_version(found: u8, what: &str) -> IoResult<()> {
    if found == FRAME_VERSION {
        Ok(())
    } else {
        Err(invalid(format!(
            "unsupported {what} version: {found} (expected {FRAME_VERSION})"
        )))
    }
}

fn body_len(len_bytes: [u8; 4]) -> IoResult<usize> {
    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(invalid(format!("entry size {len} exceeds maximum {MAX_FRAME_SIZE}")));
    }
    Ok(len)
}

/// Serializes a value into a checksummed frame.
///
/// Format:
/// ```text
/// [version: 1 byte][length: 4 bytes LE][data: N bytes JSON][crc32: 4 bytes LE]
/// ```
///
/// # Errors
/// `ErrorKind::InvalidInput` if the body is larger than the frame limit.
pub fn encode<T: Serialize>(value: &T) -> IoResult<Vec<u8>> {
    let data = serde_json::to_vec(value)
        .map_err(|e| invalid(format!("serialization failed: {e}")))?;

    let len = u32::try_from(data.len())
        .ok()
        .filter(|_| data.len() <= MAX_FRAME_SIZE)
        .ok_or_else(|| {
            IoError::new(
                ErrorKind::InvalidInput,
                format!("entry size {} exceeds maximum {MAX_FRAME_SIZE}", data.len()),
            )
        })?;

    let mut out = Vec::with_capacity(FRAME_OVERHEAD + data.len());
    out.push(FRAME_VERSION);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&data);
    out.extend_from_slice(&checksum(&data).to_le_bytes());
    Ok(out)
}

/// Reads one frame, verifying its checksum.
///
/// A frame cut short by the end of the file surfaces as
/// `ErrorKind::UnexpectedEof`; callers decide whether that is a torn tail.
///
/// # Errors
/// `ErrorKind::InvalidData` on a version, size, checksum, or body mismatch.
pub fn decode<T: DeserializeOwned>(reader: &mut impl Read) -> IoResult<T> {
    let mut prefix = [0u8; PREFIX_LEN];
    reader.read_exact(&mut prefix)?;
    check_version(prefix[0], "frame")?;
    let len = body_len([prefix[1], prefix[2], prefix[3], prefix[4]])?;

    let mut data = vec![0u8; len];
    reader.read_exact(&mut data)?;
    let mut crc_bytes = [0u8; 4];
    reader.read_exact(&mut crc_bytes)?;

    let stored = u32::from_le_bytes(crc_bytes);
    let computed = checksum(&data);
    if stored != computed {
        return Err(invalid(format!(
            "CRC mismatch: stored={stored:08x}, computed={computed:08x} (data corrupted)"
        )));
    }

    serde_json::from_slice(&data).map_err(|e| invalid(format!("deserialization failed: {e}")))
}

/// Returns true if a complete, checksummed frame starts anywhere in `bytes`.
///
/// A crash leaves at most one torn frame at the end of a log, so finding an
/// intact frame after a short read means the short read was corruption.
#[must_use]
pub fn contains_frame(bytes: &[u8]) -> bool {
    (0..bytes.len()).any(|start| {
        let rest = &bytes[start..];
        if rest.len() < FRAME_OVERHEAD || rest[0] != FRAME_VERSION {
            return false;
        }
        let Ok(len) = body_len([rest[1], rest[2], rest[3], rest[4]]) else {
            return false;
        };
        let Some(frame) = rest.get(..FRAME_OVERHEAD + len) else {
            return false;
        };
        let (body, crc) = frame[PREFIX_LEN..].split_at(len);
        crc == checksum(body).to_le_bytes()
    })
}

/// Writes the file header (magic + version).
///
/// # Errors
/// Any write failure.
pub fn write_header(writer: &mut impl Write) -> IoResult<()> {
    writer.write_all(&MAGIC)?;
    writer.write_all(&[FRAME_VERSION])
}

/// Reads and validates the file header, returning its version.
///
/// # Errors
/// `ErrorKind::InvalidData` on a foreign magic or unsupported version.
pub fn read_header(reader: &mut impl Read) -> IoResult<u8> {
    let mut header = [0u8; 5];
    reader.read_exact(&mut header)?;

    if header[..4] != MAGIC {
        return Err(invalid(format!(
            "invalid magic bytes: expected {MAGIC:?}, got {:?}",
            &header[..4]
        )));
    }
    check_version(header[4], "cache")?;
    Ok(header[4])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_detects_corruption() {
        let mut encoded = encode(&"<a> <b> \"c\" .".to_string()).unwrap();
        encoded[8] ^= 0xFF;

        let result: IoResult<String> = decode(&mut Cursor::new(encoded));
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn test_truncated_frame_is_unexpected_eof() {
        let encoded = encode(&"payload".to_string()).unwrap();
        let torn = encoded[..encoded.len() - 2].to_vec();

        let result: IoResult<String> = decode(&mut Cursor::new(torn));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_rejects_oversized_entry() {
        let mut bad_data = vec![FRAME_VERSION];
        bad_data.extend_from_slice(&(200_000_000u32).to_le_bytes());

        let result: IoResult<String> = decode(&mut Cursor::new(bad_data));
        assert!(result.unwrap_err().to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_contains_frame_finds_intact_frame_after_garbage() {
        let frame = encode(&"payload".to_string()).unwrap();
        assert!(!contains_frame(&frame[..frame.len() - 1]));

        let mut bytes = vec![FRAME_VERSION, 0xFF, 0xFF, 0x00, 0x00, b'x'];
        assert!(!contains_frame(&bytes));
        bytes.extend_from_slice(&frame);
        assert!(contains_frame(&bytes));
    }

    #[test]
    fn test_header() {
        let mut buf = Vec::new();
        write_header(&mut buf).unwrap();
        assert_eq!(buf.len() as u64, HEADER_LEN);
        assert_eq!(read_header(&mut Cursor::new(buf)).unwrap(), FRAME_VERSION);

        let err = read_header(&mut Cursor::new(b"KYRO\x01".to_vec())).unwrap_err();
        assert!(err.to_string().contains("invalid magic"));
    }
}
