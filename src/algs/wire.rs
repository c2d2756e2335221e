//! Fixed, versioned, little-endian wire records for global-ID exchanges.
//!
//! Every message starts with a [`WireHdr`]; the payload is a run of `u64`
//! words. Buffers coming off a communicator carry no alignment guarantee, so
//! decoding reads words unaligned.

use bytemuck::{Pod, Zeroable};
use std::mem::size_of;

use crate::mesh_error::MeshError;

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

/// Payload kinds.
#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WireKind {
    /// Flat list of words.
    Values = 1,
    /// List of variable-length keys, each prefixed by its length.
    Keys = 2,
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireHdr {
    pub version_le: u16,
    pub kind_le: u16,
    /// Number of values or keys that follow.
    pub count_le: u32,
}

static_assertions::const_assert_eq!(size_of::<WireHdr>(), 8);

impl WireHdr {
    pub fn new(kind: WireKind, count: usize) -> Self {
        Self {
            version_le: WIRE_VERSION.to_le(),
            kind_le: (kind as u16).to_le(),
            count_le: (count as u32).to_le(),
        }
    }
    pub fn kind(&self) -> u16 {
        u16::from_le(self.kind_le)
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
    pub fn count(&self) -> usize {
        u32::from_le(self.count_le) as usize
    }
}

fn push_word(out: &mut Vec<u8>, w: u64) {
    out.extend_from_slice(bytemuck::bytes_of(&w.to_le()));
}

fn read_header(bytes: &[u8], kind: WireKind) -> Result<(WireHdr, Vec<u64>), MeshError> {
    let hdr_len = size_of::<WireHdr>();
    if bytes.len() < hdr_len {
        return Err(MeshError::Serialization(format!(
            "wire message of {} bytes is shorter than its header",
            bytes.len()
        )));
    }
    let hdr: WireHdr = bytemuck::pod_read_unaligned(&bytes[..hdr_len]);
    if hdr.version() != WIRE_VERSION {
        return Err(MeshError::Serialization(format!(
            "wire version {} (expected {WIRE_VERSION})",
            hdr.version()
        )));
    }
    if hdr.kind() != kind as u16 {
        return Err(MeshError::Serialization(format!(
            "wire kind {} (expected {:?})",
            hdr.kind(),
            kind
        )));
    }
    let body = &bytes[hdr_len..];
    if body.len() % size_of::<u64>() != 0 {
        return Err(MeshError::Serialization(format!(
            "wire payload of {} bytes is not a whole number of words",
            body.len()
        )));
    }
    let words = body
        .chunks_exact(size_of::<u64>())
        .map(|c| u64::from_le(bytemuck::pod_read_unaligned(c)))
        .collect();
    Ok((hdr, words))
}

/// Encodes a flat list of words.
pub fn encode_values(values: &[u64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(size_of::<WireHdr>() + 8 * values.len());
    out.extend_from_slice(bytemuck::bytes_of(&WireHdr::new(WireKind::Values, values.len())));
    for &v in values {
        push_word(&mut out, v);
    }
    out
}

pub fn decode_values(bytes: &[u8]) -> Result<Vec<u64>, MeshError> {
    let (hdr, words) = read_header(bytes, WireKind::Values)?;
    if words.len() != hdr.count() {
        return Err(MeshError::Serialization(format!(
            "expected {} values, got {}",
            hdr.count(),
            words.len()
        )));
    }
    Ok(words)
}

/// Encodes variable-length keys (sorted vertex global IDs, parent IDs, ...).
pub fn encode_keys(keys: &[Vec<u64>]) -> Vec<u8> {
    let words: usize = keys.iter().map(|k| k.len() + 1).sum();
    let mut out = Vec::with_capacity(size_of::<WireHdr>() + 8 * words);
    out.extend_from_slice(bytemuck::bytes_of(&WireHdr::new(WireKind::Keys, keys.len())));
    for key in keys {
        push_word(&mut out, key.len() as u64);
        for &w in key {
            push_word(&mut out, w);
        }
    }
    out
}

pub fn decode_keys(bytes: &[u8]) -> Result<Vec<Vec<u64>>, MeshError> {
    let (hdr, words) = read_header(bytes, WireKind::Keys)?;
    let mut keys = Vec::with_capacity(hdr.count());
    let mut rest = words.as_slice();
    for _ in 0..hdr.count() {
        let (&len, tail) = rest
            .split_first()
            .ok_or_else(|| MeshError::Serialization("truncated key list".into()))?;
        let len = len as usize;
        if tail.len() < len {
            return Err(MeshError::Serialization("truncated key".into()));
        }
        keys.push(tail[..len].to_vec());
        rest = &tail[len..];
    }
    if !rest.is_empty() {
        return Err(MeshError::Serialization(format!(
            "{} trailing words after key list",
            rest.len()
        )));
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_survive_unaligned_buffers() {
        let enc = encode_values(&[1, u64::MAX, 42]);
        let mut shifted = vec![0u8];
        shifted.extend_from_slice(&enc);
        assert_eq!(decode_values(&shifted[1..]).unwrap(), vec![1, u64::MAX, 42]);
    }

    #[test]
    fn keys_keep_their_lengths() {
        let keys = vec![vec![3, 9], vec![], vec![1, 2, 5, 8]];
        assert_eq!(decode_keys(&encode_keys(&keys)).unwrap(), keys);
    }

    #[test]
    fn kind_and_truncation_are_checked() {
        let enc = encode_values(&[7]);
        assert!(decode_keys(&enc).is_err());
        assert!(decode_values(&enc[..enc.len() - 3]).is_err());
        let keys = encode_keys(&[vec![1, 2]]);
        assert!(decode_keys(&keys[..keys.len() - 8]).is_err());
    }
}
