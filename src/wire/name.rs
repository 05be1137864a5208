//! RFC 1035 §4.1.4 domain name encode/decode, including compression
//! pointer support on decode. Grounded on the teacher's
//! `dns::common::PacketComponent::read_labels_with_buffer` pointer-jump
//! logic, rewritten over a plain byte cursor instead of a bit reader so
//! random-access pointer follows stay simple.

use super::{Result, WireError};

const MAX_POINTER_JUMPS: usize = 32;
const MAX_LABEL_LEN: usize = 63;

/// Decode a domain name starting at `pos` in `buf`, following compression
/// pointers as needed. Returns the canonicalized (lowercased) dotted name
/// and the position immediately after the name *as it appears at `pos`*
/// (a followed pointer does not advance this).
pub fn decode_name(buf: &[u8], pos: usize) -> Result<(String, usize)> {
    let mut labels: Vec<String> = Vec::new();
    let mut cursor = pos;
    let mut end_pos: Option<usize> = None;
    let mut jumps = 0usize;

    loop {
        let len = *buf.get(cursor).ok_or(WireError::Truncated)? as usize;

        if len == 0 {
            if end_pos.is_none() {
                end_pos = Some(cursor + 1);
            }
            break;
        }

        if len & 0xC0 == 0xC0 {
            let hi = (len & 0x3F) as usize;
            let lo = *buf.get(cursor + 1).ok_or(WireError::Truncated)? as usize;
            let pointer = (hi << 8) | lo;

            if end_pos.is_none() {
                end_pos = Some(cursor + 2);
            }

            jumps += 1;
            if jumps > MAX_POINTER_JUMPS || pointer >= cursor {
                return Err(WireError::CompressionLoop);
            }
            cursor = pointer;
            continue;
        }

        if len > MAX_LABEL_LEN {
            return Err(WireError::LabelTooLong);
        }

        let start = cursor + 1;
        let stop = start + len;
        let bytes = buf.get(start..stop).ok_or(WireError::Truncated)?;
        let label = std::str::from_utf8(bytes).map_err(|_| WireError::InvalidLabel)?;
        labels.push(label.to_ascii_lowercase());
        cursor = stop;
    }

    let name = if labels.is_empty() {
        ".".to_string()
    } else {
        labels.join(".")
    };

    Ok((name, end_pos.unwrap_or(cursor)))
}

/// Encode a dotted domain name in uncompressed wire format.
pub fn encode_name(name: &str) -> Vec<u8> {
    let trimmed = name.trim_end_matches('.');
    let mut bytes = Vec::with_capacity(trimmed.len() + 2);

    if !trimmed.is_empty() {
        for label in trimmed.split('.') {
            let label = label.as_bytes();
            bytes.push(label.len() as u8);
            bytes.extend_from_slice(label);
        }
    }
    bytes.push(0);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_simple_name() {
        let wire = encode_name("Example.COM");
        let (name, end) = decode_name(&wire, 0).unwrap();
        assert_eq!(name, "example.com");
        assert_eq!(end, wire.len());
    }

    #[test]
    fn decodes_root() {
        let wire = encode_name("");
        let (name, end) = decode_name(&wire, 0).unwrap();
        assert_eq!(name, ".");
        assert_eq!(end, 1);
        assert_eq!(wire, vec![0]);
    }

    #[test]
    fn follows_compression_pointer() {
        let mut buf = encode_name("example.com");
        let pointer_pos = buf.len();
        buf.extend_from_slice(&[0xC0, 0x00]);
        let (name, end) = decode_name(&buf, pointer_pos).unwrap();
        assert_eq!(name, "example.com");
        assert_eq!(end, pointer_pos + 2);
    }

    #[test]
    fn rejects_self_referential_pointer() {
        let buf = vec![0xC0, 0x00];
        assert_eq!(decode_name(&buf, 0), Err(WireError::CompressionLoop));
    }

    #[test]
    fn rejects_oversize_label() {
        let mut buf = vec![64u8];
        buf.extend(std::iter::repeat(b'a').take(64));
        assert_eq!(decode_name(&buf, 0), Err(WireError::LabelTooLong));
    }
}
