//! Resource record envelope. Only the fields needed for TTL bookkeeping
//! and SOA-minimum extraction are parsed; RDATA is kept as an opaque byte
//! slice exactly as the teacher's cache derives negative TTLs by walking
//! raw rdata bytes rather than a fully typed RDATA enum
//! (`extract_soa_minimum_ttl` in `cache/mod.rs`).

use super::name::decode_name;
use super::{DNSResourceClass, DNSResourceType, Result, WireError};

#[derive(Debug, Clone)]
pub struct DNSResourceRecord {
    pub name: String,
    pub rtype: DNSResourceType,
    pub rclass: DNSResourceClass,
    pub ttl: u32,
    /// Absolute offset of the 4-byte TTL field within the packet buffer
    /// this record was parsed from, used to patch TTLs in place on emit.
    pub ttl_offset: usize,
    pub rdata: Vec<u8>,
}

impl DNSResourceRecord {
    /// Decode one RR starting at `pos`; returns the record and the
    /// position immediately following it.
    pub fn read(buf: &[u8], pos: usize) -> Result<(Self, usize)> {
        let (name, pos) = decode_name(buf, pos)?;

        let field = |at: usize, len: usize| -> Result<&[u8]> {
            buf.get(at..at + len).ok_or(WireError::Truncated)
        };

        let rtype = u16::from_be_bytes(field(pos, 2)?.try_into().unwrap());
        let rclass = u16::from_be_bytes(field(pos + 2, 2)?.try_into().unwrap());
        let ttl_offset = pos + 4;
        let ttl = u32::from_be_bytes(field(ttl_offset, 4)?.try_into().unwrap());
        let rdlength = u16::from_be_bytes(field(pos + 8, 2)?.try_into().unwrap()) as usize;

        let rdata_start = pos + 10;
        let rdata_end = rdata_start + rdlength;
        let rdata = buf
            .get(rdata_start..rdata_end)
            .ok_or(WireError::RdataOutOfBounds)?
            .to_vec();

        Ok((
            DNSResourceRecord {
                name,
                rtype: rtype.into(),
                rclass: rclass.into(),
                ttl,
                ttl_offset,
                rdata,
            },
            rdata_end,
        ))
    }

    /// SOA MINIMUM field (RFC 1035 §3.3.13, last 4 bytes of rdata), used
    /// for RFC 2308 negative-TTL derivation. `buf` is the full packet the
    /// record was parsed from, since MNAME/RNAME inside rdata may end in
    /// a compression pointer back into it.
    pub fn soa_minimum(&self, buf: &[u8], rdata_start_in_buf: usize) -> Result<u32> {
        let (_, pos) = decode_name(buf, rdata_start_in_buf)?;
        let (_, pos) = decode_name(buf, pos)?;
        let min_field = buf
            .get(pos + 16..pos + 20)
            .ok_or(WireError::RdataOutOfBounds)?;
        Ok(u32::from_be_bytes(min_field.try_into().unwrap()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::name::encode_name;

    fn a_record(ttl: u32) -> Vec<u8> {
        let mut buf = encode_name("example.com");
        buf.extend_from_slice(&1u16.to_be_bytes()); // A
        buf.extend_from_slice(&1u16.to_be_bytes()); // IN
        buf.extend_from_slice(&ttl.to_be_bytes());
        buf.extend_from_slice(&4u16.to_be_bytes());
        buf.extend_from_slice(&[93, 184, 216, 34]);
        buf
    }

    #[test]
    fn parses_envelope_and_rdata() {
        let buf = a_record(300);
        let (rr, end) = DNSResourceRecord::read(&buf, 0).unwrap();
        assert_eq!(rr.name, "example.com");
        assert_eq!(rr.rtype, DNSResourceType::A);
        assert_eq!(rr.ttl, 300);
        assert_eq!(rr.rdata, vec![93, 184, 216, 34]);
        assert_eq!(end, buf.len());
    }

    #[test]
    fn rejects_rdata_past_buffer() {
        let mut buf = a_record(300);
        let len = buf.len();
        buf.truncate(len - 2);
        assert_eq!(DNSResourceRecord::read(&buf, 0), Err(WireError::RdataOutOfBounds));
    }
}
