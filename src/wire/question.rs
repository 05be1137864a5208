//! RFC 1035 §4.1.2 question section entry.

use super::name::{decode_name, encode_name};
use super::{DNSResourceClass, DNSResourceType, Result, WireError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DNSQuestion {
    pub qname: String,
    pub qtype: DNSResourceType,
    pub qclass: DNSResourceClass,
}

impl DNSQuestion {
    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&encode_name(&self.qname));
        out.extend_from_slice(&u16::from(self.qtype).to_be_bytes());
        out.extend_from_slice(&u16::from(self.qclass).to_be_bytes());
    }

    /// Decode a question starting at `pos`; returns the question and the
    /// position immediately following it.
    pub fn read(buf: &[u8], pos: usize) -> Result<(Self, usize)> {
        let (qname, pos) = decode_name(buf, pos)?;
        let qtype = u16::from_be_bytes(
            buf.get(pos..pos + 2)
                .ok_or(WireError::Truncated)?
                .try_into()
                .unwrap(),
        );
        let qclass = u16::from_be_bytes(
            buf.get(pos + 2..pos + 4)
                .ok_or(WireError::Truncated)?
                .try_into()
                .unwrap(),
        );
        Ok((
            DNSQuestion {
                qname,
                qtype: qtype.into(),
                qclass: qclass.into(),
            },
            pos + 4,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_question() {
        let q = DNSQuestion {
            qname: "Example.com".to_string(),
            qtype: DNSResourceType::A,
            qclass: DNSResourceClass::IN,
        };
        let mut buf = Vec::new();
        q.write(&mut buf);
        let (parsed, end) = DNSQuestion::read(&buf, 0).unwrap();
        assert_eq!(end, buf.len());
        assert_eq!(parsed.qname, "example.com");
        assert_eq!(parsed.qtype, DNSResourceType::A);
        assert_eq!(parsed.qclass, DNSResourceClass::IN);
    }
}
