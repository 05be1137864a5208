//! Whole-message parse/synthesis plus the TTL policy: minimum-TTL
//! selection on insert, RFC 2308 SOA-minimum negative TTL, and the
//! monotonic TTL rewrite applied to every served reply.

use super::header::DNSHeader;
use super::name::encode_name;
use super::question::DNSQuestion;
use super::record::DNSResourceRecord;
use super::{DNSResourceClass, DNSResourceType, Result, WireError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RcodeClass {
    Positive,
    Negative,
}

/// Canonicalized `(qname, qtype, qclass)` triple. Name comparisons are
/// case-insensitive per RFC 1035 §2.3.3; `decode_name` already lowercases
/// on parse, `CacheKey::new` lowercases an externally supplied qname too.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub qname: String,
    pub qtype: DNSResourceType,
    pub qclass: DNSResourceClass,
}

impl CacheKey {
    pub fn new(qname: &str, qtype: DNSResourceType, qclass: DNSResourceClass) -> Self {
        CacheKey {
            qname: qname.trim_end_matches('.').to_ascii_lowercase(),
            qtype,
            qclass,
        }
    }

    pub fn from_question(q: &DNSQuestion) -> Self {
        Self::new(&q.qname, q.qtype, q.qclass)
    }
}

/// A fully parsed DNS message. `tail` holds the answer+authority+additional
/// sections exactly as received; RR envelopes parsed out of it are in
/// `records`, ordered answer, then authority, then additional, with
/// `ttl_offset` measured relative to `tail`'s start so a reply can be
/// re-emitted by patching TTLs in place rather than re-encoding RDATA.
#[derive(Debug, Clone)]
pub struct DNSMessage {
    pub header: DNSHeader,
    pub question: Option<DNSQuestion>,
    pub records: Vec<DNSResourceRecord>,
    pub tail: Vec<u8>,
}

impl DNSMessage {
    /// Parses a full message. Only single-question messages are accepted;
    /// `qdcount != 1` is rejected as malformed for this resolver's purposes
    /// (a forwarder never needs to handle multi-question queries).
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let header = DNSHeader::read(buf)?;
        if header.qdcount != 1 {
            return Err(WireError::Truncated);
        }

        let (question, qend) = DNSQuestion::read(buf, DNSHeader::WIRE_LEN)?;
        let tail_start = qend;

        let total_rrs = header.ancount as usize + header.nscount as usize + header.arcount as usize;
        let mut records = Vec::with_capacity(total_rrs);
        let mut pos = tail_start;
        for _ in 0..total_rrs {
            let (rr, next) = DNSResourceRecord::read(buf, pos)?;
            records.push(rr);
            pos = next;
        }

        let tail = buf.get(tail_start..).ok_or(WireError::Truncated)?.to_vec();
        for rr in &mut records {
            rr.ttl_offset -= tail_start;
        }

        Ok(DNSMessage {
            header,
            question: Some(question),
            records,
            tail,
        })
    }

    pub fn cache_key(&self) -> Option<CacheKey> {
        self.question.as_ref().map(CacheKey::from_question)
    }

    pub fn rcode_class(&self) -> RcodeClass {
        const NXDOMAIN: u8 = 3;
        let nodata = self.header.rcode == 0 && self.header.ancount == 0;
        if self.header.rcode == NXDOMAIN || nodata {
            RcodeClass::Negative
        } else {
            RcodeClass::Positive
        }
    }

    /// Minimum RR TTL across the answer+authority sections (the additional
    /// section, e.g. EDNS OPT, is excluded per the insert-time TTL rule).
    pub fn min_answer_authority_ttl(&self) -> Option<u32> {
        let count = self.header.ancount as usize + self.header.nscount as usize;
        self.records[..count.min(self.records.len())]
            .iter()
            .map(|r| r.ttl)
            .min()
    }

    /// RFC 2308 negative-TTL source: the MINIMUM field of the authority
    /// section's SOA record, if present.
    pub fn soa_minimum_ttl(&self, original_buf: &[u8]) -> Option<u32> {
        let an = self.header.ancount as usize;
        let ns = self.header.nscount as usize;
        let authority = self.records.get(an..an + ns)?;
        let soa = authority.iter().find(|r| r.rtype == DNSResourceType::SOA)?;
        let rdata_start = original_buf.len() - self.tail.len() + soa.ttl_offset + 6;
        soa.soa_minimum(original_buf, rdata_start).ok()
    }

    /// Serializes a reply for `client_id`/`client_question`, rewriting the
    /// header id and every RR TTL by subtracting `age_seconds`, floored at
    /// 1. `client_question` must encode to the same byte length as the
    /// question this message was parsed with (true whenever it is the same
    /// domain name, since encoding never compresses and case does not
    /// change label length) so the stored tail's compression pointers,
    /// which may point back into the question, stay valid.
    pub fn serialize_reply(&self, client_id: u16, client_question: &DNSQuestion, age_seconds: u32) -> Vec<u8> {
        let mut out = Vec::with_capacity(DNSHeader::WIRE_LEN + self.tail.len() + 32);
        let mut header = self.header;
        header.id = client_id;
        header.write(&mut out).expect("writing to a Vec never fails");

        client_question.write(&mut out);

        let mut tail = self.tail.clone();
        for rr in &self.records {
            let original = rr.ttl;
            let remaining = original.saturating_sub(age_seconds);
            let rewritten = remaining.max(1);
            let bytes = rewritten.to_be_bytes();
            tail[rr.ttl_offset..rr.ttl_offset + 4].copy_from_slice(&bytes);
        }
        out.extend_from_slice(&tail);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::{DNSResourceClass as Class, DNSResourceType as Type};

    fn sample_query() -> Vec<u8> {
        let header = DNSHeader {
            id: 1,
            rd: true,
            qdcount: 1,
            ..Default::default()
        };
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        let q = DNSQuestion {
            qname: "example.com".to_string(),
            qtype: Type::A,
            qclass: Class::IN,
        };
        q.write(&mut buf);
        buf
    }

    fn sample_reply(ttl: u32) -> Vec<u8> {
        let mut buf = sample_query();
        // patch ancount to 1
        buf[6] = 0;
        buf[7] = 1;
        buf.extend_from_slice(&encode_name("example.com"));
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&ttl.to_be_bytes());
        buf.extend_from_slice(&4u16.to_be_bytes());
        buf.extend_from_slice(&[93, 184, 216, 34]);
        buf
    }

    #[test]
    fn parses_reply_and_derives_key() {
        let buf = sample_reply(300);
        let msg = DNSMessage::parse(&buf).unwrap();
        let key = msg.cache_key().unwrap();
        assert_eq!(key.qname, "example.com");
        assert_eq!(key.qtype, Type::A);
        assert_eq!(msg.min_answer_authority_ttl(), Some(300));
        assert_eq!(msg.rcode_class(), RcodeClass::Positive);
    }

    #[test]
    fn rewrites_ttl_and_client_id_on_emit() {
        let buf = sample_reply(300);
        let msg = DNSMessage::parse(&buf).unwrap();
        let client_q = msg.question.clone().unwrap();
        let out = msg.serialize_reply(0xABCD, &client_q, 290);
        let reparsed = DNSMessage::parse(&out).unwrap();
        assert_eq!(reparsed.header.id, 0xABCD);
        assert_eq!(reparsed.records[0].ttl, 10);
    }

    #[test]
    fn floors_ttl_at_one_second() {
        let buf = sample_reply(5);
        let msg = DNSMessage::parse(&buf).unwrap();
        let client_q = msg.question.clone().unwrap();
        let out = msg.serialize_reply(1, &client_q, 9000);
        let reparsed = DNSMessage::parse(&out).unwrap();
        assert_eq!(reparsed.records[0].ttl, 1);
    }

    #[test]
    fn detects_nodata_as_negative() {
        let mut buf = sample_query();
        // ancount already 0; rcode already 0 (NOERROR) -> NODATA
        let msg = DNSMessage::parse(&buf).unwrap();
        assert_eq!(msg.rcode_class(), RcodeClass::Negative);
        let _ = &mut buf;
    }
}
