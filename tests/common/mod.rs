//! Shared helpers for resilientdns's black-box integration tests: raw wire
//! construction for a single-question query/reply pair, so each test file
//! doesn't hand-roll its own encoder.

#![allow(dead_code)]

use resilientdns::wire::{DNSHeader, DNSQuestion, DNSResourceClass, DNSResourceType};

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

pub fn build_query(id: u16, qname: &str, qtype: DNSResourceType) -> Vec<u8> {
    let header = DNSHeader {
        id,
        rd: true,
        qdcount: 1,
        ..Default::default()
    };
    let mut buf = Vec::new();
    header.write(&mut buf).unwrap();
    let question = DNSQuestion {
        qname: qname.to_string(),
        qtype,
        qclass: DNSResourceClass::IN,
    };
    question.write(&mut buf);
    buf
}

/// Builds a positive A-record reply echoing the transaction id of `query`.
pub fn build_a_reply(query: &[u8], qname: &str, ttl: u32, addr: [u8; 4]) -> Vec<u8> {
    let id = u16::from_be_bytes([query[0], query[1]]);
    let header = DNSHeader {
        id,
        qr: true,
        rd: true,
        ra: true,
        qdcount: 1,
        ancount: 1,
        ..Default::default()
    };
    let mut buf = Vec::new();
    header.write(&mut buf).unwrap();
    let question = DNSQuestion {
        qname: qname.to_string(),
        qtype: DNSResourceType::A,
        qclass: DNSResourceClass::IN,
    };
    question.write(&mut buf);
    buf.extend_from_slice(&encode_name(qname));
    buf.extend_from_slice(&1u16.to_be_bytes()); // TYPE A
    buf.extend_from_slice(&1u16.to_be_bytes()); // CLASS IN
    buf.extend_from_slice(&ttl.to_be_bytes());
    buf.extend_from_slice(&4u16.to_be_bytes());
    buf.extend_from_slice(&addr);
    buf
}

/// Builds an NXDOMAIN reply with an authority-section SOA record, for
/// RFC 2308 negative-TTL tests.
pub fn build_nxdomain_reply(query: &[u8], qname: &str, soa_minimum: u32) -> Vec<u8> {
    let id = u16::from_be_bytes([query[0], query[1]]);
    let header = DNSHeader {
        id,
        qr: true,
        rd: true,
        ra: true,
        rcode: 3, // NXDOMAIN
        qdcount: 1,
        nscount: 1,
        ..Default::default()
    };
    let mut buf = Vec::new();
    header.write(&mut buf).unwrap();
    let question = DNSQuestion {
        qname: qname.to_string(),
        qtype: DNSResourceType::A,
        qclass: DNSResourceClass::IN,
    };
    question.write(&mut buf);

    // Authority SOA for the parent zone.
    let zone = qname.splitn(2, '.').nth(1).unwrap_or(qname);
    buf.extend_from_slice(&encode_name(zone));
    buf.extend_from_slice(&6u16.to_be_bytes()); // TYPE SOA
    buf.extend_from_slice(&1u16.to_be_bytes()); // CLASS IN
    buf.extend_from_slice(&3600u32.to_be_bytes()); // TTL
    let mut rdata = Vec::new();
    rdata.extend_from_slice(&encode_name(&format!("ns.{zone}")));
    rdata.extend_from_slice(&encode_name(&format!("hostmaster.{zone}")));
    rdata.extend_from_slice(&1u32.to_be_bytes()); // serial
    rdata.extend_from_slice(&7200u32.to_be_bytes()); // refresh
    rdata.extend_from_slice(&3600u32.to_be_bytes()); // retry
    rdata.extend_from_slice(&1_209_600u32.to_be_bytes()); // expire
    rdata.extend_from_slice(&soa_minimum.to_be_bytes()); // minimum
    buf.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
    buf.extend_from_slice(&rdata);
    buf
}
