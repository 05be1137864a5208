//! Resource record TYPE/CLASS values. Only the mnemonics needed to parse
//! a warmup file and to recognize SOA for negative-TTL extraction are
//! enumerated by name; everything else round-trips through `Other(u16)`.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DNSResourceType {
    A,
    AAAA,
    NS,
    CNAME,
    SOA,
    PTR,
    MX,
    TXT,
    SRV,
    CAA,
    NAPTR,
    DNSKEY,
    DS,
    TLSA,
    HTTPS,
    SVCB,
    Other(u16),
}

impl From<u16> for DNSResourceType {
    fn from(v: u16) -> Self {
        match v {
            1 => Self::A,
            2 => Self::NS,
            5 => Self::CNAME,
            6 => Self::SOA,
            12 => Self::PTR,
            15 => Self::MX,
            16 => Self::TXT,
            28 => Self::AAAA,
            33 => Self::SRV,
            43 => Self::DS,
            48 => Self::DNSKEY,
            52 => Self::TLSA,
            35 => Self::NAPTR,
            257 => Self::CAA,
            65 => Self::HTTPS,
            64 => Self::SVCB,
            other => Self::Other(other),
        }
    }
}

impl From<DNSResourceType> for u16 {
    fn from(t: DNSResourceType) -> u16 {
        match t {
            DNSResourceType::A => 1,
            DNSResourceType::NS => 2,
            DNSResourceType::CNAME => 5,
            DNSResourceType::SOA => 6,
            DNSResourceType::PTR => 12,
            DNSResourceType::MX => 15,
            DNSResourceType::TXT => 16,
            DNSResourceType::AAAA => 28,
            DNSResourceType::SRV => 33,
            DNSResourceType::DS => 43,
            DNSResourceType::DNSKEY => 48,
            DNSResourceType::TLSA => 52,
            DNSResourceType::NAPTR => 35,
            DNSResourceType::CAA => 257,
            DNSResourceType::HTTPS => 65,
            DNSResourceType::SVCB => 64,
            DNSResourceType::Other(v) => v,
        }
    }
}

impl DNSResourceType {
    /// Parses the IANA mnemonic used in warmup files (case-insensitive).
    /// Unrecognized mnemonics are rejected rather than mapped to `Other`,
    /// since a warmup line with a typo'd type should be counted invalid,
    /// not silently resolved as some arbitrary numeric type.
    pub fn parse_mnemonic(s: &str) -> Option<Self> {
        Some(match s.to_ascii_uppercase().as_str() {
            "A" => Self::A,
            "AAAA" => Self::AAAA,
            "NS" => Self::NS,
            "CNAME" => Self::CNAME,
            "SOA" => Self::SOA,
            "PTR" => Self::PTR,
            "MX" => Self::MX,
            "TXT" => Self::TXT,
            "SRV" => Self::SRV,
            "CAA" => Self::CAA,
            "NAPTR" => Self::NAPTR,
            "DNSKEY" => Self::DNSKEY,
            "DS" => Self::DS,
            "TLSA" => Self::TLSA,
            "HTTPS" => Self::HTTPS,
            "SVCB" => Self::SVCB,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DNSResourceClass {
    IN,
    Other(u16),
}

impl From<u16> for DNSResourceClass {
    fn from(v: u16) -> Self {
        match v {
            1 => Self::IN,
            other => Self::Other(other),
        }
    }
}

impl From<DNSResourceClass> for u16 {
    fn from(c: DNSResourceClass) -> u16 {
        match c {
            DNSResourceClass::IN => 1,
            DNSResourceClass::Other(v) => v,
        }
    }
}
