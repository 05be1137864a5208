//! RFC 1035 §4.1.1 message header, read/written bit-by-bit with
//! `bitstream-io` the same way the teacher's `dns::header` does.

use bitstream_io::{BigEndian, BitRead, BitReader, BitWrite, BitWriter};

use super::{Result, WireError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DNSHeader {
    pub id: u16,
    pub qr: bool,
    pub opcode: u8,
    pub aa: bool,
    pub tc: bool,
    pub rd: bool,
    pub ra: bool,
    pub z: u8,
    pub rcode: u8,
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

impl DNSHeader {
    pub const WIRE_LEN: usize = 12;

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut writer = BitWriter::endian(out, BigEndian);
        writer.write_var::<u16>(16, self.id).map_err(|_| WireError::Truncated)?;
        writer.write_var::<u8>(1, self.qr as u8).map_err(|_| WireError::Truncated)?;
        writer.write_var::<u8>(4, self.opcode).map_err(|_| WireError::Truncated)?;
        writer.write_var::<u8>(1, self.aa as u8).map_err(|_| WireError::Truncated)?;
        writer.write_var::<u8>(1, self.tc as u8).map_err(|_| WireError::Truncated)?;
        writer.write_var::<u8>(1, self.rd as u8).map_err(|_| WireError::Truncated)?;
        writer.write_var::<u8>(1, self.ra as u8).map_err(|_| WireError::Truncated)?;
        writer.write_var::<u8>(3, self.z).map_err(|_| WireError::Truncated)?;
        writer.write_var::<u8>(4, self.rcode).map_err(|_| WireError::Truncated)?;
        writer.write_var::<u16>(16, self.qdcount).map_err(|_| WireError::Truncated)?;
        writer.write_var::<u16>(16, self.ancount).map_err(|_| WireError::Truncated)?;
        writer.write_var::<u16>(16, self.nscount).map_err(|_| WireError::Truncated)?;
        writer.write_var::<u16>(16, self.arcount).map_err(|_| WireError::Truncated)?;
        Ok(())
    }

    pub fn read(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::WIRE_LEN {
            return Err(WireError::Truncated);
        }
        let mut reader = BitReader::endian(buf, BigEndian);
        let mut h = DNSHeader::default();
        h.id = reader.read_var::<u16>(16).map_err(|_| WireError::Truncated)?;
        h.qr = reader.read_var::<u8>(1).map_err(|_| WireError::Truncated)? == 1;
        h.opcode = reader.read_var::<u8>(4).map_err(|_| WireError::Truncated)?;
        h.aa = reader.read_var::<u8>(1).map_err(|_| WireError::Truncated)? == 1;
        h.tc = reader.read_var::<u8>(1).map_err(|_| WireError::Truncated)? == 1;
        h.rd = reader.read_var::<u8>(1).map_err(|_| WireError::Truncated)? == 1;
        h.ra = reader.read_var::<u8>(1).map_err(|_| WireError::Truncated)? == 1;
        h.z = reader.read_var::<u8>(3).map_err(|_| WireError::Truncated)?;
        h.rcode = reader.read_var::<u8>(4).map_err(|_| WireError::Truncated)?;
        h.qdcount = reader.read_var::<u16>(16).map_err(|_| WireError::Truncated)?;
        h.ancount = reader.read_var::<u16>(16).map_err(|_| WireError::Truncated)?;
        h.nscount = reader.read_var::<u16>(16).map_err(|_| WireError::Truncated)?;
        h.arcount = reader.read_var::<u16>(16).map_err(|_| WireError::Truncated)?;
        Ok(h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_header() {
        let h = DNSHeader {
            id: 0xBEEF,
            qr: true,
            opcode: 0,
            aa: false,
            tc: false,
            rd: true,
            ra: true,
            z: 0,
            rcode: 3,
            qdcount: 1,
            ancount: 0,
            nscount: 1,
            arcount: 0,
        };
        let mut buf = Vec::new();
        h.write(&mut buf).unwrap();
        assert_eq!(buf.len(), DNSHeader::WIRE_LEN);
        let parsed = DNSHeader::read(&buf).unwrap();
        assert_eq!(parsed, h);
    }

    #[test]
    fn rejects_truncated_header() {
        let buf = [0u8; 4];
        assert_eq!(DNSHeader::read(&buf), Err(WireError::Truncated));
    }
}
