//! DNS wire format: parsing, synthesis, and the TTL policy applied to
//! cached replies before they are handed back to a client.

mod enums;
mod header;
mod message;
mod name;
mod question;
mod record;

pub use enums::{DNSResourceClass, DNSResourceType};
pub use header::DNSHeader;
pub use message::{CacheKey, DNSMessage, RcodeClass};
pub use question::DNSQuestion;
pub use record::DNSResourceRecord;

#[cfg(test)]
pub(crate) use name::encode_name;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("packet truncated")]
    Truncated,
    #[error("label exceeds 63 bytes")]
    LabelTooLong,
    #[error("label is not valid UTF-8")]
    InvalidLabel,
    #[error("compression pointer points forward or loops")]
    BadCompressionPointer,
    #[error("too many compression jumps")]
    CompressionLoop,
    #[error("resource record rdata length exceeds packet bounds")]
    RdataOutOfBounds,
}

pub type Result<T> = std::result::Result<T, WireError>;
