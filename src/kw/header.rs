use serde::{Deserialize, Serialize};

use crate::error::{EclError, Result};
use crate::fortio::Endian;
use crate::kw::types::{EclType, STRING8_LEN};

/// Payload length of a header record: name, count, type code.
pub const HEADER_LEN: usize = STRING8_LEN + 4 + 4;

/// Immutable keyword metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeywordHeader {
    name:  String,
    count: usize,
    ty:    EclType,
}

impl KeywordHeader {
    pub fn new(name: &str, count: usize, ty: EclType) -> Result<Self> {
        let name = validate_name(name)?;
        if count > i32::MAX as usize {
            return Err(EclError::InvalidValue(format!(
                "element count {count} does not fit the header"
            )));
        }
        Ok(Self { name, count, ty })
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn count(&self) -> usize { self.count }
    pub fn ecl_type(&self) -> EclType { self.ty }

    pub(crate) fn renamed(&self, name: &str) -> Result<Self> {
        Ok(Self { name: validate_name(name)?, ..self.clone() })
    }

    /// Total payload bytes of the data records, markers excluded.
    pub fn data_bytes(&self) -> u64 {
        self.count as u64 * self.ty.element_size() as u64
    }

    /// Number of data records a writer produces for this header.
    pub fn data_records(&self) -> usize {
        if self.data_bytes() == 0 {
            return 0;
        }
        let block = self.ty.block_size();
        (self.count + block - 1) / block
    }

    pub fn encode(&self, endian: Endian) -> [u8; HEADER_LEN] {
        let mut buf = [b' '; HEADER_LEN];
        for (slot, c) in buf[..STRING8_LEN].iter_mut().zip(self.name.chars()) {
            *slot = c as u8;
        }
        endian.write_i32(&mut buf[STRING8_LEN..STRING8_LEN + 4], self.count as i32);
        buf[STRING8_LEN + 4..].copy_from_slice(&self.ty.code());
        buf
    }

    /// Parse a header record payload.  `offset` is only used for error
    /// reporting.
    pub fn decode(bytes: &[u8], endian: Endian, offset: u64) -> Result<Self> {
        if bytes.len() != HEADER_LEN {
            return Err(EclError::format(offset, format!(
                "header record holds {} bytes, expected {HEADER_LEN}", bytes.len()
            )));
        }
        let name = latin1(&bytes[..STRING8_LEN]);
        let name = name.trim_end_matches(' ');
        if name.is_empty() {
            return Err(EclError::format(offset, "blank keyword name"));
        }
        let count = endian.read_i32(&bytes[STRING8_LEN..STRING8_LEN + 4]);
        if count < 0 {
            return Err(EclError::format(offset, format!(
                "keyword {name} declares negative element count {count}"
            )));
        }
        let mut code = [0u8; 4];
        code.copy_from_slice(&bytes[STRING8_LEN + 4..]);
        let ty = EclType::from_code(&code).ok_or_else(|| EclError::format(offset, format!(
            "keyword {name} has unknown type tag {:?}", latin1(&code)
        )))?;
        Ok(Self { name: name.to_owned(), count: count as usize, ty })
    }
}

/// Names are at most eight single-byte characters; trailing blanks are
/// padding and are dropped.  Longer names are rejected, never cut.
pub fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim_end_matches(' ');
    if trimmed.is_empty()
        || trimmed.chars().count() > STRING8_LEN
        || trimmed.chars().any(|c| (c as u32) > 0xFF)
    {
        return Err(EclError::InvalidName(name.to_owned()));
    }
    Ok(trimmed.to_owned())
}

pub(crate) fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}
