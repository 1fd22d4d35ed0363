use crate::error::Error;
use std::fmt;
use std::str::FromStr;

const ADDRESS_HEX_LEN: usize = 16;

/// An 8-byte Flow account address, stored as lowercase hex without prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlowAddress(String);

impl fmt::Display for FlowAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.0)
    }
}

impl FromStr for FlowAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.is_empty()
            || digits.len() > ADDRESS_HEX_LEN
            || !digits.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(Error::config(format!("invalid Flow address {s:?}")));
        }

        Ok(FlowAddress(format!(
            "{:0>width$}",
            digits.to_ascii_lowercase(),
            width = ADDRESS_HEX_LEN
        )))
    }
}
