use std::fmt;
use std::str::FromStr;

use crate::ChecksumError;

/// Algorithms that can be computed locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecksumAlgorithm {
    Sha256,
    Md5,
    Crc32,
}

impl ChecksumAlgorithm {
    /// Canonical upper-case name, as control planes spell it.
    pub fn name(self) -> &'static str {
        match self {
            ChecksumAlgorithm::Sha256 => "SHA256",
            ChecksumAlgorithm::Md5 => "MD5",
            ChecksumAlgorithm::Crc32 => "CRC32",
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = ChecksumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_uppercase();
        match key.as_str() {
            "SHA256" => Ok(ChecksumAlgorithm::Sha256),
            "MD5" => Ok(ChecksumAlgorithm::Md5),
            "CRC32" => Ok(ChecksumAlgorithm::Crc32),
            _ => Err(ChecksumError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}
