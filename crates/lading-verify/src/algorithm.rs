use std::str::FromStr;

use crate::VerificationError;

/// Digest algorithms the checksum pipeline knows how to compute and name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    pub const ALL: [DigestAlgorithm; 5] = [
        DigestAlgorithm::Md5,
        DigestAlgorithm::Sha1,
        DigestAlgorithm::Sha256,
        DigestAlgorithm::Sha384,
        DigestAlgorithm::Sha512,
    ];

    /// Conventional algorithm name, as used in timing hooks and logs.
    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "MD5",
            DigestAlgorithm::Sha1 => "SHA-1",
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha384 => "SHA-384",
            DigestAlgorithm::Sha512 => "SHA-512",
        }
    }

    /// Suffix of the sibling entry holding this digest.
    pub fn suffix(&self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => ".md5",
            DigestAlgorithm::Sha1 => ".sha1",
            DigestAlgorithm::Sha256 => ".sha256",
            DigestAlgorithm::Sha384 => ".sha384",
            DigestAlgorithm::Sha512 => ".sha512",
        }
    }

    /// Digest length in bytes.
    pub fn digest_length(&self) -> usize {
        match self {
            DigestAlgorithm::Md5 => 16,
            DigestAlgorithm::Sha1 => 20,
            DigestAlgorithm::Sha256 => 32,
            DigestAlgorithm::Sha384 => 48,
            DigestAlgorithm::Sha512 => 64,
        }
    }

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.suffix() == suffix)
    }
}

impl std::fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.name()) }
}

impl FromStr for DigestAlgorithm {
    type Err = VerificationError;

    /// Accepts `md5`, `SHA-1`, `sha1`, `sha256`, ... case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .trim_start_matches('.')
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();

        match normalized.as_str() {
            "md5" => Ok(DigestAlgorithm::Md5),
            "sha1" => Ok(DigestAlgorithm::Sha1),
            "sha256" => Ok(DigestAlgorithm::Sha256),
            "sha384" => Ok(DigestAlgorithm::Sha384),
            "sha512" => Ok(DigestAlgorithm::Sha512),
            _ => Err(VerificationError::UnknownAlgorithm(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("md5".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Md5);
        assert_eq!("SHA-1".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Sha1);
        assert_eq!(".sha256".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Sha256);
        assert!("crc32".parse::<DigestAlgorithm>().is_err());
    }

    #[test]
    fn test_suffix_round_trip() {
        for algorithm in DigestAlgorithm::ALL {
            assert_eq!(DigestAlgorithm::from_suffix(algorithm.suffix()), Some(algorithm));
        }
        assert_eq!(DigestAlgorithm::from_suffix(".asc"), None);
    }
}
