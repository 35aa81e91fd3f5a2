//! Algorithm tag — a closed set of three PoW coin families (spec.md §3).
//!
//! The core treats this as an opaque tag; kernel selection per tag lives in
//! [`crate::kernels`].

use std::fmt;
use std::str::FromStr;

use crate::error::DaemonError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Algorithm {
    EthHash,
    EtcHash,
    UbqHash,
}

impl Algorithm {
    pub const ALL: [Algorithm; 3] = [Algorithm::EthHash, Algorithm::EtcHash, Algorithm::UbqHash];

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::EthHash => "ethash",
            Algorithm::EtcHash => "etchash",
            Algorithm::UbqHash => "ubqhash",
        }
    }

    /// Whether this algorithm uses the ubqhash variant of the mkcache
    /// kernels (§4.1 step 2/3: "A₂ uses the ubqhash variant; others share
    /// the common variant").
    pub fn uses_ubqhash_kernels(self) -> bool {
        matches!(self, Algorithm::UbqHash)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = DaemonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ethash" => Ok(Algorithm::EthHash),
            "etchash" => Ok(Algorithm::EtcHash),
            "ubqhash" => Ok(Algorithm::UbqHash),
            other => Err(DaemonError::UnknownAlgorithm(other.to_string())),
        }
    }
}

impl Default for Algorithm {
    fn default() -> Self {
        Algorithm::EthHash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_name() {
        for algo in Algorithm::ALL {
            assert_eq!(Algorithm::from_str(algo.name()).unwrap(), algo);
        }
    }

    #[test]
    fn rejects_unknown() {
        assert!(Algorithm::from_str("kawpow").is_err());
    }

    #[test]
    fn only_ubqhash_uses_ubqhash_kernels() {
        assert!(Algorithm::UbqHash.uses_ubqhash_kernels());
        assert!(!Algorithm::EthHash.uses_ubqhash_kernels());
        assert!(!Algorithm::EtcHash.uses_ubqhash_kernels());
    }
}
