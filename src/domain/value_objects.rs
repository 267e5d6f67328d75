//! Value Objects - Immutable domain primitives
//!
//! Value objects are identified by their value rather than identity.
//! They are immutable and can be freely shared.

use serde::{Deserialize, Serialize};

/// Region an instance was started in when none is configured.
pub const LOCAL_REGION: &str = "local";

/// Deployment region code (e.g. `ord`, `sjc`, `lhr`).
///
/// Codes are opaque to this service: they are compared for equality and
/// echoed back in replay headers, nothing more.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionCode(String);

impl RegionCode {
    /// Build a region code, trimming surrounding whitespace.
    ///
    /// Blank input yields `None`.
    ///
    /// # Examples
    /// ```
    /// use replica_counter::RegionCode;
    ///
    /// assert_eq!(RegionCode::parse(" ord ").unwrap().as_str(), "ord");
    /// assert!(RegionCode::parse("  ").is_none());
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            None
        } else {
            Some(Self(s.to_string()))
        }
    }

    /// The sentinel region used when the environment names none.
    pub fn local() -> Self {
        Self(LOCAL_REGION.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RegionCode {
    fn default() -> Self {
        Self::local()
    }
}

impl std::fmt::Display for RegionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A region advertised to clients, flagged when it hosts the writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub code: RegionCode,
    pub primary: bool,
}

/// Build the advertised region list.
///
/// Order of `codes` is preserved, duplicates are dropped and the primary
/// is appended when missing, so exactly one entry is flagged primary.
pub fn region_list(codes: &[RegionCode], primary: &RegionCode) -> Vec<Region> {
    let mut regions: Vec<Region> = Vec::with_capacity(codes.len() + 1);
    for code in codes {
        if regions.iter().any(|r| &r.code == code) {
            continue;
        }
        regions.push(Region {
            code: code.clone(),
            primary: code == primary,
        });
    }
    if !regions.iter().any(|r| r.primary) {
        regions.push(Region {
            code: primary.clone(),
            primary: true,
        });
    }
    regions
}
