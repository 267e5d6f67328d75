//! Region Router
//!
//! Decides, before any handler runs, whether this instance may serve a
//! request or must ask the edge to replay it in another region.
//! Pure logic: no I/O, no HTTP types.

use crate::domain::value_objects::RegionCode;

/// Why a request is being replayed elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayReason {
    /// Mutating request on a non-primary instance
    WriteToPrimary,
    /// Client asked for a specific region
    Requested,
}

/// Outcome of routing one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Serve here
    Local,
    /// Do not run the handler; replay in `region`
    Replay {
        region: RegionCode,
        reason: ReplayReason,
    },
}

/// Write-affinity and explicit-region routing for one instance.
#[derive(Debug, Clone)]
pub struct RegionRouter {
    current: RegionCode,
    primary: RegionCode,
}

impl RegionRouter {
    pub fn new(current: RegionCode, primary: RegionCode) -> Self {
        Self { current, primary }
    }

    pub fn current(&self) -> &RegionCode {
        &self.current
    }

    pub fn primary(&self) -> &RegionCode {
        &self.primary
    }

    pub fn is_primary(&self) -> bool {
        self.current == self.primary
    }

    /// Route a request.
    ///
    /// # Arguments
    /// * `mutating` - the request method is not a safe verb
    /// * `requested` - raw `region` query value, if any; blank means absent
    pub fn decide(&self, mutating: bool, requested: Option<&str>) -> RouteDecision {
        if mutating && !self.is_primary() {
            return RouteDecision::Replay {
                region: self.primary.clone(),
                reason: ReplayReason::WriteToPrimary,
            };
        }

        match requested.and_then(RegionCode::parse) {
            Some(region) if region != self.current => RouteDecision::Replay {
                region,
                reason: ReplayReason::Requested,
            },
            _ => RouteDecision::Local,
        }
    }
}
