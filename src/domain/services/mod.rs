mod broadcaster;
mod region_router;

pub use broadcaster::{Broadcaster, Generation};
pub use region_router::{RegionRouter, ReplayReason, RouteDecision};
