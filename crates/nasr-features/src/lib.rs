//! Airport and runway facilities backed by `nasr-cache`.
//!
//! Each feature type has a codec that defines its cache entry layout and the
//! index summary kept for it while it is not loaded:
//!
//! - runways are summarized by designator (`09L/27R`), which is enough to list
//!   an airport's runways without loading them;
//! - airports are summarized by name, IATA designator and ICAO identifier,
//!   which drive the lookups on [`FacilityCaches`].
//!
//! Airports refer to their runways through [`RunwayLink`]s, lazy references
//! into the runway store.

mod airport;
mod facility;
mod geo;
mod runway;

pub use airport::{
    Airport, AirportCodec, AirportSummary, BasedAircraft, FacilityType, Ownership, UnknownVariant,
};
pub use facility::{AirportStore, FacilityCaches};
pub use geo::GeoCoordinate;
pub use runway::{Runway, RunwayCodec, RunwayEnd, RunwayLink, RunwayStore};

use nasr_cache::CacheError;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("airport {0} is not in the airport cache")]
    UnknownAirport(Uuid),

    #[error("runway {0} is not in the runway cache")]
    UnknownRunway(Uuid),
}
