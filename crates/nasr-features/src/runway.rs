use crate::geo::GeoCoordinate;
use nasr_cache::{CacheCodec, CacheEntry, CacheError, CacheLink, Result, SharedStore};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

pub(crate) mod fields {
    pub const DESIGNATOR: &str = "designator";
    pub const LENGTH: &str = "length";
    pub const WIDTH: &str = "width";
    pub const HAS_BASE_END: &str = "hasBaseEnd";
    pub const HAS_RECIPROCAL_END: &str = "hasReciprocalEnd";

    pub const BASE_END_PREFIX: &str = "base_";
    pub const RECIPROCAL_END_PREFIX: &str = "reciprocal_";

    pub const END_DESIGNATOR: &str = "endDesignator";
    pub const END_HAS_GEO_POSITION: &str = "endHasGeoPosition";
    pub const END_LATITUDE: &str = "endLatitude";
    pub const END_LONGITUDE: &str = "endLongitude";
}

pub type RunwayStore = SharedStore<Uuid, Runway, RunwayCodec>;

pub type RunwayLink = CacheLink<Uuid, Runway, RunwayCodec>;

/// One end of a runway, e.g. `09L`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunwayEnd {
    pub designator: String,
    pub position: Option<GeoCoordinate>,
}

impl RunwayEnd {
    fn encode(&self, prefix: &str, entry: &mut CacheEntry) {
        entry.put(format!("{prefix}{}", fields::END_DESIGNATOR), &self.designator);
        entry.put(
            format!("{prefix}{}", fields::END_HAS_GEO_POSITION),
            self.position.is_some(),
        );
        if let Some(position) = &self.position {
            entry.put(format!("{prefix}{}", fields::END_LATITUDE), position.latitude);
            entry.put(format!("{prefix}{}", fields::END_LONGITUDE), position.longitude);
        }
    }

    fn decode(prefix: &str, entry: &CacheEntry) -> Result<Self> {
        let field = |name: &str| format!("{prefix}{name}");
        let designator = entry
            .get_required(&field(fields::END_DESIGNATOR))?
            .to_string();
        let position = if entry.get_bool(&field(fields::END_HAS_GEO_POSITION))? {
            Some(GeoCoordinate::new(
                entry.get_f64(&field(fields::END_LATITUDE))?,
                entry.get_f64(&field(fields::END_LONGITUDE))?,
            ))
        } else {
            None
        };
        Ok(Self {
            designator,
            position,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Runway {
    /// E.g. `09L/27R`.
    pub designator: String,
    /// Feet.
    pub length: f64,
    /// Feet.
    pub width: f64,
    pub base_end: Option<RunwayEnd>,
    pub reciprocal_end: Option<RunwayEnd>,
}

impl Runway {
    pub fn new(designator: impl Into<String>, length: f64, width: f64) -> Self {
        Self {
            designator: designator.into(),
            length,
            width,
            base_end: None,
            reciprocal_end: None,
        }
    }

    /// Attach an end: the first one becomes the base end, later ones the
    /// reciprocal end.
    pub fn push_end(&mut self, end: RunwayEnd) {
        if self.base_end.is_none() {
            self.base_end = Some(end);
        } else {
            self.reciprocal_end = Some(end);
        }
    }

    pub fn ends(&self) -> impl Iterator<Item = &RunwayEnd> {
        self.base_end.iter().chain(self.reciprocal_end.iter())
    }
}

/// Runway codec. The summary is the runway designator, which lets airports
/// list their runway designators without loading any runway.
#[derive(Debug, Default)]
pub struct RunwayCodec {
    designators: HashMap<Uuid, String>,
}

impl RunwayCodec {
    pub fn designator(&self, key: &Uuid) -> Option<&str> {
        self.designators.get(key).map(String::as_str)
    }
}

impl CacheCodec<Uuid, Runway> for RunwayCodec {
    fn decode(&self, entry: &CacheEntry) -> Result<Runway> {
        let base_end = if entry.get_bool(fields::HAS_BASE_END)? {
            Some(RunwayEnd::decode(fields::BASE_END_PREFIX, entry)?)
        } else {
            None
        };
        let reciprocal_end = if entry.get_bool(fields::HAS_RECIPROCAL_END)? {
            Some(RunwayEnd::decode(fields::RECIPROCAL_END_PREFIX, entry)?)
        } else {
            None
        };

        Ok(Runway {
            designator: entry.get_required(fields::DESIGNATOR)?.to_string(),
            length: entry.get_f64(fields::LENGTH)?,
            width: entry.get_f64(fields::WIDTH)?,
            base_end,
            reciprocal_end,
        })
    }

    fn encode(&self, runway: &Runway, entry: &mut CacheEntry) {
        entry.put(fields::DESIGNATOR, &runway.designator);
        entry.put(fields::LENGTH, runway.length);
        entry.put(fields::WIDTH, runway.width);

        entry.put(fields::HAS_BASE_END, runway.base_end.is_some());
        if let Some(end) = &runway.base_end {
            end.encode(fields::BASE_END_PREFIX, entry);
        }
        entry.put(fields::HAS_RECIPROCAL_END, runway.reciprocal_end.is_some());
        if let Some(end) = &runway.reciprocal_end {
            end.encode(fields::RECIPROCAL_END_PREFIX, entry);
        }
    }

    fn encode_key(&self, key: &Uuid) -> String {
        key.to_string()
    }

    fn decode_key(&self, raw: &str) -> Result<Uuid> {
        decode_uuid(raw)
    }

    fn summarize(&self, runway: &Runway) -> Option<String> {
        Some(runway.designator.clone())
    }

    fn restore_summary(&mut self, key: &Uuid, summary: Option<&str>) -> Result<()> {
        self.designators
            .insert(*key, summary.unwrap_or_default().to_string());
        Ok(())
    }

    fn forget_summary(&mut self, key: &Uuid) {
        self.designators.remove(key);
    }

    fn clear_summaries(&mut self) {
        self.designators.clear();
    }
}

pub(crate) fn decode_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|err| CacheError::InvalidKey {
        key: raw.to_string(),
        reason: err.to_string(),
    })
}
