use crate::geo::GeoCoordinate;
use crate::runway::{decode_uuid, Runway, RunwayLink, RunwayStore};
use nasr_cache::{CacheCodec, CacheEntry, CacheError, CacheLink, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

pub(crate) mod fields {
    pub const NAME: &str = "name";
    pub const IATA_DESIGNATOR: &str = "iataDesignator";
    pub const ICAO_IDENTIFIER: &str = "icaoIdentifier";
    pub const SITE_NUMBER: &str = "siteNumber";
    pub const PUBLIC_USE: &str = "publicUse";
    pub const ELEVATION: &str = "elevation";
    pub const LAND_AREA: &str = "landArea";
    pub const LATITUDE: &str = "latitude";
    pub const LONGITUDE: &str = "longitude";
    pub const OWNERSHIP: &str = "ownership";
    pub const FACILITY_TYPE: &str = "facilityType";
    pub const BASED_SINGLE_ENGINE: &str = "basedSingleEngineAircraft";
    pub const BASED_MULTI_ENGINE: &str = "basedMultiEngineAircraft";
    pub const BASED_JET_ENGINE: &str = "basedJetEngineAircraft";
    pub const BASED_HELICOPTERS: &str = "basedHelicopters";
    pub const BASED_GLIDERS: &str = "basedGliders";
    pub const BASED_MILITARY: &str = "basedMilitaryAircraft";
    pub const BASED_ULTRALIGHT: &str = "basedUltralightAircraft";
    pub const RUNWAYS: &str = "runways";
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Ownership {
    Public,
    Private,
    AirForce,
    Army,
    Navy,
    CoastGuard,
}

impl Ownership {
    pub const ALL: [Ownership; 6] = [
        Ownership::Public,
        Ownership::Private,
        Ownership::AirForce,
        Ownership::Army,
        Ownership::Navy,
        Ownership::CoastGuard,
    ];

    /// Name used in cache entries.
    pub fn as_str(self) -> &'static str {
        match self {
            Ownership::Public => "PUBLIC",
            Ownership::Private => "PRIVATE",
            Ownership::AirForce => "AIR_FORCE",
            Ownership::Army => "ARMY",
            Ownership::Navy => "NAVY",
            Ownership::CoastGuard => "COAST_GUARD",
        }
    }

    /// Map a NASR ownership code (`PU`, `PR`, `MA`, `MR`, `MN`, `CG`).
    /// Unknown military codes fall back to the coast guard, as in the source data.
    pub fn from_nasr_code(code: &str) -> Self {
        match code {
            "PU" => Ownership::Public,
            "PR" => Ownership::Private,
            "MA" => Ownership::AirForce,
            "MR" => Ownership::Army,
            "MN" => Ownership::Navy,
            _ => Ownership::CoastGuard,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FacilityType {
    Aerodrome,
    Heliport,
    AerodromeWithHeliport,
    LandingSite,
}

impl FacilityType {
    pub const ALL: [FacilityType; 4] = [
        FacilityType::Aerodrome,
        FacilityType::Heliport,
        FacilityType::AerodromeWithHeliport,
        FacilityType::LandingSite,
    ];

    /// Name used in cache entries.
    pub fn as_str(self) -> &'static str {
        match self {
            FacilityType::Aerodrome => "AERODROME",
            FacilityType::Heliport => "HELIPORT",
            FacilityType::AerodromeWithHeliport => "AERODROME_WITH_HELIPORT",
            FacilityType::LandingSite => "LANDING_SITE",
        }
    }

    /// The AIXM `Type` code.
    pub fn aixm_code(self) -> &'static str {
        match self {
            FacilityType::Aerodrome => "AD",
            FacilityType::Heliport => "HP",
            FacilityType::AerodromeWithHeliport => "AH",
            FacilityType::LandingSite => "LS",
        }
    }

    pub fn from_aixm_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.aixm_code() == code)
    }
}

/// Error for an enum name that is not recognized.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} `{value}`")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for Ownership {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ownership| ownership.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "ownership",
                value: s.to_string(),
            })
    }
}

impl FromStr for FacilityType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "facility type",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for Ownership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for FacilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of aircraft based at a facility, by category.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BasedAircraft {
    pub single_engine: u32,
    pub multi_engine: u32,
    pub jet_engine: u32,
    pub helicopters: u32,
    pub gliders: u32,
    pub military: u32,
    pub ultralight: u32,
}

impl BasedAircraft {
    pub fn total(&self) -> u64 {
        [
            self.single_engine,
            self.multi_engine,
            self.jet_engine,
            self.helicopters,
            self.gliders,
            self.military,
            self.ultralight,
        ]
        .into_iter()
        .map(u64::from)
        .sum()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Airport {
    pub name: String,
    pub iata_designator: String,
    pub icao_identifier: Option<String>,
    pub site_number: String,
    pub public_use: bool,
    /// Feet above mean sea level.
    pub elevation: f64,
    /// Acres.
    pub land_area: f64,
    pub position: GeoCoordinate,
    pub ownership: Ownership,
    pub facility_type: FacilityType,
    pub based_aircraft: BasedAircraft,
    #[serde(skip)]
    pub runways: Vec<RunwayLink>,
}

impl Airport {
    pub fn runway_keys(&self) -> impl Iterator<Item = &Uuid> + '_ {
        self.runways.iter().map(CacheLink::key)
    }

    /// Load every runway of this airport.
    pub fn runways(&self) -> Result<Vec<Arc<Runway>>> {
        self.runways.iter().map(RunwayLink::get).collect()
    }

    /// Designators of this airport's runways, read from the runway index
    /// without loading any runway. Runways missing from the index are skipped.
    pub fn runway_designators(&self) -> Vec<String> {
        self.runways
            .iter()
            .filter_map(|link| {
                let store = link.store().lock();
                store.codec().designator(link.key()).map(str::to_string)
            })
            .collect()
    }

    /// Load the runway whose designator is `designator`, if this airport has one.
    pub fn runway_for_designator(&self, designator: &str) -> Result<Option<Arc<Runway>>> {
        let link = self.runways.iter().find(|link| {
            let store = link.store().lock();
            store.codec().designator(link.key()) == Some(designator)
        });
        link.map(RunwayLink::get).transpose()
    }
}

/// The airport index summary: name, IATA designator and ICAO identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AirportSummary {
    pub name: String,
    pub iata_designator: String,
    pub icao_identifier: Option<String>,
}

impl AirportSummary {
    pub fn of(airport: &Airport) -> Self {
        Self {
            name: airport.name.clone(),
            iata_designator: airport.iata_designator.clone(),
            icao_identifier: airport.icao_identifier.clone(),
        }
    }

    /// `<name len>,<iata len>,<icao len>=<name><iata><icao>`, lengths in bytes.
    pub fn render(&self) -> String {
        let icao = self.icao_identifier.as_deref().unwrap_or_default();
        format!(
            "{},{},{}={}{}{}",
            self.name.len(),
            self.iata_designator.len(),
            icao.len(),
            self.name,
            self.iata_designator,
            icao
        )
    }

    pub fn parse(key: &Uuid, summary: &str) -> Result<Self> {
        let malformed = |reason: &str| CacheError::malformed_summary(key.to_string(), reason);

        let (lengths, mut rest) = summary
            .split_once('=')
            .ok_or_else(|| malformed("missing length prefix"))?;
        let lengths = lengths
            .split(',')
            .map(str::parse::<usize>)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| malformed("lengths are not numbers"))?;
        let [name_len, iata_len, icao_len] = lengths[..] else {
            return Err(malformed("expected three lengths"));
        };

        let mut take = |len: usize| -> Result<String> {
            if len > rest.len() || !rest.is_char_boundary(len) {
                return Err(malformed("lengths do not match the text"));
            }
            let (head, tail) = rest.split_at(len);
            rest = tail;
            Ok(head.to_string())
        };
        let name = take(name_len)?;
        let iata_designator = take(iata_len)?;
        let icao = take(icao_len)?;
        if !rest.is_empty() {
            return Err(malformed("trailing text after the identifiers"));
        }

        Ok(Self {
            name,
            iata_designator,
            icao_identifier: (!icao.is_empty()).then_some(icao),
        })
    }
}

/// Airport codec. Keeps the name / IATA / ICAO lookups that let callers find
/// an airport's key without loading anything, and holds the runway store so
/// decoded airports carry live runway links.
pub struct AirportCodec {
    runways: RunwayStore,
    by_name: BTreeMap<String, Uuid>,
    by_iata: BTreeMap<String, Uuid>,
    by_icao: BTreeMap<String, Uuid>,
    summaries: HashMap<Uuid, AirportSummary>,
}

impl AirportCodec {
    pub fn new(runways: RunwayStore) -> Self {
        Self {
            runways,
            by_name: BTreeMap::new(),
            by_iata: BTreeMap::new(),
            by_icao: BTreeMap::new(),
            summaries: HashMap::new(),
        }
    }

    pub fn runway_store(&self) -> &RunwayStore {
        &self.runways
    }

    pub fn key_for_name(&self, name: &str) -> Option<Uuid> {
        self.by_name.get(name).copied()
    }

    pub fn key_for_iata(&self, designator: &str) -> Option<Uuid> {
        self.by_iata.get(designator).copied()
    }

    pub fn key_for_icao(&self, identifier: &str) -> Option<Uuid> {
        self.by_icao.get(identifier).copied()
    }

    /// Every airport name, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.by_name.keys().map(String::as_str)
    }

    pub fn iata_designators(&self) -> impl Iterator<Item = &str> + '_ {
        self.by_iata.keys().map(String::as_str)
    }

    pub fn icao_identifiers(&self) -> impl Iterator<Item = &str> + '_ {
        self.by_icao.keys().map(String::as_str)
    }

    pub fn summary(&self, key: &Uuid) -> Option<&AirportSummary> {
        self.summaries.get(key)
    }

    fn register(&mut self, key: Uuid, summary: AirportSummary) {
        self.by_name.insert(summary.name.clone(), key);
        self.by_iata.insert(summary.iata_designator.clone(), key);
        if let Some(icao) = &summary.icao_identifier {
            self.by_icao.insert(icao.clone(), key);
        }
        self.summaries.insert(key, summary);
    }
}

/// Release `name -> key` in `map`. If another indexed airport shares the
/// identifier, the one with the lowest key takes the slot over.
fn release(
    map: &mut BTreeMap<String, Uuid>,
    name: &str,
    key: &Uuid,
    summaries: &HashMap<Uuid, AirportSummary>,
    identifier: impl Fn(&AirportSummary) -> Option<&str>,
) {
    if map.get(name) != Some(key) {
        return;
    }
    let successor = summaries
        .iter()
        .filter(|(_, summary)| identifier(summary) == Some(name))
        .map(|(other, _)| *other)
        .min();
    match successor {
        Some(other) => {
            map.insert(name.to_string(), other);
        }
        None => {
            map.remove(name);
        }
    }
}

impl CacheCodec<Uuid, Airport> for AirportCodec {
    fn decode(&self, entry: &CacheEntry) -> Result<Airport> {
        let icao = entry.get_required(fields::ICAO_IDENTIFIER)?;
        let runways = entry
            .get_required(fields::RUNWAYS)?
            .split(',')
            .filter(|raw| !raw.is_empty())
            .map(|raw| decode_uuid(raw).map(|key| CacheLink::new(&self.runways, key)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Airport {
            name: entry.get_required(fields::NAME)?.to_string(),
            iata_designator: entry.get_required(fields::IATA_DESIGNATOR)?.to_string(),
            icao_identifier: (!icao.is_empty()).then(|| icao.to_string()),
            site_number: entry.get_required(fields::SITE_NUMBER)?.to_string(),
            public_use: entry.get_bool(fields::PUBLIC_USE)?,
            elevation: entry.get_f64(fields::ELEVATION)?,
            land_area: entry.get_f64(fields::LAND_AREA)?,
            position: GeoCoordinate::new(
                entry.get_f64(fields::LATITUDE)?,
                entry.get_f64(fields::LONGITUDE)?,
            ),
            ownership: entry.get_parsed(fields::OWNERSHIP, "ownership")?,
            facility_type: entry.get_parsed(fields::FACILITY_TYPE, "facility type")?,
            based_aircraft: BasedAircraft {
                single_engine: entry.get_u32(fields::BASED_SINGLE_ENGINE)?,
                multi_engine: entry.get_u32(fields::BASED_MULTI_ENGINE)?,
                jet_engine: entry.get_u32(fields::BASED_JET_ENGINE)?,
                helicopters: entry.get_u32(fields::BASED_HELICOPTERS)?,
                gliders: entry.get_u32(fields::BASED_GLIDERS)?,
                military: entry.get_u32(fields::BASED_MILITARY)?,
                ultralight: entry.get_u32(fields::BASED_ULTRALIGHT)?,
            },
            runways,
        })
    }

    fn encode(&self, airport: &Airport, entry: &mut CacheEntry) {
        entry.put(fields::NAME, &airport.name);
        entry.put(fields::IATA_DESIGNATOR, &airport.iata_designator);
        entry.put(
            fields::ICAO_IDENTIFIER,
            airport.icao_identifier.as_deref().unwrap_or_default(),
        );
        entry.put(fields::SITE_NUMBER, &airport.site_number);
        entry.put(fields::PUBLIC_USE, airport.public_use);
        entry.put(fields::ELEVATION, airport.elevation);
        entry.put(fields::LAND_AREA, airport.land_area);
        entry.put(fields::LATITUDE, airport.position.latitude);
        entry.put(fields::LONGITUDE, airport.position.longitude);
        entry.put_display(fields::OWNERSHIP, &airport.ownership);
        entry.put_display(fields::FACILITY_TYPE, &airport.facility_type);

        let based = &airport.based_aircraft;
        entry.put(fields::BASED_SINGLE_ENGINE, based.single_engine);
        entry.put(fields::BASED_MULTI_ENGINE, based.multi_engine);
        entry.put(fields::BASED_JET_ENGINE, based.jet_engine);
        entry.put(fields::BASED_HELICOPTERS, based.helicopters);
        entry.put(fields::BASED_GLIDERS, based.gliders);
        entry.put(fields::BASED_MILITARY, based.military);
        entry.put(fields::BASED_ULTRALIGHT, based.ultralight);

        let runways = airport
            .runway_keys()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(",");
        entry.put(fields::RUNWAYS, runways);
    }

    fn encode_key(&self, key: &Uuid) -> String {
        key.to_string()
    }

    fn decode_key(&self, raw: &str) -> Result<Uuid> {
        decode_uuid(raw)
    }

    fn summarize(&self, airport: &Airport) -> Option<String> {
        Some(AirportSummary::of(airport).render())
    }

    fn restore_summary(&mut self, key: &Uuid, summary: Option<&str>) -> Result<()> {
        let summary = summary
            .ok_or_else(|| CacheError::malformed_summary(key.to_string(), "summary is empty"))?;
        let summary = AirportSummary::parse(key, summary)?;
        self.register(*key, summary);
        Ok(())
    }

    fn forget_summary(&mut self, key: &Uuid) {
        let Some(summary) = self.summaries.remove(key) else {
            return;
        };
        release(&mut self.by_name, &summary.name, key, &self.summaries, |s| {
            Some(s.name.as_str())
        });
        release(
            &mut self.by_iata,
            &summary.iata_designator,
            key,
            &self.summaries,
            |s| Some(s.iata_designator.as_str()),
        );
        if let Some(icao) = &summary.icao_identifier {
            release(&mut self.by_icao, icao, key, &self.summaries, |s| {
                s.icao_identifier.as_deref()
            });
        }
    }

    fn clear_summaries(&mut self) {
        self.by_name.clear();
        self.by_iata.clear();
        self.by_icao.clear();
        self.summaries.clear();
    }
}

impl fmt::Debug for AirportCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AirportCodec")
            .field("airports", &self.summaries.len())
            .finish_non_exhaustive()
    }
}
