use crate::airport::{Airport, AirportCodec, AirportSummary};
use crate::runway::{Runway, RunwayCodec, RunwayLink, RunwayStore};
use crate::FeatureError;
use nasr_cache::{now_utc, CacheLink, CacheStore, SharedStore, DEFAULT_INVALIDATE_AFTER};
use nasr_config::CacheSettings;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

pub type AirportStore = SharedStore<Uuid, Airport, AirportCodec>;

type Result<T> = std::result::Result<T, FeatureError>;

/// The airport and runway stores, wired together.
///
/// Airports reference their runways through lazy links into the runway store,
/// so the two stores are always validated, invalidated and flushed as a pair.
pub struct FacilityCaches {
    airports: AirportStore,
    runways: RunwayStore,
    ttl: Duration,
    use_existing: bool,
}

impl FacilityCaches {
    /// Build both stores from `settings` (`<root>/apt` and `<root>/rwy`).
    /// Nothing touches the disk until [`initialize`](Self::initialize).
    pub fn new(settings: &CacheSettings) -> Self {
        let runways = CacheStore::new(RunwayCodec::default())
            .with_directory(settings.runway_dir())
            .with_capacity(settings.runways.capacity)
            .with_version(settings.runways.version)
            .into_shared();
        let airports = CacheStore::new(AirportCodec::new(Arc::clone(&runways)))
            .with_directory(settings.airport_dir())
            .with_capacity(settings.airports.capacity)
            .with_version(settings.airports.version)
            .into_shared();

        Self {
            airports,
            runways,
            ttl: settings.ttl(),
            use_existing: settings.use_existing,
        }
    }

    /// [`initialize`](Self::initialize) with the configured `use_existing`.
    pub fn open(&self) -> Result<bool> {
        self.initialize(self.use_existing)
    }

    /// Open both stores. Returns `true` when the caller must rebuild, in which
    /// case both stores have been emptied and stamped with a fresh expiry.
    pub fn initialize(&self, use_cache: bool) -> Result<bool> {
        tracing::info!(
            target: "nasr.features",
            use_cache,
            "initializing facility caches"
        );

        let airports_valid = self.airports.lock().initialize(use_cache)?;
        let runways_valid = self.runways.lock().initialize(use_cache)?;
        tracing::info!(
            target: "nasr.features",
            airports_valid,
            runways_valid,
            "facility caches opened"
        );

        let needs_rebuild = !(airports_valid && runways_valid);
        if needs_rebuild {
            let expiry = self.fresh_expiry();
            tracing::info!(target: "nasr.features", %expiry, "invalidating facility caches for a rebuild");
            {
                let mut airports = self.airports.lock();
                airports.invalidate();
                airports.set_invalidate_after(expiry);
            }
            let mut runways = self.runways.lock();
            runways.invalidate();
            runways.set_invalidate_after(expiry);
        }
        Ok(needs_rebuild)
    }

    fn fresh_expiry(&self) -> OffsetDateTime {
        time::Duration::try_from(self.ttl)
            .ok()
            .and_then(|ttl| now_utc().checked_add(ttl))
            .map_or(DEFAULT_INVALIDATE_AFTER, |expiry| expiry.min(DEFAULT_INVALIDATE_AFTER))
    }

    /// Flush both stores to disk and return them to the uninitialized state.
    pub fn unload(&self) -> Result<()> {
        tracing::info!(target: "nasr.features", "unloading facility caches");
        self.airports.lock().uninitialize()?;
        self.runways.lock().uninitialize()?;
        Ok(())
    }

    pub fn airports(&self) -> &AirportStore {
        &self.airports
    }

    pub fn runways(&self) -> &RunwayStore {
        &self.runways
    }

    /// Store `runway` under a new random key.
    pub fn add_runway(&self, runway: Runway) -> Result<Uuid> {
        let key = Uuid::new_v4();
        self.runways.lock().add(key, runway)?;
        Ok(key)
    }

    /// Store `airport` under a new random key.
    pub fn add_airport(&self, airport: Airport) -> Result<Uuid> {
        let key = Uuid::new_v4();
        self.airports.lock().add(key, airport)?;
        Ok(key)
    }

    pub fn runway_link(&self, key: Uuid) -> RunwayLink {
        CacheLink::new(&self.runways, key)
    }

    /// Attach the runway `runway` to the airport `airport`. Linking the same
    /// runway twice has no effect.
    pub fn link_runway(&self, airport: Uuid, runway: Uuid) -> Result<()> {
        if !self.runways.lock().is_indexed(&runway) {
            return Err(FeatureError::UnknownRunway(runway));
        }

        let mut airports = self.airports.lock();
        let current = airports.get(&airport).map_err(|err| {
            if err.is_nonexistent_entry() {
                FeatureError::UnknownAirport(airport)
            } else {
                err.into()
            }
        })?;
        if current.runway_keys().any(|key| *key == runway) {
            return Ok(());
        }

        let mut updated = Airport::clone(&current);
        updated.runways.push(self.runway_link(runway));
        airports.add(airport, updated)?;
        Ok(())
    }

    pub fn airport(&self, key: &Uuid) -> Result<Arc<Airport>> {
        Ok(self.airports.lock().get(key)?)
    }

    pub fn runway(&self, key: &Uuid) -> Result<Arc<Runway>> {
        Ok(self.runways.lock().get(key)?)
    }

    pub fn airport_for_name(&self, name: &str) -> Result<Option<Arc<Airport>>> {
        tracing::debug!(target: "nasr.features", name, "requesting airport by name");
        self.airport_by(|codec| codec.key_for_name(name))
    }

    pub fn airport_for_iata(&self, designator: &str) -> Result<Option<Arc<Airport>>> {
        tracing::debug!(target: "nasr.features", designator, "requesting airport by IATA designator");
        self.airport_by(|codec| codec.key_for_iata(designator))
    }

    pub fn airport_for_icao(&self, identifier: &str) -> Result<Option<Arc<Airport>>> {
        tracing::debug!(target: "nasr.features", identifier, "requesting airport by ICAO identifier");
        self.airport_by(|codec| codec.key_for_icao(identifier))
    }

    fn airport_by(&self, lookup: impl FnOnce(&AirportCodec) -> Option<Uuid>) -> Result<Option<Arc<Airport>>> {
        let mut airports = self.airports.lock();
        let Some(key) = lookup(airports.codec()) else {
            return Ok(None);
        };
        Ok(Some(airports.get(&key)?))
    }

    /// Every airport name, sorted. Loads nothing.
    pub fn airport_names(&self) -> Vec<String> {
        self.airports.lock().codec().names().map(str::to_string).collect()
    }

    pub fn iata_designators(&self) -> Vec<String> {
        self.airports
            .lock()
            .codec()
            .iata_designators()
            .map(str::to_string)
            .collect()
    }

    pub fn icao_identifiers(&self) -> Vec<String> {
        self.airports
            .lock()
            .codec()
            .icao_identifiers()
            .map(str::to_string)
            .collect()
    }

    /// Key and summary of every indexed airport, in insertion order. Loads nothing.
    pub fn airport_summaries(&self) -> Vec<(Uuid, AirportSummary)> {
        let airports = self.airports.lock();
        airports
            .indexed_keys()
            .filter_map(|key| {
                airports
                    .codec()
                    .summary(key)
                    .map(|summary| (*key, summary.clone()))
            })
            .collect()
    }

    /// Number of indexed airports and runways.
    pub fn counts(&self) -> (usize, usize) {
        (
            self.airports.lock().index_len(),
            self.runways.lock().index_len(),
        )
    }
}
