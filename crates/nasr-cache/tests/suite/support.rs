use nasr_cache::{CacheCodec, CacheEntry, CacheError, CacheStore, Result};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::Path;

#[derive(Clone, Debug, PartialEq)]
pub struct Station {
    pub name: String,
    pub code: Option<String>,
    pub elevation: f64,
    pub active: bool,
}

pub fn station(name: &str) -> Station {
    Station {
        name: name.to_string(),
        code: Some(name.to_uppercase()),
        elevation: name.len() as f64 * 10.5,
        active: true,
    }
}

/// Summarizes a station by name and keeps a name -> key lookup built from
/// the summaries alone.
#[derive(Debug, Default)]
pub struct StationCodec {
    pub by_name: HashMap<String, u32>,
    pub restored: usize,
}

impl CacheCodec<u32, Station> for StationCodec {
    fn decode(&self, entry: &CacheEntry) -> Result<Station> {
        Ok(Station {
            name: entry.get_required("name")?.to_string(),
            code: entry.get("code").map(str::to_string),
            elevation: entry.get_f64("elevation")?,
            active: entry.get_bool("active")?,
        })
    }

    fn encode(&self, value: &Station, entry: &mut CacheEntry) {
        entry.put("name", &value.name);
        entry.put("code", value.code.as_deref());
        entry.put("elevation", value.elevation);
        entry.put("active", value.active);
    }

    fn encode_key(&self, key: &u32) -> String {
        key.to_string()
    }

    fn decode_key(&self, raw: &str) -> Result<u32> {
        raw.parse().map_err(|_| CacheError::InvalidKey {
            key: raw.to_string(),
            reason: "expected an integer".to_string(),
        })
    }

    fn summarize(&self, value: &Station) -> Option<String> {
        Some(value.name.clone())
    }

    fn restore_summary(&mut self, key: &u32, summary: Option<&str>) -> Result<()> {
        let name = summary.ok_or_else(|| CacheError::malformed_summary(key.to_string(), "missing name"))?;
        self.by_name.insert(name.to_string(), *key);
        self.restored += 1;
        Ok(())
    }

    fn forget_summary(&mut self, key: &u32) {
        self.by_name.retain(|_, existing| existing != key);
    }

    fn clear_summaries(&mut self) {
        self.by_name.clear();
    }
}

pub type StationStore = CacheStore<u32, Station, StationCodec>;

pub fn store(dir: &Path, capacity: usize) -> StationStore {
    CacheStore::new(StationCodec::default())
        .with_directory(dir)
        .with_capacity(NonZeroUsize::new(capacity).unwrap())
        .with_version(1)
}

pub fn entry_file(dir: &Path, key: u32) -> std::path::PathBuf {
    dir.join(format!("{key}.cache"))
}
