use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use nasr_cache::{key_from_file_name, now_utc, CacheMetadata};
use nasr_config::{CacheSettings, NasrConfig, StoreSettings};
use nasr_features::{Airport, FacilityCaches};
use serde::Serialize;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;

#[derive(Parser)]
#[command(name = "nasr", version, about = "Inspect and query persisted facility caches")]
struct Cli {
    /// Config file (defaults to `nasr.toml` discovery in the current directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Inspect or clean the airport and runway caches
    Cache(CacheArgs),
    /// Look up one persisted airport
    Airport(AirportArgs),
    /// List every indexed airport without loading any
    Airports(ListArgs),
}

#[derive(Args)]
struct CacheArgs {
    #[command(subcommand)]
    command: CacheCommand,
    /// Emit JSON suitable for scripts
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum CacheCommand {
    Status,
    Clean,
}

#[derive(Args)]
struct AirportArgs {
    /// Name, IATA designator or ICAO identifier, depending on `--by`
    query: String,
    #[arg(long, value_enum, default_value_t = LookupKind::Iata)]
    by: LookupKind,
    /// Emit JSON suitable for scripts
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ListArgs {
    /// Emit JSON suitable for scripts
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum LookupKind {
    Name,
    Iata,
    Icao,
}

impl LookupKind {
    fn describe(self) -> &'static str {
        match self {
            LookupKind::Name => "name",
            LookupKind::Iata => "IATA designator",
            LookupKind::Icao => "ICAO identifier",
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            2
        }
    };

    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32> {
    let config = load_config(cli.config.as_deref())?;
    nasr_config::init_tracing(&config.logging);
    tracing::debug!(
        target: "nasr.cli",
        root = %config.cache.root.display(),
        "configuration loaded"
    );

    match cli.command {
        Command::Cache(args) => match args.command {
            CacheCommand::Status => {
                let status = cache_status(&config.cache);
                let exit = if status.stores.iter().all(|store| store.valid) {
                    0
                } else {
                    1
                };
                print_cache_status(&status, args.json)?;
                Ok(exit)
            }
            CacheCommand::Clean => {
                let caches = FacilityCaches::new(&config.cache);
                // Invalidating without unloading leaves no metadata behind, so
                // the next start rebuilds.
                caches.airports().lock().invalidate();
                caches.runways().lock().invalidate();
                if args.json {
                    print_json(&serde_json::json!({ "ok": true }))?;
                } else {
                    println!("cache: cleaned {}", config.cache.root.display());
                }
                Ok(0)
            }
        },
        Command::Airport(args) => {
            let Some(caches) = open_caches(&config.cache)? else {
                return Ok(1);
            };
            let key = {
                let airports = caches.airports().lock();
                let codec = airports.codec();
                match args.by {
                    LookupKind::Name => codec.key_for_name(&args.query),
                    LookupKind::Iata => codec.key_for_iata(&args.query),
                    LookupKind::Icao => codec.key_for_icao(&args.query),
                }
            };
            let Some(key) = key else {
                eprintln!(
                    "airport: no airport with {} {:?}",
                    args.by.describe(),
                    args.query
                );
                return Ok(1);
            };
            let airport = caches.airport(&key)?;
            tracing::debug!(target: "nasr.cli", %key, name = %airport.name, "airport loaded");
            let report = AirportReport {
                key: key.to_string(),
                airport: &airport,
                runways: airport.runway_designators(),
            };
            print_airport(&report, args.json)?;
            Ok(0)
        }
        Command::Airports(args) => {
            let Some(caches) = open_caches(&config.cache)? else {
                return Ok(1);
            };
            let rows = caches
                .airport_summaries()
                .into_iter()
                .map(|(key, summary)| AirportRow {
                    key: key.to_string(),
                    name: summary.name,
                    iata_designator: summary.iata_designator,
                    icao_identifier: summary.icao_identifier,
                })
                .collect::<Vec<_>>();
            if args.json {
                print_json(&rows)?;
            } else {
                for row in &rows {
                    println!(
                        "{:<4} {:<4} {}",
                        row.iata_designator,
                        row.icao_identifier.as_deref().unwrap_or("-"),
                        row.name
                    );
                }
                println!("airports: {}", rows.len());
            }
            Ok(0)
        }
    }
}

fn load_config(explicit: Option<&Path>) -> Result<NasrConfig> {
    if let Some(path) = explicit {
        let config = NasrConfig::load_from_path(path)
            .with_context(|| format!("loading {}", path.display()))?;
        return Ok(config.with_env_overrides());
    }

    let cwd = std::env::current_dir().context("reading the current directory")?;
    let (config, _path) = nasr_config::load_for_dir(&cwd)?;
    Ok(config)
}

/// Open both stores for reading. `None` means the persisted caches are
/// missing or stale, or `cache.use_existing` is off, and have to be rebuilt
/// from source data first.
fn open_caches(settings: &CacheSettings) -> Result<Option<FacilityCaches>> {
    let caches = FacilityCaches::new(settings);
    if caches.open()? {
        eprintln!(
            "cache: no valid cache under {} (rebuild required)",
            settings.root.display()
        );
        return Ok(None);
    }
    // Lookups only read, so the stores are dropped without unloading and the
    // disk is left untouched.
    Ok(Some(caches))
}

#[derive(Serialize)]
struct CacheStatus {
    root: PathBuf,
    stores: Vec<StoreStatus>,
}

#[derive(Serialize)]
struct StoreStatus {
    name: &'static str,
    dir: PathBuf,
    exists: bool,
    expected_version: i32,
    version: Option<i32>,
    invalidate_after: Option<String>,
    indexed_entries: Option<usize>,
    entry_files: usize,
    valid: bool,
    error: Option<String>,
}

fn cache_status(settings: &CacheSettings) -> CacheStatus {
    let stores = vec![
        store_status("airports", &settings.airport_dir(), &settings.airports),
        store_status("runways", &settings.runway_dir(), &settings.runways),
    ];
    CacheStatus {
        root: settings.root.clone(),
        stores,
    }
}

fn store_status(name: &'static str, dir: &Path, settings: &StoreSettings) -> StoreStatus {
    let mut status = StoreStatus {
        name,
        dir: dir.to_path_buf(),
        exists: dir.is_dir(),
        expected_version: settings.version,
        version: None,
        invalidate_after: None,
        indexed_entries: None,
        entry_files: count_entry_files(dir),
        valid: false,
        error: None,
    };

    match CacheMetadata::load(dir) {
        Ok(Some(metadata)) => {
            let header = metadata.header;
            status.version = Some(header.version);
            status.invalidate_after = header.invalidate_after.format(&Rfc3339).ok();
            status.indexed_entries = Some(metadata.index.len());
            status.valid = header.is_valid_for(settings.version, now_utc());
        }
        Ok(None) => {}
        Err(err) => status.error = Some(format!("{err:#}")),
    }
    status
}

fn count_entry_files(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.path().is_file()
                && entry
                    .file_name()
                    .to_str()
                    .and_then(key_from_file_name)
                    .is_some()
        })
        .count()
}

fn print_cache_status(status: &CacheStatus, json: bool) -> Result<()> {
    if json {
        return print_json(status);
    }

    println!("cache:");
    println!("  root: {}", status.root.display());
    for store in &status.stores {
        println!("  {}:", store.name);
        println!("    dir: {}", store.dir.display());
        println!("    exists: {}", store.exists);
        match store.version {
            Some(version) => println!("    version: {version} (expected {})", store.expected_version),
            None => println!("    version: (missing)"),
        }
        if let Some(invalidate_after) = &store.invalidate_after {
            println!("    invalidate_after: {invalidate_after}");
        }
        if let Some(indexed) = store.indexed_entries {
            println!("    indexed_entries: {indexed}");
        }
        println!("    entry_files: {}", store.entry_files);
        println!("    valid: {}", store.valid);
        if let Some(error) = &store.error {
            println!("    error: {error}");
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct AirportRow {
    key: String,
    name: String,
    iata_designator: String,
    icao_identifier: Option<String>,
}

#[derive(Serialize)]
struct AirportReport<'a> {
    key: String,
    #[serde(flatten)]
    airport: &'a Airport,
    runways: Vec<String>,
}

fn print_airport(report: &AirportReport<'_>, json: bool) -> Result<()> {
    if json {
        return print_json(report);
    }

    let airport = report.airport;
    println!("airport: {}", airport.name);
    println!("  key: {}", report.key);
    println!("  iata: {}", airport.iata_designator);
    println!(
        "  icao: {}",
        airport.icao_identifier.as_deref().unwrap_or("(none)")
    );
    println!("  site_number: {}", airport.site_number);
    println!("  type: {}", airport.facility_type);
    println!("  ownership: {}", airport.ownership);
    println!("  public_use: {}", airport.public_use);
    println!("  position: {}", airport.position);
    println!("  elevation_ft: {}", airport.elevation);
    println!("  land_area_acres: {}", airport.land_area);
    println!("  based_aircraft: {}", airport.based_aircraft.total());
    if report.runways.is_empty() {
        println!("  runways: (none)");
    } else {
        println!("  runways: {}", report.runways.join(", "));
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value)?;
    println!("{out}");
    Ok(())
}
