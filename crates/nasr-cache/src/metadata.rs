use crate::error::{CacheError, Result};
use crate::path::METADATA_FILENAME;
use crate::util::atomic_write;
use std::fs;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

const VERSION_PREFIX: &str = "CacheVersion:";
const INVALIDATE_AFTER_PREFIX: &str = "InvalidateAfter:";

/// The two header lines of a store's metadata file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MetadataHeader {
    pub version: i32,
    pub invalidate_after: OffsetDateTime,
}

impl MetadataHeader {
    /// A persisted cache may be reused only by a store of the same version and
    /// only strictly before its invalidation instant.
    pub fn is_valid_for(&self, version: i32, now: OffsetDateTime) -> bool {
        self.version == version && now < self.invalidate_after
    }
}

/// Full contents of `<dir>/.cache`: header plus the persistent index.
///
/// Index entries hold *encoded* keys; translating them back to typed keys is
/// the store's job.
///
/// ```text
/// CacheVersion:1
/// InvalidateAfter:2026-11-12T00:00:00Z
/// 36=0b6f2c1e-8d5b-4bb4-9a55-0f4f6c0c7d1a9,3,4=ChicagoORDKORD
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheMetadata {
    pub header: MetadataHeader,
    pub index: Vec<(String, Option<String>)>,
}

impl CacheMetadata {
    pub fn path(dir: &Path) -> PathBuf {
        dir.join(METADATA_FILENAME)
    }

    /// Read only the header lines.
    ///
    /// `Ok(None)` means there is no usable cache here: the file is missing or
    /// its header cannot be parsed.
    pub fn read_header(dir: &Path) -> Result<Option<MetadataHeader>> {
        let path = Self::path(dir);
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(load_failure(path, err.into())),
        };

        let mut reader = BufReader::new(file);
        let mut first = String::new();
        let mut second = String::new();
        let read = reader
            .read_line(&mut first)
            .and_then(|_| reader.read_line(&mut second));
        match read {
            Ok(_) => {}
            // Non UTF-8 header bytes: treat like any other unreadable header.
            Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                warn_bad_header(&path, "header is not valid UTF-8");
                return Ok(None);
            }
            Err(err) => return Err(load_failure(path, err.into())),
        }

        match parse_header(trim_eol(&first), trim_eol(&second)) {
            Ok(header) => Ok(Some(header)),
            Err(err) => {
                warn_bad_header(&path, &err.to_string());
                Ok(None)
            }
        }
    }

    /// Read the whole file. `Ok(None)` has the same meaning as in
    /// [`read_header`](Self::read_header); a malformed index line after a valid
    /// header is a [`CacheError::MetadataLoadFailure`].
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = Self::path(dir);
        let text = match fs::read(&path) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => {
                    return Err(load_failure(
                        path,
                        CacheError::MalformedMetadata {
                            line: 0,
                            reason: "file is not valid UTF-8".to_string(),
                        },
                    ))
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(load_failure(path, err.into())),
        };

        let mut lines = text.lines();
        let header = match parse_header(
            lines.next().unwrap_or_default(),
            lines.next().unwrap_or_default(),
        ) {
            Ok(header) => header,
            Err(err) => {
                warn_bad_header(&path, &err.to_string());
                return Ok(None);
            }
        };

        let mut index = Vec::new();
        for (offset, line) in lines.enumerate() {
            // Header occupies lines 1 and 2.
            let line_no = offset + 3;
            let entry = parse_index_line(line, line_no).map_err(|err| load_failure(path.clone(), err))?;
            index.push(entry);
        }

        Ok(Some(Self { header, index }))
    }

    /// Atomically replace `<dir>/.cache` with this metadata.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let path = Self::path(dir);
        let text = self
            .render()
            .map_err(|err| save_failure(path.clone(), err))?;
        atomic_write(&path, text.as_bytes()).map_err(|err| save_failure(path, err))
    }

    fn render(&self) -> Result<String> {
        let timestamp = self
            .header
            .invalidate_after
            .format(&Rfc3339)
            .map_err(|err| CacheError::MalformedMetadata {
                line: 2,
                reason: err.to_string(),
            })?;

        let mut out = format!(
            "{VERSION_PREFIX}{}\n{INVALIDATE_AFTER_PREFIX}{timestamp}\n",
            self.header.version
        );
        for (key, summary) in &self.index {
            if has_line_break(key) {
                return Err(CacheError::InvalidKey {
                    key: key.clone(),
                    reason: "key contains a line break".to_string(),
                });
            }
            let summary = summary.as_deref().unwrap_or_default();
            if has_line_break(summary) {
                return Err(CacheError::malformed_summary(
                    key.clone(),
                    "summary contains a line break",
                ));
            }
            out.push_str(&key.len().to_string());
            out.push('=');
            out.push_str(key);
            out.push_str(summary);
            out.push('\n');
        }
        Ok(out)
    }
}

fn parse_header(version_line: &str, timestamp_line: &str) -> Result<MetadataHeader> {
    let version = version_line
        .strip_prefix(VERSION_PREFIX)
        .and_then(|raw| raw.trim().parse::<i32>().ok())
        .ok_or_else(|| CacheError::MalformedMetadata {
            line: 1,
            reason: format!("expected `{VERSION_PREFIX}<int>`"),
        })?;

    let invalidate_after = timestamp_line
        .strip_prefix(INVALIDATE_AFTER_PREFIX)
        .and_then(|raw| OffsetDateTime::parse(raw.trim(), &Rfc3339).ok())
        .ok_or_else(|| CacheError::MalformedMetadata {
            line: 2,
            reason: format!("expected `{INVALIDATE_AFTER_PREFIX}<RFC 3339 timestamp>`"),
        })?;

    Ok(MetadataHeader {
        version,
        invalidate_after,
    })
}

fn parse_index_line(line: &str, line_no: usize) -> Result<(String, Option<String>)> {
    let malformed = |reason: &str| CacheError::MalformedMetadata {
        line: line_no,
        reason: reason.to_string(),
    };

    let (len, rest) = line
        .split_once('=')
        .ok_or_else(|| malformed("missing key length prefix"))?;
    let len: usize = len
        .parse()
        .map_err(|_| malformed("key length is not a number"))?;
    if len == 0 {
        return Err(malformed("key is empty"));
    }
    if len > rest.len() || !rest.is_char_boundary(len) {
        return Err(malformed("key length does not match the line"));
    }

    let (key, summary) = rest.split_at(len);
    let summary = (!summary.is_empty()).then(|| summary.to_string());
    Ok((key.to_string(), summary))
}

fn trim_eol(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

fn has_line_break(text: &str) -> bool {
    text.contains(['\n', '\r'])
}

fn load_failure(path: PathBuf, source: CacheError) -> CacheError {
    CacheError::MetadataLoadFailure {
        path,
        source: Box::new(source),
    }
}

fn save_failure(path: PathBuf, source: CacheError) -> CacheError {
    CacheError::MetadataSaveFailure {
        path,
        source: Box::new(source),
    }
}

fn warn_bad_header(path: &Path, reason: &str) {
    tracing::warn!(
        target: "nasr.cache",
        path = %path.display(),
        reason,
        "ignoring cache metadata with an unreadable header"
    );
}
