//! Cache entry encodings.
//!
//! Two interchangeable layouts, both carrying the key, store time, optional
//! explicit expiry and the full caption:
//!
//! - `json`: a versioned JSON document built from dedicated record types, so
//!   the file layout does not follow the in-memory structs.
//! - `binary`: a compact little-endian layout:
//!
//! ```text
//! "CAPC" u8(version=1)
//! str(key) i64(stored_at µs) u8(has_expiry) i64(expires_at µs)
//! metadata: str(language_code) str(language_name) bool(is_auto_generated)
//!           u8(caption_type) bool(has_speaker_identification) bool(is_default)
//!           u8(has_score) f64(quality_score) str(provider) str(format)
//!           str(source_url) str(video_id)
//! u32(line_count) { f64(start) f64(end) str(text) u8(has_speaker) str(speaker) }*
//! ```
//!
//! `str` is a u32 byte length followed by UTF-8. Absent optional values are
//! written as a zero flag with no payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CacheError;
use crate::domain::{Caption, CaptionLine, CaptionMetadata, CaptionType};

const JSON_SCHEMA_VERSION: u32 = 1;
const BINARY_MAGIC: &[u8; 4] = b"CAPC";
const BINARY_VERSION: u8 = 1;

/// On-disk encoding of cache entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageFormat {
    #[default]
    Json,
    Binary,
}

impl StorageFormat {
    /// File extension for entries in this format
    pub fn extension(&self) -> &'static str {
        match self {
            StorageFormat::Json => "json",
            StorageFormat::Binary => "bin",
        }
    }
}

impl std::fmt::Display for StorageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageFormat::Json => write!(f, "json"),
            StorageFormat::Binary => write!(f, "binary"),
        }
    }
}

impl std::str::FromStr for StorageFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(StorageFormat::Json),
            "binary" | "bin" => Ok(StorageFormat::Binary),
            _ => anyhow::bail!("Unknown cache storage format: {}", s),
        }
    }
}

/// A cached caption plus its bookkeeping
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: String,
    pub stored_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub caption: Caption,
}

/// Serialize an entry
pub fn encode(entry: &Entry, format: StorageFormat) -> Result<Vec<u8>, CacheError> {
    match format {
        StorageFormat::Json => encode_json(entry),
        StorageFormat::Binary => encode_binary(entry),
    }
}

/// Deserialize an entry. The error is a human-readable reason.
pub fn decode(bytes: &[u8], format: StorageFormat) -> Result<Entry, String> {
    match format {
        StorageFormat::Json => decode_json(bytes),
        StorageFormat::Binary => decode_binary(bytes),
    }
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct EntryRecord {
    schema_version: u32,
    key: String,
    stored_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    caption: CaptionRecord,
}

#[derive(Debug, Serialize, Deserialize)]
struct CaptionRecord {
    metadata: MetadataRecord,
    lines: Vec<LineRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MetadataRecord {
    language_code: String,
    language_name: String,
    is_auto_generated: bool,
    caption_type: CaptionType,
    has_speaker_identification: bool,
    is_default: bool,
    #[serde(default)]
    quality_score: Option<f64>,
    provider: String,
    format: String,
    source_url: String,
    video_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct LineRecord {
    start: f64,
    end: f64,
    text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    speaker: Option<String>,
}

impl From<&CaptionMetadata> for MetadataRecord {
    fn from(m: &CaptionMetadata) -> Self {
        Self {
            language_code: m.language_code.clone(),
            language_name: m.language_name.clone(),
            is_auto_generated: m.is_auto_generated,
            caption_type: m.caption_type,
            has_speaker_identification: m.has_speaker_identification,
            is_default: m.is_default,
            quality_score: m.quality_score,
            provider: m.provider.clone(),
            format: m.format.clone(),
            source_url: m.source_url.clone(),
            video_id: m.video_id.clone(),
        }
    }
}

impl From<MetadataRecord> for CaptionMetadata {
    fn from(r: MetadataRecord) -> Self {
        let mut metadata = CaptionMetadata::new(r.video_id, r.language_code);
        metadata.language_name = r.language_name;
        metadata.is_auto_generated = r.is_auto_generated;
        metadata.caption_type = r.caption_type;
        metadata.has_speaker_identification = r.has_speaker_identification;
        metadata.is_default = r.is_default;
        metadata.quality_score = r.quality_score;
        metadata.provider = r.provider;
        metadata.format = r.format;
        metadata.source_url = r.source_url;
        metadata
    }
}

fn build_line(
    index: usize,
    start: f64,
    end: f64,
    text: &str,
    speaker: Option<&str>,
) -> Result<CaptionLine, String> {
    let line = CaptionLine::new(start, end, text).map_err(|e| format!("line {}: {}", index + 1, e))?;
    Ok(match speaker {
        Some(speaker) => line.with_speaker(speaker),
        None => line,
    })
}

fn encode_json(entry: &Entry) -> Result<Vec<u8>, CacheError> {
    let record = EntryRecord {
        schema_version: JSON_SCHEMA_VERSION,
        key: entry.key.clone(),
        stored_at: entry.stored_at,
        expires_at: entry.expires_at,
        caption: CaptionRecord {
            metadata: entry.caption.metadata().into(),
            lines: entry
                .caption
                .lines()
                .iter()
                .map(|l| LineRecord {
                    start: l.start(),
                    end: l.end(),
                    text: l.text().to_string(),
                    speaker: l.speaker().map(str::to_string),
                })
                .collect(),
        },
    };

    serde_json::to_vec_pretty(&record).map_err(|e| CacheError::Encode(e.to_string()))
}

fn decode_json(bytes: &[u8]) -> Result<Entry, String> {
    let record: EntryRecord = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
    if record.schema_version != JSON_SCHEMA_VERSION {
        return Err(format!(
            "unsupported schema version {}",
            record.schema_version
        ));
    }

    let lines = record
        .caption
        .lines
        .iter()
        .enumerate()
        .map(|(i, l)| build_line(i, l.start, l.end, &l.text, l.speaker.as_deref()))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Entry {
        key: record.key,
        stored_at: record.stored_at,
        expires_at: record.expires_at,
        caption: Caption::new(record.caption.metadata.into(), lines),
    })
}

// ---------------------------------------------------------------------------
// Binary
// ---------------------------------------------------------------------------

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn bool(&mut self, v: bool) {
        self.u8(v as u8);
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn count(&mut self, n: usize) -> Result<(), CacheError> {
        let n = u32::try_from(n).map_err(|_| CacheError::Encode(format!("length {} too large", n)))?;
        self.u32(n);
        Ok(())
    }

    fn str(&mut self, s: &str) -> Result<(), CacheError> {
        self.count(s.len())?;
        self.buf.extend_from_slice(s.as_bytes());
        Ok(())
    }

    fn time(&mut self, t: DateTime<Utc>) {
        self.i64(t.timestamp_micros());
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], String> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| format!("unexpected end of data at byte {}", self.pos))?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], String> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, String> {
        Ok(self.take(1)?[0])
    }

    fn bool(&mut self) -> Result<bool, String> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(format!("invalid flag {} at byte {}", other, self.pos - 1)),
        }
    }

    fn u32(&mut self) -> Result<u32, String> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn i64(&mut self) -> Result<i64, String> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    fn f64(&mut self) -> Result<f64, String> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    fn str(&mut self) -> Result<String, String> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| format!("invalid UTF-8: {}", e))
    }

    fn time(&mut self) -> Result<DateTime<Utc>, String> {
        let micros = self.i64()?;
        let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
        DateTime::<Utc>::from_timestamp(micros.div_euclid(1_000_000), nanos)
            .ok_or_else(|| format!("timestamp out of range: {}", micros))
    }
}

fn caption_type_tag(t: CaptionType) -> u8 {
    match t {
        CaptionType::Manual => 0,
        CaptionType::AutoGenerated => 1,
        CaptionType::Translated => 2,
    }
}

fn caption_type_from_tag(tag: u8) -> Result<CaptionType, String> {
    match tag {
        0 => Ok(CaptionType::Manual),
        1 => Ok(CaptionType::AutoGenerated),
        2 => Ok(CaptionType::Translated),
        other => Err(format!("unknown caption type tag {}", other)),
    }
}

fn encode_binary(entry: &Entry) -> Result<Vec<u8>, CacheError> {
    let mut w = Writer {
        buf: Vec::with_capacity(256),
    };

    w.buf.extend_from_slice(BINARY_MAGIC);
    w.u8(BINARY_VERSION);

    w.str(&entry.key)?;
    w.time(entry.stored_at);
    match entry.expires_at {
        Some(at) => {
            w.u8(1);
            w.time(at);
        }
        None => w.u8(0),
    }

    let m = entry.caption.metadata();
    w.str(&m.language_code)?;
    w.str(&m.language_name)?;
    w.bool(m.is_auto_generated);
    w.u8(caption_type_tag(m.caption_type));
    w.bool(m.has_speaker_identification);
    w.bool(m.is_default);
    match m.quality_score {
        Some(score) => {
            w.u8(1);
            w.f64(score);
        }
        None => w.u8(0),
    }
    w.str(&m.provider)?;
    w.str(&m.format)?;
    w.str(&m.source_url)?;
    w.str(&m.video_id)?;

    w.count(entry.caption.len())?;
    for line in entry.caption.lines() {
        w.f64(line.start());
        w.f64(line.end());
        w.str(line.text())?;
        match line.speaker() {
            Some(speaker) => {
                w.u8(1);
                w.str(speaker)?;
            }
            None => w.u8(0),
        }
    }

    Ok(w.buf)
}

fn decode_binary(bytes: &[u8]) -> Result<Entry, String> {
    let mut r = Reader { buf: bytes, pos: 0 };

    if r.take(4)? != BINARY_MAGIC {
        return Err("bad magic".to_string());
    }
    let version = r.u8()?;
    if version != BINARY_VERSION {
        return Err(format!("unsupported binary version {}", version));
    }

    let key = r.str()?;
    let stored_at = r.time()?;
    let expires_at = if r.bool()? { Some(r.time()?) } else { None };

    let language_code = r.str()?;
    let mut metadata = CaptionMetadata::new(String::new(), language_code);
    metadata.language_name = r.str()?;
    metadata.is_auto_generated = r.bool()?;
    metadata.caption_type = caption_type_from_tag(r.u8()?)?;
    metadata.has_speaker_identification = r.bool()?;
    metadata.is_default = r.bool()?;
    metadata.quality_score = if r.bool()? { Some(r.f64()?) } else { None };
    metadata.provider = r.str()?;
    metadata.format = r.str()?;
    metadata.source_url = r.str()?;
    metadata.video_id = r.str()?;

    let count = r.u32()? as usize;
    // Each line needs at least 24 bytes; don't trust a huge count up front
    let mut lines = Vec::with_capacity(count.min(bytes.len() / 24));
    for i in 0..count {
        let start = r.f64()?;
        let end = r.f64()?;
        let text = r.str()?;
        let speaker = if r.bool()? { Some(r.str()?) } else { None };
        lines.push(build_line(i, start, end, &text, speaker.as_deref())?);
    }

    if r.pos != bytes.len() {
        return Err(format!("{} trailing bytes", bytes.len() - r.pos));
    }

    Ok(Entry {
        key,
        stored_at,
        expires_at,
        caption: Caption::new(metadata, lines),
    })
}
