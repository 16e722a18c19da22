//! Music asset loading and decoding.
//!
//! Fetches a background-music asset from disk or over HTTP, decodes it into
//! a [`StereoBuffer`], and keeps a small LRU cache keyed by track identifier
//! so switching back and forth between tracks in an editing session does not
//! re-fetch or re-decode.

use crate::tone::generator::{SharedBuffer, StereoBuffer};
use rodio::{Decoder, Source};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// How many decoded tracks the loader keeps around.
///
/// Editing sessions flip between a handful of candidate tracks at most;
/// beyond that the oldest decoded buffer is dropped.
pub const DEFAULT_CACHE_TRACKS: usize = 4;

/// Where a music asset comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrackSource {
    /// A file on the local filesystem.
    File { path: PathBuf },
    /// An HTTP(S) asset URL resolved by the editor backend.
    Url { url: String },
}

/// Errors while loading or decoding a music asset.
///
/// The preview layer treats any of these as "no music for this session";
/// they never abort playback of other channels.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("failed to decode track '{id}': {message}")]
    Decode { id: String, message: String },
}

struct CacheEntry {
    id: String,
    buffer: SharedBuffer,
}

/// Loads and caches decoded music buffers.
///
/// The cache is a small explicit LRU: entries are ordered most-recently-used
/// first and the oldest entry is evicted once `capacity` is exceeded. Each
/// loader instance owns its cache; unrelated editor sessions do not share
/// buffers.
pub struct MusicLoader {
    capacity: usize,
    entries: Vec<CacheEntry>,
}

impl MusicLoader {
    /// Creates a loader with the default cache capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_TRACKS)
    }

    /// Creates a loader holding at most `capacity` decoded tracks.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Vec::new(),
        }
    }

    /// Resolves a track to a decoded buffer, reusing the cache when the
    /// identifier was loaded recently.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] if the asset cannot be read, fetched, or
    /// decoded. The cache is left untouched on failure.
    pub fn load(&mut self, id: &str, source: &TrackSource) -> Result<SharedBuffer, LoadError> {
        if let Some(pos) = self.entries.iter().position(|e| e.id == id) {
            let entry = self.entries.remove(pos);
            let buffer = Arc::clone(&entry.buffer);
            self.entries.insert(0, entry);
            debug!(track = id, "music cache hit");
            return Ok(buffer);
        }

        let bytes = fetch_bytes(source)?;
        let buffer = Arc::new(decode_bytes(id, bytes)?);
        debug!(
            track = id,
            frames = buffer.frames(),
            sample_rate = buffer.sample_rate(),
            "decoded music track"
        );

        self.entries.insert(
            0,
            CacheEntry {
                id: id.to_string(),
                buffer: Arc::clone(&buffer),
            },
        );
        self.entries.truncate(self.capacity);
        Ok(buffer)
    }

    /// Returns the cached buffer for a track without loading, if present.
    pub fn cached(&self, id: &str) -> Option<SharedBuffer> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| Arc::clone(&e.buffer))
    }

    /// Number of cached tracks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops all cached buffers.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for MusicLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn fetch_bytes(source: &TrackSource) -> Result<Vec<u8>, LoadError> {
    match source {
        TrackSource::File { path } => std::fs::read(path).map_err(|e| LoadError::Io {
            path: path.clone(),
            source: e,
        }),
        TrackSource::Url { url } => {
            let response = ureq::get(url).call().map_err(|e| LoadError::Fetch {
                url: url.clone(),
                message: e.to_string(),
            })?;
            let mut bytes = Vec::new();
            response
                .into_reader()
                .read_to_end(&mut bytes)
                .map_err(|e| LoadError::Fetch {
                    url: url.clone(),
                    message: e.to_string(),
                })?;
            Ok(bytes)
        }
    }
}

fn decode_bytes(id: &str, bytes: Vec<u8>) -> Result<StereoBuffer, LoadError> {
    let decoder = Decoder::new(Cursor::new(bytes)).map_err(|e| LoadError::Decode {
        id: id.to_string(),
        message: e.to_string(),
    })?;

    let channels = decoder.channels() as usize;
    let sample_rate = decoder.sample_rate();
    let samples: Vec<f32> = decoder.convert_samples::<f32>().collect();

    if channels == 0 || samples.is_empty() {
        return Err(LoadError::Decode {
            id: id.to_string(),
            message: "no audio frames".to_string(),
        });
    }

    let (left, right) = if channels == 1 {
        (samples.clone(), samples)
    } else {
        // Keep the first two channels of each frame; anything beyond stereo
        // is discarded.
        let mut left = Vec::with_capacity(samples.len() / channels);
        let mut right = Vec::with_capacity(samples.len() / channels);
        for frame in samples.chunks_exact(channels) {
            left.push(frame[0]);
            right.push(frame[1]);
        }
        (left, right)
    };

    Ok(StereoBuffer::new(sample_rate, left, right))
}
