//! Decoded recording cache.
//!
//! Real-recording modes loop short decoded clips. Decoding happens once per
//! asset per process: the store memoizes results and coalesces concurrent
//! requests for the same key onto a single in-flight decode (single-flight).
//! A failed decode clears the entry so a later selection can retry.

use anyhow::{anyhow, Context, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

/// A fully decoded recording: interleaved stereo f32 at the engine rate.
#[derive(Debug, Clone)]
pub struct AudioAsset {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioAsset {
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    pub fn duration_seconds(&self) -> f32 {
        self.frames() as f32 / self.sample_rate as f32
    }
}

/// Decode a recording into interleaved stereo at `sample_rate`. Mono sources
/// are duplicated to both channels; other rates are linearly resampled.
pub fn decode_asset_file(path: &Path, sample_rate: u32) -> Result<AudioAsset> {
    let file = File::open(path).with_context(|| format!("open asset {}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let probed = get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .with_context(|| format!("probe asset {}", path.display()))?;
    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| anyhow!("no default track in {}", path.display()))?;
    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("unsupported codec")?;
    let src_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| anyhow!("unknown sample rate"))?;
    let channels = track
        .codec_params
        .channels
        .ok_or_else(|| anyhow!("unknown channel count"))?
        .count();

    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut samples: Vec<f32> = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(_)) => break,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(e).context("read packet"),
        };
        let decoded = decoder.decode(&packet).context("decode packet")?;
        if sample_buf.is_none() {
            sample_buf = Some(SampleBuffer::<f32>::new(
                decoded.capacity() as u64,
                *decoded.spec(),
            ));
        }
        let sbuf = sample_buf.as_mut().ok_or_else(|| anyhow!("no sample buffer"))?;
        sbuf.copy_interleaved_ref(decoded);
        for frame in sbuf.samples().chunks(channels) {
            let l = frame[0];
            let r = if channels > 1 { frame[1] } else { frame[0] };
            samples.push(l);
            samples.push(r);
        }
    }

    if samples.is_empty() {
        return Err(anyhow!("asset {} decoded to zero frames", path.display()));
    }
    if src_rate != sample_rate {
        samples = resample_linear_stereo(&samples, src_rate, sample_rate);
    }
    Ok(AudioAsset::from_samples(samples, sample_rate))
}

fn resample_linear_stereo(input: &[f32], src_rate: u32, dst_rate: u32) -> Vec<f32> {
    if src_rate == dst_rate || input.is_empty() {
        return input.to_vec();
    }
    let frames = input.len() / 2;
    let duration = frames as f64 / src_rate as f64;
    let out_frames = (duration * dst_rate as f64).round() as usize;
    let mut out = vec![0.0f32; out_frames * 2];
    for i in 0..out_frames {
        let t = i as f64 / dst_rate as f64;
        let pos = t * src_rate as f64;
        // Output frame count rounds, so the last position can land a hair
        // past the final input frame.
        let idx = (pos.floor() as usize).min(frames - 1);
        let frac = (pos - idx as f64).clamp(0.0, 1.0);
        let idx2 = if idx + 1 < frames { idx + 1 } else { idx };
        for ch in 0..2 {
            let x0 = input[idx * 2 + ch];
            let x1 = input[idx2 * 2 + ch];
            out[i * 2 + ch] = ((1.0 - frac) * x0 as f64 + frac * x1 as f64) as f32;
        }
    }
    out
}

/// Outcome handed to fetch callbacks. Errors are strings because callbacks
/// cross a thread boundary and only get surfaced as status text.
pub type AssetResult = std::result::Result<Arc<AudioAsset>, String>;

type Callback = Box<dyn FnOnce(AssetResult) + Send + 'static>;
type Decoder = dyn Fn(&Path, u32) -> Result<AudioAsset> + Send + Sync;

enum Entry {
    /// Decode in flight; queued callbacks run on completion.
    Pending(Vec<Callback>),
    Ready(Arc<AudioAsset>),
}

pub struct AssetStore {
    asset_dir: PathBuf,
    sample_rate: u32,
    decoder: Arc<Decoder>,
    entries: Mutex<HashMap<String, Entry>>,
}

const ASSET_EXTENSIONS: [&str; 2] = ["mp3", "wav"];

impl AssetStore {
    pub fn new(asset_dir: impl Into<PathBuf>, sample_rate: u32) -> Arc<Self> {
        Self::with_decoder(asset_dir, sample_rate, decode_asset_file)
    }

    /// Store with an injected decode function (tests count or fail decodes).
    pub fn with_decoder(
        asset_dir: impl Into<PathBuf>,
        sample_rate: u32,
        decoder: impl Fn(&Path, u32) -> Result<AudioAsset> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            asset_dir: asset_dir.into(),
            sample_rate,
            decoder: Arc::new(decoder),
            entries: Mutex::new(HashMap::new()),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Already-decoded asset, if any. Never triggers a load.
    pub fn cached(&self, name: &str) -> Option<Arc<AudioAsset>> {
        match self.entries.lock().get(name) {
            Some(Entry::Ready(asset)) => Some(Arc::clone(asset)),
            _ => None,
        }
    }

    /// Request an asset; `callback` runs with the result, possibly on the
    /// loader thread. Concurrent fetches for one name share one decode.
    pub fn fetch(
        self: &Arc<Self>,
        name: &str,
        callback: impl FnOnce(AssetResult) + Send + 'static,
    ) {
        let mut entries = self.entries.lock();
        match entries.get_mut(name) {
            Some(Entry::Ready(asset)) => {
                let asset = Arc::clone(asset);
                drop(entries);
                callback(Ok(asset));
            }
            Some(Entry::Pending(callbacks)) => {
                callbacks.push(Box::new(callback));
            }
            None => {
                entries.insert(name.to_string(), Entry::Pending(vec![Box::new(callback)]));
                drop(entries);
                let store = Arc::clone(self);
                let key = name.to_string();
                thread::spawn(move || {
                    let result = store.decode(&key);
                    store.complete(&key, result);
                });
            }
        }
    }

    /// Synchronous fetch, for offline rendering and the CLI.
    pub fn fetch_blocking(self: &Arc<Self>, name: &str) -> Result<Arc<AudioAsset>> {
        let (tx, rx) = crossbeam::channel::bounded(1);
        self.fetch(name, move |res| {
            let _ = tx.send(res);
        });
        rx.recv()
            .map_err(|_| anyhow!("asset loader dropped the request"))?
            .map_err(|e| anyhow!(e))
    }

    fn decode(&self, name: &str) -> Result<AudioAsset> {
        let path = self.resolve_path(name)?;
        log::info!("decoding asset {} from {}", name, path.display());
        (self.decoder)(&path, self.sample_rate)
    }

    fn resolve_path(&self, name: &str) -> Result<PathBuf> {
        for ext in ASSET_EXTENSIONS {
            let candidate = self.asset_dir.join(format!("{name}.{ext}"));
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
        // Fall through to the first candidate so the decoder reports a
        // readable open error; injected test decoders never touch the disk.
        Ok(self.asset_dir.join(format!("{name}.{}", ASSET_EXTENSIONS[0])))
    }

    fn complete(&self, name: &str, result: Result<AudioAsset>) {
        let (callbacks, outcome): (Vec<Callback>, AssetResult) = {
            let mut entries = self.entries.lock();
            let callbacks = match entries.remove(name) {
                Some(Entry::Pending(cbs)) => cbs,
                // Ready or absent: nothing waiting (should not happen).
                Some(entry) => {
                    entries.insert(name.to_string(), entry);
                    Vec::new()
                }
                None => Vec::new(),
            };
            match result {
                Ok(asset) => {
                    let asset = Arc::new(asset);
                    entries.insert(name.to_string(), Entry::Ready(Arc::clone(&asset)));
                    (callbacks, Ok(asset))
                }
                Err(e) => {
                    // Entry stays removed: the next selection may retry.
                    log::warn!("asset {name} failed to load: {e:#}");
                    (callbacks, Err(format!("{e:#}")))
                }
            }
        };
        for cb in callbacks {
            cb(outcome.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn stereo_asset(frames: usize, rate: u32) -> AudioAsset {
        AudioAsset::from_samples(vec![0.25; frames * 2], rate)
    }

    #[test]
    fn concurrent_fetches_share_one_decode() {
        let decodes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&decodes);
        let store = AssetStore::with_decoder("unused", 48_000, move |_, rate| {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            Ok(stereo_asset(1000, rate))
        });

        let (tx, rx) = crossbeam::channel::unbounded();
        for _ in 0..4 {
            let tx = tx.clone();
            store.fetch("waterfall", move |res| {
                let _ = tx.send(res.is_ok());
            });
        }
        for _ in 0..4 {
            assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap());
        }
        assert_eq!(decodes.load(Ordering::SeqCst), 1);
        assert!(store.cached("waterfall").is_some());
    }

    #[test]
    fn second_selection_hits_the_cache() {
        let decodes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&decodes);
        let store = AssetStore::with_decoder("unused", 44_100, move |_, rate| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(stereo_asset(500, rate))
        });

        store.fetch_blocking("sea").unwrap();
        store.fetch_blocking("sea").unwrap();
        assert_eq!(decodes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_decode_clears_entry_for_retry() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let store = AssetStore::with_decoder("unused", 44_100, move |_, rate| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(anyhow!("synthetic decode error"))
            } else {
                Ok(stereo_asset(500, rate))
            }
        });

        assert!(store.fetch_blocking("sea").is_err());
        assert!(store.cached("sea").is_none());
        assert!(store.fetch_blocking("sea").is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn resample_preserves_duration() {
        let input = vec![0.5f32; 441 * 2]; // 10 ms at 44.1k
        let out = resample_linear_stereo(&input, 44_100, 48_000);
        assert_eq!(out.len() / 2, 480);
    }

    #[test]
    fn asset_reports_duration() {
        let asset = stereo_asset(44_100, 44_100);
        assert!((asset.duration_seconds() - 1.0).abs() < 1e-6);
        assert_eq!(asset.frames(), 44_100);
    }
}
