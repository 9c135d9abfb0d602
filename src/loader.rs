//! Tile loading, caching and dispatch.
//!
//! [`TileLoader`] arbitrates three storage tiers for every requested
//! tile: the in-memory cache, the on-disk cache, and (for web-enabled
//! loaders) the network. Requests for tiles that are already decoded are
//! answered synchronously; everything else is loaded on a bounded worker
//! pool, with at most one load in flight per `(coordinate, type)` pair.
//! Completion is signalled through per-request callbacks which stay
//! silenced once the accompanying [`RequestHandle`] is dropped.

use std::collections::{BTreeSet, HashMap};
use std::fmt::{self, Display, Formatter};
use std::io::ErrorKind as IoErrorKind;
use std::mem;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use image::RgbaImage;
use serde::{Deserialize, Deserializer};
use tempfile::NamedTempFile;
use tokio::fs as tokio_fs;
use tokio::runtime::{Builder as RuntimeBuilder, Runtime};
use tracing::{debug, error};

use crate::Error;
use crate::coord::{self, MAX_ZOOM, TileCoord, TileType};
use crate::style::StyleSheet;
use crate::tile::VectorTile;

/// Callback invoked once a requested tile reaches a terminal state.
pub type TileReadyCallback = Arc<dyn Fn(TileCoord) + Send + Sync>;

/// Injectable byte source replacing the disk tier in dummy loaders.
pub type ByteSource = Arc<dyn Fn(TileCoord, TileType) -> Option<Vec<u8>> + Send + Sync>;

/// Loading state of a cached tile.
///
/// States move from [`Pending`](Self::Pending) to exactly one terminal
/// state per load; terminal entries stay immutable. `Cancelled` exists
/// for hosts tracking silenced subscriptions and is never written by the
/// loader itself, which keeps the entry's real outcome instead.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum LoadedTileState {
    Ok,
    Pending,
    ParsingFailed,
    Cancelled,
    UnknownError,
}

/// Tile loader configuration.
#[derive(Deserialize, Clone, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderConfig {
    /// Vector tile source URL template, using `{z}`, `{x}` and `{y}`.
    pub pbf_url_template: Option<String>,
    /// Raster tile source URL template, using `{z}`, `{x}` and `{y}`.
    pub png_url_template: Option<String>,
    /// Root directory of the disk cache.
    ///
    /// Defaults to `meridian/tiles` under the user cache directory.
    pub cache_dir: Option<PathBuf>,
    /// Whether tiles missing from memory and disk are fetched from the
    /// network.
    pub use_web: bool,
    /// Whether the raster tile pipeline is active.
    pub load_raster: bool,
    /// Worker pool size, defaulting to the host CPU count.
    pub worker_threads: Option<usize>,
    /// Per-fetch network timeout in seconds.
    pub network_timeout: SecsDuration,
    /// Highest tile zoom accepted by the request surface.
    pub max_zoom: u8,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            pbf_url_template: None,
            png_url_template: None,
            cache_dir: None,
            use_web: false,
            load_raster: true,
            worker_threads: None,
            network_timeout: Duration::from_secs(30).into(),
            max_zoom: MAX_ZOOM,
        }
    }
}

/// Config wrapper for second-precision durations.
#[derive(Copy, Clone, Hash, PartialEq, Eq, Debug)]
pub struct SecsDuration(Duration);

impl Deref for SecsDuration {
    type Target = Duration;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'de> Deserialize<'de> for SecsDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs).into())
    }
}

impl From<Duration> for SecsDuration {
    fn from(duration: Duration) -> Self {
        Self(duration)
    }
}

impl Display for SecsDuration {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}", self.0.as_secs())
    }
}

/// Three-tier tile cache with asynchronous completion signalling.
pub struct TileLoader {
    shared: Arc<Shared>,
    runtime: Runtime,
    style: StyleSheet,
}

impl TileLoader {
    /// Create a web-enabled loader reading from memory, disk, and the
    /// network.
    pub fn from_url_templates(
        pbf_url_template: impl Into<String>,
        png_url_template: impl Into<String>,
        style: StyleSheet,
    ) -> Result<Self, Error> {
        let config = LoaderConfig {
            pbf_url_template: Some(pbf_url_template.into()),
            png_url_template: Some(png_url_template.into()),
            use_web: true,
            ..Default::default()
        };
        Self::with_config(config, style)
    }

    /// Create a loader that reads from memory and disk only, never
    /// contacting the network.
    pub fn local_only(style: StyleSheet) -> Result<Self, Error> {
        Self::with_config(LoaderConfig::default(), style)
    }

    /// Create a deterministic loader for tests.
    ///
    /// Behaves like [`Self::local_only`], but reads from `cache_dir` and
    /// lets `load_override` replace the disk tier entirely.
    pub fn dummy(
        cache_dir: impl Into<PathBuf>,
        load_override: Option<ByteSource>,
        load_raster: bool,
        worker_threads: Option<usize>,
    ) -> Result<Self, Error> {
        let config = LoaderConfig {
            cache_dir: Some(cache_dir.into()),
            load_raster,
            worker_threads,
            ..Default::default()
        };
        Self::new(config, StyleSheet::default(), load_override)
    }

    /// Create a loader from explicit configuration.
    pub fn with_config(config: LoaderConfig, style: StyleSheet) -> Result<Self, Error> {
        Self::new(config, style, None)
    }

    fn new(
        config: LoaderConfig,
        style: StyleSheet,
        load_override: Option<ByteSource>,
    ) -> Result<Self, Error> {
        let cache_dir = match config.cache_dir {
            Some(cache_dir) => cache_dir,
            None => dirs::cache_dir().ok_or(Error::MissingCacheDir)?.join("meridian/tiles"),
        };

        let client = reqwest::Client::builder().timeout(*config.network_timeout).build()?;

        // The worker pool; defaults to one thread per host CPU.
        let mut builder = RuntimeBuilder::new_multi_thread();
        builder.enable_all().thread_name("meridian-tile-worker");
        if let Some(worker_threads) = config.worker_threads {
            builder.worker_threads(worker_threads);
        }
        let runtime = builder.build()?;

        let shared = Arc::new(Shared {
            memory: Mutex::new(TileMemory::default()),
            pbf_url_template: config.pbf_url_template,
            png_url_template: config.png_url_template,
            use_web: config.use_web,
            load_raster: config.load_raster,
            max_zoom: config.max_zoom,
            load_override,
            cache_dir,
            client,
        });

        Ok(Self { shared, runtime, style })
    }

    /// Request a set of tiles.
    ///
    /// Tiles already decoded in memory are returned synchronously in the
    /// result's snapshot. With `load_missing` and a callback, every other
    /// tile is transitioned to [`LoadedTileState::Pending`] and loaded in
    /// the background, deduplicating against loads already in flight; the
    /// callback fires exactly once per tile load reaching a terminal
    /// state, unless the returned handle was dropped first.
    pub fn request_tiles(
        &self,
        requested: &BTreeSet<TileCoord>,
        on_ready: Option<TileReadyCallback>,
        load_missing: bool,
    ) -> Result<RequestedTiles, Error> {
        for coord in requested {
            if !coord.is_valid(self.shared.max_zoom) {
                return Err(Error::InvalidCoord(*coord));
            }
        }

        let subscription = on_ready.map(|callback| Arc::new(Subscription { callback }));
        let subscribe = load_missing.then_some(subscription.as_ref()).flatten();

        let mut result =
            RequestedTiles { vector: HashMap::new(), raster: HashMap::new(), handle: None };
        let mut jobs = Vec::new();

        {
            let mut memory = self.shared.memory.lock().unwrap();
            for &coord in requested {
                visit_entry(
                    &mut memory.vector,
                    coord,
                    TileType::Vector,
                    subscribe,
                    &mut result.vector,
                    &mut jobs,
                );
                if self.shared.load_raster {
                    visit_entry(
                        &mut memory.raster,
                        coord,
                        TileType::Raster,
                        subscribe,
                        &mut result.raster,
                        &mut jobs,
                    );
                }
            }
        }

        for (coord, tile_type) in jobs {
            let shared = self.shared.clone();
            self.runtime.spawn(load_tile(shared, coord, tile_type));
        }

        result.handle = subscription.map(|subscription| RequestHandle { _subscription: subscription });
        Ok(result)
    }

    /// The stylesheet this loader was constructed with.
    pub fn style(&self) -> &StyleSheet {
        &self.style
    }

    /// Current cache state of a tile, if an entry exists.
    pub fn tile_state(&self, coord: TileCoord, tile_type: TileType) -> Option<LoadedTileState> {
        let memory = self.shared.memory.lock().unwrap();
        match tile_type {
            TileType::Vector => memory.vector.get(&coord).map(|stored| stored.state),
            TileType::Raster => memory.raster.get(&coord).map(|stored| stored.state),
        }
    }

    /// Absolute disk cache path of a tile.
    pub fn tile_disk_path(&self, coord: TileCoord, tile_type: TileType) -> Result<PathBuf, Error> {
        Ok(self.shared.cache_dir.join(coord::disk_sub_path(coord, tile_type)?))
    }

    /// Root directory of the disk cache.
    pub fn cache_dir(&self) -> &Path {
        &self.shared.cache_dir
    }
}

/// Synchronous result of [`TileLoader::request_tiles`].
///
/// Holds the memory snapshot of requested tiles in `Ok` state, plus the
/// handle carrying this request's callback subscription.
pub struct RequestedTiles {
    pub vector: HashMap<TileCoord, Arc<VectorTile>>,
    pub raster: HashMap<TileCoord, Arc<RgbaImage>>,
    pub handle: Option<RequestHandle>,
}

/// Opaque subscription token.
///
/// Dropping the handle silences the callback it carries, from any
/// thread. Loads already in flight keep running and still populate the
/// cache; only the notification is suppressed.
pub struct RequestHandle {
    _subscription: Arc<Subscription>,
}

struct Subscription {
    callback: TileReadyCallback,
}

/// State shared between the loader and its worker jobs.
struct Shared {
    memory: Mutex<TileMemory>,
    client: reqwest::Client,
    cache_dir: PathBuf,
    pbf_url_template: Option<String>,
    png_url_template: Option<String>,
    use_web: bool,
    load_raster: bool,
    load_override: Option<ByteSource>,
    max_zoom: u8,
}

/// In-memory tile cache.
///
/// A single mutex guards both maps; it is held for lookups and state
/// transitions only, never across decoding or I/O.
#[derive(Default)]
struct TileMemory {
    vector: HashMap<TileCoord, StoredTile<Arc<VectorTile>>>,
    raster: HashMap<TileCoord, StoredTile<Arc<RgbaImage>>>,
}

/// Cache entry for one tile.
struct StoredTile<T> {
    state: LoadedTileState,
    /// Decoded payload, present exactly when `state` is `Ok`.
    payload: Option<T>,
    /// Subscriptions to notify on the next terminal transition.
    waiters: Vec<Weak<Subscription>>,
}

impl<T> StoredTile<T> {
    fn pending(waiter: Weak<Subscription>) -> Self {
        Self { state: LoadedTileState::Pending, payload: None, waiters: vec![waiter] }
    }
}

/// Handle one requested tile under the cache lock.
///
/// Publishes `Pending` and schedules a job when no entry exists,
/// subscribes to loads already in flight, and snapshots decoded
/// payloads. Terminal `ParsingFailed` entries are left alone, while
/// `UnknownError` may be re-requested into a fresh load.
fn visit_entry<T: Clone>(
    map: &mut HashMap<TileCoord, StoredTile<T>>,
    coord: TileCoord,
    tile_type: TileType,
    subscribe: Option<&Arc<Subscription>>,
    snapshot: &mut HashMap<TileCoord, T>,
    jobs: &mut Vec<(TileCoord, TileType)>,
) {
    match map.get_mut(&coord) {
        Some(stored) if stored.state == LoadedTileState::Ok => {
            if let Some(payload) = &stored.payload {
                snapshot.insert(coord, payload.clone());
            }
        },
        Some(stored) if stored.state == LoadedTileState::Pending => {
            if let Some(subscription) = subscribe {
                stored.waiters.push(Arc::downgrade(subscription));
            }
        },
        Some(stored) if stored.state == LoadedTileState::UnknownError => {
            if let Some(subscription) = subscribe {
                *stored = StoredTile::pending(Arc::downgrade(subscription));
                jobs.push((coord, tile_type));
            }
        },
        // ParsingFailed stays terminal; retrying undecodable bytes is
        // pointless without eviction.
        Some(_) => (),
        None => {
            if let Some(subscription) = subscribe {
                map.insert(coord, StoredTile::pending(Arc::downgrade(subscription)));
                jobs.push((coord, tile_type));
            }
        },
    }
}

/// Decoded tile payload heading into the cache.
enum Payload {
    Vector(Arc<VectorTile>),
    Raster(Arc<RgbaImage>),
}

/// Load one tile through the disk and network tiers.
///
/// The entry was published as `Pending` by the requester; this job owns
/// its single transition to a terminal state.
async fn load_tile(shared: Arc<Shared>, coord: TileCoord, tile_type: TileType) {
    // Disk tier, or the injected byte source for dummy loaders.
    let bytes = match &shared.load_override {
        Some(load_override) => load_override(coord, tile_type),
        None => {
            let sub_path = match coord::disk_sub_path(coord, tile_type) {
                Ok(sub_path) => sub_path,
                Err(_) => {
                    publish(&shared, coord, tile_type, LoadedTileState::UnknownError, None);
                    return;
                },
            };

            match tokio_fs::read(shared.cache_dir.join(sub_path)).await {
                Ok(bytes) => Some(bytes),
                Err(err) if err.kind() == IoErrorKind::NotFound => None,
                Err(err) => {
                    error!("Failed to read cached tile {coord}: {err}");
                    publish(&shared, coord, tile_type, LoadedTileState::UnknownError, None);
                    return;
                },
            }
        },
    };

    if let Some(bytes) = bytes {
        debug!("Disk cache hit for {coord}");
        let (state, payload) = decode_payload(coord, tile_type, &bytes);
        publish(&shared, coord, tile_type, state, payload);
        return;
    }

    // Network tier.
    if !shared.use_web {
        publish(&shared, coord, tile_type, LoadedTileState::UnknownError, None);
        return;
    }

    let template = match tile_type {
        TileType::Vector => &shared.pbf_url_template,
        TileType::Raster => &shared.png_url_template,
    };
    let url = match template.as_deref().map(|template| coord::pbf_url(template, coord)) {
        Some(Ok(url)) => url,
        _ => {
            publish(&shared, coord, tile_type, LoadedTileState::UnknownError, None);
            return;
        },
    };

    let bytes = match fetch(&shared, &url).await {
        Ok(bytes) => bytes,
        Err(err) => {
            error!("Tile download failed for {coord}: {err}");
            publish(&shared, coord, tile_type, LoadedTileState::UnknownError, None);
            return;
        },
    };

    let (state, payload) = decode_payload(coord, tile_type, &bytes);

    // Write-through is best effort; a failed disk write never downgrades
    // the in-memory result.
    if state == LoadedTileState::Ok
        && let Err(err) = write_to_disk(&shared, coord, tile_type, &bytes).await
    {
        error!("Failed to write tile {coord} to disk cache: {err}");
    }

    publish(&shared, coord, tile_type, state, payload);
}

async fn fetch(shared: &Shared, url: &str) -> Result<Vec<u8>, Error> {
    let response = shared.client.get(url).send().await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}

/// Decode tile bytes into their in-memory payload.
fn decode_payload(
    coord: TileCoord,
    tile_type: TileType,
    bytes: &[u8],
) -> (LoadedTileState, Option<Payload>) {
    match tile_type {
        TileType::Vector => match VectorTile::decode(bytes) {
            Ok(tile) => (LoadedTileState::Ok, Some(Payload::Vector(Arc::new(tile)))),
            Err(err) => {
                error!("Failed to decode vector tile {coord}: {err}");
                (LoadedTileState::ParsingFailed, None)
            },
        },
        TileType::Raster => match image::load_from_memory(bytes) {
            Ok(image) => (LoadedTileState::Ok, Some(Payload::Raster(Arc::new(image.to_rgba8())))),
            Err(err) => {
                error!("Failed to decode raster tile {coord}: {err}");
                (LoadedTileState::ParsingFailed, None)
            },
        },
    }
}

/// Publish a terminal state and notify subscribers.
///
/// Callbacks run strictly after the cache entry is visible and the lock
/// is released.
fn publish(
    shared: &Shared,
    coord: TileCoord,
    tile_type: TileType,
    state: LoadedTileState,
    payload: Option<Payload>,
) {
    let waiters = {
        let mut memory = shared.memory.lock().unwrap();
        match tile_type {
            TileType::Vector => {
                let payload = match payload {
                    Some(Payload::Vector(tile)) => Some(tile),
                    _ => None,
                };
                publish_entry(&mut memory.vector, coord, state, payload)
            },
            TileType::Raster => {
                let payload = match payload {
                    Some(Payload::Raster(image)) => Some(image),
                    _ => None,
                };
                publish_entry(&mut memory.raster, coord, state, payload)
            },
        }
    };

    for waiter in waiters {
        if let Some(subscription) = waiter.upgrade() {
            (subscription.callback)(coord);
        }
    }
}

fn publish_entry<T>(
    map: &mut HashMap<TileCoord, StoredTile<T>>,
    coord: TileCoord,
    state: LoadedTileState,
    payload: Option<T>,
) -> Vec<Weak<Subscription>> {
    let stored = map.entry(coord).or_insert_with(|| StoredTile {
        state: LoadedTileState::Pending,
        payload: None,
        waiters: Vec::new(),
    });

    stored.state = state;
    stored.payload = payload;
    mem::take(&mut stored.waiters)
}

/// Atomically write tile bytes into the disk cache.
async fn write_to_disk(
    shared: &Shared,
    coord: TileCoord,
    tile_type: TileType,
    bytes: &[u8],
) -> Result<(), Error> {
    let path = shared.cache_dir.join(coord::disk_sub_path(coord, tile_type)?);

    // Write-then-rename keeps concurrent readers safe.
    tokio_fs::create_dir_all(&shared.cache_dir).await?;
    let file = NamedTempFile::new_in(&shared.cache_dir)?;
    tokio_fs::write(file.path(), bytes).await?;
    file.persist(path)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc::{self, Receiver};
    use std::thread;
    use std::time::Instant;

    use prost::Message;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    use super::*;
    use crate::tile::protobuf;

    fn init_logging() {
        let directives = std::env::var("RUST_LOG").unwrap_or("warn".into());
        let env_filter = EnvFilter::builder().parse_lossy(directives);
        let _ = FmtSubscriber::builder()
            .with_env_filter(env_filter)
            .with_test_writer()
            .try_init();
    }

    fn sample_tile_bytes() -> Vec<u8> {
        protobuf::Tile {
            layers: vec![protobuf::Layer {
                version: 2,
                name: "water".into(),
                features: vec![protobuf::Feature {
                    id: Some(1),
                    tags: Vec::new(),
                    r#type: Some(protobuf::GeomType::Polygon as i32),
                    geometry: vec![9, 0, 0, 26, 20, 0, 0, 20, 19, 0, 15],
                }],
                keys: Vec::new(),
                values: Vec::new(),
                extent: 4096,
            }],
        }
        .encode_to_vec()
    }

    fn sample_png_bytes() -> Vec<u8> {
        let image = RgbaImage::from_pixel(1, 1, image::Rgba([255, 0, 0, 255]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        image.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    fn channel_callback() -> (TileReadyCallback, Receiver<TileCoord>) {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let callback: TileReadyCallback = Arc::new(move |coord| {
            let _ = tx.lock().unwrap().send(coord);
        });
        (callback, rx)
    }

    fn wait_for_state(
        loader: &TileLoader,
        coord: TileCoord,
        tile_type: TileType,
        state: LoadedTileState,
    ) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if loader.tile_state(coord, tile_type) == Some(state) {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("tile {coord} never reached {state:?}");
    }

    #[test]
    fn offline_disk_hit() {
        init_logging();

        let dir = tempfile::tempdir().unwrap();
        let coord = TileCoord::new(2, 1, 1);
        fs::write(dir.path().join("z2x1y1.mvt"), sample_tile_bytes()).unwrap();

        let loader = TileLoader::dummy(dir.path(), None, false, Some(2)).unwrap();
        let (callback, rx) = channel_callback();

        let requested = BTreeSet::from([coord]);
        let result = loader.request_tiles(&requested, Some(callback), true).unwrap();
        assert!(result.vector.is_empty());

        // Exactly one notification.
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), coord);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        // The payload is now returned synchronously, without a callback.
        let snapshot = loader.request_tiles(&requested, None, false).unwrap();
        assert!(snapshot.vector.contains_key(&coord));
        assert!(snapshot.handle.is_none());
        assert_eq!(loader.tile_state(coord, TileType::Vector), Some(LoadedTileState::Ok));
    }

    #[test]
    fn corrupt_tile_parses_once() {
        let dir = tempfile::tempdir().unwrap();
        let coord = TileCoord::new(2, 1, 1);
        let mut bytes = sample_tile_bytes();
        bytes[0] = 0xff;
        fs::write(dir.path().join("z2x1y1.mvt"), bytes).unwrap();

        let loader = TileLoader::dummy(dir.path(), None, false, Some(2)).unwrap();
        let (callback, rx) = channel_callback();

        let requested = BTreeSet::from([coord]);
        let _result = loader.request_tiles(&requested, Some(callback), true).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), coord);
        assert_eq!(
            loader.tile_state(coord, TileType::Vector),
            Some(LoadedTileState::ParsingFailed)
        );

        // A repeated request must not re-attempt the disk read.
        let (callback, rx) = channel_callback();
        let result = loader.request_tiles(&requested, Some(callback), true).unwrap();
        assert!(result.vector.is_empty());
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        assert_eq!(
            loader.tile_state(coord, TileType::Vector),
            Some(LoadedTileState::ParsingFailed)
        );
    }

    #[test]
    fn single_flight() {
        init_logging();

        let dir = tempfile::tempdir().unwrap();
        let coord = TileCoord::new(3, 2, 5);

        let loads = Arc::new(AtomicUsize::new(0));
        let source_loads = loads.clone();
        let load_override: ByteSource = Arc::new(move |_, _| {
            source_loads.fetch_add(1, Ordering::SeqCst);
            // Keep the load in flight long enough for both requests to
            // subscribe to the same entry.
            thread::sleep(Duration::from_millis(200));
            Some(sample_tile_bytes())
        });

        let loader =
            Arc::new(TileLoader::dummy(dir.path(), Some(load_override), false, Some(4)).unwrap());

        let threads: Vec<_> = (0..2)
            .map(|_| {
                let loader = loader.clone();
                thread::spawn(move || {
                    let (callback, rx) = channel_callback();
                    let requested = BTreeSet::from([coord]);
                    let _result = loader.request_tiles(&requested, Some(callback), true).unwrap();
                    rx.recv_timeout(Duration::from_secs(5)).unwrap()
                })
            })
            .collect();

        for thread in threads {
            assert_eq!(thread.join().unwrap(), coord);
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(loader.tile_state(coord, TileType::Vector), Some(LoadedTileState::Ok));
    }

    #[test]
    fn dropped_handle_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let coord = TileCoord::new(2, 1, 1);

        let load_override: ByteSource = Arc::new(move |_, _| {
            thread::sleep(Duration::from_millis(100));
            Some(sample_tile_bytes())
        });
        let loader = TileLoader::dummy(dir.path(), Some(load_override), false, Some(2)).unwrap();
        let (callback, rx) = channel_callback();

        let requested = BTreeSet::from([coord]);
        let result = loader.request_tiles(&requested, Some(callback), true).unwrap();
        drop(result);

        // The load still completes and populates the cache, but the
        // dropped handle's callback stays silent.
        wait_for_state(&loader, coord, TileType::Vector, LoadedTileState::Ok);
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn missing_tile_is_unknown_error_and_retryable() {
        let dir = tempfile::tempdir().unwrap();
        let coord = TileCoord::new(2, 1, 1);

        let loader = TileLoader::dummy(dir.path(), None, false, Some(2)).unwrap();
        let requested = BTreeSet::from([coord]);

        let (callback, rx) = channel_callback();
        let _result = loader.request_tiles(&requested, Some(callback), true).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), coord);
        assert_eq!(
            loader.tile_state(coord, TileType::Vector),
            Some(LoadedTileState::UnknownError)
        );

        // Manual re-request starts a fresh load.
        fs::write(dir.path().join("z2x1y1.mvt"), sample_tile_bytes()).unwrap();
        let (callback, rx) = channel_callback();
        let _result = loader.request_tiles(&requested, Some(callback), true).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), coord);
        assert_eq!(loader.tile_state(coord, TileType::Vector), Some(LoadedTileState::Ok));
    }

    #[test]
    fn raster_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let coord = TileCoord::new(2, 1, 1);
        fs::write(dir.path().join("z2x1y1.png"), sample_png_bytes()).unwrap();

        let loader = TileLoader::dummy(dir.path(), None, true, Some(2)).unwrap();
        let (callback, rx) = channel_callback();

        let requested = BTreeSet::from([coord]);
        let _result = loader.request_tiles(&requested, Some(callback), true).unwrap();

        // One notification per tile type: the raster load succeeds while
        // the vector load errors out.
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), coord);
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), coord);

        wait_for_state(&loader, coord, TileType::Raster, LoadedTileState::Ok);
        let snapshot = loader.request_tiles(&requested, None, false).unwrap();
        let raster = snapshot.raster.get(&coord).unwrap();
        assert_eq!(raster.dimensions(), (1, 1));
        assert_eq!(
            loader.tile_state(coord, TileType::Vector),
            Some(LoadedTileState::UnknownError)
        );
    }

    #[test]
    fn rejects_invalid_coordinates() {
        let dir = tempfile::tempdir().unwrap();
        let loader = TileLoader::dummy(dir.path(), None, false, Some(1)).unwrap();

        let requested = BTreeSet::from([TileCoord::new(2, 7, 0)]);
        assert!(matches!(
            loader.request_tiles(&requested, None, false),
            Err(Error::InvalidCoord(_))
        ));
    }

    #[test]
    fn disk_paths() {
        let dir = tempfile::tempdir().unwrap();
        let loader = TileLoader::dummy(dir.path(), None, false, Some(1)).unwrap();

        let coord = TileCoord::new(2, 1, 1);
        let path = loader.tile_disk_path(coord, TileType::Vector).unwrap();
        assert_eq!(path, dir.path().join("z2x1y1.mvt"));
    }

    #[test]
    fn config_deserialization() {
        let config: LoaderConfig = serde_json::from_value(serde_json::json!({
            "use_web": true,
            "network_timeout": 5,
            "worker_threads": 3,
            "max_zoom": 14,
        }))
        .unwrap();

        assert!(config.use_web);
        assert_eq!(*config.network_timeout, Duration::from_secs(5));
        assert_eq!(config.worker_threads, Some(3));
        assert_eq!(config.max_zoom, 14);
        assert!(config.load_raster);

        // Unknown keys are rejected.
        assert!(
            serde_json::from_value::<LoaderConfig>(serde_json::json!({ "cache": "/tmp" })).is_err()
        );
    }
}
