use std::fs::File;
use std::io::Read;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, warn};
use lru::LruCache;
use thiserror::Error;

use crate::geo::{Bounds, LatLon};

pub const SRTM3_SIZE: usize = 1201;
pub const SRTM1_SIZE: usize = 3601;

#[derive(Error, Debug)]
pub enum TerrainError {
    #[error("No elevation tile {0}")]
    MissingTile(String),

    #[error("Could not read elevation tile {name}: {source}")]
    Unreadable {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Elevation tile {name} has {samples} samples, expected an SRTM1 or SRTM3 grid")]
    UnknownSize { name: String, samples: usize },
}

/// Ground height source for path profiles.
pub trait TerrainProvider {
    /// Ground height above mean sea level, metres.
    fn altitude(&self, loc: LatLon) -> Result<f64, TerrainError>;
}

/// Constant-height terrain.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatTerrain {
    pub height_m: f64,
}

impl TerrainProvider for FlatTerrain {
    fn altitude(&self, _loc: LatLon) -> Result<f64, TerrainError> {
        Ok(self.height_m)
    }
}

#[derive(Debug, Clone)]
pub struct TerrainTile {
    pub latitude: i32,
    pub longitude: i32,
    pub size: usize,
    pub data: Vec<i16>, // Row-major, big-endian parsed
}

impl TerrainTile {
    /// Returns altitude in meters at specific local coordinates (0.0 to 1.0)
    /// where (0,0) is top-left (NW) and (1,1) is bottom-right (SE)
    pub fn sample(&self, u: f64, v: f64) -> f64 {
        let max_idx = (self.size - 1) as f64;
        let x = u.clamp(0.0, 1.0) * max_idx;
        let y = v.clamp(0.0, 1.0) * max_idx;

        // Bilinear interpolation
        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(self.size - 1);
        let y1 = (y0 + 1).min(self.size - 1);

        let tx = x - x0 as f64;
        let ty = y - y0 as f64;

        let h00 = self.get_height(x0, y0) as f64;
        let h10 = self.get_height(x1, y0) as f64;
        let h01 = self.get_height(x0, y1) as f64;
        let h11 = self.get_height(x1, y1) as f64;

        let h0 = h00 * (1.0 - tx) + h10 * tx;
        let h1 = h01 * (1.0 - tx) + h11 * tx;

        h0 * (1.0 - ty) + h1 * ty
    }

    #[inline(always)]
    pub fn get_height(&self, x: usize, y: usize) -> i16 {
        self.data[y * self.size + x]
    }

    pub fn flat(lat: i32, lon: i32) -> Self {
        Self {
            latitude: lat,
            longitude: lon,
            size: SRTM3_SIZE,
            data: vec![0; SRTM3_SIZE * SRTM3_SIZE],
        }
    }
}

/// `N45E005.hgt` style name of the tile whose SW corner is (lat, lon).
pub fn hgt_tile_name(lat: i32, lon: i32) -> String {
    format!(
        "{}{:02}{}{:03}.hgt",
        if lat >= 0 { "N" } else { "S" },
        lat.abs(),
        if lon >= 0 { "E" } else { "W" },
        lon.abs()
    )
}

/// Names of every tile intersecting `bounds`.
pub fn hgt_tiles_for_bounds(bounds: &Bounds) -> Vec<String> {
    let lat_start = bounds.south.floor() as i32;
    let lat_end = bounds.north.ceil() as i32;
    let lon_start = bounds.west.floor() as i32;
    let lon_end = bounds.east.ceil() as i32;
    (lat_start..lat_end)
        .flat_map(|lat| (lon_start..lon_end).map(move |lon| hgt_tile_name(lat, lon)))
        .collect()
}

/// What to do when a tile file is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingTilePolicy {
    #[default]
    Fail,
    /// Treat the whole tile as sea level.
    Flat,
}

pub struct TerrainLoader {
    pub assets_path: PathBuf,
    pub missing: MissingTilePolicy,
}

impl TerrainLoader {
    pub fn new(assets_path: PathBuf) -> Self {
        Self { assets_path, missing: MissingTilePolicy::default() }
    }

    pub fn with_missing_policy(mut self, missing: MissingTilePolicy) -> Self {
        self.missing = missing;
        self
    }

    pub fn load_tile(&self, lat: i32, lon: i32) -> Result<TerrainTile, TerrainError> {
        let name = hgt_tile_name(lat, lon);
        let path = self.assets_path.join(&name);

        if !path.exists() {
            return match self.missing {
                MissingTilePolicy::Flat => {
                    warn!("{name} not found in {:?}, using sea level", self.assets_path);
                    Ok(TerrainTile::flat(lat, lon))
                }
                MissingTilePolicy::Fail => Err(TerrainError::MissingTile(name)),
            };
        }

        let data = read_hgt(&path)
            .map_err(|source| TerrainError::Unreadable { name: name.clone(), source })?;
        let size = match data.len() {
            n if n == SRTM3_SIZE * SRTM3_SIZE => SRTM3_SIZE,
            n if n == SRTM1_SIZE * SRTM1_SIZE => SRTM1_SIZE,
            samples => return Err(TerrainError::UnknownSize { name, samples }),
        };
        debug!("loaded {name} ({size}x{size})");

        Ok(TerrainTile {
            latitude: lat,
            longitude: lon,
            size,
            data,
        })
    }
}

fn read_hgt(path: &Path) -> std::io::Result<Vec<i16>> {
    let mut file = File::open(path)?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;

    Ok(buffer
        .chunks_exact(2)
        .map(|chunk| i16::from_be_bytes([chunk[0], chunk[1]]))
        .collect())
}

/// Tile loader with an LRU cache in front; safe to share between requests.
pub struct TerrainManager {
    loader: TerrainLoader,
    cache: Arc<Mutex<LruCache<(i32, i32), Arc<TerrainTile>>>>,
}

impl TerrainManager {
    pub fn new(loader: TerrainLoader, cache_capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            loader,
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    pub fn get_tile(&self, lat: i32, lon: i32) -> Result<Arc<TerrainTile>, TerrainError> {
        {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(tile) = cache.get(&(lat, lon)) {
                return Ok(tile.clone());
            }
        }

        let tile = Arc::new(self.loader.load_tile(lat, lon)?);

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.put((lat, lon), tile.clone());

        Ok(tile)
    }
}

impl TerrainProvider for TerrainManager {
    fn altitude(&self, loc: LatLon) -> Result<f64, TerrainError> {
        let lat_deg = loc.latitude.floor() as i32;
        let lon_deg = loc.longitude.floor() as i32;

        let tile = self.get_tile(lat_deg, lon_deg)?;
        let u = loc.longitude - lon_deg as f64;
        // Row 0 is the northern edge of the tile.
        let v = (lat_deg as f64 + 1.0) - loc.latitude;
        Ok(tile.sample(u, v))
    }
}
