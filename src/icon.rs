//! Weather icons. Icons are SVGs from the Makin-Things weather icon set,
//! downloaded on demand, rasterized to a square bitmap, and cached on disk as
//! PNGs so later runs don't need the network.

use image::{ImageFormat, RgbaImage};
use log::{debug, info, warn};
use resvg::{
    tiny_skia::{Pixmap, Transform},
    usvg::{self, Options, Tree},
};
use std::{
    collections::HashMap,
    fmt::{self, Debug, Formatter},
    fs,
    io::Read,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tempfile::NamedTempFile;
use thiserror::Error;
use ureq::Agent;

/// The set of weather glyphs a row can show. The names double as the icon
/// file names in the upstream repository.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum IconCategory {
    ClearDay,
    Cloudy1Day,
    Cloudy2Day,
    Cloudy,
    Fog,
    Rainy1,
    Rainy2,
    Rainy3,
    Snowy1,
    Snowy2,
    Snowy3,
    Thunderstorms,
}

impl IconCategory {
    pub const ALL: &'static [Self] = &[
        Self::ClearDay,
        Self::Cloudy1Day,
        Self::Cloudy2Day,
        Self::Cloudy,
        Self::Fog,
        Self::Rainy1,
        Self::Rainy2,
        Self::Rainy3,
        Self::Snowy1,
        Self::Snowy2,
        Self::Snowy3,
        Self::Thunderstorms,
    ];

    /// Map a WMO weather interpretation code (as used by Open-Meteo) to an
    /// icon. Anything we don't recognize is drawn as a plain cloud.
    /// https://open-meteo.com/en/docs#weathervariables
    pub fn classify(code: i64) -> Self {
        match code {
            0 => Self::ClearDay,
            1 => Self::Cloudy1Day,
            2 => Self::Cloudy2Day,
            3 => Self::Cloudy,
            45 | 48 => Self::Fog,
            51 | 53 | 55 => Self::Rainy1,
            61 | 63 => Self::Rainy2,
            65 => Self::Rainy3,
            71 | 73 => Self::Snowy1,
            75 => Self::Snowy3,
            80 | 81 => Self::Rainy2,
            82 => Self::Rainy3,
            95 | 96 | 99 => Self::Thunderstorms,
            _ => Self::Cloudy,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::ClearDay => "clear-day",
            Self::Cloudy1Day => "cloudy-1-day",
            Self::Cloudy2Day => "cloudy-2-day",
            Self::Cloudy => "cloudy",
            Self::Fog => "fog",
            Self::Rainy1 => "rainy-1",
            Self::Rainy2 => "rainy-2",
            Self::Rainy3 => "rainy-3",
            Self::Snowy1 => "snowy-1",
            Self::Snowy2 => "snowy-2",
            Self::Snowy3 => "snowy-3",
            Self::Thunderstorms => "thunderstorms",
        }
    }
}

/// A rasterized icon, ready to be composited
#[derive(PartialEq)]
pub struct Icon {
    pub name: String,
    pub size: u32,
    pub pixels: RgbaImage,
}

// Dumping every pixel makes test failures unreadable
impl Debug for Icon {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Icon")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum IconError {
    #[error("Error downloading icon from {url}")]
    Fetch {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },
    #[error("Error reading icon body from {url}")]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Icon cache I/O error at {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid SVG for icon `{name}`")]
    Svg {
        name: String,
        #[source]
        source: usvg::Error,
    },
    #[error("Cannot rasterize icon `{name}` at {size}px")]
    Raster { name: String, size: u32 },
    #[error("Error encoding or decoding cached icon {}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("Icon `{name}` at {size}px already failed to load")]
    Unavailable { name: String, size: u32 },
}

/// Anything that can hand out icon bitmaps by name and pixel size. Every
/// failure means the same thing to callers: draw without the icon.
pub trait IconResolver {
    fn resolve(
        &mut self,
        name: &str,
        size: u32,
    ) -> Result<Arc<Icon>, IconError>;
}

/// Where raw SVG data comes from
pub trait IconSource {
    fn fetch_svg(&self, name: &str) -> Result<Vec<u8>, IconError>;
}

/// Download icons from the Makin-Things GitHub repository
#[derive(Debug)]
pub struct HttpIconSource {
    agent: Agent,
    base_url: String,
}

impl HttpIconSource {
    const BASE_URL: &'static str = concat!(
        "https://raw.githubusercontent.com",
        "/Makin-Things/weather-icons/master/static"
    );
    const TIMEOUT: Duration = Duration::from_secs(10);
    /// The real icons are a few KB; anything bigger is not an icon
    const MAX_BYTES: u64 = 1024 * 1024;

    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(Self::TIMEOUT).build(),
            base_url: Self::BASE_URL.into(),
        }
    }
}

impl Default for HttpIconSource {
    fn default() -> Self {
        Self::new()
    }
}

impl IconSource for HttpIconSource {
    fn fetch_svg(&self, name: &str) -> Result<Vec<u8>, IconError> {
        let url = format!("{}/{name}.svg", self.base_url);
        info!("Downloading icon {url}");
        let response =
            self.agent
                .get(&url)
                .call()
                .map_err(|source| IconError::Fetch {
                    url: url.clone(),
                    source: Box::new(source),
                })?;
        let mut body = Vec::new();
        response
            .into_reader()
            .take(Self::MAX_BYTES)
            .read_to_end(&mut body)
            .map_err(|source| IconError::Body { url, source })?;
        Ok(body)
    }
}

/// Render SVG data to a `size`x`size` bitmap. The image is stretched to fill
/// the square regardless of its aspect ratio.
pub fn rasterize(
    name: &str,
    svg: &[u8],
    size: u32,
) -> Result<RgbaImage, IconError> {
    let raster_error = || IconError::Raster {
        name: name.into(),
        size,
    };
    let tree =
        Tree::from_data(svg, &Options::default()).map_err(|source| {
            IconError::Svg {
                name: name.into(),
                source,
            }
        })?;
    let mut pixmap = Pixmap::new(size, size).ok_or_else(raster_error)?;
    let svg_size = tree.size();
    let transform = Transform::from_scale(
        size as f32 / svg_size.width(),
        size as f32 / svg_size.height(),
    );
    resvg::render(&tree, transform, &mut pixmap.as_mut());

    // tiny-skia stores premultiplied alpha, image wants it straight
    let pixels = pixmap
        .pixels()
        .iter()
        .flat_map(|pixel| {
            let color = pixel.demultiply();
            [color.red(), color.green(), color.blue(), color.alpha()]
        })
        .collect();
    RgbaImage::from_raw(size, size, pixels).ok_or_else(raster_error)
}

/// Icon cache for a single run. Each `(name, size)` pair is resolved at most
/// once: successes are shared via [Arc], failures are remembered so a dead
/// network doesn't cost a timeout per row. Bitmaps are also persisted to
/// `dir` as `{name}_{size}.png` and picked up from there on later runs.
pub struct IconCache<S> {
    source: S,
    dir: PathBuf,
    loaded: HashMap<(String, u32), Option<Arc<Icon>>>,
}

impl<S: IconSource> IconCache<S> {
    pub fn new(source: S, dir: impl Into<PathBuf>) -> Self {
        Self {
            source,
            dir: dir.into(),
            loaded: HashMap::new(),
        }
    }

    /// Path of the on-disk copy of an icon
    pub fn path(&self, name: &str, size: u32) -> PathBuf {
        self.dir.join(format!("{name}_{size}.png"))
    }

    fn load(&self, name: &str, size: u32) -> Result<Icon, IconError> {
        let path = self.path(name, size);
        let pixels = match self.load_cached(&path) {
            Some(pixels) => pixels,
            None => {
                let svg = self.source.fetch_svg(name)?;
                let pixels = rasterize(name, &svg, size)?;
                // A cache write failure only costs us a download next time
                if let Err(err) = self.store(&path, &pixels) {
                    warn!("Error caching icon: {err}");
                }
                pixels
            }
        };
        Ok(Icon {
            name: name.into(),
            size,
            pixels,
        })
    }

    /// Read a bitmap from the disk cache. A file that won't decode is
    /// deleted, so it gets downloaded again instead of failing every run.
    fn load_cached(&self, path: &Path) -> Option<RgbaImage> {
        if !path.exists() {
            return None;
        }
        debug!("Loading icon from {}", path.display());
        match image::open(path) {
            Ok(image) => Some(image.into_rgba8()),
            Err(err) => {
                warn!(
                    "Discarding unreadable cached icon {}: {err}",
                    path.display()
                );
                if let Err(err) = fs::remove_file(path) {
                    warn!("Error removing {}: {err}", path.display());
                }
                None
            }
        }
    }

    /// Write a bitmap to the disk cache. The file is written under a
    /// temporary name then renamed, so a concurrent reader never sees half
    /// a PNG.
    fn store(&self, path: &Path, pixels: &RgbaImage) -> Result<(), IconError> {
        let io_error = |path: &Path| {
            let path = path.to_owned();
            move |source| IconError::Io { path, source }
        };
        fs::create_dir_all(&self.dir).map_err(io_error(&self.dir))?;
        let mut file =
            NamedTempFile::new_in(&self.dir).map_err(io_error(&self.dir))?;
        pixels
            .write_to(&mut file, ImageFormat::Png)
            .map_err(|source| IconError::Image {
                path: file.path().to_owned(),
                source,
            })?;
        file.persist(path).map_err(|err| IconError::Io {
            path: path.to_owned(),
            source: err.error,
        })?;
        debug!("Cached icon at {}", path.display());
        Ok(())
    }
}

impl<S: IconSource> IconResolver for IconCache<S> {
    fn resolve(
        &mut self,
        name: &str,
        size: u32,
    ) -> Result<Arc<Icon>, IconError> {
        let key = (name.to_owned(), size);
        if let Some(cached) = self.loaded.get(&key) {
            return cached.clone().ok_or_else(|| IconError::Unavailable {
                name: name.into(),
                size,
            });
        }

        let result = self.load(name, size).map(Arc::new);
        if let Err(err) = &result {
            warn!("Icon `{name}` ({size}px) unavailable: {err}");
        }
        self.loaded.insert(key, result.as_ref().ok().cloned());
        result
    }
}
