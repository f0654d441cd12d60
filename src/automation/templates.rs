use crate::error::TemplateError;
use image::GrayImage;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

const SUPPORTED_EXTENSIONS: [&str; 3] = ["png", "jpg", "bmp"];

/// A named, immutable grayscale template.
#[derive(Debug, Clone)]
pub struct Pattern {
    id: String,
    image: GrayImage,
}

impl Pattern {
    pub fn new(id: impl Into<String>, image: GrayImage) -> Self {
        Self {
            id: id.into(),
            image,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Identifier → pattern, iterated in identifier order.
pub type PatternSet = BTreeMap<String, Arc<Pattern>>;

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

fn decode_gray(path: &Path) -> Result<GrayImage, TemplateError> {
    image::open(path)
        .map(|img| img.to_luma8())
        .map_err(|source| TemplateError::Decode {
            path: path.to_path_buf(),
            source,
        })
}

/// Outcome of rescanning a template directory.
#[derive(Debug, Default)]
pub struct ReloadSummary {
    pub loaded: usize,
    pub skipped: Vec<(String, TemplateError)>,
}

/// Templates backed by one directory.
///
/// Readers get an `Arc` snapshot that a concurrent reload never mutates;
/// reload builds a new set and swaps it in.
#[derive(Debug)]
pub struct TemplateCollection {
    dir: PathBuf,
    patterns: RwLock<Arc<PatternSet>>,
}

impl TemplateCollection {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            patterns: RwLock::new(Arc::new(PatternSet::new())),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshot(&self) -> Arc<PatternSet> {
        Arc::clone(&self.patterns.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn ids(&self) -> Vec<String> {
        self.snapshot().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Rescan the directory, decoding every supported file.
    /// Files that fail to decode are skipped and reported.
    pub fn reload(&self) -> Result<ReloadSummary, TemplateError> {
        fs::create_dir_all(&self.dir).map_err(|e| TemplateError::io(&self.dir, e))?;
        let entries = fs::read_dir(&self.dir).map_err(|e| TemplateError::io(&self.dir, e))?;

        let mut set = PatternSet::new();
        let mut summary = ReloadSummary::default();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() || !is_supported_image(&path) {
                continue;
            }
            let id = entry.file_name().to_string_lossy().into_owned();
            match decode_gray(&path) {
                Ok(image) => {
                    set.insert(id.clone(), Arc::new(Pattern::new(id, image)));
                }
                Err(e) => {
                    tracing::warn!(template = %id, "skipping template: {}", e);
                    summary.skipped.push((id, e));
                }
            }
        }

        summary.loaded = set.len();
        *self.patterns.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(set);
        tracing::debug!(dir = %self.dir.display(), loaded = summary.loaded, "templates reloaded");
        Ok(summary)
    }

    /// Copy an image into the directory and reload. Returns its identifier.
    ///
    /// A file that already exists under the same name is kept as-is.
    pub fn add(&self, source: &Path) -> Result<String, TemplateError> {
        if !is_supported_image(source) {
            return Err(TemplateError::UnsupportedExtension(source.to_path_buf()));
        }
        let file_name = source
            .file_name()
            .ok_or_else(|| TemplateError::InvalidIdentifier(source.display().to_string()))?;

        // Refuse files we could not load back later.
        decode_gray(source)?;

        fs::create_dir_all(&self.dir).map_err(|e| TemplateError::io(&self.dir, e))?;
        let destination = self.dir.join(file_name);
        if destination.exists() {
            tracing::info!(template = %destination.display(), "template already present, keeping existing file");
        } else {
            fs::copy(source, &destination).map_err(|e| TemplateError::io(&destination, e))?;
        }

        self.reload()?;
        Ok(file_name.to_string_lossy().into_owned())
    }

    /// Delete a template file and reload. Returns whether a file was deleted.
    pub fn remove(&self, id: &str) -> Result<bool, TemplateError> {
        let is_plain_name = !id.is_empty()
            && id != "."
            && id != ".."
            && !id.contains(['/', '\\']);
        if !is_plain_name {
            return Err(TemplateError::InvalidIdentifier(id.to_string()));
        }

        let path = self.dir.join(id);
        let removed = if path.is_file() {
            fs::remove_file(&path).map_err(|e| TemplateError::io(&path, e))?;
            true
        } else {
            false
        };

        self.reload()?;
        Ok(removed)
    }
}

/// The two template collections the loop reads from.
#[derive(Debug)]
pub struct TemplateStore {
    pub primary: TemplateCollection,
    pub secondary: TemplateCollection,
}

impl TemplateStore {
    pub fn new(primary_dir: impl Into<PathBuf>, secondary_dir: impl Into<PathBuf>) -> Self {
        Self {
            primary: TemplateCollection::new(primary_dir),
            secondary: TemplateCollection::new(secondary_dir),
        }
    }
}
