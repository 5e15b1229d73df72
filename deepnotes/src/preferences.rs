use std::{
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use deepnotes_core::{stroke::Pen, Color, PageSet};

use crate::{export::Exporter, store::NoteStore};

const DOCUMENTATION: &str = r#"# Deepnotes preferences. You may edit this file, but be aware that formatting and comments will not
# be preserved. Missing keys take their default values.

# storage_root = "/path/to/notes"        Where notes are kept. Defaults to the user data directory.
# export_dir = "/path/to/share/cache"    Where flattened pages are written for sharing. Defaults to the user cache directory.
# pen_color is 0xAARRGGBB, written in decimal. 4278190080 is opaque black.

"#;

/// `deepnotes` inside the platform's preference directory, if the platform has one.
#[must_use]
pub fn preferences_dir() -> Option<PathBuf> {
    dirs::preference_dir().map(|dir| dir.join(env!("CARGO_PKG_NAME")))
}

#[derive(serde::Serialize, serde::Deserialize, Clone, PartialEq, Debug)]
#[serde(default)]
pub struct Preferences {
    #[serde(skip)]
    failed_to_load: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_root: Option<PathBuf>,
    pub pages_per_note: NonZeroUsize,
    pub jpeg_quality: u8,
    pub thumbnail_scale: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_dir: Option<PathBuf>,
    /// Bytes.
    pub export_cache_limit: u64,
    pub pen_color: u32,
    pub pen_width: f32,
}
impl Default for Preferences {
    fn default() -> Self {
        Self {
            failed_to_load: false,
            storage_root: None,
            pages_per_note: PageSet::DEFAULT_CAPACITY,
            jpeg_quality: NoteStore::DEFAULT_JPEG_QUALITY,
            thumbnail_scale: NoteStore::DEFAULT_THUMBNAIL_SCALE,
            export_dir: None,
            export_cache_limit: Exporter::DEFAULT_CACHE_LIMIT,
            pen_color: Color::BLACK.as_argb(),
            pen_width: Pen::DEFAULT_WIDTH,
        }
    }
}
impl Preferences {
    const FILENAME: &'static str = "preferences.toml";
    /// The user's preferences, or defaults if unavailable for some reason.
    #[must_use]
    pub fn load() -> Self {
        match preferences_dir() {
            Some(mut path) => {
                path.push(Self::FILENAME);
                Self::load_or_default(&path)
            }
            None => Self::no_path(),
        }
    }
    #[must_use]
    fn no_path() -> Self {
        log::warn!("Preferences weren't available, defaulting.");
        Self {
            failed_to_load: true,
            ..Self::default()
        }
    }
    #[must_use]
    pub fn load_or_default(path: &Path) -> Self {
        let preferences: anyhow::Result<Self> = try_block::try_block! {
            let string = std::fs::read_to_string(path)?;
            let preferences: Self = toml::from_str(&string)?;
            Ok(preferences)
        };

        match preferences {
            Ok(preferences) => preferences,
            Err(e) => {
                log::debug!("reading {}: {e}", path.display());
                Self::no_path()
            }
        }
    }
    /// Return true if loading user's settings failed. This can be useful for
    /// displaying a warning.
    #[must_use]
    pub fn did_fail_to_load(&self) -> bool {
        self.failed_to_load
    }
    /// Write to `preferences.toml` in [`preferences_dir`].
    pub fn save(&self) -> anyhow::Result<()> {
        let dir = preferences_dir().ok_or_else(|| anyhow::anyhow!("No preferences dir found"))?;
        // Only our own directory is created. A missing platform preference directory means the
        // environment is unusual, and we don't build one behind the user's back.
        match std::fs::create_dir(&dir) {
            Err(e) if e.kind() != std::io::ErrorKind::AlreadyExists => {
                log::debug!("creating {}: {e}", dir.display());
            }
            _ => (),
        }
        self.save_to(&dir.join(Self::FILENAME))
    }
    /// Write as commented TOML to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        let body = toml::ser::to_string_pretty(self)?;
        std::fs::write(path, format!("{DOCUMENTATION}{body}"))?;
        Ok(())
    }
    /// Where notes live.
    #[must_use]
    pub fn storage_root(&self) -> Option<PathBuf> {
        self.storage_root.clone().or_else(|| {
            let mut dir = dirs::data_dir()?;
            dir.push(env!("CARGO_PKG_NAME"));
            Some(dir)
        })
    }
    /// Where exports for sharing go.
    #[must_use]
    pub fn export_dir(&self) -> Option<PathBuf> {
        self.export_dir.clone().or_else(|| {
            let mut dir = dirs::cache_dir()?;
            dir.push(env!("CARGO_PKG_NAME"));
            dir.push("share");
            Some(dir)
        })
    }
    #[must_use]
    pub fn pen(&self) -> Pen {
        let mut pen = Pen {
            color: Color::from_argb(self.pen_color),
            ..Pen::default()
        };
        pen.set_width(self.pen_width);
        pen
    }
    /// A store configured by these preferences.
    pub fn note_store(&self) -> anyhow::Result<NoteStore> {
        let root = self
            .storage_root()
            .ok_or_else(|| anyhow::anyhow!("No storage dir found"))?;
        Ok(NoteStore::new(root, self.pages_per_note)
            .with_jpeg_quality(self.jpeg_quality)
            .with_thumbnail_scale(self.thumbnail_scale))
    }
    pub fn exporter(&self) -> anyhow::Result<Exporter> {
        let dir = self
            .export_dir()
            .ok_or_else(|| anyhow::anyhow!("No export dir found"))?;
        Ok(Exporter::new(dir)
            .with_cache_limit(self.export_cache_limit)
            .with_jpeg_quality(self.jpeg_quality))
    }
}
