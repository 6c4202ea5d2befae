use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use log::{debug, info};
use typst::diag::{FileError, FileResult};
use typst::foundations::{Bytes, Datetime};
use typst::syntax::{FileId, Source, VirtualPath};
use typst::text::{Font, FontBook};
use typst::utils::LazyHash;
use typst::{Library, LibraryExt, World};
use typst_kit::fonts::{FontSearcher, FontSlot, Fonts};

/// Fonts found by a single filesystem scan, shared by every document opened
/// during a session.
pub struct FontCache {
    book: LazyHash<FontBook>,
    fonts: Vec<FontSlot>,
}

impl FontCache {
    pub fn new() -> Self {
        let start = Instant::now();
        let Fonts { book, fonts } = FontSearcher::new().include_system_fonts(true).search();
        info!(
            "fonts: {} font(s) found in {:.1}ms",
            fonts.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Self {
            book: LazyHash::new(book),
            fonts,
        }
    }
}

impl Default for FontCache {
    fn default() -> Self {
        Self::new()
    }
}

/// The Typst world for one `.typ` file on disk.
///
/// Relative imports and images resolve against the file's directory.
/// Packages are not available.
pub struct DocumentWorld {
    library: LazyHash<Library>,
    fonts: Arc<FontCache>,
    root: PathBuf,
    main_id: FileId,
    main_source: Source,
}

impl DocumentWorld {
    pub fn open(path: &Path, fonts: Arc<FontCache>) -> Result<Self> {
        let canonical = path
            .canonicalize()
            .with_context(|| format!("failed to resolve {}", path.display()))?;
        let root = canonical
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| anyhow::anyhow!("{} has no parent directory", path.display()))?;
        let text = std::fs::read_to_string(&canonical)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let name = canonical
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("{} is not a file", path.display()))?;

        let main_id = FileId::new(None, VirtualPath::new(name));
        debug!("world: root {} main {:?}", root.display(), name);
        Ok(Self {
            library: LazyHash::new(Library::default()),
            fonts,
            root,
            main_id,
            main_source: Source::new(main_id, text),
        })
    }

    /// Create a world from in-memory Typst source.
    pub fn from_source(source: &str, fonts: Arc<FontCache>) -> Self {
        let main_id = FileId::new(None, VirtualPath::new("main.typ"));
        Self {
            library: LazyHash::new(Library::default()),
            fonts,
            root: PathBuf::from("."),
            main_id,
            main_source: Source::new(main_id, source.to_string()),
        }
    }

    pub fn main_source(&self) -> &Source {
        &self.main_source
    }

    fn resolve(&self, id: FileId) -> FileResult<PathBuf> {
        if id.package().is_some() {
            return Err(FileError::NotFound(id.vpath().as_rootless_path().into()));
        }
        id.vpath()
            .resolve(&self.root)
            .ok_or(FileError::AccessDenied)
    }
}

impl World for DocumentWorld {
    fn library(&self) -> &LazyHash<Library> {
        &self.library
    }

    fn book(&self) -> &LazyHash<FontBook> {
        &self.fonts.book
    }

    fn main(&self) -> FileId {
        self.main_id
    }

    fn source(&self, id: FileId) -> FileResult<Source> {
        if id == self.main_id {
            return Ok(self.main_source.clone());
        }
        let path = self.resolve(id)?;
        let text = std::fs::read_to_string(&path).map_err(|e| FileError::from_io(e, &path))?;
        Ok(Source::new(id, text))
    }

    fn file(&self, id: FileId) -> FileResult<Bytes> {
        if id == self.main_id {
            return Ok(Bytes::from_string(self.main_source.clone()));
        }
        let path = self.resolve(id)?;
        let data = std::fs::read(&path).map_err(|e| FileError::from_io(e, &path))?;
        Ok(Bytes::new(data))
    }

    fn font(&self, index: usize) -> Option<Font> {
        self.fonts.fonts.get(index)?.get()
    }

    fn today(&self, _offset: Option<i64>) -> Option<Datetime> {
        None
    }
}
