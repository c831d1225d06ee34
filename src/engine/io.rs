// src/engine/io.rs
//
// I/O at the edge of the core: the Source enum, file mapping, and atomic writes.
// The scanner and pipeline never touch the filesystem; everything here runs
// before the first byte is corrupted or after the last one.

use crate::error::CrungeError;
use memmap2::Mmap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

type IoResult<T> = std::result::Result<T, CrungeError>;

/// Input bytes: in memory, memory-mapped, or a path read on demand.
#[derive(Clone, Debug)]
pub enum Source {
    Memory(Arc<Vec<u8>>),
    /// Memory-mapped file (zero-copy access)
    Mapped(Arc<Mmap>),
    /// Read only when needed
    Path(PathBuf),
}

impl Source {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Source::Memory(Arc::new(bytes.into()))
    }

    /// Map `path` read-only.
    ///
    /// The file must not be modified while the mapping is alive.
    pub fn open_mapped(path: impl AsRef<Path>) -> IoResult<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CrungeError::file_not_found(display.clone())
            } else {
                CrungeError::file_read_failed(display.clone(), e)
            }
        })?;
        // Safety: read-only mapping of a file we do not write; external
        // modification during a run is outside our control.
        let mmap = unsafe { Mmap::map(&file).map_err(|e| CrungeError::mmap_failed(display, e))? };
        Ok(Source::Mapped(Arc::new(mmap)))
    }

    /// Load the bytes. Mapped sources are copied.
    pub fn load(&self) -> IoResult<Arc<Vec<u8>>> {
        match self {
            Source::Memory(data) => Ok(data.clone()),
            Source::Mapped(mmap) => Ok(Arc::new(mmap.as_ref().to_vec())),
            Source::Path(path) => {
                let data = std::fs::read(path).map_err(|e| {
                    let display = path.display().to_string();
                    if e.kind() == std::io::ErrorKind::NotFound {
                        CrungeError::file_not_found(display)
                    } else {
                        CrungeError::file_read_failed(display, e)
                    }
                })?;
                Ok(Arc::new(data))
            }
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Source::Path(p) => Some(p),
            Source::Memory(_) | Source::Mapped(_) => None,
        }
    }

    /// Borrow the bytes without copying. `None` for unread paths.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Source::Memory(data) => Some(data.as_slice()),
            Source::Mapped(mmap) => Some(mmap.as_ref()),
            Source::Path(_) => None,
        }
    }

    /// Length in bytes; 0 for unread paths.
    pub fn len(&self) -> usize {
        match self {
            Source::Memory(data) => data.len(),
            Source::Mapped(mmap) => mmap.len(),
            Source::Path(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Write `bytes` to `path` through a temp file in the same directory, then
/// rename over the target. Readers never see a half-written file.
pub fn write_atomic(path: impl AsRef<Path>, bytes: &[u8]) -> IoResult<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut temp_file = NamedTempFile::new_in(dir)
        .map_err(|e| CrungeError::file_write_failed(dir.display().to_string(), e))?;
    let temp_path = temp_file.path().display().to_string();
    temp_file
        .write_all(bytes)
        .map_err(|e| CrungeError::file_write_failed(temp_path.clone(), e))?;
    temp_file
        .as_file_mut()
        .sync_all()
        .map_err(|e| CrungeError::file_write_failed(temp_path, e))?;

    temp_file
        .persist(path)
        .map_err(|e| CrungeError::file_write_failed(path.display().to_string(), e.error))?;
    Ok(())
}

/// Create `dir` (and parents) if it does not exist yet.
pub fn ensure_dir(dir: impl AsRef<Path>) -> IoResult<()> {
    let dir = dir.as_ref();
    if !dir.exists() {
        std::fs::create_dir_all(dir)
            .map_err(|e| CrungeError::file_write_failed(dir.display().to_string(), e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn memory_source_borrows() {
        let source = Source::from_bytes(vec![1, 2, 3]);
        assert_eq!(source.as_bytes(), Some(&[1u8, 2, 3][..]));
        assert_eq!(source.len(), 3);
        assert!(source.as_path().is_none());
    }

    #[test]
    fn path_source_loads_lazily() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("in.jpg");
        std::fs::write(&path, [0xFF, 0xD8]).unwrap();

        let source = Source::Path(path.clone());
        assert!(source.as_bytes().is_none());
        assert!(source.is_empty());
        assert_eq!(source.load().unwrap().as_slice(), &[0xFF, 0xD8]);
        assert_eq!(source.as_path(), Some(path.as_path()));
    }

    #[test]
    fn mapped_source_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("in.jpg");
        std::fs::write(&path, b"scan").unwrap();

        let source = Source::open_mapped(&path).unwrap();
        assert_eq!(source.as_bytes(), Some(&b"scan"[..]));
        assert_eq!(source.load().unwrap().as_slice(), b"scan");
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nope.jpg");
        assert!(matches!(
            Source::open_mapped(&path).unwrap_err(),
            CrungeError::FileNotFound { .. }
        ));
        assert!(matches!(
            Source::Path(path).load().unwrap_err(),
            CrungeError::FileNotFound { .. }
        ));
    }

    #[test]
    fn atomic_write_replaces_target() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.jpg");
        std::fs::write(&path, b"old").unwrap();

        write_atomic(&path, b"new contents").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"new contents");
        // only the target remains
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn ensure_dir_creates_nested() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
        ensure_dir(&nested).unwrap();
    }
}
