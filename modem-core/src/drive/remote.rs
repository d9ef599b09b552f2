//! Read-only remote file access for virtual drives.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// An open, read-only remote file.
pub trait RemoteFile: Send {
    /// Read into `buf` starting at byte `offset`. `Ok(0)` means end of file.
    /// `WouldBlock` is transient and the caller may retry.
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// File size in bytes.
    fn size(&self) -> u64;
}

/// Opens remote files by URL.
pub trait RemoteFs: Send {
    fn open(&mut self, url: &str) -> io::Result<Box<dyn RemoteFile>>;
}

/// Files served from a local directory.
///
/// Accepts `file://relative/path` or a bare relative path. Absolute paths
/// and `..` components are rejected.
pub struct LocalFs {
    root: PathBuf,
}

impl LocalFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, url: &str) -> io::Result<PathBuf> {
        let rel = url.strip_prefix("file://").unwrap_or(url);
        let rel = Path::new(rel);
        let clean = !rel.as_os_str().is_empty()
            && rel.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !clean {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("path outside drive root: {}", url),
            ));
        }
        Ok(self.root.join(rel))
    }
}

impl RemoteFs for LocalFs {
    fn open(&mut self, url: &str) -> io::Result<Box<dyn RemoteFile>> {
        let path = self.resolve(url)?;
        let file = File::open(&path)?;
        let size = file.metadata()?.len();
        Ok(Box::new(LocalFile { file, size }))
    }
}

struct LocalFile {
    file: File,
    size: u64,
}

impl RemoteFile for LocalFile {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read(buf)
    }

    fn size(&self) -> u64 {
        self.size
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
struct MemoryFsState {
    files: HashMap<String, Arc<Vec<u8>>>,
    /// Reads that fail with `WouldBlock` before data flows.
    stalls: usize,
    /// Largest chunk returned by one read.
    chunk: Option<usize>,
    opens: usize,
    open_handles: usize,
}

/// In-memory `RemoteFs`. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryRemoteFs {
    state: Arc<Mutex<MemoryFsState>>,
}

impl MemoryRemoteFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, url: &str, contents: Vec<u8>) {
        lock(&self.state)
            .files
            .insert(url.to_string(), Arc::new(contents));
    }

    /// Make the next `count` reads fail with `WouldBlock`.
    pub fn stall(&self, count: usize) {
        lock(&self.state).stalls = count;
    }

    /// Return at most `chunk` bytes per read.
    pub fn set_chunk(&self, chunk: usize) {
        lock(&self.state).chunk = Some(chunk);
    }

    /// Number of successful opens so far.
    pub fn opens(&self) -> usize {
        lock(&self.state).opens
    }

    /// Files currently open.
    pub fn open_handles(&self) -> usize {
        lock(&self.state).open_handles
    }
}

impl RemoteFs for MemoryRemoteFs {
    fn open(&mut self, url: &str) -> io::Result<Box<dyn RemoteFile>> {
        let mut state = lock(&self.state);
        let data = state
            .files
            .get(url)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, url.to_string()))?;
        state.opens += 1;
        state.open_handles += 1;
        Ok(Box::new(MemoryFile {
            data,
            fs: self.state.clone(),
        }))
    }
}

struct MemoryFile {
    data: Arc<Vec<u8>>,
    fs: Arc<Mutex<MemoryFsState>>,
}

impl RemoteFile for MemoryFile {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let mut fs = lock(&self.fs);
        if fs.stalls > 0 {
            fs.stalls -= 1;
            return Err(io::ErrorKind::WouldBlock.into());
        }
        let start = (offset as usize).min(self.data.len());
        let mut n = buf.len().min(self.data.len() - start);
        if let Some(chunk) = fs.chunk {
            n = n.min(chunk);
        }
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

impl Drop for MemoryFile {
    fn drop(&mut self) {
        let mut fs = lock(&self.fs);
        fs.open_handles = fs.open_handles.saturating_sub(1);
    }
}
