//! Reference in-memory file service.
//!
//! [`MemoryFiles`] owns the three namespaces the protocol layer only carries
//! identifiers for: file contents keyed by path, open handles, and
//! asynchronous read operations. All three are guarded independently so the
//! dispatcher can be invoked from several connections at once.
//!
//! # Asynchronous Reads
//!
//! `read_async` registers a `Pending` record and returns immediately;
//! [`MemoryFiles::drive`] performs the read and flips the record to
//! `Complete`. Polling a pending record has no side effects. A completed
//! record is retired the first time a poll observes it — later polls are
//! answered with an empty, completed result carrying `NOT_FOUND`, so a
//! polling loop terminates rather than spinning on a reclaimed identifier.
//!
//! In production [`MemoryFiles::spawn_completer`] wires a background thread
//! that drives operations as they arrive; tests drive them explicitly to
//! exercise the pending window.
use std::{
    collections::BTreeMap,
    fs, io,
    path::Path,
    str,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
        mpsc,
    },
    thread,
};

use log::{debug, info};

use crate::protocol::{AsyncPoll, ErrorCode, FileHandle, FileService, OperationId};

/// Low two bits of the open flags select the access mode.
pub const MODE_MASK: u32 = 0o3;
pub const OPEN_READ: u32 = 0;
pub const OPEN_WRITE: u32 = 1;
pub const OPEN_READ_WRITE: u32 = 2;
/// Create the file if it does not exist.
pub const OPEN_CREATE: u32 = 0o100;

#[derive(Debug)]
struct OpenFile {
    path: String,
    flags: u32,
}

#[derive(Debug)]
enum AsyncRead {
    Pending {
        handle: u64,
        offset: u64,
        max_bytes: u32,
    },
    Complete {
        data: Vec<u8>,
        error: ErrorCode,
    },
}

pub struct MemoryFiles {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    handles: Mutex<BTreeMap<u64, OpenFile>>,
    operations: Mutex<BTreeMap<u64, AsyncRead>>,
    completions: Mutex<Option<mpsc::Sender<u64>>>,
    next_handle: AtomicU64,
    next_operation: AtomicU64,
}

impl Default for MemoryFiles {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFiles {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(BTreeMap::new()),
            handles: Mutex::new(BTreeMap::new()),
            operations: Mutex::new(BTreeMap::new()),
            completions: Mutex::new(None),
            next_handle: AtomicU64::new(1),
            next_operation: AtomicU64::new(1),
        }
    }

    /// Insert or replace a file's contents directly.
    pub fn put(&self, path: impl Into<String>, contents: Vec<u8>) {
        self.files.lock().unwrap().insert(path.into(), contents);
    }

    /// Preload the store from the regular files of a directory. Each file
    /// lands under `/<file name>`. Returns how many were loaded.
    pub fn seed_dir(&self, dir: &Path) -> io::Result<usize> {
        let mut loaded = 0;
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = format!("/{}", entry.file_name().to_string_lossy());
            let contents = fs::read(entry.path())?;
            self.put(name, contents);
            loaded += 1;
        }
        info!("seeded {loaded} files from {}", dir.display());
        Ok(loaded)
    }

    /// Start a background thread that drives async reads as they are
    /// registered.
    pub fn spawn_completer(store: &Arc<MemoryFiles>) {
        let (sender, receiver) = mpsc::channel();
        *store.completions.lock().unwrap() = Some(sender);

        let worker = Arc::clone(store);
        thread::spawn(move || {
            for id in receiver {
                worker.drive(OperationId(id));
            }
            debug!("completer shutting down");
        });
    }

    /// Perform a registered asynchronous read and mark it complete. Returns
    /// false if the operation is unknown or already complete.
    ///
    /// A read whose handle has been closed in the meantime still resolves:
    /// it completes with empty data and `BAD_HANDLE`.
    pub fn drive(&self, operation: OperationId) -> bool {
        let params = {
            let operations = self.operations.lock().unwrap();
            match operations.get(&operation.0) {
                Some(AsyncRead::Pending {
                    handle,
                    offset,
                    max_bytes,
                }) => Some((*handle, *offset, *max_bytes)),
                _ => None,
            }
        };
        let Some((handle, offset, max_bytes)) = params else {
            return false;
        };

        let state = match self.read(FileHandle(handle), offset, max_bytes) {
            Ok(data) => AsyncRead::Complete {
                data,
                error: ErrorCode::OK,
            },
            Err(error) => AsyncRead::Complete {
                data: Vec::new(),
                error,
            },
        };
        self.operations.lock().unwrap().insert(operation.0, state);
        debug!("operation {operation} complete");
        true
    }

    fn mode(flags: u32) -> u32 {
        flags & MODE_MASK
    }
}

impl FileService for MemoryFiles {
    fn open(&self, path: &[u8], flags: u32) -> Result<FileHandle, ErrorCode> {
        let path = str::from_utf8(path).map_err(|_| ErrorCode::INVALID)?;

        {
            let mut files = self.files.lock().unwrap();
            if !files.contains_key(path) {
                if flags & OPEN_CREATE == 0 {
                    return Err(ErrorCode::NOT_FOUND);
                }
                files.insert(path.to_string(), Vec::new());
            }
        }

        let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.handles.lock().unwrap().insert(
            id,
            OpenFile {
                path: path.to_string(),
                flags,
            },
        );
        debug!("opened '{path}' as handle {id}");
        Ok(FileHandle(id))
    }

    fn read(&self, handle: FileHandle, offset: u64, max_bytes: u32) -> Result<Vec<u8>, ErrorCode> {
        let handles = self.handles.lock().unwrap();
        let open = handles.get(&handle.0).ok_or(ErrorCode::BAD_HANDLE)?;
        if Self::mode(open.flags) == OPEN_WRITE {
            return Err(ErrorCode::BAD_HANDLE);
        }

        let files = self.files.lock().unwrap();
        let contents = files.get(&open.path).ok_or(ErrorCode::NOT_FOUND)?;

        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        if start >= contents.len() {
            return Ok(Vec::new());
        }
        let end = start.saturating_add(max_bytes as usize).min(contents.len());
        Ok(contents[start..end].to_vec())
    }

    fn write(&self, handle: FileHandle, offset: u64, data: &[u8]) -> Result<u32, ErrorCode> {
        let handles = self.handles.lock().unwrap();
        let open = handles.get(&handle.0).ok_or(ErrorCode::BAD_HANDLE)?;
        if Self::mode(open.flags) == OPEN_READ {
            return Err(ErrorCode::BAD_HANDLE);
        }

        let mut files = self.files.lock().unwrap();
        let contents = files.get_mut(&open.path).ok_or(ErrorCode::NOT_FOUND)?;

        let start = usize::try_from(offset).map_err(|_| ErrorCode::INVALID)?;
        let end = start.checked_add(data.len()).ok_or(ErrorCode::INVALID)?;
        if end > contents.len() {
            contents.resize(end, 0);
        }
        contents[start..end].copy_from_slice(data);
        Ok(data.len() as u32)
    }

    fn size(&self, handle: FileHandle) -> Result<u64, ErrorCode> {
        let handles = self.handles.lock().unwrap();
        let open = handles.get(&handle.0).ok_or(ErrorCode::BAD_HANDLE)?;

        let files = self.files.lock().unwrap();
        let contents = files.get(&open.path).ok_or(ErrorCode::NOT_FOUND)?;
        Ok(contents.len() as u64)
    }

    fn close(&self, handle: FileHandle) {
        if self.handles.lock().unwrap().remove(&handle.0).is_some() {
            debug!("closed handle {handle}");
        } else {
            debug!("close on unknown handle {handle}");
        }
    }

    fn read_async(
        &self,
        handle: FileHandle,
        offset: u64,
        max_bytes: u32,
    ) -> Result<OperationId, ErrorCode> {
        if !self.handles.lock().unwrap().contains_key(&handle.0) {
            return Err(ErrorCode::BAD_HANDLE);
        }

        let id = self.next_operation.fetch_add(1, Ordering::Relaxed);
        self.operations.lock().unwrap().insert(
            id,
            AsyncRead::Pending {
                handle: handle.0,
                offset,
                max_bytes,
            },
        );
        debug!("registered operation {id} on handle {handle}");

        if let Some(sender) = self.completions.lock().unwrap().as_ref() {
            let _ = sender.send(id);
        }
        Ok(OperationId(id))
    }

    fn poll_async(&self, operation: OperationId) -> AsyncPoll {
        let mut operations = self.operations.lock().unwrap();
        match operations.remove(&operation.0) {
            Some(pending @ AsyncRead::Pending { .. }) => {
                // Still in flight; observing it must not disturb it.
                operations.insert(operation.0, pending);
                AsyncPoll::Pending
            }
            Some(AsyncRead::Complete { data, error }) => AsyncPoll::Complete { data, error },
            None => AsyncPoll::Complete {
                data: Vec::new(),
                error: ErrorCode::NOT_FOUND,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempdir::TempDir;

    use super::*;

    fn opened(store: &MemoryFiles, path: &str, flags: u32) -> FileHandle {
        store.open(path.as_bytes(), flags).unwrap()
    }

    #[test]
    fn open_requires_the_create_flag_for_new_files() {
        let store = MemoryFiles::new();

        assert_eq!(store.open(b"/new", 0), Err(ErrorCode::NOT_FOUND));
        assert!(store.open(b"/new", OPEN_CREATE).is_ok());
        // Now it exists; plain opens succeed.
        assert!(store.open(b"/new", 0).is_ok());
    }

    #[test]
    fn open_rejects_non_utf8_paths() {
        let store = MemoryFiles::new();
        assert_eq!(
            store.open(&[0x2F, 0xFF, 0xFE], OPEN_CREATE),
            Err(ErrorCode::INVALID)
        );
    }

    #[test]
    fn access_mode_is_enforced() {
        let store = MemoryFiles::new();
        store.put("/readme", b"text".to_vec());

        let read_only = opened(&store, "/readme", OPEN_READ);
        assert_eq!(
            store.write(read_only, 0, b"x"),
            Err(ErrorCode::BAD_HANDLE)
        );

        let write_only = opened(&store, "/readme", OPEN_WRITE);
        assert_eq!(
            store.read(write_only, 0, 4),
            Err(ErrorCode::BAD_HANDLE)
        );
        assert_eq!(store.write(write_only, 0, b"next").unwrap(), 4);
    }

    #[test]
    fn reads_are_positional_and_clamped() {
        let store = MemoryFiles::new();
        store.put("/data", b"0123456789".to_vec());
        let handle = opened(&store, "/data", OPEN_READ);

        assert_eq!(store.read(handle, 0, 4).unwrap(), b"0123");
        assert_eq!(store.read(handle, 8, 64).unwrap(), b"89");
        assert_eq!(store.read(handle, 10, 4).unwrap(), b"");
        assert_eq!(store.read(handle, u64::MAX, 4).unwrap(), b"");
    }

    #[test]
    fn writes_extend_and_zero_fill() {
        let store = MemoryFiles::new();
        let handle = opened(&store, "/sparse", OPEN_CREATE | OPEN_READ_WRITE);

        assert_eq!(store.write(handle, 4, b"data").unwrap(), 4);
        assert_eq!(store.size(handle).unwrap(), 8);
        assert_eq!(store.read(handle, 0, 8).unwrap(), b"\0\0\0\0data");
    }

    #[test]
    fn close_is_idempotent_and_invalidates() {
        let store = MemoryFiles::new();
        let handle = opened(&store, "/f", OPEN_CREATE);

        store.close(handle);
        store.close(handle);
        assert_eq!(store.read(handle, 0, 1), Err(ErrorCode::BAD_HANDLE));
    }

    #[test]
    fn async_read_lifecycle() {
        let store = MemoryFiles::new();
        store.put("/async", b"payload".to_vec());
        let handle = opened(&store, "/async", OPEN_READ);

        let operation = store.read_async(handle, 0, 64).unwrap();
        assert_eq!(store.poll_async(operation), AsyncPoll::Pending);
        // Polling while pending is observation only.
        assert_eq!(store.poll_async(operation), AsyncPoll::Pending);

        assert!(store.drive(operation));
        assert!(!store.drive(operation));

        assert_eq!(
            store.poll_async(operation),
            AsyncPoll::Complete {
                data: b"payload".to_vec(),
                error: ErrorCode::OK,
            }
        );
        assert_eq!(
            store.poll_async(operation),
            AsyncPoll::Complete {
                data: Vec::new(),
                error: ErrorCode::NOT_FOUND,
            }
        );
    }

    #[test]
    fn async_read_needs_a_live_handle_to_start() {
        let store = MemoryFiles::new();
        assert_eq!(
            store.read_async(FileHandle(99), 0, 16),
            Err(ErrorCode::BAD_HANDLE)
        );
    }

    #[test]
    fn polling_an_unknown_operation_terminates() {
        let store = MemoryFiles::new();
        assert_eq!(
            store.poll_async(OperationId(12345)),
            AsyncPoll::Complete {
                data: Vec::new(),
                error: ErrorCode::NOT_FOUND,
            }
        );
    }

    #[test]
    fn completer_drives_operations_in_the_background() {
        let store = Arc::new(MemoryFiles::new());
        MemoryFiles::spawn_completer(&store);
        store.put("/bg", b"driven".to_vec());
        let handle = opened(&store, "/bg", OPEN_READ);

        let operation = store.read_async(handle, 0, 64).unwrap();
        let mut state = store.poll_async(operation);
        for _ in 0..100 {
            if state != AsyncPoll::Pending {
                break;
            }
            thread::sleep(Duration::from_millis(10));
            state = store.poll_async(operation);
        }

        assert_eq!(
            state,
            AsyncPoll::Complete {
                data: b"driven".to_vec(),
                error: ErrorCode::OK,
            }
        );
    }

    #[test]
    fn seed_dir_loads_regular_files() {
        let temp = TempDir::new("seed").unwrap();
        fs::write(temp.path().join("a.txt"), b"alpha").unwrap();
        fs::write(temp.path().join("b.txt"), b"beta").unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();

        let store = MemoryFiles::new();
        assert_eq!(store.seed_dir(temp.path()).unwrap(), 2);

        let handle = opened(&store, "/a.txt", OPEN_READ);
        assert_eq!(store.read(handle, 0, 64).unwrap(), b"alpha");
    }
}
