use std::{
    fmt,
    fs::{self, File, OpenOptions},
    io,
    path::{Component, Path, PathBuf},
    thread,
    time::Duration,
};

use fd_lock::RwLock;
use serde_json::Value;

use crate::commons::{
    error::PreflightIoError,
    storage::{Key, KeyValueError, KeyValueStoreDispatcher, Scope, SegmentBuf, StorageResult},
};

pub const LOCK_FILE_NAME: &str = "lockfile.lock";
pub const LOCK_FILE_DIR: &str = ".locks";

fn io_error(context: String, cause: io::Error) -> KeyValueError {
    KeyValueError::IoError(PreflightIoError::new(context, cause))
}

//------------ Disk ----------------------------------------------------------

/// Keeps one JSON file per key under `<path>/<namespace>`, with a directory
/// per scope segment.
///
/// Values are written to `<path>/tmp` first and then renamed into place, so
/// a reader sees either the old or the new value. Scopes are locked with
/// advisory file locks in `<path>/<namespace>/.locks`. The operating system
/// drops these when the holding process exits, so a crashed process never
/// leaves a scope locked.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Disk {
    root: PathBuf,
    tmp: PathBuf,
    lock_tries: usize,
}

impl Disk {
    const POLL_LOCK_INTERVAL: Duration = Duration::from_millis(10);
    const POLL_LOCK_TRIES: usize = 1000;

    pub fn new(path: &str, namespace: &str) -> StorageResult<Self> {
        let root = PathBuf::from(path).join(namespace);
        let tmp = PathBuf::from(path).join("tmp");

        fs::create_dir_all(&tmp)
            .map_err(|e| io_error(format!("Cannot create directory for tmp files: {}", tmp.display()), e))?;

        Ok(Disk {
            root,
            tmp,
            lock_tries: Self::POLL_LOCK_TRIES,
        })
    }

    #[cfg(test)]
    fn with_lock_tries(mut self, lock_tries: usize) -> Self {
        self.lock_tries = lock_tries;
        self
    }

    /// Values must stay out of the lock directory.
    fn check_not_reserved(&self, top: &SegmentBuf, what: impl fmt::Display) -> StorageResult<()> {
        if top.as_str() == LOCK_FILE_DIR {
            Err(KeyValueError::Other(format!("{} is reserved for locks in {}", what, self)))
        } else {
            Ok(())
        }
    }
}

impl fmt::Display for Disk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "local://{}", self.root.display())
    }
}

impl Disk {
    pub fn has(&self, key: &Key) -> StorageResult<bool> {
        let path = key.as_path(&self.root);
        path.try_exists()
            .map_err(|e| io_error(format!("cannot check file: {}", path.display()), e))
    }

    pub fn get(&self, key: &Key) -> StorageResult<Option<Value>> {
        let path = key.as_path(&self.root);
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(serde_json::from_str(&value)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(format!("cannot read file: {}", path.display()), e)),
        }
    }

    /// Lists every scope that holds at least one value, sub-scopes included.
    pub fn list_scopes(&self) -> StorageResult<Vec<Scope>> {
        if !self.root.exists() {
            return Ok(vec![]);
        }

        scope_dirs(&self.root)?
            .iter()
            .map(|dir| scope_for_dir(dir, &self.root))
            .collect()
    }
}

impl Disk {
    pub fn store(&self, key: &Key, value: Value) -> StorageResult<()> {
        let top = key.scope().segments().first().unwrap_or(key.name());
        if top.as_str() == LOCK_FILE_DIR {
            return Err(KeyValueError::InvalidKey(key.clone()));
        }

        let path = key.as_path(&self.root);
        let dir = key.scope().as_path(&self.root);
        fs::create_dir_all(&dir).map_err(|e| io_error(format!("cannot create dir for path: {}", dir.display()), e))?;

        // dropped, and so removed, on any error below
        let tmp_file = tempfile::NamedTempFile::new_in(&self.tmp).map_err(|e| {
            io_error(
                format!("Cannot create tmp file for key: {}. Check permissions and space on disk.", key),
                e,
            )
        })?;

        fs::write(&tmp_file, format!("{:#}", value)).map_err(|e| {
            io_error(
                format!(
                    "Cannot write tmp file {} for key: {}. Check permissions and space on disk.",
                    tmp_file.path().display(),
                    key
                ),
                e,
            )
        })?;

        tmp_file.persist(&path).map_err(|e| {
            io_error(
                format!("Cannot rename tmp file {} to {}", e.file.path().display(), path.display()),
                e.error,
            )
        })?;

        Ok(())
    }

    pub fn delete(&self, key: &Key) -> StorageResult<()> {
        let path = key.as_path(&self.root);

        fs::remove_file(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => KeyValueError::UnknownKey(key.clone()),
            _ => io_error(format!("cannot remove file: {}", path.display()), e),
        })?;
        if let Some(parent) = path.parent() {
            remove_empty_parent_dirs(parent, &self.root);
        }

        Ok(())
    }

    /// Removes the scope with everything in it. A missing scope is fine.
    pub fn delete_scope(&self, scope: &Scope) -> StorageResult<()> {
        match scope.segments().first() {
            Some(top) => self.check_not_reserved(top, format_args!("Scope '{}'", scope))?,
            None => return self.clear(),
        }

        let path = scope.as_path(&self.root);
        remove_if_exists(&path)?;
        if let Some(parent) = path.parent() {
            remove_empty_parent_dirs(parent, &self.root);
        }

        Ok(())
    }

    /// Removes every value in the namespace.
    ///
    /// The lock directory is kept: other threads or processes may hold
    /// locks in it.
    pub fn clear(&self) -> StorageResult<()> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(io_error(format!("cannot read dir {}", self.root.display()), e)),
        };

        for entry in entries {
            let path = entry
                .map_err(|e| io_error(format!("cannot read entry in dir {}", self.root.display()), e))?
                .path();
            if !path.ends_with(LOCK_FILE_DIR) {
                remove_if_exists(&path)?;
            }
        }

        Ok(())
    }
}

impl Disk {
    /// Runs `op` while holding the file lock for the scope.
    ///
    /// Fails if the lock cannot be had within the configured number of
    /// attempts.
    pub fn execute<F, T>(&self, scope: &Scope, op: F) -> StorageResult<T>
    where
        F: FnOnce(&KeyValueStoreDispatcher) -> StorageResult<T>,
    {
        let mut lock = FileLock::open(&scope.as_path(self.root.join(LOCK_FILE_DIR)))?;
        lock.hold(self.lock_tries, || op(&KeyValueStoreDispatcher::Disk(self)))?
    }
}

//------------ Paths ---------------------------------------------------------

trait AsPath {
    fn as_path(&self, root: impl AsRef<Path>) -> PathBuf;
}

impl AsPath for Key {
    fn as_path(&self, root: impl AsRef<Path>) -> PathBuf {
        let mut path = self.scope().as_path(root);
        path.push(self.name().as_str());
        path
    }
}

impl AsPath for Scope {
    fn as_path(&self, root: impl AsRef<Path>) -> PathBuf {
        let mut path = root.as_ref().to_path_buf();
        for segment in self {
            path.push(segment.as_str());
        }
        path
    }
}

fn scope_for_dir(dir: &Path, root: &Path) -> StorageResult<Scope> {
    let relative = dir
        .strip_prefix(root)
        .map_err(|e| KeyValueError::Other(format!("cannot strip prefix: {}", e)))?;

    let segments = relative
        .components()
        .map(|component| match component {
            Component::Normal(name) => SegmentBuf::parse(&name.to_string_lossy()).map_err(|e| {
                KeyValueError::Other(format!(
                    "cannot use directory '{}' as scope: {}",
                    name.to_string_lossy(),
                    e
                ))
            }),
            other => Err(KeyValueError::Other(format!(
                "unexpected path component: {}",
                other.as_os_str().to_string_lossy()
            ))),
        })
        .collect::<StorageResult<_>>()?;

    Ok(Scope::new(segments))
}

fn read_dir(dir: &Path) -> StorageResult<Vec<PathBuf>> {
    fs::read_dir(dir)
        .and_then(|entries| {
            entries
                .map(|entry| entry.map(|entry| entry.path()))
                .collect::<io::Result<Vec<PathBuf>>>()
        })
        .map_err(|e| io_error(format!("cannot read dir {}", dir.display()), e))
}

/// Non-empty directories below `dir`, children before their parent.
fn scope_dirs(dir: &Path) -> StorageResult<Vec<PathBuf>> {
    let mut dirs = Vec::new();

    for path in read_dir(dir)? {
        if !path.is_dir() || path.ends_with(LOCK_FILE_DIR) || read_dir(&path)?.is_empty() {
            continue;
        }
        dirs.extend(scope_dirs(&path)?);
        dirs.push(path);
    }

    Ok(dirs)
}

fn remove_if_exists(path: &Path) -> StorageResult<()> {
    let removed = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    match removed {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_error(format!("cannot remove {}", path.display()), e)),
    }
}

/// Removes `path` and its empty ancestors, stopping at the first directory
/// that is not empty. Never removes `root`.
fn remove_empty_parent_dirs(path: &Path, root: &Path) {
    for dir in path.ancestors() {
        if dir == root || !dir.starts_with(root) || fs::remove_dir(dir).is_err() {
            break;
        }
    }
}

//------------ FileLock ------------------------------------------------------

#[derive(Debug)]
struct FileLock {
    path: PathBuf,
    lock: RwLock<File>,
}

impl FileLock {
    fn open(dir: &Path) -> StorageResult<Self> {
        let path = dir.join(LOCK_FILE_NAME);
        fs::create_dir_all(dir)
            .map_err(|e| io_error(format!("cannot create dir for lock file {}", path.display()), e))?;

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| io_error(format!("cannot open lock file {}", path.display()), e))?;

        Ok(FileLock {
            path,
            lock: RwLock::new(file),
        })
    }

    /// Runs `op` with the lock held exclusively, polling up to `tries` times
    /// for it.
    fn hold<T>(&mut self, tries: usize, op: impl FnOnce() -> T) -> StorageResult<T> {
        let mut attempt = 1;
        let _guard = loop {
            match self.lock.try_write() {
                Ok(guard) => break guard,
                Err(_) if attempt < tries => {
                    attempt += 1;
                    thread::sleep(Disk::POLL_LOCK_INTERVAL);
                }
                Err(e) => {
                    return Err(KeyValueError::Other(format!(
                        "Cannot get lock {} after {} attempts: {}",
                        self.path.display(),
                        attempt,
                        e
                    )));
                }
            }
        };

        Ok(op())
    }
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test;

    fn disk(dir: &Path) -> Disk {
        Disk::new(&dir.display().to_string(), "ns").unwrap()
    }

    fn key(scope: &str, name: &str) -> Key {
        Key::new_scoped(
            Scope::from_segment(SegmentBuf::parse(scope).unwrap()),
            SegmentBuf::parse(name).unwrap(),
        )
    }

    #[test]
    fn lock_file_left_behind_does_not_block() {
        test::test_under_tmp(|dir| {
            let disk = disk(&dir);
            let lock_dir = dir.join("ns").join(LOCK_FILE_DIR);
            fs::create_dir_all(lock_dir.join("node-a")).unwrap();
            fs::write(lock_dir.join(LOCK_FILE_NAME), b"").unwrap();
            fs::write(lock_dir.join("node-a").join(LOCK_FILE_NAME), b"").unwrap();

            let key = key("node-a", "config.json");
            disk.execute(key.scope(), |kv| kv.store(&key, Value::from(1))).unwrap();
            assert_eq!(disk.execute(&Scope::global(), |kv| kv.get(&key)).unwrap(), Some(Value::from(1)));
        })
    }

    #[test]
    fn held_lock_fails_after_bounded_attempts() {
        test::test_under_tmp(|dir| {
            let disk = disk(&dir).with_lock_tries(3);
            let scope = Scope::from_segment(SegmentBuf::parse("node-a").unwrap());

            let mut other = FileLock::open(&scope.as_path(dir.join("ns").join(LOCK_FILE_DIR))).unwrap();
            other
                .hold(1, || {
                    let err = disk.execute(&scope, |_| Ok(())).unwrap_err();
                    assert!(matches!(err, KeyValueError::Other(_)));

                    // other scopes are not affected
                    disk.execute(&Scope::global(), |_| Ok(())).unwrap();
                })
                .unwrap();

            disk.execute(&scope, |_| Ok(())).unwrap();
        })
    }

    #[test]
    fn clear_surfaces_io_errors() {
        test::test_under_tmp(|dir| {
            let disk = disk(&dir);
            fs::write(dir.join("ns"), b"not a directory").unwrap();
            assert!(matches!(disk.clear(), Err(KeyValueError::IoError(_))));
        })
    }

    #[test]
    fn clear_keeps_lock_dir() {
        test::test_under_tmp(|dir| {
            let disk = disk(&dir);
            let key = key("node-a", "config.json");
            disk.execute(key.scope(), |kv| kv.store(&key, Value::from(1))).unwrap();

            disk.execute(&Scope::global(), |kv| kv.clear()).unwrap();
            assert_eq!(disk.get(&key).unwrap(), None);
            assert!(disk.list_scopes().unwrap().is_empty());
            assert!(dir.join("ns").join(LOCK_FILE_DIR).is_dir());
        })
    }

    #[test]
    fn lock_dir_is_not_a_scope() {
        test::test_under_tmp(|dir| {
            let disk = disk(&dir);
            let locks = key(LOCK_FILE_DIR, "value");
            assert!(matches!(disk.store(&locks, Value::from(1)), Err(KeyValueError::InvalidKey(_))));
            assert!(disk.delete_scope(locks.scope()).is_err());

            let global = Key::new_global(SegmentBuf::parse(LOCK_FILE_DIR).unwrap());
            assert!(disk.store(&global, Value::from(1)).is_err());
        })
    }
}
