//! Reference Store: persisted element references, one namespace per file.
//!
//! ```json
//! {
//!   "loginButton": {
//!     "primary": "#login-btn",
//!     "fallbacks": ["button:has-text('Login')"]
//!   }
//! }
//! ```
//!
//! ## Concurrency
//!
//! Several workers may heal keys of the same namespace at once. Every
//! [`ReferenceStore::record_heal`] re-reads the file under an advisory lock on `<file>.lock`,
//! rotates only the healed key and writes the merged namespace through a
//! temp file + rename. Writers of different keys never lose each other's
//! updates; two writers of the same key resolve as last-writer-wins.

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

/// Default cap on retained fallback history
pub const DEFAULT_MAX_FALLBACKS: usize = 5;

/// Default bound on waiting for the namespace lock
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5000;

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Reference store failures
#[derive(Debug, Error)]
pub enum StoreError {
    /// File could not be read or written
    #[error("failed to access {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// File content is not a valid namespace
    #[error("{path} is not a valid reference namespace: {message}")]
    Corrupt {
        /// File involved
        path: PathBuf,
        /// Parse or validation message
        message: String,
    },

    /// Entry violates the store invariants
    #[error("invalid reference entry '{key}': {message}")]
    InvalidEntry {
        /// Element key
        key: String,
        /// What is wrong
        message: String,
    },

    /// Another writer held the namespace lock for too long
    #[error("timed out after {waited_ms}ms waiting for lock {path}")]
    LockTimeout {
        /// Lock file
        path: PathBuf,
        /// Time spent waiting
        waited_ms: u64,
    },
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// One logical UI element: a primary reference plus ordered fallbacks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEntry {
    /// Key, unique within the namespace
    pub key: String,
    /// Preferred reference expression, never empty
    pub primary: String,
    /// Tried in order after `primary`
    pub fallbacks: Vec<String>,
}

impl ReferenceEntry {
    /// Create an entry
    #[must_use]
    pub fn new(key: impl Into<String>, primary: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            primary: primary.into(),
            fallbacks: Vec::new(),
        }
    }

    /// Set the fallbacks
    #[must_use]
    pub fn with_fallbacks<I, S>(mut self, fallbacks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallbacks = fallbacks.into_iter().map(Into::into).collect();
        self
    }

    /// Primary followed by fallbacks, in attempt order
    pub fn references(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary.as_str()).chain(self.fallbacks.iter().map(String::as_str))
    }

    /// Check the entry invariants
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.primary.trim().is_empty() {
            return Err(StoreError::InvalidEntry {
                key: self.key.clone(),
                message: "primary reference is empty".to_string(),
            });
        }
        Ok(())
    }

    /// Every invariant violation, including the ones a loaded file
    /// tolerates (duplicate or blank fallbacks, primary repeated)
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.primary.trim().is_empty() {
            problems.push("primary reference is empty".to_string());
        }
        for (i, fallback) in self.fallbacks.iter().enumerate() {
            if fallback.trim().is_empty() {
                problems.push(format!("fallback {i} is empty"));
            } else if *fallback == self.primary {
                problems.push(format!("fallback {i} repeats the primary '{fallback}'"));
            } else if self.fallbacks[..i].contains(fallback) {
                problems.push(format!("fallback {i} duplicates '{fallback}'"));
            }
        }
        problems
    }

    /// Promote `new_reference` to primary.
    ///
    /// The previous primary moves to the front of the fallbacks. The new
    /// primary is removed from the history, duplicates collapse to their
    /// first occurrence and the history is cut to `max_fallbacks`, evicting
    /// the oldest references.
    pub fn rotate(&mut self, new_reference: &str, max_fallbacks: usize) {
        if self.primary == new_reference {
            return;
        }
        let previous = std::mem::replace(&mut self.primary, new_reference.to_string());
        let mut history: Vec<String> = Vec::with_capacity(self.fallbacks.len() + 1);
        for reference in std::iter::once(previous).chain(self.fallbacks.drain(..)) {
            if reference != new_reference && !history.contains(&reference) {
                history.push(reference);
            }
        }
        history.truncate(max_fallbacks);
        self.fallbacks = history;
    }
}

/// On-disk shape of one entry
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    primary: String,
    #[serde(default)]
    fallbacks: Vec<String>,
}

type Namespace = BTreeMap<String, StoredEntry>;

/// Mapping from element key to [`ReferenceEntry`] for one namespace.
///
/// The store is the only writer of its entries.
#[derive(Debug)]
pub struct ReferenceStore {
    path: Option<PathBuf>,
    entries: RwLock<BTreeMap<String, ReferenceEntry>>,
    write_lock: Mutex<()>,
    max_fallbacks: usize,
    lock_timeout: Duration,
}

impl ReferenceStore {
    /// Create a store that is never persisted
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: RwLock::new(BTreeMap::new()),
            write_lock: Mutex::new(()),
            max_fallbacks: DEFAULT_MAX_FALLBACKS,
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
        }
    }

    /// Open a namespace file; a missing file is an empty namespace
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let namespace = read_namespace(&path)?;
        let store = Self {
            entries: RwLock::new(to_entries(namespace)),
            path: Some(path),
            ..Self::in_memory()
        };
        Ok(store)
    }

    /// Set the cap on retained fallback history
    #[must_use]
    pub fn with_max_fallbacks(mut self, max_fallbacks: usize) -> Self {
        self.max_fallbacks = max_fallbacks;
        self
    }

    /// Set the namespace lock wait bound
    #[must_use]
    pub const fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Backing file, if persisted
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Cap on retained fallback history
    #[must_use]
    pub const fn max_fallbacks(&self) -> usize {
        self.max_fallbacks
    }

    /// Bound on waiting for the namespace lock
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Look up an entry
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<ReferenceEntry> {
        self.entries.read().ok()?.get(key).cloned()
    }

    /// All keys, sorted
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.entries
            .read()
            .map(|e| e.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or_default()
    }

    /// Whether the namespace is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Seed an entry in memory without persisting it
    pub fn insert(&self, entry: ReferenceEntry) -> Result<(), StoreError> {
        entry.validate()?;
        if let Ok(mut entries) = self.entries.write() {
            let _ = entries.insert(entry.key.clone(), entry);
        }
        Ok(())
    }

    /// Re-read the backing file, replacing the in-memory view
    pub fn reload(&self) -> Result<(), StoreError> {
        if let Some(path) = &self.path {
            let fresh = to_entries(read_namespace(path)?);
            if let Ok(mut entries) = self.entries.write() {
                *entries = fresh;
            }
        }
        Ok(())
    }

    /// Record a validated heal for `key` and persist it before returning.
    ///
    /// An existing entry is rotated (see [`ReferenceEntry::rotate`]); an
    /// unknown key gets a new entry with empty fallbacks. On error the file
    /// is left as it was.
    pub async fn record_heal(
        &self,
        key: &str,
        new_reference: &str,
    ) -> Result<ReferenceEntry, StoreError> {
        let candidate = ReferenceEntry::new(key, new_reference);
        candidate.validate()?;

        let _guard = self.write_lock.lock().await;

        let Some(path) = self.path.clone() else {
            let updated = self.rotate_in(self.lookup(key), key, new_reference);
            self.put(updated.clone());
            return Ok(updated);
        };

        ensure_parent(&path).await?;
        let lock = LockFile::acquire(lock_path(&path), self.lock_timeout).await?;
        let mut namespace = load_namespace(&path).await?;
        let current = namespace
            .get(key)
            .map(|stored| from_stored(key, stored.clone()))
            .or_else(|| self.lookup(key));
        let updated = self.rotate_in(current, key, new_reference);
        let _ = namespace.insert(key.to_string(), to_stored(&updated));
        write_namespace(&path, &namespace).await?;
        drop(lock);

        tracing::debug!(
            key,
            primary = %updated.primary,
            fallbacks = updated.fallbacks.len(),
            path = %path.display(),
            "reference entry persisted"
        );

        if let Ok(mut entries) = self.entries.write() {
            for (k, stored) in namespace {
                let entry = from_stored(&k, stored);
                let _ = entries.insert(k, entry);
            }
        }
        Ok(updated)
    }

    fn rotate_in(
        &self,
        current: Option<ReferenceEntry>,
        key: &str,
        new_reference: &str,
    ) -> ReferenceEntry {
        match current {
            Some(mut entry) => {
                entry.rotate(new_reference, self.max_fallbacks);
                entry
            }
            None => ReferenceEntry::new(key, new_reference),
        }
    }

    fn put(&self, entry: ReferenceEntry) {
        if let Ok(mut entries) = self.entries.write() {
            let _ = entries.insert(entry.key.clone(), entry);
        }
    }
}

fn from_stored(key: &str, stored: StoredEntry) -> ReferenceEntry {
    ReferenceEntry {
        key: key.to_string(),
        primary: stored.primary,
        fallbacks: stored.fallbacks,
    }
}

fn to_stored(entry: &ReferenceEntry) -> StoredEntry {
    StoredEntry {
        primary: entry.primary.clone(),
        fallbacks: entry.fallbacks.clone(),
    }
}

fn to_entries(namespace: Namespace) -> BTreeMap<String, ReferenceEntry> {
    namespace
        .into_iter()
        .map(|(k, stored)| {
            let entry = from_stored(&k, stored);
            (k, entry)
        })
        .collect()
}

/// Parse namespace JSON, checking every entry
fn parse_namespace(path: &Path, content: &str) -> Result<Namespace, StoreError> {
    if content.trim().is_empty() {
        return Ok(Namespace::new());
    }
    let namespace: Namespace =
        serde_json::from_str(content).map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    for (key, stored) in &namespace {
        if stored.primary.trim().is_empty() {
            return Err(StoreError::Corrupt {
                path: path.to_path_buf(),
                message: format!("entry '{key}' has an empty primary reference"),
            });
        }
    }
    Ok(namespace)
}

fn read_namespace(path: &Path) -> Result<Namespace, StoreError> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_namespace(path, &content),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Namespace::new()),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

async fn load_namespace(path: &Path) -> Result<Namespace, StoreError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => parse_namespace(path, &content),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Namespace::new()),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

/// Write through a sibling temp file and rename so readers never observe
/// a partial namespace.
async fn write_namespace(path: &Path, namespace: &Namespace) -> Result<(), StoreError> {
    let mut json = serde_json::to_string_pretty(namespace).map_err(|e| StoreError::Corrupt {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    json.push('\n');

    ensure_parent(path).await?;
    let tmp = temp_path(path);
    if let Err(e) = tokio::fs::write(&tmp, json.as_bytes()).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(StoreError::io(&tmp, e));
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(StoreError::io(path, e));
    }
    Ok(())
}

async fn ensure_parent(path: &Path) -> Result<(), StoreError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| StoreError::io(dir, e))?;
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.tmp", uuid::Uuid::new_v4().simple()))
}

fn lock_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".lock");
    PathBuf::from(os)
}

/// Cross-process exclusive lock on `<namespace>.lock`.
///
/// An OS advisory lock (`flock` / `LockFileEx`); a crashed holder
/// releases it with its file handle. The lock file is never removed, so
/// all workers lock the same inode.
#[derive(Debug)]
struct LockFile {
    file: File,
}

impl LockFile {
    async fn acquire(path: PathBuf, timeout: Duration) -> Result<Self, StoreError> {
        let start = Instant::now();
        loop {
            let attempt_path = path.clone();
            let attempt = tokio::task::spawn_blocking(move || try_lock(&attempt_path))
                .await
                .map_err(|e| StoreError::io(&path, io::Error::other(e)))?;
            if let Some(file) = attempt.map_err(|e| StoreError::io(&path, e))? {
                return Ok(Self { file });
            }
            let waited = start.elapsed();
            if waited >= timeout {
                return Err(StoreError::LockTimeout {
                    path,
                    waited_ms: waited.as_millis() as u64,
                });
            }
            tokio::time::sleep(LOCK_POLL_INTERVAL).await;
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// `Ok(None)` when another handle holds the lock
fn try_lock(path: &Path) -> io::Result<Option<File>> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    match file.try_lock_exclusive() {
        Ok(()) => Ok(Some(file)),
        Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn login_entry() -> ReferenceEntry {
        ReferenceEntry::new("loginButton", "#login-btn")
            .with_fallbacks(["button:has-text('Login')"])
    }

    mod entry_tests {
        use super::*;

        #[test]
        fn test_references_order() {
            let entry = login_entry();
            let refs: Vec<&str> = entry.references().collect();
            assert_eq!(refs, vec!["#login-btn", "button:has-text('Login')"]);
        }

        #[test]
        fn test_validate_rejects_empty_primary() {
            assert!(ReferenceEntry::new("k", "  ").validate().is_err());
            assert!(login_entry().validate().is_ok());
        }

        #[test]
        fn test_problems_lists_each_violation() {
            assert!(login_entry().problems().is_empty());
            let entry = ReferenceEntry::new("k", "#a").with_fallbacks(["#b", "#a", "#b", " "]);
            assert_eq!(
                entry.problems(),
                vec![
                    "fallback 1 repeats the primary '#a'",
                    "fallback 2 duplicates '#b'",
                    "fallback 3 is empty",
                ]
            );
        }

        #[test]
        fn test_rotate_pushes_previous_primary() {
            let mut entry = login_entry();
            entry.rotate("#submit-login", 5);
            assert_eq!(entry.primary, "#submit-login");
            assert_eq!(
                entry.fallbacks,
                vec!["#login-btn", "button:has-text('Login')"]
            );
        }

        #[test]
        fn test_rotate_caps_history_evicting_oldest() {
            let mut entry = ReferenceEntry::new("k", "a").with_fallbacks(["b", "c", "d"]);
            entry.rotate("e", 2);
            assert_eq!(entry.primary, "e");
            assert_eq!(entry.fallbacks, vec!["a", "b"]);
        }

        #[test]
        fn test_rotate_removes_new_primary_from_history() {
            let mut entry = ReferenceEntry::new("k", "a").with_fallbacks(["b", "c"]);
            entry.rotate("c", 5);
            assert_eq!(entry.primary, "c");
            assert_eq!(entry.fallbacks, vec!["a", "b"]);
        }

        #[test]
        fn test_rotate_same_reference_is_noop() {
            let mut entry = login_entry();
            entry.rotate("#login-btn", 5);
            assert_eq!(entry, login_entry());
        }

        #[test]
        fn test_rotate_collapses_duplicates() {
            let mut entry = ReferenceEntry::new("k", "a").with_fallbacks(["b", "a", "b"]);
            entry.rotate("z", 5);
            assert_eq!(entry.fallbacks, vec!["a", "b"]);
        }
    }

    mod file_tests {
        use super::*;

        #[test]
        fn test_open_missing_file_is_empty() {
            let dir = TempDir::new().unwrap();
            let store = ReferenceStore::open(dir.path().join("login.json")).unwrap();
            assert!(store.is_empty());
        }

        #[test]
        fn test_open_parses_namespace() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("login.json");
            std::fs::write(
                &path,
                r##"{"loginButton":{"primary":"#login-btn","fallbacks":["button.login"]},"logo":{"primary":"img.logo"}}"##,
            )
            .unwrap();
            let store = ReferenceStore::open(&path).unwrap();
            assert_eq!(store.keys(), vec!["loginButton", "logo"]);
            let entry = store.lookup("loginButton").unwrap();
            assert_eq!(entry.fallbacks, vec!["button.login"]);
            assert!(store.lookup("logo").unwrap().fallbacks.is_empty());
        }

        #[test]
        fn test_open_rejects_corrupt_file() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("bad.json");
            std::fs::write(&path, "[1, 2").unwrap();
            assert!(matches!(
                ReferenceStore::open(&path),
                Err(StoreError::Corrupt { .. })
            ));
            std::fs::write(&path, r#"{"k":{"primary":""}}"#).unwrap();
            assert!(matches!(
                ReferenceStore::open(&path),
                Err(StoreError::Corrupt { .. })
            ));
        }

        #[tokio::test]
        async fn test_record_heal_persists_rotation() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("login.json");
            let store = ReferenceStore::open(&path).unwrap();
            store.insert(login_entry()).unwrap();

            let updated = store
                .record_heal("loginButton", "#submit-login")
                .await
                .unwrap();
            assert_eq!(updated.primary, "#submit-login");

            let reopened = ReferenceStore::open(&path).unwrap();
            let entry = reopened.lookup("loginButton").unwrap();
            assert_eq!(entry.primary, "#submit-login");
            assert_eq!(
                entry.fallbacks,
                vec!["#login-btn", "button:has-text('Login')"]
            );
            // lock released: a fresh handle can take it at once
            assert!(try_lock(&lock_path(&path)).unwrap().is_some());
        }

        #[tokio::test]
        async fn test_record_heal_creates_unknown_key() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("nested").join("cart.json");
            let store = ReferenceStore::open(&path).unwrap();
            let entry = store.record_heal("checkout", "#checkout").await.unwrap();
            assert_eq!(entry.primary, "#checkout");
            assert!(entry.fallbacks.is_empty());
            assert!(path.exists());
        }

        #[tokio::test]
        async fn test_record_heal_rejects_empty_reference() {
            let store = ReferenceStore::in_memory();
            assert!(matches!(
                store.record_heal("k", "").await,
                Err(StoreError::InvalidEntry { .. })
            ));
        }

        #[tokio::test]
        async fn test_record_heal_merges_other_writers_keys() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("shared.json");
            let first = ReferenceStore::open(&path).unwrap();
            let second = ReferenceStore::open(&path).unwrap();

            first.record_heal("a", "#a").await.unwrap();
            second.record_heal("b", "#b").await.unwrap();

            let reopened = ReferenceStore::open(&path).unwrap();
            assert_eq!(reopened.keys(), vec!["a", "b"]);
            // the second writer also picked up the first writer's key
            assert!(second.lookup("a").is_some());
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
        async fn test_concurrent_writers_do_not_lose_keys() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("shared.json");
            // left behind by an earlier run; an unlocked file must not block
            std::fs::write(lock_path(&path), "").unwrap();
            let mut handles = Vec::new();
            for i in 0..16 {
                let store = Arc::new(
                    ReferenceStore::open(&path)
                        .unwrap()
                        .with_lock_timeout(Duration::from_secs(30)),
                );
                handles.push(tokio::spawn(async move {
                    store
                        .record_heal(&format!("key{i}"), &format!("#ref{i}"))
                        .await
                        .unwrap();
                }));
            }
            for handle in handles {
                handle.await.unwrap();
            }
            let reopened = ReferenceStore::open(&path).unwrap();
            assert_eq!(reopened.len(), 16);
            for i in 0..16 {
                assert_eq!(
                    reopened.lookup(&format!("key{i}")).unwrap().primary,
                    format!("#ref{i}")
                );
            }
        }

        #[tokio::test]
        async fn test_held_lock_times_out_and_leaves_file() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("locked.json");
            let original = r##"{"k":{"primary":"#old"}}"##;
            std::fs::write(&path, original).unwrap();
            let holder = try_lock(&lock_path(&path)).unwrap().unwrap();

            let store = ReferenceStore::open(&path)
                .unwrap()
                .with_lock_timeout(Duration::from_millis(50));
            let err = store.record_heal("k", "#new").await.unwrap_err();
            assert!(matches!(
                err,
                StoreError::LockTimeout { waited_ms, .. } if waited_ms >= 50
            ));
            assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
            assert_eq!(store.lookup("k").unwrap().primary, "#old");
            drop(holder);
        }

        #[tokio::test]
        async fn test_waiting_writer_proceeds_once_lock_released() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("handoff.json");
            let holder = try_lock(&lock_path(&path)).unwrap().unwrap();
            let releaser = tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                drop(holder);
            });

            let store = ReferenceStore::open(&path)
                .unwrap()
                .with_lock_timeout(Duration::from_secs(10));
            let entry = store.record_heal("k", "#k").await.unwrap();
            assert_eq!(entry.primary, "#k");
            releaser.await.unwrap();
        }

        #[tokio::test]
        async fn test_lock_released_on_drop() {
            let dir = TempDir::new().unwrap();
            let path = lock_path(&dir.path().join("ns.json"));
            let lock = LockFile::acquire(path.clone(), Duration::from_millis(50))
                .await
                .unwrap();
            assert!(try_lock(&path).unwrap().is_none());
            drop(lock);
            assert!(try_lock(&path).unwrap().is_some());
        }

        #[test]
        fn test_written_file_is_sorted_and_pretty() {
            let mut namespace = Namespace::new();
            let _ = namespace.insert(
                "b".to_string(),
                StoredEntry {
                    primary: "#b".into(),
                    fallbacks: vec![],
                },
            );
            let _ = namespace.insert(
                "a".to_string(),
                StoredEntry {
                    primary: "#a".into(),
                    fallbacks: vec!["x".into()],
                },
            );
            let json = serde_json::to_string_pretty(&namespace).unwrap();
            assert!(json.find("\"a\"").unwrap() < json.find("\"b\"").unwrap());
        }
    }
}
