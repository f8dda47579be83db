//! Mirror writer
//!
//! Reproduces a bucket listing on the local filesystem. Records are handled
//! one at a time in listing order. A failing record is reported and skipped;
//! only the initial listing can abort a run.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::{self, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::lister::list_keys;
use crate::path::{is_directory_marker, local_path, BucketName};
use crate::traits::{ObjectInfo, ObjectStore};

/// Step of a record's processing that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    TranslatingKey,
    CreatingFolder,
    GettingObject,
    CreatingFile,
    WritingToFile,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phase = match self {
            Phase::TranslatingKey => "translating key",
            Phase::CreatingFolder => "creating folder",
            Phase::GettingObject => "getting object",
            Phase::CreatingFile => "creating file",
            Phase::WritingToFile => "writing to file",
        };
        f.write_str(phase)
    }
}

/// Which directories are created before a file object is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentDirs {
    /// Only the destination root. Nested keys rely on directory markers
    /// earlier in the listing; without one, creating the file fails.
    Literal,
    /// The full ancestor chain of every file
    #[default]
    CreateAll,
}

/// Terminal state of one record
#[derive(Debug)]
pub enum RecordOutcome {
    DirectoryCreated,
    FileWritten { bytes: u64 },
    Failed { phase: Phase, error: Error },
}

impl RecordOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, RecordOutcome::Failed { .. })
    }
}

/// Totals for a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MirrorReport {
    pub directories: usize,
    pub files: usize,
    pub failed: usize,
    pub bytes: u64,
}

impl MirrorReport {
    fn record(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::DirectoryCreated => self.directories += 1,
            RecordOutcome::FileWritten { bytes } => {
                self.files += 1;
                self.bytes += bytes;
            }
            RecordOutcome::Failed { .. } => self.failed += 1,
        }
    }

    /// Number of records processed
    pub fn total(&self) -> usize {
        self.directories + self.files + self.failed
    }
}

/// Progress notifications emitted during a run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MirrorEvent {
    Listed {
        bucket: String,
        count: usize,
        truncated: bool,
    },
    Object {
        key: String,
    },
    CreatingFolder {
        key: String,
    },
    Downloading {
        key: String,
    },
    Downloaded {
        key: String,
        path: PathBuf,
        bytes: u64,
    },
    Failed {
        key: String,
        phase: Phase,
        error: String,
    },
    Done {
        report: MirrorReport,
    },
}

/// Receiver for [`MirrorEvent`]s
pub trait MirrorObserver {
    fn on_event(&mut self, event: &MirrorEvent);
}

impl MirrorObserver for Vec<MirrorEvent> {
    fn on_event(&mut self, event: &MirrorEvent) {
        self.push(event.clone());
    }
}

type StepResult<T> = std::result::Result<T, (Phase, Error)>;

trait PhaseExt<T> {
    fn phase(self, phase: Phase) -> StepResult<T>;
}

impl<T, E: Into<Error>> PhaseExt<T> for std::result::Result<T, E> {
    fn phase(self, phase: Phase) -> StepResult<T> {
        self.map_err(|e| (phase, e.into()))
    }
}

/// Mirrors one bucket into a destination root
pub struct Mirror<'a, S: ObjectStore + ?Sized> {
    store: &'a S,
    bucket: BucketName,
    root: PathBuf,
    parent_dirs: ParentDirs,
}

impl<'a, S: ObjectStore + ?Sized> Mirror<'a, S> {
    /// Create a mirror of `bucket` rooted at `root`
    ///
    /// `root` is usually [`crate::path::destination_root`]. It is created
    /// lazily, the first time a record needs it.
    pub fn new(store: &'a S, bucket: BucketName, root: impl Into<PathBuf>) -> Self {
        Self {
            store,
            bucket,
            root: root.into(),
            parent_dirs: ParentDirs::default(),
        }
    }

    /// Choose how parent directories of file objects are created
    pub fn with_parent_dirs(mut self, parent_dirs: ParentDirs) -> Self {
        self.parent_dirs = parent_dirs;
        self
    }

    /// List the bucket and mirror every record
    ///
    /// Fails only if the listing fails, before anything is written.
    pub async fn run(&self, observer: &mut dyn MirrorObserver) -> Result<MirrorReport> {
        let listing = list_keys(self.store, &self.bucket).await?;

        observer.on_event(&MirrorEvent::Listed {
            bucket: self.bucket.to_string(),
            count: listing.items.len(),
            truncated: listing.truncated,
        });

        let mut report = MirrorReport::default();
        for record in &listing.items {
            let outcome = self.mirror_record(record, observer).await;
            report.record(&outcome);
        }

        tracing::info!(
            bucket = %self.bucket,
            directories = report.directories,
            files = report.files,
            failed = report.failed,
            bytes = report.bytes,
            "mirror finished"
        );

        observer.on_event(&MirrorEvent::Done {
            report: report.clone(),
        });

        Ok(report)
    }

    /// Materialize a single listed record
    pub async fn mirror_record(
        &self,
        record: &ObjectInfo,
        observer: &mut dyn MirrorObserver,
    ) -> RecordOutcome {
        let key = record.key.as_str();
        observer.on_event(&MirrorEvent::Object { key: key.into() });

        let outcome = match self.translate(key) {
            Err(error) => RecordOutcome::Failed {
                phase: Phase::TranslatingKey,
                error,
            },
            Ok(path) if is_directory_marker(key) => {
                observer.on_event(&MirrorEvent::CreatingFolder { key: key.into() });
                match fs::create_dir_all(&path).await {
                    Ok(()) => {
                        tracing::debug!(key, path = %path.display(), "created folder");
                        RecordOutcome::DirectoryCreated
                    }
                    Err(e) => RecordOutcome::Failed {
                        phase: Phase::CreatingFolder,
                        error: e.into(),
                    },
                }
            }
            Ok(path) => {
                observer.on_event(&MirrorEvent::Downloading { key: key.into() });
                match self.download(key, &path).await {
                    Ok(bytes) => {
                        tracing::debug!(key, path = %path.display(), bytes, "object downloaded");
                        observer.on_event(&MirrorEvent::Downloaded {
                            key: key.into(),
                            path,
                            bytes,
                        });
                        RecordOutcome::FileWritten { bytes }
                    }
                    Err((phase, error)) => RecordOutcome::Failed { phase, error },
                }
            }
        };

        if let RecordOutcome::Failed { phase, error } = &outcome {
            tracing::warn!(key, %phase, %error, "skipping object");
            observer.on_event(&MirrorEvent::Failed {
                key: key.into(),
                phase: *phase,
                error: error.to_string(),
            });
        }

        outcome
    }

    fn translate(&self, key: &str) -> Result<PathBuf> {
        let path = local_path(&self.root, key)?;
        if path == self.root && !is_directory_marker(key) {
            return Err(Error::InvalidKey(format!("'{key}' does not name a file")));
        }
        Ok(path)
    }

    // The body and the file are dropped when this returns, whichever step fails.
    async fn download(&self, key: &str, path: &Path) -> StepResult<u64> {
        let mut body = self
            .store
            .get_object(&self.bucket, key)
            .await
            .phase(Phase::GettingObject)?;

        let dir = match self.parent_dirs {
            ParentDirs::Literal => self.root.as_path(),
            ParentDirs::CreateAll => path.parent().unwrap_or(&self.root),
        };
        fs::create_dir_all(dir).await.phase(Phase::CreatingFolder)?;

        let mut file = fs::File::create(path).await.phase(Phase::CreatingFile)?;

        let bytes = io::copy(&mut body, &mut file)
            .await
            .phase(Phase::WritingToFile)?;
        file.flush().await.phase(Phase::WritingToFile)?;

        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{ListResult, MockObjectStore, ObjectStream};
    use tempfile::TempDir;

    fn body(data: &'static [u8]) -> ObjectStream {
        Box::pin(std::io::Cursor::new(data))
    }

    fn listing(keys: &[&str]) -> ListResult {
        ListResult {
            items: keys.iter().map(|k| ObjectInfo::new(*k)).collect(),
            ..Default::default()
        }
    }

    fn bucket() -> BucketName {
        BucketName::new("photos").unwrap()
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::CreatingFolder.to_string(), "creating folder");
        assert_eq!(Phase::GettingObject.to_string(), "getting object");
        assert_eq!(Phase::CreatingFile.to_string(), "creating file");
        assert_eq!(Phase::WritingToFile.to_string(), "writing to file");
    }

    #[test]
    fn test_event_json() {
        let event = MirrorEvent::Failed {
            key: "b.txt".into(),
            phase: Phase::GettingObject,
            error: "Not found: b.txt".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "event": "failed",
                "key": "b.txt",
                "phase": "getting_object",
                "error": "Not found: b.txt"
            })
        );
    }

    #[tokio::test]
    async fn test_listing_failure_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("photos");

        let mut store = MockObjectStore::new();
        store
            .expect_list_objects()
            .returning(|_| Err(Error::Network("connection refused".into())));
        store.expect_get_object().never();

        let mut events = Vec::new();
        let result = Mirror::new(&store, bucket(), &root).run(&mut events).await;

        assert!(matches!(result, Err(Error::ListingFailed { .. })));
        assert!(events.is_empty());
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_directory_marker_is_not_downloaded() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("photos");

        let mut store = MockObjectStore::new();
        store
            .expect_list_objects()
            .returning(|_| Ok(listing(&["2020/", "2020/06/"])));
        store.expect_get_object().never();

        let mut events = Vec::new();
        let report = Mirror::new(&store, bucket(), &root)
            .run(&mut events)
            .await
            .unwrap();

        assert_eq!(report.directories, 2);
        assert!(root.join("2020").join("06").is_dir());
    }

    #[tokio::test]
    async fn test_fetch_failure_is_isolated() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("photos");

        let mut store = MockObjectStore::new();
        store
            .expect_list_objects()
            .returning(|_| Ok(listing(&["a.txt", "b.txt", "c.txt"])));
        store
            .expect_get_object()
            .times(3)
            .returning(|_, key| match key {
                "b.txt" => Err(Error::NotFound(key.to_string())),
                "a.txt" => Ok(body(b"alpha")),
                _ => Ok(body(b"gamma")),
            });

        let mut events = Vec::new();
        let report = Mirror::new(&store, bucket(), &root)
            .run(&mut events)
            .await
            .unwrap();

        assert_eq!(report.files, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(std::fs::read(root.join("a.txt")).unwrap(), b"alpha");
        assert_eq!(std::fs::read(root.join("c.txt")).unwrap(), b"gamma");
        assert!(!root.join("b.txt").exists());

        assert!(events.contains(&MirrorEvent::Failed {
            key: "b.txt".into(),
            phase: Phase::GettingObject,
            error: "Not found: b.txt".into(),
        }));
        assert!(matches!(events.last(), Some(MirrorEvent::Done { .. })));
    }

    #[tokio::test]
    async fn test_event_sequence_for_file() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("photos");

        let mut store = MockObjectStore::new();
        store
            .expect_list_objects()
            .returning(|_| Ok(listing(&["readme.txt"])));
        store
            .expect_get_object()
            .returning(|_, _| Ok(body(b"hello")));

        let mut events = Vec::new();
        Mirror::new(&store, bucket(), &root)
            .run(&mut events)
            .await
            .unwrap();

        assert_eq!(
            events,
            vec![
                MirrorEvent::Listed {
                    bucket: "photos".into(),
                    count: 1,
                    truncated: false,
                },
                MirrorEvent::Object {
                    key: "readme.txt".into()
                },
                MirrorEvent::Downloading {
                    key: "readme.txt".into()
                },
                MirrorEvent::Downloaded {
                    key: "readme.txt".into(),
                    path: root.join("readme.txt"),
                    bytes: 5,
                },
                MirrorEvent::Done {
                    report: MirrorReport {
                        directories: 0,
                        files: 1,
                        failed: 0,
                        bytes: 5,
                    },
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_literal_parent_dirs_requires_marker() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("photos");

        let mut store = MockObjectStore::new();
        store.expect_get_object().returning(|_, _| Ok(body(b"x")));

        let mirror = Mirror::new(&store, bucket(), &root).with_parent_dirs(ParentDirs::Literal);
        let mut events = Vec::new();
        let outcome = mirror
            .mirror_record(&ObjectInfo::new("a/b/c.txt"), &mut events)
            .await;

        assert!(matches!(
            outcome,
            RecordOutcome::Failed {
                phase: Phase::CreatingFile,
                ..
            }
        ));
        // The root itself is still created
        assert!(root.is_dir());
        assert!(!root.join("a").exists());
    }

    #[tokio::test]
    async fn test_create_all_parent_dirs() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("photos");

        let mut store = MockObjectStore::new();
        store.expect_get_object().returning(|_, _| Ok(body(b"nested")));

        let mirror = Mirror::new(&store, bucket(), &root);
        let mut events = Vec::new();
        let outcome = mirror
            .mirror_record(&ObjectInfo::new("a/b/c.txt"), &mut events)
            .await;

        assert!(matches!(outcome, RecordOutcome::FileWritten { bytes: 6 }));
        let path = root.join("a").join("b").join("c.txt");
        assert_eq!(std::fs::read(path).unwrap(), b"nested");
    }

    #[tokio::test]
    async fn test_escaping_key_is_skipped() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("photos");

        let mut store = MockObjectStore::new();
        store.expect_get_object().never();

        let mirror = Mirror::new(&store, bucket(), &root);
        let mut events = Vec::new();
        let outcome = mirror
            .mirror_record(&ObjectInfo::new("../outside.txt"), &mut events)
            .await;

        assert!(matches!(
            outcome,
            RecordOutcome::Failed {
                phase: Phase::TranslatingKey,
                error: Error::InvalidKey(_),
            }
        ));
        assert!(!temp.path().join("outside.txt").exists());
    }

    #[tokio::test]
    async fn test_key_without_file_name_is_skipped() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("photos");

        let mut store = MockObjectStore::new();
        store.expect_get_object().never();

        let mirror = Mirror::new(&store, bucket(), &root);
        let mut events = Vec::new();
        let outcome = mirror.mirror_record(&ObjectInfo::new("."), &mut events).await;

        assert!(outcome.is_failed());
        assert!(!root.exists());
    }
}
