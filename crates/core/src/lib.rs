//! bm-core: Core library for the bucket-mirror tool
//!
//! This crate provides the core functionality for bucket-mirror, including:
//! - Configuration management
//! - Bucket names and key-to-path translation
//! - ObjectStore trait for the storage backend
//! - The Lister and the Mirror Writer
//!
//! This crate is designed to be independent of any specific S3 SDK,
//! allowing for easy testing with fake backends.

pub mod config;
pub mod error;
pub mod lister;
pub mod mirror;
pub mod path;
pub mod traits;

pub use config::{BackendConfig, Config, ConfigManager, MirrorDefaults};
pub use error::{Error, Result};
pub use lister::list_keys;
pub use mirror::{
    Mirror, MirrorEvent, MirrorObserver, MirrorReport, ParentDirs, Phase, RecordOutcome,
};
pub use path::{destination_root, is_directory_marker, local_path, translate_key, BucketName};
pub use traits::{ListResult, ObjectInfo, ObjectStore, ObjectStream};
