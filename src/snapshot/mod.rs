//! Snapshot engine
//!
//! This module contains the backup traversal and its stages:
//! - Resource catalog construction (declared or full-cluster)
//! - Eligibility filtering
//! - Instance fetching and sanitizing
//! - Publishing backup files

pub mod catalog;
pub mod eligibility;
pub mod fetch;
pub mod report;
pub mod sanitize;
pub mod traversal;
pub mod writer;

pub use catalog::{Catalog, SkippedGroupVersion};
pub use eligibility::Eligibility;
pub use report::{BackupReport, FailureRecord};
pub use sanitize::{sanitize, SERVER_MANAGED_FIELDS};
pub use traversal::{run_backup, run_backup_into};
pub use writer::{BackupDirectory, BackupSink, StagedFile};
