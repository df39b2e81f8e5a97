//! Backup directory and file publishing
//!
//! Every instance becomes one JSON file. Documents are written to a hidden
//! staging file first and only appear under their final name once complete.
//! Publishing never replaces an existing file.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tempfile::{Builder, NamedTempFile};
use tracing::debug;

use crate::error::{Error, PersistStage, Result};
use crate::resource::{
    describe_instance, instance_name, instance_namespace, Instance, ResourceDescriptor,
};

/// Prefix of staging files inside a backup directory
pub const STAGING_PREFIX: &str = ".tmp-";

/// Extension of published documents
const EXTENSION: &str = "json";

/// Longest file stem we generate, leaving room for suffix and extension
const MAX_STEM_LEN: usize = 200;

/// Destination of the documents produced by a traversal
pub trait BackupSink {
    /// Where the documents end up
    fn location(&self) -> &Path;

    /// Persist one sanitized instance, returning where it was published
    fn write(&self, descriptor: &ResourceDescriptor, instance: &Instance) -> Result<PathBuf>;
}

/// Directory holding the files of one backup run
#[derive(Clone, Debug)]
pub struct BackupDirectory {
    path: PathBuf,
}

impl BackupDirectory {
    /// Create a fresh, uniquely named directory under `parent`
    pub fn create(parent: &Path, prefix: &str) -> Result<Self> {
        let target = parent.display().to_string();
        fs::create_dir_all(parent)
            .map_err(|e| Error::persist(PersistStage::CreateDirectory, &target, e))?;

        let stamp = Utc::now().format("%Y%m%dT%H%M%SZ");
        let dir = Builder::new()
            .prefix(&format!("{}-{}-", prefix, stamp))
            .tempdir_in(parent)
            .map_err(|e| Error::persist(PersistStage::CreateDirectory, &target, e))?;

        Ok(Self { path: dir.keep() })
    }

    /// Use an existing directory
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize and publish one instance, returning its final path
    pub fn write(&self, descriptor: &ResourceDescriptor, instance: &Instance) -> Result<PathBuf> {
        self.stage(descriptor, instance)?.publish()
    }

    /// Write an instance to a staging file without publishing it
    ///
    /// Dropping the returned [`StagedFile`] removes the staging file.
    pub fn stage(
        &self,
        descriptor: &ResourceDescriptor,
        instance: &Instance,
    ) -> Result<StagedFile> {
        let target = describe_instance(descriptor, instance);

        let mut file = Builder::new()
            .prefix(STAGING_PREFIX)
            .suffix(".part")
            .tempfile_in(&self.path)
            .map_err(|e| Error::persist(PersistStage::CreateTemp, &target, e))?;

        let mut document = serde_json::to_vec_pretty(instance)
            .map_err(|e| Error::persist(PersistStage::Serialize, &target, e))?;
        document.push(b'\n');

        file.write_all(&document)
            .map_err(|e| Error::persist(PersistStage::Write, &target, e))?;

        Ok(StagedFile {
            file,
            directory: self.path.clone(),
            stem: file_stem(descriptor, instance),
            target,
        })
    }
}

impl BackupSink for BackupDirectory {
    fn location(&self) -> &Path {
        self.path()
    }

    fn write(&self, descriptor: &ResourceDescriptor, instance: &Instance) -> Result<PathBuf> {
        BackupDirectory::write(self, descriptor, instance)
    }
}

/// A fully written document waiting to be published
pub struct StagedFile {
    file: NamedTempFile,
    directory: PathBuf,
    stem: String,
    target: String,
}

impl StagedFile {
    /// Where the document currently lives
    pub fn staging_path(&self) -> &Path {
        self.file.path()
    }

    /// Name the document will be published under, absent collisions
    pub fn intended_path(&self) -> PathBuf {
        self.directory.join(format!("{}.{}", self.stem, EXTENSION))
    }

    /// Flush to disk and move under the first free final name
    pub fn publish(self) -> Result<PathBuf> {
        let StagedFile {
            mut file,
            directory,
            stem,
            target,
        } = self;

        file.as_file()
            .sync_all()
            .map_err(|e| Error::persist(PersistStage::Finalize, &target, e))?;

        let mut attempt = 0usize;
        loop {
            let name = if attempt == 0 {
                format!("{}.{}", stem, EXTENSION)
            } else {
                format!("{}-{}.{}", stem, attempt, EXTENSION)
            };
            let path = directory.join(name);

            match file.persist_noclobber(&path) {
                Ok(_) => {
                    debug!(path = %path.display(), "Published backup file");
                    return Ok(path);
                }
                Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                    file = e.file;
                    attempt += 1;
                }
                Err(e) => return Err(Error::persist(PersistStage::Finalize, &target, e.error)),
            }
        }
    }
}

/// `<group|core>.<version>.<resource>.<namespace|_cluster>.<name>`
fn file_stem(descriptor: &ResourceDescriptor, instance: &Instance) -> String {
    let group = if descriptor.group.is_empty() {
        "core"
    } else {
        descriptor.group.as_str()
    };
    let namespace = instance_namespace(instance).unwrap_or("_cluster");
    let name = instance_name(instance).unwrap_or("_unnamed");

    let mut stem = [group, &descriptor.version, &descriptor.resource, namespace, name]
        .iter()
        .map(|part| clean_component(part))
        .collect::<Vec<_>>()
        .join(".");
    // All characters are ASCII after cleaning
    stem.truncate(MAX_STEM_LEN);
    stem
}

fn clean_component(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::{BTreeSet, HashSet};
    use tempfile::tempdir;

    fn descriptor(group: &str, resource: &str) -> ResourceDescriptor {
        ResourceDescriptor {
            group: group.to_string(),
            version: "v1".to_string(),
            resource: resource.to_string(),
            kind: "Thing".to_string(),
            namespaced: true,
            verbs: BTreeSet::from(["list".to_string()]),
        }
    }

    fn published_files(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_file_names_are_navigable() {
        let core = descriptor("", "configmaps");
        let rbac = descriptor("rbac.authorization.k8s.io", "clusterroles");

        assert_eq!(
            file_stem(&core, &json!({"metadata": {"name": "cfg", "namespace": "default"}})),
            "core.v1.configmaps.default.cfg"
        );
        assert_eq!(
            file_stem(&rbac, &json!({"metadata": {"name": "system:controller:foo"}})),
            "rbac.authorization.k8s.io.v1.clusterroles._cluster.system_controller_foo"
        );
        assert_eq!(file_stem(&core, &json!({})), "core.v1.configmaps._cluster._unnamed");
    }

    #[test]
    fn test_long_names_are_truncated() {
        let d = descriptor("example.io", "widgets");
        let name = "x".repeat(300);
        let stem = file_stem(&d, &json!({"metadata": {"name": name}}));
        assert_eq!(stem.len(), MAX_STEM_LEN);
    }

    #[test]
    fn test_create_makes_unique_directories() {
        let root = tempdir().unwrap();
        let a = BackupDirectory::create(root.path(), "cluster-backup").unwrap();
        let b = BackupDirectory::create(root.path(), "cluster-backup").unwrap();

        assert_ne!(a.path(), b.path());
        assert!(a.path().is_dir());
        assert!(b.path().is_dir());
        let name = a.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("cluster-backup-"));
    }

    #[test]
    fn test_every_instance_gets_its_own_file() {
        let root = tempdir().unwrap();
        let dir = BackupDirectory::open(root.path());
        let d = descriptor("example.io", "widgets");

        // Same identity three times: names must still not collide
        let instances: Vec<_> = (0..3)
            .map(|i| {
                json!({"metadata": {"name": "w1", "namespace": "default"}, "spec": {"copy": i}})
            })
            .chain((0..5).map(|i| json!({"metadata": {"name": format!("w{}", i + 2)}})))
            .collect();

        let paths: Vec<_> = instances
            .iter()
            .map(|instance| dir.write(&d, instance).unwrap())
            .collect();

        let unique: HashSet<_> = paths.iter().collect();
        assert_eq!(unique.len(), instances.len());
        assert_eq!(published_files(root.path()).len(), instances.len());

        let mut remaining = instances.clone();
        for path in &paths {
            let content: Instance = serde_json::from_slice(&fs::read(path).unwrap()).unwrap();
            let pos = remaining.iter().position(|i| *i == content).unwrap();
            remaining.remove(pos);
        }
        assert!(remaining.is_empty());
    }

    #[test]
    fn test_collision_gets_numeric_suffix() {
        let root = tempdir().unwrap();
        let dir = BackupDirectory::open(root.path());
        let d = descriptor("", "secrets");
        let instance = json!({"metadata": {"name": "token", "namespace": "ns"}});

        let first = dir.write(&d, &instance).unwrap();
        let second = dir.write(&d, &instance).unwrap();

        assert_eq!(first.file_name().unwrap(), "core.v1.secrets.ns.token.json");
        assert_eq!(second.file_name().unwrap(), "core.v1.secrets.ns.token-1.json");
    }

    #[test]
    fn test_unpublished_file_never_appears_under_final_name() {
        let root = tempdir().unwrap();
        let dir = BackupDirectory::open(root.path());
        let d = descriptor("example.io", "widgets");
        let instance = json!({"metadata": {"name": "w1"}, "spec": {"size": 3}});

        let staged = dir.stage(&d, &instance).unwrap();
        let intended = staged.intended_path();
        let staging = staged.staging_path().to_path_buf();

        assert!(staging.exists());
        assert!(!intended.exists());
        assert!(staging
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(STAGING_PREFIX));

        // Interrupted before publishing
        drop(staged);

        assert!(!intended.exists());
        assert!(published_files(root.path()).is_empty());
    }

    #[test]
    fn test_create_temp_failure_is_reported() {
        let root = tempdir().unwrap();
        let dir = BackupDirectory::open(root.path().join("missing"));
        let d = descriptor("example.io", "widgets");

        let err = dir.write(&d, &json!({"metadata": {"name": "w1"}})).unwrap_err();
        match err {
            Error::Persist { stage, target, .. } => {
                assert_eq!(stage, PersistStage::CreateTemp);
                assert_eq!(target, "example.io/v1/widgets w1");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_publish_into_removed_directory_fails_to_finalize() {
        let root = tempdir().unwrap();
        let backup = root.path().join("run");
        fs::create_dir(&backup).unwrap();
        let dir = BackupDirectory::open(&backup);
        let d = descriptor("example.io", "widgets");

        let staged = dir.stage(&d, &json!({"metadata": {"name": "w1"}})).unwrap();
        fs::remove_dir_all(&backup).unwrap();

        match staged.publish().unwrap_err() {
            Error::Persist { stage, target, .. } => {
                assert_eq!(stage, PersistStage::Finalize);
                assert_eq!(target, "example.io/v1/widgets w1");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!backup.exists());
    }

    #[test]
    fn test_create_under_a_file_names_the_output_directory() {
        let root = tempdir().unwrap();
        let blocker = root.path().join("not-a-dir");
        fs::write(&blocker, b"occupied").unwrap();

        let err = BackupDirectory::create(&blocker, "cluster-backup").unwrap_err();
        assert_eq!(err.stage_label(), "persist");
        match &err {
            Error::Persist { stage, target, .. } => {
                assert_eq!(*stage, PersistStage::CreateDirectory);
                assert_eq!(target, &blocker.display().to_string());
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.to_string().starts_with("error creating backup directory for "));
    }
}
