//! Error types for cluster snapshots

use std::fmt;

use thiserror::Error;

/// Result type alias using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Stage of publishing a backup file that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistStage {
    /// Creating the backup directory under the output directory
    CreateDirectory,
    /// Creating the staging file inside the backup directory
    CreateTemp,
    /// Converting the instance to JSON
    Serialize,
    /// Writing the document bytes
    Write,
    /// Syncing and publishing under the final name
    Finalize,
}

impl fmt::Display for PersistStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            PersistStage::CreateDirectory => "error creating backup directory",
            PersistStage::CreateTemp => "error creating temp file",
            PersistStage::Serialize => "error converting item to JSON",
            PersistStage::Write => "error writing JSON to file",
            PersistStage::Finalize => "error finalizing file",
        };
        f.write_str(stage)
    }
}

/// Snapshot error types
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Kubeconfig could not be read or resolved
    #[error("Kubeconfig error: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    /// No usable configuration found in the environment
    #[error("Unable to infer cluster configuration: {0}")]
    InferConfig(#[from] kube::config::InferConfigError),

    /// The control plane could not be reached or refused our credentials
    #[error("Cannot reach control plane at {endpoint}")]
    Connection {
        endpoint: String,
        #[source]
        source: kube::Error,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Resource discovery failed
    #[error("Discovery failed: {context}")]
    Discovery {
        context: String,
        #[source]
        source: Box<Error>,
    },

    /// Listing the instances of one resource kind failed
    #[error("Failed to list instances of {resource}")]
    Fetch {
        resource: String,
        #[source]
        source: Box<Error>,
    },

    /// Persisting one instance failed
    #[error("{stage} for {target}")]
    Persist {
        stage: PersistStage,
        target: String,
        #[source]
        source: Box<Error>,
    },

    /// The traversal did not finish in time
    #[error("Backup did not complete within {0} seconds")]
    TimedOut(u64),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Wrap an error raised while discovering resources
    pub fn discovery(context: impl Into<String>, source: impl Into<Error>) -> Self {
        Error::Discovery {
            context: context.into(),
            source: Box::new(source.into()),
        }
    }

    /// Wrap an error raised while listing instances of a resource
    pub fn fetch(resource: impl Into<String>, source: impl Into<Error>) -> Self {
        Error::Fetch {
            resource: resource.into(),
            source: Box::new(source.into()),
        }
    }

    /// Wrap an error raised while persisting an instance
    pub fn persist(
        stage: PersistStage,
        target: impl Into<String>,
        source: impl Into<Error>,
    ) -> Self {
        Error::Persist {
            stage,
            target: target.into(),
            source: Box::new(source.into()),
        }
    }

    /// Label used for the failure metrics
    pub fn stage_label(&self) -> &'static str {
        match self {
            Error::Discovery { .. } => "discovery",
            Error::Fetch { .. } => "fetch",
            Error::Persist { .. } => "persist",
            Error::Connection { .. } | Error::Kubeconfig(_) | Error::InferConfig(_) => "connection",
            _ => "other",
        }
    }
}
