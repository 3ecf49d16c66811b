//! Storage drivers.
//!
//! Every backend implements [`TexelDriver`]. Project ids are opaque and only
//! meaningful to the driver that issued them.

use crate::config::Settings;
use crate::files::FileCodec;
use crate::types::{Project, Texel};
use async_trait::async_trait;
use eyre::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

pub mod bitbucket;
pub mod change;
pub mod directory;

pub use bitbucket::BitbucketDriver;
pub use change::ChangeDriver;
pub use directory::{DirectoryDriver, DirectoryGrant};

/// Uniform access to a storage backend.
#[async_trait]
pub trait TexelDriver: Send + Sync {
    /// Return the project with the given id.
    async fn project(&self, id: &str) -> Result<Project>;

    /// List child projects of `parent`, or the root projects.
    async fn projects(&self, parent: Option<&str>) -> Result<Vec<Project>>;

    /// List all texels of a leaf project.
    async fn list(&self, id: &str) -> Result<Vec<Texel>>;

    /// Apply changes, tombstones included, as one logical write.
    async fn update(&self, id: &str, changes: Vec<Texel>) -> Result<()>;
}

/// Backend selection together with what the backend needs to connect.
#[derive(Debug, Clone)]
pub enum DriverConfig {
    /// Remote Bitbucket repositories, authorized by an access token.
    Bitbucket { token: String },
    /// A granted local directory.
    Directory(DirectoryGrant),
    /// The local pending change store.
    Change { prefix: String, database: PathBuf },
}

/// A driver of any backend.
pub enum Driver {
    Bitbucket(BitbucketDriver),
    Directory(DirectoryDriver),
    Change(ChangeDriver),
}

impl Driver {
    fn inner(&self) -> &dyn TexelDriver {
        match self {
            Driver::Bitbucket(driver) => driver,
            Driver::Directory(driver) => driver,
            Driver::Change(driver) => driver,
        }
    }
}

/// Create the driver described by `config`.
pub fn create_driver(config: DriverConfig, settings: &Settings, codec: Arc<FileCodec>) -> Result<Driver> {
    match config {
        DriverConfig::Bitbucket { token } => Ok(Driver::Bitbucket(BitbucketDriver::new(token, settings, codec))),
        DriverConfig::Directory(grant) => {
            let driver = DirectoryDriver::new(grant, settings, codec).context("Failed to open directory driver")?;
            Ok(Driver::Directory(driver))
        }
        DriverConfig::Change { prefix, database } => {
            let driver = ChangeDriver::open(prefix, &database).context("Failed to open change store")?;
            Ok(Driver::Change(driver))
        }
    }
}

#[async_trait]
impl TexelDriver for Driver {
    async fn project(&self, id: &str) -> Result<Project> {
        self.inner().project(id).await
    }

    async fn projects(&self, parent: Option<&str>) -> Result<Vec<Project>> {
        self.inner().projects(parent).await
    }

    async fn list(&self, id: &str) -> Result<Vec<Texel>> {
        self.inner().list(id).await
    }

    async fn update(&self, id: &str, changes: Vec<Texel>) -> Result<()> {
        self.inner().update(id, changes).await
    }
}
