//! Texel: localization records in JSON/YAML files, read and written through drivers.
//!
//! A texel is one text element identified by domain, key and locale. Drivers
//! read texels from a remote repository, a local directory or the pending
//! change store, and write batches of edits back.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use texel::{DirectoryGrant, DriverConfig, FileCodec, Settings, Texel, TexelDriver, create_driver};
//!
//! # async fn run() -> eyre::Result<()> {
//! let codec = Arc::new(FileCodec::with_default_locales()?);
//! let config = DriverConfig::Directory(DirectoryGrant::from_path("./app"));
//! let driver = create_driver(config, &Settings::default(), codec)?;
//!
//! let texels = driver.list("app").await?;
//! println!("{} texels", texels.len());
//!
//! driver
//!     .update("app", vec![Texel::new("locales/common.json.dir", "greeting", "en", "Hello")])
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod cache;
mod error;
mod merge;
mod types;

pub mod config;
pub mod drivers;
pub mod files;
pub mod http;
pub mod locale;
pub mod session;

// Re-export public API
pub use cache::{Clock, ManualClock, RequestCache, SystemClock};
pub use config::Settings;
pub use drivers::{
    BitbucketDriver, ChangeDriver, DirectoryDriver, DirectoryGrant, Driver, DriverConfig, TexelDriver, create_driver,
};
pub use error::TexelError;
pub use files::{FileCodec, PathInfo, PathPattern};
pub use merge::{group_by_path, merge_texels, subtract_texels};
pub use types::{Project, Texel, TexelId};
