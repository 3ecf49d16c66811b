//! Driver over a granted local directory.

use crate::config::Settings;
use crate::drivers::TexelDriver;
use crate::error::TexelError;
use crate::files::FileCodec;
use crate::merge::group_by_path;
use crate::types::{Project, Texel};
use async_trait::async_trait;
use eyre::{Context, Result};
use futures::future::try_join_all;
use futures::{StreamExt, TryStreamExt};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use regex::Regex;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, LazyLock};

/// Ignore file read in every scanned directory.
const IGNORE_FILE: &str = ".gitignore";

/// Names that are never scanned: hidden entries and build/output/vendor directories.
static DENIED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\..*|out|build|dist|target|node_modules|vendor)$").expect("valid denied name regex")
});

/// A directory the user granted access to.
///
/// This is session state owned by the caller; the driver never looks it up on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryGrant {
    /// Display name, also used as project id
    pub name: String,
    pub root: PathBuf,
}

impl DirectoryGrant {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    /// Grant a directory under its own file name.
    pub fn from_path(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let name = root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());
        Self { name, root }
    }
}

/// A directory waiting to be scanned.
struct DirTask {
    dir: PathBuf,
    /// Path relative to the grant root, `/` separated, empty for the root
    rel: String,
    depth: usize,
    /// Ignore rules of all ancestors
    ignores: Vec<Arc<Gitignore>>,
}

/// Local directory driver.
pub struct DirectoryDriver {
    grant: DirectoryGrant,
    codec: Arc<FileCodec>,
    max_depth: usize,
    concurrency: usize,
}

impl DirectoryDriver {
    /// Create a driver for a granted directory.
    pub fn new(grant: DirectoryGrant, settings: &Settings, codec: Arc<FileCodec>) -> Result<Self> {
        if !grant.root.is_dir() {
            eyre::bail!(
                "The directory share for {:?} is missing at {}",
                grant.name,
                grant.root.display()
            );
        }

        Ok(Self {
            grant,
            codec,
            max_depth: settings.max_scan_depth.max(1),
            concurrency: settings.scan_concurrency.max(1),
        })
    }

    fn this_project(&self) -> Project {
        Project::leaf(&self.grant.name, &self.grant.name)
    }

    fn check_id(&self, id: &str) -> Result<()> {
        if id != self.grant.name {
            return Err(eyre::eyre!(TexelError::NotFound(format!("directory {:?} is not shared", id))));
        }
        Ok(())
    }

    /// Walk the tree level by level, scanning up to `concurrency` directories at once.
    async fn scan(&self) -> Result<Vec<Texel>> {
        let mut texels = Vec::new();
        let mut level = vec![DirTask {
            dir: self.grant.root.clone(),
            rel: String::new(),
            depth: 1,
            ignores: Vec::new(),
        }];

        while !level.is_empty() {
            let results: Vec<(Vec<Texel>, Vec<DirTask>)> = futures::stream::iter(level)
                .map(|task| self.scan_dir(task))
                .buffer_unordered(self.concurrency)
                .try_collect()
                .await?;

            level = Vec::new();
            for (dir_texels, subdirs) in results {
                texels.extend(dir_texels);
                level.extend(subdirs);
            }
        }

        Ok(texels)
    }

    /// Parse the translation files of one directory and return its subdirectories.
    async fn scan_dir(&self, task: DirTask) -> Result<(Vec<Texel>, Vec<DirTask>)> {
        let mut ignores = task.ignores;
        ignores.push(load_ignore(&task.dir).await);

        let mut entries = tokio::fs::read_dir(&task.dir)
            .await
            .with_context(|| format!("Failed to read directory {}", task.dir.display()))?;

        let mut files = Vec::new();
        let mut subdirs = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("Failed to read directory {}", task.dir.display()))?
        {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if DENIED_NAME.is_match(&name) {
                continue;
            }

            let file_type = entry
                .file_type()
                .await
                .with_context(|| format!("Failed to stat {}", entry.path().display()))?;
            let path = entry.path();
            if ignores.iter().any(|rules| rules.matched(&path, file_type.is_dir()).is_ignore()) {
                log::debug!("ignored {} because of {}", path.display(), IGNORE_FILE);
                continue;
            }

            let rel = if task.rel.is_empty() {
                name
            } else {
                format!("{}/{}", task.rel, name)
            };

            if file_type.is_dir() {
                if task.depth < self.max_depth {
                    subdirs.push(DirTask {
                        dir: path,
                        rel,
                        depth: task.depth + 1,
                        ignores: ignores.clone(),
                    });
                }
            } else if file_type.is_file() && self.codec.is_l10n_file(&rel) {
                files.push((path, rel));
            }
        }

        let parsed = try_join_all(files.iter().map(|(path, rel)| async move {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            self.codec.parse_file(rel, &content)
        }))
        .await?;

        Ok((parsed.into_iter().flatten().collect(), subdirs))
    }

    /// Resolve a `/` separated relative path inside the grant.
    fn resolve(&self, rel: &str) -> Result<PathBuf> {
        let rel_path = Path::new(rel);
        if rel_path.components().any(|c| !matches!(c, Component::Normal(_))) {
            eyre::bail!("path {:?} escapes the shared directory", rel);
        }
        Ok(self.grant.root.join(rel_path))
    }

    async fn write_file(&self, path: String, changes: Vec<Texel>) -> Result<()> {
        let file = self.resolve(&path)?;
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let existing = match tokio::fs::read_to_string(&file).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e).with_context(|| format!("Failed to read {}", file.display())),
        };

        let content = self.codec.update_file(&path, &existing, &changes)?;
        tokio::fs::write(&file, content)
            .await
            .with_context(|| format!("Failed to write {}", file.display()))?;
        log::debug!("applied {} change(s) to {}", changes.len(), file.display());
        Ok(())
    }
}

/// Load the ignore rules of a directory. A missing ignore file means no rules.
async fn load_ignore(dir: &Path) -> Arc<Gitignore> {
    let path = dir.join(IGNORE_FILE);
    let mut builder = GitignoreBuilder::new(dir);

    match tokio::fs::read_to_string(&path).await {
        Ok(content) => {
            for line in content.lines() {
                if let Err(e) = builder.add_line(Some(path.clone()), line) {
                    log::warn!("couldn't parse rule {:?} in {}: {}", line, path.display(), e);
                }
            }
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => log::warn!("couldn't read ignore file {}: {}", path.display(), e),
    }

    match builder.build() {
        Ok(rules) => Arc::new(rules),
        Err(e) => {
            log::warn!("couldn't build ignore rules for {}: {}", path.display(), e);
            Arc::new(Gitignore::empty())
        }
    }
}

#[async_trait]
impl TexelDriver for DirectoryDriver {
    async fn project(&self, id: &str) -> Result<Project> {
        self.check_id(id)?;
        Ok(self.this_project())
    }

    async fn projects(&self, parent: Option<&str>) -> Result<Vec<Project>> {
        match parent {
            Some(_) => Ok(Vec::new()),
            None => Ok(vec![self.this_project()]),
        }
    }

    async fn list(&self, id: &str) -> Result<Vec<Texel>> {
        self.check_id(id)?;
        self.scan()
            .await
            .wrap_err_with(|| format!("Failed to scan {}", self.grant.root.display()))
    }

    async fn update(&self, id: &str, changes: Vec<Texel>) -> Result<()> {
        self.check_id(id)?;
        let groups = group_by_path(&self.codec, changes)?;
        try_join_all(groups.into_iter().map(|(path, path_changes)| self.write_file(path, path_changes))).await?;
        Ok(())
    }
}
