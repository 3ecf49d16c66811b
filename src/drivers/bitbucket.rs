//! Driver that uses the Bitbucket 2.0 API as backend.
//!
//! Ids are `workspace/repo` for repositories and `workspace/repo/branch`
//! for branches. The access token is passed as `access_token` query
//! parameter instead of a header, which keeps browser-style clients free of
//! preflight requests.

use crate::cache::{Clock, RequestCache, SystemClock};
use crate::config::Settings;
use crate::drivers::TexelDriver;
use crate::error::TexelError;
use crate::files::{FileCodec, L10N_FILE_EXTENSIONS};
use crate::http::{Accept, FormData, HttpClient, HttpResponse, ReqwestClient, redact};
use crate::merge::{group_by_path, subtract_texels};
use crate::types::{Project, Texel};
use async_trait::async_trait;
use eyre::{Context, Result};
use futures::future::try_join_all;
use futures::{Stream, TryStreamExt};
use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::pin::pin;
use std::sync::{Arc, LazyLock};

static REPOSITORY_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<repository>(?P<workspace>[^/]+)/(?P<name>[^/]+))$").expect("valid repository id regex"));
static BRANCH_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<repository>(?P<workspace>[^/]+)/(?P<name>[^/]+))/(?P<branch>.+)$").expect("valid branch id regex")
});

/// Page size requested from list endpoints.
const PAGE_LEN: &str = "100";

/// How deep the source listing descends.
const TREE_MAX_DEPTH: &str = "8";

const REPOSITORY_FIELDS: &[&str] = &["full_name"];
const REF_FIELDS: &[&str] = &["name", "target.hash", "target.repository.full_name"];
const TREE_ENTRY_FIELDS: &[&str] = &["type", "path"];

#[derive(Debug, Clone, Deserialize)]
struct Repository {
    full_name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Ref {
    name: String,
    target: Target,
}

#[derive(Debug, Clone, Deserialize)]
struct Target {
    hash: String,
    repository: Repository,
}

#[derive(Debug, Clone, Deserialize)]
struct BranchModel {
    development: BranchModelEntry,
}

#[derive(Debug, Clone, Deserialize)]
struct BranchModelEntry {
    branch: Ref,
}

#[derive(Debug, Clone, Deserialize)]
struct TreeEntry {
    #[serde(rename = "type")]
    kind: String,
    path: String,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    values: Vec<T>,
    next: Option<String>,
}

/// Remote repository driver.
pub struct BitbucketDriver {
    token: String,
    base_url: String,
    commit_host: String,
    client: Arc<dyn HttpClient>,
    cache: RequestCache,
    codec: Arc<FileCodec>,
}

impl BitbucketDriver {
    /// Create a driver talking to the configured API over reqwest.
    pub fn new(token: impl Into<String>, settings: &Settings, codec: Arc<FileCodec>) -> Self {
        Self::with_client(token, settings, codec, Arc::new(ReqwestClient::new()), Arc::new(SystemClock))
    }

    /// Create a driver with an explicit transport and cache clock.
    pub fn with_client(
        token: impl Into<String>,
        settings: &Settings,
        codec: Arc<FileCodec>,
        client: Arc<dyn HttpClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            token: token.into(),
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            commit_host: settings.commit_host().to_string(),
            client,
            cache: RequestCache::new(settings.cache_ttl(), clock),
            codec,
        }
    }

    /// Build an API url with the access token appended.
    fn url(&self, path: &str, params: &[(&str, String)]) -> Result<String> {
        let mut url = reqwest::Url::parse(&format!("{}/{}", self.base_url, path))
            .with_context(|| format!("Invalid API url for {}", path))?;
        url.query_pairs_mut()
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())))
            .append_pair("access_token", &self.token);
        Ok(url.into())
    }

    async fn get(&self, url: &str, accept: Accept) -> Result<HttpResponse> {
        let response = self
            .cache
            .get_or_fetch(url, || {
                log::debug!("GET {}", redact(url));
                self.client.get(url, accept)
            })
            .await?;
        check_status(url, response)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.get(url, Accept::Json).await?;
        serde_json::from_str(&response.body).with_context(|| format!("Failed to decode response of {}", redact(url)))
    }

    async fn post(&self, url: &str, form: FormData) -> Result<HttpResponse> {
        log::debug!("POST {}", redact(url));
        let result = self.client.post_form(url, form).await;
        self.cache.clear().await;
        check_status(url, result?)
    }

    /// Iterate a paged result lazily, one request per consumed page.
    fn pages<T>(&self, url: String) -> impl Stream<Item = Result<Vec<T>>> + Send + '_
    where
        T: DeserializeOwned + Send + 'static,
    {
        futures::stream::try_unfold(Some(url), move |next: Option<String>| async move {
            match next {
                None => Ok(None),
                Some(url) => self
                    .get_json::<Page<T>>(&url)
                    .await
                    .map(|page| Some((page.values, page.next))),
            }
        })
    }

    fn repositories(&self) -> Result<impl Stream<Item = Result<Vec<Repository>>> + Send + '_> {
        let url = self.url(
            "repositories",
            &[
                ("role", "member".to_string()),
                ("pagelen", PAGE_LEN.to_string()),
                ("fields", paged_fields(REPOSITORY_FIELDS)),
            ],
        )?;
        Ok(self.pages(url))
    }

    async fn repository(&self, repository_id: &str) -> Result<Repository> {
        let url = self.url(
            &format!("repositories/{}", repository_id),
            &[("fields", REPOSITORY_FIELDS.join(","))],
        )?;
        self.get_json(&url).await
    }

    fn branches(&self, repository_id: &str) -> Result<impl Stream<Item = Result<Vec<Ref>>> + Send + '_> {
        let url = self.url(
            &format!("repositories/{}/refs/branches", repository_id),
            &[("pagelen", PAGE_LEN.to_string()), ("fields", paged_fields(REF_FIELDS))],
        )?;
        Ok(self.pages(url))
    }

    async fn branch(&self, branch_id: &str) -> Result<Ref> {
        let caps = BRANCH_ID
            .captures(branch_id)
            .ok_or_else(|| eyre::eyre!(TexelError::InvalidId(branch_id.to_string())))?;
        let url = self.url(
            &format!("repositories/{}/refs/branches/{}", &caps["repository"], &caps["branch"]),
            &[("fields", REF_FIELDS.join(","))],
        )?;
        self.get_json(&url).await
    }

    async fn branch_model(&self, repository_id: &str) -> Result<BranchModel> {
        let fields = REF_FIELDS
            .iter()
            .map(|field| format!("development.branch.{}", field))
            .collect::<Vec<_>>()
            .join(",");
        let url = self.url(
            &format!("repositories/{}/branching-model", repository_id),
            &[("fields", fields)],
        )?;
        self.get_json(&url).await
    }

    /// Translation file candidates at a commit.
    fn files(&self, repository_id: &str, commit: &str) -> Result<impl Stream<Item = Result<Vec<TreeEntry>>> + Send + '_> {
        let filter = L10N_FILE_EXTENSIONS
            .iter()
            .map(|ext| format!("path ~ \".{}\"", ext))
            .collect::<Vec<_>>()
            .join(" OR ");
        let url = self.url(
            &format!("repositories/{}/src/{}/", repository_id, commit),
            &[
                ("q", format!("type = \"commit_file\" AND ({})", filter)),
                ("max_depth", TREE_MAX_DEPTH.to_string()),
                ("pagelen", PAGE_LEN.to_string()),
                ("fields", paged_fields(TREE_ENTRY_FIELDS)),
            ],
        )?;
        Ok(self.pages(url))
    }

    async fn read(&self, repository_id: &str, commit: &str, path: &str) -> Result<String> {
        let url = self.url(&format!("repositories/{}/src/{}/{}", repository_id, commit, path), &[])?;
        Ok(self.get(&url, Accept::Text).await?.body)
    }

    /// Read a file at a commit. A missing file is empty.
    async fn read_or_empty(&self, repository_id: &str, commit: &str, path: &str) -> Result<String> {
        match self.read(repository_id, commit, path).await {
            Ok(content) => Ok(content),
            Err(e) if TexelError::is_not_found(&e) => Ok(String::new()),
            Err(e) => Err(e.wrap_err(format!(
                "could not read texels in {:?} at path {:?}",
                repository_id, path
            ))),
        }
    }

    /// Read a file and parse it. A missing file has no texels.
    async fn read_texels(&self, repository_id: &str, commit: &str, path: &str) -> Result<Vec<Texel>> {
        let content = self.read_or_empty(repository_id, commit, path).await?;
        self.codec
            .parse_file(path, &content)
            .wrap_err_with(|| format!("could not read texels in {:?} at path {:?}", repository_id, path))
    }

    /// Texels of a file on a branch, minus those already on the mainline.
    async fn branch_texels(&self, repository_id: &str, head: &str, mainline: Option<&str>, path: &str) -> Result<Vec<Texel>> {
        match mainline {
            None => self.read_texels(repository_id, head, path).await,
            Some(mainline) => {
                let (branch_texels, main_texels) = futures::try_join!(
                    self.read_texels(repository_id, head, path),
                    self.read_texels(repository_id, mainline, path),
                )?;
                Ok(subtract_texels(branch_texels, &main_texels))
            }
        }
    }
}

fn check_status(url: &str, response: HttpResponse) -> Result<HttpResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(eyre::eyre!(TexelError::Http {
            url: redact(url).to_string(),
            status: response.status,
        }))
    }
}

fn paged_fields(fields: &[&str]) -> String {
    std::iter::once("next".to_string())
        .chain(fields.iter().map(|field| format!("values.{}", field)))
        .collect::<Vec<_>>()
        .join(",")
}

fn repository_to_project(repository: &Repository) -> Project {
    Project::container(&repository.full_name, &repository.full_name)
}

fn ref_to_project(branch: &Ref) -> Project {
    Project::leaf(format!("{}/{}", branch.target.repository.full_name, branch.name), &branch.name)
        .with_parent(repository_to_project(&branch.target.repository))
}

#[async_trait]
impl TexelDriver for BitbucketDriver {
    async fn project(&self, id: &str) -> Result<Project> {
        if REPOSITORY_ID.is_match(id) {
            return Ok(repository_to_project(&self.repository(id).await?));
        }

        if BRANCH_ID.is_match(id) {
            return Ok(ref_to_project(&self.branch(id).await?));
        }

        Err(eyre::eyre!(TexelError::InvalidId(id.to_string())))
    }

    async fn projects(&self, parent: Option<&str>) -> Result<Vec<Project>> {
        let Some(id) = parent else {
            let repositories: Vec<Repository> = self.repositories()?.try_concat().await?;
            return Ok(repositories.iter().rev().map(repository_to_project).collect());
        };

        if !REPOSITORY_ID.is_match(id) {
            return Err(eyre::eyre!(TexelError::InvalidId(id.to_string())));
        }

        let (branches, model) = futures::try_join!(self.branches(id)?.try_concat(), self.branch_model(id))?;
        let mainline = &model.development.branch.name;

        let mut projects: Vec<Project> = branches.iter().filter(|b| &b.name == mainline).map(ref_to_project).collect();
        projects.extend(branches.iter().rev().filter(|b| &b.name != mainline).map(ref_to_project));
        Ok(projects)
    }

    async fn list(&self, id: &str) -> Result<Vec<Texel>> {
        let repository_id = BRANCH_ID
            .captures(id)
            .map(|caps| caps["repository"].to_string())
            .ok_or_else(|| eyre::eyre!(TexelError::InvalidId(id.to_string())))?;

        let (branch, model) = futures::try_join!(self.branch(id), self.branch_model(&repository_id))?;
        let mainline = (branch.name != model.development.branch.name).then_some(model.development.branch.target.hash.as_str());

        let mut paths = Vec::new();
        let mut pages = pin!(self.files(&repository_id, &branch.target.hash)?);
        while let Some(page) = pages.try_next().await? {
            paths.extend(
                page.into_iter()
                    .filter(|entry| entry.kind == "commit_file" && self.codec.is_l10n_file(&entry.path))
                    .map(|entry| entry.path),
            );
        }

        log::debug!("listing {} translation files of {}", paths.len(), id);
        let results = try_join_all(
            paths
                .iter()
                .map(|path| self.branch_texels(&repository_id, &branch.target.hash, mainline, path)),
        )
        .await?;

        Ok(results.into_iter().flatten().collect())
    }

    async fn update(&self, id: &str, changes: Vec<Texel>) -> Result<()> {
        if !BRANCH_ID.is_match(id) {
            return Err(eyre::eyre!(TexelError::InvalidId(id.to_string())));
        }
        if changes.is_empty() {
            log::debug!("nothing to commit on {}", id);
            return Ok(());
        }

        let branch = self.branch(id).await?;
        let repository_id = &branch.target.repository.full_name;
        let head = &branch.target.hash;

        let groups = group_by_path(&self.codec, changes)?;
        let files = try_join_all(groups.into_iter().map(|(path, path_changes)| async move {
            let existing = self.read_or_empty(repository_id, head, &path).await?;
            let content = self
                .codec
                .update_file(&path, &existing, &path_changes)
                .wrap_err_with(|| format!("could not update {:?} in {:?}", path, repository_id))?;
            Ok::<_, eyre::Report>((path, content))
        }))
        .await?;

        let file_count = files.len();
        let mut commit = FormData::new();
        for (path, content) in files {
            commit.set(path, content);
        }

        // set last, a file could technically be named like one of these
        commit.set("branch", &branch.name);
        commit.set("parents", head);
        commit.set("message", format!("Edited with Texel-Editor - {}", self.commit_host));

        log::info!("committing {} file(s) to {}", file_count, id);
        let url = self.url(&format!("repositories/{}/src", repository_id), &[])?;
        self.post(&url, commit)
            .await
            .wrap_err_with(|| format!("Failed to commit to {}", id))?;
        Ok(())
    }
}
