//! Remote driver tests against a scripted API.

mod common;

use common::*;
use serde_json::json;
use std::time::Duration;
use texel::{Project, Texel, TexelDriver, TexelError};

const DOMAIN: &str = "locales/common.json.dir";

/// Feature branch with an English file (partly also on main) and a German
/// file only on the branch. The listing is split over two pages.
fn setup_branch_files(env: &RemoteEnv) {
    let http = &env.http;
    http.json(
        "repositories/team/app/src/f1/",
        json!({
            "values": [
                {"type": "commit_file", "path": "locales/en/common.json"},
                {"type": "commit_file", "path": "README.json5"},
                {"type": "commit_directory", "path": "locales/en"},
            ],
            "next": format!("{}/page/2", API_BASE),
        }),
    );
    http.json(
        "page/2",
        json!({"values": [{"type": "commit_file", "path": "locales/de/common.json"}]}),
    );
    http.route(
        "repositories/team/app/src/f1/locales/en/common.json",
        200,
        r#"{"greeting": "Hello", "farewell": "Bye"}"#,
    );
    http.route(
        "repositories/team/app/src/f1/locales/de/common.json",
        200,
        r#"{"greeting": "Hallo"}"#,
    );
    http.route(
        "repositories/team/app/src/m1/locales/en/common.json",
        200,
        r#"{"greeting": "Hi"}"#,
    );
}

// ============================================================================
// Projects
// ============================================================================

#[tokio::test]
async fn test_root_projects_are_reversed_repositories() {
    let env = RemoteEnv::new();
    env.http.json(
        "repositories",
        json!({
            "values": [{"full_name": "team/a"}, {"full_name": "team/b"}],
            "next": format!("{}/page/repos", API_BASE),
        }),
    );
    env.http.json("page/repos", json!({"values": [{"full_name": "team/c"}]}));

    let projects = env.driver.projects(None).await.unwrap();

    let ids: Vec<&str> = projects.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["team/c", "team/b", "team/a"]);
    assert!(projects.iter().all(|p| !p.leaf));
}

#[tokio::test]
async fn test_branches_put_mainline_first() {
    let env = RemoteEnv::with_repository();
    env.http.json(
        "repositories/team/app/refs/branches",
        json!({
            "values": [
                branch_ref("team/app", "main", "m1"),
                branch_ref("team/app", "dev", "d1"),
                branch_ref("team/app", "feature", "f1"),
            ],
        }),
    );

    let projects = env.driver.projects(Some("team/app")).await.unwrap();

    let ids: Vec<&str> = projects.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["team/app/main", "team/app/feature", "team/app/dev"]);
    assert!(projects.iter().all(|p| p.leaf));
    assert_eq!(projects[0].parent.as_ref().unwrap().id, "team/app");
}

#[tokio::test]
async fn test_project_by_id() {
    let env = RemoteEnv::with_repository();
    env.http.json("repositories/team/app", json!({"full_name": "team/app"}));

    let repository = env.driver.project("team/app").await.unwrap();
    assert_eq!(repository, Project::container("team/app", "team/app"));

    let branch = env.driver.project("team/app/feature").await.unwrap();
    assert_eq!(
        branch,
        Project::leaf("team/app/feature", "feature").with_parent(Project::container("team/app", "team/app"))
    );
}

#[tokio::test]
async fn test_invalid_ids_fail_without_requests() {
    let env = RemoteEnv::new();

    let err = env.driver.project("app").await.unwrap_err();
    assert!(matches!(TexelError::find(&err), Some(TexelError::InvalidId(_))));

    let err = env.driver.list("team/app").await.unwrap_err();
    assert!(matches!(TexelError::find(&err), Some(TexelError::InvalidId(_))));

    let err = env.driver.projects(Some("team/app/main")).await.unwrap_err();
    assert!(matches!(TexelError::find(&err), Some(TexelError::InvalidId(_))));

    let err = env.driver.update("not-an-id", Vec::new()).await.unwrap_err();
    assert!(matches!(TexelError::find(&err), Some(TexelError::InvalidId(_))));

    let err = env
        .driver
        .update("team/app", vec![Texel::new(DOMAIN, "greeting", "en", "Hi")])
        .await
        .unwrap_err();
    assert!(matches!(TexelError::find(&err), Some(TexelError::InvalidId(_))));

    assert!(env.http.gets().is_empty());
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn test_list_mainline_returns_all_texels() {
    let env = RemoteEnv::with_repository();
    env.http.json(
        "repositories/team/app/src/m1/",
        json!({"values": [{"type": "commit_file", "path": "locales/en/common.json"}]}),
    );
    setup_branch_files(&env);

    let texels = env.driver.list("team/app/main").await.unwrap();

    assert_eq!(texels, vec![Texel::new(DOMAIN, "greeting", "en", "Hi")]);
}

#[tokio::test]
async fn test_list_branch_excludes_mainline_identities() {
    let env = RemoteEnv::with_repository();
    setup_branch_files(&env);

    let texels = sorted(env.driver.list("team/app/feature").await.unwrap());

    // greeting/en exists on main with another value and is left out as well
    assert_eq!(
        texels,
        vec![
            Texel::new(DOMAIN, "farewell", "en", "Bye"),
            Texel::new(DOMAIN, "greeting", "de", "Hallo"),
        ]
    );
    assert_eq!(env.http.get_count("page/2"), 1);
    assert_eq!(env.http.get_count("repositories/team/app/src/m1/locales/de/common.json"), 1);
}

#[tokio::test]
async fn test_list_missing_file_has_no_texels() {
    let env = RemoteEnv::with_repository();
    env.http.json(
        "repositories/team/app/src/m1/",
        json!({"values": [{"type": "commit_file", "path": "locales/fr/common.json"}]}),
    );

    let texels = env.driver.list("team/app/main").await.unwrap();

    assert!(texels.is_empty());
}

#[tokio::test]
async fn test_list_fails_on_bad_status() {
    let env = RemoteEnv::with_repository();
    env.http.route("repositories/team/app/refs/branches/feature", 500, "boom");

    let err = env.driver.list("team/app/feature").await.unwrap_err();

    match TexelError::find(&err) {
        Some(TexelError::Http { url, status }) => {
            assert_eq!(*status, 500);
            assert!(!url.contains("access_token"));
        }
        other => panic!("Expected HTTP error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_list_fails_on_unparsable_file() {
    let env = RemoteEnv::with_repository();
    env.http.json(
        "repositories/team/app/src/m1/",
        json!({"values": [{"type": "commit_file", "path": "locales/en/broken.json"}]}),
    );
    env.http.route("repositories/team/app/src/m1/locales/en/broken.json", 200, "{not json");

    let err = env.driver.list("team/app/main").await.unwrap_err();

    assert!(matches!(TexelError::find(&err), Some(TexelError::Parse { .. })));
}

// ============================================================================
// Caching
// ============================================================================

#[tokio::test]
async fn test_requests_are_cached_until_ttl() {
    let env = RemoteEnv::with_repository();
    let path = "repositories/team/app/refs/branches/feature";

    env.driver.project("team/app/feature").await.unwrap();
    env.driver.project("team/app/feature").await.unwrap();
    assert_eq!(env.http.get_count(path), 1);

    env.clock.advance(Duration::from_secs(6));
    env.driver.project("team/app/feature").await.unwrap();
    assert_eq!(env.http.get_count(path), 2);
}

// ============================================================================
// Updates
// ============================================================================

#[tokio::test]
async fn test_update_commits_merged_files() {
    let env = RemoteEnv::with_repository();
    setup_branch_files(&env);

    env.driver
        .update(
            "team/app/feature",
            vec![
                Texel::new(DOMAIN, "farewell", "en", "Goodbye"),
                Texel::tombstone(DOMAIN, "greeting", "en"),
                Texel::new(DOMAIN, "title", "fr", "Bonjour"),
            ],
        )
        .await
        .unwrap();

    let posts = env.http.posts();
    assert_eq!(posts.len(), 1);
    let (path, form) = &posts[0];
    assert_eq!(path, "repositories/team/app/src");
    assert_eq!(form.get("locales/en/common.json"), Some("{\n  \"farewell\": \"Goodbye\"\n}"));
    assert_eq!(form.get("locales/fr/common.json"), Some("{\n  \"title\": \"Bonjour\"\n}"));
    assert_eq!(form.get("branch"), Some("feature"));
    assert_eq!(form.get("parents"), Some("f1"));
    assert_eq!(form.get("message"), Some("Edited with Texel-Editor - unknown host"));
    assert_eq!(form.len(), 5);
}

#[tokio::test]
async fn test_update_keeps_untouched_value_types() {
    let env = RemoteEnv::with_repository();
    env.http.route(
        "repositories/team/app/src/f1/locales/en/app.yml",
        200,
        "count: 3\nenabled: true\ntitle: x\n",
    );

    env.driver
        .update(
            "team/app/feature",
            vec![Texel::new("locales/app.yml.dir", "title", "en", "y")],
        )
        .await
        .unwrap();

    let (_, form) = &env.http.posts()[0];
    assert_eq!(form.get("locales/en/app.yml"), Some("count: 3\nenabled: true\ntitle: y\n"));
}

#[tokio::test]
async fn test_update_clears_cache() {
    let env = RemoteEnv::with_repository();
    setup_branch_files(&env);
    let path = "repositories/team/app/refs/branches/feature";

    env.driver
        .update("team/app/feature", vec![Texel::new(DOMAIN, "farewell", "en", "Ciao")])
        .await
        .unwrap();
    assert_eq!(env.http.get_count(path), 1);

    env.driver.project("team/app/feature").await.unwrap();
    assert_eq!(env.http.get_count(path), 2);
}

#[tokio::test]
async fn test_update_reports_rejected_commit() {
    let env = RemoteEnv::with_repository();
    setup_branch_files(&env);
    env.http.fail_posts(409);

    let err = env
        .driver
        .update("team/app/feature", vec![Texel::new(DOMAIN, "farewell", "en", "Ciao")])
        .await
        .unwrap_err();

    assert!(matches!(TexelError::find(&err), Some(TexelError::Http { status: 409, .. })));
}

#[tokio::test]
async fn test_empty_update_sends_nothing() {
    let env = RemoteEnv::with_repository();

    env.driver.update("team/app/feature", Vec::new()).await.unwrap();

    assert!(env.http.gets().is_empty());
    assert!(env.http.posts().is_empty());
}

#[tokio::test]
async fn test_update_rejects_unknown_domain() {
    let env = RemoteEnv::with_repository();

    let err = env
        .driver
        .update("team/app/feature", vec![Texel::new("broken", "k", "en", "v")])
        .await
        .unwrap_err();

    assert!(matches!(TexelError::find(&err), Some(TexelError::MalformedDomain(_))));
    assert!(env.http.posts().is_empty());
}
