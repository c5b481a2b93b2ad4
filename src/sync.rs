//! Fixture synchronization.
//!
//! Pulls one sample entry per content type from the live API and replaces
//! the fixture directory with them, plus the baseline fixtures shipped in
//! the binary.

use crate::error::{FauxError, Result};
use crate::fixtures::FixtureSet;
use crate::interceptor::Interceptor;
use crate::remote::{ApiEndpoint, ContentSource, RemoteFetcher, DEFAULT_API_HOST};
use serde_json::Value;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Static fixtures copied into every freshly synced directory.
pub const BASELINE_FIXTURES: &[(&str, &str)] = &[
    ("space.json", include_str!("../baseline/space.json")),
    ("locales.json", include_str!("../baseline/locales.json")),
];

/// Settings for one sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub space_id: String,
    pub api_key: String,
    pub fixture_dir: PathBuf,
    pub preview: bool,
    pub api_host: String,
}

impl SyncConfig {
    pub fn new(
        space_id: impl Into<String>,
        api_key: impl Into<String>,
        fixture_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            space_id: space_id.into(),
            api_key: api_key.into(),
            fixture_dir: fixture_dir.into(),
            preview: false,
            api_host: DEFAULT_API_HOST.to_string(),
        }
    }

    /// Space id, API key and fixture directory must all be set.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.space_id.trim().is_empty() {
            missing.push("space_id");
        }
        if self.api_key.trim().is_empty() {
            missing.push("api_key");
        }
        if self.fixture_dir.as_os_str().to_string_lossy().trim().is_empty() {
            missing.push("fixture_dir");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(FauxError::Config(format!(
                "space_id, api_key and fixture_dir are all required (missing: {})",
                missing.join(", ")
            )))
        }
    }

    pub fn endpoint(&self) -> ApiEndpoint {
        ApiEndpoint::new(&self.space_id, &self.api_key)
            .with_host(&self.api_host)
            .with_preview(self.preview)
    }
}

/// Whether `path` is, or resolves to, a filesystem root.
fn is_filesystem_root(path: &Path) -> bool {
    let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    resolved.has_root() && resolved.parent().is_none()
}

/// Delete `path` and everything under it. A missing path is not an error.
///
/// Refuses to touch a filesystem root.
pub async fn remove_dir_recursive(path: &Path) -> Result<()> {
    if is_filesystem_root(path) {
        return Err(FauxError::UnsafePath(path.to_path_buf()));
    }
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(FauxError::io(path, e)),
    }
}

/// Empty `dir` and seed it with the baseline fixtures.
async fn prepare_dir(dir: &Path) -> Result<()> {
    remove_dir_recursive(dir).await?;
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| FauxError::io(dir, e))?;
    for (name, content) in BASELINE_FIXTURES {
        let path = dir.join(name);
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| FauxError::io(&path, e))?;
    }
    Ok(())
}

/// A content type id usable as a file stem.
fn is_plain_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn has_entries(response: &Value) -> bool {
    response
        .get("total")
        .and_then(Value::as_f64)
        .is_some_and(|total| total > 0.0)
}

/// Drives a sync run against a [`ContentSource`].
pub struct Synchronizer {
    source: Arc<dyn ContentSource>,
}

impl Synchronizer {
    pub fn new(source: Arc<dyn ContentSource>) -> Self {
        Self { source }
    }

    /// Fetch samples for every content type and rewrite the fixture
    /// directory.
    ///
    /// Stops `interceptor` before the first request goes out. Returns the
    /// fixtures written, baseline files excluded.
    pub async fn sync(&self, config: &SyncConfig, interceptor: &mut Interceptor) -> Result<FixtureSet> {
        config.validate()?;
        interceptor.unstub();

        let fetcher = RemoteFetcher::new(self.source.clone(), config.endpoint());
        info!(
            space_id = %config.space_id,
            preview = config.preview,
            "Detecting content types"
        );
        let types = fetcher.discover_content_types().await?;
        info!(count = types.len(), "Discovered content types");

        let samples = fetch_samples(&fetcher, types).await;

        prepare_dir(&config.fixture_dir).await?;
        for (name, entries) in &samples {
            let file_name = format!("{}.json", name);
            if BASELINE_FIXTURES.iter().any(|(baseline, _)| *baseline == file_name) {
                warn!(content_type = %name, "Sample replaces baseline fixture");
            }
            let path = config.fixture_dir.join(file_name);
            let body = serde_json::to_vec(entries).map_err(|e| FauxError::decode(name.as_str(), e))?;
            tokio::fs::write(&path, body)
                .await
                .map_err(|e| FauxError::io(&path, e))?;
            debug!(path = %path.display(), "Wrote fixture");
        }

        info!(
            fixtures = samples.len(),
            dir = %config.fixture_dir.display(),
            "Fixtures synced"
        );
        Ok(samples)
    }
}

/// One concurrent fetch per type. Failures and empty types are dropped.
async fn fetch_samples(fetcher: &RemoteFetcher, types: Vec<String>) -> FixtureSet {
    let mut tasks = JoinSet::new();
    for content_type in types {
        if !is_plain_name(&content_type) {
            warn!(content_type = %content_type, "Skipping content type with unusable id");
            continue;
        }
        let fetcher = fetcher.clone();
        tasks.spawn(async move {
            let result = fetcher.fetch_sample_entries(&content_type).await;
            (content_type, result)
        });
    }

    let mut samples = FixtureSet::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((content_type, Ok(entries))) => {
                if has_entries(&entries) {
                    info!(content_type = %content_type, "Found content type");
                    samples.insert(content_type, entries);
                } else {
                    debug!(content_type = %content_type, "No entries, skipping");
                }
            }
            Ok((content_type, Err(e))) => {
                warn!(content_type = %content_type, error = %e, "Failed to fetch sample, skipping");
            }
            Err(e) => warn!(error = %e, "Sample fetch task failed"),
        }
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Settings, SettingsLayer};
    use crate::interceptor::tests::RecordingHook;
    use crate::remote::tests::MockSource;
    use crate::transport::TransportHook;
    use serde_json::json;
    use tempfile::TempDir;

    fn listing(types: &[&str]) -> Value {
        let items: Vec<Value> = types.iter().map(|t| json!({"sys": {"id": t}})).collect();
        json!({ "items": items })
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn setup(types: &[&str]) -> (TempDir, SyncConfig, Arc<MockSource>) {
        let root = TempDir::new().unwrap();
        let config = SyncConfig::new("space", "key", root.path().join("fixtures"));
        let source = Arc::new(MockSource::default());
        source.respond(config.endpoint().content_types_url(), listing(types));
        (root, config, source)
    }

    #[test]
    fn test_validate_reports_missing_fields() {
        let config = SyncConfig::new("", "key", "");
        match config.validate() {
            Err(FauxError::Config(msg)) => {
                assert!(msg.ends_with("(missing: space_id, fixture_dir)"));
            }
            other => panic!("Expected Config error, got {other:?}"),
        }
        assert!(SyncConfig::new("s", "k", "dir").validate().is_ok());
    }

    #[tokio::test]
    async fn test_empty_api_key_touches_nothing() {
        let (_root, mut config, source) = setup(&["article"]);
        config.api_key = String::new();
        let mut interceptor = Interceptor::new(Arc::new(RecordingHook::default()));

        let result = Synchronizer::new(source.clone())
            .sync(&config, &mut interceptor)
            .await;
        assert!(matches!(result, Err(FauxError::Config(_))));
        assert_eq!(source.call_count(), 0);
        assert!(!config.fixture_dir.exists());
    }

    #[tokio::test]
    async fn test_empty_types_are_dropped() {
        let (_root, config, source) = setup(&["empty", "article"]);
        let endpoint = config.endpoint();
        source.respond(endpoint.sample_entries_url("empty"), json!({"total": 0, "items": []}));
        source.respond(
            endpoint.sample_entries_url("article"),
            json!({"total": 2, "items": [{"id": 1}]}),
        );
        let mut interceptor = Interceptor::new(Arc::new(RecordingHook::default()));

        let written = Synchronizer::new(source.clone())
            .sync(&config, &mut interceptor)
            .await
            .unwrap();
        assert_eq!(written.keys().collect::<Vec<_>>(), vec!["article"]);
        assert_eq!(
            file_names(&config.fixture_dir),
            vec!["article.json", "locales.json", "space.json"]
        );

        let on_disk: Value = serde_json::from_str(
            &std::fs::read_to_string(config.fixture_dir.join("article.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(on_disk["total"], 2);
        assert_eq!(source.call_count(), 3);
    }

    #[tokio::test]
    async fn test_failed_type_does_not_abort_sync() {
        let (_root, config, source) = setup(&["offline", "garbled", "author"]);
        let endpoint = config.endpoint();
        source.respond_garbage(endpoint.sample_entries_url("garbled"));
        source.respond(
            endpoint.sample_entries_url("author"),
            json!({"total": 1, "items": [{"name": "A"}]}),
        );
        let mut interceptor = Interceptor::new(Arc::new(RecordingHook::default()));

        let written = Synchronizer::new(source)
            .sync(&config, &mut interceptor)
            .await
            .unwrap();
        assert_eq!(written.len(), 1);
        assert!(written.contains_key("author"));
    }

    #[tokio::test]
    async fn test_previous_fixtures_are_replaced() {
        let (_root, config, source) = setup(&["article"]);
        source.respond(
            config.endpoint().sample_entries_url("article"),
            json!({"total": 1, "items": [{"id": 1}]}),
        );
        std::fs::create_dir_all(config.fixture_dir.join("nested")).unwrap();
        std::fs::write(config.fixture_dir.join("stale.json"), "{}").unwrap();
        std::fs::write(config.fixture_dir.join("nested/old.json"), "{}").unwrap();
        let mut interceptor = Interceptor::new(Arc::new(RecordingHook::default()));

        Synchronizer::new(source)
            .sync(&config, &mut interceptor)
            .await
            .unwrap();
        assert_eq!(
            file_names(&config.fixture_dir),
            vec!["article.json", "locales.json", "space.json"]
        );
    }

    #[tokio::test]
    async fn test_discovery_failure_keeps_existing_fixtures() {
        let root = TempDir::new().unwrap();
        let config = SyncConfig::new("space", "key", root.path().join("fixtures"));
        std::fs::create_dir_all(&config.fixture_dir).unwrap();
        std::fs::write(config.fixture_dir.join("article.json"), "{}").unwrap();
        let mut interceptor = Interceptor::new(Arc::new(RecordingHook::default()));

        let result = Synchronizer::new(Arc::new(MockSource::default()))
            .sync(&config, &mut interceptor)
            .await;
        assert!(matches!(result, Err(FauxError::Network { .. })));
        assert_eq!(file_names(&config.fixture_dir), vec!["article.json"]);
    }

    #[tokio::test]
    async fn test_sync_stops_active_interception() {
        let (root, config, source) = setup(&[]);
        let hook = Arc::new(RecordingHook::default());
        let mut interceptor = Interceptor::new(hook.clone());
        interceptor.stub(root.path()).unwrap();
        assert!(hook.is_installed());

        let written = Synchronizer::new(source)
            .sync(&config, &mut interceptor)
            .await
            .unwrap();
        assert!(written.is_empty());
        assert!(!interceptor.is_active());
        assert!(!hook.is_installed());
        assert_eq!(
            file_names(&config.fixture_dir),
            vec!["locales.json", "space.json"]
        );
    }

    #[tokio::test]
    async fn test_unusable_type_ids_are_skipped() {
        let (_root, config, source) = setup(&["../escape", "article"]);
        source.respond(
            config.endpoint().sample_entries_url("article"),
            json!({"total": 1, "items": [{}]}),
        );
        let mut interceptor = Interceptor::new(Arc::new(RecordingHook::default()));

        let written = Synchronizer::new(source.clone())
            .sync(&config, &mut interceptor)
            .await
            .unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(source.call_count(), 2);
    }

    #[tokio::test]
    async fn test_blank_fixture_dir_from_settings_file_is_rejected() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("Cargo.toml"), "[package]\n").unwrap();
        let layer =
            SettingsLayer::from_yaml("space_id: s\napi_key: k\nfixture_dir: \"\"\n").unwrap();
        let config = Settings::merge(&[layer], root.path()).sync_config();
        let source = Arc::new(MockSource::default());
        source.respond(config.endpoint().content_types_url(), listing(&[]));
        let mut interceptor = Interceptor::new(Arc::new(RecordingHook::default()));

        let result = Synchronizer::new(source.clone())
            .sync(&config, &mut interceptor)
            .await;
        assert!(matches!(result, Err(FauxError::Config(_))));
        assert_eq!(source.call_count(), 0);
        assert_eq!(file_names(root.path()), vec!["Cargo.toml"]);
    }

    #[tokio::test]
    async fn test_sync_into_filesystem_root_is_refused() {
        let source = Arc::new(MockSource::default());
        let config = SyncConfig::new("space", "key", "/");
        source.respond(config.endpoint().content_types_url(), listing(&["article"]));
        source.respond(
            config.endpoint().sample_entries_url("article"),
            json!({"total": 1, "items": [{}]}),
        );
        let mut interceptor = Interceptor::new(Arc::new(RecordingHook::default()));

        let result = Synchronizer::new(source.clone())
            .sync(&config, &mut interceptor)
            .await;
        assert!(matches!(result, Err(FauxError::UnsafePath(_))));
        assert_eq!(source.call_count(), 2);
        assert!(!Path::new("/article.json").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sync_into_symlink_to_root_is_refused() {
        let (root, _, source) = setup(&[]);
        let link = root.path().join("to-root");
        std::os::unix::fs::symlink("/", &link).unwrap();
        let config = SyncConfig::new("space", "key", link.clone());
        let mut interceptor = Interceptor::new(Arc::new(RecordingHook::default()));

        let result = Synchronizer::new(source)
            .sync(&config, &mut interceptor)
            .await;
        assert!(matches!(result, Err(FauxError::UnsafePath(_))));
        assert!(link.exists());
    }

    #[tokio::test]
    async fn test_sample_named_like_baseline_wins() {
        let (_root, config, source) = setup(&["space"]);
        source.respond(
            config.endpoint().sample_entries_url("space"),
            json!({"total": 1, "items": [{"name": "sampled"}]}),
        );
        let mut interceptor = Interceptor::new(Arc::new(RecordingHook::default()));

        Synchronizer::new(source)
            .sync(&config, &mut interceptor)
            .await
            .unwrap();
        let on_disk: Value = serde_json::from_str(
            &std::fs::read_to_string(config.fixture_dir.join("space.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(on_disk["items"][0]["name"], "sampled");
    }

    #[test]
    fn test_remove_root_is_refused() {
        let result = tokio_test::block_on(remove_dir_recursive(Path::new("/")));
        assert!(matches!(result, Err(FauxError::UnsafePath(_))));
        assert!(Path::new("/").exists());
    }

    #[tokio::test]
    async fn test_remove_missing_dir_is_ok() {
        let root = TempDir::new().unwrap();
        remove_dir_recursive(&root.path().join("missing")).await.unwrap();
    }

    #[test]
    fn test_baseline_fixtures_are_json() {
        for (name, content) in BASELINE_FIXTURES {
            assert!(name.ends_with(".json"));
            serde_json::from_str::<Value>(content).unwrap();
        }
    }

    #[test]
    fn test_has_entries() {
        assert!(has_entries(&json!({"total": 3})));
        assert!(!has_entries(&json!({"total": 0})));
        assert!(!has_entries(&json!({"items": [1]})));
        assert!(!has_entries(&json!({"total": "many"})));
    }
}
