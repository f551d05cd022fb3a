use islet::core::IsletError;
use islet::engine::Engine;
use islet::loader::{ModuleHandle, ModuleHost, TemplateModuleHost};
use islet::store::AssignmentStore;
use islet::test_utils::ComponentFixture;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Records the artifact it was given, then fails like a module that throws at load time.
#[derive(Default)]
struct FailingHost {
    seen: Mutex<Vec<PathBuf>>,
}

impl ModuleHost for FailingHost {
    fn evaluate(&self, path: &Path) -> Result<ModuleHandle, String> {
        assert!(path.exists(), "artifact should exist while the host evaluates it");
        self.seen.lock().unwrap().push(path.to_path_buf());
        Err("ReferenceError: window is not defined".to_string())
    }
}

/// Delegates to the built-in host, remembering every artifact path.
#[derive(Default)]
struct RecordingHost {
    inner: TemplateModuleHost,
    seen: Mutex<Vec<PathBuf>>,
}

impl ModuleHost for RecordingHost {
    fn evaluate(&self, path: &Path) -> Result<ModuleHandle, String> {
        self.seen.lock().unwrap().push(path.to_path_buf());
        self.inner.evaluate(path)
    }
}

#[tokio::test]
async fn test_failed_load_leaves_no_artifact() {
    let fixture = ComponentFixture::with_sample_site().unwrap();
    let host = Arc::new(FailingHost::default());
    let engine = Engine::builder(fixture.config()).module_host(host.clone()).build();

    let err = engine.render("components/notice", &AssignmentStore::new()).await.unwrap_err();
    match &err {
        IsletError::CompileExecution { id, reason } => {
            assert_eq!(id, "components/notice");
            assert!(reason.contains("window is not defined"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.status_code(), 500);

    let seen = host.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(!seen[0].exists());
    assert!(fixture.artifacts().unwrap().is_empty());
}

#[tokio::test]
async fn test_artifacts_are_unique_and_removed_after_success() {
    let fixture = ComponentFixture::with_sample_site().unwrap();
    let host = Arc::new(RecordingHost::default());
    let engine = Engine::builder(fixture.config()).module_host(host.clone()).build();

    let mut store = AssignmentStore::new();
    store.assign("notice", "n").assign("items", serde_json::json!([]));
    engine.render("pages/index", &store).await.unwrap();
    engine.render("pages/index", &store).await.unwrap();

    let seen = host.seen.lock().unwrap();
    // index, SampleCounter and Notice, twice
    assert_eq!(seen.len(), 6);
    let mut unique = seen.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), seen.len());
    assert!(seen.iter().all(|p| !p.exists()));
    assert!(fixture.artifacts().unwrap().is_empty());
}
