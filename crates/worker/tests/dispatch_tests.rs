//! Analysis routing through the dispatcher with recording runners.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use tempfile::TempDir;
use xengine_core::descriptor::DescriptorBundle;
use xengine_core::error::CoreError;
use xengine_core::matcher::DescriptorMatcher;
use xengine_worker::dispatch::{
    AnalysisDispatcher, AnalysisKind, AnalysisRequest, MetadataExtractor, ScriptRunner, SqlRunner,
};
use xengine_worker::error::{RunnerError, WorkerError};
use xengine_worker::pool::JobPool;

const DEFAULT_BUNDLE: &str = "/opt/runtime/default.tar.gz";

// ---------------------------------------------------------------------------
// Recording collaborators
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<String>>,
}

impl Recorder {
    fn push(&self, call: String) {
        self.calls.lock().expect("lock").push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock").clone()
    }
}

struct FakeSql(Arc<Recorder>);

impl SqlRunner for FakeSql {
    fn run(&self, request: &AnalysisRequest, _dir: &Path) -> Result<(), RunnerError> {
        self.0.push(format!("sql:{}", request.id));
        Ok(())
    }
}

struct FakeScript {
    recorder: Arc<Recorder>,
    fail: bool,
}

impl ScriptRunner for FakeScript {
    fn run(
        &self,
        request: &AnalysisRequest,
        _dir: &Path,
        bundle: &DescriptorBundle,
    ) -> Result<(), RunnerError> {
        if self.fail {
            return Err("container refused to start".into());
        }
        self.recorder
            .push(format!("script:{}:{}", request.id, bundle.descriptor.id));
        Ok(())
    }
}

struct FakeMetadata {
    recorder: Arc<Recorder>,
    fail: bool,
}

impl MetadataExtractor for FakeMetadata {
    fn extract(&self, request: &AnalysisRequest, _dir: &Path) -> Result<(), RunnerError> {
        self.recorder.push(format!("metadata:{}", request.id));
        if self.fail {
            return Err("metadata store unavailable".into());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

struct Fixture {
    root: TempDir,
    recorder: Arc<Recorder>,
}

impl Fixture {
    fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        fs::create_dir(root.path().join("archive")).expect("mkdir archive");
        fs::create_dir(root.path().join("job")).expect("mkdir job");
        Self {
            root,
            recorder: Arc::new(Recorder::default()),
        }
    }

    fn archive(&self) -> PathBuf {
        self.root.path().join("archive")
    }

    fn job(&self) -> PathBuf {
        self.root.path().join("job")
    }

    fn descriptor(&self, file_name: &str, id: &str, bundle: &str) -> PathBuf {
        let body = serde_json::json!({
            "id": id,
            "bundleName": bundle,
            "executionRuntimes": [{"type": "R", "dependencies": {}}],
        });
        fs::write(self.archive().join(file_name), body.to_string()).expect("write descriptor");
        let path = self.archive().join(bundle);
        fs::write(&path, b"bundle").expect("write bundle");
        path
    }

    fn dispatcher(&self, script_fails: bool, metadata_fails: bool) -> AnalysisDispatcher {
        let matcher = DescriptorMatcher::new(
            Arc::new(DescriptorBundle::default_bundle(Path::new(DEFAULT_BUNDLE))),
            Some(self.archive()),
            false,
        );
        AnalysisDispatcher::new(
            Arc::new(matcher),
            Arc::new(FakeSql(Arc::clone(&self.recorder))),
            Arc::new(FakeScript {
                recorder: Arc::clone(&self.recorder),
                fail: script_fails,
            }),
            Arc::new(FakeMetadata {
                recorder: Arc::clone(&self.recorder),
                fail: metadata_fails,
            }),
        )
    }
}

fn request(id: i64, file: &str, requested: Option<&str>) -> AnalysisRequest {
    AnalysisRequest {
        id,
        executable_file_name: file.to_string(),
        requested_descriptor_id: requested.map(str::to_string),
    }
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

#[test]
fn sql_goes_to_sql_runner_without_bundle_selection() {
    let fx = Fixture::new();
    let status = fx
        .dispatcher(false, false)
        .analyze(&request(1, "query.sql", None), &fx.job())
        .expect("analyze");

    assert_eq!(status.kind, AnalysisKind::Sql);
    assert_eq!(status.bundle, None);
    assert_eq!(fx.recorder.calls(), vec!["metadata:1", "sql:1"]);
}

#[test]
fn r_script_starts_in_requested_bundle() {
    let fx = Fixture::new();
    let path = fx.descriptor("descriptor_r4.json", "r4", "r4.tgz");

    let status = fx
        .dispatcher(false, false)
        .analyze(&request(2, "main.R", Some("r4")), &fx.job())
        .expect("analyze");

    let bundle = status.bundle.expect("bundle");
    assert_eq!(bundle.path, path);
    assert_eq!(fx.recorder.calls(), vec!["metadata:2", "script:2:r4"]);
}

#[test]
fn r_script_without_request_uses_default_bundle() {
    let fx = Fixture::new();
    fx.descriptor("descriptor_r4.json", "r4", "r4.tgz");

    let status = fx
        .dispatcher(false, false)
        .analyze(&request(3, "main.r", None), &fx.job())
        .expect("analyze");

    let bundle = status.bundle.expect("bundle");
    assert!(bundle.is_default());
    assert_eq!(bundle.path, PathBuf::from(DEFAULT_BUNDLE));
}

#[test]
fn unrecognized_executable_starts_nothing() {
    let fx = Fixture::new();
    let status = fx
        .dispatcher(false, false)
        .analyze(&request(4, "run.py", None), &fx.job())
        .expect("analyze");

    assert_eq!(status.kind, AnalysisKind::NotRecognized);
    assert_eq!(fx.recorder.calls(), vec!["metadata:4"]);
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn metadata_failure_does_not_block_the_job() {
    let fx = Fixture::new();
    let status = fx
        .dispatcher(false, true)
        .analyze(&request(5, "query.sql", None), &fx.job())
        .expect("analyze");

    assert_eq!(status.kind, AnalysisKind::Sql);
    assert_eq!(fx.recorder.calls(), vec!["metadata:5", "sql:5"]);
}

#[test]
fn duplicate_requested_descriptor_aborts_dispatch() {
    let fx = Fixture::new();
    fx.descriptor("descriptor_a.json", "twin", "a.tgz");
    fx.descriptor("descriptor_b.json", "twin", "b.tgz");

    let result = fx
        .dispatcher(false, false)
        .analyze(&request(6, "main.R", Some("twin")), &fx.job());

    assert_matches!(
        result,
        Err(WorkerError::Core(CoreError::DuplicateDescriptor { .. }))
    );
    assert_eq!(fx.recorder.calls(), vec!["metadata:6"]);
}

#[test]
fn script_runner_failure_is_reported_with_analysis_id() {
    let fx = Fixture::new();
    let result = fx
        .dispatcher(true, false)
        .analyze(&request(7, "main.R", None), &fx.job());

    assert_matches!(result, Err(WorkerError::Runner { analysis_id: 7, .. }));
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

#[tokio::test]
async fn analyses_run_through_the_job_pool() {
    let fx = Fixture::new();
    fx.descriptor("descriptor_r4.json", "r4", "r4.tgz");
    let dispatcher = Arc::new(fx.dispatcher(false, false));
    let pool = JobPool::new(2);

    let mut handles = Vec::new();
    for id in 10..14 {
        let dispatcher = Arc::clone(&dispatcher);
        let pool = pool.clone();
        let dir = fx.job();
        handles.push(tokio::spawn(async move {
            pool.run(move || dispatcher.analyze(&request(id, "main.R", Some("r4")), &dir))
                .await
        }));
    }
    for handle in handles {
        let status = handle.await.expect("join").expect("pool").expect("analyze");
        assert_eq!(status.bundle.expect("bundle").descriptor.id, "r4");
    }

    assert_eq!(fx.recorder.calls().len(), 8);
    assert_eq!(pool.active_tasks(), 0);
}
