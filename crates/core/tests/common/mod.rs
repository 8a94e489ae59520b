//! Fixture builders shared by the selection integration tests.

#![allow(dead_code)]

use std::fs;
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use xengine_core::descriptor::DescriptorBundle;
use xengine_core::matcher::DescriptorMatcher;
use zip::write::SimpleFileOptions;

/// Path of the default bundle used by every test matcher.
pub const DEFAULT_BUNDLE: &str = "/opt/runtime/default.tar.gz";

/// A temporary archive folder (catalog + bundles) and a job directory.
pub struct Fixture {
    root: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        fs::create_dir(root.path().join("archive")).expect("mkdir archive");
        fs::create_dir(root.path().join("job")).expect("mkdir job");
        Self { root }
    }

    pub fn archive(&self) -> PathBuf {
        self.root.path().join("archive")
    }

    pub fn job(&self) -> PathBuf {
        self.root.path().join("job")
    }

    /// Write `descriptor_<file_tag>.json` declaring one R runtime.
    pub fn descriptor(&self, file_tag: &str, id: &str, bundle: &str, deps: &[(&str, &str)]) {
        let deps: serde_json::Map<String, serde_json::Value> = deps
            .iter()
            .map(|(name, req)| (name.to_string(), serde_json::Value::from(*req)))
            .collect();
        let body = serde_json::json!({
            "id": id,
            "label": format!("Descriptor {id}"),
            "bundleName": bundle,
            "executionRuntimes": [{"type": "R", "dependencies": deps}],
        });
        fs::write(
            self.archive().join(format!("descriptor_{file_tag}.json")),
            body.to_string(),
        )
        .expect("write descriptor");
    }

    /// Create a bundle file in the archive folder.
    pub fn bundle(&self, name: &str) -> PathBuf {
        let path = self.archive().join(name);
        fs::write(&path, b"bundle").expect("write bundle");
        path
    }

    /// Write a file relative to the job directory, creating parents.
    pub fn job_file(&self, relative: &str, data: &[u8]) {
        let path = self.job().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir parents");
        }
        fs::write(path, data).expect("write job file");
    }

    pub fn matcher(&self, dependency_matching: bool) -> DescriptorMatcher {
        DescriptorMatcher::new(
            Arc::new(DescriptorBundle::default_bundle(Path::new(DEFAULT_BUNDLE))),
            Some(self.archive()),
            dependency_matching,
        )
    }
}

/// Minimal `renv.lock` body.
pub fn renv_lock(r_version: &str, packages: &[(&str, &str)]) -> String {
    let packages: serde_json::Map<String, serde_json::Value> = packages
        .iter()
        .map(|(name, version)| {
            (
                name.to_string(),
                serde_json::json!({"Package": name, "Version": version}),
            )
        })
        .collect();
    serde_json::json!({"R": {"Version": r_version}, "Packages": packages}).to_string()
}

/// Build an in-memory zip container.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("start zip entry");
        writer.write_all(data).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// In-memory sink for formatted log records.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log buffer lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a thread-local subscriber and return its result together
/// with every log line it emitted.
pub fn with_captured_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&buffer.0.lock().expect("log buffer lock")).into_owned();
    (result, logs)
}
