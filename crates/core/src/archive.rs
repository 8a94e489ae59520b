//! Recursive traversal of a directory tree and the zip containers in it.
//!
//! [`traverse`] walks a root directory and hands every regular file to a
//! visitor as a `(logical_path, stream)` pair. Files ending in `.zip` are not
//! handed over themselves: they are read as containers, and each entry is
//! visited under `parent_logical_path + ":/" + entry_name`, recursively for
//! containers nested inside containers.
//!
//! Containers on disk are opened through their central directory, so
//! entries written with trailing data descriptors (any zip produced by a
//! non-seekable writer) read the same as any other. Each entry stream is
//! independent of its siblings. A container nested inside another is
//! snapshotted into memory before it is opened; plain entries are never
//! buffered by the walker.

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

use walkdir::WalkDir;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::CoreError;

/// File suffix that marks a zip container.
pub const ARCHIVE_EXTENSION: &str = ".zip";

/// Separator between a container's logical path and an entry name.
pub const NESTED_SEPARATOR: &str = ":/";

/// Callback invoked once per non-container file or entry.
pub type Visitor<'v> = dyn FnMut(&str, &mut dyn Read) -> Result<(), CoreError> + 'v;

/// Whether `logical_path` names a zip container.
pub fn is_archive(logical_path: &str) -> bool {
    logical_path
        .to_ascii_lowercase()
        .ends_with(ARCHIVE_EXTENSION)
}

/// Walk `root` and every zip container beneath it, in file-name order.
///
/// Any I/O or container error aborts the walk and is returned as is, as
/// does the first error returned by `visit`. Open handles are scoped to the
/// file being visited and are released on every exit path.
pub fn traverse<F>(root: &Path, mut visit: F) -> Result<(), CoreError>
where
    F: FnMut(&str, &mut dyn Read) -> Result<(), CoreError>,
{
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| walk_error(root, e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let logical_path = path.to_string_lossy();
        let file = File::open(path).map_err(|e| CoreError::io(path, e))?;
        let mut reader = BufReader::new(file);

        if is_archive(&logical_path) {
            let container = open_container(&logical_path, reader)?;
            walk_container(&logical_path, container, &mut visit)?;
        } else {
            visit(&logical_path, &mut reader)?;
        }
    }
    Ok(())
}

fn open_container<R: Read + Seek>(
    container_path: &str,
    reader: R,
) -> Result<ZipArchive<R>, CoreError> {
    ZipArchive::new(reader).map_err(|source| archive_error(container_path, source))
}

fn walk_container<R: Read + Seek>(
    container_path: &str,
    mut container: ZipArchive<R>,
    visit: &mut Visitor<'_>,
) -> Result<(), CoreError> {
    for index in 0..container.len() {
        let mut entry = container
            .by_index(index)
            .map_err(|source| archive_error(container_path, source))?;
        if entry.is_dir() {
            continue;
        }

        let logical_path = format!("{container_path}{NESTED_SEPARATOR}{}", entry.name());
        if is_archive(&logical_path) {
            let nested = snapshot(&logical_path, &mut entry)?;
            walk_container(&logical_path, open_container(&logical_path, nested)?, visit)?;
        } else {
            visit(&logical_path, &mut entry)?;
        }
    }
    Ok(())
}

fn snapshot(logical_path: &str, entry: &mut dyn Read) -> Result<Cursor<Vec<u8>>, CoreError> {
    let mut bytes = Vec::new();
    entry
        .read_to_end(&mut bytes)
        .map_err(|e| CoreError::io(logical_path, e))?;
    Ok(Cursor::new(bytes))
}

fn archive_error(container_path: &str, source: ZipError) -> CoreError {
    CoreError::Archive {
        path: container_path.to_string(),
        source,
    }
}

fn walk_error(root: &Path, err: walkdir::Error) -> CoreError {
    let path = err
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());
    let message = err.to_string();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::other(message));
    CoreError::io(path, source)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
