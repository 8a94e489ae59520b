//! Maps a selected descriptor to a bundle file on disk.

use std::path::{Path, PathBuf};

use crate::descriptor::{Descriptor, DescriptorBundle};

/// Candidate bundle path for `descriptor`.
///
/// Joined onto `archive_folder` when one is configured, otherwise the
/// bundle name is used as given.
pub fn bundle_path(descriptor: &Descriptor, archive_folder: Option<&Path>) -> PathBuf {
    match archive_folder {
        Some(folder) => folder.join(&descriptor.bundle_name),
        None => PathBuf::from(&descriptor.bundle_name),
    }
}

/// Resolve `descriptor` to an existing regular file.
///
/// A missing bundle is a soft miss: it is logged and `None` is returned so
/// the caller can fall through to the next selection rule.
pub fn resolve(descriptor: &Descriptor, archive_folder: Option<&Path>) -> Option<DescriptorBundle> {
    let path = bundle_path(descriptor, archive_folder);
    if path.is_file() {
        Some(DescriptorBundle::new(path, descriptor.clone()))
    } else {
        tracing::info!(
            descriptor_id = %descriptor.id,
            label = descriptor.display_name(),
            path = %path.display(),
            "Descriptor matched, but bundle not found",
        );
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
