//! Intent source discovery.
//!
//! Walks each configured directory and keeps files matching any of the
//! configured glob patterns. Output order is deterministic: directories in
//! the order given, files sorted by path within each directory.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, warn};

/// Compile the discovery patterns into one matcher.
pub fn build_matcher(patterns: &[String]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let _ = builder.add(Glob::new(pattern)?);
    }
    builder.build()
}

/// Collect matching files under every directory.
///
/// Missing or unreadable directories are logged and skipped.
pub fn discover_sources(dirs: &[PathBuf], matcher: &GlobSet) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for dir in dirs {
        if !dir.is_dir() {
            warn!(dir = %dir.display(), "source directory not found, skipping");
            continue;
        }
        let mut found = collect_dir(dir, matcher);
        found.sort();
        debug!(dir = %dir.display(), files = found.len(), "discovered source files");
        files.extend(found);
    }
    files
}

fn collect_dir(root: &Path, matcher: &GlobSet) -> Vec<PathBuf> {
    let walker = walkdir::WalkDir::new(root).follow_links(true);
    let mut found = Vec::new();

    for entry in walker.into_iter().filter_entry(|e| {
        !(e.depth() > 0 && e.file_type().is_dir() && e.file_name().to_string_lossy().starts_with('.'))
    }) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let rel_path = entry.path().strip_prefix(root).unwrap_or(entry.path());
        if matcher.is_match(rel_path) || matcher.is_match(entry.file_name()) {
            found.push(entry.into_path());
        }
    }
    found
}
