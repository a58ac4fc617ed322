use crate::types::{InstallTarget, ResolvedExecutable};
use regex::Regex;
use std::path::Path;
use walkdir::WalkDir;

/// Translates a file-name glob (`*`, `?`) into an anchored, case-insensitive
/// regex. Every other character matches literally.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push_str("(?i)^");
    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re)
}

/// Finds the first file in `target.root_dir`, in lexicographic order, whose
/// name matches `target.binary_pattern`. Subdirectories are not searched and
/// the target's own download archive never counts as a match.
pub fn locate(target: &InstallTarget) -> ResolvedExecutable {
    locate_in(
        &target.root_dir,
        &target.binary_pattern,
        Some(&target.archive_name),
    )
}

pub fn locate_in(root_dir: &Path, pattern: &str, ignore: Option<&str>) -> ResolvedExecutable {
    if !root_dir.is_dir() {
        tracing::debug!("{} does not exist yet", root_dir.display());
        return ResolvedExecutable::missing(root_dir);
    }

    let matcher = match glob_to_regex(pattern) {
        Ok(re) => re,
        Err(e) => {
            tracing::error!("Invalid binary pattern '{}': {}", pattern, e);
            return ResolvedExecutable::missing(root_dir);
        }
    };
    let found = WalkDir::new(root_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .filter(|e| ignore.map_or(true, |name| e.file_name() != name))
        .find(|e| matcher.is_match(&e.file_name().to_string_lossy()));

    match found {
        Some(entry) => {
            tracing::info!("Found emulator: {}", entry.path().display());
            ResolvedExecutable::found(entry.into_path())
        }
        None => {
            tracing::debug!("No file matching '{}' in {}", pattern, root_dir.display());
            ResolvedExecutable::missing(root_dir)
        }
    }
}
