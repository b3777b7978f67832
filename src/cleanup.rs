//! Best-effort removal of build leftovers.

use crate::config::Edition;
use log::{debug, info};
use std::fs;
use std::path::Path;

/// Directories every packaging run may leave behind.
const BUILD_DIRS: &[&str] = &["build", "__pycache__"];

/// PyInstaller .spec files and generated wrapper scripts, including the prefixes older
/// Pro releases used.
const PRO_PATTERNS: &[&str] = &[
    "*.spec",
    "_nexus_*.py",
    "_sov_*.py",
    "_apex_*.py",
    "_pro_wrapper_*.py",
];

/// Remove build leftovers directly under `root` and return how many items
/// were actually removed.
///
/// Never fails. Anything that cannot be removed is skipped, so a second call
/// right after the first reports 0.
pub fn perform_cleanup(root: &Path, edition: Edition) -> usize {
    let mut removed = 0;

    for dir in BUILD_DIRS {
        let path = root.join(dir);
        if !path.is_dir() {
            continue;
        }
        match fs::remove_dir_all(&path) {
            Ok(()) => removed += 1,
            Err(e) => debug!("Could not remove {:?}: {}", path, e),
        }
    }

    if edition.is_pro() {
        let base = glob::Pattern::escape(&root.to_string_lossy());
        for pattern in PRO_PATTERNS {
            let full = format!("{}/{}", base, pattern);
            let Ok(entries) = glob::glob(&full) else {
                debug!("Skipping invalid cleanup pattern {}", full);
                continue;
            };
            for entry in entries.flatten() {
                if !entry.is_file() {
                    continue;
                }
                match fs::remove_file(&entry) {
                    Ok(()) => removed += 1,
                    Err(e) => debug!("Could not remove {:?}: {}", entry, e),
                }
            }
        }
    }

    info!("Cleanup under {:?} removed {} item(s)", root, removed);
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn standard_removes_only_build_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("build/app")).unwrap();
        touch(&root.join("build/app/out.o"));
        touch(&root.join("app.spec"));

        assert_eq!(perform_cleanup(root, Edition::Standard), 1);
        assert!(!root.join("build").exists());
        assert!(root.join("app.spec").exists());
    }

    #[test]
    fn pro_removes_dirs_and_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("build")).unwrap();
        fs::create_dir(root.join("__pycache__")).unwrap();
        touch(&root.join("app.spec"));
        touch(&root.join("_pro_wrapper_app.py"));
        touch(&root.join("_nexus_old.py"));
        touch(&root.join("app.py"));
        fs::create_dir(root.join("dist")).unwrap();

        assert_eq!(perform_cleanup(root, Edition::Pro), 5);
        assert!(root.join("app.py").exists());
        assert!(root.join("dist").exists());
    }

    #[test]
    fn second_run_removes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("build")).unwrap();
        touch(&root.join("_sov_x.py"));

        assert_eq!(perform_cleanup(root, Edition::Pro), 2);
        assert_eq!(perform_cleanup(root, Edition::Pro), 0);
    }

    #[test]
    fn a_file_named_build_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("build"));

        assert_eq!(perform_cleanup(dir.path(), Edition::Standard), 0);
        assert!(dir.path().join("build").exists());
    }

    #[test]
    fn empty_or_missing_root_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(perform_cleanup(dir.path(), Edition::Pro), 0);
        assert_eq!(perform_cleanup(&dir.path().join("gone"), Edition::Pro), 0);
    }
}
