//! Pro edition extras.
//!
//! None of these do real verification: the injected lines are inert and the
//! vulnerability scan is a fixed delay followed by a fixed verdict.

use anyhow::{Context, Result};
use log::{info, warn};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};
use std::time::Duration;

pub const WRAPPER_PREFIX: &str = "_pro_wrapper_";

/// How long the placeholder vulnerability scan pretends to work.
pub const SCAN_DELAY: Duration = Duration::from_millis(500);

const LOADER_BANNER: &str = "# --- Professional Integrity & Ghost Loader ---";
const LOADER_IMPORTS: &str = "import sys, os, hashlib, time, threading, ctypes";
const INTEGRITY_STUB: &str = "def _verify_pro(): pass";

/// Wrappers currently on disk, so an interrupted process can remove them.
static LIVE_WRAPPERS: LazyLock<Mutex<HashSet<PathBuf>>> =
    LazyLock::new(|| Mutex::new(HashSet::new()));

/// A generated copy of a user script with the loader lines prepended.
///
/// The file is deleted when the value is dropped.
#[derive(Debug)]
pub struct WrapperScript {
    path: PathBuf,
}

impl WrapperScript {
    /// Write `_pro_wrapper_<name>` next to `script`.
    ///
    /// # Errors
    ///
    /// Returns an error if `script` cannot be read, has no file name, or the
    /// wrapper cannot be written.
    pub fn create(script: &Path, integrity_check: bool) -> Result<Self> {
        let source = fs::read_to_string(script)
            .with_context(|| format!("Failed to read {}", script.display()))?;
        let name = script
            .file_name()
            .with_context(|| format!("{} has no file name", script.display()))?;

        let mut path = script.to_path_buf();
        path.set_file_name(format!("{}{}", WRAPPER_PREFIX, name.to_string_lossy()));

        fs::write(&path, wrap_source(&source, integrity_check))
            .with_context(|| format!("Failed to write {}", path.display()))?;

        if let Ok(mut live) = LIVE_WRAPPERS.lock() {
            live.insert(path.clone());
        }
        info!("Generated wrapper {:?}", path);

        Ok(Self { path })
    }

    /// Location of the generated file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WrapperScript {
    fn drop(&mut self) {
        remove_wrapper(&self.path);
        if let Ok(mut live) = LIVE_WRAPPERS.lock() {
            live.remove(&self.path);
        }
    }
}

fn remove_wrapper(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => info!("Removed wrapper {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => (),
        Err(e) => warn!("Failed to remove wrapper {:?}: {}", path, e),
    }
}

/// Remove every wrapper still on disk. Called from the signal handler and on
/// application exit.
pub fn remove_live_wrappers() {
    let paths: Vec<PathBuf> = match LIVE_WRAPPERS.lock() {
        Ok(mut live) => live.drain().collect(),
        Err(_) => return,
    };
    for path in paths {
        remove_wrapper(&path);
    }
}

/// Prepend the loader lines to `source`. The integrity stub goes last when
/// `integrity_check` is set.
pub fn wrap_source(source: &str, integrity_check: bool) -> String {
    let mut lines = vec![LOADER_BANNER, LOADER_IMPORTS];
    if integrity_check {
        lines.push(INTEGRITY_STUB);
    }
    format!("{}\n{}", lines.join("\n"), source)
}

/// Folders a Pro project is expected to have.
pub const PROJECT_DIRS: &[&str] = &["plugins", "docs", "src"];

/// Create [`PROJECT_DIRS`] under `root` when the Pro edition opens.
///
/// Existing folders are left alone. Failures are logged and skipped.
pub fn ensure_project_dirs(root: &Path) {
    for dir in PROJECT_DIRS {
        let path = root.join(dir);
        if let Err(e) = fs::create_dir_all(&path) {
            warn!("Failed to create {:?}: {}", path, e);
        }
    }
}

/// Placeholder vulnerability scan.
pub async fn scan_vulnerabilities() {
    tokio::time::sleep(SCAN_DELAY).await;
}

/// Write `README.md` and `.gitignore` under `root`, replacing existing files.
///
/// # Arguments
///
/// * `root` - Directory the files are written to
/// * `project_name` - Title used in the README
///
/// # Errors
///
/// Returns an error if either file cannot be written.
pub fn write_github_assets(root: &Path, project_name: &str) -> Result<()> {
    let readme = format!("# {}\n\nBuilt with Python Pro Suite.\n", project_name);
    fs::write(root.join("README.md"), readme).context("Failed to write README.md")?;
    fs::write(root.join(".gitignore"), "build/\ndist/\n__pycache__/\n")
        .context("Failed to write .gitignore")?;
    info!("Wrote repository assets for {} under {:?}", project_name, root);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Serializes tests that inspect or drain the live-wrapper registry.
    static REGISTRY: Mutex<()> = Mutex::new(());

    fn is_live(path: &Path) -> bool {
        LIVE_WRAPPERS.lock().unwrap().contains(path)
    }

    #[test]
    fn wrapper_prepends_loader_lines() {
        let wrapped = wrap_source("print('hi')\n", false);
        assert_eq!(
            wrapped,
            "# --- Professional Integrity & Ghost Loader ---\n\
             import sys, os, hashlib, time, threading, ctypes\n\
             print('hi')\n"
        );
    }

    #[test]
    fn integrity_flag_adds_the_stub() {
        let wrapped = wrap_source("x = 1", true);
        assert_eq!(wrapped.lines().nth(2), Some("def _verify_pro(): pass"));
        assert!(wrapped.ends_with("\nx = 1"));
    }

    #[test]
    fn wrapper_lives_next_to_script_and_is_removed_on_drop() {
        let _guard = REGISTRY.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("tool.py");
        fs::write(&script, "print(1)\n").unwrap();

        let wrapper = WrapperScript::create(&script, true).unwrap();
        let path = wrapper.path().to_path_buf();
        assert_eq!(path, dir.path().join("_pro_wrapper_tool.py"));
        assert!(fs::read_to_string(&path).unwrap().ends_with("print(1)\n"));
        assert!(is_live(&path));

        drop(wrapper);
        assert!(!path.exists());
        assert!(!is_live(&path));
        assert!(script.exists());
    }

    #[test]
    fn exit_sweep_removes_wrappers_that_were_never_dropped() {
        let _guard = REGISTRY.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("job.py");
        fs::write(&script, "pass\n").unwrap();

        let wrapper = WrapperScript::create(&script, false).unwrap();
        let path = wrapper.path().to_path_buf();
        std::mem::forget(wrapper);
        assert!(path.exists());

        remove_live_wrappers();

        assert!(!path.exists());
        assert!(!is_live(&path));
        assert!(script.exists());
    }

    #[test]
    fn project_dirs_are_created_and_existing_ones_kept() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs/index.md"), "keep").unwrap();

        ensure_project_dirs(dir.path());
        ensure_project_dirs(dir.path());

        for name in PROJECT_DIRS {
            assert!(dir.path().join(name).is_dir(), "missing {name}");
        }
        assert_eq!(fs::read_to_string(dir.path().join("docs/index.md")).unwrap(), "keep");
    }

    #[test]
    fn missing_script_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = WrapperScript::create(&dir.path().join("nope.py"), false).unwrap_err();
        assert!(format!("{err:#}").contains("nope.py"));
        assert!(!dir.path().join("_pro_wrapper_nope.py").exists());
    }

    #[test]
    fn github_assets_overwrite_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("README.md"), "old").unwrap();

        write_github_assets(dir.path(), "tool").unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("README.md")).unwrap(),
            "# tool\n\nBuilt with Python Pro Suite.\n"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join(".gitignore")).unwrap(),
            "build/\ndist/\n__pycache__/\n"
        );
    }
}
