//! Packaging engine availability check.

use crate::config::{Engine, Interpreter};
use log::{debug, info};
use std::process::Stdio;

/// Check whether `engine` can be reached through `interpreter`.
///
/// Tries a module-presence lookup first, then falls back to running the
/// engine module with `--version`. Either exiting zero counts as available.
/// The result is not cached.
///
/// # Arguments
///
/// * `interpreter` - Program used for both checks
/// * `engine` - Engine whose module is looked up
///
/// # Returns
///
/// `true` if either check exits zero. A missing interpreter or any spawn
/// failure counts as unavailable.
pub async fn engine_available(interpreter: &Interpreter, engine: Engine) -> bool {
    let module = engine.module();
    let lookup = format!(
        "import importlib.util, sys; sys.exit(0 if importlib.util.find_spec('{}') else 1)",
        module
    );

    if exits_zero(interpreter, &["-c", lookup.as_str()]).await {
        info!("{} module found via {}", module, interpreter.program);
        return true;
    }

    if exits_zero(interpreter, &["-m", module, "--version"]).await {
        info!("{} answered --version via {}", module, interpreter.program);
        return true;
    }

    info!("{} is not available via {}", module, interpreter.program);
    false
}

/// Run the interpreter with `args` and all stdio discarded.
async fn exits_zero(interpreter: &Interpreter, args: &[&str]) -> bool {
    let status = interpreter
        .command()
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match status {
        Ok(status) => status.success(),
        Err(e) => {
            debug!("Failed to run {}: {}", interpreter.program, e);
            false
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::Path;

    /// `sh <script> ...` so the fake interpreter is never exec'd directly.
    fn fake_interpreter(dir: &Path, body: &str) -> Interpreter {
        let script = dir.join("fake_python.sh");
        std::fs::write(&script, body).unwrap();
        Interpreter {
            program: "sh".to_string(),
            args: vec![script.to_string_lossy().into_owned()],
        }
    }

    #[tokio::test]
    async fn module_lookup_success_is_enough() {
        let dir = tempfile::tempdir().unwrap();
        let python = fake_interpreter(dir.path(), "[ \"$1\" = \"-c\" ] && exit 0\nexit 1\n");
        assert!(engine_available(&python, Engine::PyInstaller).await);
    }

    #[tokio::test]
    async fn version_fallback_is_used_when_lookup_fails() {
        let dir = tempfile::tempdir().unwrap();
        let python = fake_interpreter(
            dir.path(),
            "[ \"$1\" = \"-m\" ] && [ \"$2\" = \"nuitka\" ] && [ \"$3\" = \"--version\" ] && exit 0\nexit 1\n",
        );
        assert!(engine_available(&python, Engine::Nuitka).await);
    }

    #[tokio::test]
    async fn unavailable_when_both_checks_fail() {
        let dir = tempfile::tempdir().unwrap();
        let python = fake_interpreter(dir.path(), "exit 1\n");
        assert!(!engine_available(&python, Engine::PyInstaller).await);
    }

    #[tokio::test]
    async fn unavailable_when_interpreter_is_missing() {
        let python = Interpreter {
            program: "definitely-not-a-python-interpreter".to_string(),
            args: Vec::new(),
        };
        assert!(!engine_available(&python, Engine::Nuitka).await);
    }

    #[tokio::test]
    async fn lookup_names_the_case_normalized_module() {
        let dir = tempfile::tempdir().unwrap();
        let python = fake_interpreter(
            dir.path(),
            "case \"$2\" in *\"find_spec('PyInstaller')\"*) exit 0;; esac\nexit 1\n",
        );
        assert!(engine_available(&python, Engine::PyInstaller).await);
    }
}
