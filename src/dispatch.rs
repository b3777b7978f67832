//! Packaging run driver.
//!
//! A run packages every selected script in order, one engine process at a
//! time. Progress is reported as [`RunEvent`]s over a channel; the receiving
//! side owns all presentation state.

use crate::config::{Edition, Engine, Interpreter};
use crate::i18n::{self, Key, Lang};
use crate::pro::{self, WrapperScript};
use anyhow::{Context, Result};
use log::{debug, error, info};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use futures_util::StreamExt;
use tokio::process::Command;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::codec::{AnyDelimiterCodec, FramedRead};

/// Everything a run needs, captured when the user presses start.
#[derive(Debug, Clone)]
pub struct BuildJob {
    pub edition: Edition,
    pub lang: Lang,
    pub engine: Engine,
    pub interpreter: Interpreter,
    /// Directory the engines run in and repository assets are written to.
    pub workdir: PathBuf,
    pub files: Vec<PathBuf>,
    pub integrity_check: bool,
    pub cve_scan: bool,
    pub github_assets: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failed { code: Option<i32> },
    /// Preparing or launching the engine went wrong.
    Fatal(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub fatal: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Success => self.succeeded += 1,
            Outcome::Failed { .. } => self.failed += 1,
            Outcome::Fatal(_) => self.fatal += 1,
        }
    }
}

#[derive(Debug, Clone)]
pub enum RunEvent {
    Log(String),
    Outcome { file: PathBuf, outcome: Outcome },
    /// Sent exactly once, after the last file.
    Finished(RunSummary),
}

/// Arguments handed to the interpreter to package `script`.
pub fn engine_args(engine: Engine, script: &Path) -> Vec<OsString> {
    let flags: &[&str] = match engine {
        Engine::PyInstaller => &["--clean", "-F", "-w"],
        Engine::Nuitka => &[
            "--standalone",
            "--onefile",
            "--remove-output",
            "--windows-console-mode=disable",
        ],
    };

    let mut args: Vec<OsString> = vec!["-m".into(), engine.module().into()];
    args.extend(flags.iter().map(OsString::from));
    args.push(script.as_os_str().to_owned());
    args
}

/// Build the engine invocation for `script`, run from `workdir` so build
/// output lands there.
///
/// # Arguments
///
/// * `interpreter` - Program and leading arguments used to reach the engine
/// * `engine` - Which engine module to run
/// * `script` - The script to package (the wrapper, for Pro runs)
/// * `workdir` - Working directory of the engine process
pub fn packaging_command(
    interpreter: &Interpreter,
    engine: Engine,
    script: &Path,
    workdir: &Path,
) -> Command {
    let mut cmd = interpreter.command();
    cmd.args(engine_args(engine, script)).current_dir(workdir);
    cmd
}

/// File name of `path` as shown in the log, falling back to the whole path.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

struct Reporter<'a> {
    events: &'a UnboundedSender<RunEvent>,
    lang: Lang,
    edition: Edition,
}

impl Reporter<'_> {
    fn send(&self, event: RunEvent) {
        // A closed channel means the window is gone; the run still finishes.
        let _ = self.events.send(event);
    }

    fn log(&self, line: impl Into<String>) {
        self.send(RunEvent::Log(line.into()));
    }

    fn say(&self, key: Key, args: &[&str]) {
        self.log(i18n::tf(self.lang, self.edition, key, args));
    }

    fn engine_line(&self, raw: &[u8]) {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim();
        debug!("[engine] {}", line);
        self.log(format!("  {}", line));
    }
}

/// Package every file in `job`, reporting through `events`.
///
/// Individual files never abort the run: a non-zero exit or an error while
/// preparing a file is reported and the next file is processed.
pub async fn run(job: BuildJob, events: UnboundedSender<RunEvent>) -> RunSummary {
    let report = Reporter {
        events: &events,
        lang: job.lang,
        edition: job.edition,
    };
    info!(
        "Starting run: {} file(s) with {} in {:?}",
        job.files.len(),
        job.engine.display_name(),
        job.workdir
    );

    if job.edition.is_pro() && job.github_assets {
        if let Some(first) = job.files.first() {
            let project = first
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            report.say(Key::AssetsStart, &[]);
            match pro::write_github_assets(&job.workdir, &project) {
                Ok(()) => report.say(Key::AssetsDone, &[]),
                Err(e) => report.say(Key::Fatal, &[format!("{e:#}").as_str()]),
            }
        }
    }

    let mut summary = RunSummary::default();
    for file in &job.files {
        let name = display_name(file);
        report.log(i18n::task_header(job.lang, job.edition, &name));

        let outcome = match package_file(&job, file, &report).await {
            Ok(status) if status.success() => Outcome::Success,
            Ok(status) => Outcome::Failed {
                code: status.code(),
            },
            Err(e) => Outcome::Fatal(format!("{e:#}")),
        };
        match &outcome {
            Outcome::Failed { code: Some(code) } => info!("{}: engine exited with {}", name, code),
            other => info!("{}: {:?}", name, other),
        }

        summary.record(&outcome);
        report.send(RunEvent::Outcome {
            file: file.clone(),
            outcome,
        });
    }

    info!("Run finished: {:?}", summary);
    report.send(RunEvent::Finished(summary));
    summary
}

async fn package_file(job: &BuildJob, file: &Path, report: &Reporter<'_>) -> Result<ExitStatus> {
    let mut wrapper = None;

    if job.edition.is_pro() {
        if job.cve_scan {
            report.say(Key::ScanStart, &[]);
            pro::scan_vulnerabilities().await;
            report.say(Key::ScanDone, &[]);
        }
        wrapper = Some(WrapperScript::create(file, job.integrity_check)?);
        report.say(Key::Compiling, &[job.engine.display_name()]);
    }

    let target = wrapper.as_ref().map_or(file, |w| w.path());
    let cmd = packaging_command(&job.interpreter, job.engine, target, &job.workdir);
    stream_output(cmd, report).await
}

/// Run `cmd`, forwarding stdout and stderr line by line until it exits.
///
/// Both `\n` and `\r` end a line, so progress bars that redraw with a
/// carriage return show up as they are drawn. The engine is killed if the
/// output cannot be read or the future is dropped.
///
/// # Errors
///
/// Returns an error if the engine cannot be launched, its output cannot be
/// read, or waiting for it fails.
async fn stream_output(mut cmd: Command, report: &Reporter<'_>) -> Result<ExitStatus> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().context("Failed to launch packaging engine")?;
    let stdout = child
        .stdout
        .take()
        .context("Engine stdout was not captured")?;
    let stderr = child
        .stderr
        .take()
        .context("Engine stderr was not captured")?;

    let mut out = FramedRead::new(stdout, line_codec());
    let mut err = FramedRead::new(stderr, line_codec());
    let (mut out_open, mut err_open) = (true, true);

    while out_open || err_open {
        let (segment, from_stdout) = tokio::select! {
            segment = out.next(), if out_open => (segment, true),
            segment = err.next(), if err_open => (segment, false),
        };
        match segment {
            Some(Ok(line)) if line.is_empty() => (),
            Some(Ok(line)) => report.engine_line(&line),
            Some(Err(e)) => {
                if let Err(kill) = child.start_kill() {
                    debug!("Failed to kill engine: {}", kill);
                }
                return Err(e).context("Failed to read engine output");
            }
            None if from_stdout => out_open = false,
            None => err_open = false,
        }
    }

    child
        .wait()
        .await
        .context("Failed to wait for packaging engine")
}

/// Splits on either line ending. `\r\n` yields an empty piece in between,
/// which the reader skips.
fn line_codec() -> AnyDelimiterCodec {
    AnyDelimiterCodec::new(b"\r\n".to_vec(), b"\n".to_vec())
}

/// Run `job` on a dedicated background thread and return the event stream.
///
/// The channel closes after [`RunEvent::Finished`] has been sent.
pub fn spawn_worker(job: BuildJob) -> UnboundedReceiver<RunEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    let fallback = tx.clone();
    let (lang, edition) = (job.lang, job.edition);

    let spawned = std::thread::Builder::new()
        .name("build-worker".to_string())
        .spawn(move || {
            match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => {
                    runtime.block_on(run(job, tx));
                }
                Err(e) => {
                    error!("Failed to start worker runtime: {}", e);
                    let line = i18n::tf(lang, edition, Key::Fatal, &[e.to_string().as_str()]);
                    let _ = tx.send(RunEvent::Log(line));
                    let _ = tx.send(RunEvent::Finished(RunSummary::default()));
                }
            }
        });

    if let Err(e) = spawned {
        error!("Failed to spawn build worker: {}", e);
        let line = i18n::tf(lang, edition, Key::Fatal, &[e.to_string().as_str()]);
        let _ = fallback.send(RunEvent::Log(line));
        let _ = fallback.send(RunEvent::Finished(RunSummary::default()));
    }

    rx
}
