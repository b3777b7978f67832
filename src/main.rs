use clap::Parser;
use iced::widget::{
    Space, button, checkbox, column, container, horizontal_space, pick_list, row, scrollable,
    text,
};
use iced::{Alignment, Color, Element, Font, Length, Size, Subscription, Task, Theme, keyboard};
use log::{info, warn};
use std::path::{Path, PathBuf};

mod cleanup;
mod config;
mod dispatch;
mod i18n;
mod pro;
mod probe;

use config::{Edition, Engine, Settings, ThemeChoice};
use dispatch::{BuildJob, RunEvent};
use i18n::{Key, Lang};

/// Keep at most this many lines in the log view.
const LOG_LIMIT: usize = 5000;

#[derive(Debug, Parser)]
#[command(name = "pydist-suite", version, about = "Point-and-click front end for PyInstaller and Nuitka")]
struct Cli {
    /// Open this edition directly instead of showing the launcher
    #[arg(long, value_enum)]
    edition: Option<Edition>,

    /// Directory the engines run in; cleanup and repository assets target it too
    #[arg(long)]
    workdir: Option<PathBuf>,
}

fn main() -> iced::Result {
    env_logger::init();
    let cli = Cli::parse();

    let workdir = cli
        .workdir
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    let lang = Lang::from_env();
    let edition = cli.edition;

    info!("Starting PyDist Suite in {:?} ({:?})", workdir, lang);

    // Remove generated wrappers if the run is interrupted from the terminal
    setup_signal_handlers();

    let result = iced::application(PyDist::title, PyDist::update, PyDist::view)
        .theme(PyDist::theme)
        .subscription(PyDist::subscription)
        .window_size(Size::new(1100.0, 900.0))
        .run_with(move || PyDist::new(lang, workdir, edition));

    // A run still in progress when the window closes leaves its wrapper behind
    pro::remove_live_wrappers();
    result
}

fn setup_signal_handlers() {
    use std::sync::atomic::{AtomicBool, Ordering};

    static CLEANUP_DONE: AtomicBool = AtomicBool::new(false);

    let result = ctrlc::set_handler(|| {
        if !CLEANUP_DONE.swap(true, Ordering::SeqCst) {
            info!("Signal received, removing generated wrappers...");
            pro::remove_live_wrappers();
        }
        std::process::exit(0);
    });

    if let Err(e) = result {
        warn!("Failed to install Ctrl-C handler: {}", e);
    }
}

#[derive(Debug, Clone)]
enum Message {
    EditionChosen(Edition),
    SelectFiles,
    FilesSelected(Option<Vec<PathBuf>>),
    Cleanup,
    ToggleTheme,
    EngineSelected(Engine),
    MultiArchToggled(bool),
    IntegrityToggled(bool),
    CveScanToggled(bool),
    GithubAssetsToggled(bool),
    StartPressed,
    EngineProbed(bool),
    Run(RunEvent),
    DismissNotice,
}

struct PyDist {
    lang: Lang,
    workdir: PathBuf,
    screen: Screen,
}

enum Screen {
    Launcher,
    Suite(Suite),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Idle,
    /// Engine probe in flight.
    Checking,
    Running,
}

#[derive(Debug, Clone)]
enum Notice {
    Warning(String),
    Error(String),
    Info(String),
}

struct Suite {
    edition: Edition,
    settings: Settings,
    files: Vec<PathBuf>,
    log: Vec<String>,
    log_id: scrollable::Id,
    run: RunState,
    notice: Option<Notice>,
    github_assets: bool,
}

impl Suite {
    fn new(edition: Edition, lang: Lang) -> Self {
        let mut suite = Self {
            edition,
            settings: config::load_settings(edition),
            files: Vec::new(),
            log: Vec::new(),
            log_id: scrollable::Id::new("log"),
            run: RunState::Idle,
            notice: None,
            github_assets: true,
        };
        suite.push_log(i18n::t(lang, edition, Key::Ready).to_string());
        suite
    }

    /// Open `edition` on `workdir`. The Pro edition makes sure its project
    /// folders exist.
    fn open(edition: Edition, lang: Lang, workdir: &Path) -> Self {
        if edition.is_pro() {
            pro::ensure_project_dirs(workdir);
        }
        Self::new(edition, lang)
    }

    fn is_idle(&self) -> bool {
        self.run == RunState::Idle
    }

    fn push_log(&mut self, line: String) {
        self.log.push(line);
        if self.log.len() > LOG_LIMIT {
            let excess = self.log.len() - LOG_LIMIT;
            self.log.drain(..excess);
        }
    }

    fn scroll_to_end(&self) -> Task<Message> {
        scrollable::snap_to(self.log_id.clone(), scrollable::RelativeOffset::END)
    }

    fn save_settings(&self) {
        if let Err(e) = config::save_settings(self.edition, &self.settings) {
            warn!("Failed to save settings: {}", e);
        }
    }
}

impl PyDist {
    fn new(lang: Lang, workdir: PathBuf, edition: Option<Edition>) -> (Self, Task<Message>) {
        let screen = match edition {
            Some(edition) => Screen::Suite(Suite::open(edition, lang, &workdir)),
            None => Screen::Launcher,
        };

        (
            Self {
                lang,
                workdir,
                screen,
            },
            Task::none(),
        )
    }

    fn title(&self) -> String {
        match &self.screen {
            Screen::Launcher => i18n::launcher::TITLE.to_string(),
            Screen::Suite(suite) => {
                let title = i18n::t(self.lang, suite.edition, Key::Title);
                match suite.run {
                    RunState::Idle => title.to_string(),
                    RunState::Checking => {
                        format!("{} - {}", title, i18n::t(self.lang, suite.edition, Key::Checking))
                    }
                    RunState::Running => {
                        format!("{} - {}", title, i18n::t(self.lang, suite.edition, Key::Running))
                    }
                }
            }
        }
    }

    fn theme(&self) -> Theme {
        match &self.screen {
            Screen::Suite(suite) if suite.settings.theme == ThemeChoice::Dark => Theme::Dark,
            _ => Theme::Light,
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        match self.screen {
            Screen::Suite(_) => keyboard::on_key_press(hotkey),
            Screen::Launcher => Subscription::none(),
        }
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        let lang = self.lang;

        if let Screen::Launcher = self.screen {
            if let Message::EditionChosen(edition) = message {
                info!("[UI] {:?} edition chosen", edition);
                self.screen = Screen::Suite(Suite::open(edition, lang, &self.workdir));
            }
            return Task::none();
        }
        let Screen::Suite(suite) = &mut self.screen else {
            return Task::none();
        };
        let edition = suite.edition;

        match message {
            Message::EditionChosen(_) => Task::none(),
            Message::SelectFiles | Message::Cleanup if !suite.is_idle() => Task::none(),
            Message::SelectFiles => Task::perform(
                async {
                    rfd::AsyncFileDialog::new()
                        .add_filter("Python Files", &["py"])
                        .pick_files()
                        .await
                        .map(|handles| {
                            handles
                                .iter()
                                .map(|handle| handle.path().to_path_buf())
                                .collect::<Vec<PathBuf>>()
                        })
                },
                Message::FilesSelected,
            ),
            Message::FilesSelected(Some(files)) if !files.is_empty() => {
                info!("[UI] {} script(s) selected", files.len());
                suite.files = files;
                let count = suite.files.len().to_string();
                suite.push_log(i18n::tf(lang, edition, Key::Loaded, &[count.as_str()]));
                suite.scroll_to_end()
            }
            Message::FilesSelected(_) => Task::none(),
            Message::Cleanup => {
                suite.push_log(i18n::t(lang, edition, Key::CleanStart).to_string());
                let removed = cleanup::perform_cleanup(&self.workdir, edition).to_string();
                suite.push_log(i18n::tf(lang, edition, Key::CleanDone, &[removed.as_str()]));
                suite.scroll_to_end()
            }
            Message::ToggleTheme => {
                suite.settings.theme = suite.settings.theme.toggled();
                suite.save_settings();
                Task::none()
            }
            Message::EngineSelected(engine) => {
                suite.settings.engine = engine;
                Task::none()
            }
            Message::MultiArchToggled(value) => {
                suite.settings.multi_arch = value;
                Task::none()
            }
            Message::IntegrityToggled(value) => {
                suite.settings.integrity_check = value;
                Task::none()
            }
            Message::CveScanToggled(value) => {
                suite.settings.cve_scan = value;
                Task::none()
            }
            Message::GithubAssetsToggled(value) => {
                suite.github_assets = value;
                Task::none()
            }
            Message::StartPressed => {
                if !suite.is_idle() {
                    return Task::none();
                }
                if suite.files.is_empty() {
                    suite.notice = Some(Notice::Warning(
                        i18n::t(lang, edition, Key::SelectFirst).to_string(),
                    ));
                    return Task::none();
                }

                info!("[UI] Start pressed, checking {}", suite.settings.engine);
                suite.save_settings();
                suite.run = RunState::Checking;
                suite.notice = None;

                let interpreter = suite.settings.interpreter();
                let engine = suite.settings.engine;
                Task::perform(
                    async move { probe::engine_available(&interpreter, engine).await },
                    Message::EngineProbed,
                )
            }
            Message::EngineProbed(false) => {
                let engine = suite.settings.engine.id();
                warn!("[UI] {} unavailable, run aborted", engine);
                suite.run = RunState::Idle;
                suite.notice = Some(Notice::Error(i18n::tf(
                    lang,
                    edition,
                    Key::EngineMissing,
                    &[engine, engine],
                )));
                Task::none()
            }
            Message::EngineProbed(true) => {
                suite.run = RunState::Running;
                let job = BuildJob {
                    edition,
                    lang,
                    engine: suite.settings.engine,
                    interpreter: suite.settings.interpreter(),
                    workdir: self.workdir.clone(),
                    files: suite.files.clone(),
                    integrity_check: suite.settings.integrity_check,
                    cve_scan: suite.settings.cve_scan,
                    github_assets: suite.github_assets,
                };

                let events = dispatch::spawn_worker(job);
                let stream = iced::futures::stream::unfold(events, |mut events| async move {
                    events.recv().await.map(|event| (event, events))
                });
                Task::run(stream, Message::Run)
            }
            Message::Run(RunEvent::Log(line)) => {
                suite.push_log(line);
                suite.scroll_to_end()
            }
            Message::Run(RunEvent::Outcome { file, outcome }) => {
                let name = dispatch::display_name(&file);
                suite.push_log(i18n::outcome_line(lang, edition, &name, &outcome));
                suite.scroll_to_end()
            }
            Message::Run(RunEvent::Finished(summary)) => {
                info!("[UI] Run finished: {:?}", summary);
                suite.run = RunState::Idle;
                let finished_at = chrono::Local::now().format("%H:%M:%S");
                suite.notice = Some(Notice::Info(format!(
                    "{} ({} ✓ / {} ✗, {})",
                    i18n::t(lang, edition, Key::Finished),
                    summary.succeeded,
                    summary.failed + summary.fatal,
                    finished_at
                )));
                suite.scroll_to_end()
            }
            Message::DismissNotice => {
                suite.notice = None;
                Task::none()
            }
        }
    }

    fn view(&self) -> Element<'_, Message> {
        match &self.screen {
            Screen::Launcher => view_launcher(),
            Screen::Suite(suite) => view_suite(suite, self.lang),
        }
    }
}

fn hotkey(key: keyboard::Key, modifiers: keyboard::Modifiers) -> Option<Message> {
    if !modifiers.command() {
        return None;
    }
    match key.as_ref() {
        keyboard::Key::Character("o") => Some(Message::SelectFiles),
        keyboard::Key::Named(keyboard::key::Named::Enter) => Some(Message::StartPressed),
        _ => None,
    }
}

fn view_launcher<'a>() -> Element<'a, Message> {
    use i18n::launcher;

    let content = column![
        text(launcher::HEADER).size(24),
        text(launcher::SUBHEADER).size(13),
        Space::with_height(25),
        text(launcher::PROMPT).size(15),
        Space::with_height(10),
        button(text(launcher::STANDARD).size(14))
            .on_press(Message::EditionChosen(Edition::Standard))
            .padding(12)
            .width(Length::Fill)
            .style(button::secondary),
        button(text(launcher::PRO).size(14))
            .on_press(Message::EditionChosen(Edition::Pro))
            .padding(12)
            .width(Length::Fill),
    ]
    .spacing(8)
    .padding(50)
    .max_width(600);

    container(content).center_x(Length::Fill).into()
}

fn view_suite<'a>(suite: &'a Suite, lang: Lang) -> Element<'a, Message> {
    let edition = suite.edition;
    let tr = |key| i18n::t(lang, edition, key);
    let idle = suite.is_idle();

    let header = row![
        text(tr(Key::Header)).size(22),
        horizontal_space(),
        button(text(tr(Key::Select)))
            .on_press_maybe(idle.then_some(Message::SelectFiles))
            .style(button::secondary),
        button(text(tr(Key::Cleanup)))
            .on_press_maybe(idle.then_some(Message::Cleanup))
            .style(button::secondary),
        button(text(tr(Key::Theme)))
            .on_press(Message::ToggleTheme)
            .style(button::secondary),
    ]
    .spacing(8)
    .align_y(Alignment::Center);

    let settings = &suite.settings;
    let engine_picker = pick_list(Engine::ALL, Some(settings.engine), Message::EngineSelected);
    let multi_arch = checkbox(tr(Key::MultiArch), settings.multi_arch)
        .on_toggle(Message::MultiArchToggled);

    let options: Element<'a, Message> = if edition.is_pro() {
        let security = panel(
            tr(Key::SecurityFrame),
            column![
                checkbox(tr(Key::Integrity), settings.integrity_check)
                    .on_toggle(Message::IntegrityToggled),
                checkbox(tr(Key::CveScan), settings.cve_scan).on_toggle(Message::CveScanToggled),
            ]
            .spacing(6)
            .into(),
        );
        let engineering = panel(
            tr(Key::EngineeringFrame),
            column![
                text(tr(Key::Engine)),
                engine_picker.width(Length::Fill),
                multi_arch,
                checkbox(tr(Key::GithubAssets), suite.github_assets)
                    .on_toggle(Message::GithubAssetsToggled),
            ]
            .spacing(6)
            .into(),
        );
        row![security, engineering].spacing(15).into()
    } else {
        panel(
            tr(Key::Settings),
            row![text(tr(Key::Engine)), engine_picker, Space::with_width(20), multi_arch]
                .spacing(10)
                .align_y(Alignment::Center)
                .into(),
        )
    };

    let selected = suite
        .files
        .iter()
        .map(|file| dispatch::display_name(file))
        .collect::<Vec<_>>()
        .join(", ");

    let log_lines = suite
        .log
        .iter()
        .map(|line| -> Element<'a, Message> {
            text(line.as_str()).font(Font::MONOSPACE).size(13).into()
        });
    let log_view = container(
        scrollable(column(log_lines).spacing(2).width(Length::Fill))
            .id(suite.log_id.clone())
            .height(Length::Fill),
    )
    .padding(8)
    .width(Length::Fill)
    .height(Length::Fill)
    .style(container::bordered_box);

    let footer = row![
        horizontal_space(),
        button(text(tr(Key::Start)).size(16))
            .on_press_maybe(idle.then_some(Message::StartPressed))
            .padding(10)
            .style(button::primary),
    ];

    let mut content = column![header, options, text(selected).size(12)]
        .spacing(15)
        .padding(30);

    if let Some(notice) = &suite.notice {
        content = content.push(view_notice(notice, tr(Key::Dismiss)));
    }

    content.push(log_view).push(footer).into()
}

fn panel<'a>(title: &'a str, body: Element<'a, Message>) -> Element<'a, Message> {
    container(column![text(title).size(14), body].spacing(10))
        .padding(15)
        .width(Length::Fill)
        .style(container::bordered_box)
        .into()
}

fn view_notice<'a>(notice: &'a Notice, dismiss: &'a str) -> Element<'a, Message> {
    let (body, color) = match notice {
        Notice::Warning(body) => (body, Color::from_rgb8(0xc7, 0x8a, 0x00)),
        Notice::Error(body) => (body, Color::from_rgb8(0xd1, 0x34, 0x38)),
        Notice::Info(body) => (body, Color::from_rgb8(0x10, 0x7c, 0x10)),
    };

    container(
        row![
            text(body.as_str()).size(14).color(color),
            horizontal_space(),
            button(text(dismiss))
                .on_press(Message::DismissNotice)
                .style(button::text),
        ]
        .spacing(10)
        .align_y(Alignment::Center),
    )
    .padding(10)
    .width(Length::Fill)
    .style(container::rounded_box)
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suite(edition: Edition) -> Suite {
        Suite {
            edition,
            settings: Settings::defaults(edition),
            files: Vec::new(),
            log: Vec::new(),
            log_id: scrollable::Id::new("log"),
            run: RunState::Idle,
            notice: None,
            github_assets: true,
        }
    }

    fn app(edition: Edition) -> PyDist {
        PyDist {
            lang: Lang::En,
            workdir: std::env::temp_dir(),
            screen: Screen::Suite(suite(edition)),
        }
    }

    fn suite_of(app: &PyDist) -> &Suite {
        match &app.screen {
            Screen::Suite(suite) => suite,
            Screen::Launcher => panic!("expected the suite screen"),
        }
    }

    #[test]
    fn start_without_files_warns_and_stays_idle() {
        let mut app = app(Edition::Standard);
        let _ = app.update(Message::StartPressed);

        let suite = suite_of(&app);
        assert_eq!(suite.run, RunState::Idle);
        assert!(matches!(&suite.notice, Some(Notice::Warning(msg)) if msg == "Please select a script."));
    }

    #[test]
    fn missing_engine_aborts_before_running() {
        let mut app = app(Edition::Pro);
        if let Screen::Suite(suite) = &mut app.screen {
            suite.files = vec![PathBuf::from("a.py")];
            suite.run = RunState::Checking;
        }
        let _ = app.update(Message::EngineProbed(false));

        let suite = suite_of(&app);
        assert_eq!(suite.run, RunState::Idle);
        assert!(matches!(&suite.notice, Some(Notice::Error(msg)) if msg.contains("pip install nuitka")));
    }

    #[test]
    fn run_events_land_in_the_log_and_finish_returns_to_idle() {
        let mut app = app(Edition::Standard);
        if let Screen::Suite(suite) = &mut app.screen {
            suite.run = RunState::Running;
        }

        let _ = app.update(Message::Run(RunEvent::Log("  compiling".into())));
        let _ = app.update(Message::Run(RunEvent::Outcome {
            file: PathBuf::from("/work/script.py"),
            outcome: dispatch::Outcome::Success,
        }));
        let _ = app.update(Message::Run(RunEvent::Finished(dispatch::RunSummary {
            succeeded: 1,
            ..Default::default()
        })));

        let suite = suite_of(&app);
        assert_eq!(suite.log, ["  compiling", "✓ script.py Success!"]);
        assert_eq!(suite.run, RunState::Idle);
        assert!(matches!(&suite.notice, Some(Notice::Info(msg)) if msg.starts_with("All tasks completed.")));
    }

    #[test]
    fn log_is_capped() {
        let mut suite = suite(Edition::Standard);
        for i in 0..LOG_LIMIT + 10 {
            suite.push_log(i.to_string());
        }
        assert_eq!(suite.log.len(), LOG_LIMIT);
        assert_eq!(suite.log[0], "10");
    }

    #[test]
    fn launcher_ignores_everything_but_an_edition_choice() {
        let mut app = PyDist {
            lang: Lang::En,
            workdir: std::env::temp_dir(),
            screen: Screen::Launcher,
        };
        let _ = app.update(Message::StartPressed);
        let _ = app.update(Message::Cleanup);
        assert!(matches!(app.screen, Screen::Launcher));
    }

    #[test]
    fn launcher_switches_to_the_chosen_edition() {
        let config = tempfile::tempdir().unwrap();
        let workdir = tempfile::tempdir().unwrap();
        // SAFETY: no other test reads or writes XDG_CONFIG_HOME.
        unsafe { std::env::set_var("XDG_CONFIG_HOME", config.path()) };

        let mut app = PyDist {
            lang: Lang::En,
            workdir: workdir.path().to_path_buf(),
            screen: Screen::Launcher,
        };
        let _ = app.update(Message::EditionChosen(Edition::Pro));

        let suite = suite_of(&app);
        assert_eq!(suite.edition, Edition::Pro);
        assert_eq!(suite.settings, Settings::defaults(Edition::Pro));
        assert_eq!(suite.run, RunState::Idle);
        assert_eq!(suite.log, [i18n::t(Lang::En, Edition::Pro, Key::Ready)]);
        for dir in pro::PROJECT_DIRS {
            assert!(workdir.path().join(dir).is_dir());
        }
        assert_eq!(app.title(), i18n::t(Lang::En, Edition::Pro, Key::Title));

        // Choosing again once the suite is open changes nothing.
        let _ = app.update(Message::EditionChosen(Edition::Standard));
        assert_eq!(suite_of(&app).edition, Edition::Pro);
    }

    #[test]
    fn select_and_cleanup_are_ignored_while_busy() {
        let workdir = tempfile::tempdir().unwrap();
        std::fs::create_dir(workdir.path().join("build")).unwrap();
        let mut app = app(Edition::Standard);
        app.workdir = workdir.path().to_path_buf();
        if let Screen::Suite(suite) = &mut app.screen {
            suite.run = RunState::Running;
        }

        let _ = app.update(Message::Cleanup);
        let _ = app.update(Message::SelectFiles);

        assert!(workdir.path().join("build").is_dir());
        assert!(suite_of(&app).log.is_empty());
    }

    #[test]
    fn toggles_only_touch_memory() {
        let mut app = app(Edition::Pro);
        let _ = app.update(Message::EngineSelected(Engine::PyInstaller));
        let _ = app.update(Message::CveScanToggled(false));
        let _ = app.update(Message::GithubAssetsToggled(false));

        let suite = suite_of(&app);
        assert_eq!(suite.settings.engine, Engine::PyInstaller);
        assert!(!suite.settings.cve_scan);
        assert!(!suite.github_assets);
    }
}
