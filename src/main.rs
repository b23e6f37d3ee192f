use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    time::{Duration, SystemTime},
};

use treetype::{
    app_dirs::AppDirs,
    config::{ConfigStore, FileConfigStore, UserConfig},
    controller::SessionController,
    diagnostics, exclusion, logging,
    preset::{Language, Preset},
    runtime::{CrosstermInputSource, FixedTicker, InputSource, Runner, SessionInput, Ticker},
    session::SessionPhase,
    snippet::{self, SnippetData, SnippetInfo},
    stats::StatsDb,
    ui::SessionView,
};

const TICK_RATE_MS: u64 = 25;

/// type real source code, token by token
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A code typing trainer. Snippets are tokenized source files; the typing mode decides which tokens you type and which are shown but skipped."
)]
pub struct Cli {
    /// tokenized snippet JSON file to practice
    #[clap(short = 's', long)]
    snippet: Option<PathBuf>,

    /// language of the built-in snippet
    #[clap(short = 'l', long, value_enum)]
    language: Option<Language>,

    /// typing mode
    #[clap(short = 'p', long, value_enum)]
    preset: Option<Preset>,

    /// practice a random snippet JSON from this directory
    #[clap(short = 'r', long, conflicts_with = "snippet")]
    random: Option<PathBuf>,

    /// print a token diagnostics report as JSON and exit
    #[clap(long)]
    diagnose: bool,

    /// write practice stats to a CSV file and exit
    #[clap(long, value_name = "CSV")]
    export_stats: Option<PathBuf>,

    /// log file (filter with TREETYPE_LOG)
    #[clap(long)]
    log: Option<PathBuf>,
}

impl Cli {
    /// Stored config with command line overrides applied.
    fn apply_to(&self, stored: UserConfig) -> UserConfig {
        UserConfig {
            preset: self.preset.unwrap_or(stored.preset),
            language: self.language.unwrap_or(stored.language),
        }
    }
}

/// What the app does with a key before the session sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AppAction {
    Quit,
    CyclePreset,
    CycleLanguage,
    Session,
}

fn app_action(key: &KeyEvent) -> AppAction {
    if key.kind != KeyEventKind::Press || !key.modifiers.contains(KeyModifiers::CONTROL) {
        return AppAction::Session;
    }
    match key.code {
        KeyCode::Char('c') => AppAction::Quit,
        KeyCode::Char('p') => AppAction::CyclePreset,
        KeyCode::Char('l') => AppAction::CycleLanguage,
        _ => AppAction::Session,
    }
}

struct App<S: ConfigStore> {
    controller: SessionController<()>,
    config: UserConfig,
    store: S,
}

impl<S: ConfigStore> App<S> {
    fn new(controller: SessionController<()>, config: UserConfig, store: S) -> Self {
        Self {
            controller,
            config,
            store,
        }
    }

    /// Returns false once the app should exit.
    fn on_key(&mut self, key: KeyEvent, now: SystemTime) -> bool {
        match app_action(&key) {
            AppAction::Quit => return false,
            AppAction::CyclePreset => {
                let next = self.controller.preset().next();
                self.controller.set_preset(next, now);
                self.config.preset = next;
                self.save_config();
            }
            AppAction::CycleLanguage => self.switch_language(self.controller.language().next()),
            AppAction::Session => {
                self.controller.handle_key(&key, now);
            }
        }
        true
    }

    /// Start over on the built-in snippet of `language`.
    fn switch_language(&mut self, language: Language) {
        match SnippetData::embedded(language) {
            Ok(data) => {
                self.controller
                    .replace_snippet(data, SnippetInfo::embedded(language));
                self.config.language = language;
                self.save_config();
            }
            Err(err) => tracing::warn!(%language, %err, "could not load snippet"),
        }
    }

    fn save_config(&self) {
        if let Err(err) = self.store.save(&self.config) {
            tracing::warn!(%err, "could not save config");
        }
    }
}

fn load_snippet(cli: &Cli, language: Language) -> treetype::Result<(SnippetData, SnippetInfo)> {
    let path = match (&cli.snippet, &cli.random) {
        (Some(path), _) => Some(path.clone()),
        (None, Some(dir)) => Some(snippet::random_snippet_path(dir)?),
        (None, None) => None,
    };
    match path {
        Some(path) => {
            let data = SnippetData::load(&path)?;
            let info = SnippetInfo::from_path(&path, data.language);
            Ok((data, info))
        }
        None => Ok((
            SnippetData::embedded(language)?,
            SnippetInfo::embedded(language),
        )),
    }
}

fn diagnose(cli: &Cli, preset: Preset) -> treetype::Result<String> {
    let raw = match (&cli.snippet, &cli.random) {
        (None, None) => Language::ALL
            .into_iter()
            .map(SnippetData::embedded)
            .collect::<treetype::Result<Vec<_>>>()?,
        _ => vec![load_snippet(cli, Language::default())?.0],
    };
    let filtered: Vec<SnippetData> = raw
        .iter()
        .map(|snippet| exclusion::apply_to_snippet(snippet, preset))
        .collect();
    diagnostics::compare_languages(&filtered);
    diagnostics::export_diagnostics(&filtered)
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if let Some(path) = cli.log.clone().or_else(AppDirs::log_path) {
        if let Err(err) = logging::init(&path) {
            eprintln!("treetype: logging disabled: {err}");
        }
    }

    let store = FileConfigStore::new();
    let config = cli.apply_to(store.load());
    if let Err(err) = store.save(&config) {
        tracing::warn!(%err, "could not save config");
    }

    if cli.diagnose {
        println!("{}", diagnose(&cli, config.preset)?);
        return Ok(());
    }
    if let Some(csv) = &cli.export_stats {
        let rows = StatsDb::open_default()?.export_csv(csv)?;
        println!("exported {rows} snippet(s) to {}", csv.display());
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let (data, info) = load_snippet(&cli, config.language)?;
    tracing::info!(
        snippet = info.id.as_deref().unwrap_or("?"),
        language = %data.language,
        preset = %config.preset,
        "starting session"
    );

    let mut controller = SessionController::new(data, info, config.preset, ());
    match StatsDb::open_default() {
        Ok(db) => controller = controller.with_recorder(Box::new(db)),
        Err(err) => tracing::warn!(%err, "practice stats disabled"),
    }

    let app = App::new(controller, config, store);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let runner = Runner::new(
        CrosstermInputSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let res = start_tui(&mut terminal, app, &runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn start_tui<B, S, I, T>(
    terminal: &mut Terminal<B>,
    mut app: App<S>,
    runner: &Runner<I, T>,
) -> Result<(), Box<dyn Error>>
where
    B: Backend,
    S: ConfigStore,
    I: InputSource,
    T: Ticker,
{
    terminal.draw(|f| f.render_widget(SessionView::new(&app.controller, SystemTime::now()), f.area()))?;

    loop {
        let now = SystemTime::now();
        let redraw = match runner.step() {
            SessionInput::Tick => {
                let advanced = app.controller.poll(now);
                // the clock and wpm move while typing
                advanced || app.controller.phase() == SessionPhase::Running
            }
            SessionInput::Resize => true,
            SessionInput::Key(key) => {
                if !app.on_key(key, now) {
                    break;
                }
                true
            }
        };

        if redraw {
            terminal.draw(|f| f.render_widget(SessionView::new(&app.controller, now), f.area()))?;
        }
    }

    tracing::info!("quit");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default, Clone)]
    struct MemoryStore(Rc<RefCell<Option<UserConfig>>>);

    impl ConfigStore for MemoryStore {
        fn load(&self) -> UserConfig {
            self.0.borrow().unwrap_or_default()
        }

        fn save(&self, cfg: &UserConfig) -> io::Result<()> {
            *self.0.borrow_mut() = Some(*cfg);
            Ok(())
        }
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn app(store: MemoryStore) -> App<MemoryStore> {
        let language = Language::Javascript;
        let controller = SessionController::new(
            SnippetData::embedded(language).unwrap(),
            SnippetInfo::embedded(language),
            Preset::Standard,
            (),
        );
        App::new(controller, store.load(), store)
    }

    #[test]
    fn cli_defaults_leave_config_alone() {
        let cli = Cli::try_parse_from(["treetype"]).unwrap();
        let stored = UserConfig {
            preset: Preset::Full,
            language: Language::Tsx,
        };
        assert_eq!(cli.apply_to(stored), stored);
        assert!(!cli.diagnose);
    }

    #[test]
    fn cli_overrides_config() {
        let cli =
            Cli::try_parse_from(["treetype", "--preset", "minimal", "-l", "typescript"]).unwrap();
        assert_eq!(
            cli.apply_to(UserConfig::default()),
            UserConfig {
                preset: Preset::Minimal,
                language: Language::Typescript,
            }
        );
    }

    #[test]
    fn cli_rejects_unknown_values() {
        assert!(Cli::try_parse_from(["treetype", "--preset", "turbo"]).is_err());
        assert!(Cli::try_parse_from(["treetype", "-s", "a.json", "-r", "dir"]).is_err());
    }

    #[test]
    fn control_keys_are_app_actions() {
        assert_eq!(app_action(&ctrl('c')), AppAction::Quit);
        assert_eq!(app_action(&ctrl('p')), AppAction::CyclePreset);
        assert_eq!(app_action(&ctrl('l')), AppAction::CycleLanguage);
        assert_eq!(app_action(&ctrl('x')), AppAction::Session);
        assert_eq!(
            app_action(&KeyEvent::new(KeyCode::Char('p'), KeyModifiers::NONE)),
            AppAction::Session
        );
    }

    #[test]
    fn cycling_preset_saves_config() {
        let store = MemoryStore::default();
        let mut app = app(store.clone());

        assert!(app.on_key(ctrl('p'), SystemTime::now()));
        assert_eq!(app.controller.preset(), Preset::Full);
        assert_eq!(store.load().preset, Preset::Full);

        assert!(app.on_key(ctrl('p'), SystemTime::now()));
        assert_eq!(store.load().preset, Preset::Minimal);
    }

    #[test]
    fn cycling_language_loads_next_snippet_and_saves_config() {
        let store = MemoryStore::default();
        let mut app = app(store.clone());
        let t0 = SystemTime::now();
        app.on_key(KeyEvent::new(KeyCode::Char('x'), KeyModifiers::NONE), t0);
        assert_eq!(app.controller.phase(), SessionPhase::Running);

        assert!(app.on_key(ctrl('l'), t0));
        assert_eq!(app.controller.language(), Language::Typescript);
        assert_eq!(app.controller.info().id.as_deref(), Some("typescript-default"));
        assert_eq!(app.controller.phase(), SessionPhase::Idle);
        assert_eq!(app.controller.state().total_chars_typed, 0);
        assert_eq!(store.load().language, Language::Typescript);
        // typing mode survives the switch
        assert_eq!(app.controller.preset(), Preset::Standard);
    }

    #[test]
    fn ctrl_c_quits() {
        let mut app = app(MemoryStore::default());
        assert!(!app.on_key(ctrl('c'), SystemTime::now()));
    }

    #[test]
    fn embedded_diagnostics_report_every_language() {
        let cli = Cli::try_parse_from(["treetype", "--diagnose"]).unwrap();
        let json = diagnose(&cli, Preset::Standard).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value.as_array().unwrap().len(), Language::ALL.len());
    }
}
