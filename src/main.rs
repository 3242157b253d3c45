mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use drillcall::{
    audio::{CuePlayer, NullPlayer, SystemPlayer},
    command::Library,
    config::{ConfigStore, FileConfigStore},
    runtime::{CrosstermEventSource, DrillEvent, FixedTicker, Runner},
    schedule::SessionConfig,
    session::{SessionEvent, SessionPhase, TrainingSession},
    stats::{HistoryDb, PlayRecord, SessionRecord},
    storage::{FileLibraryStore, LibraryStore},
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    collections::HashMap,
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

const TICK_RATE_MS: u64 = 100;

/// How long the "now playing" banner stays up after a cue fires.
const BANNER_MS: u64 = 3000;

const DURATION_STEP_SECS: u64 = 30;
const DURATION_MIN_SECS: u64 = 60;
const DURATION_MAX_SECS: u64 = 1800;

/// terminal drill trainer with randomized voice-command cues
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal drill trainer: build a library of voice commands, group them, then run a timed session that calls them out at randomized, spaced moments while tracking play counts."
)]
pub struct Cli {
    /// session length in seconds (overrides the saved setting)
    #[clap(short = 'd', long)]
    duration: Option<u64>,

    /// smallest break between two cues, in seconds
    #[clap(long)]
    min_break: Option<f64>,

    /// largest break between two cues, in seconds
    #[clap(long)]
    max_break: Option<f64>,

    /// seed the schedule randomness for a reproducible session
    #[clap(long)]
    seed: Option<u64>,

    /// discard audio output instead of playing cues
    #[clap(long)]
    mute: bool,

    /// export the play history as CSV to the given path and exit
    #[clap(long, value_name = "PATH")]
    export_history: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, strum_macros::Display)]
pub enum Screen {
    Library,
    Setup,
    Session,
}

/// A row in the library list: group headers interleaved with their
/// commands, ungrouped commands last.
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Group(String),
    Command(String),
}

/// What the text-input overlay is collecting, and for which target.
#[derive(Debug, Clone, PartialEq)]
pub enum InputAction {
    AddCommand,
    AddGroup,
    RenameCommand(String),
    RenameGroup(String),
    SetAudioPath(String),
    SetCount(String),
    BatchCount,
    SavePreset,
}

#[derive(Debug, Clone)]
pub struct InputState {
    pub action: InputAction,
    pub buffer: String,
}

impl InputState {
    pub fn prompt(&self) -> &'static str {
        match self.action {
            InputAction::AddCommand => "new command name",
            InputAction::AddGroup => "new group name",
            InputAction::RenameCommand(_) => "rename command",
            InputAction::RenameGroup(_) => "rename group",
            InputAction::SetAudioPath(_) => "audio file path (empty clears)",
            InputAction::SetCount(_) => "session count",
            InputAction::BatchCount => "session count for selection",
            InputAction::SavePreset => "preset name",
        }
    }
}

pub struct App {
    pub library: Library,
    pub config: SessionConfig,
    pub screen: Screen,
    pub cursor: usize,
    pub preset_cursor: usize,
    pub show_presets: bool,
    pub input: Option<InputState>,
    pub status: Option<String>,
    pub session: Option<TrainingSession>,
    pub now_playing: Option<(String, u64)>,
    pub last_played: HashMap<String, chrono::DateTime<chrono::Local>>,
    seed: Option<u64>,
    player: Box<dyn CuePlayer>,
    history: Option<HistoryDb>,
    library_store: Box<dyn LibraryStore>,
    config_store: Box<dyn ConfigStore>,
    session_started_at: Option<chrono::DateTime<chrono::Local>>,
    dirty: bool,
}

impl App {
    fn new(cli: &Cli) -> Self {
        let library_store: Box<dyn LibraryStore> = Box::new(FileLibraryStore::new());
        let config_store: Box<dyn ConfigStore> = Box::new(FileConfigStore::new());
        let library = library_store.load();
        let mut config = config_store.load();

        if let Some(duration) = cli.duration {
            config.duration_secs = duration;
        }
        if let Some(min_break) = cli.min_break {
            config.min_break_secs = min_break;
        }
        if let Some(max_break) = cli.max_break {
            config.max_break_secs = max_break;
        }

        let player: Box<dyn CuePlayer> = if cli.mute {
            Box::new(NullPlayer::new())
        } else {
            Box::new(SystemPlayer)
        };

        let history = HistoryDb::new().ok();

        let mut app = Self {
            library,
            config,
            screen: Screen::Library,
            cursor: 0,
            preset_cursor: 0,
            show_presets: false,
            input: None,
            status: None,
            session: None,
            now_playing: None,
            last_played: HashMap::new(),
            seed: cli.seed,
            player,
            history,
            library_store,
            config_store,
            session_started_at: None,
            dirty: false,
        };
        app.refresh_last_played();
        app
    }

    /// Group headers and commands in display order, ungrouped last.
    pub fn visible_rows(&self) -> Vec<Row> {
        use itertools::Itertools;

        let mut rows = Vec::new();
        for group in self.library.groups.iter().sorted_by_key(|g| g.order) {
            rows.push(Row::Group(group.id.clone()));
            for cmd in self
                .library
                .commands
                .iter()
                .filter(|c| c.group_id.as_deref() == Some(group.id.as_str()))
                .sorted_by_key(|c| c.order)
            {
                rows.push(Row::Command(cmd.id.clone()));
            }
        }
        for cmd in self
            .library
            .commands
            .iter()
            .filter(|c| c.group_id.is_none())
            .sorted_by_key(|c| c.order)
        {
            rows.push(Row::Command(cmd.id.clone()));
        }
        rows
    }

    fn row_at_cursor(&self) -> Option<Row> {
        self.visible_rows().get(self.cursor).cloned()
    }

    fn clamp_cursor(&mut self) {
        let len = self.visible_rows().len();
        if len == 0 {
            self.cursor = 0;
        } else if self.cursor >= len {
            self.cursor = len - 1;
        }
    }

    fn refresh_last_played(&mut self) {
        if let Some(ref history) = self.history {
            if let Ok(summary) = history.play_summary() {
                self.last_played = summary
                    .into_iter()
                    .filter_map(|s| s.last_played.map(|at| (s.command_id, at)))
                    .collect();
            }
        }
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn flush_library(&mut self) {
        if self.dirty {
            let _ = self.library_store.save(&self.library);
            self.dirty = false;
        }
    }

    // ── Session wiring ───────────────────────────────────────────────

    fn start_session(&mut self) {
        if !self.library.can_start() {
            self.status = Some(
                "cannot start: select commands with counts and audio first".to_string(),
            );
            return;
        }
        let items = self.library.training_ready();
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.session = Some(TrainingSession::begin(
            &items,
            self.config.clone(),
            &mut rng,
            now_ms(),
        ));
        self.session_started_at = Some(chrono::Local::now());
        self.now_playing = None;
        self.status = None;
        self.screen = Screen::Session;
        let _ = self.config_store.save(&self.config);
    }

    fn on_tick(&mut self) {
        let now = now_ms();

        if let Some((_, deadline)) = self.now_playing {
            if now >= deadline {
                self.now_playing = None;
            }
        }

        let events = match self.session.as_mut() {
            Some(session) => session.tick(now),
            None => Vec::new(),
        };
        self.apply_session_events(events, now);

        self.flush_library();
    }

    fn apply_session_events(&mut self, events: Vec<SessionEvent>, now: u64) {
        for event in events {
            match event {
                SessionEvent::CuePlay { command_id, name } => {
                    if let Some(path) = self
                        .library
                        .command(&command_id)
                        .and_then(|c| c.audio_path.clone())
                    {
                        self.player.play(&path);
                    }
                    self.library.record_play(&command_id);
                    self.mark_dirty();
                    if let Some(ref history) = self.history {
                        let _ = history.record_play(&PlayRecord {
                            command_id: command_id.clone(),
                            command_name: name.clone(),
                            played_at: chrono::Local::now(),
                        });
                    }
                    self.now_playing = Some((name, now + BANNER_MS));
                }
                SessionEvent::Completed => {
                    self.status = Some("session complete".to_string());
                }
                SessionEvent::Terminated => self.finish_session(),
            }
        }
    }

    fn finish_session(&mut self) {
        if let Some(session) = self.session.take() {
            if let (Some(history), Some(started_at)) =
                (self.history.as_ref(), self.session_started_at)
            {
                let _ = history.record_session(&SessionRecord {
                    started_at,
                    duration_secs: session.duration_secs(),
                    cues_planned: session.cues_planned(),
                    cues_played: session.cues_played(),
                });
            }
        }
        self.session_started_at = None;
        self.now_playing = None;
        self.mark_dirty();
        self.flush_library();
        self.refresh_last_played();
        self.screen = Screen::Setup;
    }

    fn end_session(&mut self) {
        let events = match self.session.as_mut() {
            Some(session) => session.end(),
            None => Vec::new(),
        };
        self.apply_session_events(events, now_ms());
    }

    // ── Key handling ─────────────────────────────────────────────────

    /// Returns true when the app should exit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.end_session();
            return true;
        }

        if self.input.is_some() {
            self.handle_input_key(key);
            return false;
        }

        match self.screen {
            Screen::Library => self.handle_library_key(key),
            Screen::Setup => self.handle_setup_key(key),
            Screen::Session => self.handle_session_key(key),
        }
    }

    fn handle_input_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.input = None;
            }
            KeyCode::Enter => {
                if let Some(input) = self.input.take() {
                    self.commit_input(input);
                }
            }
            KeyCode::Backspace => {
                if let Some(input) = self.input.as_mut() {
                    input.buffer.pop();
                }
            }
            KeyCode::Char(c) => {
                if let Some(input) = self.input.as_mut() {
                    input.buffer.push(c);
                }
            }
            _ => {}
        }
    }

    fn commit_input(&mut self, input: InputState) {
        let text = input.buffer.trim().to_string();
        match input.action {
            InputAction::AddCommand => {
                if !text.is_empty() {
                    self.library.add_command(&text, None);
                    self.mark_dirty();
                }
            }
            InputAction::AddGroup => {
                if !text.is_empty() {
                    self.library.add_group(&text, Default::default());
                    self.mark_dirty();
                }
            }
            InputAction::RenameCommand(id) => {
                if !text.is_empty() {
                    self.library.rename_command(&id, &text);
                    self.mark_dirty();
                }
            }
            InputAction::RenameGroup(id) => {
                if !text.is_empty() {
                    self.library.rename_group(&id, &text);
                    self.mark_dirty();
                }
            }
            InputAction::SetAudioPath(id) => {
                let path = (!text.is_empty()).then(|| PathBuf::from(&text));
                if let Some(ref p) = path {
                    if !p.exists() {
                        self.status = Some(format!("warning: {} does not exist", p.display()));
                    }
                }
                self.library.set_audio_path(&id, path);
                self.mark_dirty();
            }
            InputAction::SetCount(id) => match text.parse::<u32>() {
                Ok(count) => {
                    self.library.set_session_count(&id, count);
                    self.mark_dirty();
                }
                Err(_) => self.status = Some(format!("not a count: {text}")),
            },
            InputAction::BatchCount => match text.parse::<u32>() {
                Ok(count) => {
                    self.library.batch_set_session_count(count);
                    self.mark_dirty();
                }
                Err(_) => self.status = Some(format!("not a count: {text}")),
            },
            InputAction::SavePreset => {
                if !text.is_empty() {
                    self.library.save_preset(&text, None);
                    self.mark_dirty();
                }
            }
        }
    }

    fn handle_library_key(&mut self, key: KeyEvent) -> bool {
        if self.show_presets {
            return self.handle_preset_key(key);
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Tab => self.screen = Screen::Setup,
            KeyCode::Up => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Down => {
                self.cursor += 1;
                self.clamp_cursor();
            }
            KeyCode::Char(' ') => match self.row_at_cursor() {
                Some(Row::Command(id)) => {
                    self.library.toggle_selected(&id);
                    self.mark_dirty();
                }
                Some(Row::Group(id)) => {
                    self.library.toggle_select_group(&id);
                    self.mark_dirty();
                }
                None => {}
            },
            KeyCode::Char('a') => {
                self.input = Some(InputState {
                    action: InputAction::AddCommand,
                    buffer: String::new(),
                });
            }
            KeyCode::Char('A') => {
                self.input = Some(InputState {
                    action: InputAction::AddGroup,
                    buffer: String::new(),
                });
            }
            KeyCode::Char('r') => match self.row_at_cursor() {
                Some(Row::Command(id)) => {
                    self.input = Some(InputState {
                        action: InputAction::RenameCommand(id),
                        buffer: String::new(),
                    });
                }
                Some(Row::Group(id)) => {
                    self.input = Some(InputState {
                        action: InputAction::RenameGroup(id),
                        buffer: String::new(),
                    });
                }
                None => {}
            },
            KeyCode::Char('d') => match self.row_at_cursor() {
                Some(Row::Command(id)) => {
                    self.library.delete_command(&id);
                    self.mark_dirty();
                    self.clamp_cursor();
                }
                Some(Row::Group(id)) => {
                    self.library.delete_group(&id);
                    self.mark_dirty();
                    self.clamp_cursor();
                }
                None => {}
            },
            KeyCode::Char('m') => {
                if let Some(Row::Command(id)) = self.row_at_cursor() {
                    self.input = Some(InputState {
                        action: InputAction::SetAudioPath(id),
                        buffer: String::new(),
                    });
                }
            }
            KeyCode::Char('n') => {
                if let Some(Row::Command(id)) = self.row_at_cursor() {
                    self.input = Some(InputState {
                        action: InputAction::SetCount(id),
                        buffer: String::new(),
                    });
                }
            }
            KeyCode::Char('+') | KeyCode::Char('=') => {
                if let Some(Row::Command(id)) = self.row_at_cursor() {
                    let count = self.library.command(&id).map(|c| c.session_count).unwrap_or(0);
                    self.library.set_session_count(&id, count + 1);
                    self.mark_dirty();
                }
            }
            KeyCode::Char('-') | KeyCode::Char('_') => {
                if let Some(Row::Command(id)) = self.row_at_cursor() {
                    let count = self.library.command(&id).map(|c| c.session_count).unwrap_or(0);
                    self.library.set_session_count(&id, count.saturating_sub(1));
                    self.mark_dirty();
                }
            }
            KeyCode::Char('c') => {
                self.input = Some(InputState {
                    action: InputAction::BatchCount,
                    buffer: String::new(),
                });
            }
            KeyCode::Char('x') => {
                self.library.toggle_select_all();
                self.mark_dirty();
            }
            KeyCode::Char('g') => {
                if let Some(Row::Command(id)) = self.row_at_cursor() {
                    self.cycle_group(&id);
                    self.mark_dirty();
                }
            }
            KeyCode::Char('G') => {
                if let Some(Row::Group(id)) = self.row_at_cursor() {
                    if let Some(group) = self.library.groups.iter_mut().find(|g| g.id == id) {
                        group.color = group.color.next();
                        self.mark_dirty();
                    }
                }
            }
            KeyCode::Char('[') => {
                if let Some(Row::Command(id)) = self.row_at_cursor() {
                    self.library.move_command(&id, -1);
                    self.mark_dirty();
                }
            }
            KeyCode::Char(']') => {
                if let Some(Row::Command(id)) = self.row_at_cursor() {
                    self.library.move_command(&id, 1);
                    self.mark_dirty();
                }
            }
            KeyCode::Char('s') => {
                self.input = Some(InputState {
                    action: InputAction::SavePreset,
                    buffer: String::new(),
                });
            }
            KeyCode::Char('p') => {
                self.show_presets = true;
                self.preset_cursor = 0;
            }
            _ => {}
        }
        false
    }

    fn handle_preset_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Esc | KeyCode::Char('p') | KeyCode::Char('q') => self.show_presets = false,
            KeyCode::Up => self.preset_cursor = self.preset_cursor.saturating_sub(1),
            KeyCode::Down => {
                if self.preset_cursor + 1 < self.library.presets.len() {
                    self.preset_cursor += 1;
                }
            }
            KeyCode::Enter => {
                if let Some(preset) = self.library.presets.get(self.preset_cursor) {
                    let id = preset.id.clone();
                    let name = preset.name.clone();
                    self.library.apply_preset(&id);
                    self.mark_dirty();
                    self.status = Some(format!("applied preset {name}"));
                    self.show_presets = false;
                }
            }
            KeyCode::Char('d') => {
                if let Some(preset) = self.library.presets.get(self.preset_cursor) {
                    let id = preset.id.clone();
                    self.library.delete_preset(&id);
                    self.mark_dirty();
                    if self.preset_cursor >= self.library.presets.len() {
                        self.preset_cursor = self.library.presets.len().saturating_sub(1);
                    }
                }
            }
            _ => {}
        }
        false
    }

    fn handle_setup_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Tab => self.screen = Screen::Library,
            KeyCode::Up => {
                self.config.duration_secs =
                    (self.config.duration_secs + DURATION_STEP_SECS).min(DURATION_MAX_SECS);
            }
            KeyCode::Down => {
                self.config.duration_secs = self
                    .config
                    .duration_secs
                    .saturating_sub(DURATION_STEP_SECS)
                    .max(DURATION_MIN_SECS);
            }
            KeyCode::Left => {
                self.config.min_break_secs = (self.config.min_break_secs - 1.0).max(0.0);
            }
            KeyCode::Right => {
                self.config.min_break_secs += 1.0;
            }
            KeyCode::Char('[') => {
                self.config.max_break_secs = (self.config.max_break_secs - 1.0).max(0.0);
            }
            KeyCode::Char(']') => {
                self.config.max_break_secs += 1.0;
            }
            KeyCode::Enter => self.start_session(),
            _ => {}
        }
        false
    }

    fn handle_session_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char(' ') | KeyCode::Char('p') => {
                let now = now_ms();
                if let Some(session) = self.session.as_mut() {
                    match session.phase() {
                        SessionPhase::Running => session.pause(now),
                        SessionPhase::Paused => session.resume(now),
                        _ => {}
                    }
                }
            }
            KeyCode::Char('e') | KeyCode::Esc => self.end_session(),
            KeyCode::Char('q') => {
                self.end_session();
                return true;
            }
            _ => {}
        }
        false
    }

    fn cycle_group(&mut self, command_id: &str) {
        use itertools::Itertools;
        let group_ids: Vec<String> = self
            .library
            .groups
            .iter()
            .sorted_by_key(|g| g.order)
            .map(|g| g.id.clone())
            .collect();
        if group_ids.is_empty() {
            return;
        }
        let current = self
            .library
            .command(command_id)
            .and_then(|c| c.group_id.clone());
        let next = match current {
            None => Some(group_ids[0].clone()),
            Some(ref id) => match group_ids.iter().position(|g| g == id) {
                Some(pos) if pos + 1 < group_ids.len() => Some(group_ids[pos + 1].clone()),
                _ => None,
            },
        };
        self.library.assign_group(command_id, next);
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn ui(app: &App, f: &mut Frame) {
    f.render_widget(app, f.area());
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if let Some(path) = cli.export_history.as_deref() {
        let history = HistoryDb::new()?;
        let written = history.export_plays_csv(path)?;
        println!("exported {written} plays to {}", path.display());
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let mut app = App::new(&cli);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    // Final persistence sweep regardless of how the loop exited
    app.mark_dirty();
    app.flush_library();
    let _ = app.config_store.save(&app.config);

    result
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    loop {
        terminal.draw(|f| ui(app, f))?;

        match runner.step() {
            DrillEvent::Tick => app.on_tick(),
            DrillEvent::Resize => {}
            DrillEvent::Key(key) => {
                if app.handle_key(key) {
                    break;
                }
            }
        }
    }

    Ok(())
}
