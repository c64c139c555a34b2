//! midiplay - a terminal MIDI file player.
//!
//! Plays a Standard MIDI File through a polyphonic triangle-wave synth and
//! mirrors playback on a 128-key piano strip: per-track colored note
//! overlays, lit keys while notes sound, a track legend, and transport
//! controls (play/pause/stop/seek).
//!
//! # Usage
//!
//! ```bash
//! cargo run -- song.mid       # load and play a file
//! cargo run -- --mute song.mid  # run without an audio device
//! ```
//!
//! Press `o` in the app to browse for a file, `Space` to play.

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
    MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use midiplay::audio::ToneEngine;
use midiplay::{ui, App};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Command-line options for the application.
struct CliOptions {
    /// Path to a MIDI file to load on startup.
    path: Option<PathBuf>,
    /// Run with no audio device; playback drives only the display.
    mute: bool,
}

impl CliOptions {
    /// Parses command-line arguments.
    ///
    /// Supports:
    /// - a positional `.mid`/`.midi` path
    /// - `--mute` or `-m`: run without opening an audio device
    /// - `--help` or `-h`: print help and exit
    fn parse() -> Result<Self> {
        let args: Vec<String> = std::env::args().collect();
        let mut path: Option<PathBuf> = None;
        let mut mute = false;

        for arg in args.iter().skip(1) {
            match arg.as_str() {
                "--mute" | "-m" => mute = true,
                "--help" | "-h" => {
                    eprintln!("midiplay - terminal MIDI file player");
                    eprintln!();
                    eprintln!(
                        "Usage: {} [OPTIONS] [FILE]",
                        args.first().map(String::as_str).unwrap_or("midiplay")
                    );
                    eprintln!();
                    eprintln!("Options:");
                    eprintln!("  -m, --mute   Run without an audio device (visual playback only)");
                    eprintln!("  -h, --help   Print this help message");
                    eprintln!();
                    eprintln!("With no FILE, use [o] inside the app to browse for one.");
                    std::process::exit(0);
                }
                other => {
                    if other.starts_with('-') {
                        eprintln!("Unknown option: {}", other);
                        eprintln!("Use --help for usage information");
                        std::process::exit(1);
                    }
                    path = Some(PathBuf::from(other));
                }
            }
        }

        Ok(Self { path, mute })
    }
}

fn main() -> Result<()> {
    let cli = CliOptions::parse()?;

    // Initialize logging (optional, for debugging)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // A missing audio device is not fatal: the app runs with the transport
    // disabled so the failure is visible instead of a crash.
    let (engine, audio_enabled) = if cli.mute {
        (ToneEngine::muted(), true)
    } else {
        match ToneEngine::new() {
            Ok(engine) => (engine, true),
            Err(e) => {
                tracing::error!("{}", e);
                (ToneEngine::muted(), false)
            }
        }
    };

    let mut app = App::new(engine, audio_enabled);
    if let Some(path) = &cli.path {
        app.load_file(path);
    }

    let mut terminal = setup_terminal().context("Failed to setup terminal")?;
    let result = run_app(&mut terminal, &mut app);
    restore_terminal(&mut terminal)?;
    result
}

/// Sets up the terminal for the TUI.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("Failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("Failed to create terminal")?;
    Ok(terminal)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;
    Ok(())
}

/// Main application loop.
fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    loop {
        // Drive the scheduler; this is the per-frame suspension point that
        // fires due note events and updates the position display.
        app.tick(Instant::now());
        app.clear_expired_status();

        terminal.draw(|frame| ui::render(frame, app))?;

        // Short poll timeout so playback keeps ticking while idle.
        if !event::poll(Duration::from_millis(16))? {
            continue;
        }

        match event::read()? {
            Event::Key(key) => {
                if key.kind != KeyEventKind::Press {
                    continue;
                }

                // File browser has priority while open.
                if app.file_browser.open {
                    match key.code {
                        KeyCode::Up | KeyCode::Char('k') => app.file_browser_up(),
                        KeyCode::Down | KeyCode::Char('j') => app.file_browser_down(),
                        KeyCode::Enter => app.file_browser_select(),
                        KeyCode::Esc | KeyCode::Char('q') => app.file_browser_cancel(),
                        _ => {}
                    }
                    continue;
                }

                let now = Instant::now();
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Char(' ') => app.toggle_playback(now),
                    KeyCode::Char('s') => app.stop_playback(),
                    KeyCode::Left => app.seek_relative(-midiplay::app::SEEK_STEP_SECONDS, now),
                    KeyCode::Right => app.seek_relative(midiplay::app::SEEK_STEP_SECONDS, now),
                    KeyCode::Home => app.seek_to_seconds(0.0, now),
                    KeyCode::Char('o') => app.open_file_browser(),
                    KeyCode::Char('+') | KeyCode::Char('=') => app.adjust_gain(0.05),
                    KeyCode::Char('-') => app.adjust_gain(-0.05),
                    _ => {}
                }
            }
            Event::Mouse(mouse) => {
                if mouse.kind == MouseEventKind::Down(MouseButton::Left) {
                    if let Some(fraction) = app.layout.seek_fraction_at(mouse.column, mouse.row) {
                        app.seek_to_fraction(fraction, Instant::now());
                    }
                }
            }
            _ => {}
        }
    }
}
