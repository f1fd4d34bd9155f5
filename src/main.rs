use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    io,
    path::PathBuf,
    time::{Duration, Instant},
};
use tracing::info;

mod app;
mod chat;
mod config;
mod error;
mod logging;
mod net;
mod ui;

use app::App;
use config::{Config, Overrides};

const LOGO: &str = r#"
 _     _     __  __  ____ _           _
| |   | |   |  \/  |/ ___| |__   __ _| |_ _ __ ___   ___  _ __ ___
| |   | |   | |\/| | |   | '_ \ / _` | __| '__/ _ \ / _ \| '_ ` _ \
| |___| |___| |  | | |___| | | | (_| | |_| | | (_) | (_) | | | | | |
|_____|_____|_|  |_|\____|_| |_|\__,_|\__|_|  \___/ \___/|_| |_| |_|
"#;

fn show_startup_logo() {
    // Clear screen
    print!("\x1B[2J\x1B[1;1H");

    let colors = [
        "\x1B[38;5;33m",
        "\x1B[38;5;39m",
        "\x1B[38;5;45m",
        "\x1B[38;5;51m",
        "\x1B[38;5;87m",
        "\x1B[38;5;123m",
    ];

    for (i, line) in LOGO.lines().enumerate() {
        if i < colors.len() && !line.trim().is_empty() {
            println!("{}{}\x1B[0m", colors[i], line);
        } else {
            println!("{}", line);
        }
    }

    println!(
        "\n\x1B[38;5;45m=== LLMChatroom v{} - chat with friends and a local LLM ===\x1B[0m",
        env!("CARGO_PKG_VERSION")
    );
    println!("\x1B[38;5;87mPress Enter to continue...\x1B[0m\n");

    let _ = std::io::Read::read(&mut std::io::stdin(), &mut [0u8; 1]);
}

fn cli() -> Command {
    Command::new("llmchatroom")
        .version(env!("CARGO_PKG_VERSION"))
        .author("LLMChatroom Team")
        .about("Terminal chat client for an LLM-backed WebSocket chatroom")
        .arg(
            Arg::new("url")
                .short('u')
                .long("url")
                .value_name("WS_URL")
                .help("Chat server base address, e.g. ws://host:8080"),
        )
        .arg(
            Arg::new("fallback-url")
                .long("fallback-url")
                .value_name("WS_URL")
                .help("Server tried once if the primary can't be reached"),
        )
        .arg(
            Arg::new("no-fallback")
                .long("no-fallback")
                .action(ArgAction::SetTrue)
                .help("Never try a fallback server"),
        )
        .arg(
            Arg::new("username")
                .short('n')
                .long("username")
                .value_name("NAME")
                .help("Join straight away with this username"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Config file (default: <config dir>/llmchatroom/config.toml)"),
        )
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .value_name("PATH")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Where to write logs (default: <cache dir>/llmchatroom/llmchatroom.log)"),
        )
        .arg(
            Arg::new("no-logo")
                .long("no-logo")
                .action(ArgAction::SetTrue)
                .help("Skip startup logo"),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let log_path = matches
        .get_one::<PathBuf>("log-file")
        .cloned()
        .unwrap_or_else(logging::default_log_path);
    logging::init(&log_path)?;

    let mut config = Config::load(matches.get_one::<PathBuf>("config").map(|p| p.as_path()))
        .context("loading configuration")?;
    config.apply(Overrides {
        primary_url: matches.get_one::<String>("url").cloned(),
        fallback_url: matches.get_one::<String>("fallback-url").cloned(),
        no_fallback: matches.get_flag("no-fallback"),
        username: matches.get_one::<String>("username").cloned(),
    });
    config.validate()?;

    info!(
        primary = %config.primary_url,
        fallback = ?config.fallback_url,
        "Starting LLMChatroom"
    );

    if !matches.get_flag("no-logo") {
        show_startup_logo();
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(&config);
    let res = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    info!("Exiting");
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    let mut last_tick = Instant::now();
    let tick_rate = Duration::from_millis(100);

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        let timeout_duration = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        // Keep the runtime free for the connection task while we wait on input.
        let has_event = tokio::task::block_in_place(|| event::poll(timeout_duration))?;
        if has_event {
            let event = event::read()?;
            app.handle_input(event)?;
        }

        if last_tick.elapsed() >= tick_rate {
            app.on_tick()?;
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
