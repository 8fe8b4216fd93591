mod app;
mod cli;
mod domain;
mod infra;
mod ui;

use crate::app::{AppEvent, AppModel};
use crate::cli::CliInvocation;
use crate::infra::{NomadClient, ResourceProvider, init_logging, load_config};
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::terminal::size as terminal_size;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use crossterm::{ExecutableCommand, execute};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::{self, Stdout, Write};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
enum MainError {
    #[error(transparent)]
    App(#[from] crate::app::AppError),

    #[error(transparent)]
    Cli(#[from] crate::cli::CliRunError),

    #[error(transparent)]
    Config(#[from] crate::infra::LoadConfigError),

    #[error(transparent)]
    Logging(#[from] crate::infra::InitLoggingError),

    #[error(transparent)]
    Provider(#[from] crate::infra::ProviderError),
}

fn main() {
    if let Err(error) = run_main() {
        let mut err = io::stderr().lock();
        let _ = writeln!(err, "{error}");
        std::process::exit(1);
    }
}

fn run_main() -> Result<(), MainError> {
    let args = std::env::args().collect::<Vec<_>>();
    let invocation = match crate::cli::parse_invocation(&args) {
        Ok(invocation) => invocation,
        Err(error) => {
            let mut err = io::stderr().lock();
            let _ = writeln!(err, "{error}");
            let _ = writeln!(err);
            let _ = write!(err, "{}", crate::cli::help_text());
            std::process::exit(2);
        }
    };

    if let Some(path) = init_logging()? {
        info!(log_file = %path.display(), version = env!("CARGO_PKG_VERSION"), "logging started");
    }

    match invocation {
        CliInvocation::PrintHelp => {
            let mut out = io::stdout().lock();
            let _ = write!(out, "{}", crate::cli::help_text());
            Ok(())
        }
        CliInvocation::PrintVersion => {
            let mut out = io::stdout().lock();
            let _ = writeln!(out, "{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliInvocation::Ui => run_tui(),
        CliInvocation::Command(command) => {
            let mut provider = NomadClient::from_env();
            let mut out = io::stdout().lock();
            crate::cli::run(command, &mut provider, &mut out)?;
            Ok(())
        }
    }
}

fn run_tui() -> Result<(), MainError> {
    let config = load_config()?;
    match &config.source {
        Some(path) => info!(path = %path.display(), clusters = config.environments.len(), "loaded config"),
        None => info!("no config file found; using default cluster"),
    }

    let mut provider = NomadClient::from_env();
    if let Some(first) = config.environments.first() {
        provider.connect(&first.address)?;
    }

    let mut model = AppModel::new(config.environments);
    let mut terminal = setup_terminal()?;
    if let Ok((width, height)) = terminal_size() {
        model = model.with_terminal_size(width, height);
    }
    let result = run(&mut terminal, model, &mut provider);
    restore_terminal(&mut terminal)?;
    Ok(result?)
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>, app::AppError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
) -> Result<(), app::AppError> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn run<P: ResourceProvider>(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    model: AppModel,
    provider: &mut P,
) -> Result<(), app::AppError> {
    let mut model = model;
    loop {
        terminal.draw(|frame| ui::render(frame, &model))?;

        let event = match event::read()? {
            Event::Key(key) if key.kind != KeyEventKind::Release => AppEvent::Key(key),
            Event::Resize(width, height) => AppEvent::Resize(width, height),
            _ => continue,
        };

        let (next, quit) = app::dispatch(model, event, provider);
        model = next;
        if quit {
            info!("quit requested");
            return Ok(());
        }
    }
}
