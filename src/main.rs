use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ratatui::DefaultTerminal;
use tracing::info;

mod controller;
mod domain;
mod inputter;
mod loader;
mod logging;
mod model;
mod table;
mod ui;

use controller::Controller;
use domain::{ChvError, ViewerConfig};
use model::{Model, Status};
use ui::TableUI;

/// Browse an XML call history export as a searchable, sortable table.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Call log to open at startup
    file: Option<PathBuf>,

    /// Event poll timeout in milliseconds
    #[arg(long)]
    poll_ms: Option<u64>,

    /// Maximum rendered width of a column
    #[arg(long)]
    max_column_width: Option<usize>,

    /// Write logs to this file, verbosity follows RUST_LOG
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Cli {
    fn config(&self) -> ViewerConfig {
        let mut cfg = ViewerConfig::default();
        if let Some(poll_ms) = self.poll_ms {
            cfg = cfg.with_event_poll_time(poll_ms);
        }
        if let Some(width) = self.max_column_width {
            cfg = cfg.with_max_column_width(width);
        }
        if let Some(path) = &self.log_file {
            cfg = cfg.with_log_file(path.clone());
        }
        cfg
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = cli.config();
    match run(cli.file, &config) {
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run(file: Option<PathBuf>, config: &ViewerConfig) -> Result<(), ChvError> {
    if let Some(path) = &config.log_file {
        logging::init(path)?;
    }
    info!("Starting chv with {:?}", config);

    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, file, config);
    ratatui::restore();
    result
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    file: Option<PathBuf>,
    config: &ViewerConfig,
) -> Result<(), ChvError> {
    let size = terminal.size()?;
    let mut model = Model::init(config, size.width as usize, size.height as usize);
    if let Some(path) = file {
        model.open_file(path);
    }

    let mut ui = TableUI::new();
    let controller = Controller::new(config);

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        if let Some(message) = controller.handle_event(&model)? {
            model.update(message);
        };
    }

    info!("Quitting chv");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["chv"]);
        assert_eq!(cli.file, None);
        let cfg = cli.config();
        assert_eq!(cfg.event_poll_time, 100);
        assert_eq!(cfg.max_column_width, 40);
        assert_eq!(cfg.log_file, None);
    }

    #[test]
    fn cli_overrides() {
        let cli = Cli::parse_from([
            "chv",
            "calls.xml",
            "--poll-ms",
            "50",
            "--max-column-width",
            "25",
            "--log-file",
            "chv.log",
        ]);
        assert_eq!(cli.file, Some(PathBuf::from("calls.xml")));
        let cfg = cli.config();
        assert_eq!(cfg.event_poll_time, 50);
        assert_eq!(cfg.max_column_width, 25);
        assert_eq!(cfg.log_file, Some(PathBuf::from("chv.log")));
    }

    #[test]
    fn cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
