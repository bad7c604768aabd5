use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ratatui::DefaultTerminal;
use tracing::{error, info};

mod controller;
mod document;
mod domain;
mod editor;
mod logging;
mod model;
mod natural;
mod ui;

use controller::Controller;
use domain::{TVConfig, TVError};
use model::{Model, Status};
use ui::TableUI;

const DEFAULT_TABLE_FILE: &str = "TableData.xml";

/// View, sort and edit XML table data in the terminal.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// XML file with a HEADERS and a DATA section
    #[arg(default_value = DEFAULT_TABLE_FILE)]
    path: String,

    /// Column id to sort by after loading, 0 keeps the file order
    #[arg(long, default_value_t = 1)]
    sort_column: i32,

    /// Sort the initial column descending
    #[arg(long)]
    descending: bool,

    /// Column id whose cells can be edited, can be given multiple times
    #[arg(long = "editable", value_name = "ID")]
    editable: Vec<i32>,

    #[arg(long, default_value_t = 40)]
    max_column_width: usize,

    /// Terminal event poll timeout in milliseconds
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,

    /// Write logs to this file
    #[arg(long)]
    log_file: Option<String>,

    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Err(e) => {
            error!("Exiting with error: {e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run(args: Args) -> Result<(), TVError> {
    if let Some(log_file) = &args.log_file {
        logging::init_logging(&expand_path(log_file)?, &args.log_level)?;
    }
    let path = expand_path(&args.path)?;

    let cfg = TVConfig::default()
        .event_poll_time(args.poll_ms)
        .max_column_width(args.max_column_width)
        .sort_column(args.sort_column)
        .sort_ascending(!args.descending)
        .editable_columns(args.editable);
    info!("Starting xtv with {cfg:?}");

    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &cfg, path);
    ratatui::restore();
    result
}

fn event_loop(terminal: &mut DefaultTerminal, cfg: &TVConfig, path: PathBuf) -> Result<(), TVError> {
    let size = terminal.size()?;
    let mut model = Model::init(cfg, size.width as usize, size.height as usize);
    model.load(Some(path));

    let mut ui = TableUI::default();
    let controller = Controller::new(cfg);

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(&model)?;
        model.update(message)?;
    }

    Ok(())
}

fn expand_path(path: &str) -> Result<PathBuf, TVError> {
    shellexpand::full(path)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| TVError::InvalidPath(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_arguments() {
        let args = Args::parse_from(["xtv"]);
        assert_eq!(args.path, DEFAULT_TABLE_FILE);
        assert_eq!(args.sort_column, 1);
        assert!(!args.descending);
        assert!(args.editable.is_empty());
    }

    #[test]
    fn editable_columns_repeat() {
        let args = Args::parse_from(["xtv", "data.xml", "--editable", "8", "--editable", "3", "--descending"]);
        assert_eq!(args.path, "data.xml");
        assert_eq!(args.editable, vec![8, 3]);
        assert!(args.descending);
    }

    #[test]
    fn expand_plain_path() {
        assert_eq!(expand_path("a/b.xml").unwrap(), PathBuf::from("a/b.xml"));
        assert!(matches!(
            expand_path("$XTV_SURELY_UNSET_VARIABLE/b.xml"),
            Err(TVError::InvalidPath(_))
        ));
    }
}
