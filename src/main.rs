use std::process::ExitCode;

use clap::Parser;
use ratatui::DefaultTerminal;
use tracing::{debug, error};

use dmi::column::Schema;
use dmi::controller::Controller;
use dmi::domain::{DMError, TVConfig};
use dmi::engine::{SortKey, TableView};
use dmi::logging::{self, LogTarget};
use dmi::model::{Model, Status};
use dmi::plain::render_text;
use dmi::record::{Dataset, expand_path};
use dmi::stats::Statistics;
use dmi::ui::TableUI;

/// Browse the Dentmakers Index, a ranking of technology companies by valuation.
#[derive(Parser, Debug)]
#[command(name = "dmi", version, about)]
struct Args {
    /// Data file (csv, parquet, arrow/ipc or json). Uses the bundled sample when omitted.
    path: Option<String>,

    /// Default sort as `column[:asc|:desc]`
    #[arg(long, default_value = "valuation:asc")]
    sort: SortKey,

    /// Rows per page
    #[arg(long, default_value_t = 10)]
    page_size: usize,

    /// Pad short pages with empty rows up to this count
    #[arg(long, default_value_t = 0)]
    min_rows: usize,

    /// Initial filter as `column=value`, can be repeated
    #[arg(long = "filter", value_name = "COLUMN=VALUE", value_parser = parse_filter)]
    filters: Vec<(String, String)>,

    /// Page to print, starting at 1
    #[arg(long, default_value_t = 1)]
    page: usize,

    /// Print one page as plain text and exit
    #[arg(long)]
    print: bool,

    /// Write logs to this file
    #[arg(long)]
    log_file: Option<String>,

    /// More log output, repeat for more
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_filter(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((column, value)) if !column.trim().is_empty() => {
            Ok((column.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected COLUMN=VALUE, got {s:?}")),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run(args: Args) -> Result<(), DMError> {
    let log_path = args.log_file.as_deref().map(expand_path).transpose()?;
    let target = match (&log_path, args.print) {
        (Some(path), _) => LogTarget::File(path),
        (None, true) => LogTarget::Stderr,
        (None, false) => LogTarget::Discard,
    };
    logging::init(target, args.verbose)?;
    debug!("{args:?}");

    let dataset = match &args.path {
        Some(path) => Dataset::load(&expand_path(path)?)?,
        None => Dataset::embedded()?,
    };

    let config = TVConfig::default()
        .with_default_sort(args.sort.clone())
        .with_page_size(args.page_size)
        .with_min_rows(args.min_rows);

    if args.print {
        print_page(&config, dataset, &args.filters, args.page)
    } else {
        run_tui(&config, dataset, &args.filters)
    }
}

fn print_page(
    config: &TVConfig,
    dataset: Dataset,
    filters: &[(String, String)],
    page: usize,
) -> Result<(), DMError> {
    let stats = Statistics::of(dataset.records());
    let mut table = TableView::new(dataset, Schema::companies(), config.table_options())?;
    for (column, value) in filters {
        table.set_filter(column, value)?;
    }
    table.set_page(page.saturating_sub(1));
    print!(
        "{}",
        render_text(&table.render(), Some(&stats), config.max_column_width)
    );
    Ok(())
}

fn run_tui(config: &TVConfig, dataset: Dataset, filters: &[(String, String)]) -> Result<(), DMError> {
    let mut model = Model::init(config, dataset, Schema::companies())?;
    for (column, value) in filters {
        model.apply_filter(column, value)?;
    }
    let mut ui = TableUI::new(config);
    let controller = Controller::new(config);

    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &mut model, &mut ui, &controller);
    ratatui::restore();
    result
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    model: &mut Model,
    ui: &mut TableUI,
    controller: &Controller,
) -> Result<(), DMError> {
    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(model.get_uidata(), f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(model)?;
        model.update(message)?;
    }
    Ok(())
}
