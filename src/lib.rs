pub mod cache;
pub mod cli;
pub mod data;
pub mod export;
pub mod filter;
pub mod io_utils;
pub mod loader;
pub mod profile;
pub mod render;
pub mod roles;
pub mod session;
pub mod summary;
pub mod table;

use std::{env, fs, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands, FilterArgs, SourceArgs},
    filter::FilterState,
    loader::{LoadOptions, Source},
    profile::Profile,
    roles::Role,
    session::Session,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("inventory_lens", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Sheets(args) => handle_sheets(&args),
        Commands::Roles(args) => handle_roles(&args),
        Commands::Values(args) => handle_values(&args),
        Commands::View(args) => handle_view(&args),
        Commands::Summary(args) => handle_summary(&args),
        Commands::Export(args) => handle_export(&args),
    }
}

fn open_session(args: &SourceArgs) -> Result<(Session, Source)> {
    let profile = match &args.profile {
        Some(path) => {
            Profile::load(path).with_context(|| format!("Loading profile from {path:?}"))?
        }
        None => Profile::default(),
    };
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let session = Session::new(profile).with_load_options(LoadOptions {
        delimiter: args.delimiter,
        encoding,
        ..LoadOptions::default()
    });
    let source = Source::from_path(&args.input)
        .with_context(|| format!("Reading input {:?}", args.input))?;
    debug!(
        "Opened '{}' ({} bytes, encoding {})",
        source.name,
        source.bytes.len(),
        encoding.name()
    );
    Ok((session, source))
}

fn filter_state(args: &FilterArgs) -> Result<FilterState> {
    let mut state = filter::parse_selections(&args.selections)?;
    state.query = args.search.clone();
    Ok(state)
}

fn handle_sheets(args: &cli::SheetsArgs) -> Result<()> {
    let (mut session, source) = open_session(&args.source)?;
    let sheets = session.sheets(&source)?;
    let rows = sheets
        .iter()
        .map(|(name, table)| {
            let state = match table.error_message() {
                Some(message) => format!("error: {message}"),
                None => "ok".to_string(),
            };
            vec![
                name.to_string(),
                table.row_count().to_string(),
                table.column_count().to_string(),
                state,
            ]
        })
        .collect::<Vec<_>>();
    render::print_table(&render::labels(&["sheet", "rows", "columns", "state"]), &rows);
    Ok(())
}

fn handle_roles(args: &cli::RolesArgs) -> Result<()> {
    let (mut session, source) = open_session(&args.sheet.source)?;
    let (sheet, _, roles) = session.open(&source, args.sheet.sheet.as_deref())?;
    info!("Resolved {} role(s) on sheet '{sheet}'", roles.len());
    let rows = Role::ALL
        .iter()
        .map(|role| {
            vec![
                role.to_string(),
                role.label().to_string(),
                roles.column(*role).unwrap_or("-").to_string(),
            ]
        })
        .collect::<Vec<_>>();
    render::print_table(&render::labels(&["role", "meaning", "column"]), &rows);
    Ok(())
}

fn handle_values(args: &cli::ValuesArgs) -> Result<()> {
    let role = args.role.parse::<Role>()?;
    let (mut session, source) = open_session(&args.sheet.source)?;
    let (_, table, roles) = session.open(&source, args.sheet.sheet.as_deref())?;
    match filter::selectable_values(&table, &roles, role) {
        Some(values) => {
            for value in values {
                println!("{value}");
            }
        }
        None => println!("{}", render::NO_DATA),
    }
    Ok(())
}

fn handle_view(args: &cli::ViewArgs) -> Result<()> {
    let (mut session, source) = open_session(&args.sheet.source)?;
    let state = filter_state(&args.filter)?;
    let dashboard = session.dashboard(&source, args.sheet.sheet.as_deref(), &state)?;
    print!("{}", render::render_view(&dashboard.view, args.limit));
    Ok(())
}

fn handle_summary(args: &cli::SummaryArgs) -> Result<()> {
    let (mut session, source) = open_session(&args.sheet.source)?;
    let state = filter_state(&args.filter)?;
    let dashboard = session.dashboard(&source, args.sheet.sheet.as_deref(), &state)?;
    if args.json {
        let json = serde_json::to_string_pretty(&dashboard.summary)
            .context("Serializing summary to JSON")?;
        println!("{json}");
    } else {
        println!("Sheet: {}", dashboard.sheet);
        print!("{}", render::render_summary(&dashboard.summary));
    }
    Ok(())
}

fn handle_export(args: &cli::ExportArgs) -> Result<()> {
    let (mut session, source) = open_session(&args.sheet.source)?;
    let delimited = io_utils::is_delimited_path(&args.output);
    let (bytes, rows) = if args.all_sheets {
        if delimited {
            return Err(anyhow!(
                "--all-sheets writes a workbook; choose an output path ending in .xlsx"
            ));
        }
        let sheets = session.sheets(&source)?;
        let entries = sheets.iter().collect::<Vec<_>>();
        let rows = entries.iter().map(|(_, table)| table.row_count()).sum::<usize>();
        let bytes = export::export_workbook(&entries).context("Building workbook export")?;
        (bytes, rows)
    } else {
        let state = filter_state(&args.filter)?;
        let dashboard = session.dashboard(&source, args.sheet.sheet.as_deref(), &state)?;
        let bytes = if delimited {
            let delimiter = io_utils::resolve_output_delimiter(&args.output, args.output_delimiter);
            export::export_delimited(&dashboard.view, delimiter)
                .context("Building delimited export")?
        } else {
            export::export(&dashboard.view, &args.sheet_name).context("Building workbook export")?
        };
        (bytes, dashboard.view.row_count())
    };
    fs::write(&args.output, &bytes)
        .with_context(|| format!("Writing export to {:?}", args.output))?;
    info!("Wrote {rows} row(s) to {:?}", args.output);
    Ok(())
}
