use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use psh_painel::config::{ConfigLoader, ConfigOverrides, ResolvedConfig};
use psh_painel::domain::DatasetName;
use psh_painel::error::PainelError;
use psh_painel::fetch::{FetchAction, FetchGuard, FetchOutcome};
use psh_painel::filter::{FilterSelection, FilterStage};
use psh_painel::output::{JsonOutput, OutputMode, StderrProgress, SummaryReport};
use psh_painel::remote::HttpRemoteSource;
use psh_painel::session::{ProgressSink, Session};
use psh_painel::store::Store;
use psh_painel::tui::Tui;

#[derive(Parser)]
#[command(name = "psh-painel")]
#[command(about = "Painel de diagnóstico de microbacias do Programa de Segurança Hídrica")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    /// JSON config file (default: ./psh-painel.json when present)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Directory holding the dataset spreadsheets
    #[arg(long, global = true)]
    data_dir: Option<Utf8PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Print every dashboard tab for a filter combination")]
    Summary(SummaryArgs),
    #[command(about = "Download missing data files from the remote folder")]
    Fetch,
}

#[derive(Args, Default)]
struct SummaryArgs {
    #[arg(long = "bacia")]
    basins: Vec<String>,

    #[arg(long = "manancial")]
    springs: Vec<String>,

    #[arg(long = "manancial-numero")]
    spring_numbers: Vec<String>,

    #[arg(long = "nome-manancial")]
    spring_names: Vec<String>,
}

impl SummaryArgs {
    fn filters(&self) -> FilterSelection {
        FilterSelection::new()
            .with(FilterStage::Basin, self.basins.iter().cloned())
            .with(FilterStage::Spring, self.springs.iter().cloned())
            .with(FilterStage::SpringNumber, self.spring_numbers.iter().cloned())
            .with(FilterStage::SpringName, self.spring_names.iter().cloned())
    }
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<PainelError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &PainelError) -> u8 {
    match error {
        PainelError::MissingDataFiles(_)
        | PainelError::BaseDatasetMissing(_)
        | PainelError::MissingBaseColumns { .. } => 2,
        PainelError::RemoteHttp(_)
        | PainelError::RemoteStatus { .. }
        | PainelError::NotAnArchive(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let mut overrides = ConfigOverrides::from_env();
    overrides.data_dir = cli.data_dir;
    let config = ConfigLoader::resolve(cli.config.as_deref(), overrides)?;
    tracing::debug!(data_dir = %config.data_dir, source = %config.remote.folder_url, "configuration resolved");

    match cli.command {
        Some(Commands::Summary(args)) => run_summary(config, &args, output_mode),
        Some(Commands::Fetch) => run_fetch(config, output_mode),
        None => match output_mode {
            OutputMode::Interactive => run_dashboard(config),
            OutputMode::NonInteractive => {
                run_summary(config, &SummaryArgs::default(), output_mode)
            }
        },
    }
}

fn run_dashboard(config: ResolvedConfig) -> miette::Result<()> {
    let remote = HttpRemoteSource::new(&config.remote)?;
    let mut tui = Tui::new();
    tui.run(move |sink| Session::open(config, remote, sink))
}

fn run_summary(
    config: ResolvedConfig,
    args: &SummaryArgs,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let remote = HttpRemoteSource::new(&config.remote)?;
    let data_dir = config.data_dir.to_string();
    let sink = progress_sink(output_mode);
    let mut session = Session::open(config, remote, sink)?;
    session.set_filters(args.filters())?;
    let dashboard = session.dashboard();
    let report = SummaryReport::new(&data_dir, session.outcome(), &dashboard);
    JsonOutput::print_summary(&report).into_diagnostic()?;
    Ok(())
}

fn run_fetch(config: ResolvedConfig, output_mode: OutputMode) -> miette::Result<()> {
    let remote = HttpRemoteSource::new(&config.remote)?;
    let store = Store::new(config.data_dir.clone());
    let outcome = FetchGuard::new().ensure(
        &store,
        &DatasetName::ALL,
        &remote,
        progress_sink(output_mode),
    )?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_fetch(&outcome).into_diagnostic()?,
        OutputMode::Interactive => print_fetch_summary(&outcome),
    }
    Ok(())
}

fn progress_sink(output_mode: OutputMode) -> &'static dyn ProgressSink {
    match output_mode {
        OutputMode::Interactive => &StderrProgress,
        OutputMode::NonInteractive => &JsonOutput,
    }
}

fn print_fetch_summary(outcome: &FetchOutcome) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    println!("{cyan}PSH painel: dados em {}{reset}", outcome.data_dir);
    match outcome.action {
        FetchAction::AlreadyPresent => {
            println!("{green}Todos os arquivos de dados já estão presentes{reset}");
        }
        FetchAction::Downloaded => {
            if let Some(source) = &outcome.source {
                println!("{cyan}Origem: {source}{reset}");
            }
            println!(
                "{green}Arquivos baixados: {}{reset}",
                outcome.downloaded.len()
            );
            for file in &outcome.downloaded {
                println!("{green}  {file}{reset}");
            }
            if !outcome.unavailable.is_empty() {
                println!(
                    "{yellow}Não disponíveis na origem: {}{reset}",
                    outcome.unavailable.join(", ")
                );
            }
        }
    }
}
