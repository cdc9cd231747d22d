use std::io::{self, Write};

use serde::Serialize;

use crate::dashboard::Dashboard;
use crate::fetch::FetchOutcome;
use crate::filter::{FilterOutcome, StageView};
use crate::session::{ProgressEvent, ProgressSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

#[derive(Debug, Serialize)]
pub struct SummaryReport<'a> {
    pub data_dir: &'a str,
    pub filters: &'a [StageView],
    pub selection: &'a [String],
    #[serde(flatten)]
    pub dashboard: &'a Dashboard,
}

impl<'a> SummaryReport<'a> {
    pub fn new(data_dir: &'a str, outcome: &'a FilterOutcome, dashboard: &'a Dashboard) -> Self {
        Self {
            data_dir,
            filters: &outcome.stages,
            selection: outcome.selection.ids(),
            dashboard,
        }
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(report: &SummaryReport<'_>) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_fetch(outcome: &FetchOutcome) -> io::Result<()> {
        Self::print_json(outcome)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct StderrProgress;

impl ProgressSink for StderrProgress {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!("{} ({:.1}s)", event.message, elapsed.as_secs_f64()),
            None => eprintln!("{}", event.message),
        }
    }
}
