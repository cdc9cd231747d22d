use std::sync::Arc;
use std::time::Duration;

use crate::cache::{DatasetCache, LoadDiagnostic};
use crate::config::ResolvedConfig;
use crate::dashboard::{self, Dashboard};
use crate::domain::{DatasetName, Selection};
use crate::error::PainelError;
use crate::fetch::{FetchGuard, FetchOutcome};
use crate::filter::{self, FilterOutcome, FilterSelection, FilterStage};
use crate::remote::RemoteSource;
use crate::schema::{self, unit};
use crate::store::Store;
use crate::table::Dataset;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct Session<R: RemoteSource> {
    config: ResolvedConfig,
    remote: R,
    required: Vec<DatasetName>,
    cache: DatasetCache,
    guard: FetchGuard,
    fetch: FetchOutcome,
    units: Arc<Dataset>,
    filters: FilterSelection,
    outcome: FilterOutcome,
}

impl<R: RemoteSource> Session<R> {
    pub fn open(
        config: ResolvedConfig,
        remote: R,
        sink: &dyn ProgressSink,
    ) -> Result<Self, PainelError> {
        Self::open_with(config, remote, &DatasetName::ALL, sink)
    }

    pub fn open_with(
        config: ResolvedConfig,
        remote: R,
        required: &[DatasetName],
        sink: &dyn ProgressSink,
    ) -> Result<Self, PainelError> {
        let store = Store::new(config.data_dir.clone());
        let mut guard = FetchGuard::new();
        let fetch = guard.ensure(&store, required, &remote, sink)?;
        let mut cache = DatasetCache::new(store);
        let units = load_units(&mut cache)?;
        let filters = FilterSelection::new();
        let outcome = filter::apply_filters(&units, &filters)?;
        tracing::info!(units = units.height(), "session opened");

        Ok(Self {
            config,
            remote,
            required: required.to_vec(),
            cache,
            guard,
            fetch,
            units,
            filters,
            outcome,
        })
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn fetch_outcome(&self) -> &FetchOutcome {
        &self.fetch
    }

    pub fn units(&self) -> &Dataset {
        &self.units
    }

    pub fn filters(&self) -> &FilterSelection {
        &self.filters
    }

    pub fn outcome(&self) -> &FilterOutcome {
        &self.outcome
    }

    pub fn selection(&self) -> &Selection {
        &self.outcome.selection
    }

    pub fn diagnostics(&self) -> &[LoadDiagnostic] {
        self.cache.diagnostics()
    }

    pub fn dataset(&mut self, name: DatasetName) -> Option<Arc<Dataset>> {
        self.cache.get(name)
    }

    pub fn set_filters(&mut self, filters: FilterSelection) -> Result<&FilterOutcome, PainelError> {
        self.outcome = filter::apply_filters(&self.units, &filters)?;
        self.filters = filters;
        Ok(&self.outcome)
    }

    pub fn toggle(&mut self, stage: FilterStage, value: &str) -> Result<&FilterOutcome, PainelError> {
        let mut filters = self.filters.clone();
        filters.toggle(stage, value);
        self.set_filters(filters)
    }

    pub fn clear_stage(&mut self, stage: FilterStage) -> Result<&FilterOutcome, PainelError> {
        let mut filters = self.filters.clone();
        filters.clear(stage);
        self.set_filters(filters)
    }

    /// Forgets every cached dataset and reloads from disk. The remote folder
    /// is not downloaded again within the same session.
    pub fn reload(&mut self, sink: &dyn ProgressSink) -> Result<(), PainelError> {
        self.cache.clear();
        self.fetch = self
            .guard
            .ensure(self.cache.store(), &self.required, &self.remote, sink)?;
        self.units = load_units(&mut self.cache)?;
        self.outcome = filter::apply_filters(&self.units, &self.filters)?;
        sink.event(ProgressEvent {
            message: "Dados recarregados".to_string(),
            elapsed: None,
        });
        Ok(())
    }

    pub fn dashboard(&mut self) -> Dashboard {
        dashboard::build(&mut self.cache, &self.outcome)
    }
}

fn load_units(cache: &mut DatasetCache) -> Result<Arc<Dataset>, PainelError> {
    let name = DatasetName::Microbacias;
    let units = cache
        .get(name)
        .ok_or_else(|| PainelError::BaseDatasetMissing(name.file_name()))?;

    let missing: Vec<String> = unit::REQUIRED
        .iter()
        .filter(|column| !units.has_column(column))
        .map(|column| column.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(PainelError::MissingBaseColumns {
            dataset: name.file_name(),
            missing,
            available: schema::column_names(units.frame()),
        });
    }
    Ok(units)
}
