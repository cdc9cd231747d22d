use std::collections::{BTreeMap, BTreeSet};

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::Selection;
use crate::error::PainelError;
use crate::schema::{self, unit};
use crate::table::Dataset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStage {
    Basin,
    Spring,
    SpringNumber,
    SpringName,
}

impl FilterStage {
    pub const ALL: [FilterStage; 4] = [
        FilterStage::Basin,
        FilterStage::Spring,
        FilterStage::SpringNumber,
        FilterStage::SpringName,
    ];

    pub fn column(self) -> &'static str {
        match self {
            FilterStage::Basin => unit::BASIN,
            FilterStage::Spring => unit::SPRING,
            FilterStage::SpringNumber => unit::SPRING_NUMBER,
            FilterStage::SpringName => unit::SPRING_NAME,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FilterStage::Basin => "Bacia",
            FilterStage::Spring => "Manancial",
            FilterStage::SpringNumber => "Nº do Manancial",
            FilterStage::SpringName => "Nome do Manancial",
        }
    }
}

/// Values picked by the user per stage. A stage without a pick, or with an
/// empty pick, keeps every upstream value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSelection {
    picks: BTreeMap<FilterStage, BTreeSet<String>>,
}

impl FilterSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<I, S>(mut self, stage: FilterStage, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set(stage, values);
        self
    }

    pub fn set<I, S>(&mut self, stage: FilterStage, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            self.picks.remove(&stage);
        } else {
            self.picks.insert(stage, values);
        }
    }

    pub fn toggle(&mut self, stage: FilterStage, value: &str) {
        let picks = self.picks.entry(stage).or_default();
        if !picks.remove(value) {
            picks.insert(value.to_string());
        }
        if picks.is_empty() {
            self.picks.remove(&stage);
        }
    }

    pub fn clear(&mut self, stage: FilterStage) {
        self.picks.remove(&stage);
    }

    pub fn picks(&self, stage: FilterStage) -> Option<&BTreeSet<String>> {
        self.picks.get(&stage)
    }

    pub fn is_picked(&self, stage: FilterStage, value: &str) -> bool {
        self.picks
            .get(&stage)
            .map(|picks| picks.contains(value))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageView {
    pub stage: FilterStage,
    pub label: &'static str,
    pub options: Vec<String>,
    pub selected: Vec<String>,
    pub explicit: bool,
    pub remaining: usize,
    pub available: bool,
}

#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub stages: Vec<StageView>,
    pub units: DataFrame,
    pub selection: Selection,
    pub fallback: bool,
}

pub fn apply_filters(
    units: &Dataset,
    selection: &FilterSelection,
) -> Result<FilterOutcome, PainelError> {
    let mut working = units.frame().clone();
    let mut last_non_empty = working.clone();
    let mut stages = Vec::with_capacity(FilterStage::ALL.len());

    for stage in FilterStage::ALL {
        let column = stage.column();
        if working.get_column_index(column).is_none() {
            stages.push(StageView {
                stage,
                label: stage.label(),
                options: Vec::new(),
                selected: Vec::new(),
                explicit: false,
                remaining: working.height(),
                available: false,
            });
            continue;
        }

        let options = distinct_values(&working, column)?;
        let (selected, explicit) = match selection.picks(stage) {
            Some(picks) => {
                working = keep_values(working, column, picks)?;
                (picks.iter().cloned().collect(), true)
            }
            None => (options.clone(), false),
        };
        if working.height() > 0 {
            last_non_empty = working.clone();
        }
        stages.push(StageView {
            stage,
            label: stage.label(),
            options,
            selected,
            explicit,
            remaining: working.height(),
            available: true,
        });
    }

    let fallback = working.height() == 0 && last_non_empty.height() > 0;
    if fallback {
        tracing::warn!(
            units = last_non_empty.height(),
            "filter combination selects nothing; using last non-empty stage"
        );
        working = last_non_empty;
    }

    let selection = identifiers(&working)?;
    tracing::debug!(units = selection.len(), fallback, "filters applied");
    Ok(FilterOutcome {
        stages,
        units: working,
        selection,
        fallback,
    })
}

pub fn distinct_values(frame: &DataFrame, column: &str) -> Result<Vec<String>, PainelError> {
    let text = schema::to_text(frame.column(column)?.as_materialized_series())?;
    let values: BTreeSet<String> = text
        .str()?
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect();
    Ok(values.into_iter().collect())
}

fn keep_values(
    frame: DataFrame,
    column: &str,
    picks: &BTreeSet<String>,
) -> Result<DataFrame, PainelError> {
    let values: Vec<String> = picks.iter().cloned().collect();
    let values = Series::new(column.into(), values);
    Ok(frame
        .lazy()
        .filter(col(column).is_in(lit(values), false))
        .collect()?)
}

fn identifiers(frame: &DataFrame) -> Result<Selection, PainelError> {
    if frame.get_column_index(schema::ID).is_none() {
        return Ok(Selection::default());
    }
    let ids = schema::to_text(frame.column(schema::ID)?.as_materialized_series())?;
    Ok(ids.str()?.into_iter().flatten().collect())
}
