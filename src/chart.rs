use polars::prelude::*;
use serde::Serialize;

use crate::domain::{Aggregate, Orientation, Selection};
use crate::error::PainelError;
use crate::schema;
use crate::table::Dataset;

const CATEGORY: &str = "__categoria";
const VALUE: &str = "__valor";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartRequest {
    pub group_column: String,
    pub value_column: String,
    pub title: String,
    pub category_label: String,
    pub value_label: String,
    pub orientation: Orientation,
    pub top_n: Option<usize>,
    pub largest_first: bool,
    pub aggregate: Aggregate,
}

impl ChartRequest {
    pub fn new(
        group_column: impl Into<String>,
        value_column: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            group_column: group_column.into(),
            value_column: value_column.into(),
            title: title.into(),
            category_label: String::new(),
            value_label: String::new(),
            orientation: Orientation::Vertical,
            top_n: None,
            largest_first: false,
            aggregate: Aggregate::Sum,
        }
    }

    pub fn labels(mut self, category: impl Into<String>, value: impl Into<String>) -> Self {
        self.category_label = category.into();
        self.value_label = value.into();
        self
    }

    pub fn horizontal(mut self) -> Self {
        self.orientation = Orientation::Horizontal;
        self
    }

    pub fn top(mut self, n: usize) -> Self {
        self.top_n = Some(n);
        self.largest_first = true;
        self
    }

    pub fn largest_first(mut self) -> Self {
        self.largest_first = true;
        self
    }

    pub fn count(mut self) -> Self {
        self.aggregate = Aggregate::Count;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub category: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub title: String,
    pub category_axis: String,
    pub value_axis: String,
    pub category_label: String,
    pub value_label: String,
    pub orientation: Orientation,
    pub aggregate: Aggregate,
    pub bars: Vec<Bar>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartOutcome {
    Chart(ChartSpec),
    NoData,
    MissingColumns {
        group_column: String,
        value_column: String,
        missing: Vec<String>,
    },
}

/// Groups the selected rows of `dataset` and reduces the value column per
/// group. Absent inputs yield [`ChartOutcome::NoData`], never an error.
pub fn build_chart(
    dataset: Option<&Dataset>,
    selection: &Selection,
    request: &ChartRequest,
) -> Result<ChartOutcome, PainelError> {
    let Some(dataset) = dataset else {
        return Ok(ChartOutcome::NoData);
    };
    if selection.is_empty() {
        return Ok(ChartOutcome::NoData);
    }
    let rows = dataset.rows_for(selection)?;

    let mut required = vec![request.group_column.as_str()];
    if request.aggregate == Aggregate::Sum {
        required.push(request.value_column.as_str());
    }
    let missing: Vec<String> = required
        .into_iter()
        .filter(|column| rows.get_column_index(column).is_none())
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        tracing::debug!(dataset = %dataset.name(), ?missing, "chart columns missing");
        return Ok(ChartOutcome::MissingColumns {
            group_column: request.group_column.clone(),
            value_column: request.value_column.clone(),
            missing,
        });
    }

    let categories = schema::to_text(rows.column(&request.group_column)?.as_materialized_series())?
        .with_name(CATEGORY.into());
    let mut aggregate = request.aggregate;
    let values = match aggregate {
        Aggregate::Sum => {
            let values = numeric_values(rows.column(&request.value_column)?.as_materialized_series())?;
            if values.is_none() {
                tracing::debug!(
                    column = %request.value_column,
                    "value column is not numeric; counting rows instead"
                );
                aggregate = Aggregate::Count;
            }
            values
        }
        Aggregate::Count => None,
    };

    let mut columns = vec![categories.into_column()];
    if let Some(values) = values {
        columns.push(values.with_name(VALUE.into()).into_column());
    }
    let reduce = match aggregate {
        Aggregate::Sum => col(VALUE).fill_null(lit(0.0)).sum().alias(VALUE),
        Aggregate::Count => col(CATEGORY).count().cast(DataType::Float64).alias(VALUE),
    };

    let mut grouped = DataFrame::new(columns)?
        .lazy()
        .filter(col(CATEGORY).is_not_null())
        .group_by_stable([col(CATEGORY)])
        .agg([reduce]);
    if request.largest_first {
        grouped = grouped.sort(
            [VALUE],
            SortMultipleOptions::default()
                .with_order_descending(true)
                .with_maintain_order(true),
        );
    }
    if let Some(n) = request.top_n {
        grouped = grouped.limit(n as IdxSize);
    }
    let grouped = grouped.collect()?;
    if grouped.height() == 0 {
        return Ok(ChartOutcome::NoData);
    }

    let bars = grouped
        .column(CATEGORY)?
        .as_materialized_series()
        .str()?
        .into_iter()
        .zip(grouped.column(VALUE)?.as_materialized_series().f64()?.into_iter())
        .filter_map(|(category, value)| {
            category.map(|category| Bar {
                category: category.to_string(),
                value: value.unwrap_or(0.0),
            })
        })
        .collect();

    Ok(ChartOutcome::Chart(ChartSpec {
        title: request.title.clone(),
        category_axis: request.group_column.clone(),
        value_axis: request.value_column.clone(),
        category_label: request.category_label.clone(),
        value_label: request.value_label.clone(),
        orientation: request.orientation,
        aggregate,
        bars,
    }))
}

fn numeric_values(series: &Series) -> Result<Option<Series>, PainelError> {
    let text_input = series.dtype() == &DataType::String;
    let values = series.cast(&DataType::Float64)?;
    if text_input && series.null_count() < series.len() && values.null_count() == values.len() {
        return Ok(None);
    }
    Ok(Some(values))
}
