use polars::prelude::*;
use serde::Serialize;

use crate::domain::Selection;
use crate::error::PainelError;
use crate::table::Dataset;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Metric {
    Sum(f64),
    Count(usize),
    Empty,
}

impl Metric {
    pub fn value(&self) -> f64 {
        match self {
            Metric::Sum(value) => *value,
            Metric::Count(count) => *count as f64,
            Metric::Empty => 0.0,
        }
    }
}

pub fn summarize(
    dataset: Option<&Dataset>,
    selection: &Selection,
    column: &str,
) -> Result<Metric, PainelError> {
    let Some(dataset) = dataset else {
        return Ok(Metric::Empty);
    };
    if selection.is_empty() {
        return Ok(Metric::Empty);
    }
    let rows = dataset.rows_for(selection)?;
    if rows.get_column_index(column).is_none() {
        return Ok(Metric::Count(rows.height()));
    }
    Ok(Metric::Sum(column_sum(&rows, column)?))
}

pub fn count_matching(
    dataset: Option<&Dataset>,
    selection: &Selection,
) -> Result<Option<usize>, PainelError> {
    match dataset {
        Some(dataset) if dataset.has_join_key() && !selection.is_empty() => {
            Ok(Some(dataset.rows_for(selection)?.height()))
        }
        _ => Ok(None),
    }
}

pub fn sum_first_present(
    dataset: Option<&Dataset>,
    selection: &Selection,
    candidates: &[&str],
) -> Result<Option<f64>, PainelError> {
    let Some(dataset) = dataset else {
        return Ok(None);
    };
    let Some(column) = candidates.iter().find(|column| dataset.has_column(column)) else {
        return Ok(None);
    };
    if selection.is_empty() {
        return Ok(Some(0.0));
    }
    let rows = dataset.rows_for(selection)?;
    Ok(Some(column_sum(&rows, column)?))
}

fn column_sum(frame: &DataFrame, column: &str) -> Result<f64, PainelError> {
    let values = frame
        .column(column)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    Ok(values.f64()?.into_iter().flatten().sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DatasetName;

    fn properties() -> Dataset {
        let frame = DataFrame::new(vec![
            Column::new("ID".into(), vec!["1", "1", "2", "3"]),
            Column::new("num_area".into(), vec![Some(10.0), Some(5.0), None, Some(7.0)]),
        ])
        .unwrap();
        Dataset::from_frame(DatasetName::ImoveisCar, frame).unwrap()
    }

    fn selection(ids: &[&str]) -> Selection {
        ids.iter().copied().collect()
    }

    #[test]
    fn sums_selected_rows_skipping_nulls() {
        let metric = summarize(Some(&properties()), &selection(&["1", "2"]), "area_ha").unwrap();
        assert_eq!(metric, Metric::Sum(15.0));
    }

    #[test]
    fn absent_column_counts_rows() {
        let metric = summarize(Some(&properties()), &selection(&["1", "3"]), "modulos").unwrap();
        assert_eq!(metric, Metric::Count(3));
        assert_eq!(metric.value(), 3.0);
    }

    #[test]
    fn absent_dataset_or_selection_is_empty() {
        assert_eq!(summarize(None, &selection(&["1"]), "area_ha").unwrap(), Metric::Empty);
        let metric = summarize(Some(&properties()), &Selection::default(), "area_ha").unwrap();
        assert_eq!(metric, Metric::Empty);
        assert_eq!(metric.value(), 0.0);
    }

    #[test]
    fn count_matching_needs_join_key() {
        assert_eq!(count_matching(Some(&properties()), &selection(&["1"])).unwrap(), Some(2));
        assert_eq!(count_matching(None, &selection(&["1"])).unwrap(), None);

        let keyless = DataFrame::new(vec![Column::new("nome".into(), vec!["a"])]).unwrap();
        let keyless = Dataset::from_frame(DatasetName::Nascentes, keyless).unwrap();
        assert_eq!(count_matching(Some(&keyless), &selection(&["1"])).unwrap(), None);
    }

    #[test]
    fn first_present_candidate_is_summed() {
        let total = sum_first_present(
            Some(&properties()),
            &selection(&["3"]),
            &["length_km", "area_ha"],
        )
        .unwrap();
        assert_eq!(total, Some(7.0));
        assert_eq!(
            sum_first_present(Some(&properties()), &selection(&["3"]), &["length_km"]).unwrap(),
            None
        );
    }
}
