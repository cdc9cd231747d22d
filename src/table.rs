use std::collections::HashSet;
use std::fs::File;

use calamine::{Data, Range, Reader, open_workbook_auto};
use camino::Utf8Path;
use polars::io::SerReader;
use polars::prelude::*;

use crate::domain::{DatasetName, Selection};
use crate::error::PainelError;
use crate::schema;

static EMPTY_CELL: Data = Data::Empty;

#[derive(Debug, Clone)]
pub struct Dataset {
    name: DatasetName,
    frame: DataFrame,
}

impl Dataset {
    pub fn from_frame(name: DatasetName, frame: DataFrame) -> Result<Self, PainelError> {
        let frame = schema::normalize(name, frame)?;
        Ok(Self { name, frame })
    }

    pub fn read(name: DatasetName, path: &Utf8Path) -> Result<Self, PainelError> {
        let frame = match path.extension() {
            Some("csv") => read_csv(name, path),
            _ => read_spreadsheet(path),
        }
        .map_err(|err| PainelError::DatasetParse {
            name: path.file_name().map(str::to_string).unwrap_or_else(|| name.file_name()),
            message: err.to_string(),
        })?;
        Self::from_frame(name, frame)
    }

    pub fn name(&self) -> DatasetName {
        self.name
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.frame.get_column_index(column).is_some()
    }

    pub fn has_join_key(&self) -> bool {
        self.has_column(schema::ID)
    }

    pub fn column_names(&self) -> Vec<String> {
        schema::column_names(&self.frame)
    }

    /// Rows whose join key is one of the selected identifiers. A dataset
    /// without a join key has no matching rows.
    pub fn rows_for(&self, selection: &Selection) -> Result<DataFrame, PainelError> {
        if !self.has_join_key() {
            return Ok(self.frame.clear());
        }
        let ids = Series::new(schema::ID.into(), selection.ids());
        let rows = self
            .frame
            .clone()
            .lazy()
            .filter(col(schema::ID).is_in(lit(ids), false))
            .collect()?;
        Ok(rows)
    }
}

// Every cell is read as text so keys keep leading zeros and late oddities
// cannot break inference; other columns are made numeric afterwards.
fn read_csv(name: DatasetName, path: &Utf8Path) -> Result<DataFrame, PainelError> {
    let file = File::open(path.as_std_path())
        .map_err(|err| PainelError::Filesystem(format!("open {path}: {err}")))?;
    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(file)
        .finish()?;
    numeric_where_possible(name, frame)
}

fn numeric_where_possible(name: DatasetName, frame: DataFrame) -> Result<DataFrame, PainelError> {
    let columns = frame
        .get_columns()
        .iter()
        .map(|column| {
            if schema::keeps_text(name, column.name()) {
                return Ok(column.clone());
            }
            let text = column.as_materialized_series();
            let numbers = text.cast(&DataType::Float64)?;
            if numbers.null_count() == text.null_count() {
                Ok(numbers.into_column())
            } else {
                Ok(column.clone())
            }
        })
        .collect::<Result<Vec<_>, PainelError>>()?;
    Ok(DataFrame::new(columns)?)
}

fn read_spreadsheet(path: &Utf8Path) -> Result<DataFrame, PainelError> {
    let mut workbook = open_workbook_auto(path.as_std_path())
        .map_err(|err| PainelError::Filesystem(err.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| PainelError::Filesystem("workbook has no worksheets".to_string()))?
        .map_err(|err| PainelError::Filesystem(err.to_string()))?;
    frame_from_range(&range)
}

/// Builds a frame from a worksheet: the first row is the header, a column is
/// numeric when every non-empty cell is numeric.
fn frame_from_range(range: &Range<Data>) -> Result<DataFrame, PainelError> {
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(DataFrame::empty());
    };
    let names = unique_names(header.iter().enumerate().map(|(index, cell)| {
        cell_text(cell).unwrap_or_else(|| format!("column_{}", index + 1))
    }));

    let body: Vec<&[Data]> = rows.collect();
    let columns = names
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let cells: Vec<&Data> = body
                .iter()
                .map(|row| row.get(index).unwrap_or(&EMPTY_CELL))
                .collect();
            build_column(name, &cells)
        })
        .collect::<Vec<_>>();

    Ok(DataFrame::new(columns)?)
}

fn unique_names(names: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .map(|name| {
            let mut candidate = name.clone();
            let mut suffix = 1;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{name}.{suffix}");
                suffix += 1;
            }
            candidate
        })
        .collect()
}

fn build_column(name: &str, cells: &[&Data]) -> Column {
    let numeric = cells
        .iter()
        .all(|cell| matches!(cell, Data::Int(_) | Data::Float(_)) || cell_text(cell).is_none());
    if numeric {
        let values: Vec<Option<f64>> = cells.iter().map(|cell| cell_number(cell)).collect();
        Column::new(name.into(), values)
    } else {
        let values: Vec<Option<String>> = cells.iter().map(|cell| cell_text(cell)).collect();
        Column::new(name.into(), values)
    }
}

fn cell_number(cell: &Data) -> Option<f64> {
    match cell {
        Data::Int(value) => Some(*value as f64),
        Data::Float(value) => Some(*value),
        _ => None,
    }
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(value) => {
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Data::Float(value) => Some(schema::format_number(*value)),
        other => Some(other.to_string()),
    }
}
