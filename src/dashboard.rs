use polars::prelude::*;
use serde::Serialize;

use crate::cache::{DatasetCache, LoadDiagnostic};
use crate::chart::{self, ChartOutcome, ChartRequest};
use crate::domain::{DatasetName, Selection};
use crate::error::PainelError;
use crate::filter::FilterOutcome;
use crate::metrics;
use crate::schema::{self, AREA_HA, LENGTH_KM, category};

pub const NOT_AVAILABLE: &str = "N/D";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    Geral,
    MeioFisico,
    Socioeconomico,
    Outorgas,
    UsoSolo,
}

impl Tab {
    pub const ALL: [Tab; 5] = [
        Tab::Geral,
        Tab::MeioFisico,
        Tab::Socioeconomico,
        Tab::Outorgas,
        Tab::UsoSolo,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Tab::Geral => "Geral",
            Tab::MeioFisico => "Meio Físico",
            Tab::Socioeconomico => "Socioeconômico",
            Tab::Outorgas => "Outorgas",
            Tab::UsoSolo => "Uso do Solo",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PanelContent {
    Metric { display: String, value: Option<f64> },
    Chart { outcome: ChartOutcome },
    Units { table: UnitTable },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Panel {
    pub title: String,
    pub content: PanelContent,
}

#[derive(Debug, Clone, Serialize)]
pub struct TabView {
    pub tab: Tab,
    pub title: &'static str,
    pub panels: Vec<Panel>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub selected_units: usize,
    pub fallback: bool,
    pub tabs: Vec<TabView>,
    pub diagnostics: Vec<LoadDiagnostic>,
}

impl Dashboard {
    pub fn tab(&self, tab: Tab) -> Option<&TabView> {
        self.tabs.iter().find(|view| view.tab == tab)
    }

    pub fn panel(&self, tab: Tab, title: &str) -> Option<&Panel> {
        self.tab(tab)?.panels.iter().find(|panel| panel.title == title)
    }
}

/// Assembles every tab for the current filter outcome. A failing panel is
/// replaced by its error message; the remaining panels still render.
pub fn build(cache: &mut DatasetCache, outcome: &FilterOutcome) -> Dashboard {
    let selection = &outcome.selection;
    let tabs = Tab::ALL
        .into_iter()
        .map(|tab| TabView {
            tab,
            title: tab.title(),
            panels: match tab {
                Tab::Geral => general(cache, outcome),
                Tab::MeioFisico => physical(cache, selection),
                Tab::Socioeconomico => socioeconomic(cache, selection),
                Tab::Outorgas => permits(cache, selection),
                Tab::UsoSolo => land_use(cache, selection),
            },
        })
        .collect();

    Dashboard {
        selected_units: selection.len(),
        fallback: outcome.fallback,
        tabs,
        diagnostics: cache.diagnostics().to_vec(),
    }
}

fn general(cache: &mut DatasetCache, outcome: &FilterOutcome) -> Vec<Panel> {
    let selection = &outcome.selection;
    vec![
        metric_panel("Microbacias", || {
            let count = outcome.units.height();
            Ok((format_count(count), Some(count as f64)))
        }),
        metric_panel("Área (k ha)", || {
            if outcome.units.get_column_index(AREA_HA).is_none() {
                return Ok((NOT_AVAILABLE.to_string(), None));
            }
            let total = frame_sum(&outcome.units, AREA_HA)? / 1000.0;
            Ok((format!("{}K", format_decimal(total, 1)), Some(total)))
        }),
        count_panel(cache, "Nascentes", DatasetName::Nascentes, selection),
        count_panel(cache, "CAF", DatasetName::Caf, selection),
        panel("Microbacias selecionadas", || {
            Ok(PanelContent::Units {
                table: unit_table(&outcome.units)?,
            })
        }),
    ]
}

fn physical(cache: &mut DatasetCache, selection: &Selection) -> Vec<Panel> {
    vec![
        chart_panel(
            cache,
            DatasetName::Altimetria,
            selection,
            ChartRequest::new(category::ELEVATION, AREA_HA, "Área por Classe de Altitude")
                .labels("Classe de Altitude", "Área (ha)"),
        ),
        chart_panel(
            cache,
            DatasetName::Declividade,
            selection,
            ChartRequest::new(category::SLOPE, AREA_HA, "Área por Classe de Declividade")
                .labels("Classe de Declividade", "Área (ha)"),
        ),
        chart_panel(
            cache,
            DatasetName::Solos,
            selection,
            ChartRequest::new(category::SOIL, AREA_HA, "Top 10 Classes de Solo por Área")
                .labels("Classe de Solo", "Área (ha)")
                .horizontal()
                .top(10),
        ),
    ]
}

fn socioeconomic(cache: &mut DatasetCache, selection: &Selection) -> Vec<Panel> {
    vec![
        count_panel(cache, "Total CAF", DatasetName::Caf, selection),
        count_panel(cache, "Gestores/Escolas", DatasetName::Educacao, selection),
        count_panel(cache, "Construções", DatasetName::Construcoes, selection),
        chart_panel(
            cache,
            DatasetName::ImoveisCar,
            selection,
            ChartRequest::new(
                category::RURAL_MODULE,
                AREA_HA,
                "Área Total por Classe de Módulo Rural",
            )
            .labels("Classe", "Área"),
        ),
        chart_panel(
            cache,
            DatasetName::ImoveisCar,
            selection,
            ChartRequest::new(category::RURAL_MODULE, "count", "Número de Imóveis por Classe")
                .labels("Classe", "Quantidade")
                .count()
                .largest_first(),
        ),
    ]
}

fn permits(cache: &mut DatasetCache, selection: &Selection) -> Vec<Panel> {
    let drainage = cache.get(DatasetName::Hidrografia);
    vec![
        count_panel(cache, "Nascentes", DatasetName::Nascentes, selection),
        metric_panel("Drenagem (km)", || {
            let dataset = drainage
                .as_deref()
                .filter(|dataset| dataset.has_join_key() && !selection.is_empty());
            let total = metrics::sum_first_present(dataset, selection, &[LENGTH_KM])?;
            Ok(match total {
                Some(total) => (format_decimal(total, 1), Some(total)),
                None => (NOT_AVAILABLE.to_string(), None),
            })
        }),
        count_panel(cache, "Outorgas", DatasetName::Sigarh, selection),
    ]
}

fn land_use(cache: &mut DatasetCache, selection: &Selection) -> Vec<Panel> {
    vec![
        chart_panel(
            cache,
            DatasetName::UsoSolo,
            selection,
            ChartRequest::new(category::LAND_USE, AREA_HA, "Área por Classe de Uso do Solo")
                .labels("Classe", "Área (ha)")
                .horizontal(),
        ),
        chart_panel(
            cache,
            DatasetName::ConflitosUso,
            selection,
            ChartRequest::new(category::LAND_USE, AREA_HA, "Conflitos de Uso em APP")
                .labels("Classe", "Área (ha)"),
        ),
    ]
}

fn panel<F>(title: &str, content: F) -> Panel
where
    F: FnOnce() -> Result<PanelContent, PainelError>,
{
    let content = content().unwrap_or_else(|err| {
        tracing::warn!(panel = title, error = %err, "panel failed");
        PanelContent::Error {
            message: err.to_string(),
        }
    });
    tracing::debug!(panel = title, "panel built");
    Panel {
        title: title.to_string(),
        content,
    }
}

fn metric_panel<F>(title: &str, metric: F) -> Panel
where
    F: FnOnce() -> Result<(String, Option<f64>), PainelError>,
{
    panel(title, || {
        let (display, value) = metric()?;
        Ok(PanelContent::Metric { display, value })
    })
}

fn count_panel(
    cache: &mut DatasetCache,
    title: &str,
    name: DatasetName,
    selection: &Selection,
) -> Panel {
    let dataset = cache.get(name);
    metric_panel(title, || {
        Ok(match metrics::count_matching(dataset.as_deref(), selection)? {
            Some(count) => (format_count(count), Some(count as f64)),
            None => (NOT_AVAILABLE.to_string(), None),
        })
    })
}

fn chart_panel(
    cache: &mut DatasetCache,
    name: DatasetName,
    selection: &Selection,
    request: ChartRequest,
) -> Panel {
    let dataset = cache.get(name);
    let title = request.title.clone();
    panel(&title, || {
        let outcome = chart::build_chart(dataset.as_deref(), selection, &request)?;
        Ok(PanelContent::Chart { outcome })
    })
}

fn frame_sum(frame: &DataFrame, column: &str) -> Result<f64, PainelError> {
    let values = frame
        .column(column)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    Ok(values.f64()?.into_iter().flatten().sum())
}

fn unit_table(frame: &DataFrame) -> Result<UnitTable, PainelError> {
    let columns = schema::column_names(frame);
    let mut rows = vec![Vec::with_capacity(columns.len()); frame.height()];
    for column in frame.get_columns() {
        let text = schema::to_text(column.as_materialized_series())?;
        for (row, value) in rows.iter_mut().zip(text.str()?.into_iter()) {
            row.push(value.unwrap_or_default().to_string());
        }
    }
    Ok(UnitTable { columns, rows })
}

pub fn format_count(value: usize) -> String {
    group_thousands(&value.to_string())
}

pub fn format_decimal(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (integer, fraction) = match formatted.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (formatted.as_str(), None),
    };
    let mut out = String::new();
    if value < 0.0 && formatted.chars().any(|c| c != '0' && c != '.') {
        out.push('-');
    }
    out.push_str(&group_thousands(integer));
    if let Some(fraction) = fraction {
        out.push('.');
        out.push_str(fraction);
    }
    out
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands_separators() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1234), "1,234");
        assert_eq!(format_count(1234567), "1,234,567");
        assert_eq!(format_decimal(1234.56, 1), "1,234.6");
        assert_eq!(format_decimal(-0.04, 1), "0.0");
        assert_eq!(format_decimal(-12345.0, 0), "-12,345");
    }

    #[test]
    fn failing_panel_keeps_its_title() {
        let failed = panel("Solos", || Err(PainelError::Filesystem("disk gone".to_string())));
        assert_eq!(failed.title, "Solos");
        assert!(
            matches!(failed.content, PanelContent::Error { ref message } if message.contains("disk gone"))
        );
    }

    #[test]
    fn unit_table_renders_nulls_as_blank() {
        let frame = DataFrame::new(vec![
            Column::new("ID".into(), vec!["1", "2"]),
            Column::new("area_ha".into(), vec![Some(2.0), None]),
        ])
        .unwrap();
        let table = unit_table(&frame).unwrap();
        assert_eq!(table.columns, vec!["ID", "area_ha"]);
        assert_eq!(table.rows, vec![vec!["1", "2"], vec!["2", ""]]);
    }
}
