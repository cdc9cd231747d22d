//! Canonical column names and the synonyms each dataset may use for them.

use polars::prelude::*;

use crate::domain::DatasetName;
use crate::error::PainelError;

// ── Join key ────────────────────────────────────────────────────────────────
pub const ID: &str = "ID";

// ── Watershed unit attributes ───────────────────────────────────────────────
pub mod unit {
    pub const BASIN: &str = "Bacia";
    pub const SPRING: &str = "Manancial";
    pub const SPRING_NUMBER: &str = "N_Manancial";
    pub const SPRING_NAME: &str = "Nome_Manancial";

    pub const REQUIRED: [&str; 3] = [super::ID, BASIN, SPRING];
}

// ── Measurements ────────────────────────────────────────────────────────────
pub const AREA_HA: &str = "area_ha";
pub const LENGTH_KM: &str = "length_km";

// ── Category columns ────────────────────────────────────────────────────────
pub mod category {
    pub const ELEVATION: &str = "ClAlt";
    pub const SLOPE: &str = "ClDec";
    pub const SOIL: &str = "Cl_solos";
    pub const RURAL_MODULE: &str = "clas_mod";
    pub const LAND_USE: &str = "Classe_de_Uso_do_Solo";
}

#[derive(Debug, Clone, Copy)]
pub struct Synonyms {
    pub canonical: &'static str,
    pub candidates: &'static [&'static str],
}

const ID_SYNONYMS: Synonyms = Synonyms {
    canonical: ID,
    candidates: &["ID", "Id", "id"],
};

const UNIT_SYNONYMS: [Synonyms; 5] = [
    Synonyms {
        canonical: unit::BASIN,
        candidates: &["Bacia", "bacia", "BACIA"],
    },
    Synonyms {
        canonical: unit::SPRING,
        candidates: &["Manancial", "manancial", "MANANCIAL"],
    },
    Synonyms {
        canonical: unit::SPRING_NUMBER,
        candidates: &[
            "N_Manancial",
            "Num_Manancial",
            "NumManancial",
            "Numero_Manancial",
        ],
    },
    Synonyms {
        canonical: unit::SPRING_NAME,
        candidates: &["Nome_Manancial", "NomeManancial", "Nome_Man", "Descricao"],
    },
    Synonyms {
        canonical: AREA_HA,
        candidates: &["Area_ha", "area_ha", "AREA_HA", "Area"],
    },
];

const CLASS_AREA: [Synonyms; 1] = [Synonyms {
    canonical: AREA_HA,
    candidates: &["area_ha", "Area_ha", "AREA_HA", "Area"],
}];

const LAND_USE_AREA: [Synonyms; 1] = [Synonyms {
    canonical: AREA_HA,
    candidates: &["Area_ha", "area_ha", "AREA_HA", "Area"],
}];

const PROPERTY_AREA: [Synonyms; 1] = [Synonyms {
    canonical: AREA_HA,
    candidates: &["num_area", "area_ha", "Area_ha", "AREA_HA"],
}];

const DRAINAGE_LENGTH: [Synonyms; 1] = [Synonyms {
    canonical: LENGTH_KM,
    candidates: &["Length_km", "length_km", "comprimento_km", "Comprimento"],
}];

pub fn synonyms_for(name: DatasetName) -> &'static [Synonyms] {
    match name {
        DatasetName::Microbacias => &UNIT_SYNONYMS,
        DatasetName::Altimetria | DatasetName::Declividade | DatasetName::Solos => &CLASS_AREA,
        DatasetName::UsoSolo | DatasetName::ConflitosUso => &LAND_USE_AREA,
        DatasetName::ImoveisCar => &PROPERTY_AREA,
        DatasetName::Hidrografia => &DRAINAGE_LENGTH,
        DatasetName::Caf
        | DatasetName::Educacao
        | DatasetName::Construcoes
        | DatasetName::Nascentes
        | DatasetName::Sigarh => &[],
    }
}

pub fn text_columns(name: DatasetName) -> &'static [&'static str] {
    if name.is_base() {
        &[
            ID,
            unit::BASIN,
            unit::SPRING,
            unit::SPRING_NUMBER,
            unit::SPRING_NAME,
        ]
    } else {
        &[ID]
    }
}

pub fn keeps_text(name: DatasetName, column: &str) -> bool {
    let text = text_columns(name);
    std::iter::once(&ID_SYNONYMS)
        .chain(synonyms_for(name))
        .filter(|synonyms| text.contains(&synonyms.canonical))
        .any(|synonyms| synonyms.canonical == column || synonyms.candidates.contains(&column))
}

/// Renames the first present candidate of every synonym group to its canonical
/// name and coerces key and attribute columns to text.
pub fn normalize(name: DatasetName, mut frame: DataFrame) -> Result<DataFrame, PainelError> {
    resolve_synonyms(&mut frame, &ID_SYNONYMS)?;
    for synonyms in synonyms_for(name) {
        resolve_synonyms(&mut frame, synonyms)?;
    }
    for column in text_columns(name) {
        if frame.get_column_index(column).is_some() {
            let text = to_text(frame.column(column)?.as_materialized_series())?;
            frame.with_column(text)?;
        }
    }
    Ok(frame)
}

fn resolve_synonyms(frame: &mut DataFrame, synonyms: &Synonyms) -> Result<(), PainelError> {
    let Some(found) = synonyms
        .candidates
        .iter()
        .copied()
        .find(|candidate| frame.get_column_index(candidate).is_some())
    else {
        return Ok(());
    };
    if found == synonyms.canonical {
        return Ok(());
    }
    if frame.get_column_index(synonyms.canonical).is_some() {
        tracing::debug!(
            canonical = synonyms.canonical,
            preferred = found,
            "replacing canonical column with preferred synonym"
        );
        frame.drop_in_place(synonyms.canonical)?;
    }
    frame.rename(found, synonyms.canonical.into())?;
    Ok(())
}

/// Text rendering of a column. Integral floats lose their fraction so that a
/// spreadsheet `1.0` joins against a CSV `1`.
pub fn to_text(series: &Series) -> Result<Series, PainelError> {
    let name = series.name().clone();
    match series.dtype() {
        DataType::String => Ok(series.clone()),
        DataType::Float32 | DataType::Float64 => {
            let floats = series.cast(&DataType::Float64)?;
            let values: Vec<Option<String>> = floats
                .f64()?
                .into_iter()
                .map(|value| value.map(format_number))
                .collect();
            Ok(Series::new(name, values))
        }
        _ => Ok(series.cast(&DataType::String)?),
    }
}

pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

pub fn column_names(frame: &DataFrame) -> Vec<String> {
    frame
        .get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_candidate_wins_over_existing_canonical() {
        let frame = DataFrame::new(vec![
            Column::new("ID".into(), vec![1.0, 2.0]),
            Column::new("num_area".into(), vec![10.0, 20.0]),
            Column::new("area_ha".into(), vec![1.0, 2.0]),
        ])
        .unwrap();

        let frame = normalize(DatasetName::ImoveisCar, frame).unwrap();
        let area = frame.column(AREA_HA).unwrap().f64().unwrap();
        assert_eq!(area.get(0), Some(10.0));
        assert!(frame.get_column_index("num_area").is_none());
    }

    #[test]
    fn synonyms_resolve_to_canonical_names() {
        let frame = DataFrame::new(vec![
            Column::new("id".into(), vec!["a", "b"]),
            Column::new("Comprimento".into(), vec![1.5, 2.5]),
        ])
        .unwrap();

        let frame = normalize(DatasetName::Hidrografia, frame).unwrap();
        assert_eq!(column_names(&frame), vec!["ID", "length_km"]);
    }

    #[test]
    fn numeric_ids_become_integral_text() {
        let frame = DataFrame::new(vec![
            Column::new("ID".into(), vec![Some(1.0), None, Some(2.5)]),
            Column::new("Bacia".into(), vec!["A", "A", "B"]),
        ])
        .unwrap();

        let frame = normalize(DatasetName::Microbacias, frame).unwrap();
        let ids: Vec<Option<&str>> = frame.column(ID).unwrap().str().unwrap().into_iter().collect();
        assert_eq!(ids, vec![Some("1"), None, Some("2.5")]);
    }

    #[test]
    fn key_and_attribute_synonyms_stay_text() {
        assert!(keeps_text(DatasetName::Caf, "id"));
        assert!(keeps_text(DatasetName::Microbacias, "Num_Manancial"));
        assert!(!keeps_text(DatasetName::Microbacias, "Area_ha"));
        assert!(!keeps_text(DatasetName::Caf, "Bacia"));
    }

    #[test]
    fn format_number_keeps_fractions() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-4.0), "-4");
        assert_eq!(format_number(0.25), "0.25");
    }
}
