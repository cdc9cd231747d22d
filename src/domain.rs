use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetName {
    Microbacias,
    Altimetria,
    Declividade,
    Solos,
    Caf,
    Educacao,
    Construcoes,
    ImoveisCar,
    Nascentes,
    Hidrografia,
    Sigarh,
    UsoSolo,
    ConflitosUso,
}

impl DatasetName {
    pub const ALL: [DatasetName; 13] = [
        DatasetName::Microbacias,
        DatasetName::Altimetria,
        DatasetName::Declividade,
        DatasetName::Solos,
        DatasetName::Caf,
        DatasetName::Educacao,
        DatasetName::Construcoes,
        DatasetName::ImoveisCar,
        DatasetName::Nascentes,
        DatasetName::Hidrografia,
        DatasetName::Sigarh,
        DatasetName::UsoSolo,
        DatasetName::ConflitosUso,
    ];

    pub fn stem(self) -> &'static str {
        match self {
            DatasetName::Microbacias => "microbacias_selecionadas_otto",
            DatasetName::Altimetria => "altimetria_otto",
            DatasetName::Declividade => "declividade_otto",
            DatasetName::Solos => "solos_otto",
            DatasetName::Caf => "caf_otto",
            DatasetName::Educacao => "educacao_otto",
            DatasetName::Construcoes => "construcoes_otto",
            DatasetName::ImoveisCar => "imoveiscar_otto",
            DatasetName::Nascentes => "nascentes_otto",
            DatasetName::Hidrografia => "hidrografia_otto",
            DatasetName::Sigarh => "sigarh_otto",
            DatasetName::UsoSolo => "uso_solo_otto",
            DatasetName::ConflitosUso => "conflitosdeuso_otto",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.xlsx", self.stem())
    }

    pub fn is_base(self) -> bool {
        matches!(self, DatasetName::Microbacias)
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Vertical,
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    #[default]
    Sum,
    Count,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selection(Vec<String>);

impl Selection {
    pub fn ids(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Selection {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_use_the_published_stems() {
        assert_eq!(DatasetName::Solos.file_name(), "solos_otto.xlsx");
        assert_eq!(DatasetName::ConflitosUso.to_string(), "conflitosdeuso_otto.xlsx");
    }

    #[test]
    fn only_microbacias_is_base() {
        let bases: Vec<_> = DatasetName::ALL.into_iter().filter(|n| n.is_base()).collect();
        assert_eq!(bases, vec![DatasetName::Microbacias]);
    }
}
