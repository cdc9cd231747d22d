use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::domain::DatasetName;
use crate::store::Store;
use crate::table::Dataset;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadDiagnostic {
    pub dataset: DatasetName,
    pub message: String,
}

/// Absence is remembered as well as success; only [`DatasetCache::clear`]
/// forgets entries.
#[derive(Debug)]
pub struct DatasetCache {
    store: Store,
    entries: HashMap<DatasetName, Option<Arc<Dataset>>>,
    diagnostics: Vec<LoadDiagnostic>,
}

impl DatasetCache {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            entries: HashMap::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn get(&mut self, name: DatasetName) -> Option<Arc<Dataset>> {
        if let Some(entry) = self.entries.get(&name) {
            return entry.clone();
        }
        let entry = self.load(name);
        self.entries.insert(name, entry.clone());
        entry
    }

    pub fn is_cached(&self, name: DatasetName) -> bool {
        self.entries.contains_key(&name)
    }

    pub fn diagnostics(&self) -> &[LoadDiagnostic] {
        &self.diagnostics
    }

    pub fn clear(&mut self) {
        tracing::info!(entries = self.entries.len(), "clearing dataset cache");
        self.entries.clear();
        self.diagnostics.clear();
    }

    fn load(&mut self, name: DatasetName) -> Option<Arc<Dataset>> {
        let path = self.store.locate(name)?;
        match Dataset::read(name, &path) {
            Ok(dataset) => {
                tracing::info!(dataset = %name, rows = dataset.height(), path = %path, "loaded dataset");
                Some(Arc::new(dataset))
            }
            Err(err) => {
                tracing::error!(dataset = %name, error = %err, "failed to load dataset");
                self.diagnostics.push(LoadDiagnostic {
                    dataset: name,
                    message: format!("Erro ao carregar {name}: {err}"),
                });
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use super::*;

    fn cache_in(temp: &tempfile::TempDir) -> DatasetCache {
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        DatasetCache::new(Store::new(root))
    }

    #[test]
    fn absent_file_is_none_without_diagnostic() {
        let temp = tempfile::tempdir().unwrap();
        let mut cache = cache_in(&temp);
        assert!(cache.get(DatasetName::Nascentes).is_none());
        assert!(cache.is_cached(DatasetName::Nascentes));
        assert!(cache.diagnostics().is_empty());
    }

    #[test]
    fn corrupt_spreadsheet_is_absent_with_diagnostic() {
        let temp = tempfile::tempdir().unwrap();
        let mut cache = cache_in(&temp);
        let path = cache.store().dataset_path(DatasetName::Solos);
        std::fs::write(path.as_std_path(), b"not a workbook").unwrap();

        assert!(cache.get(DatasetName::Solos).is_none());
        assert_eq!(cache.diagnostics().len(), 1);
        assert_eq!(cache.diagnostics()[0].dataset, DatasetName::Solos);
        assert!(cache.diagnostics()[0].message.contains("solos_otto.xlsx"));
    }

    #[test]
    fn loads_are_memoized_until_cleared() {
        let temp = tempfile::tempdir().unwrap();
        let mut cache = cache_in(&temp);
        let path = cache.store().csv_path(DatasetName::Caf);
        std::fs::write(path.as_std_path(), b"ID,nome\n1,a\n2,b\n").unwrap();

        let first = cache.get(DatasetName::Caf).unwrap();
        std::fs::write(path.as_std_path(), b"ID,nome\n1,a\n").unwrap();
        let second = cache.get(DatasetName::Caf).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.height(), 2);

        cache.clear();
        assert!(!cache.is_cached(DatasetName::Caf));
        assert_eq!(cache.get(DatasetName::Caf).unwrap().height(), 1);
    }
}
