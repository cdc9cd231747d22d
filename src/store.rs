use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::DatasetName;
use crate::error::PainelError;

#[derive(Debug, Clone)]
pub struct Store {
    root: Utf8PathBuf,
}

impl Store {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn dataset_path(&self, name: DatasetName) -> Utf8PathBuf {
        self.root.join(name.file_name())
    }

    pub fn csv_path(&self, name: DatasetName) -> Utf8PathBuf {
        self.root.join(format!("{}.csv", name.stem()))
    }

    pub fn locate(&self, name: DatasetName) -> Option<Utf8PathBuf> {
        [self.dataset_path(name), self.csv_path(name)]
            .into_iter()
            .find(|path| path.as_std_path().is_file())
    }

    pub fn exists(&self, name: DatasetName) -> bool {
        self.locate(name).is_some()
    }

    pub fn missing(&self, required: &[DatasetName]) -> Vec<DatasetName> {
        required
            .iter()
            .copied()
            .filter(|name| !self.exists(*name))
            .collect()
    }

    pub fn ensure_root(&self) -> Result<(), PainelError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| PainelError::Filesystem(err.to_string()))
    }

    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), PainelError> {
        let parent = path
            .parent()
            .ok_or_else(|| PainelError::Filesystem("invalid destination path".to_string()))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| PainelError::Filesystem(err.to_string()))?;
        let mut temp = tempfile::Builder::new()
            .prefix("psh-painel-file")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| PainelError::Filesystem(err.to_string()))?;
        temp.write_all(content)
            .map_err(|err| PainelError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| PainelError::Filesystem(err.to_string()))?;
        Ok(())
    }
}
