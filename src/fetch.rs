use serde::Serialize;

use crate::domain::DatasetName;
use crate::error::PainelError;
use crate::remote::RemoteSource;
use crate::session::{ProgressEvent, ProgressSink};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchAction {
    AlreadyPresent,
    Downloaded,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchOutcome {
    pub action: FetchAction,
    pub data_dir: String,
    pub source: Option<String>,
    pub downloaded: Vec<String>,
    pub unavailable: Vec<String>,
    pub checked_at: String,
}

/// Makes sure the required spreadsheets are on disk, downloading the remote
/// folder at most once per session.
#[derive(Debug, Default)]
pub struct FetchGuard {
    attempted: bool,
}

impl FetchGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempted(&self) -> bool {
        self.attempted
    }

    pub fn ensure(
        &mut self,
        store: &Store,
        required: &[DatasetName],
        remote: &dyn RemoteSource,
        sink: &dyn ProgressSink,
    ) -> Result<FetchOutcome, PainelError> {
        store.ensure_root()?;
        let missing = store.missing(required);
        if missing.is_empty() {
            return Ok(FetchOutcome {
                action: FetchAction::AlreadyPresent,
                data_dir: store.root().to_string(),
                source: None,
                downloaded: Vec::new(),
                unavailable: Vec::new(),
                checked_at: iso_timestamp(),
            });
        }

        if self.attempted {
            tracing::warn!(
                missing = missing.len(),
                "data files still missing; download already attempted this session"
            );
            return Err(PainelError::MissingDataFiles(file_names(&missing)));
        }
        self.attempted = true;

        let source = remote.describe();
        tracing::info!(missing = missing.len(), %source, "downloading data folder");
        sink.event(ProgressEvent {
            message: "Baixando arquivos de dados...".to_string(),
            elapsed: None,
        });
        let start = std::time::Instant::now();
        let report = remote.download_all(store.root()).inspect_err(|err| {
            tracing::error!(error = %err, "data folder download failed");
        })?;
        sink.event(ProgressEvent {
            message: format!("download finished: {} files", report.files.len()),
            elapsed: Some(start.elapsed()),
        });

        let remaining = store.missing(required);
        if !remaining.is_empty() {
            return Err(PainelError::MissingDataFiles(file_names(&remaining)));
        }

        Ok(FetchOutcome {
            action: FetchAction::Downloaded,
            data_dir: store.root().to_string(),
            source: Some(source),
            downloaded: report.files,
            unavailable: report.unavailable,
            checked_at: iso_timestamp(),
        })
    }
}

fn file_names(names: &[DatasetName]) -> Vec<String> {
    names.iter().map(|name| name.file_name()).collect()
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use assert_matches::assert_matches;
    use camino::{Utf8Path, Utf8PathBuf};

    use super::*;
    use crate::output::JsonOutput;
    use crate::remote::DownloadReport;

    struct MockRemote {
        provides: Vec<DatasetName>,
        calls: Cell<usize>,
    }

    impl RemoteSource for MockRemote {
        fn download_all(&self, destination: &Utf8Path) -> Result<DownloadReport, PainelError> {
            self.calls.set(self.calls.get() + 1);
            let mut report = DownloadReport::default();
            for name in &self.provides {
                std::fs::write(destination.join(name.file_name()).as_std_path(), b"x").unwrap();
                report.files.push(name.file_name());
            }
            Ok(report)
        }

        fn describe(&self) -> String {
            "mock".to_string()
        }
    }

    fn store_in(temp: &tempfile::TempDir) -> Store {
        Store::new(Utf8PathBuf::from_path_buf(temp.path().join("data")).unwrap())
    }

    #[test]
    fn present_files_skip_download() {
        let temp = tempfile::tempdir().unwrap();
        let store = store_in(&temp);
        store.ensure_root().unwrap();
        std::fs::write(store.dataset_path(DatasetName::Caf).as_std_path(), b"x").unwrap();
        let remote = MockRemote {
            provides: vec![],
            calls: Cell::new(0),
        };

        let mut guard = FetchGuard::new();
        let outcome = guard
            .ensure(&store, &[DatasetName::Caf], &remote, &JsonOutput)
            .unwrap();
        assert_eq!(outcome.action, FetchAction::AlreadyPresent);
        assert_eq!(remote.calls.get(), 0);
        assert!(!guard.attempted());
    }

    #[test]
    fn download_runs_once_per_session() {
        let temp = tempfile::tempdir().unwrap();
        let store = store_in(&temp);
        let remote = MockRemote {
            provides: vec![DatasetName::Caf],
            calls: Cell::new(0),
        };
        let mut guard = FetchGuard::new();

        let err = guard
            .ensure(
                &store,
                &[DatasetName::Caf, DatasetName::Sigarh],
                &remote,
                &JsonOutput,
            )
            .unwrap_err();
        assert_matches!(err, PainelError::MissingDataFiles(files) if files == vec!["sigarh_otto.xlsx".to_string()]);

        let err = guard
            .ensure(&store, &[DatasetName::Sigarh], &remote, &JsonOutput)
            .unwrap_err();
        assert_matches!(err, PainelError::MissingDataFiles(_));
        assert_eq!(remote.calls.get(), 1);

        let outcome = guard
            .ensure(&store, &[DatasetName::Caf], &remote, &JsonOutput)
            .unwrap();
        assert_eq!(outcome.action, FetchAction::AlreadyPresent);
    }
}
