use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};

use psh_painel::chart::{ChartOutcome, ChartRequest, build_chart};
use psh_painel::config::{Config, ConfigLoader, ConfigOverrides, ResolvedConfig};
use psh_painel::dashboard::{PanelContent, Tab};
use psh_painel::domain::DatasetName;
use psh_painel::error::PainelError;
use psh_painel::fetch::FetchAction;
use psh_painel::filter::{FilterSelection, FilterStage};
use psh_painel::metrics::{self, Metric};
use psh_painel::output::JsonOutput;
use psh_painel::remote::{DownloadReport, RemoteSource};
use psh_painel::session::Session;

const UNITS: &str = "ID,Bacia,Manancial,Area_ha\n1,A,Rio Azul,1200\n2,A,Rio Verde,800\n3,B,Rio Claro,500\n";
const ELEVATION: &str = "ID,ClAlt,area_ha\n1,0-400,10\n1,400-800,5\n2,0-400,7\n";

#[derive(Default)]
struct MockRemote {
    files: Vec<(DatasetName, &'static str)>,
    calls: Mutex<usize>,
}

impl RemoteSource for MockRemote {
    fn download_all(&self, destination: &Utf8Path) -> Result<DownloadReport, PainelError> {
        *self.calls.lock().unwrap() += 1;
        let mut report = DownloadReport::default();
        for (name, content) in &self.files {
            let file = format!("{}.csv", name.stem());
            std::fs::write(destination.join(&file).as_std_path(), content).unwrap();
            report.files.push(file);
        }
        Ok(report)
    }

    fn describe(&self) -> String {
        "mock://pasta".to_string()
    }
}

struct FailingRemote;

impl RemoteSource for FailingRemote {
    fn download_all(&self, _destination: &Utf8Path) -> Result<DownloadReport, PainelError> {
        Err(PainelError::RemoteStatus {
            status: 403,
            message: "forbidden".to_string(),
        })
    }

    fn describe(&self) -> String {
        "mock://negado".to_string()
    }
}

fn config_for(dir: &Utf8Path) -> ResolvedConfig {
    ConfigLoader::resolve_config(
        Config::default(),
        ConfigOverrides {
            data_dir: Some(dir.to_path_buf()),
            data_folder_url: None,
        },
    )
}

fn data_dir(temp: &tempfile::TempDir) -> Utf8PathBuf {
    let dir = Utf8PathBuf::from_path_buf(temp.path().join("data")).unwrap();
    std::fs::create_dir_all(dir.as_std_path()).unwrap();
    dir
}

fn write(dir: &Utf8Path, name: DatasetName, content: &str) {
    std::fs::write(dir.join(format!("{}.csv", name.stem())).as_std_path(), content).unwrap();
}

fn expect_err<R: RemoteSource>(result: Result<Session<R>, PainelError>) -> PainelError {
    match result {
        Ok(_) => panic!("session opened unexpectedly"),
        Err(err) => err,
    }
}

fn open_local(dir: &Utf8Path, required: &[DatasetName]) -> Session<MockRemote> {
    Session::open_with(config_for(dir), MockRemote::default(), required, &JsonOutput).unwrap()
}

#[test]
fn basin_filter_drives_sums_and_charts() {
    let temp = tempfile::tempdir().unwrap();
    let dir = data_dir(&temp);
    write(&dir, DatasetName::Microbacias, UNITS);
    write(&dir, DatasetName::Altimetria, ELEVATION);
    let mut session = open_local(&dir, &[DatasetName::Microbacias, DatasetName::Altimetria]);

    session
        .set_filters(FilterSelection::new().with(FilterStage::Basin, ["A"]))
        .unwrap();
    assert_eq!(session.selection().ids(), &["1", "2"]);
    let elevation = session.dataset(DatasetName::Altimetria);
    let total = metrics::summarize(elevation.as_deref(), session.selection(), "area_ha").unwrap();
    assert_eq!(total, Metric::Sum(22.0));

    session
        .set_filters(FilterSelection::new().with(FilterStage::Basin, ["B"]))
        .unwrap();
    assert_eq!(session.selection().ids(), &["3"]);
    let request = ChartRequest::new("ClAlt", "area_ha", "Área por Classe de Altitude");
    let outcome = build_chart(elevation.as_deref(), session.selection(), &request).unwrap();
    assert_eq!(outcome, ChartOutcome::NoData);
}

#[test]
fn dashboard_panels_degrade_independently() {
    let temp = tempfile::tempdir().unwrap();
    let dir = data_dir(&temp);
    write(&dir, DatasetName::Microbacias, UNITS);
    write(&dir, DatasetName::Altimetria, ELEVATION);
    write(&dir, DatasetName::Declividade, "ID,area_ha\n1,3\n");
    std::fs::write(dir.join("solos_otto.xlsx").as_std_path(), b"corrompido").unwrap();
    let mut session = open_local(&dir, &[DatasetName::Microbacias]);

    let dashboard = session.dashboard();
    assert_eq!(dashboard.selected_units, 3);

    let area = dashboard.panel(Tab::Geral, "Área (k ha)").unwrap();
    assert_matches!(&area.content, PanelContent::Metric { display, .. } if display == "2.5K");
    let springs = dashboard.panel(Tab::Geral, "Nascentes").unwrap();
    assert_matches!(&springs.content, PanelContent::Metric { display, value: None } if display == "N/D");

    let elevation = dashboard
        .panel(Tab::MeioFisico, "Área por Classe de Altitude")
        .unwrap();
    assert_matches!(&elevation.content, PanelContent::Chart { outcome: ChartOutcome::Chart(spec) } if spec.bars.len() == 2);
    let slope = dashboard
        .panel(Tab::MeioFisico, "Área por Classe de Declividade")
        .unwrap();
    assert_matches!(
        &slope.content,
        PanelContent::Chart { outcome: ChartOutcome::MissingColumns { missing, .. } } if missing == &vec!["ClDec".to_string()]
    );
    let soils = dashboard
        .panel(Tab::MeioFisico, "Top 10 Classes de Solo por Área")
        .unwrap();
    assert_matches!(&soils.content, PanelContent::Chart { outcome: ChartOutcome::NoData });
    assert_eq!(dashboard.diagnostics.len(), 1);
    assert_eq!(dashboard.diagnostics[0].dataset, DatasetName::Solos);
}

#[test]
fn impossible_combination_falls_back() {
    let temp = tempfile::tempdir().unwrap();
    let dir = data_dir(&temp);
    write(&dir, DatasetName::Microbacias, UNITS);
    let mut session = open_local(&dir, &[DatasetName::Microbacias]);

    let outcome = session
        .set_filters(
            FilterSelection::new()
                .with(FilterStage::Basin, ["B"])
                .with(FilterStage::Spring, ["Rio Azul"]),
        )
        .unwrap();
    assert!(outcome.fallback);
    assert_eq!(outcome.selection.ids(), &["3"]);
}

#[test]
fn missing_files_are_downloaded_once() {
    let temp = tempfile::tempdir().unwrap();
    let dir = data_dir(&temp);
    let remote = MockRemote {
        files: vec![(DatasetName::Microbacias, UNITS)],
        calls: Mutex::new(0),
    };

    let mut session =
        Session::open_with(config_for(&dir), remote, &[DatasetName::Microbacias], &JsonOutput)
            .unwrap();
    assert_eq!(session.fetch_outcome().action, FetchAction::Downloaded);
    assert_eq!(session.fetch_outcome().downloaded, vec!["microbacias_selecionadas_otto.csv"]);

    session.reload(&JsonOutput).unwrap();
    assert_eq!(session.fetch_outcome().action, FetchAction::AlreadyPresent);
    assert_eq!(session.units().height(), 3);
}

#[test]
fn reload_fails_when_files_vanish() {
    let temp = tempfile::tempdir().unwrap();
    let dir = data_dir(&temp);
    write(&dir, DatasetName::Microbacias, UNITS);
    let required = [DatasetName::Microbacias];
    let mut session = open_local(&dir, &required);

    std::fs::remove_file(dir.join("microbacias_selecionadas_otto.csv").as_std_path()).unwrap();
    let err = session.reload(&JsonOutput).unwrap_err();
    assert_matches!(err, PainelError::MissingDataFiles(_));
}

#[test]
fn reload_picks_up_changed_files() {
    let temp = tempfile::tempdir().unwrap();
    let dir = data_dir(&temp);
    write(&dir, DatasetName::Microbacias, UNITS);
    let mut session = open_local(&dir, &[DatasetName::Microbacias]);
    session
        .set_filters(FilterSelection::new().with(FilterStage::Basin, ["A"]))
        .unwrap();

    write(
        &dir,
        DatasetName::Microbacias,
        "ID,Bacia,Manancial\n1,A,Rio Azul\n2,A,Rio Verde\n4,A,Rio Novo\n",
    );
    session.reload(&JsonOutput).unwrap();
    assert_eq!(session.selection().ids(), &["1", "2", "4"]);
}

#[test]
fn fetch_failure_is_fatal() {
    let temp = tempfile::tempdir().unwrap();
    let dir = data_dir(&temp);
    let err = expect_err(Session::open(config_for(&dir), FailingRemote, &JsonOutput));
    assert_matches!(err, PainelError::RemoteStatus { status: 403, .. });
}

#[test]
fn base_columns_are_required() {
    let temp = tempfile::tempdir().unwrap();
    let dir = data_dir(&temp);
    write(&dir, DatasetName::Microbacias, "ID,Rio\n1,x\n");
    let err = expect_err(Session::open_with(
        config_for(&dir),
        MockRemote::default(),
        &[DatasetName::Microbacias],
        &JsonOutput,
    ));
    assert_matches!(
        err,
        PainelError::MissingBaseColumns { missing, available, .. }
            if missing == vec!["Bacia".to_string(), "Manancial".to_string()]
                && available == vec!["ID".to_string(), "Rio".to_string()]
    );
}

#[test]
fn unreadable_base_dataset_is_fatal() {
    let temp = tempfile::tempdir().unwrap();
    let dir = data_dir(&temp);
    std::fs::write(
        dir.join("microbacias_selecionadas_otto.xlsx").as_std_path(),
        b"not a workbook",
    )
    .unwrap();
    let err = expect_err(Session::open_with(
        config_for(&dir),
        MockRemote::default(),
        &[DatasetName::Microbacias],
        &JsonOutput,
    ));
    assert_matches!(err, PainelError::BaseDatasetMissing(name) if name == "microbacias_selecionadas_otto.xlsx");
}
