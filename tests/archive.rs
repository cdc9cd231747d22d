use std::io::Write;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use zip::write::SimpleFileOptions;

use psh_painel::domain::DatasetName;
use psh_painel::error::PainelError;
use psh_painel::fs_util;
use psh_painel::store::Store;

fn write_zip(path: &std::path::Path, entries: &[(&str, &[u8])]) {
    let file = std::fs::File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    for (name, content) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap();
}

#[test]
fn extracted_folder_satisfies_the_store() {
    let temp = tempfile::tempdir().unwrap();
    let zip_path = temp.path().join("pasta.zip");
    write_zip(
        &zip_path,
        &[
            ("PSH/microbacias_selecionadas_otto.csv", b"ID,Bacia,Manancial\n1,A,M\n"),
            ("PSH/tabelas/caf_otto.xlsx", b"placeholder"),
            ("LEIAME.txt", b"dados do programa"),
        ],
    );

    let root = Utf8PathBuf::from_path_buf(temp.path().join("data")).unwrap();
    let store = Store::new(root.clone());
    store.ensure_root().unwrap();
    fs_util::validate_zip(&zip_path).unwrap();
    let mut names = fs_util::extract_zip_flat(&zip_path, &root).unwrap();
    names.sort();
    assert_eq!(
        names,
        vec!["LEIAME.txt", "caf_otto.xlsx", "microbacias_selecionadas_otto.csv"]
    );
    assert_eq!(
        store.missing(&[DatasetName::Microbacias, DatasetName::Caf, DatasetName::Solos]),
        vec![DatasetName::Solos]
    );
}

#[test]
fn traversal_entries_are_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let zip_path = temp.path().join("pasta.zip");
    write_zip(&zip_path, &[("../fora.csv", b"ID\n1\n")]);

    let root = Utf8PathBuf::from_path_buf(temp.path().join("data")).unwrap();
    std::fs::create_dir_all(root.as_std_path()).unwrap();
    let err = fs_util::extract_zip_flat(&zip_path, &root).unwrap_err();
    assert_matches!(err, PainelError::Filesystem(message) if message.contains("traversal"));
    assert!(!temp.path().join("fora.csv").exists());
}

#[test]
fn garbage_is_not_a_valid_archive() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("pagina.zip");
    std::fs::write(&path, b"<!DOCTYPE html><html></html>").unwrap();
    assert_matches!(fs_util::validate_zip(&path), Err(PainelError::Filesystem(_)));
}
