use std::fs;
use std::io;
use std::path::Path;

use camino::Utf8Path;
use zip::ZipArchive;

use crate::error::PainelError;

/// Extracts every file of the archive directly into `target_dir`, dropping the
/// archive's directory structure. Returns the extracted file names.
pub fn extract_zip_flat(zip_path: &Path, target_dir: &Utf8Path) -> Result<Vec<String>, PainelError> {
    let file = fs::File::open(zip_path)
        .map_err(|err| PainelError::Filesystem(format!("open zip {}: {err}", zip_path.display())))?;
    let mut archive =
        ZipArchive::new(file).map_err(|err| PainelError::Filesystem(err.to_string()))?;

    let mut extracted = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| PainelError::Filesystem(err.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        let file_name = match entry.enclosed_name() {
            Some(path) => path
                .file_name()
                .and_then(|name| name.to_str())
                .map(str::to_string),
            None => {
                return Err(PainelError::Filesystem(
                    "zip entry path traversal detected".to_string(),
                ));
            }
        };
        let Some(file_name) = file_name else {
            continue;
        };

        let destination = target_dir.join(&file_name);
        let mut outfile = fs::File::create(destination.as_std_path())
            .map_err(|err| PainelError::Filesystem(err.to_string()))?;
        io::copy(&mut entry, &mut outfile)
            .map_err(|err| PainelError::Filesystem(err.to_string()))?;
        extracted.push(file_name);
    }
    Ok(extracted)
}

pub fn validate_zip(zip_path: &Path) -> Result<(), PainelError> {
    let file = fs::File::open(zip_path)
        .map_err(|err| PainelError::Filesystem(format!("open zip {}: {err}", zip_path.display())))?;
    let mut archive =
        ZipArchive::new(file).map_err(|err| PainelError::Filesystem(err.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| PainelError::Filesystem(err.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        io::copy(&mut entry, &mut io::sink())
            .map_err(|err| PainelError::Filesystem(err.to_string()))?;
    }
    Ok(())
}
