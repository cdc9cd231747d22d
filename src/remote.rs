use std::fs::File;
use std::io::Read;
use std::thread;

use camino::Utf8Path;
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;

use crate::config::{RemoteConfig, RemoteLayout, RetryPolicy};
use crate::domain::DatasetName;
use crate::error::PainelError;
use crate::fs_util;
use crate::store::Store;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DownloadReport {
    pub files: Vec<String>,
    pub unavailable: Vec<String>,
}

pub trait RemoteSource {
    fn download_all(&self, destination: &Utf8Path) -> Result<DownloadReport, PainelError>;

    fn describe(&self) -> String;
}

#[derive(Clone)]
pub struct HttpRemoteSource {
    client: Client,
    folder_url: String,
    layout: RemoteLayout,
    retry: RetryPolicy,
}

impl HttpRemoteSource {
    pub fn new(config: &RemoteConfig) -> Result<Self, PainelError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("psh-painel/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| PainelError::RemoteHttp(err.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|err| PainelError::RemoteHttp(err.to_string()))?;

        Ok(Self {
            client,
            folder_url: config.folder_url.clone(),
            layout: config.layout,
            retry: config.retry,
        })
    }

    fn download_archive(&self, destination: &Utf8Path) -> Result<DownloadReport, PainelError> {
        let response = self.send_with_retries(|| self.client.get(&self.folder_url))?;
        let mut response = ensure_success(response)?;

        let mut archive = tempfile::Builder::new()
            .prefix("psh-painel-download")
            .suffix(".zip")
            .tempfile_in(destination.as_std_path())
            .map_err(|err| PainelError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, archive.as_file_mut())
            .map_err(|err| PainelError::RemoteHttp(err.to_string()))?;

        if !has_zip_magic(archive.path())? {
            return Err(PainelError::NotAnArchive(self.folder_url.clone()));
        }
        fs_util::validate_zip(archive.path())?;
        let files = fs_util::extract_zip_flat(archive.path(), destination)?;
        let unavailable = DatasetName::ALL
            .into_iter()
            .filter(|name| {
                !files.contains(&name.file_name())
                    && !files.contains(&format!("{}.csv", name.stem()))
            })
            .map(|name| name.file_name())
            .collect();
        Ok(DownloadReport { files, unavailable })
    }

    fn download_files(&self, destination: &Utf8Path) -> Result<DownloadReport, PainelError> {
        let base = self.folder_url.trim_end_matches('/');
        let mut report = DownloadReport::default();
        for name in DatasetName::ALL {
            let file = name.file_name();
            let url = format!("{base}/{file}");
            let response = self.send_with_retries(|| self.client.get(&url))?;
            if response.status() == StatusCode::NOT_FOUND {
                tracing::warn!(%url, "remote folder does not provide file");
                report.unavailable.push(file);
                continue;
            }
            let bytes = ensure_success(response)?
                .bytes()
                .map_err(|err| PainelError::RemoteHttp(err.to_string()))?;
            Store::write_bytes_atomic(&destination.join(&file), &bytes)?;
            report.files.push(file);
        }
        Ok(report)
    }

    fn send_with_retries<F>(&self, mut make_req: F) -> Result<Response, PainelError>
    where
        F: FnMut() -> RequestBuilder,
    {
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < self.retry.max_retries && is_retryable_status(status) {
                        tracing::warn!(status, attempt, "retrying remote request");
                        thread::sleep(self.retry.delay_for(attempt));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < self.retry.max_retries && is_retryable_error(&err) {
                        tracing::warn!(error = %err, attempt, "retrying remote request");
                        thread::sleep(self.retry.delay_for(attempt));
                        attempt += 1;
                        continue;
                    }
                    return Err(PainelError::RemoteHttp(err.to_string()));
                }
            }
        }
    }
}

impl RemoteSource for HttpRemoteSource {
    fn download_all(&self, destination: &Utf8Path) -> Result<DownloadReport, PainelError> {
        match self.layout {
            RemoteLayout::Archive => self.download_archive(destination),
            RemoteLayout::Files => self.download_files(destination),
        }
    }

    fn describe(&self) -> String {
        self.folder_url.clone()
    }
}

fn ensure_success(response: Response) -> Result<Response, PainelError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response
        .text()
        .unwrap_or_else(|_| "remote request failed".to_string());
    Err(PainelError::RemoteStatus { status, message })
}

fn has_zip_magic(path: &std::path::Path) -> Result<bool, PainelError> {
    let mut magic = [0u8; 4];
    let mut file = File::open(path).map_err(|err| PainelError::Filesystem(err.to_string()))?;
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(&magic == b"PK\x03\x04"),
        Err(_) => Ok(false),
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(403));
    }

    #[test]
    fn malformed_requests_are_not_retried() {
        let err = reqwest::blocking::Client::new()
            .get("not a url")
            .build()
            .unwrap_err();
        assert!(!is_retryable_error(&err));
    }

    #[test]
    fn zip_magic_detection() {
        let temp = tempfile::tempdir().unwrap();
        let html = temp.path().join("page.html");
        std::fs::write(&html, b"<html></html>").unwrap();
        assert!(!has_zip_magic(&html).unwrap());

        let short = temp.path().join("short");
        std::fs::write(&short, b"PK").unwrap();
        assert!(!has_zip_magic(&short).unwrap());

        let zip = temp.path().join("a.zip");
        std::fs::write(&zip, b"PK\x03\x04rest").unwrap();
        assert!(has_zip_magic(&zip).unwrap());
    }
}
