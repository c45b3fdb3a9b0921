use std::fs;

use log::debug;
use thiserror::Error;

use crate::program::{DecodeError, Program};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("unable to read {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to fetch {path}: {source}")]
    Http {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{path} is not valid JSON: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: DecodeError,
    },
}

/// Supplies the interpreter with decoded programs. The interpreter itself
/// never performs I/O; `import` goes through this seam, and tests swap in
/// an in-memory implementation.
pub trait SourceLoader {
    fn load(&self, path: &str) -> Result<Program, LoadError>;
}

/// The stock loader: paths starting with http:// or https:// are fetched
/// over the network, anything else is read from the filesystem.
pub struct FetchLoader;

impl SourceLoader for FetchLoader {
    fn load(&self, path: &str) -> Result<Program, LoadError> {
        let text = if path.starts_with("http://") || path.starts_with("https://") {
            debug!("fetching program from {}", path);
            reqwest::blocking::get(path)
                .and_then(|response| response.error_for_status())
                .and_then(|response| response.text())
                .map_err(|source| LoadError::Http {
                    path: path.to_owned(),
                    source,
                })?
        } else {
            debug!("reading program from {}", path);
            fs::read_to_string(path).map_err(|source| LoadError::File {
                path: path.to_owned(),
                source,
            })?
        };
        let json: serde_json::Value =
            serde_json::from_str(&text).map_err(|source| LoadError::Json {
                path: path.to_owned(),
                source,
            })?;
        Program::from_json(&json).map_err(|source| LoadError::Decode {
            path: path.to_owned(),
            source,
        })
    }
}
