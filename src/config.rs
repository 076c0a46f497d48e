//! Saved requests on disk, as pretty-printed JSON.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::error::OptimizeError;
use crate::request::OptimizeRequest;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl From<ConfigError> for OptimizeError {
    fn from(err: ConfigError) -> Self {
        OptimizeError::InvalidInput(err.to_string())
    }
}

pub fn load_request(path: &Path) -> Result<OptimizeRequest, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn save_request(path: &Path, request: &OptimizeRequest) -> Result<(), ConfigError> {
    let text = serde_json::to_string_pretty(request).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, text).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "saved request");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::request::PieceSpec;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("cutting_stock_{}_{name}", std::process::id()))
    }

    #[test]
    fn test_save_then_load() {
        let path = temp_path("roundtrip.json");
        let mut request = OptimizeRequest::new(
            1000,
            800,
            vec![PieceSpec::plain(200, 300, 2), PieceSpec::Rotatable(150.0, 200.0, 3.0, false)],
        )
        .with_algorithm("smart");
        request.name = "kitchen".into();

        save_request(&path, &request).unwrap();
        let loaded = load_request(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(loaded, request);
    }

    #[test]
    fn test_loads_legacy_arrays() {
        let path = temp_path("legacy.json");
        fs::write(
            &path,
            r#"{"stock_width": 1000, "stock_height": 1000, "pieces": [[100, 100, 5], [200, 150, 3, false, "Leg"]], "name": "Simple"}"#,
        )
        .unwrap();
        let loaded = load_request(&path).unwrap();
        fs::remove_file(&path).unwrap();

        let problem = loaded.validate().unwrap();
        assert_eq!(problem.name, "Simple");
        assert_eq!(problem.pieces.len(), 2);
        assert!(!problem.pieces[1].allow_rotation);
    }

    #[test]
    fn test_errors() {
        let missing = load_request(&temp_path("missing.json")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));

        let path = temp_path("garbage.json");
        fs::write(&path, "{ not json").unwrap();
        let garbage = load_request(&path).unwrap_err();
        fs::remove_file(&path).unwrap();
        assert!(matches!(garbage, ConfigError::Parse { .. }));
        assert_eq!(OptimizeError::from(garbage).kind(), ErrorKind::InvalidInput);
    }
}
