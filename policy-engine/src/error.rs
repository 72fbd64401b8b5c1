use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Policy configuration file not found: [{}]", path.display())]
    NotFound { path: PathBuf },
    #[error("Failed to read policy configuration [{}]: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Error parsing policy YAML [{}]: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Invalid policy configuration: {0}")]
    Invalid(String),
}
