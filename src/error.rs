use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("registry document {path} is malformed: {reason}")]
    MalformedRegistry { path: PathBuf, reason: String },
    #[error("failed to write {path}: {reason}")]
    WriteFailure { path: PathBuf, reason: String },
    #[error("'{alias}' is not a valid alias found in {origin}")]
    AliasNotFound { alias: String, origin: String },
    #[error("invalid alias '{alias}': {reason}")]
    InvalidAlias { alias: String, reason: String },
    #[error("unsupported forge for {url}: {reason}")]
    UnsupportedForge { url: String, reason: String },
    #[error("remote lookup failed for {target}: {reason}")]
    RemoteLookupFailure { target: String, reason: String },
    #[error("download failed for {url}: {reason}")]
    DownloadFailure { url: String, reason: String },
    #[error("extraction into {path} failed: {reason}")]
    ExtractionFailure { path: PathBuf, reason: String },
    #[error("config invalid or unreadable: {0}")]
    InvalidConfig(String),
    #[error("another tmplsync process holds {0}")]
    Locked(PathBuf),
}

impl SyncError {
    pub fn code(&self) -> SyncErrorCode {
        match self {
            Self::MalformedRegistry { .. } => SyncErrorCode::E001MalformedRegistry,
            Self::WriteFailure { .. } => SyncErrorCode::E002WriteFailure,
            Self::AliasNotFound { .. } | Self::InvalidAlias { .. } => {
                SyncErrorCode::E003AliasNotFound
            }
            Self::UnsupportedForge { .. } => SyncErrorCode::E004UnsupportedForge,
            Self::RemoteLookupFailure { .. } => SyncErrorCode::E005RemoteLookup,
            Self::DownloadFailure { .. } => SyncErrorCode::E006Download,
            Self::ExtractionFailure { .. } => SyncErrorCode::E007Extraction,
            Self::InvalidConfig(_) => SyncErrorCode::E008ConfigInvalid,
            Self::Locked(_) => SyncErrorCode::E009Locked,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncErrorCode {
    E001MalformedRegistry,
    E002WriteFailure,
    E003AliasNotFound,
    E004UnsupportedForge,
    E005RemoteLookup,
    E006Download,
    E007Extraction,
    E008ConfigInvalid,
    E009Locked,
}

impl SyncErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::E001MalformedRegistry => "E001_MALFORMED_REGISTRY",
            Self::E002WriteFailure => "E002_WRITE_FAILURE",
            Self::E003AliasNotFound => "E003_ALIAS_NOT_FOUND",
            Self::E004UnsupportedForge => "E004_UNSUPPORTED_FORGE",
            Self::E005RemoteLookup => "E005_REMOTE_LOOKUP",
            Self::E006Download => "E006_DOWNLOAD",
            Self::E007Extraction => "E007_EXTRACTION",
            Self::E008ConfigInvalid => "E008_CONFIG_INVALID",
            Self::E009Locked => "E009_LOCKED",
        }
    }
}
