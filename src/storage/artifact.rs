//! Output artifact descriptions.

use std::path::PathBuf;

/// What an output file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Certificate,
    PrivateKey,
}

impl ArtifactKind {
    /// File extension used for this kind of artifact.
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Certificate => "crt",
            ArtifactKind::PrivateKey => "key",
        }
    }
}

/// A file produced by an issuance run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    /// The certificate label the file belongs to.
    pub label: String,

    pub kind: ArtifactKind,

    /// Where the file was written.
    pub path: PathBuf,

    /// The PEM text written to `path`.
    pub content: String,
}
