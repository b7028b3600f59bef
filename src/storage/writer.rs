//! Output writer for issued certificates and keys.
//!
//! Every certificate gets its own directory under the output root, named by
//! its label, holding `<label>.crt` and `<label>.key`:
//!
//! ```text
//! ssl/ca/ca.crt
//! ssl/ca/ca.key
//! ssl/web1/web1.crt
//! ssl/web1/web1.key
//! ```

use crate::error::{GenCaError, Result};
use crate::storage::artifact::{ArtifactKind, OutputArtifact};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory created under the working directory to hold all output.
pub const OUTPUT_DIRNAME: &str = "ssl";

/// Label of the authority's directory and files.
pub const CA_LABEL: &str = "ca";

/// Which certificate an output belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertRole {
    Authority,
    Leaf(String),
}

impl CertRole {
    /// The identifying label: `ca` for the authority, the configured name otherwise.
    pub fn label(&self) -> &str {
        match self {
            CertRole::Authority => CA_LABEL,
            CertRole::Leaf(label) => label,
        }
    }
}

/// Writes PEM output below a fixed root directory.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    root: PathBuf,
}

impl OutputWriter {
    /// Writer rooted directly at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Writer rooted at `<working_dir>/ssl`.
    pub fn for_working_directory(working_dir: &Path) -> Self {
        Self::new(working_dir.join(OUTPUT_DIRNAME))
    }

    /// The output root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the files for `role`.
    pub fn directory_for(&self, role: &CertRole) -> PathBuf {
        self.root.join(role.label())
    }

    /// Path of one output file for `role`.
    pub fn file_path(&self, role: &CertRole, kind: ArtifactKind) -> PathBuf {
        let label = role.label();
        self.directory_for(role)
            .join(format!("{}.{}", label, kind.extension()))
    }

    /// Write the certificate and key for `role`, creating directories as
    /// needed. Existing files are replaced.
    pub fn write(&self, role: &CertRole, cert_pem: &str, key_pem: &str) -> Result<Vec<OutputArtifact>> {
        let directory = self.directory_for(role);
        fs::create_dir_all(&directory).map_err(|source| GenCaError::Write {
            path: directory.clone(),
            source,
        })?;

        let mut artifacts = Vec::with_capacity(2);
        for (kind, content) in [
            (ArtifactKind::Certificate, cert_pem),
            (ArtifactKind::PrivateKey, key_pem),
        ] {
            let path = self.file_path(role, kind);
            fs::write(&path, content).map_err(|source| GenCaError::Write {
                path: path.clone(),
                source,
            })?;

            tracing::debug!(path = %path.display(), "wrote {}", kind.extension());

            artifacts.push(OutputArtifact {
                label: role.label().to_string(),
                kind,
                path,
                content: content.to_string(),
            });
        }

        Ok(artifacts)
    }
}
