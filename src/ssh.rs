//! SSH keypair generation seam.
//!
//! Key material handling is an external concern: the driver only needs the
//! public key text to embed in the create request. The default implementation
//! shells out to the system `ssh-keygen`, writing the pair at the path the
//! host manages; tests substitute a fake through [`SshKeyGenerator`].

use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::cloud_init::read_ambient;

/// Errors raised while generating the machine SSH keypair.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum SshKeyError {
    /// Raised when the key generation program cannot be started.
    #[error("failed to run {program}: {message}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying error message.
        message: String,
    },
    /// Raised when key generation exits unsuccessfully.
    #[error("ssh-keygen exited with {status}: {stderr}")]
    Generation {
        /// Exit status description.
        status: String,
        /// Captured standard error.
        stderr: String,
    },
    /// Raised when the generated public key cannot be read back.
    #[error("failed to read public key `{path}`: {message}")]
    PublicKeyRead {
        /// Public key path that failed to read.
        path: String,
        /// Underlying error message.
        message: String,
    },
}

/// Abstraction over SSH keypair generation to support fakes in tests.
pub trait SshKeyGenerator {
    /// Generates a keypair at `key_path` and returns the public key text.
    ///
    /// # Errors
    ///
    /// Returns [`SshKeyError`] when generation fails or the public key cannot
    /// be read back.
    fn generate(&self, key_path: &Utf8Path) -> Result<String, SshKeyError>;
}

/// Key generator that shells out to the system `ssh-keygen`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessKeyGenerator;

impl SshKeyGenerator for ProcessKeyGenerator {
    fn generate(&self, key_path: &Utf8Path) -> Result<String, SshKeyError> {
        let output = Command::new("ssh-keygen")
            .args(["-t", "ed25519", "-N", "", "-q", "-f", key_path.as_str()])
            .output()
            .map_err(|err| SshKeyError::Spawn {
                program: String::from("ssh-keygen"),
                message: err.to_string(),
            })?;

        if !output.status.success() {
            return Err(SshKeyError::Generation {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let public_path = public_key_path(key_path);
        let bytes = read_ambient(&public_path).map_err(|message| SshKeyError::PublicKeyRead {
            path: public_path.to_string(),
            message,
        })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Public key path is always the key path appended with `.pub`.
fn public_key_path(key_path: &Utf8Path) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{key_path}.pub"))
}
