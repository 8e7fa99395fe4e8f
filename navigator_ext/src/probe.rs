//! Presence probe for the external analysis package.
//!
//! Activation is gated on the probe: if the package cannot be found, no
//! session is created. The check blocks the caller's thread for the
//! duration of the subprocess. There is no retry and no fallback
//! interpreter search.

use std::io;
use std::process::{Command, ExitStatus, Stdio};
use thiserror::Error;

/// pip distribution name of the analysis package.
pub const PACKAGE_NAME: &str = "ffi-navigator";

/// Why the availability check failed.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The probe command could not be run at all.
    #[error("failed to run `{command} -m pip show ffi-navigator`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    /// pip does not know the package.
    #[error("`{command} -m pip show ffi-navigator` exited with {status}")]
    Missing { command: String, status: ExitStatus },
}

/// Blocking availability check for the analysis package.
pub trait PackageProbe {
    fn check(&self, interpreter: &str) -> Result<(), ProbeError>;
}

/// Probe that asks pip whether the package is installed. The exit status
/// alone decides.
#[derive(Debug, Default)]
pub struct PipProbe;

impl PackageProbe for PipProbe {
    fn check(&self, interpreter: &str) -> Result<(), ProbeError> {
        let status = Command::new(interpreter)
            .args(["-m", "pip", "show", PACKAGE_NAME])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|source| ProbeError::Spawn {
                command: interpreter.to_string(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            log::debug!("pip show {} exited with {}", PACKAGE_NAME, status);
            Err(ProbeError::Missing {
                command: interpreter.to_string(),
                status,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_interpreter_is_a_spawn_error() {
        let err = PipProbe
            .check("ffi-navigator-test-no-such-interpreter")
            .unwrap_err();
        assert!(matches!(err, ProbeError::Spawn { .. }));
    }

    #[test]
    #[cfg(unix)]
    fn exit_status_alone_gates_the_check() {
        // `true` and `false` ignore the pip arguments; only the exit
        // status matters to the probe.
        assert!(PipProbe.check("true").is_ok());
        assert!(matches!(
            PipProbe.check("false").unwrap_err(),
            ProbeError::Missing { .. }
        ));
    }
}
