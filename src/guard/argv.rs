//! Handoff of a guarded command line into the session the user picks.

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::os::unix::process::CommandExt;
use std::process::Command;
use thiserror::Error;
use tracing::debug;

use crate::backend::env_non_empty;

/// Carries base64(JSON) of the argv to run once inside the new session.
pub const AUTORUN_VAR: &str = "ZPICK_AUTORUN";

#[derive(Debug, Error)]
pub enum ArgvError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("empty argv")]
    Empty,
}

pub fn encode_argv(argv: &[String]) -> Result<String, ArgvError> {
    if argv.is_empty() {
        return Err(ArgvError::Empty);
    }
    Ok(STANDARD.encode(serde_json::to_vec(argv)?))
}

pub fn decode_argv(encoded: &str) -> Result<Vec<String>, ArgvError> {
    let data = STANDARD.decode(encoded.trim())?;
    let argv: Vec<String> = serde_json::from_slice(&data)?;
    if argv.is_empty() {
        return Err(ArgvError::Empty);
    }
    Ok(argv)
}

/// Replace this process with the pending autorun command, if there is one.
///
/// A missing or undecodable payload is not an error.
pub fn autorun() -> Result<()> {
    let Some(encoded) = env_non_empty(AUTORUN_VAR) else {
        return Ok(());
    };
    let argv = match decode_argv(&encoded) {
        Ok(argv) => argv,
        Err(e) => {
            debug!("ignoring {}: {}", AUTORUN_VAR, e);
            return Ok(());
        }
    };

    let program = &argv[0];
    let path = which::which(program).map_err(|_| anyhow!("{}: command not found", program))?;
    debug!("autorun {} {:?}", path.display(), &argv[1..]);

    let err = Command::new(path)
        .arg0(program)
        .args(&argv[1..])
        .env_remove(AUTORUN_VAR)
        .exec();
    Err(err).with_context(|| format!("failed to run {}", program))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_round_trip_with_spaces() {
        let original = argv(&["claude", "--resume", "fix the bug in main.rs", ""]);
        let encoded = encode_argv(&original).unwrap();
        assert!(!encoded.contains(' '));
        assert_eq!(decode_argv(&encoded).unwrap(), original);
    }

    #[test]
    fn test_encoding_is_base64_json() {
        let encoded = encode_argv(&argv(&["codex"])).unwrap();
        let json = STANDARD.decode(encoded).unwrap();
        assert_eq!(json, br#"["codex"]"#);
    }

    #[test]
    fn test_encode_rejects_empty() {
        assert!(matches!(encode_argv(&[]), Err(ArgvError::Empty)));
    }

    #[test]
    fn test_decode_rejects_invalid_base64() {
        assert!(matches!(decode_argv("not base64!!"), Err(ArgvError::Base64(_))));
    }

    #[test]
    fn test_decode_rejects_non_json() {
        let encoded = STANDARD.encode("claude --resume");
        assert!(matches!(decode_argv(&encoded), Err(ArgvError::Json(_))));

        let encoded = STANDARD.encode(r#"{"argv":["claude"]}"#);
        assert!(matches!(decode_argv(&encoded), Err(ArgvError::Json(_))));
    }

    #[test]
    fn test_decode_rejects_empty_array() {
        let encoded = STANDARD.encode("[]");
        assert!(matches!(decode_argv(&encoded), Err(ArgvError::Empty)));
    }

    #[test]
    #[serial]
    fn test_autorun_ignores_missing_and_invalid_payloads() {
        std::env::remove_var(AUTORUN_VAR);
        assert!(autorun().is_ok());

        std::env::set_var(AUTORUN_VAR, "%%%");
        assert!(autorun().is_ok());

        std::env::set_var(AUTORUN_VAR, STANDARD.encode("[]"));
        assert!(autorun().is_ok());
        std::env::remove_var(AUTORUN_VAR);
    }

    #[test]
    #[serial]
    fn test_autorun_unknown_command() {
        let encoded = encode_argv(&argv(&["zpick-no-such-command-xyz"])).unwrap();
        std::env::set_var(AUTORUN_VAR, encoded);
        let err = autorun().err().unwrap();
        std::env::remove_var(AUTORUN_VAR);
        assert!(err.to_string().contains("command not found"));
    }
}
