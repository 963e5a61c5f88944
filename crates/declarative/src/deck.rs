//! decK subprocess runner
//!
//! decK syncs gateway configuration into a control plane. The runner only
//! builds the argument list and runs the binary; everything plan-related
//! lives in [`crate::external`].

use std::path::PathBuf;
use std::process::Command;

/// Standalone argument replaced by the execution mode.
pub const MODE_PLACEHOLDER: &str = "{{kongctl.mode}}";

/// Flags injected by kongctl for `gateway` commands; users may not set them.
const TOKEN_FLAG: &str = "--konnect-token";
const CONTROL_PLANE_FLAG: &str = "--konnect-control-plane-name";
const ADDRESS_FLAG: &str = "--konnect-addr";

/// Errors from a decK invocation.
#[derive(Debug, thiserror::Error)]
pub enum DeckError {
    /// The binary is not on PATH.
    #[error("deck executable not found; install decK or set deck_path in the kongctl config")]
    NotFound,

    /// Arguments are unusable.
    #[error("invalid deck arguments: {0}")]
    InvalidArgs(String),

    /// A user flag collides with one kongctl injects.
    #[error("flag {0} is set by kongctl and cannot be passed to deck")]
    ConflictingFlag(String),

    /// decK ran and failed.
    #[error("deck exited with {}", describe_status(.status))]
    Failed {
        /// Exit code, if the process exited normally.
        status: Option<i32>,
        /// Captured output.
        output: RunOutput,
    },

    /// Spawning the process failed for another reason.
    #[error("failed to run deck: {0}")]
    Io(#[source] std::io::Error),
}

/// Options for one decK invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub args: Vec<String>,
    /// "apply" or "sync"; substituted for [`MODE_PLACEHOLDER`].
    pub mode: String,
    pub konnect_token: String,
    pub konnect_control_plane_name: String,
    pub konnect_address: String,
    /// Working directory; the current one when `None`.
    pub work_dir: Option<PathBuf>,
}

/// Captured process output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs decK
///
/// Implement this trait to substitute the subprocess in tests.
pub trait DeckRunner: Send + Sync {
    fn run(&self, opts: &RunOptions) -> Result<RunOutput, DeckError>;
}

/// Runner that executes the real `deck` binary.
pub struct ExecRunner {
    program: PathBuf,
}

impl ExecRunner {
    /// Runner for a specific binary.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for ExecRunner {
    /// Runner for `deck` on PATH.
    fn default() -> Self {
        Self::with_program("deck")
    }
}

impl DeckRunner for ExecRunner {
    fn run(&self, opts: &RunOptions) -> Result<RunOutput, DeckError> {
        let args = build_args(opts)?;

        let mut command = Command::new(&self.program);
        command.args(&args);
        if let Some(dir) = &opts.work_dir {
            command.current_dir(dir);
        }

        let output = command.output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DeckError::NotFound
            } else {
                DeckError::Io(e)
            }
        })?;

        let captured = RunOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };
        if !output.status.success() {
            return Err(DeckError::Failed {
                status: output.status.code(),
                output: captured,
            });
        }
        Ok(captured)
    }
}

/// Final argument list for a decK invocation.
///
/// Substitutes the mode placeholder and, for `gateway` commands, inserts
/// the Konnect connection flags right after the subcommand pair.
pub fn build_args(opts: &RunOptions) -> Result<Vec<String>, DeckError> {
    if opts.args.is_empty() {
        return Err(DeckError::InvalidArgs("args cannot be empty".to_string()));
    }

    let mut args = opts.args.clone();
    for arg in &mut args {
        if arg == MODE_PLACEHOLDER {
            let mode = opts.mode.trim();
            if mode != "apply" && mode != "sync" {
                return Err(DeckError::InvalidArgs(
                    "mode placeholder requires apply or sync".to_string(),
                ));
            }
            *arg = mode.to_string();
        } else if arg.contains(MODE_PLACEHOLDER) {
            return Err(DeckError::InvalidArgs(
                "mode placeholder must be a standalone argument".to_string(),
            ));
        }
    }

    if args[0] == "gateway" {
        ensure_konnect_context(opts)?;
        for flag in [TOKEN_FLAG, CONTROL_PLANE_FLAG, ADDRESS_FLAG] {
            if contains_flag(&args, flag) {
                return Err(DeckError::ConflictingFlag(flag.to_string()));
            }
        }

        let injected = [
            TOKEN_FLAG.to_string(),
            opts.konnect_token.clone(),
            CONTROL_PLANE_FLAG.to_string(),
            opts.konnect_control_plane_name.clone(),
            ADDRESS_FLAG.to_string(),
            opts.konnect_address.clone(),
        ];
        let tail = args.split_off(args.len().min(2));
        args.extend(injected);
        args.extend(tail);
    }

    Ok(args)
}

/// Whether `flag` appears as `flag` or `flag=value`.
pub fn contains_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|arg| {
        arg == flag
            || arg
                .strip_prefix(flag)
                .is_some_and(|rest| rest.starts_with('='))
    })
}

fn describe_status(status: &Option<i32>) -> String {
    status.map_or_else(|| "a signal".to_string(), |code| format!("status {code}"))
}

fn ensure_konnect_context(opts: &RunOptions) -> Result<(), DeckError> {
    let required = [
        (&opts.konnect_token, "konnect token"),
        (&opts.konnect_control_plane_name, "konnect control plane name"),
        (&opts.konnect_address, "konnect address"),
    ];
    for (value, what) in required {
        if value.trim().is_empty() {
            return Err(DeckError::InvalidArgs(format!(
                "{what} is required for gateway steps"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway_opts(args: &[&str]) -> RunOptions {
        RunOptions {
            args: args.iter().map(ToString::to_string).collect(),
            mode: "sync".to_string(),
            konnect_token: "kpat_x".to_string(),
            konnect_control_plane_name: "default".to_string(),
            konnect_address: "https://us.api.konghq.com".to_string(),
            work_dir: None,
        }
    }

    #[test]
    fn test_build_args_injects_konnect_flags_after_subcommand() {
        let args = build_args(&gateway_opts(&["gateway", "sync", "--json-output", "kong.yaml"]))
            .unwrap();
        assert_eq!(
            args,
            vec![
                "gateway",
                "sync",
                "--konnect-token",
                "kpat_x",
                "--konnect-control-plane-name",
                "default",
                "--konnect-addr",
                "https://us.api.konghq.com",
                "--json-output",
                "kong.yaml",
            ]
        );
    }

    #[test]
    fn test_build_args_substitutes_mode_placeholder() {
        let args = build_args(&gateway_opts(&["gateway", MODE_PLACEHOLDER, "kong.yaml"])).unwrap();
        assert_eq!(args[1], "sync");
    }

    #[test]
    fn test_build_args_rejects_embedded_placeholder() {
        let err = build_args(&gateway_opts(&["gateway", "--x={{kongctl.mode}}"])).unwrap_err();
        assert!(err.to_string().contains("standalone"));
    }

    #[test]
    fn test_build_args_rejects_invalid_mode() {
        let mut opts = gateway_opts(&["gateway", MODE_PLACEHOLDER]);
        opts.mode = "diff".to_string();
        assert!(matches!(build_args(&opts), Err(DeckError::InvalidArgs(_))));
    }

    #[test]
    fn test_build_args_rejects_conflicting_flag() {
        let err = build_args(&gateway_opts(&["gateway", "sync", "--konnect-addr=http://x"]))
            .unwrap_err();
        assert!(matches!(err, DeckError::ConflictingFlag(ref f) if f == "--konnect-addr"));
    }

    #[test]
    fn test_build_args_requires_token_for_gateway() {
        let mut opts = gateway_opts(&["gateway", "sync"]);
        opts.konnect_token.clear();
        let err = build_args(&opts).unwrap_err();
        assert!(err.to_string().contains("konnect token"));
    }

    #[test]
    fn test_build_args_non_gateway_untouched() {
        let opts = RunOptions {
            args: vec!["version".to_string()],
            ..Default::default()
        };
        assert_eq!(build_args(&opts).unwrap(), vec!["version"]);
    }

    #[test]
    fn test_build_args_empty() {
        assert!(build_args(&RunOptions::default()).is_err());
    }

    #[test]
    fn test_contains_flag() {
        let args = vec!["--no-color".to_string(), "--json-output=true".to_string()];
        assert!(contains_flag(&args, "--no-color"));
        assert!(contains_flag(&args, "--json-output"));
        assert!(!contains_flag(&args, "--json"));
    }

    #[test]
    fn test_exec_runner_missing_binary() {
        let runner = ExecRunner::with_program("/nonexistent/deck-binary");
        let err = runner
            .run(&RunOptions {
                args: vec!["version".to_string()],
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, DeckError::NotFound));
    }
}
