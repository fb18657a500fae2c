//! External command execution.
//!
//! Every pipeline stage is an opaque external binary that consumes and
//! produces files. Callers get the exit code and captured output back
//! and decide for themselves whether a nonzero code is fatal; a spawn
//! failure is reported the same way (exit code 255, reason on stderr)
//! rather than as a separate error path.

use log::{error, info};
use std::process::Command;

/// Exit code reported when a command could not be spawned at all.
pub const SPAWN_FAILURE_CODE: i32 = 255;

/// Captured result of one external command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run an external program and capture its exit code and output.
pub fn run_external_command(program: &str, args: &[String]) -> CommandOutput {
    info!("Running command {} {}", program, args.join(" "));

    match Command::new(program).args(args).output() {
        Ok(output) => CommandOutput {
            // a signal-terminated child has no code; fold it into the
            // spawn-failure value so callers see a single failure path
            exit_code: output.status.code().unwrap_or(SPAWN_FAILURE_CODE),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        },
        Err(e) => {
            error!("Caught error trying to run {program}: {e}");
            CommandOutput {
                exit_code: SPAWN_FAILURE_CODE,
                stdout: String::new(),
                stderr: format!("Caught exception trying run command: {e}"),
            }
        }
    }
}

/// Run a command under `mpiexec -np <cores>`.
///
/// `cores` defaults to 1 when unset.
pub fn run_mpiexec_command(
    program: &str,
    args: &[String],
    mpiexec: &str,
    cores: Option<usize>,
) -> CommandOutput {
    let core_count = cores.unwrap_or(1);

    let mut full_args = vec!["-np".to_string(), core_count.to_string(), program.to_string()];
    full_args.extend_from_slice(args);
    run_external_command(mpiexec, &full_args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_nonexistent_program() {
        let out = run_external_command("/no/such/binary/anywhere", &[]);
        assert_eq!(out.exit_code, SPAWN_FAILURE_CODE);
        assert!(!out.success());
        assert_eq!(out.stdout, "");
        assert!(out.stderr.starts_with("Caught exception trying run command"));
    }

    #[test]
    fn test_run_echo_captures_stdout() {
        let out = run_external_command("echo", &["hello".to_string(), "there".to_string()]);
        assert!(out.success());
        assert_eq!(out.stdout, "hello there\n");
        assert_eq!(out.stderr, "");
    }

    #[test]
    fn test_run_failing_command_reports_code() {
        let out = run_external_command("false", &[]);
        assert_eq!(out.exit_code, 1);
        assert!(!out.success());
    }

    #[test]
    fn test_mpiexec_wrapping() {
        // use echo as a stand-in mpiexec so the wrapping shows up on stdout
        let out = run_mpiexec_command("project_all", &["in.mrc".to_string()], "echo", Some(3));
        assert!(out.success());
        assert_eq!(out.stdout, "-np 3 project_all in.mrc\n");
    }

    #[test]
    fn test_mpiexec_cores_default_to_one() {
        let out = run_mpiexec_command("rawtlt", &[], "echo", None);
        assert_eq!(out.stdout, "-np 1 rawtlt\n");
    }
}
