//! `docker compose` command-line driver

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tokio::time::timeout;

use crate::config::RuntimeConfig;
use crate::error::{CoreError, CoreResult};
use crate::traits::{ContainerRuntime, RunOutput};
use crate::types::RuntimeStatus;

/// stderr fragments that mean failure even when compose exits 0
pub const FATAL_STDERR_PATTERNS: [&str; 4] = [
    "declared as external, but could not be found",
    "no configuration file provided",
    "Cannot connect to the Docker daemon",
    "error while interpolating",
];

/// Drives a compose-compatible CLI (`docker compose`, `docker-compose`, `podman compose`)
#[derive(Debug, Clone)]
pub struct ComposeCli {
    program: String,
    base_args: Vec<String>,
    docker_host: String,
    timeout: Duration,
}

impl ComposeCli {
    pub fn new(command: &[String], docker_socket: &Path, timeout: Duration) -> CoreResult<Self> {
        let (program, base_args) = command.split_first().ok_or_else(|| {
            CoreError::ConfigurationError("compose command must not be empty".to_string())
        })?;
        Ok(Self {
            program: program.clone(),
            base_args: base_args.to_vec(),
            docker_host: format!("unix://{}", docker_socket.display()),
            timeout,
        })
    }

    pub fn from_config(config: &RuntimeConfig) -> CoreResult<Self> {
        Self::new(
            &config.compose_command,
            &config.docker_socket,
            config.command_timeout,
        )
    }

    fn display(&self, args: &[&str]) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.base_args.iter().map(String::as_str))
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run one invocation. The child is killed if the timeout expires first.
    async fn run(&self, working_dir: Option<&Path>, args: &[&str]) -> CoreResult<RunOutput> {
        let command_line = self.display(args);

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.base_args)
            .args(args)
            .env("DOCKER_HOST", &self.docker_host)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        log::debug!("Running `{command_line}`");

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CoreError::ConfigurationError(format!(
                    "container runtime binary '{}' not found",
                    self.program
                ))
            } else {
                CoreError::IoError(format!("failed to spawn `{command_line}`: {e}"))
            }
        })?;

        let Ok(result) = timeout(self.timeout, child.wait_with_output()).await else {
            log::warn!(
                "`{command_line}` exceeded {}s and was killed",
                self.timeout.as_secs()
            );
            return Err(CoreError::Timeout {
                operation: command_line,
                seconds: self.timeout.as_secs(),
            });
        };
        let output = result
            .map_err(|e| CoreError::IoError(format!("failed to wait for `{command_line}`: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() || fatal_pattern(&stderr).is_some() {
            return Err(CoreError::ProcessFailed {
                command: command_line,
                exit_code: output.status.code(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(RunOutput { stdout, stderr })
    }

    async fn run_in_stack(
        &self,
        stack_dir: &Path,
        manifest: &Path,
        args: &[&str],
    ) -> CoreResult<RunOutput> {
        let manifest = manifest.to_string_lossy();
        let mut full = vec!["-f", manifest.as_ref()];
        full.extend_from_slice(args);
        self.run(Some(stack_dir), &full).await
    }
}

fn fatal_pattern(stderr: &str) -> Option<&'static str> {
    FATAL_STDERR_PATTERNS
        .iter()
        .copied()
        .find(|pattern| stderr.contains(pattern))
}

#[derive(Deserialize)]
struct PsEntry {
    #[serde(rename = "State", default)]
    state: String,
}

/// Container states from `ps --format json`, which is a JSON array on some compose versions
/// and one object per line on others.
pub fn parse_ps_states(stdout: &str) -> Result<Vec<String>, serde_json::Error> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let entries: Vec<PsEntry> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed)?
    } else {
        trimmed
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(serde_json::from_str)
            .collect::<Result<_, _>>()?
    };
    Ok(entries
        .into_iter()
        .map(|e| e.state.to_ascii_lowercase())
        .collect())
}

/// Collapse per-container states into one stack status.
pub fn derive_status(states: &[String]) -> RuntimeStatus {
    if states.is_empty() {
        return RuntimeStatus::Created;
    }

    let mut running = 0;
    let mut stopped = 0;
    for state in states {
        match state.as_str() {
            "running" => running += 1,
            "exited" | "created" | "stopped" | "paused" => stopped += 1,
            _ => return RuntimeStatus::Error,
        }
    }

    match (running, stopped) {
        (_, 0) => RuntimeStatus::Running,
        (0, _) => RuntimeStatus::Stopped,
        // partially up
        _ => RuntimeStatus::Created,
    }
}

#[async_trait]
impl ContainerRuntime for ComposeCli {
    async fn up(&self, stack_dir: &Path, manifest: &Path) -> CoreResult<RunOutput> {
        self.run_in_stack(stack_dir, manifest, &["up", "-d"]).await
    }

    async fn down(
        &self,
        stack_dir: &Path,
        manifest: &Path,
        purge_volumes: bool,
    ) -> CoreResult<RunOutput> {
        if purge_volumes {
            self.run_in_stack(stack_dir, manifest, &["down", "-v"]).await
        } else {
            self.run_in_stack(stack_dir, manifest, &["down"]).await
        }
    }

    async fn stop(&self, stack_dir: &Path, manifest: &Path) -> CoreResult<RunOutput> {
        self.run_in_stack(stack_dir, manifest, &["stop"]).await
    }

    async fn restart(&self, stack_dir: &Path, manifest: &Path) -> CoreResult<RunOutput> {
        self.run_in_stack(stack_dir, manifest, &["restart"]).await
    }

    async fn logs(
        &self,
        stack_dir: &Path,
        manifest: &Path,
        service: Option<&str>,
        tail_lines: u32,
    ) -> CoreResult<String> {
        let tail = tail_lines.to_string();
        let mut args = vec!["logs", "--no-color", "--tail", tail.as_str()];
        if let Some(service) = service {
            args.push(service);
        }
        let output = self.run_in_stack(stack_dir, manifest, &args).await?;
        Ok(output.stdout)
    }

    async fn status(&self, stack_dir: &Path, manifest: &Path) -> CoreResult<RuntimeStatus> {
        let output = self
            .run_in_stack(stack_dir, manifest, &["ps", "-a", "--format", "json"])
            .await?;
        match parse_ps_states(&output.stdout) {
            Ok(states) => Ok(derive_status(&states)),
            Err(e) => {
                log::warn!(
                    "Unrecognized `ps` output for {}: {e}",
                    stack_dir.display()
                );
                Ok(RuntimeStatus::Error)
            }
        }
    }

    async fn version(&self) -> CoreResult<String> {
        let output = self.run(None, &["version", "--short"]).await?;
        Ok(output.stdout.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn states(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    // ---- Status derivation ----

    #[test]
    fn no_containers_is_created() {
        assert_eq!(derive_status(&[]), RuntimeStatus::Created);
    }

    #[test]
    fn all_running_is_running() {
        assert_eq!(derive_status(&states(&["running", "running"])), RuntimeStatus::Running);
    }

    #[test]
    fn all_exited_is_stopped() {
        assert_eq!(derive_status(&states(&["exited", "created"])), RuntimeStatus::Stopped);
    }

    #[test]
    fn mixed_is_created() {
        assert_eq!(derive_status(&states(&["running", "exited"])), RuntimeStatus::Created);
    }

    #[test]
    fn restarting_or_unknown_is_error() {
        assert_eq!(derive_status(&states(&["running", "restarting"])), RuntimeStatus::Error);
        assert_eq!(derive_status(&states(&["weird"])), RuntimeStatus::Error);
    }

    // ---- ps parsing ----

    #[test]
    fn parses_ndjson() {
        let out = "{\"Name\":\"a\",\"State\":\"running\"}\n{\"Name\":\"b\",\"State\":\"Exited\"}\n";
        assert_eq!(parse_ps_states(out).unwrap(), states(&["running", "exited"]));
    }

    #[test]
    fn parses_array() {
        let out = r#"[{"Name":"a","State":"running"}]"#;
        assert_eq!(parse_ps_states(out).unwrap(), states(&["running"]));
    }

    #[test]
    fn empty_output_has_no_containers() {
        assert!(parse_ps_states("  \n").unwrap().is_empty());
    }

    #[test]
    fn garbage_output_fails_to_parse() {
        assert!(parse_ps_states("NAME STATUS\nweb running").is_err());
    }

    #[test]
    fn fatal_pattern_detected() {
        let stderr = "network traefik_proxy declared as external, but could not be found";
        assert!(fatal_pattern(stderr).is_some());
        assert!(fatal_pattern("Container web Started").is_none());
    }

    #[test]
    fn empty_command_is_configuration_error() {
        let err = ComposeCli::new(&[], Path::new("/var/run/docker.sock"), Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, CoreError::ConfigurationError(_)));
    }

    #[test]
    fn command_line_display() {
        let cli = ComposeCli::new(
            &["docker".to_string(), "compose".to_string()],
            Path::new("/var/run/docker.sock"),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(cli.display(&["up", "-d"]), "docker compose up -d");
        assert_eq!(cli.docker_host, "unix:///var/run/docker.sock");
    }

    // ---- Process execution (shell stands in for the compose binary) ----

    #[cfg(unix)]
    fn shell(script: &str, timeout: Duration) -> ComposeCli {
        ComposeCli::new(
            &["sh".to_string(), "-c".to_string(), script.to_string(), "sh".to_string()],
            Path::new("/var/run/docker.sock"),
            timeout,
        )
        .unwrap()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let cli = shell("echo boom >&2; exit 3", Duration::from_secs(10));
        let err = cli
            .up(dir.path(), &dir.path().join("docker-compose.yml"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::ProcessFailed { exit_code: Some(3), stderr, .. } if stderr == "boom"
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn fatal_stderr_with_zero_exit_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cli = shell(
            "echo 'network x declared as external, but could not be found' >&2",
            Duration::from_secs(10),
        );
        let err = cli
            .up(dir.path(), &dir.path().join("docker-compose.yml"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ProcessFailed { exit_code: Some(0), .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_in_stack_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cli = shell("pwd; echo \"$DOCKER_HOST\"", Duration::from_secs(10));
        let out = cli
            .up(dir.path(), &dir.path().join("docker-compose.yml"))
            .await
            .unwrap();
        let canonical = dir.path().canonicalize().unwrap();
        assert!(out.stdout.contains(canonical.to_string_lossy().as_ref()));
        assert!(out.stdout.contains("unix:///var/run/docker.sock"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_kills_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        let cli = shell("sleep 5", Duration::from_millis(200));
        let started = std::time::Instant::now();
        let err = cli
            .up(dir.path(), &dir.path().join("docker-compose.yml"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn status_parses_shell_output() {
        let dir = tempfile::tempdir().unwrap();
        let cli = shell(
            r#"echo '{"Name":"web","State":"running"}'"#,
            Duration::from_secs(10),
        );
        let status = cli
            .status(dir.path(), &dir.path().join("docker-compose.yml"))
            .await
            .unwrap();
        assert_eq!(status, RuntimeStatus::Running);
    }
}
