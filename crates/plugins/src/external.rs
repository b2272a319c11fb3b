//! External-process backend -- a check that runs as its own program.
//!
//! The child is started as
//! `program args... --configuration <json> --target <target> --session <id>`
//! and speaks newline-delimited JSON on stdout:
//!
//! ```text
//! {"msg":"issue","data":{"code":"NMAP-0","summary":"...","severity":"Info"}}
//! {"msg":"progress","data":0.5}
//! {"msg":"artifact","data":{"name":"nmap.xml","content":"..."}}
//! {"msg":"finish","data":{"state":"FINISHED"}}
//! ```
//!
//! Exiting without a `finish` message is a protocol failure. Stderr is
//! forwarded to the log at debug level. The child is killed when its
//! timeout elapses or when the plugin future is dropped.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, trace, warn};
use watchpost_core::config::ExternalPluginConfig;
use watchpost_core::{
    ExecutionMode, FailureKind, Issue, Plugin, PluginContext, PluginDescriptor, PluginError,
    PluginFailure, PluginOutcome, SessionReporter,
};

/// Message of a process that exits without `finish`.
pub const NOT_FINISHED: &str = "the plugin did not finish correctly";

// ─── Line Protocol ───────────────────────────────────────────────────

/// One stdout line.
#[derive(Debug, Deserialize)]
#[serde(tag = "msg", content = "data", rename_all = "lowercase")]
enum Message {
    Issue(Issue),
    Progress(f32),
    Artifact { name: String, content: String },
    Finish(Finish),
}

#[derive(Debug, Deserialize)]
struct Finish {
    state: FinishState,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum FinishState {
    Finished,
    Aborted,
    Failed,
}

/// What has been read from the child so far.
#[derive(Debug, Default)]
struct Transcript {
    issues: Vec<Issue>,
    finish: Option<Finish>,
}

impl Transcript {
    /// Reads stdout to EOF, forwarding progress and artifacts as they arrive.
    async fn read<R>(&mut self, stdout: R, reporter: &SessionReporter, plugin: &str)
    where
        R: AsyncRead + Unpin,
    {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!(plugin, error = %e, "failed to read plugin output");
                    break;
                }
            };
            self.handle_line(&line, reporter, plugin);
        }
    }

    fn handle_line(&mut self, line: &str, reporter: &SessionReporter, plugin: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        trace!(plugin, line, "plugin message");

        let message: Message = match serde_json::from_str(line) {
            Ok(m) => m,
            Err(e) => {
                warn!(plugin, error = %e, "skipping malformed plugin message");
                return;
            }
        };
        if self.finish.is_some() {
            warn!(plugin, "ignoring plugin message received after finish");
            return;
        }

        match message {
            Message::Issue(issue) => self.issues.push(issue),
            Message::Progress(p) => reporter.progress(p),
            Message::Artifact { name, content } => reporter.artifact(name, content),
            Message::Finish(finish) => self.finish = Some(finish),
        }
    }

    fn into_outcome(self) -> PluginOutcome {
        match self.finish {
            Some(Finish {
                state: FinishState::Finished,
                ..
            }) => PluginOutcome::Completed(self.issues),
            Some(Finish {
                state: FinishState::Aborted,
                ..
            }) => PluginOutcome::Aborted(self.issues),
            Some(Finish {
                state: FinishState::Failed,
                message,
            }) => PluginOutcome::Failed(
                PluginFailure::new(
                    FailureKind::Error,
                    message.unwrap_or_else(|| "the plugin reported a failure".to_owned()),
                )
                .with_issues(self.issues),
            ),
            None => PluginOutcome::Failed(
                PluginFailure::new(FailureKind::Protocol, NOT_FINISHED).with_issues(self.issues),
            ),
        }
    }
}

// ─── Plugin ──────────────────────────────────────────────────────────

/// [`Plugin`] backed by an external program.
#[derive(Debug)]
pub struct ExternalProcessPlugin {
    descriptor: PluginDescriptor,
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ExternalProcessPlugin {
    /// Builds the plugin, failing with [`PluginError::Unavailable`] when
    /// the program cannot be found.
    pub fn from_config(config: &ExternalPluginConfig) -> Result<Self, PluginError> {
        let program = resolve_program(&config.program).ok_or_else(|| PluginError::Unavailable {
            id: config.id.clone(),
            reason: format!("program '{}' not found", config.program),
        })?;

        Ok(Self {
            descriptor: PluginDescriptor {
                identifier: config.id.clone(),
                name: config.name.clone(),
                version: config.version.clone(),
                weight: config.weight,
                mode: ExecutionMode::ExternalProcess,
            },
            program,
            args: config.args.clone(),
            timeout: config.timeout(),
        })
    }

    fn command(&self, ctx: &PluginContext, configuration: String) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("--configuration")
            .arg(configuration)
            .arg("--target")
            .arg(&ctx.target)
            .arg("--session")
            .arg(ctx.session_id.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn run(&self, ctx: &PluginContext) -> PluginOutcome {
        let plugin = self.descriptor.identifier.as_str();

        let configuration = match serde_json::to_string(&ctx.configuration) {
            Ok(json) => json,
            Err(e) => {
                return PluginOutcome::failed(
                    FailureKind::Error,
                    format!("failed to encode configuration: {e}"),
                );
            }
        };

        let mut child = match self.command(ctx, configuration).spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(plugin, program = %self.program.display(), error = %e, "failed to spawn plugin");
                return PluginOutcome::failed(
                    FailureKind::Crashed,
                    format!("failed to start {}: {e}", self.program.display()),
                );
            }
        };
        info!(plugin, session_id = %ctx.session_id, pid = child.id(), "external plugin started");

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(stderr, plugin.to_owned()));
        }
        let Some(stdout) = child.stdout.take() else {
            return PluginOutcome::failed(FailureKind::Crashed, "plugin stdout unavailable");
        };

        let mut transcript = Transcript::default();
        let result = tokio::time::timeout(
            self.timeout,
            read_and_wait(&mut transcript, &mut child, stdout, &ctx.reporter, plugin),
        )
        .await;

        match result {
            Ok(Ok(status)) => {
                debug!(plugin, %status, "external plugin exited");
                if transcript.finish.is_none() {
                    warn!(plugin, %status, "external plugin exited without finish");
                }
                transcript.into_outcome()
            }
            Ok(Err(e)) => {
                warn!(plugin, error = %e, "failed to wait for plugin");
                PluginOutcome::Failed(
                    PluginFailure::new(FailureKind::Crashed, format!("failed to wait for plugin: {e}"))
                        .with_issues(transcript.issues),
                )
            }
            Err(_elapsed) => {
                if let Err(e) = child.kill().await {
                    warn!(plugin, error = %e, "failed to kill timed out plugin");
                }
                warn!(plugin, timeout_secs = self.timeout.as_secs(), "external plugin timed out");
                PluginOutcome::Failed(
                    PluginFailure::new(
                        FailureKind::Timeout,
                        format!("plugin did not finish within {:?}", self.timeout),
                    )
                    .with_issues(transcript.issues),
                )
            }
        }
    }
}

impl Plugin for ExternalProcessPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    async fn execute(&self, ctx: PluginContext) -> PluginOutcome {
        self.run(&ctx).await
    }
}

async fn read_and_wait<R>(
    transcript: &mut Transcript,
    child: &mut Child,
    stdout: R,
    reporter: &SessionReporter,
    plugin: &str,
) -> std::io::Result<ExitStatus>
where
    R: AsyncRead + Unpin,
{
    transcript.read(stdout, reporter, plugin).await;
    child.wait().await
}

async fn forward_stderr(stderr: tokio::process::ChildStderr, plugin: String) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(plugin = %plugin, "{line}");
    }
}

/// Resolves `program` to an existing file: paths are taken as-is, bare
/// names are searched on `PATH`.
pub fn resolve_program(program: &str) -> Option<PathBuf> {
    if program.is_empty() {
        return None;
    }
    let path = Path::new(program);
    if path.components().count() > 1 || path.is_absolute() {
        return path.is_file().then(|| path.to_path_buf());
    }
    let search = std::env::var_os("PATH")?;
    std::env::split_paths(&search)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}
