use std::process::Stdio;

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines},
    process::{Child, ChildStdin, ChildStdout, Command},
    time::{Duration, timeout},
};

use crate::{
    lattice::Offsets,
    placet::{command::expected_output_lines, error::PlacetError, types::CommunicatorConfig},
};

/// Line-oriented session with an interactive simulator shell.
///
/// Every command is written as one line; the reply is read back line by line
/// with the prompt stripped. Lines carrying an error keyword abort the call.
pub struct Communicator {
    config: CommunicatorConfig,
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl Communicator {
    pub async fn spawn(config: CommunicatorConfig) -> Result<Self, PlacetError> {
        let mut command = Command::new(&config.program);
        command.args(&config.args);
        command.stdin(Stdio::piped());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::null());
        command.kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| PlacetError::Spawn {
            program: config.program.clone(),
            source,
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| PlacetError::Protocol("simulator stdin is not piped".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PlacetError::Protocol("simulator stdout is not piped".to_string()))?;

        let mut communicator = Self {
            config,
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        };

        for _ in 0..communicator.config.intro_lines {
            let line = communicator.read_raw_line("reading the intro").await?;
            tracing::trace!(target: "placet", line = %line, "intro_line");
        }

        tracing::info!(
            target: "placet",
            program = %communicator.config.program,
            pid = ?communicator.child.id(),
            intro_lines = communicator.config.intro_lines,
            "simulator_spawned"
        );
        Ok(communicator)
    }

    pub fn config(&self) -> &CommunicatorConfig {
        &self.config
    }

    pub async fn write_line(&mut self, line: &str) -> Result<(), PlacetError> {
        let line = line.trim_end_matches(['\n', '\r']);
        tracing::debug!(target: "placet", line = %line, "placet_write");
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;

        if self.config.echo {
            self.read_raw_line("skipping the command echo").await?;
        }
        Ok(())
    }

    pub async fn read_line(&mut self) -> Result<String, PlacetError> {
        let raw = self.read_raw_line("reading a reply").await?;
        let line = strip_prompt(&raw, &self.config.prompt).to_string();
        tracing::debug!(target: "placet", line = %line, "placet_read");

        if self
            .config
            .error_keywords
            .iter()
            .any(|keyword| line.contains(keyword.as_str()))
        {
            tracing::error!(target: "placet", line = %line, "simulator_error");
            return Err(PlacetError::Simulator(line));
        }
        if self
            .config
            .warning_keywords
            .iter()
            .any(|keyword| line.contains(keyword.as_str()))
        {
            tracing::warn!(target: "placet", line = %line, "simulator_warning");
        }
        Ok(line)
    }

    pub async fn read_lines(&mut self, count: usize) -> Result<Vec<String>, PlacetError> {
        let mut lines = Vec::with_capacity(count);
        for _ in 0..count {
            lines.push(self.read_line().await?);
        }
        Ok(lines)
    }

    /// Writes `command` and consumes the lines it is known to print.
    ///
    /// A simulator error does not stop the read: the remaining expected lines
    /// are drained so the next command starts on a clean stream, then the
    /// first error is returned.
    pub async fn run_command(&mut self, command: &str) -> Result<Vec<String>, PlacetError> {
        let expected = expected_output_lines(command, &self.config.output_lines);
        self.write_line(command).await?;

        let mut lines = Vec::with_capacity(expected);
        let mut first_error = None;
        for _ in 0..expected {
            match self.read_line().await {
                Ok(line) => lines.push(line),
                Err(err @ PlacetError::Simulator(_)) => {
                    first_error.get_or_insert(err);
                }
                Err(err) => return Err(err),
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(lines),
        }
    }

    pub async fn set_variable(&mut self, name: &str, value: &str) -> Result<(), PlacetError> {
        self.run_command(&format!("set {name} {value}")).await?;
        Ok(())
    }

    /// Reads a numeric simulator variable; the value is the last token of the reply.
    pub async fn read_scalar(&mut self, name: &str) -> Result<f64, PlacetError> {
        self.run_command(&format!("puts ${name}")).await?;
        let line = self.read_line().await?;
        let token = line
            .split_whitespace()
            .last()
            .ok_or_else(|| PlacetError::Protocol(format!("empty reply for variable '{name}'")))?;
        token.parse::<f64>().map_err(|_| {
            PlacetError::Protocol(format!("variable '{name}' is not a number: '{line}'"))
        })
    }

    pub async fn read_list(&mut self, name: &str) -> Result<Vec<f64>, PlacetError> {
        self.run_command(&format!("puts ${name}")).await?;
        let line = self.read_line().await?;
        line.split_whitespace()
            .map(|token| {
                token.parse::<f64>().map_err(|_| {
                    PlacetError::Protocol(format!(
                        "variable '{name}' holds a non-numeric entry '{token}'"
                    ))
                })
            })
            .collect()
    }

    pub async fn element_set_to_offset(
        &mut self,
        index: usize,
        offsets: &Offsets,
    ) -> Result<(), PlacetError> {
        self.run_command(&element_set_to_offset_command(index, offsets))
            .await?;
        Ok(())
    }

    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Closes the shell's stdin and waits for it to exit, killing it on timeout.
    pub async fn close(self) -> Result<(), PlacetError> {
        let Self {
            config,
            mut child,
            stdin,
            ..
        } = self;
        drop(stdin);

        match timeout(Duration::from_millis(config.command_timeout_ms), child.wait()).await {
            Ok(Ok(status)) => {
                tracing::info!(target: "placet", status = %status, "simulator_closed");
            }
            Ok(Err(err)) => return Err(PlacetError::Io(err)),
            Err(_) => {
                tracing::warn!(
                    target: "placet",
                    timeout_ms = config.command_timeout_ms,
                    "simulator did not exit after stdin closed; killing it"
                );
                child.kill().await?;
            }
        }
        Ok(())
    }

    async fn read_raw_line(&mut self, waiting_for: &str) -> Result<String, PlacetError> {
        let timeout_ms = self.config.command_timeout_ms;
        match timeout(Duration::from_millis(timeout_ms), self.stdout.next_line()).await {
            Ok(Ok(Some(line))) => Ok(line),
            Ok(Ok(None)) => Err(PlacetError::ProcessExited),
            Ok(Err(err)) => Err(PlacetError::Io(err)),
            Err(_) => Err(PlacetError::Timeout {
                timeout_ms,
                waiting_for: waiting_for.to_string(),
            }),
        }
    }
}

pub fn element_set_to_offset_command(index: usize, offsets: &Offsets) -> String {
    format!(
        "ElementSetToOffset {index} -x {} -y {} -xp {} -yp {} -roll {}",
        offsets.x, offsets.y, offsets.xp, offsets.yp, offsets.roll
    )
}

/// Removes every leading prompt; the shell repeats it once per pending command.
fn strip_prompt<'a>(line: &'a str, prompt: &str) -> &'a str {
    if prompt.is_empty() {
        return line;
    }
    let mut rest = line;
    while let Some(stripped) = rest.strip_prefix(prompt) {
        rest = stripped;
    }
    rest
}
