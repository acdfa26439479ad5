use crate::error::{ExporterError, Result};
use serde::Serialize;
use std::time::Duration;

/// Timeout applied when a script does not configure one (or configures zero).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Interpreter used for shell bodies, `-e` makes it fail fast.
pub const DEFAULT_SHELL: [&str; 2] = ["/bin/sh", "-e"];

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Body written to the stdin of `interpreter`
    Shell { interpreter: Vec<String>, body: String },

    /// Argument vector executed verbatim
    Argv(Vec<String>),
}

impl Command {
    pub fn shell(body: impl Into<String>) -> Self {
        Self::Shell {
            interpreter: DEFAULT_SHELL.iter().map(|s| s.to_string()).collect(),
            body: body.into(),
        }
    }

    pub fn shell_with(interpreter: Vec<String>, body: impl Into<String>) -> Self {
        Self::Shell {
            interpreter,
            body: body.into(),
        }
    }

    pub fn argv<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Argv(args.into_iter().map(Into::into).collect())
    }

    /// The program and arguments that get spawned.
    pub fn program_args(&self) -> &[String] {
        match self {
            Command::Shell { interpreter, .. } => interpreter,
            Command::Argv(args) => args,
        }
    }

    pub fn stdin_body(&self) -> Option<&str> {
        match self {
            Command::Shell { body, .. } => Some(body),
            Command::Argv(_) => None,
        }
    }

    pub fn description(&self) -> String {
        match self {
            Command::Shell { interpreter, body } => format!(
                "{} <<< {} line script",
                interpreter.join(" "),
                body.lines().count()
            ),
            Command::Argv(args) => args.join(" "),
        }
    }
}

/// A validated command definition. Only constructible through
/// [`ScriptSpecBuilder::build`], so `timeout > 0` and a non-empty
/// program always hold.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScriptSpec {
    name: String,
    command: Command,
    #[serde(with = "humantime_serde")]
    timeout: Duration,
    raw_output: bool,
}

impl ScriptSpec {
    pub fn builder() -> ScriptSpecBuilder {
        ScriptSpecBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn raw_output(&self) -> bool {
        self.raw_output
    }
}

#[derive(Default)]
pub struct ScriptSpecBuilder {
    name: Option<String>,
    command: Option<Command>,
    timeout: Option<Duration>,
    raw_output: bool,
}

impl ScriptSpecBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn command(mut self, command: Command) -> Self {
        self.command = Some(command);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn raw_output(mut self, raw_output: bool) -> Self {
        self.raw_output = raw_output;
        self
    }

    pub fn build(self) -> Result<ScriptSpec> {
        let name = self.name.unwrap_or_default();
        if name.is_empty() {
            return Err(ExporterError::InvalidConfig("no name provided".to_string()));
        }

        let command = self.command.ok_or_else(|| {
            ExporterError::InvalidConfig(format!("script '{}': no script or command provided", name))
        })?;

        if command.program_args().first().map_or(true, |program| program.is_empty()) {
            return Err(ExporterError::InvalidConfig(format!(
                "script '{}': command is empty",
                name
            )));
        }

        let timeout = match self.timeout {
            Some(timeout) if !timeout.is_zero() => timeout,
            _ => DEFAULT_TIMEOUT,
        };

        Ok(ScriptSpec {
            name,
            command,
            timeout,
            raw_output: self.raw_output,
        })
    }
}

mod humantime_serde {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }
}
