use exporter_core::{Command, ExporterError, Result, ScriptSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Config file as written by the user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub startup: Option<ScriptConfig>,
    #[serde(default)]
    pub scripts: Vec<ScriptConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub command: Option<CommandConfig>,
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub timeout: Option<TimeoutConfig>,
    #[serde(default)]
    pub raw: bool,
}

/// `command: "bin arg"` or `command: ["bin", "arg"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandConfig {
    Line(String),
    Args(Vec<String>),
}

impl CommandConfig {
    pub fn to_argv(&self) -> Vec<String> {
        match self {
            CommandConfig::Line(line) => line.split_whitespace().map(str::to_string).collect(),
            CommandConfig::Args(args) => args.clone(),
        }
    }
}

/// Whole seconds, or a humantime string such as `"1500ms"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeoutConfig {
    Seconds(u64),
    Human(String),
}

impl TimeoutConfig {
    pub fn to_duration(&self) -> std::result::Result<Duration, String> {
        match self {
            TimeoutConfig::Seconds(secs) => Ok(Duration::from_secs(*secs)),
            TimeoutConfig::Human(text) => match text.trim().parse::<u64>() {
                Ok(secs) => Ok(Duration::from_secs(secs)),
                Err(_) => humantime::parse_duration(text.trim())
                    .map_err(|e| format!("invalid timeout '{}': {}", text, e)),
            },
        }
    }
}

impl ScriptConfig {
    /// Resolves the string/list command forms into a validated [`ScriptSpec`].
    pub fn to_spec(&self) -> Result<ScriptSpec> {
        let argv = self
            .command
            .as_ref()
            .map(CommandConfig::to_argv)
            .unwrap_or_default();

        let command = match &self.script {
            Some(body) if !body.is_empty() => {
                if argv.is_empty() {
                    Some(Command::shell(body.clone()))
                } else {
                    Some(Command::shell_with(argv, body.clone()))
                }
            }
            _ if !argv.is_empty() => Some(Command::Argv(argv)),
            _ => None,
        };

        let mut builder = ScriptSpec::builder()
            .name(self.name.clone())
            .raw_output(self.raw);

        if let Some(command) = command {
            builder = builder.command(command);
        }

        if let Some(timeout) = &self.timeout {
            let timeout = timeout.to_duration().map_err(|e| {
                ExporterError::InvalidConfig(format!("script '{}': {}", self.name, e))
            })?;
            builder = builder.timeout(timeout);
        }

        builder.build()
    }
}

/// Validated configuration, ready to hand to the aggregator.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Config {
    pub startup: Option<ScriptSpec>,
    pub scripts: Vec<ScriptSpec>,
}

impl ConfigFile {
    pub fn resolve(&self) -> Result<Config> {
        let mut seen = HashSet::new();
        let mut scripts = Vec::with_capacity(self.scripts.len());

        for (i, script) in self.scripts.iter().enumerate() {
            let spec = script.to_spec().map_err(|e| match e {
                ExporterError::InvalidConfig(message) => ExporterError::InvalidConfig(format!(
                    "script #{} '{}' failed to validate: {}",
                    i, script.name, message
                )),
                other => other,
            })?;

            if !seen.insert(spec.name().to_string()) {
                return Err(ExporterError::InvalidConfig(format!(
                    "script #{} '{}': duplicate script name",
                    i,
                    spec.name()
                )));
            }

            scripts.push(spec);
        }

        let startup = match &self.startup {
            Some(startup) => {
                let mut startup = startup.clone();
                startup.name = "startup".to_string();
                Some(startup.to_spec().map_err(|e| {
                    ExporterError::InvalidConfig(format!(
                        "startup command failed to validate: {}",
                        e
                    ))
                })?)
            }
            None => None,
        };

        Ok(Config { startup, scripts })
    }
}
