use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

fn default_program() -> String {
    "placet".to_string()
}

fn default_prompt() -> String {
    "% ".to_string()
}

fn default_intro_lines() -> usize {
    19
}

fn default_command_timeout_ms() -> u64 {
    100_000
}

fn default_error_keywords() -> Vec<String> {
    vec!["ERROR".to_string()]
}

fn default_warning_keywords() -> Vec<String> {
    vec!["WARNING".to_string()]
}

/// How to start the simulator and how to read its interactive shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunicatorConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Prefix the interactive shell prints before a reply; stripped from every line.
    #[serde(default = "default_prompt")]
    pub prompt: String,
    /// Banner lines printed on startup.
    #[serde(default = "default_intro_lines")]
    pub intro_lines: usize,
    /// The shell repeats every command line before answering.
    #[serde(default)]
    pub echo: bool,
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
    #[serde(default = "default_error_keywords")]
    pub error_keywords: Vec<String>,
    #[serde(default = "default_warning_keywords")]
    pub warning_keywords: Vec<String>,
    /// Per-command output line counts that replace the built-in table.
    #[serde(default)]
    pub output_lines: BTreeMap<String, usize>,
}

impl Default for CommunicatorConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
            prompt: default_prompt(),
            intro_lines: default_intro_lines(),
            echo: false,
            command_timeout_ms: default_command_timeout_ms(),
            error_keywords: default_error_keywords(),
            warning_keywords: default_warning_keywords(),
            output_lines: BTreeMap::new(),
        }
    }
}

impl CommunicatorConfig {
    pub fn for_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_intro_lines(mut self, intro_lines: usize) -> Self {
        self.intro_lines = intro_lines;
        self
    }

    pub fn with_timeout_ms(mut self, command_timeout_ms: u64) -> Self {
        self.command_timeout_ms = command_timeout_ms;
        self
    }
}
