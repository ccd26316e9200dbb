use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use jsonschema::{JSONSchema, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    correction::{CommandOptions, KnobScanConfig, Survey},
    knob::{CoordinateSpec, KnobOptions},
    placet::CommunicatorConfig,
};

const SCHEMA_FILE_NAME: &str = "placetmachine.schema.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    pub lattice: LatticeConfig,
    #[serde(default)]
    pub knobs: Vec<KnobConfig>,
    #[serde(default)]
    pub scans: Vec<ScanConfig>,
    #[serde(default)]
    pub alignment: Option<AlignmentConfig>,
}

fn default_enabled_true() -> bool {
    true
}

fn default_logging_dir() -> PathBuf {
    PathBuf::from("./logs")
}

fn default_logging_filter() -> String {
    "info".to_string()
}

fn default_logging_rotation() -> LoggingRotation {
    LoggingRotation::Daily
}

fn default_logging_retention_days() -> usize {
    14
}

fn default_stderr_level() -> String {
    "warn".to_string()
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("./placet-data")
}

fn default_lattice_name() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LoggingRotation {
    Daily,
    Hourly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_logging_filter")]
    pub filter: String,
    #[serde(default = "default_logging_rotation")]
    pub rotation: LoggingRotation,
    #[serde(default = "default_logging_retention_days")]
    pub retention_days: usize,
    #[serde(default = "default_enabled_true")]
    pub file_enabled: bool,
    /// Level of the human-readable stderr layer; "off" disables it.
    #[serde(default = "default_stderr_level")]
    pub stderr_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_logging_dir(),
            filter: default_logging_filter(),
            rotation: default_logging_rotation(),
            retention_days: default_logging_retention_days(),
            file_enabled: true,
            stderr_level: default_stderr_level(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulatorConfig {
    #[serde(flatten)]
    pub communicator: CommunicatorConfig,
    /// Commands sent once after startup, before any scan (sourcing scripts,
    /// building the beamline, creating beams).
    #[serde(default)]
    pub setup_commands: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatticeConfig {
    #[serde(default = "default_lattice_name")]
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub misalignments: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnobElementConfig {
    /// Element position in the lattice file.
    pub index: usize,
    pub coordinates: BTreeMap<String, CoordinateSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnobConfig {
    pub name: String,
    #[serde(default)]
    pub supported_amplitudes: Option<Vec<f64>>,
    pub elements: Vec<KnobElementConfig>,
}

impl KnobConfig {
    pub fn options(&self) -> KnobOptions {
        KnobOptions {
            name: self.name.clone(),
            supported_amplitudes: self.supported_amplitudes.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservableConfig {
    /// Tracking command run after the knob's offsets are pushed.
    pub command: String,
    /// Simulator variable holding the figure of merit afterwards.
    pub variable: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    pub knob: String,
    pub observable: ObservableConfig,
    #[serde(flatten)]
    pub scan: KnobScanConfig,
}

/// One tracking or correction run; `survey` names a simulator procedure and
/// defaults to the beamline's current alignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CorrectionStep {
    Track {
        beam: String,
        #[serde(default)]
        survey: Option<String>,
    },
    OneToOne {
        beam: String,
        #[serde(default)]
        survey: Option<String>,
        #[serde(default)]
        options: CommandOptions,
    },
    Dfs {
        beam: String,
        #[serde(default)]
        survey: Option<String>,
        #[serde(default = "default_enabled_true")]
        bpms_realign: bool,
        #[serde(default)]
        options: CommandOptions,
    },
    RfAlign {
        beam: String,
        #[serde(default)]
        survey: Option<String>,
        #[serde(default)]
        options: CommandOptions,
    },
}

/// Errors and corrections applied after the setup commands, before any scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentConfig {
    /// Scratch directory for position files exchanged with the simulator.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    #[serde(default)]
    pub survey: Option<Survey>,
    #[serde(default)]
    pub corrections: Vec<CorrectionStep>,
}

impl Config {
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let config_value: Value = json5::from_str(&config_content)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;

        let config_base = config_path.parent().unwrap_or_else(|| Path::new("."));
        let schema_path = resolve_schema_path(config_base, &config_value)?;
        validate_against_schema(&config_value, &schema_path)?;

        let mut config: Config = serde_json::from_value(config_value)
            .context("failed to deserialize placetmachine config")?;

        if !config.lattice.path.is_absolute() {
            config.lattice.path = config_base.join(&config.lattice.path);
        }
        if let Some(misalignments) = &mut config.lattice.misalignments
            && !misalignments.is_absolute()
        {
            *misalignments = config_base.join(&*misalignments);
        }
        if let Some(alignment) = &mut config.alignment {
            if !alignment.work_dir.is_absolute() {
                alignment.work_dir = config_base.join(&alignment.work_dir);
            }
            if let Some(Survey::FromFile { path }) = &mut alignment.survey
                && !path.is_absolute()
            {
                *path = config_base.join(&*path);
            }
        }

        Ok(config)
    }

    pub fn knob(&self, name: &str) -> Option<&KnobConfig> {
        self.knobs.iter().find(|knob| knob.name == name)
    }
}

fn resolve_schema_path(config_base: &Path, config_value: &Value) -> Result<PathBuf> {
    if let Some(path_text) = config_value.get("$schema").and_then(|value| value.as_str()) {
        let configured = PathBuf::from(path_text);
        if configured.is_absolute() {
            return Ok(configured);
        }
        return Ok(config_base.join(&configured));
    }

    let local_default = config_base.join(SCHEMA_FILE_NAME);
    if local_default.exists() {
        return Ok(local_default);
    }

    Err(anyhow!(
        "unable to resolve schema path: expected $schema in config or {SCHEMA_FILE_NAME} next to it"
    ))
}

fn validate_against_schema(config_value: &Value, schema_path: &Path) -> Result<()> {
    let schema_content = fs::read_to_string(schema_path)
        .with_context(|| format!("failed to read schema {}", schema_path.display()))?;
    let schema: Value = serde_json::from_str(&schema_content)
        .with_context(|| format!("failed to parse schema {}", schema_path.display()))?;

    let compiled =
        JSONSchema::compile(&schema).map_err(|e| anyhow!("failed to compile schema: {e}"))?;

    match compiled.validate(config_value) {
        Ok(()) => Ok(()),
        Err(errors_iter) => {
            let validation_errors: Vec<ValidationError> = errors_iter.collect();
            let messages: Vec<String> = validation_errors
                .into_iter()
                .map(|error| error.to_string())
                .collect();
            Err(anyhow!("config validation failed: {}", messages.join("; ")))
        }
    }
}
