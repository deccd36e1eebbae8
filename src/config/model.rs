// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer};

use crate::types::{FingerprintMode, StateStorageMode};

/// Configuration exactly as read from `Builddag.toml`.
///
/// ```toml
/// [config]
/// default_target = "assemble"
///
/// [default]
/// exclude = [".git/**"]
///
/// [task.generate]
/// cmd = "templ generate -f {input} -o {output}"
/// inputs = ["view/**/*.templ"]
/// outputs = ["view/**/*_generated.templ"]
/// generated = true
/// per_file = {}
///
/// [task.compile]
/// cmd = "go build -o build/app ./cmd/server"
/// inputs = ["**/*.go"]
/// outputs = ["build/app"]
/// after = ["generate"]
/// ```
///
/// Not yet validated; convert with `ConfigFile::try_from`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub default: DefaultSection,

    /// All `[task.<name>]` sections, in document order.
    #[serde(default, deserialize_with = "tasks_in_document_order")]
    pub task: Vec<(String, TaskConfig)>,
}

/// Validated configuration. Only obtainable through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub default: DefaultSection,
    pub task: Vec<(String, TaskConfig)>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        default: DefaultSection,
        task: Vec<(String, TaskConfig)>,
    ) -> Self {
        Self {
            config,
            default,
            task,
        }
    }

    pub fn task(&self, name: &str) -> Option<&TaskConfig> {
        self.task.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.task.iter().map(|(n, _)| n.as_str())
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Project root, relative to the directory holding the config file.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Task built when no target is given on the command line. Defaults to
    /// the last declared task.
    #[serde(default)]
    pub default_target: Option<String>,

    #[serde(default)]
    pub fingerprint: FingerprintMode,

    #[serde(default)]
    pub state: StateStorageMode,

    /// Size of the per-file worker pool. Defaults to available parallelism.
    #[serde(default)]
    pub workers: Option<usize>,

    /// Default timeout for every task, e.g. `"10m"`.
    #[serde(default)]
    pub timeout: Option<String>,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            root: default_root(),
            default_target: None,
            fingerprint: FingerprintMode::default(),
            state: StateStorageMode::default(),
            workers: None,
            timeout: None,
        }
    }
}

/// `[default]` section, merged into every task.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefaultSection {
    /// Environment for every command; task `env` entries win.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Exclude globs added to every task's locators.
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskConfig {
    /// Shell command line. A task without one only aggregates its
    /// dependencies.
    #[serde(default)]
    pub cmd: Option<String>,

    #[serde(default)]
    pub inputs: Vec<String>,

    #[serde(default)]
    pub outputs: Vec<String>,

    /// Extra exclude globs for this task's locators.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Dependency list: `after = ["generate"]`.
    #[serde(default)]
    pub after: Vec<String>,

    /// Outputs are generated sources; `clean` removes them.
    #[serde(default)]
    pub generated: bool,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Overrides `[config].timeout`.
    #[serde(default)]
    pub timeout: Option<String>,

    /// Run `cmd` once per input file instead of once per task.
    #[serde(default)]
    pub per_file: Option<PerFileConfig>,
}

/// `per_file = { output = "{dir}/{stem}_generated.{ext}" }`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PerFileConfig {
    /// Output naming template; see [`crate::task::OutputNaming`].
    #[serde(default)]
    pub output: Option<String>,
}

/// Read `[task]` as a table so entries keep the order they were written in
/// (the `preserve_order` feature of `toml`).
fn tasks_in_document_order<'de, D>(deserializer: D) -> Result<Vec<(String, TaskConfig)>, D::Error>
where
    D: Deserializer<'de>,
{
    let table = toml::Table::deserialize(deserializer)?;
    table
        .into_iter()
        .map(|(name, value)| {
            value
                .try_into::<TaskConfig>()
                .map(|task| (name.clone(), task))
                .map_err(|e| serde::de::Error::custom(format!("task '{name}': {e}")))
        })
        .collect()
}
