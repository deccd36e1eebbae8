#![allow(dead_code)]

use builddag::config::{
    ConfigFile, ConfigSection, DefaultSection, PerFileConfig, RawConfigFile, TaskConfig,
};
use builddag::errors::Result;
use builddag::types::{FingerprintMode, StateStorageMode};

/// Builder for `ConfigFile` to simplify test setup.
///
/// Tasks keep the order in which they are added, as they would in a TOML
/// document.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                default: DefaultSection::default(),
                task: Vec::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.push((name.to_string(), task));
        self
    }

    pub fn default_target(mut self, name: &str) -> Self {
        self.config.config.default_target = Some(name.to_string());
        self
    }

    pub fn fingerprint(mut self, mode: FingerprintMode) -> Self {
        self.config.config.fingerprint = mode;
        self
    }

    pub fn state(mut self, mode: StateStorageMode) -> Self {
        self.config.config.state = mode;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.config.workers = Some(workers);
        self
    }

    pub fn timeout(mut self, duration: &str) -> Self {
        self.config.config.timeout = Some(duration.to_string());
        self
    }

    pub fn with_global_exclude(mut self, pattern: &str) -> Self {
        self.config.default.exclude.push(pattern.to_string());
        self
    }

    pub fn with_default_env(mut self, key: &str, value: &str) -> Self {
        self.config
            .default
            .env
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Validate, returning the error instead of panicking.
    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                cmd: Some(cmd.to_string()),
                ..TaskConfig::default()
            },
        }
    }

    /// Task without a command (e.g. `assemble`).
    pub fn aggregate() -> Self {
        Self {
            task: TaskConfig::default(),
        }
    }

    pub fn input(mut self, pattern: &str) -> Self {
        self.task.inputs.push(pattern.to_string());
        self
    }

    pub fn output(mut self, pattern: &str) -> Self {
        self.task.outputs.push(pattern.to_string());
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.task.exclude.push(pattern.to_string());
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn generated(mut self, val: bool) -> Self {
        self.task.generated = val;
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.task.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn timeout(mut self, duration: &str) -> Self {
        self.task.timeout = Some(duration.to_string());
        self
    }

    /// Run once per input; `None` keeps the default naming template.
    pub fn per_file(mut self, template: Option<&str>) -> Self {
        self.task.per_file = Some(PerFileConfig {
            output: template.map(str::to_string),
        });
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
