// src/task/naming.rs

//! Output naming for per-file generation.
//!
//! Each generated file is named after its source template. The template
//! string understands four placeholders, all derived from the source path
//! relative to the project root:
//!
//! | placeholder | `view/home.templ` |
//! |-------------|-------------------|
//! | `{dir}`     | `view`            |
//! | `{name}`    | `home.templ`      |
//! | `{stem}`    | `home`            |
//! | `{ext}`     | `templ`           |

use std::path::{Component, Path, PathBuf};

use super::locator::to_slash;

/// Default naming: `<name>.ext` → `<name>_generated.ext`, next to the source.
pub const DEFAULT_OUTPUT_TEMPLATE: &str = "{dir}/{stem}_generated.{ext}";

const PLACEHOLDERS: &[&str] = &["dir", "name", "stem", "ext"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputNaming {
    template: String,
}

impl Default for OutputNaming {
    fn default() -> Self {
        Self {
            template: DEFAULT_OUTPUT_TEMPLATE.to_string(),
        }
    }
}

impl OutputNaming {
    pub fn new(template: impl Into<String>) -> Result<Self, String> {
        let template = template.into();
        validate_template(&template)?;
        Ok(Self { template })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Root-relative output path for a root-relative source path.
    pub fn output_for(&self, source: &Path) -> PathBuf {
        let dir = source
            .parent()
            .map(to_slash)
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| ".".to_string());
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = source
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = source
            .extension()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut rendered = self.template.clone();
        if ext.is_empty() {
            rendered = rendered.replace(".{ext}", "");
        }
        let rendered = rendered
            .replace("{dir}", &dir)
            .replace("{name}", &name)
            .replace("{stem}", &stem)
            .replace("{ext}", &ext);

        Path::new(&rendered)
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect()
    }
}

/// Check that every `{...}` in a template is a known placeholder.
pub fn validate_template(template: &str) -> Result<(), String> {
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| format!("unclosed placeholder in '{template}'"))?;
        let key = &after[..close];
        if !PLACEHOLDERS.contains(&key) {
            return Err(format!(
                "unknown placeholder '{{{key}}}' in '{template}' (expected one of {})",
                PLACEHOLDERS
                    .iter()
                    .map(|p| format!("{{{p}}}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
        rest = &after[close + 1..];
    }
    Ok(())
}
