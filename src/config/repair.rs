use crate::config::settings::get_home_dir;
use crate::error::{BridgeError, Result};
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of checking a single project config
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectOutcome {
    /// `languages` already present at the root
    Declared,
    /// A default `languages` list was appended
    Repaired,
    /// No `.serena/project.yml` in the project
    Missing,
    /// File exists but is not a YAML mapping
    Skipped(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub checked: usize,
    pub repaired: Vec<PathBuf>,
    pub skipped: usize,
}

/// Ensures every registered Serena project declares its languages.
///
/// Serena refuses to activate a project whose `project.yml` lacks the root
/// `languages` key, which would otherwise surface as an opaque server error
/// on the first tool call.
pub struct ConfigRepairer {
    global_config_path: PathBuf,
    default_languages: Vec<String>,
}

impl ConfigRepairer {
    pub fn new(global_config_path: PathBuf, default_languages: Vec<String>) -> Self {
        Self {
            global_config_path,
            default_languages,
        }
    }

    /// Repairer for `~/.serena/serena_config.yml`
    pub fn for_home(default_languages: Vec<String>) -> Result<Self> {
        let path = get_home_dir()?.join(".serena").join("serena_config.yml");
        Ok(Self::new(path, default_languages))
    }

    /// Run the repair, logging failures instead of returning them
    pub async fn run(&self) -> RepairReport {
        match self.try_run().await {
            Ok(report) => report,
            Err(e) => {
                warn!("Failed to validate Serena configs: {}", e);
                RepairReport::default()
            }
        }
    }

    pub async fn try_run(&self) -> Result<RepairReport> {
        let mut report = RepairReport::default();

        if !self.global_config_path.exists() {
            debug!(
                "No global Serena config at {}, skipping repair",
                self.global_config_path.display()
            );
            return Ok(report);
        }

        let content = tokio::fs::read_to_string(&self.global_config_path).await?;
        for project in registered_projects(&content)? {
            let config_path = project.join(".serena").join("project.yml");
            match self.repair_project(&config_path).await {
                Ok(ProjectOutcome::Missing) => {}
                Ok(ProjectOutcome::Declared) => report.checked += 1,
                Ok(ProjectOutcome::Repaired) => {
                    report.checked += 1;
                    report.repaired.push(config_path);
                }
                Ok(ProjectOutcome::Skipped(reason)) => {
                    warn!("Skipping {}: {}", config_path.display(), reason);
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!("Failed to repair {}: {}", config_path.display(), e);
                    report.skipped += 1;
                }
            }
        }

        Ok(report)
    }

    /// Check one project config, appending default languages when the key is absent
    pub async fn repair_project(&self, config_path: &Path) -> Result<ProjectOutcome> {
        if !config_path.exists() {
            return Ok(ProjectOutcome::Missing);
        }

        let content = tokio::fs::read_to_string(config_path).await?;
        let document: Value = match serde_yaml::from_str(&content) {
            Ok(document) => document,
            Err(e) => return Ok(ProjectOutcome::Skipped(format!("invalid YAML: {e}"))),
        };

        match document {
            Value::Mapping(ref mapping) if mapping.contains_key("languages") => {
                Ok(ProjectOutcome::Declared)
            }
            Value::Mapping(_) | Value::Null => {
                warn!(
                    "Missing 'languages' key in {}, adding default...",
                    config_path.display()
                );
                let repaired = append_languages(&content, &self.default_languages);
                tokio::fs::write(config_path, repaired).await?;
                info!("Fixed {}", config_path.display());
                Ok(ProjectOutcome::Repaired)
            }
            _ => Ok(ProjectOutcome::Skipped("root is not a mapping".to_string())),
        }
    }
}

/// Project paths listed under the top-level `projects` key
pub fn registered_projects(global_config: &str) -> Result<Vec<PathBuf>> {
    let document: Value = serde_yaml::from_str(global_config)?;

    let projects = match document.get("projects") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Sequence(entries)) => entries,
        Some(_) => {
            return Err(BridgeError::ParseError(
                "'projects' in global Serena config is not a list".to_string(),
            ));
        }
    };

    Ok(projects
        .iter()
        .filter_map(Value::as_str)
        .map(|path| PathBuf::from(path.trim()))
        .collect())
}

fn append_languages(content: &str, languages: &[String]) -> String {
    let mut repaired = content.to_string();
    if !repaired.is_empty() {
        if !repaired.ends_with('\n') {
            repaired.push('\n');
        }
        repaired.push('\n');
    }

    repaired.push_str("languages:\n");
    for language in languages {
        repaired.push_str("  - ");
        repaired.push_str(language);
        repaired.push('\n');
    }
    repaired
}
