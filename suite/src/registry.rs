//! Case registry parsing and validation.
//!
//! A registry is a TOML file listing the module directories under test. See
//! `cases/infrastructure.toml` for the shipped suite. Every check here runs
//! before any tool process is spawned; a bad registry aborts the whole run.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use engine::core::types::{LifecycleMode, TestCase};
use serde::Deserialize;

/// A parsed registry file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RegistryFile {
    #[serde(default)]
    pub cases: Vec<CaseEntry>,
}

/// One `[[cases]]` table.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CaseEntry {
    /// Unique identifier (slug format: `[a-z0-9_-]+`).
    pub id: String,
    /// Module or environment root, relative to the registry file.
    pub dir: PathBuf,
    pub mode: LifecycleMode,
    /// Identifiers that must appear in the plan output (`plan` mode only).
    #[serde(default)]
    pub expect: Vec<String>,
}

impl RegistryFile {
    #[cfg(test)]
    pub fn parse_str(contents: &str) -> Result<Self> {
        let registry: RegistryFile = toml::from_str(contents).context("parse registry")?;
        registry.validate()?;
        Ok(registry)
    }

    fn validate(&self) -> Result<()> {
        if self.cases.is_empty() {
            bail!("cases must be a non-empty array");
        }
        let mut seen = BTreeSet::new();
        for (index, entry) in self.cases.iter().enumerate() {
            entry
                .validate()
                .with_context(|| format!("cases[{}] invalid", index))?;
            if !seen.insert(entry.id.as_str()) {
                bail!("duplicate case id {}", entry.id);
            }
        }
        Ok(())
    }

    /// Convert entries to test cases, resolving relative directories against `base_dir`.
    pub fn into_cases(self, base_dir: &Path) -> Vec<TestCase> {
        self.cases
            .into_iter()
            .map(|entry| {
                let target_directory = if entry.dir.is_absolute() {
                    entry.dir
                } else {
                    base_dir.join(entry.dir)
                };
                TestCase {
                    id: entry.id,
                    target_directory,
                    lifecycle_mode: entry.mode,
                    expected_identifiers: entry.expect,
                }
            })
            .collect()
    }
}

impl CaseEntry {
    fn validate(&self) -> Result<()> {
        validate_case_id(&self.id)?;
        if self.dir.as_os_str().is_empty() {
            bail!("{}: dir must be non-empty", self.id);
        }
        match self.mode {
            LifecycleMode::Plan => {
                if self.expect.is_empty() {
                    bail!(
                        "{}: plan cases must list at least one expected identifier",
                        self.id
                    );
                }
            }
            LifecycleMode::Validate => {
                if !self.expect.is_empty() {
                    bail!(
                        "{}: validate cases produce no plan output; remove `expect`",
                        self.id
                    );
                }
            }
        }
        if self.expect.iter().any(|identifier| identifier.is_empty()) {
            bail!("{}: expected identifiers must be non-empty", self.id);
        }
        Ok(())
    }
}

/// Load and validate a registry, returning cases in file order.
pub fn load_registry(path: &Path) -> Result<Vec<TestCase>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read registry {}", path.display()))?;
    let registry: RegistryFile =
        toml::from_str(&contents).with_context(|| format!("parse registry {}", path.display()))?;
    registry
        .validate()
        .with_context(|| format!("validate registry {}", path.display()))?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(registry.into_cases(base_dir))
}

/// Keep cases whose id contains `filter`. An empty result is an error.
pub fn filter_cases(cases: Vec<TestCase>, filter: Option<&str>) -> Result<Vec<TestCase>> {
    let Some(filter) = filter else {
        return Ok(cases);
    };
    let selected: Vec<TestCase> = cases
        .into_iter()
        .filter(|case| case.id.contains(filter))
        .collect();
    if selected.is_empty() {
        bail!("no case id matches filter {:?}", filter);
    }
    Ok(selected)
}

fn validate_case_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        bail!("case id must be non-empty");
    }
    if !id
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_')
    {
        bail!("case id {:?} must use [a-z0-9_-] only", id);
    }
    Ok(())
}
