//! Configuration file loading for codefix.
//!
//! Discovers and loads `codefix.toml` from the root directory.
//! Merges config file settings with CLI arguments (CLI takes precedence).
//! Paths in the file are relative to the root; paths on the command line
//! are taken as given.

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use codefix_core::settings::{FixSettings, ProjectSpec};
use codefix_domain::{FallbackPolicy, FallbackRule, InvocationLock};
use fs_err as fs;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

/// The config file name to search for.
pub const CONFIG_FILE_NAME: &str = "codefix.toml";

/// Top-level configuration from codefix.toml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CodefixConfig {
    pub engine: EngineConfig,

    /// Fallback-eligible categories. When present, replaces the built-in policy;
    /// an empty list disables fallback application entirely.
    pub fallback: Option<Vec<FallbackRule>>,

    /// Host options handed to providers.
    pub params: BTreeMap<String, String>,

    pub projects: Vec<ProjectConfig>,

    pub input: InputConfig,

    pub output: OutputConfig,
}

/// Engine section of the config.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on passes.
    pub max_passes: Option<u32>,

    /// Never run two provider invocations at once.
    pub serialize_providers: bool,
}

/// One `[[projects]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    pub root: Utf8PathBuf,

    /// Glob patterns relative to `root` (default: every file).
    #[serde(default)]
    pub include: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Diagnostics JSON file.
    pub diagnostics: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Artifacts directory.
    pub dir: Option<Utf8PathBuf>,
}

impl CodefixConfig {
    pub fn policy(&self) -> FallbackPolicy {
        self.fallback
            .clone()
            .map(FallbackPolicy::new)
            .unwrap_or_default()
    }
}

/// Discover the codefix.toml config file.
///
/// Returns `None` if there is no `codefix.toml` directly under `root`.
pub fn discover_config(root: &Utf8Path) -> Option<Utf8PathBuf> {
    let config_path = root.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        debug!("found config file at {}", config_path);
        Some(config_path)
    } else {
        debug!("no config file found at {}", config_path);
        None
    }
}

pub fn load_config(path: &Utf8Path) -> anyhow::Result<CodefixConfig> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config file {}", path))?;
    parse_config(&contents).with_context(|| format!("parse config file {}", path))
}

pub fn parse_config(contents: &str) -> anyhow::Result<CodefixConfig> {
    let config: CodefixConfig = toml::from_str(contents).context("invalid TOML")?;
    Ok(config)
}

/// Load config from root, or return default if not found.
pub fn load_or_default(root: &Utf8Path) -> anyhow::Result<CodefixConfig> {
    match discover_config(root) {
        Some(path) => load_config(&path),
        None => Ok(CodefixConfig::default()),
    }
}

/// Values supplied on the `fix` command line.
#[derive(Debug, Clone, Default)]
pub struct FixOverrides {
    /// Replace config projects of the same name; others are appended.
    pub projects: Vec<ProjectSpec>,
    pub diagnostics: Option<Utf8PathBuf>,
    pub max_passes: Option<u32>,
    pub out_dir: Option<Utf8PathBuf>,
    pub apply: bool,
    /// Extend (and override) the config `[params]`.
    pub params: BTreeMap<String, String>,
    pub serialize_providers: bool,
}

/// Builder for merging config file with CLI arguments.
pub struct ConfigMerger {
    config: CodefixConfig,
}

impl ConfigMerger {
    pub fn new(config: CodefixConfig) -> Self {
        Self { config }
    }

    /// Merge with `fix` command arguments into pipeline settings.
    pub fn merge_fix_args(
        self,
        root: &Utf8Path,
        cli: FixOverrides,
    ) -> anyhow::Result<FixSettings> {
        let policy = self.config.policy();
        let CodefixConfig {
            engine,
            params: file_params,
            projects: file_projects,
            input,
            output,
            ..
        } = self.config;

        let mut projects: Vec<ProjectSpec> = file_projects
            .into_iter()
            .map(|p| ProjectSpec::new(p.name, root.join(&p.root)).with_include(p.include))
            .collect();
        for spec in cli.projects {
            match projects.iter_mut().find(|p| p.name == spec.name) {
                Some(existing) => *existing = spec,
                None => projects.push(spec),
            }
        }
        if projects.is_empty() {
            anyhow::bail!(
                "no projects configured; pass --project NAME=DIR or add [[projects]] to {}",
                CONFIG_FILE_NAME
            );
        }

        let mut params = file_params;
        params.extend(cli.params);

        let lock = if cli.serialize_providers || engine.serialize_providers {
            InvocationLock::exclusive()
        } else {
            InvocationLock::none()
        };

        Ok(FixSettings {
            projects,
            diagnostics: cli
                .diagnostics
                .or_else(|| input.diagnostics.map(|p| root.join(p))),
            out_dir: cli
                .out_dir
                .or_else(|| output.dir.map(|p| root.join(p)))
                .unwrap_or_else(|| root.join("artifacts").join("codefix")),
            max_passes: cli
                .max_passes
                .or(engine.max_passes)
                .unwrap_or(FixSettings::DEFAULT_MAX_PASSES),
            policy,
            params,
            lock,
            apply: cli.apply,
        })
    }
}

/// Parse CLI params from key=value strings.
pub fn parse_cli_params(params: &[String]) -> anyhow::Result<BTreeMap<String, String>> {
    params
        .iter()
        .map(|entry| split_pair(entry, "param", "key", "value"))
        .collect()
}

/// Parse `--project NAME=DIR` values.
pub fn parse_project_args(projects: &[String]) -> anyhow::Result<Vec<ProjectSpec>> {
    let mut out: Vec<ProjectSpec> = Vec::new();
    for entry in projects {
        let (name, dir) = split_pair(entry, "project", "name", "directory")?;
        if out.iter().any(|p| p.name == name) {
            anyhow::bail!("project '{}' given more than once", name);
        }
        out.push(ProjectSpec::new(name, dir));
    }
    Ok(out)
}

fn split_pair(
    entry: &str,
    what: &str,
    left: &str,
    right: &str,
) -> anyhow::Result<(String, String)> {
    let mut parts = entry.splitn(2, '=');
    let key = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow::anyhow!("invalid {} '{}': missing {}", what, entry, left))?;
    let value = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow::anyhow!("invalid {} '{}': missing {}", what, entry, right))?;
    Ok((key.to_string(), value.to_string()))
}
