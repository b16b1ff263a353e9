//! Clap-free settings for the fix pipeline.

use camino::Utf8PathBuf;
use codefix_domain::{FallbackPolicy, InvocationLock};
use std::collections::BTreeMap;

/// One project to load from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSpec {
    pub name: String,
    pub root: Utf8PathBuf,
    /// Glob patterns relative to `root`.
    pub include: Vec<String>,
}

impl ProjectSpec {
    pub const DEFAULT_INCLUDE: &'static str = "**/*";

    pub fn new(name: impl Into<String>, root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            include: vec![Self::DEFAULT_INCLUDE.to_string()],
        }
    }

    pub fn with_include(mut self, include: Vec<String>) -> Self {
        if !include.is_empty() {
            self.include = include;
        }
        self
    }
}

/// Settings for `run_fix`.
#[derive(Debug, Clone)]
pub struct FixSettings {
    pub projects: Vec<ProjectSpec>,
    /// Diagnostics file fed to the JSON analysis source.
    pub diagnostics: Option<Utf8PathBuf>,
    pub out_dir: Utf8PathBuf,

    pub max_passes: u32,
    pub policy: FallbackPolicy,
    /// Host options handed to providers.
    pub params: BTreeMap<String, String>,
    pub lock: InvocationLock,

    /// Write changed units back to their files.
    pub apply: bool,
}

impl FixSettings {
    pub const DEFAULT_MAX_PASSES: u32 = 3;
}

impl Default for FixSettings {
    fn default() -> Self {
        Self {
            projects: Vec::new(),
            diagnostics: None,
            out_dir: Utf8PathBuf::from("artifacts/codefix"),
            max_passes: Self::DEFAULT_MAX_PASSES,
            policy: FallbackPolicy::default(),
            params: BTreeMap::new(),
            lock: InvocationLock::none(),
            apply: false,
        }
    }
}
