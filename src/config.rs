// Copyright 2026 Corpus Probe Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;

use crate::model::TableRef;

pub const PROJECT_ENV: &str = "PROBE_PROJECT_ID";
pub const FALLBACK_PROJECT_ID: &str = "local-project";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store_path: PathBuf,
    pub backend: Backend,
    pub project_id: Option<String>,
    pub dataset: String,
    pub table: String,
    pub scan: ScanConfig,
    pub scoring: ScoringConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("probe.db"),
            backend: Backend::Sqlite,
            project_id: None,
            dataset: "corpus_probe".to_string(),
            table: "test_documents".to_string(),
            scan: ScanConfig::default(),
            scoring: ScoringConfig::default(),
        }
    }
}

/// Limits applied while turning directory entries into records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub extensions: Vec<String>,
    pub max_file_bytes: u64,
    pub min_text_chars: usize,
    pub max_stored_chars: usize,
    pub code_prefix_chars: usize,
    pub relevance_divisor: f64,
    pub relevance_cap: f64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: [".txt", ".md", ".py", ".sql", ".json", ".ipynb"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_file_bytes: 1_000_000,
            min_text_chars: 10,
            max_stored_chars: 5000,
            code_prefix_chars: 200,
            relevance_divisor: 1000.0,
            relevance_cap: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub text_match_weight: f64,
    pub title_match_weight: f64,
    pub relevance_weight: f64,
    pub default_k: usize,
    pub demo_queries: Vec<String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            text_match_weight: 3.0,
            title_match_weight: 2.0,
            relevance_weight: 0.1,
            default_k: 3,
            demo_queries: ["bigquery", "competition", "python", "data", "smart document"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl Config {
    pub fn project_id(&self) -> &str {
        self.project_id
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(FALLBACK_PROJECT_ID)
    }

    pub fn table_ref(&self) -> TableRef {
        TableRef::new(self.project_id(), &self.dataset, &self.table)
    }

    fn apply_env(&mut self) {
        if let Ok(project) = std::env::var(PROJECT_ENV)
            && !project.trim().is_empty()
        {
            self.project_id = Some(project.trim().to_string());
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigCtx {
    pub root: PathBuf,
    pub config: Config,
}

impl ConfigCtx {
    pub fn load_from_cwd() -> Result<Self> {
        let cwd = std::env::current_dir().context("get current dir")?;
        Self::load_from(&cwd)
    }

    pub fn load_from(root: &Path) -> Result<Self> {
        let mut config = load_global_config()?;
        config.apply_env();
        Ok(Self {
            root: root.to_path_buf(),
            config,
        })
    }

    pub fn store_path(&self) -> PathBuf {
        if self.config.store_path.is_absolute() {
            self.config.store_path.clone()
        } else {
            self.root.join(&self.config.store_path)
        }
    }
}

fn config_dir() -> Option<PathBuf> {
    if cfg!(target_os = "windows") {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return Some(PathBuf::from(appdata));
        }
        if let Ok(profile) = std::env::var("USERPROFILE") {
            return Some(PathBuf::from(profile).join("AppData").join("Roaming"));
        }
        return None;
    }

    if cfg!(target_os = "macos") {
        let home = std::env::var("HOME").ok()?;
        return Some(
            PathBuf::from(home)
                .join("Library")
                .join("Application Support"),
        );
    }

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg));
    }
    let home = std::env::var("HOME").ok()?;
    Some(PathBuf::from(home).join(".config"))
}

pub fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("corpus-probe").join("probe.toml"))
}

pub fn load_global_config() -> Result<Config> {
    let Some(path) = global_config_path() else {
        return Ok(Config::default());
    };
    if !path.exists() {
        return Ok(Config::default());
    }
    read_config(&path)
}

pub fn read_config(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let mut config: Config = toml::from_str(&text).context("parse probe.toml")?;
    normalize(&mut config)?;
    Ok(config)
}

fn normalize(config: &mut Config) -> Result<()> {
    if config.scan.relevance_divisor <= 0.0 {
        anyhow::bail!(
            "scan.relevance_divisor must be positive, got {}",
            config.scan.relevance_divisor
        );
    }
    if config.dataset.is_empty() || config.table.is_empty() {
        anyhow::bail!("dataset and table names must not be empty");
    }
    config.scan.extensions = config
        .scan
        .extensions
        .iter()
        .map(|ext| ext.trim().to_lowercase())
        .filter(|ext| !ext.is_empty())
        .map(|ext| {
            if ext.starts_with('.') {
                ext
            } else {
                format!(".{ext}")
            }
        })
        .collect();
    Ok(())
}
