//! Loading service configuration (limits, store deadlines, tenants and an
//! optional question bank) from TOML.
//!
//! See `AppConfig` for the expected schema. Every field has a default, so an
//! absent or partial file still yields a usable configuration.

use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::domain::{Difficulty, Question};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub server: ServerCfg,
  #[serde(default)]
  pub generation: GenerationCfg,
  #[serde(default)]
  pub storage: StorageCfg,
  /// Tenant codes that resolve to a store handle.
  #[serde(default)]
  pub groups: Vec<String>,
  #[serde(default)]
  pub questions: Vec<QuestionCfg>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ServerCfg {
  #[serde(default = "default_port")] pub port: u16,
}

impl Default for ServerCfg {
  fn default() -> Self { Self { port: default_port() } }
}

#[derive(Clone, Debug, Deserialize)]
pub struct GenerationCfg {
  #[serde(default = "default_max_sets")] pub max_sets: usize,
  /// Upper bound on the questions one paper may request across all sections.
  #[serde(default = "default_max_questions")] pub max_questions: u32,
  /// Shuffle question order inside every set but the first.
  #[serde(default = "default_true")] pub shuffle_sets: bool,
}

impl Default for GenerationCfg {
  fn default() -> Self { Self { max_sets: default_max_sets(), max_questions: default_max_questions(), shuffle_sets: true } }
}

#[derive(Clone, Debug, Deserialize)]
pub struct StorageCfg {
  /// Deadline applied to every repository call.
  #[serde(default = "default_call_timeout_ms")] pub call_timeout_ms: u64,
}

impl Default for StorageCfg {
  fn default() -> Self { Self { call_timeout_ms: default_call_timeout_ms() } }
}

/// Question-bank entry accepted in TOML configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct QuestionCfg {
  pub group_code: String,
  pub subject: String,
  pub standard: String,
  pub section: String,
  pub difficulty: String,
  pub title: String,
  #[serde(default)] pub topic: Option<String>,
}

fn default_port() -> u16 { 3000 }
fn default_max_sets() -> usize { 100 }
fn default_max_questions() -> u32 { 500 }
fn default_true() -> bool { true }
fn default_call_timeout_ms() -> u64 { 5000 }

impl AppConfig {
  /// Port from env `PORT` when it parses, else the configured one.
  pub fn port(&self) -> u16 {
    std::env::var("PORT").ok().and_then(|p| p.parse::<u16>().ok()).unwrap_or(self.server.port)
  }

  pub fn call_timeout(&self) -> std::time::Duration {
    std::time::Duration::from_millis(self.storage.call_timeout_ms)
  }

  /// Convert configured bank entries into questions, skipping entries whose
  /// difficulty cannot be resolved.
  pub fn bank_questions(&self) -> Vec<Question> {
    let mut out = Vec::with_capacity(self.questions.len());
    for qc in &self.questions {
      let Some(difficulty) = Difficulty::parse(&qc.difficulty) else {
        error!(target: "intelliq_backend", title = %qc.title, difficulty = %qc.difficulty, "Skipping bank item: unknown difficulty.");
        continue;
      };
      out.push(Question {
        ques_id: Uuid::new_v4(),
        group_code: qc.group_code.clone(),
        subject: qc.subject.clone(),
        standard: qc.standard.clone(),
        section: qc.section.clone(),
        difficulty,
        title: qc.title.clone(),
        topic: qc.topic.clone().unwrap_or_default(),
      });
    }
    out
  }
}

/// Attempt to load `AppConfig` from APP_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_app_config_from_env() -> Option<AppConfig> {
  let path = std::env::var("APP_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AppConfig>(&s) {
      Ok(cfg) => {
        info!(target: "intelliq_backend", %path, groups = cfg.groups.len(), questions = cfg.questions.len(), "Loaded app config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "intelliq_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "intelliq_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
