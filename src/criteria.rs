//! Criteria normalization: validate the raw request and derive the native
//! forms (canonical difficulty levels, typed section lengths) the pipeline uses.
//! Pure; never touches storage.

use std::collections::HashSet;

use tracing::{debug, instrument};

use crate::config::GenerationCfg;
use crate::domain::{Difficulty, QuestionCriteria};
use crate::error::AppError;
use crate::util::is_well_formed_code;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LengthSpec {
  Count(u32),
  Share(f64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelWeight {
  pub level: Difficulty,
  pub weight: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedCriteria {
  pub group_code: String,
  pub subject: String,
  pub standard: String,
  /// Requested levels in declaration order.
  pub levels: Vec<LevelWeight>,
  /// Requested sections in declaration order.
  pub lengths: Vec<(String, LengthSpec)>,
  pub total_questions: Option<u32>,
  pub set_count: usize,
}

impl NormalizedCriteria {
  pub fn section_names(&self) -> impl Iterator<Item = &str> {
    self.lengths.iter().map(|(name, _)| name.as_str())
  }

  pub fn wants_level(&self, level: Difficulty) -> bool {
    self.levels.iter().any(|l| l.level == level)
  }
}

fn bad(reason: impl Into<String>) -> AppError {
  AppError::InvalidRequest(reason.into())
}

#[instrument(level = "debug", skip(raw, limits), fields(group_code = %raw.group_code, set_count = raw.set_count))]
pub fn normalize(raw: &QuestionCriteria, limits: &GenerationCfg) -> Result<NormalizedCriteria, AppError> {
  let max_sets = limits.max_sets;
  let max_questions = limits.max_questions as u64;
  for (field, value) in [("groupCode", &raw.group_code), ("subject", &raw.subject), ("standard", &raw.standard)] {
    if !is_well_formed_code(value) {
      return Err(bad(format!("{field} is missing or malformed")));
    }
  }

  if raw.set_count == 0 || raw.set_count > max_sets {
    return Err(bad(format!("setCount must be between 1 and {max_sets}")));
  }

  let levels = if raw.difficulty.is_empty() {
    Difficulty::ALL.iter().map(|&level| LevelWeight { level, weight: 1 }).collect()
  } else {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(raw.difficulty.len());
    for dw in &raw.difficulty {
      let level = Difficulty::parse(&dw.level).ok_or_else(|| bad(format!("unknown difficulty '{}'", dw.level)))?;
      if !seen.insert(level) {
        return Err(bad(format!("difficulty '{}' listed twice", level)));
      }
      out.push(LevelWeight { level, weight: dw.weight });
    }
    out
  };

  if raw.length.is_empty() {
    return Err(bad("at least one section length is required"));
  }
  // Section names compare case-insensitively, like subject and standard.
  let mut names = HashSet::new();
  let mut lengths = Vec::with_capacity(raw.length.len());
  for sl in &raw.length {
    let name = sl.section.trim();
    if name.is_empty() {
      return Err(bad("section name is empty"));
    }
    if !names.insert(name.to_ascii_lowercase()) {
      return Err(bad(format!("section '{name}' listed twice")));
    }
    let spec = match (sl.count, sl.share) {
      (Some(n), None) if n as u64 <= max_questions => LengthSpec::Count(n),
      (Some(_), None) => return Err(bad(format!("section '{name}' count exceeds {max_questions}"))),
      (None, Some(f)) if f.is_finite() && f > 0.0 => LengthSpec::Share(f),
      (None, Some(_)) => return Err(bad(format!("section '{name}' share must be positive"))),
      _ => return Err(bad(format!("section '{name}' needs exactly one of count or share"))),
    };
    lengths.push((name.to_string(), spec));
  }

  let counted: u64 = lengths
    .iter()
    .filter_map(|(_, s)| match s { LengthSpec::Count(n) => Some(*n as u64), _ => None })
    .sum();
  let has_shares = lengths.iter().any(|(_, s)| matches!(s, LengthSpec::Share(_)));
  match (has_shares, raw.total_questions) {
    (true, None) => return Err(bad("totalQuestions is required when shares are used")),
    (true, Some(total)) if (total as u64) < counted => {
      return Err(bad("totalQuestions is smaller than the fixed section counts"))
    }
    (false, Some(total)) if total as u64 != counted => {
      return Err(bad("totalQuestions does not match the section counts"))
    }
    _ => {}
  }
  let planned = if has_shares { raw.total_questions.map_or(0, u64::from) } else { counted };
  if planned > max_questions {
    return Err(bad(format!("a paper may hold at most {max_questions} questions")));
  }

  let normalized = NormalizedCriteria {
    group_code: raw.group_code.trim().to_string(),
    subject: raw.subject.trim().to_string(),
    standard: raw.standard.trim().to_string(),
    levels,
    lengths,
    total_questions: raw.total_questions,
    set_count: raw.set_count,
  };
  debug!(target: "paper", levels = normalized.levels.len(), sections = normalized.lengths.len(), "Criteria normalized");
  Ok(normalized)
}
