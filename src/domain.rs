//! Domain models: questions and difficulty levels, selection criteria, generated
//! sections/papers, and the persisted template and test-paper records.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Graded classification of a question.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Difficulty {
  Easy,
  Medium,
  Hard,
}

impl Difficulty {
  /// Canonical declaration order, used when a criteria names no levels.
  pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

  /// Resolve a symbolic level ("E", "easy", "MED", "Hard", ...) to its canonical form.
  pub fn parse(s: &str) -> Option<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "e" | "easy" | "simple" | "low" => Some(Difficulty::Easy),
      "m" | "med" | "medium" | "moderate" => Some(Difficulty::Medium),
      "h" | "hard" | "difficult" | "high" => Some(Difficulty::Hard),
      _ => None,
    }
  }
}

impl fmt::Display for Difficulty {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Difficulty::Easy => "Easy",
      Difficulty::Medium => "Medium",
      Difficulty::Hard => "Hard",
    };
    f.write_str(s)
  }
}

/// One entry of the question bank.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
  #[serde(default)] pub ques_id: Uuid,
  pub group_code: String,
  pub subject: String,
  pub standard: String,
  pub section: String, // e.g. "MCQ", "Essay"
  pub difficulty: Difficulty,
  pub title: String,
  #[serde(default)] pub topic: String,
}

/// Requested difficulty level with its weight. Higher weights are filled first.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DifficultyWeight {
  pub level: String,
  #[serde(default = "default_weight")]
  pub weight: u32,
}

fn default_weight() -> u32 { 1 }
fn default_set_count() -> usize { 1 }

/// Requested length of one section: either an absolute `count` or a `share`
/// of `totalQuestions`. Exactly one of the two is expected.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SectionLength {
  pub section: String,
  #[serde(default, skip_serializing_if = "Option::is_none")] pub count: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")] pub share: Option<f64>,
}

/// Raw selection criteria as received from the caller.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionCriteria {
  pub group_code: String,
  pub subject: String,
  pub standard: String,
  #[serde(default)] pub difficulty: Vec<DifficultyWeight>,
  #[serde(default)] pub length: Vec<SectionLength>,
  #[serde(default, skip_serializing_if = "Option::is_none")] pub total_questions: Option<u32>,
  #[serde(default = "default_set_count")] pub set_count: usize,
}

/// Section name -> difficulty level -> candidates, in store order.
pub type CandidatePool = HashMap<String, HashMap<Difficulty, Vec<Question>>>;

/// How many questions of one level ended up in a section.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LevelFill {
  pub level: Difficulty,
  pub count: usize,
}

/// A filled section. `questions` is grouped by level in priority order, matching `filled`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Section {
  pub name: String,
  pub questions: Vec<Question>,
  pub filled: Vec<LevelFill>,
  /// Unpicked candidates per level, available to the assembler for set variation.
  #[serde(skip)]
  pub reserve: HashMap<Difficulty, Vec<Question>>,
}

/// One complete paper variant ("set").
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPaper {
  pub set_index: usize,
  pub sections: Vec<Section>,
}

/// Reusable criteria record a paper was generated from.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
  #[serde(default)] pub template_id: Uuid,
  pub group_code: String,
  #[serde(default)] pub owner_id: Uuid,
  #[serde(default)] pub name: String,
  pub criteria: QuestionCriteria,
  #[serde(default)] pub criteria_hash: String,
  #[serde(default)] pub create_date: Option<DateTime<Utc>>,
  #[serde(default)] pub last_modified_date: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestStatus {
  Draft,
  Release,
}

/// Persisted test paper holding the generated sets.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestPaper {
  #[serde(default)] pub test_id: Uuid,
  pub group_code: String,
  #[serde(default)] pub owner_id: Uuid,
  #[serde(default)] pub template_id: Uuid,
  #[serde(default)] pub name: String,
  #[serde(default)] pub papers: Vec<QuestionPaper>,
  // Assigned at save time only.
  #[serde(default)] pub status: Option<TestStatus>,
  #[serde(default)] pub create_date: Option<DateTime<Utc>>,
  #[serde(default)] pub last_modified_date: Option<DateTime<Utc>>,
}
