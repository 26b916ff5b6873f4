//! Paper assembly: turn the filled sections into one paper variant per set.
//!
//! Set 0 presents the selector's picks as-is. Every further set rotates a
//! window over each level's picks plus its reserve, so sets differ whenever the
//! pool is wider than the quota, and per-level counts never change.

use std::collections::HashMap;

use rand::seq::SliceRandom;

use crate::domain::{Difficulty, LevelFill, Question, QuestionPaper, Section};

pub fn assemble_paper(sections: &[Section], set_index: usize, order: &[Difficulty], shuffle: bool) -> QuestionPaper {
  let sections = sections
    .iter()
    .map(|s| assemble_section(s, set_index, order, shuffle))
    .collect();
  QuestionPaper { set_index, sections }
}

fn assemble_section(section: &Section, set_index: usize, order: &[Difficulty], shuffle: bool) -> Section {
  // Split the picks back into their level groups.
  let mut picked: HashMap<Difficulty, &[Question]> = HashMap::new();
  let mut offset = 0;
  for fill in &section.filled {
    let end = (offset + fill.count).min(section.questions.len());
    picked.insert(fill.level, &section.questions[offset..end]);
    offset = end;
  }

  let mut questions = Vec::with_capacity(section.questions.len());
  let mut filled = Vec::with_capacity(section.filled.len());
  for level in order {
    let Some(chosen) = picked.get(level) else { continue };
    let count = chosen.len();
    if count == 0 {
      continue;
    }
    let pool: Vec<&Question> = chosen
      .iter()
      .chain(section.reserve.get(level).into_iter().flatten())
      .collect();
    let width = pool.len();
    let start = (set_index * count) % width;
    let mut group: Vec<Question> = (0..count).map(|k| pool[(start + k) % width].clone()).collect();
    if shuffle && set_index > 0 {
      group.shuffle(&mut rand::thread_rng());
    }
    questions.extend(group);
    filled.push(LevelFill { level: *level, count });
  }

  Section {
    name: section.name.clone(),
    questions,
    filled,
    reserve: HashMap::new(),
  }
}
