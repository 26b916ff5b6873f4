//! Per-section selection: level precedence, exact section quotas, and the
//! quota-exact walk that fills one section from its candidate sub-map.

use std::cmp::Reverse;
use std::collections::HashMap;

use crate::criteria::{LengthSpec, LevelWeight};
use crate::domain::{Difficulty, LevelFill, Question, Section};
use crate::error::AppError;

/// Order levels for quota filling: higher weight first, ties by declaration order.
pub fn prioritise_levels(levels: &[LevelWeight]) -> Vec<Difficulty> {
    let mut ordered = levels.to_vec();
    // sort_by_key is stable, so equal weights keep declaration order.
    ordered.sort_by_key(|l| Reverse(l.weight));
    ordered.into_iter().map(|l| l.level).collect()
}

/// Exact question quota per section, in declaration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SectionPlan {
    quotas: Vec<(String, usize)>,
}

impl SectionPlan {
    /// Quota for a section; sections absent from the plan get zero.
    pub fn quota(&self, section: &str) -> usize {
        self.quotas
            .iter()
            .find(|(name, _)| name == section)
            .map(|(_, q)| *q)
            .unwrap_or(0)
    }

    /// Declaration index, used to present sections in the order they were requested.
    pub fn position(&self, section: &str) -> Option<usize> {
        self.quotas.iter().position(|(name, _)| name == section)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.quotas.iter().map(|(name, q)| (name.as_str(), *q))
    }

    pub fn total(&self) -> usize {
        self.quotas.iter().map(|(_, q)| q).sum()
    }
}

/// Turn section lengths into integer quotas. Fixed counts are taken as-is;
/// shares split what is left of `total` by largest remainder, ties going to
/// the earlier-declared section, so every unit lands in exactly one section.
pub fn plan_section_counts(lengths: &[(String, LengthSpec)], total: Option<u32>) -> SectionPlan {
    let counted: u64 = lengths
        .iter()
        .filter_map(|(_, s)| match s {
            LengthSpec::Count(n) => Some(*n as u64),
            LengthSpec::Share(_) => None,
        })
        .sum();
    let remaining = (total.unwrap_or(0) as u64).saturating_sub(counted);
    let share_sum: f64 = lengths
        .iter()
        .filter_map(|(_, s)| match s {
            LengthSpec::Share(f) => Some(*f),
            LengthSpec::Count(_) => None,
        })
        .sum();

    let mut quotas: Vec<(String, usize)> = Vec::with_capacity(lengths.len());
    let mut fractions: Vec<(usize, f64)> = Vec::new();
    let mut assigned: u64 = 0;
    for (idx, (name, spec)) in lengths.iter().enumerate() {
        let q = match spec {
            LengthSpec::Count(n) => *n as usize,
            LengthSpec::Share(f) if share_sum > 0.0 => {
                let exact = remaining as f64 * f / share_sum;
                let base = exact.floor();
                fractions.push((idx, exact - base));
                assigned += base as u64;
                base as usize
            }
            LengthSpec::Share(_) => 0,
        };
        quotas.push((name.clone(), q));
    }

    let leftover = remaining.saturating_sub(assigned) as usize;
    if leftover > 0 && !fractions.is_empty() {
        // Stable sort: equal remainders keep declaration order.
        fractions.sort_by(|a, b| b.1.total_cmp(&a.1));
        for (idx, _) in fractions.iter().cycle().take(leftover) {
            quotas[*idx].1 += 1;
        }
    }

    SectionPlan { quotas }
}

/// Everything one selector task owns.
#[derive(Debug)]
pub struct SectionJob {
    pub name: String,
    pub candidates: HashMap<Difficulty, Vec<Question>>,
    pub quota: usize,
    pub set_count: usize,
}

/// Fill one section with exactly `quota` questions, walking `order` and taking
/// candidates in their natural order. Unpicked candidates of each used level are
/// kept (up to what the other sets could need) as the assembler's reserve.
pub fn select_section(job: SectionJob, order: &[Difficulty]) -> Result<Section, AppError> {
    let SectionJob { name, mut candidates, quota, set_count } = job;
    let mut remaining = quota;
    // Sized by supply; a larger quota ends as a shortage below.
    let supply: usize = candidates.values().map(Vec::len).sum();
    let mut questions = Vec::with_capacity(quota.min(supply));
    let mut filled = Vec::new();
    let mut reserve = HashMap::new();

    for &level in order {
        if remaining == 0 {
            break;
        }
        let mut pool = candidates.remove(&level).unwrap_or_default();
        let take = remaining.min(pool.len());
        if take == 0 {
            continue;
        }
        let rest = pool.split_off(take);
        questions.extend(pool);
        filled.push(LevelFill { level, count: take });
        remaining -= take;

        let keep = take.saturating_mul(set_count.saturating_sub(1));
        let spare: Vec<Question> = rest.into_iter().take(keep).collect();
        if !spare.is_empty() {
            reserve.insert(level, spare);
        }
    }

    if remaining > 0 {
        return Err(AppError::DataShortage {
            section: name,
            requested: quota,
            available: quota - remaining,
        });
    }

    Ok(Section { name, questions, filled, reserve })
}
