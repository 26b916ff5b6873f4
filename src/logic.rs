//! Core behaviors behind the HTTP handlers.
//!
//! This includes:
//!   - Paper generation: normalize criteria, pull the candidate pool, select each
//!     section on its own task, then assemble each set on its own task
//!   - Saving a template and a test paper concurrently, one status line each
//!   - Read-only fetches of drafts and templates
//!
//! Every fan-out dispatches N tasks and receives exactly N results. Each task
//! runs its work under `supervise`, so a panic still produces a result.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::assembler::assemble_paper;
use crate::criteria::normalize;
use crate::domain::{CandidatePool, Difficulty, QuestionCriteria, QuestionPaper, Section, Template, TestPaper, TestStatus};
use crate::error::AppError;
use crate::messages::{MSG_REQUEST_FAILED, MSG_SAVE_SUCCESS};
use crate::protocol::AppResponse;
use crate::repo::with_deadline;
use crate::selection::{plan_section_counts, prioritise_levels, select_section, SectionJob, SectionPlan};
use crate::state::AppState;
use crate::util::{content_hash, is_primary_id_valid, parse_record_id, trunc_for_log};

// -------- Generation --------

#[instrument(level = "info", skip(state, criteria), fields(group_code = %criteria.group_code, set_count = criteria.set_count))]
pub async fn generate_question_paper(state: &AppState, criteria: &QuestionCriteria) -> AppResponse<Vec<QuestionPaper>> {
  let result = run_generation(state, criteria).await;
  match &result {
    Ok(papers) => info!(target: "paper", sets = papers.len(), "Question papers generated"),
    Err(e) => warn!(target: "paper", error = %e, "Question paper generation failed"),
  }
  AppResponse::from_result(result)
}

async fn run_generation(state: &AppState, raw: &QuestionCriteria) -> Result<Vec<QuestionPaper>, AppError> {
  let criteria = normalize(raw, &state.config.generation)?;
  let repo = state.repos.questions(&criteria.group_code).ok_or(AppError::Unauthorized)?;

  let db_start = Instant::now();
  let pool = with_deadline(state.config.call_timeout(), repo.filter_questions_for_paper(&criteria))
    .await
    .map_err(|e| {
      error!(target: "paper", group_code = %criteria.group_code, error = %e, "Question filter failed");
      AppError::DataAccess(e)
    })?;
  if pool.values().all(|levels| levels.values().all(Vec::is_empty)) {
    return Err(AppError::NoRecord);
  }
  info!(target: "paper", db_ms = db_start.elapsed().as_millis() as u64, sections = pool.len(), "Candidate pool fetched");

  let algo_start = Instant::now();
  // Shared read-only by every task of both phases.
  let order: Arc<[Difficulty]> = prioritise_levels(&criteria.levels).into();
  let plan = plan_section_counts(&criteria.lengths, criteria.total_questions);
  debug!(target: "paper", planned = plan.total(), levels = order.len(), "Section quotas planned");

  for (section, quota) in plan.iter() {
    if quota > 0 && !pool.contains_key(section) {
      return Err(AppError::DataShortage { section: section.to_string(), requested: quota, available: 0 });
    }
  }

  let sections = select_sections(pool, &plan, order.clone(), criteria.set_count).await?;
  let papers = assemble_sets(Arc::new(sections), order, criteria.set_count, state.config.generation.shuffle_sets).await?;
  info!(target: "paper", algo_ms = algo_start.elapsed().as_millis() as u64, "Selection and assembly done");
  Ok(papers)
}

/// Phase 1: one selector task per section in the pool.
async fn select_sections(
  pool: CandidatePool,
  plan: &SectionPlan,
  order: Arc<[Difficulty]>,
  set_count: usize,
) -> Result<Vec<Section>, AppError> {
  let dispatched = pool.len();
  let (tx, mut rx) = mpsc::channel::<(String, Result<Section, AppError>)>(dispatched.max(1));

  for (name, candidates) in pool {
    let tx = tx.clone();
    let order = order.clone();
    let job = SectionJob { quota: plan.quota(&name), name, candidates, set_count };
    tokio::spawn(async move {
      let name = job.name.clone();
      let outcome = supervise(|| select_section(job, &order));
      // The parent holds the receiver until every dispatched task has reported.
      let _ = tx.send((name, outcome)).await;
    });
  }
  drop(tx);

  let mut sections = Vec::with_capacity(dispatched);
  let mut failure = None;
  for _ in 0..dispatched {
    match rx.recv().await {
      Some((name, Ok(section))) => {
        debug!(target: "paper", section = %name, quota = section.questions.len(), "Section filled");
        // Sections outside the plan have a zero quota and are left out.
        if plan.quota(&name) > 0 {
          sections.push(section);
        }
      }
      Some((name, Err(e))) => {
        warn!(target: "paper", section = %name, error = %e, "Section selection failed");
        failure.get_or_insert(e);
      }
      None => {
        failure.get_or_insert(AppError::InternalFault("section task ended without reporting".into()));
        break;
      }
    }
  }
  if let Some(e) = failure {
    return Err(e);
  }

  sections.sort_by_key(|s| plan.position(&s.name).unwrap_or(usize::MAX));
  Ok(sections)
}

/// Phase 2: one assembler task per requested set.
async fn assemble_sets(
  sections: Arc<Vec<Section>>,
  order: Arc<[Difficulty]>,
  set_count: usize,
  shuffle: bool,
) -> Result<Vec<QuestionPaper>, AppError> {
  let (tx, mut rx) = mpsc::channel::<(usize, Result<QuestionPaper, AppError>)>(set_count.max(1));

  for set_index in 0..set_count {
    let tx = tx.clone();
    let sections = sections.clone();
    let order = order.clone();
    tokio::spawn(async move {
      let outcome = supervise(|| Ok(assemble_paper(&sections, set_index, &order, shuffle)));
      let _ = tx.send((set_index, outcome)).await;
    });
  }
  drop(tx);

  let mut papers = Vec::with_capacity(set_count);
  let mut failure = None;
  for _ in 0..set_count {
    match rx.recv().await {
      Some((_, Ok(paper))) => papers.push(paper),
      Some((set_index, Err(e))) => {
        warn!(target: "paper", set_index, error = %e, "Set assembly failed");
        failure.get_or_insert(e);
      }
      None => {
        failure.get_or_insert(AppError::InternalFault("set task ended without reporting".into()));
        break;
      }
    }
  }
  if let Some(e) = failure {
    return Err(e);
  }

  papers.sort_by_key(|p| p.set_index);
  Ok(papers)
}

/// Run synchronous task work, turning a panic into `InternalFault`.
fn supervise<T>(work: impl FnOnce() -> Result<T, AppError>) -> Result<T, AppError> {
  match catch_unwind(AssertUnwindSafe(work)) {
    Ok(result) => result,
    Err(payload) => {
      let reason = panic_reason(payload.as_ref());
      error!(target: "paper", %reason, "Task panicked");
      Err(AppError::InternalFault(reason))
    }
  }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    s.to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "unknown panic".to_string()
  }
}

// -------- Persistence --------

/// Save both records concurrently. Returns "template status\npaper status"
/// once both branches are done; an absent record gives an empty line.
#[instrument(level = "info", skip(state, template, test_paper), fields(has_template = template.is_some(), has_paper = test_paper.is_some()))]
pub async fn save_test_details(
  state: &AppState,
  template: Option<Template>,
  test_paper: Option<TestPaper>,
  save_as_draft: bool,
) -> AppResponse<String> {
  let template_branch = tokio::spawn(save_template(state.clone(), template));
  let paper_branch = tokio::spawn(save_test_paper(state.clone(), test_paper, save_as_draft));
  let (template_msg, paper_msg) = tokio::join!(template_branch, paper_branch);

  let template_msg = branch_message("template", template_msg);
  let paper_msg = branch_message("test_paper", paper_msg);
  AppResponse::success(format!("{}\n{}", template_msg, paper_msg))
}

fn branch_message(branch: &'static str, joined: Result<String, JoinError>) -> String {
  match joined {
    Ok(msg) => msg,
    Err(e) => {
      error!(target: "paper", branch, panicked = e.is_panic(), "Save branch aborted");
      MSG_REQUEST_FAILED.to_string()
    }
  }
}

async fn save_template(state: AppState, template: Option<Template>) -> String {
  let Some(mut template) = template else { return String::new() };
  match persist_template(&state, &mut template).await {
    Ok(()) => {
      info!(target: "paper", template_id = %template.template_id, "Template saved");
      MSG_SAVE_SUCCESS.to_string()
    }
    Err(e) => {
      warn!(target: "paper", group_code = %template.group_code, name = %trunc_for_log(&template.name, 40), error = %e, "Template save failed");
      e.user_message()
    }
  }
}

async fn persist_template(state: &AppState, template: &mut Template) -> Result<(), AppError> {
  template.criteria_hash = content_hash(&template.criteria);
  if template.criteria_hash.is_empty() {
    return Err(AppError::CorruptData);
  }
  let now = Utc::now();
  template.last_modified_date = Some(now);

  let repo = state.repos.templates(&template.group_code).ok_or(AppError::Unauthorized)?;
  let deadline = state.config.call_timeout();
  if is_primary_id_valid(&template.template_id) {
    with_deadline(deadline, repo.update(template)).await?;
  } else {
    template.template_id = Uuid::new_v4();
    template.create_date = Some(now);
    with_deadline(deadline, repo.save(template)).await?;
  }
  Ok(())
}

async fn save_test_paper(state: AppState, test_paper: Option<TestPaper>, save_as_draft: bool) -> String {
  let Some(mut paper) = test_paper else { return String::new() };
  match persist_test_paper(&state, &mut paper, save_as_draft).await {
    Ok(()) => {
      info!(target: "paper", test_id = %paper.test_id, status = ?paper.status, "Test paper saved");
      MSG_SAVE_SUCCESS.to_string()
    }
    Err(e) => {
      warn!(target: "paper", group_code = %paper.group_code, error = %e, "Test paper save failed");
      e.user_message()
    }
  }
}

async fn persist_test_paper(state: &AppState, paper: &mut TestPaper, save_as_draft: bool) -> Result<(), AppError> {
  let now = Utc::now();
  paper.last_modified_date = Some(now);
  paper.status = Some(if save_as_draft { TestStatus::Draft } else { TestStatus::Release });

  let repo = state.repos.test_papers(&paper.group_code).ok_or(AppError::Unauthorized)?;
  let deadline = state.config.call_timeout();
  if is_primary_id_valid(&paper.test_id) {
    with_deadline(deadline, repo.update(paper)).await?;
  } else {
    paper.test_id = Uuid::new_v4();
    paper.create_date = Some(now);
    with_deadline(deadline, repo.save(paper)).await?;
  }
  Ok(())
}

// -------- Fetches --------

#[instrument(level = "info", skip(state))]
pub async fn fetch_all_drafts(state: &AppState, group_code: &str, teacher_id: &str) -> AppResponse<Vec<TestPaper>> {
  AppResponse::from_result(find_drafts(state, group_code, teacher_id).await)
}

async fn find_drafts(state: &AppState, group_code: &str, teacher_id: &str) -> Result<Vec<TestPaper>, AppError> {
  let owner = parse_record_id(teacher_id).ok_or(AppError::InvalidId)?;
  let repo = state.repos.test_papers(group_code).ok_or(AppError::Unauthorized)?;
  let papers = with_deadline(state.config.call_timeout(), repo.find_all(owner)).await?;
  Ok(papers.into_iter().filter(|p| p.status == Some(TestStatus::Draft)).collect())
}

#[instrument(level = "info", skip(state))]
pub async fn fetch_single_paper(state: &AppState, group_code: &str, test_id: &str) -> AppResponse<TestPaper> {
  AppResponse::from_result(find_paper(state, group_code, test_id).await)
}

async fn find_paper(state: &AppState, group_code: &str, test_id: &str) -> Result<TestPaper, AppError> {
  let id = parse_record_id(test_id).ok_or(AppError::InvalidId)?;
  let repo = state.repos.test_papers(group_code).ok_or(AppError::Unauthorized)?;
  Ok(with_deadline(state.config.call_timeout(), repo.find_one(id)).await?)
}

#[instrument(level = "info", skip(state))]
pub async fn fetch_all_templates(state: &AppState, group_code: &str, teacher_id: &str) -> AppResponse<Vec<Template>> {
  AppResponse::from_result(find_templates(state, group_code, teacher_id).await)
}

async fn find_templates(state: &AppState, group_code: &str, teacher_id: &str) -> Result<Vec<Template>, AppError> {
  let owner = parse_record_id(teacher_id).ok_or(AppError::InvalidId)?;
  let repo = state.repos.templates(group_code).ok_or(AppError::Unauthorized)?;
  Ok(with_deadline(state.config.call_timeout(), repo.find_all(owner)).await?)
}

#[instrument(level = "info", skip(state))]
pub async fn fetch_single_template(state: &AppState, group_code: &str, template_id: &str) -> AppResponse<Template> {
  AppResponse::from_result(find_template(state, group_code, template_id).await)
}

async fn find_template(state: &AppState, group_code: &str, template_id: &str) -> Result<Template, AppError> {
  let id = parse_record_id(template_id).ok_or(AppError::InvalidId)?;
  let repo = state.repos.templates(group_code).ok_or(AppError::Unauthorized)?;
  Ok(with_deadline(state.config.call_timeout(), repo.find_one(id)).await?)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;
  use std::time::Duration;

  use async_trait::async_trait;

  use crate::config::AppConfig;
  use crate::criteria::{LengthSpec, NormalizedCriteria};
  use crate::domain::{DifficultyWeight, Question, SectionLength};
  use crate::error::StoreError;
  use crate::messages::*;
  use crate::protocol::ResponseStatus;
  use crate::repo::{
    InMemoryRepositories, QuestionRepository, RepositoryProvider, TemplateRepository, TestPaperRepository,
  };

  const GROUP: &str = "SCH01";

  fn bank() -> Vec<Question> {
    let mut out = Vec::new();
    for level in Difficulty::ALL {
      for i in 0..12 {
        out.push(question("MCQ", level, i));
      }
    }
    for i in 0..3 {
      out.push(question("Essay", Difficulty::Medium, i));
    }
    out
  }

  fn question(section: &str, level: Difficulty, i: usize) -> Question {
    Question {
      ques_id: Uuid::nil(),
      group_code: GROUP.into(),
      subject: "Math".into(),
      standard: "8".into(),
      section: section.into(),
      difficulty: level,
      title: format!("{section} {level} #{i}"),
      topic: String::new(),
    }
  }

  fn config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.storage.call_timeout_ms = 200;
    cfg
  }

  fn in_memory() -> InMemoryRepositories {
    InMemoryRepositories::new(&[GROUP.to_string()], bank())
  }

  fn state_with(repos: impl RepositoryProvider + 'static) -> AppState {
    AppState::with_repositories(config(), Arc::new(repos))
  }

  fn criteria(sections: &[(&str, u32)], set_count: usize) -> QuestionCriteria {
    QuestionCriteria {
      group_code: GROUP.into(),
      subject: "Math".into(),
      standard: "8".into(),
      difficulty: vec![
        DifficultyWeight { level: "Easy".into(), weight: 3 },
        DifficultyWeight { level: "Medium".into(), weight: 2 },
        DifficultyWeight { level: "Hard".into(), weight: 1 },
      ],
      length: sections
        .iter()
        .map(|(s, n)| SectionLength { section: s.to_string(), count: Some(*n), share: None })
        .collect(),
      total_questions: None,
      set_count,
    }
  }

  /// Provider that wraps the in-memory one and swaps in failing stores.
  #[derive(Default)]
  struct Rigged {
    inner: InMemoryRepositories,
    questions: Option<Arc<dyn QuestionRepository>>,
    templates: Option<Arc<dyn TemplateRepository>>,
    test_papers: Option<Arc<dyn TestPaperRepository>>,
  }

  impl RepositoryProvider for Rigged {
    fn questions(&self, g: &str) -> Option<Arc<dyn QuestionRepository>> {
      self.inner.questions(g).map(|real| self.questions.clone().unwrap_or(real))
    }
    fn templates(&self, g: &str) -> Option<Arc<dyn TemplateRepository>> {
      self.inner.templates(g).map(|real| self.templates.clone().unwrap_or(real))
    }
    fn test_papers(&self, g: &str) -> Option<Arc<dyn TestPaperRepository>> {
      self.inner.test_papers(g).map(|real| self.test_papers.clone().unwrap_or(real))
    }
  }

  struct FixedPool(CandidatePool);

  #[async_trait]
  impl QuestionRepository for FixedPool {
    async fn filter_questions_for_paper(&self, _c: &NormalizedCriteria) -> Result<CandidatePool, StoreError> {
      Ok(self.0.clone())
    }
  }

  struct Broken(StoreError);

  #[async_trait]
  impl QuestionRepository for Broken {
    async fn filter_questions_for_paper(&self, _c: &NormalizedCriteria) -> Result<CandidatePool, StoreError> {
      Err(self.0.clone())
    }
  }

  #[async_trait]
  impl TemplateRepository for Broken {
    async fn save(&self, _t: &Template) -> Result<(), StoreError> { Err(self.0.clone()) }
    async fn update(&self, _t: &Template) -> Result<(), StoreError> { Err(self.0.clone()) }
    async fn find_all(&self, _o: Uuid) -> Result<Vec<Template>, StoreError> { Err(self.0.clone()) }
    async fn find_one(&self, _i: Uuid) -> Result<Template, StoreError> { Err(self.0.clone()) }
  }

  struct Panicking;

  #[async_trait]
  impl TestPaperRepository for Panicking {
    async fn save(&self, _p: &TestPaper) -> Result<(), StoreError> { panic!("paper store exploded") }
    async fn update(&self, _p: &TestPaper) -> Result<(), StoreError> { panic!("paper store exploded") }
    async fn find_all(&self, _o: Uuid) -> Result<Vec<TestPaper>, StoreError> { Ok(vec![]) }
    async fn find_one(&self, _i: Uuid) -> Result<TestPaper, StoreError> { Err(StoreError::NotFound) }
  }

  struct Stalled;

  #[async_trait]
  impl TestPaperRepository for Stalled {
    async fn save(&self, _p: &TestPaper) -> Result<(), StoreError> {
      tokio::time::sleep(Duration::from_secs(30)).await;
      Ok(())
    }
    async fn update(&self, p: &TestPaper) -> Result<(), StoreError> { self.save(p).await }
    async fn find_all(&self, _o: Uuid) -> Result<Vec<TestPaper>, StoreError> { Ok(vec![]) }
    async fn find_one(&self, _i: Uuid) -> Result<TestPaper, StoreError> { Err(StoreError::NotFound) }
  }

  fn template(owner: Uuid) -> Template {
    Template {
      template_id: Uuid::nil(),
      group_code: GROUP.into(),
      owner_id: owner,
      name: "Mid-term".into(),
      criteria: criteria(&[("MCQ", 10)], 1),
      criteria_hash: String::new(),
      create_date: None,
      last_modified_date: None,
    }
  }

  fn test_paper(owner: Uuid) -> TestPaper {
    TestPaper {
      test_id: Uuid::nil(),
      group_code: GROUP.into(),
      owner_id: owner,
      template_id: Uuid::nil(),
      name: "Mid-term A".into(),
      papers: vec![],
      status: None,
      create_date: None,
      last_modified_date: None,
    }
  }

  fn section_len(paper: &QuestionPaper, name: &str) -> usize {
    paper.sections.iter().find(|s| s.name == name).map(|s| s.questions.len()).unwrap_or(0)
  }

  #[tokio::test]
  async fn two_sets_of_mcq_and_essay() {
    let state = state_with(in_memory());
    let res = generate_question_paper(&state, &criteria(&[("MCQ", 10), ("Essay", 2)], 2)).await;
    assert!(res.success, "{:?}", res.msg);
    let papers = res.body.expect("papers");
    assert_eq!(papers.len(), 2);
    for (i, p) in papers.iter().enumerate() {
      assert_eq!(p.set_index, i);
      let names: Vec<_> = p.sections.iter().map(|s| s.name.as_str()).collect();
      assert_eq!(names, vec!["MCQ", "Essay"]);
      assert_eq!(section_len(p, "MCQ"), 10);
      assert_eq!(section_len(p, "Essay"), 2);
    }
    // Easy carries the highest weight, so the first set's MCQ is Easy-first.
    let mcq = &papers[0].sections[0];
    assert_eq!(mcq.filled[0].level, Difficulty::Easy);
    assert_eq!(mcq.filled[0].count, 10);
  }

  #[tokio::test]
  async fn every_set_count_yields_that_many_full_papers() {
    let state = state_with(in_memory());
    for k in [1usize, 5, 50] {
      let res = generate_question_paper(&state, &criteria(&[("MCQ", 15), ("Essay", 1)], k)).await;
      let papers = res.body.expect("papers");
      assert_eq!(papers.len(), k);
      for p in &papers {
        assert_eq!(section_len(p, "MCQ"), 15);
        assert_eq!(section_len(p, "Essay"), 1);
      }
    }
  }

  #[tokio::test]
  async fn fill_counts_repeat_across_calls() {
    let state = state_with(in_memory());
    let c = criteria(&[("MCQ", 20)], 1);
    let first = generate_question_paper(&state, &c).await.body.expect("papers");
    for _ in 0..3 {
      let again = generate_question_paper(&state, &c).await.body.expect("papers");
      assert_eq!(again[0].sections[0].filled, first[0].sections[0].filled);
    }
  }

  #[tokio::test]
  async fn under_supplied_section_fails_without_papers() {
    let state = state_with(in_memory());
    let res = generate_question_paper(&state, &criteria(&[("MCQ", 10), ("Essay", 5)], 2)).await;
    assert!(!res.success);
    assert_eq!(res.status, ResponseStatus::Error);
    assert!(res.body.is_none());
    let msg = res.msg.expect("msg");
    assert!(msg.contains("Essay") && msg.contains("needs 5"), "{msg}");
  }

  #[tokio::test]
  async fn planned_section_missing_from_pool_is_a_shortage() {
    let state = state_with(in_memory());
    let res = generate_question_paper(&state, &criteria(&[("MCQ", 4), ("Oral", 1)], 1)).await;
    assert!(!res.success);
    assert!(res.msg.expect("msg").contains("Oral"));
  }

  #[tokio::test]
  async fn no_matches_is_no_record() {
    let state = state_with(in_memory());
    let mut c = criteria(&[("MCQ", 4)], 1);
    c.subject = "History".into();
    let res = generate_question_paper(&state, &c).await;
    assert!(res.success);
    assert_eq!(res.status, ResponseStatus::NoRecord);
    assert!(res.body.is_none());
  }

  #[tokio::test]
  async fn unknown_group_is_unauthorized() {
    let state = state_with(in_memory());
    let mut c = criteria(&[("MCQ", 4)], 1);
    c.group_code = "ELSEWHERE".into();
    let res = generate_question_paper(&state, &c).await;
    assert_eq!(res.msg.as_deref(), Some(MSG_UNAUTHORIZED_ACCESS));
  }

  #[tokio::test]
  async fn malformed_criteria_is_rejected_before_storage() {
    let state = state_with(Rigged {
      inner: in_memory(),
      questions: Some(Arc::new(Broken(StoreError::Unavailable("must not be called".into())))),
      ..Default::default()
    });
    let mut c = criteria(&[("MCQ", 4)], 1);
    c.standard = String::new();
    let res = generate_question_paper(&state, &c).await;
    assert!(!res.success);
    assert!(res.msg.expect("msg").starts_with(MSG_BAD_INPUT));
  }

  #[tokio::test]
  async fn store_failure_maps_to_generic_message() {
    let state = state_with(Rigged {
      inner: in_memory(),
      questions: Some(Arc::new(Broken(StoreError::Unavailable("connection reset".into())))),
      ..Default::default()
    });
    let res = generate_question_paper(&state, &criteria(&[("MCQ", 4)], 1)).await;
    assert!(!res.success);
    assert_eq!(res.msg.as_deref(), Some(MSG_REQUEST_FAILED));
  }

  #[tokio::test]
  async fn pool_sections_outside_the_plan_are_left_out() {
    let mut pool = CandidatePool::new();
    let mut mcq = HashMap::new();
    mcq.insert(Difficulty::Easy, (0..5).map(|i| question("MCQ", Difficulty::Easy, i)).collect());
    pool.insert("MCQ".to_string(), mcq);
    let mut extra = HashMap::new();
    extra.insert(Difficulty::Hard, (0..5).map(|i| question("Extra", Difficulty::Hard, i)).collect());
    pool.insert("Extra".to_string(), extra);

    let state = state_with(Rigged {
      inner: in_memory(),
      questions: Some(Arc::new(FixedPool(pool))),
      ..Default::default()
    });
    let papers = generate_question_paper(&state, &criteria(&[("MCQ", 3)], 2)).await.body.expect("papers");
    for p in &papers {
      assert_eq!(p.sections.len(), 1);
      assert_eq!(section_len(p, "MCQ"), 3);
    }
  }

  fn bucket(section: &str, level: Difficulty, n: usize) -> HashMap<Difficulty, Vec<Question>> {
    let mut levels = HashMap::new();
    levels.insert(level, (0..n).map(|i| question(section, level, i)).collect());
    levels
  }

  #[tokio::test]
  async fn one_failing_selector_yields_one_error_after_all_report() {
    let mut pool = CandidatePool::new();
    pool.insert("MCQ".to_string(), bucket("MCQ", Difficulty::Easy, 5));
    pool.insert("Essay".to_string(), bucket("Essay", Difficulty::Medium, 1));
    pool.insert("Short".to_string(), bucket("Short", Difficulty::Hard, 3));
    let plan = plan_section_counts(
      &[
        ("MCQ".to_string(), LengthSpec::Count(3)),
        ("Essay".to_string(), LengthSpec::Count(3)),
        ("Short".to_string(), LengthSpec::Count(2)),
      ],
      None,
    );
    let order: Arc<[Difficulty]> = Difficulty::ALL.to_vec().into();

    let out = tokio::time::timeout(Duration::from_secs(5), select_sections(pool, &plan, order, 2))
      .await
      .expect("fan-in returned in time");
    assert_eq!(
      out.map(|s| s.len()),
      Err(AppError::DataShortage { section: "Essay".into(), requested: 3, available: 1 })
    );
  }

  #[tokio::test]
  async fn every_selector_succeeding_keeps_plan_order() {
    let mut pool = CandidatePool::new();
    for name in ["C", "A", "B", "D"] {
      pool.insert(name.to_string(), bucket(name, Difficulty::Easy, 2));
    }
    let lengths: Vec<_> = ["A", "B", "C", "D"].iter().map(|n| (n.to_string(), LengthSpec::Count(2))).collect();
    let plan = plan_section_counts(&lengths, None);
    let order: Arc<[Difficulty]> = vec![Difficulty::Easy].into();

    let sections = select_sections(pool, &plan, order, 1).await.expect("sections");
    let names: Vec<_> = sections.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B", "C", "D"]);
  }

  #[tokio::test]
  async fn oversized_count_is_rejected_with_an_envelope() {
    let state = state_with(in_memory());
    let res = generate_question_paper(&state, &criteria(&[("MCQ", u32::MAX)], 1)).await;
    assert!(!res.success);
    assert_eq!(res.status, ResponseStatus::Error);
    assert!(res.body.is_none());
    assert!(res.msg.expect("msg").starts_with(MSG_BAD_INPUT));
  }

  #[tokio::test]
  async fn oversized_total_with_shares_is_rejected() {
    let state = state_with(in_memory());
    let mut c = criteria(&[], 1);
    c.length = vec![SectionLength { section: "MCQ".into(), count: None, share: Some(1.0) }];
    c.total_questions = Some(u32::MAX);
    let res = generate_question_paper(&state, &c).await;
    assert!(!res.success);
    assert!(res.msg.expect("msg").starts_with(MSG_BAD_INPUT));
  }

  #[tokio::test]
  async fn section_case_does_not_matter() {
    let state = state_with(in_memory());
    let papers = generate_question_paper(&state, &criteria(&[("mcq", 5)], 1)).await.body.expect("papers");
    assert_eq!(section_len(&papers[0], "mcq"), 5);
  }

  #[tokio::test]
  async fn later_sets_vary_when_the_pool_is_wide() {
    let state = state_with(in_memory());
    let papers = generate_question_paper(&state, &criteria(&[("MCQ", 4)], 2)).await.body.expect("papers");
    let ids = |p: &QuestionPaper| -> Vec<Uuid> {
      let mut v: Vec<_> = p.sections[0].questions.iter().map(|q| q.ques_id).collect();
      v.sort();
      v
    };
    assert_ne!(ids(&papers[0]), ids(&papers[1]));
  }

  #[tokio::test]
  async fn new_then_existing_template_takes_create_then_update_path() {
    let repos = in_memory();
    let state = state_with(repos.clone());
    let owner = Uuid::new_v4();

    let res = save_test_details(&state, Some(template(owner)), None, true).await;
    assert_eq!(res.body.as_deref(), Some(format!("{}\n", MSG_SAVE_SUCCESS).as_str()));

    let store = repos.group(GROUP).expect("group").templates.clone();
    let saved = store.find_all(owner).await.expect("list");
    assert_eq!(saved.len(), 1);
    let created = saved[0].clone();
    assert!(is_primary_id_valid(&created.template_id));
    assert_eq!(created.create_date, created.last_modified_date);
    assert_eq!(created.criteria_hash.len(), 128);

    tokio::time::sleep(Duration::from_millis(5)).await;
    let mut edit = created.clone();
    edit.create_date = None;
    save_test_details(&state, Some(edit), None, true).await;

    let updated = store.find_one(created.template_id).await.expect("found");
    assert_eq!(updated.create_date, created.create_date);
    assert!(updated.last_modified_date > created.last_modified_date);
    assert_eq!(store.find_all(owner).await.expect("list").len(), 1);
  }

  #[tokio::test]
  async fn status_comes_from_the_draft_flag() {
    let repos = in_memory();
    let state = state_with(repos.clone());
    let owner = Uuid::new_v4();

    let mut released = test_paper(owner);
    released.status = Some(TestStatus::Draft);
    save_test_details(&state, None, Some(released), false).await;
    save_test_details(&state, None, Some(test_paper(owner)), true).await;

    let all = repos.group(GROUP).expect("group").test_papers.find_all(owner).await.expect("list");
    assert_eq!(all.len(), 2);
    assert_eq!(all.iter().filter(|p| p.status == Some(TestStatus::Release)).count(), 1);

    let drafts = fetch_all_drafts(&state, GROUP, &owner.to_string()).await.body.expect("drafts");
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].status, Some(TestStatus::Draft));

    let one = fetch_single_paper(&state, GROUP, &drafts[0].test_id.to_string()).await;
    assert_eq!(one.body.map(|p| p.test_id), Some(drafts[0].test_id));
  }

  #[tokio::test]
  async fn panicking_paper_branch_still_reports() {
    let state = state_with(Rigged {
      inner: in_memory(),
      test_papers: Some(Arc::new(Panicking)),
      ..Default::default()
    });
    let owner = Uuid::new_v4();
    let res = tokio::time::timeout(
      Duration::from_secs(5),
      save_test_details(&state, Some(template(owner)), Some(test_paper(owner)), false),
    )
    .await
    .expect("returned in time");
    assert!(res.success);
    assert_eq!(res.body.expect("body"), format!("{}\n{}", MSG_SAVE_SUCCESS, MSG_REQUEST_FAILED));
  }

  #[tokio::test]
  async fn branches_fail_independently() {
    let state = state_with(Rigged {
      inner: in_memory(),
      templates: Some(Arc::new(Broken(StoreError::DuplicateKey))),
      test_papers: Some(Arc::new(Stalled)),
      ..Default::default()
    });
    let owner = Uuid::new_v4();
    let res = save_test_details(&state, Some(template(owner)), Some(test_paper(owner)), true).await;
    assert_eq!(res.body.expect("body"), format!("{}\n{}", MSG_DUPLICATE_RECORD, MSG_REQUEST_FAILED));
  }

  #[tokio::test]
  async fn unknown_group_fails_only_its_branch() {
    let state = state_with(in_memory());
    let owner = Uuid::new_v4();
    let mut paper = test_paper(owner);
    paper.group_code = "ELSEWHERE".into();
    let res = save_test_details(&state, Some(template(owner)), Some(paper), true).await;
    assert_eq!(res.body.expect("body"), format!("{}\n{}", MSG_SAVE_SUCCESS, MSG_UNAUTHORIZED_ACCESS));
  }

  #[tokio::test]
  async fn absent_records_give_empty_lines() {
    let state = state_with(in_memory());
    let res = save_test_details(&state, None, None, false).await;
    assert_eq!(res.body.as_deref(), Some("\n"));
  }

  #[tokio::test]
  async fn fetches_reject_malformed_ids() {
    let state = state_with(in_memory());
    assert_eq!(fetch_all_drafts(&state, GROUP, "teacher-1").await.msg.as_deref(), Some(MSG_INVALID_ID));
    assert_eq!(fetch_single_paper(&state, GROUP, "").await.msg.as_deref(), Some(MSG_INVALID_ID));
    assert_eq!(fetch_all_templates(&state, GROUP, "x").await.msg.as_deref(), Some(MSG_INVALID_ID));
    assert_eq!(fetch_single_template(&state, GROUP, "42").await.msg.as_deref(), Some(MSG_INVALID_ID));
  }

  #[tokio::test]
  async fn fetching_an_unknown_template_says_no_record() {
    let state = state_with(in_memory());
    let res = fetch_single_template(&state, GROUP, &Uuid::new_v4().to_string()).await;
    assert_eq!(res.status, ResponseStatus::Error);
    assert_eq!(res.msg.as_deref(), Some(MSG_NO_RECORD));
  }

  #[tokio::test]
  async fn templates_are_listed_per_owner() {
    let state = state_with(in_memory());
    let owner = Uuid::new_v4();
    save_test_details(&state, Some(template(owner)), None, true).await;
    save_test_details(&state, Some(template(Uuid::new_v4())), None, true).await;
    let mine = fetch_all_templates(&state, GROUP, &owner.to_string()).await.body.expect("list");
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].owner_id, owner);
  }

  #[test]
  fn supervise_converts_panics() {
    let out: Result<(), AppError> = supervise(|| panic!("boom"));
    assert_eq!(out, Err(AppError::InternalFault("boom".into())));
  }
}
