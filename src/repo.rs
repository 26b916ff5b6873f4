//! Repository contracts the service depends on, tenant-scoped handle
//! resolution, and the in-memory backends used by the binary and the tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::criteria::NormalizedCriteria;
use crate::domain::{CandidatePool, Question, Template, TestPaper};
use crate::error::StoreError;

#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Candidates per planned section and requested level. An empty pool means
    /// nothing matched; it is not an error.
    async fn filter_questions_for_paper(&self, criteria: &NormalizedCriteria) -> Result<CandidatePool, StoreError>;
}

#[async_trait]
pub trait TemplateRepository: Send + Sync {
    async fn save(&self, template: &Template) -> Result<(), StoreError>;
    async fn update(&self, template: &Template) -> Result<(), StoreError>;
    async fn find_all(&self, owner_id: Uuid) -> Result<Vec<Template>, StoreError>;
    async fn find_one(&self, id: Uuid) -> Result<Template, StoreError>;
}

#[async_trait]
pub trait TestPaperRepository: Send + Sync {
    async fn save(&self, paper: &TestPaper) -> Result<(), StoreError>;
    async fn update(&self, paper: &TestPaper) -> Result<(), StoreError>;
    async fn find_all(&self, owner_id: Uuid) -> Result<Vec<TestPaper>, StoreError>;
    async fn find_one(&self, id: Uuid) -> Result<TestPaper, StoreError>;
}

/// Resolves tenant-scoped store handles. `None` means the group has no
/// store, which callers report as unauthorized.
pub trait RepositoryProvider: Send + Sync {
    fn questions(&self, group_code: &str) -> Option<Arc<dyn QuestionRepository>>;
    fn templates(&self, group_code: &str) -> Option<Arc<dyn TemplateRepository>>;
    fn test_papers(&self, group_code: &str) -> Option<Arc<dyn TestPaperRepository>>;
}

/// Run one store call under a deadline; expiry becomes `StoreError::Timeout`.
pub async fn with_deadline<T, F>(deadline: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout),
    }
}

// --- In-memory implementations ---

#[derive(Default)]
pub struct InMemoryQuestionStore {
    questions: RwLock<Vec<Question>>,
}

impl InMemoryQuestionStore {
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions: RwLock::new(questions) }
    }
}

#[async_trait]
impl QuestionRepository for InMemoryQuestionStore {
    async fn filter_questions_for_paper(&self, criteria: &NormalizedCriteria) -> Result<CandidatePool, StoreError> {
        let questions = self.questions.read().await;
        let mut pool = CandidatePool::new();
        for q in questions.iter() {
            if !(q.subject.eq_ignore_ascii_case(&criteria.subject)
                && q.standard.eq_ignore_ascii_case(&criteria.standard)
                && criteria.wants_level(q.difficulty))
            {
                continue;
            }
            // Keyed by the requested spelling so plan lookups line up.
            let section = criteria.section_names().find(|s| s.eq_ignore_ascii_case(q.section.trim()));
            if let Some(section) = section {
                pool.entry(section.to_string())
                    .or_default()
                    .entry(q.difficulty)
                    .or_default()
                    .push(q.clone());
            }
        }
        debug!(target: "intelliq_backend", scanned = questions.len(), sections = pool.len(), "Question filter done");
        Ok(pool)
    }
}

#[derive(Default)]
pub struct InMemoryTemplateStore {
    by_id: RwLock<HashMap<Uuid, Template>>,
}

#[async_trait]
impl TemplateRepository for InMemoryTemplateStore {
    async fn save(&self, template: &Template) -> Result<(), StoreError> {
        let mut by_id = self.by_id.write().await;
        if by_id.contains_key(&template.template_id) {
            return Err(StoreError::DuplicateKey);
        }
        by_id.insert(template.template_id, template.clone());
        Ok(())
    }

    async fn update(&self, template: &Template) -> Result<(), StoreError> {
        let mut by_id = self.by_id.write().await;
        let stored = by_id.get_mut(&template.template_id).ok_or(StoreError::NotFound)?;
        let create_date = stored.create_date;
        *stored = template.clone();
        stored.create_date = create_date;
        Ok(())
    }

    async fn find_all(&self, owner_id: Uuid) -> Result<Vec<Template>, StoreError> {
        let by_id = self.by_id.read().await;
        let mut out: Vec<Template> = by_id.values().filter(|t| t.owner_id == owner_id).cloned().collect();
        out.sort_by(|a, b| b.last_modified_date.cmp(&a.last_modified_date));
        Ok(out)
    }

    async fn find_one(&self, id: Uuid) -> Result<Template, StoreError> {
        self.by_id.read().await.get(&id).cloned().ok_or(StoreError::NotFound)
    }
}

#[derive(Default)]
pub struct InMemoryTestPaperStore {
    by_id: RwLock<HashMap<Uuid, TestPaper>>,
}

#[async_trait]
impl TestPaperRepository for InMemoryTestPaperStore {
    async fn save(&self, paper: &TestPaper) -> Result<(), StoreError> {
        let mut by_id = self.by_id.write().await;
        if by_id.contains_key(&paper.test_id) {
            return Err(StoreError::DuplicateKey);
        }
        by_id.insert(paper.test_id, paper.clone());
        Ok(())
    }

    async fn update(&self, paper: &TestPaper) -> Result<(), StoreError> {
        let mut by_id = self.by_id.write().await;
        let stored = by_id.get_mut(&paper.test_id).ok_or(StoreError::NotFound)?;
        let create_date = stored.create_date;
        *stored = paper.clone();
        stored.create_date = create_date;
        Ok(())
    }

    async fn find_all(&self, owner_id: Uuid) -> Result<Vec<TestPaper>, StoreError> {
        let by_id = self.by_id.read().await;
        let mut out: Vec<TestPaper> = by_id.values().filter(|p| p.owner_id == owner_id).cloned().collect();
        out.sort_by(|a, b| b.last_modified_date.cmp(&a.last_modified_date));
        Ok(out)
    }

    async fn find_one(&self, id: Uuid) -> Result<TestPaper, StoreError> {
        self.by_id.read().await.get(&id).cloned().ok_or(StoreError::NotFound)
    }
}

/// The three stores of one tenant.
#[derive(Clone, Default)]
pub struct GroupStores {
    pub questions: Arc<InMemoryQuestionStore>,
    pub templates: Arc<InMemoryTemplateStore>,
    pub test_papers: Arc<InMemoryTestPaperStore>,
}

/// In-memory provider: one `GroupStores` per registered group code.
#[derive(Clone, Default)]
pub struct InMemoryRepositories {
    groups: HashMap<String, GroupStores>,
}

impl InMemoryRepositories {
    /// Register `group_codes` and distribute `questions` to their group's store.
    /// Questions of unregistered groups are dropped.
    pub fn new(group_codes: &[String], questions: Vec<Question>) -> Self {
        let mut by_group: HashMap<String, Vec<Question>> =
            group_codes.iter().map(|g| (g.clone(), Vec::new())).collect();
        let mut dropped = 0usize;
        for mut q in questions {
            if q.ques_id.is_nil() {
                q.ques_id = Uuid::new_v4();
            }
            match by_group.get_mut(&q.group_code) {
                Some(list) => list.push(q),
                None => dropped += 1,
            }
        }

        let mut groups = HashMap::new();
        for (code, list) in by_group {
            info!(target: "intelliq_backend", group_code = %code, questions = list.len(), "Registered group store");
            groups.insert(
                code,
                GroupStores {
                    questions: Arc::new(InMemoryQuestionStore::new(list)),
                    ..Default::default()
                },
            );
        }
        if dropped > 0 {
            info!(target: "intelliq_backend", dropped, "Skipped questions of unregistered groups");
        }
        Self { groups }
    }

    pub fn group(&self, group_code: &str) -> Option<&GroupStores> {
        self.groups.get(group_code)
    }
}

impl RepositoryProvider for InMemoryRepositories {
    fn questions(&self, group_code: &str) -> Option<Arc<dyn QuestionRepository>> {
        self.groups.get(group_code).map(|g| g.questions.clone() as Arc<dyn QuestionRepository>)
    }

    fn templates(&self, group_code: &str) -> Option<Arc<dyn TemplateRepository>> {
        self.groups.get(group_code).map(|g| g.templates.clone() as Arc<dyn TemplateRepository>)
    }

    fn test_papers(&self, group_code: &str) -> Option<Arc<dyn TestPaperRepository>> {
        self.groups.get(group_code).map(|g| g.test_papers.clone() as Arc<dyn TestPaperRepository>)
    }
}
