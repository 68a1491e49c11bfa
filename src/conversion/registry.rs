//! In-memory job registry.

use super::models::ConversionJob;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job already exists: {0}")]
    AlreadyExists(String),
}

/// Concurrency-safe store of conversion jobs keyed by id.
///
/// Cloning is cheap and every clone sees the same jobs. The registry lives
/// for the lifetime of the process and is never persisted.
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<String, ConversionJob>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new job. Ids are immutable and unique, so an existing id is rejected.
    pub async fn create(&self, job: ConversionJob) -> Result<ConversionJob, RegistryError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(RegistryError::AlreadyExists(job.id));
        }
        jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    /// Snapshot of the job with the given id.
    pub async fn get(&self, id: &str) -> Option<ConversionJob> {
        self.jobs.read().await.get(id).cloned()
    }

    /// Applies `f` to the job while holding the write lock, so the read-modify-write
    /// is atomic with respect to every other registry operation.
    pub async fn mutate<F, R>(&self, id: &str, f: F) -> Result<R, RegistryError>
    where
        F: FnOnce(&mut ConversionJob) -> R,
    {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        Ok(f(job))
    }

    pub async fn delete(&self, id: &str) -> Option<ConversionJob> {
        self.jobs.write().await.remove(id)
    }

    /// Snapshot of every job, in no particular order.
    pub async fn list_all(&self) -> Vec<ConversionJob> {
        self.jobs.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::models::JobStatus;
    use crate::extractor::Quality;

    fn job(id: &str) -> ConversionJob {
        ConversionJob::new(id, Quality::new("192"))
    }

    #[tokio::test]
    async fn create_then_get() {
        let registry = JobRegistry::new();
        registry.create(job("a")).await.unwrap();

        let fetched = registry.get("a").await.unwrap();
        assert_eq!(fetched.id, "a");
        assert_eq!(fetched.status, JobStatus::Processing);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn rejects_duplicate_ids() {
        let registry = JobRegistry::new();
        registry.create(job("a")).await.unwrap();
        assert_eq!(
            registry.create(job("a")).await.unwrap_err(),
            RegistryError::AlreadyExists("a".to_string())
        );
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let registry = JobRegistry::new();
        assert!(registry.get("missing").await.is_none());
        assert!(registry.delete("missing").await.is_none());
        assert_eq!(
            registry.mutate("missing", |j| j.progress = 50).await,
            Err(RegistryError::NotFound("missing".to_string()))
        );
        // Lookups must not fabricate entries
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn mutate_returns_closure_result() {
        let registry = JobRegistry::new();
        registry.create(job("a")).await.unwrap();

        let outcome = registry.mutate("a", |j| j.complete()).await.unwrap();
        assert!(outcome.is_ok());
        assert_eq!(
            registry.get("a").await.unwrap().status,
            JobStatus::Completed
        );
    }

    #[tokio::test]
    async fn delete_removes_job() {
        let registry = JobRegistry::new();
        registry.create(job("a")).await.unwrap();
        registry.create(job("b")).await.unwrap();

        assert!(registry.delete("a").await.is_some());
        assert!(registry.get("a").await.is_none());

        let ids: Vec<String> = registry.list_all().await.into_iter().map(|j| j.id).collect();
        assert_eq!(ids, vec!["b".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_mutations_are_not_lost() {
        let registry = JobRegistry::new();
        registry.create(job("a")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..50 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry
                    .mutate("a", |j| j.progress = j.progress.saturating_add(1))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(registry.get("a").await.unwrap().progress, 50);
    }
}
