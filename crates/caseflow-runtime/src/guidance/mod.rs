//! Discipline-guidance cache.
//!
//! AI-extracted reference material cached per grievance so it is not
//! recomputed on every chat turn. The cache never serves stale data: an
//! entry past its expiry is deleted on read and treated as a miss. A failed
//! population leaves no entry, and an empty retrieval result is never
//! cached (a "no guidance available" answer must be recomputed, not
//! remembered).
//!
//! Population is two sequential upstream calls — retrieve the full
//! reference content, then extract the relevant subset — each under a
//! bounded timeout, bounded retry, and a per-upstream circuit breaker.

pub mod prompts;

use backon::{ExponentialBuilder, Retryable};
use chrono::Utc;
use std::sync::Arc;
use tokio::time::timeout;

use caseflow_core::topics::extract_topics;
use caseflow_core::{ActorContext, EngineError, GrievanceId, GrievanceInstance, GuidanceEntry};

use crate::config::GuidanceConfig;
use crate::providers::{CompletionConfig, TextGenerator};
use crate::repository::{GrievanceRepository, RepositoryError};
use crate::resilience::{UpstreamBreaker, UpstreamKind};
use crate::retrieval::ReferenceRetriever;

/// The case facts handed to the upstream collaborators.
#[derive(Debug, Clone)]
pub struct CaseFacts {
    pub statement: String,
    pub violated_articles: Vec<String>,
    pub settlement_desired: Option<String>,
}

impl From<&GrievanceInstance> for CaseFacts {
    fn from(grievance: &GrievanceInstance) -> Self {
        Self {
            statement: grievance.statement.clone(),
            violated_articles: grievance.violated_articles.clone(),
            settlement_desired: grievance.settlement_desired.clone(),
        }
    }
}

/// Result of a guidance request.
#[derive(Debug, Clone, PartialEq)]
pub enum GuidanceOutcome {
    /// Cached or freshly-populated guidance.
    Guidance(GuidanceEntry),
    /// The upstream search found nothing relevant. Not cached, so the next
    /// request searches again.
    Unavailable,
}

/// The discipline-guidance cache service.
pub struct GuidanceService<R> {
    repository: Arc<R>,
    retriever: Arc<dyn ReferenceRetriever>,
    generator: Arc<dyn TextGenerator>,
    completion: CompletionConfig,
    config: GuidanceConfig,
    breaker: UpstreamBreaker,
}

impl<R: GrievanceRepository> GuidanceService<R> {
    pub fn new(
        repository: Arc<R>,
        retriever: Arc<dyn ReferenceRetriever>,
        generator: Arc<dyn TextGenerator>,
        config: GuidanceConfig,
    ) -> Self {
        let breaker = UpstreamBreaker::new(config.breaker.clone());
        Self {
            repository,
            retriever,
            generator,
            completion: CompletionConfig::default(),
            config,
            breaker,
        }
    }

    /// Override the completion settings used for extraction calls.
    pub fn with_completion_config(mut self, completion: CompletionConfig) -> Self {
        self.completion = completion;
        self
    }

    /// Read cached guidance without populating.
    ///
    /// An expired entry is deleted and reported as a miss. Guidance reads
    /// are open to every role; only tenant scope is enforced.
    pub async fn get(
        &self,
        actor: &ActorContext,
        grievance_id: GrievanceId,
    ) -> Result<Option<GuidanceEntry>, EngineError> {
        self.load_scoped(actor, grievance_id).await?;
        self.fresh_entry(grievance_id).await
    }

    /// Cached guidance, populating on miss.
    ///
    /// With `force_refresh` any existing entry is deleted and population
    /// always runs — used when the case's underlying statement materially
    /// changes.
    pub async fn get_or_populate(
        &self,
        actor: &ActorContext,
        grievance_id: GrievanceId,
        force_refresh: bool,
    ) -> Result<GuidanceOutcome, EngineError> {
        let grievance = self.load_scoped(actor, grievance_id).await?;

        if force_refresh {
            self.repository
                .delete_guidance(grievance_id)
                .await
                .map_err(repo_err)?;
        } else if let Some(entry) = self.fresh_entry(grievance_id).await? {
            return Ok(GuidanceOutcome::Guidance(entry));
        }

        self.populate(&grievance).await
    }

    /// Drop any cached guidance for a grievance.
    ///
    /// Called when the source material changes (statement or articles
    /// edited); absent entries are ignored.
    pub async fn invalidate(
        &self,
        actor: &ActorContext,
        grievance_id: GrievanceId,
    ) -> Result<(), EngineError> {
        self.load_scoped(actor, grievance_id).await?;
        self.repository
            .delete_guidance(grievance_id)
            .await
            .map_err(repo_err)
    }

    /// A non-expired entry, deleting any stale row found.
    async fn fresh_entry(
        &self,
        grievance_id: GrievanceId,
    ) -> Result<Option<GuidanceEntry>, EngineError> {
        match self
            .repository
            .guidance(grievance_id)
            .await
            .map_err(repo_err)?
        {
            Some(entry) if entry.is_expired(Utc::now()) => {
                tracing::debug!(grievance_id = %grievance_id, "guidance entry expired, deleting");
                self.repository
                    .delete_guidance(grievance_id)
                    .await
                    .map_err(repo_err)?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Run the population pipeline and upsert the result.
    ///
    /// No write happens until the replacement value is fully computed, so a
    /// failure at any point leaves the cache exactly as it was.
    async fn populate(
        &self,
        grievance: &GrievanceInstance,
    ) -> Result<GuidanceOutcome, EngineError> {
        let facts = CaseFacts::from(grievance);

        let Some(reference) = self.retrieve(&facts).await? else {
            tracing::info!(
                grievance_id = %grievance.id,
                "no relevant reference content; nothing cached"
            );
            return Ok(GuidanceOutcome::Unavailable);
        };

        let extracted = self.extract(&facts, &reference).await?;
        let topics = extract_topics(&extracted);

        let entry = GuidanceEntry::new(
            grievance.id,
            extracted,
            topics,
            Utc::now(),
            self.config.ttl_days,
        )?;
        self.repository
            .upsert_guidance(entry.clone())
            .await
            .map_err(repo_err)?;

        tracing::info!(
            grievance_id = %grievance.id,
            topics = entry.topics.len(),
            expires_at = %entry.expires_at,
            "guidance populated"
        );
        Ok(GuidanceOutcome::Guidance(entry))
    }

    async fn retrieve(&self, facts: &CaseFacts) -> Result<Option<String>, EngineError> {
        if self.breaker.is_open(UpstreamKind::Retrieval) {
            return Err(EngineError::UpstreamUnavailable(
                "reference retrieval circuit is open".to_string(),
            ));
        }

        let attempt = || async {
            let call = self
                .retriever
                .retrieve(&facts.statement, &facts.violated_articles);
            match timeout(self.config.upstream_timeout, call).await {
                Ok(Ok(content)) => {
                    self.breaker.record_success(UpstreamKind::Retrieval);
                    Ok(content)
                }
                Ok(Err(e)) => {
                    self.breaker.record_failure(UpstreamKind::Retrieval);
                    Err(EngineError::UpstreamUnavailable(format!(
                        "reference retrieval failed: {}",
                        e
                    )))
                }
                Err(_) => {
                    self.breaker.record_failure(UpstreamKind::Retrieval);
                    Err(EngineError::UpstreamUnavailable(format!(
                        "reference retrieval timed out after {:?}",
                        self.config.upstream_timeout
                    )))
                }
            }
        };

        attempt
            .retry(ExponentialBuilder::default().with_max_times(self.config.retry_attempts))
            .when(|e: &EngineError| e.is_retryable())
            .notify(|err, dur| {
                tracing::warn!(error = %err, retry_in = ?dur, "retrying reference retrieval");
            })
            .await
    }

    async fn extract(&self, facts: &CaseFacts, reference: &str) -> Result<String, EngineError> {
        if self.breaker.is_open(UpstreamKind::Generation) {
            return Err(EngineError::UpstreamUnavailable(
                "text-generation circuit is open".to_string(),
            ));
        }

        let messages = prompts::extraction_request(facts, reference);

        let attempt = || {
            let messages = messages.clone();
            async move {
                let call = self.generator.complete(messages, &self.completion);
                match timeout(self.config.upstream_timeout, call).await {
                    Ok(Ok(response)) => {
                        self.breaker.record_success(UpstreamKind::Generation);
                        Ok(response.content)
                    }
                    Ok(Err(e)) => {
                        self.breaker.record_failure(UpstreamKind::Generation);
                        Err(EngineError::UpstreamUnavailable(format!(
                            "extraction call failed: {}",
                            e
                        )))
                    }
                    Err(_) => {
                        self.breaker.record_failure(UpstreamKind::Generation);
                        Err(EngineError::UpstreamUnavailable(format!(
                            "extraction call timed out after {:?}",
                            self.config.upstream_timeout
                        )))
                    }
                }
            }
        };

        attempt
            .retry(ExponentialBuilder::default().with_max_times(self.config.retry_attempts))
            .when(|e: &EngineError| e.is_retryable())
            .notify(|err, dur| {
                tracing::warn!(error = %err, retry_in = ?dur, "retrying extraction call");
            })
            .await
    }

    async fn load_scoped(
        &self,
        actor: &ActorContext,
        grievance_id: GrievanceId,
    ) -> Result<GrievanceInstance, EngineError> {
        self.repository
            .grievance(grievance_id)
            .await
            .map_err(repo_err)?
            .filter(|g| g.organization_id == actor.organization_id)
            .ok_or_else(|| EngineError::NotFound(format!("grievance {}", grievance_id)))
    }
}

fn repo_err(err: RepositoryError) -> EngineError {
    EngineError::UpstreamUnavailable(format!("storage backend error: {}", err))
}
