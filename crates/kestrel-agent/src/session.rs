// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-conversation reasoning session.
//!
//! A [`ReasoningSession`] owns its context memory and runs every query
//! through enrich → classify → gather → select → reason → reflect →
//! record. Long-term memory sits behind a mutex so background
//! summarization and foreground queries never write it at the same time;
//! it can be shared between sessions with
//! [`ReasoningSession::with_long_term_memory`].

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use kestrel_config::KestrelConfig;
use kestrel_config::model::SearchConfig;
use kestrel_context::{ContextMemory, ContextStats, ConversationExchange, EnrichedQuery};
use kestrel_core::{
    CompletionAdapter, DocumentSearch, EmbeddingAdapter, InspectionRecord, KestrelError,
    RecordStore, SessionId,
};
use kestrel_memory::{
    IndexStats, JsonFilePersistence, LongTermMemory, LongTermStats, MemoryPersistence,
    SemanticIndex, Summarizer,
};
use kestrel_router::{IntentClassifier, ModeSelector, ReasoningMode};
use kestrel_skill::{ToolRegistry, register_builtins};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engines::{
    ChainOfThoughtEngine, DirectEngine, Draft, EngineInput, ModelHandle, PipelineEngine,
    Reasoner, ToolLoopEngine,
};
use crate::evidence::{EvidenceBundle, EvidenceGatherer, Section, observations_section};
use crate::reflection::{GradeBand, ReflectionHistory, ReflectionReport, ReflectionSummary, SelfReflection};

/// Appended when the grader could not be reached.
pub const UNVERIFIED_NOTE: &str = "[Note: answer quality was not verified]";

/// The external services a session talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub completion: Arc<dyn CompletionAdapter>,
    pub embedder: Arc<dyn EmbeddingAdapter>,
    pub records: Arc<dyn RecordStore>,
    pub documents: Arc<dyn DocumentSearch>,
}

/// How reflection ended for one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReflectionOutcome {
    Skipped,
    Passed,
    PassedWithWarning,
    Corrected,
    Unverified,
}

/// Statistics across every component of a session.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub session: String,
    pub context: ContextStats,
    pub long_term: LongTermStats,
    pub reflection: ReflectionSummary,
    pub index: IndexStats,
    pub queries_by_mode: BTreeMap<ReasoningMode, usize>,
}

/// One conversation with the reasoning engine.
pub struct ReasoningSession {
    id: SessionId,
    classifier: Arc<IntentClassifier>,
    context: ContextMemory,
    long_term: Arc<Mutex<LongTermMemory>>,
    index: Arc<RwLock<SemanticIndex>>,
    gatherer: EvidenceGatherer,
    selector: ModeSelector,
    direct: DirectEngine,
    chain: ChainOfThoughtEngine,
    tool_loop: ToolLoopEngine,
    pipeline: PipelineEngine,
    grader: SelfReflection,
    history: ReflectionHistory,
    summarizer: Arc<Summarizer>,
    persistence: Arc<dyn MemoryPersistence>,
    /// Exchanges recorded since the last summarization.
    pending: Vec<ConversationExchange>,
    summarization: Option<JoinHandle<()>>,
    summarize_threshold: usize,
    relevant_top_k: usize,
    search: SearchConfig,
    queries_by_mode: BTreeMap<ReasoningMode, usize>,
    last_outcome: Option<ReflectionOutcome>,
}

impl ReasoningSession {
    pub fn new(config: &KestrelConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            completion,
            embedder,
            records,
            documents,
        } = collaborators;

        let timeout = Duration::from_secs(config.engine.model_timeout_secs);
        let model = ModelHandle::new(completion.clone(), timeout);
        let classifier = Arc::new(IntentClassifier::new(config.router.known_devices.clone()));

        let mut registry = ToolRegistry::new();
        register_builtins(
            &mut registry,
            records.clone(),
            documents.clone(),
            classifier.clone(),
            config.reasoning.observation_chars,
        );
        let tools = Arc::new(registry);

        let id = SessionId::new();
        info!(session = %id, mode = ?config.engine.mode, "reasoning session created");

        Self {
            id,
            context: ContextMemory::from_config(&config.context, classifier.clone()),
            classifier,
            long_term: Arc::new(Mutex::new(LongTermMemory::from_config(&config.memory))),
            index: Arc::new(RwLock::new(
                SemanticIndex::new(embedder).with_rrf_k(config.search.rrf_k),
            )),
            gatherer: EvidenceGatherer::new(records, documents),
            selector: ModeSelector::new(config.engine.mode),
            direct: DirectEngine::with_model(model.clone()),
            chain: ChainOfThoughtEngine::new(model.clone()),
            tool_loop: ToolLoopEngine::new(model.clone(), tools.clone(), config.reasoning.max_steps),
            pipeline: PipelineEngine::new(model.clone(), tools, config.reasoning.max_plan_steps),
            grader: SelfReflection::new(model, &config.reflection),
            history: ReflectionHistory::new(),
            summarizer: Arc::new(Summarizer::new(completion, timeout)),
            persistence: Arc::new(JsonFilePersistence),
            pending: Vec::new(),
            summarization: None,
            summarize_threshold: config.memory.summarize_threshold,
            relevant_top_k: config.memory.relevant_top_k,
            search: config.search.clone(),
            queries_by_mode: BTreeMap::new(),
            last_outcome: None,
        }
    }

    /// Shares a long-term memory store with other sessions.
    pub fn with_long_term_memory(mut self, long_term: Arc<Mutex<LongTermMemory>>) -> Self {
        self.long_term = long_term;
        self
    }

    pub fn with_persistence(mut self, persistence: Arc<dyn MemoryPersistence>) -> Self {
        self.persistence = persistence;
        self
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn long_term_memory(&self) -> Arc<Mutex<LongTermMemory>> {
        self.long_term.clone()
    }

    pub fn context(&self) -> &ContextMemory {
        &self.context
    }

    /// How reflection ended for the most recent query.
    pub fn last_reflection(&self) -> Option<ReflectionOutcome> {
        self.last_outcome
    }

    /// Answers one query. Never fails: every collaborator failure degrades
    /// into a less grounded answer, down to the insufficient-data template.
    pub async fn process_query(
        &mut self,
        text: &str,
        use_context: bool,
        use_reflection: bool,
        use_vector_search: bool,
    ) -> String {
        let query = if use_context {
            self.context.enrich_query(text)
        } else {
            EnrichedQuery::plain(text)
        };
        let intent = self
            .classifier
            .classify_enriched(&query.effective, &query.original);
        debug!(
            session = %self.id,
            intent = %intent.intent,
            followup = query.followup,
            "query classified"
        );

        let mut evidence = self.gatherer.gather(&query.effective, &intent).await;
        if use_context {
            self.add_long_term_insights(&query.effective, &mut evidence).await;
        }
        if use_vector_search {
            self.add_similar_records(&query.effective, &mut evidence).await;
        }

        let decision = self.selector.select(&intent);
        *self.queries_by_mode.entry(decision.mode).or_default() += 1;
        info!(
            session = %self.id,
            mode = %decision.mode,
            reason = decision.reason,
            sections = evidence.len(),
            "reasoning"
        );

        let context_block = (use_context && !self.context.is_empty())
            .then(|| self.context.format_for_prompt());
        let engine: &dyn Reasoner = match decision.mode {
            ReasoningMode::Direct => &self.direct,
            ReasoningMode::ChainOfThought => &self.chain,
            ReasoningMode::ToolLoop => &self.tool_loop,
            ReasoningMode::MultiAgent => &self.pipeline,
        };
        let input = EngineInput::new(&query.effective, &intent, &evidence)
            .with_context(context_block.as_deref());
        let draft = engine.reason(&input).await;

        if !draft.observations.is_empty() {
            evidence.insert(
                Section::ToolObservations,
                observations_section(
                    draft
                        .observations
                        .iter()
                        .map(|(tool, output)| (tool.as_str(), output.as_str())),
                ),
            );
        }

        let (answer, outcome) = if use_reflection && !evidence.is_empty() {
            let input = EngineInput::new(&query.effective, &intent, &evidence)
                .with_context(context_block.as_deref());
            reflect(&self.grader, &mut self.history, engine, &input, draft).await
        } else {
            (draft.answer, ReflectionOutcome::Skipped)
        };
        self.last_outcome = Some(outcome);

        if use_context {
            self.context.add_exchange(&query, &answer, &intent);
        }
        self.pending.push(ConversationExchange {
            user_text: query.original.clone(),
            effective_text: query.effective.clone(),
            answer: answer.clone(),
            intent,
            followup: query.followup,
            timestamp: Utc::now(),
        });
        if self.pending.len() >= self.summarize_threshold {
            self.spawn_summarization();
        }

        answer
    }

    async fn add_long_term_insights(&self, query: &str, evidence: &mut EvidenceBundle) {
        let relevant = self
            .long_term
            .lock()
            .await
            .get_relevant_memories(query, self.relevant_top_k);
        if relevant.is_empty() {
            return;
        }
        match serde_json::to_value(&relevant) {
            Ok(value) => evidence.insert(Section::LongTermInsights, value),
            Err(e) => warn!(error = %e, "failed to encode long-term memories"),
        }
    }

    async fn add_similar_records(&self, query: &str, evidence: &mut EvidenceBundle) {
        let index = self.index.read().await;
        if index.is_empty() {
            return;
        }
        let hits = match index
            .hybrid_search(
                query,
                self.search.vector_weight,
                self.search.keyword_weight,
                self.search.top_k,
            )
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "vector search unavailable, continuing without it");
                return;
            }
        };
        if hits.is_empty() {
            return;
        }
        let similar: Vec<Value> = hits
            .iter()
            .map(|hit| {
                json!({
                    "id": hit.record.id,
                    "timestamp": hit.record.timestamp,
                    "device_id": hit.record.device_id,
                    "result": hit.record.result,
                    "station": hit.record.station,
                    "score": hit.score,
                })
            })
            .collect();
        evidence.insert(Section::SimilarRecords, Value::Array(similar));
    }

    fn spawn_summarization(&mut self) {
        let window = std::mem::take(&mut self.pending);
        let summarizer = self.summarizer.clone();
        let long_term = self.long_term.clone();
        let previous = self.summarization.take();
        info!(session = %self.id, exchanges = window.len(), "starting background summarization");

        self.summarization = Some(tokio::spawn(async move {
            if let Some(previous) = previous
                && let Err(e) = previous.await
            {
                warn!(error = %e, "previous summarization task failed");
            }
            let outcome = summarizer.summarize(&window).await;
            long_term.lock().await.apply(outcome);
        }));
    }

    /// Waits for any background summarization to finish.
    pub async fn wait_for_summarization(&mut self) {
        if let Some(handle) = self.summarization.take()
            && let Err(e) = handle.await
        {
            warn!(error = %e, "summarization task failed");
        }
    }

    /// Summarizes immediately, in the foreground.
    ///
    /// Uses the exchanges recorded since the last summarization, or the
    /// context buffer when there are none. Returns how many exchanges were
    /// summarized.
    pub async fn summarize_now(&mut self) -> usize {
        self.wait_for_summarization().await;
        let window = if self.pending.is_empty() {
            self.context.exchanges().cloned().collect()
        } else {
            std::mem::take(&mut self.pending)
        };
        if window.is_empty() {
            return 0;
        }
        let outcome = self.summarizer.summarize(&window).await;
        self.long_term.lock().await.apply(outcome);
        window.len()
    }

    pub fn clear_context(&mut self) {
        self.context.clear();
        info!(session = %self.id, "context cleared");
    }

    pub async fn clear_long_term_memory(&mut self) {
        self.wait_for_summarization().await;
        self.pending.clear();
        self.long_term.lock().await.clear();
        info!(session = %self.id, "long-term memory cleared");
    }

    /// Writes a snapshot of long-term memory to `path`.
    pub async fn save_memories(&mut self, path: &Path) -> Result<(), KestrelError> {
        self.wait_for_summarization().await;
        let snapshot = self.long_term.lock().await.snapshot();
        self.persistence.save(path, &snapshot).await
    }

    /// Replaces long-term memory with the snapshot at `path`.
    pub async fn load_memories(&mut self, path: &Path) -> Result<(), KestrelError> {
        self.wait_for_summarization().await;
        let snapshot = self.persistence.load(path).await?;
        self.long_term.lock().await.restore(snapshot);
        Ok(())
    }

    /// Adds records to the semantic index used by vector search.
    pub async fn index_records(&self, records: &[InspectionRecord]) -> Result<usize, KestrelError> {
        self.index.write().await.index(records).await
    }

    pub async fn engine_stats(&self) -> EngineStats {
        EngineStats {
            session: self.id.to_string(),
            context: self.context.stats(),
            long_term: self.long_term.lock().await.stats(),
            reflection: self.history.summary(),
            index: self.index.read().await.stats(),
            queries_by_mode: self.queries_by_mode.clone(),
        }
    }
}

/// Grades the draft and applies the pass / warn / correct policy.
/// At most one correction and one regrade happen per query.
async fn reflect(
    grader: &SelfReflection,
    history: &mut ReflectionHistory,
    engine: &dyn Reasoner,
    input: &EngineInput<'_>,
    draft: Draft,
) -> (String, ReflectionOutcome) {
    let report = match grader.grade(input.query, &draft.answer, input.evidence).await {
        Ok(report) => report,
        Err(e) => {
            warn!(error = %e, "reflection unavailable, returning unverified answer");
            return (unverified(&draft.answer), ReflectionOutcome::Unverified);
        }
    };

    match grader.band(report.overall) {
        GradeBand::Pass => {
            history.record(&report);
            (draft.answer, ReflectionOutcome::Passed)
        }
        GradeBand::Warn => {
            history.record(&report);
            (with_warning(&draft.answer, &report), ReflectionOutcome::PassedWithWarning)
        }
        GradeBand::Fail => {
            info!(
                overall = report.overall,
                improvements = report.improvements.len(),
                "draft rejected, attempting one correction"
            );
            let corrected = engine
                .reason(&input.with_feedback(&report.improvements))
                .await;
            if corrected.degraded && !draft.degraded {
                warn!("correction fell back to a template, keeping the original draft");
                history.record(&report);
                return (
                    with_warning(&draft.answer, &report),
                    ReflectionOutcome::PassedWithWarning,
                );
            }

            match grader
                .grade(input.query, &corrected.answer, input.evidence)
                .await
            {
                Ok(regrade) => {
                    let regrade = regrade.as_correction_of(&report);
                    debug!(
                        original = report.overall,
                        corrected = regrade.overall,
                        "correction regraded"
                    );
                    history.record(&regrade);
                    let answer = match grader.band(regrade.overall) {
                        GradeBand::Pass => corrected.answer,
                        _ => with_warning(&corrected.answer, &regrade),
                    };
                    (answer, ReflectionOutcome::Corrected)
                }
                Err(e) => {
                    warn!(error = %e, "regrade unavailable");
                    (unverified(&corrected.answer), ReflectionOutcome::Unverified)
                }
            }
        }
    }
}

fn unverified(answer: &str) -> String {
    format!("{answer}\n\n{UNVERIFIED_NOTE}")
}

fn with_warning(answer: &str, report: &ReflectionReport) -> String {
    format!(
        "{answer}\n\n[Note: this answer may be incomplete or imprecise (quality score {:.2})]",
        report.overall
    )
}
