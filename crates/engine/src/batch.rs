use fincat_core::{check_batch_size, CategorizationRequest, CategoryId, MAX_BATCH_SIZE};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::CategorizeError;
use crate::heuristic::{HeuristicScorer, ProbabilityScorer};
use crate::pipeline::{CategorizationResult, Categorizer};
use crate::util::{round_to, whole_millis};

/// Confidence given to the placeholder entry of an isolated failure.
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

/// What happens to the rest of a batch when one item fails to score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchFailureMode {
    /// Abort the whole batch; no partial results.
    #[default]
    FailFast,
    /// Replace the failed item with an "Others" placeholder carrying the error.
    Isolate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    pub max_size: usize,
    pub workers: usize,
    pub failure_mode: BatchFailureMode,
    /// Upper bound for the whole batch. Partial results are discarded on expiry.
    pub timeout: Option<Duration>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_size: MAX_BATCH_SIZE,
            workers: default_workers(),
            failure_mode: BatchFailureMode::FailFast,
            timeout: None,
        }
    }
}

pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItemResult {
    pub index: usize,
    pub category_id: CategoryId,
    pub category_name: String,
    pub confidence_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchItemResult {
    fn scored(index: usize, result: CategorizationResult) -> Self {
        Self {
            index,
            category_id: result.category_id,
            category_name: result.category_name,
            confidence_score: result.confidence_score,
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub results: Vec<BatchItemResult>,
    pub total_inference_time: u64,
    pub avg_inference_time: f64,
}

/// Runs the single-item pipeline over a batch on a bounded pool of blocking
/// tasks and reassembles the results in input order.
pub struct BatchOrchestrator<S: ProbabilityScorer = HeuristicScorer> {
    categorizer: Arc<Categorizer<S>>,
    config: BatchConfig,
}

impl<S: ProbabilityScorer + 'static> BatchOrchestrator<S> {
    pub fn new(categorizer: Arc<Categorizer<S>>, config: BatchConfig) -> Self {
        Self {
            categorizer,
            config,
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn ensure_within_limit(&self, size: usize) -> Result<(), CategorizeError> {
        Ok(check_batch_size(size, self.config.max_size)?)
    }

    pub async fn run(
        &self,
        requests: Vec<CategorizationRequest>,
    ) -> Result<BatchOutcome, CategorizeError> {
        self.ensure_within_limit(requests.len())?;

        let count = requests.len();
        let started = Instant::now();
        let results = match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, self.fan_out(requests))
                .await
                .map_err(|_| CategorizeError::Timeout(limit))??,
            None => self.fan_out(requests).await?,
        };
        let total = whole_millis(started.elapsed());
        let avg = if count == 0 {
            0.0
        } else {
            round_to(total as f64 / count as f64, 2)
        };

        tracing::info!(
            count,
            workers = self.config.workers,
            total_ms = total,
            "batch categorized"
        );

        Ok(BatchOutcome {
            results,
            total_inference_time: total,
            avg_inference_time: avg,
        })
    }

    async fn fan_out(
        &self,
        requests: Vec<CategorizationRequest>,
    ) -> Result<Vec<BatchItemResult>, CategorizeError> {
        let total = requests.len();
        if total == 0 {
            return Ok(Vec::new());
        }
        let workers = self.config.workers.clamp(1, total);
        let chunk_size = total.div_ceil(workers);

        // Blocking tasks cannot be aborted, so chunks poll this token between
        // items. It fires when this future returns early or is dropped on timeout.
        let cancel = CancellationToken::new();
        let _cancel_on_exit = cancel.clone().drop_guard();

        let mut pending = requests.into_iter().enumerate().peekable();
        let mut set = JoinSet::new();
        while pending.peek().is_some() {
            let chunk: Vec<(usize, CategorizationRequest)> =
                pending.by_ref().take(chunk_size).collect();
            let categorizer = Arc::clone(&self.categorizer);
            let mode = self.config.failure_mode;
            let cancel = cancel.clone();
            set.spawn_blocking(move || score_chunk(&categorizer, chunk, mode, &cancel));
        }

        let mut slots: Vec<Option<BatchItemResult>> = vec![None; total];
        while let Some(joined) = set.join_next().await {
            match joined.map_err(|e| CategorizeError::Worker(e.to_string()))? {
                Ok(chunk) => {
                    for item in chunk {
                        let index = item.index;
                        slots[index] = Some(item);
                    }
                }
                // The chunk that cancelled reports the cause.
                Err(CategorizeError::Cancelled) => continue,
                Err(e) => return Err(e),
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| CategorizeError::Worker(format!("no result for index {index}")))
            })
            .collect()
    }
}

fn score_chunk<S: ProbabilityScorer>(
    categorizer: &Categorizer<S>,
    chunk: Vec<(usize, CategorizationRequest)>,
    mode: BatchFailureMode,
    cancel: &CancellationToken,
) -> Result<Vec<BatchItemResult>, CategorizeError> {
    let mut scored = Vec::with_capacity(chunk.len());
    for (index, request) in chunk {
        if cancel.is_cancelled() {
            return Err(CategorizeError::Cancelled);
        }
        match categorizer.categorize(&request) {
            Ok(result) => scored.push(BatchItemResult::scored(index, result)),
            Err(e) if mode == BatchFailureMode::Isolate => {
                tracing::warn!(index, error = %e, "batch item failed, using placeholder");
                scored.push(BatchItemResult {
                    index,
                    category_id: CategoryId::OTHERS,
                    category_name: categorizer.catalog().name(CategoryId::OTHERS).to_string(),
                    confidence_score: FALLBACK_CONFIDENCE,
                    error: Some(e.to_string()),
                });
            }
            Err(e) => {
                cancel.cancel();
                return Err(CategorizeError::BatchItem {
                    index,
                    source: Box::new(e),
                });
            }
        }
    }
    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScoringError;
    use crate::pattern::PatternMatcher;
    use fincat_core::{CategoryCatalog, Decimal, ProbabilityVector, ValidationError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const MERCHANTS: &[&str] = &[
        "zomato", "local cafe", "swiggy bangalore", "uber trip", "dmart", "amazon prime",
        "petrol pump", "city taxi", "netflix", "mystery vendor", "fashion store", "bmtc pass",
    ];

    fn request(merchant: &str) -> CategorizationRequest {
        CategorizationRequest::new(merchant, Decimal::from(100)).unwrap()
    }

    fn requests(n: usize) -> Vec<CategorizationRequest> {
        (0..n).map(|i| request(MERCHANTS[i % MERCHANTS.len()])).collect()
    }

    fn default_categorizer() -> Arc<Categorizer> {
        Arc::new(Categorizer::default())
    }

    fn config(workers: usize) -> BatchConfig {
        BatchConfig {
            workers,
            ..BatchConfig::default()
        }
    }

    /// Heuristic scorer that counts calls and fails on one merchant.
    struct FlakyScorer {
        fail_on: &'static str,
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl FlakyScorer {
        fn new(fail_on: &'static str) -> Self {
            Self { fail_on, calls: AtomicUsize::new(0), delay: None }
        }
    }

    impl ProbabilityScorer for FlakyScorer {
        fn model_id(&self) -> &str {
            "flaky"
        }

        fn score(&self, request: &CategorizationRequest) -> Result<ProbabilityVector, ScoringError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }
            if request.merchant == self.fail_on {
                return Err(ScoringError::Backend("model unavailable".into()));
            }
            HeuristicScorer.score(request)
        }
    }

    fn flaky(scorer: FlakyScorer) -> Arc<Categorizer<FlakyScorer>> {
        Arc::new(Categorizer::new(
            Arc::new(CategoryCatalog::default()),
            PatternMatcher::default(),
            scorer,
        ))
    }

    #[tokio::test]
    async fn results_keep_input_order() {
        let categorizer = default_categorizer();
        let batch = requests(250);
        let expected: Vec<CategoryId> = batch
            .iter()
            .map(|r| categorizer.categorize(r).unwrap().category_id)
            .collect();

        let orchestrator = BatchOrchestrator::new(Arc::clone(&categorizer), config(4));
        let outcome = orchestrator.run(batch).await.unwrap();

        assert_eq!(outcome.results.len(), 250);
        for (i, item) in outcome.results.iter().enumerate() {
            assert_eq!(item.index, i);
            assert_eq!(item.category_id, expected[i]);
            assert!(item.error.is_none());
        }
    }

    #[tokio::test]
    async fn single_worker_matches_parallel_run() {
        let categorizer = default_categorizer();
        let serial = BatchOrchestrator::new(Arc::clone(&categorizer), config(1))
            .run(requests(40))
            .await
            .unwrap();
        let parallel = BatchOrchestrator::new(categorizer, config(8))
            .run(requests(40))
            .await
            .unwrap();
        let strip = |o: &BatchOutcome| {
            o.results
                .iter()
                .map(|r| (r.index, r.category_id, r.confidence_score))
                .collect::<Vec<_>>()
        };
        assert_eq!(strip(&serial), strip(&parallel));
    }

    #[tokio::test]
    async fn more_workers_than_items() {
        let orchestrator = BatchOrchestrator::new(default_categorizer(), config(64));
        let outcome = orchestrator.run(requests(3)).await.unwrap();
        assert_eq!(outcome.results.len(), 3);
    }

    #[tokio::test]
    async fn empty_batch_has_zero_average() {
        let orchestrator = BatchOrchestrator::new(default_categorizer(), config(4));
        let outcome = orchestrator.run(Vec::new()).await.unwrap();
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.avg_inference_time, 0.0);
    }

    #[tokio::test]
    async fn max_size_batch_is_accepted() {
        let orchestrator = BatchOrchestrator::new(default_categorizer(), BatchConfig::default());
        let outcome = orchestrator.run(requests(MAX_BATCH_SIZE)).await.unwrap();
        assert_eq!(outcome.results.len(), MAX_BATCH_SIZE);
        assert_eq!(outcome.results.last().unwrap().index, MAX_BATCH_SIZE - 1);
    }

    #[tokio::test]
    async fn oversized_batch_rejected_before_scoring() {
        let categorizer = flaky(FlakyScorer::new("never"));
        let orchestrator = BatchOrchestrator::new(Arc::clone(&categorizer), config(4));

        let err = orchestrator.run(requests(MAX_BATCH_SIZE + 1)).await.unwrap_err();

        assert!(err.is_validation());
        assert!(matches!(
            err,
            CategorizeError::Validation(ValidationError::BatchTooLarge { size: 1001, max: 1000 })
        ));
        assert_eq!(calls(&categorizer), 0);
    }

    #[tokio::test]
    async fn fail_fast_aborts_whole_batch() {
        let categorizer = flaky(FlakyScorer::new("mystery vendor"));
        let orchestrator = BatchOrchestrator::new(categorizer, config(2));

        let err = orchestrator.run(requests(24)).await.unwrap_err();

        // "mystery vendor" sits at indices 9 and 21, one per worker chunk.
        match err {
            CategorizeError::BatchItem { index, source } => {
                assert!(index == 9 || index == 21, "index {index}");
                assert!(matches!(*source, CategorizeError::Scoring(ScoringError::Backend(_))));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn isolate_mode_returns_placeholders() {
        let categorizer = flaky(FlakyScorer::new("mystery vendor"));
        let orchestrator = BatchOrchestrator::new(
            categorizer,
            BatchConfig {
                failure_mode: BatchFailureMode::Isolate,
                ..config(3)
            },
        );

        let outcome = orchestrator.run(requests(24)).await.unwrap();

        assert_eq!(outcome.results.len(), 24);
        let failed: Vec<usize> = outcome
            .results
            .iter()
            .filter(|r| r.error.is_some())
            .map(|r| r.index)
            .collect();
        assert_eq!(failed, vec![9, 21]);
        let placeholder = &outcome.results[9];
        assert_eq!(placeholder.category_id, CategoryId::OTHERS);
        assert_eq!(placeholder.category_name, "Others");
        assert_eq!(placeholder.confidence_score, FALLBACK_CONFIDENCE);
        assert_eq!(outcome.results[1].category_id, CategoryId(1));
        assert!(outcome.results[1].error.is_none());
    }

    #[tokio::test]
    async fn timeout_fails_whole_batch() {
        let mut scorer = FlakyScorer::new("never");
        scorer.delay = Some(Duration::from_millis(200));
        let orchestrator = BatchOrchestrator::new(
            flaky(scorer),
            BatchConfig {
                timeout: Some(Duration::from_millis(20)),
                ..config(1)
            },
        );

        let err = orchestrator.run(requests(2)).await.unwrap_err();
        assert!(matches!(err, CategorizeError::Timeout(_)));
    }

    fn calls(categorizer: &Categorizer<FlakyScorer>) -> usize {
        categorizer.scorer().calls.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn timeout_stops_pending_items() {
        let mut scorer = FlakyScorer::new("never");
        scorer.delay = Some(Duration::from_millis(50));
        let categorizer = flaky(scorer);
        let orchestrator = BatchOrchestrator::new(
            Arc::clone(&categorizer),
            BatchConfig {
                timeout: Some(Duration::from_millis(20)),
                ..config(1)
            },
        );

        let err = orchestrator.run(requests(20)).await.unwrap_err();
        assert!(matches!(err, CategorizeError::Timeout(_)));
        let at_return = calls(&categorizer);

        tokio::time::sleep(Duration::from_millis(400)).await;
        let later = calls(&categorizer);
        // At most the item already inside the scorer may still finish.
        assert!(later <= at_return + 1, "{at_return} -> {later}");
        assert!(later < 5, "{later}");
    }

    #[tokio::test]
    async fn fail_fast_stops_other_chunks() {
        let mut scorer = FlakyScorer::new("zomato");
        scorer.delay = Some(Duration::from_millis(20));
        let categorizer = flaky(scorer);
        let orchestrator = BatchOrchestrator::new(Arc::clone(&categorizer), config(2));

        // Only the first item fails; the second chunk (20..40) is all valid.
        let mut batch = vec![request("zomato")];
        batch.extend((1..40).map(|_| request("dmart")));

        let err = orchestrator.run(batch).await.unwrap_err();
        assert!(matches!(err, CategorizeError::BatchItem { index: 0, .. }));
        let at_return = calls(&categorizer);

        tokio::time::sleep(Duration::from_millis(400)).await;
        let later = calls(&categorizer);
        assert!(later <= at_return + 1, "{at_return} -> {later}");
        assert!(later < 10, "{later}");
    }

    #[test]
    fn failure_mode_parses_from_snake_case() {
        let mode: BatchFailureMode = serde_json::from_str("\"isolate\"").unwrap();
        assert_eq!(mode, BatchFailureMode::Isolate);
        assert_eq!(BatchFailureMode::default(), BatchFailureMode::FailFast);
    }

    #[test]
    fn isolated_item_serializes_error_only_when_present() {
        let ok = BatchItemResult {
            index: 0,
            category_id: CategoryId(1),
            category_name: "Food & Dining".into(),
            confidence_score: 0.4,
            error: None,
        };
        let json = serde_json::to_value(&ok).unwrap();
        assert!(json.get("error").is_none());
    }
}
