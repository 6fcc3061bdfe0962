//! The `find_code` pipeline
//!
//! Nine stages: intent detection, dual query embedding, strategy selection,
//! vector search, static hybrid weighting, optional reranking, semantic
//! rescoring, sort/limit, token-bounded response packing. Failures never
//! escape: anything that goes wrong past validation produces a degraded
//! empty response tagged `KEYWORD_FALLBACK`.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use lru::LruCache;

use codeweaver_chunking::{CodeChunk, SearchResult as StoreResult, SparseVec};
use codeweaver_common::{CorrelationId, truncate_to_boundary};
use codeweaver_grammar::AgentTask;
use codeweaver_providers::{ProviderRegistry, QueryVector, RerankResult};

use crate::error::{SearchError, SearchResult};
use crate::intent::{DetectedIntent, IntentType, agent_task_for, detect_intent};
use crate::models::{
    CodeMatch, CodeMatchType, FindCodeRequest, FindCodeResponseSummary, MAX_SUMMARY_CHARS,
    SearchStrategy,
};

/// Static hybrid weights for v0.1.
const DENSE_WEIGHT: f32 = 0.65;
const SPARSE_WEIGHT: f32 = 0.35;

/// Semantic boost magnitude (20% adjustment).
const SEMANTIC_BOOST_FACTOR: f32 = 0.20;

/// Query-response cache size.
const CACHE_SIZE: usize = 100;

type ResponseCache = Mutex<LruCache<String, FindCodeResponseSummary>>;

/// Combine per-slot scores for a hybrid candidate.
pub fn combine_hybrid_score(candidate: &StoreResult) -> f32 {
    let dense = candidate.dense_score.unwrap_or(candidate.score);
    let sparse = candidate.sparse_score.unwrap_or(0.0);
    DENSE_WEIGHT * dense + SPARSE_WEIGHT * sparse
}

/// The per-intent importance dimension used as the semantic boost.
pub fn semantic_boost(chunk: &CodeChunk, intent: IntentType, task: AgentTask) -> Option<f32> {
    let importance = chunk.semantic_class?.importance_scores().for_task(task);
    let boost = match intent {
        IntentType::Debug => importance.debugging,
        IntentType::Implement => (importance.discovery + importance.modification) / 2.0,
        IntentType::Understand => importance.comprehension,
        _ => importance.discovery,
    };
    Some(boost)
}

/// Apply the semantic boost to a base score.
pub fn apply_semantic_boost(base_score: f32, boost: Option<f32>) -> f32 {
    match boost {
        Some(boost) => base_score * (1.0 + boost * SEMANTIC_BOOST_FACTOR),
        None => base_score,
    }
}

/// The find_code service: provider registry plus a small response cache.
pub struct FindCodeService {
    registry: Arc<ProviderRegistry>,
    cache: ResponseCache,
}

impl FindCodeService {
    /// Service over a provider registry.
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(CACHE_SIZE).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    fn cache_key(request: &FindCodeRequest) -> String {
        format!(
            "{}|{:?}|{}|{}|{:?}|{}",
            request.query,
            request.intent,
            request.token_limit,
            request.include_tests,
            request.focus_languages,
            request.max_results
        )
    }

    /// Execute a find_code request.
    ///
    /// Always returns a response; errors degrade to an empty result with
    /// `search_strategy = [KEYWORD_FALLBACK]` and a `"Search failed:"`
    /// summary.
    #[tracing::instrument(skip(self, request), fields(query = %request.query, correlation_id))]
    pub async fn find_code(&self, request: FindCodeRequest) -> FindCodeResponseSummary {
        let start = Instant::now();
        let correlation_id = CorrelationId::new();
        tracing::Span::current().record("correlation_id", correlation_id.to_string());

        // Stage 1 runs before the fallible block so even degraded
        // responses carry the intent.
        let (intent_type, confidence) = match request.intent {
            Some(explicit) => (explicit, 1.0),
            None => {
                let DetectedIntent {
                    intent_type,
                    confidence,
                } = detect_intent(&request.query);
                (intent_type, confidence)
            }
        };
        tracing::info!(
            correlation_id = %correlation_id,
            intent = %intent_type,
            confidence,
            "Query intent resolved"
        );

        if let Err(e) = request.validate() {
            return FindCodeResponseSummary::degraded(
                &e.to_string(),
                Some(intent_type),
                start.elapsed().as_secs_f64() * 1000.0,
            );
        }

        let cache_key = Self::cache_key(&request);
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(cached) = cache.get(&cache_key) {
                tracing::info!(correlation_id = %correlation_id, "Cache hit for query");
                return cached.clone();
            }
        }

        match self
            .run_pipeline(&request, intent_type, &correlation_id)
            .await
        {
            Ok(mut response) => {
                response.execution_time_ms = start.elapsed().as_secs_f64() * 1000.0;
                if let Ok(mut cache) = self.cache.lock() {
                    cache.put(cache_key, response.clone());
                }
                response
            }
            Err(e) => {
                tracing::error!(correlation_id = %correlation_id, "find_code failed: {e}");
                FindCodeResponseSummary::degraded(
                    &e.to_string(),
                    Some(intent_type),
                    start.elapsed().as_secs_f64() * 1000.0,
                )
            }
        }
    }

    /// Stages 2-9. Any error here degrades the response.
    async fn run_pipeline(
        &self,
        request: &FindCodeRequest,
        intent_type: IntentType,
        correlation_id: &CorrelationId,
    ) -> SearchResult<FindCodeResponseSummary> {
        let agent_task = agent_task_for(intent_type);
        let mut strategies: Vec<SearchStrategy> = Vec::new();

        // Stage 2: dual query embedding, in parallel when both configured.
        let dense_provider = self
            .registry
            .get_embedding_provider()
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Dense provider unavailable: {e}");
                None
            });
        let sparse_provider = self
            .registry
            .get_sparse_embedding_provider()
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Sparse provider unavailable: {e}");
                None
            });

        if dense_provider.is_none() && sparse_provider.is_none() {
            return Err(SearchError::NoEmbeddingProviders);
        }

        let query = request.query.as_str();
        let (dense_result, sparse_result) = tokio::join!(
            async {
                match &dense_provider {
                    Some(provider) => Some(provider.embed_query(query).await),
                    None => None,
                }
            },
            async {
                match &sparse_provider {
                    Some(provider) => Some(provider.embed_query(query).await),
                    None => None,
                }
            }
        );

        // Unwrap batch-of-one rows; a failed side degrades to the other.
        let dense_query: Option<Vec<f32>> = match dense_result {
            Some(Ok(batch)) => batch.into_iter().next(),
            Some(Err(e)) => {
                tracing::warn!("Dense embedding failed: {e}");
                if sparse_provider.is_none() {
                    return Err(SearchError::DenseFailedNoFallback(e.to_string()));
                }
                None
            }
            None => None,
        };
        let sparse_query: Option<SparseVec> = match sparse_result {
            Some(Ok(batch)) => batch.into_iter().next(),
            Some(Err(e)) => {
                tracing::warn!("Sparse embedding failed, continuing with dense only: {e}");
                None
            }
            None => None,
        };

        // Stage 3: strategy selection.
        let query_vector = match (dense_query, sparse_query) {
            (Some(dense), Some(sparse)) => {
                strategies.push(SearchStrategy::HybridSearch);
                QueryVector::Hybrid { dense, sparse }
            }
            (Some(dense), None) => {
                strategies.push(SearchStrategy::DenseOnly);
                tracing::warn!("Using dense-only search (sparse embeddings unavailable)");
                QueryVector::Dense(dense)
            }
            (None, Some(sparse)) => {
                strategies.push(SearchStrategy::SparseOnly);
                tracing::warn!("Using sparse-only search (dense unavailable - degraded mode)");
                QueryVector::Sparse(sparse)
            }
            (None, None) => return Err(SearchError::AllEmbeddingsFailed),
        };

        // Stage 4: vector search (over-fetch, post-filter).
        let store = self
            .registry
            .get_vector_store_provider()
            .await
            .map_err(|e| {
                tracing::warn!("Vector store unavailable: {e}");
                SearchError::NoVectorStore
            })?
            .ok_or(SearchError::NoVectorStore)?;

        let mut candidates = store.search(query_vector, None).await?;
        tracing::info!(
            correlation_id = %correlation_id,
            count = candidates.len(),
            "Vector search returned candidates"
        );

        if !request.include_tests {
            candidates.retain(|c| {
                !c.file_path.to_string_lossy().to_lowercase().contains("test")
            });
        }
        if let Some(focus) = &request.focus_languages {
            let focus: std::collections::HashSet<&str> =
                focus.iter().map(String::as_str).collect();
            candidates.retain(|c| {
                c.content
                    .language
                    .is_some_and(|lang| focus.contains(lang.name()))
            });
        }

        // Stage 5: static hybrid weighting.
        if strategies.contains(&SearchStrategy::HybridSearch) {
            for candidate in &mut candidates {
                candidate.score = combine_hybrid_score(candidate);
            }
        }

        // Stage 6: reranking, optional and non-fatal.
        let mut reranked: Option<Vec<RerankResult>> = None;
        if !candidates.is_empty() {
            let reranker = self
                .registry
                .get_reranking_provider()
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!("Reranker unavailable: {e}");
                    None
                });
            if let Some(reranker) = reranker {
                let chunks: Vec<CodeChunk> =
                    candidates.iter().map(|c| c.content.clone()).collect();
                match reranker.rerank(query, &chunks).await {
                    Ok(results) => {
                        strategies.push(SearchStrategy::SemanticRerank);
                        tracing::info!(
                            correlation_id = %correlation_id,
                            count = results.len(),
                            "Reranked candidates"
                        );
                        reranked = Some(results);
                    }
                    Err(e) => {
                        tracing::warn!("Reranking failed, continuing without: {e}");
                    }
                }
            }
        }

        // Stage 7: semantic rescoring.
        let mut scored: Vec<StoreResult> = match reranked {
            Some(results) => results
                .into_iter()
                .filter_map(|rerank| {
                    let candidate = candidates.get(rerank.original_index)?;
                    let boost = semantic_boost(&candidate.content, intent_type, agent_task);
                    let mut updated = candidate.clone();
                    updated.rerank_score = Some(rerank.score);
                    updated.relevance_score = Some(apply_semantic_boost(rerank.score, boost));
                    Some(updated)
                })
                .collect(),
            None => candidates
                .into_iter()
                .map(|mut candidate| {
                    let boost = semantic_boost(&candidate.content, intent_type, agent_task);
                    candidate.relevance_score =
                        Some(apply_semantic_boost(candidate.score, boost));
                    candidate
                })
                .collect(),
        };

        // Stage 8: sort and limit. Backends return candidates unordered.
        scored.sort_by(|a, b| {
            b.effective_score()
                .partial_cmp(&a.effective_score())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let total_matches = scored.len();
        scored.truncate(request.max_results as usize);

        // Stage 9: response packing under the token budget.
        let mut matches: Vec<CodeMatch> = scored.iter().map(result_to_match).collect();
        let token_limit = request.token_limit as usize;
        let mut token_count: usize =
            matches.iter().map(|m| m.content.estimated_tokens()).sum();
        while token_count > token_limit && !matches.is_empty() {
            if let Some(dropped) = matches.pop() {
                token_count -= dropped.content.estimated_tokens().min(token_count);
            }
        }
        let token_count = token_count.min(token_limit);

        let summary = if matches.is_empty() {
            format!("No matches found for query: '{query}'")
        } else {
            let mut top_files: Vec<String> = Vec::new();
            for code_match in matches.iter().take(3) {
                let name = code_match.file.file_name();
                if !top_files.contains(&name) {
                    top_files.push(name);
                }
            }
            format!(
                "Found {} relevant matches for {} query. Top results in: {}",
                matches.len(),
                intent_type,
                top_files.join(", ")
            )
        };
        // The raw query (or a file name) can put a multi-byte character at
        // the cap; clamp on a char boundary.
        let summary = truncate_to_boundary(&summary, MAX_SUMMARY_CHARS).to_string();

        let mut languages_found: Vec<String> = Vec::new();
        for code_match in &matches {
            if let Some(language) = code_match.content.language {
                if !language.is_config_language() {
                    let name = language.name().to_string();
                    if !languages_found.contains(&name) {
                        languages_found.push(name);
                    }
                }
            }
        }

        let total_results = matches.len();
        Ok(FindCodeResponseSummary {
            matches,
            summary,
            query_intent: Some(intent_type),
            total_matches,
            total_results,
            token_count,
            execution_time_ms: 0.0, // stamped by the caller
            search_strategy: strategies,
            languages_found,
        })
    }
}

/// Convert a scored store result into a response match.
fn result_to_match(result: &StoreResult) -> CodeMatch {
    let chunk = result.content.clone();
    let file = codeweaver_chunking::DiscoveredFile::from_content(
        chunk.file_path.clone(),
        chunk.content.as_bytes(),
    );

    let related_symbols = chunk
        .metadata
        .get("symbol")
        .and_then(|v| v.as_str())
        .map(|s| vec![s.to_string()])
        .unwrap_or_default();

    CodeMatch {
        span: chunk.line_range,
        relevance_score: result.effective_score(),
        match_type: CodeMatchType::Semantic,
        related_symbols,
        file,
        content: chunk,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeweaver_chunking::{ChunkSource, Span};
    use codeweaver_grammar::{ExtKind, SemanticClass};
    use uuid::Uuid;

    fn chunk(semantic_class: Option<SemanticClass>) -> CodeChunk {
        let mut chunk = CodeChunk::new(
            "fn demo() {}",
            Span::new(1, 1, Uuid::now_v7()).unwrap(),
            "src/demo.rs",
            ExtKind::from_extension("rs"),
            ChunkSource::SemanticAst,
        );
        chunk.semantic_class = semantic_class;
        chunk
    }

    #[test]
    fn test_hybrid_weight_combination() {
        // dense 0.80, sparse 0.40 -> 0.65*0.80 + 0.35*0.40 = 0.66
        let mut candidate = StoreResult::new(chunk(None), 0.80);
        candidate.dense_score = Some(0.80);
        candidate.sparse_score = Some(0.40);
        let combined = combine_hybrid_score(&candidate);
        assert!((combined - 0.66).abs() < 1e-6);
    }

    #[test]
    fn test_no_boost_without_semantic_class() {
        let boost = semantic_boost(&chunk(None), IntentType::Understand, AgentTask::Comprehension);
        assert!(boost.is_none());
        let final_score = apply_semantic_boost(0.66, boost);
        assert!((final_score - 0.66).abs() < 1e-6);
    }

    #[test]
    fn test_boost_applies_twenty_percent_of_dimension() {
        let tagged = chunk(Some(SemanticClass::DefinitionCallable));
        let boost =
            semantic_boost(&tagged, IntentType::Debug, AgentTask::Debugging).unwrap();
        let final_score = apply_semantic_boost(0.5, Some(boost));
        assert!((final_score - 0.5 * (1.0 + boost * 0.2)).abs() < 1e-6);
        assert!(final_score > 0.5);
    }

    #[test]
    fn test_implement_boost_averages_discovery_and_modification() {
        let tagged = chunk(Some(SemanticClass::DefinitionType));
        let task = agent_task_for(IntentType::Implement);
        let importance = SemanticClass::DefinitionType
            .importance_scores()
            .for_task(task);
        let expected = (importance.discovery + importance.modification) / 2.0;
        let boost = semantic_boost(&tagged, IntentType::Implement, task).unwrap();
        assert!((boost - expected).abs() < 1e-6);
    }
}
