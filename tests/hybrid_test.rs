//! End-to-end tests for indexing, hybrid retrieval, and evaluation.

use hybrid_retrieval::offline::{FailingRetriever, StaticRetriever};
use hybrid_retrieval::*;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;

// ============================================================================
// Sparse index
// ============================================================================

#[test]
fn test_tfidf_weights_are_frozen_at_index_time() {
    let builder = SparseIndexBuilder::default();
    let doc1 = builder.add_chunk(Chunk::new("doc1", "tao")).unwrap();
    builder.add_chunk(Chunk::new("doc2", "zen")).unwrap();
    let index = builder.finish();

    let tao = index.vocabulary().lookup_id("tao").unwrap();
    assert_eq!(index.frequencies().get(tao), 1);
    assert_eq!(index.frequencies().document_count(), 2);

    // doc1 was weighted when N = 1 and df = 1
    assert_eq!(doc1.weight(tao), Some(1.0));

    // The query is weighted against N = 2, df = 1
    let query = index.query_vector("tao");
    let expected = (3.0f64 / 2.0).ln() as f32 + 1.0;
    assert!((query.weight(tao).unwrap() - expected).abs() < 1e-6);

    let hits = index.search("tao", 5);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id.as_str(), "doc1");
    assert!((hits[0].score - expected).abs() < 1e-6);
}

#[test]
fn test_artifacts_survive_reindex() {
    let dir = TempDir::new().unwrap();
    let indexer = Indexer::new(ArtifactStore::new(dir.path()));

    indexer
        .index_chunks(vec![
            Chunk::new("a", "existential philosophy"),
            Chunk::new("b", "stoic calm"),
        ])
        .unwrap();
    let before = ArtifactStore::new(dir.path()).load().unwrap();

    indexer
        .index_chunks(vec![Chunk::new("c", "philosophy of stoic ethics")])
        .unwrap();
    let after = ArtifactStore::new(dir.path()).load().unwrap();

    for (term, id) in before.vocabulary().to_map() {
        assert_eq!(after.vocabulary().lookup_id(&term), Some(id), "term {term}");
    }
    assert_eq!(after.len(), 1);
    assert_eq!(after.frequencies().document_count(), 1);
}

// ============================================================================
// Hybrid retrieval
// ============================================================================

#[tokio::test]
async fn test_sparse_index_behind_hybrid_searcher() {
    let builder = SparseIndexBuilder::default();
    builder
        .add_chunk(Chunk::new("a", "existential philosophy"))
        .unwrap();
    builder
        .add_chunk(Chunk::new("b", "the meaning of life is open"))
        .unwrap();
    let index = builder.finish();

    let searcher = HybridSearcher::new(
        Arc::new(index),
        Arc::new(StaticRetriever::new(
            Side::Dense,
            vec![
                Hit::new("b", 0.8, "the meaning of life is open"),
                Hit::new("a", 0.3, "existential philosophy"),
            ],
        )),
        HybridConfig::default(),
    )
    .unwrap();

    let response = searcher.search("meaning").await.unwrap();
    assert_eq!(response.status, RetrievalStatus::Complete);
    assert_eq!(response.results[0].id.as_str(), "b");
    assert_eq!(response.results[0].source, Source::Both);
    assert_eq!(response.results[1].source, Source::Dense);
    assert_eq!(response.results[1].score_breakdown.sparse_score, None);
}

#[tokio::test]
async fn test_fusion_is_reproducible() {
    let sparse: Arc<dyn Retriever> = Arc::new(StaticRetriever::new(
        Side::Sparse,
        vec![
            Hit::new("a", 4.2, "kant ethics"),
            Hit::new("b", 1.1, "hume on causation"),
        ],
    ));
    let dense: Arc<dyn Retriever> = Arc::new(StaticRetriever::new(
        Side::Dense,
        vec![
            Hit::new("c", 0.91, "categorical imperative"),
            Hit::new("a", 0.55, "kant ethics"),
        ],
    ));

    for mode in [FusionMode::default(), FusionMode::alpha(0.3), FusionMode::rrf()] {
        let config = HybridConfig::default().with_fusion(mode);
        let searcher =
            HybridSearcher::new(sparse.clone(), dense.clone(), config).unwrap();
        let first = searcher.search("kant ethics").await.unwrap();
        let second = searcher.search("kant ethics").await.unwrap();
        assert_eq!(first, second);
    }
}

#[tokio::test]
async fn test_total_failure_is_not_empty_success() {
    let searcher = HybridSearcher::new(
        Arc::new(FailingRetriever::new(Side::Sparse, "index missing")),
        Arc::new(FailingRetriever::new(Side::Dense, "service down")),
        HybridConfig::default(),
    )
    .unwrap();
    assert!(matches!(
        searcher.search("anything").await,
        Err(Error::AllBackendsFailed { .. })
    ));
}

// ============================================================================
// Evaluation
// ============================================================================

#[tokio::test]
async fn test_literal_evaluation_scenario() {
    let config = EvalConfig {
        k: 2,
        methods: vec![RetrievalMethod::Hybrid],
        ..EvalConfig::default()
    };
    let harness = EvalHarness::new(
        Arc::new(StaticRetriever::new(
            Side::Sparse,
            vec![Hit::new("A", 2.0, "existential philosophy")],
        )),
        Arc::new(StaticRetriever::new(
            Side::Dense,
            vec![Hit::new("B", 0.7, "the meaning of life is open")],
        )),
        config,
    )
    .unwrap();

    let query = EvalQuery::new("existential meaning", &["existential", "meaning of life"]);
    let report = harness.run(&[query]).await;

    let hybrid = report.method(RetrievalMethod::Hybrid).unwrap();
    assert_eq!(hybrid.avg_coverage, 1.0);
    assert_eq!(hybrid.avg_precision, 1.0);
    assert_eq!(hybrid.avg_mrr, 1.0);

    let run = report.queries[0].run(RetrievalMethod::Hybrid).unwrap();
    assert_eq!(run.results.len(), 2);
    assert!(run.results.iter().all(|r| r.relevant));
}

#[tokio::test]
async fn test_offline_evaluation_is_idempotent() {
    let queries = vec![
        EvalQuery::new("existential meaning", &["existential meaning"]),
        EvalQuery::new("stoic virtue", &["stoic"]),
        EvalQuery::new("quantum gravity", &["nothing matches this"]),
    ];

    let harness = EvalHarness::offline(EvalConfig::default()).unwrap();
    let first = harness.run(&queries).await;
    let second = harness.run(&queries).await;

    assert!(first.offline);
    for (a, b) in first.summary.iter().zip(&second.summary) {
        assert_eq!(a.quality(), b.quality());
    }
    for (a, b) in first.queries.iter().zip(&second.queries) {
        for (ra, rb) in a.runs.iter().zip(&b.runs) {
            assert_eq!(ra.metrics, rb.metrics);
            assert_eq!(ra.results, rb.results);
        }
    }

    // "stoic" appears in the first three synthetic hits of every method
    let stoic = &first.queries[1];
    for run in &stoic.runs {
        assert_eq!(run.metrics.unwrap().coverage_at_k, 1.0);
    }
    let quantum = &first.queries[2];
    for run in &quantum.runs {
        assert_eq!(run.metrics.unwrap().coverage_at_k, 0.0);
    }
}
