//! Property-based tests for the core invariants
//!
//! 1. Session-key extraction
//! 2. Session indexing preserves per-key record order
//! 3. Train/test splits partition the sessions
//! 4. Sliding-window counts and contents
//! 5. Session-level aggregation of window misses
//! 6. Metric ranges

use bitacora::dataset::{FeatureExtractor, FeatureType, Features, WindowedSampleBuilder};
use bitacora::evaluate::{aggregate_sessions, compute_metrics, top_k, WindowOutcome};
use bitacora::session::{
    extract_session_keys, split_sessions, LoadError, LogRecord, Partition, Session,
    SessionIndexer, SessionMap,
};
use ndarray::Array1;
use proptest::prelude::*;
use std::collections::HashSet;

fn session_map(lengths: &[usize]) -> SessionMap {
    lengths
        .iter()
        .enumerate()
        .map(|(i, &len)| Session {
            key: format!("blk_{}", i),
            templates: (0..len).map(|t| format!("E{}", (t * 7 + i) % 5)).collect(),
            label: (i % 2) as u8,
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_extracted_keys_are_distinct_block_ids(
        ids in prop::collection::vec(-1000i64..1000, 0..6),
        filler in "[a-z ]{0,12}",
    ) {
        let content = ids
            .iter()
            .map(|id| format!("{} blk_{}", filler, id))
            .collect::<Vec<_>>()
            .join(" ");
        let indexer = SessionIndexer::hdfs();
        let keys = extract_session_keys(indexer.pattern(), &content);

        let expected: Vec<String> = ids.iter().fold(Vec::new(), |mut acc, id| {
            let key = format!("blk_{}", id);
            if !acc.contains(&key) {
                acc.push(key);
            }
            acc
        });
        prop_assert_eq!(keys, expected);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_indexing_preserves_record_order(
        assignments in prop::collection::vec((0usize..4, 0usize..6), 0..40),
    ) {
        let records: Vec<LogRecord> = assignments
            .iter()
            .map(|(block, event)| LogRecord::new(format!("op on blk_{}", block), format!("E{}", event)))
            .collect();
        let (sessions, stats) = SessionIndexer::hdfs().index(&records);

        prop_assert_eq!(stats.records, records.len());
        prop_assert_eq!(stats.skipped_records, 0);
        for session in sessions.iter() {
            let expected: Vec<String> = assignments
                .iter()
                .filter(|(block, _)| format!("blk_{}", block) == session.key)
                .map(|(_, event)| format!("E{}", event))
                .collect();
            prop_assert_eq!(&session.templates, &expected);
        }
        prop_assert_eq!(sessions.template_count(), records.len());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_split_partitions_sessions(
        n in 1usize..40,
        ratio in 0.01f64..0.99,
        seed in any::<u64>(),
        random in any::<bool>(),
    ) {
        let sessions = session_map(&vec![3; n]);
        let all: HashSet<String> = sessions.keys().map(str::to_string).collect();
        let partition = if random { Partition::Random } else { Partition::Sequential };

        let n_test = if random {
            ((ratio * n as f64).round() as usize).min(n)
        } else {
            n - (((1.0 - ratio) * n as f64).floor() as usize).min(n)
        };
        let result = split_sessions(sessions.clone(), ratio, partition, seed);
        if n_test == 0 || n_test == n {
            prop_assert!(matches!(result, Err(LoadError::EmptySplit { .. })), "expected EmptySplit error");
            return Ok(());
        }
        let (train, test) = result.unwrap();
        let train_keys: HashSet<String> = train.keys().map(str::to_string).collect();
        let test_keys: HashSet<String> = test.keys().map(str::to_string).collect();

        prop_assert!(train_keys.is_disjoint(&test_keys));
        prop_assert_eq!(&train_keys | &test_keys, all);
        prop_assert_eq!(test.len(), n_test);

        // Same inputs, same split
        let (train_again, _) = split_sessions(sessions.clone(), ratio, partition, seed).unwrap();
        prop_assert_eq!(
            train.keys().collect::<Vec<_>>(),
            train_again.keys().collect::<Vec<_>>()
        );

        if !random {
            let prefix: Vec<&str> = sessions.keys().take(train.len()).collect();
            prop_assert_eq!(train.keys().collect::<Vec<_>>(), prefix);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_window_count_and_contents(
        lengths in prop::collection::vec(0usize..15, 1..8),
        window_size in 1usize..6,
    ) {
        let sessions = session_map(&lengths);
        let extractor = FeatureExtractor::fit(&sessions, FeatureType::Sequentials, false);
        let data = WindowedSampleBuilder::new(&extractor, window_size).build(&sessions);

        let expected: usize = lengths.iter().map(|&t| t.saturating_sub(window_size)).sum();
        prop_assert_eq!(data.len(), expected);
        prop_assert_eq!(data.num_sessions(), lengths.len());

        let mut offset = vec![0usize; lengths.len()];
        for sample in &data {
            let session = sessions.iter().nth(sample.session_idx).unwrap();
            let i = offset[sample.session_idx];
            offset[sample.session_idx] += 1;

            let ids: Vec<usize> = session.templates[i..i + window_size]
                .iter()
                .map(|t| extractor.template_id(t))
                .collect();
            prop_assert_eq!(&sample.features, &Features::Sequentials(ids));
            prop_assert_eq!(
                sample.window_label,
                extractor.template_id(&session.templates[i + window_size])
            );
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_any_miss_flags_the_session(
        windows in prop::collection::vec((0usize..6, any::<bool>(), 0u8..2), 1..50),
    ) {
        // Labels are per session, so take each session's first label
        let mut labels = [None; 6];
        let outcomes: Vec<WindowOutcome> = windows
            .iter()
            .map(|&(session_idx, miss, label)| {
                let label = *labels[session_idx].get_or_insert(label);
                WindowOutcome { session_idx, session_label: label, miss }
            })
            .collect();

        for verdict in aggregate_sessions(&outcomes) {
            let misses = outcomes
                .iter()
                .filter(|o| o.session_idx == verdict.session_idx && o.miss)
                .count();
            prop_assert_eq!(verdict.misses, misses);
            prop_assert_eq!(verdict.predicted, misses > 0);
            prop_assert_eq!(verdict.actual, labels[verdict.session_idx] == Some(1));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_metrics_stay_in_unit_interval(
        pairs in prop::collection::vec((any::<bool>(), any::<bool>()), 0..30),
    ) {
        let predicted: Vec<bool> = pairs.iter().map(|p| p.0).collect();
        let actual: Vec<bool> = pairs.iter().map(|p| p.1).collect();
        let m = compute_metrics(&predicted, &actual);
        for value in [m.precision, m.recall, m.f1] {
            prop_assert!((0.0..=1.0).contains(&value));
        }
        if m.precision > 0.0 && m.recall > 0.0 {
            let harmonic = 2.0 * m.precision * m.recall / (m.precision + m.recall);
            prop_assert!((m.f1 - harmonic).abs() < 1e-9);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_top_k_holds_the_largest_scores(
        scores in prop::collection::vec(-10.0f32..10.0, 1..20),
        k in 1usize..20,
    ) {
        let ranked = top_k(Array1::from(scores.clone()).view(), k);
        prop_assert_eq!(ranked.len(), k.min(scores.len()));

        let threshold = ranked.iter().map(|&i| scores[i]).fold(f32::INFINITY, f32::min);
        for (i, &s) in scores.iter().enumerate() {
            if !ranked.contains(&i) {
                prop_assert!(s <= threshold);
            }
        }
    }
}
