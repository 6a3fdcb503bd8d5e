//! End-to-end pipeline test: raw lines in, counters and notifications out.

use chrono::Utc;
use sentinel::aggregator::{StatsAggregator, DEFAULT_SAMPLE_CAPACITY};
use sentinel::alerts::{AlertEngine, ClassifiedLine};
use sentinel::classifier::Classifier;
use sentinel::config::Rule;
use sentinel::events::{RawLine, Severity};

fn database_rule(threshold: u64) -> Rule {
    Rule {
        name: "Database".to_string(),
        pattern: "(?i)database.*error".to_string(),
        threshold,
        severity: Severity::Error,
        cooldown_secs: 60,
        window_secs: None,
    }
}

fn raw(seq: u64, text: &str) -> RawLine {
    RawLine {
        source_id: 0,
        seq,
        text: text.to_string(),
        observed_at: Utc::now(),
    }
}

#[test]
fn test_info_and_rule_match_flow_through_pipeline() {
    let rules = vec![database_rule(1)];
    let classifier = Classifier::new(&rules).unwrap();
    let aggregator = StatsAggregator::new(
        vec!["Database".to_string()],
        DEFAULT_SAMPLE_CAPACITY,
        Utc::now(),
    );
    let mut engine = AlertEngine::new(rules);

    let lines = vec![
        raw(0, "[INFO] Service started on port 8080"),
        raw(1, "[ERROR] Database connection failed"),
    ];

    let mut notifications = Vec::new();
    for line in lines {
        let classification = classifier.classify(&line);
        aggregator.record(&classification);
        if classification.matched_rule.is_some() {
            let event = ClassifiedLine {
                classification,
                text: line.text,
            };
            if let Some(n) = engine.observe(&event, Utc::now()) {
                notifications.push(n);
            }
        }
    }

    let totals = aggregator.totals();
    assert_eq!(totals.lines, 2);
    assert_eq!(totals.info, 1);
    assert_eq!(totals.error, 1);
    assert_eq!(totals.errors(), 1);
    assert_eq!(aggregator.rule_count("Database"), Some(1));

    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].rule_name, "Database");
    assert_eq!(notifications[0].trigger_count, 1);
    assert!(notifications[0].message.contains("Database"));
}

#[test]
fn test_burst_is_rate_limited_to_one_notification() {
    let rules = vec![database_rule(1)];
    let classifier = Classifier::new(&rules).unwrap();
    let mut engine = AlertEngine::new(rules);
    let now = Utc::now();

    let mut fired = 0;
    for seq in 0..1000 {
        let line = raw(seq, "[ERROR] Database timeout error on shard 3");
        let classification = classifier.classify(&line);
        assert_eq!(classification.matched_rule.as_deref(), Some("Database"));
        let event = ClassifiedLine {
            classification,
            text: line.text,
        };
        if engine.observe(&event, now).is_some() {
            fired += 1;
        }
    }

    assert_eq!(fired, 1);
    assert_eq!(engine.suppressed_count("Database"), Some(999));
}

#[test]
fn test_structured_lines_counted_by_severity() {
    let classifier = Classifier::new(&[]).unwrap();
    let aggregator = StatsAggregator::new(Vec::new(), DEFAULT_SAMPLE_CAPACITY, Utc::now());

    let lines = vec![
        raw(0, r#"{"level": "info", "msg": "ok"}"#),
        raw(1, r#"{"level": "error", "service": "api", "msg": "boom"}"#),
        raw(2, r#"{"level": "fatal", "msg": "kernel gave up"}"#),
        raw(3, "plain text without keywords"),
    ];
    for line in &lines {
        aggregator.record(&classifier.classify(line));
    }

    let totals = aggregator.totals();
    assert_eq!(totals.lines, 4);
    assert_eq!(totals.info, 2);
    assert_eq!(totals.error, 1);
    assert_eq!(totals.panic, 1);
    assert_eq!(totals.errors(), 2);
}

#[test]
fn test_sample_ring_reflects_recorded_deltas() {
    let classifier = Classifier::new(&[]).unwrap();
    let aggregator = StatsAggregator::new(Vec::new(), 10, Utc::now());

    aggregator.record(&classifier.classify(&raw(0, "[INFO] fine")));
    aggregator.record(&classifier.classify(&raw(1, "[ERROR] not fine")));
    aggregator.tick(Utc::now());

    aggregator.record(&classifier.classify(&raw(2, "[INFO] fine again")));
    aggregator.tick(Utc::now());

    let samples = aggregator.snapshot().samples;
    assert_eq!(samples.len(), 2);
    assert_eq!(samples[0].total_delta, 2);
    assert_eq!(samples[0].error_delta, 1);
    assert_eq!(samples[1].total_delta, 1);
    assert_eq!(samples[1].error_delta, 0);
}
