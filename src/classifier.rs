//! Line classification
//!
//! Maps one raw line to exactly one [`Classification`] with bounded work:
//! a structured-JSON fast path first, then a single pass over a combined
//! [`RegexSet`] built from every configured rule pattern plus the built-in
//! severity keywords. Classification is pure; running it twice on the same
//! line always yields the same result.

use crate::config::Rule;
use crate::error::ConfigError;
use crate::events::{Classification, RawLine, Severity, StructuredFields};
use regex::RegexSet;
use serde::Deserialize;

/// Built-in severity keywords matched when no structured field decides
///
/// These are appended after the configured rule patterns in the combined
/// matcher, so rule indices always come first.
const BUILTIN_PATTERNS: &[(&str, Severity)] = &[
    (r"(?i)\berror\b", Severity::Error),
    (r"(?i)\bpanic\b", Severity::Panic),
    (r"(?i)\bfatal\b", Severity::Panic),
    (r"(?i)\bcritical\b", Severity::Error),
    (r"(?i)\bwarn(ing)?\b", Severity::Warning),
];

/// Partial decode target for the structured fast path
///
/// Deserializing into a small struct is cheaper than building a full
/// `serde_json::Value` map; unknown fields are skipped by serde. Aliases
/// cover the common key capitalizations.
#[derive(Deserialize)]
struct PartialRecord {
    #[serde(alias = "Level", alias = "LEVEL")]
    level: Option<String>,
    #[serde(alias = "Severity", alias = "SEVERITY")]
    severity: Option<String>,
    #[serde(alias = "Service", alias = "SERVICE")]
    service: Option<String>,
}

/// Stateless line classifier
///
/// Compiled once at startup; cost per line is independent of the number of
/// configured rules.
pub struct Classifier {
    /// All rule patterns followed by the built-in keyword patterns
    regex_set: RegexSet,
    /// Rule names, parallel to the leading regex_set indices
    rule_names: Vec<String>,
    /// Rule severities, parallel to rule_names
    rule_severities: Vec<Severity>,
}

impl Classifier {
    /// Build the combined matcher from the configured rules
    ///
    /// Patterns were already validated individually at config load; an error
    /// here would indicate a pattern the `RegexSet` builder rejects anyway.
    pub fn new(rules: &[Rule]) -> Result<Self, ConfigError> {
        let patterns: Vec<&str> = rules
            .iter()
            .map(|r| r.pattern.as_str())
            .chain(BUILTIN_PATTERNS.iter().map(|(p, _)| *p))
            .collect();

        let regex_set = RegexSet::new(&patterns).map_err(|e| ConfigError::InvalidPattern {
            rule: "<combined matcher>".to_string(),
            source: e,
        })?;

        Ok(Self {
            regex_set,
            rule_names: rules.iter().map(|r| r.name.clone()).collect(),
            rule_severities: rules.iter().map(|r| r.severity).collect(),
        })
    }

    /// Classify one raw line
    pub fn classify(&self, line: &RawLine) -> Classification {
        self.classify_text(&line.text, line.observed_at)
    }

    /// Classify line text observed at the given time
    pub fn classify_text(
        &self,
        text: &str,
        observed_at: crate::events::Timestamp,
    ) -> Classification {
        // Fast path: structured record with a recognized severity field
        // bypasses pattern matching entirely.
        if text.trim_start().starts_with('{') {
            if let Ok(record) = serde_json::from_str::<PartialRecord>(text) {
                let level = record.level.as_deref().or(record.severity.as_deref());
                if let Some(level) = level {
                    return Classification {
                        severity: severity_from_level(level),
                        matched_rule: None,
                        fields: Some(StructuredFields {
                            level: level.to_string(),
                            service: record.service,
                        }),
                        observed_at,
                    };
                }
            }
        }

        // Fallback: one pass over every pattern. Matched indices come back
        // in ascending order, so the first index below rule_names.len() is
        // the first-defined rule.
        let mut severity = Severity::Info;
        let mut matched_rule = None;
        for idx in self.regex_set.matches(text) {
            let match_severity = if idx < self.rule_names.len() {
                if matched_rule.is_none() {
                    matched_rule = Some(self.rule_names[idx].clone());
                }
                self.rule_severities[idx]
            } else {
                BUILTIN_PATTERNS[idx - self.rule_names.len()].1
            };
            severity = severity.max(match_severity);
        }

        Classification {
            severity,
            matched_rule,
            fields: None,
            observed_at,
        }
    }
}

/// Map a structured level/severity value to a severity tier
fn severity_from_level(level: &str) -> Severity {
    match level.to_ascii_lowercase().as_str() {
        "panic" | "fatal" => Severity::Panic,
        "error" | "critical" => Severity::Error,
        "warn" | "warning" => Severity::Warning,
        _ => Severity::Info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rule(name: &str, pattern: &str, severity: Severity) -> Rule {
        Rule {
            name: name.to_string(),
            pattern: pattern.to_string(),
            threshold: 1,
            severity,
            cooldown_secs: 60,
            window_secs: None,
        }
    }

    fn classify(classifier: &Classifier, text: &str) -> Classification {
        classifier.classify_text(text, Utc::now())
    }

    #[test]
    fn test_structured_fast_path_without_rules() {
        let classifier = Classifier::new(&[]).unwrap();
        let result = classify(&classifier, r#"{"level": "error", "msg": "x"}"#);

        assert_eq!(result.severity, Severity::Error);
        assert!(result.matched_rule.is_none());
        let fields = result.fields.unwrap();
        assert_eq!(fields.level, "error");
    }

    #[test]
    fn test_structured_severity_key_and_service() {
        let classifier = Classifier::new(&[]).unwrap();
        let result = classify(
            &classifier,
            r#"{"severity": "FATAL", "service": "billing"}"#,
        );

        assert_eq!(result.severity, Severity::Panic);
        assert_eq!(result.fields.unwrap().service.as_deref(), Some("billing"));
    }

    #[test]
    fn test_structured_capitalized_key() {
        let classifier = Classifier::new(&[]).unwrap();
        let result = classify(&classifier, r#"{"Level": "warn"}"#);
        assert_eq!(result.severity, Severity::Warning);
    }

    #[test]
    fn test_structured_unknown_level_is_info() {
        let classifier = Classifier::new(&[]).unwrap();
        // A recognized field with an unrecognized value bypasses pattern
        // matching and lands at Info, even though the text contains "error".
        let result = classify(&classifier, r#"{"level": "trace", "msg": "error error"}"#);
        assert_eq!(result.severity, Severity::Info);
        assert!(result.matched_rule.is_none());
    }

    #[test]
    fn test_malformed_json_falls_back_to_patterns() {
        let classifier = Classifier::new(&[]).unwrap();
        let result = classify(&classifier, r#"{"level": "error", broken"#);
        // Not valid JSON, but the keyword matcher still sees "error".
        assert_eq!(result.severity, Severity::Error);
    }

    #[test]
    fn test_json_without_severity_field_falls_back() {
        let classifier = Classifier::new(&[]).unwrap();
        let result = classify(&classifier, r#"{"msg": "kernel panic in module"}"#);
        assert_eq!(result.severity, Severity::Panic);
    }

    #[test]
    fn test_builtin_keywords() {
        let classifier = Classifier::new(&[]).unwrap();
        assert_eq!(
            classify(&classifier, "[ERROR] it broke").severity,
            Severity::Error
        );
        assert_eq!(
            classify(&classifier, "thread 'main' panic at src/lib.rs").severity,
            Severity::Panic
        );
        assert_eq!(
            classify(&classifier, "FATAL: out of memory").severity,
            Severity::Panic
        );
        assert_eq!(
            classify(&classifier, "warning: deprecated flag").severity,
            Severity::Warning
        );
        assert_eq!(
            classify(&classifier, "all systems nominal").severity,
            Severity::Info
        );
    }

    #[test]
    fn test_rule_match_records_name() {
        let rules = vec![rule("Database", "(?i)database.*failure", Severity::Error)];
        let classifier = Classifier::new(&rules).unwrap();

        let result = classify(&classifier, "Database connection failure on host db-1");
        assert_eq!(result.severity, Severity::Error);
        assert_eq!(result.matched_rule.as_deref(), Some("Database"));
    }

    #[test]
    fn test_tie_break_first_rule_highest_severity() {
        let rules = vec![
            rule("First", "timeout", Severity::Warning),
            rule("Second", "timeout", Severity::Panic),
        ];
        let classifier = Classifier::new(&rules).unwrap();

        let result = classify(&classifier, "request timeout after 30s");
        // The first-defined rule gets the match credit, but severity is the
        // highest across every match.
        assert_eq!(result.matched_rule.as_deref(), Some("First"));
        assert_eq!(result.severity, Severity::Panic);
    }

    #[test]
    fn test_rule_and_builtin_combined_severity() {
        let rules = vec![rule("Retry", "retrying", Severity::Warning)];
        let classifier = Classifier::new(&rules).unwrap();

        let result = classify(&classifier, "retrying after FATAL disk failure");
        assert_eq!(result.matched_rule.as_deref(), Some("Retry"));
        assert_eq!(result.severity, Severity::Panic);
    }

    #[test]
    fn test_no_match_is_info() {
        let rules = vec![rule("Database", "(?i)database", Severity::Error)];
        let classifier = Classifier::new(&rules).unwrap();
        let result = classify(&classifier, "user logged in");
        assert_eq!(result.severity, Severity::Info);
        assert!(result.matched_rule.is_none());
        assert!(result.fields.is_none());
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use chrono::Utc;
    use quickcheck_macros::quickcheck;

    // Classification is a pure function: the same text always produces the
    // same result.
    #[quickcheck]
    fn prop_classification_is_idempotent(text: String) -> bool {
        let rules = vec![Rule {
            name: "Any".to_string(),
            pattern: "(?i)fail".to_string(),
            threshold: 1,
            severity: Severity::Error,
            cooldown_secs: 60,
            window_secs: None,
        }];
        let classifier = Classifier::new(&rules).unwrap();

        let at = Utc::now();
        let first = classifier.classify_text(&text, at);
        let second = classifier.classify_text(&text, at);
        first == second
    }

    // Severity never exceeds Panic and matched_rule only names configured
    // rules.
    #[quickcheck]
    fn prop_matched_rule_is_configured(text: String) -> bool {
        let rules = vec![
            Rule {
                name: "A".to_string(),
                pattern: "aaa".to_string(),
                threshold: 1,
                severity: Severity::Warning,
                cooldown_secs: 60,
                window_secs: None,
            },
            Rule {
                name: "B".to_string(),
                pattern: "bbb".to_string(),
                threshold: 1,
                severity: Severity::Error,
                cooldown_secs: 60,
                window_secs: None,
            },
        ];
        let classifier = Classifier::new(&rules).unwrap();
        let result = classifier.classify_text(&text, Utc::now());

        match result.matched_rule.as_deref() {
            None => true,
            Some(name) => name == "A" || name == "B",
        }
    }
}
