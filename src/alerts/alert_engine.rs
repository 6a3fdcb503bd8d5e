//! Per-rule threshold evaluation with cooldown suppression
//!
//! Each rule is a two-state machine: **Armed** (eligible to fire) and
//! **Cooling** (suppressed). Reaching the threshold while armed constructs a
//! notification and enters Cooling; matches while cooling are counted but
//! never dispatched, so an error burst produces one alert. The engine is
//! owned by a single task, so it needs no synchronization.
//!
//! Window semantics are fixed-window with reset on cooldown exit: re-arming
//! clears the match counter and the window, and within an armed period the
//! counter restarts whenever the window since the first counted match has
//! elapsed.

use crate::config::Rule;
use crate::events::{Classification, Notification, Timestamp};
use chrono::Duration;
use log::{debug, info};

/// A classified event paired with the line text that produced it
///
/// The alert engine needs the text to build a useful notification message;
/// the aggregator does not, so this pairing exists only on the alert path.
#[derive(Debug, Clone)]
pub struct ClassifiedLine {
    pub classification: Classification,
    pub text: String,
}

/// Mutable evaluation state for one rule
#[derive(Debug)]
struct RuleState {
    armed: bool,
    /// Matches counted since the rule last (re)armed or the window reset
    matches: u64,
    /// First counted match of the current window
    window_start: Option<Timestamp>,
    last_fired_at: Option<Timestamp>,
    suppressed_since_last_fire: u64,
}

impl RuleState {
    fn new() -> Self {
        Self {
            armed: true,
            matches: 0,
            window_start: None,
            last_fired_at: None,
            suppressed_since_last_fire: 0,
        }
    }
}

/// Evaluates classified events against the configured rules
pub struct AlertEngine {
    rules: Vec<Rule>,
    states: Vec<RuleState>,
}

impl AlertEngine {
    pub fn new(rules: Vec<Rule>) -> Self {
        let states = rules.iter().map(|_| RuleState::new()).collect();
        Self { rules, states }
    }

    /// Feed one classified event through the engine
    ///
    /// Returns a notification when a rule crosses its threshold while armed.
    pub fn observe(&mut self, event: &ClassifiedLine, now: Timestamp) -> Option<Notification> {
        let rule_name = event.classification.matched_rule.as_deref()?;
        let idx = self.rules.iter().position(|r| r.name == rule_name)?;
        let rule = &self.rules[idx];
        let state = &mut self.states[idx];

        // Cooling -> Armed once the cooldown has elapsed; the match counter
        // and window start over.
        if !state.armed {
            let cooled_down = state
                .last_fired_at
                .map(|fired| now - fired >= Duration::seconds(rule.cooldown_secs as i64))
                .unwrap_or(true);
            if cooled_down {
                debug!("Rule '{}' re-armed", rule.name);
                state.armed = true;
                state.matches = 0;
                state.window_start = None;
            } else {
                state.suppressed_since_last_fire += 1;
                return None;
            }
        }

        // Matches older than the rule's window are not counted: once the
        // window elapses the counter restarts at the current match.
        if let Some(window_secs) = rule.window_secs {
            match state.window_start {
                Some(start) if now - start > Duration::seconds(window_secs as i64) => {
                    state.matches = 0;
                    state.window_start = Some(now);
                }
                None => state.window_start = Some(now),
                _ => {}
            }
        }

        state.matches += 1;
        if state.matches < rule.threshold {
            return None;
        }

        // Threshold reached: fire immediately and enter Cooling.
        info!(
            "Rule '{}' fired after {} matches (threshold {})",
            rule.name, state.matches, rule.threshold
        );
        let notification = Notification {
            rule_name: rule.name.clone(),
            trigger_count: state.matches,
            window_secs: rule.window_secs,
            timestamp: now,
            message: format!(
                "Rule '{}' reached {} matches. Last line: {}",
                rule.name, state.matches, event.text
            ),
        };

        state.armed = false;
        state.last_fired_at = Some(now);
        state.matches = 0;
        state.window_start = None;
        state.suppressed_since_last_fire = 0;

        Some(notification)
    }

    /// Matches suppressed since the rule last fired
    pub fn suppressed_count(&self, rule_name: &str) -> Option<u64> {
        self.rules
            .iter()
            .position(|r| r.name == rule_name)
            .map(|idx| self.states[idx].suppressed_since_last_fire)
    }
}
