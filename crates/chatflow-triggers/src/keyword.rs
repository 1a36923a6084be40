//! KeywordMatcher - Deterministic text-to-flow pre-filter
//!
//! The KeywordMatcher handles:
//! - Literal triggers (`exact` and `contains`) keyed by normalized keyword
//! - One regex trigger slot per flow, tested against the raw text
//! - Priority-based selection with first-registered tie breaking
//!
//! Tables are rebuilt off to the side on `load` and swapped in atomically,
//! so a concurrent `match_text` always sees either the old or the new set.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chatflow_core::{ChatflowError, FlowDefinition, MatchType};
use regex::{Regex, RegexBuilder};
use tracing::{debug, info, warn};

/// Best trigger hit for a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordMatch {
    pub flow_name: String,

    /// Keyword or pattern that matched, as declared
    pub keyword: String,

    pub match_type: MatchType,

    pub priority: i32,
}

/// Outcome of a `load` call
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Triggers now live (regex slots count once per flow)
    pub registered: usize,

    /// Triggers rejected at registration
    pub skipped: Vec<ChatflowError>,
}

#[derive(Debug)]
struct LiteralEntry {
    flow_name: String,
    keyword: String,
    match_type: MatchType,
    case_sensitive: bool,
    priority: i32,
    seq: usize,
}

#[derive(Debug)]
struct RegexEntry {
    pattern: String,
    regex: Regex,
    priority: i32,
    seq: usize,
}

#[derive(Debug, Default)]
struct Tables {
    /// Normalized keyword -> every flow registered under it
    literals: HashMap<String, Vec<LiteralEntry>>,

    /// Flow name -> its single regex trigger
    regexes: HashMap<String, RegexEntry>,
}

impl Tables {
    fn build(flows: &[Arc<FlowDefinition>]) -> (Self, LoadReport) {
        let mut tables = Tables::default();
        let mut report = LoadReport::default();
        let mut seq = 0usize;

        for flow in flows {
            for trigger in &flow.trigger_keywords {
                if trigger.keyword.is_empty() {
                    debug!(flow = %flow.name, "Skipping empty trigger keyword");
                    continue;
                }
                seq += 1;

                match trigger.match_type {
                    MatchType::Exact | MatchType::Contains => {
                        let normalized = if trigger.case_sensitive {
                            trigger.keyword.clone()
                        } else {
                            trigger.keyword.to_lowercase()
                        };
                        tables.literals.entry(normalized).or_default().push(LiteralEntry {
                            flow_name: flow.name.clone(),
                            keyword: trigger.keyword.clone(),
                            match_type: trigger.match_type,
                            case_sensitive: trigger.case_sensitive,
                            priority: trigger.priority,
                            seq,
                        });
                    }
                    MatchType::Regex => {
                        let regex = match RegexBuilder::new(&trigger.keyword)
                            .case_insensitive(!trigger.case_sensitive)
                            .build()
                        {
                            Ok(regex) => regex,
                            Err(e) => {
                                let error = ChatflowError::InvalidTrigger {
                                    flow: flow.name.clone(),
                                    pattern: trigger.keyword.clone(),
                                    reason: e.to_string(),
                                };
                                warn!("{}", error);
                                report.skipped.push(error);
                                continue;
                            }
                        };

                        let entry = RegexEntry {
                            pattern: trigger.keyword.clone(),
                            regex,
                            priority: trigger.priority,
                            seq,
                        };
                        if let Some(previous) = tables.regexes.insert(flow.name.clone(), entry) {
                            debug!(
                                flow = %flow.name,
                                replaced = %previous.pattern,
                                "Later regex trigger replaces earlier one"
                            );
                        }
                    }
                }
            }
        }

        report.registered = tables.literals.values().map(Vec::len).sum::<usize>() + tables.regexes.len();
        (tables, report)
    }
}

/// Keyword matcher over the triggers of a set of flows
pub struct KeywordMatcher {
    tables: ArcSwap<Tables>,
}

impl KeywordMatcher {
    /// Create an empty matcher (matches nothing)
    pub fn new() -> Self {
        Self {
            tables: ArcSwap::from_pointee(Tables::default()),
        }
    }

    /// Create a matcher and load `flows` into it
    pub fn from_flows(flows: &[Arc<FlowDefinition>]) -> Self {
        let matcher = Self::new();
        matcher.load(flows);
        matcher
    }

    /// Replace every table with triggers from `flows`.
    ///
    /// A malformed regex only drops that trigger; it is reported in the
    /// returned `LoadReport` and the rest of the flows still register.
    pub fn load(&self, flows: &[Arc<FlowDefinition>]) -> LoadReport {
        let (tables, report) = Tables::build(flows);
        self.tables.store(Arc::new(tables));
        info!(
            flows = flows.len(),
            triggers = report.registered,
            skipped = report.skipped.len(),
            "Keyword triggers loaded"
        );
        report
    }

    /// Highest-priority trigger hit for `text`, if any
    pub fn match_text(&self, text: &str) -> Option<KeywordMatch> {
        let tables = self.tables.load();
        let trimmed = text.trim();
        let normalized = trimmed.to_lowercase();

        // (priority, seq, match)
        let mut best: Option<(i32, usize, KeywordMatch)> = None;
        let mut consider = |priority: i32, seq: usize, candidate: &dyn Fn() -> KeywordMatch| {
            let better = match &best {
                None => true,
                Some((p, s, _)) => priority > *p || (priority == *p && seq < *s),
            };
            if better {
                best = Some((priority, seq, candidate()));
            }
        };

        for (keyword, entries) in tables.literals.iter() {
            for entry in entries {
                let haystack = if entry.case_sensitive { trimmed } else { normalized.as_str() };
                let hit = match entry.match_type {
                    MatchType::Exact => haystack == keyword,
                    _ => haystack.contains(keyword.as_str()),
                };
                if hit {
                    consider(entry.priority, entry.seq, &|| KeywordMatch {
                        flow_name: entry.flow_name.clone(),
                        keyword: entry.keyword.clone(),
                        match_type: entry.match_type,
                        priority: entry.priority,
                    });
                }
            }
        }

        for (flow_name, entry) in tables.regexes.iter() {
            if entry.regex.is_match(text) {
                consider(entry.priority, entry.seq, &|| KeywordMatch {
                    flow_name: flow_name.clone(),
                    keyword: entry.pattern.clone(),
                    match_type: MatchType::Regex,
                    priority: entry.priority,
                });
            }
        }

        let found = best.map(|(_, _, m)| m);
        if let Some(ref m) = found {
            debug!(flow = %m.flow_name, keyword = %m.keyword, priority = m.priority, "Keyword matched");
        }
        found
    }

    /// Number of live literal triggers plus regex slots
    pub fn len(&self) -> usize {
        let tables = self.tables.load();
        tables.literals.values().map(Vec::len).sum::<usize>() + tables.regexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for KeywordMatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatflow_core::TriggerKeyword;

    fn flow(name: &str, triggers: Vec<TriggerKeyword>) -> Arc<FlowDefinition> {
        let mut flow = FlowDefinition::from_yaml_str(&format!(
            "name: {name}\nsteps:\n  - id: a\n    type: end\n    content: hi\n"
        ))
        .unwrap();
        flow.trigger_keywords = triggers;
        Arc::new(flow)
    }

    fn contains(keyword: &str, priority: i32) -> TriggerKeyword {
        TriggerKeyword::new(keyword, MatchType::Contains, priority)
    }

    #[test]
    fn test_empty_matcher() {
        let matcher = KeywordMatcher::new();
        assert!(matcher.is_empty());
        assert!(matcher.match_text("pricing").is_none());
    }

    #[test]
    fn test_cost_question_hits_pricing() {
        let matcher = KeywordMatcher::from_flows(&[
            flow("support", vec![contains("what", 1)]),
            flow("pricing_inquiry", vec![contains("price", 10), contains("cost", 8)]),
        ]);

        let m = matcher.match_text("what's the cost?").unwrap();
        assert_eq!(m.flow_name, "pricing_inquiry");
        assert_eq!(m.keyword, "cost");
        assert_eq!(m.priority, 8);
    }

    #[test]
    fn test_longer_keyword_needs_its_own_text() {
        let matcher = KeywordMatcher::from_flows(&[
            flow("demo_request", vec![contains("demo", 10)]),
            flow("schedule_demo", vec![contains("schedule demo", 15)]),
        ]);

        let m = matcher.match_text("demo").unwrap();
        assert_eq!(m.flow_name, "demo_request");
        assert_eq!(m.priority, 10);

        let m = matcher.match_text("Can I schedule demo?").unwrap();
        assert_eq!(m.flow_name, "schedule_demo");
    }

    #[test]
    fn test_exact_after_trim_and_lowercase() {
        let matcher = KeywordMatcher::from_flows(&[flow(
            "menu",
            vec![TriggerKeyword::new("Menu", MatchType::Exact, 0)],
        )]);

        assert!(matcher.match_text("  MENU \n").is_some());
        assert!(matcher.match_text("show menu").is_none());
    }

    #[test]
    fn test_tie_goes_to_first_registered() {
        let matcher = KeywordMatcher::from_flows(&[
            flow("first", vec![contains("help", 5)]),
            flow("second", vec![contains("help", 5)]),
        ]);

        for _ in 0..10 {
            assert_eq!(matcher.match_text("help me").unwrap().flow_name, "first");
        }
    }

    #[test]
    fn test_case_sensitive_literal() {
        let mut trigger = contains("VIP", 3);
        trigger.case_sensitive = true;
        let matcher = KeywordMatcher::from_flows(&[flow("vip", vec![trigger])]);

        assert!(matcher.match_text("I am a VIP").is_some());
        assert!(matcher.match_text("I am a vip").is_none());
    }

    #[test]
    fn test_regex_uses_raw_text() {
        let mut trigger = TriggerKeyword::new(r"^Order #\d+$", MatchType::Regex, 4);
        trigger.case_sensitive = true;
        let matcher = KeywordMatcher::from_flows(&[flow("order_status", vec![trigger])]);

        assert!(matcher.match_text("Order #123").is_some());
        // Normalization would have lowercased this; the raw text is tested
        assert!(matcher.match_text("order #123").is_none());
        assert!(matcher.match_text(" Order #123").is_none());
    }

    #[test]
    fn test_regex_case_insensitive_by_default() {
        let matcher = KeywordMatcher::from_flows(&[flow(
            "refund",
            vec![TriggerKeyword::new(r"refund|money back", MatchType::Regex, 2)],
        )]);
        assert_eq!(matcher.match_text("I want my MONEY BACK").unwrap().flow_name, "refund");
    }

    #[test]
    fn test_later_regex_replaces_earlier() {
        let matcher = KeywordMatcher::from_flows(&[flow(
            "billing",
            vec![
                TriggerKeyword::new("invoice", MatchType::Regex, 1),
                TriggerKeyword::new("receipt", MatchType::Regex, 1),
            ],
        )]);

        assert_eq!(matcher.len(), 1);
        assert!(matcher.match_text("invoice please").is_none());
        assert!(matcher.match_text("receipt please").is_some());
    }

    #[test]
    fn test_bad_regex_is_isolated() {
        let matcher = KeywordMatcher::new();
        let report = matcher.load(&[
            flow("broken", vec![TriggerKeyword::new("([unclosed", MatchType::Regex, 50)]),
            flow("pricing", vec![contains("price", 1)]),
        ]);

        assert_eq!(report.skipped.len(), 1);
        assert!(matches!(
            &report.skipped[0],
            ChatflowError::InvalidTrigger { flow, .. } if flow == "broken"
        ));
        assert!(report.skipped[0].is_configuration());
        assert_eq!(report.registered, 1);
        assert_eq!(matcher.match_text("price?").unwrap().flow_name, "pricing");
    }

    #[test]
    fn test_load_replaces_previous_tables() {
        let matcher = KeywordMatcher::from_flows(&[flow("old", vec![contains("hello", 1)])]);
        matcher.load(&[flow("new", vec![contains("bye", 1)])]);

        assert!(matcher.match_text("hello").is_none());
        assert_eq!(matcher.match_text("bye").unwrap().flow_name, "new");
    }

    #[test]
    fn test_empty_keyword_ignored() {
        let matcher = KeywordMatcher::from_flows(&[flow("any", vec![contains("", 100)])]);
        assert!(matcher.is_empty());
        assert!(matcher.match_text("anything").is_none());
    }

    #[test]
    fn test_higher_priority_wins_across_kinds() {
        let matcher = KeywordMatcher::from_flows(&[
            flow("general", vec![contains("help", 1)]),
            flow("urgent", vec![TriggerKeyword::new(r"(?i)urgent", MatchType::Regex, 9)]),
        ]);
        assert_eq!(matcher.match_text("urgent help").unwrap().flow_name, "urgent");
    }
}
