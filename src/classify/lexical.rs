//! Fast lexical classifier: synchronous, no I/O, rule-table driven.
//!
//! Every rule is evaluated. Each intent keeps its best weight; the overall
//! winner only changes on a strictly greater weight, so equal weights
//! resolve to whichever rule was declared first.

use std::sync::LazyLock;
use std::time::Instant;

use regex::{Regex, RegexBuilder};

use super::rules::{Rule, HELP_PATTERNS, RULES};
use crate::models::{ClassificationResult, ClassificationSource, Intent, IntentCandidate};

#[derive(Debug, Clone)]
struct CompiledRule {
    intent: Intent,
    pattern: &'static str,
    weight: f32,
    regex: Regex,
}

fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

fn compile_rules(rules: &[Rule]) -> Result<Vec<CompiledRule>, regex::Error> {
    rules
        .iter()
        .map(|r| {
            Ok(CompiledRule {
                intent: r.intent,
                pattern: r.pattern,
                weight: r.weight.clamp(0.0, 1.0),
                regex: compile(r.pattern)?,
            })
        })
        .collect()
}

static DEFAULT_RULES: LazyLock<Vec<CompiledRule>> =
    LazyLock::new(|| compile_rules(RULES).unwrap());

static HELP_RULES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    HELP_PATTERNS
        .iter()
        .map(|p| (*p, compile(p).unwrap()))
        .collect()
});

/// Tier-one classifier.
#[derive(Debug, Clone)]
pub struct LexicalClassifier {
    rules: Vec<CompiledRule>,
}

impl LexicalClassifier {
    /// Classifier over the built-in bilingual rule table.
    pub fn new() -> Self {
        Self {
            rules: DEFAULT_RULES.clone(),
        }
    }

    /// Classifier over a custom table (declaration order preserved).
    pub fn with_rules(rules: &[Rule]) -> Result<Self, regex::Error> {
        Ok(Self {
            rules: compile_rules(rules)?,
        })
    }

    pub fn classify(&self, text: &str) -> ClassificationResult {
        let start = Instant::now();
        let text = text.trim();

        if let Some((pattern, _)) = HELP_RULES.iter().find(|(_, re)| re.is_match(text)) {
            tracing::debug!(pattern, "Help phrase matched");
            let mut result = ClassificationResult::unknown(ClassificationSource::Local)
                .with_matched(*pattern);
            result.help = true;
            return result.with_elapsed(start.elapsed());
        }

        let mut candidates: Vec<IntentCandidate> = Vec::new();
        let mut best: Option<&CompiledRule> = None;

        for rule in &self.rules {
            if !rule.regex.is_match(text) {
                continue;
            }
            match candidates.iter_mut().find(|c| c.intent == rule.intent) {
                Some(c) if rule.weight > c.weight => c.weight = rule.weight,
                Some(_) => {}
                None => candidates.push(IntentCandidate {
                    intent: rule.intent,
                    weight: rule.weight,
                }),
            }
            if best.map_or(true, |b| rule.weight > b.weight) {
                best = Some(rule);
            }
        }

        // Stable sort: equal weights keep first-declared order.
        candidates.sort_by(|a, b| {
            b.weight
                .partial_cmp(&a.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let result = match best {
            Some(rule) => {
                tracing::debug!(
                    intent = %rule.intent,
                    weight = rule.weight,
                    pattern = rule.pattern,
                    "Lexical rule matched"
                );
                ClassificationResult::new(rule.intent, rule.weight, ClassificationSource::Local)
                    .with_matched(rule.pattern)
            }
            None => ClassificationResult::unknown(ClassificationSource::Local),
        };

        let mut result = result.with_elapsed(start.elapsed());
        result.candidates = candidates;
        result
    }
}

impl Default for LexicalClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str) -> ClassificationResult {
        LexicalClassifier::new().classify(text)
    }

    #[test]
    fn note_command_matches_with_high_weight() {
        let result = classify("notitie jan medicatie gegeven");
        assert_eq!(result.intent, Intent::CreateNote);
        assert_eq!(result.confidence, 0.9);
        assert_eq!(result.source, ClassificationSource::Local);
        assert_eq!(result.matched.as_deref(), Some(r"^(notitie|rapportage|note)\b"));
    }

    #[test]
    fn matching_is_case_insensitive_and_trimmed() {
        let result = classify("   Overdracht ");
        assert_eq!(result.intent, Intent::HandoverSummary);
        assert_eq!(result.confidence, 0.95);
    }

    #[test]
    fn appointment_intents_are_separated() {
        assert_eq!(classify("plan afspraak met piet morgen om 14:00").intent, Intent::CreateAppointment);
        assert_eq!(classify("annuleer de afspraak met piet").intent, Intent::CancelAppointment);
        assert_eq!(classify("verzet afspraak met piet naar vrijdag").intent, Intent::RescheduleAppointment);
        assert_eq!(classify("agenda morgen").intent, Intent::QueryCalendar);
        assert_eq!(classify("zoek maria").intent, Intent::SearchPatient);
    }

    #[test]
    fn no_match_is_unknown_with_zero_confidence() {
        let result = classify("ik heb een gesprek gehad");
        assert_eq!(result.intent, Intent::Unknown);
        assert_eq!(result.confidence, 0.0);
        assert!(result.matched.is_none());
        assert!(result.candidates.is_empty());
    }

    #[test]
    fn help_short_circuits() {
        for text in ["help", "Hulp?", "wat kan ik zeggen"] {
            let result = classify(text);
            assert_eq!(result.intent, Intent::Unknown, "{text}");
            assert!(result.help, "{text}");
            assert_eq!(result.confidence, 0.0);
        }
    }

    #[test]
    fn per_intent_candidates_keep_best_weight() {
        let result = classify("annuleer afspraak");
        assert_eq!(result.intent, Intent::CancelAppointment);
        assert_eq!(result.candidates.len(), 2);
        assert_eq!(result.candidates[0].intent, Intent::CancelAppointment);
        assert_eq!(result.candidates[0].weight, 0.9);
        assert_eq!(result.candidates[1].intent, Intent::CreateAppointment);
        assert_eq!(result.candidates[1].weight, 0.6);
    }

    #[test]
    fn equal_weights_resolve_to_earliest_declared_intent() {
        let rules = [
            Rule { intent: Intent::SearchPatient, pattern: r"\bjan\b", weight: 0.8 },
            Rule { intent: Intent::CreateNote, pattern: r"\bjan\b", weight: 0.8 },
        ];
        let classifier = LexicalClassifier::with_rules(&rules).unwrap();
        let result = classifier.classify("jan");
        assert_eq!(result.intent, Intent::SearchPatient);

        let reversed = [rules[1], rules[0]];
        let classifier = LexicalClassifier::with_rules(&reversed).unwrap();
        assert_eq!(classifier.classify("jan").intent, Intent::CreateNote);
    }

    #[test]
    fn later_rule_wins_only_when_strictly_greater() {
        let rules = [
            Rule { intent: Intent::QueryCalendar, pattern: "agenda", weight: 0.7 },
            Rule { intent: Intent::HandoverSummary, pattern: "agenda", weight: 0.7 },
            Rule { intent: Intent::CreateNote, pattern: "agenda", weight: 0.71 },
        ];
        let classifier = LexicalClassifier::with_rules(&rules).unwrap();
        let result = classifier.classify("agenda");
        assert_eq!(result.intent, Intent::CreateNote);
        assert_eq!(result.candidates[1].intent, Intent::QueryCalendar);
        assert_eq!(result.candidates[2].intent, Intent::HandoverSummary);
    }

    #[test]
    fn custom_weights_are_clamped() {
        let rules = [Rule { intent: Intent::CreateNote, pattern: "x", weight: 3.0 }];
        let classifier = LexicalClassifier::with_rules(&rules).unwrap();
        assert_eq!(classifier.classify("x").confidence, 1.0);
    }

    #[test]
    fn invalid_custom_pattern_is_an_error() {
        let rules = [Rule { intent: Intent::CreateNote, pattern: "(", weight: 0.5 }];
        assert!(LexicalClassifier::with_rules(&rules).is_err());
    }

    #[test]
    fn classification_is_deterministic() {
        let a = classify("verplaats afspraak met jan naar morgen");
        let b = classify("verplaats afspraak met jan naar morgen");
        assert_eq!(a.intent, b.intent);
        assert_eq!(a.confidence, b.confidence);
        assert_eq!(a.matched, b.matched);
        assert_eq!(a.candidates, b.candidates);
    }
}
