//! Entity extraction: pulls typed fields out of an utterance for a given
//! intent. Never fails; anything it cannot find is simply absent.

pub mod temporal;
pub mod tokens;

pub use temporal::{Clock, DateResolver, FixedClock, RelativeDay, SystemClock};
pub use tokens::{NameMatch, NameMatcher};

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{AppointmentIdentifier, DateRange, EntitySet, Intent, NoteCategory};
use temporal::{find_day_label, is_temporal_word, scan_datetime};
use tokens::{is_stop_word, tokenize, Token, APPOINTMENT_TYPES};

static RECORD_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:#|\bdossier(?:nummer)?\s+|\brecord\s+|\bcl-)(\d{3,})").unwrap()
});

static LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:in|locatie|location)\s+((?:kamer|room)\s+\d+[a-z]?|\p{L}[\p{L}-]*)").unwrap()
});

static RESCHEDULE_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:naar|to)\b").unwrap());

/// Intent-aware entity extractor.
#[derive(Clone)]
pub struct EntityExtractor {
    names: NameMatcher,
    resolver: DateResolver,
}

impl EntityExtractor {
    pub fn new<S: AsRef<str>>(known_names: &[S], resolver: DateResolver) -> Self {
        Self {
            names: NameMatcher::new(known_names),
            resolver,
        }
    }

    pub fn resolver(&self) -> &DateResolver {
        &self.resolver
    }

    /// Extract the fields `intent` cares about from one utterance.
    pub fn extract(&self, original: &str, lower: &str, intent: Intent) -> EntitySet {
        self.extract_with(original, lower, intent, false)
    }

    /// Extract from a short clarification answer for an already known
    /// intent. Unlike a command, the answer may open with the name.
    pub fn extract_answer(&self, answer: &str, intent: Intent) -> EntitySet {
        let answer = answer.trim();
        self.extract_with(answer, &answer.to_lowercase(), intent, true)
    }

    /// Fill per-intent defaults, then recompute every concrete date from
    /// its label with the local resolver.
    pub fn finalize(&self, intent: Intent, mut entities: EntitySet) -> EntitySet {
        if matches!(intent, Intent::QueryCalendar | Intent::HandoverSummary)
            && entities.date_range.is_none()
        {
            entities.date_range = Some(DateRange::unresolved(RelativeDay::Today.canonical()));
        }
        self.resolver.resolve_entities(entities)
    }

    fn extract_with(&self, original: &str, lower: &str, intent: Intent, leading: bool) -> EntitySet {
        let tokens = tokenize(original);
        let person = if leading {
            self.names.find_leading(&tokens)
        } else {
            self.names.find(&tokens)
        };

        match intent {
            Intent::CreateNote => note_entities(&tokens, person),
            Intent::SearchPatient => search_entities(&tokens, lower, person),
            Intent::HandoverSummary | Intent::QueryCalendar => EntitySet {
                person_name: person.map(|p| p.name),
                date_range: find_day_label(lower).map(|d| DateRange::unresolved(d.canonical())),
                ..Default::default()
            },
            Intent::CreateAppointment => appointment_entities(&tokens, lower, person),
            Intent::CancelAppointment => {
                let identifier = AppointmentIdentifier {
                    person_name: person.map(|p| p.name),
                    at: scan_datetime(lower),
                };
                EntitySet {
                    identifier: (identifier != AppointmentIdentifier::default()).then_some(identifier),
                    ..Default::default()
                }
            }
            Intent::RescheduleAppointment => reschedule_entities(lower, person),
            Intent::Unknown => EntitySet::default(),
        }
    }
}

fn note_entities(tokens: &[Token<'_>], person: Option<NameMatch>) -> EntitySet {
    let category = tokens
        .iter()
        .enumerate()
        .find_map(|(i, t)| NoteCategory::from_alias(&t.lower).map(|c| (i, c)));

    let mut consumed: Vec<usize> = person.as_ref().map(|p| p.positions.clone()).unwrap_or_default();
    if let Some((i, _)) = category {
        consumed.push(i);
    }

    EntitySet {
        person_name: person.map(|p| p.name),
        category: category.map(|(_, c)| c),
        free_text: remaining_text(tokens, &consumed),
        ..Default::default()
    }
}

fn search_entities(tokens: &[Token<'_>], lower: &str, person: Option<NameMatch>) -> EntitySet {
    let record_id = RECORD_ID.captures(lower).map(|c| c[1].to_string());
    let consumed: Vec<usize> = match &record_id {
        Some(id) => tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| t.lower.contains(id.as_str()))
            .map(|(i, _)| i)
            .collect(),
        None => Vec::new(),
    };

    EntitySet {
        person_name: person.map(|p| p.name),
        record_id,
        free_text: remaining_text(tokens, &consumed),
        ..Default::default()
    }
}

fn appointment_entities(tokens: &[Token<'_>], lower: &str, person: Option<NameMatch>) -> EntitySet {
    let appointment_type = tokens
        .iter()
        .find(|t| APPOINTMENT_TYPES.contains(&t.lower.as_str()))
        .map(|t| t.lower.clone());

    EntitySet {
        person_name: person.map(|p| p.name),
        datetime: scan_datetime(lower),
        appointment_type,
        location: find_location(lower),
        ..Default::default()
    }
}

/// "verzet X van 10:00 naar vrijdag 11:00": the part before the split
/// word identifies the appointment, the part after is the new moment.
fn reschedule_entities(lower: &str, person: Option<NameMatch>) -> EntitySet {
    let (old_part, new_part) = match RESCHEDULE_SPLIT.find(lower) {
        Some(m) => (&lower[..m.start()], &lower[m.end()..]),
        None => ("", lower),
    };

    let identifier = AppointmentIdentifier {
        person_name: person.map(|p| p.name),
        at: scan_datetime(old_part),
    };
    EntitySet {
        identifier: (identifier != AppointmentIdentifier::default()).then_some(identifier),
        new_datetime: scan_datetime(new_part),
        ..Default::default()
    }
}

/// Non-stop-word tokens not already claimed, joined with spaces.
fn remaining_text(tokens: &[Token<'_>], consumed: &[usize]) -> Option<String> {
    let words: Vec<&str> = tokens
        .iter()
        .enumerate()
        .filter(|(i, t)| !consumed.contains(i) && !is_stop_word(&t.lower))
        .map(|(_, t)| t.text)
        .collect();
    (!words.is_empty()).then(|| words.join(" "))
}

fn find_location(lower: &str) -> Option<String> {
    LOCATION.captures_iter(lower).find_map(|c| {
        let place = c[1].to_string();
        let first = place.split_whitespace().next().unwrap_or_default();
        (!is_temporal_word(first) && !is_stop_word(first)).then_some(place)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use std::sync::Arc;

    fn extractor() -> EntityExtractor {
        let now = NaiveDate::from_ymd_opt(2026, 10, 16)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        EntityExtractor::new(
            &["Jan", "Maria de Boer"],
            DateResolver::new(Arc::new(FixedClock(now))),
        )
    }

    fn extract(text: &str, intent: Intent) -> EntitySet {
        extractor().extract(text, &text.to_lowercase(), intent)
    }

    #[test]
    fn note_scenario_fields() {
        let e = extract("notitie jan medicatie gegeven", Intent::CreateNote);
        assert_eq!(e.person_name.as_deref(), Some("Jan"));
        assert_eq!(e.category, Some(NoteCategory::Medication));
        assert_eq!(e.free_text.as_deref(), Some("gegeven"));
    }

    #[test]
    fn note_without_person_has_no_name() {
        let e = extract("notitie medicatie gegeven", Intent::CreateNote);
        assert!(e.person_name.is_none());
        assert_eq!(e.category, Some(NoteCategory::Medication));
        assert_eq!(e.free_text.as_deref(), Some("gegeven"));
    }

    #[test]
    fn note_keeps_original_casing_in_content() {
        let e = extract("notitie Maria de Boer wond Verband vervangen", Intent::CreateNote);
        assert_eq!(e.person_name.as_deref(), Some("Maria de Boer"));
        assert_eq!(e.category, Some(NoteCategory::WoundCare));
        assert_eq!(e.free_text.as_deref(), Some("Verband vervangen"));
    }

    #[test]
    fn search_reads_record_id_and_query() {
        let e = extract("zoek dossier 12345", Intent::SearchPatient);
        assert_eq!(e.record_id.as_deref(), Some("12345"));
        assert!(e.free_text.is_none());

        let e = extract("zoek maria", Intent::SearchPatient);
        assert_eq!(e.person_name.as_deref(), Some("Maria"));
        assert_eq!(e.free_text.as_deref(), Some("maria"));
    }

    #[test]
    fn calendar_reads_range_label() {
        let e = extract("agenda volgende week", Intent::QueryCalendar);
        assert_eq!(e.date_range.unwrap().label, "next-week");
    }

    #[test]
    fn finalize_defaults_calendar_to_today_and_resolves() {
        let x = extractor();
        let e = x.finalize(Intent::QueryCalendar, extract("agenda", Intent::QueryCalendar));
        let range = e.date_range.unwrap();
        assert_eq!(range.label, "today");
        assert_eq!(range.start().unwrap().date(), NaiveDate::from_ymd_opt(2026, 10, 16).unwrap());
    }

    #[test]
    fn appointment_fields() {
        let e = extract(
            "plan huisbezoek met piet morgen om 14:00 in kamer 3",
            Intent::CreateAppointment,
        );
        assert_eq!(e.person_name.as_deref(), Some("Piet"));
        assert_eq!(e.appointment_type.as_deref(), Some("huisbezoek"));
        assert_eq!(e.location.as_deref(), Some("kamer 3"));
        let dt = e.datetime.unwrap();
        assert_eq!(dt.date_label.as_deref(), Some("tomorrow"));
        assert_eq!(dt.time, NaiveTime::from_hms_opt(14, 0, 0));
        assert_eq!(dt.resolved_date(), None, "extraction alone never resolves");
    }

    #[test]
    fn appointment_without_time() {
        let e = extract("plan afspraak met piet morgen", Intent::CreateAppointment);
        let dt = e.datetime.unwrap();
        assert!(dt.time.is_none());
        assert!(e.location.is_none());
    }

    #[test]
    fn cancel_identifies_by_name_and_time() {
        let e = extract("annuleer afspraak met piet om 10:00", Intent::CancelAppointment);
        let id = e.identifier.unwrap();
        assert_eq!(id.person_name.as_deref(), Some("Piet"));
        assert_eq!(id.at.unwrap().time, NaiveTime::from_hms_opt(10, 0, 0));
    }

    #[test]
    fn cancel_without_reference_has_no_identifier() {
        let e = extract("annuleer afspraak", Intent::CancelAppointment);
        assert!(e.identifier.is_none());
    }

    #[test]
    fn reschedule_splits_old_and_new() {
        let e = extract(
            "verzet afspraak met jan van 10:00 naar vrijdag om 11 uur",
            Intent::RescheduleAppointment,
        );
        let id = e.identifier.unwrap();
        assert_eq!(id.person_name.as_deref(), Some("Jan"));
        assert_eq!(id.at.unwrap().time, NaiveTime::from_hms_opt(10, 0, 0));
        let new = e.new_datetime.unwrap();
        assert_eq!(new.date_label.as_deref(), Some("friday"));
        assert_eq!(new.time, NaiveTime::from_hms_opt(11, 0, 0));
    }

    #[test]
    fn reschedule_without_split_word_targets_new_time() {
        let e = extract("verplaats jan morgen 9:30", Intent::RescheduleAppointment);
        assert_eq!(e.identifier.unwrap().person_name.as_deref(), Some("Jan"));
        assert_eq!(e.new_datetime.unwrap().time, NaiveTime::from_hms_opt(9, 30, 0));
    }

    #[test]
    fn finalize_resolves_every_datetime() {
        let x = extractor();
        let e = extract("verzet afspraak met jan naar morgen om 11:00", Intent::RescheduleAppointment);
        let e = x.finalize(Intent::RescheduleAppointment, e);
        assert_eq!(
            e.new_datetime.unwrap().resolved_date(),
            NaiveDate::from_ymd_opt(2026, 10, 17)
        );
    }

    #[test]
    fn answer_may_open_with_name() {
        let e = extractor().extract_answer("piet morgen om 10", Intent::CreateAppointment);
        assert_eq!(e.person_name.as_deref(), Some("Piet"));
        assert_eq!(e.datetime.unwrap().time, NaiveTime::from_hms_opt(10, 0, 0));

        let e = extract("zet iets klaar voor piet", Intent::CreateAppointment);
        assert_eq!(e.person_name.as_deref(), Some("Piet"));
    }

    #[test]
    fn unknown_intent_extracts_nothing() {
        assert!(extract("ik heb een gesprek gehad", Intent::Unknown).is_empty());
    }
}
