//! Relative date/time resolution.
//!
//! The only place a relative label ("morgen", "next week", "friday") turns
//! into a calendar date. Seeded by a `Clock`, never by anything the semantic
//! service says.

use std::sync::{Arc, LazyLock};

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use regex::Regex;

use crate::models::{DateRange, EntitySet, ScheduledDatetime};

// ═══════════════════════════════════════════════════════════
// Clock
// ═══════════════════════════════════════════════════════════

/// Source of "now" for the resolver.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Wall clock in the local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Frozen clock for tests and replays.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

// ═══════════════════════════════════════════════════════════
// Labels
// ═══════════════════════════════════════════════════════════

/// Recognised relative day expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeDay {
    Yesterday,
    Today,
    Tomorrow,
    DayAfterTomorrow,
    ThisWeek,
    NextWeek,
    On(Weekday),
}

const WEEKDAYS: &[(&str, &str, Weekday)] = &[
    ("maandag", "monday", Weekday::Mon),
    ("dinsdag", "tuesday", Weekday::Tue),
    ("woensdag", "wednesday", Weekday::Wed),
    ("donderdag", "thursday", Weekday::Thu),
    ("vrijdag", "friday", Weekday::Fri),
    ("zaterdag", "saturday", Weekday::Sat),
    ("zondag", "sunday", Weekday::Sun),
];

/// Multi-word phrases first so "day after tomorrow" beats "tomorrow".
const PHRASES: &[(&str, RelativeDay)] = &[
    ("day after tomorrow", RelativeDay::DayAfterTomorrow),
    ("deze week", RelativeDay::ThisWeek),
    ("this week", RelativeDay::ThisWeek),
    ("volgende week", RelativeDay::NextWeek),
    ("next week", RelativeDay::NextWeek),
];

const WORDS: &[(&str, RelativeDay)] = &[
    ("overmorgen", RelativeDay::DayAfterTomorrow),
    ("gisteren", RelativeDay::Yesterday),
    ("yesterday", RelativeDay::Yesterday),
    ("vandaag", RelativeDay::Today),
    ("today", RelativeDay::Today),
    ("vanavond", RelativeDay::Today),
    ("tonight", RelativeDay::Today),
    ("morgen", RelativeDay::Tomorrow),
    ("tomorrow", RelativeDay::Tomorrow),
];

impl RelativeDay {
    /// Parse a label in either language, canonical or free form.
    pub fn parse_label(label: &str) -> Option<Self> {
        let normal = label.trim().to_lowercase().replace(['-', '_'], " ");
        if let Some((_, day)) = PHRASES.iter().find(|(p, _)| *p == normal) {
            return Some(*day);
        }
        if let Some((_, day)) = WORDS.iter().find(|(w, _)| *w == normal) {
            return Some(*day);
        }
        WEEKDAYS
            .iter()
            .find(|(nl, en, _)| *nl == normal || *en == normal)
            .map(|(_, _, wd)| RelativeDay::On(*wd))
    }

    /// Stable label stored in entities.
    pub fn canonical(&self) -> &'static str {
        match self {
            Self::Yesterday => "yesterday",
            Self::Today => "today",
            Self::Tomorrow => "tomorrow",
            Self::DayAfterTomorrow => "day-after-tomorrow",
            Self::ThisWeek => "this-week",
            Self::NextWeek => "next-week",
            Self::On(wd) => WEEKDAYS
                .iter()
                .find(|(_, _, d)| d == wd)
                .map(|(_, en, _)| *en)
                .unwrap_or("monday"),
        }
    }

    pub fn is_week(&self) -> bool {
        matches!(self, Self::ThisWeek | Self::NextWeek)
    }
}

/// Find the first day expression in lowercase text.
pub fn find_day_label(lower: &str) -> Option<RelativeDay> {
    if let Some((_, day)) = PHRASES.iter().find(|(p, _)| contains_phrase(lower, p)) {
        return Some(*day);
    }
    for token in lower.split(|c: char| !c.is_alphanumeric()) {
        if token.is_empty() {
            continue;
        }
        if let Some(day) = RelativeDay::parse_label(token) {
            return Some(day);
        }
    }
    None
}

fn contains_phrase(text: &str, phrase: &str) -> bool {
    let words: Vec<&str> = text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()).collect();
    let target: Vec<&str> = phrase.split(' ').collect();
    words.windows(target.len()).any(|w| w == target.as_slice())
}

/// True for any token that is part of a day expression.
pub fn is_temporal_word(token: &str) -> bool {
    let token = token.to_lowercase();
    RelativeDay::parse_label(&token).is_some()
        || PHRASES.iter().any(|(p, _)| p.split(' ').any(|w| w == token))
        || matches!(
            token.as_str(),
            "uur" | "u" | "am" | "pm" | "ochtend" | "middag" | "avond" | "morning" | "afternoon" | "evening"
        )
}

// ═══════════════════════════════════════════════════════════
// Times
// ═══════════════════════════════════════════════════════════

static CLOCK_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([01]?\d|2[0-3])[:.]([0-5]\d)\b").unwrap());
static HOUR_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([01]?\d|2[0-3])\s*(?:u|uur)\b").unwrap());
static TWELVE_HOUR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(1[0-2]|0?[1-9])\s*(am|pm)\b").unwrap());
static OM_HOUR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:om|at)\s+([01]?\d|2[0-3])\b").unwrap());

/// Find the first explicit time of day in lowercase text.
pub fn find_time(lower: &str) -> Option<NaiveTime> {
    if let Some(c) = CLOCK_TIME.captures(lower) {
        return hm(&c[1], &c[2]);
    }
    if let Some(c) = TWELVE_HOUR.captures(lower) {
        let hour: u32 = c[1].parse().ok()?;
        let hour = match (&c[2], hour) {
            ("am", 12) => 0,
            ("am", h) => h,
            ("pm", 12) => 12,
            (_, h) => h + 12,
        };
        return NaiveTime::from_hms_opt(hour, 0, 0);
    }
    if let Some(c) = HOUR_SUFFIX.captures(lower) {
        return hm(&c[1], "0");
    }
    if let Some(c) = OM_HOUR.captures(lower) {
        return hm(&c[1], "0");
    }
    None
}

fn hm(hour: &str, minute: &str) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(hour.parse().ok()?, minute.parse().ok()?, 0)
}

/// Read a scheduling moment (label + time) out of lowercase text.
pub fn scan_datetime(lower: &str) -> Option<ScheduledDatetime> {
    let label = find_day_label(lower).map(|d| d.canonical().to_string());
    let dt = ScheduledDatetime::new(label, find_time(lower));
    (!dt.is_empty()).then_some(dt)
}

// ═══════════════════════════════════════════════════════════
// Resolver
// ═══════════════════════════════════════════════════════════

/// Turns labels into concrete dates relative to its clock.
#[derive(Clone)]
pub struct DateResolver {
    clock: Arc<dyn Clock>,
}

impl DateResolver {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.now().date()
    }

    /// Day-boundary span for a query label.
    ///
    /// Weekday names include today (asking for "friday" on a Friday means
    /// today's agenda).
    pub fn resolve_range(&self, label: &str) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let today = self.today();
        let (first, last) = match RelativeDay::parse_label(label)? {
            RelativeDay::Yesterday => (today - Duration::days(1), today - Duration::days(1)),
            RelativeDay::Today => (today, today),
            RelativeDay::Tomorrow => (today + Duration::days(1), today + Duration::days(1)),
            RelativeDay::DayAfterTomorrow => (today + Duration::days(2), today + Duration::days(2)),
            RelativeDay::ThisWeek => {
                let monday = week_start(today);
                (monday, monday + Duration::days(6))
            }
            RelativeDay::NextWeek => {
                let monday = week_start(today) + Duration::days(7);
                (monday, monday + Duration::days(6))
            }
            RelativeDay::On(wd) => {
                let day = next_weekday(today, wd, true);
                (day, day)
            }
        };
        Some((start_of_day(first), end_of_day(last)))
    }

    /// Single date for a scheduling label.
    ///
    /// Weeks are not a date, and the past cannot be booked, so those give
    /// `None`. Weekday names mean the next such day after today.
    pub fn resolve_date(&self, label: &str) -> Option<NaiveDate> {
        let today = self.today();
        match RelativeDay::parse_label(label)? {
            RelativeDay::Today => Some(today),
            RelativeDay::Tomorrow => Some(today + Duration::days(1)),
            RelativeDay::DayAfterTomorrow => Some(today + Duration::days(2)),
            RelativeDay::On(wd) => Some(next_weekday(today, wd, false)),
            RelativeDay::Yesterday | RelativeDay::ThisWeek | RelativeDay::NextWeek => None,
        }
    }

    /// Recompute every concrete date in `entities` from its label.
    ///
    /// Whatever dates were there before are discarded.
    pub fn resolve_entities(&self, mut entities: EntitySet) -> EntitySet {
        if let Some(range) = entities.date_range.as_mut() {
            self.resolve_range_in_place(range);
        }
        if let Some(dt) = entities.datetime.as_mut() {
            self.resolve_datetime_in_place(dt);
        }
        if let Some(dt) = entities.new_datetime.as_mut() {
            self.resolve_datetime_in_place(dt);
        }
        if let Some(at) = entities.identifier.as_mut().and_then(|id| id.at.as_mut()) {
            self.resolve_datetime_in_place(at);
        }
        entities
    }

    fn resolve_range_in_place(&self, range: &mut DateRange) {
        match self.resolve_range(&range.label) {
            Some((start, end)) => {
                range.start = Some(start);
                range.end = Some(end);
            }
            None => {
                tracing::debug!(label = %range.label, "Unrecognised range label left unresolved");
                range.start = None;
                range.end = None;
            }
        }
    }

    fn resolve_datetime_in_place(&self, dt: &mut ScheduledDatetime) {
        dt.date = dt.date_label.as_deref().and_then(|l| self.resolve_date(l));
    }
}

fn week_start(day: NaiveDate) -> NaiveDate {
    day - Duration::days(day.weekday().num_days_from_monday() as i64)
}

fn next_weekday(from: NaiveDate, target: Weekday, include_today: bool) -> NaiveDate {
    let current = from.weekday().num_days_from_monday() as i64;
    let wanted = target.num_days_from_monday() as i64;
    let mut delta = (wanted - current).rem_euclid(7);
    if delta == 0 && !include_today {
        delta = 7;
    }
    from + Duration::days(delta)
}

fn start_of_day(day: NaiveDate) -> NaiveDateTime {
    day.and_time(NaiveTime::MIN)
}

fn end_of_day(day: NaiveDate) -> NaiveDateTime {
    day.and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN))
}
