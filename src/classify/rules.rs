//! Rule table for the fast lexical classifier.
//!
//! Pure data: (intent, pattern, weight) in declaration order. Patterns are
//! matched case-insensitively against the trimmed utterance. Declaration
//! order is the tie-break: on equal weight the earlier rule keeps the win,
//! so reorder with care.

use crate::models::Intent;

/// One row of the table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rule {
    pub intent: Intent,
    pub pattern: &'static str,
    pub weight: f32,
}

const fn rule(intent: Intent, pattern: &'static str, weight: f32) -> Rule {
    Rule {
        intent,
        pattern,
        weight,
    }
}

pub const RULES: &[Rule] = &[
    // ── create-note ──────────────────────────────────────────
    rule(Intent::CreateNote, r"^(notitie|rapportage|note)\b", 0.9),
    rule(Intent::CreateNote, r"^(noteer|rapporteer|log)\b", 0.85),
    rule(Intent::CreateNote, r"\b(notitie|rapportage)\b", 0.75),
    rule(Intent::CreateNote, r"\b(schrijf op|leg vast|vastleggen)\b", 0.6),
    // ── search-patient ───────────────────────────────────────
    rule(Intent::SearchPatient, r"^(zoek|search|find|vind)\b", 0.9),
    rule(
        Intent::SearchPatient,
        r"^(open|toon|show)\b.*\b(dossier|cliënt|client|patiënt|patient)\b",
        0.9,
    ),
    rule(Intent::SearchPatient, r"\b(dossier|cliëntdossier)\b", 0.7),
    rule(Intent::SearchPatient, r"\b(zoek|zoeken)\b", 0.65),
    // ── handover-summary ─────────────────────────────────────
    rule(Intent::HandoverSummary, r"^(overdracht|handover)\b", 0.95),
    rule(
        Intent::HandoverSummary,
        r"\b(overdracht|handover|dienstoverdracht|overdrachtsverslag)\b",
        0.85,
    ),
    rule(Intent::HandoverSummary, r"\b(samenvatting|summary)\b.*\b(dienst|shift)\b", 0.8),
    // ── query-calendar ───────────────────────────────────────
    rule(Intent::QueryCalendar, r"^(agenda|planning|calendar|rooster)\b", 0.9),
    rule(
        Intent::QueryCalendar,
        r"\b(wat staat er|wat heb ik|what'?s on|what do i have)\b",
        0.85,
    ),
    rule(
        Intent::QueryCalendar,
        r"\b(welke|hoeveel|which|how many) (afspraken|appointments)\b",
        0.85,
    ),
    rule(Intent::QueryCalendar, r"\b(agenda|planning|calendar)\b", 0.7),
    // ── create-appointment ───────────────────────────────────
    rule(
        Intent::CreateAppointment,
        r"^(plan|maak|boek|schedule|book)\b.*\b(afspraak|appointment|consult|huisbezoek|controle)\b",
        0.9,
    ),
    rule(
        Intent::CreateAppointment,
        r"\b(nieuwe afspraak|new appointment|afspraak maken|afspraak inplannen|inplannen)\b",
        0.9,
    ),
    rule(Intent::CreateAppointment, r"\b(afspraak|appointment)\b", 0.6),
    // ── cancel-appointment ───────────────────────────────────
    rule(
        Intent::CancelAppointment,
        r"\b(annuleer|annuleren|cancel|afzeggen|schrap)\b",
        0.9,
    ),
    rule(Intent::CancelAppointment, r"\bzeg\b.*\baf\b", 0.85),
    // ── reschedule-appointment ───────────────────────────────
    rule(
        Intent::RescheduleAppointment,
        r"\b(verzet|verzetten|verplaats|verplaatsen|verschuif|reschedule)\b",
        0.9,
    ),
    rule(
        Intent::RescheduleAppointment,
        r"\bmove\b.*\b(appointment|afspraak)\b",
        0.85,
    ),
];

/// Checked before the main table; a hit short-circuits to a help answer.
pub const HELP_PATTERNS: &[&str] = &[
    r"^(help|hulp|\?)\W*$",
    r"^(help|hulp)\b",
    r"\b(wat kan ik (zeggen|vragen)|what can i say|hoe werkt dit|how does this work)\b",
];

/// Example commands shown in a help answer.
pub const HELP_EXAMPLES: &[&str] = &[
    "notitie jan medicatie gegeven",
    "zoek dossier van maria",
    "overdracht",
    "agenda morgen",
    "plan afspraak met piet morgen om 14:00",
    "annuleer afspraak met piet",
    "verzet afspraak met piet naar vrijdag om 10 uur",
];
