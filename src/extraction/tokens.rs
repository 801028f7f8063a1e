//! Token-level helpers: stop words, command tokens, name heuristics.

use super::temporal::is_temporal_word;
use crate::models::NoteCategory;

/// Function words and command tokens never treated as content or names.
const STOP_WORDS: &[&str] = &[
    // Dutch function words
    "de", "het", "een", "en", "of", "van", "voor", "met", "bij", "in", "op", "om", "naar",
    "aan", "over", "tot", "te", "is", "er", "ik", "je", "jij", "u", "we", "wij", "mijn",
    "wat", "welke", "hoeveel", "heb", "heeft", "staat", "graag", "even", "alstublieft", "aub",
    "dit", "dat", "die", "deze", "nog", "ook", "maar", "dan",
    "mevrouw", "meneer", "mw", "dhr", "mevr",
    // English function words
    "the", "a", "an", "and", "for", "with", "of", "on", "at", "to", "from", "my", "me",
    "please", "what", "which", "how", "many", "do", "i", "have", "is", "s",
    "mr", "mrs", "ms",
    // command tokens
    "notitie", "rapportage", "note", "noteer", "rapporteer", "log", "schrijf", "leg", "vast",
    "zoek", "zoeken", "search", "find", "vind", "open", "toon", "show", "dossier",
    "cliëntdossier", "cliënt", "client", "patiënt", "patient",
    "overdracht", "handover", "dienstoverdracht", "overdrachtsverslag", "samenvatting",
    "summary", "dienst", "shift",
    "agenda", "planning", "calendar", "rooster", "afspraken", "appointments",
    "plan", "maak", "boek", "schedule", "book", "afspraak", "appointment", "nieuwe", "new",
    "maken", "inplannen",
    "annuleer", "annuleren", "cancel", "afzeggen", "schrap", "zeg", "af",
    "verzet", "verzetten", "verplaats", "verplaatsen", "verschuif", "reschedule", "move",
];

/// Words that introduce a person ("met Jan", "voor Maria").
const PERSON_PREPOSITIONS: &[&str] = &["van", "voor", "met", "bij", "for", "with", "of"];

/// Closed list of appointment kinds.
pub const APPOINTMENT_TYPES: &[&str] = &[
    "consult",
    "controle",
    "wondcontrole",
    "huisbezoek",
    "intake",
    "evaluatie",
    "bloedafname",
    "checkup",
];

pub fn is_stop_word(token: &str) -> bool {
    let lower = token.to_lowercase();
    STOP_WORDS.contains(&lower.as_str())
}

/// Not a candidate for names or free text.
pub fn is_reserved(token: &str) -> bool {
    is_stop_word(token)
        || is_temporal_word(token)
        || NoteCategory::from_alias(token).is_some()
        || APPOINTMENT_TYPES.contains(&token.to_lowercase().as_str())
}

/// A word of an utterance, with its original spelling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub text: &'a str,
    pub lower: String,
}

impl Token<'_> {
    pub fn is_alphabetic(&self) -> bool {
        self.text.chars().count() >= 2
            && self.text.chars().all(|c| c.is_alphabetic() || c == '-' || c == '\'')
    }

    pub fn is_capitalized(&self) -> bool {
        self.text.chars().next().is_some_and(char::is_uppercase)
    }
}

/// Whitespace tokens with surrounding punctuation trimmed.
pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '#'))
        .filter(|w| !w.is_empty())
        .map(|w| Token {
            text: w,
            lower: w.to_lowercase(),
        })
        .collect()
}

/// Capitalise each part of a name: "jan-willem" → "Jan-Willem".
pub fn capitalize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut upper_next = true;
    for c in raw.chars() {
        if upper_next {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        upper_next = c == '-' || c == ' ';
    }
    out
}

// ═══════════════════════════════════════════════════════════
// Person names
// ═══════════════════════════════════════════════════════════

/// A detected person reference and the token positions it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameMatch {
    pub name: String,
    pub positions: Vec<usize>,
}

/// Person-name heuristics over a reference set of known names.
#[derive(Debug, Clone, Default)]
pub struct NameMatcher {
    /// (lowercase word sequence, canonical spelling)
    known: Vec<(Vec<String>, String)>,
}

impl NameMatcher {
    pub fn new<I, S>(known: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let known = known
            .into_iter()
            .filter_map(|n| {
                let canonical = n.as_ref().trim().to_string();
                let words: Vec<String> =
                    canonical.split_whitespace().map(str::to_lowercase).collect();
                (!words.is_empty()).then_some((words, canonical))
            })
            .collect();
        Self { known }
    }

    /// Find a person, trying in order: the reference set, a capitalised
    /// word sequence, a bare word right after a command or preposition.
    pub fn find(&self, tokens: &[Token<'_>]) -> Option<NameMatch> {
        self.find_from(tokens, false)
    }

    /// Like `find`, but a name may also open the text. Used for short
    /// answers ("Jan", "Piet morgen om 10") where nothing precedes it.
    pub fn find_leading(&self, tokens: &[Token<'_>]) -> Option<NameMatch> {
        self.find_from(tokens, true)
    }

    fn find_from(&self, tokens: &[Token<'_>], leading: bool) -> Option<NameMatch> {
        self.find_known(tokens)
            .or_else(|| find_capitalized(tokens, leading))
            .or_else(|| find_bare(tokens, leading))
    }

    fn find_known(&self, tokens: &[Token<'_>]) -> Option<NameMatch> {
        // Longest reference names first so "Jan de Vries" beats "Jan".
        let mut known: Vec<&(Vec<String>, String)> = self.known.iter().collect();
        known.sort_by_key(|(words, _)| std::cmp::Reverse(words.len()));

        for (words, canonical) in known {
            if words.len() > tokens.len() {
                continue;
            }
            for start in 0..=tokens.len() - words.len() {
                let hit = words
                    .iter()
                    .enumerate()
                    .all(|(i, w)| tokens[start + i].lower == *w);
                if hit {
                    return Some(NameMatch {
                        name: canonical.clone(),
                        positions: (start..start + words.len()).collect(),
                    });
                }
            }
        }
        None
    }
}

fn find_capitalized(tokens: &[Token<'_>], leading: bool) -> Option<NameMatch> {
    let candidate = |t: &Token<'_>| t.is_alphabetic() && t.is_capitalized() && !is_reserved(&t.lower);
    // A capital at the start of a sentence says nothing.
    let skip = usize::from(!leading);
    let start = skip + tokens.iter().skip(skip).position(candidate)?;
    let end = tokens[start..]
        .iter()
        .position(|t| !candidate(t))
        .map_or(tokens.len(), |offset| start + offset);
    let name = tokens[start..end]
        .iter()
        .map(|t| t.text)
        .collect::<Vec<_>>()
        .join(" ");
    Some(NameMatch {
        name,
        positions: (start..end).collect(),
    })
}

fn find_bare(tokens: &[Token<'_>], leading: bool) -> Option<NameMatch> {
    tokens.iter().enumerate().find_map(|(i, t)| {
        if !t.is_alphabetic() || is_reserved(&t.lower) {
            return None;
        }
        if i == 0 {
            return leading.then(|| NameMatch {
                name: capitalize_name(t.text),
                positions: vec![0],
            });
        }
        let introduced = is_stop_word(&tokens[i - 1].lower)
            || PERSON_PREPOSITIONS.contains(&tokens[i - 1].lower.as_str());
        introduced.then(|| NameMatch {
            name: capitalize_name(t.text),
            positions: vec![i],
        })
    })
}
