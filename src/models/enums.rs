use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A string that does not name any variant of a closed enumeration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {field} value: {value}")]
pub struct InvalidEnum {
    pub field: &'static str,
    pub value: String,
}

/// Macro to generate a closed enum with as_str + FromStr + string serde.
macro_rules! str_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = InvalidEnum;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InvalidEnum {
                        field: stringify!($name),
                        value: s.into(),
                    }),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

str_enum!(
    /// Closed set of clinical actions the command layer can recognise.
    Intent {
        CreateNote => "create-note",
        SearchPatient => "search-patient",
        HandoverSummary => "handover-summary",
        QueryCalendar => "query-calendar",
        CreateAppointment => "create-appointment",
        CancelAppointment => "cancel-appointment",
        RescheduleAppointment => "reschedule-appointment",
        Unknown => "unknown",
    }
);

impl Intent {
    /// Calendar and appointment intents run through the date/time resolver.
    pub fn is_scheduling(&self) -> bool {
        matches!(
            self,
            Self::QueryCalendar
                | Self::CreateAppointment
                | Self::CancelAppointment
                | Self::RescheduleAppointment
        )
    }

    /// Human-readable (Dutch) label used for artifact titles and history.
    pub fn label(&self) -> &'static str {
        match self {
            Self::CreateNote => "Notitie",
            Self::SearchPatient => "Cliënt zoeken",
            Self::HandoverSummary => "Overdracht",
            Self::QueryCalendar => "Agenda",
            Self::CreateAppointment => "Nieuwe afspraak",
            Self::CancelAppointment => "Afspraak annuleren",
            Self::RescheduleAppointment => "Afspraak verzetten",
            Self::Unknown => "Onbekend",
        }
    }
}

str_enum!(UtteranceSource {
    Typed => "typed",
    Spoken => "spoken",
});

str_enum!(ClassificationSource {
    Local => "local",
    Semantic => "semantic",
});

str_enum!(
    /// Reporting categories for a clinical note.
    NoteCategory {
        Medication => "medicatie",
        WoundCare => "wondzorg",
        Vitals => "vitale_functies",
        Nutrition => "voeding",
        Mobility => "mobiliteit",
        PersonalCare => "adl",
        Elimination => "uitscheiding",
        Observation => "observatie",
        Psychosocial => "psychosociaal",
    }
);

/// Alias → category. Aliases are lowercase single tokens.
const CATEGORY_ALIASES: &[(&str, NoteCategory)] = &[
    ("medicatie", NoteCategory::Medication),
    ("medicijnen", NoteCategory::Medication),
    ("medicijn", NoteCategory::Medication),
    ("medication", NoteCategory::Medication),
    ("meds", NoteCategory::Medication),
    ("wondzorg", NoteCategory::WoundCare),
    ("wond", NoteCategory::WoundCare),
    ("wound", NoteCategory::WoundCare),
    ("vitale_functies", NoteCategory::Vitals),
    ("vitaal", NoteCategory::Vitals),
    ("vitals", NoteCategory::Vitals),
    ("bloeddruk", NoteCategory::Vitals),
    ("temperatuur", NoteCategory::Vitals),
    ("pols", NoteCategory::Vitals),
    ("voeding", NoteCategory::Nutrition),
    ("eten", NoteCategory::Nutrition),
    ("vocht", NoteCategory::Nutrition),
    ("nutrition", NoteCategory::Nutrition),
    ("mobiliteit", NoteCategory::Mobility),
    ("mobility", NoteCategory::Mobility),
    ("transfer", NoteCategory::Mobility),
    ("val", NoteCategory::Mobility),
    ("adl", NoteCategory::PersonalCare),
    ("verzorging", NoteCategory::PersonalCare),
    ("wassen", NoteCategory::PersonalCare),
    ("uitscheiding", NoteCategory::Elimination),
    ("ontlasting", NoteCategory::Elimination),
    ("urine", NoteCategory::Elimination),
    ("observatie", NoteCategory::Observation),
    ("observation", NoteCategory::Observation),
    ("psychosociaal", NoteCategory::Psychosocial),
    ("stemming", NoteCategory::Psychosocial),
    ("mood", NoteCategory::Psychosocial),
];

impl NoteCategory {
    /// Map a lowercase token or canonical name onto a category.
    pub fn from_alias(token: &str) -> Option<Self> {
        let token = token.trim().to_lowercase();
        CATEGORY_ALIASES
            .iter()
            .find(|(alias, _)| *alias == token)
            .map(|(_, category)| *category)
    }
}

str_enum!(StepStatus {
    Pending => "pending",
    Executing => "executing",
    Success => "success",
    Failed => "failed",
});

impl StepStatus {
    /// Steps only move forward: pending → executing → success | failed.
    pub fn can_transition_to(&self, next: StepStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Executing)
                | (Self::Executing, Self::Success)
                | (Self::Executing, Self::Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

str_enum!(ChainStatus {
    Pending => "pending",
    Running => "running",
    Completed => "completed",
    Failed => "failed",
});

str_enum!(NudgeStatus {
    Proposed => "proposed",
    Accepted => "accepted",
    Dismissed => "dismissed",
});
