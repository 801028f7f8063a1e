//! Recent-action ring: the last few terminal actions, newest first.
//! Purely observational.

use std::collections::VecDeque;

use chrono::{DateTime, Local};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{ChainStatus, Intent};

pub const RECENT_ACTION_CAPACITY: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentAction {
    pub id: Uuid,
    pub intent: Intent,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_name: Option<String>,
    /// How the action's chain ended; failed writes stay visible as failed.
    pub status: ChainStatus,
    pub timestamp: DateTime<Local>,
}

impl RecentAction {
    pub fn new(intent: Intent, person_name: Option<String>, status: ChainStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            intent,
            label: intent.label().to_string(),
            person_name,
            status,
            timestamp: Local::now(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecentActions {
    items: VecDeque<RecentAction>,
}

impl RecentActions {
    pub fn push(&mut self, action: RecentAction) {
        self.items.push_front(action);
        self.items.truncate(RECENT_ACTION_CAPACITY);
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecentAction> {
        self.items.iter()
    }

    pub fn latest(&self) -> Option<&RecentAction> {
        self.items.front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
