//! Open action panels.
//!
//! At most three at once. Opening a fourth evicts the oldest (strict FIFO by
//! opening order, not by use). One artifact, or none, is active.

use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{EntitySet, Intent};

pub const MAX_OPEN_ARTIFACTS: usize = 3;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArtifactError {
    #[error("Artifact not found: {0}")]
    NotFound(Uuid),
}

/// Descriptor handed to the rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: Intent,
    pub title: String,
    pub prefill: EntitySet,
    /// Opened from the confirmation band: nothing runs until confirmed.
    pub needs_confirmation: bool,
    pub created_at: DateTime<Local>,
}

impl Artifact {
    pub fn new(kind: Intent, prefill: EntitySet) -> Self {
        let title = match &prefill.person_name {
            Some(name) => format!("{}: {name}", kind.label()),
            None => kind.label().to_string(),
        };
        Self {
            id: Uuid::new_v4(),
            kind,
            title,
            prefill,
            needs_confirmation: false,
            created_at: Local::now(),
        }
    }

    pub fn awaiting_confirmation(mut self) -> Self {
        self.needs_confirmation = true;
        self
    }
}

/// Bounded, ordered collection of open artifacts with an active pointer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactSet {
    items: Vec<Artifact>,
    active: Option<Uuid>,
}

impl ArtifactSet {
    /// Open `artifact` and make it active. Returns the evicted one, if any.
    pub fn open(&mut self, artifact: Artifact) -> Option<Artifact> {
        let evicted = (self.items.len() >= MAX_OPEN_ARTIFACTS).then(|| self.items.remove(0));
        if let Some(old) = &evicted {
            tracing::debug!(artifact_id = %old.id, "Evicted oldest artifact");
        }
        self.active = Some(artifact.id);
        self.items.push(artifact);
        evicted
    }

    /// Close by id. Closing the active artifact hands the pointer to the
    /// newest remaining one.
    pub fn close(&mut self, id: Uuid) -> Result<Artifact, ArtifactError> {
        let index = self
            .items
            .iter()
            .position(|a| a.id == id)
            .ok_or(ArtifactError::NotFound(id))?;
        let closed = self.items.remove(index);
        if self.active == Some(id) {
            self.active = self.items.last().map(|a| a.id);
        }
        Ok(closed)
    }

    pub fn activate(&mut self, id: Uuid) -> Result<(), ArtifactError> {
        if !self.items.iter().any(|a| a.id == id) {
            return Err(ArtifactError::NotFound(id));
        }
        self.active = Some(id);
        Ok(())
    }

    /// Clear the confirmation flag once the user has confirmed.
    pub(crate) fn mark_confirmed(&mut self, id: Uuid) -> Result<(), ArtifactError> {
        let artifact = self
            .items
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(ArtifactError::NotFound(id))?;
        artifact.needs_confirmation = false;
        Ok(())
    }

    pub fn active_id(&self) -> Option<Uuid> {
        self.active
    }

    pub fn get(&self, id: Uuid) -> Option<&Artifact> {
        self.items.iter().find(|a| a.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
