//! Attack catalog, loaded once per session.
//!
//! A catalog that cannot be fetched is empty rather than an error: the
//! pipeline then stamps and runs zero attacks.

use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{Result, WatermarkError};
use crate::service::WatermarkService;
use crate::types::AttackDefinition;

/// Ordered list of attacks a pipeline run executes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttackCatalog {
    attacks: Vec<AttackDefinition>,
}

/// On-disk catalog: either a bare array or the service's `{ "attacks": [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogDocument {
    Wrapped { attacks: Vec<AttackDefinition> },
    Bare(Vec<AttackDefinition>),
}

impl AttackCatalog {
    pub fn new(attacks: Vec<AttackDefinition>) -> Self {
        Self { attacks }
    }

    /// Fetch the catalog from the service, falling back to an empty one.
    pub async fn load<S>(service: &S) -> Self
    where
        S: WatermarkService + ?Sized,
    {
        match service.list_attacks().await {
            Ok(attacks) => {
                info!(count = attacks.len(), "Attack catalog loaded");
                Self::new(attacks)
            }
            Err(e) => {
                warn!(error = %e, "Failed to load attack catalog, continuing with none");
                Self::default()
            }
        }
    }

    /// Parse a catalog from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let document: CatalogDocument = serde_json::from_str(json)
            .map_err(|e| WatermarkError::DecodeError(format!("Invalid attack catalog: {e}")))?;
        let attacks = match document {
            CatalogDocument::Wrapped { attacks } | CatalogDocument::Bare(attacks) => attacks,
        };
        Ok(Self::new(attacks))
    }

    /// Read a catalog file (see [`AttackCatalog::from_json`]).
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            WatermarkError::InvalidInput(format!(
                "Failed to read catalog file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&json)
    }

    pub fn attacks(&self) -> &[AttackDefinition] {
        &self.attacks
    }

    pub fn len(&self) -> usize {
        self.attacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attacks.is_empty()
    }

    /// Distinct attack types in catalog order.
    pub fn attack_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = Vec::new();
        for attack in &self.attacks {
            if !types.contains(&attack.attack_type.as_str()) {
                types.push(&attack.attack_type);
            }
        }
        types
    }
}

impl From<Vec<AttackDefinition>> for AttackCatalog {
    fn from(attacks: Vec<AttackDefinition>) -> Self {
        Self::new(attacks)
    }
}
