//! Submitted applications and their identifiers.
//!
//! The orchestrator treats an application's facts as opaque JSON. Only the
//! stages look inside, using the well-known keys in [`facts`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Well-known fact keys read by the built-in stages.
pub mod facts {
    /// Company name.
    pub const COMPANY_NAME: &str = "company_name";
    /// Free-text business description. Required by extraction.
    pub const BUSINESS_DESCRIPTION: &str = "business_description";
    /// Founder names.
    pub const FOUNDER_NAMES: &str = "founder_names";
    /// Founder background summaries.
    pub const FOUNDER_BACKGROUNDS: &str = "founder_backgrounds";
    /// Financial facts (revenue, funding ask, projections).
    pub const FINANCIALS: &str = "financials";
    /// Market facts (TAM, SAM, market size notes).
    pub const MARKET: &str = "market";
    /// Pre-computed assessment signals, one number per sub-score.
    pub const ASSESSMENT_SIGNALS: &str = "assessment_signals";
    /// Risk factors already identified upstream.
    pub const RISK_FACTORS: &str = "risk_factors";
    /// Strengths already identified upstream.
    pub const STRENGTHS: &str = "strengths";
}

/// Caller-assigned identifier of a submitted application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Wraps an existing identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A submitted application: an identifier plus a bag of input facts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    /// The application's identifier.
    pub id: EntityId,
    /// When the application was submitted.
    pub submitted_at: DateTime<Utc>,
    /// Opaque input facts.
    #[serde(default)]
    pub facts: serde_json::Map<String, serde_json::Value>,
}

impl Application {
    /// Creates an application with no facts.
    #[must_use]
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            submitted_at: Utc::now(),
            facts: serde_json::Map::new(),
        }
    }

    /// Creates an application with a generated identifier.
    #[must_use]
    pub fn generated() -> Self {
        Self::new(EntityId::generate())
    }

    /// Adds a fact.
    #[must_use]
    pub fn with_fact(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.facts.insert(key.into(), value);
        self
    }

    /// Adds every fact from a JSON object; non-object values are ignored.
    #[must_use]
    pub fn with_facts(mut self, facts: serde_json::Value) -> Self {
        if let serde_json::Value::Object(map) = facts {
            self.facts.extend(map);
        }
        self
    }

    /// Gets a fact.
    #[must_use]
    pub fn fact(&self, key: &str) -> Option<&serde_json::Value> {
        self.facts.get(key)
    }

    /// Gets a fact as a trimmed, non-empty string.
    #[must_use]
    pub fn fact_str(&self, key: &str) -> Option<&str> {
        self.fact(key)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
