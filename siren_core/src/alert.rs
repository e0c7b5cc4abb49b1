//! Alert records as served by the authoritative query service.
//!
//! An alert is tracked upstream as a *phenomenon* ([`PhenomenonState`]) whose detail is
//! replaced every time a new CAP message arrives for it ([`AlertDetail`]). Clients work
//! with the joined [`AlertRecord`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::topology::Geometry;

/// Lifecycle flag of a phenomenon. Records are never deleted, only made inactive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LifecycleState {
    /// The phenomenon is in effect.
    #[default]
    Active,
    /// Expired or cancelled upstream.
    Inactive,
}

impl LifecycleState {
    /// Textual form used by storage backends.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Active => "Active",
            LifecycleState::Inactive => "Inactive",
        }
    }
}

impl std::str::FromStr for LifecycleState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(LifecycleState::Active),
            "Inactive" => Ok(LifecycleState::Inactive),
            other => Err(format!("unknown lifecycle state: {other}")),
        }
    }
}

/// Event codes of an alert.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventCode {
    /// SAME (EAS) code.
    #[serde(rename = "SAME", default)]
    pub same: String,
    /// NWS three-letter code; selects the display color.
    #[serde(rename = "NWS", default)]
    pub nws: String,
}

/// Area an alert applies to.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Area {
    /// Human readable description.
    #[serde(default)]
    pub description: String,
    /// Polygon drawn by the issuing office, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polygon: Option<Geometry>,
    /// UGC zone and county codes.
    #[serde(default)]
    pub ugc: Vec<String>,
}

/// One version of an alert's detail (a single CAP message).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertDetail {
    /// Identifier of this detail version.
    pub identifier: String,
    /// Sender address.
    #[serde(default)]
    pub sender: String,
    /// Sender display name.
    #[serde(default)]
    pub sender_name: String,
    /// Event type, e.g. "Tornado Warning".
    #[serde(default)]
    pub event: String,
    /// Event codes.
    #[serde(default)]
    pub event_code: EventCode,
    /// Headline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Free-text instruction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    /// When the message was sent.
    pub sent: DateTime<Utc>,
    /// When the alert takes effect.
    pub effective: DateTime<Utc>,
    /// When the alert expires.
    pub expires: DateTime<Utc>,
    /// Affected area.
    #[serde(default)]
    pub area: Area,
}

/// A revision of a phenomenon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// When the revision was received.
    pub received_at: DateTime<Utc>,
    /// Description of the action, e.g. "Extended in time".
    pub action: String,
    /// Sub-areas the revision applies to.
    #[serde(default)]
    pub applies_to: Vec<String>,
    /// Detail version that carried the revision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_ref: Option<String>,
}

/// Per-phenomenon state record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhenomenonState {
    /// Phenomenon identifier, the key clients use.
    pub identifier: String,
    /// Lifecycle flag.
    pub state: LifecycleState,
    /// Reference to the current [`AlertDetail::identifier`].
    pub most_recent_detail_ref: String,
    /// Ordered revisions.
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    /// Zones currently covered.
    #[serde(default)]
    pub areas: Vec<String>,
}

/// A phenomenon joined with its most recent detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecord {
    /// Phenomenon identifier.
    pub identifier: String,
    /// Current detail.
    pub detail: AlertDetail,
    /// Lifecycle flag.
    pub lifecycle_state: LifecycleState,
    /// Ordered revisions.
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    /// Reference to the detail version in `detail`.
    pub most_recent_detail_ref: String,
}

impl AlertRecord {
    /// Joins a phenomenon with the detail its `most_recent_detail_ref` points to.
    pub fn from_parts(state: PhenomenonState, detail: AlertDetail) -> Self {
        Self {
            identifier: state.identifier,
            detail,
            lifecycle_state: state.state,
            history: state.history,
            most_recent_detail_ref: state.most_recent_detail_ref,
        }
    }

    /// The polygon drawn by the issuing office, if any.
    pub fn native_polygon(&self) -> Option<&Geometry> {
        self.detail.area.polygon.as_ref()
    }

    /// NWS event code.
    pub fn nws_code(&self) -> &str {
        &self.detail.event_code.nws
    }

    /// Whether the record is active at `now`. Expiry is exclusive.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.lifecycle_state == LifecycleState::Active && self.detail.expires > now
    }
}
