//! Audit event records and their integrity checksums.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Category of an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// An order was executed.
    TradeExecution,
    /// A trading signal was produced.
    SignalGeneration,
    /// A model was evaluated.
    ModelInference,
    /// Configuration changed.
    ConfigurationChange,
    /// An operator did something.
    UserAction,
    /// Internal lifecycle event.
    SystemEvent,
    /// Sensitive data was read.
    DataAccess,
    /// A risk limit was overridden.
    RiskOverride,
    /// A compliance check ran.
    ComplianceCheck,
    /// A component failed.
    ErrorEvent,
}

impl AuditEventType {
    /// Snake-case label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::TradeExecution => "trade_execution",
            AuditEventType::SignalGeneration => "signal_generation",
            AuditEventType::ModelInference => "model_inference",
            AuditEventType::ConfigurationChange => "configuration_change",
            AuditEventType::UserAction => "user_action",
            AuditEventType::SystemEvent => "system_event",
            AuditEventType::DataAccess => "data_access",
            AuditEventType::RiskOverride => "risk_override",
            AuditEventType::ComplianceCheck => "compliance_check",
            AuditEventType::ErrorEvent => "error_event",
        }
    }
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Importance of an audit event, ordered `Info < Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
    /// Informational.
    Info,
    /// Low.
    Low,
    /// Medium.
    Medium,
    /// High.
    High,
    /// Needs immediate attention.
    Critical,
}

/// Handling class of the data carried by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSensitivity {
    /// No restriction.
    Public,
    /// Internal use.
    #[default]
    Internal,
    /// Need-to-know.
    Confidential,
    /// Regulated data.
    Restricted,
}

/// Result of checking one event's checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumStatus {
    /// Stored checksum matches the content.
    Verified,
    /// Stored checksum does not match.
    Corrupted,
    /// No checksum stored.
    Missing,
}

/// One immutable audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique id.
    pub event_id: String,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Category.
    pub event_type: AuditEventType,
    /// Importance.
    pub severity: AuditSeverity,
    /// Acting user.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Session that produced the event.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Producing component.
    pub component: String,
    /// Action name.
    pub action: String,
    /// Human-readable summary.
    pub description: String,
    /// Free-form context.
    #[serde(default)]
    pub context: Map<String, Value>,
    /// Inputs to the action.
    #[serde(default)]
    pub input_data: Option<Value>,
    /// Outputs of the action.
    #[serde(default)]
    pub output_data: Option<Value>,
    /// Duration of the action.
    #[serde(default)]
    pub execution_time_ms: Option<f64>,
    /// Failure details.
    #[serde(default)]
    pub error_details: Option<Value>,
    /// Regulatory tags.
    #[serde(default)]
    pub compliance_tags: Vec<String>,
    /// Data handling class.
    #[serde(default)]
    pub data_sensitivity: DataSensitivity,
    /// Hex SHA-256 of the canonical content; empty until sealed.
    #[serde(default)]
    pub checksum: String,
}

impl AuditEvent {
    /// Creates an unsealed event stamped now.
    pub fn new(
        event_type: AuditEventType,
        severity: AuditSeverity,
        component: impl Into<String>,
        action: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            severity,
            user_id: None,
            session_id: None,
            component: component.into(),
            action: action.into(),
            description: description.into(),
            context: Map::new(),
            input_data: None,
            output_data: None,
            execution_time_ms: None,
            error_details: None,
            compliance_tags: Vec::new(),
            data_sensitivity: DataSensitivity::default(),
            checksum: String::new(),
        }
    }

    /// Sets the acting user.
    #[must_use]
    pub fn with_user(mut self, user: Option<&str>) -> Self {
        self.user_id = user.map(str::to_string);
        self
    }

    /// Adds a context entry.
    #[must_use]
    pub fn with_context(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }

    /// Sets the input payload.
    #[must_use]
    pub fn with_input(mut self, input: Value) -> Self {
        self.input_data = Some(input);
        self
    }

    /// Sets the output payload.
    #[must_use]
    pub fn with_output(mut self, output: Value) -> Self {
        self.output_data = Some(output);
        self
    }

    /// Sets the action duration.
    #[must_use]
    pub fn with_execution_time(mut self, millis: f64) -> Self {
        self.execution_time_ms = Some(millis);
        self
    }

    /// Sets failure details.
    #[must_use]
    pub fn with_error_details(mut self, details: Value) -> Self {
        self.error_details = Some(details);
        self
    }

    /// Sets the regulatory tags.
    #[must_use]
    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.compliance_tags = tags.iter().map(|t| (*t).to_string()).collect();
        self
    }

    /// Sets the data handling class.
    #[must_use]
    pub fn with_sensitivity(mut self, sensitivity: DataSensitivity) -> Self {
        self.data_sensitivity = sensitivity;
        self
    }

    /// Checksum of the event content with the checksum field emptied.
    #[must_use]
    pub fn compute_checksum(&self) -> String {
        let mut value = match serde_json::to_value(self) {
            Ok(value) => value,
            Err(_) => return String::new(),
        };
        if let Value::Object(map) = &mut value {
            map.insert("checksum".to_string(), Value::String(String::new()));
        }
        let canonical = canonicalize(value).to_string();
        hex::encode(Sha256::digest(canonical.as_bytes()))
    }

    /// Stores the content checksum in the event.
    pub fn seal(&mut self) {
        self.checksum = self.compute_checksum();
    }

    /// Checks the stored checksum against the content.
    #[must_use]
    pub fn verify(&self) -> ChecksumStatus {
        if self.checksum.is_empty() {
            ChecksumStatus::Missing
        } else if self.checksum == self.compute_checksum() {
            ChecksumStatus::Verified
        } else {
            ChecksumStatus::Corrupted
        }
    }
}

/// Rebuilds every object with keys in sorted order.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
