//! Wire records exchanged with the continual-learning platform backend.
//!
//! This crate owns the JSON shapes used by `console` and the CLI. Decoding is
//! lenient where the backend is loose (ids as numbers or strings, a model's
//! dataset as one string or a list, `null` list envelopes) and strict where a
//! value drives behavior (resource kinds). Unrecognized task statuses are
//! carried through as text.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Log line the trainer writes once a job has run to completion.
pub const TRAINING_COMPLETED_MARKER: &str = "Training completed";

/// Error returned when a textual enum value is not recognized.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown {what}: {value}")]
    Unknown { what: &'static str, value: String },
}

// =============================================================================
// IDS
// =============================================================================

/// Backend identifier. Arrives as a JSON number or string; kept as text.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Id {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().to_owned()))
    }
}

impl From<i64> for Id {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Int(i64),
            Float(f64),
            Text(String),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Int(value) => Self(value.to_string()),
            Repr::Float(value) => Self(value.to_string()),
            Repr::Text(value) => Self(value),
        })
    }
}

// =============================================================================
// SERDE HELPERS
// =============================================================================

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(value)) if value.is_empty() => Vec::new(),
        Some(OneOrMany::One(value)) => vec![value],
        Some(OneOrMany::Many(values)) => values,
    })
}

// =============================================================================
// ACCOUNT
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LoginRequest {
    pub account: String,
    pub password: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginReply {
    pub token: String,
    pub user_id: Id,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RegisterRequest {
    pub phone: String,
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResetPasswordRequest {
    pub phone: String,
    pub email: String,
    #[serde(rename = "newPassword")]
    pub new_password: String,
}

/// Reply body for writes that only report a human-readable outcome.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, deserialize_with = "null_as_default")]
    pub username: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub phone: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Body of `PUT /api/profile`. The backend overwrites every field, so all
/// three are always sent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProfileForm {
    pub username: String,
    pub phone: String,
    pub email: String,
}

/// Fields the user chose to change. Unset fields keep their current value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl ProfileUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.phone.is_none() && self.email.is_none()
    }

    /// Full form: `current` with this update's fields laid over it.
    #[must_use]
    pub fn apply_to(&self, current: &UserProfile) -> ProfileForm {
        let pick = |edit: Option<&String>, current: &str| edit.map_or_else(|| current.to_owned(), Clone::clone);
        ProfileForm {
            username: pick(self.username.as_ref(), &current.username),
            phone: pick(self.phone.as_ref(), &current.phone),
            email: pick(self.email.as_ref(), &current.email),
        }
    }
}

// =============================================================================
// MODELS
// =============================================================================

/// Continual-learning evaluation protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Protocol {
    ClassIl,
    TaskIl,
}

impl Protocol {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClassIl => "Class-IL",
            Self::TaskIl => "Task-IL",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Class-IL" | "class-il" => Ok(Self::ClassIl),
            "Task-IL" | "task-il" => Ok(Self::TaskIl),
            other => Err(ParseError::Unknown { what: "protocol", value: other.to_owned() }),
        }
    }
}

/// Per-protocol accuracy history. Each sequence is positional by task index.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccuracyMap(BTreeMap<String, Vec<f64>>);

impl AccuracyMap {
    #[must_use]
    pub fn get(&self, protocol: Protocol) -> Option<&[f64]> {
        self.0.get(protocol.as_str()).map(Vec::as_slice)
    }

    #[must_use]
    pub fn with(mut self, protocol: Protocol, values: Vec<f64>) -> Self {
        self.0.insert(protocol.as_str().to_owned(), values);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: Id,
    pub model_name: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub dataset: Vec<String>,
    /// Total training time in seconds.
    #[serde(default)]
    pub train_time: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub accuracy: AccuracyMap,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ModelList {
    #[serde(default, deserialize_with = "null_as_default")]
    pub models: Vec<Model>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted class label.
    pub result: String,
    /// Inference wall time in seconds.
    #[serde(default)]
    pub time_taken: f64,
}

// =============================================================================
// RESOURCES
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Dataset,
    Image,
    #[serde(alias = "other")]
    Others,
}

impl ResourceKind {
    pub const ALL: [Self; 3] = [Self::Image, Self::Dataset, Self::Others];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dataset => "dataset",
            Self::Image => "image",
            Self::Others => "others",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dataset" => Ok(Self::Dataset),
            "image" => Ok(Self::Image),
            "others" | "other" => Ok(Self::Others),
            other => Err(ParseError::Unknown { what: "resource type", value: other.to_owned() }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: Id,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    #[serde(default)]
    pub size: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ResourceList {
    #[serde(default, deserialize_with = "null_as_default")]
    pub resources: Vec<Resource>,
}

/// File count and storage (MB) for one resource kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KindUsage {
    #[serde(default)]
    pub file_count: u64,
    #[serde(default)]
    pub total_size: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    #[serde(default)]
    pub image: KindUsage,
    #[serde(default)]
    pub dataset: KindUsage,
    #[serde(default)]
    pub others: KindUsage,
}

impl ResourceUsage {
    #[must_use]
    pub fn for_kind(&self, kind: ResourceKind) -> KindUsage {
        match kind {
            ResourceKind::Image => self.image,
            ResourceKind::Dataset => self.dataset,
            ResourceKind::Others => self.others,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
pub struct ResourceDashboard {
    #[serde(default)]
    pub resources: ResourceUsage,
}

// =============================================================================
// TASKS
// =============================================================================

/// Task lifecycle tag. Tags this console does not act on are kept verbatim
/// so a new backend status never fails a whole listing.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    Running,
    Success,
    End,
    Other(String),
}

impl TaskStatus {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::End => "end",
            Self::Other(tag) => tag,
        }
    }
}

impl From<String> for TaskStatus {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "running" => Self::Running,
            "success" => Self::Success,
            "end" => Self::End,
            _ => Self::Other(tag),
        }
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Other(tag) => tag,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Id,
    #[serde(default, deserialize_with = "null_as_default")]
    pub model_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub dataset: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub end_at: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct TaskList {
    #[serde(default, deserialize_with = "null_as_default")]
    pub tasks: Vec<Task>,
}

/// Log snapshot for one training task.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub training_logs: String,
    #[serde(default)]
    pub error_logs: Option<String>,
}

impl TaskInfo {
    /// Error text, if the backend reported any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error_logs.as_deref().filter(|logs| !logs.trim().is_empty())
    }

    /// True once the job has either completed or reported an error.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.training_logs.contains(TRAINING_COMPLETED_MARKER) || self.error().is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrainArgs {
    pub dataset: String,
    pub lr: f64,
    pub batch_size: u32,
    pub buffer_size: u32,
    pub epochs: u32,
    pub others: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrainRequest {
    pub model_name: String,
    pub args: TrainArgs,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TrainAccepted {
    pub task_id: Id,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
