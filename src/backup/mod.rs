//! Backup payload model.
//!
//! Goals own their questions; data points are kept in a flat list on the
//! payload and refer to their goal and question by identifier. Two records in
//! different payloads with the same identifier are the same logical entity.

pub mod datetime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{BackupError, BackupResult};

/// Current export format version.
pub const BACKUP_FORMAT_VERSION: u32 = 1;

fn default_version() -> u32 {
    BACKUP_FORMAT_VERSION
}

/// Top-level export unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupPayload {
    /// Export format version
    #[serde(default = "default_version")]
    pub version: u32,
    /// When the export was produced
    #[serde(default, with = "datetime::iso8601_option")]
    pub exported_at: Option<DateTime<Utc>>,
    /// Goals in export order
    #[serde(default)]
    pub goals: Vec<Goal>,
    /// Logged responses in export order
    #[serde(default)]
    pub data_points: Vec<DataPoint>,
}

impl BackupPayload {
    pub fn new(goals: Vec<Goal>, data_points: Vec<DataPoint>) -> Self {
        Self {
            version: BACKUP_FORMAT_VERSION,
            exported_at: None,
            goals,
            data_points,
        }
    }

    /// Find a goal by id.
    pub fn goal(&self, id: Uuid) -> Option<&Goal> {
        self.goals.iter().find(|g| g.id == id)
    }

    /// Total number of questions across all goals.
    pub fn question_count(&self) -> usize {
        self.goals.iter().map(|g| g.questions.len()).sum()
    }

    /// Map of question id to the question, for resolving data point references.
    pub fn question_index(&self) -> HashMap<Uuid, &Question> {
        self.goals
            .iter()
            .flat_map(|g| g.questions.iter())
            .map(|q| (q.id, q))
            .collect()
    }

    /// Check the invariants the merge engine relies on.
    ///
    /// - goal ids are unique
    /// - question ids are unique across the payload
    /// - a data point whose question is present carries a value of the
    ///   shape that question's response type expects
    pub fn validate(&self) -> BackupResult<()> {
        let mut goal_ids = HashSet::new();
        let mut question_ids = HashSet::new();

        for goal in &self.goals {
            if !goal_ids.insert(goal.id) {
                return Err(BackupError::InvalidPayload(format!(
                    "duplicate goal id {}",
                    goal.id
                )));
            }
            for question in &goal.questions {
                if !question_ids.insert(question.id) {
                    return Err(BackupError::InvalidPayload(format!(
                        "duplicate question id {}",
                        question.id
                    )));
                }
            }
        }

        let questions = self.question_index();
        for point in &self.data_points {
            if let Some(question) = questions.get(&point.question_id) {
                if !question.response_type.accepts(&point.value) {
                    return Err(BackupError::InvalidPayload(format!(
                        "data point {} holds a {} value but question {} expects {}",
                        point.id,
                        point.value.kind(),
                        question.id,
                        question.response_type
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Decode a backup payload from JSON and validate it.
pub fn decode_payload_json(json: &str) -> BackupResult<BackupPayload> {
    let payload: BackupPayload = serde_json::from_str(json)?;
    payload.validate()?;
    Ok(payload)
}

/// A tracking goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: GoalCategory,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(with = "datetime::iso8601")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "datetime::iso8601")]
    pub updated_at: DateTime<Utc>,
    pub schedule: Schedule,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl Goal {
    /// Find a question by id.
    pub fn question(&self, id: Uuid) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }
}

fn default_true() -> bool {
    true
}

/// Goal category: a built-in system category or a user label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GoalCategory {
    Health,
    Fitness,
    Productivity,
    Mindfulness,
    Learning,
    Finance,
    Social,
    Custom(String),
}

impl fmt::Display for GoalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoalCategory::Health => f.write_str("health"),
            GoalCategory::Fitness => f.write_str("fitness"),
            GoalCategory::Productivity => f.write_str("productivity"),
            GoalCategory::Mindfulness => f.write_str("mindfulness"),
            GoalCategory::Learning => f.write_str("learning"),
            GoalCategory::Finance => f.write_str("finance"),
            GoalCategory::Social => f.write_str("social"),
            GoalCategory::Custom(label) => write!(f, "custom:{}", label),
        }
    }
}

/// How often a goal prompts for responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Custom,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Custom => "custom",
        }
    }
}

/// Reminder schedule. The timezone is an IANA name and is compared verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub frequency: Frequency,
    #[serde(default)]
    pub times: Vec<TimeOfDay>,
    pub timezone: String,
    #[serde(default)]
    pub interval: Option<u32>,
}

/// A trackable prompt belonging to a goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: Uuid,
    pub text: String,
    pub response_type: ResponseType,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub validation_rules: Option<ValidationRules>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
}

/// Kind of answer a question expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseType {
    Numeric,
    Scale,
    Slider,
    WaterIntake,
    Boolean,
    Text,
    MultipleChoice,
    Time,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Numeric => "numeric",
            ResponseType::Scale => "scale",
            ResponseType::Slider => "slider",
            ResponseType::WaterIntake => "waterIntake",
            ResponseType::Boolean => "boolean",
            ResponseType::Text => "text",
            ResponseType::MultipleChoice => "multipleChoice",
            ResponseType::Time => "time",
        }
    }

    /// Whether `value` has the shape this response type records.
    pub fn accepts(&self, value: &DataPointValue) -> bool {
        matches!(
            (self, value),
            (
                ResponseType::Numeric
                    | ResponseType::Scale
                    | ResponseType::Slider
                    | ResponseType::WaterIntake,
                DataPointValue::Numeric(_)
            ) | (ResponseType::Boolean, DataPointValue::Boolean(_))
                | (ResponseType::Text, DataPointValue::Text(_))
                | (ResponseType::MultipleChoice, DataPointValue::Choices(_))
                | (ResponseType::Time, DataPointValue::Time(_))
        )
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional bounds for numeric answers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRules {
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
    #[serde(default)]
    pub allows_empty: bool,
}

/// One logged response to a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPoint {
    pub id: Uuid,
    pub goal_id: Uuid,
    pub question_id: Uuid,
    #[serde(with = "datetime::iso8601")]
    pub timestamp: DateTime<Utc>,
    pub value: DataPointValue,
}

impl DataPoint {
    /// Minute bucket used to match data points across payloads: the
    /// timestamp truncated (floored) to the minute, so 08:00:59 and 08:00:00
    /// share a bucket while 07:59:59 does not.
    pub fn minute(&self) -> i64 {
        self.timestamp.timestamp().div_euclid(60)
    }
}

/// The recorded answer. Exactly one shape per data point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum DataPointValue {
    /// Numeric, scale, slider and water-intake answers
    Numeric(f64),
    Boolean(bool),
    Text(String),
    /// Selected option labels; order carries no meaning
    Choices(Vec<String>),
    Time(TimeOfDay),
}

impl DataPointValue {
    pub fn kind(&self) -> &'static str {
        match self {
            DataPointValue::Numeric(_) => "numeric",
            DataPointValue::Boolean(_) => "boolean",
            DataPointValue::Text(_) => "text",
            DataPointValue::Choices(_) => "choices",
            DataPointValue::Time(_) => "time",
        }
    }

    /// Value equality with set semantics for selected choices.
    pub fn same_as(&self, other: &DataPointValue) -> bool {
        match (self, other) {
            (DataPointValue::Choices(a), DataPointValue::Choices(b)) => {
                let a: HashSet<&String> = a.iter().collect();
                let b: HashSet<&String> = b.iter().collect();
                a == b
            }
            _ => self == other,
        }
    }
}

impl fmt::Display for DataPointValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataPointValue::Numeric(n) => write!(f, "{}", n),
            DataPointValue::Boolean(b) => write!(f, "{}", b),
            DataPointValue::Text(t) => f.write_str(t),
            DataPointValue::Choices(choices) => {
                let mut sorted: Vec<&str> = choices.iter().map(String::as_str).collect();
                sorted.sort_unstable();
                sorted.dedup();
                f.write_str(&sorted.join(", "))
            }
            DataPointValue::Time(t) => write!(f, "{}", t),
        }
    }
}

/// A wall-clock time, encoded as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hour, minute) = s
            .split_once(':')
            .ok_or_else(|| format!("invalid time of day: {}", s))?;
        let hour: u8 = hour
            .parse()
            .map_err(|_| format!("invalid hour in time of day: {}", s))?;
        let minute: u8 = minute
            .parse()
            .map_err(|_| format!("invalid minute in time of day: {}", s))?;
        TimeOfDay::new(hour, minute).ok_or_else(|| format!("time of day out of range: {}", s))
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}
