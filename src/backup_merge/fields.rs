//! Field-by-field comparison of records that share an identifier.

use crate::backup::{Goal, Question, Schedule, ValidationRules};

const NONE: &str = "(none)";

/// A differing field with both values rendered for display.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct FieldDiff {
    pub field: &'static str,
    pub primary: String,
    pub secondary: String,
}

impl FieldDiff {
    fn new(field: &'static str, primary: String, secondary: String) -> Self {
        Self {
            field,
            primary,
            secondary,
        }
    }
}

/// Compare the mutable goal fields in declaration order:
/// title, description, category, active, schedule.
pub(super) fn goal_field_diffs(primary: &Goal, secondary: &Goal) -> Vec<FieldDiff> {
    let mut diffs = Vec::new();

    if primary.title != secondary.title {
        diffs.push(FieldDiff::new(
            "title",
            primary.title.clone(),
            secondary.title.clone(),
        ));
    }
    if primary.description != secondary.description {
        diffs.push(FieldDiff::new(
            "description",
            describe_optional(primary.description.as_deref()),
            describe_optional(secondary.description.as_deref()),
        ));
    }
    if primary.category != secondary.category {
        diffs.push(FieldDiff::new(
            "category",
            primary.category.to_string(),
            secondary.category.to_string(),
        ));
    }
    if primary.is_active != secondary.is_active {
        diffs.push(FieldDiff::new(
            "active",
            primary.is_active.to_string(),
            secondary.is_active.to_string(),
        ));
    }
    if primary.schedule != secondary.schedule {
        diffs.push(FieldDiff::new(
            "schedule",
            describe_schedule(&primary.schedule),
            describe_schedule(&secondary.schedule),
        ));
    }

    diffs
}

/// Compare the structural question fields: responseType, options, validationRules.
/// Prompt text and the active flag are not compared.
pub(super) fn question_field_diffs(primary: &Question, secondary: &Question) -> Vec<FieldDiff> {
    let mut diffs = Vec::new();

    if primary.response_type != secondary.response_type {
        diffs.push(FieldDiff::new(
            "responseType",
            primary.response_type.to_string(),
            secondary.response_type.to_string(),
        ));
    }
    if primary.options != secondary.options {
        diffs.push(FieldDiff::new(
            "options",
            describe_options(primary.options.as_deref()),
            describe_options(secondary.options.as_deref()),
        ));
    }
    if primary.validation_rules != secondary.validation_rules {
        diffs.push(FieldDiff::new(
            "validationRules",
            describe_rules(primary.validation_rules.as_ref()),
            describe_rules(secondary.validation_rules.as_ref()),
        ));
    }

    diffs
}

fn describe_optional(value: Option<&str>) -> String {
    value.unwrap_or(NONE).to_string()
}

fn describe_schedule(schedule: &Schedule) -> String {
    let times = schedule
        .times
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let mut out = schedule.frequency.as_str().to_string();
    if let Some(interval) = schedule.interval {
        out.push_str(&format!(" every {}", interval));
    }
    if !times.is_empty() {
        out.push_str(&format!(" at {}", times));
    }
    out.push_str(&format!(" ({})", schedule.timezone));
    out
}

fn describe_options(options: Option<&[String]>) -> String {
    match options {
        Some(options) => format!("[{}]", options.join(", ")),
        None => NONE.to_string(),
    }
}

fn describe_rules(rules: Option<&ValidationRules>) -> String {
    let Some(rules) = rules else {
        return NONE.to_string();
    };
    let bound = |b: Option<f64>| b.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string());
    format!(
        "min {}, max {}, empty {}",
        bound(rules.min_value),
        bound(rules.max_value),
        if rules.allows_empty { "allowed" } else { "not allowed" }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::{Frequency, TimeOfDay};

    #[test]
    fn test_describe_schedule() {
        let schedule = Schedule {
            frequency: Frequency::Weekly,
            times: vec![TimeOfDay::new(8, 0).unwrap(), TimeOfDay::new(20, 15).unwrap()],
            timezone: "Europe/Berlin".to_string(),
            interval: Some(2),
        };
        assert_eq!(
            describe_schedule(&schedule),
            "weekly every 2 at 08:00, 20:15 (Europe/Berlin)"
        );
    }

    #[test]
    fn test_describe_rules() {
        let rules = ValidationRules {
            min_value: Some(0.0),
            max_value: Some(100.0),
            allows_empty: false,
        };
        assert_eq!(describe_rules(Some(&rules)), "min 0, max 100, empty not allowed");
        assert_eq!(describe_rules(None), "(none)");
    }

    #[test]
    fn test_describe_options() {
        let options = vec!["a".to_string(), "b".to_string()];
        assert_eq!(describe_options(Some(options.as_slice())), "[a, b]");
        assert_eq!(describe_options(None), "(none)");
    }
}
