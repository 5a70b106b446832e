//! Backup merge engine.
//!
//! Reconciles two independently evolved backups of the same user's data.
//! Records are joined by identifier; data points are joined by
//! (question id, timestamp truncated to the minute). Every field-level
//! divergence becomes a [`ConflictRecord`]; nothing is silently overwritten.
//!
//! The engine is pure: identical inputs give identical output, including the
//! order of merged records and of reported conflicts.

mod fields;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backup::{BackupPayload, DataPoint, Goal, Question, ResponseType};
use crate::conflict_report::{ConflictRecord, ConflictSide, ConflictType, MergeConflictReport};
use crate::error::BackupResult;

/// How the merge treats conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "uniffi", derive(uniffi::Enum))]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Any conflict aborts the merge; no merged payload is produced
    #[default]
    StopOnConflict,
    /// Conflicting items are left out and everything else is merged.
    ///
    /// Data points and questions in conflict are omitted. A conflicting
    /// goal description is cleared; the other goal fields cannot be omitted,
    /// so they keep the primary value.
    SkipConflicting,
}

/// Input for the JSON merge entry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeInput {
    pub primary: BackupPayload,
    pub secondary: BackupPayload,
    #[serde(default)]
    pub strategy: MergeStrategy,
}

/// Statistics about what was merged.
///
/// Counts describe the conflict-free merge, so they are filled in even when
/// `StopOnConflict` withholds the merged payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "uniffi", derive(uniffi::Record))]
pub struct MergeStats {
    /// Goals present in both payloads
    pub goals_shared: u32,
    /// Goals only in the primary payload
    pub goals_from_primary_only: u32,
    /// Goals only in the secondary payload
    pub goals_from_secondary_only: u32,
    /// Questions in the merged payload
    pub questions_merged: u32,
    /// Data points in the merged payload
    pub data_points_merged: u32,
    /// Same-minute data points collapsed within a single payload
    pub duplicate_data_points_collapsed: u32,
    /// Questions left out because they conflict
    pub questions_skipped: u32,
    /// Data points left out because they conflict or belong to a skipped question
    pub data_points_skipped: u32,
}

/// Outcome of a merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeResult {
    /// False only when `StopOnConflict` found conflicts
    pub success: bool,
    /// Merged payload, absent when the merge was stopped
    pub merged: Option<BackupPayload>,
    /// Conflict report; empty when the payloads agree
    pub conflicts: Option<MergeConflictReport>,
    pub stats: MergeStats,
}

impl MergeResult {
    pub fn has_conflicts(&self) -> bool {
        self.conflicts
            .as_ref()
            .is_some_and(|report| report.summary.total_conflicts > 0)
    }
}

/// Main entry point: merge a primary and a secondary backup.
///
/// Conflicts are data, not errors: this never fails for well-formed input.
///
/// Merged goals and questions keep primary order, followed by secondary-only
/// entries in their original order. Within a shared question, data points keep
/// primary order followed by secondary-only points.
pub fn merge_backups(
    primary: &BackupPayload,
    secondary: &BackupPayload,
    strategy: MergeStrategy,
) -> MergeResult {
    let mut merger = Merger::new(primary, secondary, strategy);

    let secondary_goals: HashMap<Uuid, &Goal> =
        secondary.goals.iter().map(|g| (g.id, g)).collect();
    let primary_goal_ids: HashSet<Uuid> = primary.goals.iter().map(|g| g.id).collect();

    for goal in &primary.goals {
        match secondary_goals.get(&goal.id) {
            Some(&other) => {
                merger.stats.goals_shared += 1;
                merger.merge_shared_goal(goal, other);
            }
            None => {
                merger.stats.goals_from_primary_only += 1;
                merger.carry_goal(goal);
            }
        }
    }

    for goal in secondary
        .goals
        .iter()
        .filter(|g| !primary_goal_ids.contains(&g.id))
    {
        merger.stats.goals_from_secondary_only += 1;
        merger.carry_goal(goal);
    }

    merger.merge_orphan_points();
    merger.finish(strategy)
}

/// Merge a JSON string input and return JSON string output.
/// Convenience function for FFI.
///
/// Both payloads are validated before merging; invalid input fails here and
/// never reaches the engine.
pub fn merge_backups_json(input_json: &str) -> BackupResult<String> {
    let input: MergeInput = serde_json::from_str(input_json)?;
    input.primary.validate()?;
    input.secondary.validate()?;
    let output = merge_backups(&input.primary, &input.secondary, input.strategy);
    let output_json = serde_json::to_string(&output)?;
    Ok(output_json)
}

/// Data points of one payload, deduplicated by (question, minute).
struct SidePoints<'a> {
    by_question: HashMap<Uuid, Vec<&'a DataPoint>>,
    /// Question ids in first-seen order
    question_order: Vec<Uuid>,
}

impl<'a> SidePoints<'a> {
    /// Later records replace earlier ones with the same key, keeping the
    /// earlier record's position.
    fn index(points: &'a [DataPoint], duplicates: &mut u32) -> Self {
        let mut by_question: HashMap<Uuid, Vec<&'a DataPoint>> = HashMap::new();
        let mut slots: HashMap<(Uuid, i64), usize> = HashMap::new();
        let mut question_order = Vec::new();

        for point in points {
            let list = by_question.entry(point.question_id).or_insert_with(|| {
                question_order.push(point.question_id);
                Vec::new()
            });
            match slots.get(&(point.question_id, point.minute())) {
                Some(&slot) => {
                    debug!(question_id = %point.question_id, data_point_id = %point.id, "collapsing same-minute data point");
                    list[slot] = point;
                    *duplicates += 1;
                }
                None => {
                    slots.insert((point.question_id, point.minute()), list.len());
                    list.push(point);
                }
            }
        }

        Self {
            by_question,
            question_order,
        }
    }

    fn for_question(&self, question_id: Uuid) -> &[&'a DataPoint] {
        self.by_question
            .get(&question_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Goal context that conflict records are attributed to.
#[derive(Clone)]
struct GoalContext<'g> {
    id: Uuid,
    title: &'g str,
    preferred: ConflictSide,
    newer: bool,
}

impl<'g> GoalContext<'g> {
    fn new(
        goal: &'g Goal,
        primary_updated: Option<DateTime<Utc>>,
        secondary_updated: Option<DateTime<Utc>>,
    ) -> Self {
        let (preferred, newer) = match (primary_updated, secondary_updated) {
            (Some(p), Some(s)) if s > p => (ConflictSide::Secondary, true),
            (Some(p), Some(s)) if p > s => (ConflictSide::Primary, true),
            _ => (ConflictSide::Primary, false),
        };
        Self {
            id: goal.id,
            title: &goal.title,
            preferred,
            newer,
        }
    }

    fn recommendation(&self, primary_value: &str, secondary_value: &str) -> String {
        let value = match self.preferred {
            ConflictSide::Primary => primary_value,
            ConflictSide::Secondary => secondary_value,
        };
        if self.newer {
            format!(
                "Use the {} value \"{}\"; its goal was updated more recently",
                self.preferred.as_str(),
                value
            )
        } else {
            format!(
                "Use the {} value \"{}\"; neither copy of the goal is more recent",
                self.preferred.as_str(),
                value
            )
        }
    }
}

/// Every question of one payload with the goal that owns it.
fn index_questions(payload: &BackupPayload) -> HashMap<Uuid, (&Goal, &Question)> {
    payload
        .goals
        .iter()
        .flat_map(|goal| goal.questions.iter().map(move |q| (q.id, (goal, q))))
        .collect()
}

/// How the data points of one question end up in the output.
#[derive(Debug, Clone, Copy)]
enum Placement {
    /// The question is in the merged payload; points must fit its response type
    Kept(ResponseType),
    /// The question was left out, and its points with it
    Dropped,
    /// The question exists in neither payload
    Orphan,
}

/// Per-call merge state.
struct Merger<'a> {
    primary: &'a BackupPayload,
    secondary: &'a BackupPayload,
    strategy: MergeStrategy,
    primary_questions: HashMap<Uuid, (&'a Goal, &'a Question)>,
    secondary_questions: HashMap<Uuid, (&'a Goal, &'a Question)>,
    primary_points: SidePoints<'a>,
    secondary_points: SidePoints<'a>,
    goals: Vec<Goal>,
    data_points: Vec<DataPoint>,
    conflicts: Vec<ConflictRecord>,
    /// Question ids already placed in (or deliberately left out of) the output
    placed_questions: HashSet<Uuid>,
    /// Goals, questions and data points that carry no conflict
    clean_items: u32,
    stats: MergeStats,
}

impl<'a> Merger<'a> {
    fn new(primary: &'a BackupPayload, secondary: &'a BackupPayload, strategy: MergeStrategy) -> Self {
        let mut stats = MergeStats::default();
        let primary_points =
            SidePoints::index(&primary.data_points, &mut stats.duplicate_data_points_collapsed);
        let secondary_points =
            SidePoints::index(&secondary.data_points, &mut stats.duplicate_data_points_collapsed);

        Self {
            primary,
            secondary,
            strategy,
            primary_questions: index_questions(primary),
            secondary_questions: index_questions(secondary),
            primary_points,
            secondary_points,
            goals: Vec::new(),
            data_points: Vec::new(),
            conflicts: Vec::new(),
            placed_questions: HashSet::new(),
            clean_items: 0,
            stats,
        }
    }

    /// Goal present in only one payload: carried through with its questions.
    fn carry_goal(&mut self, goal: &'a Goal) {
        let context = GoalContext::new(goal, None, None);
        let mut merged = goal.clone();
        merged.questions = self.merge_questions(goal, &context, goal.questions.iter().map(|q| q.id));

        self.clean_items += 1;
        self.goals.push(merged);
    }

    fn merge_shared_goal(&mut self, primary: &'a Goal, secondary: &'a Goal) {
        let context =
            GoalContext::new(primary, Some(primary.updated_at), Some(secondary.updated_at));

        // Conflicting fields keep the primary value, so the base is the primary goal.
        let mut merged = primary.clone();
        merged.created_at = primary.created_at.min(secondary.created_at);
        merged.updated_at = primary.updated_at.max(secondary.updated_at);

        let field_conflicts = fields::goal_field_diffs(primary, secondary);
        for diff in &field_conflicts {
            self.push_conflict(
                &context,
                ConflictType::Goal,
                None,
                None,
                diff.field,
                &diff.primary,
                &diff.secondary,
            );
            if diff.field == "description" && self.strategy == MergeStrategy::SkipConflicting {
                merged.description = None;
            }
        }
        if field_conflicts.is_empty() {
            self.clean_items += 1;
        }

        let primary_question_ids: HashSet<Uuid> = primary.questions.iter().map(|q| q.id).collect();
        let question_ids: Vec<Uuid> = primary
            .questions
            .iter()
            .chain(
                secondary
                    .questions
                    .iter()
                    .filter(|q| !primary_question_ids.contains(&q.id)),
            )
            .map(|q| q.id)
            .collect();

        merged.questions = self.merge_questions(primary, &context, question_ids.into_iter());
        self.goals.push(merged);
    }

    /// Place the given questions under `goal`, skipping ids already placed
    /// under another goal.
    fn merge_questions(
        &mut self,
        goal: &'a Goal,
        context: &GoalContext<'a>,
        question_ids: impl Iterator<Item = Uuid>,
    ) -> Vec<Question> {
        let mut questions = Vec::new();
        for question_id in question_ids {
            if !self.place_question(question_id) {
                continue;
            }
            if let Some(question) = self.merge_question(goal, context, question_id) {
                questions.push(question);
            }
        }

        self.stats.questions_merged += questions.len() as u32;
        self.clean_items += questions.len() as u32;
        questions
    }

    /// Reconcile one question with its counterpart in the other payload,
    /// whichever goal owns it there, then merge its data points.
    ///
    /// Returns `None` when the copies disagree and the question is left out.
    fn merge_question(
        &mut self,
        goal: &'a Goal,
        context: &GoalContext<'a>,
        question_id: Uuid,
    ) -> Option<Question> {
        let primary = self.primary_questions.get(&question_id).copied();
        let secondary = self.secondary_questions.get(&question_id).copied();

        let (context, diffs) = match (primary, secondary) {
            (Some((primary_goal, p)), Some((secondary_goal, s))) => (
                GoalContext::new(
                    goal,
                    Some(primary_goal.updated_at),
                    Some(secondary_goal.updated_at),
                ),
                fields::question_field_diffs(p, s),
            ),
            _ => (context.clone(), Vec::new()),
        };

        for diff in &diffs {
            self.push_conflict(
                &context,
                ConflictType::Question,
                Some(question_id),
                None,
                diff.field,
                &diff.primary,
                &diff.secondary,
            );
        }

        let (_, question) = primary.or(secondary)?;
        if diffs.is_empty() {
            self.merge_points(&context, question_id, Placement::Kept(question.response_type));
            Some(question.clone())
        } else {
            self.merge_points(&context, question_id, Placement::Dropped);
            self.stats.questions_skipped += 1;
            None
        }
    }

    /// Data points whose question exists in neither payload.
    fn merge_orphan_points(&mut self) {
        let primary = self.primary;
        let secondary = self.secondary;

        let mut seen: HashSet<Uuid> = HashSet::new();
        let orphans: Vec<Uuid> = self
            .primary_points
            .question_order
            .iter()
            .chain(self.secondary_points.question_order.iter())
            .filter(|id| !self.placed_questions.contains(*id) && seen.insert(**id))
            .copied()
            .collect();

        for question_id in orphans {
            let first = self
                .primary_points
                .for_question(question_id)
                .first()
                .or_else(|| self.secondary_points.for_question(question_id).first())
                .copied();
            let Some(first) = first else {
                continue;
            };
            warn!(question_id = %question_id, goal_id = %first.goal_id, "data points reference a question missing from both backups");

            let title = primary
                .goal(first.goal_id)
                .or_else(|| secondary.goal(first.goal_id))
                .map(|g| g.title.as_str())
                .unwrap_or("");
            let context = GoalContext {
                id: first.goal_id,
                title,
                preferred: ConflictSide::Primary,
                newer: false,
            };
            self.merge_points(&context, question_id, Placement::Orphan);
        }
    }

    /// Union the data points of one question from both sides.
    ///
    /// Same-minute points with equal values are kept once (primary record);
    /// with differing values they are reported and left out. A point whose
    /// value does not fit the merged question's response type is reported
    /// and left out as well.
    fn merge_points(&mut self, context: &GoalContext<'_>, question_id: Uuid, placement: Placement) {
        let mut primary_points: Vec<&'a DataPoint> =
            self.primary_points.for_question(question_id).to_vec();
        let mut secondary_points: Vec<&'a DataPoint> =
            self.secondary_points.for_question(question_id).to_vec();

        if let Placement::Kept(response_type) = placement {
            let mut misfits: Vec<(ConflictSide, &'a DataPoint)> = Vec::new();
            for (side, points) in [
                (ConflictSide::Primary, &mut primary_points),
                (ConflictSide::Secondary, &mut secondary_points),
            ] {
                points.retain(|point| {
                    let fits = response_type.accepts(&point.value);
                    if !fits {
                        misfits.push((side, *point));
                    }
                    fits
                });
            }
            misfits.sort_by_key(|(_, point)| point.timestamp);
            for (side, point) in misfits {
                self.push_shape_conflict(context, question_id, response_type, side, point);
            }
        }

        let secondary_by_minute: HashMap<i64, &'a DataPoint> =
            secondary_points.iter().map(|p| (p.minute(), *p)).collect();
        let mut matched_minutes: HashSet<i64> = HashSet::new();
        let mut merged: Vec<&'a DataPoint> = Vec::new();
        let mut conflicting: Vec<(&'a DataPoint, &'a DataPoint)> = Vec::new();

        for &point in &primary_points {
            match secondary_by_minute.get(&point.minute()) {
                Some(&other) => {
                    matched_minutes.insert(point.minute());
                    if point.value.same_as(&other.value) {
                        merged.push(point);
                    } else {
                        conflicting.push((point, other));
                    }
                }
                None => merged.push(point),
            }
        }
        merged.extend(
            secondary_points
                .iter()
                .filter(|p| !matched_minutes.contains(&p.minute()))
                .copied(),
        );

        conflicting.sort_by_key(|(point, _)| point.timestamp);
        for (point, other) in &conflicting {
            self.push_conflict(
                context,
                ConflictType::DataPoint,
                Some(question_id),
                Some(point.timestamp),
                "value",
                &point.value.to_string(),
                &other.value.to_string(),
            );
        }
        self.stats.data_points_skipped += conflicting.len() as u32;

        if let Placement::Dropped = placement {
            self.stats.data_points_skipped += merged.len() as u32;
        } else {
            self.stats.data_points_merged += merged.len() as u32;
            self.clean_items += merged.len() as u32;
            self.data_points.extend(merged.into_iter().cloned());
        }
    }

    /// Reserve a question id in the output. A question id can only be placed
    /// once; a second goal claiming the same question loses it.
    fn place_question(&mut self, question_id: Uuid) -> bool {
        if self.placed_questions.insert(question_id) {
            true
        } else {
            debug!(question_id = %question_id, "question already merged under another goal");
            false
        }
    }

    /// A data point whose value shape the merged question does not accept.
    fn push_shape_conflict(
        &mut self,
        context: &GoalContext<'_>,
        question_id: Uuid,
        response_type: ResponseType,
        side: ConflictSide,
        point: &DataPoint,
    ) {
        debug!(goal_id = %context.id, data_point_id = %point.id, %response_type, "data point does not fit merged question");
        let value = point.value.to_string();
        let expected = format!("(expects {})", response_type);
        let (primary_value, secondary_value, preferred_side) = match side {
            ConflictSide::Primary => (value, expected, ConflictSide::Secondary),
            ConflictSide::Secondary => (expected, value, ConflictSide::Primary),
        };
        self.stats.data_points_skipped += 1;
        self.conflicts.push(ConflictRecord {
            goal_id: context.id,
            goal_title: context.title.to_string(),
            conflict_type: ConflictType::DataPoint,
            question_id: Some(question_id),
            timestamp: Some(point.timestamp),
            field: "value".to_string(),
            primary_value,
            secondary_value,
            preferred_side,
            recommendation: format!(
                "Drop the {} {} value; the merged question expects {}",
                side.as_str(),
                point.value.kind(),
                response_type
            ),
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn push_conflict(
        &mut self,
        context: &GoalContext<'_>,
        conflict_type: ConflictType,
        question_id: Option<Uuid>,
        timestamp: Option<DateTime<Utc>>,
        field: &str,
        primary_value: &str,
        secondary_value: &str,
    ) {
        debug!(goal_id = %context.id, ?conflict_type, field, "merge conflict detected");
        self.conflicts.push(ConflictRecord {
            goal_id: context.id,
            goal_title: context.title.to_string(),
            conflict_type,
            question_id,
            timestamp,
            field: field.to_string(),
            primary_value: primary_value.to_string(),
            secondary_value: secondary_value.to_string(),
            preferred_side: context.preferred,
            recommendation: context.recommendation(primary_value, secondary_value),
        });
    }

    fn finish(self, strategy: MergeStrategy) -> MergeResult {
        let report = MergeConflictReport::new(self.conflicts, self.clean_items > 0);
        let blocked = strategy == MergeStrategy::StopOnConflict && !report.is_empty();

        info!(
            ?strategy,
            goals = self.goals.len(),
            data_points = self.data_points.len(),
            conflicts = report.summary.total_conflicts,
            success = !blocked,
            "backup merge finished"
        );

        let merged = (!blocked).then(|| BackupPayload {
            version: self.primary.version.max(self.secondary.version),
            exported_at: None,
            goals: self.goals,
            data_points: self.data_points,
        });

        MergeResult {
            success: !blocked,
            merged,
            conflicts: Some(report),
            stats: self.stats,
        }
    }
}
