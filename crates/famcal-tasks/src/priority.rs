//! Eisenhower priority analysis.

use serde::{Deserialize, Serialize};

use crate::types::{Task, Timeframe};

/// Urgency or importance at or above this counts as high.
const HIGH: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quadrant {
    /// Urgent and important
    DoFirst,
    /// Important, not urgent
    Schedule,
    /// Urgent, not important
    Delegate,
    /// Neither
    Eliminate,
}

impl Quadrant {
    pub fn label(self) -> &'static str {
        match self {
            Quadrant::DoFirst => "Do first",
            Quadrant::Schedule => "Schedule",
            Quadrant::Delegate => "Delegate",
            Quadrant::Eliminate => "Eliminate",
        }
    }

    fn suggestion(self) -> &'static str {
        match self {
            Quadrant::DoFirst => "Handle this today, before anything else.",
            Quadrant::Schedule => "Block time on the calendar this week so it gets done.",
            Quadrant::Delegate => "Ask another family member to take this one.",
            Quadrant::Eliminate => "Consider dropping this or doing it when there is spare time.",
        }
    }

    fn suggested_timeframe(self) -> Timeframe {
        match self {
            Quadrant::DoFirst => Timeframe::Today,
            Quadrant::Schedule | Quadrant::Delegate => Timeframe::ThisWeek,
            Quadrant::Eliminate => Timeframe::Someday,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityAnalysis {
    pub task_id: String,
    pub title: String,
    pub quadrant: Quadrant,
    /// 0-100, higher first
    pub score: u8,
    pub suggestion: String,
    pub suggested_timeframe: Timeframe,
}

fn is_urgent(task: &Task) -> bool {
    task.urgency >= HIGH || task.timeframe == Timeframe::Today
}

fn is_important(task: &Task) -> bool {
    task.importance >= HIGH
}

pub fn quadrant(task: &Task) -> Quadrant {
    match (is_urgent(task), is_important(task)) {
        (true, true) => Quadrant::DoFirst,
        (false, true) => Quadrant::Schedule,
        (true, false) => Quadrant::Delegate,
        (false, false) => Quadrant::Eliminate,
    }
}

/// Weighted score: importance counts more than urgency, a near timeframe adds a bonus.
pub fn priority_score(task: &Task) -> u8 {
    let importance = f64::from(task.importance.clamp(1, 5) - 1) / 4.0;
    let urgency = f64::from(task.urgency.clamp(1, 5) - 1) / 4.0;
    let bonus = match task.timeframe {
        Timeframe::Today => 0.15,
        Timeframe::ThisWeek => 0.08,
        Timeframe::ThisMonth => 0.03,
        Timeframe::Someday => 0.0,
    };
    let raw = (importance * 0.55 + urgency * 0.45 + bonus).min(1.0);
    (raw * 100.0).round() as u8
}

pub fn analyze_priority(task: &Task) -> PriorityAnalysis {
    let quadrant = quadrant(task);
    PriorityAnalysis {
        task_id: task.id.clone(),
        title: task.title.clone(),
        quadrant,
        score: priority_score(task),
        suggestion: quadrant.suggestion().to_string(),
        suggested_timeframe: quadrant.suggested_timeframe(),
    }
}

/// Analyses of open tasks, highest score first (ties by title).
pub fn rank_tasks(tasks: &[Task]) -> Vec<PriorityAnalysis> {
    let mut ranked: Vec<PriorityAnalysis> = tasks
        .iter()
        .filter(|t| !t.completed)
        .map(analyze_priority)
        .collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.title.cmp(&b.title)));
    ranked
}
