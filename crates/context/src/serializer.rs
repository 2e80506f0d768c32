//! Token-budgeted rendering of bedside note content for prompt injection.

use scriptorium_core::bedside::{BedsideNoteContent, ConflictRecord, Goal, GoalStatus};

use crate::token::estimate_tokens;

/// Per-section item caps.
#[derive(Debug, Clone)]
pub struct SectionLimits {
    pub warnings: usize,
    pub active_goals: usize,
    pub next_steps: usize,
    pub open_questions: usize,
    pub recent_discoveries: usize,
    pub conflicts: usize,
}

impl Default for SectionLimits {
    fn default() -> Self {
        Self {
            warnings: 5,
            active_goals: 5,
            next_steps: 5,
            open_questions: 3,
            recent_discoveries: 5,
            conflicts: 3,
        }
    }
}

/// Per-section estimated-token budgets. `None` means uncapped.
#[derive(Debug, Clone, Default)]
pub struct SectionBudgets {
    pub current_focus: Option<usize>,
    pub warnings: Option<usize>,
    pub active_goals: Option<usize>,
    pub next_steps: Option<usize>,
    pub open_questions: Option<usize>,
    pub recent_discoveries: Option<usize>,
    pub conflicts: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct SerializeOptions {
    pub max_items: SectionLimits,
    pub budgets: SectionBudgets,
}

/// Render bedside content as a headed, bulleted block.
///
/// Each populated section renders as a heading plus bullet lines, capped by
/// `max_items` and then trimmed to its token budget by dropping whole items
/// from the end — never mid-item. Empty sections are omitted entirely.
pub fn serialize_bedside_note_content(
    content: &BedsideNoteContent,
    options: &SerializeOptions,
) -> String {
    let mut blocks: Vec<String> = Vec::new();

    if !content.current_focus.trim().is_empty() {
        blocks.push(render_section(
            "Current Focus:",
            vec![content.current_focus.trim().to_string()],
            1,
            options.budgets.current_focus,
        ));
    }
    blocks.push(render_section(
        "Warnings & Risks:",
        content.warnings.clone(),
        options.max_items.warnings,
        options.budgets.warnings,
    ));
    blocks.push(render_section(
        "Active Goals:",
        prioritized_goals(&content.active_goals),
        options.max_items.active_goals,
        options.budgets.active_goals,
    ));
    blocks.push(render_section(
        "Next Steps:",
        content.next_steps.clone(),
        options.max_items.next_steps,
        options.budgets.next_steps,
    ));
    blocks.push(render_section(
        "Open Questions:",
        content.open_questions.clone(),
        options.max_items.open_questions,
        options.budgets.open_questions,
    ));
    blocks.push(render_section(
        "Recent Discoveries:",
        content.recent_discoveries.clone(),
        options.max_items.recent_discoveries,
        options.budgets.recent_discoveries,
    ));
    blocks.push(render_section(
        "Conflicts:",
        content.conflicts.iter().map(render_conflict).collect(),
        options.max_items.conflicts,
        options.budgets.conflicts,
    ));

    blocks
        .into_iter()
        .filter(|b| !b.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Goals worth the most prompt space first: stalled low-progress goals beat
/// near-complete ones, and among equals the least recently touched wins.
fn prioritized_goals(goals: &[Goal]) -> Vec<String> {
    let mut ordered: Vec<&Goal> = goals.iter().collect();
    ordered.sort_by(|a, b| {
        a.progress
            .partial_cmp(&b.progress)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.updated_at.cmp(&b.updated_at))
    });
    ordered.iter().map(|g| render_goal(g)).collect()
}

fn render_goal(goal: &Goal) -> String {
    let status = match goal.status {
        GoalStatus::Active => "active",
        GoalStatus::Blocked => "blocked",
        GoalStatus::Done => "done",
        GoalStatus::Abandoned => "abandoned",
    };
    format!(
        "{} ({:.0}% done, {status})",
        goal.title,
        goal.progress.clamp(0.0, 1.0) * 100.0
    )
}

fn render_conflict(record: &ConflictRecord) -> String {
    format!("{} vs {}", record.previous, record.current)
}

/// Render one section, or an empty string if nothing survives the caps.
fn render_section(
    heading: &str,
    items: Vec<String>,
    max_items: usize,
    budget: Option<usize>,
) -> String {
    let mut kept: Vec<String> = items
        .into_iter()
        .filter(|i| !i.trim().is_empty())
        .take(max_items)
        .collect();
    if kept.is_empty() {
        return String::new();
    }

    if let Some(budget) = budget {
        while !kept.is_empty() && estimate_tokens(&assemble(heading, &kept)) > budget {
            kept.pop();
        }
        if kept.is_empty() {
            return String::new();
        }
    }

    assemble(heading, &kept)
}

fn assemble(heading: &str, items: &[String]) -> String {
    let mut out = heading.to_string();
    for item in items {
        out.push_str("\n- ");
        out.push_str(item);
    }
    out
}
