//! Discussion plan data model, loading, and the navigator cursor over it.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ModeratorError, ModeratorResult};

/// Top-level discussion plan document, as loaded from a JSON guide file.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscussionPlan {
    pub meta: PlanMeta,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlanMeta {
    pub title: String,
    pub duration_minutes: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub script_md: Option<String>,
    #[serde(default)]
    pub routing: Option<Routing>,
    #[serde(default)]
    pub cards: Option<Vec<String>>,
    #[serde(default)]
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Routing {
    pub include_if_group: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Question {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub script_md: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    Question,
    Info,
    Rollcall,
    Closing,
}

impl DiscussionPlan {
    /// Loads and parses a discussion plan from a JSON file on disk.
    pub fn load_from_file(path: impl AsRef<Path>) -> ModeratorResult<Self> {
        let raw = fs::read_to_string(path.as_ref())
            .map_err(|e| ModeratorError::PlanLoad(format!("{}: {e}", path.as_ref().display())))?;
        let plan: DiscussionPlan = serde_json::from_str(&raw)
            .map_err(|e| ModeratorError::PlanLoad(format!("{}: {e}", path.as_ref().display())))?;
        Ok(plan)
    }

    /// Whether `section` applies given the configured group type, per its
    /// routing predicate (absent predicate ⇒ always included).
    pub fn section_is_included(&self, section: &Section, group_type: Option<&str>) -> bool {
        match &section.routing {
            None => true,
            Some(routing) => match group_type {
                Some(gt) => routing.include_if_group.iter().any(|g| g == gt),
                None => false,
            },
        }
    }
}

/// Mutable position within a `DiscussionPlan`: the current section, the
/// current question within it, and whether the section's opening script has
/// been read yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanCursor {
    pub section_index: usize,
    pub question_index: usize,
    pub section_script_read: bool,
}

impl PlanCursor {
    pub fn new() -> Self {
        Self {
            section_index: 0,
            question_index: 0,
            section_script_read: false,
        }
    }

    /// Advances to the next section, resetting question index and the
    /// script-read flag, maintaining the monotonic section_index invariant.
    fn advance_section(&mut self) {
        self.section_index += 1;
        self.question_index = 0;
        self.section_script_read = false;
    }

    fn advance_question(&mut self) {
        self.question_index += 1;
    }
}

impl Default for PlanCursor {
    fn default() -> Self {
        Self::new()
    }
}

/// Stateful cursor over a loaded plan that skips routing-excluded sections
/// and zero-question sections, per `original_source`'s
/// `_get_next_required_question` / `_section_is_included` routing logic.
pub struct PlanNavigator<'a> {
    plan: &'a DiscussionPlan,
    group_type: Option<String>,
    cursor: PlanCursor,
}

impl<'a> PlanNavigator<'a> {
    pub fn new(plan: &'a DiscussionPlan, group_type: Option<String>) -> Self {
        let mut nav = Self {
            plan,
            group_type,
            cursor: PlanCursor::new(),
        };
        nav.skip_excluded_sections();
        nav
    }

    pub fn cursor(&self) -> PlanCursor {
        self.cursor
    }

    fn current_section(&self) -> Option<&'a Section> {
        self.plan.sections.get(self.cursor.section_index)
    }

    /// The (section, question) pair the orchestrator should act on next, or
    /// `None` once the plan is exhausted.
    pub fn current(&self) -> Option<(&'a Section, &'a Question)> {
        let section = self.current_section()?;
        section
            .questions
            .get(self.cursor.question_index)
            .map(|q| (section, q))
    }

    pub fn section_script_pending(&self) -> bool {
        match self.current_section() {
            Some(s) => s.script_md.is_some() && !self.cursor.section_script_read,
            None => false,
        }
    }

    pub fn mark_section_script_read(&mut self) {
        self.cursor.section_script_read = true;
    }

    /// Advances past the current question, skipping to the next
    /// routing-included, non-empty section as needed. Called exactly once
    /// per completed question.
    pub fn advance(&mut self) {
        self.cursor.advance_question();
        if self
            .current_section()
            .map(|s| self.cursor.question_index >= s.questions.len())
            .unwrap_or(true)
        {
            self.cursor.advance_section();
            self.skip_excluded_sections();
        }
    }

    fn skip_excluded_sections(&mut self) {
        loop {
            match self.current_section() {
                None => return,
                Some(s) => {
                    let included = self.plan.section_is_included(s, self.group_type.as_deref());
                    if included && !s.questions.is_empty() {
                        return;
                    }
                    self.cursor.advance_section();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_plan() -> DiscussionPlan {
        DiscussionPlan {
            meta: PlanMeta {
                title: "t".into(),
                duration_minutes: 30.0,
            },
            sections: vec![
                Section {
                    id: "s1".into(),
                    title: "Intro".into(),
                    script_md: Some("welcome".into()),
                    routing: None,
                    cards: None,
                    questions: vec![Question {
                        id: "q1".into(),
                        kind: QuestionKind::Question,
                        text: Some("How do you feel?".into()),
                        script_md: None,
                    }],
                },
                Section {
                    id: "s2".into(),
                    title: "Excluded".into(),
                    script_md: None,
                    routing: Some(Routing {
                        include_if_group: vec!["b2b".into()],
                    }),
                    cards: None,
                    questions: vec![Question {
                        id: "q2".into(),
                        kind: QuestionKind::Question,
                        text: Some("skip me".into()),
                        script_md: None,
                    }],
                },
                Section {
                    id: "s3".into(),
                    title: "Empty".into(),
                    script_md: None,
                    routing: None,
                    cards: None,
                    questions: vec![],
                },
                Section {
                    id: "s4".into(),
                    title: "Closing".into(),
                    script_md: None,
                    routing: None,
                    cards: None,
                    questions: vec![Question {
                        id: "q4".into(),
                        kind: QuestionKind::Closing,
                        text: None,
                        script_md: Some("thanks".into()),
                    }],
                },
            ],
        }
    }

    #[test]
    fn navigator_skips_excluded_and_empty_sections() {
        let plan = sample_plan();
        let mut nav = PlanNavigator::new(&plan, Some("b2c".into()));

        let (section, question) = nav.current().expect("first question");
        assert_eq!(section.id, "s1");
        assert_eq!(question.id, "q1");

        nav.advance();
        let (section, question) = nav.current().expect("skips s2 and s3");
        assert_eq!(section.id, "s4");
        assert_eq!(question.id, "q4");

        nav.advance();
        assert!(nav.current().is_none());
    }

    #[test]
    fn cursor_invariant_resets_on_section_advance() {
        let mut cursor = PlanCursor::new();
        cursor.question_index = 2;
        cursor.section_script_read = true;
        cursor.advance_section();
        assert_eq!(cursor.section_index, 1);
        assert_eq!(cursor.question_index, 0);
        assert!(!cursor.section_script_read);
    }
}
