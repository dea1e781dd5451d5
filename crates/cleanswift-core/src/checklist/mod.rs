//! Checklist adapter.
//!
//! Turns the structured output of the vision-analysis collaborator into an
//! ordered list of steps the user ticks off during a focus session. Parsing
//! is lenient because the payload comes from a language model: the list may
//! be keyed `tasks` or `steps`, priorities may arrive as numbers or numeric
//! strings, and steps without a title are dropped.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{AiError, SessionError};

/// A step as returned by the vision model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawStep {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_rank")]
    pub priority: Option<u32>,
}

/// Structured result of a room analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisionAnalysis {
    #[serde(default)]
    pub summary: String,
    #[serde(default, alias = "tasks")]
    pub steps: Vec<RawStep>,
}

fn lenient_rank<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistStep {
    pub title: String,
    pub description: Option<String>,
    /// 1 = highest
    pub priority: u32,
    pub completed: bool,
}

impl ChecklistStep {
    pub fn new(title: impl Into<String>, priority: u32) -> Self {
        Self {
            title: title.into(),
            description: None,
            priority,
            completed: false,
        }
    }
}

/// Ordered, session-local checklist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checklist {
    pub summary: String,
    steps: Vec<ChecklistStep>,
}

impl Checklist {
    pub fn new(summary: impl Into<String>, steps: Vec<ChecklistStep>) -> Self {
        Self {
            summary: summary.into(),
            steps,
        }
    }

    /// Normalize an analysis. Order is preserved and every step starts open.
    pub fn from_analysis(analysis: VisionAnalysis) -> Self {
        let steps = analysis
            .steps
            .into_iter()
            .enumerate()
            .filter_map(|(position, raw)| {
                let title = raw.title.trim();
                if title.is_empty() {
                    return None;
                }
                Some(ChecklistStep {
                    title: title.to_string(),
                    description: raw
                        .description
                        .map(|d| d.trim().to_string())
                        .filter(|d| !d.is_empty()),
                    priority: raw
                        .priority
                        .filter(|p| *p > 0)
                        .unwrap_or(position as u32 + 1),
                    completed: false,
                })
            })
            .collect();
        Self {
            summary: analysis.summary.trim().to_string(),
            steps,
        }
    }

    pub fn steps(&self) -> &[ChecklistStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.steps.iter().filter(|s| !s.completed).count()
    }

    /// Vacuously true for an empty checklist.
    pub fn all_completed(&self) -> bool {
        self.remaining() == 0
    }

    /// Flip one step's completed flag and return the new value.
    pub fn toggle(&mut self, index: usize) -> Result<bool, SessionError> {
        let len = self.steps.len();
        let step = self
            .steps
            .get_mut(index)
            .ok_or(SessionError::InvalidStepIndex {
                index,
                len: Some(len),
            })?;
        step.completed = !step.completed;
        Ok(step.completed)
    }

    pub fn titles(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.title.as_str()).collect()
    }
}

/// What the adapter produced. An unavailable checklist is not the same thing
/// as an empty one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecklistOutcome {
    Available(Checklist),
    Unavailable(String),
}

impl From<Result<VisionAnalysis, AiError>> for ChecklistOutcome {
    fn from(result: Result<VisionAnalysis, AiError>) -> Self {
        match result {
            Ok(analysis) => ChecklistOutcome::Available(Checklist::from_analysis(analysis)),
            Err(err) => ChecklistOutcome::Unavailable(err.to_string()),
        }
    }
}

/// Checklist slot of a live session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChecklistState {
    /// The task has no image; no checklist will ever exist.
    #[default]
    NotRequested,
    /// Analysis is in flight.
    Pending,
    Ready { checklist: Checklist },
    Unavailable { reason: String },
}

impl ChecklistState {
    /// The checklist the completion gate and the bonus see. Only a ready
    /// checklist counts; every other state imposes no step requirement.
    pub fn available(&self) -> Option<&Checklist> {
        match self {
            ChecklistState::Ready { checklist } => Some(checklist),
            _ => None,
        }
    }

    pub fn available_mut(&mut self) -> Option<&mut Checklist> {
        match self {
            ChecklistState::Ready { checklist } => Some(checklist),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ChecklistState::Pending)
    }
}

impl From<ChecklistOutcome> for ChecklistState {
    fn from(outcome: ChecklistOutcome) -> Self {
        match outcome {
            ChecklistOutcome::Available(checklist) => ChecklistState::Ready { checklist },
            ChecklistOutcome::Unavailable(reason) => ChecklistState::Unavailable { reason },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tasks_key_with_mixed_priorities() {
        let json = r#"{
            "summary": "Cluttered desk and an unmade bed",
            "tasks": [
                {"title": "Make the bed", "description": "Straighten sheets", "priority": 2},
                {"title": "Clear the desk", "priority": "1"},
                {"title": "Take out trash", "priority": "soon"}
            ]
        }"#;
        let analysis: VisionAnalysis = serde_json::from_str(json).unwrap();
        let checklist = Checklist::from_analysis(analysis);

        assert_eq!(checklist.summary, "Cluttered desk and an unmade bed");
        assert_eq!(
            checklist.titles(),
            vec!["Make the bed", "Clear the desk", "Take out trash"]
        );
        let ranks: Vec<u32> = checklist.steps().iter().map(|s| s.priority).collect();
        assert_eq!(ranks, vec![2, 1, 3]);
        assert!(checklist.steps().iter().all(|s| !s.completed));
    }

    #[test]
    fn parses_steps_key_and_drops_blank_titles() {
        let json = r#"{"summary": "", "steps": [{"title": "  "}, {"title": "Mop"}]}"#;
        let analysis: VisionAnalysis = serde_json::from_str(json).unwrap();
        let checklist = Checklist::from_analysis(analysis);
        assert_eq!(checklist.len(), 1);
        assert_eq!(checklist.steps()[0].title, "Mop");
        assert_eq!(checklist.steps()[0].priority, 2);
    }

    #[test]
    fn missing_list_is_an_empty_checklist() {
        let analysis: VisionAnalysis = serde_json::from_str(r#"{"summary": "tidy"}"#).unwrap();
        let checklist = Checklist::from_analysis(analysis);
        assert!(checklist.is_empty());
        assert!(checklist.all_completed());
    }

    #[test]
    fn toggle_flips_and_checks_bounds() {
        let mut checklist = Checklist::new(
            "room",
            vec![ChecklistStep::new("a", 1), ChecklistStep::new("b", 2)],
        );
        assert_eq!(checklist.toggle(1).unwrap(), true);
        assert_eq!(checklist.remaining(), 1);
        assert_eq!(checklist.toggle(1).unwrap(), false);
        assert_eq!(checklist.remaining(), 2);

        let err = checklist.toggle(2).unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidStepIndex {
                index: 2,
                len: Some(2)
            }
        ));
    }

    #[test]
    fn failed_analysis_is_unavailable_not_empty() {
        let outcome: ChecklistOutcome =
            Err::<VisionAnalysis, _>(AiError::NoStructuredResult("prose".into())).into();
        assert!(matches!(outcome, ChecklistOutcome::Unavailable(ref r) if r.contains("prose")));

        let state = ChecklistState::from(outcome);
        assert!(state.available().is_none());
    }

    #[test]
    fn only_ready_state_exposes_a_checklist() {
        assert!(ChecklistState::NotRequested.available().is_none());
        assert!(ChecklistState::Pending.available().is_none());
        let ready = ChecklistState::Ready {
            checklist: Checklist::default(),
        };
        assert!(ready.available().is_some());
    }
}
