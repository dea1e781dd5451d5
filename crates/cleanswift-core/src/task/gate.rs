//! Completion gate.
//!
//! A task may only be marked completed once the user has actually worked on
//! it: the session clock must show at least the minimum working time, and if
//! the session carries a checklist every step must be ticked. An absent
//! checklist imposes no step requirement; an empty one is vacuously satisfied.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::checklist::Checklist;
use crate::error::SessionError;

/// Minimum focused time before completion is allowed.
pub const MIN_WORK_SECS: u64 = 10;

/// What the session knows at the moment completion is requested.
#[derive(Debug, Clone, Copy)]
pub struct SessionEvidence<'a> {
    pub elapsed_secs: u64,
    pub checklist: Option<&'a Checklist>,
}

/// A gate condition that does not hold yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnmetCondition {
    InsufficientWork { elapsed_secs: u64, required_secs: u64 },
    StepsIncomplete { remaining: usize, total: usize },
}

impl fmt::Display for UnmetCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnmetCondition::InsufficientWork {
                elapsed_secs,
                required_secs,
            } => write!(
                f,
                "worked {elapsed_secs}s, need at least {required_secs}s"
            ),
            UnmetCondition::StepsIncomplete { remaining, total } => {
                write!(f, "{remaining} of {total} checklist steps still open")
            }
        }
    }
}

/// Result of evaluating the gate. Empty `unmet` means completion is allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateStatus {
    pub unmet: Vec<UnmetCondition>,
}

impl GateStatus {
    pub fn is_open(&self) -> bool {
        self.unmet.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionGate {
    min_work_secs: u64,
}

impl Default for CompletionGate {
    fn default() -> Self {
        Self {
            min_work_secs: MIN_WORK_SECS,
        }
    }
}

impl CompletionGate {
    pub fn new(min_work_secs: u64) -> Self {
        Self { min_work_secs }
    }

    pub fn min_work_secs(&self) -> u64 {
        self.min_work_secs
    }

    /// Evaluate every condition. Pure; callers use it to disable completion
    /// ahead of time.
    pub fn evaluate(&self, evidence: &SessionEvidence<'_>) -> GateStatus {
        let mut unmet = Vec::new();
        if evidence.elapsed_secs < self.min_work_secs {
            unmet.push(UnmetCondition::InsufficientWork {
                elapsed_secs: evidence.elapsed_secs,
                required_secs: self.min_work_secs,
            });
        }
        if let Some(checklist) = evidence.checklist {
            let remaining = checklist.remaining();
            if remaining > 0 {
                unmet.push(UnmetCondition::StepsIncomplete {
                    remaining,
                    total: checklist.len(),
                });
            }
        }
        GateStatus { unmet }
    }

    pub fn check(&self, evidence: &SessionEvidence<'_>) -> Result<(), SessionError> {
        let status = self.evaluate(evidence);
        if status.is_open() {
            Ok(())
        } else {
            Err(SessionError::GateNotSatisfied {
                unmet: status.unmet,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checklist::ChecklistStep;

    fn checklist(done: &[bool]) -> Checklist {
        let steps = done
            .iter()
            .enumerate()
            .map(|(i, &completed)| {
                let mut step = ChecklistStep::new(format!("step {i}"), i as u32 + 1);
                step.completed = completed;
                step
            })
            .collect();
        Checklist::new("room", steps)
    }

    #[test]
    fn under_threshold_fails_regardless_of_checklist() {
        let gate = CompletionGate::default();
        let full = checklist(&[true, true]);
        for list in [None, Some(&full)] {
            let status = gate.evaluate(&SessionEvidence {
                elapsed_secs: 9,
                checklist: list,
            });
            assert_eq!(
                status.unmet,
                vec![UnmetCondition::InsufficientWork {
                    elapsed_secs: 9,
                    required_secs: 10
                }]
            );
        }
    }

    #[test]
    fn threshold_is_inclusive() {
        let gate = CompletionGate::default();
        assert!(gate
            .check(&SessionEvidence {
                elapsed_secs: 10,
                checklist: None
            })
            .is_ok());
    }

    #[test]
    fn open_step_blocks_completion() {
        let gate = CompletionGate::default();
        let list = checklist(&[true, false, true]);
        let status = gate.evaluate(&SessionEvidence {
            elapsed_secs: 300,
            checklist: Some(&list),
        });
        assert_eq!(
            status.unmet,
            vec![UnmetCondition::StepsIncomplete {
                remaining: 1,
                total: 3
            }]
        );
    }

    #[test]
    fn both_conditions_reported_together() {
        let gate = CompletionGate::default();
        let list = checklist(&[false]);
        let err = gate
            .check(&SessionEvidence {
                elapsed_secs: 2,
                checklist: Some(&list),
            })
            .unwrap_err();
        match err {
            SessionError::GateNotSatisfied { unmet } => assert_eq!(unmet.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_checklist_is_vacuously_complete() {
        let gate = CompletionGate::default();
        let empty = checklist(&[]);
        assert!(gate
            .evaluate(&SessionEvidence {
                elapsed_secs: 10,
                checklist: Some(&empty)
            })
            .is_open());
    }

    #[test]
    fn custom_threshold() {
        let gate = CompletionGate::new(60);
        assert!(!gate
            .evaluate(&SessionEvidence {
                elapsed_secs: 59,
                checklist: None
            })
            .is_open());
    }
}
