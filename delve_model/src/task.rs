//! Task model --
//!
//! A `Task` is one unit of work a player can be given: it carries a lifecycle
//! state, the entities that belong to it, and grading points. Tasks are shared
//! between the scripting runtime, the dependency graph, and the Petri nets
//! through [`TaskHandle`], so a state change made anywhere is visible
//! everywhere.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Inactive,
    Active,
    ProcessingActive,
    FinishedCorrect,
    FinishedWrong,
}

impl TaskState {
    pub fn is_finished(self) -> bool {
        matches!(self, TaskState::FinishedCorrect | TaskState::FinishedWrong)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskState::Inactive => "inactive",
            TaskState::Active => "active",
            TaskState::ProcessingActive => "processing_active",
            TaskState::FinishedCorrect => "finished_correct",
            TaskState::FinishedWrong => "finished_wrong",
        };
        write!(f, "{name}")
    }
}

impl FromStr for TaskState {
    type Err = UnknownTaskState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inactive" => Ok(TaskState::Inactive),
            "active" => Ok(TaskState::Active),
            "processing_active" => Ok(TaskState::ProcessingActive),
            "finished_correct" => Ok(TaskState::FinishedCorrect),
            "finished_wrong" => Ok(TaskState::FinishedWrong),
            other => Err(UnknownTaskState(other.to_string())),
        }
    }
}

/// Error for a task state spelling that does not name a [`TaskState`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task state '{0}'")]
pub struct UnknownTaskState(pub String);

/// Shared, aliasable handle to a task. The scripting runtime, the dependency
/// graph, and the compiled Petri nets all hold clones of the same handle.
pub type TaskHandle = Rc<RefCell<Task>>;

/// One unit of player-facing work with a gradable outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub name: String,
    state: TaskState,
    /// Entity sets owned by this task (e.g. the items belonging to one
    /// answer option). Managed by the game runtime; each set dedupes its
    /// entities.
    pub entity_sets: Vec<BTreeSet<Uuid>>,
    /// Entity managing this task in the game world, if any.
    pub manager: Option<Uuid>,
    pub points: f32,
    pub points_to_solve: f32,
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            state: TaskState::Inactive,
            entity_sets: Vec::new(),
            manager: None,
            points: 0.0,
            points_to_solve: 0.0,
        }
    }

    /// Wrap a task in the shared handle used across the subsystem.
    pub fn into_handle(self) -> TaskHandle {
        Rc::new(RefCell::new(self))
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Change the task state; returns whether the state actually changed.
    pub fn set_state(&mut self, state: TaskState) -> bool {
        if self.state == state {
            return false;
        }
        debug!("task '{}' state: {} -> {}", self.name, self.state, state);
        self.state = state;
        true
    }

    /// Whether the achieved points meet the solve threshold.
    pub fn solved(&self) -> bool {
        self.points >= self.points_to_solve
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_state_reports_change() {
        let mut task = Task::new("open the gate");
        assert_eq!(task.state(), TaskState::Inactive);
        assert!(task.set_state(TaskState::Active));
        assert!(!task.set_state(TaskState::Active));
        assert_eq!(task.state(), TaskState::Active);
    }

    #[test]
    fn finished_states_are_terminal_flavors() {
        assert!(TaskState::FinishedCorrect.is_finished());
        assert!(TaskState::FinishedWrong.is_finished());
        assert!(!TaskState::ProcessingActive.is_finished());
    }

    #[test]
    fn state_spellings_round_trip() {
        for state in [
            TaskState::Inactive,
            TaskState::Active,
            TaskState::ProcessingActive,
            TaskState::FinishedCorrect,
            TaskState::FinishedWrong,
        ] {
            assert_eq!(state.to_string().parse::<TaskState>(), Ok(state));
        }
        assert!("done".parse::<TaskState>().is_err());
    }

    #[test]
    fn entity_sets_dedupe_their_entities() {
        let mut task = Task::new("collect");
        let item = Uuid::new_v4();
        task.entity_sets.push(BTreeSet::from([item, item, Uuid::new_v4()]));
        assert_eq!(task.entity_sets[0].len(), 2);
        assert!(task.entity_sets[0].contains(&item));
    }

    #[test]
    fn solved_compares_against_threshold() {
        let mut task = Task::new("quiz");
        task.points_to_solve = 2.0;
        assert!(!task.solved());
        task.points = 2.5;
        assert!(task.solved());
    }
}
