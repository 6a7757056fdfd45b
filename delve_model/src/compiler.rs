//! Task graph to Petri net compiler --
//!
//! Builds one default [`PetriNet`] per graph node, then wires each edge by
//! kind. For every kind the edge reads "source depends on target": the
//! source net's transitions gain dependencies fed by the target net's
//! progress. Helper places and transitions created here are registered on the
//! dependent (source) net so every net stays enumerable by the game runtime.

use log::info;

use crate::graph::{EdgeKind, TaskDependencyGraph};
use crate::petri::{PetriNet, Place, Transition};
use crate::task::TaskState;

/// Compile a task dependency graph into one Petri net per task.
pub fn compile(graph: &TaskDependencyGraph) -> Vec<PetriNet> {
    let nets: Vec<PetriNet> = graph
        .tasks()
        .map(|task| PetriNet::new(task.clone()))
        .collect();
    for edge in graph.edges() {
        connect(&nets[edge.source], &nets[edge.target], edge.kind);
    }
    info!(
        "compiled {} task nets from {} edges",
        nets.len(),
        graph.edges().len()
    );
    nets
}

/// Wire one dependency edge between two default nets.
fn connect(source: &PetriNet, target: &PetriNet, kind: EdgeKind) {
    match kind {
        EdgeKind::Sequence | EdgeKind::SequenceAnd => {
            // source activates only after target finished
            let helper = Place::new();
            target.finished().add_token_on_fire(helper.clone());
            source.activate_task().add_dependency(helper.clone());
            source.add_aux_place(helper);
        },
        EdgeKind::SequenceOr => {
            // any or-predecessor finishing enables the source
            target.finished().add_token_on_fire(source.or_merge());
        },
        EdgeKind::SubtaskMandatory => {
            // target is nested inside the source's processing window
            let handed_down = Place::new();
            source.after_activated().add_token_on_fire(handed_down.clone());
            target.activate_task().add_dependency(handed_down.clone());
            source.add_aux_place(handed_down);

            let handed_back = Place::new();
            target.finished().add_token_on_fire(handed_back.clone());
            source.activate_processing().add_dependency(handed_back.clone());
            source.add_aux_place(handed_back);
        },
        EdgeKind::SubtaskOptional => {
            // target may run while the source is processing; once the source
            // finishes, an unfinished target is aborted back to inactive
            let offered = Place::new();
            source.activate_processing().add_token_on_fire(offered.clone());
            target.activate_task().add_dependency(offered.clone());
            source.add_aux_place(offered);

            let window_closed = Place::new();
            source.finished().add_token_on_fire(window_closed.clone());
            source.add_aux_place(window_closed.clone());

            let not_solved = Place::new();
            not_solved.change_state_on_token(target.task().clone(), TaskState::Inactive);
            let abort = Transition::new(
                vec![window_closed, target.processing_active()],
                vec![not_solved.clone()],
            );
            source.add_aux_place(not_solved);
            source.add_aux_transition(abort);
        },
        EdgeKind::ConditionalCorrect => {
            let helper = Place::new();
            target.correct().add_token_on_fire(helper.clone());
            source.activate_task().add_dependency(helper.clone());
            source.add_aux_place(helper);
        },
        EdgeKind::ConditionalFalse => {
            let helper = Place::new();
            target.wrong().add_token_on_fire(helper.clone());
            source.activate_task().add_dependency(helper.clone());
            source.add_aux_place(helper);
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::TaskDependencyGraph;
    use crate::task::{Task, TaskHandle};

    fn handle(name: &str) -> TaskHandle {
        Task::new(name).into_handle()
    }

    fn graph_with(names: &[&str]) -> TaskDependencyGraph {
        let mut graph = TaskDependencyGraph::new();
        for name in names {
            graph.add_task(handle(name));
        }
        graph
    }

    /// Drive a net through its happy path up to the processing window.
    fn run_to_processing(net: &PetriNet) {
        assert!(net.activate_task().fire());
        assert!(net.after_activated().fire());
        assert!(net.activate_processing().fire());
    }

    /// Finish a net's task with a correct outcome.
    fn finish_correct(net: &PetriNet) {
        net.task().borrow_mut().set_state(TaskState::FinishedCorrect);
        net.notify_state_change(TaskState::FinishedCorrect);
        assert!(net.correct().fire());
        assert!(net.finished().fire());
    }

    #[test]
    fn each_compiled_net_starts_with_one_token() {
        let mut graph = graph_with(&["a", "b"]);
        graph.add_edge(EdgeKind::Sequence, 0, 1).unwrap();
        let nets = compile(&graph);
        assert_eq!(nets.len(), 2);
        for net in &nets {
            assert_eq!(net.token_count(), 1);
            assert_eq!(net.not_activated().tokens(), 1);
        }
    }

    #[test]
    fn sequence_gates_source_activation_on_target_finish() {
        let mut graph = graph_with(&["a", "b"]);
        graph.add_edge(EdgeKind::Sequence, 0, 1).unwrap();
        let nets = compile(&graph);
        let (a, b) = (&nets[0], &nets[1]);

        assert!(!a.activate_task().fire());
        run_to_processing(b);
        assert!(!a.activate_task().fire());
        finish_correct(b);
        assert!(a.activate_task().fire());
        assert_eq!(a.task().borrow().state(), TaskState::Active);
    }

    #[test]
    fn sequence_or_enables_on_any_predecessor() {
        let mut graph = graph_with(&["a", "b", "c"]);
        graph.add_edge(EdgeKind::SequenceOr, 0, 1).unwrap();
        graph.add_edge(EdgeKind::SequenceOr, 0, 2).unwrap();
        let nets = compile(&graph);
        let a = &nets[0];

        assert!(!a.activate_task().fire());
        run_to_processing(&nets[2]);
        finish_correct(&nets[2]);
        assert!(a.activate_task().fire());
    }

    #[test]
    fn subtask_mandatory_nests_target_in_source_window() {
        let mut graph = graph_with(&["parent", "sub"]);
        graph.add_edge(EdgeKind::SubtaskMandatory, 0, 1).unwrap();
        let nets = compile(&graph);
        let (parent, sub) = (&nets[0], &nets[1]);

        // subtask cannot start before the parent is activated
        assert!(!sub.activate_task().fire());
        assert!(parent.activate_task().fire());
        assert!(parent.after_activated().fire());
        assert!(sub.activate_task().fire());

        // parent cannot enter processing before the subtask finished
        assert!(!parent.activate_processing().fire());
        assert!(sub.after_activated().fire());
        assert!(sub.activate_processing().fire());
        finish_correct(sub);
        assert!(parent.activate_processing().fire());
    }

    #[test]
    fn subtask_optional_abort_resets_unfinished_target() {
        let mut graph = graph_with(&["parent", "option"]);
        graph.add_edge(EdgeKind::SubtaskOptional, 0, 1).unwrap();
        let nets = compile(&graph);
        let (parent, option) = (&nets[0], &nets[1]);

        run_to_processing(parent);
        // option becomes available once the parent is processing
        assert!(option.activate_task().fire());
        assert!(option.after_activated().fire());
        assert!(option.activate_processing().fire());

        finish_correct(parent);
        // the auxiliary abort transition follows the six named ones
        let aborts: Vec<_> = parent.transitions().into_iter().skip(6).collect();
        assert_eq!(aborts.len(), 1);
        assert!(aborts[0].fire());
        assert_eq!(option.task().borrow().state(), TaskState::Inactive);
    }

    #[test]
    fn conditional_edges_gate_on_outcome() {
        let mut graph = graph_with(&["on_pass", "quiz", "on_fail"]);
        graph.add_edge(EdgeKind::ConditionalCorrect, 0, 1).unwrap();
        graph.add_edge(EdgeKind::ConditionalFalse, 2, 1).unwrap();
        let nets = compile(&graph);
        let (on_pass, quiz, on_fail) = (&nets[0], &nets[1], &nets[2]);

        run_to_processing(quiz);
        quiz.task().borrow_mut().set_state(TaskState::FinishedWrong);
        quiz.notify_state_change(TaskState::FinishedWrong);
        assert!(quiz.wrong().fire());

        assert!(!on_pass.activate_task().fire());
        assert!(on_fail.activate_task().fire());
    }
}
