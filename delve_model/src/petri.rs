//! Petri net --
//!
//! Token places and transitions driven by an external game runtime to
//! sequence tasks. Each task gets a default net (see [`PetriNet::new`]) whose
//! places mark the task lifecycle; edge wiring in [`crate::compiler`] then
//! couples the nets of dependent tasks through helper places.
//!
//! Places and transitions are shared across nets by construction, so they are
//! reference-counted with interior mutability. The whole model is
//! single-threaded by design.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::debug;

use crate::task::{TaskHandle, TaskState};

pub type PlaceRef = Rc<Place>;
pub type TransitionRef = Rc<Transition>;

/// A token place.
///
/// A place may carry two optional markers: it can *observe* a task state (an
/// external bridge deposits a token here when the owning task reaches that
/// state, see [`PetriNet::notify_state_change`]) and it can *set* a task state
/// when a token arrives.
#[derive(Debug, Default)]
pub struct Place {
    tokens: Cell<usize>,
    observed: Cell<Option<TaskState>>,
    state_on_token: RefCell<Option<(TaskHandle, TaskState)>>,
}

impl Place {
    pub fn new() -> PlaceRef {
        Rc::new(Self::default())
    }

    pub fn tokens(&self) -> usize {
        self.tokens.get()
    }

    pub fn place_token(&self) {
        self.tokens.set(self.tokens.get() + 1);
        if let Some((task, state)) = self.state_on_token.borrow().as_ref() {
            task.borrow_mut().set_state(*state);
        }
    }

    /// Remove one token; returns false if the place was empty.
    pub fn remove_token(&self) -> bool {
        let count = self.tokens.get();
        if count == 0 {
            return false;
        }
        self.tokens.set(count - 1);
        true
    }

    /// Mark this place as an observer: a token is deposited when the owning
    /// task reaches `state`.
    pub fn observe(&self, state: TaskState) {
        self.observed.set(Some(state));
    }

    pub fn observes(&self, state: TaskState) -> bool {
        self.observed.get() == Some(state)
    }

    /// Mark this place to move `task` into `state` whenever a token arrives.
    pub fn change_state_on_token(&self, task: TaskHandle, state: TaskState) {
        *self.state_on_token.borrow_mut() = Some((task, state));
    }
}

/// A transition consuming one token from every input place and producing one
/// in every output place, atomically.
#[derive(Debug, Default)]
pub struct Transition {
    inputs: RefCell<Vec<PlaceRef>>,
    outputs: RefCell<Vec<PlaceRef>>,
}

impl Transition {
    pub fn new(inputs: Vec<PlaceRef>, outputs: Vec<PlaceRef>) -> TransitionRef {
        Rc::new(Self {
            inputs: RefCell::new(inputs),
            outputs: RefCell::new(outputs),
        })
    }

    /// Add another input place; the transition cannot fire until it holds a
    /// token.
    pub fn add_dependency(&self, place: PlaceRef) {
        self.inputs.borrow_mut().push(place);
    }

    /// Add another output place receiving a token on each firing.
    pub fn add_token_on_fire(&self, place: PlaceRef) {
        self.outputs.borrow_mut().push(place);
    }

    pub fn enabled(&self) -> bool {
        self.inputs.borrow().iter().all(|p| p.tokens() > 0)
    }

    /// Fire if enabled: consume one token from each input, then produce one
    /// in each output. Returns whether the transition fired.
    pub fn fire(&self) -> bool {
        if !self.enabled() {
            return false;
        }
        for place in self.inputs.borrow().iter() {
            place.remove_token();
        }
        for place in self.outputs.borrow().iter() {
            place.place_token();
        }
        true
    }
}

/// The default per-task net.
///
/// Layout (transitions in firing order for the happy path):
/// `activate_task` moves the initial token from `not_activated` to
/// `activated`, `after_activated` on to `dummy`, `activate_processing` on to
/// `processing_active`. The `correct`/`wrong` transitions additionally need a
/// token in the matching observer place (`finished_correct`/`finished_wrong`),
/// and route to `end_correct`/`end_wrong` plus the shared `end`, from which
/// `finished` drains into `sink`.
#[derive(Debug)]
pub struct PetriNet {
    task: TaskHandle,
    not_activated: PlaceRef,
    activated: PlaceRef,
    dummy: PlaceRef,
    processing_active: PlaceRef,
    finished_correct: PlaceRef,
    finished_wrong: PlaceRef,
    end_correct: PlaceRef,
    end_wrong: PlaceRef,
    end: PlaceRef,
    sink: PlaceRef,
    activate_task: TransitionRef,
    after_activated: TransitionRef,
    activate_processing: TransitionRef,
    correct: TransitionRef,
    wrong: TransitionRef,
    finished: TransitionRef,
    or_merge: RefCell<Option<PlaceRef>>,
    aux_places: RefCell<Vec<PlaceRef>>,
    aux_transitions: RefCell<Vec<TransitionRef>>,
}

impl PetriNet {
    /// Build the default net for `task`, holding exactly one token, in
    /// `not_activated`.
    pub fn new(task: TaskHandle) -> Self {
        let not_activated = Place::new();
        not_activated.place_token();

        let activated = Place::new();
        activated.change_state_on_token(task.clone(), TaskState::Active);
        let dummy = Place::new();
        let processing_active = Place::new();
        processing_active.change_state_on_token(task.clone(), TaskState::ProcessingActive);

        let finished_correct = Place::new();
        finished_correct.observe(TaskState::FinishedCorrect);
        let finished_wrong = Place::new();
        finished_wrong.observe(TaskState::FinishedWrong);

        let end_correct = Place::new();
        let end_wrong = Place::new();
        let end = Place::new();
        let sink = Place::new();

        let activate_task = Transition::new(vec![not_activated.clone()], vec![activated.clone()]);
        let after_activated = Transition::new(vec![activated.clone()], vec![dummy.clone()]);
        let activate_processing =
            Transition::new(vec![dummy.clone()], vec![processing_active.clone()]);
        let correct = Transition::new(
            vec![processing_active.clone(), finished_correct.clone()],
            vec![end_correct.clone(), end.clone()],
        );
        let wrong = Transition::new(
            vec![processing_active.clone(), finished_wrong.clone()],
            vec![end_wrong.clone(), end.clone()],
        );
        let finished = Transition::new(vec![end.clone()], vec![sink.clone()]);

        Self {
            task,
            not_activated,
            activated,
            dummy,
            processing_active,
            finished_correct,
            finished_wrong,
            end_correct,
            end_wrong,
            end,
            sink,
            activate_task,
            after_activated,
            activate_processing,
            correct,
            wrong,
            finished,
            or_merge: RefCell::new(None),
            aux_places: RefCell::new(Vec::new()),
            aux_transitions: RefCell::new(Vec::new()),
        }
    }

    pub fn task(&self) -> &TaskHandle {
        &self.task
    }

    pub fn not_activated(&self) -> PlaceRef {
        self.not_activated.clone()
    }

    pub fn activated(&self) -> PlaceRef {
        self.activated.clone()
    }

    pub fn processing_active(&self) -> PlaceRef {
        self.processing_active.clone()
    }

    pub fn finished_correct(&self) -> PlaceRef {
        self.finished_correct.clone()
    }

    pub fn finished_wrong(&self) -> PlaceRef {
        self.finished_wrong.clone()
    }

    pub fn end_correct(&self) -> PlaceRef {
        self.end_correct.clone()
    }

    pub fn end_wrong(&self) -> PlaceRef {
        self.end_wrong.clone()
    }

    pub fn sink(&self) -> PlaceRef {
        self.sink.clone()
    }

    pub fn activate_task(&self) -> TransitionRef {
        self.activate_task.clone()
    }

    pub fn after_activated(&self) -> TransitionRef {
        self.after_activated.clone()
    }

    pub fn activate_processing(&self) -> TransitionRef {
        self.activate_processing.clone()
    }

    pub fn correct(&self) -> TransitionRef {
        self.correct.clone()
    }

    pub fn wrong(&self) -> TransitionRef {
        self.wrong.clone()
    }

    pub fn finished(&self) -> TransitionRef {
        self.finished.clone()
    }

    /// The OR-merge place gating `activate_task`, created (empty) on first
    /// use. Every or-predecessor's `finished` transition feeds it.
    pub fn or_merge(&self) -> PlaceRef {
        let mut slot = self.or_merge.borrow_mut();
        if let Some(place) = slot.as_ref() {
            return place.clone();
        }
        let place = Place::new();
        self.activate_task.add_dependency(place.clone());
        *slot = Some(place.clone());
        place
    }

    /// Record a helper place created by edge wiring so the net stays
    /// enumerable.
    pub fn add_aux_place(&self, place: PlaceRef) {
        self.aux_places.borrow_mut().push(place);
    }

    /// Record a helper transition created by edge wiring.
    pub fn add_aux_transition(&self, transition: TransitionRef) {
        self.aux_transitions.borrow_mut().push(transition);
    }

    /// Bridge entry point: deposit a token in each observer place matching
    /// the task's new state. The game runtime calls this whenever the owning
    /// task changes state.
    pub fn notify_state_change(&self, state: TaskState) {
        debug!(
            "net for task '{}' notified of state {state}",
            self.task.borrow().name
        );
        for place in self.places() {
            if place.observes(state) {
                place.place_token();
            }
        }
    }

    /// All places of this net, including lazily created and auxiliary ones.
    pub fn places(&self) -> Vec<PlaceRef> {
        let mut places = vec![
            self.not_activated.clone(),
            self.activated.clone(),
            self.dummy.clone(),
            self.processing_active.clone(),
            self.finished_correct.clone(),
            self.finished_wrong.clone(),
            self.end_correct.clone(),
            self.end_wrong.clone(),
            self.end.clone(),
            self.sink.clone(),
        ];
        if let Some(or) = self.or_merge.borrow().as_ref() {
            places.push(or.clone());
        }
        places.extend(self.aux_places.borrow().iter().cloned());
        places
    }

    /// All transitions of this net, including auxiliary ones.
    pub fn transitions(&self) -> Vec<TransitionRef> {
        let mut transitions = vec![
            self.activate_task.clone(),
            self.after_activated.clone(),
            self.activate_processing.clone(),
            self.correct.clone(),
            self.wrong.clone(),
            self.finished.clone(),
        ];
        transitions.extend(self.aux_transitions.borrow().iter().cloned());
        transitions
    }

    /// Total token count over all places of this net.
    pub fn token_count(&self) -> usize {
        self.places().iter().map(|p| p.tokens()).sum()
    }
}
