use std::time::Duration;

use im::Vector;
use serde::Serialize;

use crate::context::ContextEntry;
use crate::definitions::{Definitions, Evaluations};
use crate::formula::Formula;
use crate::instruction::{Flag, Instructions};
use crate::meson::MesonRules;
use crate::provers::Prover;

// Wall-time accumulators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Timer {
    ProofTime,
    SuccessTime,
    SimplifyTime,
}

// Event counters, in the order they are conventionally reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Counter {
    Sections,
    Goals,
    FailedGoals,
    TrivialGoals,
    SuccessfulGoals,
    Symbols,
    TrivialChecks,
    HardChecks,
    SuccessfulChecks,
    Unfolds,
    Equations,
    FailedEquations,
}

#[derive(Debug, Clone)]
enum Tracker {
    Time(Timer, Duration),
    Count(Counter, usize),
}

// The single mutable cell of the reasoner: an ordered log of counter and
// timer events, plus the latching failure flags.
#[derive(Debug, Default)]
pub struct RState {
    log: Vec<Tracker>,
    pub failed: bool,
    pub already_checked: bool,
}

impl RState {
    pub fn new() -> RState {
        RState::default()
    }

    pub fn increment(&mut self, counter: Counter) {
        self.add_count(counter, 1);
    }

    pub fn add_count(&mut self, counter: Counter, n: usize) {
        self.log.push(Tracker::Count(counter, n));
    }

    pub fn add_time(&mut self, timer: Timer, elapsed: Duration) {
        self.log.push(Tracker::Time(timer, elapsed));
    }

    pub fn counter(&self, counter: Counter) -> usize {
        self.log
            .iter()
            .filter_map(|t| match t {
                Tracker::Count(c, n) if *c == counter => Some(*n),
                _ => None,
            })
            .sum()
    }

    // The accumulated time of a timer. Fetching a timer that was never
    // recorded is a programming bug, so it aborts.
    pub fn fetch_time(&self, timer: Timer) -> Duration {
        let entries: Vec<Duration> = self
            .log
            .iter()
            .filter_map(|t| match t {
                Tracker::Time(k, d) if *k == timer => Some(*d),
                _ => None,
            })
            .collect();
        if entries.is_empty() {
            panic!("timer {:?} fetched from an empty log", timer);
        }
        entries.iter().sum()
    }

    fn time_or_zero(&self, timer: Timer) -> Duration {
        self.log
            .iter()
            .filter_map(|t| match t {
                Tracker::Time(k, d) if *k == timer => Some(*d),
                _ => None,
            })
            .sum()
    }

    pub fn summary(&self) -> Summary {
        let counters = [
            Counter::Sections,
            Counter::Goals,
            Counter::FailedGoals,
            Counter::TrivialGoals,
            Counter::SuccessfulGoals,
            Counter::Symbols,
            Counter::TrivialChecks,
            Counter::HardChecks,
            Counter::SuccessfulChecks,
            Counter::Unfolds,
            Counter::Equations,
            Counter::FailedEquations,
        ]
        .iter()
        .map(|c| CounterLine {
            counter: *c,
            value: self.counter(*c),
        })
        .collect();
        let timers = [Timer::ProofTime, Timer::SuccessTime, Timer::SimplifyTime]
            .iter()
            .map(|t| TimerLine {
                timer: *t,
                milliseconds: self.time_or_zero(*t).as_millis() as u64,
            })
            .collect();
        Summary { counters, timers }
    }

    pub fn print_summary(&self) {
        let summary = self.summary();
        for line in &summary.counters {
            println!("{:?}: {}", line.counter, line.value);
        }
        for line in &summary.timers {
            println!("{:?}: {}ms", line.timer, line.milliseconds);
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CounterLine {
    pub counter: Counter,
    pub value: usize,
}

#[derive(Debug, Serialize)]
pub struct TimerLine {
    pub timer: Timer,
    pub milliseconds: u64,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub counters: Vec<CounterLine>,
    pub timers: Vec<TimerLine>,
}

// The read-mostly verification state for one goal. The surrounding walker
// builds it; the reasoner never mutates it, it only layers overrides via
// the with_* constructors. Cloning is cheap: the context is a persistent
// vector and everything heavyweight sits behind it.
#[derive(Clone)]
pub struct VState {
    pub thesis: ContextEntry,
    pub context: Vector<ContextEntry>,
    pub definitions: Definitions,
    pub evaluations: Evaluations,
    pub meson_rules: MesonRules,
    pub provers: Vec<Prover>,
    pub instructions: Instructions,
    pub skolem_counter: usize,
}

impl VState {
    pub fn new(thesis: ContextEntry) -> VState {
        VState {
            thesis,
            context: Vector::new(),
            definitions: Definitions::new(),
            evaluations: Evaluations::new(),
            meson_rules: MesonRules::new(),
            provers: vec![],
            instructions: Instructions::new(),
            skolem_counter: 0,
        }
    }

    // A copy of this state focused on a different goal.
    pub fn with_goal(&self, goal: Formula) -> VState {
        let mut state = self.clone();
        state.thesis = self.thesis.set_formula(goal);
        state
    }

    // A copy of this state with a different context.
    pub fn with_context(&self, context: Vector<ContextEntry>) -> VState {
        let mut state = self.clone();
        state.context = context;
        state
    }

    // The low-level prefix of the context: entries introduced inside the
    // current proof block.
    pub fn low_level_context(&self) -> Vec<Formula> {
        self.context
            .iter()
            .take_while(|e| e.low_level)
            .map(|e| e.formula.clone())
            .collect()
    }

    pub fn reason_log(&self, message: impl std::fmt::Display) {
        if self.instructions.flag(Flag::Printreason, false) {
            println!("[reasoning] {}", message);
        }
    }

    pub fn unfold_log(&self, message: impl std::fmt::Display) {
        if self.instructions.flag(Flag::Printunfold, false) {
            println!("[unfold] {}", message);
        }
    }
}
