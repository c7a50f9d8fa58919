use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::context::filter_context;
use crate::export;
use crate::formula::{albet, Formula};
use crate::instruction::{Flag, Limit};
use crate::meson::{self, Budget};
use crate::reduce::reduce_with_evidence;
use crate::state::{Counter, RState, Timer, VState};
use crate::unfold::unfold;

// The goal driver. A thesis splits into goals; each goal is discharged by
// the first alternative that works: trivially by evidence, by the
// external prover, or by unfolding definitions and descending one level.
// Failing a goal fails the thesis.
pub fn prove_thesis(state: &VState, rstate: &mut RState) -> bool {
    let depth = state.instructions.limit(Limit::Depthlimit, 3);
    if depth <= 0 {
        rstate.failed = true;
        return false;
    }
    let context = filter_context(&state.thesis, &state.context);
    let state = state.with_context(context);
    let goals = split_goal(&state.thesis.formula);
    let proved = sequence_goals(&state, rstate, depth, 0, &goals);
    if !proved {
        rstate.failed = true;
    }
    proved
}

// Splits a thesis into separately provable goals.
// Universals distribute over each sub-goal; the second conjunct of a
// conjunction is proved under the first; a left disjunct becomes a
// standing side-hypothesis for the right sub-goals.
pub fn split_goal(f: &Formula) -> Vec<Formula> {
    split(f.strip().clone())
}

fn split(f: Formula) -> Vec<Formula> {
    match albet(f) {
        Formula::All(v, g) => split(*g)
            .into_iter()
            .map(|sub| Formula::All(v.clone(), Box::new(sub)))
            .collect(),
        Formula::And(g, h) => {
            let mut goals = split((*g).clone());
            goals.extend(split(Formula::imp(*g, *h)));
            goals
        }
        Formula::Or(g, h) => split(*h)
            .into_iter()
            .map(|sub| Formula::or((*g).clone(), sub))
            .collect(),
        other => vec![other],
    }
}

fn sequence_goals(
    state: &VState,
    rstate: &mut RState,
    depth: i64,
    iteration: usize,
    goals: &[Formula],
) -> bool {
    for goal in goals {
        rstate.increment(Counter::Goals);
        let start = Instant::now();
        let reduced = reduce_with_evidence(goal);
        rstate.add_time(Timer::SimplifyTime, start.elapsed());

        let proved = trivial(state, rstate, goal, &reduced)
            || launch_prover(state, rstate, iteration, goal, &reduced)
            || recurse(state, rstate, depth, iteration, goal);
        if !proved {
            rstate.increment(Counter::FailedGoals);
            return false;
        }
    }
    true
}

fn trivial(state: &VState, rstate: &mut RState, goal: &Formula, reduced: &Formula) -> bool {
    if !reduced.is_top() {
        return false;
    }
    rstate.increment(Counter::TrivialGoals);
    state.reason_log(format_args!("trivial: {}", goal));
    true
}

// Hands the goal to the external prover and books the time spent.
fn launch_prover(
    state: &VState,
    rstate: &mut RState,
    iteration: usize,
    goal: &Formula,
    reduced: &Formula,
) -> bool {
    if state.provers.is_empty() {
        return false;
    }
    let on_reduced = state.instructions.flag(Flag::Ontored, false);
    let conclusion = if on_reduced { reduced } else { goal };

    if state.instructions.flag(Flag::Printfulltask, false) {
        println!("prover task:");
        for entry in state.context.iter().rev() {
            println!("  {}", entry.formula);
        }
        println!("  |- {}", conclusion);
    }

    let start = Instant::now();
    let verdict = export::export(
        on_reduced,
        iteration,
        &state.provers,
        &state.instructions,
        &state.context,
        conclusion,
    );
    let elapsed = start.elapsed();
    rstate.add_time(Timer::ProofTime, elapsed);

    match verdict {
        Ok(true) => {
            rstate.add_time(Timer::SuccessTime, elapsed);
            rstate.increment(Counter::SuccessfulGoals);
            true
        }
        Ok(false) => false,
        Err(e) => {
            eprintln!("Warning: {}", e);
            false
        }
    }
}

// Unfolds the negated goal together with the low-level context and
// descends one reasoning level into the result.
fn recurse(
    state: &VState,
    rstate: &mut RState,
    depth: i64,
    iteration: usize,
    goal: &Formula,
) -> bool {
    if depth == 1 {
        state.reason_log("reasoning depth exceeded");
        return false;
    }
    let unfold_state = state.with_goal(goal.clone());
    let mut task = match unfold(&unfold_state, rstate) {
        Some(task) => task,
        None => return false,
    };
    let head = match task.pop_front() {
        Some(head) => head,
        None => return false,
    };
    let new_goal = Formula::not(head.formula);
    let next_state = unfold_state.with_context(task);
    sequence_goals(&next_state, rstate, depth - 1, iteration + 1, &[new_goal])
}

// The internal filter: hand the goal and the low-level context to the
// model-elimination engine under a one-millisecond wall-clock budget.
pub fn launch_reasoning(state: &VState, rstate: &mut RState, stop: Arc<AtomicBool>) -> bool {
    let low_level = state.low_level_context();
    let budget = Budget {
        deadline: Instant::now() + Duration::from_micros(1000),
        stop,
    };
    meson::prove(
        state.skolem_counter,
        &low_level,
        &state.meson_rules,
        &state.thesis.formula,
        &budget,
        rstate,
    )
}

// The fast well-definedness check for one obligation: trivial by
// evidence, or locally obvious to the internal prover.
pub fn verify_obligation(
    state: &VState,
    rstate: &mut RState,
    obligation: &Formula,
    stop: Arc<AtomicBool>,
) -> bool {
    rstate.increment(Counter::Symbols);
    let reduced = reduce_with_evidence(obligation);
    if reduced.is_top() {
        rstate.increment(Counter::TrivialChecks);
        return true;
    }
    rstate.increment(Counter::HardChecks);
    let check_state = state.with_goal(reduced);
    if launch_reasoning(&check_state, rstate, stop) {
        rstate.increment(Counter::SuccessfulChecks);
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextEntry, EntryKind};
    use crate::definitions::{DefEntry, DefKind};
    use crate::formula::TermId;

    const P: TermId = TermId(40);
    const Q: TermId = TermId(41);
    const R: TermId = TermId(42);
    const S: TermId = TermId(43);

    fn p(arg: Formula) -> Formula {
        Formula::term(P, "p", vec![arg])
    }

    fn q(arg: Formula) -> Formula {
        Formula::term(Q, "q", vec![arg])
    }

    fn r(arg: Formula) -> Formula {
        Formula::term(R, "r", vec![arg])
    }

    fn s(arg: Formula) -> Formula {
        Formula::term(S, "s", vec![arg])
    }

    fn with_evidence(name: &str, facts: &[Formula]) -> Formula {
        let mut v = Formula::var(name);
        for fact in facts {
            v.add_info(fact.clone());
        }
        v
    }

    fn goal_state(goal: Formula) -> VState {
        VState::new(ContextEntry::low(EntryKind::Assumption, "thesis", goal))
    }

    #[test]
    fn test_split_conjunction() {
        let a = p(Formula::var("a"));
        let b = q(Formula::var("a"));
        let goals = split_goal(&Formula::and(a.clone(), b.clone()));
        assert_eq!(goals.len(), 2);
        assert_eq!(goals[0], a);
        // The second conjunct is proved under the first as hypothesis.
        assert_eq!(goals[1], Formula::or(Formula::not(a), b));
    }

    #[test]
    fn test_split_universal_distributes() {
        let body = Formula::and(p(Formula::Ind(0)), q(Formula::Ind(0)));
        let goals = split_goal(&Formula::forall("x", body));
        assert_eq!(goals.len(), 2);
        assert!(matches!(goals[0], Formula::All(_, _)));
        assert!(matches!(goals[1], Formula::All(_, _)));
    }

    #[test]
    fn test_split_atom_is_singleton() {
        let goals = split_goal(&p(Formula::var("a")));
        assert_eq!(goals, vec![p(Formula::var("a"))]);
    }

    #[test]
    fn test_trivial_goal_by_annotation() {
        let x = with_evidence("x", &[p(Formula::ThisT)]);
        let state = goal_state(p(x));
        let mut rstate = RState::new();
        assert!(prove_thesis(&state, &mut rstate));
        assert_eq!(rstate.counter(Counter::TrivialGoals), 1);
        assert_eq!(rstate.counter(Counter::Goals), 1);
        assert!(!rstate.failed);
    }

    #[test]
    fn test_contradicted_goal_fails() {
        let x = with_evidence("x", &[Formula::not(p(Formula::ThisT))]);
        let state = goal_state(p(x));
        let mut rstate = RState::new();
        assert!(!prove_thesis(&state, &mut rstate));
        assert_eq!(rstate.counter(Counter::FailedGoals), 1);
        assert!(rstate.failed);
    }

    #[test]
    fn test_conjunction_under_hypothesis() {
        let a = p(with_evidence("x", &[p(Formula::ThisT)]));
        let b = s(with_evidence("x", &[s(Formula::ThisT)]));
        let state = goal_state(Formula::and(a, b));
        let mut rstate = RState::new();
        assert!(prove_thesis(&state, &mut rstate));
        assert_eq!(rstate.counter(Counter::TrivialGoals), 2);
    }

    #[test]
    fn test_unfold_and_recurse() {
        // q(y) <=> r(y) and s(y), with the evidence for r and s sitting
        // on the occurrence. One unfolding round makes the goal trivial.
        let mut state = goal_state(q(with_evidence(
            "a",
            &[r(Formula::ThisT), s(Formula::ThisT)],
        )));
        state.definitions.insert(
            Q,
            DefEntry::new(
                DefKind::Definition,
                q(Formula::var("y")),
                vec![],
                Formula::and(r(Formula::var("y")), s(Formula::var("y"))),
            ),
        );
        let mut rstate = RState::new();
        assert!(prove_thesis(&state, &mut rstate));
        assert_eq!(rstate.counter(Counter::Unfolds), 1);
        assert_eq!(rstate.counter(Counter::Goals), 2);
        assert_eq!(rstate.counter(Counter::TrivialGoals), 1);
        assert_eq!(rstate.counter(Counter::FailedGoals), 0);
    }

    #[test]
    fn test_depth_limit_exhaustion() {
        let mut state = goal_state(q(with_evidence(
            "a",
            &[r(Formula::ThisT), s(Formula::ThisT)],
        )));
        state.definitions.insert(
            Q,
            DefEntry::new(
                DefKind::Definition,
                q(Formula::var("y")),
                vec![],
                Formula::and(r(Formula::var("y")), s(Formula::var("y"))),
            ),
        );
        state.instructions.bound(Limit::Depthlimit, 1);
        let mut rstate = RState::new();
        assert!(!prove_thesis(&state, &mut rstate));
        assert_eq!(rstate.counter(Counter::FailedGoals), 1);
        // The unfolder never ran.
        assert_eq!(rstate.counter(Counter::Unfolds), 0);
    }

    #[test]
    fn test_nonpositive_depth_fails_immediately() {
        let mut state = goal_state(p(Formula::var("a")));
        state.instructions.bound(Limit::Depthlimit, 0);
        let mut rstate = RState::new();
        assert!(!prove_thesis(&state, &mut rstate));
        assert!(rstate.failed);
        assert_eq!(rstate.counter(Counter::Goals), 0);
    }

    #[test]
    fn test_prover_success_books_time() {
        use crate::provers::parse_provers;
        use indoc::indoc;

        let mut state = goal_state(p(Formula::var("a")));
        state.provers = parse_provers(indoc! {"
            Pcat
            Lecho
            C/bin/cat
            Ftptp
            Yfof\\(goal
            Nno_such_line
        "})
        .unwrap();
        let mut rstate = RState::new();
        assert!(prove_thesis(&state, &mut rstate));
        assert_eq!(rstate.counter(Counter::SuccessfulGoals), 1);
        assert_eq!(rstate.counter(Counter::TrivialGoals), 0);
        // Both timers saw this attempt.
        assert!(rstate.fetch_time(Timer::SuccessTime) <= rstate.fetch_time(Timer::ProofTime));
    }

    #[test]
    fn test_launch_reasoning_discharges_local_goal() {
        let mut state = goal_state(q(Formula::var("a")));
        state.context.push_back(ContextEntry::low(
            EntryKind::Assumption,
            "h1",
            p(Formula::var("a")),
        ));
        state.context.push_back(ContextEntry::low(
            EntryKind::Assumption,
            "h2",
            Formula::forall("x", Formula::imp(p(Formula::Ind(0)), q(Formula::Ind(0)))),
        ));
        let mut rstate = RState::new();
        let stop = Arc::new(AtomicBool::new(false));
        assert!(launch_reasoning(&state, &mut rstate, stop));
    }

    #[test]
    fn test_verify_obligation_counts() {
        let state = goal_state(Formula::Top);
        let mut rstate = RState::new();
        let stop = Arc::new(AtomicBool::new(false));

        // Trivial by evidence.
        let trivial_ob = p(with_evidence("x", &[p(Formula::ThisT)]));
        assert!(verify_obligation(&state, &mut rstate, &trivial_ob, stop.clone()));
        assert_eq!(rstate.counter(Counter::TrivialChecks), 1);

        // Hard and unprovable.
        let hard_ob = p(Formula::var("y"));
        assert!(!verify_obligation(&state, &mut rstate, &hard_ob, stop));
        assert_eq!(rstate.counter(Counter::HardChecks), 1);
        assert_eq!(rstate.counter(Counter::SuccessfulChecks), 0);
        assert_eq!(rstate.counter(Counter::Symbols), 2);
    }
}
