use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::formula::{albet, bool_simp, lt_twins, Formula};
use crate::matcher::{match_formula, Substitution};
use crate::state::{Counter, RState};

// A model-elimination prover used as a fast filter for locally obvious
// goals. Rules are contrapositives of clauses: to establish the
// conclusion, establish every assumption. Search is depth-bounded with
// iterative deepening, closes branches against ancestors, and stops the
// moment the deadline passes or the stop flag is raised.

#[derive(Debug, Clone)]
pub struct Rule {
    pub assumptions: Vec<Formula>,
    pub conclusion: Formula,
}

#[derive(Debug, Clone, Default)]
pub struct MesonRules {
    pub positive: Vec<Rule>,
    pub negative: Vec<Rule>,
}

impl MesonRules {
    pub fn new() -> MesonRules {
        MesonRules::default()
    }

    // Compiles a formula into contrapositive rules and adds them to the
    // matching polarity buckets. Existential witnesses are named with the
    // skolem counter.
    pub fn add(&mut self, skolem: &mut usize, f: &Formula) {
        let mut clauses = vec![];
        clausify(skolem, 0, f.clone(), &mut clauses);
        for clause in clauses {
            for (i, literal) in clause.iter().enumerate() {
                let assumptions: Vec<Formula> = clause
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, l)| negate_literal(l))
                    .collect();
                let rule = Rule {
                    assumptions,
                    conclusion: literal.clone(),
                };
                match literal {
                    Formula::Not(_) => self.negative.push(rule),
                    _ => self.positive.push(rule),
                }
            }
        }
    }
}

fn negate_literal(l: &Formula) -> Formula {
    match l {
        Formula::Not(f) => (**f).clone(),
        f => Formula::not(f.clone()),
    }
}

// A pragmatic clausifier for the shapes the reasoner feeds the filter.
// Universals open into free variables, existentials into skolem constants;
// conjunction splits, disjunction distributes shallowly. Anything beyond
// that becomes a unit pseudo-literal and simply never matches.
fn clausify(skolem: &mut usize, fresh: usize, f: Formula, acc: &mut Vec<Vec<Formula>>) {
    match albet(bool_simp(f)) {
        Formula::Top => {}
        Formula::And(g, h) => {
            clausify(skolem, fresh, *g, acc);
            clausify(skolem, fresh, *h, acc);
        }
        Formula::All(_, body) => {
            let name = format!("u{}", fresh);
            clausify(skolem, fresh + 1, crate::formula::instantiate(&body, &name), acc);
        }
        Formula::Exists(_, body) => {
            *skolem += 1;
            let witness = Formula::term(
                crate::formula::TermId(-1000 - *skolem as i64),
                &format!("sk{}", *skolem),
                vec![],
            );
            let opened = crate::formula::instantiate(&body, "?witness");
            let grounded = crate::formula::subst(&witness, "?witness", &opened);
            clausify(skolem, fresh, grounded, acc);
        }
        Formula::Or(g, h) => {
            let mut left = vec![];
            let mut right = vec![];
            clausify(skolem, fresh, *g, &mut left);
            clausify(skolem, fresh, *h, &mut right);
            if left.is_empty() || right.is_empty() {
                // One side was trivially true.
                return;
            }
            for l in &left {
                for r in &right {
                    let mut joined = l.clone();
                    joined.extend(r.iter().cloned());
                    acc.push(joined);
                }
            }
        }
        Formula::Bot => acc.push(vec![]),
        literal => acc.push(vec![literal]),
    }
}

// The search budget: a hard deadline plus a cooperative stop flag the
// host may raise at any time.
pub struct Budget {
    pub deadline: Instant,
    pub stop: Arc<AtomicBool>,
}

impl Budget {
    pub fn exhausted(&self) -> bool {
        self.stop.load(Ordering::Relaxed) || Instant::now() >= self.deadline
    }
}

// Attempts to refute the negated goal, i.e. to prove the goal from the
// rules compiled out of the local context. Returns a definite verdict:
// true only when a closed tableau was found within the budget.
pub fn prove(
    mut skolem: usize,
    local_context: &[Formula],
    rules: &MesonRules,
    goal: &Formula,
    budget: &Budget,
    rstate: &mut RState,
) -> bool {
    let mut all_rules = MesonRules::new();
    all_rules.positive = rules.positive.clone();
    all_rules.negative = rules.negative.clone();
    for f in local_context {
        all_rules.add(&mut skolem, f);
    }

    let mut goals = vec![];
    clausify_goal(&mut skolem, goal, &mut goals);

    for depth in 1..=MAX_DEPTH {
        if budget.exhausted() {
            return false;
        }
        if goals
            .iter()
            .all(|g| solve(g, &[], &all_rules, depth, budget, rstate))
        {
            return true;
        }
    }
    false
}

// The goal splits into independent subgoals along conjunctions and
// universals; each must close on its own.
fn clausify_goal(skolem: &mut usize, goal: &Formula, acc: &mut Vec<Formula>) {
    match albet(bool_simp(goal.clone())) {
        Formula::Top => {}
        Formula::And(g, h) => {
            clausify_goal(skolem, &g, acc);
            clausify_goal(skolem, &h, acc);
        }
        Formula::All(_, body) => {
            *skolem += 1;
            let witness = Formula::term(
                crate::formula::TermId(-1000 - *skolem as i64),
                &format!("sk{}", *skolem),
                vec![],
            );
            let opened = crate::formula::instantiate(&body, "?goalvar");
            clausify_goal(skolem, &crate::formula::subst(&witness, "?goalvar", &opened), acc);
        }
        other => acc.push(other),
    }
}

const MAX_DEPTH: usize = 8;

fn solve(
    goal: &Formula,
    ancestors: &[Formula],
    rules: &MesonRules,
    depth: usize,
    budget: &Budget,
    rstate: &mut RState,
) -> bool {
    if budget.exhausted() || depth == 0 {
        return false;
    }
    if goal.is_top() {
        return true;
    }

    let is_equation = goal.atom().strip().is_equality();
    if is_equation {
        rstate.increment(Counter::Equations);
        // Reflexivity is the one equality rule the filter knows.
        if let Formula::Trm { args, .. } = goal.atom().strip() {
            if args.len() == 2 && crate::formula::twins(&args[0], &args[1]) && !matches!(goal, Formula::Not(_)) {
                return true;
            }
        }
    }

    // Close against an ancestor: a branch containing both a literal and
    // its negation is contradictory.
    let negated = negate_literal(goal);
    if ancestors.iter().any(|a| lt_twins(a, &negated)) {
        return true;
    }
    if ancestors.iter().any(|a| lt_twins(a, goal)) {
        // Already assumed; expanding again cannot make progress.
        return false;
    }

    let bucket = match goal {
        Formula::Not(_) => &rules.negative,
        _ => &rules.positive,
    };

    let mut extended = ancestors.to_vec();
    extended.push(goal.clone());

    for rule in bucket {
        if let Some(sub) = match_rule(&rule.conclusion, goal) {
            if rule
                .assumptions
                .iter()
                .all(|a| solve(&sub.apply(a), &extended, rules, depth - 1, budget, rstate))
            {
                return true;
            }
        }
    }
    if is_equation {
        rstate.increment(Counter::FailedEquations);
    }
    false
}

// Matches a rule conclusion (pattern side) against a goal literal.
fn match_rule(conclusion: &Formula, goal: &Formula) -> Option<Substitution> {
    match (conclusion, goal) {
        (Formula::Not(c), Formula::Not(g)) => match_formula(c, g),
        (Formula::Not(_), _) | (_, Formula::Not(_)) => None,
        (c, g) => match_formula(c, g),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::TermId;
    use std::time::Duration;

    fn p(arg: Formula) -> Formula {
        Formula::term(TermId(1), "p", vec![arg])
    }

    fn q(arg: Formula) -> Formula {
        Formula::term(TermId(2), "q", vec![arg])
    }

    fn budget() -> Budget {
        Budget {
            deadline: Instant::now() + Duration::from_millis(50),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    #[test]
    fn test_proves_by_modus_ponens() {
        // p(a), forall x (p(x) -> q(x)) |- q(a)
        let mut rules = MesonRules::new();
        let mut skolem = 0;
        rules.add(&mut skolem, &p(Formula::var("a")));
        rules.add(
            &mut skolem,
            &Formula::forall(
                "x",
                Formula::imp(p(Formula::Ind(0)), q(Formula::Ind(0))),
            ),
        );
        let mut rstate = RState::new();
        assert!(prove(
            skolem,
            &[],
            &rules,
            &q(Formula::var("a")),
            &budget(),
            &mut rstate
        ));
    }

    #[test]
    fn test_does_not_prove_unsupported_goal() {
        let mut rules = MesonRules::new();
        let mut skolem = 0;
        rules.add(&mut skolem, &p(Formula::var("a")));
        let mut rstate = RState::new();
        assert!(!prove(
            skolem,
            &[],
            &rules,
            &q(Formula::var("a")),
            &budget(),
            &mut rstate
        ));
    }

    #[test]
    fn test_local_context_contributes_rules() {
        let mut rstate = RState::new();
        assert!(prove(
            0,
            &[p(Formula::var("a"))],
            &MesonRules::new(),
            &p(Formula::var("a")),
            &budget(),
            &mut rstate
        ));
    }

    #[test]
    fn test_reflexivity() {
        let mut rstate = RState::new();
        let goal = Formula::equality(Formula::var("a"), Formula::var("a"));
        assert!(prove(0, &[], &MesonRules::new(), &goal, &budget(), &mut rstate));
        assert_eq!(rstate.counter(Counter::Equations), 1);
    }

    #[test]
    fn test_exhausted_budget_is_a_failure() {
        let stop = Arc::new(AtomicBool::new(true));
        let exhausted = Budget {
            deadline: Instant::now() + Duration::from_millis(50),
            stop,
        };
        let mut rstate = RState::new();
        assert!(!prove(
            0,
            &[p(Formula::var("a"))],
            &MesonRules::new(),
            &p(Formula::var("a")),
            &exhausted,
            &mut rstate
        ));
    }

    #[test]
    fn test_resolution_through_negation() {
        // not p(a) or q(a), p(a) |- q(a)
        let mut rules = MesonRules::new();
        let mut skolem = 0;
        rules.add(
            &mut skolem,
            &Formula::or(Formula::not(p(Formula::var("a"))), q(Formula::var("a"))),
        );
        rules.add(&mut skolem, &p(Formula::var("a")));
        let mut rstate = RState::new();
        assert!(prove(
            skolem,
            &[],
            &rules,
            &q(Formula::var("a")),
            &budget(),
            &mut rstate
        ));
    }
}
