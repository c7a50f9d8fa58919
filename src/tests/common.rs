// Shared helpers for the integration tests.

use crate::context::{ContextEntry, EntryKind};
use crate::formula::{albet, Formula, TermId};
use crate::provers::{parse_provers, Prover};
use crate::state::VState;

pub const P: TermId = TermId(100);
pub const Q: TermId = TermId(101);
pub const R: TermId = TermId(102);
pub const S: TermId = TermId(103);

pub fn p(arg: Formula) -> Formula {
    Formula::term(P, "p", vec![arg])
}

pub fn q(arg: Formula) -> Formula {
    Formula::term(Q, "q", vec![arg])
}

pub fn r(arg: Formula) -> Formula {
    Formula::term(R, "r", vec![arg])
}

pub fn s(arg: Formula) -> Formula {
    Formula::term(S, "s", vec![arg])
}

// A variable occurrence carrying evidence annotations.
pub fn with_evidence(name: &str, facts: &[Formula]) -> Formula {
    let mut v = Formula::var(name);
    for fact in facts {
        v.add_info(fact.clone());
    }
    v
}

pub fn goal_state(goal: Formula) -> VState {
    VState::new(ContextEntry::low(EntryKind::Assumption, "thesis", goal))
}

// Full polarity normalization, for comparing formulas modulo albet.
pub fn deep_albet(f: &Formula) -> Formula {
    albet(f.clone()).map(&mut |g| deep_albet(&g))
}

// Fake provers built on /bin/cat, which echoes the task back. Every task
// starts with a "% prover task" comment line, so a pattern on that line
// decides the verdict deterministically.
pub fn succeeding_prover() -> Vec<Prover> {
    parse_provers("Pcat\nLecho\nC/bin/cat\nFtptp\nYprover task\nNnever").expect("should parse")
}

pub fn failing_prover() -> Vec<Prover> {
    parse_provers("Pcat\nLecho\nC/bin/cat\nFtptp\nYnever\nNprover task").expect("should parse")
}
