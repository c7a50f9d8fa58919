use crate::formula::{albet, bool_simp, lt_twins, replace, Formula};

// Reduces literals against the evidence collected on their argument
// occurrences. Each argument carries a list of facts known about it, with
// ThisT standing for the argument itself; grounding such a fact at the
// argument and comparing it with the literal (or its negation) decides
// the literal without any search.
//
// Equality atoms pass through untouched; equality has its own treatment
// downstream.
pub fn reduce_with_evidence(f: &Formula) -> Formula {
    if f.is_equality() {
        return f.clone();
    }
    if f.is_literal() {
        return reduce_literal(f);
    }
    let head = bool_simp(f.clone());
    bool_simp(head.map(&mut |g| reduce_with_evidence(&g)))
}

fn reduce_literal(l: &Formula) -> Formula {
    let negated = albet(Formula::not(l.clone()));
    let atom = l.atom().strip();
    for t in atom.term_args() {
        for a in t.info() {
            let grounded = replace(t, &Formula::ThisT, a);
            if lt_twins(&grounded, l) {
                return Formula::Top;
            }
            if lt_twins(&grounded, &negated) {
                return Formula::Bot;
            }
        }
    }
    l.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::TermId;

    fn p(arg: Formula) -> Formula {
        Formula::term(TermId(1), "p", vec![arg])
    }

    fn annotated(mut arg: Formula, fact: Formula) -> Formula {
        arg.add_info(fact);
        arg
    }

    #[test]
    fn test_positive_evidence_gives_top() {
        // p(a) where a's info contains p(#)
        let goal = p(annotated(Formula::var("a"), p(Formula::ThisT)));
        assert_eq!(reduce_with_evidence(&goal), Formula::Top);
    }

    #[test]
    fn test_negative_evidence_gives_bot() {
        // p(a) where a's info contains not p(#)
        let goal = p(annotated(
            Formula::var("a"),
            Formula::not(p(Formula::ThisT)),
        ));
        assert_eq!(reduce_with_evidence(&goal), Formula::Bot);
    }

    #[test]
    fn test_negated_literal_uses_evidence() {
        // not p(a) where a's info contains not p(#)
        let goal = Formula::not(p(annotated(
            Formula::var("a"),
            Formula::not(p(Formula::ThisT)),
        )));
        assert_eq!(reduce_with_evidence(&goal), Formula::Top);
    }

    #[test]
    fn test_no_annotations_is_identity() {
        let goal = Formula::and(p(Formula::var("a")), p(Formula::var("b")));
        assert_eq!(reduce_with_evidence(&goal), goal);
    }

    #[test]
    fn test_equality_passes_through() {
        let mut left = Formula::var("a");
        left.add_info(Formula::equality(Formula::ThisT, Formula::var("b")));
        let goal = Formula::equality(left, Formula::var("b"));
        assert_eq!(reduce_with_evidence(&goal), goal);
    }

    #[test]
    fn test_reduction_folds_connectives() {
        let trivial = p(annotated(Formula::var("a"), p(Formula::ThisT)));
        let open = p(Formula::var("b"));
        // (trivial and open) reduces to open
        let goal = Formula::and(trivial.clone(), open.clone());
        assert_eq!(reduce_with_evidence(&goal), open);
        // (trivial or open) reduces to true
        let goal = Formula::or(trivial, open);
        assert_eq!(reduce_with_evidence(&goal), Formula::Top);
    }

    #[test]
    fn test_idempotent() {
        let goal = Formula::forall(
            "x",
            Formula::imp(
                p(annotated(Formula::var("a"), p(Formula::ThisT))),
                p(Formula::Ind(0)),
            ),
        );
        let once = reduce_with_evidence(&goal);
        let twice = reduce_with_evidence(&once);
        assert_eq!(once, twice);
    }
}
