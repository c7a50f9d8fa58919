use im::Vector;

use crate::context::{ContextEntry, EntryKind};
use crate::definitions::{DefKind, Definitions, Evaluations};
use crate::formula::{generalize, instantiate, replace, Formula, TermId};
use crate::instruction::Flag;
use crate::matcher::match_formula;
use crate::reduce::reduce_with_evidence;
use crate::state::{Counter, RState, VState};

// Conservative unfolding: one polarity-tracked pass over the goal and the
// low-level context that expands definitions, signature properties,
// set/function extensionality and evaluation rewrites, each occurrence at
// most once. Expanded occurrences stay in place, wrapped in GenericMark,
// with their expansion folded in beside them.
//
// Returns the refreshed task list, negated goal first, followed by the
// untouched top-level context. None when unfolding is switched off or
// made no progress, so the caller can fall through to its alternative.
pub fn unfold(state: &VState, rstate: &mut RState) -> Option<Vector<ContextEntry>> {
    let instructions = &state.instructions;
    let general = instructions.flag(Flag::Unfold, true);
    let general_sf = instructions.flag(Flag::Unfoldsf, true);
    let low = instructions.flag(Flag::Unfoldlow, true);
    let low_sf = instructions.flag(Flag::Unfoldlowsf, false);
    if !general && !general_sf {
        return None;
    }

    let goal_entry = state
        .thesis
        .set_formula(Formula::not(state.thesis.formula.clone()));
    let split = state
        .context
        .iter()
        .position(|e| !e.low_level)
        .unwrap_or(state.context.len());
    let low_level = state.context.clone().slice(..split);
    let top_level = state.context.clone().slice(split..);

    let mut expansions = 0;

    // The goal itself unfolds under the general settings; the low-level
    // context only if the low-level switches are also on.
    let mut result = Vector::new();
    result.push_back(unfold_conservative(
        state,
        &goal_entry,
        general,
        general_sf,
        &mut expansions,
    ));
    for entry in &low_level {
        result.push_back(unfold_conservative(
            state,
            entry,
            general && low,
            general_sf && low_sf,
            &mut expansions,
        ));
    }

    if expansions == 0 {
        state.unfold_log("nothing to unfold");
        return None;
    }
    for entry in &result {
        state.unfold_log(&entry.formula);
    }
    rstate.add_count(Counter::Unfolds, expansions);

    result.append(top_level);
    Some(result)
}

fn unfold_conservative(
    state: &VState,
    entry: &ContextEntry,
    setting: bool,
    set_setting: bool,
    expansions: &mut usize,
) -> ContextEntry {
    // Unfolding high-level definitions of the block itself would make for
    // irritating feedback, so declarations stay as they are.
    if entry.kind == EntryKind::LowDefinition {
        return entry.clone();
    }
    let mut unfolder = Unfolder {
        definitions: &state.definitions,
        evaluations: &state.evaluations,
        setting,
        set_setting,
        count: 0,
    };
    let filled = unfolder.fill(Some(true), 0, entry.formula.clone());
    *expansions += unfolder.count;
    if unfolder.count == 0 {
        entry.clone()
    } else {
        entry.set_formula(filled)
    }
}

struct Unfolder<'a> {
    definitions: &'a Definitions,
    evaluations: &'a Evaluations,

    // Definitional unfolding enabled for this item.
    setting: bool,

    // Extensionality and evaluation unfolding enabled for this item.
    set_setting: bool,

    count: usize,
}

impl Unfolder<'_> {
    // Walks the formula with the current polarity and binder depth.
    // Binders are opened with index-derived names and closed again on the
    // way out, so all term manipulation happens on free variables.
    fn fill(&mut self, sign: Option<bool>, depth: usize, f: Formula) -> Formula {
        if f.is_marked() {
            return f;
        }
        match f {
            Formula::Trm { .. } => reduce_with_evidence(&self.atomic(sign, f)),
            Formula::Iff(g, h) => {
                // Rewrite to implications first, so every position has a
                // defined polarity.
                let forward = Formula::imp((*g).clone(), (*h).clone());
                let backward = Formula::imp(*h, *g);
                self.fill(sign, depth, Formula::and(forward, backward))
            }
            Formula::Not(g) => Formula::not(self.fill(sign.map(|s| !s), depth, *g)),
            Formula::Imp(g, h) => {
                let antecedent = self.fill(sign.map(|s| !s), depth, *g);
                let consequent = self.fill(sign, depth, *h);
                Formula::imp(antecedent, consequent)
            }
            Formula::And(g, h) => {
                let left = self.fill(sign, depth, *g);
                let right = self.fill(sign, depth, *h);
                Formula::and(left, right)
            }
            Formula::Or(g, h) => {
                let left = self.fill(sign, depth, *g);
                let right = self.fill(sign, depth, *h);
                Formula::or(left, right)
            }
            Formula::All(v, body) => {
                let name = format!("?u{}", depth);
                let opened = instantiate(&body, &name);
                let filled = self.fill(sign, depth + 1, opened);
                Formula::All(v, Box::new(generalize(&name, &filled)))
            }
            Formula::Exists(v, body) => {
                let name = format!("?u{}", depth);
                let opened = instantiate(&body, &name);
                let filled = self.fill(sign, depth + 1, opened);
                Formula::Exists(v, Box::new(generalize(&name, &filled)))
            }
            Formula::Tag(t, g) => Formula::Tag(t, Box::new(self.fill(sign, depth, *g))),
            leaf => leaf,
        }
    }

    // Expands one atom. The atom stays in place under a GenericMark; its
    // own properties fold in conjunctively in positive positions and
    // disjunctively otherwise; properties of its subterms fold in as
    // conjuncts (positive) or hypotheses (negative).
    fn atomic(&mut self, sign: Option<bool>, f: Formula) -> Formula {
        let local = self.local_properties(sign, &f);
        let mut subterm = vec![];
        for t in proper_subterms(&f) {
            subterm.extend(self.local_properties(sign, &t));
        }

        let mut result = Formula::mark(f);
        for prop in local {
            result = if sign == Some(true) {
                Formula::and(result, prop)
            } else {
                Formula::or(result, prop)
            };
        }
        for prop in subterm {
            result = if sign == Some(true) {
                Formula::and(result, prop)
            } else {
                Formula::imp(prop, result)
            };
        }
        result
    }

    // The properties of one term or atom.
    fn local_properties(&mut self, sign: Option<bool>, t: &Formula) -> Vec<Formula> {
        match t.strip() {
            Formula::Trm { id, args, .. } if *id == TermId::EQUALITY && args.len() == 2 => {
                let (l, r) = (&args[0], &args[1]);
                let mut props = self.definitional(sign, l, r);
                props.extend(self.definitional(sign, r, l));
                props.extend(self.extensionalities(sign, l, r));
                props
            }
            Formula::Trm { id, .. }
                if *id == TermId::APPLICATION || *id == TermId::ELEMENT =>
            {
                self.eval_properties(sign, t)
            }
            Formula::Trm { .. } => self.definitional(sign, t, t),
            _ => vec![],
        }
    }

    // The definitional property of f, instantiated at g. Signatures only
    // expand in positive positions.
    fn definitional(&mut self, sign: Option<bool>, f: &Formula, g: &Formula) -> Vec<Formula> {
        if !self.setting {
            return vec![];
        }
        let entry = match f.term_id().and_then(|id| self.definitions.get(id)) {
            Some(entry) => entry,
            None => return vec![],
        };
        if sign != Some(true) && entry.kind != DefKind::Definition {
            return vec![];
        }
        let sub = match match_formula(&entry.term, f.strip()) {
            Some(sub) => sub,
            None => return vec![],
        };
        let body = sub.apply(&entry.formula);
        if body.is_top() {
            // An erased definition carries no content.
            return vec![];
        }
        self.count += 1;
        vec![replace(&Formula::mark(g.strip().clone()), &Formula::ThisT, &body)]
    }

    fn extensionalities(&mut self, sign: Option<bool>, l: &Formula, r: &Formula) -> Vec<Formula> {
        if !self.set_setting {
            return vec![];
        }
        let mut props = vec![];
        if l.has_set_type() && r.has_set_type() {
            // forall v . (v in l <=> v in r)
            let ext = Formula::forall(
                "",
                Formula::iff(
                    Formula::element(Formula::Ind(0), l.strip().clone()),
                    Formula::element(Formula::Ind(0), r.strip().clone()),
                ),
            );
            props.push(ext);
            self.count += 1;
        }
        if l.has_function_type() && r.has_function_type() {
            let dom_l = Formula::domain(l.strip().clone());
            let dom_r = Formula::domain(r.strip().clone());
            let domains = if sign == Some(true) {
                Formula::equality(dom_l.clone(), dom_r)
            } else {
                Formula::forall(
                    "",
                    Formula::iff(
                        Formula::element(Formula::Ind(0), dom_l.clone()),
                        Formula::element(Formula::Ind(0), dom_r),
                    ),
                )
            };
            let values = Formula::forall(
                "",
                Formula::imp(
                    Formula::element(Formula::Ind(0), dom_l),
                    Formula::equality(
                        Formula::apply(l.strip().clone(), Formula::Ind(0)),
                        Formula::apply(r.strip().clone(), Formula::Ind(0)),
                    ),
                ),
            );
            props.push(Formula::and(domains, values));
            self.count += 1;
        }
        props
    }

    // Evaluation rewrites: every candidate whose pattern matches and
    // whose conditions are trivially discharged contributes its branch
    // for the current polarity.
    fn eval_properties(&mut self, sign: Option<bool>, t: &Formula) -> Vec<Formula> {
        if !self.set_setting {
            return vec![];
        }
        let mut props = vec![];
        for candidate in self.evaluations.lookup(t.strip()) {
            let sub = match match_formula(&candidate.term, t.strip()) {
                Some(sub) => sub,
                None => continue,
            };
            let discharged = candidate
                .conditions
                .iter()
                .all(|c| reduce_with_evidence(&sub.apply(c)).is_top());
            if !discharged {
                continue;
            }
            let branch = if sign == Some(true) {
                &candidate.positive
            } else {
                &candidate.negative
            };
            let prop = replace(
                &Formula::mark(t.strip().clone()),
                &Formula::ThisT,
                &sub.apply(branch),
            );
            props.push(prop);
            self.count += 1;
        }
        props
    }
}

// Every unmarked Trm strictly inside the arguments of an atom, parents
// before children. The two sides of an equation are excluded: the
// equation's own properties already cover them crosswise.
fn proper_subterms(atom: &Formula) -> Vec<Formula> {
    let mut acc = vec![];
    let stripped = atom.strip();
    let skip_args = stripped.is_equality();
    for arg in stripped.term_args() {
        if skip_args {
            for nested in arg.strip().term_args() {
                collect_subterms(nested, &mut acc);
            }
        } else {
            collect_subterms(arg, &mut acc);
        }
    }
    acc
}

fn collect_subterms(t: &Formula, acc: &mut Vec<Formula>) {
    if t.is_marked() {
        return;
    }
    if t.strip().is_trm() {
        acc.push(t.clone());
    }
    for arg in t.strip().term_args() {
        collect_subterms(arg, acc);
    }
}
