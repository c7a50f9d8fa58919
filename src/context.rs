use im::Vector;

use crate::formula::{free_names, generalize, instantiate, replace, Formula, Tag, TermId};
use crate::reduce::reduce_with_evidence;

// What kind of statement a context entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Definition,
    Signature,
    LowDefinition,
    Axiom,
    Lemma,
    Theorem,
    Assumption,
}

// One statement available to the prover: the formula as stated, a cached
// evidence-reduced form, and enough metadata to decide whether and how the
// context filter keeps it.
#[derive(Debug, Clone)]
pub struct ContextEntry {
    pub formula: Formula,
    pub reduced: Formula,
    pub kind: EntryKind,

    // Entries introduced inside the current proof block.
    pub low_level: bool,

    // The name used for citation lookup. May be empty.
    pub name: String,

    // Names this statement explicitly cites.
    pub link: Vec<String>,
}

impl ContextEntry {
    pub fn new(kind: EntryKind, name: &str, formula: Formula) -> ContextEntry {
        let reduced = reduce_with_evidence(&formula);
        ContextEntry {
            formula,
            reduced,
            kind,
            low_level: false,
            name: name.to_string(),
            link: vec![],
        }
    }

    pub fn low(kind: EntryKind, name: &str, formula: Formula) -> ContextEntry {
        let mut entry = ContextEntry::new(kind, name, formula);
        entry.low_level = true;
        entry
    }

    // Swaps in a new formula, keeping the metadata and refreshing the
    // reduced cache.
    pub fn set_formula(&self, formula: Formula) -> ContextEntry {
        let reduced = reduce_with_evidence(&formula);
        ContextEntry {
            formula,
            reduced,
            ..self.clone()
        }
    }

    pub fn is_definitional(&self) -> bool {
        matches!(self.kind, EntryKind::Definition | EntryKind::Signature)
    }
}

// Rewrites a definition or signature head into usable form. The head has
// the shape  forall v1 ... vn . (HeadTerm[# = t] => F)  for signatures, or
// the same with <=> for definitions. The universals are stripped, their
// bound occurrences rebound to index-derived names; the head equation is
// erased by substituting the definiendum t for the # placeholder in the
// body. For definitions the reverse direction survives as an explicit
// implication. A body of Top erases the whole statement, quantifiers
// included.
pub fn rewrite_head(f: &Formula) -> Formula {
    dive(0, f.clone())
}

fn dive(n: usize, f: Formula) -> Formula {
    match f {
        Formula::All(_, body) => dive(n + 1, instantiate(&body, &head_var(n))),
        Formula::Imp(head, body) => match definiens(&head) {
            Some(t) => {
                if body.is_top() {
                    Formula::Top
                } else {
                    replace(&t, &Formula::ThisT, &body)
                }
            }
            None => Formula::Imp(head, body),
        },
        Formula::Iff(head, body) => match definiens(&head) {
            Some(t) => {
                if body.is_top() {
                    return Formula::Top;
                }
                let direct = replace(&t, &Formula::ThisT, &body);
                // The reverse direction quantifies the defined value
                // itself, so the placeholder becomes one more variable.
                let value = Formula::var(&head_var(n));
                let premise = replace(&value, &Formula::ThisT, &body);
                let equation = replace(&value, &Formula::ThisT, head.strip());
                let reverse = close_head_vars(n + 1, Formula::imp(premise, equation));
                Formula::and(direct, reverse)
            }
            None => Formula::Iff(head, body),
        },
        other => other,
    }
}

fn head_var(n: usize) -> String {
    format!("?{}", n)
}

// The definiendum of a HeadTerm-tagged equation.
fn definiens(head: &Formula) -> Option<Formula> {
    match head {
        Formula::Tag(Tag::HeadTerm, eq) => match eq.strip() {
            Formula::Trm { id, args, .. } if *id == TermId::EQUALITY && args.len() == 2 => {
                Some(args[1].clone())
            }
            _ => None,
        },
        _ => None,
    }
}

// Recloses the stripped head variables over the reverse implication, so
// it stands on its own. Only variables that actually occur are rebound.
fn close_head_vars(n: usize, f: Formula) -> Formula {
    let mut used = vec![];
    free_names(&f, &mut used);
    let mut result = f;
    for i in (0..n).rev() {
        let name = head_var(i);
        if used.iter().any(|u| *u == name) {
            result = Formula::All(String::new(), Box::new(generalize(&name, &result)));
        }
    }
    result
}

// Selects which prior statements reach the prover.
//
// Without citations, everything non-trivial is kept, with definition and
// signature heads rewritten. With citations, the low-level prefix is kept
// as-is, the cited top-level statements are extracted, and every
// non-trivial top-level definition or signature rides along rewritten,
// since the prover always needs the type information they carry.
pub fn filter_context(thesis: &ContextEntry, context: &Vector<ContextEntry>) -> Vector<ContextEntry> {
    if thesis.link.is_empty() {
        return context
            .iter()
            .filter(|e| !e.reduced.is_top())
            .filter_map(rewrite_entry)
            .collect();
    }

    let split = context
        .iter()
        .position(|e| !e.low_level)
        .unwrap_or(context.len());
    let low_level = context.clone().slice(..split);
    let top_level = context.clone().slice(split..);

    let mut missing: Vec<&str> = thesis
        .link
        .iter()
        .map(|name| name.as_str())
        .filter(|name| !top_level.iter().any(|e| &e.name == name))
        .collect();
    missing.dedup();
    if !missing.is_empty() {
        eprintln!(
            "Warning: could not find the cited section{} {}",
            if missing.len() == 1 { "" } else { "s" },
            missing.join(", ")
        );
    }

    let linked = top_level
        .iter()
        .filter(|e| thesis.link.iter().any(|name| name == &e.name))
        .cloned();

    let defs_and_sigs = top_level
        .iter()
        .filter(|e| e.is_definitional() && !e.reduced.is_top())
        .filter(|e| !thesis.link.iter().any(|name| name == &e.name))
        .filter_map(rewrite_entry);

    let mut result = low_level;
    result.extend(linked);
    result.extend(defs_and_sigs);
    result
}

// Applies head rewriting where it applies; drops entries whose rewritten
// formula collapses to Top.
fn rewrite_entry(entry: &ContextEntry) -> Option<ContextEntry> {
    if !entry.is_definitional() {
        return Some(entry.clone());
    }
    let rewritten = entry.set_formula(rewrite_head(&entry.formula));
    if rewritten.reduced.is_top() {
        None
    } else {
        Some(rewritten)
    }
}
