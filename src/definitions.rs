use std::collections::HashMap;

use nohash_hasher::BuildNoHashHasher;
use qp_trie::Trie;

use crate::formula::{twins, Formula, TermId};
use crate::matcher::match_formula;

// Id-keyed map; symbol ids are already well distributed.
pub type IntMap<V> = HashMap<i64, V, BuildNoHashHasher<i64>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefKind {
    Definition,
    Signature,
}

// The definitional entry for one symbol. The term is the defining pattern
// (the symbol applied to distinct variables); the formula is the definiens
// with ThisT as the placeholder for the defined value. Signatures only
// state properties, so they may only be expanded in positive positions.
#[derive(Debug, Clone)]
pub struct DefEntry {
    pub guards: Vec<Formula>,
    pub formula: Formula,
    pub kind: DefKind,
    pub term: Formula,

    // Literal consequences about the defined value, attachable as info.
    pub evidence: Vec<Formula>,

    // Guards grouped by the pattern variable they constrain.
    pub guard_groups: Vec<Vec<Formula>>,
}

impl DefEntry {
    pub fn new(kind: DefKind, term: Formula, guards: Vec<Formula>, formula: Formula) -> DefEntry {
        let evidence = direct_evidence(&formula);
        let guard_groups = group_guards(&term, &guards);
        DefEntry {
            guards,
            formula,
            kind,
            term,
            evidence,
            guard_groups,
        }
    }
}

// The literal conjuncts of the definiens that speak about the defined
// value directly. These are the facts worth attaching to occurrences.
fn direct_evidence(formula: &Formula) -> Vec<Formula> {
    let mut conjuncts = vec![];
    collect_conjuncts(formula, &mut conjuncts);
    conjuncts
        .into_iter()
        .filter(|c| c.is_literal() && mentions_this(c.atom()))
        .collect()
}

fn mentions_this(f: &Formula) -> bool {
    match f.strip() {
        Formula::ThisT => true,
        Formula::Trm { args, .. } => args.iter().any(mentions_this),
        Formula::Not(g) => mentions_this(g),
        _ => false,
    }
}

fn collect_conjuncts(f: &Formula, acc: &mut Vec<Formula>) {
    match f.strip() {
        Formula::And(g, h) => {
            collect_conjuncts(g, acc);
            collect_conjuncts(h, acc);
        }
        other => acc.push(other.clone()),
    }
}

// Groups guards by the first pattern variable they mention; guards that
// mention no pattern variable form a trailing group of their own.
fn group_guards(term: &Formula, guards: &[Formula]) -> Vec<Vec<Formula>> {
    let mut groups: Vec<Vec<Formula>> = vec![];
    let mut rest: Vec<Formula> = vec![];
    let pattern_vars: Vec<&str> = term
        .term_args()
        .iter()
        .filter_map(|arg| match arg.strip() {
            Formula::Var { name, .. } => Some(name.as_str()),
            _ => None,
        })
        .collect();
    for (i, var) in pattern_vars.iter().enumerate() {
        let group: Vec<Formula> = guards
            .iter()
            .filter(|g| mentions_var(g, var))
            .filter(|g| !pattern_vars[..i].iter().any(|earlier| mentions_var(g, earlier)))
            .cloned()
            .collect();
        if !group.is_empty() {
            groups.push(group);
        }
    }
    for guard in guards {
        if !pattern_vars.iter().any(|v| mentions_var(guard, v)) {
            rest.push(guard.clone());
        }
    }
    if !rest.is_empty() {
        groups.push(rest);
    }
    groups
}

fn mentions_var(f: &Formula, var: &str) -> bool {
    let mut names = vec![];
    crate::formula::free_names(f, &mut names);
    names.iter().any(|n| n == var)
}

// The definition map for all symbols in scope.
#[derive(Debug, Clone, Default)]
pub struct Definitions {
    map: IntMap<DefEntry>,
}

impl Definitions {
    pub fn new() -> Definitions {
        Definitions::default()
    }

    pub fn insert(&mut self, id: TermId, entry: DefEntry) {
        self.map.insert(id.get(), entry);
    }

    pub fn get(&self, id: TermId) -> Option<&DefEntry> {
        self.map.get(&id.get())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    // Attaches each defined symbol's instantiated evidence to the matching
    // occurrences. This is how the info lists the evidence reducer relies
    // on get populated.
    pub fn annotate(&self, f: &Formula) -> Formula {
        let annotated = f.clone().map(&mut |g| self.annotate(&g));
        match annotated {
            Formula::Trm {
                id,
                name,
                args,
                mut info,
            } => {
                let node = Formula::Trm {
                    id,
                    name: name.clone(),
                    args: args.clone(),
                    info: vec![],
                };
                if let Some(entry) = self.get(id) {
                    if let Some(sub) = match_formula(&entry.term, &node) {
                        for fact in &entry.evidence {
                            let grounded = sub.apply(fact);
                            if !info.iter().any(|old| twins(old, &grounded)) {
                                info.push(grounded);
                            }
                        }
                    }
                }
                Formula::Trm {
                    id,
                    name,
                    args,
                    info,
                }
            }
            other => other,
        }
    }

    // The instantiated guard obligations for one occurrence, groupwise.
    pub fn obligations_for(&self, t: &Formula) -> Vec<Vec<Formula>> {
        let entry = match t.term_id().and_then(|id| self.get(id)) {
            Some(entry) => entry,
            None => return vec![],
        };
        let sub = match match_formula(&entry.term, t) {
            Some(sub) => sub,
            None => return vec![],
        };
        entry
            .guard_groups
            .iter()
            .map(|group| group.iter().map(|g| sub.apply(g)).collect())
            .collect()
    }
}

// One evaluation rewrite: when the pattern matches and every condition is
// trivially discharged, an occurrence rewrites to the positive or the
// negative branch depending on polarity.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub term: Formula,
    pub conditions: Vec<Formula>,
    pub positive: Formula,
    pub negative: Formula,
}

// Evaluations indexed by the head symbol of their pattern.
#[derive(Clone)]
pub struct Evaluations {
    index: Trie<Vec<u8>, Vec<Evaluation>>,
}

impl Default for Evaluations {
    fn default() -> Evaluations {
        Evaluations::new()
    }
}

impl Evaluations {
    pub fn new() -> Evaluations {
        Evaluations {
            index: Trie::new(),
        }
    }

    fn key(id: TermId) -> Vec<u8> {
        id.get().to_be_bytes().to_vec()
    }

    pub fn insert(&mut self, evaluation: Evaluation) {
        let id = match evaluation.term.term_id() {
            Some(id) => id,
            None => return,
        };
        let key = Evaluations::key(id);
        if let Some(bucket) = self.index.get_mut(&key[..]) {
            bucket.push(evaluation);
        } else {
            self.index.insert(key, vec![evaluation]);
        }
    }

    pub fn lookup(&self, t: &Formula) -> &[Evaluation] {
        match t.term_id() {
            Some(id) => self
                .index
                .get(&Evaluations::key(id)[..])
                .map(|bucket| bucket.as_slice())
                .unwrap_or(&[]),
            None => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
