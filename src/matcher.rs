use fxhash::FxHashMap;

use crate::formula::{twins, Formula};

// A substitution from free variable names to terms.
// Produced by one-sided matching, applied to definitional bodies,
// evaluation branches, and guard conditions.
#[derive(Debug, Clone, Default)]
pub struct Substitution {
    map: FxHashMap<String, Formula>,
}

impl Substitution {
    pub fn new() -> Substitution {
        Substitution::default()
    }

    pub fn bind(&mut self, name: &str, t: Formula) {
        self.map.insert(name.to_string(), t);
    }

    pub fn get(&self, name: &str) -> Option<&Formula> {
        self.map.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    // Applies the substitution to every free variable occurrence.
    pub fn apply(&self, f: &Formula) -> Formula {
        match f {
            Formula::Var { name, .. } => match self.map.get(name) {
                Some(t) => t.clone(),
                None => f.clone(),
            },
            _ => f.clone().map(&mut |g| self.apply(&g)),
        }
    }
}

// One-sided matching: free variables of the pattern bind to subterms of
// the target. The target is never changed; a variable seen twice must
// match twin-equal subterms. Tags and info are ignored on both sides.
pub fn match_formula(pattern: &Formula, target: &Formula) -> Option<Substitution> {
    let mut sub = Substitution::new();
    if match_into(pattern, target, &mut sub) {
        Some(sub)
    } else {
        None
    }
}

fn match_into(pattern: &Formula, target: &Formula, sub: &mut Substitution) -> bool {
    match (pattern.strip(), target.strip()) {
        (Formula::Var { name, .. }, t) => match sub.get(name) {
            Some(prev) => twins(prev, t),
            None => {
                sub.bind(name, t.clone());
                true
            }
        },
        (
            Formula::Trm {
                id: i, args: a, ..
            },
            Formula::Trm {
                id: j, args: b, ..
            },
        ) => {
            i == j
                && a.len() == b.len()
                && a.iter().zip(b).all(|(x, y)| match_into(x, y, sub))
        }
        (Formula::ThisT, Formula::ThisT) => true,
        (Formula::Ind(m), Formula::Ind(n)) => m == n,
        (Formula::Top, Formula::Top) | (Formula::Bot, Formula::Bot) => true,
        _ => false,
    }
}
