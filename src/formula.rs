use std::fmt;

// Symbol ids for predicate and function symbols.
// Nonnegative ids are assigned by the surrounding front end.
// Negative ids are reserved for the built-in symbols below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TermId(pub i64);

impl TermId {
    pub const EQUALITY: TermId = TermId(-1);
    pub const ELEMENT: TermId = TermId(-2);
    pub const SET: TermId = TermId(-3);
    pub const FUNCTION: TermId = TermId(-4);
    pub const DOMAIN: TermId = TermId(-5);
    pub const APPLICATION: TermId = TermId(-6);

    pub const fn get(&self) -> i64 {
        self.0
    }
}

// Tags that can wrap a subformula.
// HeadTerm marks the defining equation of a definition or signature block.
// GenericMark marks a subterm the unfolder has already expanded in this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    HeadTerm,
    GenericMark,
}

// The formula tree. Binders use a name hint plus de Bruijn indices:
// a bound occurrence is Ind(d) where d counts the binders between the
// occurrence and the one that binds it.
// Trm and Var carry an "info" list: formulas asserting locally known facts
// about this specific occurrence, with ThisT as the placeholder for the
// occurrence itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Formula {
    Top,
    Bot,
    Not(Box<Formula>),
    And(Box<Formula>, Box<Formula>),
    Or(Box<Formula>, Box<Formula>),
    Imp(Box<Formula>, Box<Formula>),
    Iff(Box<Formula>, Box<Formula>),
    All(String, Box<Formula>),
    Exists(String, Box<Formula>),
    Trm {
        id: TermId,
        name: String,
        args: Vec<Formula>,
        info: Vec<Formula>,
    },
    Var {
        name: String,
        info: Vec<Formula>,
    },
    Ind(usize),
    Tag(Tag, Box<Formula>),
    ThisT,
}

use Formula::*;

impl Formula {
    pub fn not(f: Formula) -> Formula {
        Not(Box::new(f))
    }

    pub fn and(f: Formula, g: Formula) -> Formula {
        And(Box::new(f), Box::new(g))
    }

    pub fn or(f: Formula, g: Formula) -> Formula {
        Or(Box::new(f), Box::new(g))
    }

    pub fn imp(f: Formula, g: Formula) -> Formula {
        Imp(Box::new(f), Box::new(g))
    }

    pub fn iff(f: Formula, g: Formula) -> Formula {
        Iff(Box::new(f), Box::new(g))
    }

    pub fn forall(v: &str, f: Formula) -> Formula {
        All(v.to_string(), Box::new(f))
    }

    pub fn exists(v: &str, f: Formula) -> Formula {
        Exists(v.to_string(), Box::new(f))
    }

    pub fn var(name: &str) -> Formula {
        Var {
            name: name.to_string(),
            info: vec![],
        }
    }

    pub fn term(id: TermId, name: &str, args: Vec<Formula>) -> Formula {
        Trm {
            id,
            name: name.to_string(),
            args,
            info: vec![],
        }
    }

    pub fn equality(left: Formula, right: Formula) -> Formula {
        Formula::term(TermId::EQUALITY, "=", vec![left, right])
    }

    pub fn element(x: Formula, s: Formula) -> Formula {
        Formula::term(TermId::ELEMENT, "in", vec![x, s])
    }

    pub fn is_set(t: Formula) -> Formula {
        Formula::term(TermId::SET, "isSet", vec![t])
    }

    pub fn is_function(t: Formula) -> Formula {
        Formula::term(TermId::FUNCTION, "isFunction", vec![t])
    }

    pub fn domain(t: Formula) -> Formula {
        Formula::term(TermId::DOMAIN, "dom", vec![t])
    }

    pub fn apply(f: Formula, x: Formula) -> Formula {
        Formula::term(TermId::APPLICATION, "app", vec![f, x])
    }

    pub fn is_top(&self) -> bool {
        matches!(self, Top)
    }

    pub fn is_bot(&self) -> bool {
        matches!(self, Bot)
    }

    pub fn is_trm(&self) -> bool {
        matches!(self, Trm { .. })
    }

    pub fn is_equality(&self) -> bool {
        matches!(self, Trm { id, .. } if *id == TermId::EQUALITY)
    }

    // A literal is an atom, or the negation of an atom.
    pub fn is_literal(&self) -> bool {
        match self {
            Trm { .. } => true,
            Not(f) => f.is_trm(),
            _ => false,
        }
    }

    // The atom underneath a literal.
    pub fn atom(&self) -> &Formula {
        match self {
            Not(f) => f,
            f => f,
        }
    }

    pub fn term_id(&self) -> Option<TermId> {
        match self {
            Trm { id, .. } => Some(*id),
            _ => None,
        }
    }

    pub fn term_args(&self) -> &[Formula] {
        match self {
            Trm { args, .. } => args,
            _ => &[],
        }
    }

    pub fn info(&self) -> &[Formula] {
        match self {
            Trm { info, .. } | Var { info, .. } => info,
            _ => &[],
        }
    }

    pub fn add_info(&mut self, fact: Formula) {
        match self {
            Trm { info, .. } | Var { info, .. } => info.push(fact),
            _ => {}
        }
    }

    // Strips outer Tag wrappers.
    pub fn strip(&self) -> &Formula {
        match self {
            Tag(_, f) => f.strip(),
            f => f,
        }
    }

    pub fn is_marked(&self) -> bool {
        matches!(self, Tag(Tag::GenericMark, _))
    }

    pub fn mark(f: Formula) -> Formula {
        Tag(Tag::GenericMark, Box::new(f))
    }

    // A term has a given type when its info contains the matching
    // type annotation about ThisT.
    fn has_type_info(&self, type_id: TermId) -> bool {
        self.info().iter().any(|a| match a.strip() {
            Trm { id, args, .. } => *id == type_id && args.len() == 1 && args[0].strip() == &ThisT,
            _ => false,
        })
    }

    pub fn has_set_type(&self) -> bool {
        self.has_type_info(TermId::SET)
    }

    pub fn has_function_type(&self) -> bool {
        self.has_type_info(TermId::FUNCTION)
    }

    // Applies a function to every direct subformula, leaving everything
    // else about the node intact. Info annotations count as subformulas.
    pub fn map(self, f: &mut impl FnMut(Formula) -> Formula) -> Formula {
        match self {
            Not(g) => Not(Box::new(f(*g))),
            And(g, h) => And(Box::new(f(*g)), Box::new(f(*h))),
            Or(g, h) => Or(Box::new(f(*g)), Box::new(f(*h))),
            Imp(g, h) => Imp(Box::new(f(*g)), Box::new(f(*h))),
            Iff(g, h) => Iff(Box::new(f(*g)), Box::new(f(*h))),
            All(v, g) => All(v, Box::new(f(*g))),
            Exists(v, g) => Exists(v, Box::new(f(*g))),
            Tag(t, g) => Tag(t, Box::new(f(*g))),
            Trm {
                id,
                name,
                args,
                info,
            } => Trm {
                id,
                name,
                args: args.into_iter().map(&mut *f).collect(),
                info: info.into_iter().map(f).collect(),
            },
            Var { name, info } => Var {
                name,
                info: info.into_iter().map(f).collect(),
            },
            leaf => leaf,
        }
    }
}

// One step of constant folding at the head of a formula.
pub fn bool_simp(f: Formula) -> Formula {
    match f {
        And(f, g) => match (*f, *g) {
            (Top, g) => g,
            (f, Top) => f,
            (Bot, _) | (_, Bot) => Bot,
            (f, g) => Formula::and(f, g),
        },
        Or(f, g) => match (*f, *g) {
            (Top, _) | (_, Top) => Top,
            (Bot, g) => g,
            (f, Bot) => f,
            (f, g) => Formula::or(f, g),
        },
        Imp(f, g) => match (*f, *g) {
            (Top, g) => g,
            (_, Top) => Top,
            (Bot, _) => Top,
            (f, Bot) => bool_simp(Formula::not(f)),
            (f, g) => Formula::imp(f, g),
        },
        Iff(f, g) => match (*f, *g) {
            (Top, g) => g,
            (f, Top) => f,
            (Bot, g) => bool_simp(Formula::not(g)),
            (f, Bot) => bool_simp(Formula::not(f)),
            (f, g) => Formula::iff(f, g),
        },
        Not(f) => match *f {
            Top => Bot,
            Bot => Top,
            f => Formula::not(f),
        },
        All(v, f) => match *f {
            Top => Top,
            Bot => Bot,
            f => All(v, Box::new(f)),
        },
        Exists(v, f) => match *f {
            Top => Top,
            Bot => Bot,
            f => Exists(v, Box::new(f)),
        },
        Tag(t, f) => match *f {
            Top => Top,
            Bot => Bot,
            f => Tag(t, Box::new(f)),
        },
        f => f,
    }
}

// One step of polarity normalization at the head of a formula:
// negations move inward, implication and biimplication take their
// disjunctive and conjunctive shapes.
pub fn albet(f: Formula) -> Formula {
    match f {
        Iff(f, g) => Formula::and(
            Formula::imp((*f).clone(), (*g).clone()),
            Formula::imp(*g, *f),
        ),
        Imp(f, g) => Formula::or(Formula::not(*f), *g),
        Not(inner) => match *inner {
            All(v, f) => Exists(v, Box::new(Formula::not(*f))),
            Exists(v, f) => All(v, Box::new(Formula::not(*f))),
            Iff(f, g) => Formula::or(
                Formula::not(Formula::imp((*f).clone(), (*g).clone())),
                Formula::not(Formula::imp(*g, *f)),
            ),
            Imp(f, g) => Formula::and(*f, Formula::not(*g)),
            And(f, g) => Formula::or(Formula::not(*f), Formula::not(*g)),
            Or(f, g) => Formula::and(Formula::not(*f), Formula::not(*g)),
            Not(f) => albet(*f),
            Top => Bot,
            Bot => Top,
            f => Formula::not(f),
        },
        f => f,
    }
}

// Syntactic equivalence that ignores info annotations and tags.
pub fn twins(f: &Formula, g: &Formula) -> bool {
    match (f.strip(), g.strip()) {
        (Top, Top) | (Bot, Bot) | (ThisT, ThisT) => true,
        (Ind(m), Ind(n)) => m == n,
        (Var { name: m, .. }, Var { name: n, .. }) => m == n,
        (
            Trm {
                id: i, args: a, ..
            },
            Trm {
                id: j, args: b, ..
            },
        ) => i == j && a.len() == b.len() && a.iter().zip(b).all(|(x, y)| twins(x, y)),
        (Not(f), Not(g)) => twins(f, g),
        (And(f1, f2), And(g1, g2))
        | (Or(f1, f2), Or(g1, g2))
        | (Imp(f1, f2), Imp(g1, g2))
        | (Iff(f1, f2), Iff(g1, g2)) => twins(f1, g1) && twins(f2, g2),
        (All(_, f), All(_, g)) | (Exists(_, f), Exists(_, g)) => twins(f, g),
        _ => false,
    }
}

// Literal equivalence: equal sign and twin atoms.
pub fn lt_twins(f: &Formula, g: &Formula) -> bool {
    match (f.strip(), g.strip()) {
        (Not(a), Not(b)) => a.strip().is_trm() && b.strip().is_trm() && twins(a, b),
        (a @ Trm { .. }, b @ Trm { .. }) => twins(a, b),
        _ => false,
    }
}

// Replaces every subterm twin-equal to `old` by `new`, everywhere in the
// formula, including inside term arguments. Info lists of replaced
// occurrences are discarded with them.
pub fn replace(new: &Formula, old: &Formula, f: &Formula) -> Formula {
    if twins(f, old) {
        return new.clone();
    }
    f.clone().map(&mut |g| replace(new, old, &g))
}

// Opens the body of a binder: the variable bound immediately above `body`
// becomes a free variable with the given name.
pub fn instantiate(body: &Formula, name: &str) -> Formula {
    open_at(body, 0, name)
}

fn open_at(f: &Formula, depth: usize, name: &str) -> Formula {
    match f {
        Ind(d) if *d == depth => Formula::var(name),
        All(v, g) => All(v.clone(), Box::new(open_at(g, depth + 1, name))),
        Exists(v, g) => Exists(v.clone(), Box::new(open_at(g, depth + 1, name))),
        _ => f.clone().map(&mut |g| open_at(&g, depth, name)),
    }
}

// The inverse of instantiate: a free variable with the given name becomes
// bound at the enclosing binder. The caller wraps the result in All/Exists.
pub fn generalize(name: &str, f: &Formula) -> Formula {
    close_at(f, 0, name)
}

fn close_at(f: &Formula, depth: usize, name: &str) -> Formula {
    match f {
        Var { name: n, .. } if n == name => Ind(depth),
        All(v, g) => All(v.clone(), Box::new(close_at(g, depth + 1, name))),
        Exists(v, g) => Exists(v.clone(), Box::new(close_at(g, depth + 1, name))),
        _ => f.clone().map(&mut |g| close_at(&g, depth, name)),
    }
}

// Substitutes a term for a free variable.
pub fn subst(t: &Formula, name: &str, f: &Formula) -> Formula {
    match f {
        Var { name: n, .. } if n == name => t.clone(),
        _ => f.clone().map(&mut |g| subst(t, name, &g)),
    }
}

// The free variable names of a formula, in first-occurrence order.
pub fn free_names(f: &Formula, acc: &mut Vec<String>) {
    match f {
        Var { name, .. } => {
            if !acc.iter().any(|n| n == name) {
                acc.push(name.clone());
            }
        }
        Not(g) | All(_, g) | Exists(_, g) | Tag(_, g) => free_names(g, acc),
        And(g, h) | Or(g, h) | Imp(g, h) | Iff(g, h) => {
            free_names(g, acc);
            free_names(h, acc);
        }
        Trm { args, .. } => {
            for arg in args {
                free_names(arg, acc);
            }
        }
        _ => {}
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut stack = vec![];
        fmt_rec(self, &mut stack, f)
    }
}

fn binder_name(hint: &str, level: usize) -> String {
    if hint.is_empty() {
        format!("x{}", level)
    } else {
        hint.to_string()
    }
}

fn fmt_rec(formula: &Formula, stack: &mut Vec<String>, f: &mut fmt::Formatter) -> fmt::Result {
    match formula {
        Top => write!(f, "true"),
        Bot => write!(f, "false"),
        ThisT => write!(f, "#"),
        Ind(d) => match stack.iter().rev().nth(*d) {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "?{}", d),
        },
        Var { name, .. } => write!(f, "{}", name),
        Not(g) => {
            write!(f, "not ")?;
            fmt_rec(g, stack, f)
        }
        And(g, h) => fmt_binary(g, "and", h, stack, f),
        Or(g, h) => fmt_binary(g, "or", h, stack, f),
        Imp(g, h) => fmt_binary(g, "implies", h, stack, f),
        Iff(g, h) => fmt_binary(g, "iff", h, stack, f),
        All(v, g) => fmt_binder("forall", v, g, stack, f),
        Exists(v, g) => fmt_binder("exists", v, g, stack, f),
        Tag(_, g) => fmt_rec(g, stack, f),
        Trm {
            id, name, args, ..
        } => {
            if *id == TermId::EQUALITY && args.len() == 2 {
                fmt_rec(&args[0], stack, f)?;
                write!(f, " = ")?;
                return fmt_rec(&args[1], stack, f);
            }
            write!(f, "{}", name)?;
            if args.is_empty() {
                return Ok(());
            }
            write!(f, "(")?;
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                fmt_rec(arg, stack, f)?;
            }
            write!(f, ")")
        }
    }
}

fn fmt_binary(
    g: &Formula,
    op: &str,
    h: &Formula,
    stack: &mut Vec<String>,
    f: &mut fmt::Formatter,
) -> fmt::Result {
    write!(f, "(")?;
    fmt_rec(g, stack, f)?;
    write!(f, " {} ", op)?;
    fmt_rec(h, stack, f)?;
    write!(f, ")")
}

fn fmt_binder(
    kw: &str,
    hint: &str,
    body: &Formula,
    stack: &mut Vec<String>,
    f: &mut fmt::Formatter,
) -> fmt::Result {
    let name = binder_name(hint, stack.len());
    write!(f, "{} {} ", kw, name)?;
    stack.push(name);
    let result = fmt_rec(body, stack, f);
    stack.pop();
    result
}
