use std::fmt;
use std::io::Write;
use std::process::{Command, Stdio};

use im::Vector;

use crate::context::ContextEntry;
use crate::formula::{free_names, Formula, TermId};
use crate::instruction::{Instructions, Limit, Selector};
use crate::provers::{Prover, ProverFormat, Response};

// Serializes a goal and its context into a prover task, hands it to the
// selected external prover, and classifies the response. The prover's own
// time limit argument enforces the budget; we block until it exits.

#[derive(Debug)]
pub struct Error {
    message: String,
}

impl Error {
    fn new(message: impl Into<String>) -> Error {
        Error {
            message: message.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "export: {}", self.message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub fn export(
    on_reduced: bool,
    iteration: usize,
    provers: &[Prover],
    instructions: &Instructions,
    context: &Vector<ContextEntry>,
    goal: &Formula,
) -> Result<bool> {
    let prover = select_prover(provers, instructions)?;
    let timelimit = instructions.limit(Limit::Timelimit, 3);

    let task = match prover.format {
        ProverFormat::Tptp => tptp_task(iteration, on_reduced, context, goal),
        ProverFormat::Dfg => dfg_task(iteration, on_reduced, context, goal),
    };

    let output = run_prover(prover, timelimit, &task)?;
    match prover.classify(&output) {
        Some(Response::Success) => Ok(true),
        Some(Response::Failure) | Some(Response::Unknown) => Ok(false),
        None => {
            eprintln!(
                "Warning: unclassified output from prover '{}'",
                prover.name
            );
            Ok(false)
        }
    }
}

fn select_prover<'a>(provers: &'a [Prover], instructions: &Instructions) -> Result<&'a Prover> {
    let first = match provers.first() {
        Some(prover) => prover,
        None => return Err(Error::new("no provers available")),
    };
    let name = instructions.selector(Selector::Prover, &first.name);
    provers
        .iter()
        .find(|p| p.name == name)
        .ok_or_else(|| Error::new(format!("no prover named '{}'", name)))
}

// Runs the prover with %d replaced by the time limit. If any argument
// mentions %f the task goes through a file; otherwise it is piped in.
fn run_prover(prover: &Prover, timelimit: i64, task: &str) -> Result<String> {
    let via_file = prover.args.iter().any(|a| a.contains("%f"));
    let task_file = if via_file {
        let mut file = tempfile::NamedTempFile::new()
            .map_err(|e| Error::new(format!("cannot create task file: {}", e)))?;
        file.write_all(task.as_bytes())
            .map_err(|e| Error::new(format!("cannot write task file: {}", e)))?;
        Some(file)
    } else {
        None
    };

    let args: Vec<String> = prover
        .args
        .iter()
        .map(|a| {
            let a = a.replace("%d", &timelimit.to_string());
            match &task_file {
                Some(file) => a.replace("%f", &file.path().to_string_lossy()),
                None => a,
            }
        })
        .collect();

    let mut command = Command::new(&prover.path);
    command.args(&args).stdout(Stdio::piped()).stderr(Stdio::null());
    if via_file {
        command.stdin(Stdio::null());
    } else {
        command.stdin(Stdio::piped());
    }

    let mut child = command
        .spawn()
        .map_err(|e| Error::new(format!("cannot run {}: {}", prover.path, e)))?;
    if !via_file {
        let stdin = child.stdin.as_mut().expect("stdin was piped");
        stdin
            .write_all(task.as_bytes())
            .map_err(|e| Error::new(format!("cannot write to {}: {}", prover.path, e)))?;
    }
    let output = child
        .wait_with_output()
        .map_err(|e| Error::new(format!("{} failed: {}", prover.path, e)))?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn entry_formula<'a>(on_reduced: bool, entry: &'a ContextEntry) -> &'a Formula {
    if on_reduced {
        &entry.reduced
    } else {
        &entry.formula
    }
}

// ---- TPTP ----

pub fn tptp_task(
    iteration: usize,
    on_reduced: bool,
    context: &Vector<ContextEntry>,
    goal: &Formula,
) -> String {
    let mut out = String::new();
    out.push_str(&format!("% prover task, round {}\n", iteration + 1));
    // The context is most-recent-first; provers read better chronologically.
    for (i, entry) in context.iter().rev().enumerate() {
        let formula = entry_formula(on_reduced, entry);
        if formula.is_top() {
            continue;
        }
        out.push_str(&format!(
            "fof(m{}, hypothesis, {}).\n",
            i,
            tptp_formula(formula)
        ));
    }
    out.push_str(&format!("fof(goal, conjecture, {}).\n", tptp_formula(goal)));
    out
}

pub fn tptp_formula(f: &Formula) -> String {
    let mut names = vec![];
    free_names(f, &mut names);
    let mut renderer = Renderer::new(Dialect::Tptp, names);
    renderer.closed(f)
}

// ---- DFG ----

pub fn dfg_task(
    iteration: usize,
    on_reduced: bool,
    context: &Vector<ContextEntry>,
    goal: &Formula,
) -> String {
    let mut functions = vec![];
    let mut predicates = vec![];
    for entry in context.iter() {
        collect_symbols(entry_formula(on_reduced, entry), true, &mut functions, &mut predicates);
    }
    collect_symbols(goal, true, &mut functions, &mut predicates);

    let mut out = String::new();
    out.push_str("begin_problem(task).\n\n");
    out.push_str("list_of_descriptions.\n");
    out.push_str("name({* prover task *}).\nauthor({* tanoak *}).\nstatus(unknown).\n");
    out.push_str(&format!("description({{* round {} *}}).\n", iteration + 1));
    out.push_str("end_of_list.\n\n");

    out.push_str("list_of_symbols.\n");
    if !functions.is_empty() {
        let rendered: Vec<String> = functions
            .iter()
            .map(|(name, arity)| format!("({},{})", name, arity))
            .collect();
        out.push_str(&format!("functions[{}].\n", rendered.join(",")));
    }
    if !predicates.is_empty() {
        let rendered: Vec<String> = predicates
            .iter()
            .map(|(name, arity)| format!("({},{})", name, arity))
            .collect();
        out.push_str(&format!("predicates[{}].\n", rendered.join(",")));
    }
    out.push_str("end_of_list.\n\n");

    out.push_str("list_of_formulae(axioms).\n");
    for (i, entry) in context.iter().rev().enumerate() {
        let formula = entry_formula(on_reduced, entry);
        if formula.is_top() {
            continue;
        }
        out.push_str(&format!("formula({},m{}).\n", dfg_formula(formula), i));
    }
    out.push_str("end_of_list.\n\n");

    out.push_str("list_of_formulae(conjectures).\n");
    out.push_str(&format!("formula({},goal).\n", dfg_formula(goal)));
    out.push_str("end_of_list.\n\nend_problem.\n");
    out
}

pub fn dfg_formula(f: &Formula) -> String {
    let mut names = vec![];
    free_names(f, &mut names);
    let mut renderer = Renderer::new(Dialect::Dfg, names);
    renderer.closed(f)
}

// Symbol declarations for DFG: predicates occur in formula position,
// functions in term position. Equality is built in and not declared.
fn collect_symbols(
    f: &Formula,
    formula_position: bool,
    functions: &mut Vec<(String, usize)>,
    predicates: &mut Vec<(String, usize)>,
) {
    match f {
        Formula::Trm {
            id, name, args, ..
        } => {
            if *id != TermId::EQUALITY {
                let symbol = (sanitize(name), args.len());
                let bucket = if formula_position {
                    &mut *predicates
                } else {
                    &mut *functions
                };
                if !bucket.contains(&symbol) {
                    bucket.push(symbol);
                }
            }
            for arg in args {
                collect_symbols(arg, false, functions, predicates);
            }
        }
        Formula::Not(g) | Formula::All(_, g) | Formula::Exists(_, g) | Formula::Tag(_, g) => {
            collect_symbols(g, formula_position, functions, predicates)
        }
        Formula::And(g, h)
        | Formula::Or(g, h)
        | Formula::Imp(g, h)
        | Formula::Iff(g, h) => {
            collect_symbols(g, formula_position, functions, predicates);
            collect_symbols(h, formula_position, functions, predicates);
        }
        _ => {}
    }
}

// ---- shared rendering ----

enum Dialect {
    Tptp,
    Dfg,
}

struct Renderer {
    dialect: Dialect,

    // Free variable names in order; rendered as X0, X1, ...
    free: Vec<String>,

    // Binder depth while rendering.
    depth: usize,
}

impl Renderer {
    fn new(dialect: Dialect, free: Vec<String>) -> Renderer {
        Renderer {
            dialect,
            free,
            depth: 0,
        }
    }

    // Renders the formula with its free variables universally closed.
    fn closed(&mut self, f: &Formula) -> String {
        if self.free.is_empty() {
            return self.formula(f);
        }
        let vars: Vec<String> = (0..self.free.len()).map(|i| format!("X{}", i)).collect();
        let body = self.formula(f);
        match self.dialect {
            Dialect::Tptp => format!("! [{}] : ({})", vars.join(","), body),
            Dialect::Dfg => format!("forall([{}],{})", vars.join(","), body),
        }
    }

    fn var(&self, depth_from_here: usize) -> String {
        // Bound variables are Y0, Y1, ... outermost first.
        format!("Y{}", self.depth - 1 - depth_from_here)
    }

    fn formula(&mut self, f: &Formula) -> String {
        match f {
            Formula::Top => match self.dialect {
                Dialect::Tptp => "$true".to_string(),
                Dialect::Dfg => "true".to_string(),
            },
            Formula::Bot => match self.dialect {
                Dialect::Tptp => "$false".to_string(),
                Dialect::Dfg => "false".to_string(),
            },
            Formula::Not(g) => {
                if let Formula::Trm { id, args, .. } = g.strip() {
                    if *id == TermId::EQUALITY && args.len() == 2 {
                        if let Dialect::Tptp = self.dialect {
                            return format!(
                                "({} != {})",
                                self.formula(&args[0]),
                                self.formula(&args[1])
                            );
                        }
                    }
                }
                match self.dialect {
                    Dialect::Tptp => format!("~ {}", self.formula(g)),
                    Dialect::Dfg => format!("not({})", self.formula(g)),
                }
            }
            Formula::And(g, h) => self.binary("&", "and", g, h),
            Formula::Or(g, h) => self.binary("|", "or", g, h),
            Formula::Imp(g, h) => self.binary("=>", "implies", g, h),
            Formula::Iff(g, h) => self.binary("<=>", "equiv", g, h),
            Formula::All(_, body) => self.quantified(true, body),
            Formula::Exists(_, body) => self.quantified(false, body),
            Formula::Tag(_, g) => self.formula(g),
            Formula::Ind(d) => self.var(*d),
            Formula::Var { name, .. } => {
                match self.free.iter().position(|n| n == name) {
                    Some(i) => format!("X{}", i),
                    None => sanitize(name),
                }
            }
            Formula::ThisT => "this".to_string(),
            Formula::Trm {
                id, name, args, ..
            } => {
                if *id == TermId::EQUALITY && args.len() == 2 {
                    let left = self.formula(&args[0]);
                    let right = self.formula(&args[1]);
                    return match self.dialect {
                        Dialect::Tptp => format!("({} = {})", left, right),
                        Dialect::Dfg => format!("equal({},{})", left, right),
                    };
                }
                if args.is_empty() {
                    return sanitize(name);
                }
                let rendered: Vec<String> = args.iter().map(|a| self.formula(a)).collect();
                format!("{}({})", sanitize(name), rendered.join(","))
            }
        }
    }

    fn binary(&mut self, tptp_op: &str, dfg_op: &str, g: &Formula, h: &Formula) -> String {
        let left = self.formula(g);
        let right = self.formula(h);
        match self.dialect {
            Dialect::Tptp => format!("({} {} {})", left, tptp_op, right),
            Dialect::Dfg => format!("{}({},{})", dfg_op, left, right),
        }
    }

    fn quantified(&mut self, universal: bool, body: &Formula) -> String {
        self.depth += 1;
        let var = format!("Y{}", self.depth - 1);
        let rendered = self.formula(body);
        self.depth -= 1;
        match self.dialect {
            Dialect::Tptp => {
                let op = if universal { "!" } else { "?" };
                format!("{} [{}] : ({})", op, var, rendered)
            }
            Dialect::Dfg => {
                let op = if universal { "forall" } else { "exists" };
                format!("{}([{}],{})", op, var, rendered)
            }
        }
    }
}

// Prover input wants plain lowercase identifiers.
fn sanitize(name: &str) -> String {
    let mut out = String::new();
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c.to_ascii_lowercase());
        } else {
            out.push('_');
        }
    }
    if !out.starts_with(|c: char| c.is_ascii_lowercase()) {
        out.insert(0, 'a');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EntryKind;
    use crate::formula::Formula;
    use crate::provers::parse_provers;
    use indoc::indoc;

    fn p(arg: Formula) -> Formula {
        Formula::term(TermId(1), "p", vec![arg])
    }

    #[test]
    fn test_tptp_closes_free_variables() {
        let f = Formula::imp(p(Formula::var("a")), p(Formula::var("b")));
        assert_eq!(tptp_formula(&f), "! [X0,X1] : ((p(X0) => p(X1)))");
    }

    #[test]
    fn test_tptp_renders_quantifiers_and_equality() {
        let f = Formula::forall(
            "x",
            Formula::not(Formula::equality(Formula::Ind(0), Formula::Ind(0))),
        );
        assert_eq!(tptp_formula(&f), "! [Y0] : ((Y0 != Y0))");
    }

    #[test]
    fn test_tptp_task_layout() {
        let mut context = Vector::new();
        context.push_back(ContextEntry::new(EntryKind::Axiom, "late", p(Formula::var("b"))));
        context.push_back(ContextEntry::new(EntryKind::Axiom, "early", p(Formula::var("c"))));
        let task = tptp_task(0, false, &context, &p(Formula::var("a")));
        let lines: Vec<&str> = task.lines().collect();
        assert_eq!(lines[0], "% prover task, round 1");
        // Reversed to chronological order: the oldest entry first.
        assert!(lines[1].contains("p(X0)"));
        assert!(lines[1].starts_with("fof(m0, hypothesis,"));
        assert!(lines[3].starts_with("fof(goal, conjecture,"));
    }

    #[test]
    fn test_dfg_task_declares_symbols() {
        let mut context = Vector::new();
        let fa = Formula::term(TermId(2), "f", vec![Formula::var("a")]);
        context.push_back(ContextEntry::new(EntryKind::Axiom, "ax", p(fa)));
        let task = dfg_task(0, false, &context, &p(Formula::var("b")));
        assert!(task.contains("begin_problem(task)."));
        assert!(task.contains("predicates[(p,1)]."));
        assert!(task.contains("functions[(f,1)]."));
        assert!(task.contains("list_of_formulae(conjectures)."));
        assert!(task.contains("end_problem."));
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("isSet"), "isset");
        assert_eq!(sanitize("+"), "a_");
        assert_eq!(sanitize("Succ"), "succ");
    }

    // /bin/cat echoes the task back, so a pattern that matches the task
    // itself exercises the full pipeline hermetically.
    #[test]
    fn test_export_through_cat() {
        let provers = parse_provers(indoc! {"
            Pcat
            Lecho
            C/bin/cat
            Ftptp
            Yfof\\(goal
            Nno_such_line
        "})
        .unwrap();
        let instructions = Instructions::new();
        let context = Vector::new();
        let verdict = export(
            false,
            0,
            &provers,
            &instructions,
            &context,
            &p(Formula::var("a")),
        )
        .expect("cat should run");
        assert!(verdict);
    }

    #[test]
    fn test_export_through_task_file() {
        let provers = parse_provers(indoc! {"
            Pcatfile
            Lecho
            C/bin/cat %f
            Ftptp
            Yfof\\(goal
            Nno_such_line
        "})
        .unwrap();
        let instructions = Instructions::new();
        let context = Vector::new();
        let verdict = export(
            false,
            0,
            &provers,
            &instructions,
            &context,
            &p(Formula::var("a")),
        )
        .expect("cat should run");
        assert!(verdict);
    }

    #[test]
    fn test_missing_prover_is_an_error() {
        let provers = vec![];
        let instructions = Instructions::new();
        let context = Vector::new();
        assert!(export(false, 0, &provers, &instructions, &context, &Formula::Top).is_err());
    }
}
