// The instruction surface: named options that the surrounding proof text
// can set and reset. Instructions live on a stack; the most recent setting
// of a name wins, so block-scoped overrides are just pushes.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    Ontored,
    Unfold,
    Unfoldlow,
    Unfoldsf,
    Unfoldlowsf,
    Printreason,
    Printfulltask,
    Printunfold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Depthlimit,
    Timelimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    Prover,
}

#[derive(Debug, Clone)]
pub enum Instruction {
    Set(Flag, bool),
    Bound(Limit, i64),
    Choose(Selector, String),
}

#[derive(Debug, Clone, Default)]
pub struct Instructions {
    stack: Vec<Instruction>,
}

impl Instructions {
    pub fn new() -> Instructions {
        Instructions::default()
    }

    pub fn push(&mut self, instruction: Instruction) {
        self.stack.push(instruction);
    }

    pub fn set(&mut self, flag: Flag, value: bool) {
        self.push(Instruction::Set(flag, value));
    }

    pub fn bound(&mut self, limit: Limit, value: i64) {
        self.push(Instruction::Bound(limit, value));
    }

    pub fn choose(&mut self, selector: Selector, value: &str) {
        self.push(Instruction::Choose(selector, value.to_string()));
    }

    // Readers take the default at the call site, so each consumer states
    // what it assumes when the proof text said nothing.

    pub fn flag(&self, flag: Flag, default: bool) -> bool {
        for instruction in self.stack.iter().rev() {
            if let Instruction::Set(f, value) = instruction {
                if *f == flag {
                    return *value;
                }
            }
        }
        default
    }

    pub fn limit(&self, limit: Limit, default: i64) -> i64 {
        for instruction in self.stack.iter().rev() {
            if let Instruction::Bound(l, value) = instruction {
                if *l == limit {
                    return *value;
                }
            }
        }
        default
    }

    pub fn selector(&self, selector: Selector, default: &str) -> String {
        for instruction in self.stack.iter().rev() {
            if let Instruction::Choose(s, value) = instruction {
                if *s == selector {
                    return value.clone();
                }
            }
        }
        default.to_string()
    }
}
