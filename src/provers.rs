use std::fmt;
use std::path::Path;

use regex::Regex;

// The prover database: a line-tagged text file describing the external
// provers we can hand a task to. One tag per line:
//
//   P<name>      start a new prover record
//   L<label>     human-readable label
//   C<command>   executable path followed by arguments
//   F<format>    task format, "tptp" or "dfg"
//   Y<pattern>   output pattern indicating success
//   N<pattern>   output pattern indicating failure
//   U<pattern>   output pattern indicating an inconclusive run
//
// Blank lines and lines starting with # are ignored. Patterns are regular
// expressions. Every prover needs a command, at least one Y pattern, and
// at least one N or U pattern.

#[derive(Debug)]
pub struct Error {
    pub line: usize,
    message: String,
}

impl Error {
    fn new(line: usize, message: impl Into<String>) -> Error {
        Error {
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "prover database, line {}: {}", self.line, self.message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProverFormat {
    Tptp,
    Dfg,
}

impl fmt::Display for ProverFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProverFormat::Tptp => write!(f, "tptp"),
            ProverFormat::Dfg => write!(f, "dfg"),
        }
    }
}

// How a prover run came out, as far as its output tells us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Success,
    Failure,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct Prover {
    pub name: String,
    pub label: String,
    pub path: String,
    pub args: Vec<String>,
    pub format: ProverFormat,
    pub success: Vec<Regex>,
    pub failure: Vec<Regex>,
    pub unknown: Vec<Regex>,
}

impl Prover {
    // Classifies prover output against the declared patterns.
    // None means no pattern matched at all.
    pub fn classify(&self, output: &str) -> Option<Response> {
        for line in output.lines() {
            if self.success.iter().any(|p| p.is_match(line)) {
                return Some(Response::Success);
            }
            if self.failure.iter().any(|p| p.is_match(line)) {
                return Some(Response::Failure);
            }
            if self.unknown.iter().any(|p| p.is_match(line)) {
                return Some(Response::Unknown);
            }
        }
        None
    }
}

struct Builder {
    start_line: usize,
    name: String,
    label: String,
    path: String,
    args: Vec<String>,
    format: ProverFormat,
    success: Vec<Regex>,
    failure: Vec<Regex>,
    unknown: Vec<Regex>,
}

impl Builder {
    fn new(start_line: usize, name: &str) -> Builder {
        Builder {
            start_line,
            name: name.to_string(),
            label: String::new(),
            path: String::new(),
            args: vec![],
            format: ProverFormat::Tptp,
            success: vec![],
            failure: vec![],
            unknown: vec![],
        }
    }

    fn finish(self) -> Result<Prover> {
        if self.path.is_empty() {
            return Err(Error::new(
                self.start_line,
                format!("prover '{}' declares no command", self.name),
            ));
        }
        if self.success.is_empty() {
            return Err(Error::new(
                self.start_line,
                format!("prover '{}' declares no success pattern", self.name),
            ));
        }
        if self.failure.is_empty() && self.unknown.is_empty() {
            return Err(Error::new(
                self.start_line,
                format!(
                    "prover '{}' declares neither failure nor unknown patterns",
                    self.name
                ),
            ));
        }
        Ok(Prover {
            name: self.name,
            label: self.label,
            path: self.path,
            args: self.args,
            format: self.format,
            success: self.success,
            failure: self.failure,
            unknown: self.unknown,
        })
    }
}

pub fn parse_provers(text: &str) -> Result<Vec<Prover>> {
    let mut provers = vec![];
    let mut current: Option<Builder> = None;

    for (index, raw) in text.lines().enumerate() {
        let line_number = index + 1;
        let line = raw.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut chars = line.chars();
        let tag = chars.next().unwrap_or(' ');
        let rest = chars.as_str();
        if tag == 'P' {
            if let Some(builder) = current.take() {
                provers.push(builder.finish()?);
            }
            current = Some(Builder::new(line_number, rest));
            continue;
        }
        let builder = match current.as_mut() {
            Some(builder) => builder,
            None => {
                return Err(Error::new(
                    line_number,
                    "expected a P line before any other tag",
                ));
            }
        };
        match tag {
            'L' => builder.label = rest.to_string(),
            'C' => {
                let mut parts = rest.split_whitespace();
                builder.path = match parts.next() {
                    Some(path) => path.to_string(),
                    None => return Err(Error::new(line_number, "empty command")),
                };
                builder.args = parts.map(|s| s.to_string()).collect();
            }
            'F' => {
                builder.format = match rest {
                    "tptp" => ProverFormat::Tptp,
                    "dfg" => ProverFormat::Dfg,
                    other => {
                        return Err(Error::new(
                            line_number,
                            format!("unknown format '{}', expected tptp or dfg", other),
                        ));
                    }
                }
            }
            'Y' | 'N' | 'U' => {
                let pattern = Regex::new(rest).map_err(|e| {
                    Error::new(line_number, format!("bad pattern: {}", e))
                })?;
                match tag {
                    'Y' => builder.success.push(pattern),
                    'N' => builder.failure.push(pattern),
                    _ => builder.unknown.push(pattern),
                }
            }
            other => {
                return Err(Error::new(
                    line_number,
                    format!("unknown tag '{}'", other),
                ));
            }
        }
    }

    if let Some(builder) = current.take() {
        provers.push(builder.finish()?);
    }
    Ok(provers)
}

pub fn load_provers(path: &Path) -> Result<Vec<Prover>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::new(0, format!("cannot read {}: {}", path.display(), e)))?;
    parse_provers(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    const DATABASE: &str = indoc! {"
        # External provers.

        Peprover
        LE Prover
        C/usr/bin/eprover --tptp3-in --auto -s --cpu-limit=%d
        Ftptp
        YProof found
        NNo proof found
        URessource limit exhausted

        Pspass
        LSPASS
        C/usr/bin/spass -TimeLimit=%d -Stdin
        Fdfg
        YProof found
        NCompletion found
    "};

    #[test]
    fn test_parse_database() {
        let provers = parse_provers(DATABASE).expect("should parse");
        assert_eq!(provers.len(), 2);
        assert_eq!(provers[0].name, "eprover");
        assert_eq!(provers[0].label, "E Prover");
        assert_eq!(provers[0].path, "/usr/bin/eprover");
        assert_eq!(provers[0].args.len(), 4);
        assert_eq!(provers[0].format, ProverFormat::Tptp);
        assert_eq!(provers[1].format, ProverFormat::Dfg);
    }

    #[test]
    fn test_classify_output() {
        let provers = parse_provers(DATABASE).unwrap();
        let eprover = &provers[0];
        assert_eq!(
            eprover.classify("# lines\nProof found\n"),
            Some(Response::Success)
        );
        assert_eq!(
            eprover.classify("No proof found\n"),
            Some(Response::Failure)
        );
        assert_eq!(
            eprover.classify("Ressource limit exhausted\n"),
            Some(Response::Unknown)
        );
        assert_eq!(eprover.classify("segfault\n"), None);
    }

    #[test]
    fn test_missing_command_is_fatal() {
        let text = indoc! {"
            Pbroken
            YProof found
            NNo proof found
        "};
        let error = parse_provers(text).unwrap_err();
        assert_eq!(error.line, 1);
    }

    #[test]
    fn test_missing_success_pattern_is_fatal() {
        let text = indoc! {"
            Pbroken
            C/usr/bin/true
            NNo proof found
        "};
        assert!(parse_provers(text).is_err());
    }

    #[test]
    fn test_bad_pattern_reports_line() {
        let text = indoc! {"
            Pbroken
            C/usr/bin/true
            Y[unclosed
            Nnope
        "};
        let error = parse_provers(text).unwrap_err();
        assert_eq!(error.line, 3);
    }

    #[test]
    fn test_load_from_file() {
        use assert_fs::prelude::*;
        let file = assert_fs::NamedTempFile::new("provers.dat").unwrap();
        file.write_str(DATABASE).unwrap();
        let provers = load_provers(file.path()).expect("should load");
        assert_eq!(provers.len(), 2);
    }
}
