//! Test case sequences.
//!
//! A [`TestCase`] is a command template plus the exact reply expected after
//! trimming. Templates name keys in braces (`GET {a}`); rendering swaps each
//! placeholder for the namespace-qualified key (`GET ns1700000000_a`).
//!
//! Cases come from one of the built-in [`Suite`]s or from a TOML case file:
//!
//! ```toml
//! [[case]]
//! command = "SET {k} 1"
//! expect = "OK"
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::namespace::Namespace;

const OK: &str = "OK";
const EXISTS: &str = "ERROR: Key already exists";
const NOT_FOUND: &str = "ERROR: Key not found";

/// Scalar, red-black tree and hash namespaces, in that order.
const CANONICAL: &[(&str, &str)] = &[
    ("SET {a} 1", OK),
    ("GET {a}", "OK 1"),
    ("EXIST {a}", OK),
    ("MOD {a} 2", OK),
    ("GET {a}", "OK 2"),
    ("SET {a} 3", EXISTS),
    ("DEL {a}", OK),
    ("GET {a}", NOT_FOUND),
    ("EXIST {a}", NOT_FOUND),
    ("SET {x} 10", OK),
    ("SET {y} 20", OK),
    ("GET {x}", "OK 10"),
    ("GET {y}", "OK 20"),
    ("RSET {r} 100", OK),
    ("RGET {r}", "OK 100"),
    ("RDEL {r}", OK),
    ("RGET {r}", NOT_FOUND),
    ("HSET {h} 42", OK),
    ("HGET {h}", "OK 42"),
    ("HMOD {h} 43", OK),
    ("HGET {h}", "OK 43"),
    ("HDEL {h}", OK),
    ("HGET {h}", NOT_FOUND),
];

/// Verbs and error paths the canonical sequence leaves out. Unknown verbs
/// are not covered: their reply is server-specific.
const EXTENDED_TAIL: &[(&str, &str)] = &[
    ("REXIST {e}", NOT_FOUND),
    ("RSET {e} 5", OK),
    ("RSET {e} 6", EXISTS),
    ("REXIST {e}", OK),
    ("RMOD {e} 6", OK),
    ("RGET {e}", "OK 6"),
    ("RDEL {e}", OK),
    ("REXIST {e}", NOT_FOUND),
    ("HSET {t} 7", OK),
    ("HEXIST {t}", OK),
    ("HSET {t} 8", EXISTS),
    ("HDEL {t}", OK),
    ("HEXIST {t}", NOT_FOUND),
    ("MOD {g} 1", NOT_FOUND),
    ("DEL {g}", NOT_FOUND),
];

/// One command and the reply it must produce.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TestCase {
    pub command: String,
    pub expect: String,
}

impl TestCase {
    pub fn new(command: impl Into<String>, expect: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            expect: expect.into(),
        }
    }

    /// Substitute every `{name}` placeholder with `ns.key(name)`.
    ///
    /// Braces that don't enclose a plain identifier are left alone.
    #[must_use]
    pub fn render(&self, ns: &Namespace) -> String {
        let template = self.command.as_str();
        let mut out = String::with_capacity(template.len() + 16);
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) if is_key_name(&after[..close]) => {
                    out.push_str(&ns.key(&after[..close]));
                    rest = &after[close + 1..];
                },
                _ => {
                    out.push('{');
                    rest = after;
                },
            }
        }
        out.push_str(rest);
        out
    }
}

fn is_key_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Built-in case sequences.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Suite {
    /// The 23-case scalar/rbtree/hash sequence.
    #[default]
    Canonical,
    /// Canonical plus the remaining verbs and error paths.
    Extended,
}

impl Suite {
    #[must_use]
    pub fn cases(self) -> Vec<TestCase> {
        let table: Vec<&(&str, &str)> = match self {
            Self::Canonical => CANONICAL.iter().collect(),
            Self::Extended => CANONICAL.iter().chain(EXTENDED_TAIL).collect(),
        };
        table
            .into_iter()
            .map(|(command, expect)| TestCase::new(*command, *expect))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct CaseFile {
    #[serde(default, rename = "case")]
    cases: Vec<TestCase>,
}

/// Parse cases from TOML text.
///
/// # Errors
///
/// Returns [`Error::Config`] if the text is not valid TOML, has no cases, or
/// contains a case with an empty command.
pub fn parse_cases(content: &str) -> Result<Vec<TestCase>> {
    let file: CaseFile =
        toml::from_str(content).map_err(|e| Error::Config(format!("invalid case file: {e}")))?;

    if file.cases.is_empty() {
        return Err(Error::Config(
            "case file has no [[case]] entries".to_string(),
        ));
    }

    let empty: Vec<String> = file
        .cases
        .iter()
        .enumerate()
        .filter(|(_, c)| c.command.trim().is_empty())
        .map(|(i, _)| i.to_string())
        .collect();
    if !empty.is_empty() {
        return Err(Error::Config(format!(
            "case command cannot be empty (cases: {})",
            empty.join(", ")
        )));
    }

    Ok(file.cases)
}

/// Load cases from a TOML file.
///
/// # Errors
///
/// Returns [`Error::Config`] if the file cannot be read or parsed.
pub fn load_cases<P: AsRef<Path>>(path: P) -> Result<Vec<TestCase>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
    parse_cases(&content)
}
