//! Precondition queries.
//!
//! A query is a conjunction of clauses evaluated left to right. Each clause
//! either filters the current binding sets or expands them with new variable
//! bindings:
//!
//! - `?owner.traits.friendly` — the fact must exist
//! - `?owner.relationships.?peer` — binds `peer` once per matching child
//! - `not ?other.traits.human` — no match may exist
//! - `?c >= 20` — numeric comparison (`==`/`!=` also compare text)

use thiserror::Error;

use super::{path_segments, Bindings, FactDatabase};

/// Errors raised while parsing precondition clauses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("empty precondition clause")]
    EmptyClause,
    #[error("malformed fact pattern {0:?}")]
    MalformedPattern(String),
    #[error("empty variable name in {0:?}")]
    EmptyVariable(String),
    #[error("malformed comparison {0:?}")]
    MalformedComparison(String),
}

/// A pattern segment or comparison operand
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Var(String),
    Literal(String),
}

impl Term {
    fn parse(token: &str, clause: &str) -> Result<Self, QueryError> {
        match token.strip_prefix('?') {
            Some("") => Err(QueryError::EmptyVariable(clause.to_string())),
            Some(name) => Ok(Term::Var(name.to_string())),
            None => Ok(Term::Literal(token.to_string())),
        }
    }

    fn resolve<'a>(&'a self, bindings: &'a Bindings) -> Option<&'a str> {
        match self {
            Term::Var(name) => bindings.get(name).map(String::as_str),
            Term::Literal(value) => Some(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl CompareOp {
    fn parse(token: &str) -> Option<Self> {
        match token {
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Ge),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Le),
            "==" => Some(CompareOp::Eq),
            "!=" => Some(CompareOp::Ne),
            _ => None,
        }
    }

    fn holds(&self, lhs: &str, rhs: &str) -> bool {
        match (lhs.parse::<f64>(), rhs.parse::<f64>()) {
            (Ok(a), Ok(b)) => match self {
                CompareOp::Gt => a > b,
                CompareOp::Ge => a >= b,
                CompareOp::Lt => a < b,
                CompareOp::Le => a <= b,
                CompareOp::Eq => a == b,
                CompareOp::Ne => a != b,
            },
            _ => match self {
                CompareOp::Eq => lhs == rhs,
                CompareOp::Ne => lhs != rhs,
                _ => false,
            },
        }
    }
}

/// A fact path with variable segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    segments: Vec<Term>,
    /// The last segment follows a `!`
    exclusive_last: bool,
}

impl Pattern {
    fn parse(text: &str) -> Result<Self, QueryError> {
        if text.matches('!').count() > 1 {
            return Err(QueryError::MalformedPattern(text.to_string()));
        }
        let segments = path_segments(text)
            .into_iter()
            .map(|s| Term::parse(s, text))
            .collect::<Result<Vec<_>, _>>()?;
        if segments.is_empty() {
            return Err(QueryError::MalformedPattern(text.to_string()));
        }
        Ok(Self {
            segments,
            exclusive_last: text.contains('!'),
        })
    }

    fn matches(&self, db: &dyn FactDatabase, bindings: &Bindings) -> Vec<Bindings> {
        let mut out = Vec::new();
        self.match_from(db, 0, "", bindings.clone(), &mut out);
        out
    }

    fn join(&self, index: usize, prefix: &str, segment: &str) -> String {
        if prefix.is_empty() {
            return segment.to_string();
        }
        let separator = if self.exclusive_last && index + 1 == self.segments.len() {
            '!'
        } else {
            '.'
        };
        format!("{}{}{}", prefix, separator, segment)
    }

    fn match_from(
        &self,
        db: &dyn FactDatabase,
        index: usize,
        prefix: &str,
        bindings: Bindings,
        out: &mut Vec<Bindings>,
    ) {
        let Some(term) = self.segments.get(index) else {
            out.push(bindings);
            return;
        };
        let bound = match term {
            Term::Literal(value) => Some(value.clone()),
            Term::Var(name) => bindings.get(name).cloned(),
        };
        match (term, bound) {
            (_, Some(value)) => {
                let path = self.join(index, prefix, &value);
                if db.contains(&path) {
                    self.match_from(db, index + 1, &path, bindings, out);
                }
            }
            (Term::Var(name), None) => {
                for child in db.children(prefix) {
                    let path = self.join(index, prefix, &child);
                    let mut extended = bindings.clone();
                    extended.insert(name.clone(), child);
                    self.match_from(db, index + 1, &path, extended, out);
                }
            }
            (Term::Literal(_), None) => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    Fact(Pattern),
    Not(Pattern),
    Compare { lhs: Term, op: CompareOp, rhs: Term },
}

impl Clause {
    pub fn parse(text: &str) -> Result<Self, QueryError> {
        let text = text.trim();
        let tokens: Vec<&str> = text.split_whitespace().collect();
        match tokens.as_slice() {
            [] => Err(QueryError::EmptyClause),
            ["not", pattern] => Ok(Clause::Not(Pattern::parse(pattern)?)),
            [pattern] => Ok(Clause::Fact(Pattern::parse(pattern)?)),
            [lhs, op, rhs] => {
                let op = CompareOp::parse(op)
                    .ok_or_else(|| QueryError::MalformedComparison(text.to_string()))?;
                Ok(Clause::Compare {
                    lhs: Term::parse(lhs, text)?,
                    op,
                    rhs: Term::parse(rhs, text)?,
                })
            }
            _ => Err(QueryError::MalformedPattern(text.to_string())),
        }
    }

    fn expand(&self, db: &dyn FactDatabase, bindings: Bindings) -> Vec<Bindings> {
        match self {
            Clause::Fact(pattern) => pattern.matches(db, &bindings),
            Clause::Not(pattern) => {
                if pattern.matches(db, &bindings).is_empty() {
                    vec![bindings]
                } else {
                    Vec::new()
                }
            }
            Clause::Compare { lhs, op, rhs } => {
                let holds = match (lhs.resolve(&bindings), rhs.resolve(&bindings)) {
                    (Some(a), Some(b)) => op.holds(a, b),
                    _ => false,
                };
                if holds {
                    vec![bindings]
                } else {
                    Vec::new()
                }
            }
        }
    }
}

/// Outcome of running a query
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryResult {
    pub success: bool,
    /// One entry per satisfying assignment, in deterministic order
    pub bindings: Vec<Bindings>,
}

/// A parsed precondition
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Query {
    clauses: Vec<Clause>,
}

impl Query {
    /// A query with no clauses, satisfied by any bindings.
    pub fn always() -> Self {
        Self::default()
    }

    pub fn parse<S: AsRef<str>>(clauses: &[S]) -> Result<Self, QueryError> {
        let clauses = clauses
            .iter()
            .map(|c| Clause::parse(c.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { clauses })
    }

    pub fn is_unconditional(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Evaluates the query seeded with `bindings`.
    pub fn run(&self, db: &dyn FactDatabase, bindings: &Bindings) -> QueryResult {
        let mut sets = vec![bindings.clone()];
        for clause in &self.clauses {
            sets = sets
                .into_iter()
                .flat_map(|b| clause.expand(db, b))
                .collect();
            if sets.is_empty() {
                break;
            }
        }
        QueryResult {
            success: !sets.is_empty(),
            bindings: sets,
        }
    }
}
