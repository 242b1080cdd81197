//! Program parser
//!
//! A program is a sequence of directives (lines starting with `#`) and
//! clauses. Directives take effect immediately; clauses accumulated
//! between directives are parsed and executed as a batch.
//!
//! Clause syntax:
//!
//! ```text
//! (duck is-a bird)                         ; assert a fact
//! (rule may-fly
//!   (<s> is-a bird)
//!   -(<s> fly _)
//!   => (<s> fly-prepare can))              ; production with negated condition
//! (query (<s> fly can))                    ; query with variables
//! ```
//!
//! `<name>` is a variable, `_` a wildcard, `;` starts a comment. The
//! parser produces a plain-string AST; interning happens at load time.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, multispace0},
    combinator::opt,
    IResult,
};

/// Parser error type
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("Syntax error at offset {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("Malformed directive: {message}")]
    Directive { message: String },

    #[error("Unexpected end of input")]
    UnexpectedEof,
}

/// One field of a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AstTerm {
    Constant(String),
    Variable(String),
    Wildcard,
}

/// A `(id attr val)` pattern, possibly negated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AstPattern {
    pub id: AstTerm,
    pub attr: AstTerm,
    pub val: AstTerm,
    pub negative: bool,
}

/// A parsed clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    Assert {
        id: String,
        attr: String,
        val: String,
    },
    Rule {
        name: String,
        lhs: Vec<AstPattern>,
        rhs: Option<AstPattern>,
    },
    Query {
        conditions: Vec<AstPattern>,
    },
}

/// A schema field: a constant or the `_` wildcard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaTerm {
    Constant(String),
    Any,
}

impl SchemaTerm {
    fn parse(word: &str) -> Self {
        if word == "_" {
            SchemaTerm::Any
        } else {
            SchemaTerm::Constant(word.to_string())
        }
    }
}

/// A parsed directive.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// `#stratum`
    Stratum,
    /// `#schemacheck on|off`
    SchemaCheck(bool),
    /// `#schema ID ATTR VAL [description…]`
    Schema {
        id: SchemaTerm,
        attr: String,
        val: SchemaTerm,
        description: Option<String>,
    },
    /// `#fuzzy system NAME` (name validated by the loader)
    FuzzySystem(String),
    /// `#fuzzy kind NAME VAL:sigmoid A C, …`
    FuzzyKind {
        name: String,
        values: Vec<(String, f64, f64)>,
    },
    /// `#fuzzy var NAME KIND`
    FuzzyVar { name: String, kind: String },
}

/// One piece of a program in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A directive line (leading `#` included).
    Directive(String),
    /// A batch of clause text between directives.
    Clauses(String),
}

/// Split a program into directive lines and clause batches, preserving
/// source order. Directives take effect at the point they appear.
pub fn segments(input: &str) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut batch = String::new();
    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            if !batch.trim().is_empty() {
                out.push(Segment::Clauses(std::mem::take(&mut batch)));
            } else {
                batch.clear();
            }
            out.push(Segment::Directive(line.trim().to_string()));
        } else {
            batch.push_str(line);
            batch.push('\n');
        }
    }
    if !batch.trim().is_empty() {
        out.push(Segment::Clauses(batch));
    }
    out
}

// ----------------------------------------------------------------------
// Clause grammar
// ----------------------------------------------------------------------

/// Characters that terminate a bare symbol.
fn is_symbol_char(c: char) -> bool {
    !c.is_whitespace() && !"()<>;".contains(c)
}

/// Skip whitespace and `;` comments.
fn sc(input: &str) -> IResult<&str, ()> {
    let (mut rest, _) = multispace0(input)?;
    while rest.starts_with(';') {
        let end = rest.find('\n').map(|i| i + 1).unwrap_or(rest.len());
        rest = &rest[end..];
        let (r, _) = multispace0(rest)?;
        rest = r;
    }
    Ok((rest, ()))
}

fn symbol(input: &str) -> IResult<&str, &str> {
    take_while1(is_symbol_char)(input)
}

fn variable(input: &str) -> IResult<&str, AstTerm> {
    let (input, _) = char('<')(input)?;
    let (input, name) = symbol(input)?;
    let (input, _) = char('>')(input)?;
    Ok((input, AstTerm::Variable(name.to_string())))
}

fn constant_or_wildcard(input: &str) -> IResult<&str, AstTerm> {
    let (input, word) = symbol(input)?;
    let term = if word == "_" {
        AstTerm::Wildcard
    } else {
        AstTerm::Constant(word.to_string())
    };
    Ok((input, term))
}

fn term(input: &str) -> IResult<&str, AstTerm> {
    alt((variable, constant_or_wildcard))(input)
}

/// `(term term term)` without negation marker.
fn triple(input: &str) -> IResult<&str, (AstTerm, AstTerm, AstTerm)> {
    let (input, _) = char('(')(input)?;
    let (input, _) = sc(input)?;
    let (input, id) = term(input)?;
    let (input, _) = sc(input)?;
    let (input, attr) = term(input)?;
    let (input, _) = sc(input)?;
    let (input, val) = term(input)?;
    let (input, _) = sc(input)?;
    let (input, _) = char(')')(input)?;
    Ok((input, (id, attr, val)))
}

/// A possibly negated condition: `-(…)` or `(…)`.
fn condition(input: &str) -> IResult<&str, AstPattern> {
    let (input, minus) = opt(char('-'))(input)?;
    let (input, _) = sc(input)?;
    let (input, (id, attr, val)) = triple(input)?;
    Ok((
        input,
        AstPattern {
            id,
            attr,
            val,
            negative: minus.is_some(),
        },
    ))
}

fn rule_body(input: &str) -> IResult<&str, Clause> {
    let (input, _) = sc(input)?;
    let (input, name) = symbol(input)?;
    let (mut input, _) = sc(input)?;

    let mut lhs = Vec::new();
    loop {
        if input.starts_with("=>") {
            break;
        }
        let (rest, cond) = condition(input)?;
        lhs.push(cond);
        let (rest, _) = sc(rest)?;
        input = rest;
    }
    let (input, _) = tag("=>")(input)?;
    let (input, _) = sc(input)?;
    let (input, rhs) = opt(condition)(input)?;
    Ok((
        input,
        Clause::Rule {
            name: name.to_string(),
            lhs,
            rhs,
        },
    ))
}

fn query_body(input: &str) -> IResult<&str, Clause> {
    let (mut input, _) = sc(input)?;
    let mut conditions = Vec::new();
    while !input.starts_with(')') {
        let (rest, cond) = condition(input)?;
        conditions.push(cond);
        let (rest, _) = sc(rest)?;
        input = rest;
    }
    Ok((input, Clause::Query { conditions }))
}

/// The remaining two fields of a fact whose head term is already parsed.
fn assert_body(head: AstTerm, input: &str) -> IResult<&str, Clause> {
    let (input, _) = sc(input)?;
    let (input, attr) = term(input)?;
    let (input, _) = sc(input)?;
    let (input, val) = term(input)?;
    let fields = [&head, &attr, &val];
    if fields.iter().any(|t| !matches!(t, AstTerm::Constant(_))) {
        // Facts are ground; report through the outer error path.
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        )));
    }
    let constant = |t: &AstTerm| match t {
        AstTerm::Constant(s) => s.clone(),
        _ => unreachable!(),
    };
    Ok((
        input,
        Clause::Assert {
            id: constant(&head),
            attr: constant(&attr),
            val: constant(&val),
        },
    ))
}

fn clause(input: &str) -> IResult<&str, Clause> {
    let (input, _) = char('(')(input)?;
    let (input, _) = sc(input)?;
    let (input, head) = term(input)?;
    let (input, parsed) = match &head {
        AstTerm::Constant(word) if word == "rule" => rule_body(input)?,
        AstTerm::Constant(word) if word == "query" => query_body(input)?,
        _ => assert_body(head, input)?,
    };
    let (input, _) = sc(input)?;
    let (input, _) = char(')')(input)?;
    Ok((input, parsed))
}

/// Parse a batch of clause text into clauses. The first syntax error is
/// fatal.
pub fn parse_clauses(input: &str) -> Result<Vec<Clause>, ParseError> {
    let mut clauses = Vec::new();
    let mut rest = input;
    loop {
        let (r, _) = sc(rest).map_err(|_| ParseError::UnexpectedEof)?;
        rest = r;
        if rest.is_empty() {
            break;
        }
        match clause(rest) {
            Ok((r, c)) => {
                clauses.push(c);
                rest = r;
            }
            Err(_) => {
                return Err(ParseError::Syntax {
                    position: input.len() - rest.len(),
                    message: format!(
                        "expected a clause near `{}`",
                        rest.chars().take(24).collect::<String>()
                    ),
                });
            }
        }
    }
    Ok(clauses)
}

// ----------------------------------------------------------------------
// Directives
// ----------------------------------------------------------------------

fn directive_err(message: impl Into<String>) -> ParseError {
    ParseError::Directive {
        message: message.into(),
    }
}

/// Parse one directive line (with or without the leading `#`).
pub fn parse_directive(line: &str) -> Result<Directive, ParseError> {
    let body = line.trim().trim_start_matches('#').trim();
    let words: Vec<&str> = body.split_whitespace().collect();
    match words.as_slice() {
        ["stratum"] => Ok(Directive::Stratum),
        ["schemacheck", flag] => match *flag {
            "on" => Ok(Directive::SchemaCheck(true)),
            "off" => Ok(Directive::SchemaCheck(false)),
            other => Err(directive_err(format!(
                "schemacheck takes `on` or `off`, got `{}`",
                other
            ))),
        },
        ["schema", id, attr, val, rest @ ..] => {
            if *attr == "_" {
                return Err(directive_err("schema attribute must not be `_`"));
            }
            let description = if rest.is_empty() {
                None
            } else {
                Some(rest.join(" "))
            };
            Ok(Directive::Schema {
                id: SchemaTerm::parse(id),
                attr: attr.to_string(),
                val: SchemaTerm::parse(val),
                description,
            })
        }
        ["fuzzy", "system", name] => Ok(Directive::FuzzySystem(name.to_string())),
        ["fuzzy", "var", name, kind] => Ok(Directive::FuzzyVar {
            name: name.to_string(),
            kind: kind.to_string(),
        }),
        ["fuzzy", "kind", name, ..] => {
            let value_list = body
                .splitn(3, char::is_whitespace)
                .nth(2)
                .and_then(|s| s.split_once(char::is_whitespace))
                .map(|(_, rest)| rest)
                .unwrap_or("");
            let mut values = Vec::new();
            for part in value_list.split(',') {
                let fields: Vec<&str> = part.split_whitespace().collect();
                let [head, a, c] = fields.as_slice() else {
                    return Err(directive_err(format!(
                        "fuzzy value must be `NAME:sigmoid A C`, got `{}`",
                        part.trim()
                    )));
                };
                let (value_name, shape) = head
                    .split_once(':')
                    .ok_or_else(|| directive_err(format!("missing `:sigmoid` in `{}`", head)))?;
                if shape != "sigmoid" {
                    return Err(directive_err(format!(
                        "only sigmoid membership is supported, got `{}`",
                        shape
                    )));
                }
                let a: f64 = a
                    .parse()
                    .map_err(|_| directive_err(format!("invalid slope `{}`", a)))?;
                let c: f64 = c
                    .parse()
                    .map_err(|_| directive_err(format!("invalid center `{}`", c)))?;
                if !a.is_finite() || !c.is_finite() || a == 0.0 {
                    return Err(directive_err(format!(
                        "invalid sigmoid numerics a={} c={}",
                        a, c
                    )));
                }
                values.push((value_name.to_string(), a, c));
            }
            Ok(Directive::FuzzyKind {
                name: name.to_string(),
                values,
            })
        }
        [] => Err(directive_err("empty directive")),
        other => Err(directive_err(format!(
            "unrecognized directive `#{}`",
            other.join(" ")
        ))),
    }
}
