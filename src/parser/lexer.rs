//! Lexer for groom templates
//!
//! Template source is split into raw text and `{{ ... }}` actions by a small
//! scanner. Action contents are tokenized with logos.

use logos::Logos;

use crate::error::ParseError;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

const LEFT_DELIM: &str = "{{";
const RIGHT_DELIM: &str = "}}";
const COMMENT_OPEN: &str = "/*";
const COMMENT_CLOSE: &str = "*/";

/// A variable reference with an optional field chain, e.g. `$user.name`
#[derive(Debug, Clone, PartialEq)]
pub struct VarRef {
    /// Variable name including the `$` sigil; `$` alone is the root data
    pub name: String,
    pub fields: Vec<String>,
}

/// Tokens found inside an action
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
pub enum Lexeme {
    // Control keywords
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("end")]
    End,
    #[token("range")]
    Range,
    #[token("with")]
    With,
    #[token("define")]
    Define,
    #[token("template")]
    Template,
    #[token("import")]
    Import,

    // Literal keywords
    #[token("true", |_| true)]
    #[token("false", |_| false)]
    Bool(bool),
    #[token("nil")]
    Nil,

    // Delimiters and operators
    #[token("}}")]
    RightDelim,
    #[token("-}}")]
    TrimRightDelim,
    #[token("{{")]
    LeftDelim,
    #[token("|")]
    Pipe,
    #[token("(")]
    ParenOpen,
    #[token(")")]
    ParenClose,
    #[token(",")]
    Comma,
    #[token(":=")]
    Declare,
    #[token("=")]
    Assign,
    #[token(".")]
    Dot,

    // Field chain such as `.user.name`
    #[regex(r"(\.[a-zA-Z_][a-zA-Z0-9_]*)+", |lex| {
        lex.slice()[1..].split('.').map(str::to_string).collect::<Vec<_>>()
    })]
    Field(Vec<String>),

    #[regex(r"\$[a-zA-Z0-9_]*(\.[a-zA-Z_][a-zA-Z0-9_]*)*", |lex| {
        let mut parts = lex.slice().split('.');
        let name = parts.next().unwrap_or("$").to_string();
        VarRef { name, fields: parts.map(str::to_string).collect() }
    })]
    Variable(VarRef),

    // Identifiers must come after keywords
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string(), priority = 1)]
    Ident(String),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    #[regex(r"`[^`]*`", |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].to_string()
    })]
    String(String),

    #[regex(r"-?[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r"-?[0-9]+\.[0-9]+([eE][-+]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"-?[0-9]+[eE][-+]?[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),
}

/// Tokens fed to the grammar
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Raw text between actions, with trim markers already applied
    Text(String),
    /// `{{` (or `{{- `)
    Open,
    /// `}}` (or ` -}}`)
    Close,
    /// A token inside an action
    Lex(Lexeme),
}

/// Strip quotes from a double-quoted string literal and process escapes
fn unescape(literal: &str) -> Option<String> {
    let inner = &literal[1..literal.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            '\'' => out.push('\''),
            _ => return None,
        }
    }
    Some(out)
}

/// A `{{-` marker needs whitespace after the dash, so `{{-3}}` stays a number
fn has_left_trim(rest: &str) -> bool {
    let mut chars = rest.chars();
    chars.next() == Some('-') && chars.next().is_some_and(char::is_whitespace)
}

/// Split template source into text and action tokens
pub fn tokenize(input: &str) -> Result<Vec<(Token, Span)>, ParseError> {
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut trim_next = false;

    while pos < input.len() {
        let open = input[pos..].find(LEFT_DELIM).map(|i| pos + i);
        let text_end = open.unwrap_or(input.len());

        let mut text_start = pos;
        let mut text = &input[pos..text_end];
        if trim_next {
            let trimmed = text.trim_start();
            text_start += text.len() - trimmed.len();
            text = trimmed;
        }

        let Some(open) = open else {
            if !text.is_empty() {
                tokens.push((Token::Text(text.to_string()), text_start..text_end));
            }
            break;
        };

        let mut action_start = open + LEFT_DELIM.len();
        if has_left_trim(&input[action_start..]) {
            text = text.trim_end();
            action_start += 1;
        }
        if !text.is_empty() {
            tokens.push((
                Token::Text(text.to_string()),
                text_start..text_start + text.len(),
            ));
        }

        let inner = input[action_start..].trim_start();
        if inner.starts_with(COMMENT_OPEN) {
            let (end, trim) = skip_comment(input, input.len() - inner.len(), open)?;
            pos = end;
            trim_next = trim;
            continue;
        }

        tokens.push((Token::Open, open..action_start));
        let (end, trim) = lex_action(input, action_start, open, &mut tokens)?;
        pos = end;
        trim_next = trim;
    }

    Ok(tokens)
}

/// Consume a `/* ... */` comment; returns the offset after the closing delimiter
fn skip_comment(input: &str, start: usize, open: usize) -> Result<(usize, bool), ParseError> {
    let close = input[start..]
        .find(COMMENT_CLOSE)
        .map(|i| start + i + COMMENT_CLOSE.len())
        .ok_or_else(|| ParseError::syntax(open..input.len(), "unclosed comment"))?;

    let rest = &input[close..];
    if rest.starts_with(RIGHT_DELIM) {
        return Ok((close + RIGHT_DELIM.len(), false));
    }
    if let Some(after) = rest.strip_prefix(" -").filter(|r| r.starts_with(RIGHT_DELIM)) {
        let consumed = rest.len() - after.len();
        return Ok((close + consumed + RIGHT_DELIM.len(), true));
    }
    Err(ParseError::syntax(
        open..close,
        "comment must end with */}} or */ -}}",
    ))
}

/// Lex the body of one action up to and including its closing delimiter
fn lex_action(
    input: &str,
    start: usize,
    open: usize,
    tokens: &mut Vec<(Token, Span)>,
) -> Result<(usize, bool), ParseError> {
    let mut lexer = Lexeme::lexer(&input[start..]);

    while let Some(result) = lexer.next() {
        let local = lexer.span();
        let span = start + local.start..start + local.end;
        match result {
            Ok(Lexeme::RightDelim) => {
                tokens.push((Token::Close, span.clone()));
                return Ok((span.end, false));
            }
            Ok(Lexeme::TrimRightDelim) => {
                tokens.push((Token::Close, span.clone()));
                return Ok((span.end, true));
            }
            Ok(Lexeme::LeftDelim) => {
                return Err(ParseError::syntax(span, "unexpected {{ inside action"));
            }
            Ok(lexeme) => tokens.push((Token::Lex(lexeme), span)),
            Err(()) => {
                let found = &input[span.clone()];
                return Err(ParseError::syntax(
                    span.clone(),
                    format!("unexpected {:?} in action", found),
                ));
            }
        }
    }

    Err(ParseError::syntax(open..input.len(), "unclosed action"))
}
