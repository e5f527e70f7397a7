//! Error types for template parsing

use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

use crate::parser::lexer::{Lexeme, Token};

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Parse error at {span:?}: {message}")]
    Syntax {
        span: Span,
        message: String,
        expected: Vec<String>,
    },
}

impl ParseError {
    /// Create a syntax error with no expectation list
    pub fn syntax(span: Span, message: impl Into<String>) -> Self {
        ParseError::Syntax {
            span,
            message: message.into(),
            expected: Vec::new(),
        }
    }

    /// Byte range the error points at
    pub fn span(&self) -> &Span {
        match self {
            ParseError::Syntax { span, .. } => span,
        }
    }

    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        let mut buf = Vec::new();
        match self {
            ParseError::Syntax {
                span,
                message,
                expected,
            } => {
                let expected_str = if expected.is_empty() {
                    String::new()
                } else {
                    format!("\nExpected: {}", expected.join(", "))
                };

                let written = Report::build(ReportKind::Error, filename, span.start)
                    .with_message(message)
                    .with_label(
                        Label::new((filename, span.clone()))
                            .with_message(format!("{}{}", message, expected_str))
                            .with_color(Color::Red),
                    )
                    .finish()
                    .write((filename, Source::from(source)), &mut buf);
                if written.is_err() {
                    return format!("{}: {}", filename, self);
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl<'a> From<chumsky::error::Rich<'a, Token>> for ParseError {
    fn from(err: chumsky::error::Rich<'a, Token>) -> Self {
        use chumsky::error::RichReason;

        let message = match err.reason() {
            RichReason::ExpectedFound { found, .. } => {
                let found_str = match found {
                    Some(tok) => format_token(tok),
                    None => "end of input".to_string(),
                };
                format!("Unexpected {}", found_str)
            }
            RichReason::Custom(msg) => msg.to_string(),
        };

        // Format expected tokens nicely
        let expected: Vec<String> = err
            .expected()
            .filter_map(|e| match e {
                chumsky::error::RichPattern::Token(tok) => Some(format_token(tok)),
                chumsky::error::RichPattern::Label(label) => Some(label.to_string()),
                chumsky::error::RichPattern::EndOfInput => Some("end of input".to_string()),
                chumsky::error::RichPattern::Identifier(s) => Some(format!("identifier '{}'", s)),
                chumsky::error::RichPattern::Any => Some("any token".to_string()),
                chumsky::error::RichPattern::SomethingElse => None,
            })
            .collect();

        ParseError::Syntax {
            span: err.span().into_range(),
            message,
            expected,
        }
    }
}

/// Format a token for human-readable error messages
fn format_token(tok: &Token) -> String {
    match tok {
        Token::Text(_) => "text".to_string(),
        Token::Open => "'{{'".to_string(),
        Token::Close => "'}}'".to_string(),
        Token::Lex(lexeme) => format_lexeme(lexeme),
    }
}

fn format_lexeme(lexeme: &Lexeme) -> String {
    match lexeme {
        Lexeme::Ident(s) => format!("identifier '{}'", s),
        Lexeme::String(s) => format!("string {:?}", s),
        Lexeme::Int(n) => format!("number {}", n),
        Lexeme::Float(n) => format!("number {}", n),
        Lexeme::Bool(b) => format!("'{}'", b),
        Lexeme::Field(fields) => format!("field '.{}'", fields.join(".")),
        Lexeme::Variable(v) => format!("variable '{}'", v.name),
        Lexeme::If => "keyword 'if'".to_string(),
        Lexeme::Else => "keyword 'else'".to_string(),
        Lexeme::End => "keyword 'end'".to_string(),
        Lexeme::Range => "keyword 'range'".to_string(),
        Lexeme::With => "keyword 'with'".to_string(),
        Lexeme::Define => "keyword 'define'".to_string(),
        Lexeme::Template => "keyword 'template'".to_string(),
        Lexeme::Import => "keyword 'import'".to_string(),
        Lexeme::Nil => "'nil'".to_string(),
        Lexeme::Pipe => "'|'".to_string(),
        Lexeme::ParenOpen => "'('".to_string(),
        Lexeme::ParenClose => "')'".to_string(),
        Lexeme::Comma => "','".to_string(),
        Lexeme::Declare => "':='".to_string(),
        Lexeme::Assign => "'='".to_string(),
        Lexeme::Dot => "'.'".to_string(),
        _ => format!("{:?}", lexeme),
    }
}
