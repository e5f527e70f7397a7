//! Parser implementation using chumsky

use std::collections::HashSet;

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use crate::error::ParseError;
use crate::parser::ast::*;
use crate::parser::lexer::{self, Lexeme, Token};

/// Deepest allowed nesting of blocks, `else if` arms and parentheses.
///
/// Parsing and evaluation both recurse once per level, so deeper input is
/// rejected as a syntax error before it can exhaust the thread stack.
pub const MAX_NESTING: usize = 100;

/// Top-level element of a template file
#[derive(Debug, Clone)]
enum Item {
    Define(Spanned<String>, Vec<Spanned<Node>>),
    Node(Spanned<Node>),
}

/// Parse template source into its named trees.
///
/// The first tree is the file body, named `name`; it is followed by one tree
/// per `{{define}}` block, in source order.
pub fn parse(name: &str, input: &str) -> Result<Vec<Tree>, Vec<ParseError>> {
    let len = input.len();
    let tokens = lexer::tokenize(input).map_err(|e| vec![e])?;
    check_nesting(&tokens).map_err(|e| vec![e])?;

    let token_iter = tokens.into_iter().map(|(tok, span)| (tok, span.into()));

    // Turn the token iterator into a stream that chumsky can use
    let token_stream = Stream::from_iter(token_iter)
        // Split (Token, SimpleSpan) into token and span parts
        .map((len..len).into(), |(t, s): (_, _)| (t, s));

    let items = document_parser()
        .parse(token_stream)
        .into_result()
        .map_err(|errs| errs.into_iter().map(ParseError::from).collect::<Vec<_>>())?;

    assemble(name, items)
}

/// Reject token streams nested deeper than [`MAX_NESTING`].
///
/// Each open block contributes one level plus one per `else if` arm, since
/// those arms nest in the tree. Unbalanced `end`s are left to the grammar.
fn check_nesting(tokens: &[(Token, Span)]) -> Result<(), ParseError> {
    let mut blocks: Vec<usize> = Vec::new();
    let mut depth: usize = 0;
    let mut parens: usize = 0;

    for (i, (token, span)) in tokens.iter().enumerate() {
        let after_open = i > 0 && tokens[i - 1].0 == Token::Open;
        match token {
            Token::Open => parens = 0,
            Token::Lex(Lexeme::If | Lexeme::Range | Lexeme::With | Lexeme::Define)
                if after_open =>
            {
                blocks.push(1);
                depth += 1;
            }
            Token::Lex(Lexeme::If) if i > 1 && tokens[i - 1].0 == Token::Lex(Lexeme::Else) => {
                if let Some(levels) = blocks.last_mut() {
                    *levels += 1;
                    depth += 1;
                }
            }
            Token::Lex(Lexeme::End) if after_open => {
                depth -= blocks.pop().unwrap_or(0);
            }
            Token::Lex(Lexeme::ParenOpen) => parens += 1,
            Token::Lex(Lexeme::ParenClose) => parens = parens.saturating_sub(1),
            _ => {}
        }

        if depth + parens > MAX_NESTING {
            return Err(ParseError::syntax(
                span.clone(),
                format!("nesting exceeds {MAX_NESTING} levels"),
            ));
        }
    }
    Ok(())
}

/// Split top-level items into the file tree and its `define` trees
fn assemble(name: &str, items: Vec<Item>) -> Result<Vec<Tree>, Vec<ParseError>> {
    let mut root = Tree::new(name, Vec::new());
    let mut defined = Vec::new();
    let mut seen = HashSet::from([name.to_string()]);
    let mut errors = Vec::new();

    for item in items {
        match item {
            Item::Node(node) => root.nodes.push(node),
            Item::Define(def_name, body) => {
                if !seen.insert(def_name.node.clone()) {
                    errors.push(ParseError::syntax(
                        def_name.span,
                        format!("template {:?} is defined more than once", def_name.node),
                    ));
                    continue;
                }
                defined.push(Tree::new(def_name.node, body));
            }
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let mut trees = vec![root];
    trees.extend(defined);
    Ok(trees)
}

/// Helper to extract span range from chumsky's MapExtra
fn span_range(e: &impl chumsky::span::Span<Offset = usize>) -> std::ops::Range<usize> {
    e.start()..e.end()
}

fn document_parser<'a, I>() -> impl Parser<'a, I, Vec<Item>, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    let open = just(Token::Open);
    let close = just(Token::Close);

    let string_literal = select! {
        Token::Lex(Lexeme::String(s)) => s,
    }
    .map_with(|s, e| Spanned::new(s, span_range(&e.span())));

    // Variable names in `$x :=` / `$i, $x :=` declarations
    let decl_var = select! {
        Token::Lex(Lexeme::Variable(v)) => v,
    }
    .try_map(|v: VarRef, span| {
        if v.fields.is_empty() && v.name != "$" {
            Ok(v.name)
        } else {
            Err(Rich::custom(span, "expected a variable name before := or ="))
        }
    });

    let decl = decl_var
        .separated_by(just(Token::Lex(Lexeme::Comma)))
        .at_least(1)
        .at_most(2)
        .collect::<Vec<_>>()
        .then(choice((
            just(Token::Lex(Lexeme::Declare)).to(false),
            just(Token::Lex(Lexeme::Assign)).to(true),
        )));

    // ==================== Pipelines ====================

    let pipeline = recursive(|pipeline| {
        let literal = select! {
            Token::Lex(Lexeme::Dot) => Operand::Dot,
            Token::Lex(Lexeme::Field(f)) => Operand::Field(f),
            Token::Lex(Lexeme::Variable(v)) => Operand::Variable(v),
            Token::Lex(Lexeme::Ident(name)) => Operand::Function(name),
            Token::Lex(Lexeme::String(s)) => Operand::String(s),
            Token::Lex(Lexeme::Int(n)) => Operand::Int(n),
            Token::Lex(Lexeme::Float(n)) => Operand::Float(n),
            Token::Lex(Lexeme::Bool(b)) => Operand::Bool(b),
            Token::Lex(Lexeme::Nil) => Operand::Nil,
        };

        let nested = pipeline
            .delimited_by(
                just(Token::Lex(Lexeme::ParenOpen)),
                just(Token::Lex(Lexeme::ParenClose)),
            )
            .map(|p: Pipeline| Operand::Pipeline(Box::new(p)));

        let operand = choice((literal, nested))
            .map_with(|op, e| Spanned::new(op, span_range(&e.span())));

        let command = operand
            .repeated()
            .at_least(1)
            .collect::<Vec<_>>()
            .map_with(|args, e| Command {
                args,
                span: span_range(&e.span()),
            });

        decl.clone()
            .or_not()
            .then(
                command
                    .separated_by(just(Token::Lex(Lexeme::Pipe)))
                    .at_least(1)
                    .collect::<Vec<_>>(),
            )
            .map_with(|(decl, commands), e| {
                let (decl, is_assign) = decl.unwrap_or_default();
                Pipeline {
                    decl,
                    is_assign,
                    commands,
                    span: span_range(&e.span()),
                }
            })
    });

    let end_tag = open
        .clone()
        .then(just(Token::Lex(Lexeme::End)))
        .then(close.clone());

    // ==================== Template body ====================

    let node = recursive(|node| {
        let list = node.clone().repeated().collect::<Vec<_>>();

        let text = select! {
            Token::Text(s) => Node::Text(s),
        };

        // `{{else}} list` (optional) followed by `{{end}}`
        let else_end = open
            .clone()
            .then(just(Token::Lex(Lexeme::Else)))
            .then(close.clone())
            .ignore_then(list.clone())
            .or_not()
            .then_ignore(end_tag.clone());

        // Everything after the body of an `if`: `{{else if}}` chains nest
        let if_tail = recursive(|if_tail| {
            let else_if = open
                .clone()
                .then(just(Token::Lex(Lexeme::Else)))
                .then(just(Token::Lex(Lexeme::If)))
                .ignore_then(pipeline.clone())
                .then_ignore(close.clone())
                .then(list.clone())
                .then(if_tail)
                .map_with(
                    |((pipeline, body), else_body): (
                        (Pipeline, Vec<Spanned<Node>>),
                        Option<Vec<Spanned<Node>>>,
                    ),
                     e| {
                        let branch = Branch {
                            pipeline,
                            body,
                            else_body,
                        };
                        Some(vec![Spanned::new(Node::If(branch), span_range(&e.span()))])
                    },
                );

            choice((else_if, else_end.clone()))
        });

        let block_head = |keyword: Lexeme| {
            open.clone()
                .then(just(Token::Lex(keyword)))
                .ignore_then(pipeline.clone())
                .then_ignore(close.clone())
        };

        let if_block = block_head(Lexeme::If)
            .then(list.clone())
            .then(if_tail)
            .map(|((pipeline, body), else_body)| {
                Node::If(Branch {
                    pipeline,
                    body,
                    else_body,
                })
            });

        let range_block = block_head(Lexeme::Range)
            .then(list.clone())
            .then(else_end.clone())
            .map(|((pipeline, body), else_body)| {
                Node::Range(Branch {
                    pipeline,
                    body,
                    else_body,
                })
            });

        let with_block = block_head(Lexeme::With)
            .then(list.clone())
            .then(else_end)
            .map(|((pipeline, body), else_body)| {
                Node::With(Branch {
                    pipeline,
                    body,
                    else_body,
                })
            });

        // {{template "name" pipeline?}}
        let template_call = open
            .clone()
            .ignore_then(just(Token::Lex(Lexeme::Template)))
            .ignore_then(string_literal.clone())
            .then(pipeline.clone().or_not())
            .then_ignore(close.clone())
            .map(|(target, pipeline)| Node::Template(TemplateCall::new(target, pipeline)));

        // {{import alias? "file" pipeline?}} is spelled out as the equivalent
        // `template "import alias \"file\""` invocation
        let import_directive = open
            .clone()
            .ignore_then(just(Token::Lex(Lexeme::Import)))
            .ignore_then(select! { Token::Lex(Lexeme::Ident(alias)) => alias }.or_not())
            .then(string_literal.clone())
            .then(pipeline.clone().or_not())
            .then_ignore(close.clone())
            .map_with(|((alias, file), pipeline), e| {
                let reference = match alias {
                    Some(alias) => format!("{IMPORT_KEYWORD} {alias} \"{}\"", file.node),
                    None => format!("{IMPORT_KEYWORD} \"{}\"", file.node),
                };
                let target = Spanned::new(reference, span_range(&e.span()));
                Node::Template(TemplateCall::new(target, pipeline))
            });

        let action = open
            .clone()
            .ignore_then(pipeline.clone())
            .then_ignore(close.clone())
            .map(Node::Action);

        // Order matters: keyword-led actions before the generic pipeline action
        choice((
            text,
            if_block,
            range_block,
            with_block,
            template_call,
            import_directive,
            action,
        ))
        .map_with(|n, e| Spanned::new(n, span_range(&e.span())))
        .boxed()
    });

    // {{define "name"}} ... {{end}}, only at the top level
    let define_block = open
        .clone()
        .ignore_then(just(Token::Lex(Lexeme::Define)))
        .ignore_then(string_literal)
        .then_ignore(close)
        .then(node.clone().repeated().collect::<Vec<_>>())
        .then_ignore(end_tag)
        .map(|(name, body)| Item::Define(name, body));

    choice((define_block, node.map(Item::Node)))
        .repeated()
        .collect()
        .then_ignore(end())
}
