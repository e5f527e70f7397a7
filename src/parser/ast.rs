//! Syntax tree types for groom templates

pub use super::lexer::VarRef;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

/// Reserved keyword that marks a sub-template invocation as an import
pub const IMPORT_KEYWORD: &str = "import";

/// AST node with source location
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

/// One named template: the body of a file or of a `define` block
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    pub name: String,
    pub nodes: Vec<Spanned<Node>>,
}

impl Tree {
    pub fn new(name: impl Into<String>, nodes: Vec<Spanned<Node>>) -> Self {
        Self {
            name: name.into(),
            nodes,
        }
    }
}

/// Template body element
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Raw text copied to the output
    Text(String),
    /// `{{pipeline}}`
    Action(Pipeline),
    /// `{{if p}} ... {{else}} ... {{end}}`; `else if` chains nest in `else_body`
    If(Branch),
    /// `{{range p}} ... {{else}} ... {{end}}`
    Range(Branch),
    /// `{{with p}} ... {{else}} ... {{end}}`
    With(Branch),
    /// `{{template "name" p}}`, also produced by `{{import ...}}`
    Template(TemplateCall),
}

/// A control structure with a body and an optional alternative
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub pipeline: Pipeline,
    pub body: Vec<Spanned<Node>>,
    pub else_body: Option<Vec<Spanned<Node>>>,
}

/// Sub-template invocation
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateCall {
    /// Name of the invoked template. For an import directive this holds the
    /// raw `import ...` reference until the directive is resolved.
    pub target: Spanned<String>,
    pub pipeline: Option<Pipeline>,
    /// Set once an import directive has been rewritten to its resolved name
    pub resolved_import: bool,
}

impl TemplateCall {
    pub fn new(target: Spanned<String>, pipeline: Option<Pipeline>) -> Self {
        Self {
            target,
            pipeline,
            resolved_import: false,
        }
    }

    /// Whether this invocation is an import directive still awaiting resolution
    pub fn is_import(&self) -> bool {
        if self.resolved_import {
            return false;
        }
        match self.target.node.strip_prefix(IMPORT_KEYWORD) {
            Some(rest) => rest.is_empty() || rest.starts_with(char::is_whitespace),
            None => false,
        }
    }

    /// Replace the import reference with the symbolic name it resolved to
    pub fn resolve_import(&mut self, name: impl Into<String>) {
        self.target.node = name.into();
        self.resolved_import = true;
    }
}

/// `decl := cmd | cmd | ...`
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    /// Declared or assigned variables (at most two, for `range $i, $v :=`)
    pub decl: Vec<String>,
    /// `=` rather than `:=`
    pub is_assign: bool,
    pub commands: Vec<Command>,
    pub span: Span,
}

/// One stage of a pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub args: Vec<Spanned<Operand>>,
    pub span: Span,
}

/// A command argument
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// `.`
    Dot,
    /// `.a.b`
    Field(Vec<String>),
    /// `$x.a`
    Variable(VarRef),
    /// A function name
    Function(String),
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Nil,
    /// `( pipeline )`
    Pipeline(Box<Pipeline>),
}
