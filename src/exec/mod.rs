//! Template evaluation
//!
//! An [`Executor`] walks a parsed tree against a data value, calling
//! functions from a [`FuncMap`] and streaming output to a writer. Printed
//! values pass through the active [`Flavor`].

mod error;
pub mod funcs;
pub mod value;

use std::io::Write;

use serde::Deserialize;
use serde_json::Value;

use crate::flavor::Flavor;
use crate::parser::ast::{Branch, Command, Node, Operand, Pipeline, Spanned, TemplateCall, VarRef};
use crate::template::TemplateSet;

pub use error::ExecError;
pub use funcs::{Func, FuncMap, HelperError};

/// What a field lookup on a missing key produces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingKey {
    /// Fail the execution
    #[default]
    Error,
    /// Evaluate to nil, which prints as nothing
    Empty,
}

/// Evaluation limits and policies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecOptions {
    /// Maximum nesting of sub-template invocations
    pub max_depth: usize,
    pub missing_key: MissingKey,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            max_depth: 100,
            missing_key: MissingKey::Error,
        }
    }
}

/// Walks template trees from one set
pub struct Executor<'a> {
    set: &'a TemplateSet,
    funcs: &'a FuncMap,
    flavor: &'a dyn Flavor,
    options: ExecOptions,
    vars: Vec<(String, Value)>,
    depth: usize,
}

impl<'a> Executor<'a> {
    pub fn new(
        set: &'a TemplateSet,
        funcs: &'a FuncMap,
        flavor: &'a dyn Flavor,
        options: ExecOptions,
    ) -> Self {
        Self {
            set,
            funcs,
            flavor,
            options,
            vars: Vec::new(),
            depth: 0,
        }
    }

    /// Execute the template `name` with `data` as both `.` and `$`
    pub fn execute(&mut self, name: &str, data: &Value, out: &mut dyn Write) -> Result<(), ExecError> {
        let set = self.set;
        let tree = set.get(name).ok_or_else(|| ExecError::UnknownTemplate {
            name: name.to_string(),
        })?;
        self.vars = vec![("$".to_string(), data.clone())];
        self.depth = 0;
        self.walk(&tree.nodes, data, out)
    }

    fn walk(&mut self, nodes: &[Spanned<Node>], dot: &Value, out: &mut dyn Write) -> Result<(), ExecError> {
        for node in nodes {
            match &node.node {
                Node::Text(text) => out.write_all(text.as_bytes())?,
                Node::Action(pipeline) => {
                    let value = self.eval_pipeline(pipeline, dot)?;
                    if pipeline.decl.is_empty() {
                        let printed = value::display(&value);
                        if ends_with_call(pipeline, self.flavor.escaper()) {
                            out.write_all(printed.as_bytes())?;
                        } else {
                            out.write_all(self.flavor.escape(&printed).as_bytes())?;
                        }
                    } else {
                        self.bind(pipeline, value)?;
                    }
                }
                Node::If(branch) => self.walk_if(branch, dot, out)?,
                Node::With(branch) => self.walk_with(branch, dot, out)?,
                Node::Range(branch) => self.walk_range(branch, dot, out)?,
                Node::Template(call) => self.walk_template(call, dot, out)?,
            }
        }
        Ok(())
    }

    /// Run `body` in a nested variable scope
    fn scoped(
        &mut self,
        body: &[Spanned<Node>],
        dot: &Value,
        out: &mut dyn Write,
    ) -> Result<(), ExecError> {
        let mark = self.vars.len();
        let result = self.walk(body, dot, out);
        self.vars.truncate(mark);
        result
    }

    fn walk_if(&mut self, branch: &Branch, dot: &Value, out: &mut dyn Write) -> Result<(), ExecError> {
        let mark = self.vars.len();
        let cond = self.eval_pipeline(&branch.pipeline, dot)?;
        self.declare_all(&branch.pipeline, &cond);
        let result = if value::truthy(&cond) {
            self.scoped(&branch.body, dot, out)
        } else if let Some(else_body) = &branch.else_body {
            self.scoped(else_body, dot, out)
        } else {
            Ok(())
        };
        self.vars.truncate(mark);
        result
    }

    fn walk_with(&mut self, branch: &Branch, dot: &Value, out: &mut dyn Write) -> Result<(), ExecError> {
        let mark = self.vars.len();
        let value = self.eval_pipeline(&branch.pipeline, dot)?;
        self.declare_all(&branch.pipeline, &value);
        let result = if value::truthy(&value) {
            self.scoped(&branch.body, &value, out)
        } else if let Some(else_body) = &branch.else_body {
            self.scoped(else_body, dot, out)
        } else {
            Ok(())
        };
        self.vars.truncate(mark);
        result
    }

    fn walk_range(&mut self, branch: &Branch, dot: &Value, out: &mut dyn Write) -> Result<(), ExecError> {
        let value = self.eval_pipeline(&branch.pipeline, dot)?;
        // Integer ranges are counted lazily; the count may be huge
        let items: Box<dyn Iterator<Item = (Value, Value)>> = match value {
            Value::Array(items) => Box::new(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| (Value::from(i), v)),
            ),
            Value::Object(map) => Box::new(map.into_iter().map(|(k, v)| (Value::String(k), v))),
            Value::Number(n) if n.as_u64().is_some() => {
                let count = n.as_u64().unwrap_or(0);
                Box::new((0..count).map(|i| (Value::from(i), Value::from(i))))
            }
            Value::Null => Box::new(std::iter::empty()),
            other => {
                return Err(ExecError::NotIterable {
                    kind: value::kind(&other),
                })
            }
        };

        let decl = &branch.pipeline.decl;
        let mut ran = false;
        for (key, item) in items {
            ran = true;
            let mark = self.vars.len();
            match decl.as_slice() {
                [] => {}
                [elem] => self.vars.push((elem.clone(), item.clone())),
                [index, elem, ..] => {
                    self.vars.push((index.clone(), key));
                    self.vars.push((elem.clone(), item.clone()));
                }
            }
            let result = self.walk(&branch.body, &item, out);
            self.vars.truncate(mark);
            result?;
        }

        if !ran {
            if let Some(else_body) = &branch.else_body {
                self.scoped(else_body, dot, out)?;
            }
        }
        Ok(())
    }

    fn walk_template(
        &mut self,
        call: &TemplateCall,
        dot: &Value,
        out: &mut dyn Write,
    ) -> Result<(), ExecError> {
        if call.is_import() {
            return Err(ExecError::UnresolvedImport {
                reference: call.target.node.clone(),
            });
        }
        let set = self.set;
        let name = &call.target.node;
        let tree = set
            .get(name)
            .ok_or_else(|| ExecError::UnknownTemplate { name: name.clone() })?;
        if self.depth >= self.options.max_depth {
            return Err(ExecError::DepthExceeded {
                limit: self.options.max_depth,
            });
        }

        let data = match &call.pipeline {
            Some(pipeline) => self.eval_pipeline(pipeline, dot)?,
            None => Value::Null,
        };

        let outer = std::mem::replace(&mut self.vars, vec![("$".to_string(), data.clone())]);
        self.depth += 1;
        let result = self.walk(&tree.nodes, &data, out);
        self.depth -= 1;
        self.vars = outer;
        result
    }

    /// Declare every variable of a control pipeline with the same value
    fn declare_all(&mut self, pipeline: &Pipeline, value: &Value) {
        for name in &pipeline.decl {
            self.vars.push((name.clone(), value.clone()));
        }
    }

    /// Handle `$x := p` and `$x = p`
    fn bind(&mut self, pipeline: &Pipeline, value: Value) -> Result<(), ExecError> {
        for name in &pipeline.decl {
            if pipeline.is_assign {
                let slot = self
                    .vars
                    .iter_mut()
                    .rev()
                    .find(|(n, _)| n == name)
                    .ok_or_else(|| ExecError::UndefinedVariable { name: name.clone() })?;
                slot.1 = value.clone();
            } else {
                self.vars.push((name.clone(), value.clone()));
            }
        }
        Ok(())
    }

    fn eval_pipeline(&mut self, pipeline: &Pipeline, dot: &Value) -> Result<Value, ExecError> {
        let mut value = None;
        for command in &pipeline.commands {
            value = Some(self.eval_command(command, dot, value)?);
        }
        Ok(value.unwrap_or(Value::Null))
    }

    fn eval_command(
        &mut self,
        command: &Command,
        dot: &Value,
        piped: Option<Value>,
    ) -> Result<Value, ExecError> {
        let Some((first, rest)) = command.args.split_first() else {
            return Err(ExecError::mismatch("empty command"));
        };

        if let Operand::Function(name) = &first.node {
            let mut args = rest
                .iter()
                .map(|arg| self.eval_operand(&arg.node, dot))
                .collect::<Result<Vec<_>, _>>()?;
            args.extend(piped);
            return self.call(name, &args);
        }

        if !rest.is_empty() || piped.is_some() {
            return Err(ExecError::mismatch(format!(
                "can't give argument to non-function {}",
                describe(&first.node)
            )));
        }
        self.eval_operand(&first.node, dot)
    }

    fn eval_operand(&mut self, operand: &Operand, dot: &Value) -> Result<Value, ExecError> {
        match operand {
            Operand::Dot => Ok(dot.clone()),
            Operand::Field(fields) => self.lookup(dot, fields),
            Operand::Variable(var) => self.variable(var),
            Operand::Function(name) => self.call(name, &[]),
            Operand::String(s) => Ok(Value::String(s.clone())),
            Operand::Int(n) => Ok(Value::from(*n)),
            Operand::Float(f) => Ok(Value::from(*f)),
            Operand::Bool(b) => Ok(Value::Bool(*b)),
            Operand::Nil => Ok(Value::Null),
            Operand::Pipeline(pipeline) => {
                let value = self.eval_pipeline(pipeline, dot)?;
                self.bind(pipeline, value.clone())?;
                Ok(value)
            }
        }
    }

    fn call(&self, name: &str, args: &[Value]) -> Result<Value, ExecError> {
        let func = self
            .funcs
            .get(name)
            .ok_or_else(|| ExecError::UnknownFunction {
                name: name.to_string(),
            })?;
        func(args).map_err(|e| ExecError::helper(name, e))
    }

    fn variable(&self, var: &VarRef) -> Result<Value, ExecError> {
        let (_, value) = self
            .vars
            .iter()
            .rev()
            .find(|(n, _)| *n == var.name)
            .ok_or_else(|| ExecError::UndefinedVariable {
                name: var.name.clone(),
            })?;
        self.lookup(value, &var.fields)
    }

    fn lookup(&self, base: &Value, fields: &[String]) -> Result<Value, ExecError> {
        let mut current = base;
        for field in fields {
            match current {
                Value::Object(map) => match map.get(field) {
                    Some(next) => current = next,
                    None => return self.missing(field),
                },
                Value::Null => return self.missing(field),
                other => {
                    return Err(ExecError::mismatch(format!(
                        "can't evaluate field {} in type {}",
                        field,
                        value::kind(other)
                    )))
                }
            }
        }
        Ok(current.clone())
    }

    fn missing(&self, field: &str) -> Result<Value, ExecError> {
        match self.options.missing_key {
            MissingKey::Error => Err(ExecError::UndefinedField {
                field: field.to_string(),
            }),
            MissingKey::Empty => Ok(Value::Null),
        }
    }
}

/// Whether the last command of `pipeline` calls the function `name`
fn ends_with_call(pipeline: &Pipeline, name: Option<&str>) -> bool {
    let last = pipeline.commands.last().and_then(|c| c.args.first());
    match (last, name) {
        (Some(arg), Some(name)) => matches!(&arg.node, Operand::Function(f) if f == name),
        _ => false,
    }
}

fn describe(operand: &Operand) -> String {
    match operand {
        Operand::Dot => ".".to_string(),
        Operand::Field(fields) => format!(".{}", fields.join(".")),
        Operand::Variable(var) => var.name.clone(),
        Operand::String(s) => format!("{s:?}"),
        Operand::Int(n) => n.to_string(),
        Operand::Float(f) => f.to_string(),
        Operand::Bool(b) => b.to_string(),
        Operand::Nil => "nil".to_string(),
        Operand::Function(name) => name.clone(),
        Operand::Pipeline(_) => "(pipeline)".to_string(),
    }
}
