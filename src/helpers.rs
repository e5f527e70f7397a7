//! The standard helper set handed to the composer by the command line tool

use std::io::Read;
use std::process::Command;

use pulldown_cmark::{html, Options, Parser};
use serde_json::Value;

use crate::exec::funcs::{require, require_at_least};
use crate::exec::value::kind;
use crate::exec::{FuncMap, HelperError};

/// `cat`, `exec`, `json`, `stdin`, `str` and `markdown`
pub fn standard() -> FuncMap {
    FuncMap::new()
        .with("cat", cat)
        .with("exec", exec)
        .with("json", json)
        .with("stdin", stdin)
        .with("str", string)
        .with("markdown", markdown)
}

fn as_str<'v>(func: &str, value: &'v Value) -> Result<&'v str, HelperError> {
    value.as_str().ok_or_else(|| {
        HelperError::invalid(format!("{func} expects a string, got {}", kind(value)))
    })
}

/// Concatenate the contents of the named files
fn cat(args: &[Value]) -> Result<Value, HelperError> {
    let mut out = String::new();
    for arg in args {
        out.push_str(&std::fs::read_to_string(as_str("cat", arg)?)?);
    }
    Ok(Value::String(out))
}

/// Run a program and return what it wrote to stdout
fn exec(args: &[Value]) -> Result<Value, HelperError> {
    require_at_least(args, 1)?;
    let program = as_str("exec", &args[0])?;
    let rest = args[1..]
        .iter()
        .map(|a| as_str("exec", a))
        .collect::<Result<Vec<_>, _>>()?;

    let output = Command::new(program).args(rest).output()?;
    if !output.status.success() {
        return Err(HelperError::invalid(format!(
            "{program} failed with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(Value::String(String::from_utf8_lossy(&output.stdout).into_owned()))
}

/// Decode a JSON string, or encode any other value as JSON
fn json(args: &[Value]) -> Result<Value, HelperError> {
    require(args, 1)?;
    match &args[0] {
        Value::String(s) => Ok(serde_json::from_str(s)?),
        other => Ok(Value::String(serde_json::to_string(other)?)),
    }
}

fn stdin(args: &[Value]) -> Result<Value, HelperError> {
    require(args, 0)?;
    let mut text = String::new();
    std::io::stdin().read_to_string(&mut text)?;
    Ok(Value::String(text))
}

fn string(args: &[Value]) -> Result<Value, HelperError> {
    require(args, 1)?;
    Ok(Value::String(as_str("str", &args[0])?.to_string()))
}

/// Render CommonMark to HTML
fn markdown(args: &[Value]) -> Result<Value, HelperError> {
    require(args, 1)?;
    let source = as_str("markdown", &args[0])?;
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(source, options);
    let mut out = String::new();
    html::push_html(&mut out, parser);
    Ok(Value::String(out))
}
