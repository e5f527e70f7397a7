//! Function registry and the built-in template functions

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use super::value::{compare, display, equal, escape_html, kind, truthy};

/// Error returned by a helper function
#[derive(Debug, Error)]
pub enum HelperError {
    #[error("wrong number of arguments: expected {expected}, got {found}")]
    Arity { expected: String, found: usize },

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl HelperError {
    pub fn invalid(message: impl Into<String>) -> Self {
        HelperError::Invalid(message.into())
    }
}

/// A callable template function
pub type Func = Arc<dyn Fn(&[Value]) -> Result<Value, HelperError> + Send + Sync>;

/// Named functions available to templates
#[derive(Clone, Default)]
pub struct FuncMap {
    funcs: HashMap<String, Func>,
}

impl fmt::Debug for FuncMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.funcs.keys().collect();
        names.sort();
        f.debug_struct("FuncMap").field("funcs", &names).finish()
    }
}

impl FuncMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `func` under `name`, replacing any previous binding
    pub fn insert<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&[Value]) -> Result<Value, HelperError> + Send + Sync + 'static,
    {
        self.funcs.insert(name.into(), Arc::new(func));
    }

    /// Builder form of [`FuncMap::insert`]
    pub fn with<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, HelperError> + Send + Sync + 'static,
    {
        self.insert(name, func);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Func> {
        self.funcs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.funcs.contains_key(name)
    }

    /// Add every function of `other`, overriding existing names
    pub fn extend(&mut self, other: FuncMap) {
        self.funcs.extend(other.funcs);
    }

    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }

    /// The functions every template can call
    pub fn builtins() -> Self {
        FuncMap::new()
            .with("and", |args| {
                require_at_least(args, 1)?;
                Ok(args
                    .iter()
                    .find(|v| !truthy(v))
                    .unwrap_or(&args[args.len() - 1])
                    .clone())
            })
            .with("or", |args| {
                require_at_least(args, 1)?;
                Ok(args
                    .iter()
                    .find(|v| truthy(v))
                    .unwrap_or(&args[args.len() - 1])
                    .clone())
            })
            .with("not", |args| {
                require(args, 1)?;
                Ok(Value::Bool(!truthy(&args[0])))
            })
            .with("len", |args| {
                require(args, 1)?;
                let len = match &args[0] {
                    Value::String(s) => s.len(),
                    Value::Array(items) => items.len(),
                    Value::Object(map) => map.len(),
                    other => {
                        return Err(HelperError::invalid(format!(
                            "len of {}",
                            kind(other)
                        )))
                    }
                };
                Ok(Value::from(len))
            })
            .with("index", |args| {
                require_at_least(args, 1)?;
                args[1..].iter().try_fold(args[0].clone(), index_one)
            })
            .with("print", |args| Ok(Value::String(sprint(args))))
            .with("println", |args| {
                let mut out = args.iter().map(display).collect::<Vec<_>>().join(" ");
                out.push('\n');
                Ok(Value::String(out))
            })
            .with("printf", |args| {
                require_at_least(args, 1)?;
                let Value::String(format) = &args[0] else {
                    return Err(HelperError::invalid("printf format must be a string"));
                };
                Ok(Value::String(sprintf(format, &args[1..])))
            })
            .with("html", |args| Ok(Value::String(escape_html(&sprint(args)))))
            .with("eq", |args| {
                require_at_least(args, 2)?;
                Ok(Value::Bool(args[1..].iter().any(|v| equal(&args[0], v))))
            })
            .with("ne", |args| {
                require(args, 2)?;
                Ok(Value::Bool(!equal(&args[0], &args[1])))
            })
            .with("lt", |args| ordered(args, |o| o.is_lt()))
            .with("le", |args| ordered(args, |o| o.is_le()))
            .with("gt", |args| ordered(args, |o| o.is_gt()))
            .with("ge", |args| ordered(args, |o| o.is_ge()))
    }
}

/// Fail unless exactly `n` arguments were passed
pub fn require(args: &[Value], n: usize) -> Result<(), HelperError> {
    if args.len() != n {
        return Err(HelperError::Arity {
            expected: n.to_string(),
            found: args.len(),
        });
    }
    Ok(())
}

/// Fail unless at least `n` arguments were passed
pub fn require_at_least(args: &[Value], n: usize) -> Result<(), HelperError> {
    if args.len() < n {
        return Err(HelperError::Arity {
            expected: format!("at least {n}"),
            found: args.len(),
        });
    }
    Ok(())
}

fn ordered(args: &[Value], test: fn(std::cmp::Ordering) -> bool) -> Result<Value, HelperError> {
    require(args, 2)?;
    let ordering = compare(&args[0], &args[1]).ok_or_else(|| {
        HelperError::invalid(format!(
            "incompatible types for comparison: {} and {}",
            kind(&args[0]),
            kind(&args[1])
        ))
    })?;
    Ok(Value::Bool(test(ordering)))
}

fn index_one(container: Value, key: &Value) -> Result<Value, HelperError> {
    match (&container, key) {
        (Value::Array(items), Value::Number(n)) => {
            let i = n
                .as_u64()
                .ok_or_else(|| HelperError::invalid(format!("invalid index {n}")))?;
            items
                .get(i as usize)
                .cloned()
                .ok_or_else(|| HelperError::invalid(format!("index {i} out of range")))
        }
        (Value::Object(map), Value::String(k)) => Ok(map.get(k).cloned().unwrap_or(Value::Null)),
        (Value::Null, _) => Err(HelperError::invalid("index of nil")),
        (c, k) => Err(HelperError::invalid(format!(
            "cannot index {} with {}",
            kind(c),
            kind(k)
        ))),
    }
}

/// Concatenate printed values, separating operands when neither is a string
pub fn sprint(args: &[Value]) -> String {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 && !args[i - 1].is_string() && !arg.is_string() {
            out.push(' ');
        }
        out.push_str(&display(arg));
    }
    out
}

/// Minimal printf supporting `%v %s %d %f %t %q %x %%` with an optional precision
pub fn sprintf(format: &str, args: &[Value]) -> String {
    let mut out = String::with_capacity(format.len());
    let mut args = args.iter();
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let mut precision = None;
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut digits = String::new();
            while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                digits.push(*d);
                chars.next();
            }
            precision = digits.parse::<usize>().ok();
        }

        let Some(verb) = chars.next() else {
            out.push_str("%!(NOVERB)");
            break;
        };
        if verb == '%' {
            out.push('%');
            continue;
        }
        let Some(arg) = args.next() else {
            out.push_str(&format!("%!{verb}(MISSING)"));
            continue;
        };

        match verb {
            'v' | 's' => out.push_str(&display(arg)),
            'd' => match arg.as_i64() {
                Some(n) => out.push_str(&n.to_string()),
                None => out.push_str(&format!("%!d({})", display(arg))),
            },
            'f' => match arg.as_f64() {
                Some(f) => out.push_str(&format!("{:.*}", precision.unwrap_or(6), f)),
                None => out.push_str(&format!("%!f({})", display(arg))),
            },
            't' => out.push_str(&truthy(arg).to_string()),
            'q' => out.push_str(&format!("{:?}", display(arg))),
            'x' => match arg.as_i64() {
                Some(n) => out.push_str(&format!("{n:x}")),
                None => display(arg)
                    .bytes()
                    .for_each(|b| out.push_str(&format!("{b:02x}"))),
            },
            other => out.push_str(&format!("%!{other}({})", display(arg))),
        }
    }

    let extra: Vec<_> = args.map(display).collect();
    if !extra.is_empty() {
        out.push_str(&format!("%!(EXTRA {})", extra.join(", ")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, args: &[Value]) -> Result<Value, HelperError> {
        let funcs = FuncMap::builtins();
        let func = funcs.get(name).expect("builtin should exist");
        func(args)
    }

    #[test]
    fn test_and_or_return_operands() {
        assert_eq!(call("and", &[json!(1), json!(""), json!(2)]).unwrap(), json!(""));
        assert_eq!(call("and", &[json!(1), json!(2)]).unwrap(), json!(2));
        assert_eq!(call("or", &[json!(0), json!("x")]).unwrap(), json!("x"));
        assert_eq!(call("or", &[json!(0), json!(null)]).unwrap(), json!(null));
    }

    #[test]
    fn test_len_and_index() {
        assert_eq!(call("len", &[json!([1, 2, 3])]).unwrap(), json!(3));
        assert_eq!(call("len", &[json!("abc")]).unwrap(), json!(3));
        assert!(call("len", &[json!(3)]).is_err());
        let data = json!({"a": [10, {"b": "deep"}]});
        assert_eq!(
            call("index", &[data.clone(), json!("a"), json!(1), json!("b")]).unwrap(),
            json!("deep")
        );
        assert!(call("index", &[data, json!("a"), json!(5)]).is_err());
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(call("eq", &[json!(2), json!(1), json!(2)]).unwrap(), json!(true));
        assert_eq!(call("ne", &[json!("a"), json!("a")]).unwrap(), json!(false));
        assert_eq!(call("lt", &[json!(1), json!(2.5)]).unwrap(), json!(true));
        assert_eq!(call("ge", &[json!("b"), json!("a")]).unwrap(), json!(true));
        assert!(call("lt", &[json!(1), json!("a")]).is_err());
    }

    #[test]
    fn test_arity_errors() {
        assert!(matches!(
            call("not", &[]),
            Err(HelperError::Arity { found: 0, .. })
        ));
    }

    #[test]
    fn test_print_family() {
        assert_eq!(sprint(&[json!("a"), json!("b")]), "ab");
        assert_eq!(sprint(&[json!(1), json!(2)]), "1 2");
        assert_eq!(call("println", &[json!("a"), json!(1)]).unwrap(), json!("a 1\n"));
        assert_eq!(call("html", &[json!("<b>")]).unwrap(), json!("&lt;b&gt;"));
    }

    #[test]
    fn test_sprintf() {
        assert_eq!(sprintf("%s has %d items", &[json!("cart"), json!(3)]), "cart has 3 items");
        assert_eq!(sprintf("%.2f%%", &[json!(12.3456)]), "12.35%");
        assert_eq!(sprintf("%q", &[json!("hi")]), "\"hi\"");
        assert_eq!(sprintf("%x", &[json!(255)]), "ff");
        assert_eq!(sprintf("%d", &[]), "%!d(MISSING)");
        assert_eq!(sprintf("x", &[json!(1)]), "x%!(EXTRA 1)");
    }

    #[test]
    fn test_overrides() {
        let mut funcs = FuncMap::builtins();
        funcs.extend(FuncMap::new().with("len", |_| Ok(json!(42))));
        let len = funcs.get("len").unwrap();
        assert_eq!(len(&[json!([])]).unwrap(), json!(42));
    }
}
