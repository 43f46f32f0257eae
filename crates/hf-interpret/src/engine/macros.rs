use super::*;
use crate::{interp_bail, interp_ensure};
use hf_lang::ast::{ExprKind, Lit, MacroArg, MacroCall, Path};
use tracing::{info, warn};

impl<'p> Evaluator<'p> {
    pub(super) fn eval_macro(&mut self, call: &MacroCall, span: Span) -> Eval<Value> {
        match call.name.as_str() {
            "format" => Ok(Value::string(self.format_args(&call.args, span)?)),
            "println" | "print" => {
                let text = self.format_args_or_empty(&call.args, span)?;
                info!(target: SCRIPT_LOG_TARGET, script = %self.program.origin, "{text}");
                Ok(Value::Unit)
            }
            "eprintln" | "eprint" => {
                let text = self.format_args_or_empty(&call.args, span)?;
                warn!(target: SCRIPT_LOG_TARGET, script = %self.program.origin, "{text}");
                Ok(Value::Unit)
            }
            "panic" => {
                let message = if call.args.is_empty() {
                    "explicit panic".to_string()
                } else {
                    self.format_args(&call.args, span)?
                };
                interp_bail!(span, "script panicked: {message}")
            }
            "unreachable" => {
                let mut message = "internal error: entered unreachable code".to_string();
                if !call.args.is_empty() {
                    message.push_str(": ");
                    message.push_str(&self.format_args(&call.args, span)?);
                }
                interp_bail!(span, "script panicked: {message}")
            }
            "assert" => {
                let Some((cond, rest)) = call.args.split_first() else {
                    interp_bail!(span, "`assert!` needs a condition");
                };
                if self.eval_cond(&cond.value)? {
                    return Ok(Value::Unit);
                }
                let message = if rest.is_empty() {
                    "assertion failed".to_string()
                } else {
                    self.format_args(rest, span)?
                };
                interp_bail!(span, "script panicked: {message}")
            }
            "assert_eq" | "assert_ne" => {
                let [left, right, rest @ ..] = call.args.as_slice() else {
                    interp_bail!(span, "`{}!` needs two operands", call.name);
                };
                let left = self.eval_expr(&left.value)?;
                let right = self.eval_expr(&right.value)?;
                let equal = call.name == "assert_eq";
                if (left == right) == equal {
                    return Ok(Value::Unit);
                }
                let op = if equal { "==" } else { "!=" };
                let detail = if rest.is_empty() {
                    String::new()
                } else {
                    format!(": {}", self.format_args(rest, span)?)
                };
                interp_bail!(
                    span,
                    "script panicked: assertion `left {op} right` failed{detail}\n  left: {left:?}\n right: {right:?}"
                )
            }
            other => interp_bail!(span, "macro `{other}!` cannot be evaluated"),
        }
    }

    fn format_args_or_empty(&mut self, args: &[MacroArg], span: Span) -> Eval<String> {
        if args.is_empty() {
            return Ok(String::new());
        }
        self.format_args(args, span)
    }

    /// Render a format string and its arguments the way `format!` does.
    pub(super) fn format_args(&mut self, args: &[MacroArg], span: Span) -> Eval<String> {
        let Some((template, rest)) = args.split_first() else {
            interp_bail!(span, "requires at least a format string argument");
        };
        let ExprKind::Lit(Lit::Str(template)) = &template.value.kind else {
            interp_bail!(template.value.span, "format argument must be a string literal");
        };

        let mut positional = Vec::new();
        let mut named = Vec::new();
        for arg in rest {
            let value = self.eval_expr(&arg.value)?;
            match &arg.name {
                Some(name) => named.push((name.clone(), value, false)),
                None => positional.push((value, false)),
            }
        }

        let mut out = String::with_capacity(template.len());
        let mut next = 0;
        let mut chars = template.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '{' => {
                    let mut placeholder = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) => placeholder.push(c),
                            None => interp_bail!(span, "invalid format string: expected `}}` but string was terminated"),
                        }
                    }
                    let (argument, spec) = placeholder.split_once(':').unwrap_or((placeholder.as_str(), ""));
                    let spec = FormatSpec::parse(spec).ok_or_else(|| {
                        crate::error::eval_error(format!("invalid format string: unsupported spec `{spec}`"), span)
                    })?;
                    let argument = argument.trim();
                    let value = if argument.is_empty() {
                        let idx = next;
                        next += 1;
                        take_positional(&mut positional, idx, span)?
                    } else if let Ok(idx) = argument.parse::<usize>() {
                        take_positional(&mut positional, idx, span)?
                    } else if let Some((_, value, used)) = named.iter_mut().find(|(name, _, _)| name == argument) {
                        *used = true;
                        value.clone()
                    } else {
                        // implicit capture of a variable in scope
                        self.eval_path(&Path {
                            segments: vec![argument.to_string()],
                            span,
                        })?
                    };
                    out.push_str(&spec.render(&value));
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
                }
                '}' => interp_bail!(span, "invalid format string: unmatched `}}` found"),
                c => out.push(c),
            }
        }

        let unused = positional.iter().filter(|(_, used)| !used).count()
            + named.iter().filter(|(_, _, used)| !used).count();
        interp_ensure!(
            unused == 0,
            span,
            "{unused} argument(s) never used in format string"
        );
        Ok(out)
    }
}

fn take_positional(positional: &mut [(Value, bool)], idx: usize, span: Span) -> Result<Value> {
    let count = positional.len();
    match positional.get_mut(idx) {
        Some((value, used)) => {
            *used = true;
            Ok(value.clone())
        }
        None => interp_bail!(
            span,
            "invalid reference to positional argument {idx} (there are {count} arguments)"
        ),
    }
}

/// `[[fill]align][0][width][.precision][?]`.
#[derive(Debug, Default, PartialEq)]
struct FormatSpec {
    fill: Option<char>,
    align: Option<char>,
    zero: bool,
    width: Option<usize>,
    precision: Option<usize>,
    debug: bool,
}

impl FormatSpec {
    fn parse(spec: &str) -> Option<FormatSpec> {
        let chars: Vec<char> = spec.chars().collect();
        let mut parsed = FormatSpec::default();
        let mut i = 0;
        let is_align = |c: char| matches!(c, '<' | '^' | '>');
        if chars.len() >= 2 && is_align(chars[1]) {
            parsed.fill = Some(chars[0]);
            parsed.align = Some(chars[1]);
            i = 2;
        } else if chars.first().copied().is_some_and(is_align) {
            parsed.align = chars.first().copied();
            i = 1;
        }
        // `#` only changes `{:#?}` layout, which renders like `{:?}` here
        if chars.get(i) == Some(&'#') {
            i += 1;
        }
        if chars.get(i) == Some(&'0') {
            parsed.zero = true;
            i += 1;
        }
        let digits = |i: &mut usize| {
            let start = *i;
            while chars.get(*i).is_some_and(char::is_ascii_digit) {
                *i += 1;
            }
            (start != *i).then(|| chars[start..*i].iter().collect::<String>().parse::<usize>().ok())
        };
        if let Some(width) = digits(&mut i) {
            parsed.width = Some(width?);
        }
        if chars.get(i) == Some(&'.') {
            i += 1;
            parsed.precision = Some(digits(&mut i)??);
        }
        if chars.get(i) == Some(&'?') {
            parsed.debug = true;
            i += 1;
        }
        (i == chars.len()).then_some(parsed)
    }

    fn render(&self, value: &Value) -> String {
        let body = match (self.precision, value) {
            (Some(precision), Value::Float(v)) if !self.debug => format!("{v:.precision$}"),
            (Some(precision), Value::Str(s)) if !self.debug => s.chars().take(precision).collect(),
            _ if self.debug => format!("{value:?}"),
            _ => value.to_string(),
        };
        let Some(width) = self.width else {
            return body;
        };
        let len = body.chars().count();
        if len >= width {
            return body;
        }
        let numeric = matches!(value, Value::Int(_) | Value::Float(_));
        let pad = width - len;
        if self.zero && numeric {
            let (sign, digits) = match body.strip_prefix('-') {
                Some(digits) => ("-", digits),
                None => ("", body.as_str()),
            };
            return format!("{sign}{}{digits}", "0".repeat(pad));
        }
        let fill = self.fill.unwrap_or(' ').to_string();
        let align = self.align.unwrap_or(if numeric { '>' } else { '<' });
        match align {
            '>' => format!("{}{body}", fill.repeat(pad)),
            '^' => format!("{}{body}{}", fill.repeat(pad / 2), fill.repeat(pad - pad / 2)),
            _ => format!("{body}{}", fill.repeat(pad)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn render(spec: &str, value: Value) -> String {
        FormatSpec::parse(spec).unwrap().render(&value)
    }

    #[test]
    fn specs_cover_width_fill_and_precision() {
        assert_eq!(render("", Value::from("plain")), "plain");
        assert_eq!(render("?", Value::from("q")), "\"q\"");
        assert_eq!(render(">6", Value::from("ab")), "    ab");
        assert_eq!(render("*^6", Value::from("ab")), "**ab**");
        assert_eq!(render("4", Value::Int(7)), "   7");
        assert_eq!(render("04", Value::Int(-7)), "-007");
        assert_eq!(render(".2", Value::Float(3.14159)), "3.14");
        assert_eq!(render("8.3", Value::Float(2.0)), "   2.000");
    }

    #[test]
    fn malformed_specs_are_rejected() {
        assert!(FormatSpec::parse("x").is_none());
        assert!(FormatSpec::parse(".").is_none());
        assert!(FormatSpec::parse("5?!").is_none());
    }
}
