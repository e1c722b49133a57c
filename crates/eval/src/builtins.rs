//! Built-in native functions installed into the global environment
//! (SPEC_FULL.md §16). Each one is a plain `fn(&[Value]) -> Result<Value,
//! String>` — the call site in `evaluator::Interpreter::call_value` wraps a
//! `String` error with the call's source position before it becomes a
//! `BriskError`, so builtins themselves stay free of position bookkeeping.

use brisk_core::{Environment, NativeObj, Value};
use std::cell::RefCell;
use std::rc::Rc;

macro_rules! native {
    ($env:expr, $name:literal, $arity:expr, $func:expr) => {
        $env.borrow_mut()
            .define(
                $name,
                Value::native(NativeObj {
                    name: $name,
                    arity: $arity,
                    func: $func,
                }),
                false,
            )
            .expect("global scope is fresh; no builtin name collides with another");
    };
}

pub fn install(global: &Rc<RefCell<Environment>>) {
    native!(global, "print", -1, print_fn);
    native!(global, "println", -1, println_fn);
    native!(global, "len", 1, len_fn);
    native!(global, "has", 2, has_fn);
    native!(global, "push", 2, push_fn);
    native!(global, "pop", 1, pop_fn);
    native!(global, "keys", 1, keys_fn);
    native!(global, "type_of", 1, type_of_fn);
    native!(global, "str", 1, str_fn);
    native!(global, "int", 1, int_fn);
    native!(global, "float", 1, float_fn);
    native!(global, "abs", 1, abs_fn);
    native!(global, "floor", 1, floor_fn);
    native!(global, "ceil", 1, ceil_fn);
    native!(global, "round", 1, round_fn);
    native!(global, "sqrt", 1, sqrt_fn);
    native!(global, "pow", 2, pow_fn);
    native!(global, "min", 2, min_fn);
    native!(global, "max", 2, max_fn);
    native!(global, "exit", 1, exit_fn);
    native!(global, "assert", -1, assert_fn);
}

fn print_fn(args: &[Value]) -> Result<Value, String> {
    let joined: Vec<String> = args.iter().map(Value::to_display_string).collect();
    print!("{}", joined.join(" "));
    Ok(Value::Nil)
}

fn println_fn(args: &[Value]) -> Result<Value, String> {
    let joined: Vec<String> = args.iter().map(Value::to_display_string).collect();
    println!("{}", joined.join(" "));
    Ok(Value::Nil)
}

fn len_fn(args: &[Value]) -> Result<Value, String> {
    let v = &args[0];
    if let Some(s) = v.as_str() {
        return Ok(Value::Int(s.len() as i64));
    }
    if let Some(a) = v.as_array() {
        return Ok(Value::Int(a.borrow().len() as i64));
    }
    if let Some(t) = v.as_table() {
        return Ok(Value::Int(t.borrow().len() as i64));
    }
    Err(format!("len: unsupported type '{}'", v.kind_name()))
}

fn has_fn(args: &[Value]) -> Result<Value, String> {
    let table = args[0]
        .as_table()
        .ok_or_else(|| format!("has: expected a table, got '{}'", args[0].kind_name()))?;
    let key = args[1]
        .as_str()
        .ok_or_else(|| "has: key must be a string".to_string())?;
    Ok(Value::Bool(table.borrow().contains(key)))
}

fn push_fn(args: &[Value]) -> Result<Value, String> {
    let arr = args[0]
        .as_array()
        .ok_or_else(|| format!("push: expected an array, got '{}'", args[0].kind_name()))?;
    arr.borrow_mut().push(args[1].clone());
    Ok(args[0].clone())
}

fn pop_fn(args: &[Value]) -> Result<Value, String> {
    let arr = args[0]
        .as_array()
        .ok_or_else(|| format!("pop: expected an array, got '{}'", args[0].kind_name()))?;
    arr.borrow_mut().pop().ok_or_else(|| "pop: array is empty".to_string())
}

fn keys_fn(args: &[Value]) -> Result<Value, String> {
    let table = args[0]
        .as_table()
        .ok_or_else(|| format!("keys: expected a table, got '{}'", args[0].kind_name()))?;
    let keys: Vec<Value> = table.borrow().keys().map(Value::str).collect();
    Ok(Value::array(keys))
}

fn type_of_fn(args: &[Value]) -> Result<Value, String> {
    Ok(Value::str(args[0].kind_name()))
}

fn str_fn(args: &[Value]) -> Result<Value, String> {
    Ok(Value::str(&args[0].to_display_string()))
}

fn int_fn(args: &[Value]) -> Result<Value, String> {
    match &args[0] {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Float(f) => Ok(Value::Int(*f as i64)),
        Value::Bool(b) => Ok(Value::Int(if *b { 1 } else { 0 })),
        v => v
            .as_str()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .map(Value::Int)
            .ok_or_else(|| format!("int: cannot convert '{}'", v.kind_name())),
    }
}

fn float_fn(args: &[Value]) -> Result<Value, String> {
    match &args[0] {
        Value::Int(n) => Ok(Value::Float(*n as f64)),
        Value::Float(f) => Ok(Value::Float(*f)),
        v => v
            .as_str()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .map(Value::Float)
            .ok_or_else(|| format!("float: cannot convert '{}'", v.kind_name())),
    }
}

fn numeric(v: &Value, who: &str) -> Result<f64, String> {
    match v {
        Value::Int(n) => Ok(*n as f64),
        Value::Float(f) => Ok(*f),
        _ => Err(format!("{who}: expected a number, got '{}'", v.kind_name())),
    }
}

/// Preserve int-ness when the input was an int (e.g. `abs(-5)` is `5`, an
/// int, not `5.0`); only genuinely fractional results stay floats.
fn numeric_result(v: &Value, result: f64) -> Value {
    if matches!(v, Value::Int(_)) && result == result.trunc() {
        Value::Int(result as i64)
    } else {
        Value::Float(result)
    }
}

fn abs_fn(args: &[Value]) -> Result<Value, String> {
    let f = numeric(&args[0], "abs")?;
    Ok(numeric_result(&args[0], f.abs()))
}

fn floor_fn(args: &[Value]) -> Result<Value, String> {
    let f = numeric(&args[0], "floor")?;
    Ok(Value::Int(f.floor() as i64))
}

fn ceil_fn(args: &[Value]) -> Result<Value, String> {
    let f = numeric(&args[0], "ceil")?;
    Ok(Value::Int(f.ceil() as i64))
}

fn round_fn(args: &[Value]) -> Result<Value, String> {
    let f = numeric(&args[0], "round")?;
    Ok(Value::Int(f.round() as i64))
}

fn sqrt_fn(args: &[Value]) -> Result<Value, String> {
    let f = numeric(&args[0], "sqrt")?;
    Ok(Value::Float(f.sqrt()))
}

fn pow_fn(args: &[Value]) -> Result<Value, String> {
    let base = numeric(&args[0], "pow")?;
    let exp = numeric(&args[1], "pow")?;
    Ok(numeric_result(&args[0], base.powf(exp)))
}

fn min_fn(args: &[Value]) -> Result<Value, String> {
    let a = numeric(&args[0], "min")?;
    let b = numeric(&args[1], "min")?;
    Ok(if a <= b { args[0].clone() } else { args[1].clone() })
}

fn max_fn(args: &[Value]) -> Result<Value, String> {
    let a = numeric(&args[0], "max")?;
    let b = numeric(&args[1], "max")?;
    Ok(if a >= b { args[0].clone() } else { args[1].clone() })
}

fn exit_fn(args: &[Value]) -> Result<Value, String> {
    let code = match &args[0] {
        Value::Int(n) => *n as i32,
        _ => 0,
    };
    std::process::exit(code);
}

fn assert_fn(args: &[Value]) -> Result<Value, String> {
    if args.is_empty() {
        return Err("assert: expected at least a condition".to_string());
    }
    if args[0].is_truthy() {
        Ok(Value::Nil)
    } else {
        let msg = args
            .get(1)
            .map(Value::to_display_string)
            .unwrap_or_else(|| "assertion failed".to_string());
        Err(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::Interpreter;
    use crate::parser::Parser;

    fn run(src: &str) -> Value {
        let prog = Parser::new(src).unwrap().parse_program().unwrap();
        Interpreter::new().run(&prog).unwrap()
    }

    #[test]
    fn len_over_string_array_table() {
        assert_eq!(run(r#"len("hello")"#).to_display_string(), "5");
        assert_eq!(run("len([1,2,3])").to_display_string(), "3");
        assert_eq!(run("len({a: 1, b: 2})").to_display_string(), "2");
    }

    #[test]
    fn len_of_string_is_byte_length_not_char_count() {
        // "é" is one char but two UTF-8 bytes.
        assert_eq!(run(r#"len("é")"#).to_display_string(), "2");
    }

    /// Runs `src` with real process stdout redirected into a temp file and
    /// returns what was written, mirroring `scenarios.rs`'s capture helper.
    fn capture_stdout(src: &str) -> String {
        use std::io::{Read as _, Seek, SeekFrom, Write as _};
        use std::os::unix::io::AsRawFd;

        static STDOUT_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
        let _guard = STDOUT_LOCK.lock().unwrap();

        let mut tmp = tempfile::tempfile().unwrap();
        let stdout_fd = std::io::stdout().as_raw_fd();
        let saved = unsafe { libc::dup(stdout_fd) };
        assert!(saved >= 0, "failed to save stdout fd");
        unsafe {
            let rc = libc::dup2(tmp.as_raw_fd(), stdout_fd);
            assert!(rc >= 0, "failed to redirect stdout");
        }

        run(src);

        let _ = std::io::stdout().flush();
        unsafe {
            libc::dup2(saved, stdout_fd);
            libc::close(saved);
        }

        tmp.seek(SeekFrom::Start(0)).unwrap();
        let mut captured = String::new();
        tmp.read_to_string(&mut captured).unwrap();
        captured
    }

    #[test]
    fn print_and_println_space_separate_multiple_arguments() {
        assert_eq!(capture_stdout("print(1, 2)"), "1 2");
        assert_eq!(capture_stdout(r#"println("a", "b", 3)"#), "a b 3\n");
    }

    #[test]
    fn push_and_pop_mutate_in_place() {
        assert_eq!(run("a := [1]; push(a, 2); len(a)").to_display_string(), "2");
        assert_eq!(run("a := [1, 2]; pop(a)").to_display_string(), "2");
    }

    #[test]
    fn type_of_names() {
        assert_eq!(run("type_of(1)").to_display_string(), "int");
        assert_eq!(run("type_of(1.0)").to_display_string(), "float");
        assert_eq!(run(r#"type_of("x")"#).to_display_string(), "string");
        assert_eq!(run("type_of([])").to_display_string(), "array");
    }

    #[test]
    fn sqrt_formats_like_percent_g() {
        assert_eq!(run("sqrt(16.0)").to_display_string(), "4");
    }

    #[test]
    fn abs_preserves_int_kind() {
        assert_eq!(run("type_of(abs(-5))").to_display_string(), "int");
    }

    #[test]
    fn assert_raises_with_custom_message() {
        let prog = Parser::new(r#"assert(false, "boom")"#)
            .unwrap()
            .parse_program()
            .unwrap();
        let err = Interpreter::new().run(&prog).unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
