//! Script evaluator
//!
//! Tree-walking evaluation with three resource caps: an operation budget
//! (fuel), a wall-clock deadline, and a call-depth limit. Every statement and
//! expression costs one unit of fuel; the clock is polled every 1024 units so
//! hot loops cannot dodge the deadline.

use std::rc::Rc;
use std::time::Instant;

use super::ast::{ArrowBody, BinaryOp, DeclKind, Expr, LogicalOp, Stmt, UnaryOp};
use super::builtins;
use super::error::ScriptError;
use super::value::{Closure, Scope, ScopeRef, Value};
use super::SandboxConfig;

const CLOCK_CHECK_INTERVAL: u32 = 1024;

pub struct Interpreter {
    fuel: u64,
    deadline: Instant,
    timeout_ms: u64,
    ops_since_clock_check: u32,
    depth: usize,
    max_depth: usize,
}

enum Exec {
    Normal,
    Return(Value),
}

impl Interpreter {
    pub fn new(config: &SandboxConfig) -> Self {
        Interpreter {
            fuel: config.max_ops,
            deadline: Instant::now() + config.timeout,
            timeout_ms: config.timeout.as_millis() as u64,
            ops_since_clock_check: 0,
            depth: 0,
            max_depth: config.max_call_depth,
        }
    }

    /// Execute a program against the given global scope. A top-level
    /// `return` yields the script result; falling off the end yields
    /// `undefined`.
    pub fn run(&mut self, program: &[Stmt], globals: &ScopeRef) -> Result<Value, ScriptError> {
        let scope = Scope::child(globals);
        match self.exec_stmts(program, &scope)? {
            Exec::Return(value) => Ok(value),
            Exec::Normal => Ok(Value::Undefined),
        }
    }

    fn tick(&mut self) -> Result<(), ScriptError> {
        if self.fuel == 0 {
            return Err(ScriptError::FuelExhausted);
        }
        self.fuel -= 1;
        self.ops_since_clock_check += 1;
        if self.ops_since_clock_check >= CLOCK_CHECK_INTERVAL {
            self.ops_since_clock_check = 0;
            if Instant::now() >= self.deadline {
                return Err(ScriptError::Timeout(self.timeout_ms));
            }
        }
        Ok(())
    }

    fn exec_stmts(&mut self, stmts: &[Stmt], scope: &ScopeRef) -> Result<Exec, ScriptError> {
        for stmt in stmts {
            if let Exec::Return(value) = self.exec_stmt(stmt, scope)? {
                return Ok(Exec::Return(value));
            }
        }
        Ok(Exec::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, scope: &ScopeRef) -> Result<Exec, ScriptError> {
        self.tick()?;
        match stmt {
            Stmt::Decl { kind, declarators } => {
                for (name, init) in declarators {
                    let value = match init {
                        Some(expr) => self.eval(expr, scope)?,
                        None => Value::Undefined,
                    };
                    scope
                        .borrow_mut()
                        .declare(name, value, *kind == DeclKind::Let);
                }
                Ok(Exec::Normal)
            }
            Stmt::Expr(expr) => {
                self.eval(expr, scope)?;
                Ok(Exec::Normal)
            }
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Value::Undefined,
                };
                Ok(Exec::Return(value))
            }
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(cond, scope)?.is_truthy() {
                    self.exec_stmt(then, scope)
                } else if let Some(otherwise) = otherwise {
                    self.exec_stmt(otherwise, scope)
                } else {
                    Ok(Exec::Normal)
                }
            }
            Stmt::While { cond, body } => {
                loop {
                    self.tick()?;
                    if !self.eval(cond, scope)?.is_truthy() {
                        break;
                    }
                    if let Exec::Return(value) = self.exec_stmt(body, scope)? {
                        return Ok(Exec::Return(value));
                    }
                }
                Ok(Exec::Normal)
            }
            Stmt::Block(stmts) => {
                let inner = Scope::child(scope);
                self.exec_stmts(stmts, &inner)
            }
            Stmt::Empty => Ok(Exec::Normal),
        }
    }

    fn eval(&mut self, expr: &Expr, scope: &ScopeRef) -> Result<Value, ScriptError> {
        self.tick()?;
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::string(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Undefined => Ok(Value::Undefined),
            Expr::Ident(name) => Scope::lookup(scope, name)
                .ok_or_else(|| ScriptError::UndefinedIdentifier(name.clone())),
            Expr::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item, scope)?);
                }
                Ok(Value::array(values))
            }
            Expr::Object(entries) => {
                let mut map = super::value::ObjectMap::new();
                for (key, value) in entries {
                    map.insert(key.clone(), self.eval(value, scope)?);
                }
                Ok(Value::object(map))
            }
            Expr::Member { object, property } => {
                let object = self.eval(object, scope)?;
                builtins::get_property(&object, property)
            }
            Expr::Index { object, index } => {
                let object = self.eval(object, scope)?;
                let index = self.eval(index, scope)?;
                builtins::get_index(&object, &index)
            }
            Expr::Call { callee, args } => {
                let callee_value = self.eval(callee, scope)?;
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(self.eval(arg, scope)?);
                }
                if !callee_value.is_callable() {
                    return Err(ScriptError::Type(format!(
                        "{} is not a function",
                        describe_callee(callee)
                    )));
                }
                self.call_value(&callee_value, arg_values)
            }
            Expr::Unary { op, operand } => self.eval_unary(*op, operand, scope),
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, scope)?;
                let right = self.eval(right, scope)?;
                Ok(eval_binary(*op, &left, &right))
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left, scope)?;
                match op {
                    LogicalOp::And => {
                        if left.is_truthy() {
                            self.eval(right, scope)
                        } else {
                            Ok(left)
                        }
                    }
                    LogicalOp::Or => {
                        if left.is_truthy() {
                            Ok(left)
                        } else {
                            self.eval(right, scope)
                        }
                    }
                }
            }
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(cond, scope)?.is_truthy() {
                    self.eval(then, scope)
                } else {
                    self.eval(otherwise, scope)
                }
            }
            Expr::Assign { target, value } => {
                let value = self.eval(value, scope)?;
                Scope::assign(scope, target, value.clone())?;
                Ok(value)
            }
            Expr::Arrow { params, body } => Ok(Value::Closure(Rc::new(Closure {
                params: params.clone(),
                body: Rc::clone(body),
                env: Rc::clone(scope),
            }))),
        }
    }

    fn eval_unary(
        &mut self,
        op: UnaryOp,
        operand: &Expr,
        scope: &ScopeRef,
    ) -> Result<Value, ScriptError> {
        // `typeof missing` must not raise a reference fault.
        if op == UnaryOp::TypeOf {
            if let Expr::Ident(name) = operand {
                return Ok(match Scope::lookup(scope, name) {
                    Some(value) => Value::string(value.type_of()),
                    None => Value::string("undefined"),
                });
            }
        }
        let value = self.eval(operand, scope)?;
        Ok(match op {
            UnaryOp::Not => Value::Bool(!value.is_truthy()),
            UnaryOp::Neg => Value::Number(-value.coerce_number()),
            UnaryOp::Plus => Value::Number(value.coerce_number()),
            UnaryOp::TypeOf => Value::string(value.type_of()),
        })
    }

    /// Invoke a closure or native function. Public so built-ins (`map`,
    /// `filter`, ...) can call back into the evaluator.
    pub fn call_value(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value, ScriptError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            self.depth -= 1;
            return Err(ScriptError::Range(
                "Maximum call stack size exceeded".to_string(),
            ));
        }
        let result = self.call_inner(callee, args);
        self.depth -= 1;
        result
    }

    fn call_inner(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value, ScriptError> {
        match callee {
            Value::Closure(closure) => {
                let scope = Scope::child(&closure.env);
                {
                    let mut frame = scope.borrow_mut();
                    for (i, param) in closure.params.iter().enumerate() {
                        let value = args.get(i).cloned().unwrap_or(Value::Undefined);
                        frame.declare(param, value, true);
                    }
                }
                match closure.body.as_ref() {
                    ArrowBody::Expr(expr) => self.eval(expr, &scope),
                    ArrowBody::Block(stmts) => match self.exec_stmts(stmts, &scope)? {
                        Exec::Return(value) => Ok(value),
                        Exec::Normal => Ok(Value::Undefined),
                    },
                }
            }
            Value::Native(native) => (native.func)(self, &native.this, &args),
            other => Err(ScriptError::Type(format!(
                "{} is not a function",
                other.to_display_string()
            ))),
        }
    }
}

/// Render a call target for "is not a function" messages.
fn describe_callee(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::Member { object, property } => match object.as_ref() {
            Expr::Ident(name) => format!("{}.{}", name, property),
            _ => property.clone(),
        },
        _ => "expression".to_string(),
    }
}

fn eval_binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => {
            if is_string_like(left) || is_string_like(right) {
                Value::string(format!(
                    "{}{}",
                    left.to_display_string(),
                    right.to_display_string()
                ))
            } else {
                Value::Number(left.coerce_number() + right.coerce_number())
            }
        }
        BinaryOp::Sub => Value::Number(left.coerce_number() - right.coerce_number()),
        BinaryOp::Mul => Value::Number(left.coerce_number() * right.coerce_number()),
        BinaryOp::Div => Value::Number(left.coerce_number() / right.coerce_number()),
        BinaryOp::Rem => Value::Number(left.coerce_number() % right.coerce_number()),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            Value::Bool(compare(op, left, right))
        }
        BinaryOp::Eq => Value::Bool(left.loose_equals(right)),
        BinaryOp::Ne => Value::Bool(!left.loose_equals(right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_equals(right)),
        BinaryOp::StrictNe => Value::Bool(!left.strict_equals(right)),
    }
}

fn is_string_like(value: &Value) -> bool {
    matches!(value, Value::Str(_) | Value::Array(_) | Value::Object(_))
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> bool {
    if let (Value::Str(a), Value::Str(b)) = (left, right) {
        return match op {
            BinaryOp::Lt => a < b,
            BinaryOp::Le => a <= b,
            BinaryOp::Gt => a > b,
            BinaryOp::Ge => a >= b,
            _ => false,
        };
    }
    let a = left.coerce_number();
    let b = right.coerce_number();
    match op {
        BinaryOp::Lt => a < b,
        BinaryOp::Le => a <= b,
        BinaryOp::Gt => a > b,
        BinaryOp::Ge => a >= b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parser::parse;

    fn eval_script(src: &str) -> Result<Value, ScriptError> {
        let program = parse(src)?;
        let globals = builtins::globals(Value::Undefined);
        let mut interp = Interpreter::new(&SandboxConfig::default());
        interp.run(&program, &globals)
    }

    fn eval_ok(src: &str) -> serde_json::Value {
        eval_script(src).unwrap().to_json()
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval_ok("return 2 + 2"), serde_json::json!(4));
        assert_eq!(eval_ok("return 7 % 3"), serde_json::json!(1));
        assert_eq!(eval_ok("return (1 + 2) * 3"), serde_json::json!(9));
        assert_eq!(eval_ok("return -4 + 1"), serde_json::json!(-3));
    }

    #[test]
    fn test_string_concat() {
        assert_eq!(
            eval_ok("return 'a' + 'b' + 3"),
            serde_json::json!("ab3")
        );
    }

    #[test]
    fn test_variables_and_assignment() {
        assert_eq!(
            eval_ok("let x = 1; x = x + 41; return x"),
            serde_json::json!(42)
        );
    }

    #[test]
    fn test_const_reassignment_fails() {
        let err = eval_script("const x = 1; x = 2;").unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: Assignment to constant variable."
        );
    }

    #[test]
    fn test_undefined_identifier() {
        let err = eval_script("return nope + 1").unwrap_err();
        assert_eq!(err.to_string(), "ReferenceError: nope is not defined");
    }

    #[test]
    fn test_member_of_undefined() {
        let err = eval_script("let x; return x.field").unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: Cannot read properties of undefined (reading 'field')"
        );
    }

    #[test]
    fn test_call_non_function() {
        let err = eval_script("let x = 1; return x()").unwrap_err();
        assert_eq!(err.to_string(), "TypeError: x is not a function");
    }

    #[test]
    fn test_if_else() {
        assert_eq!(
            eval_ok("if (3 > 2) { return 'yes' } else { return 'no' }"),
            serde_json::json!("yes")
        );
    }

    #[test]
    fn test_while_loop() {
        assert_eq!(
            eval_ok("let i = 0; let total = 0; while (i < 5) { total = total + i; i = i + 1; } return total"),
            serde_json::json!(10)
        );
    }

    #[test]
    fn test_arrow_and_map() {
        assert_eq!(
            eval_ok("return [1, 2, 3].map(x => x * 2)"),
            serde_json::json!([2, 4, 6])
        );
    }

    #[test]
    fn test_closure_capture() {
        assert_eq!(
            eval_ok("const base = 10; const add = x => x + base; return add(5)"),
            serde_json::json!(15)
        );
    }

    #[test]
    fn test_ternary_and_logical() {
        assert_eq!(eval_ok("return 1 > 2 ? 'a' : 'b'"), serde_json::json!("b"));
        assert_eq!(eval_ok("return null || 'fallback'"), serde_json::json!("fallback"));
        assert_eq!(eval_ok("return 1 && 2"), serde_json::json!(2));
    }

    #[test]
    fn test_equality_forms() {
        assert_eq!(eval_ok("return 5 == '5'"), serde_json::json!(true));
        assert_eq!(eval_ok("return 5 === '5'"), serde_json::json!(false));
        assert_eq!(eval_ok("return null == undefined"), serde_json::json!(true));
        assert_eq!(eval_ok("return null === undefined"), serde_json::json!(false));
    }

    #[test]
    fn test_typeof_missing_identifier() {
        assert_eq!(eval_ok("return typeof nothing"), serde_json::json!("undefined"));
        assert_eq!(eval_ok("return typeof 'x'"), serde_json::json!("string"));
    }

    #[test]
    fn test_object_literals() {
        assert_eq!(
            eval_ok("const v = 2; return { a: 1, v }"),
            serde_json::json!({"a": 1, "v": 2})
        );
    }

    #[test]
    fn test_no_return_yields_null() {
        assert_eq!(eval_ok("const x = 1;"), serde_json::json!(null));
    }

    #[test]
    fn test_fuel_exhaustion() {
        let program = parse("while (true) {}").unwrap();
        let globals = builtins::globals(Value::Undefined);
        let config = SandboxConfig {
            max_ops: 10_000,
            ..SandboxConfig::default()
        };
        let mut interp = Interpreter::new(&config);
        let err = interp.run(&program, &globals).unwrap_err();
        assert_eq!(err, ScriptError::FuelExhausted);
    }

    #[test]
    fn test_wall_clock_timeout() {
        let program = parse("while (true) {}").unwrap();
        let globals = builtins::globals(Value::Undefined);
        let config = SandboxConfig {
            timeout: std::time::Duration::from_millis(25),
            max_ops: u64::MAX,
            ..SandboxConfig::default()
        };
        let mut interp = Interpreter::new(&config);
        let err = interp.run(&program, &globals).unwrap_err();
        assert_eq!(err, ScriptError::Timeout(25));
    }

    #[test]
    fn test_call_depth_cap() {
        // Self-application gives unbounded recursion without named functions.
        let src = "const f = g => g(g); return f(f)";
        let err = eval_script(src).unwrap_err();
        assert_eq!(
            err.to_string(),
            "RangeError: Maximum call stack size exceeded"
        );
    }
}
