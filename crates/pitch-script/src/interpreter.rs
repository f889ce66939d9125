//! Tree-walking interpreter with hard execution budgets.
//!
//! Every statement and expression evaluation costs one step of fuel. The
//! wall clock is sampled every [`CLOCK_CHECK_INTERVAL`] steps, so a runaway
//! loop is stopped by whichever budget runs out first. Call depth, string
//! length and array length are bounded as well, which keeps a single call's
//! memory and stack use proportional to the configured [`Limits`]. Memory a
//! script keeps between calls is bounded by its heap budget.

use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::trace;

use crate::ast::{
    BinaryOp, DeclKind, Expr, ExprKind, FunctionDef, Program, Stmt, StmtKind, Target, UnaryOp,
};
use crate::builtins::{self, Builtin};
use crate::error::{ScriptError, ScriptResult};
use crate::heap::{self, Heap, HeapExhausted, SLOT_BYTES};
use crate::value::Value;
use crate::Limits;

/// How many steps run between wall-clock samples.
pub const CLOCK_CHECK_INTERVAL: u64 = 256;

/// Bytes of string output that cost one step.
const RENDER_BYTES_PER_STEP: usize = 64;

/// Heap registry entries scanned per step charged.
const HEAP_SCAN_PER_STEP: usize = 64;

#[derive(Debug, Clone)]
struct Binding {
    value: Value,
    constant: bool,
}

/// One activation record. The top-level program runs in a frame that is not
/// a function frame, so `var` there declares globals.
#[derive(Debug, Default)]
struct Frame {
    scopes: Vec<HashMap<String, Binding>>,
    function: bool,
}

/// Non-local control flow out of a statement.
enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// A resolved assignment target. Object and index expressions are evaluated
/// exactly once.
enum Place {
    Ident(String),
    Member(Value, String),
    Index(Value, Value),
}

/// Executes programs and calls their functions.
pub struct Interpreter {
    globals: HashMap<String, Binding>,
    frames: Vec<Frame>,
    limits: Limits,
    rng: ChaCha8Rng,
    steps: u64,
    started: Instant,
    heap: Heap,
}

impl Interpreter {
    /// Creates an interpreter with the standard helpers installed.
    #[must_use]
    pub fn new(limits: Limits, seed: u64) -> Self {
        let mut globals = HashMap::new();
        let mut heap = Heap::new(limits.max_heap_bytes);
        for (name, value) in builtins::globals() {
            // `Math` is a few hundred bytes; it always fits.
            let _ = heap.adopt(&value);
            globals.insert(
                name.to_string(),
                Binding {
                    value,
                    constant: false,
                },
            );
        }
        Self {
            globals,
            frames: Vec::new(),
            limits,
            rng: ChaCha8Rng::seed_from_u64(seed),
            steps: 0,
            started: Instant::now(),
            heap,
        }
    }

    /// Budgets in force for every call.
    #[must_use]
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Steps consumed by the most recent top-level run or call.
    #[must_use]
    pub fn steps_used(&self) -> u64 {
        self.steps
    }

    /// Reads a global binding.
    #[must_use]
    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.get(name).map(|b| b.value.clone())
    }

    /// Creates or overwrites a mutable global binding.
    ///
    /// The value counts against the heap budget. A value that overruns it is
    /// still bound; the script's next allocation fails instead.
    pub fn set_global(&mut self, name: &str, value: Value) {
        let _ = self.heap.adopt(&value);
        self.globals.insert(
            name.to_string(),
            Binding {
                value,
                constant: false,
            },
        );
    }

    /// Runs a program's top level. Function declarations are hoisted first so
    /// top-level code may call functions declared further down.
    ///
    /// # Errors
    ///
    /// Any runtime fault or exhausted budget.
    pub fn run_program(&mut self, program: &Program) -> ScriptResult<()> {
        for stmt in &program.body {
            if let StmtKind::Function(def) = &stmt.kind {
                self.set_global(&def.name, Value::Function(Rc::clone(def)));
            }
        }

        self.begin();
        self.frames.push(Frame::default());
        let result = self.exec_block(&program.body);
        self.frames.clear();

        match result? {
            Flow::Normal | Flow::Return(_) => Ok(()),
            Flow::Break | Flow::Continue => Err(ScriptError::runtime(
                program.body.last().map_or(1, |s| s.line),
                "`break` or `continue` outside of a loop",
            )),
        }
    }

    /// Calls the global function `name` with `args`.
    ///
    /// # Errors
    ///
    /// [`ScriptError::MissingFunction`] if no such function exists, otherwise
    /// any runtime fault or exhausted budget.
    pub fn call_global(&mut self, name: &str, args: &[Value]) -> ScriptResult<Value> {
        let callee = match self.global(name) {
            Some(value @ (Value::Function(_) | Value::Native(_))) => value,
            _ => return Err(ScriptError::MissingFunction(name.to_string())),
        };
        self.begin();
        for arg in args {
            let scanned = self.heap.adopt(arg);
            self.settle_heap(scanned)?;
        }
        let result = self.call_value(&callee, args.to_vec(), 0);
        self.frames.clear();
        trace!(function = name, steps = self.steps, "script call finished");
        result
    }

    // ========================================================================
    // Budgets
    // ========================================================================

    fn begin(&mut self) {
        self.steps = 0;
        self.started = Instant::now();
        self.frames.clear();
    }

    fn tick(&mut self) -> ScriptResult<()> {
        self.steps += 1;
        if self.steps > self.limits.max_steps {
            return Err(ScriptError::StepBudgetExhausted(self.limits.max_steps));
        }
        if self.steps % CLOCK_CHECK_INTERVAL == 0 && self.started.elapsed() > self.limits.time_budget
        {
            return Err(ScriptError::TimeBudgetExceeded(self.limits.time_budget));
        }
        Ok(())
    }

    /// Charges `steps` at once, as for work done outside `eval`.
    fn charge(&mut self, steps: u64) -> ScriptResult<()> {
        self.steps = self.steps.saturating_add(steps);
        if self.steps > self.limits.max_steps {
            return Err(ScriptError::StepBudgetExhausted(self.limits.max_steps));
        }
        if self.started.elapsed() > self.limits.time_budget {
            return Err(ScriptError::TimeBudgetExceeded(self.limits.time_budget));
        }
        Ok(())
    }

    fn settle_heap(&mut self, scanned: Result<usize, HeapExhausted>) -> ScriptResult<()> {
        match scanned {
            Ok(0) => Ok(()),
            Ok(scanned) => self.charge((scanned / HEAP_SCAN_PER_STEP) as u64),
            Err(HeapExhausted) => Err(ScriptError::HeapExhausted(self.limits.max_heap_bytes)),
        }
    }

    fn track(&mut self, value: &Value) -> ScriptResult<()> {
        let scanned = self.heap.track(value);
        self.settle_heap(scanned)
    }

    fn grow_heap(&mut self, bytes: usize) -> ScriptResult<()> {
        let scanned = self.heap.grow(bytes);
        self.settle_heap(scanned)
    }

    fn string_too_long(&self, line: u32) -> ScriptError {
        ScriptError::runtime(
            line,
            format!("string longer than {} bytes", self.limits.max_string_len),
        )
    }

    /// `lhs + rhs` where either side is a string. Rendering stops at the
    /// string limit and its cost is charged as steps.
    fn concat(&mut self, lhs: &Value, rhs: &Value, line: u32) -> ScriptResult<Value> {
        let limit = self.limits.max_string_len;
        let mut joined = String::new();
        let visited = lhs
            .render_into(&mut joined, limit)
            .and_then(|a| rhs.render_into(&mut joined, limit).map(|b| a + b))
            .map_err(|_| self.string_too_long(line))?;
        self.charge((visited + joined.len() / RENDER_BYTES_PER_STEP) as u64)?;
        self.grow_heap(joined.len())?;
        Ok(Value::string(&joined))
    }

    fn check_object_len(&self, len: usize, line: u32) -> ScriptResult<()> {
        if len > self.limits.max_array_len {
            return Err(ScriptError::runtime(
                line,
                format!("object with more than {} properties", self.limits.max_array_len),
            ));
        }
        Ok(())
    }

    fn check_array_len(&self, len: usize, line: u32) -> ScriptResult<()> {
        if len > self.limits.max_array_len {
            return Err(ScriptError::runtime(
                line,
                format!("array longer than {} elements", self.limits.max_array_len),
            ));
        }
        Ok(())
    }

    // ========================================================================
    // Scopes
    // ========================================================================

    fn frame_mut(&mut self) -> &mut Frame {
        if self.frames.is_empty() {
            self.frames.push(Frame::default());
        }
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn lookup(&self, name: &str) -> Option<&Binding> {
        if let Some(frame) = self.frames.last() {
            for scope in frame.scopes.iter().rev() {
                if let Some(binding) = scope.get(name) {
                    return Some(binding);
                }
            }
        }
        self.globals.get(name)
    }

    fn lookup_mut(&mut self, name: &str) -> Option<&mut Binding> {
        if let Some(frame) = self.frames.last_mut() {
            if let Some(scope) = frame
                .scopes
                .iter_mut()
                .rev()
                .find(|scope| scope.contains_key(name))
            {
                return scope.get_mut(name);
            }
        }
        self.globals.get_mut(name)
    }

    fn declare(&mut self, kind: DeclKind, name: &str, value: Value) {
        let binding = Binding {
            value,
            constant: kind == DeclKind::Const,
        };
        let frame = self.frame_mut();
        let into_globals = match kind {
            DeclKind::Var => !frame.function,
            DeclKind::Let | DeclKind::Const => frame.scopes.is_empty(),
        };
        if into_globals {
            self.globals.insert(name.to_string(), binding);
            return;
        }
        let scope = match kind {
            DeclKind::Var => frame.scopes.first_mut(),
            DeclKind::Let | DeclKind::Const => frame.scopes.last_mut(),
        };
        if let Some(scope) = scope {
            scope.insert(name.to_string(), binding);
        }
    }

    fn assign_ident(&mut self, name: &str, value: Value, line: u32) -> ScriptResult<()> {
        match self.lookup_mut(name) {
            Some(binding) if binding.constant => Err(ScriptError::runtime(
                line,
                format!("assignment to constant variable `{name}`"),
            )),
            Some(binding) => {
                binding.value = value;
                Ok(())
            }
            None => Err(ScriptError::runtime(line, format!("`{name}` is not defined"))),
        }
    }

    fn with_block_scope<T>(
        &mut self,
        body: impl FnOnce(&mut Self) -> ScriptResult<T>,
    ) -> ScriptResult<T> {
        self.frame_mut().scopes.push(HashMap::new());
        let result = body(self);
        self.frame_mut().scopes.pop();
        result
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn exec_block(&mut self, body: &[Stmt]) -> ScriptResult<Flow> {
        for stmt in body {
            match self.exec(stmt)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt) -> ScriptResult<Flow> {
        self.tick()?;
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.eval(expr)?;
                Ok(Flow::Normal)
            }
            StmtKind::Decl(kind, bindings) => {
                for (name, init) in bindings {
                    let value = match init {
                        Some(expr) => self.eval(expr)?,
                        None => Value::Undefined,
                    };
                    self.declare(*kind, name, value);
                }
                Ok(Flow::Normal)
            }
            // Hoisted in `run_program`.
            StmtKind::Function(_) | StmtKind::Empty => Ok(Flow::Normal),
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            StmtKind::If(test, then, otherwise) => {
                if self.eval(test)?.truthy() {
                    self.exec(then)
                } else if let Some(otherwise) = otherwise {
                    self.exec(otherwise)
                } else {
                    Ok(Flow::Normal)
                }
            }
            StmtKind::While(test, body) => {
                while self.eval(test)?.truthy() {
                    match self.exec(body)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => self.with_block_scope(|this| {
                if let Some(init) = init {
                    this.exec(init)?;
                }
                loop {
                    if let Some(test) = test {
                        if !this.eval(test)?.truthy() {
                            break;
                        }
                    }
                    match this.exec(body)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if let Some(update) = update {
                        this.eval(update)?;
                    }
                    this.tick()?;
                }
                Ok(Flow::Normal)
            }),
            StmtKind::Block(body) => self.with_block_scope(|this| this.exec_block(body)),
            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),
            StmtKind::Throw(expr) => {
                let value = self.eval(expr)?;
                let message = match value.get_field("message") {
                    Some(message) => message.to_string(),
                    None => value.to_string(),
                };
                Err(ScriptError::Thrown {
                    line: stmt.line,
                    message,
                })
            }
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn eval(&mut self, expr: &Expr) -> ScriptResult<Value> {
        self.tick()?;
        let line = expr.line;
        match &expr.kind {
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::Str(s) => Ok(Value::Str(Rc::clone(s))),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Undefined => Ok(Value::Undefined),
            ExprKind::Ident(name) => match self.lookup(name) {
                Some(binding) => Ok(binding.value.clone()),
                None => Err(ScriptError::runtime(line, format!("`{name}` is not defined"))),
            },
            ExprKind::Array(items) => {
                self.check_array_len(items.len(), line)?;
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item)?);
                }
                let array = Value::array(values);
                self.track(&array)?;
                Ok(array)
            }
            ExprKind::Object(fields) => {
                let object = Value::object();
                if let Value::Object(map) = &object {
                    for (key, value) in fields {
                        let value = self.eval(value)?;
                        map.borrow_mut().insert(key.clone(), value);
                    }
                }
                self.track(&object)?;
                Ok(object)
            }
            ExprKind::Member(object, name) => {
                let object = self.eval(object)?;
                get_member(&object, name, line)
            }
            ExprKind::Index(object, index) => {
                let object = self.eval(object)?;
                let index = self.eval(index)?;
                get_index(&object, &index, line)
            }
            ExprKind::Call(callee, args) => self.eval_call(callee, args, line),
            ExprKind::Unary(op, operand) => self.eval_unary(*op, operand),
            ExprKind::Binary(op, lhs, rhs) => match op {
                BinaryOp::And => {
                    let lhs = self.eval(lhs)?;
                    if lhs.truthy() {
                        self.eval(rhs)
                    } else {
                        Ok(lhs)
                    }
                }
                BinaryOp::Or => {
                    let lhs = self.eval(lhs)?;
                    if lhs.truthy() {
                        Ok(lhs)
                    } else {
                        self.eval(rhs)
                    }
                }
                _ => {
                    let lhs = self.eval(lhs)?;
                    let rhs = self.eval(rhs)?;
                    self.binary(*op, &lhs, &rhs, line)
                }
            },
            ExprKind::Conditional(test, then, otherwise) => {
                if self.eval(test)?.truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            ExprKind::Assign(target, op, value) => {
                let place = self.resolve(target)?;
                let value = match op {
                    None => self.eval(value)?,
                    Some(op) => {
                        let current = self.read_place(&place, line)?;
                        let rhs = self.eval(value)?;
                        self.binary(*op, &current, &rhs, line)?
                    }
                };
                self.write_place(place, value.clone(), line)?;
                Ok(value)
            }
            ExprKind::Update {
                target,
                delta,
                prefix,
            } => {
                let place = self.resolve(target)?;
                let old = self.read_place(&place, line)?.to_number();
                let new = old + delta;
                self.write_place(place, Value::Number(new), line)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
        }
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &Expr) -> ScriptResult<Value> {
        if op == UnaryOp::Typeof {
            // `typeof undeclared` is "undefined", not an error.
            if let ExprKind::Ident(name) = &operand.kind {
                if self.lookup(name).is_none() {
                    return Ok(Value::string("undefined"));
                }
            }
        }
        let value = self.eval(operand)?;
        Ok(match op {
            UnaryOp::Neg => Value::Number(-value.to_number()),
            UnaryOp::Plus => Value::Number(value.to_number()),
            UnaryOp::Not => Value::Bool(!value.truthy()),
            UnaryOp::Typeof => Value::string(value.type_name()),
        })
    }

    fn binary(&mut self, op: BinaryOp, lhs: &Value, rhs: &Value, line: u32) -> ScriptResult<Value> {
        let num = |f: fn(f64, f64) -> f64| Value::Number(f(lhs.to_number(), rhs.to_number()));
        Ok(match op {
            BinaryOp::Add => {
                if is_stringy(lhs) || is_stringy(rhs) {
                    self.concat(lhs, rhs, line)?
                } else {
                    num(|a, b| a + b)
                }
            }
            BinaryOp::Sub => num(|a, b| a - b),
            BinaryOp::Mul => num(|a, b| a * b),
            BinaryOp::Div => num(|a, b| a / b),
            BinaryOp::Rem => num(|a, b| a % b),
            BinaryOp::Lt => Value::Bool(compare(lhs, rhs, |o| o.is_lt())),
            BinaryOp::Le => Value::Bool(compare(lhs, rhs, |o| o.is_le())),
            BinaryOp::Gt => Value::Bool(compare(lhs, rhs, |o| o.is_gt())),
            BinaryOp::Ge => Value::Bool(compare(lhs, rhs, |o| o.is_ge())),
            BinaryOp::Eq => Value::Bool(lhs.loose_equals(rhs)),
            BinaryOp::NotEq => Value::Bool(!lhs.loose_equals(rhs)),
            BinaryOp::StrictEq => Value::Bool(lhs.strict_equals(rhs)),
            BinaryOp::StrictNotEq => Value::Bool(!lhs.strict_equals(rhs)),
            BinaryOp::And => {
                if lhs.truthy() {
                    rhs.clone()
                } else {
                    lhs.clone()
                }
            }
            BinaryOp::Or => {
                if lhs.truthy() {
                    lhs.clone()
                } else {
                    rhs.clone()
                }
            }
        })
    }

    // ========================================================================
    // Calls
    // ========================================================================

    #[allow(clippy::cast_precision_loss)]
    fn eval_call(&mut self, callee: &Expr, args: &[Expr], line: u32) -> ScriptResult<Value> {
        // Array methods are resolved against the receiver.
        if let ExprKind::Member(object, name) = &callee.kind {
            let receiver = self.eval(object)?;
            if let Value::Array(items) = &receiver {
                let args = self.eval_args(args)?;
                return match name.as_str() {
                    "push" => {
                        let len = items.borrow().len() + args.len();
                        self.check_array_len(len, line)?;
                        self.grow_heap(heap::slots_size(&args))?;
                        items.borrow_mut().extend(args);
                        Ok(Value::Number(len as f64))
                    }
                    "pop" => Ok(items.borrow_mut().pop().unwrap_or_default()),
                    "indexOf" => {
                        let needle = args.first().cloned().unwrap_or_default();
                        let position = items.borrow().iter().position(|v| v.strict_equals(&needle));
                        Ok(Value::Number(position.map_or(-1.0, |p| p as f64)))
                    }
                    other => Err(ScriptError::runtime(
                        line,
                        format!("array has no method `{other}`"),
                    )),
                };
            }
            let function = get_member(&receiver, name, line)?;
            let args = self.eval_args(args)?;
            return self.call_named(&function, args, line, name);
        }

        let function = self.eval(callee)?;
        let args = self.eval_args(args)?;
        let name = match &callee.kind {
            ExprKind::Ident(name) => name.as_str(),
            _ => "expression",
        };
        self.call_named(&function, args, line, name)
    }

    fn eval_args(&mut self, args: &[Expr]) -> ScriptResult<Vec<Value>> {
        args.iter().map(|arg| self.eval(arg)).collect()
    }

    fn call_named(
        &mut self,
        function: &Value,
        args: Vec<Value>,
        line: u32,
        name: &str,
    ) -> ScriptResult<Value> {
        match function {
            Value::Function(_) | Value::Native(_) => self.call_value(function, args, line),
            _ => Err(ScriptError::runtime(line, format!("`{name}` is not a function"))),
        }
    }

    fn call_value(&mut self, function: &Value, args: Vec<Value>, line: u32) -> ScriptResult<Value> {
        self.tick()?;
        match function {
            Value::Native(builtin) => Ok(self.call_native(*builtin, &args)),
            Value::Function(def) => self.call_function(def, args),
            other => Err(ScriptError::runtime(
                line,
                format!("{} is not a function", other.type_name()),
            )),
        }
    }

    fn call_native(&mut self, builtin: Builtin, args: &[Value]) -> Value {
        builtin.call(args, &mut self.rng)
    }

    fn call_function(&mut self, def: &Rc<FunctionDef>, args: Vec<Value>) -> ScriptResult<Value> {
        if self.frames.len() > self.limits.max_call_depth {
            return Err(ScriptError::CallDepthExceeded(self.limits.max_call_depth));
        }

        let mut locals = HashMap::with_capacity(def.params.len());
        let mut args = args.into_iter();
        for param in &def.params {
            locals.insert(
                param.clone(),
                Binding {
                    value: args.next().unwrap_or_default(),
                    constant: false,
                },
            );
        }

        self.frames.push(Frame {
            scopes: vec![locals],
            function: true,
        });
        let result = self.exec_block(&def.body);
        self.frames.pop();

        match result? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Undefined),
            Flow::Break | Flow::Continue => Err(ScriptError::runtime(
                def.line,
                format!("`break` or `continue` outside of a loop in `{}`", def.name),
            )),
        }
    }

    // ========================================================================
    // Assignment targets
    // ========================================================================

    fn resolve(&mut self, target: &Target) -> ScriptResult<Place> {
        Ok(match target {
            Target::Ident(name) => Place::Ident(name.clone()),
            Target::Member(object, name) => Place::Member(self.eval(object)?, name.clone()),
            Target::Index(object, index) => Place::Index(self.eval(object)?, self.eval(index)?),
        })
    }

    fn read_place(&self, place: &Place, line: u32) -> ScriptResult<Value> {
        match place {
            Place::Ident(name) => match self.lookup(name) {
                Some(binding) => Ok(binding.value.clone()),
                None => Err(ScriptError::runtime(line, format!("`{name}` is not defined"))),
            },
            Place::Member(object, name) => get_member(object, name, line),
            Place::Index(object, index) => get_index(object, index, line),
        }
    }

    fn write_place(&mut self, place: Place, value: Value, line: u32) -> ScriptResult<()> {
        match place {
            Place::Ident(name) => self.assign_ident(&name, value, line),
            Place::Member(object, name) => self.set_property(&object, &name, value, line),
            Place::Index(object, index) => match (&object, array_index(&index)) {
                (Value::Array(items), Some(i)) => {
                    self.check_array_len(i + 1, line)?;
                    let added = (i + 1).saturating_sub(items.borrow().len());
                    self.grow_heap(added * SLOT_BYTES + heap::inline_bytes(&value))?;
                    let mut items = items.borrow_mut();
                    if i >= items.len() {
                        items.resize(i + 1, Value::Undefined);
                    }
                    items[i] = value;
                    Ok(())
                }
                _ => self.set_property(&object, &property_key(&index), value, line),
            },
        }
    }

    fn set_property(
        &mut self,
        object: &Value,
        key: &str,
        value: Value,
        line: u32,
    ) -> ScriptResult<()> {
        match object {
            Value::Object(map) => {
                let (len, is_new) = {
                    let map = map.borrow();
                    (map.len(), !map.contains_key(key))
                };
                let mut bytes = heap::inline_bytes(&value);
                if is_new {
                    self.check_object_len(len + 1, line)?;
                    bytes += SLOT_BYTES + key.len();
                }
                self.grow_heap(bytes)?;
                map.borrow_mut().insert(key.to_string(), value);
                Ok(())
            }
            other => Err(ScriptError::runtime(
                line,
                format!("cannot set property `{key}` on {}", describe(other)),
            )),
        }
    }
}

fn is_stringy(value: &Value) -> bool {
    matches!(value, Value::Str(_) | Value::Array(_) | Value::Object(_))
}

fn compare(lhs: &Value, rhs: &Value, test: fn(std::cmp::Ordering) -> bool) -> bool {
    let ordering = match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => lhs.to_number().partial_cmp(&rhs.to_number()),
    };
    ordering.is_some_and(test)
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Undefined => "undefined",
        Value::Null => "null",
        other => other.type_name(),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn array_index(index: &Value) -> Option<usize> {
    let n = index.as_number()?;
    (n >= 0.0 && n.fract() == 0.0 && n < 4_294_967_295.0).then_some(n as usize)
}

#[allow(clippy::cast_precision_loss)]
fn get_member(object: &Value, name: &str, line: u32) -> ScriptResult<Value> {
    match object {
        Value::Undefined | Value::Null => Err(ScriptError::runtime(
            line,
            format!("cannot read property `{name}` of {}", describe(object)),
        )),
        Value::Object(map) => Ok(map.borrow().get(name).cloned().unwrap_or_default()),
        Value::Array(items) if name == "length" => Ok(Value::Number(items.borrow().len() as f64)),
        Value::Str(s) if name == "length" => Ok(Value::Number(s.chars().count() as f64)),
        _ => Ok(Value::Undefined),
    }
}

fn get_index(object: &Value, index: &Value, line: u32) -> ScriptResult<Value> {
    match (object, array_index(index)) {
        (Value::Array(items), Some(i)) => Ok(items.borrow().get(i).cloned().unwrap_or_default()),
        (Value::Str(s), Some(i)) => Ok(s
            .chars()
            .nth(i)
            .map_or(Value::Undefined, |c| Value::string(c.encode_utf8(&mut [0; 4])))),
        _ => get_member(object, &property_key(index), line),
    }
}

/// Property name for `object[index]`. Strings are used whole; anything else
/// is rendered.
fn property_key(index: &Value) -> String {
    match index {
        Value::Str(s) => s.to_string(),
        other => other.to_string(),
    }
}
