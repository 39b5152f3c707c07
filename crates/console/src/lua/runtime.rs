//! Lua session for the console.
//!
//! # Architecture Notes
//!
//! Each console session owns one `mlua::Lua` state. The state never touches
//! the host directly: output goes to the session's [`Capture`], input comes
//! from the shared [`StdinSlot`], and the host singletons are read-only
//! userdata bound as `C` (context) and `D` (document).
//!
//! Input is evaluated expression-first: `return <src>` is tried before
//! `<src>`, so typing `1 + 1` shows `2`. Whether a failed compile means
//! "needs more lines" comes from the parser's own incomplete-input flag.

use mlua::{Function, HookTriggers, Lua, MultiValue, Result as LuaResult, Table, Value, VmState};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use conbridge_config::ConsoleSettings;

use super::host_object::{as_host_object, host_value_to_lua};
use crate::capture::Capture;
use crate::error::{EvalError, EvalErrorKind};
use crate::host::HostValue;
use crate::interpreter::{Evaluated, Interpreter, InterpreterFactory, SessionSeed};
use crate::stdin::StdinSlot;

/// How often to check the instruction budget (every N instructions).
pub const INSTRUCTION_HOOK_INTERVAL: u32 = 10_000;

/// Chunk name used in error positions ("console:1: ...").
const CHUNK_NAME: &str = "=console";

const HELP_TEXT: &str = "\
Lua console help
  C              current context (read-only)
  D              current document (read-only)
  help(value)    describe a value, its fields or attributes
  io.write(...)  write without a newline
  print(...)     write a line
Tab completion works on globals, table fields and host attributes.
";

/// Per-evaluation limits.
#[derive(Debug, Clone, Copy)]
pub struct LuaLimits {
    /// Maximum number of Lua instructions per evaluation.
    pub instruction_limit: i64,
    /// Wall-clock limit per evaluation.
    /// Catches pathological code that burns instructions slowly.
    pub timeout: Duration,
    /// Remove os, package, require, loadfile, dofile, load and debug.
    pub sandbox: bool,
}

impl Default for LuaLimits {
    fn default() -> Self {
        Self::from_settings(&ConsoleSettings::default())
    }
}

impl LuaLimits {
    pub fn from_settings(settings: &ConsoleSettings) -> Self {
        Self {
            instruction_limit: settings.instruction_limit,
            timeout: Duration::from_secs(settings.timeout_secs),
            sandbox: settings.sandbox,
        }
    }
}

/// Creates a [`LuaInterpreter`] for every new session.
#[derive(Debug, Clone, Copy, Default)]
pub struct LuaFactory {
    limits: LuaLimits,
}

impl LuaFactory {
    pub fn new(limits: LuaLimits) -> Self {
        Self { limits }
    }
}

impl InterpreterFactory for LuaFactory {
    fn create(&self, seed: SessionSeed) -> Result<Box<dyn Interpreter>, EvalError> {
        let interpreter = LuaInterpreter::new(seed, self.limits).map_err(|e| classify(&e))?;
        Ok(Box::new(interpreter))
    }
}

/// One console session's Lua state.
pub struct LuaInterpreter {
    lua: Lua,
    limits: LuaLimits,
}

impl LuaInterpreter {
    /// Create a Lua state wired to the session's capture, stdin and host objects.
    pub fn new(seed: SessionSeed, limits: LuaLimits) -> LuaResult<Self> {
        let lua = Lua::new();
        let globals = lua.globals();

        // print() writes a line to the stdout capture
        {
            let capture = seed.capture.clone();
            let print_fn = lua.create_function(move |lua, args: MultiValue| {
                let parts: Vec<String> = args.iter().map(|v| display_value(lua, v)).collect();
                capture.write_stdout(&format!("{}\n", parts.join("\t")));
                Ok(())
            })?;
            globals.set("print", print_fn)?;
        }

        // warn() goes to the stderr capture; "@on"/"@off" control messages are ignored
        {
            let capture = seed.capture.clone();
            let warn_fn = lua.create_function(move |lua, args: MultiValue| {
                let message: String = args.iter().map(|v| display_value(lua, v)).collect();
                if args.len() == 1 && message.starts_with('@') {
                    return Ok(());
                }
                capture.write_stderr(&format!("Lua warning: {}\n", message));
                Ok(())
            })?;
            globals.set("warn", warn_fn)?;
        }

        // Sandbox: remove dangerous globals
        // We keep: basic, string, table, math, utf8, coroutine
        if limits.sandbox {
            for name in ["os", "debug", "package", "require", "loadfile", "dofile", "load"] {
                globals.set(name, Value::Nil)?;
            }
        }

        // io only offers read() and write(), wired to the console
        globals.set("io", create_io_table(&lua, &seed.capture, &seed.stdin)?)?;

        // Host singletons
        let context = seed.context.map(HostValue::Object).unwrap_or(HostValue::Nil);
        globals.set("C", host_value_to_lua(&lua, context)?)?;
        let document = seed.document.map(HostValue::Object).unwrap_or(HostValue::Nil);
        globals.set("D", host_value_to_lua(&lua, document)?)?;

        // help() writes to the stdout capture
        {
            let capture = seed.capture.clone();
            let help_fn = lua.create_function(move |lua, value: Option<Value>| {
                let text = match value {
                    None => HELP_TEXT.to_string(),
                    Some(value) => describe(lua, &value)?,
                };
                capture.write_stdout(&text);
                Ok(())
            })?;
            globals.set("help", help_fn)?;
        }

        Ok(Self { lua, limits })
    }

    /// Compile `source`, trying `return <source>` first.
    fn compile(&self, source: &str) -> Result<Function, EvalError> {
        let as_expr = format!("return {}", source);
        let expr_error = match self.lua.load(as_expr.as_str()).set_name(CHUNK_NAME).into_function() {
            Ok(func) => return Ok(func),
            Err(e) => e,
        };

        match self.lua.load(source).set_name(CHUNK_NAME).into_function() {
            Ok(func) => Ok(func),
            // Either form running out of input means the user is mid-statement
            Err(e) if is_incomplete(&e) || is_incomplete(&expr_error) => {
                Err(EvalError::incomplete(format_lua_error(&e)))
            }
            Err(e) => Err(classify(&e)),
        }
    }
}

impl Interpreter for LuaInterpreter {
    fn eval(&mut self, source: &str) -> Result<Evaluated, EvalError> {
        if source.trim().is_empty() {
            return Ok(Evaluated::Empty);
        }

        let func = self.compile(source)?;

        // Rendering may run __tostring metamethods, so it stays under the limits too
        let guard = LimitGuard::new(&self.lua, self.limits);
        let result = func
            .call::<MultiValue>(())
            .map(|values| render_values(&self.lua, &values));
        let tripped = guard.tripped();
        drop(guard);

        if let Some(message) = tripped {
            return Err(EvalError::new(EvalErrorKind::Limit, message));
        }
        result.map_err(|e| classify(&e))
    }

    fn members(&mut self, path: &[String]) -> Result<Vec<String>, EvalError> {
        let mut current = Value::Table(self.lua.globals());
        for segment in path {
            current = match index_value(&self.lua, &current, segment).map_err(|e| classify(&e))? {
                Some(value) => value,
                None => return Ok(Vec::new()),
            };
        }
        names_of(&self.lua, &current).map_err(|e| classify(&e))
    }

    fn banner(&self) -> String {
        let version = self
            .lua
            .globals()
            .get::<String>("_VERSION")
            .unwrap_or_else(|_| "Lua".to_string());
        format!(
            "{} console\nC = context, D = document. Type help() for help.",
            version
        )
    }
}

/// Installs an instruction/timeout hook for the lifetime of the guard.
struct LimitGuard<'a> {
    lua: &'a Lua,
    limits: LuaLimits,
    budget: Arc<AtomicI64>,
    timed_out: Arc<AtomicBool>,
}

impl<'a> LimitGuard<'a> {
    fn new(lua: &'a Lua, limits: LuaLimits) -> Self {
        let start = Instant::now();
        let budget = Arc::new(AtomicI64::new(limits.instruction_limit));
        let budget_clone = budget.clone();
        let timed_out = Arc::new(AtomicBool::new(false));
        let timed_out_clone = timed_out.clone();

        lua.set_hook(
            HookTriggers::new().every_nth_instruction(INSTRUCTION_HOOK_INTERVAL),
            move |_lua, _debug| {
                // Check wall-clock timeout
                if start.elapsed() > limits.timeout {
                    timed_out_clone.store(true, Ordering::Relaxed);
                    return Err(mlua::Error::RuntimeError(format!(
                        "execution timeout ({}s limit)",
                        limits.timeout.as_secs()
                    )));
                }

                // Check instruction budget
                let remaining = budget_clone
                    .fetch_sub(INSTRUCTION_HOOK_INTERVAL as i64, Ordering::Relaxed);
                if remaining <= 0 {
                    Err(mlua::Error::RuntimeError(format!(
                        "instruction limit exceeded ({} instructions)",
                        limits.instruction_limit
                    )))
                } else {
                    Ok(VmState::Continue)
                }
            },
        );

        Self {
            lua,
            limits,
            budget,
            timed_out,
        }
    }

    /// Message for the limit that stopped execution, if one did.
    fn tripped(&self) -> Option<String> {
        if self.timed_out.load(Ordering::Relaxed) {
            Some(format!(
                "execution timeout ({}s limit)",
                self.limits.timeout.as_secs()
            ))
        } else if self.budget.load(Ordering::Relaxed) <= 0 {
            Some(format!(
                "instruction limit exceeded ({} instructions)",
                self.limits.instruction_limit
            ))
        } else {
            None
        }
    }
}

impl Drop for LimitGuard<'_> {
    fn drop(&mut self) {
        self.lua.remove_hook();
    }
}

fn create_io_table(lua: &Lua, capture: &Capture, stdin: &StdinSlot) -> LuaResult<Table> {
    let io = lua.create_table()?;

    let capture = capture.clone();
    let write_fn = lua.create_function(move |lua, args: MultiValue| {
        let mut text = String::new();
        for (i, value) in args.iter().enumerate() {
            match value {
                Value::String(_) | Value::Integer(_) | Value::Number(_) => {
                    text.push_str(&display_value(lua, value))
                }
                other => {
                    return Err(mlua::Error::RuntimeError(format!(
                        "bad argument #{} to 'write' (string expected, got {})",
                        i + 1,
                        other.type_name()
                    )))
                }
            }
        }
        capture.write_stdout(&text);
        Ok(())
    })?;
    io.set("write", write_fn)?;

    let stdin = stdin.clone();
    let read_fn = lua.create_function(move |_, _format: MultiValue| {
        stdin.read_line().map_err(mlua::Error::external)
    })?;
    io.set("read", read_fn)?;

    Ok(io)
}

/// Repr hook: turn returned values into an [`Evaluated`].
fn render_values(lua: &Lua, values: &MultiValue) -> Evaluated {
    match values.len() {
        0 => Evaluated::Empty,
        1 if matches!(values.iter().next(), Some(Value::Nil)) => Evaluated::Nothing,
        _ => {
            let parts: Vec<String> = values.iter().map(|v| display_value(lua, v)).collect();
            Evaluated::Value(parts.join(", "))
        }
    }
}

/// Convert a Lua value to a display string.
fn display_value(lua: &Lua, value: &Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Number(n) => {
            // Format nicely: no trailing zeros for integers
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{:.0}", n)
            } else {
                format!("{}", n)
            }
        }
        Value::String(s) => s
            .to_str()
            .map(|s| s.to_string())
            .unwrap_or_else(|_| "<invalid utf8>".to_string()),
        // Tables and userdata may carry __tostring
        other => lua
            .globals()
            .get::<Function>("tostring")
            .and_then(|tostring| tostring.call::<String>(other.clone()))
            .unwrap_or_else(|_| other.type_name().to_string()),
    }
}

/// Text printed by `help(value)`.
fn describe(lua: &Lua, value: &Value) -> LuaResult<String> {
    if let Some(object) = as_host_object(value) {
        let mut names = object.attribute_names();
        names.sort();
        return Ok(format!(
            "<{}> host object\nattributes: {}\n",
            object.type_name(),
            names.join(", ")
        ));
    }
    match value {
        Value::Table(_) => {
            let mut names = names_of(lua, value)?;
            names.sort();
            Ok(format!("table\nfields: {}\n", names.join(", ")))
        }
        Value::Function(_) => Ok("function\n".to_string()),
        other => Ok(format!("{}: {}\n", other.type_name(), display_value(lua, other))),
    }
}

/// Look up one path segment without running user metamethods on tables.
fn index_value(lua: &Lua, value: &Value, key: &str) -> LuaResult<Option<Value>> {
    if let Some(object) = as_host_object(value) {
        return match object.attribute(key) {
            Some(attr) => host_value_to_lua(lua, attr).map(Some),
            None => Ok(None),
        };
    }
    match value {
        Value::Table(table) => match table.raw_get::<Value>(key)? {
            Value::Nil => Ok(None),
            found => Ok(Some(found)),
        },
        _ => Ok(None),
    }
}

/// Completion candidates under a value.
fn names_of(lua: &Lua, value: &Value) -> LuaResult<Vec<String>> {
    if let Some(object) = as_host_object(value) {
        return Ok(object.attribute_names());
    }
    match value {
        Value::Table(table) => string_keys(table),
        // Method calls on strings resolve through the string library
        Value::String(_) => match lua.globals().raw_get::<Value>("string")? {
            Value::Table(table) => string_keys(&table),
            _ => Ok(Vec::new()),
        },
        _ => Ok(Vec::new()),
    }
}

fn string_keys(table: &Table) -> LuaResult<Vec<String>> {
    let mut names = Vec::new();
    for pair in table.clone().pairs::<Value, Value>() {
        let (key, _) = pair?;
        if let Value::String(s) = key {
            if let Ok(name) = s.to_str() {
                names.push(name.to_string());
            }
        }
    }
    Ok(names)
}

fn is_incomplete(error: &mlua::Error) -> bool {
    matches!(
        error,
        mlua::Error::SyntaxError {
            incomplete_input: true,
            ..
        }
    )
}

/// Map an mlua error to the console's error kinds.
fn classify(error: &mlua::Error) -> EvalError {
    let kind = match error {
        mlua::Error::SyntaxError {
            incomplete_input: true,
            ..
        } => EvalErrorKind::Incomplete,
        mlua::Error::SyntaxError { .. } => EvalErrorKind::Syntax,
        mlua::Error::MemoryError(_) => EvalErrorKind::Memory,
        mlua::Error::CallbackError { cause, .. } => {
            return EvalError::new(classify(cause).kind, format_lua_error(error))
        }
        mlua::Error::RuntimeError(_)
        | mlua::Error::ExternalError(_)
        | mlua::Error::FromLuaConversionError { .. }
        | mlua::Error::ToLuaConversionError { .. } => EvalErrorKind::Runtime,
        _ => EvalErrorKind::Internal,
    };
    EvalError::new(kind, format_lua_error(error))
}

/// Format a Lua error for display, without the stack traceback.
fn format_lua_error(error: &mlua::Error) -> String {
    let message = match error {
        mlua::Error::SyntaxError { message, .. } => message.clone(),
        mlua::Error::RuntimeError(msg) => msg.clone(),
        mlua::Error::CallbackError { cause, .. } => return format_lua_error(cause),
        _ => error.to_string(),
    };
    match message.find("\nstack traceback:") {
        Some(idx) => message[..idx].to_string(),
        None => message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostObject, StaticObject};
    use crate::stdin::ScriptedInput;

    fn session() -> (LuaInterpreter, Capture, StdinSlot) {
        let capture = Capture::new(100);
        let stdin = StdinSlot::with_source(Box::new(ScriptedInput::new(["typed"])));
        let document = StaticObject::new("Document")
            .with("name", HostValue::String("scene".to_string()))
            .with("frames", HostValue::Integer(250))
            .into_handle();
        let seed = SessionSeed {
            capture: capture.clone(),
            stdin: stdin.clone(),
            context: None,
            document: Some(document),
        };
        let rt = LuaInterpreter::new(seed, LuaLimits::default()).unwrap();
        (rt, capture, stdin)
    }

    #[test]
    fn test_basic_expression() {
        let (mut rt, _, _) = session();
        assert_eq!(rt.eval("1 + 1"), Ok(Evaluated::Value("2".to_string())));
    }

    #[test]
    fn test_string_expression() {
        let (mut rt, _, _) = session();
        assert_eq!(
            rt.eval("'hello' .. ' ' .. 'world'"),
            Ok(Evaluated::Value("hello world".to_string()))
        );
    }

    #[test]
    fn test_nil_is_nothing() {
        let (mut rt, _, _) = session();
        assert_eq!(rt.eval("nil"), Ok(Evaluated::Nothing));
        assert_eq!(rt.eval("undefined_name"), Ok(Evaluated::Nothing));
    }

    #[test]
    fn test_statement_is_empty() {
        let (mut rt, _, _) = session();
        assert_eq!(rt.eval("local x = 42"), Ok(Evaluated::Empty));
        assert_eq!(rt.eval("   "), Ok(Evaluated::Empty));
    }

    #[test]
    fn test_globals_persist() {
        let (mut rt, _, _) = session();
        rt.eval("x = 20").unwrap();
        assert_eq!(rt.eval("x * 2"), Ok(Evaluated::Value("40".to_string())));
    }

    #[test]
    fn test_print_capture() {
        let (mut rt, capture, _) = session();
        assert_eq!(rt.eval("print('hello', 'world')"), Ok(Evaluated::Empty));
        assert_eq!(capture.take().stdout, "hello\tworld\n");
    }

    #[test]
    fn test_for_loop() {
        let (mut rt, capture, _) = session();
        rt.eval("for i = 1, 3 do print(i) end").unwrap();
        assert_eq!(capture.take().stdout, "1\n2\n3\n");
    }

    #[test]
    fn test_io_write_and_warn() {
        let (mut rt, capture, _) = session();
        rt.eval("io.write('a', 1, '\\n')").unwrap();
        rt.eval("warn('careful')").unwrap();
        let captured = capture.take();
        assert_eq!(captured.stdout, "a1\n");
        assert_eq!(captured.stderr, "Lua warning: careful\n");
    }

    #[test]
    fn test_incomplete_function() {
        let (mut rt, _, _) = session();
        let err = rt.eval("function f(").unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::Incomplete);
        assert!(rt.eval("function f(\n1 end").is_err());
        assert!(rt.eval("function f()\nreturn 1 end").is_ok());
    }

    #[test]
    fn test_incomplete_block_and_table() {
        let (mut rt, _, _) = session();
        assert!(rt.eval("for i = 1, 2 do").unwrap_err().is_incomplete());
        assert!(rt.eval("t = {").unwrap_err().is_incomplete());
    }

    #[test]
    fn test_syntax_error() {
        let (mut rt, _, _) = session();
        let err = rt.eval("if then").unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::Syntax);
        assert!(!err.message.is_empty());
    }

    #[test]
    fn test_runtime_error() {
        let (mut rt, _, _) = session();
        let err = rt.eval("error('oops')").unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::Runtime);
        assert!(err.message.contains("oops"));
        assert!(!err.message.contains("stack traceback"));
    }

    #[test]
    fn test_sandbox() {
        let (mut rt, _, _) = session();
        assert!(rt.eval("os.execute('ls')").is_err());
        assert!(rt.eval("io.open('/etc/passwd')").is_err());
        assert!(rt.eval("require('os')").is_err());
        assert!(rt.eval("load('return 1')()").is_err());
    }

    #[test]
    fn test_io_read_uses_slot() {
        let (mut rt, _, stdin) = session();
        assert_eq!(rt.eval("io.read()"), Ok(Evaluated::Value("typed".to_string())));

        let _guard = stdin.suppress();
        let err = rt.eval("io.read()").unwrap_err();
        assert!(err.message.contains("not available"));
    }

    #[test]
    fn test_instruction_limit() {
        let capture = Capture::new(10);
        let seed = SessionSeed {
            capture,
            stdin: StdinSlot::new(),
            context: None,
            document: None,
        };
        let limits = LuaLimits {
            instruction_limit: 100_000,
            ..LuaLimits::default()
        };
        let mut rt = LuaInterpreter::new(seed, limits).unwrap();
        let err = rt.eval("while true do end").unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::Limit);
        assert!(err.message.contains("instruction limit"));

        // The hook is gone afterwards
        assert_eq!(rt.eval("1"), Ok(Evaluated::Value("1".to_string())));
    }

    #[test]
    fn test_tostring_metamethod_runs_under_limits() {
        let seed = SessionSeed {
            capture: Capture::new(10),
            stdin: StdinSlot::new(),
            context: None,
            document: None,
        };
        let limits = LuaLimits {
            instruction_limit: 100_000,
            timeout: Duration::from_secs(1),
            sandbox: true,
        };
        let mut rt = LuaInterpreter::new(seed, limits).unwrap();

        let err = rt
            .eval("setmetatable({}, {__tostring = function() while true do end end})")
            .unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::Limit);

        rt.eval("print(setmetatable({}, {__tostring = function() while true do end end}))")
            .unwrap_err();
        assert_eq!(rt.eval("1"), Ok(Evaluated::Value("1".to_string())));
    }

    #[test]
    fn test_host_object_attributes() {
        let (mut rt, _, _) = session();
        assert_eq!(rt.eval("D.name"), Ok(Evaluated::Value("scene".to_string())));
        assert_eq!(rt.eval("D.frames + 1"), Ok(Evaluated::Value("251".to_string())));
        assert_eq!(rt.eval("tostring(D)"), Ok(Evaluated::Value("<Document>".to_string())));
        assert_eq!(rt.eval("C"), Ok(Evaluated::Nothing));
        assert!(rt.eval("D.name = 'x'").is_err());
    }

    #[test]
    fn test_help_describes_host_object() {
        let (mut rt, capture, _) = session();
        rt.eval("help(D)").unwrap();
        assert_eq!(
            capture.take().stdout,
            "<Document> host object\nattributes: frames, name\n"
        );
        rt.eval("help()").unwrap();
        assert!(capture.take().stdout.starts_with("Lua console help"));
    }

    #[test]
    fn test_members() {
        let (mut rt, _, _) = session();
        rt.eval("t = { alpha = 1, beta = 2, [3] = 'x' }").unwrap();

        let mut names = rt.members(&["t".to_string()]).unwrap();
        names.sort();
        assert_eq!(names, vec!["alpha", "beta"]);

        let globals = rt.members(&[]).unwrap();
        assert!(globals.contains(&"print".to_string()));
        assert!(globals.contains(&"D".to_string()));

        let attrs = rt.members(&["D".to_string()]).unwrap();
        let document = StaticObject::new("Document")
            .with("name", HostValue::Nil)
            .with("frames", HostValue::Nil);
        assert_eq!(attrs, document.attribute_names());

        assert!(rt.members(&["missing".to_string()]).unwrap().is_empty());
    }

    #[test]
    fn test_banner_names_version() {
        let (rt, _, _) = session();
        assert!(rt.banner().starts_with("Lua 5.4 console"));
    }
}
