// Session lifecycle: one embedded Lua state plus the persistent `mesh` object.
use std::cell::Cell;
use std::path::Path;

use mlua::{Function, Lua, MultiValue, Table, Value};

use crate::core::error::{Error, ErrorKind};
use crate::core::marshal::{Decode, Method, Request, Response};
use crate::lib_paths::bootstrap_script_path;

const MESH_GLOBAL: &str = "mesh";

/// Where a session is within a single method invocation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
    Idle,
    ArgsPushed,
    Invoked,
}

/// A live interpreter with its bootstrap already run.
///
/// Every query goes through [`Session::invoke`], which takes `&mut self`, so a
/// session serves one invocation at a time and always returns to
/// [`Phase::Idle`] whether the call succeeded or not. `ArgsPushed` and
/// `Invoked` are only held inside `invoke`; callers always observe `Idle`.
pub struct Session {
    lua: Lua,
    mesh: Table,
    library_path: String,
    phase: Cell<Phase>,
}

impl Session {
    pub fn initialize(library_path: impl AsRef<Path>) -> Result<Self, Error> {
        let library_path = path_str(library_path.as_ref())?.to_string();
        // Mesh libraries expect every standard library, `debug` included.
        let lua = unsafe { Lua::unsafe_new() };

        let separator = package_separator(&lua)?;
        let script = bootstrap_script_path(&library_path, separator);
        tracing::debug!(script = %script, "loading mesh library bootstrap");

        if let Err(err) = run_bootstrap(&lua, &script, &library_path) {
            tracing::debug!(
                script = %script,
                error = %err.message().unwrap_or_default(),
                "failed to load Lua library"
            );
            return Err(err);
        }

        let mesh = match lua.globals().get::<Value>(MESH_GLOBAL) {
            Ok(Value::Table(table)) => table,
            Ok(other) => {
                return Err(Error::new(ErrorKind::Contract)
                    .with_message(format!(
                        "global `{MESH_GLOBAL}` is {}, expected table",
                        other.type_name()
                    ))
                    .with_path(&script)
                    .with_hint("The bootstrap script must define the global mesh table."));
            }
            Err(err) => {
                return Err(Error::new(ErrorKind::Internal)
                    .with_message("failed to read globals")
                    .with_source(err));
            }
        };

        tracing::info!(library = %library_path, "mesh library loaded");
        Ok(Self {
            lua,
            mesh,
            library_path,
            phase: Cell::new(Phase::Idle),
        })
    }

    pub fn close(self) {
        tracing::debug!(library = %self.library_path, "closing mesh library session");
        drop(self);
    }

    pub fn library_path(&self) -> &str {
        &self.library_path
    }

    pub fn phase(&self) -> Phase {
        self.phase.get()
    }

    /// Contract methods the bootstrap left undefined or defined as non-functions.
    pub fn missing_methods(&self) -> Vec<Method> {
        Method::ALL
            .into_iter()
            .filter(|method| {
                !matches!(
                    self.mesh.get::<Value>(method.name()),
                    Ok(Value::Function(_))
                )
            })
            .collect()
    }

    pub fn invoke<R: Decode>(&mut self, request: Request) -> Result<R, Error> {
        let method = request.method();
        let _in_flight = InFlight::begin(&self.phase);

        let function = self.method(method)?;
        let args = request.encode(&self.lua, &self.mesh)?;
        self.phase.set(Phase::ArgsPushed);
        tracing::debug!(method = method.name(), nargs = args.len(), "invoking mesh method");

        let returned = function.call::<MultiValue>(args);
        self.phase.set(Phase::Invoked);
        let returned = match returned {
            Ok(values) => values,
            Err(err) => {
                let message = err.to_string();
                tracing::debug!(method = method.name(), error = %message, "mesh method failed");
                return Err(Error::new(ErrorKind::Script)
                    .with_message(message)
                    .with_method(method.name())
                    .with_source(err));
            }
        };

        let mut response = Response::new(&self.lua, method, returned, R::ARITY);
        R::decode(&mut response)
    }

    fn method(&self, method: Method) -> Result<Function, Error> {
        match self.mesh.get::<Value>(method.name()) {
            Ok(Value::Function(function)) => Ok(function),
            Ok(other) => Err(Error::new(ErrorKind::Contract)
                .with_message(format!("mesh method is {}, expected function", other.type_name()))
                .with_method(method.name())
                .with_hint("The binding and the loaded mesh library versions do not match.")),
            Err(err) => Err(Error::new(ErrorKind::Script)
                .with_message(err.to_string())
                .with_method(method.name())
                .with_source(err)),
        }
    }
}

/// Resets the session to `Idle` on every exit path of an invocation.
struct InFlight<'a> {
    phase: &'a Cell<Phase>,
}

impl<'a> InFlight<'a> {
    fn begin(phase: &'a Cell<Phase>) -> Self {
        debug_assert_eq!(phase.get(), Phase::Idle);
        Self { phase }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.phase.set(Phase::Idle);
    }
}

fn package_separator(lua: &Lua) -> Result<char, Error> {
    let config = lua
        .globals()
        .get::<Table>("package")
        .and_then(|package| package.get::<String>("config"))
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("package.config is unavailable")
                .with_source(err)
        })?;
    config
        .chars()
        .next()
        .ok_or_else(|| Error::new(ErrorKind::Internal).with_message("package.config is empty"))
}

// Lua's own `loadfile` skips a UTF-8 BOM and a leading `#` line.
fn run_bootstrap(lua: &Lua, script: &str, library_path: &str) -> Result<(), Error> {
    let load_err = |err: mlua::Error| {
        Error::new(ErrorKind::Load)
            .with_message(err.to_string())
            .with_path(script)
            .with_source(err)
    };
    let loadfile: Function = lua.globals().get("loadfile").map_err(load_err)?;
    let (chunk, message) = loadfile
        .call::<(Option<Function>, Option<String>)>(script)
        .map_err(load_err)?;
    let Some(chunk) = chunk else {
        return Err(Error::new(ErrorKind::Load)
            .with_message(message.unwrap_or_else(|| format!("cannot load {script}")))
            .with_path(script));
    };
    chunk.call::<()>(library_path).map_err(load_err)
}

pub(crate) fn path_str(path: &Path) -> Result<&str, Error> {
    path.to_str().ok_or_else(|| {
        Error::new(ErrorKind::Usage)
            .with_message("path is not valid UTF-8")
            .with_path(path)
    })
}
