//! Request-time module resolution.
//!
//! # Resolution Order
//! ```text
//! load module (cached per version)
//!     → `handle` defined?              invoke, send return value
//!     → GET and `get` defined?         invoke, send return value
//!     → otherwise                      send exported variables as JSON
//! any load/invoke failure              → {"message": "..."}
//! ```

use std::collections::{BTreeMap, HashMap};

use rhai::{Dynamic, EvalAltResult, Module, Scope};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::dispatch::modules::{LoadError, LoadedModule, ModuleCache};
use crate::routing::Params;
use crate::table::RouteEntry;

/// Default handler, invoked for every method.
pub const DEFAULT_HANDLER: &str = "handle";

/// Handler invoked for GET when no default handler exists.
pub const GET_HANDLER: &str = "get";

/// Errors while serving one request.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("{0}")]
    Script(String),

    #[error("cannot convert value: {0}")]
    Convert(String),
}

impl DispatchError {
    fn script(err: Box<EvalAltResult>) -> Self {
        Self::Script(script_message(&err))
    }

    fn convert(err: Box<EvalAltResult>) -> Self {
        Self::Convert(err.to_string())
    }
}

/// The request as seen by a handler script.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScriptRequest {
    pub method: String,
    pub path: String,
    pub params: Params,
    pub query: HashMap<String, String>,
    /// Lower-case header names.
    pub headers: BTreeMap<String, String>,
    pub body: String,
    /// Parsed body, when it is JSON.
    pub json: Option<Value>,
}

impl ScriptRequest {
    fn to_dynamic(&self) -> Result<Dynamic, DispatchError> {
        rhai::serde::to_dynamic(self).map_err(DispatchError::convert)
    }
}

/// What to send back to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutput {
    Text(String),
    Json(Value),
    Empty,
}

impl HandlerOutput {
    /// Body sent for a failed load or invocation.
    pub fn failure(message: impl Into<String>) -> Self {
        HandlerOutput::Json(json!({ "message": message.into() }))
    }
}

/// Resolve and run the module behind `entry`. Never fails: errors become a message body.
///
/// Blocking: run on the blocking pool.
pub fn resolve(modules: &ModuleCache, entry: &RouteEntry, request: &ScriptRequest) -> HandlerOutput {
    match try_resolve(modules, entry, request) {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!(
                module = %entry.path,
                version = %entry.version,
                error = %e,
                "Handler failed"
            );
            HandlerOutput::failure(e.to_string())
        }
    }
}

fn try_resolve(
    modules: &ModuleCache,
    entry: &RouteEntry,
    request: &ScriptRequest,
) -> Result<HandlerOutput, DispatchError> {
    let module = modules.load(entry)?;
    let engine = modules.engine();

    if let Some(arity) = module.arity(DEFAULT_HANDLER) {
        return invoke(engine, &module, DEFAULT_HANDLER, arity, request);
    }

    if request.method == "GET" {
        if let Some(arity) = module.arity(GET_HANDLER) {
            return invoke(engine, &module, GET_HANDLER, arity, request);
        }
    }

    exports(engine, &module)
}

fn invoke(
    engine: &rhai::Engine,
    module: &LoadedModule,
    name: &str,
    arity: usize,
    request: &ScriptRequest,
) -> Result<HandlerOutput, DispatchError> {
    // Request first, any further parameters get ()
    let mut args: Vec<Dynamic> = Vec::with_capacity(arity);
    if arity > 0 {
        args.push(request.to_dynamic()?);
        args.resize(arity, Dynamic::UNIT);
    }

    let mut scope = Scope::new();
    let value: Dynamic = engine
        .call_fn(&mut scope, module.ast(), name, args)
        .map_err(DispatchError::script)?;

    to_output(value)
}

/// Exported variables of the module, functions omitted.
fn exports(engine: &rhai::Engine, module: &LoadedModule) -> Result<HandlerOutput, DispatchError> {
    let exported = Module::eval_ast_as_new(Scope::new(), module.ast(), engine)
        .map_err(DispatchError::script)?;

    let mut object = serde_json::Map::new();
    for (name, value) in exported.iter_var() {
        let value: Value = rhai::serde::from_dynamic(value).map_err(DispatchError::convert)?;
        object.insert(name.to_string(), value);
    }
    Ok(HandlerOutput::Json(Value::Object(object)))
}

fn to_output(value: Dynamic) -> Result<HandlerOutput, DispatchError> {
    if value.is_unit() {
        return Ok(HandlerOutput::Empty);
    }
    if value.is_string() {
        return value
            .into_string()
            .map(HandlerOutput::Text)
            .map_err(|ty| DispatchError::Convert(format!("expected string, found {ty}")));
    }

    let json: Value = rhai::serde::from_dynamic(&value).map_err(DispatchError::convert)?;
    Ok(HandlerOutput::Json(json))
}

/// The thrown value for `throw`, otherwise the engine's description.
fn script_message(err: &EvalAltResult) -> String {
    match err {
        EvalAltResult::ErrorRuntime(value, _) => value.to_string(),
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => script_message(inner),
        other => other.to_string(),
    }
}
