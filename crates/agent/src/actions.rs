//! Action registry
//!
//! Static mapping from action name to parameter schema and handler. Built
//! once at startup, read-only afterwards.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use triage_provider::{object_schema, SchemaProperty, Tool};

/// Arguments passed to a handler, keyed by parameter name
pub type ActionArgs = Map<String, Value>;

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Business action supplied by the surrounding application
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn invoke(&self, args: &ActionArgs) -> Result<(), HandlerError>;
}

/// Adapter for plain closures
struct FnHandler<F>(F);

#[async_trait]
impl<F> ActionHandler for FnHandler<F>
where
    F: Fn(&ActionArgs) -> Result<(), HandlerError> + Send + Sync,
{
    async fn invoke(&self, args: &ActionArgs) -> Result<(), HandlerError> {
        (self.0)(args)
    }
}

/// Accepted argument shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    String,
    Integer,
}

impl ParamKind {
    pub fn json_type(&self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
        }
    }

    /// Coerce a supplied value, or `None` when it does not fit
    pub fn accepts(&self, value: &Value) -> Option<Value> {
        match (self, value) {
            (ParamKind::String, Value::String(_)) => Some(value.clone()),
            (ParamKind::String, Value::Number(n)) => Some(Value::String(n.to_string())),
            (ParamKind::String, Value::Bool(b)) => Some(Value::String(b.to_string())),
            (ParamKind::Integer, Value::Number(n)) => {
                if n.is_i64() || n.is_u64() {
                    Some(value.clone())
                } else {
                    // 2^63 is exactly representable; anything at or past it would saturate
                    n.as_f64()
                        .filter(|f| f.is_finite() && f.fract() == 0.0)
                        .filter(|f| *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                        .map(|f| Value::from(f as i64))
                }
            }
            (ParamKind::Integer, Value::String(s)) => {
                s.trim().parse::<i64>().ok().map(Value::from)
            }
            _ => None,
        }
    }
}

/// One declared parameter
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub description: String,
}

/// Argument problems found during validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgErrors {
    pub missing: Vec<String>,
    pub mismatched: Vec<String>,
    pub unexpected: Vec<String>,
}

impl ArgErrors {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.mismatched.is_empty() && self.unexpected.is_empty()
    }
}

impl fmt::Display for ArgErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing {}", self.missing.join(", ")));
        }
        if !self.mismatched.is_empty() {
            parts.push(format!("mismatched {}", self.mismatched.join(", ")));
        }
        if !self.unexpected.is_empty() {
            parts.push(format!("unexpected {}", self.unexpected.join(", ")));
        }
        write!(f, "{}", parts.join("; "))
    }
}

/// Descriptor of an invocable action
#[derive(Clone)]
pub struct ActionSpec {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
    handler: Arc<dyn ActionHandler>,
}

impl fmt::Debug for ActionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionSpec")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

impl ActionSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: Arc<dyn ActionHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
            handler,
        }
    }

    pub fn from_fn<F>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        F: Fn(&ActionArgs) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        Self::new(name, description, Arc::new(FnHandler(f)))
    }

    /// Declare a required parameter
    pub fn param(
        mut self,
        name: impl Into<String>,
        kind: ParamKind,
        description: impl Into<String>,
    ) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            kind,
            description: description.into(),
        });
        self
    }

    pub fn required_params(&self) -> Vec<&str> {
        self.params.iter().map(|p| p.name.as_str()).collect()
    }

    /// e.g. `notify_legal(case_id)`
    pub fn signature(&self) -> String {
        format!("{}({})", self.name, self.required_params().join(", "))
    }

    pub fn to_tool(&self) -> Tool {
        let properties = self
            .params
            .iter()
            .map(|p| SchemaProperty::new(&p.name, p.kind.json_type(), &p.description, true))
            .collect();
        Tool::new(&self.name, &self.description, object_schema(properties))
    }

    /// Check arguments against the declared parameters, returning coerced values
    pub fn validate(&self, args: &ActionArgs) -> Result<ActionArgs, ArgErrors> {
        let mut errors = ArgErrors::default();
        let mut coerced = ActionArgs::new();

        for param in &self.params {
            match args.get(&param.name) {
                None | Some(Value::Null) => errors.missing.push(param.name.clone()),
                Some(value) => match param.kind.accepts(value) {
                    Some(v) => {
                        coerced.insert(param.name.clone(), v);
                    }
                    None => errors.mismatched.push(param.name.clone()),
                },
            }
        }

        for key in args.keys() {
            if !self.params.iter().any(|p| &p.name == key) {
                errors.unexpected.push(key.clone());
            }
        }

        if errors.is_empty() {
            Ok(coerced)
        } else {
            Err(errors)
        }
    }

    pub async fn invoke(&self, args: &ActionArgs) -> Result<(), HandlerError> {
        self.handler.invoke(args).await
    }
}

/// Resolved action name plus arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCall {
    pub name: String,
    pub args: ActionArgs,
}

impl ActionCall {
    pub fn new(name: impl Into<String>, args: ActionArgs) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Typed registry lookup result
#[derive(Debug)]
pub enum Lookup<'a> {
    Ready {
        spec: &'a ActionSpec,
        args: ActionArgs,
    },
    InvalidArgs {
        spec: &'a ActionSpec,
        errors: ArgErrors,
    },
    NotFound,
}

/// Action registry
pub struct ActionRegistry {
    specs: Vec<ActionSpec>,
    index: HashMap<String, usize>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            specs: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register an action. A second registration under the same name replaces the first.
    pub fn register(&mut self, spec: ActionSpec) {
        debug!("registering action {}", spec.signature());
        match self.index.get(&spec.name) {
            Some(&i) => self.specs[i] = spec,
            None => {
                self.index.insert(spec.name.clone(), self.specs.len());
                self.specs.push(spec);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ActionSpec> {
        self.index.get(name).map(|&i| &self.specs[i])
    }

    pub fn has(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Names in registration order
    pub fn names(&self) -> Vec<String> {
        self.specs.iter().map(|s| s.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Tool definitions for the function-selection backend
    pub fn definitions(&self) -> Vec<Tool> {
        self.specs.iter().map(|s| s.to_tool()).collect()
    }

    /// Signatures for the planner prompt
    pub fn vocabulary(&self) -> Vec<String> {
        self.specs.iter().map(|s| s.signature()).collect()
    }

    pub fn lookup(&self, call: &ActionCall) -> Lookup<'_> {
        let Some(spec) = self.get(&call.name) else {
            return Lookup::NotFound;
        };

        match spec.validate(&call.args) {
            Ok(args) => Lookup::Ready { spec, args },
            Err(errors) => Lookup::InvalidArgs { spec, errors },
        }
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
