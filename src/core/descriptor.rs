use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::FlowValue;
use crate::core::error::BoxError;

/// Result produced by a bound callable.
pub type CallableResult = Result<FlowValue, BoxError>;

/// The invocation contract every callable satisfies, local or remote alike:
/// a positional argument slice in, one value out.
pub type BoundCallable = Box<dyn Fn(&[FlowValue]) -> CallableResult + Send + Sync>;

/// Semantic type tag for a parameter or output slot.
///
/// `Composite` carries its own declarative field list, which drives the
/// recursive map-to-struct coercion without any runtime type inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Any,
    String,
    Integer,
    Float,
    Boolean,
    List,
    Object,
    Composite(CompositeSchema),
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Any => write!(f, "any"),
            ValueType::String => write!(f, "string"),
            ValueType::Integer => write!(f, "integer"),
            ValueType::Float => write!(f, "float"),
            ValueType::Boolean => write!(f, "boolean"),
            ValueType::List => write!(f, "list"),
            ValueType::Object => write!(f, "object"),
            ValueType::Composite(schema) => write!(f, "composite '{}'", schema.name),
        }
    }
}

/// Declarative shape of a record-like target type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeSchema {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

impl CompositeSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add a field without a default; unmatched input leaves it at its zero value.
    pub fn field(mut self, name: impl Into<String>, ty: ValueType) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            ty,
            default: None,
        });
        self
    }

    /// Add a field with a declared default.
    pub fn field_with_default(
        mut self,
        name: impl Into<String>,
        ty: ValueType,
        default: FlowValue,
    ) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            ty,
            default: Some(default),
        });
        self
    }
}

/// One field of a [`CompositeSchema`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ValueType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<FlowValue>,
}

/// A validation constraint attached to one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Constraint {
    /// Minimum numeric value (inclusive).
    Min(f64),
    /// Maximum numeric value (inclusive).
    Max(f64),
    /// Minimum length for strings and lists.
    MinSize(usize),
    /// Maximum length for strings and lists.
    MaxSize(usize),
    /// Regular expression the full string value must match.
    Pattern(String),
    /// The string value must look like an email address.
    Email,
}

/// Typed, constrained description of one input or output slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ValueType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<FlowValue>,
    #[serde(default)]
    pub position: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<Constraint>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, ty: ValueType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
            default: None,
            position: 0,
            constraints: Vec::new(),
            description: String::new(),
        }
    }

    pub fn required(name: impl Into<String>, ty: ValueType) -> Self {
        let mut spec = Self::new(name, ty);
        spec.required = true;
        spec
    }

    pub fn with_default(mut self, default: FlowValue) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Registered metadata plus the bound callable for one invocable unit.
///
/// The descriptor exclusively owns its callable; the registry hands out
/// `Arc<FunctionDescriptor>` so concurrent runs share one binding.
pub struct FunctionDescriptor {
    pub id: String,
    pub description: String,
    /// Input slots, kept ordered by position.
    pub inputs: Vec<ParameterSpec>,
    pub output: ParameterSpec,
    pub is_async: bool,
    pub cacheable: bool,
    pub cache_ttl: Duration,
    pub timeout: Duration,
    callable: BoundCallable,
}

impl fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("id", &self.id)
            .field("inputs", &self.inputs)
            .field("output", &self.output)
            .field("is_async", &self.is_async)
            .field("cacheable", &self.cacheable)
            .finish_non_exhaustive()
    }
}

/// Default invocation deadline applied when none is declared.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

impl FunctionDescriptor {
    /// Creates a descriptor bound to `callable`, with chainable configuration.
    pub fn new<F>(id: impl Into<String>, callable: F) -> Self
    where
        F: Fn(&[FlowValue]) -> CallableResult + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            description: String::new(),
            inputs: Vec::new(),
            output: ParameterSpec::new("result", ValueType::Any),
            is_async: false,
            cacheable: false,
            cache_ttl: Duration::ZERO,
            timeout: DEFAULT_TIMEOUT,
            callable: Box::new(callable),
        }
    }

    /// Appends an input slot; its position is the current slot count.
    pub fn input(mut self, mut spec: ParameterSpec) -> Self {
        spec.position = self.inputs.len();
        self.inputs.push(spec);
        self
    }

    pub fn output(mut self, spec: ParameterSpec) -> Self {
        self.output = spec;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Permits async invocation with the given deadline.
    pub fn asynchronous(mut self, timeout: Duration) -> Self {
        self.is_async = true;
        self.timeout = timeout;
        self
    }

    /// Enables result caching with the given time-to-live.
    pub fn cacheable(mut self, ttl: Duration) -> Self {
        self.cacheable = true;
        self.cache_ttl = ttl;
        self
    }

    /// Invokes the bound callable with already-coerced positional arguments.
    pub fn call(&self, args: &[FlowValue]) -> CallableResult {
        (self.callable)(args)
    }
}
