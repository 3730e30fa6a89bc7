//! Constructor signatures and argument binding.

use std::fmt;

use indexmap::IndexMap;

use crate::error::SignatureError;
use crate::types::{json_type_name, Value};

/// One constructor parameter. Every parameter is accepted either
/// positionally or by keyword.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    default: Option<Value>,
}

impl Parameter {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
        }
    }

    /// A parameter that defaults to the unset sentinel when omitted.
    pub fn defaulted(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: Some(Value::Null),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// Ordered parameter list of a record constructor.
///
/// Required parameters always precede defaulted ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature {
    parameters: Vec<Parameter>,
}

impl Signature {
    /// Build a signature from required names followed by defaulted names.
    pub fn new<R, D>(required: R, defaulted: D) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        let parameters = required
            .into_iter()
            .map(Parameter::required)
            .chain(defaulted.into_iter().map(Parameter::defaulted))
            .collect();
        Self { parameters }
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Map call-site arguments onto the parameters.
    ///
    /// Positionals fill parameters in order; keywords fill the rest by name.
    /// Omitted defaulted parameters stay unbound until
    /// [`BoundArguments::apply_defaults`].
    ///
    /// # Errors
    ///
    /// Returns `SignatureError` for a repeated keyword, too many positionals,
    /// a keyword naming an already-bound positional, a missing required
    /// argument, or an unknown keyword, checked in that order.
    pub fn bind(&self, args: Args) -> Result<BoundArguments<'_>, SignatureError> {
        let Args {
            positional,
            keywords,
        } = args;

        let mut kwargs: IndexMap<String, Value> = IndexMap::new();
        for (name, value) in keywords {
            if kwargs.contains_key(&name) {
                return Err(SignatureError::MultipleValues { name });
            }
            kwargs.insert(name, value);
        }

        let given = positional.len();
        let mut arguments = IndexMap::new();
        let mut params = self.parameters.iter();

        for value in positional {
            let Some(param) = params.next() else {
                return Err(SignatureError::TooManyPositional {
                    max: self.parameters.len(),
                    given,
                });
            };
            if kwargs.contains_key(&param.name) {
                return Err(SignatureError::MultipleValues {
                    name: param.name.clone(),
                });
            }
            arguments.insert(param.name.clone(), value);
        }

        for param in params {
            match kwargs.shift_remove(&param.name) {
                Some(value) => {
                    arguments.insert(param.name.clone(), value);
                }
                None if param.is_required() => {
                    return Err(SignatureError::MissingRequired {
                        name: param.name.clone(),
                    });
                }
                None => {}
            }
        }

        if let Some(name) = kwargs.into_keys().next() {
            return Err(SignatureError::UnexpectedKeyword { name });
        }

        Ok(BoundArguments {
            signature: self,
            arguments,
        })
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, param) in self.parameters.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match &param.default {
                Some(default) => write!(f, "{}={}", param.name, default)?,
                None => f.write_str(&param.name)?,
            }
        }
        f.write_str(")")
    }
}

/// Call-site arguments for a record constructor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    positional: Vec<Value>,
    keywords: Vec<(String, Value)>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Append a keyword argument.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keywords.push((name.into(), value.into()));
        self
    }

    /// Arguments from JSON: an object becomes keywords, an array positionals.
    ///
    /// # Errors
    ///
    /// Returns `SignatureError::InvalidArguments` for any other JSON value.
    pub fn from_json(json: serde_json::Value) -> Result<Self, SignatureError> {
        match json {
            serde_json::Value::Object(map) => Ok(Self {
                positional: Vec::new(),
                keywords: map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            }),
            serde_json::Value::Array(arr) => Ok(Self {
                positional: arr.into_iter().map(Value::from).collect(),
                keywords: Vec::new(),
            }),
            other => Err(SignatureError::InvalidArguments {
                actual: json_type_name(&other).to_string(),
            }),
        }
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn keywords(&self) -> &[(String, Value)] {
        &self.keywords
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keywords.is_empty()
    }
}

impl<T: Into<Value>> FromIterator<T> for Args {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            positional: iter.into_iter().map(Into::into).collect(),
            keywords: Vec::new(),
        }
    }
}

/// Build [`Args`] from positionals, then keywords after a `;`.
///
/// ```
/// use scroll_model::args;
///
/// let args = args![1, 2; name = "there"];
/// assert_eq!(args.positional().len(), 2);
/// assert_eq!(args.keywords()[0].0, "name");
///
/// let kw_only = args![; name = "there"];
/// assert!(kw_only.positional().is_empty());
/// ```
#[macro_export]
macro_rules! args {
    () => {
        $crate::Args::new()
    };
    ($($value:expr),* ; $($name:ident = $kw:expr),+ $(,)?) => {
        $crate::Args::new()
            $(.arg($value))*
            $(.kwarg(stringify!($name), $kw))+
    };
    ($($value:expr),+ $(,)?) => {
        $crate::Args::new()$(.arg($value))+
    };
}

/// Result of binding [`Args`] against a [`Signature`].
#[derive(Debug, Clone, PartialEq)]
pub struct BoundArguments<'a> {
    signature: &'a Signature,
    arguments: IndexMap<String, Value>,
}

impl<'a> BoundArguments<'a> {
    /// Fill every omitted defaulted parameter with its default and put the
    /// arguments in parameter order.
    pub fn apply_defaults(&mut self) {
        let mut ordered = IndexMap::with_capacity(self.signature.len());
        for param in &self.signature.parameters {
            let value = match self.arguments.shift_remove(&param.name) {
                Some(value) => value,
                None => match &param.default {
                    Some(default) => default.clone(),
                    None => continue,
                },
            };
            ordered.insert(param.name.clone(), value);
        }
        self.arguments = ordered;
    }

    pub fn signature(&self) -> &'a Signature {
        self.signature
    }

    pub fn arguments(&self) -> &IndexMap<String, Value> {
        &self.arguments
    }

    pub fn into_arguments(self) -> IndexMap<String, Value> {
        self.arguments
    }
}
