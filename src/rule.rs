//! Composable field rules.

use std::fmt;
use std::sync::Arc;

use crate::error::{FieldError, SchemaError};
use crate::types::{Value, ValueKind};

/// A user-defined step in a field rule chain.
///
/// Implementations return the value the next step should see, or an error
/// to reject it.
pub trait Rule: fmt::Debug + Send + Sync {
    fn apply(&self, field: &str, value: Value) -> Result<Value, FieldError>;
}

type Producer = Arc<dyn Fn() -> Value + Send + Sync>;
type ConvertFn = Arc<dyn Fn(Value) -> Result<Value, String> + Send + Sync>;

/// Value substituted when a defaulted field receives the unset sentinel.
#[derive(Clone)]
pub enum DefaultValue {
    /// Used as-is (cloned per instance).
    Literal(Value),
    /// Called once per substitution.
    Producer(Producer),
}

impl DefaultValue {
    pub fn literal(value: impl Into<Value>) -> Self {
        DefaultValue::Literal(value.into())
    }

    pub fn producer<F>(f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        DefaultValue::Producer(Arc::new(f))
    }

    /// Returns the value to substitute.
    pub fn produce(&self) -> Value {
        match self {
            DefaultValue::Literal(value) => value.clone(),
            DefaultValue::Producer(f) => f(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            DefaultValue::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

impl fmt::Display for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Literal(value) => write!(f, "{}", value),
            DefaultValue::Producer(_) => f.write_str("<fn>"),
        }
    }
}

impl PartialEq for DefaultValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DefaultValue::Literal(a), DefaultValue::Literal(b)) => a == b,
            (DefaultValue::Producer(a), DefaultValue::Producer(b)) => same_target(a, b),
            _ => false,
        }
    }
}

/// Conversion applied to a value before the rest of the chain sees it.
#[derive(Clone)]
pub struct Converter(ConvertFn);

impl Converter {
    /// Wrap a conversion that cannot fail.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Converter(Arc::new(move |value: Value| -> Result<Value, String> {
            Ok(f(value))
        }))
    }

    /// Wrap a conversion that may reject its input with a message.
    pub fn fallible<F>(f: F) -> Self
    where
        F: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        Converter(Arc::new(f))
    }

    /// Parses ISO-8601 strings into datetimes. Other values pass through.
    ///
    /// Accepts a `T` or space separator, minute or second precision with
    /// optional fractional seconds, and a bare date (midnight).
    #[cfg(feature = "datetime")]
    pub fn iso_datetime() -> Self {
        Converter::fallible(|value| match value {
            Value::String(s) => parse_iso_datetime(&s)
                .map(Value::DateTime)
                .ok_or_else(|| format!("invalid isoformat string: {:?}", s)),
            other => Ok(other),
        })
    }

    pub fn convert(&self, value: Value) -> Result<Value, String> {
        (self.0)(value)
    }
}

#[cfg(feature = "datetime")]
fn parse_iso_datetime(s: &str) -> Option<chrono::NaiveDateTime> {
    use chrono::{NaiveDate, NaiveDateTime};

    const FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"];

    if let Ok(dt) = s.parse::<NaiveDateTime>() {
        return Some(dt);
    }
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?.and_hms_opt(0, 0, 0))
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Converter(..)")
    }
}

impl PartialEq for Converter {
    fn eq(&self, other: &Self) -> bool {
        same_target(&self.0, &other.0)
    }
}

/// One step of a field rule chain.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Replace the unset sentinel with a default.
    Default(DefaultValue),
    /// Run a conversion unconditionally.
    Convert(Converter),
    /// Reject values whose kind the declared kind does not accept.
    Typed(ValueKind),
    /// Reject values below zero.
    Positive,
    /// Reject values longer than `max_len`.
    Sized { max_len: usize },
    Custom(Arc<dyn Rule>),
}

impl Behavior {
    /// Run this step against `value` for the named field.
    pub fn apply(&self, field: &str, value: Value) -> Result<Value, FieldError> {
        match self {
            Behavior::Default(default) => {
                if value.is_null() {
                    Ok(default.produce())
                } else {
                    Ok(value)
                }
            }
            Behavior::Convert(converter) => {
                converter
                    .convert(value)
                    .map_err(|message| FieldError::ConversionFailed {
                        field: field.to_string(),
                        message,
                    })
            }
            Behavior::Typed(kind) => {
                if kind.accepts(value.kind()) {
                    Ok(value)
                } else {
                    Err(FieldError::TypeMismatch {
                        field: field.to_string(),
                        expected: kind.name().to_string(),
                        actual: value.kind(),
                    })
                }
            }
            Behavior::Positive => match value.is_negative() {
                Some(false) => Ok(value),
                Some(true) => Err(FieldError::NotPositive {
                    field: field.to_string(),
                    value: value.to_string(),
                }),
                None => Err(FieldError::TypeMismatch {
                    field: field.to_string(),
                    expected: "a number".to_string(),
                    actual: value.kind(),
                }),
            },
            Behavior::Sized { max_len } => match value.len() {
                Some(len) if len > *max_len => Err(FieldError::TooLong {
                    field: field.to_string(),
                    len,
                    max_len: *max_len,
                }),
                Some(_) => Ok(value),
                None => Err(FieldError::TypeMismatch {
                    field: field.to_string(),
                    expected: "a sized value".to_string(),
                    actual: value.kind(),
                }),
            },
            Behavior::Custom(rule) => rule.apply(field, value),
        }
    }
}

impl PartialEq for Behavior {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Behavior::Default(a), Behavior::Default(b)) => a == b,
            (Behavior::Convert(a), Behavior::Convert(b)) => a == b,
            (Behavior::Typed(a), Behavior::Typed(b)) => a == b,
            (Behavior::Positive, Behavior::Positive) => true,
            (Behavior::Sized { max_len: a }, Behavior::Sized { max_len: b }) => a == b,
            (Behavior::Custom(a), Behavior::Custom(b)) => same_target(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Behavior::Default(default) => write!(f, "default({})", default),
            Behavior::Convert(_) => f.write_str("convert"),
            Behavior::Typed(kind) => write!(f, "typed({})", kind),
            Behavior::Positive => f.write_str("positive"),
            Behavior::Sized { max_len } => write!(f, "sized({})", max_len),
            Behavior::Custom(rule) => write!(f, "custom({:?})", rule),
        }
    }
}

// Compares data addresses only; vtable pointers may differ across codegen units.
fn same_target<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// Validation, conversion and default rules for one field.
///
/// A field rule is an ordered chain of [`Behavior`]s. The first behavior is
/// the outermost one: it sees the incoming value first, checks or transforms
/// it, and hands the result to the next. Once the last behavior accepts the
/// value it is stored.
///
/// The preset constructors expand to the following chains:
///
/// | Preset | Chain |
/// |--------|-------|
/// | `any` | (empty) |
/// | `integer`, `float`, `string`, `list`, `dict`, `generic` | typed |
/// | `generic_with` | convert → typed |
/// | `positive_integer`, `positive_float` | typed → positive |
/// | `sized_string` | typed(string) → sized |
/// | `default_string` | default → typed(string) |
/// | `default_generic` | default → convert → typed |
///
/// Chains combine with [`compose`](FieldRule::compose): the left chain keeps its
/// order and the right chain's behaviors follow, skipping any already present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldRule {
    behaviors: Vec<Behavior>,
}

impl FieldRule {
    /// Build a rule from an explicit chain, outermost first.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::MultipleDefaults` if more than one behavior is a
    /// default.
    pub fn from_behaviors(behaviors: Vec<Behavior>) -> Result<Self, SchemaError> {
        let mut rule = FieldRule::any();
        for behavior in behaviors {
            rule = rule.compose(&FieldRule::single(behavior))?;
        }
        Ok(rule)
    }

    fn single(behavior: Behavior) -> Self {
        Self {
            behaviors: vec![behavior],
        }
    }

    fn chain(behaviors: Vec<Behavior>) -> Self {
        Self { behaviors }
    }

    /// Stores any value unchecked.
    pub fn any() -> Self {
        Self { behaviors: Vec::new() }
    }

    pub fn typed(kind: ValueKind) -> Self {
        Self::single(Behavior::Typed(kind))
    }

    pub fn integer() -> Self {
        Self::typed(ValueKind::Integer)
    }

    pub fn float() -> Self {
        Self::typed(ValueKind::Float)
    }

    pub fn string() -> Self {
        Self::typed(ValueKind::String)
    }

    pub fn list() -> Self {
        Self::typed(ValueKind::List)
    }

    pub fn dict() -> Self {
        Self::typed(ValueKind::Dict)
    }

    /// Typed rule for an arbitrary kind.
    pub fn generic(kind: ValueKind) -> Self {
        Self::typed(kind)
    }

    /// Typed rule that converts incoming values before checking them.
    pub fn generic_with(kind: ValueKind, converter: Converter) -> Self {
        Self::chain(vec![Behavior::Convert(converter), Behavior::Typed(kind)])
    }

    pub fn positive() -> Self {
        Self::single(Behavior::Positive)
    }

    pub fn sized(max_len: usize) -> Self {
        Self::single(Behavior::Sized { max_len })
    }

    pub fn custom(rule: impl Rule + 'static) -> Self {
        Self::single(Behavior::Custom(Arc::new(rule)))
    }

    /// Default-only rule; stores the default or whatever is passed.
    pub fn defaulting(default: DefaultValue) -> Self {
        Self::single(Behavior::Default(default))
    }

    pub fn positive_integer() -> Self {
        Self::chain(vec![Behavior::Typed(ValueKind::Integer), Behavior::Positive])
    }

    pub fn positive_float() -> Self {
        Self::chain(vec![Behavior::Typed(ValueKind::Float), Behavior::Positive])
    }

    pub fn sized_string(max_len: usize) -> Self {
        Self::chain(vec![
            Behavior::Typed(ValueKind::String),
            Behavior::Sized { max_len },
        ])
    }

    pub fn default_string(default: DefaultValue) -> Self {
        Self::chain(vec![
            Behavior::Default(default),
            Behavior::Typed(ValueKind::String),
        ])
    }

    pub fn default_generic(
        kind: ValueKind,
        converter: Option<Converter>,
        default: DefaultValue,
    ) -> Self {
        let mut behaviors = vec![Behavior::Default(default)];
        behaviors.extend(converter.map(Behavior::Convert));
        behaviors.push(Behavior::Typed(kind));
        Self::chain(behaviors)
    }

    /// Layer `other` beneath this rule.
    ///
    /// Behaviors of `self` run first, then those of `other` that are not
    /// already in the chain. The operation is associative.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::MultipleDefaults` when both sides carry a
    /// default.
    pub fn compose(&self, other: &FieldRule) -> Result<FieldRule, SchemaError> {
        let mut behaviors = self.behaviors.clone();
        for behavior in &other.behaviors {
            if behaviors.contains(behavior) {
                continue;
            }
            if matches!(behavior, Behavior::Default(_)) && self.is_defaulted() {
                return Err(SchemaError::MultipleDefaults);
            }
            behaviors.push(behavior.clone());
        }
        Ok(FieldRule { behaviors })
    }

    /// Put a default in front of this rule.
    pub fn with_default(self, default: DefaultValue) -> Result<FieldRule, SchemaError> {
        FieldRule::defaulting(default).compose(&self)
    }

    pub fn behaviors(&self) -> &[Behavior] {
        &self.behaviors
    }

    pub fn default_value(&self) -> Option<&DefaultValue> {
        self.behaviors.iter().find_map(|b| match b {
            Behavior::Default(default) => Some(default),
            _ => None,
        })
    }

    /// Whether the field may be omitted at construction.
    pub fn is_defaulted(&self) -> bool {
        self.default_value().is_some()
    }

    /// Run the full chain, returning the value to store.
    pub fn apply(&self, field: &str, value: Value) -> Result<Value, FieldError> {
        self.behaviors
            .iter()
            .try_fold(value, |value, behavior| behavior.apply(field, value))
    }

    /// Check that omitting the field yields a storable value.
    ///
    /// Only literal defaults are checked; producers are not called.
    pub(crate) fn verify_default(&self, field: &str) -> Result<(), SchemaError> {
        match self.default_value() {
            Some(DefaultValue::Literal(_)) => self
                .apply(field, Value::Null)
                .map(|_| ())
                .map_err(|source| SchemaError::InvalidDefault {
                    field: field.to_string(),
                    source,
                }),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for FieldRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.behaviors.is_empty() {
            return f.write_str("any");
        }
        for (i, behavior) in self.behaviors.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{}", behavior)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicI64, Ordering};

    #[derive(Debug)]
    struct Even;

    impl Rule for Even {
        fn apply(&self, field: &str, value: Value) -> Result<Value, FieldError> {
            match value.as_i64() {
                Some(n) if n % 2 == 0 => Ok(value),
                _ => Err(FieldError::Rejected {
                    field: field.to_string(),
                    message: "expected an even number".to_string(),
                }),
            }
        }
    }

    // === Preset Chains ===

    #[test]
    fn positive_integer_rejects_negative() {
        let rule = FieldRule::positive_integer();
        assert_eq!(rule.apply("n", Value::from(5)), Ok(Value::from(5)));
        assert_eq!(rule.apply("n", Value::from(0)), Ok(Value::from(0)));

        let err = rule.apply("n", Value::from(-5)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
    }

    #[test]
    fn positive_integer_checks_type_first() {
        let err = FieldRule::positive_integer()
            .apply("n", Value::from(-1.5))
            .unwrap_err();
        assert!(matches!(err, FieldError::TypeMismatch { .. }));
    }

    #[test]
    fn sized_string_limits_length() {
        let rule = FieldRule::sized_string(1);
        assert_eq!(rule.apply("sex", Value::from("m")), Ok(Value::from("m")));
        assert!(matches!(
            rule.apply("sex", Value::from("ab")),
            Err(FieldError::TooLong { len: 2, max_len: 1, .. })
        ));
    }

    #[test]
    fn sized_without_length_is_type_mismatch() {
        let err = FieldRule::sized(3).apply("n", Value::from(10)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn positive_without_ordering_is_type_mismatch() {
        let err = FieldRule::positive()
            .apply("n", Value::from("abc"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn integer_accepts_bool() {
        assert!(FieldRule::integer().apply("flag", Value::from(true)).is_ok());
        assert!(FieldRule::integer().apply("n", Value::from("123")).is_err());
    }

    #[test]
    fn default_string_substitutes_sentinel() {
        let rule = FieldRule::default_string(DefaultValue::literal("here"));
        assert_eq!(rule.apply("name", Value::Null), Ok(Value::from("here")));
        assert_eq!(rule.apply("name", Value::from("there")), Ok(Value::from("there")));
        assert!(rule.is_defaulted());
    }

    #[test]
    fn default_producer_called_per_substitution() {
        let counter = Arc::new(AtomicI64::new(0));
        let c = Arc::clone(&counter);
        let rule = FieldRule::default_generic(
            ValueKind::Integer,
            None,
            DefaultValue::producer(move || Value::from(c.fetch_add(1, Ordering::SeqCst))),
        );

        assert_eq!(rule.apply("n", Value::Null), Ok(Value::from(0)));
        assert_eq!(rule.apply("n", Value::Null), Ok(Value::from(1)));
        assert_eq!(rule.apply("n", Value::from(9)), Ok(Value::from(9)));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn generic_with_converts_before_type_check() {
        let to_set = Converter::new(|value| match value {
            Value::List(items) => Value::set(items),
            other => other,
        });
        let rule = FieldRule::generic_with(ValueKind::Set, to_set);

        let stored = rule.apply("test", Value::from(vec![1, 2, 2, 3, 1])).unwrap();
        assert_eq!(stored, Value::set(vec![1, 2, 3]));
        assert!(rule.apply("test", Value::from(1)).is_err());
    }

    #[test]
    fn fallible_converter_reports_constraint_violation() {
        let parse = Converter::fallible(|value| match value {
            Value::String(s) => s.parse::<i64>().map(Value::from).map_err(|e| e.to_string()),
            other => Ok(other),
        });
        let rule = FieldRule::generic_with(ValueKind::Integer, parse);

        assert_eq!(rule.apply("n", Value::from("42")), Ok(Value::from(42)));
        let err = rule.apply("n", Value::from("forty")).unwrap_err();
        assert!(matches!(err, FieldError::ConversionFailed { .. }));
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
    }

    #[cfg(feature = "datetime")]
    #[test]
    fn iso_datetime_converter() {
        let rule = FieldRule::generic_with(ValueKind::DateTime, Converter::iso_datetime());
        let stored = rule.apply("at", Value::from("2024-01-31T12:30:00")).unwrap();
        assert_eq!(stored.kind(), ValueKind::DateTime);
        assert!(rule.apply("at", Value::from("yesterday")).is_err());
    }

    #[cfg(feature = "datetime")]
    #[test]
    fn iso_datetime_accepts_isoformat_variants() {
        let rule = FieldRule::generic_with(ValueKind::DateTime, Converter::iso_datetime());
        let cases = [
            ("2024-01-31", "2024-01-31 00:00:00"),
            ("2024-01-31 12:00:00", "2024-01-31 12:00:00"),
            ("2024-01-31T12:00", "2024-01-31 12:00:00"),
            ("2024-01-31 12:00", "2024-01-31 12:00:00"),
            ("2024-01-31T12:00:00.250", "2024-01-31 12:00:00.250"),
        ];
        for (input, expected) in cases {
            let stored = rule.apply("at", Value::from(input)).unwrap();
            assert_eq!(stored.to_string(), expected, "input {:?}", input);
        }
        assert!(rule.apply("at", Value::from("2024-13-01")).is_err());
    }

    #[test]
    fn custom_rule_runs_in_chain() {
        let rule = FieldRule::integer()
            .compose(&FieldRule::custom(Even))
            .unwrap();
        assert!(rule.apply("n", Value::from(4)).is_ok());
        let err = rule.apply("n", Value::from(3)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
        assert_eq!(err.field(), "n");
    }

    // === Composition ===

    #[test]
    fn compose_keeps_left_order() {
        let rule = FieldRule::integer().compose(&FieldRule::positive()).unwrap();
        assert_eq!(rule, FieldRule::positive_integer());

        let rule = FieldRule::positive().compose(&FieldRule::integer()).unwrap();
        assert_eq!(
            rule.behaviors(),
            &[Behavior::Positive, Behavior::Typed(ValueKind::Integer)]
        );
    }

    #[test]
    fn compose_skips_shared_behaviors() {
        let rule = FieldRule::positive_integer()
            .compose(&FieldRule::integer())
            .unwrap();
        assert_eq!(rule, FieldRule::positive_integer());
    }

    #[test]
    fn compose_is_associative() {
        let a = FieldRule::defaulting(DefaultValue::literal(1));
        let b = FieldRule::positive_integer();
        let c = FieldRule::integer().compose(&FieldRule::sized(2)).unwrap();

        let left = a.compose(&b).unwrap().compose(&c).unwrap();
        let right = a.compose(&b.compose(&c).unwrap()).unwrap();
        assert_eq!(left, right);
    }

    #[test]
    fn compose_rejects_second_default() {
        let a = FieldRule::defaulting(DefaultValue::literal(1));
        let b = FieldRule::default_string(DefaultValue::literal("x"));
        assert_eq!(a.compose(&b), Err(SchemaError::MultipleDefaults));
    }

    #[test]
    fn from_behaviors_rejects_second_default() {
        let result = FieldRule::from_behaviors(vec![
            Behavior::Default(DefaultValue::literal(1)),
            Behavior::Default(DefaultValue::literal(2)),
        ]);
        assert_eq!(result, Err(SchemaError::MultipleDefaults));
    }

    #[test]
    fn with_default_goes_outermost() {
        let rule = FieldRule::positive_integer()
            .with_default(DefaultValue::literal(7))
            .unwrap();
        assert!(matches!(rule.behaviors()[0], Behavior::Default(_)));
        assert_eq!(rule.apply("n", Value::Null), Ok(Value::from(7)));
        assert!(rule.apply("n", Value::from(-7)).is_err());
    }

    // === Default Verification ===

    #[test]
    fn verify_default_rejects_mistyped_literal() {
        let rule = FieldRule::default_string(DefaultValue::literal(5));
        assert!(matches!(
            rule.verify_default("name"),
            Err(SchemaError::InvalidDefault { .. })
        ));
    }

    #[test]
    fn verify_default_rejects_default_behind_type_check() {
        let rule = FieldRule::string()
            .compose(&FieldRule::defaulting(DefaultValue::literal("x")))
            .unwrap();
        assert!(rule.verify_default("name").is_err());
    }

    #[test]
    fn verify_default_skips_producers() {
        let rule = FieldRule::default_string(DefaultValue::producer(|| Value::from(5)));
        assert!(rule.verify_default("name").is_ok());
    }

    #[test]
    fn display_lists_chain() {
        let rule = FieldRule::default_string(DefaultValue::literal("here"));
        assert_eq!(rule.to_string(), "default(\"here\") -> typed(string)");
        assert_eq!(FieldRule::any().to_string(), "any");
    }
}
