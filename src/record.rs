//! Record instances.

use std::fmt;
use std::sync::Arc;

use crate::error::{ConstructError, FieldError, SignatureError};
use crate::field::{Field, Slots};
use crate::schema::Schema;
use crate::signature::Args;
use crate::types::Value;

/// An instance of a record type.
///
/// Every read and write goes through the field's rule, looked up in the
/// shared [`Schema`].
#[derive(Debug, Clone)]
pub struct Record {
    schema: Arc<Schema>,
    slots: Slots,
}

fn lookup<'s>(schema: &'s Schema, name: &str) -> Result<&'s Field, FieldError> {
    schema.field(name).ok_or_else(|| FieldError::UnknownField {
        record: schema.name().to_string(),
        field: name.to_string(),
    })
}

impl Record {
    /// An instance with no field set. Use [`Schema::construct`] for a
    /// populated one.
    pub fn empty(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            slots: Slots::new(),
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Whether this record's type is `schema` or one of its subtypes.
    pub fn is_instance_of(&self, schema: &Schema) -> bool {
        self.schema.is_subtype_of(schema)
    }

    pub fn get(&self, name: &str) -> Result<&Value, FieldError> {
        lookup(&self.schema, name)?.load(&self.slots)
    }

    /// Validate and store a value. On error the previous value is kept.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), FieldError> {
        lookup(&self.schema, name)?.store(&mut self.slots, value.into())
    }

    /// Remove and return a stored value.
    pub fn delete(&mut self, name: &str) -> Result<Value, FieldError> {
        lookup(&self.schema, name)?.clear(&mut self.slots)
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.slots.contains(name)
    }

    /// Set fields and their values, in field order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.schema
            .fields()
            .filter_map(|field| self.slots.get(field.name()).map(|v| (field.name(), v)))
    }

    /// Assign several fields by keyword, all or nothing.
    ///
    /// Every value is validated into a staging area first, so a rejected
    /// value leaves the record unchanged. The unset sentinel is handed to
    /// rules like any other value.
    ///
    /// # Errors
    ///
    /// `ConstructError::Signature` if `args` carries positionals or repeats a
    /// name, `ConstructError::Field` for an unknown name or rejected value.
    pub fn update(&mut self, args: Args) -> Result<(), ConstructError> {
        if !args.positional().is_empty() {
            return Err(SignatureError::TooManyPositional {
                max: 0,
                given: args.positional().len(),
            }
            .into());
        }

        let mut staged = Slots::new();
        for (name, value) in args.keywords() {
            let field = lookup(&self.schema, name)?;
            if staged.contains(name) {
                return Err(SignatureError::MultipleValues { name: name.clone() }.into());
            }
            field.store(&mut staged, value.clone())?;
        }

        self.slots.absorb(staged);
        Ok(())
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.schema, &other.schema) && self.slots == other.slots
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.schema.name())?;
        for (i, (name, value)) in self.values().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::error::ErrorKind;
    use crate::rule::FieldRule;

    fn tclass() -> Record {
        let schema = Schema::builder("Tclass")
            .field("integer", FieldRule::integer())
            .field("string", FieldRule::string())
            .field("pinteger", FieldRule::positive_integer())
            .build()
            .unwrap();
        schema.construct(args![12, "qwerty", 100]).unwrap()
    }

    #[test]
    fn set_correct_type() {
        let mut record = tclass();
        record.set("integer", 134).unwrap();
        assert_eq!(record.get("integer"), Ok(&Value::from(134)));
    }

    #[test]
    fn set_wrong_type() {
        let mut record = tclass();
        let err = record.set("integer", "123").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert_eq!(record.get("integer"), Ok(&Value::from(12)));
    }

    #[test]
    fn set_negative_positive_integer() {
        let mut record = tclass();
        let err = record.set("pinteger", -100).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
    }

    #[test]
    fn unknown_field() {
        let mut record = tclass();
        assert!(matches!(
            record.set("missing", 1),
            Err(FieldError::UnknownField { .. })
        ));
        assert!(record.get("missing").is_err());
    }

    #[test]
    fn delete_then_get_is_unset() {
        let mut record = tclass();
        assert_eq!(record.delete("string"), Ok(Value::from("qwerty")));
        assert!(!record.is_set("string"));

        let err = record.get("string").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FieldUnset);
        let err = record.delete("string").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FieldUnset);
    }

    #[test]
    fn update_is_all_or_nothing() {
        let mut record = tclass();
        let err = record
            .update(args![; integer = 1, pinteger = -1])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
        assert_eq!(record.get("integer"), Ok(&Value::from(12)));

        record.update(args![; integer = 1, pinteger = 2]).unwrap();
        assert_eq!(record.get("integer"), Ok(&Value::from(1)));
        assert_eq!(record.get("pinteger"), Ok(&Value::from(2)));
    }

    #[test]
    fn update_rejects_positionals_and_repeats() {
        let mut record = tclass();
        let err = record.update(args![1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SignatureMismatch);

        let err = record.update(args![; integer = 1, integer = 2]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SignatureMismatch);
    }

    #[test]
    fn values_follow_field_order() {
        let mut record = tclass();
        record.delete("string").unwrap();
        record.set("string", "later").unwrap();

        let names: Vec<&str> = record.values().map(|(name, _)| name).collect();
        assert_eq!(names, ["integer", "string", "pinteger"]);
    }

    #[test]
    fn display() {
        let record = tclass();
        assert_eq!(
            record.to_string(),
            "Tclass(integer=12, string=\"qwerty\", pinteger=100)"
        );
    }

    #[test]
    fn equality_needs_same_type() {
        let a = tclass();
        let b = a.schema().construct(args![12, "qwerty", 100]).unwrap();
        assert_eq!(a, b);
        // Same shape, different type.
        assert_ne!(a, tclass());
    }
}
