//! Named fields and per-instance storage.

use indexmap::IndexMap;
use tracing::trace;

use crate::error::FieldError;
use crate::rule::FieldRule;
use crate::types::Value;

/// A field rule bound to its name within a record type.
///
/// Created once, when the owning record type is synthesized, and shared
/// read-only by every instance afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    rule: FieldRule,
}

impl Field {
    pub(crate) fn new(name: impl Into<String>, rule: FieldRule) -> Self {
        Self {
            name: name.into(),
            rule,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rule(&self) -> &FieldRule {
        &self.rule
    }

    pub fn is_defaulted(&self) -> bool {
        self.rule.is_defaulted()
    }

    /// Run the rule chain without storing anything.
    pub fn validate(&self, value: Value) -> Result<Value, FieldError> {
        self.rule.apply(&self.name, value)
    }

    /// Validate `value` and store the result. Storage is untouched on error.
    pub fn store(&self, slots: &mut Slots, value: Value) -> Result<(), FieldError> {
        let value = self.validate(value)?;
        trace!(field = %self.name, value = %value, "store");
        slots.values.insert(self.name.clone(), value);
        Ok(())
    }

    /// Returns the stored value.
    pub fn load<'a>(&self, slots: &'a Slots) -> Result<&'a Value, FieldError> {
        slots.values.get(&self.name).ok_or_else(|| self.unset())
    }

    /// Remove and return the stored value.
    pub fn clear(&self, slots: &mut Slots) -> Result<Value, FieldError> {
        let value = slots
            .values
            .shift_remove(&self.name)
            .ok_or_else(|| self.unset())?;
        trace!(field = %self.name, "clear");
        Ok(value)
    }

    fn unset(&self) -> FieldError {
        FieldError::FieldUnset {
            field: self.name.clone(),
        }
    }
}

/// Field values of one record instance, keyed by field name.
///
/// Only [`Field`] writes here, so every stored value has passed its rule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Slots {
    values: IndexMap<String, Value>,
}

impl Slots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Move every value of `staged` in, replacing existing ones.
    pub(crate) fn absorb(&mut self, staged: Slots) {
        self.values.extend(staged.values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn store_then_load() {
        let field = Field::new("integer", FieldRule::integer());
        let mut slots = Slots::new();
        assert!(slots.is_empty());

        field.store(&mut slots, Value::from(134)).unwrap();
        assert_eq!(field.load(&slots), Ok(&Value::from(134)));
        assert_eq!(slots.len(), 1);

        field.store(&mut slots, Value::from(7)).unwrap();
        assert_eq!(slots.len(), 1);
    }

    #[test]
    fn failed_store_leaves_previous_value() {
        let field = Field::new("integer", FieldRule::integer());
        let mut slots = Slots::new();
        field.store(&mut slots, Value::from(12)).unwrap();

        let err = field.store(&mut slots, Value::from("123")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert_eq!(field.load(&slots), Ok(&Value::from(12)));
    }

    #[test]
    fn load_unset_field() {
        let field = Field::new("x", FieldRule::any());
        let slots = Slots::new();
        assert_eq!(
            field.load(&slots),
            Err(FieldError::FieldUnset { field: "x".into() })
        );
    }

    #[test]
    fn clear_unset_field_fails() {
        let field = Field::new("x", FieldRule::any());
        let mut slots = Slots::new();

        assert!(field.clear(&mut slots).is_err());
        field.store(&mut slots, Value::from(1)).unwrap();
        assert_eq!(field.clear(&mut slots), Ok(Value::from(1)));

        let err = field.clear(&mut slots).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FieldUnset);
        assert!(!slots.contains("x"));
    }
}
