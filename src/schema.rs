//! Record type synthesis.
//!
//! A [`SchemaBuilder`] collects a record type's own field rules and its base
//! types, then [`SchemaBuilder::build`] resolves them once into an immutable
//! [`Schema`]:
//!
//! 1. Start from the bases' resolved fields, in base order. A name seen again
//!    in a later base keeps its first position but takes the later rule.
//! 2. Apply the type's own declarations in order. A redeclared name keeps
//!    its inherited position with the new rule; new names are appended.
//! 3. Split the merged fields into required and defaulted, preserving order.
//! 4. Bind each rule to its name and build the constructor signature:
//!    required names first, then defaulted names.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{ConstructError, SchemaError};
use crate::field::Field;
use crate::record::Record;
use crate::rule::FieldRule;
use crate::signature::{Args, Signature};

/// Declares a record type. Consumed by [`build`](SchemaBuilder::build).
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    name: String,
    bases: Vec<Arc<Schema>>,
    fields: Vec<(String, FieldRule)>,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bases: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Inherit all fields of `base`. Bases are merged in the order added.
    pub fn extends(mut self, base: &Arc<Schema>) -> Self {
        self.bases.push(Arc::clone(base));
        self
    }

    /// Declare a field. Declaration order is constructor order.
    pub fn field(mut self, name: impl Into<String>, rule: FieldRule) -> Self {
        self.fields.push((name.into(), rule));
        self
    }

    /// Resolve fields and signature.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError` for an invalid or repeated field name, or for a
    /// literal default its own rule would reject.
    pub fn build(self) -> Result<Arc<Schema>, SchemaError> {
        let SchemaBuilder {
            name,
            bases,
            fields: declared,
        } = self;

        let mut merged: IndexMap<String, Arc<Field>> = IndexMap::new();
        for base in &bases {
            for field in base.fields.values() {
                merged.insert(field.name().to_string(), Arc::clone(field));
            }
        }

        let mut seen: Vec<&str> = Vec::with_capacity(declared.len());
        for (field_name, rule) in &declared {
            if !is_identifier(field_name) {
                return Err(SchemaError::InvalidFieldName {
                    record: name.clone(),
                    name: field_name.clone(),
                });
            }
            if seen.contains(&field_name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    record: name.clone(),
                    name: field_name.clone(),
                });
            }
            seen.push(field_name);

            rule.verify_default(field_name)?;
            merged.insert(
                field_name.clone(),
                Arc::new(Field::new(field_name.clone(), rule.clone())),
            );
        }

        let (defaulted, required): (Vec<&Arc<Field>>, Vec<&Arc<Field>>) =
            merged.values().partition(|field| field.is_defaulted());
        let required: Vec<String> = required.iter().map(|f| f.name().to_string()).collect();
        let defaulted: Vec<String> = defaulted.iter().map(|f| f.name().to_string()).collect();
        let signature = Signature::new(required.iter().cloned(), defaulted.iter().cloned());

        debug!(
            record = %name,
            signature = %signature,
            inherited = bases.len(),
            "synthesized record type"
        );

        Ok(Arc::new(Schema {
            name,
            bases,
            fields: merged,
            required,
            defaulted,
            signature,
        }))
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Resolved description of a record type: ordered fields plus the
/// synthesized constructor signature. Immutable once built.
#[derive(Debug)]
pub struct Schema {
    name: String,
    bases: Vec<Arc<Schema>>,
    fields: IndexMap<String, Arc<Field>>,
    required: Vec<String>,
    defaulted: Vec<String>,
    signature: Signature,
}

impl Schema {
    /// Start declaring a record type.
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bases(&self) -> &[Arc<Schema>] {
        &self.bases
    }

    /// Fields in resolved order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> + '_ {
        self.fields.values().map(|f| f.as_ref())
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name).map(|f| f.as_ref())
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.keys().map(String::as_str)
    }

    /// Names of fields without a default, in resolved order.
    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Names of fields with a default, in resolved order.
    pub fn defaulted(&self) -> &[String] {
        &self.defaulted
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Whether this type is `other` or inherits from it, directly or not.
    pub fn is_subtype_of(&self, other: &Schema) -> bool {
        std::ptr::eq(self, other) || self.bases.iter().any(|base| base.is_subtype_of(other))
    }

    /// Create an instance from call-site arguments.
    ///
    /// Arguments are bound against the signature, omitted defaulted fields
    /// receive the unset sentinel, and every value then goes through its
    /// field's rule in signature order.
    ///
    /// # Errors
    ///
    /// Returns `ConstructError::Signature` if the arguments do not fit (no
    /// field is touched), or `ConstructError::Field` for the first value a
    /// rule rejects. No instance is returned on error.
    pub fn construct(self: &Arc<Self>, args: Args) -> Result<Record, ConstructError> {
        let mut bound = self.signature.bind(args)?;
        bound.apply_defaults();

        let mut record = Record::empty(Arc::clone(self));
        for (name, value) in bound.into_arguments() {
            record.set(&name, value)?;
        }
        Ok(record)
    }

    /// Create an instance from a JSON object (keywords) or array (positionals).
    pub fn construct_from_json(
        self: &Arc<Self>,
        json: serde_json::Value,
    ) -> Result<Record, ConstructError> {
        self.construct(Args::from_json(json)?)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.signature)
    }
}
