//! Scroll Model
//!
//! Declarative record types with composable field rules.
//!
//! A record type is a list of named fields, each guarded by a [`FieldRule`]
//! that may type-check, range-check, length-check, convert or default the
//! values assigned to it. Declaring the type synthesizes a constructor
//! signature from its fields: required fields first, then defaulted ones,
//! all accepted positionally or by keyword.
//!
//! # Example
//!
//! ```
//! use scroll_model::{args, DefaultValue, ErrorKind, FieldRule, Schema, Value};
//!
//! let person = Schema::builder("Person")
//!     .field("name", FieldRule::string())
//!     .field("age", FieldRule::positive_integer())
//!     .field("title", FieldRule::default_string(DefaultValue::literal("none")))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(person.signature().to_string(), "(name, age, title=None)");
//!
//! let mut me = person.construct(args!["me", 23]).unwrap();
//! assert_eq!(me.get("title").unwrap(), &Value::from("none"));
//!
//! let err = me.set("age", -1).unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
//! ```
//!
//! # Field Rules
//!
//! | Rule | On assignment |
//! |------|---------------|
//! | typed | reject values of another kind |
//! | convert | transform the value first |
//! | positive | reject values below zero |
//! | sized | reject values longer than the maximum |
//! | default | replace the unset sentinel (`Value::Null`) with a default |
//!
//! Rules run outermost first; see [`FieldRule`] for how chains compose.
//!
//! # Inheritance
//!
//! A schema built with [`SchemaBuilder::extends`] starts from its bases'
//! fields. New fields are appended; redeclared fields keep their inherited
//! position but validate with the new rule.

mod error;
mod field;
mod model;
mod rule;
mod record;
mod schema;
mod signature;
mod types;

pub use error::{ConstructError, ErrorKind, FieldError, SchemaError, SignatureError};
pub use field::{Field, Slots};
pub use model::Model;
pub use record::Record;
pub use rule::{Behavior, Converter, DefaultValue, FieldRule, Rule};
pub use schema::{Schema, SchemaBuilder};
pub use signature::{Args, BoundArguments, Parameter, Signature};
pub use types::{Value, ValueKind, ValueSet};
