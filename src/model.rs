//! Statically declared record types.
//!
//! [`record!`](crate::record) declares a newtype over [`Record`] whose schema
//! is synthesized on first use and then shared, for the life of the process,
//! by every instance of that type.
//!
//! ```
//! use scroll_model::{args, record, FieldRule, Model, Value};
//!
//! record! {
//!     pub struct Point {
//!         x: FieldRule::integer(),
//!         y: FieldRule::integer(),
//!     }
//! }
//!
//! record! {
//!     pub struct Point3D: Point {
//!         z: FieldRule::integer(),
//!     }
//! }
//!
//! let p = Point3D::new(args![1, 2, 3]).unwrap();
//! assert_eq!(p.get("z").unwrap(), &Value::from(3));
//! assert_eq!(Point3D::schema().unwrap().signature().to_string(), "(x, y, z)");
//! ```

use std::sync::Arc;

use crate::error::{ConstructError, SchemaError};
use crate::record::Record;
use crate::schema::Schema;
use crate::signature::Args;

/// A record type with a single, lazily synthesized schema.
pub trait Model: Sized {
    /// The type's schema, built on first call.
    ///
    /// # Errors
    ///
    /// Returns the `SchemaError` raised while synthesizing this type or any
    /// of its bases. The error is cached like a successful schema.
    fn schema() -> Result<Arc<Schema>, SchemaError>;

    fn from_record(record: Record) -> Self;

    fn as_record(&self) -> &Record;

    fn construct(args: Args) -> Result<Self, ConstructError> {
        let schema = Self::schema()?;
        Ok(Self::from_record(schema.construct(args)?))
    }

    /// Construct from a JSON object of keyword arguments.
    fn from_json(json: serde_json::Value) -> Result<Self, ConstructError> {
        let schema = Self::schema()?;
        Ok(Self::from_record(schema.construct_from_json(json)?))
    }
}

/// Declare a record type backed by a [`Record`].
///
/// Bases follow the name after a colon and are merged in the order given.
/// Each field is `name: rule_expression`. The generated type implements
/// [`Model`], derefs to [`Record`], and gets an inherent `new(args)`.
#[macro_export]
macro_rules! record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident $(: $($base:ty),+)? {
            $($field:ident : $rule:expr),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        $vis struct $name($crate::Record);

        impl $crate::Model for $name {
            fn schema() -> ::std::result::Result<
                ::std::sync::Arc<$crate::Schema>,
                $crate::SchemaError,
            > {
                static SCHEMA: ::std::sync::OnceLock<
                    ::std::result::Result<::std::sync::Arc<$crate::Schema>, $crate::SchemaError>,
                > = ::std::sync::OnceLock::new();

                SCHEMA
                    .get_or_init(|| {
                        #[allow(unused_mut)]
                        let mut builder = $crate::Schema::builder(stringify!($name));
                        $($(
                            builder = builder.extends(&<$base as $crate::Model>::schema()?);
                        )+)?
                        $(
                            builder = builder.field(stringify!($field), $rule);
                        )*
                        builder.build()
                    })
                    .clone()
            }

            fn from_record(record: $crate::Record) -> Self {
                $name(record)
            }

            fn as_record(&self) -> &$crate::Record {
                &self.0
            }
        }

        impl $name {
            #[allow(dead_code)]
            $vis fn new(
                args: $crate::Args,
            ) -> ::std::result::Result<Self, $crate::ConstructError> {
                <Self as $crate::Model>::construct(args)
            }
        }

        impl ::std::ops::Deref for $name {
            type Target = $crate::Record;

            fn deref(&self) -> &$crate::Record {
                &self.0
            }
        }

        impl ::std::ops::DerefMut for $name {
            fn deref_mut(&mut self) -> &mut $crate::Record {
                &mut self.0
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::rule::{DefaultValue, FieldRule};
    use crate::types::Value;

    crate::record! {
        struct Point {
            x: FieldRule::integer(),
            y: FieldRule::integer(),
        }
    }

    crate::record! {
        struct Point3D: Point {
            z: FieldRule::integer(),
        }
    }

    crate::record! {
        struct Broken {
            name: FieldRule::default_string(DefaultValue::literal(1)),
        }
    }

    crate::record! {
        struct BrokenChild: Broken {}
    }

    #[test]
    fn schema_is_built_once() {
        let a = Point::schema().unwrap();
        let b = Point::schema().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.name(), "Point");
    }

    #[test]
    fn subtype_shares_base_schema() {
        let p = Point3D::new(crate::args![1, 2, 4]).unwrap();
        assert!(p.is_instance_of(&Point::schema().unwrap()));
        assert_eq!(p.get("x"), Ok(&Value::from(1)));
        assert_eq!(p.to_string(), "Point3D(x=1, y=2, z=4)");
    }

    #[test]
    fn deref_mut_reaches_setters() {
        let mut p = Point::new(crate::args![1, 2]).unwrap();
        p.set("x", 10).unwrap();
        assert_eq!(p.as_record().get("x"), Ok(&Value::from(10)));
    }

    #[test]
    fn synthesis_error_is_cached_and_inherited() {
        assert!(matches!(
            Broken::schema(),
            Err(SchemaError::InvalidDefault { .. })
        ));
        assert!(Broken::schema().is_err());

        let err = BrokenChild::new(crate::Args::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidUsage);
    }
}
