//! Record shapes and field tables
//!
//! A record type lists its fields once in a [`FieldTable`]: each entry pairs
//! a field name with its [`FieldKind`] and a typed getter and setter. The
//! mapper only ever touches records through these accessors.
//!
//! ```rust
//! use chrono::NaiveDate;
//! use rowbind::{FieldTable, Record};
//!
//! #[derive(Debug, Default)]
//! struct Person {
//!     name: String,
//!     age: Option<u32>,
//!     birth_date: NaiveDate,
//! }
//!
//! impl Record for Person {
//!     fn fields() -> FieldTable<Self> {
//!         FieldTable::new()
//!             .field("name", |p: &Person| &p.name, |p: &mut Person| &mut p.name)
//!             .field("age", |p: &Person| &p.age, |p: &mut Person| &mut p.age)
//!             .field(
//!                 "birth_date",
//!                 |p: &Person| &p.birth_date,
//!                 |p: &mut Person| &mut p.birth_date,
//!             )
//!     }
//! }
//!
//! assert_eq!(Person::fields().names(), vec!["name", "age", "birth_date"]);
//! ```

use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::CoerceError;

/// Value category of a record field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    Bool,
    Date,
    DateTime,
}

impl FieldKind {
    /// Date kinds go through the date parser and formatter
    pub fn is_date(self) -> bool {
        matches!(self, FieldKind::Date | FieldKind::DateTime)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Integer => "integer",
            FieldKind::Float => "number",
            FieldKind::Bool => "boolean",
            FieldKind::Date => "date",
            FieldKind::DateTime => "date-time",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field value in transit between a cell and a record
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Absent value of an optional field
    Null,
    Text(String),
    Integer(i128),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl FieldValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Text(_) => "text",
            FieldValue::Integer(_) => "integer",
            FieldValue::Float(_) => "number",
            FieldValue::Bool(_) => "boolean",
            FieldValue::Date(_) => "date",
            FieldValue::DateTime(_) => "date-time",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

fn mismatch(expected: FieldKind, found: &FieldValue) -> CoerceError {
    match found {
        FieldValue::Null => CoerceError::Missing,
        other => CoerceError::KindMismatch {
            expected,
            found: other.type_name(),
        },
    }
}

/// A Rust type that can be stored in a record field
pub trait FieldType: Sized {
    const KIND: FieldKind;

    /// Whether the field accepts [`FieldValue::Null`]
    const OPTIONAL: bool = false;

    fn to_value(&self) -> FieldValue;

    fn from_value(value: FieldValue) -> Result<Self, CoerceError>;
}

impl FieldType for String {
    const KIND: FieldKind = FieldKind::Text;

    fn to_value(&self) -> FieldValue {
        FieldValue::Text(self.clone())
    }

    fn from_value(value: FieldValue) -> Result<Self, CoerceError> {
        match value {
            FieldValue::Text(s) => Ok(s),
            other => Err(mismatch(Self::KIND, &other)),
        }
    }
}

macro_rules! integer_field {
    ($($t:ty),*) => {$(
        impl FieldType for $t {
            const KIND: FieldKind = FieldKind::Integer;

            fn to_value(&self) -> FieldValue {
                FieldValue::Integer(*self as i128)
            }

            fn from_value(value: FieldValue) -> Result<Self, CoerceError> {
                match value {
                    FieldValue::Integer(n) => <$t>::try_from(n).map_err(|_| {
                        CoerceError::OutOfRange {
                            value: n.to_string(),
                            target: stringify!($t),
                        }
                    }),
                    other => Err(mismatch(Self::KIND, &other)),
                }
            }
        }
    )*};
}

integer_field!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl FieldType for f64 {
    const KIND: FieldKind = FieldKind::Float;

    fn to_value(&self) -> FieldValue {
        FieldValue::Float(*self)
    }

    fn from_value(value: FieldValue) -> Result<Self, CoerceError> {
        match value {
            FieldValue::Float(f) => Ok(f),
            other => Err(mismatch(Self::KIND, &other)),
        }
    }
}

impl FieldType for f32 {
    const KIND: FieldKind = FieldKind::Float;

    fn to_value(&self) -> FieldValue {
        FieldValue::Float(f64::from(*self))
    }

    fn from_value(value: FieldValue) -> Result<Self, CoerceError> {
        match value {
            FieldValue::Float(f) if f.is_finite() && f.abs() > f64::from(f32::MAX) => {
                Err(CoerceError::OutOfRange {
                    value: f.to_string(),
                    target: "f32",
                })
            }
            FieldValue::Float(f) => Ok(f as f32),
            other => Err(mismatch(Self::KIND, &other)),
        }
    }
}

impl FieldType for bool {
    const KIND: FieldKind = FieldKind::Bool;

    fn to_value(&self) -> FieldValue {
        FieldValue::Bool(*self)
    }

    fn from_value(value: FieldValue) -> Result<Self, CoerceError> {
        match value {
            FieldValue::Bool(b) => Ok(b),
            other => Err(mismatch(Self::KIND, &other)),
        }
    }
}

impl FieldType for NaiveDate {
    const KIND: FieldKind = FieldKind::Date;

    fn to_value(&self) -> FieldValue {
        FieldValue::Date(*self)
    }

    fn from_value(value: FieldValue) -> Result<Self, CoerceError> {
        match value {
            FieldValue::Date(d) => Ok(d),
            FieldValue::DateTime(dt) => Ok(dt.date()),
            other => Err(mismatch(Self::KIND, &other)),
        }
    }
}

impl FieldType for NaiveDateTime {
    const KIND: FieldKind = FieldKind::DateTime;

    fn to_value(&self) -> FieldValue {
        FieldValue::DateTime(*self)
    }

    fn from_value(value: FieldValue) -> Result<Self, CoerceError> {
        match value {
            FieldValue::DateTime(dt) => Ok(dt),
            FieldValue::Date(d) => Ok(d.and_time(chrono::NaiveTime::MIN)),
            other => Err(mismatch(Self::KIND, &other)),
        }
    }
}

impl<T: FieldType> FieldType for Option<T> {
    const KIND: FieldKind = T::KIND;
    const OPTIONAL: bool = true;

    fn to_value(&self) -> FieldValue {
        match self {
            Some(v) => v.to_value(),
            None => FieldValue::Null,
        }
    }

    fn from_value(value: FieldValue) -> Result<Self, CoerceError> {
        match value {
            FieldValue::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

type Getter<R> = Arc<dyn Fn(&R) -> FieldValue + Send + Sync>;
type Setter<R> = Arc<dyn Fn(&mut R, FieldValue) -> Result<(), CoerceError> + Send + Sync>;

/// Name, kind and typed accessors of one record field
pub struct FieldAccessor<R> {
    name: &'static str,
    kind: FieldKind,
    optional: bool,
    get: Getter<R>,
    set: Setter<R>,
}

impl<R> FieldAccessor<R> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Read the field out of a record
    pub fn get(&self, record: &R) -> FieldValue {
        (self.get)(record)
    }

    /// Store a value into the field
    pub fn set(&self, record: &mut R, value: FieldValue) -> Result<(), CoerceError> {
        (self.set)(record, value)
    }
}

impl<R> Clone for FieldAccessor<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            kind: self.kind,
            optional: self.optional,
            get: Arc::clone(&self.get),
            set: Arc::clone(&self.set),
        }
    }
}

impl<R> fmt::Debug for FieldAccessor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldAccessor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("optional", &self.optional)
            .finish_non_exhaustive()
    }
}

/// The fields a record type exposes to the mapper, in declaration order
pub struct FieldTable<R> {
    fields: Vec<FieldAccessor<R>>,
}

impl<R: 'static> FieldTable<R> {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Register a field through a pair of projections onto the record
    pub fn field<T>(
        self,
        name: &'static str,
        get: fn(&R) -> &T,
        set: fn(&mut R) -> &mut T,
    ) -> Self
    where
        T: FieldType + 'static,
    {
        self.field_with(
            name,
            T::KIND,
            T::OPTIONAL,
            move |r: &R| get(r).to_value(),
            move |r: &mut R, v| {
                *set(r) = T::from_value(v)?;
                Ok(())
            },
        )
    }

    /// Register a field with hand-written conversions
    pub fn field_with<G, S>(
        mut self,
        name: &'static str,
        kind: FieldKind,
        optional: bool,
        get: G,
        set: S,
    ) -> Self
    where
        G: Fn(&R) -> FieldValue + Send + Sync + 'static,
        S: Fn(&mut R, FieldValue) -> Result<(), CoerceError> + Send + Sync + 'static,
    {
        self.fields.push(FieldAccessor {
            name,
            kind,
            optional,
            get: Arc::new(get),
            set: Arc::new(set),
        });
        self
    }
}

impl<R> FieldTable<R> {
    /// Look a field up by exact name
    pub fn get(&self, name: &str) -> Option<&FieldAccessor<R>> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldAccessor<R>> {
        self.fields.iter()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<R: 'static> Default for FieldTable<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> fmt::Debug for FieldTable<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.fields).finish()
    }
}

/// A type whose values are exchanged with worksheet rows.
///
/// Records are default-constructed and then filled field by field on read,
/// so every record type needs a [`Default`].
pub trait Record: Default + 'static {
    fn fields() -> FieldTable<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Default, PartialEq)]
    struct Item {
        label: String,
        count: u8,
        price: Option<f64>,
        listed: Option<NaiveDate>,
    }

    impl Record for Item {
        fn fields() -> FieldTable<Self> {
            FieldTable::new()
                .field("label", |i: &Item| &i.label, |i: &mut Item| &mut i.label)
                .field("count", |i: &Item| &i.count, |i: &mut Item| &mut i.count)
                .field("price", |i: &Item| &i.price, |i: &mut Item| &mut i.price)
                .field("listed", |i: &Item| &i.listed, |i: &mut Item| &mut i.listed)
        }
    }

    #[test]
    fn test_table_lookup() {
        let table = Item::fields();
        assert_eq!(table.len(), 4);
        assert_eq!(table.get("count").map(|f| f.kind()), Some(FieldKind::Integer));
        assert!(table.get("price").unwrap().is_optional());
        assert!(!table.get("label").unwrap().is_optional());
        assert_eq!(table.get("listed").unwrap().kind(), FieldKind::Date);
        assert!(table.get("Label").is_none());
    }

    #[test]
    fn test_get_and_set() {
        let table = Item::fields();
        let mut item = Item::default();

        table
            .get("label")
            .unwrap()
            .set(&mut item, FieldValue::Text("pen".into()))
            .unwrap();
        table
            .get("count")
            .unwrap()
            .set(&mut item, FieldValue::Integer(3))
            .unwrap();
        table
            .get("price")
            .unwrap()
            .set(&mut item, FieldValue::Float(1.5))
            .unwrap();

        assert_eq!(
            item,
            Item {
                label: "pen".into(),
                count: 3,
                price: Some(1.5),
                listed: None,
            }
        );
        assert_eq!(table.get("listed").unwrap().get(&item), FieldValue::Null);
        assert_eq!(table.get("count").unwrap().get(&item), FieldValue::Integer(3));
    }

    #[test]
    fn test_conversion_failures() {
        assert_eq!(
            u8::from_value(FieldValue::Integer(300)),
            Err(CoerceError::OutOfRange {
                value: "300".into(),
                target: "u8",
            })
        );
        assert_eq!(u8::from_value(FieldValue::Null), Err(CoerceError::Missing));
        assert_eq!(
            bool::from_value(FieldValue::Text("x".into())),
            Err(CoerceError::KindMismatch {
                expected: FieldKind::Bool,
                found: "text",
            })
        );
        assert_eq!(Option::<u8>::from_value(FieldValue::Null), Ok(None));
        assert!(f32::from_value(FieldValue::Float(1e300)).is_err());
    }

    #[test]
    fn test_dates_widen_and_narrow() {
        let d = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let dt = d.and_hms_opt(6, 30, 0).unwrap();
        assert_eq!(NaiveDate::from_value(FieldValue::DateTime(dt)), Ok(d));
        assert_eq!(
            NaiveDateTime::from_value(FieldValue::Date(d)),
            Ok(d.and_hms_opt(0, 0, 0).unwrap())
        );
    }
}
