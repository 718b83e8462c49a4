//! Field values held by a [`Record`](crate::record::Record).

use bson::{Bson, Document, oid::ObjectId};
use indexmap::IndexMap;

use crate::error::{OdmError, OdmResult};
use crate::record::Record;

/// A single field value of a record.
///
/// Raw store values pass through as [`Value::Bson`]. Nested documents that a
/// model registers as embedded become typed [`Value::Object`] records, and
/// registered lists become [`Value::Array`]. Join helpers write
/// [`Value::Object`] or [`Value::Keyed`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// An untyped BSON value, kept exactly as read.
    Bson(Bson),
    /// A typed nested record.
    Object(Box<Record>),
    /// An ordered sequence; embedded documents appear as `Object`.
    Array(Vec<Value>),
    /// Related records keyed by the string form of their `_id`.
    Keyed(IndexMap<String, Record>),
}

impl Value {
    /// Borrow the raw BSON value.
    pub fn as_bson(&self) -> Option<&Bson> {
        match self {
            Self::Bson(bson) => Some(bson),
            _ => None,
        }
    }

    /// Borrow the nested record.
    pub fn as_object(&self) -> Option<&Record> {
        match self {
            Self::Object(record) => Some(record),
            _ => None,
        }
    }

    /// Mutably borrow the nested record.
    pub fn as_object_mut(&mut self) -> Option<&mut Record> {
        match self {
            Self::Object(record) => Some(record),
            _ => None,
        }
    }

    /// Borrow the elements of an embedded list.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(values) => Some(values),
            _ => None,
        }
    }

    /// Borrow a keyed collection of related records.
    pub fn as_keyed(&self) -> Option<&IndexMap<String, Record>> {
        match self {
            Self::Keyed(records) => Some(records),
            _ => None,
        }
    }

    /// Borrow a raw string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Bson(Bson::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Get a raw ObjectId value.
    pub fn as_object_id(&self) -> Option<ObjectId> {
        match self {
            Self::Bson(Bson::ObjectId(oid)) => Some(*oid),
            _ => None,
        }
    }

    /// True for values that carry nothing: null, empty strings, zero,
    /// `false` and empty containers.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Bson(bson) => is_blank(bson),
            Self::Object(_) => false,
            Self::Array(values) => values.is_empty(),
            Self::Keyed(records) => records.is_empty(),
        }
    }

    /// Serialize this value back to BSON.
    pub fn to_bson(&self) -> Bson {
        match self {
            Self::Bson(bson) => bson.clone(),
            Self::Object(record) => Bson::Document(record.to_document()),
            Self::Array(values) => Bson::Array(values.iter().map(Value::to_bson).collect()),
            Self::Keyed(records) => {
                let mut doc = Document::new();
                for (key, record) in records {
                    doc.insert(key.clone(), record.to_document());
                }
                Bson::Document(doc)
            }
        }
    }
}

impl From<Bson> for Value {
    fn from(bson: Bson) -> Self {
        Self::Bson(bson)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Self::Object(Box::new(record))
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        Self::Bson(Bson::Document(doc))
    }
}

impl From<ObjectId> for Value {
    fn from(oid: ObjectId) -> Self {
        Self::Bson(Bson::ObjectId(oid))
    }
}

impl From<bson::DateTime> for Value {
    fn from(dt: bson::DateTime) -> Self {
        Self::Bson(Bson::DateTime(dt))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Bson(Bson::String(s.to_string()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Bson(Bson::String(s))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Bson(Bson::Int32(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Bson(Bson::Int64(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Bson(Bson::Double(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bson(Bson::Boolean(b))
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Self::Array(values)
    }
}

/// True for BSON values that carry nothing.
pub fn is_blank(bson: &Bson) -> bool {
    match bson {
        Bson::Null | Bson::Undefined => true,
        Bson::String(s) => s.is_empty(),
        Bson::Int32(n) => *n == 0,
        Bson::Int64(n) => *n == 0,
        Bson::Boolean(b) => !b,
        Bson::Array(items) => items.is_empty(),
        Bson::Document(doc) => doc.is_empty(),
        _ => false,
    }
}

/// String form of an identifier value.
///
/// ObjectIds render as 24 character hex, strings as themselves and numbers
/// in decimal. Blank values and containers have no string form.
pub fn id_string(bson: &Bson) -> Option<String> {
    if is_blank(bson) {
        return None;
    }
    match bson {
        Bson::ObjectId(oid) => Some(oid.to_hex()),
        Bson::String(s) => Some(s.clone()),
        Bson::Int32(n) => Some(n.to_string()),
        Bson::Int64(n) => Some(n.to_string()),
        Bson::Double(n) => Some(n.to_string()),
        Bson::Document(_) | Bson::Array(_) => None,
        other => Some(other.to_string()),
    }
}

/// Conversion into the store's identifier type.
pub trait IntoObjectId {
    /// Convert, failing when the value is not a valid identifier.
    fn into_object_id(self) -> OdmResult<ObjectId>;
}

impl IntoObjectId for ObjectId {
    fn into_object_id(self) -> OdmResult<ObjectId> {
        Ok(self)
    }
}

impl IntoObjectId for &ObjectId {
    fn into_object_id(self) -> OdmResult<ObjectId> {
        Ok(*self)
    }
}

impl IntoObjectId for &str {
    fn into_object_id(self) -> OdmResult<ObjectId> {
        ObjectId::parse_str(self).map_err(OdmError::from)
    }
}

impl IntoObjectId for String {
    fn into_object_id(self) -> OdmResult<ObjectId> {
        self.as_str().into_object_id()
    }
}

impl IntoObjectId for &String {
    fn into_object_id(self) -> OdmResult<ObjectId> {
        self.as_str().into_object_id()
    }
}

impl IntoObjectId for Bson {
    fn into_object_id(self) -> OdmResult<ObjectId> {
        match self {
            Bson::ObjectId(oid) => Ok(oid),
            Bson::String(s) => s.into_object_id(),
            other => Err(OdmError::invalid_object_id(format!(
                "cannot use {:?} as an object id",
                other.element_type()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_string() {
        let oid = ObjectId::new();
        assert_eq!(id_string(&Bson::ObjectId(oid)), Some(oid.to_hex()));
        assert_eq!(id_string(&Bson::String("DFKDF".into())), Some("DFKDF".into()));
        assert_eq!(id_string(&Bson::Int64(42)), Some("42".into()));
        assert_eq!(id_string(&Bson::String(String::new())), None);
        assert_eq!(id_string(&Bson::Null), None);
        assert_eq!(id_string(&Bson::Document(bson::doc! { "a": 1 })), None);
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(&Bson::Null));
        assert!(is_blank(&Bson::Int32(0)));
        assert!(is_blank(&Bson::Array(vec![])));
        assert!(!is_blank(&Bson::ObjectId(ObjectId::new())));
        assert!(!is_blank(&Bson::String("x".into())));
    }

    #[test]
    fn test_into_object_id() {
        let oid = ObjectId::new();
        assert_eq!(oid.to_hex().into_object_id().unwrap(), oid);
        assert_eq!(Bson::ObjectId(oid).into_object_id().unwrap(), oid);
        assert!("not-an-id".into_object_id().is_err());
        assert!(Bson::Int32(3).into_object_id().is_err());
    }

    #[test]
    fn test_value_to_bson_nested() {
        let mut inner = Record::untyped();
        inner.set("city", "Málaga");

        let value = Value::Array(vec![Value::from(inner), Value::from(7)]);
        let bson = value.to_bson();

        let items = bson.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0].as_document().unwrap().get_str("city").unwrap(),
            "Málaga"
        );
        assert_eq!(items[1], Bson::Int32(7));
    }
}
