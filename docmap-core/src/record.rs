//! The data record backing every model instance.

use std::any::TypeId;

use bson::{Bson, Document};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;

use crate::error::OdmResult;
use crate::model::{Model, ModelType, Untyped};
use crate::value::{IntoObjectId, Value, id_string, is_blank};

/// Field name of the store identifier.
pub const ID_FIELD: &str = "_id";

/// Field name of the derived string identifier.
pub const STRING_ID_FIELD: &str = "id";

/// An ordered field map tagged with the model type that filled it.
///
/// Reading a field that was never assigned yields `None`. The string `id`
/// is never stored on its own; [`Record::id`] derives it from `_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    model: ModelType,
    fields: IndexMap<String, Value>,
}

impl Record {
    /// Create an empty record of the given model type.
    pub fn new(model: ModelType) -> Self {
        Self {
            model,
            fields: IndexMap::new(),
        }
    }

    /// Create an empty record that is not bound to any declared model.
    pub fn untyped() -> Self {
        Self::new(ModelType::of::<Untyped>())
    }

    /// The model type this record was filled as.
    pub fn model_type(&self) -> ModelType {
        self.model
    }

    /// Check whether this record was filled as model `M`.
    pub fn is<M: Model>(&self) -> bool {
        self.model.type_id() == TypeId::of::<M>()
    }

    /// Get a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Get a mutable field value.
    pub fn get_mut(&mut self, field: &str) -> Option<&mut Value> {
        self.fields.get_mut(field)
    }

    /// Get a raw BSON field value.
    pub fn get_bson(&self, field: &str) -> Option<&Bson> {
        self.get(field).and_then(Value::as_bson)
    }

    /// Get a raw string field value.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Get a raw 32-bit integer field value.
    pub fn get_i32(&self, field: &str) -> Option<i32> {
        match self.get_bson(field)? {
            Bson::Int32(n) => Some(*n),
            _ => None,
        }
    }

    /// Get a raw 64-bit integer field value, widening 32-bit integers.
    pub fn get_i64(&self, field: &str) -> Option<i64> {
        match self.get_bson(field)? {
            Bson::Int32(n) => Some(i64::from(*n)),
            Bson::Int64(n) => Some(*n),
            _ => None,
        }
    }

    /// Get a raw datetime field value.
    pub fn get_datetime(&self, field: &str) -> Option<bson::DateTime> {
        match self.get_bson(field)? {
            Bson::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Get a nested typed record.
    pub fn object(&self, field: &str) -> Option<&Record> {
        self.get(field).and_then(Value::as_object)
    }

    /// Get the elements of a list field.
    pub fn array(&self, field: &str) -> Option<&[Value]> {
        self.get(field).and_then(Value::as_array)
    }

    /// Get a keyed collection of related records.
    pub fn keyed(&self, field: &str) -> Option<&IndexMap<String, Record>> {
        self.get(field).and_then(Value::as_keyed)
    }

    /// Assign a field, returning the previous value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    /// Remove a field, keeping the order of the remaining ones.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.shift_remove(field)
    }

    /// Check whether a field is assigned.
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Iterate over fields in assignment order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of assigned fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check whether no field is assigned.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The raw `_id` value.
    pub fn object_id(&self) -> Option<&Bson> {
        self.get_bson(ID_FIELD)
    }

    /// Check whether `_id` is assigned and not blank.
    pub fn has_object_id(&self) -> bool {
        self.object_id().is_some_and(|id| !is_blank(id))
    }

    /// String form of `_id`.
    pub fn id(&self) -> Option<String> {
        self.object_id().and_then(id_string)
    }

    /// Set `_id` from a hex string or ObjectId.
    pub fn set_id(&mut self, id: impl IntoObjectId) -> OdmResult<()> {
        let oid = id.into_object_id()?;
        self.fields.shift_remove(STRING_ID_FIELD);
        self.fields.insert(ID_FIELD.to_string(), Value::from(oid));
        Ok(())
    }

    /// Serialize the record, recursing into nested records.
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        for (key, value) in &self.fields {
            doc.insert(key.clone(), value.to_bson());
        }
        doc
    }

    /// Deserialize the record into a serde type.
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> OdmResult<T> {
        Ok(bson::from_document(self.to_document())?)
    }

    /// Drop a raw `id` field shadowed by a present `_id`.
    pub(crate) fn sync_string_id(&mut self) {
        if self.has_object_id() {
            self.fields.shift_remove(STRING_ID_FIELD);
        }
    }

    pub(crate) fn insert_value(&mut self, field: String, value: Value) {
        self.fields.insert(field, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{doc, oid::ObjectId};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_field_is_none() {
        let record = Record::untyped();
        assert!(record.get("anything").is_none());
        assert!(record.get_str("anything").is_none());
        assert!(record.id().is_none());
        assert!(!record.has_object_id());
    }

    #[test]
    fn test_set_and_remove_keep_order() {
        let mut record = Record::untyped();
        record.set("a", 1);
        record.set("b", 2);
        record.set("c", 3);
        record.remove("b");

        let keys: Vec<_> = record.fields().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "c"]);
    }

    #[test]
    fn test_set_id_keeps_id_in_sync() {
        let oid = ObjectId::new();
        let mut record = Record::untyped();
        record.set("id", "stale");
        record.set_id(oid.to_hex()).unwrap();

        assert_eq!(record.object_id(), Some(&Bson::ObjectId(oid)));
        assert_eq!(record.id(), Some(oid.to_hex()));
        assert!(!record.contains("id"));
    }

    #[test]
    fn test_set_id_rejects_invalid_hex() {
        let mut record = Record::untyped();
        assert!(record.set_id("zz").is_err());
        assert!(!record.has_object_id());
    }

    #[test]
    fn test_blank_id_is_not_an_id() {
        let mut record = Record::untyped();
        record.set("_id", "");
        assert!(!record.has_object_id());
        assert!(record.id().is_none());
    }

    #[test]
    fn test_to_document_and_deserialize() {
        #[derive(Debug, PartialEq, serde::Deserialize)]
        struct Person {
            name: String,
            age: i32,
        }

        let mut record = Record::untyped();
        record.set("name", "Carol");
        record.set("age", 35);

        assert_eq!(record.to_document(), doc! { "name": "Carol", "age": 35 });
        let person: Person = record.deserialize_into().unwrap();
        assert_eq!(
            person,
            Person {
                name: "Carol".to_string(),
                age: 35
            }
        );
    }
}
