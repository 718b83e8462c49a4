//! Model metadata, document filling and instance persistence.
//!
//! A model is a zero-sized marker type implementing [`Model`]. It describes
//! where documents live and which nested fields map to other models:
//!
//! ```rust
//! use docmap_core::{Model, ModelType};
//!
//! struct Address;
//!
//! impl Model for Address {
//!     const NAME: &'static str = "Address";
//! }
//!
//! struct Customer;
//!
//! impl Model for Customer {
//!     const NAME: &'static str = "Customer";
//!     const COLLECTION_NAME: Option<&'static str> = Some("customers");
//!     const TIMESTAMPS: bool = true;
//!     const EMBEDDED_OBJECT: &'static [(&'static str, ModelType)] =
//!         &[("address", ModelType::of::<Address>())];
//!     const EMBEDDED_OBJECT_LIST: &'static [(&'static str, ModelType)] =
//!         &[("past_addresses", ModelType::of::<Address>())];
//! }
//!
//! let customer = Customer::create(bson::doc! {
//!     "name": "Ana",
//!     "address": { "city": "Málaga" },
//! });
//! assert!(customer.object("address").unwrap().is::<Address>());
//! ```
//!
//! Instances are [`Entity`] values: a [`Record`] with the model attached at
//! the type level.

use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

use bson::{Bson, Document, doc};
use indexmap::IndexMap;
use tracing::debug;

use crate::database::Database;
use crate::error::{OdmError, OdmResult};
use crate::mapper::Mapper;
use crate::record::{ID_FIELD, Record, STRING_ID_FIELD};
use crate::store::{DeleteOutcome, InsertOutcome, UpdateOutcome};
use crate::value::{IntoObjectId, Value, is_blank};

/// Field stamped on first insert when timestamps are enabled.
pub const CREATED_AT: &str = "created_at";

/// Field stamped on every save when timestamps are enabled.
pub const UPDATED_AT: &str = "updated_at";

/// Static description of a document model.
pub trait Model: Sized + 'static {
    /// Model name, used in messages.
    const NAME: &'static str;

    /// Collection holding documents of this model.
    const COLLECTION_NAME: Option<&'static str> = None;

    /// Named connection in the [`Database`] registry; the first registered
    /// connection is used when unset.
    const CONNECTION_NAME: Option<&'static str> = None;

    /// Stamp `created_at` and `updated_at` on save.
    const TIMESTAMPS: bool = false;

    /// Fields holding a single nested document of another model.
    const EMBEDDED_OBJECT: &'static [(&'static str, ModelType)] = &[];

    /// Fields holding a list of nested documents of another model.
    const EMBEDDED_OBJECT_LIST: &'static [(&'static str, ModelType)] = &[];

    /// Default `chrono` format for [`Entity::date`].
    const DATE_FORMAT: &'static str = "%m/%d/%y";

    /// Default `chrono` format for [`Entity::time`].
    const TIME_FORMAT: &'static str = "%m/%d/%y %H:%M";

    /// The collection name declared by this model.
    ///
    /// Use [`Model::collection_name_in`] to include the registry default.
    fn collection_name() -> OdmResult<&'static str> {
        Self::COLLECTION_NAME
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                OdmError::config(format!("model {} has no collection name", Self::NAME))
            })
    }

    /// The collection this model reads from in `database`, falling back to
    /// the registry's default collection name.
    ///
    /// [`Model::collection_name`] only reports the declared name.
    fn collection_name_in(database: &Database) -> OdmResult<String> {
        database.collection_name(&Self::model_type())
    }

    /// The connection name declared by this model.
    fn connection_name() -> Option<&'static str> {
        Self::CONNECTION_NAME
    }

    /// Runtime descriptor of this model.
    fn model_type() -> ModelType {
        ModelType::of::<Self>()
    }

    /// Build the mapper used by the static helpers and instance joins.
    ///
    /// Override to hand out a differently configured mapper.
    fn mapper(database: &Database) -> OdmResult<Mapper<Self>> {
        Mapper::new(database)
    }

    /// Create an instance from a raw document.
    fn create(raw: Document) -> Entity<Self> {
        Entity::fill(raw)
    }

    /// Fill an instance from a raw document.
    fn fill(raw: Document) -> Entity<Self> {
        Entity::fill(raw)
    }

    /// Start a query; read results with [`Mapper::get`].
    fn find(
        database: &Database,
        filter: Document,
        projection: Option<Document>,
    ) -> OdmResult<Mapper<Self>> {
        let mut mapper = Self::mapper(database)?;
        mapper.find(filter, projection)?;
        Ok(mapper)
    }

    /// Fetch the first matching document.
    fn find_one(
        database: &Database,
        filter: Document,
        projection: Option<Document>,
    ) -> OdmResult<Option<Entity<Self>>> {
        Self::mapper(database)?.find_one(filter, projection)
    }

    /// Fetch a document by identifier.
    fn find_by_id(database: &Database, id: impl IntoObjectId) -> OdmResult<Option<Entity<Self>>> {
        Self::mapper(database)?.find_by_id(id)
    }
}

/// Model used for records that are not bound to a declared model.
#[derive(Debug, Clone, Copy, Default)]
pub struct Untyped;

impl Model for Untyped {
    const NAME: &'static str = "Untyped";
}

/// Runtime descriptor of a [`Model`], usable in constant tables.
#[derive(Clone, Copy)]
pub struct ModelType {
    name: &'static str,
    type_id: fn() -> TypeId,
    collection_name: Option<&'static str>,
    connection_name: Option<&'static str>,
    fill: fn(Document) -> Record,
}

impl ModelType {
    /// Descriptor for model `M`.
    pub const fn of<M: Model>() -> Self {
        Self {
            name: M::NAME,
            type_id: TypeId::of::<M>,
            collection_name: M::COLLECTION_NAME,
            connection_name: M::CONNECTION_NAME,
            fill: fill_record::<M>,
        }
    }

    /// Model name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared collection name, if any.
    pub fn collection_name(&self) -> Option<&'static str> {
        self.collection_name.filter(|name| !name.is_empty())
    }

    /// Declared connection name, if any.
    pub fn connection_name(&self) -> Option<&'static str> {
        self.connection_name
    }

    /// Fill a record of this model from a raw document.
    pub fn fill(&self, raw: Document) -> Record {
        (self.fill)(raw)
    }

    pub(crate) fn type_id(&self) -> TypeId {
        (self.type_id)()
    }
}

impl PartialEq for ModelType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id() == other.type_id()
    }
}

impl Eq for ModelType {}

impl fmt::Debug for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelType")
            .field("name", &self.name)
            .field("collection_name", &self.collection_name)
            .finish()
    }
}

fn embedded_type(table: &[(&'static str, ModelType)], field: &str) -> Option<ModelType> {
    table
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, model)| *model)
}

/// Populate a record of model `M` from a raw document.
///
/// Registered embedded fields are filled recursively as their declared
/// model; every other value is kept as is.
pub fn fill_record<M: Model>(raw: Document) -> Record {
    let mut record = Record::new(ModelType::of::<M>());

    for (key, value) in raw {
        let list_type = embedded_type(M::EMBEDDED_OBJECT_LIST, &key);
        let object_type = embedded_type(M::EMBEDDED_OBJECT, &key);

        let value = match (value, list_type, object_type) {
            (Bson::Array(items), Some(model), _) => Value::Array(
                items
                    .into_iter()
                    .map(|item| match item {
                        Bson::Document(doc) => Value::from(model.fill(doc)),
                        other => Value::Bson(other),
                    })
                    .collect(),
            ),
            (Bson::Document(doc), _, Some(model)) => Value::from(model.fill(doc)),
            (value, _, _) => Value::Bson(value),
        };
        record.insert_value(key, value);
    }

    record.sync_string_id();
    record
}

/// Store outcome of [`Entity::save`].
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// The record was new and got inserted.
    Inserted(InsertOutcome),
    /// The record already had an `_id` and got updated.
    Updated(UpdateOutcome),
}

impl SaveOutcome {
    /// Check whether the save inserted a new document.
    pub fn is_insert(&self) -> bool {
        matches!(self, Self::Inserted(_))
    }
}

/// An instance of model `M`.
pub struct Entity<M: Model> {
    record: Record,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Entity<M> {
    /// Create an instance without fields.
    pub fn new() -> Self {
        Self::wrap(Record::new(ModelType::of::<M>()))
    }

    /// Fill an instance from a raw document.
    pub fn fill(raw: Document) -> Self {
        Self::wrap(fill_record::<M>(raw))
    }

    /// View a record as an instance of `M`, if it was filled as `M`.
    pub fn from_record(record: Record) -> Option<Self> {
        record.is::<M>().then(|| Self::wrap(record))
    }

    fn wrap(record: Record) -> Self {
        Self {
            record,
            _model: PhantomData,
        }
    }

    /// Borrow the underlying record.
    pub fn record(&self) -> &Record {
        &self.record
    }

    /// Unwrap the underlying record.
    pub fn into_record(self) -> Record {
        self.record
    }

    /// Insert or update this instance.
    ///
    /// An instance with an `_id` is updated with `$set` of its current
    /// fields; nothing is sent when `_id` is its only field. Otherwise a fresh
    /// ObjectId is assigned and the document is inserted; an identifier
    /// chosen by the store replaces it. The instance is left untouched when
    /// the store call fails.
    pub fn save(&mut self, database: &Database) -> OdmResult<SaveOutcome> {
        let mapper = M::mapper(database)?;
        let existing = self.record.has_object_id();
        let now = M::TIMESTAMPS.then(bson::DateTime::now);

        let mut payload = self.record.to_document();
        payload.remove(STRING_ID_FIELD);
        if let Some(now) = now {
            if !existing {
                payload.insert(CREATED_AT, now);
            }
            payload.insert(UPDATED_AT, now);
        }

        if existing {
            let id = payload.remove(ID_FIELD).ok_or(OdmError::MissingId)?;
            if payload.is_empty() {
                debug!(model = M::NAME, id = %id, "Nothing to update");
                return Ok(SaveOutcome::Updated(UpdateOutcome::default()));
            }

            debug!(model = M::NAME, id = %id, "Updating document");
            let outcome = mapper.update_one(doc! { "_id": id }, doc! { "$set": payload })?;
            if let Some(now) = now {
                self.record.set(UPDATED_AT, now);
            }
            self.record.remove(STRING_ID_FIELD);
            Ok(SaveOutcome::Updated(outcome))
        } else {
            let id = Bson::ObjectId(bson::oid::ObjectId::new());
            payload.insert(ID_FIELD, id.clone());

            debug!(model = M::NAME, id = %id, "Inserting document");
            let outcome = mapper.insert_one(payload)?;
            if let Some(now) = now {
                self.record.set(CREATED_AT, now);
                self.record.set(UPDATED_AT, now);
            }
            self.record.set(ID_FIELD, outcome.inserted_id.clone());
            self.record.remove(STRING_ID_FIELD);
            Ok(SaveOutcome::Inserted(outcome))
        }
    }

    /// Delete the stored document.
    pub fn remove(&self, database: &Database) -> OdmResult<DeleteOutcome> {
        if !self.record.has_object_id() {
            return Err(OdmError::MissingId);
        }
        let id = self.record.object_id().cloned().ok_or(OdmError::MissingId)?;
        debug!(model = M::NAME, id = %id, "Removing document");
        M::mapper(database)?.delete_one(doc! { "_id": id })
    }

    /// Replace the identifier held in `field` with the related `T` record.
    ///
    /// The record lands in `dest`, or back in `field` when `dest` is `None`.
    /// Nothing changes when `field` is unset or blank. When no related
    /// document exists, `dest` is cleared.
    pub fn join_one<T: Model>(
        &mut self,
        database: &Database,
        field: &str,
        dest: Option<&str>,
        projection: Option<Document>,
    ) -> OdmResult<&mut Self> {
        let Some(id) = self.record.get_bson(field).filter(|v| !is_blank(v)) else {
            return Ok(self);
        };
        if matches!(id, Bson::Array(_)) {
            return Ok(self);
        }

        let related = T::mapper(database)?.find_one(doc! { "_id": id.clone() }, projection)?;
        let dest = dest.unwrap_or(field);
        match related {
            Some(related) => {
                self.record.set(dest, related.into_record());
            }
            None => {
                self.record.remove(dest);
            }
        }
        Ok(self)
    }

    /// Replace the identifier list held in `field` with the related `T`
    /// records, keyed by their `_id` string, fetched in one lookup.
    ///
    /// Nothing changes when `field` is unset or not a non-empty list.
    pub fn join_many<T: Model>(
        &mut self,
        database: &Database,
        field: &str,
        dest: Option<&str>,
        projection: Option<Document>,
    ) -> OdmResult<&mut Self> {
        let ids = match self.record.get_bson(field) {
            Some(Bson::Array(ids)) if !ids.is_empty() => ids.clone(),
            _ => return Ok(self),
        };

        let mut mapper = T::mapper(database)?;
        let related = mapper
            .find(doc! { "_id": { "$in": ids } }, projection)?
            .get()?;

        let mut keyed = IndexMap::with_capacity(related.len());
        for entity in related {
            if let Some(key) = entity.id() {
                keyed.insert(key, entity.into_record());
            }
        }
        self.record
            .set(dest.unwrap_or(field), Value::Keyed(keyed));
        Ok(self)
    }

    /// Format a datetime field with `format`, or the model's date format.
    pub fn date(&self, field: &str, format: Option<&str>) -> Option<String> {
        self.format_datetime(field, format.unwrap_or(M::DATE_FORMAT))
    }

    /// Format a datetime field with `format`, or the model's time format.
    pub fn time(&self, field: &str, format: Option<&str>) -> Option<String> {
        self.format_datetime(field, format.unwrap_or(M::TIME_FORMAT))
    }

    fn format_datetime(&self, field: &str, format: &str) -> Option<String> {
        let dt = self.record.get_datetime(field)?;
        Some(dt.to_chrono().format(format).to_string())
    }
}

impl<M: Model> Default for Entity<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> Clone for Entity<M> {
    fn clone(&self) -> Self {
        Self::wrap(self.record.clone())
    }
}

impl<M: Model> PartialEq for Entity<M> {
    fn eq(&self, other: &Self) -> bool {
        self.record == other.record
    }
}

impl<M: Model> fmt::Debug for Entity<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple(M::NAME).field(&self.record).finish()
    }
}

impl<M: Model> Deref for Entity<M> {
    type Target = Record;

    fn deref(&self) -> &Record {
        &self.record
    }
}

impl<M: Model> DerefMut for Entity<M> {
    fn deref_mut(&mut self) -> &mut Record {
        &mut self.record
    }
}

impl<M: Model> From<Entity<M>> for Record {
    fn from(entity: Entity<M>) -> Self {
        entity.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::oid::ObjectId;
    use pretty_assertions::assert_eq;

    struct Address;

    impl Model for Address {
        const NAME: &'static str = "Address";
    }

    struct Sample;

    impl Model for Sample {
        const NAME: &'static str = "Sample";
        const COLLECTION_NAME: Option<&'static str> = Some("samples");
        const EMBEDDED_OBJECT: &'static [(&'static str, ModelType)] =
            &[("address", ModelType::of::<Address>())];
        const EMBEDDED_OBJECT_LIST: &'static [(&'static str, ModelType)] =
            &[("address_list", ModelType::of::<Address>())];
    }

    #[test]
    fn test_fill_empty() {
        let entity = Sample::create(Document::new());
        assert!(entity.is_empty());
        assert!(entity.id().is_none());
    }

    #[test]
    fn test_fill_flat() {
        let entity = Untyped::create(doc! { "field1": "value1" });
        assert_eq!(entity.get_str("field1"), Some("value1"));
    }

    #[test]
    fn test_fill_unregistered_nested_stays_raw() {
        let entity = Untyped::create(doc! {
            "field1": "value1",
            "field2": { "fieldIn1": "valueIn1" },
        });

        let nested = entity.get_bson("field2").and_then(Bson::as_document).unwrap();
        assert_eq!(nested.get_str("fieldIn1").unwrap(), "valueIn1");
        assert!(entity.object("field2").is_none());
    }

    #[test]
    fn test_fill_with_id() {
        let entity = Untyped::create(doc! { "_id": "DFKDF", "field1": "value1" });
        assert_eq!(entity.get_str("field1"), Some("value1"));
        assert_eq!(entity.id().as_deref(), Some("DFKDF"));
    }

    #[test]
    fn test_fill_with_object_id_drops_raw_id() {
        let oid = ObjectId::new();
        let entity = Untyped::create(doc! { "_id": oid, "id": "stale" });
        assert_eq!(entity.id(), Some(oid.to_hex()));
        assert!(!entity.contains("id"));
    }

    #[test]
    fn test_fill_embedded_object() {
        let entity = Sample::create(doc! {
            "name": "My name",
            "address": { "city": "Málaga", "country": "Spain" },
        });

        assert_eq!(entity.get_str("name"), Some("My name"));
        let address = entity.object("address").unwrap();
        assert!(address.is::<Address>());
        assert_eq!(address.get_str("city"), Some("Málaga"));
        assert_eq!(address.get_str("country"), Some("Spain"));
    }

    #[test]
    fn test_fill_embedded_list_keeps_index() {
        let entity = Sample::create(doc! {
            "address_list": [
                { "city": "Málaga" },
                "not a document",
                { "city": "Barcelona" },
            ],
        });

        let list = entity.array("address_list").unwrap();
        assert_eq!(list.len(), 3);
        assert!(list[0].as_object().unwrap().is::<Address>());
        assert_eq!(list[0].as_object().unwrap().get_str("city"), Some("Málaga"));
        assert_eq!(list[1].as_str(), Some("not a document"));
        assert_eq!(list[2].as_object().unwrap().get_str("city"), Some("Barcelona"));
    }

    #[test]
    fn test_embedded_field_with_wrong_shape_passes_through() {
        let entity = Sample::create(doc! { "address": "somewhere", "address_list": { "a": 1 } });
        assert_eq!(entity.get_str("address"), Some("somewhere"));
        assert!(entity.get_bson("address_list").unwrap().as_document().is_some());
    }

    #[test]
    fn test_collection_name_missing() {
        let err = Untyped::collection_name().unwrap_err();
        assert!(err.is_config_error());
        assert_eq!(Sample::collection_name().unwrap(), "samples");
    }

    #[test]
    fn test_from_record_checks_model() {
        let record = Sample::create(doc! { "a": 1 }).into_record();
        assert!(Entity::<Address>::from_record(record.clone()).is_none());
        assert!(Entity::<Sample>::from_record(record).is_some());
    }

    #[test]
    fn test_date_and_time_formatting() {
        use chrono::TimeZone;

        let dt = bson::DateTime::from_chrono(
            chrono::Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap(),
        );
        let entity = Sample::create(doc! { "created_at": dt, "name": "x" });

        assert_eq!(entity.date("created_at", None).as_deref(), Some("03/09/24"));
        assert_eq!(entity.time("created_at", None).as_deref(), Some("03/09/24 14:05"));
        assert_eq!(
            entity.date("created_at", Some("%Y-%m-%d")).as_deref(),
            Some("2024-03-09")
        );
        assert!(entity.date("name", None).is_none());
        assert!(entity.date("missing", None).is_none());
    }
}
