//! Batched resolution of identifier references across collections.
//!
//! Each registered [`JoinSpec`] costs one `$in` lookup for the whole result
//! set, however many rows reference the target collection.

use bson::{Bson, Document, doc, oid::ObjectId};
use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::database::Database;
use crate::error::OdmResult;
use crate::model::{Entity, Model, ModelType};
use crate::record::Record;
use crate::store::FindQuery;
use crate::value::Value;

/// A registered join: where the reference lives and where the related
/// record goes.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinSpec {
    source: String,
    target: ModelType,
    dest: Option<String>,
    projection: Option<Document>,
}

impl JoinSpec {
    /// Join records of `T` referenced from `source`.
    pub fn new<T: Model>(
        source: impl Into<String>,
        dest: Option<&str>,
        projection: Option<Document>,
    ) -> Self {
        Self {
            source: source.into(),
            target: ModelType::of::<T>(),
            dest: dest.filter(|d| !d.is_empty()).map(str::to_string),
            projection,
        }
    }

    /// Field holding the referenced identifier.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Model of the referenced records.
    pub fn target(&self) -> ModelType {
        self.target
    }

    /// Field receiving the related record.
    pub fn dest(&self) -> &str {
        self.dest.as_deref().unwrap_or(&self.source)
    }

    /// Projection applied to the lookup.
    pub fn projection(&self) -> Option<&Document> {
        self.projection.as_ref()
    }
}

/// A result row that joins can read references from and attach to.
///
/// Typed rows receive the related [`Record`]; raw rows receive it as a
/// serialized document.
pub trait Joinable {
    /// The ObjectId stored at `field`, if any.
    fn reference(&self, field: &str) -> Option<ObjectId>;

    /// Store a related record at `field`.
    fn attach(&mut self, field: &str, related: &Record);
}

impl Joinable for Record {
    fn reference(&self, field: &str) -> Option<ObjectId> {
        self.get(field).and_then(Value::as_object_id)
    }

    fn attach(&mut self, field: &str, related: &Record) {
        self.set(field, related.clone());
    }
}

impl<M: Model> Joinable for Entity<M> {
    fn reference(&self, field: &str) -> Option<ObjectId> {
        self.record().reference(field)
    }

    fn attach(&mut self, field: &str, related: &Record) {
        self.set(field, related.clone());
    }
}

impl Joinable for Document {
    fn reference(&self, field: &str) -> Option<ObjectId> {
        self.get_object_id(field).ok()
    }

    fn attach(&mut self, field: &str, related: &Record) {
        self.insert(field, related.to_document());
    }
}

/// Resolve `joins` in order over `items`.
pub fn resolve_joins<J: Joinable>(
    database: &Database,
    joins: &[JoinSpec],
    items: &mut [J],
) -> OdmResult<()> {
    for join in joins {
        let ids: IndexSet<ObjectId> = items
            .iter()
            .filter_map(|item| item.reference(join.source()))
            .collect();
        if ids.is_empty() {
            continue;
        }

        let ids = ids.into_iter().map(Bson::ObjectId).collect();
        let related = fetch_related(database, &join.target, ids, join.projection.clone())?;

        for item in items.iter_mut() {
            let Some(oid) = item.reference(join.source()) else {
                continue;
            };
            if let Some(record) = related.get(&oid.to_hex()) {
                item.attach(join.dest(), record);
            }
        }
    }
    Ok(())
}

/// Fetch records of `target` whose `_id` is in `ids`, keyed by `_id` string.
pub fn fetch_related(
    database: &Database,
    target: &ModelType,
    ids: Vec<Bson>,
    projection: Option<Document>,
) -> OdmResult<IndexMap<String, Record>> {
    let collection = database.collection(target)?;
    debug!(
        collection = %collection.name(),
        model = target.name(),
        ids = ids.len(),
        "Fetching joined documents"
    );

    let query = FindQuery::new(doc! { "_id": { "$in": ids } }).with_projection(projection);
    let mut related = IndexMap::new();
    for row in collection.find(&query)? {
        let record = target.fill(row?);
        if let Some(key) = record.id() {
            related.insert(key, record);
        }
    }
    Ok(related)
}
