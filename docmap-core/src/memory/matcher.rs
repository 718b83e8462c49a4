//! Query-document evaluation for the in-memory store.

use std::cmp::Ordering;

use bson::{Bson, Document};

use super::MemoryStoreError;

type MatchResult<T> = Result<T, MemoryStoreError>;

/// Check whether `document` satisfies `filter`.
pub fn matches(document: &Document, filter: &Document) -> MatchResult<bool> {
    for (key, condition) in filter {
        let matched = match key.as_str() {
            "$and" => clauses(key, condition)?
                .iter()
                .map(|clause| matches(document, clause))
                .collect::<MatchResult<Vec<_>>>()?
                .into_iter()
                .all(|m| m),
            "$or" => clauses(key, condition)?
                .iter()
                .map(|clause| matches(document, clause))
                .collect::<MatchResult<Vec<_>>>()?
                .into_iter()
                .any(|m| m),
            op if op.starts_with('$') => {
                return Err(MemoryStoreError::UnsupportedOperator(op.to_string()));
            }
            path => matches_field(lookup(document, path), condition)?,
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn clauses<'a>(operator: &str, condition: &'a Bson) -> MatchResult<Vec<&'a Document>> {
    let invalid = || MemoryStoreError::InvalidOperand {
        operator: operator.to_string(),
        reason: "expected an array of documents".to_string(),
    };
    match condition {
        Bson::Array(items) => items
            .iter()
            .map(|item| item.as_document().ok_or_else(invalid))
            .collect(),
        _ => Err(invalid()),
    }
}

fn matches_field(value: Option<&Bson>, condition: &Bson) -> MatchResult<bool> {
    match condition {
        Bson::Document(ops) if is_operator_document(ops) => {
            for (op, operand) in ops {
                if !apply_operator(value, op, operand)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        expected => Ok(equals(value, expected)),
    }
}

fn is_operator_document(doc: &Document) -> bool {
    doc.keys().next().is_some_and(|k| k.starts_with('$'))
}

fn apply_operator(value: Option<&Bson>, op: &str, operand: &Bson) -> MatchResult<bool> {
    let matched = match op {
        "$eq" => equals(value, operand),
        "$ne" => !equals(value, operand),
        "$gt" => compares(value, operand, |o| o == Ordering::Greater),
        "$gte" => compares(value, operand, |o| o != Ordering::Less),
        "$lt" => compares(value, operand, |o| o == Ordering::Less),
        "$lte" => compares(value, operand, |o| o != Ordering::Greater),
        "$in" => operand_list(op, operand)?
            .iter()
            .any(|candidate| equals(value, candidate)),
        "$nin" => !operand_list(op, operand)?
            .iter()
            .any(|candidate| equals(value, candidate)),
        "$exists" => value.is_some() == truthy(operand),
        other => return Err(MemoryStoreError::UnsupportedOperator(other.to_string())),
    };
    Ok(matched)
}

fn operand_list<'a>(operator: &str, operand: &'a Bson) -> MatchResult<&'a Vec<Bson>> {
    operand
        .as_array()
        .ok_or_else(|| MemoryStoreError::InvalidOperand {
            operator: operator.to_string(),
            reason: "expected an array".to_string(),
        })
}

/// Equality with array-contains semantics; a missing field equals null.
fn equals(value: Option<&Bson>, expected: &Bson) -> bool {
    match value {
        None => matches!(expected, Bson::Null),
        Some(Bson::Array(items)) if !matches!(expected, Bson::Array(_)) => {
            items.iter().any(|item| values_equal(item, expected))
        }
        Some(actual) => values_equal(actual, expected),
    }
}

fn compares(value: Option<&Bson>, operand: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    match value {
        Some(Bson::Array(items)) => items
            .iter()
            .any(|item| compare_bson(item, operand).is_some_and(&accept)),
        Some(actual) => compare_bson(actual, operand).is_some_and(accept),
        None => false,
    }
}

fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Null => false,
        other => as_f64(other).is_none_or(|n| n != 0.0),
    }
}

/// Order two values of comparable types. Mixed types do not compare.
pub fn compare_bson(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => Some(x.bytes().cmp(&y.bytes())),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::Null, Bson::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// Read a possibly dotted path.
pub fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    match path.split_once('.') {
        None => document.get(path),
        Some((head, rest)) => match document.get(head)? {
            Bson::Document(inner) => lookup(inner, rest),
            _ => None,
        },
    }
}

fn assign(document: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(document.get(head), Some(Bson::Document(_))) {
                document.insert(head, Document::new());
            }
            if let Some(Bson::Document(inner)) = document.get_mut(head) {
                assign(inner, rest, value);
            }
        }
    }
}

fn unassign(document: &mut Document, path: &str) -> bool {
    match path.split_once('.') {
        None => document.remove(path).is_some(),
        Some((head, rest)) => match document.get_mut(head) {
            Some(Bson::Document(inner)) => unassign(inner, rest),
            _ => false,
        },
    }
}

/// Apply a projection: inclusion when any non-`_id` field is truthy,
/// exclusion otherwise. `_id` is kept unless excluded explicitly.
pub fn project(document: &Document, projection: &Document) -> Document {
    let inclusive = projection
        .iter()
        .any(|(key, flag)| key != "_id" && truthy(flag));

    if !inclusive {
        let mut projected = document.clone();
        for (key, flag) in projection {
            if !truthy(flag) {
                unassign(&mut projected, key);
            }
        }
        return projected;
    }

    let mut projected = Document::new();
    let keep_id = projection.get("_id").is_none_or(truthy);
    if let Some(id) = document.get("_id").filter(|_| keep_id) {
        projected.insert("_id", id.clone());
    }
    for (key, flag) in projection {
        if key == "_id" || !truthy(flag) {
            continue;
        }
        if let Some(value) = lookup(document, key) {
            assign(&mut projected, key, value.clone());
        }
    }
    projected
}

/// Stable multi-key sort; a negative direction sorts descending.
pub fn sort_documents(documents: &mut [Document], sort: &Document) {
    let keys: Vec<(&str, bool)> = sort
        .iter()
        .map(|(key, direction)| {
            let descending = as_f64(direction).is_some_and(|d| d < 0.0);
            (key.as_str(), descending)
        })
        .collect();

    documents.sort_by(|a, b| {
        for (key, descending) in &keys {
            let ordering = match (lookup(a, key), lookup(b, key)) {
                (Some(x), Some(y)) => compare_bson(x, y).unwrap_or(Ordering::Equal),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            let ordering = if *descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

/// Apply an update document in place and report whether anything changed.
///
/// Without update operators the document is replaced, keeping its `_id`.
pub fn apply_update(document: &mut Document, update: &Document) -> MatchResult<bool> {
    let before = document.clone();

    if !is_operator_document(update) {
        let id = document.get("_id").cloned();
        *document = Document::new();
        if let Some(id) = id {
            document.insert("_id", id);
        }
        for (key, value) in update {
            if key != "_id" {
                document.insert(key.clone(), value.clone());
            }
        }
        return Ok(*document != before);
    }

    for (op, fields) in update {
        let fields = fields
            .as_document()
            .ok_or_else(|| MemoryStoreError::InvalidOperand {
                operator: op.clone(),
                reason: "expected a document".to_string(),
            })?;
        match op.as_str() {
            "$set" => {
                for (path, value) in fields {
                    assign(document, path, value.clone());
                }
            }
            "$unset" => {
                for path in fields.keys() {
                    unassign(document, path);
                }
            }
            "$inc" => {
                for (path, delta) in fields {
                    let current = lookup(document, path).cloned().unwrap_or(Bson::Int32(0));
                    let sum = add(&current, delta).ok_or_else(|| MemoryStoreError::InvalidOperand {
                        operator: op.clone(),
                        reason: format!("cannot increment non-numeric field '{}'", path),
                    })?;
                    assign(document, path, sum);
                }
            }
            other => return Err(MemoryStoreError::UnsupportedOperator(other.to_string())),
        }
    }
    Ok(*document != before)
}

fn add(a: &Bson, b: &Bson) -> Option<Bson> {
    let sum = match (a, b) {
        (Bson::Int32(x), Bson::Int32(y)) => match x.checked_add(*y) {
            Some(n) => Bson::Int32(n),
            None => Bson::Int64(i64::from(*x) + i64::from(*y)),
        },
        (Bson::Int32(x), Bson::Int64(y)) => Bson::Int64(i64::from(*x) + y),
        (Bson::Int64(x), Bson::Int32(y)) => Bson::Int64(x + i64::from(*y)),
        (Bson::Int64(x), Bson::Int64(y)) => Bson::Int64(x + y),
        _ => Bson::Double(as_f64(a)? + as_f64(b)?),
    };
    Some(sum)
}

/// Seed a new document from the equality conditions of a filter.
pub fn upsert_seed(filter: &Document) -> Document {
    let mut seed = Document::new();
    for (key, condition) in filter {
        if key.starts_with('$') {
            continue;
        }
        match condition {
            Bson::Document(ops) if is_operator_document(ops) => {
                if let Some(value) = ops.get("$eq") {
                    assign(&mut seed, key, value.clone());
                }
            }
            value => assign(&mut seed, key, value.clone()),
        }
    }
    seed
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use bson::oid::ObjectId;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_equality_and_missing_fields() {
        let document = doc! { "name": "Ana", "age": 31, "tags": ["a", "b"] };

        assert!(matches(&document, &doc! { "name": "Ana" }).unwrap());
        assert!(matches(&document, &doc! { "age": 31_i64 }).unwrap());
        assert!(matches(&document, &doc! { "tags": "b" }).unwrap());
        assert!(matches(&document, &doc! { "nickname": null }).unwrap());
        assert!(!matches(&document, &doc! { "name": "Bo" }).unwrap());
    }

    #[test]
    fn test_comparison_operators() {
        let document = doc! { "age": 31 };

        assert!(matches(&document, &doc! { "age": { "$gt": 30, "$lte": 31 } }).unwrap());
        assert!(!matches(&document, &doc! { "age": { "$lt": 31 } }).unwrap());
        assert!(matches(&document, &doc! { "age": { "$ne": 30 } }).unwrap());
        assert!(!matches(&document, &doc! { "missing": { "$gt": 0 } }).unwrap());
    }

    #[test]
    fn test_set_operators() {
        let id = ObjectId::new();
        let document = doc! { "_id": id, "status": "open" };

        assert!(matches(&document, &doc! { "_id": { "$in": [ObjectId::new(), id] } }).unwrap());
        assert!(matches(&document, &doc! { "status": { "$nin": ["closed"] } }).unwrap());
        assert!(matches(&document, &doc! { "status": { "$exists": true } }).unwrap());
        assert!(matches(&document, &doc! { "owner": { "$exists": false } }).unwrap());
    }

    #[test]
    fn test_logical_operators() {
        let document = doc! { "a": 1, "b": 2 };

        assert!(matches(&document, &doc! { "$or": [{ "a": 5 }, { "b": 2 }] }).unwrap());
        assert!(!matches(&document, &doc! { "$and": [{ "a": 1 }, { "b": 3 }] }).unwrap());
    }

    #[test]
    fn test_unsupported_operator() {
        let err = matches(&doc! { "a": 1 }, &doc! { "a": { "$regex": "x" } }).unwrap_err();
        assert!(matches!(err, MemoryStoreError::UnsupportedOperator(op) if op == "$regex"));
    }

    #[test]
    fn test_dotted_lookup() {
        let document = doc! { "address": { "city": "Lyon" } };
        assert!(matches(&document, &doc! { "address.city": "Lyon" }).unwrap());
    }

    #[test]
    fn test_inclusive_projection() {
        let document = doc! { "_id": 1, "name": "Ana", "age": 31 };

        assert_eq!(project(&document, &doc! { "name": 1 }), doc! { "_id": 1, "name": "Ana" });
        assert_eq!(project(&document, &doc! { "name": 1, "_id": 0 }), doc! { "name": "Ana" });
    }

    #[test]
    fn test_exclusive_projection() {
        let document = doc! { "_id": 1, "name": "Ana", "age": 31 };
        assert_eq!(project(&document, &doc! { "age": 0 }), doc! { "_id": 1, "name": "Ana" });
    }

    #[test]
    fn test_multi_key_sort() {
        let mut documents = vec![
            doc! { "g": 1, "n": 1 },
            doc! { "g": 2, "n": 5 },
            doc! { "g": 1, "n": 3 },
        ];
        sort_documents(&mut documents, &doc! { "g": 1, "n": -1 });

        let order: Vec<i32> = documents.iter().map(|d| d.get_i32("n").unwrap()).collect();
        assert_eq!(order, vec![3, 1, 5]);
    }

    #[test]
    fn test_update_operators() {
        let mut document = doc! { "_id": 1, "count": 1, "stale": true };
        let changed = apply_update(
            &mut document,
            &doc! {
                "$set": { "name": "x", "meta.seen": true },
                "$unset": { "stale": "" },
                "$inc": { "count": 2 },
            },
        )
        .unwrap();

        assert!(changed);
        assert_eq!(
            document,
            doc! { "_id": 1, "count": 3, "name": "x", "meta": { "seen": true } }
        );
    }

    #[test]
    fn test_replacement_keeps_id() {
        let mut document = doc! { "_id": 1, "a": 1 };
        apply_update(&mut document, &doc! { "b": 2 }).unwrap();
        assert_eq!(document, doc! { "_id": 1, "b": 2 });
    }

    #[test]
    fn test_noop_update_reports_unchanged() {
        let mut document = doc! { "_id": 1, "a": 1 };
        assert!(!apply_update(&mut document, &doc! { "$set": { "a": 1 } }).unwrap());
    }

    #[test]
    fn test_upsert_seed() {
        let seed = upsert_seed(&doc! { "email": "a@b.c", "age": { "$gt": 3 }, "kind": { "$eq": "x" } });
        assert_eq!(seed, doc! { "email": "a@b.c", "kind": "x" });
    }
}
