use bson::{Bson, Document as BsonDocument};
use std::cmp::Ordering;

use super::types::{CmpOp, Filter, MAX_IN_SET, MAX_PATH_DEPTH, MAX_SORT_FIELDS, SortSpec};
use crate::document::ID_FIELD;

pub fn eval_filter(doc: &BsonDocument, filter: &Filter) -> bool {
    match filter {
        Filter::True => true,
        Filter::And(fs) => fs.iter().all(|f| eval_filter(doc, f)),
        Filter::Or(fs) => fs.iter().any(|f| eval_filter(doc, f)),
        Filter::Not(f) => !eval_filter(doc, f),
        Filter::Exists { path, exists } => get_path(doc, path).is_some() == *exists,
        Filter::In { path, values } => get_path(doc, path).is_some_and(|v| is_in_set(v, values)),
        Filter::Nin { path, values } => !get_path(doc, path).is_some_and(|v| is_in_set(v, values)),
        Filter::Cmp { path, op, value } => {
            if let Some(v) = get_path(doc, path) {
                match op {
                    CmpOp::Eq => v == value,
                    CmpOp::Gt => compare_bson(v, value) == Ordering::Greater,
                    CmpOp::Gte => compare_bson(v, value) != Ordering::Less,
                    CmpOp::Lt => compare_bson(v, value) == Ordering::Less,
                    CmpOp::Lte => compare_bson(v, value) != Ordering::Greater,
                }
            } else {
                false
            }
        }
    }
}

pub fn compare_docs(a: &BsonDocument, b: &BsonDocument, sort: &[SortSpec]) -> Ordering {
    for s in sort.iter().take(MAX_SORT_FIELDS) {
        let ord = match (a.get(&s.field), b.get(&s.field)) {
            (Some(x), Some(y)) => compare_bson(x, y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return if matches!(s.order, super::types::Order::Asc) { ord } else { ord.reverse() };
        }
    }
    Ordering::Equal
}

fn is_in_set(v: &Bson, set: &[Bson]) -> bool {
    set.iter().take(MAX_IN_SET).any(|x| x == v)
}

fn get_path<'a>(doc: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    if path.is_empty() || path.len() > 1024 {
        return None;
    }
    let mut cur = doc;
    let mut segs = 0usize;
    let parts = path.split('.');
    let last = parts.clone().next_back().unwrap_or("");
    for part in parts {
        segs += 1;
        if segs > MAX_PATH_DEPTH {
            return None;
        }
        match cur.get(part) {
            Some(Bson::Document(d)) => cur = d,
            Some(v) if part == last => return Some(v),
            _ => return None,
        }
    }
    None
}

/// Total order over BSON values.
///
/// Identity values must compare stably for keyset pagination to resume, so
/// unlike a plain equality check this orders within every scalar type that
/// can serve as an identity (numbers, strings, object ids, datetimes).
pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    use bson::Bson as T;
    fn is_num(x: &T) -> bool {
        matches!(x, T::Int32(_) | T::Int64(_) | T::Double(_) | T::Decimal128(_))
    }
    fn as_f64_num(x: &T) -> f64 {
        match x {
            T::Int32(i) => *i as f64,
            T::Int64(i) => *i as f64,
            T::Double(f) => *f,
            T::Decimal128(d) => d.to_string().parse::<f64>().unwrap_or(f64::NAN),
            _ => f64::NAN,
        }
    }
    if is_num(a) && is_num(b) {
        return as_f64_num(a).total_cmp(&as_f64_num(b));
    }
    match (a, b) {
        (T::String(x), T::String(y)) => x.cmp(y),
        (T::Boolean(x), T::Boolean(y)) => x.cmp(y),
        (T::ObjectId(x), T::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (T::DateTime(x), T::DateTime(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(v: &Bson) -> u8 {
    use bson::Bson as T;
    match v {
        T::Null => 0,
        T::Boolean(_) => 1,
        T::Int32(_) | T::Int64(_) | T::Double(_) | T::Decimal128(_) => 2,
        T::String(_) => 3,
        T::Array(_) => 4,
        T::Document(_) => 5,
        T::Binary(_) => 6,
        T::ObjectId(_) => 7,
        T::DateTime(_) => 8,
        _ => 9,
    }
}

/// Keeps only the requested fields, plus the identity field.
///
/// The identity is preserved even when the caller's list omits it because
/// pagination cannot resume without it.
pub fn project_fields(doc: &BsonDocument, fields: &[String]) -> BsonDocument {
    let mut out = BsonDocument::new();
    if let Some(id) = doc.get(ID_FIELD) {
        out.insert(ID_FIELD.to_string(), id.clone());
    }
    for f in fields {
        if f == ID_FIELD {
            continue;
        }
        if let Some(v) = doc.get(f) {
            out.insert(f.clone(), v.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Filter;
    use bson::{doc, oid::ObjectId};

    #[test]
    fn filters_match_nested_paths() {
        let d = doc! { "a": { "b": 3 }, "tag": "x" };
        assert!(eval_filter(&d, &Filter::eq("a.b", 3)));
        assert!(!eval_filter(&d, &Filter::eq("a.b", 4)));
        assert!(eval_filter(&d, &Filter::Exists { path: "tag".into(), exists: true }));
    }

    #[test]
    fn object_ids_order_by_bytes() {
        let lo = ObjectId::parse_str("000000000000000000000001").unwrap();
        let hi = ObjectId::parse_str("000000000000000000000002").unwrap();
        assert_eq!(compare_bson(&Bson::ObjectId(lo), &Bson::ObjectId(hi)), Ordering::Less);
    }

    #[test]
    fn projection_preserves_identity() {
        let d = doc! { "_id": 9, "keep": 1, "drop": 2 };
        let p = project_fields(&d, &["keep".to_string()]);
        assert_eq!(p.get_i32("_id").unwrap(), 9);
        assert_eq!(p.get_i32("keep").unwrap(), 1);
        assert!(p.get("drop").is_none());
    }
}
