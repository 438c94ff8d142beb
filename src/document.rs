//! Vocabulary shared by the document backends and the live query engine.
//!
//! A [`Document`] is a JSON object stored under an opaque id inside a named
//! collection. A [`Query`] selects documents from one collection with
//! equality filters, an optional ascending sort field and a result limit.

use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// The field map of a stored document
pub type Fields = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub data: Fields,
}

impl Document {
    #[must_use]
    pub fn new(id: impl Into<String>, data: Fields) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

/// Equality filter: `field == value`
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    #[must_use]
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// A missing field never matches, and values of different JSON types never compare equal
    #[must_use]
    pub fn matches(&self, data: &Fields) -> bool {
        data.get(&self.field)
            .is_some_and(|value| compare_values(value, &self.value) == Ordering::Equal)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<String>,
    pub limit: Option<usize>,
}

impl Query {
    #[must_use]
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Sort ascending by `field`. Documents without the field are left out of the result
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a document passes the filters and has the sort field, if any
    #[must_use]
    pub fn accepts(&self, data: &Fields) -> bool {
        self.filters.iter().all(|filter| filter.matches(data))
            && self
                .order_by
                .as_ref()
                .is_none_or(|field| data.contains_key(field))
    }

    /// Applies filters, ordering and limit to an id-ordered sequence of documents
    #[must_use]
    pub fn evaluate(&self, documents: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut selected: Vec<Document> = documents
            .into_iter()
            .filter(|document| self.accepts(&document.data))
            .collect();

        if let Some(field) = &self.order_by {
            selected.sort_by(|a, b| {
                compare_values(&a.data[field], &b.data[field]).then_with(|| a.id.cmp(&b.id))
            });
        } else {
            selected.sort_by(|a, b| a.id.cmp(&b.id));
        }

        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.collection)?;
        for filter in &self.filters {
            write!(f, " where {} == {}", filter.field, filter.value)?;
        }
        if let Some(field) = &self.order_by {
            write!(f, " order by {field}")?;
        }
        if let Some(limit) = self.limit {
            write!(f, " limit {limit}")?;
        }
        Ok(())
    }
}

// null < bool < number < string < array < object
const fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values used for sorting and equality filters
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y)
            .map(|(x, y)| compare_values(x, y))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(_), Value::Object(_)) => a.to_string().cmp(&b.to_string()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChange {
    pub kind: ChangeKind,
    pub document: Document,
}

/// The full current result set of a live query plus what changed since the last delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySnapshot {
    pub documents: Vec<Document>,
    pub changes: Vec<DocumentChange>,
}

impl QuerySnapshot {
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter()
    }
}

/// Computes the changelog between two consecutive result sets.
///
/// Removals come first, followed by additions and modifications in the order
/// of `current`.
#[must_use]
pub fn diff(previous: &[Document], current: &[Document]) -> Vec<DocumentChange> {
    let before: HashMap<&str, &Fields> = previous
        .iter()
        .map(|document| (document.id.as_str(), &document.data))
        .collect();
    let after: HashMap<&str, &Fields> = current
        .iter()
        .map(|document| (document.id.as_str(), &document.data))
        .collect();

    let removed = previous
        .iter()
        .filter(|document| !after.contains_key(document.id.as_str()))
        .map(|document| DocumentChange {
            kind: ChangeKind::Removed,
            document: document.clone(),
        });

    let added_or_modified = current.iter().filter_map(|document| {
        let kind = match before.get(document.id.as_str()) {
            None => ChangeKind::Added,
            Some(data) if **data != document.data => ChangeKind::Modified,
            Some(_) => return None,
        };
        Some(DocumentChange {
            kind,
            document: document.clone(),
        })
    });

    removed.chain(added_or_modified).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, value: Value) -> Document {
        match value {
            Value::Object(data) => Document::new(id, data),
            _ => panic!("test documents must be objects"),
        }
    }

    #[test]
    fn equality_filter_requires_field_and_matching_type() {
        let filter = Filter::equals("marked", false);
        assert!(filter.matches(&doc("a", json!({"marked": false})).data));
        assert!(!filter.matches(&doc("a", json!({"marked": true})).data));
        assert!(!filter.matches(&doc("a", json!({"marked": 0})).data));
        assert!(!filter.matches(&doc("a", json!({"title": "x"})).data));
    }

    #[test]
    fn ordering_sorts_by_field_then_id_and_drops_missing() {
        let query = Query::collection("trash").order_by("title");
        let result = query.evaluate(vec![
            doc("3", json!({"title": "Zeta"})),
            doc("2", json!({"title": "Alpha"})),
            doc("1", json!({"title": "Alpha"})),
            doc("0", json!({"content": "no title"})),
        ]);
        let ids: Vec<&str> = result.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
    }

    #[test]
    fn limit_truncates_after_ordering() {
        let query = Query::collection("trash").order_by("title").limit(2);
        let result = query.evaluate(vec![
            doc("a", json!({"title": "c"})),
            doc("b", json!({"title": "b"})),
            doc("c", json!({"title": "a"})),
        ]);
        let titles: Vec<&Value> = result.iter().map(|d| &d.data["title"]).collect();
        assert_eq!(titles, [&json!("a"), &json!("b")]);
    }

    #[test]
    fn mixed_types_order_null_bool_number_string() {
        let mut values = vec![json!("s"), json!(2), json!(true), Value::Null, json!(1.5)];
        values.sort_by(compare_values);
        assert_eq!(values, [Value::Null, json!(true), json!(1.5), json!(2), json!("s")]);
    }

    #[test]
    fn diff_reports_removed_first_then_added_and_modified() {
        let previous = vec![
            doc("a", json!({"title": "A"})),
            doc("b", json!({"title": "B"})),
            doc("c", json!({"title": "C"})),
        ];
        let current = vec![
            doc("a", json!({"title": "A"})),
            doc("c", json!({"title": "C2"})),
            doc("d", json!({"title": "D"})),
        ];

        let changes = diff(&previous, &current);
        let changes: Vec<(ChangeKind, &str)> = changes
            .iter()
            .map(|change| (change.kind, change.document.id.as_str()))
            .collect();
        assert_eq!(
            changes,
            [
                (ChangeKind::Removed, "b"),
                (ChangeKind::Modified, "c"),
                (ChangeKind::Added, "d"),
            ]
        );
    }

    #[test]
    fn diff_of_identical_sets_is_empty() {
        let docs = vec![doc("a", json!({"title": "A"}))];
        assert!(diff(&docs, &docs).is_empty());
    }
}
