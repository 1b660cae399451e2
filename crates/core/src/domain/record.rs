use std::collections::{BTreeMap, HashMap};

use serde_json::{json, Map, Value};

pub type Attributes = Map<String, Value>;

/// A record as returned by RecordAPI, decoded from its JSON:API-ish shape.
///
/// Enrichment never mutates a record in place; it produces a copy whose
/// `relationships` differ and whose `id`/`attributes` are untouched.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    /// Display and lookup key; numeric ids are rendered as text.
    pub id: String,
    /// The id exactly as RecordAPI sent it, echoed back by `to_value`.
    pub raw_id: Value,
    pub attributes: Attributes,
    pub relationships: BTreeMap<String, Relationship>,
    /// Location attributes pre-fetched by RecordAPI's enhanced listing mode.
    pub location_details: Option<Attributes>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            raw_id: Value::String(id.clone()),
            id,
            attributes: Attributes::new(),
            relationships: BTreeMap::new(),
            location_details: None,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_relationship(mut self, name: impl Into<String>, relationship: Relationship) -> Self {
        self.relationships.insert(name.into(), relationship);
        self
    }

    /// Decodes a single record object. Returns `None` for non-objects and for
    /// objects without a usable `id`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let raw_id = object.get("id")?.clone();
        let id = scalar_text(&raw_id)?;

        let attributes = object.get("attributes").and_then(Value::as_object).cloned().unwrap_or_default();

        let relationships = object
            .get("relationships")
            .and_then(Value::as_object)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(name, raw)| (name.clone(), Relationship::from_value(raw)))
                    .collect::<BTreeMap<_, _>>()
            })
            .unwrap_or_default();

        let location_details = object
            .get("locationDetails")
            .or_else(|| attributes.get("locationDetails"))
            .and_then(unwrap_attribute_map);

        Some(Self { id, raw_id, attributes, relationships, location_details })
    }

    pub fn attribute_text(&self, key: &str) -> Option<String> {
        attribute_text(&self.attributes, key)
    }

    /// Re-encodes the record in the shape RecordAPI uses, including any
    /// resolved relationship values. The id keeps its original JSON type.
    pub fn to_value(&self) -> Value {
        let relationships = self
            .relationships
            .iter()
            .map(|(name, relationship)| (name.clone(), relationship.to_value()))
            .collect::<Map<_, _>>();

        let mut object = Map::new();
        object.insert("id".to_string(), self.raw_id.clone());
        object.insert("attributes".to_string(), Value::Object(self.attributes.clone()));
        object.insert("relationships".to_string(), Value::Object(relationships));
        if let Some(details) = &self.location_details {
            object.insert("locationDetails".to_string(), json!({ "attributes": details }));
        }
        Value::Object(object)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RelationshipData {
    /// Only a hyperlink to the related sub-resource is known.
    LinkOnly(String),
    /// A `{type, id}` pointer, resolvable through the included sideband.
    Reference { type_name: Option<String>, id: String, related: Option<String> },
    /// The related resource's attributes are embedded directly.
    Inline(Attributes),
    Empty,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolved {
    Name(String),
    Address(String),
}

/// A relationship plus an optional human-readable value layered on top of it
/// by enrichment. The original link/reference data is always kept.
#[derive(Clone, Debug, PartialEq)]
pub struct Relationship {
    pub data: RelationshipData,
    pub resolved: Option<Resolved>,
}

impl Relationship {
    pub fn link(url: impl Into<String>) -> Self {
        Self { data: RelationshipData::LinkOnly(url.into()), resolved: None }
    }

    pub fn reference(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            data: RelationshipData::Reference {
                type_name: Some(type_name.into()),
                id: id.into(),
                related: None,
            },
            resolved: None,
        }
    }

    pub fn inline(attributes: Attributes) -> Self {
        Self { data: RelationshipData::Inline(attributes), resolved: None }
    }

    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self { data: RelationshipData::Empty, resolved: None };
        };

        let related = object
            .get("links")
            .and_then(|links| links.get("related"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let reference = match object.get("data") {
            Some(Value::Array(items)) => items.first(),
            Some(data @ Value::Object(_)) => Some(data),
            _ => None,
        };

        let data = if let Some(id) = reference.and_then(|data| data.get("id")).and_then(scalar_text) {
            let type_name = reference
                .and_then(|data| data.get("type"))
                .and_then(Value::as_str)
                .map(str::to_string);
            RelationshipData::Reference { type_name, id, related }
        } else if let Some(attributes) = object.get("attributes").and_then(Value::as_object) {
            RelationshipData::Inline(attributes.clone())
        } else if let Some(url) = related {
            RelationshipData::LinkOnly(url)
        } else {
            RelationshipData::Empty
        };

        let resolved = object
            .get("resolved_name")
            .and_then(Value::as_str)
            .map(|name| Resolved::Name(name.to_string()))
            .or_else(|| {
                object
                    .get("resolved_address")
                    .and_then(Value::as_str)
                    .map(|address| Resolved::Address(address.to_string()))
            });

        Self { data, resolved }
    }

    /// The hyperlink enrichment would follow, if any.
    pub fn related_link(&self) -> Option<&str> {
        match &self.data {
            RelationshipData::LinkOnly(url) => Some(url),
            RelationshipData::Reference { related, .. } => related.as_deref(),
            RelationshipData::Inline(_) | RelationshipData::Empty => None,
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self.data, RelationshipData::Inline(_))
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }

    pub fn resolved_name(&self) -> Option<&str> {
        match &self.resolved {
            Some(Resolved::Name(name)) => Some(name),
            _ => None,
        }
    }

    pub fn resolved_address(&self) -> Option<&str> {
        match &self.resolved {
            Some(Resolved::Address(address)) => Some(address),
            _ => None,
        }
    }

    /// Layers a resolved value on top of the relationship. An existing
    /// resolution is kept so a relationship is never downgraded.
    pub fn with_resolved(mut self, resolved: Resolved) -> Self {
        if self.resolved.is_none() {
            self.resolved = Some(resolved);
        }
        self
    }

    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        match &self.data {
            RelationshipData::LinkOnly(url) => {
                object.insert("links".to_string(), json!({ "related": url }));
            }
            RelationshipData::Reference { type_name, id, related } => {
                object.insert("data".to_string(), json!({ "type": type_name, "id": id }));
                if let Some(url) = related {
                    object.insert("links".to_string(), json!({ "related": url }));
                }
            }
            RelationshipData::Inline(attributes) => {
                object.insert("attributes".to_string(), Value::Object(attributes.clone()));
            }
            RelationshipData::Empty => {}
        }
        match &self.resolved {
            Some(Resolved::Name(name)) => {
                object.insert("resolved_name".to_string(), Value::String(name.clone()));
            }
            Some(Resolved::Address(address)) => {
                object.insert("resolved_address".to_string(), Value::String(address.clone()));
            }
            None => {}
        }
        Value::Object(object)
    }
}

/// Fully materialised related resources shipped alongside a record list,
/// keyed by `(type, id)`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IncludedSideband {
    resources: HashMap<(String, String), Attributes>,
}

impl IncludedSideband {
    pub fn from_values(values: &[Value]) -> Self {
        let resources = values
            .iter()
            .filter_map(|item| {
                let type_name = item.get("type").and_then(Value::as_str)?;
                let id = item.get("id").and_then(scalar_text)?;
                let attributes =
                    item.get("attributes").and_then(Value::as_object).cloned().unwrap_or_default();
                Some(((type_name.to_string(), id), attributes))
            })
            .collect();
        Self { resources }
    }

    pub fn insert(&mut self, type_name: impl Into<String>, id: impl Into<String>, attributes: Attributes) {
        self.resources.insert((type_name.into(), id.into()), attributes);
    }

    pub fn lookup(&self, type_name: &str, id: &str) -> Option<&Attributes> {
        self.resources.get(&(type_name.to_string(), id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Renders a scalar attribute as display text. Empty strings, nulls, arrays and
/// objects yield `None`.
pub fn attribute_text(attributes: &Attributes, key: &str) -> Option<String> {
    attributes.get(key).and_then(scalar_text)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn unwrap_attribute_map(value: &Value) -> Option<Attributes> {
    let object = value.as_object()?;
    match object.get("attributes").and_then(Value::as_object) {
        Some(attributes) => Some(attributes.clone()),
        None if !object.is_empty() => Some(object.clone()),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{IncludedSideband, Record, Relationship, RelationshipData, Resolved};

    #[test]
    fn decodes_all_relationship_shapes() {
        let record = Record::from_value(&json!({
            "id": 42,
            "attributes": { "number": "BLD-1", "status": "ACTIVE" },
            "relationships": {
                "applicant": { "links": { "related": "/records/42/applicant" } },
                "recordType": { "data": { "type": "recordTypes", "id": "6413" } },
                "site": { "attributes": { "city": "Springfield" } },
                "owner": { "meta": {} }
            }
        }))
        .expect("record should decode");

        assert_eq!(record.id, "42");
        assert_eq!(record.attribute_text("number").as_deref(), Some("BLD-1"));
        assert_eq!(
            record.relationships["applicant"].data,
            RelationshipData::LinkOnly("/records/42/applicant".to_string())
        );
        assert!(matches!(
            record.relationships["recordType"].data,
            RelationshipData::Reference { ref id, .. } if id == "6413"
        ));
        assert!(record.relationships["site"].is_inline());
        assert_eq!(record.relationships["owner"].data, RelationshipData::Empty);
    }

    #[test]
    fn numeric_id_survives_reencoding() {
        let record = Record::from_value(&json!({ "id": 42, "attributes": { "number": "BLD-1" } })).expect("record");

        assert_eq!(record.id, "42");
        assert_eq!(record.to_value()["id"], json!(42));
        assert_eq!(Record::new("7").to_value()["id"], json!("7"));
    }

    #[test]
    fn record_without_id_is_rejected() {
        assert!(Record::from_value(&json!({ "attributes": {} })).is_none());
        assert!(Record::from_value(&json!("BLD-1")).is_none());
    }

    #[test]
    fn location_details_accepts_wrapped_and_bare_maps() {
        let wrapped = Record::from_value(&json!({
            "id": "1",
            "locationDetails": { "attributes": { "streetName": "Main St" } }
        }))
        .expect("record");
        let bare = Record::from_value(&json!({
            "id": "2",
            "attributes": { "locationDetails": { "streetName": "Elm St" } }
        }))
        .expect("record");

        assert_eq!(
            wrapped.location_details.and_then(|details| details.get("streetName").cloned()),
            Some(json!("Main St"))
        );
        assert_eq!(
            bare.location_details.and_then(|details| details.get("streetName").cloned()),
            Some(json!("Elm St"))
        );
    }

    #[test]
    fn resolution_is_layered_and_never_downgraded() {
        let relationship = Relationship::link("/records/1/applicant")
            .with_resolved(Resolved::Name("Ada Lovelace".to_string()))
            .with_resolved(Resolved::Name("Someone Else".to_string()));

        assert_eq!(relationship.resolved_name(), Some("Ada Lovelace"));
        assert_eq!(relationship.related_link(), Some("/records/1/applicant"));

        let encoded = relationship.to_value();
        assert_eq!(encoded["links"]["related"], json!("/records/1/applicant"));
        assert_eq!(encoded["resolved_name"], json!("Ada Lovelace"));
        assert_eq!(Relationship::from_value(&encoded), relationship);
    }

    #[test]
    fn sideband_lookup_is_keyed_by_type_and_id() {
        let included = IncludedSideband::from_values(&[
            json!({ "type": "users", "id": "7", "attributes": { "firstName": "Ada" } }),
            json!({ "type": "locations", "id": "7", "attributes": { "city": "Paris" } }),
            json!({ "id": "missing-type" }),
        ]);

        assert_eq!(included.len(), 2);
        assert_eq!(included.lookup("users", "7").and_then(|attrs| attrs.get("firstName")), Some(&json!("Ada")));
        assert!(included.lookup("users", "8").is_none());
    }
}
