//! Pure extraction of display fields from a record and its included sideband.
//!
//! Every function here is total: missing data yields `None` (or a documented
//! placeholder) rather than an error.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::domain::record::{
    attribute_text, Attributes, IncludedSideband, Record, Relationship, RelationshipData,
};

pub const APPLICANT_RELATIONSHIPS: [&str; 5] = ["applicant", "user", "owner", "primaryContact", "submittedBy"];
pub const LOCATION_RELATIONSHIPS: [&str; 4] = ["primaryLocation", "location", "address", "site"];
pub const RECORD_TYPE_RELATIONSHIP: &str = "recordType";

pub const NAME_FALLBACK_FIELDS: [&str; 4] = ["name", "displayName", "fullName", "email"];
pub const ADDRESS_FALLBACK_FIELDS: [&str; 3] = ["address", "fullAddress", "streetAddress"];

pub const UNKNOWN_RECORD_TYPE: &str = "Unknown Type";

const DEFAULT_USER_TYPE: &str = "users";
const DEFAULT_LOCATION_TYPE: &str = "locations";

pub const KNOWN_RECORD_TYPES: [(&str, &str); 5] = [
    ("6413", "Building Permit"),
    ("6372", "Business License"),
    ("6370", "Zoning Permit"),
    ("6229", "Temporary Permit"),
    ("53", "Special Event Permit"),
];

struct AddressPart {
    keys: &'static [&'static str],
    prefix: &'static str,
}

const ADDRESS_PARTS: [AddressPart; 6] = [
    AddressPart { keys: &["streetNumber", "streetNo"], prefix: "" },
    AddressPart { keys: &["streetName"], prefix: "" },
    AddressPart { keys: &["unit"], prefix: "Unit " },
    AddressPart { keys: &["city"], prefix: "" },
    AddressPart { keys: &["state"], prefix: "" },
    AddressPart { keys: &["zipCode", "postalCode"], prefix: "" },
];

/// Applicant display name. Only the first applicant-like relationship present
/// on the record is consulted.
pub fn applicant_name(record: &Record, included: &IncludedSideband) -> Option<String> {
    let relationship = first_relationship(&record.relationships, &APPLICANT_RELATIONSHIPS)?;
    if let Some(name) = relationship.resolved_name() {
        return Some(name.to_string());
    }

    match &relationship.data {
        RelationshipData::Reference { type_name, id, .. } => {
            let type_name = type_name.as_deref().unwrap_or(DEFAULT_USER_TYPE);
            match included.lookup(type_name, id) {
                Some(attributes) => Some(person_name(attributes).unwrap_or_else(|| format!("User {id}"))),
                None => Some(format!("Applicant ID: {id}")),
            }
        }
        RelationshipData::Inline(attributes) => person_name(attributes),
        RelationshipData::LinkOnly(_) | RelationshipData::Empty => None,
    }
}

/// Single-line address. Pre-fetched location details win over relationships.
pub fn address(record: &Record, included: &IncludedSideband) -> Option<String> {
    if let Some(line) = record.location_details.as_ref().and_then(address_line) {
        return Some(line);
    }

    let relationship = first_relationship(&record.relationships, &LOCATION_RELATIONSHIPS)?;
    if let Some(address) = relationship.resolved_address() {
        return Some(address.to_string());
    }

    match &relationship.data {
        RelationshipData::Reference { type_name, id, .. } => {
            let type_name = type_name.as_deref().unwrap_or(DEFAULT_LOCATION_TYPE);
            match included.lookup(type_name, id) {
                Some(attributes) => Some(address_line(attributes).unwrap_or_else(|| format!("Location {id}"))),
                None => Some(format!("Location ID: {id}")),
            }
        }
        RelationshipData::Inline(attributes) => address_line(attributes),
        RelationshipData::LinkOnly(_) | RelationshipData::Empty => None,
    }
}

/// Human-readable record type. Never empty.
pub fn record_type_name(
    type_id: Option<&str>,
    type_description: Option<&str>,
    relationships: &BTreeMap<String, Relationship>,
) -> String {
    if let Some(description) = non_blank(type_description) {
        return description.to_string();
    }
    if let Some(name) = relationships.get(RECORD_TYPE_RELATIONSHIP).and_then(Relationship::resolved_name) {
        return name.to_string();
    }

    match non_blank(type_id) {
        Some(id) => known_record_type(id).map_or_else(|| format!("Permit Type {id}"), str::to_string),
        None => UNKNOWN_RECORD_TYPE.to_string(),
    }
}

pub fn known_record_type(type_id: &str) -> Option<&'static str> {
    KNOWN_RECORD_TYPES.iter().find(|(id, _)| *id == type_id).map(|(_, name)| *name)
}

/// ISO-8601 timestamp to `YYYY-MM-DD`; unparseable input comes back unchanged.
pub fn format_date(value: &str) -> String {
    parse_calendar_date(value).map_or_else(|| value.to_string(), |date| date.format("%Y-%m-%d").to_string())
}

/// ISO-8601 timestamp to `MM/DD/YYYY`; unparseable input comes back unchanged.
pub fn format_display_date(value: &str) -> String {
    parse_calendar_date(value).map_or_else(|| value.to_string(), |date| date.format("%m/%d/%Y").to_string())
}

/// `firstName lastName`, else the first usable name-like attribute.
pub fn person_name(attributes: &Attributes) -> Option<String> {
    let parts = ["firstName", "lastName"]
        .iter()
        .filter_map(|key| attribute_text(attributes, key))
        .collect::<Vec<_>>();
    if !parts.is_empty() {
        return Some(parts.join(" "));
    }
    NAME_FALLBACK_FIELDS.iter().find_map(|key| attribute_text(attributes, key))
}

/// Joins the structured address parts, else the first usable free-text field.
pub fn address_line(attributes: &Attributes) -> Option<String> {
    let parts = ADDRESS_PARTS
        .iter()
        .filter_map(|part| {
            part.keys
                .iter()
                .find_map(|key| attribute_text(attributes, key))
                .map(|value| format!("{}{value}", part.prefix))
        })
        .collect::<Vec<_>>();
    if !parts.is_empty() {
        return Some(parts.join(", "));
    }
    ADDRESS_FALLBACK_FIELDS.iter().find_map(|key| attribute_text(attributes, key))
}

fn first_relationship<'a>(
    relationships: &'a BTreeMap<String, Relationship>,
    names: &[&str],
) -> Option<&'a Relationship> {
    names.iter().find_map(|name| relationships.get(*name))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn parse_calendar_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(timestamp.date_naive());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|timestamp| timestamp.date())
        .or_else(|| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::{json, Map};

    use super::{address, applicant_name, format_date, format_display_date, record_type_name};
    use crate::domain::record::{Attributes, IncludedSideband, Record, Relationship, Resolved};

    fn attrs(value: serde_json::Value) -> Attributes {
        value.as_object().cloned().unwrap_or_else(Map::new)
    }

    #[test]
    fn applicant_from_sideband_joins_first_and_last_name() {
        let record = Record::new("1").with_relationship("applicant", Relationship::reference("users", "7"));
        let mut included = IncludedSideband::default();
        included.insert("users", "7", attrs(json!({ "firstName": "Ada", "lastName": "Lovelace" })));

        assert_eq!(applicant_name(&record, &included).as_deref(), Some("Ada Lovelace"));
    }

    #[test]
    fn applicant_found_without_name_uses_user_placeholder() {
        let record = Record::new("1").with_relationship("owner", Relationship::reference("users", "7"));
        let mut included = IncludedSideband::default();
        included.insert("users", "7", attrs(json!({ "phone": "555" })));

        assert_eq!(applicant_name(&record, &included).as_deref(), Some("User 7"));
    }

    #[test]
    fn applicant_missing_from_sideband_uses_id_placeholder() {
        let record = Record::new("1").with_relationship("applicant", Relationship::reference("users", "9"));

        assert_eq!(applicant_name(&record, &IncludedSideband::default()).as_deref(), Some("Applicant ID: 9"));
    }

    #[test]
    fn applicant_resolved_name_wins_and_link_only_is_absent() {
        let resolved = Record::new("1").with_relationship(
            "applicant",
            Relationship::link("/records/1/applicant").with_resolved(Resolved::Name("Grace Hopper".to_string())),
        );
        let unresolved = Record::new("2").with_relationship("applicant", Relationship::link("/records/2/applicant"));

        assert_eq!(applicant_name(&resolved, &IncludedSideband::default()).as_deref(), Some("Grace Hopper"));
        assert_eq!(applicant_name(&unresolved, &IncludedSideband::default()), None);
    }

    #[test]
    fn only_first_applicant_key_is_consulted() {
        let record = Record::new("1")
            .with_relationship("applicant", Relationship::link("/records/1/applicant"))
            .with_relationship("owner", Relationship::inline(attrs(json!({ "name": "Owner Name" }))));

        assert_eq!(applicant_name(&record, &IncludedSideband::default()), None);
    }

    #[test]
    fn inline_applicant_falls_back_to_email() {
        let record = Record::new("1")
            .with_relationship("submittedBy", Relationship::inline(attrs(json!({ "email": "a@example.com" }))));

        assert_eq!(applicant_name(&record, &IncludedSideband::default()).as_deref(), Some("a@example.com"));
    }

    #[test]
    fn address_prefers_location_details() {
        let mut record = Record::new("1").with_relationship(
            "primaryLocation",
            Relationship::link("/records/1/primaryLocation")
                .with_resolved(Resolved::Address("Ignored".to_string())),
        );
        record.location_details = Some(attrs(json!({
            "streetNo": "12",
            "streetName": "Main St",
            "unit": "4B",
            "city": "Springfield",
            "state": "IL",
            "postalCode": "62701"
        })));

        assert_eq!(
            address(&record, &IncludedSideband::default()).as_deref(),
            Some("12, Main St, Unit 4B, Springfield, IL, 62701")
        );
    }

    #[test]
    fn address_reference_outcomes() {
        let record = Record::new("1").with_relationship("location", Relationship::reference("locations", "3"));

        let mut found_empty = IncludedSideband::default();
        found_empty.insert("locations", "3", Attributes::new());
        assert_eq!(address(&record, &found_empty).as_deref(), Some("Location 3"));
        assert_eq!(address(&record, &IncludedSideband::default()).as_deref(), Some("Location ID: 3"));

        let mut free_text = IncludedSideband::default();
        free_text.insert("locations", "3", attrs(json!({ "fullAddress": "1 Infinite Loop" })));
        assert_eq!(address(&record, &free_text).as_deref(), Some("1 Infinite Loop"));
    }

    #[test]
    fn record_type_name_precedence() {
        let empty = BTreeMap::new();
        assert_eq!(record_type_name(Some("6413"), Some("Custom"), &empty), "Custom");
        assert_eq!(record_type_name(Some("6413"), None, &empty), "Building Permit");
        assert_eq!(record_type_name(Some("999"), Some("  "), &empty), "Permit Type 999");
        assert_eq!(record_type_name(None, Some(""), &empty), "Unknown Type");

        let mut resolved = BTreeMap::new();
        resolved.insert(
            "recordType".to_string(),
            Relationship::link("/recordTypes/999").with_resolved(Resolved::Name("Fence Permit".to_string())),
        );
        assert_eq!(record_type_name(Some("999"), None, &resolved), "Fence Permit");
    }

    #[test]
    fn dates_format_or_pass_through() {
        assert_eq!(format_date("2024-01-15T10:30:00Z"), "2024-01-15");
        assert_eq!(format_date("2024-01-15T10:30:00.123+02:00"), "2024-01-15");
        assert_eq!(format_date("2024-01-15T10:30:00"), "2024-01-15");
        assert_eq!(format_date("2024-01-15"), "2024-01-15");
        assert_eq!(format_date("not a date"), "not a date");
        assert_eq!(format_display_date("2024-03-09T00:00:00Z"), "03/09/2024");
    }
}
