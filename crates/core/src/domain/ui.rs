//! Structured payloads the chat frontend renders next to assistant text.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

pub const TABLE_COMPONENT: &str = "records_table";
pub const DETAIL_COMPONENT: &str = "dynamic_record_detail";
pub const FALLBACK_COMPONENT: &str = "get_record";
pub const NO_RESULTS_COMPONENT: &str = "no_results";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RowField {
    RecordNumber,
    RecordType,
    Status,
    DateSubmitted,
    ApplicantName,
    Address,
}

impl RowField {
    pub const ALL: [RowField; 6] = [
        RowField::RecordNumber,
        RowField::RecordType,
        RowField::Status,
        RowField::DateSubmitted,
        RowField::ApplicantName,
        RowField::Address,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::RecordNumber => "recordNumber",
            Self::RecordType => "recordType",
            Self::Status => "status",
            Self::DateSubmitted => "dateSubmitted",
            Self::ApplicantName => "applicantName",
            Self::Address => "address",
        }
    }
}

/// One row of the records table. `id` is always present; every other field is
/// either a non-empty string or absent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedRow {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    record_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    record_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date_submitted: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    applicant_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    address: Option<String>,
}

impl ProjectedRow {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), ..Self::default() }
    }

    pub fn with(mut self, field: RowField, value: Option<String>) -> Self {
        let value = value.map(|text| text.trim().to_string()).filter(|text| !text.is_empty());
        *self.slot(field) = value;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self, field: RowField) -> Option<&str> {
        match field {
            RowField::RecordNumber => self.record_number.as_deref(),
            RowField::RecordType => self.record_type.as_deref(),
            RowField::Status => self.status.as_deref(),
            RowField::DateSubmitted => self.date_submitted.as_deref(),
            RowField::ApplicantName => self.applicant_name.as_deref(),
            RowField::Address => self.address.as_deref(),
        }
    }

    fn slot(&mut self, field: RowField) -> &mut Option<String> {
        match field {
            RowField::RecordNumber => &mut self.record_number,
            RowField::RecordType => &mut self.record_type,
            RowField::Status => &mut self.status,
            RowField::DateSubmitted => &mut self.date_submitted,
            RowField::ApplicantName => &mut self.applicant_name,
            RowField::Address => &mut self.address,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiPayload {
    Table {
        records: Vec<ProjectedRow>,
        community: String,
    },
    Detail {
        #[serde(flatten)]
        schema: DetailSchema,
        community: String,
    },
    /// Raw record shown when a detail layout cannot be built.
    RecordFallback {
        record: Value,
        community: String,
    },
    NoResults {
        community: String,
    },
}

impl UiPayload {
    pub fn component_name(&self) -> &'static str {
        match self {
            Self::Table { .. } => TABLE_COMPONENT,
            Self::Detail { .. } => DETAIL_COMPONENT,
            Self::RecordFallback { .. } => FALLBACK_COMPONENT,
            Self::NoResults { .. } => NO_RESULTS_COMPONENT,
        }
    }
}

/// A UI payload bound to the assistant message it illustrates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UiMessage {
    pub id: String,
    pub name: String,
    pub message_id: String,
    pub payload: UiPayload,
}

impl UiMessage {
    pub fn new(message_id: impl Into<String>, payload: UiPayload) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: payload.component_name().to_string(),
            message_id: message_id.into(),
            payload,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetailSchema {
    pub header: DetailHeader,
    pub tabs: Vec<DetailTab>,
    pub data: Map<String, Value>,
    pub actions: Vec<SchemaAction>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailHeader {
    pub title: String,
    pub subtitle: String,
    pub status: StatusBadge,
    pub metadata: Vec<MetadataItem>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBadge {
    pub label: String,
    pub color: String,
    pub icon: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataKind {
    Text,
    Link,
    Date,
    Status,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataItem {
    pub label: String,
    pub value: String,
    #[serde(rename = "type")]
    pub kind: MetadataKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailTab {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    pub sections: Vec<DetailSection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<SchemaAction>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailSection {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub columns: u8,
    #[serde(default)]
    pub collapsible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_expanded: Option<bool>,
    pub fields: Vec<SectionField>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<SchemaAction>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Textarea,
    Currency,
    Date,
    Boolean,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionField {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Primary,
    Secondary,
    Link,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaAction {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ProjectedRow, RowField, UiMessage, UiPayload};

    #[test]
    fn empty_row_fields_are_omitted() {
        let row = ProjectedRow::new("42")
            .with(RowField::RecordNumber, Some("BLD-1".to_string()))
            .with(RowField::Status, Some("   ".to_string()))
            .with(RowField::Address, None);

        assert_eq!(row.get(RowField::Status), None);
        assert_eq!(serde_json::to_value(&row).expect("serialize"), json!({ "id": "42", "recordNumber": "BLD-1" }));
    }

    #[test]
    fn ui_message_takes_component_name_from_payload() {
        let message = UiMessage::new(
            "msg-1",
            UiPayload::Table { records: vec![ProjectedRow::new("1")], community: "springfield".to_string() },
        );

        assert_eq!(message.name, "records_table");
        assert_eq!(message.message_id, "msg-1");
        let encoded = serde_json::to_value(&message).expect("serialize");
        assert_eq!(encoded["payload"]["type"], json!("table"));
        assert_eq!(encoded["payload"]["records"][0]["id"], json!("1"));
    }
}
