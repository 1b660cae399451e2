use serde_json::Value;

use crate::domain::record::{IncludedSideband, Record};
use crate::domain::ui::{
    ActionKind, DetailHeader, DetailSchema, DetailSection, DetailTab, FieldKind, MetadataItem, MetadataKind,
    RowField, SchemaAction, SectionField, StatusBadge,
};
use crate::errors::DomainError;
use crate::projection::{fields, table};

/// Attributes rendered as `MM/DD/YYYY` in the detail view.
pub const DETAIL_DATE_FIELDS: [&str; 4] = ["createdAt", "submittedAt", "updatedAt", "expiresAt"];

/// Builds the single-record detail layout. Implementations may fail; callers
/// fall back to showing the raw record.
pub trait DetailLayout: Send + Sync {
    fn build(&self, record: &Record, included: &IncludedSideband) -> Result<DetailSchema, DomainError>;
}

#[derive(Clone, Debug, Default)]
pub struct StandardDetailLayout;

impl DetailLayout for StandardDetailLayout {
    fn build(&self, record: &Record, included: &IncludedSideband) -> Result<DetailSchema, DomainError> {
        let row = table::project_row(record, included);
        let status = record.attribute_text("status");

        let header = DetailHeader {
            title: record.attribute_text("number").unwrap_or_else(|| record.id.clone()),
            subtitle: row.get(RowField::RecordType).unwrap_or(fields::UNKNOWN_RECORD_TYPE).to_string(),
            status: status_badge(status.as_deref()),
            metadata: header_metadata(record, row.get(RowField::ApplicantName), status.as_deref()),
        };

        let mut data = record.attributes.clone();
        data.remove("locationDetails");
        for key in DETAIL_DATE_FIELDS {
            if let Some(formatted) = data.get(key).and_then(Value::as_str).map(fields::format_display_date) {
                data.insert(key.to_string(), Value::String(formatted));
            }
        }
        data.insert("id".to_string(), Value::String(record.id.clone()));
        for field in [RowField::RecordType, RowField::ApplicantName, RowField::Address] {
            if let Some(value) = row.get(field) {
                data.insert(field.key().to_string(), Value::String(value.to_string()));
            }
        }

        let mut tabs = vec![details_tab()];
        tabs.extend(
            [
                ("workflow", "Workflow"),
                ("attachments", "Attachments"),
                ("location", "Location"),
                ("applicant", "Applicant"),
                ("activity", "Activity"),
            ]
            .into_iter()
            .map(|(id, label)| placeholder_tab(id, label)),
        );

        Ok(DetailSchema {
            header,
            tabs,
            data,
            actions: vec![
                action("save_record", "Save Changes", ActionKind::Primary, Some("save")),
                action("cancel_changes", "Cancel", ActionKind::Secondary, None),
            ],
        })
    }
}

pub fn status_badge(status: Option<&str>) -> StatusBadge {
    let label = status.unwrap_or("Unknown").to_string();
    let (color, icon) = match label.to_ascii_lowercase().as_str() {
        "active" | "approved" => ("#10b981", "check-circle"),
        "pending" => ("#f59e0b", "clock"),
        "rejected" | "denied" => ("#ef4444", "x-circle"),
        _ => ("#6b7280", "info"),
    };
    StatusBadge { label, color: color.to_string(), icon: icon.to_string() }
}

fn header_metadata(record: &Record, applicant: Option<&str>, status: Option<&str>) -> Vec<MetadataItem> {
    let project = record.attribute_text("projectName").or_else(|| record.attribute_text("projectDescription"));
    let expires = record.attribute_text("expiresAt").map(|date| fields::format_display_date(&date));

    [
        ("Applicant", applicant.map(str::to_string), MetadataKind::Link, Some("user")),
        ("Project", project, MetadataKind::Text, None),
        ("Expiration Date", expires, MetadataKind::Date, Some("calendar")),
        ("Record Status", status.map(str::to_string), MetadataKind::Status, None),
    ]
    .into_iter()
    .filter_map(|(label, value, kind, icon)| {
        value.map(|value| MetadataItem { label: label.to_string(), value, kind, icon: icon.map(str::to_string) })
    })
    .collect()
}

fn details_tab() -> DetailTab {
    DetailTab {
        id: "details".to_string(),
        label: "Details".to_string(),
        count: None,
        sections: vec![
            DetailSection {
                actions: vec![action("edit_project", "Edit", ActionKind::Link, Some("edit"))],
                ..section(
                    "Project Information",
                    &[
                        ("projectDescription", "Brief Description of Project", FieldKind::Textarea),
                        ("estimatedCost", "Estimated Project Cost", FieldKind::Currency),
                        ("projectType", "Project Type", FieldKind::Text),
                        ("propertyType", "Property Type", FieldKind::Text),
                        ("buildDuration", "Build Duration", FieldKind::Text),
                        ("submittedAt", "Submitted Date", FieldKind::Date),
                        ("projectID", "Project ID", FieldKind::Text),
                    ],
                )
            },
            DetailSection {
                actions: vec![action("edit_contractor", "Edit", ActionKind::Link, Some("edit"))],
                ..section(
                    "Contractor Information",
                    &[
                        ("contractorRole", "Contractor Role", FieldKind::Text),
                        ("typeOfWork", "Type of Work", FieldKind::Text),
                        ("contractorDescription", "Project Description", FieldKind::Textarea),
                        ("contractorName", "Contractor Name", FieldKind::Text),
                        ("businessName", "Business Name", FieldKind::Text),
                    ],
                )
            },
            DetailSection {
                collapsible: true,
                default_expanded: Some(false),
                ..section(
                    "Record Information",
                    &[
                        ("id", "Record ID", FieldKind::Text),
                        ("typeID", "Type ID", FieldKind::Text),
                        ("typeDescription", "Type Description", FieldKind::Text),
                        ("projectID", "Project ID", FieldKind::Text),
                        ("isEnabled", "Enabled", FieldKind::Boolean),
                        ("submittedOnline", "Submitted Online", FieldKind::Boolean),
                        ("renewalSubmitted", "Renewal Submitted", FieldKind::Boolean),
                    ],
                )
            },
            section(
                "Timeline",
                &[
                    ("createdAt", "Created At", FieldKind::Date),
                    ("submittedAt", "Submitted At", FieldKind::Date),
                    ("updatedAt", "Last Updated", FieldKind::Date),
                    ("expiresAt", "Expires At", FieldKind::Date),
                ],
            ),
        ],
        actions: vec![action("request_changes", "Request Changes", ActionKind::Secondary, None)],
    }
}

fn placeholder_tab(id: &str, label: &str) -> DetailTab {
    DetailTab { id: id.to_string(), label: label.to_string(), count: None, sections: Vec::new(), actions: Vec::new() }
}

fn section(title: &str, fields: &[(&str, &str, FieldKind)]) -> DetailSection {
    DetailSection {
        title: title.to_string(),
        description: None,
        columns: 2,
        collapsible: false,
        default_expanded: None,
        fields: fields
            .iter()
            .map(|(key, label, kind)| SectionField { key: key.to_string(), label: label.to_string(), kind: *kind })
            .collect(),
        actions: Vec::new(),
    }
}

fn action(id: &str, label: &str, kind: ActionKind, icon: Option<&str>) -> SchemaAction {
    SchemaAction { id: id.to_string(), label: label.to_string(), kind, icon: icon.map(str::to_string) }
}
