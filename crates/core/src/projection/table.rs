use crate::domain::record::{IncludedSideband, Record};
use crate::domain::ui::{ProjectedRow, RowField};
use crate::projection::fields;

pub fn project_row(record: &Record, included: &IncludedSideband) -> ProjectedRow {
    let record_type = fields::record_type_name(
        record.attribute_text("typeID").as_deref(),
        record.attribute_text("typeDescription").as_deref(),
        &record.relationships,
    );

    ProjectedRow::new(record.id.clone())
        .with(RowField::RecordNumber, record.attribute_text("number"))
        .with(RowField::RecordType, Some(record_type))
        .with(RowField::Status, record.attribute_text("status"))
        .with(RowField::DateSubmitted, record.attribute_text("submittedAt").map(|date| fields::format_date(&date)))
        .with(RowField::ApplicantName, fields::applicant_name(record, included))
        .with(RowField::Address, fields::address(record, included))
}

pub fn table_summary(count: usize, community: &str) -> String {
    let noun = if count == 1 { "record" } else { "records" };
    format!("I found {count} {noun} for {community}. The interactive table below shows the details:")
}

pub fn detail_summary(record: &Record) -> String {
    let number = record.attribute_text("number").unwrap_or_else(|| record.id.clone());
    format!("Here are the details for record #{number}:")
}

pub fn no_results_summary(community: &str) -> String {
    format!("I couldn't find any matching records for {community}.")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{detail_summary, project_row, table_summary};
    use crate::domain::record::{IncludedSideband, Record, Relationship, Resolved};
    use crate::domain::ui::RowField;

    #[test]
    fn row_keeps_identity_when_nothing_else_is_known() {
        let row = project_row(&Record::new("77"), &IncludedSideband::default());

        assert_eq!(row.id(), "77");
        assert_eq!(row.get(RowField::RecordType), Some("Unknown Type"));
        for field in [RowField::RecordNumber, RowField::Status, RowField::ApplicantName, RowField::Address] {
            assert_eq!(row.get(field), None);
        }
    }

    #[test]
    fn row_uses_resolved_relationships() {
        let record = Record::new("1")
            .with_attribute("number", json!("BLD-2024-001"))
            .with_attribute("status", json!("Active"))
            .with_attribute("typeID", json!(6413))
            .with_attribute("submittedAt", json!("2024-01-15T10:30:00Z"))
            .with_attribute("typeDescription", json!(""))
            .with_relationship(
                "applicant",
                Relationship::link("/records/1/applicant").with_resolved(Resolved::Name("Ada Lovelace".into())),
            )
            .with_relationship(
                "primaryLocation",
                Relationship::link("/records/1/primaryLocation")
                    .with_resolved(Resolved::Address("12 Main St, Springfield".into())),
            );

        let row = project_row(&record, &IncludedSideband::default());
        assert_eq!(
            serde_json::to_value(&row).expect("serialize"),
            json!({
                "id": "1",
                "recordNumber": "BLD-2024-001",
                "recordType": "Building Permit",
                "status": "Active",
                "dateSubmitted": "2024-01-15",
                "applicantName": "Ada Lovelace",
                "address": "12 Main St, Springfield"
            })
        );
    }

    #[test]
    fn summaries_name_the_community_and_record() {
        assert_eq!(
            table_summary(3, "springfield"),
            "I found 3 records for springfield. The interactive table below shows the details:"
        );
        let record = Record::new("9").with_attribute("number", json!("ZN-7"));
        assert_eq!(detail_summary(&record), "Here are the details for record #ZN-7:");
        assert_eq!(detail_summary(&Record::new("9")), "Here are the details for record #9:");
    }
}
