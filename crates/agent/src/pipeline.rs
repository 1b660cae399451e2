use permitdesk_core::projection::detail::{DetailLayout, StandardDetailLayout};
use permitdesk_core::projection::{parse_record_response, table};
use permitdesk_core::{DomainError, UiPayload};
use serde_json::Value;
use tracing::warn;

use crate::resolver::RelationshipResolver;

/// Tools whose results are projected into a UI payload.
pub const RECORD_QUERY_TOOLS: [&str; 2] = ["get_records", "get_record"];
pub const SINGLE_RECORD_TOOL: &str = "get_record";

pub fn is_record_query(tool_name: &str) -> bool {
    RECORD_QUERY_TOOLS.contains(&tool_name)
}

/// A UI payload plus the one-line message that introduces it.
#[derive(Clone, Debug, PartialEq)]
pub struct Projection {
    pub summary: String,
    pub payload: UiPayload,
}

pub struct RecordProjectionPipeline<D = StandardDetailLayout> {
    resolver: RelationshipResolver,
    layout: D,
}

impl RecordProjectionPipeline<StandardDetailLayout> {
    pub fn new(resolver: RelationshipResolver) -> Self {
        Self { resolver, layout: StandardDetailLayout }
    }
}

impl<D> RecordProjectionPipeline<D>
where
    D: DetailLayout,
{
    pub fn with_layout(resolver: RelationshipResolver, layout: D) -> Self {
        Self { resolver, layout }
    }

    /// Projects a record-query tool response. Only a response that cannot be
    /// read as a record list is an error; an empty list is a no-results payload.
    pub async fn project(&self, tool_name: &str, raw: &Value, community: &str) -> Result<Projection, DomainError> {
        let response = parse_record_response(raw)?;
        if response.is_empty() {
            return Ok(Projection {
                summary: table::no_results_summary(community),
                payload: UiPayload::NoResults { community: community.to_string() },
            });
        }

        let enriched = self.resolver.enrich_many(&response.records, community).await;

        if tool_name == SINGLE_RECORD_TOOL {
            if let [record] = enriched.as_slice() {
                let payload = match self.layout.build(record, &response.included) {
                    Ok(schema) => UiPayload::Detail { schema, community: community.to_string() },
                    Err(error) => {
                        warn!(
                            event_name = "projection.detail_fallback",
                            record_id = %record.id,
                            error = %error,
                            "detail layout failed; showing raw record"
                        );
                        UiPayload::RecordFallback { record: record.to_value(), community: community.to_string() }
                    }
                };
                return Ok(Projection { summary: table::detail_summary(record), payload });
            }
        }

        let records = enriched.iter().map(|record| table::project_row(record, &response.included)).collect::<Vec<_>>();
        Ok(Projection {
            summary: table::table_summary(records.len(), community),
            payload: UiPayload::Table { records, community: community.to_string() },
        })
    }
}
