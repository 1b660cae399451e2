use std::sync::Arc;

use futures::future::join_all;
use permitdesk_core::domain::record::{attribute_text, Attributes, Record, Resolved};
use permitdesk_core::projection::fields;
use permitdesk_core::ApplicationError;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::tools::{Tool, ToolRegistry};

/// Link value RecordAPI emits when it has no real sub-resource URL.
pub const PLACEHOLDER_LINK: &str = "/path/to/resource";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnrichedRelationship {
    Applicant,
    PrimaryLocation,
    RecordType,
}

impl EnrichedRelationship {
    pub const ALL: [EnrichedRelationship; 3] = [Self::Applicant, Self::PrimaryLocation, Self::RecordType];

    pub fn key(self) -> &'static str {
        match self {
            Self::Applicant => "applicant",
            Self::PrimaryLocation => "primaryLocation",
            Self::RecordType => "recordType",
        }
    }

    pub fn tool_name(self) -> &'static str {
        match self {
            Self::Applicant => "get_record_applicant",
            Self::PrimaryLocation => "get_record_primary_location",
            Self::RecordType => "get_record_type",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FetchRequest {
    pub relationship: EnrichedRelationship,
    pub tool: &'static str,
    pub args: Map<String, Value>,
}

/// Derives the sub-resource call from a relationship link such as
/// `/records/{id}/applicant` or `/recordTypes/{id}`.
pub fn fetch_request(relationship: EnrichedRelationship, link: &str, community: &str) -> Option<FetchRequest> {
    let path = link.split(['?', '#']).next().unwrap_or_default();
    let segments = path.split('/').filter(|segment| !segment.is_empty()).collect::<Vec<_>>();
    let id_after = |collection: &str| {
        segments.windows(2).find(|pair| pair[0] == collection).map(|pair| pair[1].to_string())
    };

    let mut args = Map::new();
    args.insert("community".to_string(), Value::String(community.to_string()));
    match relationship {
        EnrichedRelationship::Applicant | EnrichedRelationship::PrimaryLocation => {
            args.insert("record_id".to_string(), Value::String(id_after("records")?));
        }
        EnrichedRelationship::RecordType => {
            args.insert("record_type_id".to_string(), Value::String(id_after("recordTypes")?));
        }
    }

    Some(FetchRequest { relationship, tool: relationship.tool_name(), args })
}

/// Turns a sub-resource tool response into a display value. Error documents,
/// non-JSON text and responses without a usable name yield `None`.
pub fn resolve_response(relationship: EnrichedRelationship, output: &Value) -> Option<Resolved> {
    let decoded;
    let document = match output {
        Value::String(text) => {
            decoded = serde_json::from_str::<Value>(text).ok()?;
            &decoded
        }
        other => other,
    };

    let object = document.as_object()?;
    let resource = match object.get("data") {
        Some(Value::Array(items)) => items.first()?,
        Some(data @ Value::Object(_)) => data,
        Some(_) => return None,
        None if object.contains_key("error") => return None,
        None => document,
    };
    let attributes: &Attributes = resource
        .get("attributes")
        .and_then(Value::as_object)
        .or_else(|| resource.as_object())?;

    match relationship {
        EnrichedRelationship::Applicant => fields::person_name(attributes).map(Resolved::Name),
        EnrichedRelationship::RecordType => attribute_text(attributes, "name")
            .or_else(|| attribute_text(attributes, "description"))
            .or_else(|| fields::person_name(attributes))
            .map(Resolved::Name),
        EnrichedRelationship::PrimaryLocation => fields::address_line(attributes).map(Resolved::Address),
    }
}

/// Resolves the applicant, primary location and record type of records by
/// calling the matching sub-resource tools concurrently.
pub struct RelationshipResolver {
    registry: Arc<ToolRegistry>,
    record_limit: usize,
}

impl RelationshipResolver {
    pub fn new(registry: Arc<ToolRegistry>, record_limit: usize) -> Self {
        Self { registry, record_limit }
    }

    pub fn record_limit(&self) -> usize {
        self.record_limit
    }

    /// Returns a copy of `record` with resolvable relationships resolved.
    /// Failed fetches leave their relationship exactly as it was.
    pub async fn enrich(&self, record: &Record, community: &str) -> Record {
        let tools = self.registry.get_tools().await;

        let planned = EnrichedRelationship::ALL
            .into_iter()
            .filter_map(|kind| {
                let relationship = record.relationships.get(kind.key())?;
                if relationship.is_resolved() || relationship.is_inline() {
                    return None;
                }
                let link = relationship.related_link()?;
                if link == PLACEHOLDER_LINK {
                    return None;
                }
                let request = fetch_request(kind, link, community)?;
                let Some(tool) = tools.get(request.tool) else {
                    debug!(
                        event_name = "enrichment.tool_missing",
                        tool = request.tool,
                        record_id = %record.id,
                        "sub-resource tool not in catalog"
                    );
                    return None;
                };
                Some((request, tool))
            })
            .collect::<Vec<_>>();

        let mut enriched = record.clone();
        if planned.is_empty() {
            return enriched;
        }

        let outcomes = join_all(planned.into_iter().map(|(request, tool)| fetch(request, tool))).await;

        for (kind, outcome) in outcomes {
            let resolved = match outcome {
                Ok(resolved) => resolved,
                Err(error) => {
                    warn!(
                        event_name = "enrichment.fetch_failed",
                        record_id = %record.id,
                        error = %error,
                        "relationship left unresolved"
                    );
                    continue;
                }
            };
            if let Some(relationship) = enriched.relationships.get_mut(kind.key()) {
                *relationship = relationship.clone().with_resolved(resolved);
            }
        }

        enriched
    }

    /// Enriches only the first `record_limit` records, all concurrently; the
    /// rest are returned untouched. Output order matches input order.
    pub async fn enrich_many(&self, records: &[Record], community: &str) -> Vec<Record> {
        let limit = self.record_limit.min(records.len());
        let (head, tail) = records.split_at(limit);

        let mut enriched = join_all(head.iter().map(|record| self.enrich(record, community))).await;
        enriched.extend(tail.iter().cloned());
        enriched
    }
}

async fn fetch(
    request: FetchRequest,
    tool: Arc<dyn Tool>,
) -> (EnrichedRelationship, Result<Resolved, ApplicationError>) {
    let kind = request.relationship;
    let outcome = match tool.execute(Value::Object(request.args)).await {
        Ok(output) => resolve_response(kind, &output).ok_or_else(|| ApplicationError::RelationshipFetch {
            relationship: kind.key().to_string(),
            message: "response carried no usable value".to_string(),
        }),
        Err(error) => Err(ApplicationError::RelationshipFetch {
            relationship: kind.key().to_string(),
            message: format!("{error:#}"),
        }),
    };
    (kind, outcome)
}
