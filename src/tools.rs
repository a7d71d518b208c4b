//! Stable tool surface consumed by the JSON-RPC/MCP transport.
//!
//! Each engine operation is exposed under a fixed tool name with
//! camelCase parameter and response shapes. Tool names and wire
//! encoding are the cross-version contract with clients; the
//! transport itself lives outside this crate and only calls
//! [`dispatch`].

use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::HybridWeights;
use crate::engine::{CreateItemParams, Engine, UpdateItemParams};
use crate::error::{Error, Result};
use crate::model::BaseType;
use crate::search::RelatedStrategy;
use crate::storage::ListFilter;

/// Every tool name, in the order of the contract.
pub const TOOL_NAMES: &[&str] = &[
    "create_item",
    "get_item",
    "update_item",
    "delete_item",
    "list_items",
    "search_items",
    "search_items_by_tag",
    "search_suggest",
    "get_related_items",
    "add_relations",
    "remove_relations",
    "change_item_type",
    "get_current_state",
    "update_current_state",
    "get_stats",
    "get_statuses",
    "get_tags",
    "create_tag",
    "delete_tag",
    "search_tags",
    "get_types",
    "create_type",
    "update_type",
    "delete_type",
];

// ── Parameter shapes ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct IdParams {
    id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateItemEnvelope {
    id: i64,
    #[serde(flatten)]
    fields: UpdateItemParams,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemsParams {
    query: String,
    types: Option<Vec<String>>,
    limit: Option<usize>,
    offset: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchByTagParams {
    tag: String,
    types: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuggestParams {
    prefix: String,
    types: Option<Vec<String>>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct WeightsParam {
    keywords: Option<f64>,
    concepts: Option<f64>,
    embedding: Option<f64>,
}

impl WeightsParam {
    /// Unspecified strategies contribute 0.
    fn into_weights(self) -> HybridWeights {
        HybridWeights {
            keywords: self.keywords.unwrap_or(0.0),
            concepts: self.concepts.unwrap_or(0.0),
            embedding: self.embedding.unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelatedItemsParams {
    id: i64,
    strategy: Option<String>,
    weights: Option<WeightsParam>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelationsParams {
    id: i64,
    target_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangeTypeParams {
    id: i64,
    to_type: String,
    #[serde(default)]
    strip_disallowed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateStateParams {
    content: String,
    tags: Option<Vec<String>>,
    related: Option<Vec<i64>>,
    updated_by: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagNameParams {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TagPatternParams {
    pattern: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetTypesParams {
    base_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTypeParams {
    name: String,
    base_type: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateTypeParams {
    name: String,
    description: Option<String>,
}

fn decode<T: serde::de::DeserializeOwned>(params: Value) -> Result<T> {
    serde_json::from_value(params).map_err(|e| Error::validation("params", e.to_string()))
}

fn parse_base_type(raw: &str) -> Result<BaseType> {
    BaseType::parse(raw)
        .ok_or_else(|| Error::validation("baseType", "expected tasks or documents"))
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

// ── Dispatch ──────────────────────────────────────────────────

/// Invoke a tool by name with JSON parameters.
///
/// # Errors
///
/// - `NotFound("tool", ..)` for an unknown name.
/// - `Validation` when the parameters do not decode.
/// - Whatever the underlying engine operation returns.
pub fn dispatch(engine: &Engine, tool: &str, params: Value) -> Result<Value> {
    match tool {
        "create_item" => {
            let params: CreateItemParams = decode(params)?;
            encode(&engine.create_item(&params)?)
        }
        "get_item" => {
            let params: IdParams = decode(params)?;
            encode(&engine.get_item(params.id)?)
        }
        "update_item" => {
            let params: UpdateItemEnvelope = decode(params)?;
            encode(&engine.update_item(params.id, &params.fields)?)
        }
        "delete_item" => {
            let params: IdParams = decode(params)?;
            engine.delete_item(params.id)?;
            Ok(json!({ "deleted": params.id }))
        }
        "list_items" => {
            let filter: ListFilter = decode(params)?;
            encode(&engine.list_items(&filter)?)
        }
        "search_items" => {
            let params: SearchItemsParams = decode(params)?;
            encode(&engine.search_items(
                &params.query,
                params.types.as_deref(),
                params.limit,
                params.offset,
            )?)
        }
        "search_items_by_tag" => {
            let params: SearchByTagParams = decode(params)?;
            encode(&engine.search_items_by_tag(&params.tag, params.types.as_deref())?)
        }
        "search_suggest" => {
            let params: SuggestParams = decode(params)?;
            encode(&engine.search_suggest(&params.prefix, params.types.as_deref(), params.limit)?)
        }
        "get_related_items" => {
            let params: RelatedItemsParams = decode(params)?;
            let strategy = match params.strategy.as_deref() {
                None => RelatedStrategy::default(),
                Some(raw) => RelatedStrategy::parse(raw).ok_or_else(|| {
                    Error::validation(
                        "strategy",
                        "expected keywords, concepts, embedding, or hybrid",
                    )
                })?,
            };
            let weights = params.weights.map(WeightsParam::into_weights);
            encode(&engine.get_related_items(params.id, strategy, weights, params.limit)?)
        }
        "add_relations" => {
            let params: RelationsParams = decode(params)?;
            let related = engine.add_relations(params.id, &params.target_ids)?;
            Ok(json!({ "id": params.id, "related": related }))
        }
        "remove_relations" => {
            let params: RelationsParams = decode(params)?;
            let related = engine.remove_relations(params.id, &params.target_ids)?;
            Ok(json!({ "id": params.id, "related": related }))
        }
        "change_item_type" => {
            let params: ChangeTypeParams = decode(params)?;
            encode(&engine.change_item_type(params.id, &params.to_type, params.strip_disallowed)?)
        }
        "get_current_state" => encode(&engine.get_current_state()?),
        "update_current_state" => {
            let params: UpdateStateParams = decode(params)?;
            encode(&engine.update_current_state(
                &params.content,
                params.tags.as_deref(),
                params.related.as_deref(),
                params.updated_by.as_deref(),
            )?)
        }
        "get_stats" => encode(&engine.get_stats()?),
        "get_statuses" => encode(&*engine.get_statuses()?),
        "get_tags" => encode(&engine.get_tags()?),
        "create_tag" => {
            let params: TagNameParams = decode(params)?;
            encode(&engine.create_tag(&params.name)?)
        }
        "delete_tag" => {
            let params: TagNameParams = decode(params)?;
            engine.delete_tag(&params.name)?;
            Ok(json!({ "deleted": params.name }))
        }
        "search_tags" => {
            let params: TagPatternParams = decode(params)?;
            encode(&engine.search_tags(&params.pattern)?)
        }
        "get_types" => {
            let params: GetTypesParams = decode(params)?;
            let base = params
                .base_type
                .as_deref()
                .map(parse_base_type)
                .transpose()?;
            encode(&engine.get_types(base)?)
        }
        "create_type" => {
            let params: CreateTypeParams = decode(params)?;
            let base = parse_base_type(&params.base_type)?;
            encode(&engine.create_type(&params.name, base, params.description.as_deref())?)
        }
        "update_type" => {
            let params: UpdateTypeParams = decode(params)?;
            encode(&engine.update_type(&params.name, params.description.as_deref())?)
        }
        "delete_type" => {
            let params: TagNameParams = decode(params)?;
            engine.delete_type(&params.name)?;
            Ok(json!({ "deleted": params.name }))
        }
        unknown => Err(Error::NotFound {
            entity: "tool",
            key: unknown.to_string(),
        }),
    }
}
