//! Engine facade: the operation contract consumed by the transport.
//!
//! Coordinates the registries, item store, enricher, search, relation
//! graph, and current-state singleton under one API with validation
//! and the shared error taxonomy. Every write runs in one IMMEDIATE
//! transaction; the enricher call is admission-controlled and
//! timeboxed, degrading to empty enrichment on failure.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{EngineConfig, HybridWeights};
use crate::enrich::{Enricher, Enrichment};
use crate::error::{Error, FieldError, Result};
use crate::model::{
    BaseType, CurrentState, FieldSchema, Item, ItemDetail, ItemSummary, Priority, Status, Tag,
    TypeDefinition, status::DEFAULT_STATUS_NAME, validate_date, validate_title,
};
use crate::search::{self, RelatedStrategy, ScoredItem};
use crate::storage::{
    ListFilter, NewItemRow, SqliteStorage, StatsReport, item_store, relation_graph, state_store,
    status_registry, tag_store, type_registry,
};

// ── Parameters ────────────────────────────────────────────────

/// Parameters for `create_item`.
///
/// `priority` and `status` are strings on the wire so bad values
/// surface as field-level validation errors rather than decode
/// failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateItemParams {
    #[serde(rename = "type")]
    pub item_type: String,
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub version: Option<String>,
    pub tags: Vec<String>,
    pub related: Vec<i64>,
}

/// Partial field mask for `update_item`. `None` leaves a field
/// unchanged; an empty string clears an optional text field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateItemParams {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub version: Option<String>,
    pub tags: Option<Vec<String>>,
    pub related: Option<Vec<i64>>,
}

/// Outcome of a `reindex` pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReindexReport {
    pub reindexed: usize,
    pub failed: usize,
    pub enricher_version: String,
}

// ── Enricher admission control ────────────────────────────────

/// Bounded in-flight counter ahead of the enricher; saturation sheds
/// load with `Busy` instead of queueing unboundedly.
struct EnricherGate {
    in_flight: AtomicUsize,
    depth: usize,
}

struct GateGuard<'a>(&'a AtomicUsize);

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl EnricherGate {
    fn new(depth: usize) -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            depth,
        }
    }

    fn acquire(&self) -> Result<GateGuard<'_>> {
        let previous = self.in_flight.fetch_add(1, Ordering::SeqCst);
        if previous >= self.depth {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::Busy);
        }
        Ok(GateGuard(&self.in_flight))
    }
}

// ── Registry cache ────────────────────────────────────────────

/// Generation-stamped cache for the read-mostly registries. Any
/// registry write bumps the generation, invalidating cached lists.
struct RegistryCache {
    generation: AtomicU64,
    statuses: RwLock<Option<(u64, Arc<Vec<Status>>)>>,
    types: RwLock<Option<(u64, Arc<Vec<TypeDefinition>>)>>,
}

impl RegistryCache {
    fn new() -> Self {
        Self {
            generation: AtomicU64::new(0),
            statuses: RwLock::new(None),
            types: RwLock::new(None),
        }
    }

    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn statuses<F>(&self, load: F) -> Result<Arc<Vec<Status>>>
    where
        F: FnOnce() -> Result<Vec<Status>>,
    {
        let generation = self.generation.load(Ordering::SeqCst);
        if let Ok(cached) = self.statuses.read() {
            if let Some((stamp, list)) = cached.as_ref() {
                if *stamp == generation {
                    return Ok(Arc::clone(list));
                }
            }
        }

        let fresh = Arc::new(load()?);
        if let Ok(mut slot) = self.statuses.write() {
            *slot = Some((generation, Arc::clone(&fresh)));
        }
        Ok(fresh)
    }

    fn types<F>(&self, load: F) -> Result<Arc<Vec<TypeDefinition>>>
    where
        F: FnOnce() -> Result<Vec<TypeDefinition>>,
    {
        let generation = self.generation.load(Ordering::SeqCst);
        if let Ok(cached) = self.types.read() {
            if let Some((stamp, list)) = cached.as_ref() {
                if *stamp == generation {
                    return Ok(Arc::clone(list));
                }
            }
        }

        let fresh = Arc::new(load()?);
        if let Ok(mut slot) = self.types.write() {
            *slot = Some((generation, Arc::clone(&fresh)));
        }
        Ok(fresh)
    }
}

// ── Engine ────────────────────────────────────────────────────

/// The knowledge-base engine.
///
/// `Send + Sync`; operations take `&self` and serialize writes
/// through the storage mutex and SQLite's own locking.
pub struct Engine {
    store: Mutex<SqliteStorage>,
    enricher: Arc<dyn Enricher>,
    config: EngineConfig,
    gate: EnricherGate,
    cache: RegistryCache,
}

impl Engine {
    /// Open the engine against the configured database path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(config: EngineConfig, enricher: Arc<dyn Enricher>) -> Result<Self> {
        let store = SqliteStorage::open(&config.database_path)?;
        Ok(Self::from_parts(store, config, enricher))
    }

    /// Open an engine over an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn open_memory(config: EngineConfig, enricher: Arc<dyn Enricher>) -> Result<Self> {
        let store = SqliteStorage::open_memory()?;
        Ok(Self::from_parts(store, config, enricher))
    }

    fn from_parts(store: SqliteStorage, config: EngineConfig, enricher: Arc<dyn Enricher>) -> Self {
        let gate = EnricherGate::new(config.enricher_queue_depth);
        info!(enricher_version = %enricher.version(), "engine ready");
        Self {
            store: Mutex::new(store),
            enricher,
            config,
            gate,
            cache: RegistryCache::new(),
        }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The enricher's opaque version identifier.
    #[must_use]
    pub fn enricher_version(&self) -> String {
        self.enricher.version()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, SqliteStorage>> {
        self.store
            .lock()
            .map_err(|_| Error::Internal("storage lock poisoned".to_string()))
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Run the enricher on a worker thread with the configured budget.
    /// Timeouts and failures degrade to empty enrichment.
    fn run_enricher(&self, title: &str, content: Option<&str>, tags: &[String]) -> Enrichment {
        let enricher = Arc::clone(&self.enricher);
        let title = title.to_string();
        let content = content.map(ToString::to_string);
        let tags = tags.to_vec();

        let (sender, receiver) = mpsc::channel();
        std::thread::spawn(move || {
            let result = enricher.enrich(&title, content.as_deref(), &tags);
            let _ = sender.send(result);
        });

        match receiver.recv_timeout(Duration::from_millis(self.config.enricher_timeout_ms)) {
            Ok(Ok(enrichment)) => enrichment,
            Ok(Err(e)) => {
                warn!(error = %e, "enrichment failed, writing empty enrichment");
                Enrichment::empty()
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.config.enricher_timeout_ms,
                    "enrichment timed out, writing empty enrichment"
                );
                Enrichment::empty()
            }
        }
    }

    // ── Item operations ───────────────────────────────────────

    /// Create an item.
    ///
    /// # Errors
    ///
    /// - `NotFound` for unknown type or status.
    /// - `Validation` with a per-field breakdown.
    /// - `Busy` when the enricher queue is saturated.
    pub fn create_item(&self, params: &CreateItemParams) -> Result<ItemDetail> {
        let _guard = self.gate.acquire()?;
        let now = Self::now();

        let mut store = self.lock()?;
        store.mutate("create_item", |tx| {
            let schema = type_registry::fields_for(tx, &params.item_type)?;
            validate_create(&schema, params)?;

            let priority = parse_priority_param(params.priority.as_deref())?;
            let status_name = params.status.as_deref().unwrap_or(DEFAULT_STATUS_NAME);
            let status = status_registry::get_by_name(tx, status_name)?;

            let row = NewItemRow {
                item_type: &params.item_type,
                title: &params.title,
                description: params.description.as_deref(),
                content: params.content.as_deref(),
                status_id: status.id,
                priority,
                category: params.category.as_deref(),
                start_date: params.start_date.as_deref(),
                end_date: params.end_date.as_deref(),
                version: params.version.as_deref(),
            };
            let id = item_store::insert(tx, &row, now)?;

            let tag_ids = tag_store::resolve_or_create(tx, &params.tags)?;
            tag_store::set_item_tags(tx, id, &tag_ids)?;
            let tag_names = tag_store::tags_of_item(tx, id)?;

            let enrichment =
                self.run_enricher(&params.title, params.content.as_deref(), &tag_names);
            write_enrichment(tx, id, &enrichment)?;

            search::fts::index_item(
                tx,
                id,
                &params.title,
                params.description.as_deref(),
                params.content.as_deref(),
                &tag_names,
            )?;

            for &target in &params.related {
                relation_graph::add_relation(tx, id, target)?;
            }

            build_detail(tx, item_store::get(tx, id)?)
        })
    }

    /// Fetch an item with resolved side data.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if absent.
    pub fn get_item(&self, id: i64) -> Result<ItemDetail> {
        let store = self.lock()?;
        let item = item_store::get(store.conn(), id)?;
        build_detail(store.conn(), item)
    }

    /// Apply a partial update.
    ///
    /// Re-runs the enricher when title, content, or tags changed.
    ///
    /// # Errors
    ///
    /// - `NotFound` for unknown item or status.
    /// - `Validation` with a per-field breakdown.
    /// - `Busy` when the enricher queue is saturated.
    pub fn update_item(&self, id: i64, params: &UpdateItemParams) -> Result<ItemDetail> {
        let _guard = self.gate.acquire()?;
        let now = Self::now();

        let mut store = self.lock()?;
        store.mutate("update_item", |tx| {
            let mut item = item_store::get(tx, id)?;
            let schema = type_registry::fields_for(tx, &item.item_type)?;
            validate_update(&schema, params, &item)?;

            let mut text_changed = false;
            if let Some(title) = &params.title {
                text_changed |= item.title != *title;
                item.title = title.clone();
            }
            if let Some(description) = &params.description {
                item.description = non_empty(description);
            }
            if let Some(content) = &params.content {
                let new_content = non_empty(content);
                text_changed |= item.content != new_content;
                item.content = new_content;
            }
            if let Some(priority) = &params.priority {
                item.priority = parse_priority_param(Some(priority))?;
            }
            if let Some(status) = &params.status {
                item.status_id = status_registry::get_by_name(tx, status)?.id;
            }
            if let Some(category) = &params.category {
                item.category = non_empty(category);
            }
            if let Some(start) = &params.start_date {
                item.start_date = non_empty(start);
            }
            if let Some(end) = &params.end_date {
                item.end_date = non_empty(end);
            }
            if let Some(version) = &params.version {
                item.version = non_empty(version);
            }

            let mut tags_changed = false;
            if let Some(tags) = &params.tags {
                let before = tag_store::tags_of_item(tx, id)?;
                let tag_ids = tag_store::resolve_or_create(tx, tags)?;
                tag_store::set_item_tags(tx, id, &tag_ids)?;
                tags_changed = before != tag_store::tags_of_item(tx, id)?;
            }

            item.updated_at = now.max(item.created_at);
            item_store::update_row(tx, &item)?;

            let tag_names = tag_store::tags_of_item(tx, id)?;
            if text_changed || tags_changed {
                let enrichment =
                    self.run_enricher(&item.title, item.content.as_deref(), &tag_names);
                write_enrichment(tx, id, &enrichment)?;
            }

            // The FTS entry mirrors text and tags either way
            search::fts::index_item(
                tx,
                id,
                &item.title,
                item.description.as_deref(),
                item.content.as_deref(),
                &tag_names,
            )?;

            if let Some(related) = &params.related {
                relation_graph::replace_relations(tx, id, related)?;
            }

            build_detail(tx, item_store::get(tx, id)?)
        })
    }

    /// Delete an item and everything that references it.
    ///
    /// Relation mirrors are cleared and a current-state pin is pruned
    /// rather than vetoing the delete.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if absent.
    pub fn delete_item(&self, id: i64) -> Result<()> {
        let mut store = self.lock()?;
        store.mutate("delete_item", |tx| {
            if !item_store::exists(tx, id)? {
                return Err(Error::NotFound {
                    entity: "item",
                    key: id.to_string(),
                });
            }

            relation_graph::on_item_delete(tx, id)?;
            state_store::prune_related(tx, id)?;
            search::fts::deindex_item(tx, id)?;
            item_store::delete(tx, id)
        })
    }

    /// List item summaries with structured filters.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn list_items(&self, filter: &ListFilter) -> Result<Vec<ItemSummary>> {
        let limit = self.config.effective_limit(filter.limit);
        let store = self.lock()?;
        item_store::list(store.conn(), filter, limit)
    }

    /// Structured full-text search.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuery` for unsupported constructs.
    pub fn search_items(
        &self,
        query: &str,
        types: Option<&[String]>,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Vec<ItemSummary>> {
        let parsed = search::parse(query)?;
        let limit = self.config.effective_limit(limit);
        let store = self.lock()?;
        search::executor::search_items(store.conn(), &parsed, types, limit, offset.unwrap_or(0))
    }

    /// Items carrying a tag, grouped by type.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn search_items_by_tag(
        &self,
        tag: &str,
        types: Option<&[String]>,
    ) -> Result<std::collections::BTreeMap<String, Vec<ItemSummary>>> {
        let store = self.lock()?;
        search::executor::search_by_tag(store.conn(), tag, types)
    }

    /// Title suggestions for a prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn search_suggest(
        &self,
        prefix: &str,
        types: Option<&[String]>,
        limit: Option<usize>,
    ) -> Result<Vec<String>> {
        let limit = self.config.effective_limit(limit);
        let store = self.lock()?;
        search::fts::suggest(store.conn(), prefix, types, limit)
    }

    /// Semantic neighborhood search.
    ///
    /// # Errors
    ///
    /// - `NotFound` for a missing anchor.
    /// - `Validation` for weights that do not sum to 1.0.
    pub fn get_related_items(
        &self,
        id: i64,
        strategy: RelatedStrategy,
        weights: Option<HybridWeights>,
        limit: Option<usize>,
    ) -> Result<Vec<ScoredItem>> {
        let weights = weights.unwrap_or(self.config.hybrid_default_weights);
        if strategy == RelatedStrategy::Hybrid && !weights.is_normalized() {
            return Err(Error::validation(
                "weights",
                format!("must sum to 1.0, got {}", weights.total()),
            ));
        }

        let limit = limit.unwrap_or(10).clamp(1, self.config.max_list_limit);
        let store = self.lock()?;
        search::related::related_items(
            store.conn(),
            id,
            strategy,
            &weights,
            limit,
            self.config.embedding_candidate_ceiling,
        )
    }

    /// Add relations from `id` to each target, atomically.
    ///
    /// # Errors
    ///
    /// - `NotFound` for a missing anchor.
    /// - `InvalidRelation` for self-edges or dangling targets.
    pub fn add_relations(&self, id: i64, targets: &[i64]) -> Result<Vec<i64>> {
        let mut store = self.lock()?;
        store.mutate("add_relations", |tx| {
            if !item_store::exists(tx, id)? {
                return Err(Error::NotFound {
                    entity: "item",
                    key: id.to_string(),
                });
            }
            for &target in targets {
                relation_graph::add_relation(tx, id, target)?;
            }
            relation_graph::relations_of(tx, id)
        })
    }

    /// Remove relations from `id` to each target, atomically.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for a missing anchor.
    pub fn remove_relations(&self, id: i64, targets: &[i64]) -> Result<Vec<i64>> {
        let mut store = self.lock()?;
        store.mutate("remove_relations", |tx| {
            if !item_store::exists(tx, id)? {
                return Err(Error::NotFound {
                    entity: "item",
                    key: id.to_string(),
                });
            }
            for &target in targets {
                relation_graph::remove_relation(tx, id, target)?;
            }
            relation_graph::relations_of(tx, id)
        })
    }

    /// Move an item to another type sharing the same base.
    ///
    /// The id and relations are preserved; fields outside the target
    /// schema fail the move unless `strip_disallowed` opts in.
    ///
    /// # Errors
    ///
    /// - `NotFound` for a missing item or target type.
    /// - `Validation` for cross-base moves or disallowed fields.
    /// - `Busy` when the enricher queue is saturated.
    pub fn change_item_type(
        &self,
        id: i64,
        to_type: &str,
        strip_disallowed: bool,
    ) -> Result<ItemDetail> {
        let _guard = self.gate.acquire()?;
        let now = Self::now();

        let mut store = self.lock()?;
        store.mutate("change_item_type", |tx| {
            let mut item = item_store::get(tx, id)?;
            let from_def = type_registry::get(tx, &item.item_type)?;
            let to_def = type_registry::get(tx, to_type)?;

            if from_def.base_type != to_def.base_type {
                return Err(Error::validation(
                    "type",
                    format!(
                        "cannot move across base types ({} -> {})",
                        from_def.base_type, to_def.base_type
                    ),
                ));
            }

            let schema = FieldSchema::for_base(to_def.base_type);
            let mut stripped = Vec::new();
            if item.start_date.is_some() && !schema.allows("startDate") {
                stripped.push("startDate");
            }
            if item.end_date.is_some() && !schema.allows("endDate") {
                stripped.push("endDate");
            }
            if !stripped.is_empty() {
                if !strip_disallowed {
                    return Err(Error::Validation(
                        stripped
                            .iter()
                            .map(|f| FieldError::new(f, "not allowed by the target type"))
                            .collect(),
                    ));
                }
                if stripped.contains(&"startDate") {
                    item.start_date = None;
                }
                if stripped.contains(&"endDate") {
                    item.end_date = None;
                }
            }

            item.item_type = to_type.to_string();
            item.updated_at = now.max(item.created_at);
            item_store::update_row(tx, &item)?;

            let tag_names = tag_store::tags_of_item(tx, id)?;
            let enrichment = self.run_enricher(&item.title, item.content.as_deref(), &tag_names);
            write_enrichment(tx, id, &enrichment)?;
            search::fts::index_item(
                tx,
                id,
                &item.title,
                item.description.as_deref(),
                item.content.as_deref(),
                &tag_names,
            )?;

            build_detail(tx, item_store::get(tx, id)?)
        })
    }

    // ── Current state ─────────────────────────────────────────

    /// Read the current-state singleton.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn get_current_state(&self) -> Result<CurrentState> {
        let store = self.lock()?;
        state_store::get(store.conn())
    }

    /// Overwrite the current-state singleton.
    ///
    /// Omitted `tags`/`related` keep their previous values; pinned
    /// item ids must exist.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for a dangling pinned id.
    pub fn update_current_state(
        &self,
        content: &str,
        tags: Option<&[String]>,
        related: Option<&[i64]>,
        updated_by: Option<&str>,
    ) -> Result<CurrentState> {
        let now = Self::now();
        let mut store = self.lock()?;
        store.mutate("update_current_state", |tx| {
            let previous = state_store::get(tx)?;
            let tags: Vec<String> = match tags {
                Some(tags) => tags
                    .iter()
                    .filter_map(|t| crate::model::normalize_tag_name(t))
                    .collect(),
                None => previous.tags,
            };
            let related = related.map_or(previous.related, <[i64]>::to_vec);
            state_store::update(tx, content, &tags, &related, updated_by, now)
        })
    }

    // ── Stats and registries ──────────────────────────────────

    /// Counts per type and status, total tags, last update.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn get_stats(&self) -> Result<StatsReport> {
        let store = self.lock()?;
        item_store::stats(store.conn())
    }

    /// All workflow statuses (cached).
    ///
    /// # Errors
    ///
    /// Returns an error if the load fails.
    pub fn get_statuses(&self) -> Result<Arc<Vec<Status>>> {
        self.cache.statuses(|| {
            let store = self.lock()?;
            status_registry::list(store.conn())
        })
    }

    /// All tags.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_tags(&self) -> Result<Vec<Tag>> {
        let store = self.lock()?;
        tag_store::list(store.conn())
    }

    /// Create a tag explicitly.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` or `Validation`.
    pub fn create_tag(&self, name: &str) -> Result<Tag> {
        let mut store = self.lock()?;
        store.mutate("create_tag", |tx| tag_store::create(tx, name))
    }

    /// Delete an unused tag.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `InUse`.
    pub fn delete_tag(&self, name: &str) -> Result<()> {
        let mut store = self.lock()?;
        store.mutate("delete_tag", |tx| tag_store::remove(tx, name))
    }

    /// Case-insensitive substring search over tags.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn search_tags(&self, pattern: &str) -> Result<Vec<Tag>> {
        let store = self.lock()?;
        tag_store::search_by_pattern(store.conn(), pattern)
    }

    /// Registered types, optionally restricted by base (cached when
    /// unrestricted).
    ///
    /// # Errors
    ///
    /// Returns an error if the load fails.
    pub fn get_types(&self, base_type: Option<BaseType>) -> Result<Vec<TypeDefinition>> {
        match base_type {
            None => {
                let all = self.cache.types(|| {
                    let store = self.lock()?;
                    type_registry::list(store.conn(), None)
                })?;
                Ok(all.as_ref().clone())
            }
            Some(base) => {
                let store = self.lock()?;
                type_registry::list(store.conn(), Some(base))
            }
        }
    }

    /// Register a new item type.
    ///
    /// # Errors
    ///
    /// Returns `Validation` or `AlreadyExists`.
    pub fn create_type(
        &self,
        name: &str,
        base_type: BaseType,
        description: Option<&str>,
    ) -> Result<TypeDefinition> {
        let mut store = self.lock()?;
        let result =
            store.mutate("create_type", |tx| {
                type_registry::register(tx, name, base_type, description)
            })?;
        self.cache.bump();
        Ok(result)
    }

    /// Update a type's description.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the type is not registered.
    pub fn update_type(&self, name: &str, description: Option<&str>) -> Result<TypeDefinition> {
        let mut store = self.lock()?;
        let result = store.mutate("update_type", |tx| {
            type_registry::update_description(tx, name, description)
        })?;
        self.cache.bump();
        Ok(result)
    }

    /// Remove an unused registered type.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `InUse`, or `Validation` for reserved names.
    pub fn delete_type(&self, name: &str) -> Result<()> {
        let mut store = self.lock()?;
        store.mutate("delete_type", |tx| type_registry::remove(tx, name))?;
        self.cache.bump();
        Ok(())
    }

    // ── Maintenance ───────────────────────────────────────────

    /// Re-run the enricher over every item and rewrite derived rows
    /// and the FTS index.
    ///
    /// Items whose enrichment fails keep empty derived fields and are
    /// counted in `failed`.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn reindex(&self) -> Result<ReindexReport> {
        let mut store = self.lock()?;
        let report = store.mutate("reindex", |tx| {
            let mut report = ReindexReport {
                enricher_version: self.enricher.version(),
                ..Default::default()
            };

            for id in item_store::all_ids(tx)? {
                let item = item_store::get(tx, id)?;
                let tag_names = tag_store::tags_of_item(tx, id)?;
                let enrichment =
                    self.run_enricher(&item.title, item.content.as_deref(), &tag_names);
                if enrichment.embedding.is_none() && enrichment.keywords.is_empty() {
                    report.failed += 1;
                } else {
                    report.reindexed += 1;
                }
                write_enrichment(tx, id, &enrichment)?;
                search::fts::index_item(
                    tx,
                    id,
                    &item.title,
                    item.description.as_deref(),
                    item.content.as_deref(),
                    &tag_names,
                )?;
            }

            Ok(report)
        })?;

        info!(
            reindexed = report.reindexed,
            failed = report.failed,
            "reindex complete"
        );
        Ok(report)
    }

    /// Read-only integrity scan: relation symmetry, FTS/table sync,
    /// and reference validity. Returns human-readable violations.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn check_integrity(&self) -> Result<Vec<String>> {
        let store = self.lock()?;
        let conn = store.conn();
        let mut violations = relation_graph::find_asymmetric_edges(conn)?;

        let item_ids: std::collections::BTreeSet<i64> =
            item_store::all_ids(conn)?.into_iter().collect();
        let fts_ids: std::collections::BTreeSet<i64> =
            search::fts::all_indexed_ids(conn)?.into_iter().collect();

        for &id in fts_ids.difference(&item_ids) {
            violations.push(format!("fts entry {id} has no backing item"));
        }
        for &id in item_ids.difference(&fts_ids) {
            violations.push(format!("item {id} is missing from the fts index"));
        }

        let mut stmt = conn.prepare(
            "SELECT i.id FROM items i
             LEFT JOIN statuses s ON i.status_id = s.id
             WHERE s.id IS NULL",
        )?;
        let orphans = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for id in orphans {
            violations.push(format!("item {id} references a missing status"));
        }

        let mut stmt = conn.prepare(
            "SELECT i.id FROM items i
             LEFT JOIN type_definitions t ON i.type = t.name
             WHERE t.name IS NULL",
        )?;
        let orphans = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for id in orphans {
            violations.push(format!("item {id} references an unregistered type"));
        }

        Ok(violations)
    }
}

// ── Helpers ───────────────────────────────────────────────────

fn non_empty(s: &str) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

fn parse_priority_param(value: Option<&str>) -> Result<Priority> {
    match value {
        None => Ok(Priority::default()),
        Some(raw) => Priority::parse(raw).ok_or_else(|| {
            Error::validation(
                "priority",
                "expected one of CRITICAL, HIGH, MEDIUM, LOW, MINIMAL",
            )
        }),
    }
}

fn check_dates(
    errors: &mut Vec<FieldError>,
    start: Option<&str>,
    end: Option<&str>,
) {
    if let Some(start) = start {
        if let Err(e) = validate_date("startDate", start) {
            errors.push(e);
        }
    }
    if let Some(end) = end {
        if let Err(e) = validate_date("endDate", end) {
            errors.push(e);
        }
    }
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            errors.push(FieldError::new("startDate", "must not be after endDate"));
        }
    }
}

fn validate_create(schema: &FieldSchema, params: &CreateItemParams) -> Result<()> {
    let mut errors = Vec::new();

    if let Err(e) = validate_title(&params.title) {
        errors.push(e);
    }

    let present: &[(&str, bool)] = &[
        ("description", params.description.is_some()),
        ("content", params.content.is_some()),
        ("priority", params.priority.is_some()),
        ("status", params.status.is_some()),
        ("category", params.category.is_some()),
        ("startDate", params.start_date.is_some()),
        ("endDate", params.end_date.is_some()),
        ("version", params.version.is_some()),
        ("tags", !params.tags.is_empty()),
        ("related", !params.related.is_empty()),
    ];
    for &(field, is_present) in present {
        if is_present && !schema.allows(field) {
            errors.push(FieldError::new(field, "unknown field for this type"));
        }
    }

    check_dates(
        &mut errors,
        params.start_date.as_deref(),
        params.end_date.as_deref(),
    );

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(errors))
    }
}

fn validate_update(schema: &FieldSchema, params: &UpdateItemParams, current: &Item) -> Result<()> {
    let mut errors = Vec::new();

    if let Some(title) = &params.title {
        if let Err(e) = validate_title(title) {
            errors.push(e);
        }
    }

    let present: &[(&str, bool)] = &[
        ("description", params.description.is_some()),
        ("content", params.content.is_some()),
        ("priority", params.priority.is_some()),
        ("status", params.status.is_some()),
        ("category", params.category.is_some()),
        ("startDate", params.start_date.is_some()),
        ("endDate", params.end_date.is_some()),
        ("version", params.version.is_some()),
        ("tags", params.tags.is_some()),
        ("related", params.related.is_some()),
    ];
    for &(field, is_present) in present {
        if is_present && !schema.allows(field) {
            errors.push(FieldError::new(field, "unknown field for this type"));
        }
    }

    // Date order is checked against the effective values after the
    // partial mask is applied; empty strings clear.
    let effective_start = match params.start_date.as_deref() {
        Some("") => None,
        Some(s) => Some(s.to_string()),
        None => current.start_date.clone(),
    };
    let effective_end = match params.end_date.as_deref() {
        Some("") => None,
        Some(s) => Some(s.to_string()),
        None => current.end_date.clone(),
    };
    check_dates(
        &mut errors,
        effective_start.as_deref(),
        effective_end.as_deref(),
    );

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(errors))
    }
}

fn write_enrichment(conn: &Connection, id: i64, enrichment: &Enrichment) -> Result<()> {
    let blob = enrichment
        .embedding
        .as_ref()
        .map(crate::enrich::QuantizedEmbedding::to_blob);
    item_store::write_derived(
        conn,
        id,
        enrichment.ai_summary.as_deref(),
        if enrichment.search_index.is_empty() {
            None
        } else {
            Some(&enrichment.search_index)
        },
        blob.as_deref(),
    )?;
    item_store::replace_keywords(conn, id, &enrichment.keywords)?;
    item_store::replace_concepts(conn, id, &enrichment.concepts)?;
    Ok(())
}

fn build_detail(conn: &Connection, item: Item) -> Result<ItemDetail> {
    let status = status_registry::get_by_id(conn, item.status_id)?;
    let tags = tag_store::tags_of_item(conn, item.id)?;
    let keywords = item_store::keywords_of(conn, item.id)?;
    let concepts = item_store::concepts_of(conn, item.id)?;
    let related = relation_graph::relations_of(conn, item.id)?;

    Ok(ItemDetail {
        item,
        status: status.name,
        tags,
        keywords,
        concepts,
        related,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::LocalEnricher;

    fn engine() -> Engine {
        Engine::open_memory(EngineConfig::default(), Arc::new(LocalEnricher::new())).unwrap()
    }

    fn issue_params(title: &str) -> CreateItemParams {
        CreateItemParams {
            item_type: "issues".to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_applies_defaults_and_enriches() {
        let engine = engine();
        let detail = engine
            .create_item(&CreateItemParams {
                content: Some("POST /login returns 500".to_string()),
                tags: vec!["bug".to_string(), "auth".to_string()],
                priority: Some("HIGH".to_string()),
                ..issue_params("Login broken")
            })
            .unwrap();

        assert!(detail.item.id > 0);
        assert_eq!(detail.status, "Open");
        assert_eq!(detail.item.priority, Priority::High);
        assert_eq!(detail.tags, vec!["bug".to_string(), "auth".to_string()]);
        assert!(!detail.keywords.is_empty());
        assert!(detail.item.search_index.is_some());
    }

    #[test]
    fn test_create_rejects_unknown_type_and_fields() {
        let engine = engine();
        let err = engine
            .create_item(&CreateItemParams {
                item_type: "ghosts".to_string(),
                title: "x".to_string(),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "type", .. }));

        // docs cannot carry dates
        let err = engine
            .create_item(&CreateItemParams {
                item_type: "docs".to_string(),
                title: "API guide".to_string(),
                start_date: Some("2025-01-01".to_string()),
                ..Default::default()
            })
            .unwrap_err();
        let Error::Validation(fields) = err else {
            panic!("expected validation error");
        };
        assert_eq!(fields[0].field, "startDate");
    }

    #[test]
    fn test_create_validates_date_order() {
        let engine = engine();
        let err = engine
            .create_item(&CreateItemParams {
                start_date: Some("2025-06-01".to_string()),
                end_date: Some("2025-01-01".to_string()),
                ..issue_params("Backwards")
            })
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_update_partial_and_reenrich() {
        let engine = engine();
        let created = engine
            .create_item(&CreateItemParams {
                content: Some("original content here".to_string()),
                ..issue_params("Original title")
            })
            .unwrap();
        let before_keywords = created.keywords.clone();

        let updated = engine
            .update_item(
                created.item.id,
                &UpdateItemParams {
                    content: Some("completely different words now".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.item.title, "Original title");
        assert_ne!(updated.keywords, before_keywords);
        assert!(updated.item.updated_at >= created.item.updated_at);
    }

    #[test]
    fn test_update_status_by_name() {
        let engine = engine();
        let created = engine.create_item(&issue_params("Will close")).unwrap();

        let updated = engine
            .update_item(
                created.item.id,
                &UpdateItemParams {
                    status: Some("Closed".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.status, "Closed");

        let err = engine
            .update_item(
                created.item.id,
                &UpdateItemParams {
                    status: Some("Nonsense".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "status", .. }));
    }

    #[test]
    fn test_delete_cleans_up() {
        let engine = engine();
        let a = engine.create_item(&issue_params("A")).unwrap().item.id;
        let b = engine.create_item(&issue_params("B")).unwrap().item.id;
        engine.add_relations(a, &[b]).unwrap();

        engine.delete_item(a).unwrap();
        assert!(matches!(
            engine.get_item(a),
            Err(Error::NotFound { .. })
        ));
        assert!(engine.get_item(b).unwrap().related.is_empty());
        assert!(engine.check_integrity().unwrap().is_empty());
    }

    #[test]
    fn test_change_item_type_same_base() {
        let engine = engine();
        let id = engine.create_item(&issue_params("Movable")).unwrap().item.id;
        engine
            .create_type("bugs", BaseType::Tasks, None)
            .unwrap();

        let moved = engine.change_item_type(id, "bugs", false).unwrap();
        assert_eq!(moved.item.item_type, "bugs");
        assert_eq!(moved.item.id, id);

        let err = engine.change_item_type(id, "docs", false).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_related_weights_validated() {
        let engine = engine();
        let id = engine.create_item(&issue_params("Anchor")).unwrap().item.id;

        let err = engine
            .get_related_items(
                id,
                RelatedStrategy::Hybrid,
                Some(HybridWeights {
                    keywords: 0.9,
                    concepts: 0.0,
                    embedding: 0.9,
                }),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_registry_cache_invalidation() {
        let engine = engine();
        let before = engine.get_types(None).unwrap().len();

        engine.create_type("notes", BaseType::Documents, None).unwrap();
        let after = engine.get_types(None).unwrap().len();
        assert_eq!(after, before + 1);

        engine.delete_type("notes").unwrap();
        assert_eq!(engine.get_types(None).unwrap().len(), before);
    }

    #[test]
    fn test_busy_when_gate_saturated() {
        let config = EngineConfig {
            enricher_queue_depth: 0,
            ..Default::default()
        };
        let engine =
            Engine::open_memory(config, Arc::new(LocalEnricher::new())).unwrap();

        let err = engine.create_item(&issue_params("Shed me")).unwrap_err();
        assert!(matches!(err, Error::Busy));
    }

    #[test]
    fn test_reindex_counts() {
        let engine = engine();
        engine
            .create_item(&CreateItemParams {
                content: Some("auth token expired".to_string()),
                ..issue_params("Login broken")
            })
            .unwrap();
        engine.create_item(&issue_params("Another")).unwrap();

        let report = engine.reindex().unwrap();
        assert_eq!(report.reindexed, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(report.enricher_version, "local-1");
    }

    #[test]
    fn test_current_state_roundtrip() {
        let engine = engine();
        assert_eq!(engine.get_current_state().unwrap().content, "");

        engine
            .update_current_state("phase A", None, None, Some("agent-1"))
            .unwrap();
        let state = engine.get_current_state().unwrap();
        assert_eq!(state.content, "phase A");
        assert_eq!(state.updated_by.as_deref(), Some("agent-1"));
    }
}
