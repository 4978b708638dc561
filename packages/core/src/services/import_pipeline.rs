//! Validated Bulk Import
//!
//! Turns an externally authored JSON tree into a batch of flat records that can be
//! appended to the catalog in one transaction.
//!
//! # Stages
//!
//! `Idle → Parsing → Validating → Transforming → DuplicateCheck → {Committed | Rejected}`
//!
//! 1. **Parsing**: one object or an array of objects. Nodes nest through a
//!    `Children`/`children` array. An array of flat records (carrying `ParentId`
//!    and no children) is nested by its parent relation first.
//! 2. **Validating**: every node, recursively, needs a non-empty `Id` and `Name`.
//!    All defects are collected; any defect rejects the whole import.
//! 3. **Transforming**: every source node gets a fresh id; source roots attach to
//!    the attachment point, everything else to its parent's new id. Type
//!    references naming another source node follow it to its new id.
//! 4. **Orphan check**: every record's parent must be the attachment point or a
//!    record of the batch.
//! 5. **DuplicateCheck**: records whose signature matches an existing node or an
//!    earlier batch record are skipped with a warning. Their children are merged
//!    under the surviving node. A batch that is entirely duplicates is rejected.
//!
//! The pipeline never touches the store: it returns an `ImportResult` that the
//! editor commits atomically.

use crate::models::{generate_node_id, Node};
use crate::services::HierarchyIndex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

const ID_KEYS: [&str; 2] = ["Id", "id"];
const NAME_KEYS: [&str; 2] = ["Name", "name"];
const TYPE_KEYS: [&str; 4] = ["PayanarssTypeId", "payanarssTypeId", "TypeRef", "typeRef"];
const PARENT_KEYS: [&str; 2] = ["ParentId", "parentId"];
const ATTRIBUTE_KEYS: [&str; 2] = ["Attributes", "attributes"];
const DESCRIPTION_KEYS: [&str; 2] = ["Description", "description"];
const CHILDREN_KEYS: [&str; 2] = ["Children", "children"];

/// Computes the equality key used for duplicate detection
pub type SignatureFn = fn(&Node) -> String;

/// `(name.lowercased, typeRef, parentId)`.
///
/// Roots compare with an empty parent so a top-level import can match an
/// existing root.
pub fn default_signature(node: &Node) -> String {
    let parent = if node.is_root() { "" } else { &node.parent_id };
    format!(
        "{}\u{1f}{}\u{1f}{}",
        node.name.trim().to_lowercase(),
        node.type_ref,
        parent
    )
}

/// Pipeline state, reported on every result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ImportStage {
    Idle,
    Parsing,
    Validating,
    Transforming,
    DuplicateCheck,
    Committed,
    Rejected,
}

/// How the batch relates to what is already under the attachment point
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImportMode {
    /// Add alongside existing nodes
    #[default]
    Append,
    /// Remove the attachment point's existing descendants first (the whole
    /// catalog when importing at top level)
    ReplaceChildren,
}

/// Caller choices for one import
#[derive(Clone)]
pub struct ImportOptions {
    /// Catalog node the imported roots attach under; `None` imports them as roots
    pub attach_to: Option<String>,
    pub mode: ImportMode,
    /// Node count above which a "large import" warning is added
    pub large_import_threshold: usize,
    pub signature: SignatureFn,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            attach_to: None,
            mode: ImportMode::Append,
            large_import_threshold: 500,
            signature: default_signature,
        }
    }
}

impl std::fmt::Debug for ImportOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportOptions")
            .field("attach_to", &self.attach_to)
            .field("mode", &self.mode)
            .field("large_import_threshold", &self.large_import_threshold)
            .finish_non_exhaustive()
    }
}

impl ImportOptions {
    pub fn under(parent_id: impl Into<String>) -> Self {
        Self {
            attach_to: Some(parent_id.into()),
            ..Default::default()
        }
    }

    pub fn with_mode(mut self, mode: ImportMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_signature(mut self, signature: SignatureFn) -> Self {
        self.signature = signature;
        self
    }

    pub fn with_large_import_threshold(mut self, threshold: usize) -> Self {
        self.large_import_threshold = threshold;
        self
    }
}

/// Outcome of an import, successful or not
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub success: bool,
    pub imported_count: usize,
    /// Accepted records, ready to append
    pub records: Vec<Node>,
    /// Existing ids removed by `ImportMode::ReplaceChildren`
    pub replaced_ids: Vec<String>,
    /// Fatal defects; non-empty only when `success` is false
    pub errors: Vec<String>,
    /// Advisory notes (duplicates skipped, large import)
    pub warnings: Vec<String>,
    pub stage: ImportStage,
}

impl ImportResult {
    fn rejected(errors: Vec<String>, warnings: Vec<String>) -> Self {
        tracing::warn!("Import rejected with {} error(s)", errors.len());
        Self {
            success: false,
            imported_count: 0,
            records: Vec::new(),
            replaced_ids: Vec::new(),
            errors,
            warnings,
            stage: ImportStage::Rejected,
        }
    }

    /// Called by the editor once the batch is in the store
    pub fn mark_committed(&mut self) {
        self.stage = ImportStage::Committed;
    }

    /// Turn a prepared result into a rejection (e.g. the commit itself failed)
    pub fn reject(&mut self, error: impl Into<String>) {
        *self = Self::rejected(vec![error.into()], std::mem::take(&mut self.warnings));
    }
}

/// A validated source node in nested form
#[derive(Debug, Clone)]
struct SourceNode {
    id: String,
    name: String,
    type_ref: Option<String>,
    attributes: Vec<Value>,
    description: Option<String>,
    children: Vec<SourceNode>,
}

impl SourceNode {
    fn count(&self) -> usize {
        1 + self.children.iter().map(SourceNode::count).sum::<usize>()
    }
}

/// Runs the stages for one set of options
#[derive(Debug, Clone, Default)]
pub struct ImportPipeline {
    options: ImportOptions,
}

impl ImportPipeline {
    pub fn new(options: ImportOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Run every stage against the current catalog.
    ///
    /// On success the result's stage is `DuplicateCheck` (ready to commit); the
    /// editor moves it to `Committed`.
    pub fn run(&self, input: &str, existing: &HierarchyIndex) -> ImportResult {
        let mut warnings = Vec::new();

        // Attachment point must exist before anything else matters
        if let Some(attach_id) = &self.options.attach_to {
            if !existing.contains(attach_id) {
                return ImportResult::rejected(
                    vec![format!("Attachment point '{}' does not exist", attach_id)],
                    warnings,
                );
            }
        }

        trace_stage(ImportStage::Parsing);
        let document: Value = match serde_json::from_str(input) {
            Ok(value) => value,
            Err(e) => {
                return ImportResult::rejected(vec![format!("Invalid JSON: {}", e)], warnings)
            }
        };

        let (items, single): (Vec<&Value>, bool) = match &document {
            Value::Array(items) => (items.iter().collect(), false),
            Value::Object(_) => (vec![&document], true),
            _ => {
                return ImportResult::rejected(
                    vec!["Import must be a JSON object or an array of objects".to_string()],
                    warnings,
                )
            }
        };
        if items.is_empty() {
            return ImportResult::rejected(
                vec!["Nothing to import: empty array".to_string()],
                warnings,
            );
        }
        let flat = !single && is_flat_form(&items);

        trace_stage(ImportStage::Validating);
        let mut errors = Vec::new();
        let mut seen_ids = HashSet::new();
        for (position, item) in items.iter().enumerate() {
            let path = if single {
                "$".to_string()
            } else {
                format!("$[{}]", position)
            };
            validate_value(item, &path, flat, &mut seen_ids, &mut errors);
        }
        if !errors.is_empty() {
            return ImportResult::rejected(errors, warnings);
        }

        let roots = if flat {
            match nest_flat(&items) {
                Ok(roots) => roots,
                Err(errors) => return ImportResult::rejected(errors, warnings),
            }
        } else {
            items.iter().map(|item| to_source(item)).collect()
        };

        let source_count: usize = roots.iter().map(SourceNode::count).sum();
        if source_count > self.options.large_import_threshold {
            warnings.push(format!(
                "Large import: {} nodes (threshold {})",
                source_count, self.options.large_import_threshold
            ));
        }

        trace_stage(ImportStage::Transforming);
        let attach_to = self.options.attach_to.as_deref();
        let transformed = flatten_with_fresh_ids(&roots, attach_to);

        if let Err(errors) = check_orphans(&transformed, attach_to) {
            return ImportResult::rejected(errors, warnings);
        }

        let replaced_ids: Vec<String> = match (self.options.mode, attach_to) {
            (ImportMode::Append, _) => Vec::new(),
            (ImportMode::ReplaceChildren, Some(attach_id)) => existing
                .subtree(attach_id)
                .into_iter()
                .skip(1)
                .map(|n| n.id.clone())
                .collect(),
            (ImportMode::ReplaceChildren, None) => {
                existing.nodes().iter().map(|n| n.id.clone()).collect()
            }
        };

        trace_stage(ImportStage::DuplicateCheck);
        let replaced: HashSet<&str> = replaced_ids.iter().map(String::as_str).collect();
        let remaining = existing
            .nodes()
            .iter()
            .filter(|n| !replaced.contains(n.id.as_str()));
        let records = self.drop_duplicates(transformed, remaining, &mut warnings);

        if records.is_empty() {
            return ImportResult::rejected(
                vec![format!(
                    "Nothing to import: all {} records already exist",
                    source_count
                )],
                warnings,
            );
        }

        tracing::info!(
            "Import prepared: {} of {} records accepted, {} replaced",
            records.len(),
            source_count,
            replaced_ids.len()
        );

        ImportResult {
            success: true,
            imported_count: records.len(),
            records,
            replaced_ids,
            errors: Vec::new(),
            warnings,
            stage: ImportStage::DuplicateCheck,
        }
    }

    /// Skip records matching an existing or earlier record. Records arrive in
    /// pre-order, so a parent (and any type defined earlier in the batch) is
    /// settled before the signature is taken.
    fn drop_duplicates<'a>(
        &self,
        transformed: Vec<Node>,
        existing: impl Iterator<Item = &'a Node>,
        warnings: &mut Vec<String>,
    ) -> Vec<Node> {
        let signature = self.options.signature;
        let catalog: HashMap<String, String> = existing
            .map(|node| (signature(node), node.id.clone()))
            .collect();

        // new id of a skipped record → id of the node it duplicates
        let mut merged_into: HashMap<String, String> = HashMap::new();
        let mut batch: HashMap<String, String> = HashMap::new();
        let mut accepted = Vec::with_capacity(transformed.len());

        for mut record in transformed {
            if let Some(target) = merged_into.get(&record.parent_id) {
                record.parent_id = target.clone();
            }
            if let Some(target) = merged_into.get(&record.type_ref) {
                record.type_ref = target.clone();
            }

            let key = signature(&record);
            if let Some(existing_id) = catalog.get(&key) {
                warnings.push(format!(
                    "Skipped duplicate '{}': already exists in the catalog",
                    record.name
                ));
                merged_into.insert(record.id, existing_id.clone());
                continue;
            }
            if let Some(earlier_id) = batch.get(&key) {
                warnings.push(format!(
                    "Skipped duplicate '{}': repeated within the import",
                    record.name
                ));
                merged_into.insert(record.id, earlier_id.clone());
                continue;
            }

            batch.insert(key, record.id.clone());
            accepted.push(record);
        }

        if !merged_into.is_empty() {
            tracing::info!("Import skipped {} duplicate records", merged_into.len());
            // type refs pointing forward in the batch
            for record in &mut accepted {
                if let Some(target) = merged_into.get(&record.type_ref) {
                    record.type_ref = target.clone();
                }
            }
        }

        accepted
    }
}

fn trace_stage(stage: ImportStage) {
    tracing::debug!("Import stage: {:?}", stage);
}

fn field<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| object.get(*key))
}

/// Non-empty string or number
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// An array is flat when nothing nests and something declares a parent
fn is_flat_form(items: &[&Value]) -> bool {
    let mut declares_parent = false;
    for item in items {
        let Some(object) = item.as_object() else {
            return false;
        };
        if field(object, &CHILDREN_KEYS).is_some_and(|c| !c.is_null()) {
            return false;
        }
        declares_parent |= field(object, &PARENT_KEYS).is_some_and(|p| !p.is_null());
    }
    declares_parent
}

fn validate_value(
    value: &Value,
    path: &str,
    flat: bool,
    seen_ids: &mut HashSet<String>,
    errors: &mut Vec<String>,
) {
    let Some(object) = value.as_object() else {
        errors.push(format!("{}: expected an object", path));
        return;
    };

    match field(object, &ID_KEYS) {
        None => errors.push(format!("{}: missing required field 'Id'", path)),
        Some(raw) => match id_string(raw) {
            None => errors.push(format!("{}: 'Id' must be a non-empty string", path)),
            Some(id) => {
                if !seen_ids.insert(id.clone()) {
                    errors.push(format!("{}: duplicate Id '{}' within the import", path, id));
                }
            }
        },
    }

    match field(object, &NAME_KEYS) {
        None => errors.push(format!("{}: missing required field 'Name'", path)),
        Some(Value::String(name)) if !name.trim().is_empty() => {}
        Some(_) => errors.push(format!("{}: 'Name' must be a non-empty string", path)),
    }

    if let Some(raw) = field(object, &TYPE_KEYS) {
        if !raw.is_null() && id_string(raw).is_none() {
            errors.push(format!("{}: 'PayanarssTypeId' must be a non-empty string", path));
        }
    }

    if let Some(raw) = field(object, &ATTRIBUTE_KEYS) {
        if !raw.is_null() && !raw.is_array() {
            errors.push(format!("{}: 'Attributes' must be an array", path));
        }
    }

    if let Some(raw) = field(object, &DESCRIPTION_KEYS) {
        if !raw.is_null() && !raw.is_string() {
            errors.push(format!("{}: 'Description' must be a string", path));
        }
    }

    if flat {
        if let Some(raw) = field(object, &PARENT_KEYS) {
            if !raw.is_null() && id_string(raw).is_none() {
                errors.push(format!("{}: 'ParentId' must be a non-empty string", path));
            }
        }
    }

    match field(object, &CHILDREN_KEYS) {
        None | Some(Value::Null) => {}
        Some(Value::Array(children)) => {
            for (position, child) in children.iter().enumerate() {
                let child_path = format!("{}.Children[{}]", path, position);
                validate_value(child, &child_path, flat, seen_ids, errors);
            }
        }
        Some(_) => errors.push(format!("{}: 'Children' must be an array", path)),
    }
}

/// Convert an already validated value
fn to_source(value: &Value) -> SourceNode {
    let mut source = to_source_shallow(value);
    if let Some(Value::Array(children)) = value
        .as_object()
        .and_then(|object| field(object, &CHILDREN_KEYS))
    {
        source.children = children.iter().map(to_source).collect();
    }
    source
}

fn to_source_shallow(value: &Value) -> SourceNode {
    let empty = Map::new();
    let object = value.as_object().unwrap_or(&empty);
    SourceNode {
        id: field(object, &ID_KEYS).and_then(id_string).unwrap_or_default(),
        name: field(object, &NAME_KEYS)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        type_ref: field(object, &TYPE_KEYS).and_then(id_string),
        attributes: field(object, &ATTRIBUTE_KEYS)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        description: field(object, &DESCRIPTION_KEYS)
            .and_then(Value::as_str)
            .map(str::to_string),
        children: Vec::new(),
    }
}

/// Nest flat records by `ParentId`. A record whose parent is itself, missing,
/// or outside the batch becomes a batch root. Records that never hang off a
/// batch root sit on a cycle.
fn nest_flat(items: &[&Value]) -> Result<Vec<SourceNode>, Vec<String>> {
    let mut shallow: Vec<SourceNode> = items.iter().map(|item| to_source_shallow(item)).collect();
    let parents: Vec<Option<String>> = items
        .iter()
        .map(|item| {
            item.as_object()
                .and_then(|object| field(object, &PARENT_KEYS))
                .and_then(id_string)
        })
        .collect();

    let ids: HashSet<&str> = shallow.iter().map(|n| n.id.as_str()).collect();
    let mut root_positions = Vec::new();
    let mut children_of: HashMap<String, Vec<usize>> = HashMap::new();
    for (position, node) in shallow.iter().enumerate() {
        match &parents[position] {
            Some(parent) if parent != &node.id && ids.contains(parent.as_str()) => {
                children_of.entry(parent.clone()).or_default().push(position);
            }
            _ => root_positions.push(position),
        }
    }

    // Pre-order over positions to find what is reachable
    let mut order = Vec::with_capacity(shallow.len());
    let mut reached = vec![false; shallow.len()];
    let mut stack: Vec<usize> = root_positions.iter().rev().copied().collect();
    while let Some(position) = stack.pop() {
        if reached[position] {
            continue;
        }
        reached[position] = true;
        order.push(position);
        if let Some(kids) = children_of.get(&shallow[position].id) {
            stack.extend(kids.iter().rev().copied());
        }
    }

    let errors: Vec<String> = reached
        .iter()
        .enumerate()
        .filter(|(_, reached)| !**reached)
        .map(|(position, _)| {
            format!(
                "$[{}]: ParentId chain of '{}' forms a cycle",
                position, shallow[position].id
            )
        })
        .collect();
    if !errors.is_empty() {
        return Err(errors);
    }

    // Assemble bottom-up: reverse pre-order guarantees children are complete
    // before their parent takes them
    let mut assembled: Vec<Option<SourceNode>> = shallow.drain(..).map(Some).collect();
    for &position in order.iter().rev() {
        let Some(mut node) = assembled[position].take() else {
            continue;
        };
        if let Some(kids) = children_of.get(&node.id) {
            node.children = kids
                .iter()
                .filter_map(|&kid| assembled[kid].take())
                .collect();
        }
        assembled[position] = Some(node);
    }

    Ok(root_positions
        .into_iter()
        .filter_map(|position| assembled[position].take())
        .collect())
}

/// Assign fresh ids and flatten in pre-order
fn flatten_with_fresh_ids(roots: &[SourceNode], attach_to: Option<&str>) -> Vec<Node> {
    // Pass 1: old id → new id
    let mut id_map: HashMap<&str, String> = HashMap::new();
    let mut stack: Vec<&SourceNode> = roots.iter().rev().collect();
    while let Some(source) = stack.pop() {
        id_map.insert(source.id.as_str(), generate_node_id());
        stack.extend(source.children.iter().rev());
    }

    // Pass 2: records with re-linked parents
    let mut records = Vec::with_capacity(id_map.len());
    let mut stack: Vec<(&SourceNode, Option<&str>)> =
        roots.iter().rev().map(|root| (root, None)).collect();
    while let Some((source, parent_old_id)) = stack.pop() {
        let Some(new_id) = id_map.get(source.id.as_str()).cloned() else {
            continue;
        };

        let parent_id = match parent_old_id {
            None => attach_to.map(str::to_string).unwrap_or_else(|| new_id.clone()),
            Some(old) => id_map
                .get(old)
                .cloned()
                .unwrap_or_else(|| old.to_string()),
        };
        let type_ref = match &source.type_ref {
            Some(type_ref) => id_map
                .get(type_ref.as_str())
                .cloned()
                .unwrap_or_else(|| type_ref.clone()),
            None => new_id.clone(),
        };

        records.push(Node {
            id: new_id,
            parent_id,
            name: source.name.clone(),
            type_ref,
            attributes: source.attributes.clone(),
            description: source.description.clone(),
        });

        stack.extend(
            source
                .children
                .iter()
                .rev()
                .map(|child| (child, Some(source.id.as_str()))),
        );
    }

    records
}

/// Last line of defense before commit
fn check_orphans(records: &[Node], attach_to: Option<&str>) -> Result<(), Vec<String>> {
    let batch_ids: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
    let errors: Vec<String> = records
        .iter()
        .filter(|record| {
            let parent = record.parent_id.as_str();
            let attached = attach_to == Some(parent) || (attach_to.is_none() && record.is_root());
            !attached && (record.is_root() || !batch_ids.contains(parent))
        })
        .map(|record| {
            format!(
                "Record '{}' ({}) references missing parent '{}'",
                record.name, record.id, record.parent_id
            )
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        tracing::error!("Import produced {} orphan records", errors.len());
        Err(errors)
    }
}

// Comprehensive tests in separate module
#[cfg(test)]
#[path = "import_pipeline_test.rs"]
mod import_pipeline_test;
