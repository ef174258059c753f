//! Sequential schema upgrades for raw trip documents.
//!
//! Each step upgrades a document from version `v` to `v + 1`. Steps are pure
//! functions over the JSON tree; the driver runs them in order starting at the
//! stored version, so a step never sees a document it already touched.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};
use tripkeep_domain::CURRENT_SCHEMA_VERSION;

use crate::{
    integrity::{scalar_to_string, strip_dangling_links, visit_document_items, LinkRemoval},
    CoreError,
};

type StepFn = fn(&mut Value, &mut MigrationContext) -> Result<(), CoreError>;

struct MigrationStep {
    from: u32,
    description: &'static str,
    apply: StepFn,
}

static STEPS: [MigrationStep; 4] = [
    MigrationStep {
        from: 1,
        description: "move top-level locations, routes and days into travelData",
        apply: hoist_travel_data,
    },
    MigrationStep {
        from: 2,
        description: "convert costTrackingId into costTrackingLinks",
        apply: expand_cost_tracking_ids,
    },
    MigrationStep {
        from: 3,
        description: "normalize cost data arrays and expense types",
        apply: normalize_cost_data,
    },
    MigrationStep {
        from: 4,
        description: "isolate cost tracking links to the owning trip",
        apply: isolate_trip_cost_links,
    },
];

/// Dangling links removed during one migration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub trip_id: String,
    pub removals: Vec<LinkRemoval>,
}

/// Result of running a document through [`SchemaMigrator::migrate`].
#[derive(Debug, Clone)]
pub struct MigrationOutcome {
    pub document: Value,
    pub from_version: u32,
    pub to_version: u32,
    pub applied: Vec<String>,
    pub cleanup: Option<CleanupReport>,
}

impl MigrationOutcome {
    pub fn migrated(&self) -> bool {
        !self.applied.is_empty()
    }
}

struct MigrationContext {
    removals: Vec<LinkRemoval>,
}

/// Drives documents from their stored schema version to [`CURRENT_SCHEMA_VERSION`].
pub struct SchemaMigrator;

impl SchemaMigrator {
    /// Reads the stored version. Missing, non-numeric or non-positive values count as v1.
    pub fn stored_version(document: &Value) -> u32 {
        let raw = document.get("schemaVersion");
        let parsed = match raw {
            Some(Value::Number(number)) => number.as_i64(),
            Some(Value::String(text)) => text.trim().parse::<i64>().ok(),
            _ => None,
        };
        match parsed {
            Some(version) if version >= 1 => u32::try_from(version).unwrap_or(u32::MAX),
            _ => 1,
        }
    }

    pub fn needs_migration(document: &Value) -> bool {
        Self::stored_version(document) != CURRENT_SCHEMA_VERSION
    }

    /// Applies every pending step. Current documents are returned untouched.
    pub fn migrate(mut document: Value, now: DateTime<Utc>) -> Result<MigrationOutcome, CoreError> {
        if !document.is_object() {
            return Err(CoreError::InvalidDocument(
                "trip document must be a JSON object".into(),
            ));
        }
        let from_version = Self::stored_version(&document);
        if from_version > CURRENT_SCHEMA_VERSION {
            return Err(CoreError::UnsupportedSchema {
                found: from_version,
                supported: CURRENT_SCHEMA_VERSION,
            });
        }

        let mut context = MigrationContext {
            removals: Vec::new(),
        };
        let mut applied = Vec::new();
        let mut version = from_version;
        while version < CURRENT_SCHEMA_VERSION {
            let step = STEPS
                .iter()
                .find(|step| step.from == version)
                .ok_or_else(|| {
                    CoreError::InvalidDocument(format!(
                        "no migration registered from schema v{version}"
                    ))
                })?;
            (step.apply)(&mut document, &mut context)?;
            version += 1;
            applied.push(format!("v{} -> v{}: {}", step.from, version, step.description));
        }

        let trip_id = document
            .get("id")
            .and_then(scalar_to_string)
            .unwrap_or_default();
        if !applied.is_empty() {
            let root = object_mut(&mut document)?;
            root.insert("schemaVersion".into(), Value::from(CURRENT_SCHEMA_VERSION));
            root.insert(
                "updatedAt".into(),
                Value::String(now.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            );
            info!(
                trip_id = %trip_id,
                from = from_version,
                to = CURRENT_SCHEMA_VERSION,
                steps = applied.len(),
                "migrated trip document"
            );
        }

        let cleanup = if context.removals.is_empty() {
            None
        } else {
            let report = CleanupReport {
                trip_id,
                removals: context.removals,
            };
            warn!(
                trip_id = %report.trip_id,
                removed = report.removals.len(),
                removals = ?report.removals,
                "removed dangling cost tracking links"
            );
            Some(report)
        };

        Ok(MigrationOutcome {
            document,
            from_version,
            to_version: CURRENT_SCHEMA_VERSION,
            applied,
            cleanup,
        })
    }
}

fn object_mut(document: &mut Value) -> Result<&mut Map<String, Value>, CoreError> {
    document
        .as_object_mut()
        .ok_or_else(|| CoreError::InvalidDocument("trip document must be a JSON object".into()))
}

fn hoist_travel_data(document: &mut Value, _: &mut MigrationContext) -> Result<(), CoreError> {
    let root = object_mut(document)?;
    let mut moved = Map::new();
    for key in ["locations", "routes", "days"] {
        if let Some(value) = root.remove(key) {
            moved.insert(key.to_string(), value);
        }
    }
    if moved.is_empty() {
        return Ok(());
    }
    let travel = root
        .entry("travelData")
        .or_insert_with(|| Value::Object(Map::new()));
    if travel.is_null() {
        *travel = Value::Object(Map::new());
    }
    let travel = travel
        .as_object_mut()
        .ok_or_else(|| CoreError::InvalidDocument("travelData must be a JSON object".into()))?;
    for (key, value) in moved {
        travel.entry(key).or_insert(value);
    }
    Ok(())
}

fn expand_cost_tracking_ids(
    document: &mut Value,
    _: &mut MigrationContext,
) -> Result<(), CoreError> {
    visit_document_items(document, |_, item| {
        let Some(legacy) = item.remove("costTrackingId") else {
            return;
        };
        let Some(expense_id) = scalar_to_string(&legacy).filter(|id| !id.is_empty()) else {
            return;
        };
        let links = item
            .entry("costTrackingLinks")
            .or_insert_with(|| Value::Array(Vec::new()));
        if !links.is_array() {
            *links = Value::Array(Vec::new());
        }
        if let Value::Array(links) = links {
            let present = links.iter().any(|link| {
                link.get("expenseId").and_then(scalar_to_string).as_deref()
                    == Some(expense_id.as_str())
            });
            if !present {
                let mut link = Map::new();
                link.insert("expenseId".into(), Value::String(expense_id));
                links.push(Value::Object(link));
            }
        }
    });
    Ok(())
}

fn normalize_cost_data(document: &mut Value, _: &mut MigrationContext) -> Result<(), CoreError> {
    let root = object_mut(document)?;
    let Some(cost) = root.get_mut("costData").and_then(Value::as_object_mut) else {
        return Ok(());
    };
    for key in ["countryBudgets", "expenses"] {
        let entry = cost
            .entry(key)
            .or_insert_with(|| Value::Array(Vec::new()));
        if !entry.is_array() {
            *entry = Value::Array(Vec::new());
        }
    }
    if let Some(expenses) = cost.get_mut("expenses").and_then(Value::as_array_mut) {
        for expense in expenses.iter_mut().filter_map(Value::as_object_mut) {
            expense
                .entry("expenseType")
                .or_insert_with(|| Value::String("actual".into()));
        }
    }
    Ok(())
}

fn isolate_trip_cost_links(
    document: &mut Value,
    context: &mut MigrationContext,
) -> Result<(), CoreError> {
    context.removals.extend(strip_dangling_links(document));
    Ok(())
}
