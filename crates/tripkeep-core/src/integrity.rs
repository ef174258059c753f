//! Referential integrity between cost tracking links and expenses.
//!
//! A link is valid only when its `expenseId` names an expense owned by the same
//! trip. The typed validator reports violations as data; the document-level
//! cleanup strips them from raw JSON before it is deserialized.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tripkeep_domain::{LinkedItemKind, TripRecord, REQUIRED_RECORD_KEYS};

/// Set of expense ids owned by one trip.
#[derive(Debug, Clone, Default)]
pub struct ExpenseIndex {
    ids: HashSet<String>,
}

impl ExpenseIndex {
    pub fn from_record(record: &TripRecord) -> Self {
        Self {
            ids: record
                .expenses()
                .iter()
                .map(|expense| expense.id.clone())
                .collect(),
        }
    }

    /// Builds the index from a raw document. Expense ids may be strings or numbers.
    pub fn from_document(document: &Value) -> Self {
        let ids = document
            .pointer("/costData/expenses")
            .and_then(Value::as_array)
            .map(|expenses| {
                expenses
                    .iter()
                    .filter_map(|expense| expense.get("id").and_then(scalar_to_string))
                    .collect()
            })
            .unwrap_or_default();
        Self { ids }
    }

    pub fn contains(&self, expense_id: &str) -> bool {
        self.ids.contains(expense_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationErrorKind {
    ExpenseNotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    #[serde(rename = "type")]
    pub kind: ValidationErrorKind,
    pub message: String,
    pub expense_id: String,
    pub item_id: String,
    pub item_kind: LinkedItemKind,
    pub trip_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

/// Checks every cost tracking link in the trip against the trip's own expenses.
///
/// Runs in one pass to index expenses and one pass over linked items. A trip
/// without `costData` has no valid link targets; a trip without travel data
/// or accommodations has nothing to check.
pub fn validate_all_trip_boundaries(record: &TripRecord) -> ValidationReport {
    let index = ExpenseIndex::from_record(record);
    let mut errors = Vec::new();

    for item in record.linked_items() {
        for link in item.links {
            if index.contains(&link.expense_id) {
                continue;
            }
            errors.push(ValidationError {
                kind: ValidationErrorKind::ExpenseNotFound,
                message: format!(
                    "{} {} links expense {} which does not belong to trip {}",
                    item.kind, item.id, link.expense_id, record.id
                ),
                expense_id: link.expense_id.clone(),
                item_id: item.id.to_string(),
                item_kind: item.kind,
                trip_id: record.id.clone(),
            });
        }
    }

    ValidationReport {
        is_valid: errors.is_empty(),
        errors,
    }
}

/// One dangling link removed from a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRemoval {
    pub trip_id: String,
    pub expense_id: String,
    pub item_id: String,
    pub item_kind: LinkedItemKind,
}

/// Removes every cost tracking link whose expense is not owned by the document.
pub fn strip_dangling_links(document: &mut Value) -> Vec<LinkRemoval> {
    let trip_id = document
        .get("id")
        .and_then(scalar_to_string)
        .unwrap_or_default();
    let index = ExpenseIndex::from_document(document);
    let mut removals = Vec::new();

    visit_document_items(document, |kind, item| {
        let item_id = item.get("id").and_then(scalar_to_string).unwrap_or_default();
        let Some(links) = item
            .get_mut("costTrackingLinks")
            .and_then(Value::as_array_mut)
        else {
            return;
        };
        links.retain(|link| {
            let expense_id = link.get("expenseId").and_then(scalar_to_string);
            match expense_id {
                Some(expense_id) if index.contains(&expense_id) => true,
                other => {
                    removals.push(LinkRemoval {
                        trip_id: trip_id.clone(),
                        expense_id: other.unwrap_or_default(),
                        item_id: item_id.clone(),
                        item_kind: kind,
                    });
                    false
                }
            }
        });
    });

    removals
}

/// True when the document is an object carrying every required top-level key.
pub fn has_required_keys(document: &Value) -> bool {
    document
        .as_object()
        .map(|object| REQUIRED_RECORD_KEYS.iter().all(|key| object.contains_key(*key)))
        .unwrap_or(false)
}

/// Walks link-carrying objects of a raw document with an explicit stack.
pub(crate) fn visit_document_items<F>(document: &mut Value, mut visit: F)
where
    F: FnMut(LinkedItemKind, &mut Map<String, Value>),
{
    let Some(root) = document.as_object_mut() else {
        return;
    };

    if let Some(travel) = root.get_mut("travelData").and_then(Value::as_object_mut) {
        if let Some(locations) = travel.get_mut("locations").and_then(Value::as_array_mut) {
            for location in locations.iter_mut().filter_map(Value::as_object_mut) {
                visit(LinkedItemKind::Location, location);
            }
        }

        if let Some(routes) = travel.get_mut("routes").and_then(Value::as_array_mut) {
            let mut stack: Vec<&mut Value> = routes.iter_mut().rev().collect();
            while let Some(route) = stack.pop() {
                let Some(route) = route.as_object_mut() else {
                    continue;
                };
                visit(LinkedItemKind::Route, route);
                if let Some(children) = route.get_mut("subRoutes").and_then(Value::as_array_mut) {
                    stack.extend(children.iter_mut().rev());
                }
            }
        }
    }

    if let Some(accommodations) = root
        .get_mut("accommodations")
        .and_then(Value::as_array_mut)
    {
        for accommodation in accommodations.iter_mut().filter_map(Value::as_object_mut) {
            visit(LinkedItemKind::Accommodation, accommodation);
        }
    }
}

/// String form of a string or number value, as ids appear in older documents.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
