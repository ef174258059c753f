//! Trip records and the travel and cost entities they own.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::lenient;

/// Schema version written for new and freshly migrated records.
pub const CURRENT_SCHEMA_VERSION: u32 = 5;

/// Keys every persisted record must carry at the top level.
pub const REQUIRED_RECORD_KEYS: [&str; 2] = ["id", "schemaVersion"];

/// Fields this crate does not model. Kept verbatim across load and save.
pub type ExtraFields = Map<String, Value>;

/// Top-level document for one trip, persisted as a single JSON file keyed by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripRecord {
    pub schema_version: u32,
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(
        default,
        deserialize_with = "lenient::optional_calendar_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_date: Option<NaiveDate>,
    #[serde(
        default,
        deserialize_with = "lenient::optional_calendar_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "lenient::timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub travel_data: Option<TravelData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accommodations: Option<Vec<Accommodation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_data: Option<CostData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_updates: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl TripRecord {
    /// Creates an empty trip with a generated identifier.
    pub fn new(title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), title, now)
    }

    pub fn with_id(id: impl Into<String>, title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            id: id.into(),
            title: title.into(),
            description: String::new(),
            start_date: None,
            end_date: None,
            created_at: now,
            updated_at: now,
            travel_data: None,
            accommodations: None,
            cost_data: None,
            public_updates: None,
            extra: ExtraFields::new(),
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    pub fn expenses(&self) -> &[Expense] {
        self.cost_data
            .as_ref()
            .map(|cost| cost.expenses.as_slice())
            .unwrap_or_default()
    }

    pub fn locations(&self) -> &[Location] {
        self.travel_data
            .as_ref()
            .map(|travel| travel.locations.as_slice())
            .unwrap_or_default()
    }

    pub fn routes(&self) -> &[Route] {
        self.travel_data
            .as_ref()
            .map(|travel| travel.routes.as_slice())
            .unwrap_or_default()
    }

    pub fn accommodation_list(&self) -> &[Accommodation] {
        self.accommodations.as_deref().unwrap_or_default()
    }

    /// Mutable access to the travel data, creating an empty block when absent.
    pub fn travel_data_mut(&mut self) -> &mut TravelData {
        self.travel_data.get_or_insert_with(TravelData::default)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelData {
    #[serde(default)]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(default)]
    pub days: Vec<Value>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Pointer from a travel entity to an expense of the same trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostTrackingLink {
    pub expense_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl CostTrackingLink {
    pub fn new(expense_id: impl Into<String>) -> Self {
        Self {
            expense_id: expense_id.into(),
            link_type: None,
            description: None,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cost_tracking_links: Vec<CostTrackingLink>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Location {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            cost_tracking_links: Vec::new(),
            extra: ExtraFields::new(),
        }
    }

    pub fn linked_to(mut self, expense_id: impl Into<String>) -> Self {
        self.cost_tracking_links
            .push(CostTrackingLink::new(expense_id));
        self
    }
}

/// Leg of a journey. Routes may nest arbitrarily deep through `sub_routes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub cost_tracking_links: Vec<CostTrackingLink>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_routes: Vec<Route>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Route {
    pub fn new(id: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            from: from.into(),
            to: to.into(),
            cost_tracking_links: Vec::new(),
            sub_routes: Vec::new(),
            extra: ExtraFields::new(),
        }
    }

    pub fn linked_to(mut self, expense_id: impl Into<String>) -> Self {
        self.cost_tracking_links
            .push(CostTrackingLink::new(expense_id));
        self
    }

    pub fn with_sub_route(mut self, route: Route) -> Self {
        self.sub_routes.push(route);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accommodation {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    #[serde(default)]
    pub cost_tracking_links: Vec<CostTrackingLink>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Accommodation {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            location_id: None,
            cost_tracking_links: Vec::new(),
            extra: ExtraFields::new(),
        }
    }

    pub fn linked_to(mut self, expense_id: impl Into<String>) -> Self {
        self.cost_tracking_links
            .push(CostTrackingLink::new(expense_id));
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostData {
    #[serde(default, deserialize_with = "lenient::amount")]
    pub overall_budget: f64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub country_budgets: Vec<CountryBudget>,
    #[serde(default)]
    pub expenses: Vec<Expense>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_data: Option<Value>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl CostData {
    pub fn new(currency: impl Into<String>, overall_budget: f64) -> Self {
        Self {
            overall_budget,
            currency: currency.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryBudget {
    #[serde(default)]
    pub id: String,
    pub country: String,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub amount: f64,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: String,
    #[serde(deserialize_with = "lenient::calendar_date")]
    pub date: NaiveDate,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub amount: f64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "Expense::default_expense_type")]
    pub expense_type: String,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Expense {
    pub fn new(
        id: impl Into<String>,
        date: NaiveDate,
        amount: f64,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            date,
            amount,
            currency: currency.into(),
            category: String::new(),
            country: String::new(),
            description: String::new(),
            expense_type: Self::default_expense_type(),
            extra: ExtraFields::new(),
        }
    }

    pub fn default_expense_type() -> String {
        "actual".into()
    }
}
