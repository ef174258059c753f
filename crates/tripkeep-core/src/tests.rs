use std::{
    io::Write,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::json;
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;
use tripkeep_domain::{
    Accommodation, CostData, Expense, LinkedItemKind, Location, Route, TravelData, TripRecord,
    CURRENT_SCHEMA_VERSION,
};

use crate::{validate_all_trip_boundaries, SchemaMigrator, ValidationErrorKind};

fn trip_with_expenses(id: &str, expense_count: usize) -> TripRecord {
    let now = Utc.with_ymd_and_hms(2025, 4, 1, 10, 0, 0).unwrap();
    let mut trip = TripRecord::with_id(id, "Validation", now);
    let mut cost = CostData::new("EUR", 2_000.0);
    let day = NaiveDate::from_ymd_opt(2025, 4, 2).unwrap();
    for idx in 0..expense_count {
        cost.expenses
            .push(Expense::new(format!("exp-{idx}"), day, 10.0 + idx as f64, "EUR"));
    }
    trip.cost_data = Some(cost);
    trip
}

#[test]
fn valid_links_produce_no_errors() {
    let mut trip = trip_with_expenses("trip-ok", 3);
    trip.travel_data = Some(TravelData {
        locations: vec![
            Location::new("loc-1", "Lyon").linked_to("exp-0"),
            Location::new("loc-2", "Nice").linked_to("exp-1"),
        ],
        routes: vec![Route::new("r-1", "Lyon", "Nice").linked_to("exp-2")],
        ..TravelData::default()
    });

    let report = validate_all_trip_boundaries(&trip);
    assert!(report.is_valid);
    assert!(report.errors.is_empty());
}

#[test]
fn single_foreign_link_is_reported_once() {
    let mut trip = trip_with_expenses("trip-a", 2);
    trip.travel_data = Some(TravelData {
        locations: vec![
            Location::new("loc-1", "Lyon").linked_to("exp-0"),
            Location::new("loc-2", "Nice").linked_to("exp-from-trip-b"),
        ],
        ..TravelData::default()
    });

    let report = validate_all_trip_boundaries(&trip);
    assert!(!report.is_valid);
    assert_eq!(report.errors.len(), 1);
    let error = &report.errors[0];
    assert_eq!(error.kind, ValidationErrorKind::ExpenseNotFound);
    assert_eq!(error.expense_id, "exp-from-trip-b");
    assert_eq!(error.item_id, "loc-2");
    assert_eq!(error.item_kind, LinkedItemKind::Location);
    assert_eq!(error.trip_id, "trip-a");

    let wire = serde_json::to_value(error).unwrap();
    assert_eq!(wire["type"], json!("EXPENSE_NOT_FOUND"));
}

#[test]
fn missing_cost_data_invalidates_every_link() {
    let mut trip = trip_with_expenses("trip-no-costs", 0);
    trip.cost_data = None;
    trip.travel_data = Some(TravelData {
        locations: vec![Location::new("loc-1", "Rome").linked_to("exp-0")],
        routes: vec![Route::new("r-1", "Rome", "Naples")
            .with_sub_route(Route::new("r-1a", "Rome", "Caserta").linked_to("exp-1"))],
        ..TravelData::default()
    });
    trip.accommodations = Some(vec![Accommodation::new("acc-1", "B&B").linked_to("exp-2")]);

    let report = validate_all_trip_boundaries(&trip);
    assert!(!report.is_valid);
    let items: Vec<_> = report.errors.iter().map(|e| e.item_id.as_str()).collect();
    assert_eq!(items, ["loc-1", "r-1a", "acc-1"]);
}

#[test]
fn trip_without_travel_data_is_vacuously_valid() {
    let trip = trip_with_expenses("trip-empty", 4);
    assert!(trip.travel_data.is_none());
    let report = validate_all_trip_boundaries(&trip);
    assert!(report.is_valid);
}

#[test]
fn validation_scales_linearly_with_links() {
    let mut trip = trip_with_expenses("trip-large", 100);
    let locations = (0..50)
        .map(|idx| {
            Location::new(format!("loc-{idx}"), format!("Stop {idx}"))
                .linked_to(format!("exp-{}", idx * 2))
                .linked_to(format!("exp-{}", idx * 2 + 1))
        })
        .collect();
    trip.travel_data = Some(TravelData {
        locations,
        ..TravelData::default()
    });

    let started = Instant::now();
    let report = validate_all_trip_boundaries(&trip);
    let elapsed = started.elapsed();

    assert!(report.is_valid);
    assert!(
        elapsed < Duration::from_millis(100),
        "validation took {elapsed:?}"
    );
}

fn legacy_document_with_dangling_links() -> serde_json::Value {
    json!({
        "id": "trip-paris",
        "schemaVersion": 4,
        "title": "Paris",
        "travelData": {
            "locations": [
                { "id": "loc-1", "name": "Louvre", "costTrackingLinks": [
                    { "expenseId": "exp-1" },
                    { "expenseId": "exp-of-trip-london", "linkType": "full" }
                ]},
                { "id": "loc-2", "name": "Orsay", "costTrackingLinks": [{ "expenseId": "exp-2" }] }
            ],
            "routes": [
                { "id": "r-1", "from": "CDG", "to": "Paris",
                  "costTrackingLinks": [{ "expenseId": "exp-3" }],
                  "subRoutes": [
                    { "id": "r-1a", "from": "CDG", "to": "Gare du Nord",
                      "costTrackingLinks": [{ "expenseId": "deleted-expense" }] }
                  ]
                }
            ],
            "days": []
        },
        "accommodations": [
            { "id": "acc-1", "name": "Hotel", "costTrackingLinks": [
                { "expenseId": "exp-4" },
                { "expenseId": "exp-of-trip-rome" },
                { "expenseId": "exp-of-trip-berlin" }
            ]}
        ],
        "costData": {
            "currency": "EUR",
            "overallBudget": 1500,
            "countryBudgets": [],
            "expenses": [
                { "id": "exp-1", "date": "2025-05-01", "amount": 17, "expenseType": "actual" },
                { "id": "exp-2", "date": "2025-05-01", "amount": 16, "expenseType": "actual" },
                { "id": "exp-3", "date": "2025-05-02", "amount": 12, "expenseType": "actual" },
                { "id": "exp-4", "date": "2025-05-02", "amount": 480, "expenseType": "actual" },
                { "id": "exp-5", "date": "2025-05-03", "amount": 35, "expenseType": "planned" }
            ]
        }
    })
}

#[test]
fn migration_strips_exactly_the_dangling_links() {
    let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
    let outcome = SchemaMigrator::migrate(legacy_document_with_dangling_links(), now).unwrap();

    assert_eq!(outcome.from_version, 4);
    assert_eq!(outcome.to_version, CURRENT_SCHEMA_VERSION);

    let report = outcome.cleanup.as_ref().expect("cleanup report");
    assert_eq!(report.trip_id, "trip-paris");
    assert_eq!(report.removals.len(), 4);
    let mut removed: Vec<_> = report
        .removals
        .iter()
        .map(|r| (r.item_id.as_str(), r.expense_id.as_str()))
        .collect();
    removed.sort();
    assert_eq!(
        removed,
        [
            ("acc-1", "exp-of-trip-berlin"),
            ("acc-1", "exp-of-trip-rome"),
            ("loc-1", "exp-of-trip-london"),
            ("r-1a", "deleted-expense"),
        ]
    );

    let trip: TripRecord = serde_json::from_value(outcome.document).unwrap();
    assert_eq!(trip.schema_version, CURRENT_SCHEMA_VERSION);
    assert_eq!(trip.expenses().len(), 5);
    assert_eq!(trip.link_count(), 4);
    assert!(validate_all_trip_boundaries(&trip).is_valid);
}

#[test]
fn migration_without_dangling_links_emits_no_report() {
    let mut document = legacy_document_with_dangling_links();
    document["travelData"]["locations"][0]["costTrackingLinks"] = json!([{ "expenseId": "exp-1" }]);
    document["travelData"]["routes"][0]["subRoutes"][0]["costTrackingLinks"] = json!([]);
    document["accommodations"][0]["costTrackingLinks"] = json!([{ "expenseId": "exp-4" }]);

    let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
    let outcome = SchemaMigrator::migrate(document, now).unwrap();
    assert!(outcome.migrated());
    assert!(outcome.cleanup.is_none());
}

#[derive(Clone, Default)]
struct LogBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

struct LogBufferGuard {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBufferGuard;

    fn make_writer(&'a self) -> Self::Writer {
        LogBufferGuard {
            bytes: self.bytes.clone(),
        }
    }
}

impl Write for LogBufferGuard {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.bytes.lock().expect("log buffer").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn warnings_during(run: impl FnOnce()) -> String {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_max_level(Level::WARN)
        .with_ansi(false)
        .finish();
    tracing::subscriber::with_default(subscriber, run);
    let bytes = buffer.bytes.lock().expect("log buffer").clone();
    String::from_utf8(bytes).expect("utf8 logs")
}

#[test]
fn cleanup_emits_exactly_one_warning_per_run() {
    let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
    let logs = warnings_during(|| {
        let outcome = SchemaMigrator::migrate(legacy_document_with_dangling_links(), now).unwrap();
        assert_eq!(outcome.cleanup.map(|report| report.removals.len()), Some(4));
    });

    assert_eq!(logs.lines().count(), 1, "{logs}");
    assert_eq!(logs.matches("removed dangling cost tracking links").count(), 1);
    assert!(logs.contains("trip-paris"));
    assert!(logs.contains("removed=4"));
}

#[test]
fn clean_migration_emits_no_warning() {
    let mut document = legacy_document_with_dangling_links();
    document["travelData"]["locations"][0]["costTrackingLinks"] = json!([{ "expenseId": "exp-1" }]);
    document["travelData"]["routes"][0]["subRoutes"][0]["costTrackingLinks"] = json!([]);
    document["accommodations"][0]["costTrackingLinks"] = json!([{ "expenseId": "exp-4" }]);

    let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
    let logs = warnings_during(|| {
        SchemaMigrator::migrate(document, now).unwrap();
    });
    assert!(logs.is_empty(), "{logs}");
}
