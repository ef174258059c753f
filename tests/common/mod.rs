#![allow(dead_code)]

use std::{
    io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use chrono::{NaiveDate, TimeZone, Utc};
use tempfile::TempDir;
use tripkeep::{Clock, FileSystem, ManualClock, OsFileSystem, TripRecord, TripStore};
use tripkeep_domain::{Accommodation, CostData, Expense, Location, Route, TravelData};

/// Real filesystem that can be told to refuse writes below a directory.
#[derive(Default)]
pub struct FaultyFs {
    inner: OsFileSystem,
    fail_under: Mutex<Option<PathBuf>>,
}

impl FaultyFs {
    pub fn fail_writes_under(&self, dir: impl Into<PathBuf>) {
        *self.fail_under.lock().unwrap_or_else(PoisonError::into_inner) = Some(dir.into());
    }

    pub fn heal(&self) {
        *self.fail_under.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn should_fail(&self, path: &Path) -> bool {
        self.fail_under
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|dir| path.starts_with(dir))
    }
}

impl FileSystem for FaultyFs {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.inner.read(path)
    }

    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        if self.should_fail(path) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected write failure"));
        }
        self.inner.write(path, data)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.inner.rename(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.inner.remove_file(path)
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        self.inner.list_dir(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.inner.create_dir_all(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn file_size(&self, path: &Path) -> io::Result<u64> {
        self.inner.file_size(path)
    }
}

/// Isolated store on a temp dir with a manual clock.
pub struct Harness {
    pub dir: TempDir,
    pub store: TripStore,
    pub clock: Arc<ManualClock>,
    pub fs: Arc<FaultyFs>,
}

pub fn harness() -> Harness {
    let dir = TempDir::new().expect("create temp dir");
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 5, 20, 12, 0, 0).unwrap(),
    ));
    let fs = Arc::new(FaultyFs::default());
    let store = TripStore::with_backends(
        dir.path(),
        fs.clone() as Arc<dyn FileSystem>,
        clock.clone() as Arc<dyn Clock>,
    );
    Harness {
        dir,
        store,
        clock,
        fs,
    }
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
}

/// Trip with links on locations, nested routes and accommodations.
pub fn linked_trip(id: &str, now: chrono::DateTime<Utc>) -> TripRecord {
    let mut trip = TripRecord::with_id(id, "Kyoto and Osaka", now);
    trip.description = "Temples, then food".into();
    let mut costs = CostData::new("JPY", 350_000.0);
    costs.expenses = vec![
        Expense::new("exp-1", day(1), 12_000.0, "JPY"),
        Expense::new("exp-2", day(2), 14_170.0, "JPY"),
        Expense::new("exp-3", day(3), 42_000.0, "JPY"),
    ];
    trip.cost_data = Some(costs);
    trip.travel_data = Some(TravelData {
        locations: vec![
            Location::new("loc-1", "Fushimi Inari").linked_to("exp-1"),
            Location::new("loc-2", "Dotonbori"),
        ],
        routes: vec![Route::new("r-1", "Kyoto", "Osaka")
            .linked_to("exp-2")
            .with_sub_route(Route::new("r-1a", "Kyoto", "Shin-Osaka").linked_to("exp-3"))],
        ..TravelData::default()
    });
    trip.accommodations = Some(vec![Accommodation::new("acc-1", "Ryokan")
        .linked_to("exp-1")
        .linked_to("exp-3")]);
    trip
}

/// Trip whose only link-carrying entities are accommodations.
pub fn accommodation_only_trip(id: &str, now: chrono::DateTime<Utc>) -> TripRecord {
    let mut trip = TripRecord::with_id(id, "Cabin weekend", now);
    let mut costs = CostData::new("EUR", 400.0);
    costs.expenses = vec![Expense::new("exp-cabin", day(10), 240.0, "EUR")];
    trip.cost_data = Some(costs);
    trip.accommodations = Some(vec![Accommodation::new("acc-cabin", "Lakeside cabin")
        .linked_to("exp-cabin")]);
    trip
}
