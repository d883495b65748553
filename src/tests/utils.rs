use crate::comps::{Clock, ComparablesService};
use crate::config::Config;
use crate::db::connection::{init_db, Database};
use crate::db::SqlitePersistence;
use crate::domain::lead::NewLead;
use crate::gateway::{ComparableSource, CompsQuery, FetchedComparables, GatewayError, RawComparable};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Fresh database in a temp dir using the production schema.
/// Keep the `TempDir` alive for the duration of the test.
pub fn init_test_db() -> (TempDir, Database, SqlitePersistence) {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("comps_test.sqlite3");
    let db = Database::new(path.to_string_lossy().into_owned());
    init_db(&db).unwrap_or_else(|e| panic!("Database initialization failed: {e}"));
    let store = SqlitePersistence::new(db.clone());
    (dir, db, store)
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// Manually advanced clock shared between the test and the service.
#[derive(Clone)]
pub struct TestClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl TestClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// In-process comparable source that counts calls and can be told to fail.
#[derive(Default)]
pub struct FakeSource {
    calls: AtomicUsize,
    failing: AtomicBool,
    delay: Option<Duration>,
    response: Mutex<FetchedComparables>,
    last_query: Mutex<Option<CompsQuery>>,
}

impl FakeSource {
    pub fn returning(comparables: Vec<RawComparable>) -> Self {
        let source = Self::default();
        source.set_response(comparables);
        source
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_response(&self, comparables: Vec<RawComparable>) {
        let credits_used = comparables.len() as u32;
        *self.response.lock().unwrap() = FetchedComparables {
            comparables,
            malformed: 0,
            credits_used,
        };
    }

    pub fn set_malformed(&self, malformed: usize) {
        self.response.lock().unwrap().malformed = malformed;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> Option<CompsQuery> {
        self.last_query.lock().unwrap().clone()
    }
}

impl ComparableSource for FakeSource {
    fn fetch(&self, query: &CompsQuery) -> Result<FetchedComparables, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock().unwrap() = Some(query.clone());
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(GatewayError::Network("connection refused".to_string()));
        }
        Ok(self.response.lock().unwrap().clone())
    }
}

pub fn make_service(
    source: FakeSource,
    store: SqlitePersistence,
    clock: &TestClock,
) -> ComparablesService<FakeSource, SqlitePersistence> {
    ComparablesService::new(source, store, &Config::default()).with_clock(clock.clone())
}

pub fn add_lead(store: &SqlitePersistence) -> i64 {
    store
        .insert_lead(
            &NewLead {
                postcode: "M1 1AE".to_string(),
                bedrooms: Some(2),
                property_type: Some("flat".to_string()),
                asking_price: 200_000,
            },
            start_time().timestamp(),
        )
        .unwrap()
}

pub fn raw_comp(address: &str, price: i64, date: &str) -> RawComparable {
    RawComparable {
        address: Some(address.to_string()),
        postcode: Some("M1 2AB".to_string()),
        price: Some(price),
        date: Some(date.to_string()),
        bedrooms: Some(2),
        property_type: Some("Flat".to_string()),
        sqft: Some(700.0),
        distance: Some(0.2),
        ..Default::default()
    }
}

pub fn three_comps() -> Vec<RawComparable> {
    vec![
        raw_comp("1 Ancoats Street", 180_000, "2024-05-01"),
        raw_comp("2 Ancoats Street", 200_000, "2024-04-01"),
        raw_comp("3 Ancoats Street", 220_000, "2024-03-01"),
    ]
}
