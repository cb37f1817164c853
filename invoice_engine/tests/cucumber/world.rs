use chrono::Duration;
use cucumber::World;
use invoice_engine::{
    helpers::RetryPolicy,
    test_utils::{
        prepare_env::{create_database, random_db_path, run_migrations},
        CountingLedger,
        FixedPriceSource,
        RecordingNotifier,
        ScriptedGateway,
    },
    EngineOptions,
    PriceOracle,
    Reconciliation,
    ReconciliationApi,
    SqliteDatabase,
};
use log::*;
use rust_decimal::Decimal;

pub type TestLedger = CountingLedger<SqliteDatabase>;
pub type TestApi = ReconciliationApi<TestLedger, ScriptedGateway, RecordingNotifier, FixedPriceSource>;

#[derive(Default, Debug, World)]
pub struct InvoiceWorld {
    pub system: Option<ReconciliationSystem>,
    pub results: Vec<Reconciliation>,
    pub last_error: Option<String>,
}

#[derive(Debug)]
pub struct ReconciliationSystem {
    pub db_path: String,
    pub ledger: TestLedger,
    pub gateway: ScriptedGateway,
    pub notifier: RecordingNotifier,
    pub spot_price: Option<Decimal>,
}

impl InvoiceWorld {
    pub fn system(&self) -> &ReconciliationSystem {
        self.system.as_ref().expect("The ledger has not been initialised")
    }

    pub fn system_mut(&mut self) -> &mut ReconciliationSystem {
        self.system.as_mut().expect("The ledger has not been initialised")
    }

    pub fn last_result(&self) -> &Reconciliation {
        self.results.last().expect("Nothing has been reconciled yet")
    }
}

impl ReconciliationSystem {
    pub async fn new() -> Self {
        let url = random_db_path();
        create_database(&url).await;
        run_migrations(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        debug!("🚀️ Created database: {url}");
        Self {
            db_path: url,
            ledger: CountingLedger::new(db),
            gateway: ScriptedGateway::default(),
            notifier: RecordingNotifier::default(),
            spot_price: None,
        }
    }

    /// A fresh engine over the shared ledger, gateway and notifier. The price feed is whatever the scenario last set.
    pub fn api(&self) -> TestApi {
        let feed = match self.spot_price {
            Some(price) => FixedPriceSource::new(price),
            None => FixedPriceSource::offline("no price configured"),
        };
        let oracle = PriceOracle::new(vec![feed], Duration::seconds(60));
        let options = EngineOptions { gateway_retry: RetryPolicy::immediate(3), ..Default::default() };
        ReconciliationApi::new(self.ledger.clone(), self.gateway.clone(), self.notifier.clone(), oracle, options)
    }
}
