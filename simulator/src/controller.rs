//! Simulation controller.

use std::sync::Arc;

use anyhow::{anyhow, bail, ensure};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use streamledger_common::{AccountId, Amount, ManualClock, StreamError};
use streamledger_ledger::{InMemoryVault, LedgerConfig, LedgerSnapshot, StreamLedger, Vault};

use crate::metrics::SimulationMetrics;
use crate::participant::{Participant, ParticipantFactory};
use crate::scenario::{Scenario, ScenarioStep};

/// Clock reading every simulation starts from.
const START_TIME: u64 = 1_700_000_000;

/// Longest stream the soak harness opens, in seconds.
const MAX_SOAK_DURATION: u64 = 600;

/// Controls the simulation.
pub struct SimulationController {
    /// Ledger under test.
    ledger: Arc<StreamLedger>,
    /// Backing vault, kept concrete for funding and audits.
    vault: Arc<InMemoryVault>,
    /// Simulated time.
    clock: Arc<ManualClock>,
    /// Simulated participants.
    participants: Vec<Participant>,
    /// Simulation metrics.
    metrics: Arc<RwLock<SimulationMetrics>>,
    /// Base seed; random when not given.
    seed: u64,
}

impl SimulationController {
    /// Create a new simulation controller.
    pub fn new(config: LedgerConfig, participant_count: usize, seed: Option<u64>) -> Self {
        let vault = Arc::new(InMemoryVault::new());
        let clock = Arc::new(ManualClock::new(START_TIME));
        let ledger = Arc::new(StreamLedger::new(config, vault.clone(), clock.clone()));
        let seed = seed.unwrap_or_else(|| StdRng::from_entropy().gen());

        Self {
            ledger,
            vault,
            clock,
            participants: ParticipantFactory::create(participant_count),
            metrics: Arc::new(RwLock::new(SimulationMetrics::new())),
            seed,
        }
    }

    /// Fund every participant with `initial_balance`.
    pub fn initialize(&self, initial_balance: Amount) -> anyhow::Result<()> {
        info!(
            participants = self.participants.len(),
            initial_balance,
            "Initializing simulation"
        );

        for participant in &self.participants {
            self.vault.fund(&participant.id, initial_balance)?;
            debug!(participant = %participant.id, name = %participant.name, "Funded participant");
        }

        Ok(())
    }

    /// Run a scenario, failing on the first unmet expectation.
    pub async fn run_scenario(&self, scenario: &Scenario) -> anyhow::Result<()> {
        info!(scenario = %scenario.name, "{}", scenario.description);

        for (index, step) in scenario.steps.iter().enumerate() {
            self.execute_step(step)
                .await
                .map_err(|e| anyhow!("step {} ({:?}) failed: {}", index + 1, step, e))?;
        }

        info!(scenario = %scenario.name, steps = scenario.steps.len(), "Scenario passed");
        Ok(())
    }

    /// Drive random operations from `tasks` concurrent workers, `steps` each,
    /// then audit the ledger.
    pub async fn run_soak(&self, steps: usize, tasks: usize) -> anyhow::Result<()> {
        ensure!(self.participants.len() >= 2, "soak needs at least two participants");
        info!(steps, tasks, seed = self.seed, "Starting soak run");

        let ids: Arc<Vec<AccountId>> =
            Arc::new(self.participants.iter().map(|p| p.id.clone()).collect());

        let mut handles = Vec::with_capacity(tasks);
        for task in 0..tasks {
            let ledger = self.ledger.clone();
            let clock = self.clock.clone();
            let vault = self.vault.clone();
            let ids = ids.clone();
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(task as u64));

            handles.push(tokio::spawn(async move {
                let mut metrics = SimulationMetrics::new();
                for _ in 0..steps {
                    random_operation(&ledger, &vault, &clock, &ids, &mut rng, &mut metrics);
                    tokio::task::yield_now().await;
                }
                metrics
            }));
        }

        for handle in handles {
            let task_metrics = handle.await?;
            self.metrics.write().await.merge(&task_metrics);
        }

        self.check_conservation().await?;
        for participant in &self.participants {
            info!(
                participant = %participant.id,
                balance = participant.balance(&self.vault),
                "Final balance"
            );
        }
        info!(seed = self.seed, "Soak run passed");
        Ok(())
    }

    /// Get simulation metrics.
    pub async fn get_metrics(&self) -> SimulationMetrics {
        self.metrics.read().await.clone()
    }

    /// Ledger snapshot as of the simulated clock.
    pub fn snapshot(&self) -> anyhow::Result<LedgerSnapshot> {
        Ok(self.ledger.snapshot()?)
    }

    /// Prometheus exposition of the ledger counters.
    pub fn ledger_metrics(&self) -> String {
        self.ledger.metrics().to_prometheus()
    }

    /// Seed driving the soak run.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    // --- Private methods ---

    async fn execute_step(&self, step: &ScenarioStep) -> anyhow::Result<()> {
        match step {
            ScenarioStep::Fund { account, amount } => {
                self.vault.fund(&AccountId::from(account.as_str()), *amount)?;
            }
            ScenarioStep::Create {
                sender,
                receiver,
                amount,
                duration,
                expect_error,
            } => {
                let result = self.ledger.create(
                    &AccountId::from(sender.as_str()),
                    &AccountId::from(receiver.as_str()),
                    *amount,
                    *duration,
                );
                self.settle(result, expect_error.as_deref()).await?;
            }
            ScenarioStep::Accept {
                receiver,
                sender,
                expect_error,
            } => {
                let result = self.ledger.accept(
                    &AccountId::from(receiver.as_str()),
                    &AccountId::from(sender.as_str()),
                );
                self.settle(result, expect_error.as_deref()).await?;
            }
            ScenarioStep::Claim {
                receiver,
                sender,
                expect_paid,
                expect_error,
            } => {
                let result = self.ledger.claim(
                    &AccountId::from(receiver.as_str()),
                    &AccountId::from(sender.as_str()),
                );
                let paid = self.settle(result, expect_error.as_deref()).await?;
                if let (Some(paid), Some(expected)) = (paid, expect_paid) {
                    ensure!(paid == *expected, "claimed {} but expected {}", paid, expected);
                }
            }
            ScenarioStep::Cancel {
                caller,
                sender,
                receiver,
                expect_error,
            } => {
                let result = self.ledger.cancel(
                    &AccountId::from(caller.as_str()),
                    &AccountId::from(sender.as_str()),
                    &AccountId::from(receiver.as_str()),
                );
                if let Some(outcome) = self.settle(result, expect_error.as_deref()).await? {
                    debug!(
                        to_receiver = outcome.to_receiver,
                        to_sender = outcome.to_sender,
                        "Cancel settled"
                    );
                }
            }
            ScenarioStep::Advance { seconds } => {
                let now = self.clock.advance(*seconds);
                debug!(now, "Clock advanced");
            }
            ScenarioStep::ExpectBalance { account, amount } => {
                let balance = self.vault.balance(&AccountId::from(account.as_str()));
                ensure!(
                    balance == *amount,
                    "balance of {} is {} but expected {}",
                    account,
                    balance,
                    amount
                );
            }
            ScenarioStep::ExpectConserved => self.check_conservation().await?,
        }

        Ok(())
    }

    /// Match an operation result against the step's expected error code.
    async fn settle<T>(
        &self,
        result: Result<T, StreamError>,
        expect_error: Option<&str>,
    ) -> anyhow::Result<Option<T>> {
        let mut metrics = self.metrics.write().await;
        match (result, expect_error) {
            (Ok(value), None) => {
                metrics.record_success();
                Ok(Some(value))
            }
            (Ok(_), Some(code)) => bail!("succeeded but expected {}", code),
            (Err(err), Some(code)) if err.error_code() == code => {
                metrics.record_rejection(err.error_code());
                Ok(None)
            }
            (Err(err), _) => Err(err.into()),
        }
    }

    async fn check_conservation(&self) -> anyhow::Result<()> {
        ensure!(
            self.ledger.verify_conservation(),
            "journal totals disagree with held value"
        );

        let outside = u128::from(self.vault.total_balances());
        let held = self.ledger.total_held();
        let minted = u128::from(self.vault.minted());
        ensure!(
            outside + held == minted,
            "balances {} + held {} != minted {}",
            outside,
            held,
            minted
        );

        let journal_held: u128 = self
            .ledger
            .journal()
            .totals()
            .values()
            .map(|t| t.locked.saturating_sub(t.paid_out + t.refunded))
            .sum();
        ensure!(
            journal_held == held,
            "journal says {} is held but ledger holds {}",
            journal_held,
            held
        );

        self.metrics.write().await.record_conservation_check();
        Ok(())
    }
}

/// Perform one random ledger operation, recording its outcome.
fn random_operation(
    ledger: &StreamLedger,
    vault: &InMemoryVault,
    clock: &ManualClock,
    ids: &[AccountId],
    rng: &mut StdRng,
    metrics: &mut SimulationMetrics,
) {
    let a = &ids[rng.gen_range(0..ids.len())];
    let b = &ids[rng.gen_range(0..ids.len())];

    let result = match rng.gen_range(0..5) {
        0 => {
            let available = vault.balance(a).max(1);
            let amount = rng.gen_range(0..=available / 4 + 1);
            let duration = rng.gen_range(0..=MAX_SOAK_DURATION);
            ledger.create(a, b, amount, duration)
        }
        1 => ledger.accept(b, a),
        2 => ledger.claim(b, a).map(|_| ()),
        3 => {
            let caller = if rng.gen_bool(0.5) { a } else { b };
            ledger.cancel(caller, a, b).map(|_| ())
        }
        _ => {
            clock.advance(rng.gen_range(1..=MAX_SOAK_DURATION / 10));
            Ok(())
        }
    };

    match result {
        Ok(()) => metrics.record_success(),
        Err(err) => {
            if matches!(err, StreamError::ArithmeticOverflow(_)) {
                warn!(error = %err, "Unexpected overflow during soak");
            }
            metrics.record_rejection(err.error_code());
        }
    }
}
