//! One chain run, assembled from per-run parts.
//!
//! The LLM and HTTP clients are shared; the registry, stored-value cache, tool
//! box and conversation are created fresh for every run.

use std::sync::Arc;

use crate::agent::LlmSolver;
use crate::chain::{ChainDriver, ChainSummary, TaskId, TaskRegistry};
use crate::clock::{SharedClock, SystemClock};
use crate::config::{Config, Credentials};
use crate::llm::LlmClient;
use crate::submit::{StoredValueCache, SubmissionClient};
use crate::tools::ToolBox;

/// Builds and runs chains.
pub struct ChainRunner {
    config: Config,
    llm: Arc<dyn LlmClient>,
    http: reqwest::Client,
    clock: SharedClock,
}

impl ChainRunner {
    pub fn new(config: Config, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            config,
            llm,
            http: reqwest::Client::new(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run a chain from `seed`, submitting as `credentials`.
    pub async fn run(&self, seed: TaskId, credentials: Credentials) -> ChainSummary {
        let run_id = uuid::Uuid::new_v4();
        tracing::info!("Run {} starting at {}", run_id, seed);

        let store = StoredValueCache::new();
        let tools = ToolBox::new(&self.config.agent, self.http.clone(), store.clone());
        let mut solver = LlmSolver::new(
            Arc::clone(&self.llm),
            self.config.default_model.clone(),
            &self.config.agent,
            tools,
        );
        let submitter = SubmissionClient::new(
            self.http.clone(),
            credentials,
            store,
            self.config.chain.submit_timeout,
        );
        let mut registry = TaskRegistry::new(Arc::clone(&self.clock));
        let driver = ChainDriver::new(&self.config.chain, Arc::clone(&self.clock));

        let summary = driver
            .run(seed, &mut registry, &mut solver, &submitter)
            .await;
        tracing::info!(
            "Run {} finished: {} after {:?}",
            run_id,
            summary.status.label(),
            summary.elapsed
        );
        summary
    }
}
