//! Linear execution graph of agent steps
//!
//! A workflow is built from steps and edges, validated once, and then run any
//! number of times. Each run is a stream of [`WorkflowEvent`]s produced by a
//! spawned task; dropping the stream stops the run after the current step.
//!
//! ```rust
//! use agentpair::testing::mocks::MockAgentStep;
//! use agentpair::workflow::{WorkflowBuilder, WorkflowEvent};
//! use futures::StreamExt;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let workflow = WorkflowBuilder::new()
//!     .add_agent(Arc::new(MockAgentStep::new("draft", "Drafter", |s| format!("{s}!"))))
//!     .add_agent(Arc::new(MockAgentStep::new("shout", "Shouter", |s| s.to_uppercase())))
//!     .set_start("draft")
//!     .add_edge("draft", "shout")
//!     .build()
//!     .unwrap();
//!
//! let events: Vec<WorkflowEvent> = workflow.run_stream("hi").collect().await;
//! assert!(events.contains(&WorkflowEvent::Output {
//!     executor_id: "shout".to_string(),
//!     data: "HI!".to_string(),
//! }));
//! assert_eq!(events.last(), Some(&WorkflowEvent::Completed));
//! # });
//! ```

use crate::a2a::A2aClientError;
use crate::auth::CredentialError;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn, Instrument};

const EVENT_BUFFER: usize = 16;

/// One node of a workflow
#[async_trait]
pub trait AgentStep: Send + Sync {
    /// Executor id, unique within a workflow
    fn id(&self) -> &str;

    /// Name shown to users
    fn display_name(&self) -> &str;

    /// Run with the previous step's output (or the prompt, for the start step)
    async fn run(&self, input: &str) -> Result<String, WorkflowError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    /// Incremental text from a step; consumers may ignore it
    AgentRunUpdate { executor_id: String, text: String },
    /// Final output of a step
    Output { executor_id: String, data: String },
    /// A step failed; no further events follow
    Failed { executor_id: String, error: String },
    /// Every step produced output
    Completed,
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Workflow has no start step")]
    NoStartStep,
    #[error("Unknown step: {0}")]
    UnknownStep(String),
    #[error("Step registered twice: {0}")]
    DuplicateStep(String),
    #[error("Step {0} has more than one outgoing edge")]
    Branching(String),
    #[error("Workflow contains a cycle at step {0}")]
    Cycle(String),
    #[error("Step {0} is not reachable from the start step")]
    Unreachable(String),
    #[error("Step {step} failed: {message}")]
    StepFailed { step: String, message: String },
    #[error(transparent)]
    Client(#[from] A2aClientError),
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),
    #[error("Console I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Default)]
pub struct WorkflowBuilder {
    steps: Vec<Arc<dyn AgentStep>>,
    start: Option<String>,
    edges: Vec<(String, String)>,
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_agent(mut self, step: Arc<dyn AgentStep>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn set_start(mut self, id: impl Into<String>) -> Self {
        self.start = Some(id.into());
        self
    }

    pub fn add_edge(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.edges.push((source.into(), target.into()));
        self
    }

    /// Validate the graph and fix the execution order
    pub fn build(self) -> Result<Workflow, WorkflowError> {
        let mut by_id: HashMap<String, Arc<dyn AgentStep>> = HashMap::new();
        for step in &self.steps {
            if by_id.insert(step.id().to_string(), step.clone()).is_some() {
                return Err(WorkflowError::DuplicateStep(step.id().to_string()));
            }
        }

        let start = self.start.ok_or(WorkflowError::NoStartStep)?;
        if !by_id.contains_key(&start) {
            return Err(WorkflowError::UnknownStep(start));
        }

        let mut next: HashMap<String, String> = HashMap::new();
        for (source, target) in self.edges {
            for id in [&source, &target] {
                if !by_id.contains_key(id) {
                    return Err(WorkflowError::UnknownStep(id.clone()));
                }
            }
            if next.contains_key(&source) {
                return Err(WorkflowError::Branching(source));
            }
            next.insert(source, target);
        }

        let mut order = Vec::with_capacity(by_id.len());
        let mut visited = HashSet::new();
        let mut current = Some(start);
        while let Some(id) = current {
            if !visited.insert(id.clone()) {
                return Err(WorkflowError::Cycle(id));
            }
            current = next.get(&id).cloned();
            if let Some(step) = by_id.get(&id) {
                order.push(step.clone());
            }
        }

        if let Some(orphan) = self.steps.iter().find(|s| !visited.contains(s.id())) {
            return Err(WorkflowError::Unreachable(orphan.id().to_string()));
        }

        Ok(Workflow {
            steps: Arc::new(order),
        })
    }
}

/// A validated chain of steps
#[derive(Clone)]
pub struct Workflow {
    steps: Arc<Vec<Arc<dyn AgentStep>>>,
}

impl Workflow {
    /// Step ids in execution order
    pub fn step_ids(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.id().to_string()).collect()
    }

    /// Display name of the step with executor id `id`
    pub fn display_name(&self, id: &str) -> Option<String> {
        self.steps
            .iter()
            .find(|s| s.id() == id)
            .map(|s| s.display_name().to_string())
    }

    /// Start one run with `input` and stream its events
    pub fn run_stream(&self, input: impl Into<String>) -> BoxStream<'static, WorkflowEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let steps = self.steps.clone();
        let input = input.into();
        let run_id = uuid::Uuid::new_v4().to_string();

        tokio::spawn(
            run_steps(steps, input, tx).instrument(crate::workflow_span!(run_id = %run_id)),
        );

        stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|event| (event, rx)) })
            .boxed()
    }
}

async fn run_steps(
    steps: Arc<Vec<Arc<dyn AgentStep>>>,
    input: String,
    tx: mpsc::Sender<WorkflowEvent>,
) {
    let mut current = input;

    for step in steps.iter() {
        let executor_id = step.id().to_string();
        debug!(step = %executor_id, "Running workflow step");

        match step.run(&current).await {
            Ok(output) => {
                let update = WorkflowEvent::AgentRunUpdate {
                    executor_id: executor_id.clone(),
                    text: output.clone(),
                };
                let final_output = WorkflowEvent::Output {
                    executor_id,
                    data: output.clone(),
                };
                if tx.send(update).await.is_err() || tx.send(final_output).await.is_err() {
                    debug!("Workflow event receiver dropped; stopping run");
                    return;
                }
                current = output;
            }
            Err(e) => {
                warn!(step = %executor_id, "Workflow step failed: {}", e);
                let _ = tx
                    .send(WorkflowEvent::Failed {
                        executor_id,
                        error: e.to_string(),
                    })
                    .await;
                return;
            }
        }
    }

    let _ = tx.send(WorkflowEvent::Completed).await;
}
