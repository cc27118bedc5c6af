//! Interactive writer → reviewer workflow over A2A
//!
//! Discovers both agents from their cards, chains them into a two-step graph and
//! runs it once per prompt line, printing each step's final output as a wrapped
//! block.

pub mod a2a_step;
pub mod console;
pub mod graph;

pub use a2a_step::A2aAgentStep;
pub use console::{terminal_width, wrap_text};
pub use graph::{AgentStep, Workflow, WorkflowBuilder, WorkflowError, WorkflowEvent};

use crate::a2a::{A2aClient, AgentCard};
use crate::auth::{BearerTokenCache, DefaultCredential, TokenCredential};
use crate::config::WorkflowConfig;
use futures::StreamExt;
use std::future::Future;
use std::io::{self, Write};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

pub const WRITER_STEP_ID: &str = "writer_agent";
pub const REVIEWER_STEP_ID: &str = "reviewer_agent";

const PROMPT: &str = "\nEnter a prompt for the workflow (or type 'exit' to quit): ";

/// Run the interactive workflow against stdin and stdout until exit
pub async fn run(config: WorkflowConfig) -> Result<(), WorkflowError> {
    let credential: Option<Arc<DefaultCredential>> = match &config.auth_scope {
        Some(_) => Some(Arc::new(DefaultCredential::from_env()?)),
        None => None,
    };
    let auth = match (&credential, &config.auth_scope) {
        (Some(credential), Some(scope)) => {
            info!(scope = %scope, "Using bearer token authentication for A2A calls");
            let credential: Arc<dyn TokenCredential> = credential.clone();
            Some(Arc::new(BearerTokenCache::new(credential, scope.clone())))
        }
        _ => None,
    };

    let client = A2aClient::new(config.http_timeout, auth)?;
    let result = discover_and_loop(&config, client).await;

    if let Some(credential) = credential {
        if let Err(e) = credential.close().await {
            warn!("Credential close failed: {}", e);
        }
    }
    result
}

async fn discover_and_loop(config: &WorkflowConfig, client: A2aClient) -> Result<(), WorkflowError> {
    let mut stdout = io::stdout();

    let writer_card = discover(&client, &config.writer_base_url, "writer", &mut stdout).await?;
    let reviewer_card =
        discover(&client, &config.reviewer_base_url, "reviewer", &mut stdout).await?;

    let workflow = build_workflow(writer_card, reviewer_card, client)?;
    debug!(steps = ?workflow.step_ids(), "Workflow built");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let interrupt = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    Ok(prompt_loop(&workflow, stdin, &mut stdout, interrupt).await?)
}

async fn discover<W: Write>(
    client: &A2aClient,
    base_url: &str,
    role: &str,
    out: &mut W,
) -> Result<AgentCard, WorkflowError> {
    let card = client.fetch_agent_card(base_url).await?;
    let _ = writeln!(
        out,
        "Discovered {} agent: {} - {} - {}",
        role, card.name, card.description, card.url
    );
    Ok(card)
}

/// Writer is the start step; its output is the reviewer's input
pub fn build_workflow(
    writer_card: AgentCard,
    reviewer_card: AgentCard,
    client: A2aClient,
) -> Result<Workflow, WorkflowError> {
    WorkflowBuilder::new()
        .add_agent(Arc::new(A2aAgentStep::new(
            WRITER_STEP_ID,
            writer_card,
            client.clone(),
        )))
        .add_agent(Arc::new(A2aAgentStep::new(
            REVIEWER_STEP_ID,
            reviewer_card,
            client,
        )))
        .set_start(WRITER_STEP_ID)
        .add_edge(WRITER_STEP_ID, REVIEWER_STEP_ID)
        .build()
}

/// Read prompts until `exit`, end of input, or `interrupt` resolves
///
/// Each non-empty line starts one run whose events are rendered to `out`.
/// Failed runs are reported and the loop continues.
pub async fn prompt_loop<R, W, F>(
    workflow: &Workflow,
    input: R,
    out: &mut W,
    interrupt: F,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
    F: Future<Output = ()>,
{
    let mut lines = input.lines();
    tokio::pin!(interrupt);

    loop {
        write!(out, "{PROMPT}")?;
        out.flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = &mut interrupt => None,
        };
        let Some(line) = line else {
            writeln!(out, "\nExiting.")?;
            return Ok(());
        };

        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }
        if prompt.eq_ignore_ascii_case("exit") {
            writeln!(out, "Exiting.")?;
            return Ok(());
        }

        let mut renderer = OutputRenderer::new(workflow, console::terminal_width());
        let mut events = workflow.run_stream(prompt);
        loop {
            let event = tokio::select! {
                event = events.next() => event,
                _ = &mut interrupt => {
                    writeln!(out, "\nExiting.")?;
                    return Ok(());
                }
            };
            match event {
                Some(event) => renderer.render(&event, out)?,
                None => break,
            }
        }
        renderer.finish(out)?;
    }
}

/// Prints output blocks for the events of one run
pub struct OutputRenderer<'a> {
    workflow: &'a Workflow,
    width: usize,
    last_output_source: Option<String>,
    final_output_source: Option<String>,
}

impl<'a> OutputRenderer<'a> {
    pub fn new(workflow: &'a Workflow, width: usize) -> Self {
        Self {
            workflow,
            width,
            last_output_source: None,
            final_output_source: None,
        }
    }

    fn name_of(&self, executor_id: &str) -> String {
        self.workflow
            .display_name(executor_id)
            .unwrap_or_else(|| executor_id.to_string())
    }

    pub fn render<W: Write>(&mut self, event: &WorkflowEvent, out: &mut W) -> io::Result<()> {
        match event {
            // Partial text is never shown; the final output follows.
            WorkflowEvent::AgentRunUpdate { .. } => Ok(()),
            WorkflowEvent::Output { executor_id, data } => {
                let name = self.name_of(executor_id);
                if self.last_output_source.as_deref() != Some(executor_id.as_str()) {
                    if self.last_output_source.is_some() {
                        writeln!(out)?;
                    }
                    writeln!(out, "## {name} ##:\n")?;
                    self.last_output_source = Some(executor_id.clone());
                }

                let wrapped = wrap_text(data, self.width, console::INDENT);
                if wrapped.is_empty() {
                    writeln!(out, "{}(no output)", console::INDENT)?;
                } else {
                    writeln!(out, "{wrapped}")?;
                }
                self.final_output_source = Some(name);
                Ok(())
            }
            WorkflowEvent::Failed { executor_id, error } => {
                let name = self.name_of(executor_id);
                writeln!(out, "\n## {name} ##: run failed\n")?;
                writeln!(out, "{}Error: {}", console::INDENT, error)
            }
            WorkflowEvent::Completed => Ok(()),
        }
    }

    /// Final banner naming the last step that produced output
    pub fn finish<W: Write>(self, out: &mut W) -> io::Result<()> {
        match self.final_output_source {
            Some(name) => writeln!(out, "\n===== Final output: {name} ====="),
            None => Ok(()),
        }
    }
}
