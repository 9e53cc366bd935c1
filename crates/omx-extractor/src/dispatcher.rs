//! Concurrent dispatch of extraction tasks to the model
//!
//! Every task runs as its own tokio task; a semaphore admits at most
//! `worker_count` of them at once, in submission order (group-major, then
//! chunk-minor). Each task is retried on its own and a failed or panicked
//! task never cancels its siblings. The dispatcher returns once every task
//! has an outcome.

use crate::error::ModelError;
use crate::parser::parse_model_response;
use crate::prompt::PromptBuilder;
use crate::retry::RetryPolicy;
use crate::types::{DocumentChunk, ExtractionTask, TaskOutcome, TaskResult};
use omx_domain::{FieldGroup, GenerationOptions, GroupId, LlmProvider, TokenUsage};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Build one task per (group, chunk) pair, group-major
pub fn plan_tasks(
    groups: &[&'static FieldGroup],
    chunks: &[DocumentChunk],
) -> Vec<ExtractionTask> {
    groups
        .iter()
        .flat_map(|&group| {
            chunks.iter().map(move |chunk| ExtractionTask {
                group,
                chunk_index: chunk.index,
                prompt: PromptBuilder::new(group)
                    .with_chunk_info(chunk.index, chunks.len())
                    .build(&[chunk.text.as_str()]),
            })
        })
        .collect()
}

/// Runs extraction tasks with bounded concurrency
pub struct GroupDispatcher<L: LlmProvider> {
    llm: Arc<L>,
    worker_count: usize,
    retry: RetryPolicy,
    task_timeout: Duration,
    options: GenerationOptions,
}

impl<L: LlmProvider + 'static> GroupDispatcher<L> {
    /// Create a dispatcher running at most `worker_count` tasks at once (at least one)
    pub fn new(
        llm: Arc<L>,
        worker_count: usize,
        retry: RetryPolicy,
        task_timeout: Duration,
        options: GenerationOptions,
    ) -> Self {
        Self {
            llm,
            worker_count: worker_count.max(1),
            retry,
            task_timeout,
            options,
        }
    }

    /// Run every task and collect one result per task
    ///
    /// Results are sorted by (group, chunk), independent of completion order.
    pub async fn dispatch(&self, tasks: Vec<ExtractionTask>) -> Vec<TaskResult> {
        let expected: Vec<(GroupId, usize)> = tasks.iter().map(ExtractionTask::key).collect();
        info!(
            tasks = tasks.len(),
            workers = self.worker_count,
            "Dispatching extraction tasks"
        );

        let permits = Arc::new(Semaphore::new(self.worker_count));
        let mut pool = JoinSet::new();

        for task in tasks {
            // Acquired here so tasks start in submission order
            let permit = match Arc::clone(&permits).acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!(error = %e, "Worker pool closed; remaining tasks not started");
                    break;
                }
            };
            let llm = Arc::clone(&self.llm);
            let retry = self.retry.clone();
            let options = self.options.clone();
            let task_timeout = self.task_timeout;

            pool.spawn(async move {
                let result = run_task(llm.as_ref(), &task, &retry, task_timeout, &options).await;
                drop(permit);
                result
            });
        }

        let mut results = Vec::with_capacity(expected.len());
        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => error!(error = %e, "Extraction task terminated abnormally"),
            }
        }

        // A task that panicked still gets an outcome
        let seen: HashSet<(GroupId, usize)> =
            results.iter().map(|r| (r.group_id, r.chunk_index)).collect();
        for (group_id, chunk_index) in expected {
            if !seen.contains(&(group_id, chunk_index)) {
                results.push(TaskResult {
                    group_id,
                    chunk_index,
                    attempts: 0,
                    usage: TokenUsage::default(),
                    outcome: TaskOutcome::Failure(ModelError::abandoned(
                        "task terminated before completing",
                    )),
                });
            }
        }

        results.sort_by_key(|r| (r.group_id, r.chunk_index));
        results
    }
}

/// Call the model for one task, with deadline and retries, and parse the reply
async fn run_task<L: LlmProvider>(
    llm: &L,
    task: &ExtractionTask,
    retry: &RetryPolicy,
    task_timeout: Duration,
    options: &GenerationOptions,
) -> TaskResult {
    let (group_id, chunk_index) = task.key();
    let operation = format!("group {} chunk {}", group_id, chunk_index);

    let (response, attempts) = retry
        .run(&operation, |attempt| async move {
            debug!(group = group_id, chunk = chunk_index, attempt, "Calling model");
            match timeout(task_timeout, llm.generate(&task.prompt, options)).await {
                Ok(Ok(generation)) => Ok(generation),
                Ok(Err(e)) => Err(ModelError::from_provider(&e)),
                Err(_) => Err(ModelError::timeout(task_timeout)),
            }
        })
        .await;

    let (outcome, usage) = match response {
        Ok(generation) => {
            let partial = parse_model_response(&generation.text, task.group, chunk_index);
            (TaskOutcome::Success(partial), generation.usage)
        }
        Err(e) => {
            warn!(
                group = group_id,
                chunk = chunk_index,
                attempts,
                error = %e,
                "Extraction task failed"
            );
            (TaskOutcome::Failure(e), TokenUsage::default())
        }
    };

    TaskResult {
        group_id,
        chunk_index,
        attempts,
        usage,
        outcome,
    }
}
