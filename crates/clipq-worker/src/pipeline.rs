//! Processing pipeline boundary.
//!
//! The domain work (downloading, rendering, subtitle generation) lives
//! outside the queue engine. The harness only sees an ordered list of
//! stages: each stage may fail independently, non-critical failures
//! degrade the run instead of aborting it, and the last stage is
//! expected to leave a valid artifact reference behind.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use clipq_models::{ArtifactRef, JobPayload};

use crate::error::{WorkerError, WorkerResult};

/// Mutable state threaded through the stages of one pipeline run.
pub struct StageContext {
    /// Work description, read-only to stages
    payload: JobPayload,
    /// Artifact reference, set by the final stage
    pub artifact: Option<ArtifactRef>,
}

impl StageContext {
    /// Create a context for one run.
    pub fn new(payload: JobPayload) -> Self {
        Self {
            payload,
            artifact: None,
        }
    }

    /// The job's work description.
    pub fn payload(&self) -> &JobPayload {
        &self.payload
    }
}

/// One stage of the externally defined processing pipeline.
#[async_trait]
pub trait PipelineStage: Send + Sync {
    /// Stage name, used in diagnostics and error records.
    fn name(&self) -> &str;

    /// Critical stages abort the job on failure; non-critical stages
    /// let the run continue with degraded input.
    fn critical(&self) -> bool {
        true
    }

    /// Execute the stage against the shared context.
    async fn run(&self, ctx: &mut StageContext) -> WorkerResult<()>;
}

/// Result of a pipeline run.
#[derive(Debug)]
pub struct PipelineRun {
    /// Artifact produced by the run
    pub artifact: ArtifactRef,
    /// Names of non-critical stages that failed along the way
    pub degraded_stages: Vec<String>,
}

/// An ordered pipeline of stages.
pub struct StagePipeline {
    stages: Vec<Box<dyn PipelineStage>>,
}

impl StagePipeline {
    /// Build a pipeline from its stages.
    pub fn new(stages: Vec<Box<dyn PipelineStage>>) -> Self {
        Self { stages }
    }

    /// Run every stage in order.
    ///
    /// Non-critical stage failures are recorded and skipped; a
    /// critical failure aborts immediately. Returning without a valid
    /// artifact reference is a failure even when every stage
    /// succeeded.
    pub async fn run(&self, lookup_hash: &str, payload: JobPayload) -> WorkerResult<PipelineRun> {
        let mut ctx = StageContext::new(payload);
        let mut degraded = Vec::new();

        for stage in &self.stages {
            if let Err(e) = stage.run(&mut ctx).await {
                if stage.critical() {
                    return Err(WorkerError::stage(stage.name(), e.to_string()));
                }
                warn!(
                    lookup_hash = %lookup_hash,
                    stage = stage.name(),
                    error = %e,
                    "Non-critical stage failed, continuing degraded"
                );
                degraded.push(stage.name().to_string());
            }
        }

        match ctx.artifact {
            Some(artifact) if artifact.is_valid() => Ok(PipelineRun {
                artifact,
                degraded_stages: degraded,
            }),
            _ => Err(WorkerError::MissingArtifact),
        }
    }
}

/// Stage that delegates the whole run to an external command.
///
/// The payload is written to the child's stdin as JSON; the child is
/// expected to print an [`ArtifactRef`] as JSON on stdout. This is the
/// default integration for deployments whose rendering pipeline lives
/// in a separate binary.
pub struct CommandStage {
    program: String,
    args: Vec<String>,
}

impl CommandStage {
    /// Create a stage from a program and its arguments.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl PipelineStage for CommandStage {
    fn name(&self) -> &str {
        "run_pipeline_command"
    }

    async fn run(&self, ctx: &mut StageContext) -> WorkerResult<()> {
        let mut child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        let payload_json = serde_json::to_vec(ctx.payload())?;
        if let Some(stdin) = child.stdin.as_mut() {
            stdin.write_all(&payload_json).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(WorkerError::stage(
                self.name(),
                format!("pipeline command exited with {}", output.status),
            ));
        }

        let artifact: ArtifactRef = serde_json::from_slice(&output.stdout)?;
        ctx.artifact = Some(artifact);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedStage {
        name: &'static str,
        critical: bool,
        result: Result<(), &'static str>,
        artifact: Option<ArtifactRef>,
    }

    #[async_trait]
    impl PipelineStage for FixedStage {
        fn name(&self) -> &str {
            self.name
        }

        fn critical(&self) -> bool {
            self.critical
        }

        async fn run(&self, ctx: &mut StageContext) -> WorkerResult<()> {
            if let Some(artifact) = &self.artifact {
                ctx.artifact = Some(artifact.clone());
            }
            self.result.map_err(|e| WorkerError::stage(self.name, e))
        }
    }

    fn payload() -> JobPayload {
        JobPayload::opaque(serde_json::json!({"x": 1}))
    }

    #[tokio::test]
    async fn non_critical_failure_degrades_but_completes() {
        let pipeline = StagePipeline::new(vec![
            Box::new(FixedStage {
                name: "subtitles",
                critical: false,
                result: Err("model unavailable"),
                artifact: None,
            }),
            Box::new(FixedStage {
                name: "render",
                critical: true,
                result: Ok(()),
                artifact: Some(ArtifactRef::new("clips/a.mp4")),
            }),
        ]);

        let run = pipeline.run("h1", payload()).await.unwrap();
        assert_eq!(run.artifact.storage_key, "clips/a.mp4");
        assert_eq!(run.degraded_stages, vec!["subtitles".to_string()]);
    }

    #[tokio::test]
    async fn critical_failure_aborts_immediately() {
        let pipeline = StagePipeline::new(vec![
            Box::new(FixedStage {
                name: "download",
                critical: true,
                result: Err("404"),
                artifact: None,
            }),
            Box::new(FixedStage {
                name: "render",
                critical: true,
                result: Ok(()),
                artifact: Some(ArtifactRef::new("clips/a.mp4")),
            }),
        ]);

        let err = pipeline.run("h1", payload()).await.unwrap_err();
        assert!(matches!(err, WorkerError::Stage { ref stage, .. } if stage == "download"));
    }

    #[tokio::test]
    async fn missing_artifact_is_a_failure() {
        let pipeline = StagePipeline::new(vec![Box::new(FixedStage {
            name: "render",
            critical: true,
            result: Ok(()),
            artifact: None,
        })]);

        let err = pipeline.run("h1", payload()).await.unwrap_err();
        assert!(matches!(err, WorkerError::MissingArtifact));
    }

    #[tokio::test]
    async fn empty_artifact_key_is_a_failure() {
        let pipeline = StagePipeline::new(vec![Box::new(FixedStage {
            name: "render",
            critical: true,
            result: Ok(()),
            artifact: Some(ArtifactRef::new("")),
        })]);

        let err = pipeline.run("h1", payload()).await.unwrap_err();
        assert!(matches!(err, WorkerError::MissingArtifact));
    }
}
