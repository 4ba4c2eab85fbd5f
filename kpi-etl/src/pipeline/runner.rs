//! Run controller: sequences the pipeline stages and owns the run log lines

use crate::auth::TokenSource;
use crate::fetch::WorkbookSource;
use crate::load::StagedLoader;
use crate::normalize;

use super::PipelineError;

/// The stages a run moves through, strictly forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Idle,
    Authenticating,
    Fetching,
    Normalizing,
    Loading,
    Succeeded,
    Failed,
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunStage::Idle => "idle",
            RunStage::Authenticating => "authentication",
            RunStage::Fetching => "fetch",
            RunStage::Normalizing => "normalization",
            RunStage::Loading => "load",
            RunStage::Succeeded => "succeeded",
            RunStage::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Terminal result of a run
#[derive(Debug)]
pub enum RunOutcome {
    Succeeded { rows: usize },
    Failed { stage: RunStage, error: PipelineError },
}

/// Single-shot orchestration of one pipeline run.
///
/// One start line on entry, exactly one terminal line on completion; any
/// stage failure aborts the remaining stages. No stage is retried.
pub struct RunController {
    tokens: Box<dyn TokenSource>,
    workbooks: Box<dyn WorkbookSource>,
    loader: StagedLoader,
    stage: RunStage,
}

impl RunController {
    pub fn new(
        tokens: Box<dyn TokenSource>,
        workbooks: Box<dyn WorkbookSource>,
        loader: StagedLoader,
    ) -> Self {
        Self {
            tokens,
            workbooks,
            loader,
            stage: RunStage::Idle,
        }
    }

    fn enter(&mut self, stage: RunStage) {
        log::debug!("Entering {} stage", stage);
        self.stage = stage;
    }

    fn fail(&mut self, error: PipelineError) -> RunOutcome {
        let stage = self.stage;
        self.stage = RunStage::Failed;
        log::error!("KPI ETL run failed during {}: {}", stage, error);
        RunOutcome::Failed { stage, error }
    }

    pub async fn run(mut self) -> RunOutcome {
        log::info!("Starting KPI ETL run");

        self.enter(RunStage::Authenticating);
        let token = match self.tokens.resolve().await {
            Ok(token) => token,
            Err(e) => return self.fail(e),
        };

        self.enter(RunStage::Fetching);
        let workbook = match self.workbooks.fetch(&token).await {
            Ok(bytes) => bytes,
            Err(e) => return self.fail(e),
        };

        self.enter(RunStage::Normalizing);
        let dataset = match normalize::normalize(&workbook) {
            Ok(dataset) => dataset,
            Err(e) => return self.fail(e),
        };

        self.enter(RunStage::Loading);
        if let Err(e) = self.loader.load(&dataset).await {
            return self.fail(e);
        }

        self.stage = RunStage::Succeeded;
        let rows = dataset.row_count();
        log::info!("Finished KPI ETL run: {} rows staged", rows);
        RunOutcome::Succeeded { rows }
    }
}
