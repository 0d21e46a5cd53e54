//! Per-configuration results and campaign summaries

use std::path::Path;

use serde::Serialize;

use crate::campaign::strategy::Campaign;
use crate::error::{HarnessError, HarnessResult, Stage};
use crate::model::ShapeTriple;
use crate::seed::RandomSeed;

/// Outcome of one configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResult {
    pub shape: ShapeTriple,
    /// 1-based attempt number within the process
    pub attempt: usize,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl TestResult {
    pub fn pass(shape: ShapeTriple, attempt: usize) -> Self {
        TestResult {
            shape,
            attempt,
            passed: true,
            failed_stage: None,
            reason: None,
        }
    }

    pub fn fail(
        shape: ShapeTriple,
        attempt: usize,
        stage: Stage,
        reason: impl Into<String>,
    ) -> Self {
        TestResult {
            shape,
            attempt,
            passed: false,
            failed_stage: Some(stage),
            reason: Some(reason.into()),
        }
    }
}

/// Summary of one campaign
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignReport {
    pub campaign: String,
    pub title: String,
    #[serde(skip)]
    exhaustive: bool,
    pub attempted: usize,
    pub passed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_failure: Option<TestResult>,
}

impl CampaignReport {
    pub fn new(campaign: &Campaign) -> Self {
        CampaignReport {
            campaign: campaign.name().to_string(),
            title: campaign.title(),
            exhaustive: campaign.is_exhaustive(),
            attempted: 0,
            passed: 0,
            first_failure: None,
        }
    }

    pub fn record(&mut self, result: TestResult) {
        self.attempted += 1;
        if result.passed {
            self.passed += 1;
        } else if self.first_failure.is_none() {
            self.first_failure = Some(result);
        }
    }

    pub fn is_success(&self) -> bool {
        self.first_failure.is_none()
    }

    /// Turn a recorded failure into the campaign-level error
    pub fn ensure_passed(&self) -> HarnessResult<()> {
        let failure = match &self.first_failure {
            None => return Ok(()),
            Some(failure) => failure,
        };

        let stage = failure.failed_stage.unwrap_or(Stage::Verify);
        let reason = failure.reason.clone().unwrap_or_default();

        if self.exhaustive {
            Err(HarnessError::ExhaustiveCounterexample {
                shape: failure.shape,
                stage,
                reason,
            })
        } else {
            Err(HarnessError::CampaignFailed {
                campaign: self.campaign.clone(),
                shape: failure.shape,
                stage,
                reason,
            })
        }
    }
}

/// Everything one process run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub seed: RandomSeed,
    pub target_options: String,
    pub reports: Vec<CampaignReport>,
}

impl RunSummary {
    pub fn new(seed: RandomSeed, target_options: impl Into<String>) -> Self {
        RunSummary {
            seed,
            target_options: target_options.into(),
            reports: Vec::new(),
        }
    }

    pub fn push(&mut self, report: CampaignReport) {
        self.reports.push(report);
    }

    pub fn is_success(&self) -> bool {
        self.reports.iter().all(CampaignReport::is_success)
    }

    pub fn total_attempted(&self) -> usize {
        self.reports.iter().map(|r| r.attempted).sum()
    }

    pub fn to_json(&self) -> HarnessResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| HarnessError::SerializationError(e.to_string()))
    }

    /// Write the summary as pretty JSON, creating parent directories
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> HarnessResult<()> {
        let path = path.as_ref();
        let json = self.to_json()?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;

        tracing::info!(path = %path.display(), "Wrote run summary");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::strategy::RandomProfile;

    fn shape(i: usize, j: usize, k: usize) -> ShapeTriple {
        ShapeTriple::new(i, j, k).unwrap()
    }

    #[test]
    fn test_record_counts_and_keeps_first_failure() {
        let mut report = CampaignReport::new(&Campaign::MATRIX_MATRIX);
        report.record(TestResult::pass(shape(1, 1, 1), 1));
        report.record(TestResult::fail(shape(2, 2, 2), 2, Stage::Run, "boom"));
        report.record(TestResult::fail(shape(3, 3, 3), 3, Stage::Verify, "later"));

        assert_eq!(report.attempted, 3);
        assert_eq!(report.passed, 1);
        assert_eq!(report.first_failure.as_ref().unwrap().shape, shape(2, 2, 2));
        assert!(!report.is_success());
    }

    #[test]
    fn test_ensure_passed_random_campaign() {
        let mut report = CampaignReport::new(&Campaign::Random(RandomProfile::MatrixVector));
        assert!(report.ensure_passed().is_ok());

        report.record(TestResult::fail(shape(4, 1, 4), 1, Stage::Verify, "mismatch"));
        match report.ensure_passed() {
            Err(HarnessError::CampaignFailed {
                campaign, shape: s, stage, ..
            }) => {
                assert_eq!(campaign, "matrix-vector");
                assert_eq!(s, shape(4, 1, 4));
                assert_eq!(stage, Stage::Verify);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_ensure_passed_exhaustive_is_fatal() {
        let mut report = CampaignReport::new(&Campaign::Exhaustive { bound: 2 });
        report.record(TestResult::fail(shape(1, 2, 1), 1, Stage::CompileAndLoad, "cc"));

        let err = report.ensure_passed().unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.stage(), Some(Stage::CompileAndLoad));
    }

    #[test]
    fn test_summary_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("summary.json");

        let mut summary = RunSummary::new(RandomSeed::new(77), "--maccel=NNPA");
        let mut report = CampaignReport::new(&Campaign::MATRIX_VECTOR);
        report.record(TestResult::pass(shape(4, 1, 4), 1));
        summary.push(report);
        summary.save_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["seed"], 77);
        assert_eq!(value["target_options"], "--maccel=NNPA");
        assert_eq!(value["reports"][0]["campaign"], "matrix-vector");
        assert_eq!(value["reports"][0]["passed"], 1);
        assert_eq!(value["reports"][0]["first_failure"], serde_json::Value::Null);
        assert!(summary.is_success());
        assert_eq!(summary.total_attempted(), 1);
    }
}
