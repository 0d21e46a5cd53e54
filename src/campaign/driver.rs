//! Campaign driver
//!
//! Runs one configuration at a time through the facade stages in strict
//! order and stops at the first stage that fails. A configuration either
//! passes every stage or is reported with the stage that broke it.

use rand::Rng;

use crate::campaign::report::{CampaignReport, TestResult};
use crate::campaign::strategy::{Campaign, ExhaustiveSweep};
use crate::error::{HarnessError, HarnessResult, Stage};
use crate::model::{ModelLibBuilder, ShapeTriple};

pub struct CampaignDriver<B: ModelLibBuilder> {
    builder: B,
    instruction_env: String,
    attempts: usize,
}

impl<B: ModelLibBuilder> CampaignDriver<B> {
    pub fn new(builder: B, instruction_env: impl Into<String>) -> Self {
        CampaignDriver {
            builder,
            instruction_env: instruction_env.into(),
            attempts: 0,
        }
    }

    pub fn builder(&self) -> &B {
        &self.builder
    }

    /// Configurations attempted so far, across all campaigns
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Run every stage for `shape` and report the outcome
    pub fn check_configuration(&mut self, shape: ShapeTriple) -> TestResult {
        self.attempts += 1;
        let attempt = self.attempts;
        tracing::info!(
            "attempt {} with i {}, j {}, k {}",
            attempt,
            shape.i(),
            shape.j(),
            shape.k()
        );

        match self.run_stages(shape) {
            Ok(()) => TestResult::pass(shape, attempt),
            Err((stage, err)) => {
                tracing::error!(%shape, %stage, category = %err.category(), "{}", err);
                TestResult::fail(shape, attempt, stage, err.to_string())
            }
        }
    }

    /// Whether the compiled kernel agrees with the reference for `shape`
    pub fn is_same_as_reference(&mut self, shape: ShapeTriple) -> bool {
        self.check_configuration(shape).passed
    }

    fn run_stages(&mut self, shape: ShapeTriple) -> Result<(), (Stage, HarnessError)> {
        let builder = &mut self.builder;

        builder.build(shape).map_err(|e| (Stage::Build, e))?;
        builder
            .compile_and_load()
            .map_err(|e| (Stage::CompileAndLoad, e))?;
        builder
            .check_instruction_from_env(&self.instruction_env)
            .map_err(|e| (Stage::InstructionCheck, e))?;
        builder
            .prepare_inputs()
            .map_err(|e| (Stage::PrepareInputs, e))?;
        builder.run().map_err(|e| (Stage::Run, e))?;

        let comparison = builder.verify_outputs().map_err(|e| (Stage::Verify, e))?;
        if !comparison.is_match() {
            return Err((
                Stage::Verify,
                HarnessError::VerificationMismatch(format!(
                    "{} of {} elements outside tolerance",
                    comparison.mismatches, comparison.checked
                )),
            ));
        }
        Ok(())
    }

    /// Run a campaign to completion or to its first failure
    ///
    /// Random campaigns draw `num_cases` shapes from `rng`; the exhaustive
    /// campaign ignores both and sweeps its cube.
    pub fn run_campaign<R: Rng + ?Sized>(
        &mut self,
        campaign: &Campaign,
        rng: &mut R,
        num_cases: usize,
    ) -> CampaignReport {
        tracing::info!(campaign = campaign.name(), "{}", campaign.title());
        let mut report = CampaignReport::new(campaign);

        match campaign {
            Campaign::Random(profile) => {
                for _ in 0..num_cases {
                    let shape = profile.sample(rng);
                    if !self.record(&mut report, shape) {
                        break;
                    }
                }
            }
            Campaign::Exhaustive { bound } => {
                for shape in ExhaustiveSweep::new(*bound) {
                    if !self.record(&mut report, shape) {
                        break;
                    }
                }
            }
        }

        if report.is_success() {
            tracing::info!(
                campaign = campaign.name(),
                attempted = report.attempted,
                "OK, passed {} configurations",
                report.passed
            );
        } else if let Some(failure) = &report.first_failure {
            tracing::error!(
                campaign = campaign.name(),
                attempted = report.attempted,
                "Falsified after {} passed configurations, counterexample {}",
                report.passed,
                failure.shape
            );
        }
        report
    }

    /// Run a campaign and turn its first failure into an error
    pub fn run_campaign_checked<R: Rng + ?Sized>(
        &mut self,
        campaign: &Campaign,
        rng: &mut R,
        num_cases: usize,
    ) -> HarnessResult<CampaignReport> {
        let report = self.run_campaign(campaign, rng, num_cases);
        report.ensure_passed()?;
        Ok(report)
    }

    fn record(&mut self, report: &mut CampaignReport, shape: ShapeTriple) -> bool {
        let result = self.check_configuration(shape);
        let passed = result.passed;
        report.record(result);
        passed
    }
}
