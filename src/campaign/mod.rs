//! Test campaigns: sampling strategies, the per-configuration driver,
//! harness configuration and result reporting

pub mod config;
pub mod driver;
pub mod report;
pub mod strategy;

pub use config::HarnessConfig;
pub use driver::CampaignDriver;
pub use report::{CampaignReport, RunSummary, TestResult};
pub use strategy::{Campaign, ExhaustiveSweep, RandomProfile};
