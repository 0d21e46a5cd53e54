//! Process-level checks of `matmul2d-check`: exit codes, artifact cleanup,
//! `TEST_ARGS` merging and the JSON report

mod common;

use std::path::Path;
use std::process::{Command, Output};

use common::{artifact_base, create_temp_dir, remaining_files, serial, toolchain_or_skip};
use kernelcheck::target_filename;

fn check_command(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_matmul2d-check"));
    cmd.env_remove("TEST_ARGS")
        .env_remove("TEST_SEED")
        .env_remove("TestMatMul2DNNPA_INSTRUCTION")
        .env("KERNELCHECK_LOG_LEVEL", "warn")
        .arg("--base-path")
        .arg(artifact_base(dir));
    cmd
}

fn run(cmd: &mut Command) -> anyhow::Result<Output> {
    let output = cmd.output()?;
    if !output.status.success() {
        eprintln!("{}", String::from_utf8_lossy(&output.stderr));
    }
    Ok(output)
}

#[test]
#[serial]
fn test_success_exits_zero_and_cleans_up() -> anyhow::Result<()> {
    let Some(_) = toolchain_or_skip() else {
        return Ok(());
    };
    let dir = create_temp_dir()?;
    let report = dir.path().join("summary.json");

    let output = run(check_command(dir.path())
        .args(["--seed", "17", "--num-cases", "3", "--exhaustive-bound", "2"])
        .args(["--maccel", "NNPA"])
        .arg("--report")
        .arg(&report))?;

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Target options: \"--maccel=NNPA\""), "{}", stdout);

    let summary: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&report)?)?;
    assert_eq!(summary["seed"], 17);
    assert_eq!(summary["reports"].as_array().map(Vec::len), Some(3));
    assert_eq!(summary["reports"][2]["attempted"], 8);

    assert_eq!(remaining_files(dir.path())?, ["summary.json"]);
    Ok(())
}

#[test]
#[serial]
fn test_random_campaign_failure_exits_one() -> anyhow::Result<()> {
    let Some(_) = toolchain_or_skip() else {
        return Ok(());
    };
    let dir = create_temp_dir()?;

    let output = run(check_command(dir.path())
        .args(["--seed", "1", "--campaign", "matrix-vector"])
        .args(["--perturb-output", "0.5"]))?;

    assert_eq!(output.status.code(), Some(1));
    assert!(remaining_files(dir.path())?.is_empty());
    Ok(())
}

#[test]
#[serial]
fn test_exhaustive_counterexample_exits_two() -> anyhow::Result<()> {
    let Some(_) = toolchain_or_skip() else {
        return Ok(());
    };
    let dir = create_temp_dir()?;

    let output = run(check_command(dir.path())
        .args(["--campaign", "exhaustive", "--exhaustive-bound", "2"])
        .args(["--perturb-output", "-1.0"]))?;

    assert_eq!(output.status.code(), Some(2));
    assert!(remaining_files(dir.path())?.is_empty());
    Ok(())
}

#[test]
#[serial]
fn test_test_args_are_merged() -> anyhow::Result<()> {
    let Some(_) = toolchain_or_skip() else {
        return Ok(());
    };
    let dir = create_temp_dir()?;

    let output = run(check_command(dir.path())
        .env("TEST_ARGS", "--campaign exhaustive --exhaustive-bound 1 -O0")
        .env("TEST_SEED", "99"))?;

    assert_eq!(output.status.code(), Some(0));
    assert!(remaining_files(dir.path())?.is_empty());
    Ok(())
}

#[test]
fn test_setup_error_still_removes_artifact() -> anyhow::Result<()> {
    let dir = create_temp_dir()?;
    let artifact = target_filename(artifact_base(dir.path()));

    std::fs::write(&artifact, b"left over from an earlier run")?;
    let bad_seed = run(check_command(dir.path()).env("TEST_SEED", "bad"))?;
    assert_eq!(bad_seed.status.code(), Some(3));
    assert!(remaining_files(dir.path())?.is_empty());

    std::fs::write(&artifact, b"left over from an earlier run")?;
    let no_compiler = run(check_command(dir.path()).args(["--cc", "/nonexistent/kernelcheck-cc"]))?;
    assert_eq!(no_compiler.status.code(), Some(3));
    assert!(remaining_files(dir.path())?.is_empty());
    Ok(())
}

#[test]
#[serial]
fn test_report_write_failure_keeps_campaign_exit_code() -> anyhow::Result<()> {
    let Some(_) = toolchain_or_skip() else {
        return Ok(());
    };
    let dir = create_temp_dir()?;
    // A regular file where the report directory should be
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"")?;
    let report = blocker.join("summary.json");

    let random = run(check_command(dir.path())
        .args(["--seed", "1", "--campaign", "matrix-vector"])
        .args(["--perturb-output", "0.5"])
        .arg("--report")
        .arg(&report))?;
    assert_eq!(random.status.code(), Some(1));

    let exhaustive = run(check_command(dir.path())
        .args(["--campaign", "exhaustive", "--exhaustive-bound", "1"])
        .args(["--perturb-output", "0.5"])
        .arg("--report")
        .arg(&report))?;
    assert_eq!(exhaustive.status.code(), Some(2));

    assert_eq!(remaining_files(dir.path())?, ["blocker"]);
    Ok(())
}

#[test]
#[serial]
fn test_report_write_failure_after_success_is_setup_error() -> anyhow::Result<()> {
    let Some(_) = toolchain_or_skip() else {
        return Ok(());
    };
    let dir = create_temp_dir()?;
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"")?;

    let output = run(check_command(dir.path())
        .args(["--campaign", "exhaustive", "--exhaustive-bound", "1"])
        .arg("--report")
        .arg(blocker.join("summary.json")))?;
    assert_eq!(output.status.code(), Some(3));
    Ok(())
}

#[test]
fn test_usage_errors_exit_three() -> anyhow::Result<()> {
    let dir = create_temp_dir()?;

    let bad_level = run(check_command(dir.path()).args(["-O", "7"]))?;
    assert_eq!(bad_level.status.code(), Some(3));

    let bad_campaign = run(check_command(dir.path()).args(["--campaign", "diagonal"]))?;
    assert_eq!(bad_campaign.status.code(), Some(3));

    let bad_seed = run(check_command(dir.path()).env("TEST_SEED", "not-a-number"))?;
    assert_eq!(bad_seed.status.code(), Some(3));

    assert!(remaining_files(dir.path())?.is_empty());
    Ok(())
}

#[test]
fn test_help_exits_zero() -> anyhow::Result<()> {
    let dir = create_temp_dir()?;
    let output = run(check_command(dir.path()).arg("--help"))?;
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("--exhaustive-bound"));
    Ok(())
}
