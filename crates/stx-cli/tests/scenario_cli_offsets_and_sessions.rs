use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

/// Runs `stx` against an isolated config layer so nothing from the user's
/// app data directory leaks into the test.
fn stx(config_dir: &tempfile::TempDir, config_yaml: &str) -> anyhow::Result<Command> {
    let path = config_dir.path().join("config.yaml");
    std::fs::write(&path, config_yaml)?;
    let mut cmd = Command::cargo_bin("stx")?;
    cmd.env("STX_CONFIG", &path).env_remove("STX_CACHE_PATH");
    Ok(cmd)
}

#[test]
fn offset_round_floors_to_five_minutes() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    stx(&dir, "{}")?
        .args(["offset", "round", "--bar-size", "5m", "--at", "2024-03-05 14:07:32"])
        .assert()
        .success()
        .stdout(predicate::str::contains("round=2024-03-05T14:05:00-05:00"))
        .stdout(predicate::str::contains("rollforward=2024-03-05T14:10:00-05:00"))
        .stdout(predicate::str::contains("on_offset=false"));
    Ok(())
}

#[test]
fn offset_step_wraps_over_the_weekend() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    stx(&dir, "{}")?
        .args(["offset", "step", "--bar-size", "1h", "--at", "2024-03-08 19:00", "--n=1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("result=2024-03-11T04:00:00-04:00"));

    stx(&dir, "{}")?
        .args(["offset", "step", "--bar-size", "1h", "--at", "2024-03-11 04:00", "--n=-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("result=2024-03-08T19:00:00-05:00"));
    Ok(())
}

#[test]
fn sessions_lists_pre_and_post_windows_in_display_zone() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    stx(&dir, "display_timezone: \"US/Eastern\"\n")?
        .args(["sessions", "--start", "2024-03-05 00:00", "--end", "2024-03-05 23:00"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "pre_market 2024-03-05T04:00:00-05:00 2024-03-05T09:30:00-05:00",
        ))
        .stdout(predicate::str::contains(
            "post_market 2024-03-05T16:00:00-05:00 2024-03-05T20:00:00-05:00",
        ))
        .stdout(predicate::str::contains("windows=2"));
    Ok(())
}

#[test]
fn market_hours_in_pacific_time() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    stx(&dir, "{}")?
        .args(["market-hours", "--date", "2024-07-03", "--tz", "US/Pacific"])
        .assert()
        .success()
        .stdout(predicate::str::contains("market_open=06:30:00"))
        .stdout(predicate::str::contains("market_close=13:00:00"))
        .stdout(predicate::str::contains("business_day=true"));
    Ok(())
}

#[test]
fn strict_config_rejects_unknown_keys() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    stx(&dir, "chart:\n  colour: red\n")?
        .args(["--strict-config", "config-hash"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_UNUSED_KEYS"));

    stx(&dir, "chart:\n  colour: red\n")?
        .args(["config-hash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config_hash="));
    Ok(())
}

#[test]
fn unknown_bar_size_is_an_error() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    stx(&dir, "{}")?
        .args(["offset", "round", "--bar-size", "7m", "--at", "2024-03-05 14:07"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --bar-size '7m'"));
    Ok(())
}

#[test]
fn offset_without_bar_size_uses_chart_default() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    stx(&dir, "chart:\n  default_bar_size: 5m\n")?
        .args(["offset", "round", "--at", "2024-03-05 14:07:32"])
        .assert()
        .success()
        .stdout(predicate::str::contains("round=2024-03-05T14:05:00-05:00"));

    // An explicit flag still wins over the configured default.
    stx(&dir, "chart:\n  default_bar_size: 5m\n")?
        .args(["offset", "round", "--bar-size", "1h", "--at", "2024-03-05 14:07:32"])
        .assert()
        .success()
        .stdout(predicate::str::contains("round=2024-03-05T14:00:00-05:00"));
    Ok(())
}

#[test]
fn sessions_prints_no_windows_when_highlight_is_off() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    stx(
        &dir,
        "display_timezone: \"US/Eastern\"\nchart:\n  pre_post_market_highlight: false\n",
    )?
    .args(["sessions", "--start", "2024-03-05 00:00", "--end", "2024-03-05 23:00"])
    .assert()
    .success()
    .stdout(predicate::str::contains("windows=0"))
    .stdout(predicate::str::contains("pre_market").not())
    .stdout(predicate::str::contains("post_market").not());
    Ok(())
}
