use assert_cmd::Command;

fn school(config_dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("school").unwrap();
    cmd.env("SCHOOL_CONFIG_DIR", config_dir)
        .env_remove("SCHOOL_ENV")
        .env_remove("SCHOOL_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_commands() {
    let dir = tempfile::tempdir().unwrap();
    let output = school(dir.path()).arg("--help").output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    for command in ["serve", "migrate", "token", "library"] {
        assert!(stdout.contains(command), "missing {command} in help");
    }
}

#[test]
fn token_is_minted_with_configured_secret() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("base.toml"),
        "[auth]\njwt_secret = \"cli-test-secret\"\n",
    )
    .unwrap();

    let output = school(dir.path())
        .args(["token", "--sub", "librarian-1", "--role", "librarian"])
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let token = String::from_utf8(output.stdout).unwrap();
    assert_eq!(token.trim().split('.').count(), 3);
}

#[test]
fn token_without_secret_fails() {
    let dir = tempfile::tempdir().unwrap();
    school(dir.path())
        .args(["token", "--sub", "someone"])
        .assert()
        .failure();
}

#[test]
fn unknown_role_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("base.toml"),
        "[auth]\njwt_secret = \"cli-test-secret\"\n",
    )
    .unwrap();

    school(dir.path())
        .args(["token", "--sub", "someone", "--role", "janitor"])
        .assert()
        .failure();
}

#[test]
fn migrate_creates_database() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("data").join("school.db");
    std::fs::write(
        dir.path().join("base.toml"),
        format!(
            "[database]\nurl = \"sqlite://{}\"\n\n[library]\nloan_period_days = 14\n",
            db.display()
        ),
    )
    .unwrap();

    let output = school(dir.path()).arg("migrate").output().unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8(output.stdout).unwrap().contains("applied"));
    assert!(db.exists());
}

#[test]
fn library_commands_ignore_service_settings() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("base.toml"), "[database\nurl = ").unwrap();

    let output = school(dir.path())
        .args(["library", "--api-url", "http://127.0.0.1:9", "issued"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!stderr.contains("failed to load school settings"), "{stderr}");
    assert!(stderr.contains("Failed to load issued books"), "{stderr}");
}
