//! End-to-end tests of the `lazydb` binary against a temporary database

use assert_cmd::Command;
use std::path::Path;
use tempfile::TempDir;

fn write_config(dir: &Path) -> std::path::PathBuf {
    let db_path = dir.join("cli.db");
    let config_path = dir.join("config.toml");
    let toml = format!(
        "[database]\nhost = \"localhost\"\nuser = \"cli\"\npassword = \"secret\"\nname = {:?}\n",
        db_path.to_string_lossy()
    );
    std::fs::write(&config_path, toml).unwrap();
    config_path
}

fn lazydb(config: &Path, args: &[&str]) -> assert_cmd::assert::Assert {
    Command::cargo_bin("lazydb")
        .unwrap()
        .arg("--config")
        .arg(config)
        .args(args)
        .assert()
}

#[test]
fn test_exec_scalar_and_count() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    lazydb(&config, &["exec", "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)"]).success();
    lazydb(&config, &["exec", "INSERT INTO users (name) VALUES ('Alice')"])
        .success()
        .stdout("ok: 1 row(s) affected\n");

    let output = lazydb(&config, &["exec", "SELECT id, name FROM users"]).success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    assert_eq!(stdout, "{\"id\":1,\"name\":\"Alice\"}\n");

    lazydb(&config, &["scalar", "SELECT name FROM users"]).success().stdout("Alice\n");
    lazydb(&config, &["scalar", "SELECT name FROM users WHERE id = 99"])
        .success()
        .stdout("(no value)\n");
    lazydb(&config, &["count", "users"]).success().stdout("1\n");
}

#[test]
fn test_failures_exit_nonzero() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    let output = lazydb(&config, &["exec", "SELECT * FROM nowhere"]).failure().code(1);
    let stderr = String::from_utf8(output.get_output().stderr.clone()).unwrap();
    assert!(stderr.contains("no such table"), "{}", stderr);

    Command::cargo_bin("lazydb")
        .unwrap()
        .arg("bogus")
        .assert()
        .failure()
        .code(1);
}
