use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::tempdir;

const CHECKOUT: &str = r#"{"card_number":"4111111111111111","cvv":"123","name":"Ada"}"#;

fn bin() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("fieldguard"));
    // keep Argon2 cheap in tests
    cmd.env("FIELDGUARD_ARGON_MEM", "1024")
        .env("FIELDGUARD_ARGON_TIME", "1")
        .env("FIELDGUARD_ALLOW_WEAK_PARAMS", "true")
        .env_remove("FIELDGUARD_SECRET")
        .env_remove("FIELDGUARD_PROFILE")
        .env_remove("FIELDGUARD_MAX_MEM_KIB")
        .env_remove("FIELDGUARD_MAX_TIME_COST")
        .env_remove("FIELDGUARD_MAX_PARALLELISM");
    cmd
}

fn seal(payload: &str, fields: &str) -> Value {
    let out = bin()
        .env("FIELDGUARD_PASSPHRASE", "pw")
        .arg("seal")
        .arg("--fields")
        .arg(fields)
        .write_stdin(payload)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&out).unwrap()
}

#[test]
fn seal_and_open_roundtrip() {
    let sealed = seal(CHECKOUT, "card_number,cvv");

    assert_eq!(sealed["name"], "Ada");
    assert_ne!(sealed["card_number"], "4111111111111111");
    assert_ne!(sealed["cvv"], "123");

    let out = bin()
        .env("FIELDGUARD_PASSPHRASE", "pw")
        .arg("open")
        .arg("--fields")
        .arg("card_number,cvv")
        .write_stdin(sealed.to_string())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let opened: Value = serde_json::from_slice(&out).unwrap();

    assert_eq!(
        opened,
        json!({"card_number": "4111111111111111", "cvv": "123", "name": "Ada"})
    );
}

#[test]
fn seal_reads_payload_from_file() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("form.json");
    std::fs::write(&input, CHECKOUT).unwrap();

    bin()
        .env("FIELDGUARD_PASSPHRASE", "pw")
        .arg("seal")
        .arg("--fields")
        .arg("card_number")
        .arg("--input")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"Ada\""))
        .stdout(predicate::str::contains("4111111111111111").not());
}

#[test]
fn absent_sensitive_field_is_skipped() {
    let sealed = seal(r#"{"name":"Ada"}"#, "card_number,national_id");
    assert_eq!(sealed, json!({"name": "Ada"}));
}

#[test]
fn tampered_envelope_fails_closed() {
    let mut sealed = seal(CHECKOUT, "card_number,cvv");

    let envelope = sealed["card_number"].as_str().unwrap().to_string();
    let mut chars: Vec<char> = envelope.chars().collect();
    let i = chars.len() - 10;
    chars[i] = if chars[i] == 'A' { 'B' } else { 'A' };
    sealed["card_number"] = Value::String(chars.into_iter().collect());

    bin()
        .env("FIELDGUARD_PASSPHRASE", "pw")
        .arg("open")
        .arg("--fields")
        .arg("card_number,cvv")
        .write_stdin(sealed.to_string())
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("authentication failed"));
}

#[test]
fn wrong_passphrase_fails() {
    let sealed = seal(CHECKOUT, "cvv");

    bin()
        .env("FIELDGUARD_PASSPHRASE", "wrong")
        .arg("open")
        .arg("--fields")
        .arg("cvv")
        .write_stdin(sealed.to_string())
        .assert()
        .failure()
        .stderr(predicate::str::contains("authentication failed"));
}

#[test]
fn non_string_payload_is_rejected() {
    bin()
        .env("FIELDGUARD_PASSPHRASE", "pw")
        .arg("seal")
        .arg("--fields")
        .arg("cvv")
        .write_stdin(r#"{"cvv": 123}"#)
        .assert()
        .failure()
        .stderr(predicate::str::contains("JSON object of string fields"));
}

#[test]
fn hash_and_verify() {
    let out = bin()
        .arg("hash")
        .write_stdin("2468\n2468\n")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stored = String::from_utf8(out).unwrap().trim().to_string();
    assert!(stored.starts_with("$argon2id$"));

    bin()
        .arg("verify")
        .arg("--hash")
        .arg(&stored)
        .write_stdin("2468\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("match"));

    bin()
        .arg("verify")
        .arg("--hash")
        .arg(&stored)
        .write_stdin("1357\n")
        .assert()
        .failure()
        .stdout(predicate::str::contains("mismatch"));
}

#[test]
fn hash_requires_confirmation() {
    bin()
        .arg("hash")
        .write_stdin("2468\n1357\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("secrets do not match"));
}

#[test]
fn verify_rejects_malformed_hash() {
    bin()
        .arg("verify")
        .arg("--hash")
        .arg("$2b$12$notargon")
        .write_stdin("2468\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid input"));
}

#[test]
fn max_mem_limit_is_enforced() {
    bin()
        .env("FIELDGUARD_PASSPHRASE", "pw")
        .arg("--max-mem-kib")
        .arg("512")
        .arg("seal")
        .arg("--fields")
        .arg("cvv")
        .write_stdin(CHECKOUT)
        .assert()
        .failure()
        .stderr(predicate::str::contains("resource exhausted"));
}

#[test]
fn max_time_cost_is_enforced_on_open() {
    let out = bin()
        .env("FIELDGUARD_PASSPHRASE", "pw")
        .env("FIELDGUARD_ARGON_TIME", "3")
        .arg("seal")
        .arg("--fields")
        .arg("cvv")
        .write_stdin(CHECKOUT)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    bin()
        .env("FIELDGUARD_PASSPHRASE", "pw")
        .arg("--max-time-cost")
        .arg("2")
        .arg("open")
        .arg("--fields")
        .arg("cvv")
        .write_stdin(out)
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("resource exhausted"));
}

#[test]
fn weak_costs_need_explicit_override() {
    bin()
        .env_remove("FIELDGUARD_ALLOW_WEAK_PARAMS")
        .env("FIELDGUARD_PASSPHRASE", "pw")
        .arg("seal")
        .arg("--fields")
        .arg("cvv")
        .write_stdin(CHECKOUT)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--allow-weak-params"));

    bin()
        .env_remove("FIELDGUARD_ALLOW_WEAK_PARAMS")
        .arg("hash")
        .write_stdin("2468\n2468\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("below the interactive profile"));

    bin()
        .env_remove("FIELDGUARD_ALLOW_WEAK_PARAMS")
        .env("FIELDGUARD_PASSPHRASE", "pw")
        .arg("seal")
        .arg("--allow-weak-params")
        .arg("--fields")
        .arg("cvv")
        .write_stdin(CHECKOUT)
        .assert()
        .success();
}

#[test]
fn params_reflect_profile_and_overrides() {
    Command::new(assert_cmd::cargo::cargo_bin!("fieldguard"))
        .env_remove("FIELDGUARD_ARGON_MEM")
        .env_remove("FIELDGUARD_ARGON_TIME")
        .env_remove("FIELDGUARD_PROFILE")
        .arg("params")
        .arg("--profile")
        .arg("moderate")
        .arg("--argon-parallelism")
        .arg("2")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"mem_cost_kib\": 262144"))
        .stdout(predicate::str::contains("\"time_cost\": 3"))
        .stdout(predicate::str::contains("\"parallelism\": 2"))
        .stdout(predicate::str::contains("argon2id"));
}

#[test]
fn invalid_argon2_parameters_fail() {
    bin()
        .arg("params")
        .arg("--argon-time")
        .arg("0")
        .assert()
        .failure()
        .stderr(predicate::str::contains("time cost"));
}
