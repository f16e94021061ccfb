use anyhow::{Result, bail};
use std::io::{self, BufRead, IsTerminal};
use zeroize::Zeroizing;

pub const PASSPHRASE_ENV: &str = "FIELDGUARD_PASSPHRASE";
pub const SECRET_ENV: &str = "FIELDGUARD_SECRET";

fn from_env(var: &str) -> Option<Zeroizing<String>> {
    match std::env::var(var) {
        Ok(value) if !value.is_empty() => Some(Zeroizing::new(value)),
        _ => None,
    }
}

/// Transport passphrase for `seal`/`open`.
///
/// stdin carries the payload, so only the environment and the TTY are consulted.
pub fn read_passphrase() -> Result<Zeroizing<String>> {
    //  FIELDGUARD_PASSPHRASE="..." fieldguard seal --fields card_number < form.json
    if let Some(pw) = from_env(PASSPHRASE_ENV) {
        return Ok(pw);
    }

    // rpassword reads from the controlling terminal, not stdin
    if let Ok(pw) = rpassword::prompt_password("Passphrase: ") {
        if !pw.is_empty() {
            return Ok(Zeroizing::new(pw));
        }
    }

    bail!("No passphrase provided (set {PASSPHRASE_ENV})")
}

/// Candidate PIN or password for `verify`.
pub fn read_secret() -> Result<Zeroizing<String>> {
    if let Some(secret) = from_env(SECRET_ENV) {
        return Ok(secret);
    }

    //  printf "%s" "$PIN" | fieldguard verify --hash ...
    if !io::stdin().is_terminal() {
        let mut buf = Zeroizing::new(String::new());
        io::stdin().read_line(&mut buf)?;
        trim_newline(&mut buf);

        if !buf.is_empty() {
            return Ok(buf);
        }
    }

    if io::stdin().is_terminal() {
        let secret = Zeroizing::new(rpassword::prompt_password("Secret: ")?);
        if !secret.is_empty() {
            return Ok(secret);
        }
    }

    bail!("No secret provided")
}

/// New PIN or password for `hash`, entered twice unless it comes from the environment.
pub fn read_new_secret_with_confirmation() -> Result<Zeroizing<String>> {
    if let Some(secret) = from_env(SECRET_ENV) {
        return Ok(secret);
    }

    if !io::stdin().is_terminal() {
        let stdin = io::stdin();
        let mut handle = stdin.lock();

        let mut s1 = Zeroizing::new(String::new());
        let mut s2 = Zeroizing::new(String::new());

        handle.read_line(&mut s1)?;
        handle.read_line(&mut s2)?;

        trim_newline(&mut s1);
        trim_newline(&mut s2);

        return confirm(s1, s2);
    }

    let s1 = Zeroizing::new(rpassword::prompt_password("New secret: ")?);
    let s2 = Zeroizing::new(rpassword::prompt_password("Confirm secret: ")?);
    confirm(s1, s2)
}

fn confirm(s1: Zeroizing<String>, s2: Zeroizing<String>) -> Result<Zeroizing<String>> {
    if s1.is_empty() {
        bail!("secret cannot be empty");
    }

    if s1 != s2 {
        bail!("secrets do not match");
    }

    Ok(s1)
}

fn trim_newline(s: &mut String) {
    while s.ends_with('\n') || s.ends_with('\r') {
        s.pop();
    }
}
