//! Interactive API key setup.
//!
//! ```text
//! [1/3] existing key (env or OS store) ──verify──► works? done
//! [2/3] --key or prompt ──────────────────verify──► fails? exit 1
//! [3/3] --env ? print export hint : store in OS store (hint on failure)
//! ```
//!
//! The flow is written against [`SetupEnv`] so tests can supply the
//! verifier, the prompt and the credential store.

use anyhow::{bail, Result};
use console::Key;
use std::io::{self, BufRead, Write};
use std::time::Duration;

use crate::client::verify_key;
use crate::config::Config;
use crate::credentials::{CredentialResolver, CredentialSource, EnvSource, Located, StoreSource};
use crate::error::CodeAliveError;
use crate::keychain::{self, CredentialStore};

/// Command-line options for `codealive setup`.
#[derive(Debug, Clone, Default)]
pub struct SetupOptions {
    /// Use this key instead of prompting.
    pub key: Option<String>,
    /// Print an environment variable hint instead of using the OS store.
    pub env_mode: bool,
}

/// How setup finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    /// A previously configured key still works.
    AlreadyConfigured,
    /// The new key was saved to the named store.
    Stored(String),
    /// The user was told to export the key themselves.
    EnvHint,
}

/// Verifies a key, returning a one-line status either way.
pub type Verifier<'a> = dyn Fn(&str) -> std::result::Result<String, String> + 'a;

/// Reads a key from the user. `Ok(None)` means cancelled.
pub type Prompt<'a> = dyn Fn() -> io::Result<Option<String>> + 'a;

/// Everything the setup flow touches outside itself.
pub struct SetupEnv<'a> {
    pub base_url: String,
    /// Key already present in the environment or OS store.
    pub existing: Option<String>,
    pub store: Option<&'a dyn CredentialStore>,
    pub verify: &'a Verifier<'a>,
    pub prompt: &'a Prompt<'a>,
    /// Value of `$SHELL`, used to pick the profile file in hints.
    pub shell: String,
}

/// Turn a verification result into the status line shown to the user.
pub fn verification_message(
    result: crate::Result<usize>,
    base_url: &str,
) -> std::result::Result<String, String> {
    match result {
        Ok(count) => Ok(format!(
            "Connected. {} data source{} available.",
            count,
            if count == 1 { "" } else { "s" }
        )),
        Err(CodeAliveError::AuthenticationFailed { .. }) => {
            Err("Authentication failed: API key is invalid or expired.".to_string())
        }
        Err(CodeAliveError::ConnectionFailed { reason, .. }) => {
            Err(format!("Cannot connect to {}: {}", base_url, reason))
        }
        Err(e) => match e.status() {
            Some(status) => Err(format!("API returned HTTP {}.", status)),
            None => Err(e.to_string()),
        },
    }
}

/// Profile file the export hint should target.
pub fn shell_profile(shell: &str) -> &'static str {
    if shell.contains("zsh") {
        "~/.zshrc"
    } else {
        "~/.bashrc"
    }
}

fn step(out: &mut dyn Write, n: u8, text: &str) -> io::Result<()> {
    writeln!(out, "\n  [{}/3] {}", n, text)
}

/// Run the three setup steps, writing progress to `out`.
pub fn run_setup_flow(
    env: &SetupEnv<'_>,
    opts: &SetupOptions,
    out: &mut dyn Write,
) -> Result<SetupOutcome> {
    writeln!(out)?;
    writeln!(out, "  CodeAlive Context Engine Setup")?;
    writeln!(out, "  {}", "=".repeat(38))?;

    step(out, 1, "Checking for existing API key...")?;
    if let Some(ref existing) = env.existing {
        match (env.verify)(existing) {
            Ok(msg) => {
                writeln!(out, "      Found a working API key. {}", msg)?;
                print_ready(out)?;
                return Ok(SetupOutcome::AlreadyConfigured);
            }
            Err(msg) => {
                writeln!(out, "      Found an existing key, but it didn't work: {}", msg)?;
                writeln!(out, "      Let's set up a new one.")?;
            }
        }
    }

    step(out, 2, "API key required.")?;
    writeln!(out, "      Get yours at: {}/settings/api-keys", env.base_url)?;
    writeln!(out)?;
    out.flush()?;

    let key = match opts.key {
        Some(ref key) => key.trim().to_string(),
        None => match (env.prompt)()? {
            Some(key) => key.trim().to_string(),
            None => bail!("Setup cancelled."),
        },
    };
    if key.is_empty() {
        bail!("No key provided. Setup cancelled.");
    }

    match (env.verify)(&key) {
        Ok(msg) => writeln!(out, "      Key verified. {}", msg)?,
        Err(msg) => bail!(
            "Key verification failed: {}\nPlease check your key and try again.",
            msg
        ),
    }

    step(out, 3, "Storing API key...")?;
    let profile = shell_profile(&env.shell);

    if opts.env_mode {
        writeln!(out, "      Add this to your {}:", profile)?;
        writeln!(out, "      export CODEALIVE_API_KEY=\"{}\"", key)?;
        writeln!(out)?;
        writeln!(out, "      Then reload: source {}", profile)?;
        print_ready(out)?;
        return Ok(SetupOutcome::EnvHint);
    }

    let stored = match env.store {
        Some(store) => match store.store(&key) {
            Ok(()) => Some(store.label().to_string()),
            Err(e) => {
                tracing::warn!(store = store.label(), error = %e, "failed to store API key");
                None
            }
        },
        None => None,
    };

    let outcome = match stored {
        Some(label) => {
            writeln!(out, "      Saved to {}.", label)?;
            SetupOutcome::Stored(label)
        }
        None => {
            writeln!(out, "      Could not save to OS credential store.")?;
            writeln!(out, "      Add this to your {} instead:", profile)?;
            writeln!(out, "      export CODEALIVE_API_KEY=\"{}\"", key)?;
            SetupOutcome::EnvHint
        }
    };

    print_ready(out)?;
    Ok(outcome)
}

fn print_ready(out: &mut dyn Write) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "  {}", "-".repeat(38))?;
    writeln!(out, "  Ready! Start your agent and ask:")?;
    writeln!(out)?;
    writeln!(out, "    \"How is authentication implemented?\"")?;
    writeln!(out, "    \"Show me error handling patterns\"")?;
    writeln!(out, "    \"Explain the payment processing flow\"")?;
    writeln!(out)
}

/// Read a key from the terminal with hidden input, or one line from a
/// piped stdin. End of input means cancelled.
fn prompt_for_key() -> io::Result<Option<String>> {
    let term = console::Term::stderr();
    if atty::is(atty::Stream::Stdin) && term.is_term() {
        term.write_str("      Paste your API key (input is hidden): ")?;
        let key = collect_secret(|| term.read_key_raw());
        term.write_line("")?;
        key
    } else {
        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        Ok((read > 0).then_some(line))
    }
}

/// Assemble a hidden line from raw key presses. Each raw read restores the
/// terminal mode before returning, so Ctrl-C arrives as a key and ends the
/// prompt with `Ok(None)` instead of killing the process.
fn collect_secret(mut next_key: impl FnMut() -> io::Result<Key>) -> io::Result<Option<String>> {
    let mut buf = String::new();
    loop {
        match next_key() {
            Ok(Key::Enter) => return Ok(Some(buf)),
            Ok(Key::Backspace) => {
                buf.pop();
            }
            Ok(Key::CtrlC) | Ok(Key::Char('\u{3}')) => return Ok(None),
            Ok(Key::Char('\u{4}')) if buf.is_empty() => return Ok(None),
            Ok(Key::Char(c)) if !c.is_control() => buf.push(c),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(None),
            Err(e) => return Err(e),
        }
    }
}

/// CLI entry point for `codealive setup`.
pub fn run_setup(config: &Config, opts: &SetupOptions) -> Result<SetupOutcome> {
    let base_url = config.base_url().to_string();
    let timeout = Duration::from_secs(config.api.verify_timeout_secs);

    let store = if config.credentials.os_store {
        keychain::platform_store()
    } else {
        None
    };
    let store_ref = store.as_deref();

    let verify = |key: &str| verification_message(verify_key(key, &base_url, timeout), &base_url);

    let env = SetupEnv {
        base_url: base_url.clone(),
        existing: configured_key(config.credentials.os_store)
            .map(|found| found.credential.expose().to_string()),
        store: store_ref,
        verify: &verify,
        prompt: &prompt_for_key,
        shell: std::env::var("SHELL").unwrap_or_default(),
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_setup_flow(&env, opts, &mut out)
}

// ============ auth-check ============

/// Instructions shown when no key is configured.
pub fn missing_key_instructions() -> String {
    CodeAliveError::CredentialNotFound.to_string()
}

/// Key from the environment or OS store, ignoring `--api-key`. No network.
pub fn configured_key(use_os_store: bool) -> Option<Located> {
    let mut sources: Vec<Box<dyn CredentialSource>> = vec![Box::new(EnvSource::default())];
    if use_os_store {
        if let Some(store) = keychain::platform_store() {
            sources.push(Box::new(StoreSource::new(store)));
        }
    }
    CredentialResolver::new(sources).locate()
}

/// CLI entry point for `codealive auth-check`. Returns `true` when ready.
pub fn run_auth_check(config: &Config) -> bool {
    if let Some(found) = configured_key(config.credentials.os_store) {
        tracing::debug!(source = %found.source, "auth-check found a key");
        println!("CodeAlive API key found. Ready to use.");
        true
    } else {
        println!("{}", missing_key_instructions());
        false
    }
}
