//! OS credential store backends.
//!
//! Each platform has its own [`CredentialStore`] that shells out to the
//! native tool:
//!
//! | Platform | Lookup | Store |
//! |----------|--------|-------|
//! | macOS | `security find-generic-password` | `security add-generic-password` |
//! | Linux | `secret-tool lookup` | `secret-tool store` (secret on stdin) |
//! | Windows | PowerShell calling `CredReadW` | `cmdkey /generic:` |
//!
//! All subprocess calls go through a [`CommandRunner`], so every backend can
//! be exercised with a fake runner. Lookup failures of any kind (tool not
//! installed, non-zero exit, timeout, empty output) are reported as "not
//! found", never as errors.

use anyhow::{bail, Result};
use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Service identifier shared by setup, auth-check and the client.
pub const SERVICE_NAME: &str = "codealive-api-key";

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);
const STORE_TIMEOUT: Duration = Duration::from_secs(10);

// ============ Subprocess runner ============

/// Captured result of a finished subprocess.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Runs external programs on behalf of a credential store.
pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        program: &str,
        args: &[String],
        stdin: Option<&str>,
        timeout: Duration,
    ) -> io::Result<CommandOutput>;
}

/// Spawns real processes; kills them once the timeout elapses.
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(
        &self,
        program: &str,
        args: &[String],
        stdin: Option<&str>,
        timeout: Duration,
    ) -> io::Result<CommandOutput> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(input) = stdin {
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(input.as_bytes())?;
            }
        }

        let deadline = Instant::now() + timeout;
        loop {
            if child.try_wait()?.is_some() {
                break;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("{} timed out after {}s", program, timeout.as_secs()),
                ));
            }
            std::thread::sleep(Duration::from_millis(20));
        }

        let output = child.wait_with_output()?;
        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

// ============ Store trait ============

/// A platform credential store holding the API key under [`SERVICE_NAME`].
pub trait CredentialStore: Send + Sync {
    /// Human-readable store name (e.g. `"macOS Keychain"`).
    fn label(&self) -> &str;

    /// Look up the key. Any failure yields `None`.
    fn read(&self) -> Option<String>;

    /// Persist the key, replacing an existing entry.
    fn store(&self, secret: &str) -> Result<()>;
}

/// Platforms with a supported credential store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Linux,
    Windows,
    Unsupported,
}

impl Platform {
    /// The platform this binary was compiled for.
    pub fn current() -> Self {
        match std::env::consts::OS {
            "macos" => Platform::MacOs,
            "linux" => Platform::Linux,
            "windows" => Platform::Windows,
            _ => Platform::Unsupported,
        }
    }
}

/// Select the store for `platform`, running its commands through `runner`.
pub fn store_for(
    platform: Platform,
    runner: Box<dyn CommandRunner>,
) -> Option<Box<dyn CredentialStore>> {
    match platform {
        Platform::MacOs => Some(Box::new(MacKeychain::new(runner, current_user()))),
        Platform::Linux => Some(Box::new(SecretTool::new(runner))),
        Platform::Windows => Some(Box::new(WindowsCredentials::new(runner))),
        Platform::Unsupported => None,
    }
}

/// The store for the running platform, backed by real subprocesses.
pub fn platform_store() -> Option<Box<dyn CredentialStore>> {
    store_for(Platform::current(), Box::new(SystemRunner))
}

fn current_user() -> String {
    std::env::var("USER").unwrap_or_default()
}

/// Run a lookup command and return its trimmed stdout when it succeeded.
fn lookup(runner: &dyn CommandRunner, store: &str, program: &str, args: &[String]) -> Option<String> {
    match runner.run(program, args, None, LOOKUP_TIMEOUT) {
        Ok(out) if out.success => {
            let value = out.stdout.trim();
            if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            }
        }
        Ok(out) => {
            tracing::debug!(store, stderr = %out.stderr.trim(), "credential lookup returned no entry");
            None
        }
        Err(e) => {
            tracing::debug!(store, error = %e, "credential lookup unavailable");
            None
        }
    }
}

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

// ============ macOS ============

/// macOS login keychain via the `security` tool.
pub struct MacKeychain {
    runner: Box<dyn CommandRunner>,
    account: String,
}

impl MacKeychain {
    pub fn new(runner: Box<dyn CommandRunner>, account: String) -> Self {
        Self { runner, account }
    }
}

impl CredentialStore for MacKeychain {
    fn label(&self) -> &str {
        "macOS Keychain"
    }

    fn read(&self) -> Option<String> {
        let argv = args(&[
            "find-generic-password",
            "-a",
            self.account.as_str(),
            "-s",
            SERVICE_NAME,
            "-w",
        ]);
        lookup(self.runner.as_ref(), self.label(), "security", &argv)
    }

    fn store(&self, secret: &str) -> Result<()> {
        // A stale entry makes add-generic-password fail; its absence is fine.
        let _ = self.runner.run(
            "security",
            &args(&["delete-generic-password", "-a", self.account.as_str(), "-s", SERVICE_NAME]),
            None,
            LOOKUP_TIMEOUT,
        );

        let out = self.runner.run(
            "security",
            &args(&[
                "add-generic-password",
                "-a",
                self.account.as_str(),
                "-s",
                SERVICE_NAME,
                "-w",
                secret,
            ]),
            None,
            STORE_TIMEOUT,
        )?;
        if !out.success {
            bail!("security add-generic-password failed: {}", out.stderr.trim());
        }
        Ok(())
    }
}

// ============ Linux ============

/// Secret Service (GNOME Keyring, KWallet) via `secret-tool`.
pub struct SecretTool {
    runner: Box<dyn CommandRunner>,
}

impl SecretTool {
    pub fn new(runner: Box<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

impl CredentialStore for SecretTool {
    fn label(&self) -> &str {
        "secret-tool"
    }

    fn read(&self) -> Option<String> {
        let argv = args(&["lookup", "service", SERVICE_NAME]);
        lookup(self.runner.as_ref(), self.label(), "secret-tool", &argv)
    }

    fn store(&self, secret: &str) -> Result<()> {
        let out = self.runner.run(
            "secret-tool",
            &args(&["store", "--label=CodeAlive API Key", "service", SERVICE_NAME]),
            Some(secret),
            STORE_TIMEOUT,
        )?;
        if !out.success {
            bail!("secret-tool store failed: {}", out.stderr.trim());
        }
        Ok(())
    }
}

// ============ Windows ============

/// PowerShell snippet reading a generic credential through `CredReadW`.
/// The blob is UTF-16LE, hence the byte count halved for the char count.
const WINDOWS_READ_SCRIPT: &str = r#"
$ErrorActionPreference = 'Stop'
Add-Type -Namespace CodeAlive -Name Cred -MemberDefinition @'
[StructLayout(LayoutKind.Sequential, CharSet = CharSet.Unicode)]
public struct CREDENTIAL {
    public int Flags; public int Type; public string TargetName; public string Comment;
    public long LastWritten; public int CredentialBlobSize; public IntPtr CredentialBlob;
    public int Persist; public int AttributeCount; public IntPtr Attributes;
    public string TargetAlias; public string UserName;
}
[DllImport("advapi32.dll", CharSet = CharSet.Unicode, SetLastError = true)]
public static extern bool CredReadW(string target, int type, int flags, out IntPtr cred);
[DllImport("advapi32.dll")]
public static extern void CredFree(IntPtr cred);
'@
$ptr = [IntPtr]::Zero
if ([CodeAlive.Cred]::CredReadW('__TARGET__', 1, 0, [ref]$ptr)) {
    try {
        $c = [Runtime.InteropServices.Marshal]::PtrToStructure($ptr, [type][CodeAlive.Cred+CREDENTIAL])
        if ($c.CredentialBlobSize -gt 0) {
            [Console]::Out.Write([Runtime.InteropServices.Marshal]::PtrToStringUni($c.CredentialBlob, $c.CredentialBlobSize / 2))
        }
    } finally {
        [CodeAlive.Cred]::CredFree($ptr)
    }
} else {
    exit 1
}
"#;

/// Windows Credential Manager (generic credentials).
pub struct WindowsCredentials {
    runner: Box<dyn CommandRunner>,
}

impl WindowsCredentials {
    pub fn new(runner: Box<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

impl CredentialStore for WindowsCredentials {
    fn label(&self) -> &str {
        "Credential Manager"
    }

    fn read(&self) -> Option<String> {
        let script = WINDOWS_READ_SCRIPT.replace("__TARGET__", SERVICE_NAME);
        let argv = args(&["-NoProfile", "-NonInteractive", "-Command", &script]);
        lookup(self.runner.as_ref(), self.label(), "powershell", &argv)
    }

    fn store(&self, secret: &str) -> Result<()> {
        let out = self.runner.run(
            "cmdkey",
            &[
                format!("/generic:{}", SERVICE_NAME),
                "/user:codealive".to_string(),
                format!("/pass:{}", secret),
            ],
            None,
            STORE_TIMEOUT,
        )?;
        if !out.success {
            bail!("cmdkey failed: {}", out.stdout.trim());
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// A recorded subprocess invocation.
    #[derive(Debug, Clone)]
    pub struct Call {
        pub program: String,
        pub args: Vec<String>,
        pub stdin: Option<String>,
    }

    /// Returns a canned result for every call and records the invocations.
    #[derive(Clone)]
    pub struct FakeRunner {
        pub calls: Arc<Mutex<Vec<Call>>>,
        result: Result<CommandOutput, io::ErrorKind>,
    }

    impl FakeRunner {
        pub fn ok(stdout: &str) -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                result: Ok(CommandOutput {
                    success: true,
                    stdout: stdout.to_string(),
                    stderr: String::new(),
                }),
            }
        }

        pub fn failing(stderr: &str) -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                result: Ok(CommandOutput {
                    success: false,
                    stdout: String::new(),
                    stderr: stderr.to_string(),
                }),
            }
        }

        pub fn missing_tool() -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                result: Err(io::ErrorKind::NotFound),
            }
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(
            &self,
            program: &str,
            args: &[String],
            stdin: Option<&str>,
            _timeout: Duration,
        ) -> io::Result<CommandOutput> {
            self.calls.lock().unwrap().push(Call {
                program: program.to_string(),
                args: args.to_vec(),
                stdin: stdin.map(str::to_string),
            });
            match &self.result {
                Ok(out) => Ok(out.clone()),
                Err(kind) => Err(io::Error::from(*kind)),
            }
        }
    }

    #[test]
    fn test_secret_tool_lookup_trims_output() {
        let runner = FakeRunner::ok("  sk-live-123\n");
        let store = SecretTool::new(Box::new(runner.clone()));
        assert_eq!(store.read().as_deref(), Some("sk-live-123"));

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls[0].program, "secret-tool");
        assert_eq!(calls[0].args, vec!["lookup", "service", SERVICE_NAME]);
    }

    #[test]
    fn test_missing_tool_is_not_found() {
        let store = SecretTool::new(Box::new(FakeRunner::missing_tool()));
        assert_eq!(store.read(), None);
    }

    #[test]
    fn test_nonzero_exit_is_not_found() {
        let store = MacKeychain::new(Box::new(FakeRunner::failing("item not found")), "dev".into());
        assert_eq!(store.read(), None);
    }

    #[test]
    fn test_blank_output_is_not_found() {
        let store = WindowsCredentials::new(Box::new(FakeRunner::ok("\r\n")));
        assert_eq!(store.read(), None);
    }

    #[test]
    fn test_mac_lookup_uses_account_and_service() {
        let runner = FakeRunner::ok("key\n");
        let store = MacKeychain::new(Box::new(runner.clone()), "alice".into());
        assert_eq!(store.read().as_deref(), Some("key"));

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls[0].program, "security");
        assert_eq!(
            calls[0].args,
            vec!["find-generic-password", "-a", "alice", "-s", SERVICE_NAME, "-w"]
        );
    }

    #[test]
    fn test_mac_store_replaces_existing_entry() {
        let runner = FakeRunner::ok("");
        let store = MacKeychain::new(Box::new(runner.clone()), "alice".into());
        store.store("new-key").unwrap();

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].args[0], "delete-generic-password");
        assert_eq!(calls[1].args[0], "add-generic-password");
        assert_eq!(calls[1].args.last().map(String::as_str), Some("new-key"));
    }

    #[test]
    fn test_secret_tool_store_passes_secret_on_stdin() {
        let runner = FakeRunner::ok("");
        let store = SecretTool::new(Box::new(runner.clone()));
        store.store("abc").unwrap();

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls[0].stdin.as_deref(), Some("abc"));
        assert!(!calls[0].args.iter().any(|a| a == "abc"));
    }

    #[test]
    fn test_store_failure_is_error() {
        let store = SecretTool::new(Box::new(FakeRunner::failing("no dbus")));
        let err = store.store("abc").unwrap_err();
        assert!(err.to_string().contains("no dbus"));
    }

    #[test]
    fn test_windows_store_uses_cmdkey() {
        let runner = FakeRunner::ok("");
        let store = WindowsCredentials::new(Box::new(runner.clone()));
        store.store("k").unwrap();

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls[0].program, "cmdkey");
        assert_eq!(calls[0].args[0], format!("/generic:{}", SERVICE_NAME));
        assert_eq!(calls[0].args[2], "/pass:k");
    }

    #[test]
    fn test_windows_lookup_targets_service() {
        let runner = FakeRunner::ok("win-key");
        let store = WindowsCredentials::new(Box::new(runner.clone()));
        assert_eq!(store.read().as_deref(), Some("win-key"));

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls[0].program, "powershell");
        let script = calls[0].args.last().unwrap();
        assert!(script.contains(&format!("CredReadW('{}'", SERVICE_NAME)));
    }

    #[test]
    fn test_store_selection() {
        let pick = |p| store_for(p, Box::new(FakeRunner::ok(""))).map(|s| s.label().to_string());
        assert_eq!(pick(Platform::MacOs).as_deref(), Some("macOS Keychain"));
        assert_eq!(pick(Platform::Linux).as_deref(), Some("secret-tool"));
        assert_eq!(pick(Platform::Windows).as_deref(), Some("Credential Manager"));
        assert!(pick(Platform::Unsupported).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_missing_program() {
        let err = SystemRunner
            .run("codealive-no-such-tool", &[], None, Duration::from_secs(1))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_captures_stdout() {
        let out = SystemRunner
            .run("echo", &["hello".to_string()], None, Duration::from_secs(5))
            .unwrap();
        assert!(out.success);
        assert_eq!(out.stdout.trim(), "hello");
    }
}
