use assert_cmd::Command;
use canopy::model::Issue;
use std::ffi::OsStr;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime};
use tempfile::TempDir;

#[derive(Debug)]
pub struct CanopyRun {
    pub stdout: String,
    pub stderr: String,
    pub status: std::process::ExitStatus,
    pub duration: Duration,
    pub log_path: PathBuf,
}

impl CanopyRun {
    /// Parse stdout as JSON, panicking with both streams on failure.
    pub fn json(&self) -> serde_json::Value {
        let payload = extract_json_payload(&self.stdout);
        serde_json::from_str(&payload).unwrap_or_else(|err| {
            panic!(
                "invalid json ({err}): stdout='{}' stderr='{}'",
                self.stdout, self.stderr
            )
        })
    }
}

pub struct CanopyWorkspace {
    pub temp_dir: TempDir,
    pub root: PathBuf,
    pub log_dir: PathBuf,
}

impl CanopyWorkspace {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir");
        let root = temp_dir.path().to_path_buf();
        let log_dir = root.join("logs");
        fs::create_dir_all(&log_dir).expect("log dir");
        Self {
            temp_dir,
            root,
            log_dir,
        }
    }

    /// Workspace with `canopy init` already run.
    pub fn initialized() -> Self {
        let workspace = Self::new();
        let init = run_canopy(&workspace, ["init"], "init");
        assert!(init.status.success(), "init failed: {}", init.stderr);
        workspace
    }

    /// Write a query result file and return its name relative to the root.
    pub fn write_dump(&self, name: &str, issues: &[Issue]) -> String {
        let body = serde_json::to_string_pretty(issues).expect("serialize issues");
        fs::write(self.root.join(name), body).expect("write dump");
        name.to_string()
    }

    pub fn write_raw(&self, name: &str, body: &str) -> String {
        fs::write(self.root.join(name), body).expect("write file");
        name.to_string()
    }
}

pub fn run_canopy<I, S>(workspace: &CanopyWorkspace, args: I, label: &str) -> CanopyRun
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    run_canopy_with_env(
        workspace,
        args,
        std::iter::empty::<(String, String)>(),
        label,
    )
}

pub fn run_canopy_with_env<I, S, E, K, V>(
    workspace: &CanopyWorkspace,
    args: I,
    env_vars: E,
    label: &str,
) -> CanopyRun
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
    E: IntoIterator<Item = (K, V)>,
    K: AsRef<OsStr>,
    V: AsRef<OsStr>,
{
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("canopy"));
    cmd.current_dir(&workspace.root);
    cmd.args(args);
    cmd.env_remove("CANOPY_DIR");
    cmd.env("NO_COLOR", "1");
    cmd.env("RUST_LOG", "canopy=debug");
    cmd.env("RUST_BACKTRACE", "1");
    cmd.env("HOME", &workspace.root);
    cmd.envs(env_vars);

    let start = Instant::now();
    let output = cmd.output().expect("run canopy");
    let duration = start.elapsed();

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let log_path = workspace.log_dir.join(format!("{label}.log"));
    let timestamp = SystemTime::now();
    let log_body = format!(
        "label: {label}\nstarted: {:?}\nduration: {:?}\nstatus: {}\nargs: {:?}\ncwd: {}\n\nstdout:\n{}\n\nstderr:\n{}\n",
        timestamp,
        duration,
        output.status,
        cmd.get_args().collect::<Vec<_>>(),
        workspace.root.display(),
        stdout,
        stderr
    );
    fs::write(&log_path, log_body).expect("write log");

    CanopyRun {
        stdout,
        stderr,
        status: output.status,
        duration,
        log_path,
    }
}

pub fn extract_json_payload(stdout: &str) -> String {
    let lines: Vec<&str> = stdout.lines().collect();
    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with('[') || trimmed.starts_with('{') {
            return lines[idx..].join("\n").trim().to_string();
        }
    }
    stdout.trim().to_string()
}
