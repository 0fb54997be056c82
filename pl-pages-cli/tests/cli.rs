use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

struct Env {
    root: TempDir,
}

impl Env {
    fn new() -> Self {
        let root = TempDir::new().expect("root");
        fs::create_dir_all(root.path().join("home")).expect("home");
        let site = root.path().join("site");
        fs::create_dir_all(site.join("css")).expect("site");
        fs::write(site.join("index.html"), "<h1>hi</h1>").expect("index");
        fs::write(site.join("css/site.css"), "body{}").expect("css");
        Self { root }
    }

    fn home(&self) -> PathBuf {
        self.root.path().join("home")
    }

    fn cache(&self) -> PathBuf {
        self.root.path().join("cache")
    }

    fn site(&self) -> PathBuf {
        self.root.path().join("site")
    }

    fn remote(&self) -> PathBuf {
        let remote = self.root.path().join("remote.git");
        if !remote.exists() {
            git(self.root.path(), &["init", "-q", "--bare", remote.to_str().unwrap()]);
        }
        remote
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("pl-pages"));
        cmd.current_dir(self.site())
            .env("HOME", self.home())
            .env("USERPROFILE", self.home())
            .env("XDG_CACHE_HOME", self.cache())
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .env_remove("RUST_LOG");
        cmd
    }

    fn publish_args(&self) -> Vec<String> {
        vec![
            "-d".into(),
            self.site().to_string_lossy().into_owned(),
            "--repo".into(),
            self.remote().to_string_lossy().into_owned(),
            "-u".into(),
            "Pages Bot <bot@example.com>".into(),
            "--no-deploy".into(),
        ]
    }
}

fn git(cwd: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .expect("run git");
    assert!(
        out.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn branch_files(remote: &Path, branch: &str) -> Vec<String> {
    let git_dir = format!("--git-dir={}", remote.display());
    git(remote, &[&git_dir, "ls-tree", "-r", "--name-only", branch])
        .lines()
        .map(str::to_owned)
        .collect()
}

#[test]
fn publish_is_the_default_command() {
    let env = Env::new();

    env.cmd()
        .args(env.publish_args())
        .assert()
        .success()
        .stdout(contains("Published"));

    assert_eq!(
        branch_files(&env.remote(), "pl-pages"),
        ["css/site.css", "index.html"]
    );
}

#[test]
fn explicit_publish_subcommand_with_options() {
    let env = Env::new();

    env.cmd()
        .arg("publish")
        .args(env.publish_args())
        .args(["-b", "site", "-e", "docs", "-s", "*.html"])
        .assert()
        .success();

    assert_eq!(branch_files(&env.remote(), "site"), ["docs/index.html"]);
}

#[test]
fn missing_dist_is_an_error() {
    let env = Env::new();

    env.cmd()
        .assert()
        .failure()
        .stderr(contains("missing required option --dist"));
}

#[test]
fn malformed_user_is_rejected() {
    let env = Env::new();

    env.cmd()
        .args(["-d", ".", "-u", "not an identity"])
        .assert()
        .failure()
        .stderr(contains("Could not parse name and email from user option"));
}

#[test]
fn unmatched_source_is_reported() {
    let env = Env::new();

    env.cmd()
        .args(env.publish_args())
        .args(["-s", "*.nothing"])
        .assert()
        .failure()
        .stderr(contains("didn't match any files"));
}

#[test]
fn silent_hides_error_detail() {
    let env = Env::new();

    env.cmd()
        .args(env.publish_args())
        .args(["-s", "*.nothing", "-x"])
        .assert()
        .failure()
        .stderr(contains("Unspecified error (run without silent option for detail)"))
        .stderr(contains("didn't match").not());
}

#[test]
fn deploy_without_wallet_reports_keyfile_setup() {
    let env = Env::new();
    let args: Vec<String> = env
        .publish_args()
        .into_iter()
        .filter(|a| a != "--no-deploy")
        .collect();

    env.cmd()
        .args(args)
        .assert()
        .failure()
        .stderr(contains("protocol.land.keyfile"));

    // The branch is pushed before the deployment is attempted.
    assert_eq!(
        branch_files(&env.remote(), "pl-pages"),
        ["css/site.css", "index.html"]
    );
}

#[test]
fn silent_hides_wallet_load_errors() {
    let env = Env::new();
    let missing = env.root.path().join("missing-wallet.json");
    let args: Vec<String> = env
        .publish_args()
        .into_iter()
        .filter(|a| a != "--no-deploy")
        .collect();

    env.cmd()
        .args(args)
        .arg("-x")
        .arg("-w")
        .arg(&missing)
        .assert()
        .failure()
        .stderr(contains("Unspecified error (run without silent option for detail)"))
        .stderr(contains("failed to read wallet").not());
}

#[test]
fn set_branch_requires_a_wallet() {
    let env = Env::new();

    env.cmd()
        .args(["set-branch", "--repo", "https://github.com/u/site.git", "pl-pages"])
        .assert()
        .failure()
        .stderr(contains("protocol.land.keyfile"));
}

#[test]
fn unreadable_wallet_is_reported() {
    let env = Env::new();
    let missing = env.root.path().join("missing-wallet.json");

    env.cmd()
        .args(["set-branch", "--repo", "https://github.com/u/site.git", "pl-pages", "-w"])
        .arg(&missing)
        .assert()
        .failure()
        .stderr(contains("failed to read wallet"));
}

#[cfg(target_os = "linux")]
#[test]
fn clean_removes_cached_checkouts() {
    let env = Env::new();

    env.cmd().args(env.publish_args()).assert().success();
    let root = env.cache().join("pl-pages");
    assert!(root.exists());

    env.cmd()
        .arg("clean")
        .assert()
        .success()
        .stdout(contains("removed"));
    assert!(!root.exists());
}

#[test]
fn clean_without_cache_succeeds() {
    let env = Env::new();
    env.cmd().arg("clean").assert().success();
}
