use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use pl_pages_core::UserIdentity;
use pl_pages_sync::{prepare, sync_branch, GitClient, PublishOptions, SyncError, SyncPlan};
use tempfile::TempDir;

struct Env {
    _root: TempDir,
    remote: PathBuf,
    site: PathBuf,
    cache: PathBuf,
}

impl Env {
    fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let root = TempDir::new().expect("root");
        let remote = root.path().join("remote.git");
        git(root.path(), &["init", "-q", "--bare", remote.to_str().unwrap()]);
        let site = root.path().join("site");
        fs::create_dir_all(&site).expect("site dir");
        let cache = root.path().join("cache");
        Self {
            remote,
            site,
            cache,
            _root: root,
        }
    }

    fn url(&self) -> String {
        self.remote.to_string_lossy().into_owned()
    }

    fn write(&self, rel: &str, contents: &str) {
        let path = self.site.join(rel);
        fs::create_dir_all(path.parent().unwrap()).expect("parent");
        fs::write(path, contents).expect("write site file");
    }

    fn reset_site(&self) {
        fs::remove_dir_all(&self.site).expect("clear site");
        fs::create_dir_all(&self.site).expect("site dir");
    }

    fn options(&self) -> PublishOptions {
        PublishOptions {
            repo: Some(self.url()),
            user: Some(UserIdentity {
                name: Some("Pages Bot".into()),
                email: "bot@example.com".into(),
            }),
            deploy: false,
            ..PublishOptions::default()
        }
    }

    fn publish(&self, options: &PublishOptions) -> Result<(), SyncError> {
        let prepared = prepare(&self.site, options, &self.site)?;
        let plan = SyncPlan {
            options,
            base: &prepared.base,
            files: &prepared.files,
            repo_url: &prepared.repo_url,
            user: prepared.user.as_ref(),
        };
        sync_branch(&plan, &self.cache.join("checkout")).map(drop)
    }

    fn remote_git(&self, args: &[&str]) -> String {
        let git_dir = format!("--git-dir={}", self.remote.display());
        let mut full = vec![git_dir.as_str()];
        full.extend_from_slice(args);
        git(&self.remote, &full)
    }

    fn branch_files(&self, branch: &str) -> Vec<String> {
        self.remote_git(&["ls-tree", "-r", "--name-only", branch])
            .lines()
            .map(str::to_owned)
            .collect()
    }

    fn parents(&self, branch: &str) -> Vec<String> {
        self.remote_git(&["rev-list", "--parents", "-n", "1", branch])
            .split_whitespace()
            .skip(1)
            .map(str::to_owned)
            .collect()
    }

    fn tip(&self, branch: &str) -> String {
        self.remote_git(&["rev-parse", branch]).trim().to_owned()
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

#[test]
fn missing_branch_is_created_as_orphan() {
    let env = Env::new();
    env.write("index.html", "<h1>hi</h1>");
    env.write("assets/app.js", "console.log(1)");

    env.publish(&env.options()).expect("publish");

    assert_eq!(env.branch_files("pl-pages"), ["assets/app.js", "index.html"]);
    assert!(env.parents("pl-pages").is_empty());
}

#[test]
fn stale_files_are_pruned_by_default() {
    let env = Env::new();
    env.write("index.html", "v1");
    env.write("stale.txt", "old");
    env.publish(&env.options()).expect("first publish");

    env.reset_site();
    env.write("index.html", "v2");
    env.publish(&env.options()).expect("second publish");

    assert_eq!(env.branch_files("pl-pages"), ["index.html"]);
    let body = env.remote_git(&["show", "pl-pages:index.html"]);
    assert_eq!(body, "v2");
}

#[test]
fn remove_glob_keeps_unmatched_files() {
    let env = Env::new();
    env.write("index.html", "v1");
    env.write("stale.txt", "old");
    env.publish(&env.options()).expect("first publish");

    env.reset_site();
    env.write("index.html", "v2");
    let options = PublishOptions {
        remove: "*.html".into(),
        ..env.options()
    };
    env.publish(&options).expect("second publish");

    assert_eq!(env.branch_files("pl-pages"), ["index.html", "stale.txt"]);
}

#[test]
fn history_keeps_previous_tip_as_parent() {
    let env = Env::new();
    env.write("index.html", "v1");
    env.publish(&env.options()).expect("first publish");
    let first = env.tip("pl-pages");

    env.write("index.html", "v2");
    env.publish(&env.options()).expect("second publish");

    assert_eq!(env.parents("pl-pages"), [first]);
}

#[test]
fn squash_leaves_a_single_root_commit() {
    let env = Env::new();
    env.write("index.html", "v1");
    env.publish(&env.options()).expect("first publish");

    env.write("index.html", "v2");
    let options = PublishOptions {
        history: false,
        ..env.options()
    };
    env.publish(&options).expect("squashed publish");

    assert!(env.parents("pl-pages").is_empty());
    let count = env.remote_git(&["rev-list", "--count", "pl-pages"]);
    assert_eq!(count.trim(), "1");
}

#[test]
fn dest_places_files_in_subdirectory() {
    let env = Env::new();
    env.write("index.html", "root");
    let options = PublishOptions {
        dest: "docs".into(),
        ..env.options()
    };
    env.publish(&options).expect("publish");

    assert_eq!(env.branch_files("pl-pages"), ["docs/index.html"]);
}

#[test]
fn hook_can_add_files_in_add_mode() {
    let env = Env::new();
    env.write("index.html", "v1");
    env.publish(&env.options()).expect("first publish");

    env.reset_site();
    env.write("extra.html", "extra");
    let options = PublishOptions {
        add: true,
        before_add: Some(Arc::new(|git: &dyn GitClient| -> Result<(), SyncError> {
            fs::write(git.cwd().join("CNAME"), "example.com").map_err(|e| SyncError::Io {
                path: git.cwd().join("CNAME"),
                source: e,
            })
        })),
        ..env.options()
    };
    env.publish(&options).expect("second publish");

    assert_eq!(env.branch_files("pl-pages"), ["CNAME", "extra.html", "index.html"]);
}

#[test]
fn tag_and_message_are_applied() {
    let env = Env::new();
    env.write("index.html", "v1");
    let options = PublishOptions {
        message: "Deploy v1".into(),
        tag: Some("v1".into()),
        ..env.options()
    };
    env.publish(&options).expect("publish");

    let subject = env.remote_git(&["log", "-1", "--format=%s", "pl-pages"]);
    assert_eq!(subject.trim(), "Deploy v1");
    assert_eq!(env.tip("v1"), env.tip("pl-pages"));
}

#[test]
fn cached_checkout_for_another_remote_is_rejected() {
    let env = Env::new();
    env.write("index.html", "v1");
    env.publish(&env.options()).expect("first publish");

    let other = env.remote.with_file_name("other.git");
    git(env.remote.parent().unwrap(), &["init", "-q", "--bare", other.to_str().unwrap()]);
    let options = PublishOptions {
        repo: Some(other.to_string_lossy().into_owned()),
        ..env.options()
    };
    let err = env.publish(&options).unwrap_err();
    assert!(matches!(err, SyncError::RemoteMismatch { .. }), "got: {err}");
}

#[test]
fn unmatched_src_fails_before_cloning() {
    let env = Env::new();
    env.write("index.html", "v1");
    let options = PublishOptions {
        src: "*.css".into(),
        ..env.options()
    };
    let err = env.publish(&options).unwrap_err();
    assert!(matches!(err, SyncError::NoFilesMatched));
    assert!(!env.cache.join("checkout").exists());
}

#[test]
fn star_remove_prunes_stale_top_level_files() {
    let env = Env::new();
    env.write("stale.txt", "old");
    env.publish(&env.options()).expect("first publish");
    assert_eq!(env.branch_files("pl-pages"), ["stale.txt"]);

    env.reset_site();
    env.write("a.html", "A");
    env.write("b.txt", "B");
    let options = PublishOptions {
        remove: "*".into(),
        ..env.options()
    };
    env.publish(&options).expect("second publish");

    assert_eq!(env.branch_files("pl-pages"), ["a.html", "b.txt"]);
    assert_eq!(env.remote_git(&["show", "pl-pages:a.html"]), "A");
    assert_eq!(env.remote_git(&["show", "pl-pages:b.txt"]), "B");
    let count = env.remote_git(&["rev-list", "--count", "pl-pages"]);
    assert_eq!(count.trim(), "2", "one commit per publish");
}

#[test]
fn brace_patterns_select_multiple_extensions() {
    let env = Env::new();
    env.write("index.html", "root");
    env.write("style.css", "body{}");
    env.write("notes.md", "skip");
    let options = PublishOptions {
        src: "**/*.{html,css}".into(),
        ..env.options()
    };
    env.publish(&options).expect("publish");

    assert_eq!(env.branch_files("pl-pages"), ["index.html", "style.css"]);
}
