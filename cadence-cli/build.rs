use std::path::{Path, PathBuf};
use std::process::Command;

/// Stamps `CADENCE_BUILD_SHA` for `cadence --version`: the short commit, with
/// `-dirty` when the tree has uncommitted changes, or `unknown` outside git.
fn main() {
    let crate_dir = PathBuf::from(std::env::var_os("CARGO_MANIFEST_DIR").unwrap_or_default());
    let workspace = crate_dir.parent().unwrap_or(&crate_dir).to_path_buf();

    for watched in [".git/HEAD", ".git/index"] {
        let path = workspace.join(watched);
        if path.exists() {
            println!("cargo:rerun-if-changed={}", path.display());
        }
    }

    let stamp = match git_short_sha(&workspace) {
        Some(sha) if is_dirty(&workspace) => format!("{sha}-dirty"),
        Some(sha) => sha,
        None => "unknown".to_string(),
    };
    println!("cargo:rustc-env=CADENCE_BUILD_SHA={stamp}");
}

fn git(root: &Path, args: &[&str]) -> Option<String> {
    let out = Command::new("git").arg("-C").arg(root).args(args).output().ok()?;
    out.status
        .success()
        .then(|| String::from_utf8_lossy(&out.stdout).trim().to_string())
}

fn git_short_sha(root: &Path) -> Option<String> {
    git(root, &["rev-parse", "--short", "HEAD"]).filter(|s| !s.is_empty())
}

fn is_dirty(root: &Path) -> bool {
    git(root, &["status", "--porcelain", "--untracked-files=no"]).is_some_and(|s| !s.is_empty())
}
