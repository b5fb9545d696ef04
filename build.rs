use std::process::{Command, Stdio};

fn main() -> anyhow::Result<()> {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");
    let version = std::env::var("CARGO_PKG_VERSION")?;
    let version_with_git = match git_commit() {
        Some(commit) => {
            println!("cargo:rustc-env=GIT_COMMIT={commit}");
            format!("{version} (commit: {commit})")
        }
        None => version,
    };
    println!("cargo:rustc-env=VERSION_WITH_GIT={version_with_git}");
    Ok(())
}

fn git_commit() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .stderr(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let commit = String::from_utf8(output.stdout).ok()?;
    let commit = commit.trim();
    (!commit.is_empty()).then(|| commit.to_owned())
}
