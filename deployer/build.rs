//! Stamps the deployer binary with the commit and build date it was made from

use std::process::Command;

use chrono::Utc;

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    Some(text.trim().to_string()).filter(|s| !s.is_empty())
}

fn main() {
    let commit = git(&["rev-parse", "--short", "HEAD"]).unwrap_or_else(|| "unknown".to_string());
    let dirty = git(&["status", "--porcelain", "--untracked-files=no"]).is_some();
    let commit = if dirty { format!("{commit}-dirty") } else { commit };

    println!("cargo:rustc-env=IMGDEPLOY_GIT_HASH={commit}");
    println!(
        "cargo:rustc-env=IMGDEPLOY_BUILD_DATE={}",
        Utc::now().format("%Y-%m-%dT%H:%M:%SZ")
    );

    if let Some(git_dir) = git(&["rev-parse", "--git-dir"]) {
        println!("cargo:rerun-if-changed={git_dir}/HEAD");
    }
}
