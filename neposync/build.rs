//! Stamps the neposync binary with the revision it was built from.
//!
//! `main` logs these on startup so a report can be matched to a build:
//! `GIT_HASH` (`git describe`, `-dirty` for uncommitted changes),
//! `BUILD_TIMESTAMP` (RFC 3339, local offset) and `BUILD_PROFILE`.

use std::env;
use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    Some(text.trim().to_string()).filter(|s| !s.is_empty())
}

fn main() {
    let revision = git(&["describe", "--always", "--dirty", "--abbrev=8"])
        .unwrap_or_else(|| "unknown".to_string());
    let timestamp = chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, false);
    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    // Re-stamp when HEAD moves; outside a checkout this path simply never changes
    if let Some(head) = git(&["rev-parse", "--git-path", "HEAD"]) {
        println!("cargo:rerun-if-changed={head}");
    }
    println!("cargo:rerun-if-changed=src");

    println!("cargo:rustc-env=GIT_HASH={revision}");
    println!("cargo:rustc-env=BUILD_TIMESTAMP={timestamp}");
    println!("cargo:rustc-env=BUILD_PROFILE={profile}");
}
