use std::env;
use std::process::Command;

/// Trimmed stdout of a command, if it ran and succeeded
fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn set_env(key: &str, value: &str) {
    println!("cargo:rustc-env={}={}", key, value);
}

fn repository_version() -> String {
    env::var("SECM_BUILD_REF")
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| command_output("git", &["describe", "--always", "--dirty", "--tags"]))
        .or_else(|| env::var("CARGO_PKG_VERSION").ok())
        .unwrap_or_else(|| "unknown".to_string())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=../../.git/HEAD");
    println!("cargo:rerun-if-env-changed=SECM_BUILD_REF");

    let unknown = || "unknown".to_string();

    set_env("BUILD_PROFILE", &env::var("PROFILE").unwrap_or_else(|_| unknown()));
    set_env("REPO_VERSION", &repository_version());
    set_env("BUILD_TIMESTAMP", &chrono::Utc::now().to_rfc3339());
    set_env(
        "RUST_VERSION",
        &command_output("rustc", &["--version"]).unwrap_or_else(unknown),
    );
    set_env("BUILD_TARGET", &env::var("TARGET").unwrap_or_else(|_| unknown()));
}
