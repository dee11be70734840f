use std::process::Command;

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Short commit hash from git, or from `GIT_SHA` when building outside a checkout
fn short_sha() -> Option<String> {
    if let Ok(output) = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        && output.status.success()
    {
        let s = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !s.is_empty() {
            return Some(s);
        }
    }
    std::env::var("GIT_SHA").ok().filter(|s| !s.is_empty())
}

fn main() {
    let base = env!("CARGO_PKG_VERSION");

    let version = if env_flag("PRICEWATCH_NIGHTLY") {
        match short_sha() {
            Some(sha) => format!("{}-nightly+{}", base, sha),
            None => format!("{}-nightly", base),
        }
    } else {
        base.to_string()
    };
    println!("cargo:rustc-env=APP_VERSION={}", version);

    println!("cargo:rerun-if-env-changed=PRICEWATCH_NIGHTLY");
    println!("cargo:rerun-if-env-changed=GIT_SHA");
    println!("cargo:rerun-if-changed=.git/HEAD");
}
