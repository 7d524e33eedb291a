use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    emit("NETCONFD_GIT_COMMIT", &["rev-parse", "HEAD"], "unknown");
    emit(
        "NETCONFD_GIT_BRANCH",
        &["rev-parse", "--abbrev-ref", "HEAD"],
        "unknown",
    );
    emit(
        "NETCONFD_GIT_TAG",
        &["describe", "--tags", "--abbrev=0"],
        "none",
    );

    let dirty = Command::new("git")
        .args(["diff-index", "--quiet", "HEAD", "--"])
        .status()
        .map(|status| !status.success())
        .unwrap_or(false);
    println!("cargo:rustc-env=NETCONFD_GIT_DIRTY={}", dirty);
}

fn emit(key: &str, args: &[&str], fallback: &str) {
    let value = Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| fallback.to_string());
    println!("cargo:rustc-env={}={}", key, value);
}
