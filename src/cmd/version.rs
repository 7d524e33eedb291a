//! Build identity captured by `build.rs` at compile time.

pub fn run() {
    println!("Tag: {}", env!("NETCONFD_GIT_TAG"));
    println!("Branch: {}", env!("NETCONFD_GIT_BRANCH"));
    println!("Commit: {}", env!("NETCONFD_GIT_COMMIT"));
    println!("Dirty: {}", env!("NETCONFD_GIT_DIRTY"));
}
