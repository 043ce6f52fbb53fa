use std::process::Command;

/// Trimmed stdout of a successful command
fn command_output(program: &str, args: &[&str]) -> Option<String> {
    Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
}

fn main() {
    let commit = command_output("git", &["rev-parse", "--short", "HEAD"]).unwrap_or_else(|| "unknown".into());
    let date = command_output("date", &["+%Y-%m-%d"]).unwrap_or_else(|| "unknown".into());

    // "rustc 1.80.0 (051478957 2024-07-21)" -> "1.80.0"
    let rustc = command_output("rustc", &["--version"])
        .and_then(|s| s.split_whitespace().nth(1).map(str::to_string))
        .unwrap_or_else(|| "unknown".into());

    println!("cargo:rustc-env=EDITHIST_COMMIT_SHA={}", commit);
    println!("cargo:rustc-env=EDITHIST_BUILD_DATE={}", date);
    println!("cargo:rustc-env=EDITHIST_RUSTC_VERSION={}", rustc);

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-env-changed=EDITHIST_COMMIT_SHA");
}
