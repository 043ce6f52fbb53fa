//! Version and build metadata

/// "edithist {version} ({commit} {date}) rustc {rustc}"
pub fn version() -> String {
    format!(
        "edithist {} ({} {}) rustc {}",
        package_version(),
        build_commit(),
        build_date(),
        rustc_version()
    )
}

pub fn package_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Short commit SHA, or "unknown" outside a git checkout
pub fn build_commit() -> &'static str {
    option_env!("EDITHIST_COMMIT_SHA").unwrap_or("unknown")
}

pub fn build_date() -> &'static str {
    option_env!("EDITHIST_BUILD_DATE").unwrap_or("unknown")
}

pub fn rustc_version() -> &'static str {
    option_env!("EDITHIST_RUSTC_VERSION").unwrap_or("unknown")
}
