//! Target platform names.

/// Platform names accepted in `platforms` lists.
pub const KNOWN_PLATFORMS: &[&str] = &[
    "linux-64",
    "linux-32",
    "linux-aarch64",
    "linux-armv7l",
    "linux-ppc64le",
    "linux-s390x",
    "osx-64",
    "osx-arm64",
    "win-64",
    "win-32",
    "win-arm64",
    "noarch",
];

const DEFAULT_PLATFORMS: &[&str] = &["linux-64", "osx-64", "osx-arm64", "win-64"];

/// The platform this binary runs on.
pub fn current_platform() -> &'static str {
    if cfg!(all(target_os = "linux", target_arch = "x86_64")) {
        "linux-64"
    } else if cfg!(all(target_os = "linux", target_arch = "aarch64")) {
        "linux-aarch64"
    } else if cfg!(all(target_os = "linux", target_arch = "x86")) {
        "linux-32"
    } else if cfg!(all(target_os = "linux", target_arch = "powerpc64")) {
        "linux-ppc64le"
    } else if cfg!(all(target_os = "linux", target_arch = "s390x")) {
        "linux-s390x"
    } else if cfg!(all(target_os = "linux", target_arch = "arm")) {
        "linux-armv7l"
    } else if cfg!(all(target_os = "macos", target_arch = "aarch64")) {
        "osx-arm64"
    } else if cfg!(target_os = "macos") {
        "osx-64"
    } else if cfg!(all(target_os = "windows", target_arch = "aarch64")) {
        "win-arm64"
    } else if cfg!(all(target_os = "windows", target_arch = "x86")) {
        "win-32"
    } else if cfg!(target_os = "windows") {
        "win-64"
    } else {
        "noarch"
    }
}

/// Platforms written into new projects and into specs being locked without any.
pub fn default_platforms() -> Vec<String> {
    DEFAULT_PLATFORMS.iter().map(|p| (*p).to_string()).collect()
}

/// [`default_platforms`] plus the current platform when it is not one of them.
pub fn default_platforms_with_current() -> Vec<String> {
    let mut platforms = default_platforms();
    let current = current_platform();
    if current != "noarch" && !platforms.iter().any(|p| p == current) {
        platforms.push(current.to_string());
    }
    platforms
}

/// Whether `platform` is a recognized platform name.
pub fn is_known_platform(platform: &str) -> bool {
    KNOWN_PLATFORMS.contains(&platform)
}

/// Problem message for an unrecognized platform.
pub fn unknown_platform_problem(platform: &str, owner: &str) -> String {
    format!(
        "{owner}: unknown platform '{platform}' (known platforms: {})",
        KNOWN_PLATFORMS.join(", ")
    )
}
