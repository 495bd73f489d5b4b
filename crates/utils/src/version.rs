use std::sync::LazyLock;

use crate::build_info::BUILD_INFO;

/// Defines the application version.
pub static VERSION: LazyLock<String> = LazyLock::new(|| {
    format_version(
        env!("IMAGE_VERSION"),
        BUILD_INFO.commit_sha1,
        BUILD_INFO.is_dirty(),
    )
});

fn format_version(image_version: &str, commit_sha1: Option<&str>, dirty: bool) -> String {
    let commit = commit_sha1
        .map(|sha| &sha[..sha.len().min(7)])
        .unwrap_or("unknown");
    format!(
        "{image_version}-{commit}{}",
        if dirty { "-dirty" } else { "" }
    )
}
