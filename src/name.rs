//! Server name derivation.
//!
//! Names are built from four dash-joined components: the instance label, the
//! OS login (or a placeholder), the local hostname, and a short random
//! suffix. The provider caps names at 63 characters, so over-long components
//! are shortened while the three separators are always kept.

use uuid::Uuid;

const MAX_NAME_LENGTH: usize = 63;
const LOGIN_PLACEHOLDER: &str = "nologin";
const SUFFIX_LENGTH: usize = 8;

/// Derives a server name from the given identity inputs.
///
/// Deterministic for a fixed login and hostname except for the random
/// suffix. The result is at most 63 characters, carries no `.`, and contains
/// exactly three `-` separators.
#[must_use]
pub fn generate(instance_label: &str, login: Option<&str>, hostname: &str) -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(SUFFIX_LENGTH)
        .collect();
    build(instance_label, login, hostname, &suffix)
}

/// Deterministic core of [`generate`], with the suffix supplied by the
/// caller.
fn build(instance_label: &str, login: Option<&str>, hostname: &str, suffix: &str) -> String {
    let mut components = [
        sanitize(instance_label),
        sanitize(login.unwrap_or(LOGIN_PLACEHOLDER)),
        sanitize(hostname),
        sanitize(suffix),
    ];
    let separators = components.len() - 1;

    while components.iter().map(String::len).sum::<usize>() + separators > MAX_NAME_LENGTH {
        if let Some(longest) = components.iter_mut().max_by_key(|component| component.len()) {
            longest.pop();
        }
    }

    components.join("-")
}

/// Strips `.` and cuts the component at its first `-` so internal hyphens
/// never multiply the separator count.
fn sanitize(component: &str) -> String {
    component
        .split('-')
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|&ch| ch != '.')
        .collect()
}
