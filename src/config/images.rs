//! Static platform to provider-image mapping.
//!
//! Lookup tries the most specific key first: `{name}-{version}`, then
//! `{name}-{major}`, then the bare platform name.

use super::Platform;

/// Known public images, most specific key first within each family.
const IMAGE_IDS: &[(&str, &str)] = &[
    ("ubuntu-14.10", "0766e5df-d60a-4100-ae8c-07f27ec0148f"),
    ("ubuntu-14.04", "28153eac-1bae-4039-8d9f-f8b513241efe"),
    ("ubuntu-12.04", "7a1cf8de-7721-4d56-900b-1e65def2ada5"),
    ("ubuntu", "28153eac-1bae-4039-8d9f-f8b513241efe"),
    ("centos-7", "3ab30cc6-c503-41d3-8a37-106fda7848a7"),
    ("centos-6", "21612eaf-a350-4047-b06f-6bb8a8a7bd99"),
    ("centos", "3ab30cc6-c503-41d3-8a37-106fda7848a7"),
    ("debian-7", "de1ab1f9-044f-41b1-8498-3f0cb9a5fcf4"),
    ("debian", "de1ab1f9-044f-41b1-8498-3f0cb9a5fcf4"),
    ("fedora-21", "6b583a78-a4d7-4f83-ac5e-e13a69a8a9e1"),
    ("fedora-20", "7954d1d8-6465-4d0e-b53d-4016a9e4ed26"),
    ("fedora", "6b583a78-a4d7-4f83-ac5e-e13a69a8a9e1"),
    ("redhat-7", "d354bb4a-5f4b-4c62-b2b3-fbd17e2f1bcc"),
    ("redhat", "d354bb4a-5f4b-4c62-b2b3-fbd17e2f1bcc"),
];

/// Resolves the image identifier for `platform`, or `None` when no key
/// matches.
pub(super) fn lookup(platform: &Platform) -> Option<&'static str> {
    let name = platform.name.to_ascii_lowercase();
    let version = platform.version.trim();
    let major = version.split('.').next().unwrap_or_default();
    let candidates = [
        format!("{name}-{version}"),
        format!("{name}-{major}"),
        name,
    ];

    candidates.iter().find_map(|candidate| find(candidate))
}

fn find(key: &str) -> Option<&'static str> {
    IMAGE_IDS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, id)| *id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ubuntu", "14.04", Some("28153eac-1bae-4039-8d9f-f8b513241efe"))]
    #[case("ubuntu", "12.04", Some("7a1cf8de-7721-4d56-900b-1e65def2ada5"))]
    #[case("centos", "7.1", Some("3ab30cc6-c503-41d3-8a37-106fda7848a7"))]
    #[case("fedora", "99", Some("6b583a78-a4d7-4f83-ac5e-e13a69a8a9e1"))]
    #[case("arch", "2015.1", None)]
    fn lookup_matches_most_specific_key(
        #[case] name: &str,
        #[case] version: &str,
        #[case] expected: Option<&str>,
    ) {
        let platform = Platform::new(name, version);
        assert_eq!(lookup(&platform), expected);
    }

    #[test]
    fn lookup_falls_back_to_bare_name_for_empty_version() {
        let platform = Platform::new("debian", "");
        assert_eq!(lookup(&platform), Some("de1ab1f9-044f-41b1-8498-3f0cb9a5fcf4"));
    }

    #[test]
    fn lookup_is_case_insensitive_on_name() {
        let platform = Platform::new("Ubuntu", "14.04");
        assert_eq!(lookup(&platform), Some("28153eac-1bae-4039-8d9f-f8b513241efe"));
    }
}
