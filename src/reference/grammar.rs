//! Reference grammar for Docker Hub and GHCR image addresses
//!
//! A hand-written structural parser. Every rule fails with its own error so
//! the caller can tell the user exactly which part of the address is wrong:
//!
//! ```text
//! dockerhub := [registry "/"] path [":" tag] ["@" digest]
//! registry  := host [":" port]        ; first segment containing '.' or ':' or "localhost"
//! path      := segment ("/" segment)*  ; at most 255 chars
//! segment   := alnum+ (sep alnum+)*    ; alnum = [a-z0-9], sep = [._-]
//! ghcr      := ["ghcr.io/"] name "/" name [":" tag]
//! tag       := [A-Za-z0-9_] [A-Za-z0-9_.-]{0,127}
//! ```

use super::{
    Dialect, ImageReference, NameError, ReferenceError, TagError, DEFAULT_TAG, GHCR_REGISTRY,
};

pub const REPOSITORY_NAME_MAX_LENGTH: usize = 255;
pub const TAG_MAX_LENGTH: usize = 128;

type Result<T> = std::result::Result<T, ReferenceError>;

/// Validate a tag typed by the user
pub fn validate_tag(tag: &str) -> Result<()> {
    check_tag(tag.trim())
}

/// Validate a tag that may not have been provided at all
pub fn validate_optional_tag(tag: Option<&str>) -> Result<()> {
    match tag {
        Some(tag) => validate_tag(tag),
        None => Err(TagError::Empty.into()),
    }
}

/// Validate a single repository name such as `nginx` or `my.app`. A `/` is
/// an invalid character here; multi-segment paths are only accepted inside
/// image addresses.
pub fn validate_repository_name(name: &str) -> Result<()> {
    check_name(name.trim(), false)
}

/// Validate and parse a full image address for the given source dialect
pub fn validate_image_address(address: &str, dialect: Dialect) -> Result<ImageReference> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(ReferenceError::EmptyAddress);
    }

    let clean = strip_pull_prefix(trimmed);
    if clean.is_empty() {
        return Err(ReferenceError::EmptyAddress);
    }

    match dialect {
        Dialect::DockerHub => parse_docker_hub(clean),
        Dialect::Ghcr => parse_ghcr(clean),
    }
}

/// Source address after the input field loses focus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInput {
    /// Address to put back into the input field
    pub address: String,
    /// Tag to auto-fill as the target tag
    pub suggested_tag: String,
    pub reference: ImageReference,
}

/// Normalize a pasted source address, filling in `latest` when no tag was given
pub fn normalize_source_input(text: &str, dialect: Dialect) -> Result<SourceInput> {
    let reference = validate_image_address(text, dialect)?;

    if reference.tag_explicit || reference.digest.is_some() {
        return Ok(SourceInput {
            address: reference.full_address.clone(),
            suggested_tag: reference.tag.clone(),
            reference,
        });
    }

    let address = format!("{}:{}", reference.full_address, DEFAULT_TAG);
    let reference = validate_image_address(&address, dialect)?;
    Ok(SourceInput {
        address,
        suggested_tag: DEFAULT_TAG.to_string(),
        reference,
    })
}

/// Strip a leading `docker pull ` (any whitespace between the words)
fn strip_pull_prefix(input: &str) -> &str {
    let Some(rest) = input.strip_prefix("docker") else {
        return input;
    };
    if !rest.starts_with(char::is_whitespace) {
        return input;
    }
    let Some(rest) = rest.trim_start().strip_prefix("pull") else {
        return input;
    };
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return input;
    }
    rest.trim_start()
}

/// Split `name[:tag]`, only treating a colon after the last slash as a tag separator
fn split_tag(input: &str) -> (&str, Option<&str>) {
    let last_slash = input.rfind('/');
    match input.rfind(':') {
        Some(colon) if last_slash.is_none_or(|slash| colon > slash) => {
            (&input[..colon], Some(&input[colon + 1..]))
        }
        _ => (input, None),
    }
}

fn parse_docker_hub(clean: &str) -> Result<ImageReference> {
    let (rest, digest) = match clean.split_once('@') {
        Some((rest, digest)) => {
            check_digest(digest)?;
            (rest, Some(digest.to_string()))
        }
        None => (clean, None),
    };

    let (name, tag) = split_tag(rest);
    if let Some(tag) = tag {
        check_tag(tag)?;
    }

    let (registry, path) = match name.split_once('/') {
        Some((first, remainder)) if is_registry_host(first) => {
            check_registry(first)?;
            (first.to_string(), remainder)
        }
        _ => (Dialect::DockerHub.default_registry().to_string(), name),
    };

    if path.is_empty() {
        return Err(ReferenceError::Malformed(clean.to_string()));
    }
    check_repository_path(path)?;

    Ok(ImageReference {
        registry,
        repository: path.to_string(),
        tag: tag.unwrap_or(DEFAULT_TAG).to_string(),
        digest,
        tag_explicit: tag.is_some(),
        full_address: clean.to_string(),
    })
}

fn parse_ghcr(clean: &str) -> Result<ImageReference> {
    let address = clean
        .strip_prefix(GHCR_REGISTRY)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(clean);

    if address.contains('@') {
        return Err(ReferenceError::GhcrMalformed(clean.to_string()));
    }

    let (path, tag) = split_tag(address);
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() != 2 {
        return Err(ReferenceError::GhcrDepth);
    }

    let valid_segment = |segment: &&str| {
        !segment.is_empty()
            && !segment.chars().all(|c| c == '.')
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    };
    if !segments.iter().all(valid_segment) {
        return Err(ReferenceError::GhcrMalformed(clean.to_string()));
    }

    if let Some(tag) = tag {
        check_tag(tag)?;
    }

    Ok(ImageReference {
        registry: GHCR_REGISTRY.to_string(),
        repository: path.to_string(),
        tag: tag.unwrap_or(DEFAULT_TAG).to_string(),
        digest: None,
        tag_explicit: tag.is_some(),
        full_address: clean.to_string(),
    })
}

// Any first segment that looks like a host is a registry, so `Nginx.io/app`
// names registry `Nginx.io` rather than failing the lowercase rule.
fn is_registry_host(segment: &str) -> bool {
    segment.contains('.') || segment.contains(':') || segment == "localhost"
}

fn check_registry(registry: &str) -> Result<()> {
    let (host, port) = match registry.split_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (registry, None),
    };

    let host_ok = !host.is_empty()
        && host.split('.').all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        });
    let port_ok = port.is_none_or(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));

    if host_ok && port_ok {
        Ok(())
    } else {
        Err(ReferenceError::InvalidRegistry(registry.to_string()))
    }
}

fn check_digest(digest: &str) -> Result<()> {
    let valid = match digest.split_once(':') {
        Some((algorithm, encoded)) => {
            !algorithm.is_empty()
                && !encoded.is_empty()
                && algorithm
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '+' | '.' | '_' | '-'))
                && encoded
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '=' | '_' | '-'))
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(ReferenceError::InvalidDigest(digest.to_string()))
    }
}

fn check_tag(tag: &str) -> Result<()> {
    if tag.is_empty() {
        return Err(TagError::Empty.into());
    }
    if tag.chars().count() > TAG_MAX_LENGTH {
        return Err(TagError::TooLong { max: TAG_MAX_LENGTH }.into());
    }

    let mut chars = tag.chars();
    let first_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if !(first_ok && rest_ok) {
        return Err(TagError::Malformed.into());
    }

    Ok(())
}

fn is_separator(c: char) -> bool {
    matches!(c, '.' | '_' | '-')
}

fn check_repository_path(path: &str) -> Result<()> {
    check_name(path, true)
}

fn check_name(path: &str, nested: bool) -> Result<()> {
    if path.is_empty() {
        return Err(NameError::Empty.into());
    }
    if path.chars().count() > REPOSITORY_NAME_MAX_LENGTH {
        return Err(NameError::TooLong {
            max: REPOSITORY_NAME_MAX_LENGTH,
        }
        .into());
    }
    if path.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(NameError::Uppercase.into());
    }
    let allowed = |c: char| {
        c.is_ascii_lowercase() || c.is_ascii_digit() || is_separator(c) || (nested && c == '/')
    };
    if !path.chars().all(allowed) {
        return Err(NameError::InvalidCharacters.into());
    }

    for segment in path.split('/') {
        check_segment(segment)?;
    }
    Ok(())
}

fn check_segment(segment: &str) -> Result<()> {
    if segment.is_empty() {
        return Err(NameError::EmptySegment.into());
    }
    if segment.starts_with(is_separator) || segment.ends_with(is_separator) {
        return Err(NameError::BoundarySeparator.into());
    }

    let doubled = segment
        .as_bytes()
        .windows(2)
        .any(|pair| is_separator(pair[0] as char) && is_separator(pair[1] as char));
    if doubled {
        return Err(NameError::ConsecutiveSeparators.into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docker(address: &str) -> Result<ImageReference> {
        validate_image_address(address, Dialect::DockerHub)
    }

    fn ghcr(address: &str) -> Result<ImageReference> {
        validate_image_address(address, Dialect::Ghcr)
    }

    #[test]
    fn test_validate_tag_rules() {
        assert!(validate_tag("latest").is_ok());
        assert!(validate_tag("_build.1-rc").is_ok());
        assert!(validate_tag(&"a".repeat(128)).is_ok());

        assert_eq!(validate_tag(""), Err(TagError::Empty.into()));
        assert_eq!(validate_tag("   "), Err(TagError::Empty.into()));
        assert_eq!(validate_optional_tag(None), Err(TagError::Empty.into()));
        assert_eq!(
            validate_tag(&"a".repeat(129)),
            Err(TagError::TooLong { max: 128 }.into())
        );
        assert_eq!(validate_tag(".hidden"), Err(TagError::Malformed.into()));
        assert_eq!(validate_tag("v1+build"), Err(TagError::Malformed.into()));
    }

    #[test]
    fn test_validate_repository_name_distinct_errors() {
        assert!(validate_repository_name("nginx").is_ok());
        assert!(validate_repository_name("my.app_v2-x").is_ok());
        assert_eq!(
            validate_repository_name("bitnami/redis"),
            Err(NameError::InvalidCharacters.into())
        );

        assert_eq!(validate_repository_name(""), Err(NameError::Empty.into()));
        assert_eq!(
            validate_repository_name(&"a".repeat(256)),
            Err(NameError::TooLong { max: 255 }.into())
        );
        assert_eq!(validate_repository_name("Nginx"), Err(NameError::Uppercase.into()));
        assert_eq!(
            validate_repository_name("ng!nx"),
            Err(NameError::InvalidCharacters.into())
        );
        assert_eq!(
            validate_repository_name("-nginx"),
            Err(NameError::BoundarySeparator.into())
        );
        assert_eq!(
            validate_repository_name("nginx."),
            Err(NameError::BoundarySeparator.into())
        );
        assert_eq!(
            validate_repository_name("ng__inx"),
            Err(NameError::ConsecutiveSeparators.into())
        );
        assert_eq!(
            validate_repository_name("ng.-inx"),
            Err(NameError::ConsecutiveSeparators.into())
        );
        assert_eq!(
            validate_repository_name("a//b"),
            Err(NameError::InvalidCharacters.into())
        );
        assert_eq!(docker("a//b"), Err(NameError::EmptySegment.into()));
    }

    #[test]
    fn test_image_address_shares_repository_cause() {
        for bad in ["Nginx", "ng!nx", "-nginx", "nginx_", "ng..inx"] {
            let name_err = validate_repository_name(bad).unwrap_err();
            let image_err = docker(&format!("{}:1.0", bad)).unwrap_err();
            assert_eq!(name_err, image_err, "cause mismatch for {}", bad);
        }
    }

    #[test]
    fn test_docker_pull_prefix_keeps_explicit_tag() {
        let parsed = docker("docker pull nginx:alpine").unwrap();
        assert_eq!(parsed.repository, "nginx");
        assert_eq!(parsed.tag, "alpine");
        assert!(parsed.tag_explicit);
        assert_eq!(parsed.registry, "docker.io");
        assert_eq!(parsed.full_address, "nginx:alpine");

        let input = normalize_source_input("docker  pull   nginx:alpine", Dialect::DockerHub).unwrap();
        assert_eq!(input.address, "nginx:alpine");
        assert_eq!(input.suggested_tag, "alpine");
    }

    #[test]
    fn test_missing_tag_defaults_to_latest() {
        let parsed = docker("nginx").unwrap();
        assert_eq!(parsed.tag, "latest");
        assert!(!parsed.tag_explicit);

        let input = normalize_source_input("nginx", Dialect::DockerHub).unwrap();
        assert_eq!(input.address, "nginx:latest");
        assert_eq!(input.suggested_tag, "latest");
        assert_eq!(input.reference.tag, "latest");
        assert!(input.reference.tag_explicit);
    }

    #[test]
    fn test_digest_is_not_given_a_tag() {
        let digest = format!("sha256:{}", "a".repeat(64));
        let input = normalize_source_input(&format!("alpine@{}", digest), Dialect::DockerHub).unwrap();
        assert_eq!(input.address, format!("alpine@{}", digest));
        assert_eq!(input.reference.digest.as_deref(), Some(digest.as_str()));
        assert_eq!(input.reference.pull_reference(), format!("alpine@{}", digest));

        assert_eq!(
            docker("alpine@sha256"),
            Err(ReferenceError::InvalidDigest("sha256".to_string()))
        );
    }

    #[test]
    fn test_registry_and_namespace_split() {
        let parsed = docker("bitnami/redis:7.2").unwrap();
        assert_eq!(parsed.registry, "docker.io");
        assert_eq!(parsed.repository, "bitnami/redis");
        assert_eq!(parsed.namespace_and_name(), ("bitnami", "redis"));

        let parsed = docker("localhost:5000/team/app").unwrap();
        assert_eq!(parsed.registry, "localhost:5000");
        assert_eq!(parsed.repository, "team/app");
        assert_eq!(parsed.tag, "latest");
        assert_eq!(parsed.pull_reference(), "localhost:5000/team/app:latest");

        let parsed = docker("quay.io/prometheus/node-exporter:v1.8.0").unwrap();
        assert_eq!(parsed.registry, "quay.io");
        assert_eq!(parsed.repository, "prometheus/node-exporter");

        assert_eq!(docker("nginx").unwrap().namespace_and_name(), ("library", "nginx"));
        assert_eq!(
            docker("registry:abc/app"),
            Err(ReferenceError::InvalidRegistry("registry:abc".to_string()))
        );
    }

    #[test]
    fn test_host_like_first_segment_is_a_registry() {
        let parsed = docker("Nginx.io/app").unwrap();
        assert_eq!(parsed.registry, "Nginx.io");
        assert_eq!(parsed.repository, "app");

        assert_eq!(
            docker("a..b/c"),
            Err(ReferenceError::InvalidRegistry("a..b".to_string()))
        );
        assert_eq!(
            docker("-a.io/c"),
            Err(ReferenceError::InvalidRegistry("-a.io".to_string()))
        );
    }

    #[test]
    fn test_docker_hub_round_trip() {
        let samples = [
            "nginx",
            "nginx:alpine",
            "docker pull bitnami/redis:7.2",
            "  library/ubuntu:22.04  ",
            "localhost:5000/team/app:v1",
            "quay.io/coreos/etcd@sha256:0123456789abcdef",
        ];
        for sample in samples {
            let first = docker(sample).unwrap();
            let second = docker(&first.full_address).unwrap();
            assert_eq!(first, second, "round trip failed for {}", sample);
        }
    }

    #[test]
    fn test_malformed_docker_hub_addresses() {
        assert_eq!(docker("   "), Err(ReferenceError::EmptyAddress));
        assert_eq!(docker("docker pull "), Err(ReferenceError::EmptyAddress));
        assert_eq!(docker("nginx:"), Err(TagError::Empty.into()));
        assert_eq!(docker("nginx:-x"), Err(TagError::Malformed.into()));
        assert_eq!(
            docker("docker.io/"),
            Err(ReferenceError::Malformed("docker.io/".to_string()))
        );
    }

    #[test]
    fn test_ghcr_grammar() {
        let parsed = ghcr("owner/repo").unwrap();
        assert_eq!(parsed.registry, "ghcr.io");
        assert_eq!(parsed.repository, "owner/repo");
        assert_eq!(parsed.tag, "latest");
        assert!(!parsed.tag_explicit);

        let parsed = ghcr("ghcr.io/Owner/repo:v2").unwrap();
        assert_eq!(parsed.repository, "Owner/repo");
        assert_eq!(parsed.tag, "v2");
        assert_eq!(parsed.full_address, "ghcr.io/Owner/repo:v2");
        assert_eq!(ghcr(&parsed.full_address).unwrap(), parsed);
        assert_eq!(parsed.pull_reference(), "ghcr.io/Owner/repo:v2");

        assert_eq!(ghcr("owner/repo/extra"), Err(ReferenceError::GhcrDepth));
        assert_eq!(ghcr("repo"), Err(ReferenceError::GhcrDepth));
        assert_eq!(
            ghcr("owner/"),
            Err(ReferenceError::GhcrMalformed("owner/".to_string()))
        );
        assert_eq!(
            ghcr("owner/repo@sha256:abc"),
            Err(ReferenceError::GhcrMalformed("owner/repo@sha256:abc".to_string()))
        );
        assert_eq!(ghcr("owner/repo:.bad"), Err(TagError::Malformed.into()));
        for dots in ["owner/..", "./repo", "owner/."] {
            assert_eq!(
                ghcr(dots),
                Err(ReferenceError::GhcrMalformed(dots.to_string())),
                "{}",
                dots
            );
        }
    }

    #[test]
    fn test_ghcr_normalization_appends_latest() {
        let input = normalize_source_input("ghcr.io/owner/repo", Dialect::Ghcr).unwrap();
        assert_eq!(input.address, "ghcr.io/owner/repo:latest");
        assert_eq!(input.suggested_tag, "latest");
    }
}
