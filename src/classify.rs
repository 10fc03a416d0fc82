//! Region and trust classification
//!
//! Both classifiers run exactly once per registration. Region assignment is
//! a deterministic placeholder, not geolocation: the contract is that the
//! same origin address always lands in the same tag and that public
//! addresses spread roughly evenly across the tag set.

use std::net::IpAddr;

use crate::types::{AppVariant, Classification, ClientMetadata, TrustLevel};

/// Region tag for loopback/private/link-local origins
pub const LOCAL_REGION: &str = "local";

/// Fixed set of region tags for public origins
pub const REGION_TAGS: [&str; 6] = [
    "us-east",
    "us-west",
    "eu-west",
    "eu-central",
    "ap-southeast",
    "ap-northeast",
];

/// Bundle identifiers of official Meshwave builds
pub const OFFICIAL_BUNDLE_IDS: [&str; 3] = [
    "io.meshwave.app",
    "io.meshwave.app.beta",
    "io.meshwave.desktop",
];

/// Brand token that marks a derivative build in its app name
pub const BRAND_TOKEN: &str = "meshwave";

/// Derive a region tag from a connection origin address
///
/// Loopback and private ranges map to [`LOCAL_REGION`]; anything else is
/// hashed into [`REGION_TAGS`]. Origins that do not parse as an IP address
/// (hostnames, test strings) go through the hash path as well.
pub fn classify_region(origin: &str) -> &'static str {
    if let Ok(ip) = origin.parse::<IpAddr>() {
        if is_private_origin(ip) {
            return LOCAL_REGION;
        }
    }

    let digest = blake3::hash(origin.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest.as_bytes()[..8]);
    let n = u64::from_le_bytes(prefix);

    REGION_TAGS[(n % REGION_TAGS.len() as u64) as usize]
}

/// Loopback, unspecified, RFC 1918, link-local, and IPv6 unique-local ranges
fn is_private_origin(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

/// Derive a trust classification from client-declared metadata
///
/// Rules are evaluated in order, first match wins:
/// 1. official bundle id -> official/trusted
/// 2. brand token in the app name (case-insensitive) -> fork/semi-trusted
/// 3. everything else -> custom/untrusted
pub fn classify_trust(metadata: &ClientMetadata) -> Classification {
    if OFFICIAL_BUNDLE_IDS.contains(&metadata.bundle_id_or_unknown()) {
        return Classification {
            app_variant: AppVariant::Official,
            trust_level: TrustLevel::Trusted,
            is_official: true,
        };
    }

    if metadata
        .app_name_or_unknown()
        .to_lowercase()
        .contains(BRAND_TOKEN)
    {
        return Classification {
            app_variant: AppVariant::Fork,
            trust_level: TrustLevel::SemiTrusted,
            is_official: false,
        };
    }

    Classification {
        app_variant: AppVariant::Custom,
        trust_level: TrustLevel::Untrusted,
        is_official: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_origins_map_to_local() {
        assert_eq!(classify_region("127.0.0.1"), LOCAL_REGION);
        assert_eq!(classify_region("10.1.2.3"), LOCAL_REGION);
        assert_eq!(classify_region("192.168.1.40"), LOCAL_REGION);
        assert_eq!(classify_region("172.16.0.9"), LOCAL_REGION);
        assert_eq!(classify_region("::1"), LOCAL_REGION);
        assert_eq!(classify_region("fd12:3456::1"), LOCAL_REGION);
    }

    #[test]
    fn test_public_origin_is_deterministic() {
        let first = classify_region("203.0.113.7");
        for _ in 0..10 {
            assert_eq!(classify_region("203.0.113.7"), first);
        }
        assert!(REGION_TAGS.contains(&first));
    }

    #[test]
    fn test_public_origins_spread_across_tags() {
        let mut seen = std::collections::HashSet::new();
        for i in 0..64u8 {
            let tag = classify_region(&format!("198.51.100.{}", i));
            assert_ne!(tag, LOCAL_REGION);
            seen.insert(tag);
        }
        // 64 distinct addresses over 6 tags should hit more than one tag
        assert!(seen.len() > 1);
    }

    #[test]
    fn test_official_bundle_id() {
        let meta = ClientMetadata {
            bundle_id: Some("io.meshwave.app".to_string()),
            ..Default::default()
        };

        let class = classify_trust(&meta);
        assert_eq!(class.app_variant, AppVariant::Official);
        assert_eq!(class.trust_level, TrustLevel::Trusted);
        assert!(class.is_official);
    }

    #[test]
    fn test_brand_token_marks_fork() {
        for name in ["MeshwaveX", "my-MESHWAVE-build", "meshwave lite"] {
            let meta = ClientMetadata {
                app_name: Some(name.to_string()),
                ..Default::default()
            };

            let class = classify_trust(&meta);
            assert_eq!(class.app_variant, AppVariant::Fork);
            assert_eq!(class.trust_level, TrustLevel::SemiTrusted);
            assert!(!class.is_official);
        }
    }

    #[test]
    fn test_unknown_metadata_is_custom() {
        let class = classify_trust(&ClientMetadata::default());
        assert_eq!(class.app_variant, AppVariant::Custom);
        assert_eq!(class.trust_level, TrustLevel::Untrusted);
        assert!(!class.is_official);
    }

    #[test]
    fn test_bundle_id_takes_precedence_over_app_name() {
        let meta = ClientMetadata {
            bundle_id: Some("io.meshwave.desktop".to_string()),
            app_name: Some("meshwave fork".to_string()),
            ..Default::default()
        };

        // First rule wins even though the name would also match rule two
        assert_eq!(classify_trust(&meta).app_variant, AppVariant::Official);
    }
}
