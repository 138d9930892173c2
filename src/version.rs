//! Build information

use serde::Serialize;
use utoipa::ToSchema;

/// Build info reported by `/v1/version`.
#[derive(Debug, Serialize, ToSchema)]
pub struct VersionInfo {
    pub service: &'static str,
    pub language: &'static str,
    pub version: &'static str,
    pub revision: Option<&'static str>,
    pub build_time: Option<&'static str>,
}

/// Static build info; revision and build time come from build.rs.
pub fn version_info() -> VersionInfo {
    VersionInfo {
        service: "time-ledger-sim",
        language: "rust",
        version: env!("CARGO_PKG_VERSION"),
        revision: option_env!("GIT_HASH"),
        build_time: option_env!("BUILD_TIME"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info_shape() {
        let v = version_info();
        assert_eq!(v.service, "time-ledger-sim");
        assert_eq!(v.language, "rust");
        assert!(!v.version.is_empty());
    }
}
