//! Selling Partner API endpoint configuration
//!
//! Regional differences are purely configuration: each region has its own API
//! host and a default storefront, while the token exchange is global.
//!
//! # Regions
//!
//! - **North America**: <https://sellingpartnerapi-na.amazon.com>
//! - **Europe**: <https://sellingpartnerapi-eu.amazon.com>
//! - **Far East**: <https://sellingpartnerapi-fe.amazon.com>

use std::fmt;
use std::str::FromStr;

/// Login-with-Amazon token endpoint shared by all regions
pub const LWA_TOKEN_URL: &str = "https://api.amazon.com/auth/o2/token";

/// Reports API version path segment
pub const REPORTS_API_PATH: &str = "/reports/2021-06-30";

/// Constants that differ between regions
#[derive(Debug, Clone)]
pub struct SpRegionConfig {
    /// API host including scheme
    pub api_base_url: &'static str,
    /// Marketplace used when none is requested
    pub default_marketplace_id: &'static str,
}

/// North America (US storefront default)
pub const NA_CONFIG: SpRegionConfig = SpRegionConfig {
    api_base_url: "https://sellingpartnerapi-na.amazon.com",
    default_marketplace_id: "ATVPDKIKX0DER",
};

/// Europe (UK storefront default)
pub const EU_CONFIG: SpRegionConfig = SpRegionConfig {
    api_base_url: "https://sellingpartnerapi-eu.amazon.com",
    default_marketplace_id: "A1F83G8C2ARO7P",
};

/// Far East (JP storefront default)
pub const FE_CONFIG: SpRegionConfig = SpRegionConfig {
    api_base_url: "https://sellingpartnerapi-fe.amazon.com",
    default_marketplace_id: "A1VC38T7YXB528",
};

/// API region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpRegion {
    /// North America
    #[default]
    NorthAmerica,
    /// Europe
    Europe,
    /// Far East
    FarEast,
}

impl SpRegion {
    /// Region constants
    pub fn config(&self) -> &'static SpRegionConfig {
        match self {
            SpRegion::NorthAmerica => &NA_CONFIG,
            SpRegion::Europe => &EU_CONFIG,
            SpRegion::FarEast => &FE_CONFIG,
        }
    }
}

impl fmt::Display for SpRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SpRegion::NorthAmerica => "na",
            SpRegion::Europe => "eu",
            SpRegion::FarEast => "fe",
        };
        write!(f, "{s}")
    }
}

impl FromStr for SpRegion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "na" => Ok(SpRegion::NorthAmerica),
            "eu" => Ok(SpRegion::Europe),
            "fe" => Ok(SpRegion::FarEast),
            _ => Err(format!("Invalid region: {s}. Valid options: na, eu, fe")),
        }
    }
}

/// Resolved endpoint URLs for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpApiEndpoints {
    token_url: String,
    api_base_url: String,
}

impl SpApiEndpoints {
    /// Endpoints with explicit URLs (tests, sandboxes, proxies)
    pub fn new(token_url: impl Into<String>, api_base_url: impl Into<String>) -> Self {
        Self {
            token_url: token_url.into(),
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Production endpoints for a region
    pub fn for_region(region: SpRegion) -> Self {
        Self::new(LWA_TOKEN_URL, region.config().api_base_url)
    }

    /// Token exchange URL
    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// API host
    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    /// `POST` target for report creation
    pub fn create_report_url(&self) -> String {
        format!("{}{REPORTS_API_PATH}/reports", self.api_base_url)
    }

    /// `GET` target for report status
    pub fn report_url(&self, report_id: &str) -> String {
        format!("{}{REPORTS_API_PATH}/reports/{report_id}", self.api_base_url)
    }

    /// `GET` target for document metadata
    pub fn document_url(&self, document_id: &str) -> String {
        format!(
            "{}{REPORTS_API_PATH}/documents/{document_id}",
            self.api_base_url
        )
    }
}
