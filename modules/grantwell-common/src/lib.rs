pub mod config;
pub mod error;
pub mod fingerprint;
pub mod quality;
pub mod types;

pub use config::Config;
pub use error::IngestError;
pub use fingerprint::{fingerprint, normalize_key};
pub use types::{
    CrawlType, DeadlineInfo, DeadlineType, EligibilityInfo, EntityType, ExtractedGrant,
    FundingInfo, FundingType, GeographyInfo, GrantStatus, LinkStatus, NormalizedGrant,
    ValidationResult,
};
