/// Quality score contributions per validator check. Additive, max 100.
pub const SCORE_TITLE: u8 = 15;
pub const SCORE_SPONSOR: u8 = 10;
pub const SCORE_DESCRIPTION: u8 = 15;
pub const SCORE_URL_LIVE: u8 = 10;
pub const SCORE_DEADLINE: u8 = 10;
pub const SCORE_FUNDING: u8 = 15;
pub const SCORE_ELIGIBILITY: u8 = 15;
pub const SCORE_GEOGRAPHY: u8 = 10;

/// Penalties.
pub const PENALTY_EXPIRED_DEADLINE: u8 = 20;
pub const PENALTY_DEAD_URL: u8 = 10;

/// A candidate with no critical errors is valid only at or above this score.
pub const MIN_QUALITY_SCORE: u8 = 30;

/// Minimum description length counted as "has description".
pub const MIN_DESCRIPTION_LEN: usize = 50;

/// Quality score below which the eligibility engine's DATA_QUALITY filter fails.
pub const ELIGIBILITY_MIN_QUALITY: u8 = 30;
/// Quality score above which DATA_QUALITY passes at high confidence.
pub const ELIGIBILITY_SOLID_QUALITY: u8 = 60;

/// Records not verified within this many days are re-probed by link verification.
pub const LINK_VERIFY_STALE_DAYS: i64 = 7;
