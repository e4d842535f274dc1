//! Canonical field names shared by the normalizer, the resolver and the output writer.

// Input fields read by the resolver
pub const FIELD_LINE: &str = "line";
pub const FIELD_DIRECTION: &str = "direction";
pub const FIELD_GOODS_NAME: &str = "goods_name";
pub const FIELD_CONSIGNMENT: &str = "consignment";
pub const FIELD_BOOKING: &str = "booking";
pub const FIELD_ENFORCE_AUTO_TRACKING: &str = "enforce_auto_tracking";

// Output fields written by the resolver
pub const FIELD_TRACKING_SEAPORT: &str = "tracking_seaport";
pub const FIELD_IS_AUTO_TRACKING: &str = "is_auto_tracking";
pub const FIELD_IS_AUTO_TRACKING_OK: &str = "is_auto_tracking_ok";

/// Output fields every enriched row carries, null when the resolver left them alone
pub const OUTPUT_FIELDS: [&str; 3] = [
    FIELD_TRACKING_SEAPORT,
    FIELD_IS_AUTO_TRACKING,
    FIELD_IS_AUTO_TRACKING_OK,
];

// Provenance fields added by the normalizer
pub const FIELD_ORIGINAL_FILE_NAME: &str = "original_file_name";
pub const FIELD_ORIGINAL_FILE_PARSED_ON: &str = "original_file_parsed_on";

// Lookup service defaults (reference deployment)
pub const DEFAULT_TRACKING_HOST: &str = "127.0.0.1";
pub const DEFAULT_TRACKING_PORT: u16 = 8004;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_SECS: u64 = 30;

pub const DEFAULT_REFERENCE_DB_PORT: u16 = 5432;

/// Uppercased token in `goods_name` that marks an empty container move
pub const DEFAULT_EMPTY_CONTAINER_MARKER: &str = "ПОРОЖ";

/// Placeholder written into a missing customs declaration number
pub const GTD_NUMBER_PLACEHOLDER: &str = "Нет данных";

pub const PARSED_ON_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
