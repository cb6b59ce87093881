/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Block identifiers are opaque strings (UUID v4 for blocks created here).
pub type BlockId = String;
