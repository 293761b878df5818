use std::fmt;

/// Machine-readable error codes for scripts and agents driving `moda`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    ItemNotFound,
    UnknownLevel,
    InvalidEnumValue,
    InvalidImportRecord,
    HealthCheckRejected,
    InvalidCacheKey,
    NotRollupItem,
    CorruptStore,
    InternalUnexpected,
}

impl ErrorCode {
    pub const ALL: [Self; 11] = [
        Self::NotInitialized,
        Self::ConfigParseError,
        Self::ItemNotFound,
        Self::UnknownLevel,
        Self::InvalidEnumValue,
        Self::InvalidImportRecord,
        Self::HealthCheckRejected,
        Self::InvalidCacheKey,
        Self::NotRollupItem,
        Self::CorruptStore,
        Self::InternalUnexpected,
    ];

    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::ItemNotFound => "E2001",
            Self::UnknownLevel => "E2002",
            Self::InvalidEnumValue => "E2003",
            Self::InvalidImportRecord => "E2004",
            Self::HealthCheckRejected => "E2005",
            Self::InvalidCacheKey => "E2006",
            Self::NotRollupItem => "E2007",
            Self::CorruptStore => "E3001",
            Self::InternalUnexpected => "E9001",
        }
    }

    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Store not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::ItemNotFound => "Work item not found",
            Self::UnknownLevel => "Unknown backlog level",
            Self::InvalidEnumValue => "Invalid tier/status/health value",
            Self::InvalidImportRecord => "Invalid import record",
            Self::HealthCheckRejected => "Health check rejected",
            Self::InvalidCacheKey => "Invalid cache key request",
            Self::NotRollupItem => "Item cannot seed a rollup",
            Self::CorruptStore => "Corrupt SQLite store",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Remediation hint surfaced next to the error.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `moda init` in the project root."),
            Self::ConfigParseError => Some("Fix syntax in .moda/config.toml and retry."),
            Self::ItemNotFound => Some("Check the id with `moda rollup --json`; removed items are hidden."),
            Self::UnknownLevel => Some("Declare the level under [[levels]] and rerun `moda init`."),
            Self::InvalidEnumValue => None,
            Self::InvalidImportRecord => Some("Each input line must be one JSON work item."),
            Self::HealthCheckRejected => {
                Some("Health checks must be reported after the latest existing check.")
            }
            Self::InvalidCacheKey => Some("Namespace and operation must not be blank."),
            Self::NotRollupItem => Some("Roll up from a Portfolio or Requirement item, e.g. its parent."),
            Self::CorruptStore => Some("Delete .moda/moda.db, rerun `moda init` and re-import."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
