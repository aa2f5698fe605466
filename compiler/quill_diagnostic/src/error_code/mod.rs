//! Error codes for conformance diagnostics.
//!
//! Codes are stable identifiers used for documentation lookups. The
//! conformance checker owns the `E4xxx` range; `W4xxx` codes are warnings.

use std::fmt;

/// Error codes for conformance diagnostics.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub enum ErrorCode {
    /// Type does not conform to protocol
    E4001,
    /// Candidate witness has the wrong signature
    E4002,
    /// Candidate witness has the wrong argument labels
    E4003,
    /// Witness is less accessible than the requirement demands
    E4004,
    /// Witness setter is less accessible than the requirement demands
    E4005,
    /// Witness is introduced after the conformance's availability
    E4006,
    /// Witness is marked unavailable
    E4007,
    /// Witness isolation differs from the requirement's
    E4008,
    /// Non-final class witness returns the class instead of `Self`
    E4009,
    /// Requirement uses `Self` in a position a non-final class cannot satisfy
    E4010,
    /// Initializer witness in a non-final class must be `required`
    E4011,
    /// Associated type witness violates the protocol's constraints
    E4012,

    // Warnings (W4xxx)
    /// Candidate nearly matched a requirement satisfied another way
    W4001,
    /// Witness isolation differs from the requirement's (non-strict mode)
    W4002,
}

impl ErrorCode {
    /// All codes, in numeric order.
    pub const ALL: &'static [ErrorCode] = &[
        ErrorCode::E4001,
        ErrorCode::E4002,
        ErrorCode::E4003,
        ErrorCode::E4004,
        ErrorCode::E4005,
        ErrorCode::E4006,
        ErrorCode::E4007,
        ErrorCode::E4008,
        ErrorCode::E4009,
        ErrorCode::E4010,
        ErrorCode::E4011,
        ErrorCode::E4012,
        ErrorCode::W4001,
        ErrorCode::W4002,
    ];

    /// Get the string representation of this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E4001 => "E4001",
            ErrorCode::E4002 => "E4002",
            ErrorCode::E4003 => "E4003",
            ErrorCode::E4004 => "E4004",
            ErrorCode::E4005 => "E4005",
            ErrorCode::E4006 => "E4006",
            ErrorCode::E4007 => "E4007",
            ErrorCode::E4008 => "E4008",
            ErrorCode::E4009 => "E4009",
            ErrorCode::E4010 => "E4010",
            ErrorCode::E4011 => "E4011",
            ErrorCode::E4012 => "E4012",
            ErrorCode::W4001 => "W4001",
            ErrorCode::W4002 => "W4002",
        }
    }

    /// Check if this is a warning code (W-prefix).
    pub fn is_warning(&self) -> bool {
        matches!(self, ErrorCode::W4001 | ErrorCode::W4002)
    }

    /// One-line summary for `--explain` style listings.
    pub fn summary(&self) -> &'static str {
        match self {
            ErrorCode::E4001 => "type does not conform to protocol",
            ErrorCode::E4002 => "witness has the wrong signature",
            ErrorCode::E4003 => "witness has the wrong argument labels",
            ErrorCode::E4004 => "witness is not accessible enough",
            ErrorCode::E4005 => "witness setter is not accessible enough",
            ErrorCode::E4006 => "witness is not available early enough",
            ErrorCode::E4007 => "witness is unavailable",
            ErrorCode::E4008 | ErrorCode::W4002 => "witness isolation does not match",
            ErrorCode::E4009 => "non-final class witness must return `Self`",
            ErrorCode::E4010 => "requirement cannot be satisfied by a non-final class",
            ErrorCode::E4011 => "initializer must be `required`",
            ErrorCode::E4012 => "associated type does not satisfy constraints",
            ErrorCode::W4001 => "candidate nearly matches requirement",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
