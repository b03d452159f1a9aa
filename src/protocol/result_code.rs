//! Result codes
//!
//! Codes carried in the result byte of every reply.

/// Result codes surfaced to requesters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResultCode {
    Ok = 0,
    Unknown = 1,
    NotFound = 2,
    Generation = 3,
    Parameter = 4,
    RecordExists = 5,
    Timeout = 9,
    Unavailable = 11,
    KeyBusy = 14,
    Namespace = 20,

    // -------------------------------------------------------------------------
    // Security
    // -------------------------------------------------------------------------
    SecurityNotSupported = 51,
    SecurityNotEnabled = 52,
    InvalidUser = 60,
    NotAuthenticated = 80,
    RoleViolation = 81,
}

impl ResultCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse a result byte; unrecognized values map to `Unknown`
    pub fn from_u8(code: u8) -> Self {
        match code {
            0 => Self::Ok,
            2 => Self::NotFound,
            3 => Self::Generation,
            4 => Self::Parameter,
            5 => Self::RecordExists,
            9 => Self::Timeout,
            11 => Self::Unavailable,
            14 => Self::KeyBusy,
            20 => Self::Namespace,
            51 => Self::SecurityNotSupported,
            52 => Self::SecurityNotEnabled,
            60 => Self::InvalidUser,
            80 => Self::NotAuthenticated,
            81 => Self::RoleViolation,
            _ => Self::Unknown,
        }
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}
