use std::fmt;

/// Lifecycle of a database instance: `Closed -> Opening -> Open -> Closing -> Closed`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum DatabaseState {
    Closed = 0,
    Opening = 1,
    Open = 2,
    Closing = 3,
}

impl DatabaseState {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(DatabaseState::Closed),
            1 => Some(DatabaseState::Opening),
            2 => Some(DatabaseState::Open),
            3 => Some(DatabaseState::Closing),
            _ => None,
        }
    }

    pub fn is_open(self) -> bool {
        self == DatabaseState::Open
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DatabaseState::Closed => "closed",
            DatabaseState::Opening => "opening",
            DatabaseState::Open => "open",
            DatabaseState::Closing => "closing",
        }
    }
}

impl fmt::Display for DatabaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
