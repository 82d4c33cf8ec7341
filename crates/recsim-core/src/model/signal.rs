use core::fmt;
use serde::{Deserialize, Serialize};

/// Binary feedback observed after a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Disliked = 0,
    Liked = 1,
}

impl Signal {
    pub const fn from_bit(bit: u8) -> Option<Self> {
        match bit {
            0 => Some(Signal::Disliked),
            1 => Some(Signal::Liked),
            _ => None,
        }
    }

    pub const fn as_bit(self) -> u8 {
        self as u8
    }

    pub const fn is_like(self) -> bool {
        matches!(self, Signal::Liked)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Signal::Disliked => "disliked",
            Signal::Liked => "liked",
        }
    }
}

impl From<bool> for Signal {
    fn from(liked: bool) -> Self {
        if liked { Signal::Liked } else { Signal::Disliked }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
