use std::fmt;

use serde::{Deserialize, Serialize};

/// Class of a URL: `0` is safe, `1` is phishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Safe,
    Phishing,
}

impl Label {
    /// Parse a CSV label cell. Accepts `0`/`1` and their float spellings.
    pub fn parse_cell(cell: &str) -> Option<Self> {
        let value: f64 = cell.trim().parse().ok()?;
        if value == 0.0 {
            Some(Label::Safe)
        } else if value == 1.0 {
            Some(Label::Phishing)
        } else {
            None
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Label::Safe => 0,
            Label::Phishing => 1,
        }
    }

    pub fn display(self) -> &'static str {
        match self {
            Label::Safe => "Safe ✅",
            Label::Phishing => "Phishing 🚨",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display())
    }
}
