//! Output languages offered to the user.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    English,
    Hindi,
    Telugu,
    Tamil,
}

impl Language {
    pub const ALL: [Language; 4] = [
        Language::English,
        Language::Hindi,
        Language::Telugu,
        Language::Tamil,
    ];

    /// Canonical identifier sent to the analysis service.
    pub fn backend_id(&self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Hindi => "Hindi",
            Self::Telugu => "Telugu",
            Self::Tamil => "Tamil",
        }
    }

    /// Label shown to the user, in the language's own script.
    pub fn native_label(&self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Hindi => "हिंदी",
            Self::Telugu => "తెలుగు",
            Self::Tamil => "தமிழ்",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.backend_id())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Language::ALL
            .into_iter()
            .find(|lang| lang.backend_id().eq_ignore_ascii_case(s) || lang.native_label() == s)
            .ok_or_else(|| {
                let known: Vec<_> = Language::ALL.iter().map(|l| l.backend_id()).collect();
                format!("unknown language '{}', expected one of {:?}", s, known)
            })
    }
}
