use serde::{Deserialize, Serialize};

use super::Validation;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    En,
    Ar,
}

impl Lang {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lang::En => "en",
            Lang::Ar => "ar",
        }
    }

    pub fn other(&self) -> Lang {
        match self {
            Lang::En => Lang::Ar,
            Lang::Ar => Lang::En,
        }
    }

    /// Unknown or missing values fall back to English.
    pub fn from_param(raw: Option<&str>) -> Lang {
        match raw.map(|s| s.trim().to_ascii_lowercase()) {
            Some(s) if s.starts_with("ar") => Lang::Ar,
            _ => Lang::En,
        }
    }
}

/// `?lang=` on list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct LangQuery {
    pub lang: Option<String>,
}

impl LangQuery {
    pub fn lang(&self) -> Lang {
        Lang::from_param(self.lang.as_deref())
    }
}

/// A translatable attribute stored as `{en, ar}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bilingual {
    #[serde(default)]
    pub en: String,
    #[serde(default)]
    pub ar: String,
}

impl Bilingual {
    pub fn new(en: impl Into<String>, ar: impl Into<String>) -> Self {
        Self {
            en: en.into(),
            ar: ar.into(),
        }
    }

    fn side(&self, lang: Lang) -> &str {
        match lang {
            Lang::En => &self.en,
            Lang::Ar => &self.ar,
        }
    }

    /// The requested side, or the other side when the requested one is blank.
    pub fn get(&self, lang: Lang) -> &str {
        let preferred = self.side(lang);
        if preferred.trim().is_empty() {
            self.side(lang.other())
        } else {
            preferred
        }
    }

    /// Case-insensitive match of `needle` at the start of a word in the side
    /// shown for `lang`, so "A" finds "Villa A" but not "Villa B".
    pub fn matches(&self, needle: &str, lang: Lang) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        let hay = self.get(lang).to_lowercase();
        let mut at_word_start = true;
        for (i, c) in hay.char_indices() {
            if at_word_start && hay[i..].starts_with(&needle) {
                return true;
            }
            at_word_start = c.is_whitespace();
        }
        false
    }

    /// Builds a value from an `*En`/`*Ar` form pair, both sides required.
    pub fn from_pair(
        v: &mut Validation,
        path: &str,
        en: Option<&str>,
        ar: Option<&str>,
    ) -> Option<Bilingual> {
        let en = v.required_text(&format!("{}.en", path), en);
        let ar = v.required_text(&format!("{}.ar", path), ar);
        Some(Bilingual::new(en?, ar?))
    }
}
