pub mod activity;
pub mod bilingual;
pub mod catalog;
pub mod dashboard;
pub mod notification;
pub mod property;
pub mod review;
pub mod transaction;
pub mod user;

pub use bilingual::{Bilingual, Lang, LangQuery};

use crate::error::ApiError;

/// Collects schema violations for one document, reported the way the
/// admin UI expects them: `"<Model> validation failed: <path>: <reason>, ..."`.
#[derive(Debug)]
pub struct Validation {
    model: &'static str,
    errors: Vec<String>,
}

impl Validation {
    pub fn new(model: &'static str) -> Self {
        Self {
            model,
            errors: Vec::new(),
        }
    }

    fn push(&mut self, path: &str, reason: String) {
        self.errors.push(format!("{}: {}", path, reason));
    }

    pub fn invalid(&mut self, path: &str, reason: &str) {
        self.push(path, reason.to_string());
    }

    pub fn required<T>(&mut self, path: &str, value: Option<T>) -> Option<T> {
        if value.is_none() {
            self.push(path, format!("Path `{}` is required.", path));
        }
        value
    }

    /// Like `required`, but blank strings count as missing.
    pub fn required_text(&mut self, path: &str, value: Option<&str>) -> Option<String> {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() => Some(v.to_string()),
            _ => {
                self.push(path, format!("Path `{}` is required.", path));
                None
            }
        }
    }

    pub fn range_i32(&mut self, path: &str, value: i32, min: i32, max: i32) {
        if value < min {
            self.push(
                path,
                format!(
                    "Path `{}` ({}) is less than minimum allowed value ({}).",
                    path, value, min
                ),
            );
        } else if value > max {
            self.push(
                path,
                format!(
                    "Path `{}` ({}) is more than maximum allowed value ({}).",
                    path, value, max
                ),
            );
        }
    }

    pub fn min_f64(&mut self, path: &str, value: f64, min: f64) {
        if !value.is_finite() || value < min {
            self.push(
                path,
                format!(
                    "Path `{}` ({}) is less than minimum allowed value ({}).",
                    path, value, min
                ),
            );
        }
    }

    /// Parses a numeric form field, recording a cast error on failure.
    pub fn parse_number<N: std::str::FromStr>(&mut self, path: &str, raw: &str) -> Option<N> {
        match raw.trim().parse::<N>() {
            Ok(n) => Some(n),
            Err(_) => {
                self.push(
                    path,
                    format!(
                        "Cast to Number failed for value \"{}\" (type string) at path \"{}\"",
                        raw, path
                    ),
                );
                None
            }
        }
    }

    /// Parses an enum-valued field, recording the Mongoose-style enum error.
    pub fn parse_enum<E: std::str::FromStr>(&mut self, path: &str, raw: &str) -> Option<E> {
        match raw.parse::<E>() {
            Ok(v) => Some(v),
            Err(_) => {
                self.push(
                    path,
                    format!("`{}` is not a valid enum value for path `{}`.", raw, path),
                );
                None
            }
        }
    }

    pub fn finish(self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(format!(
                "{} validation failed: {}",
                self.model,
                self.errors.join(", ")
            )))
        }
    }
}

/// Declares a lowercase string enum with `FromStr`/`as_str`.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = ();

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(()),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use string_enum;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_all_violations_in_order() {
        let mut v = Validation::new("Review");
        v.range_i32("rating", 0, 1, 5);
        v.required::<String>("user_id", None);
        match v.finish() {
            Err(ApiError::Validation(msg)) => assert_eq!(
                msg,
                "Review validation failed: rating: Path `rating` (0) is less than minimum allowed value (1)., \
                 user_id: Path `user_id` is required."
            ),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn blank_text_is_missing() {
        let mut v = Validation::new("City");
        assert_eq!(v.required_text("name.en", Some("   ")), None);
        assert!(v.finish().is_err());
    }
}
