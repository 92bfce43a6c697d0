//! Output-language directory: codes, display names, and the default rotation.

pub mod cycle;

pub use cycle::{LanguageCycler, LanguageSwitch};

/// The ordered rotation offered to users: English, Telugu, Hindi, Tamil,
/// Malayalam, Korean, Japanese.
pub fn default_cycle() -> Vec<String> {
    ["en", "te", "hi", "ta", "ml", "ko", "ja"]
        .map(String::from)
        .to_vec()
}

/// Human-readable name for an ISO 639-1 code.
///
/// Total over all inputs: codes outside the curated rotation fall back to a
/// generic directory of common languages, and unknown codes come back
/// verbatim — never an error.
pub fn display_name(code: &str) -> String {
    let code = code.to_lowercase();
    match code.as_str() {
        "en" => "English",
        "te" => "Telugu",
        "hi" => "Hindi",
        "ta" => "Tamil",
        "ml" => "Malayalam",
        "ko" => "Korean",
        "ja" => "Japanese",
        other => return generic_display_name(other),
    }
    .to_string()
}

fn generic_display_name(code: &str) -> String {
    match code {
        "ar" => "Arabic",
        "bn" => "Bengali",
        "de" => "German",
        "es" => "Spanish",
        "fr" => "French",
        "gu" => "Gujarati",
        "it" => "Italian",
        "kn" => "Kannada",
        "mr" => "Marathi",
        "nl" => "Dutch",
        "pa" => "Punjabi",
        "pt" => "Portuguese",
        "ru" => "Russian",
        "ur" => "Urdu",
        "zh" => "Chinese",
        other => return other.to_string(),
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curated_codes_have_names() {
        assert_eq!(display_name("en"), "English");
        assert_eq!(display_name("te"), "Telugu");
        assert_eq!(display_name("ml"), "Malayalam");
        assert_eq!(display_name("ja"), "Japanese");
    }

    #[test]
    fn codes_outside_the_rotation_use_the_generic_directory() {
        assert_eq!(display_name("fr"), "French");
        assert_eq!(display_name("kn"), "Kannada");
    }

    #[test]
    fn unknown_codes_come_back_verbatim() {
        assert_eq!(display_name("xx"), "xx");
        assert_eq!(display_name("zz-alt"), "zz-alt");
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(display_name("EN"), "English");
        assert_eq!(display_name("Ta"), "Tamil");
    }

    #[test]
    fn default_cycle_is_the_seven_language_rotation() {
        let cycle = default_cycle();
        assert_eq!(cycle.len(), 7);
        assert_eq!(cycle[0], "en");
        assert_eq!(cycle[6], "ja");
    }
}
