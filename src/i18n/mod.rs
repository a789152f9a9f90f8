use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

pub const DEFAULT_LANGUAGE: &str = "en";

static TRANSLATIONS: OnceLock<HashMap<String, Value>> = OnceLock::new();

fn load_translations() -> HashMap<String, Value> {
    let mut translations = HashMap::new();

    for (language, raw) in [("en", include_str!("en.json")), ("hi", include_str!("hi.json"))] {
        match serde_json::from_str(raw) {
            Ok(value) => {
                translations.insert(language.to_string(), value);
            }
            Err(e) => tracing::error!("Failed to parse {}.json: {}", language, e),
        }
    }

    translations
}

fn get_nested_value<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let mut current = value;

    for part in key.split('.') {
        match current {
            Value::Object(map) => {
                current = map.get(part)?;
            }
            _ => return None,
        }
    }

    Some(current)
}

/// Maps a Telegram `language_code` onto a supported locale.
pub fn resolve_language(language_code: Option<&str>) -> &'static str {
    match language_code {
        Some(code) if code == "hi" || code.starts_with("hi-") => "hi",
        _ => DEFAULT_LANGUAGE,
    }
}

pub fn t(language: &str, path: &str) -> String {
    let translations = TRANSLATIONS.get_or_init(load_translations);

    let lookup = |lang: &str| {
        translations
            .get(lang)
            .and_then(|value| get_nested_value(value, path))
            .and_then(|value| value.as_str())
    };

    match lookup(language).or_else(|| lookup(DEFAULT_LANGUAGE)) {
        Some(translation) => translation.to_string(),
        None => format!("Message not found: {}", path),
    }
}

/// Fills `{}` placeholders left to right in a single pass, so braces inside an argument stay as
/// they are.
pub fn t_with_args(language: &str, path: &str, args: &[&str]) -> String {
    let template = t(language, path);
    let mut message = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut rest = template.as_str();

    while let Some(pos) = rest.find("{}") {
        message.push_str(&rest[..pos]);
        match args.next() {
            Some(arg) => message.push_str(arg),
            None => message.push_str("{}"),
        }
        rest = &rest[pos + 2..];
    }
    message.push_str(rest);

    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_message() {
        assert!(t("en", "common.cancelled").contains("Cancelled"));
        assert!(!t("hi", "common.cancelled").contains("Message not found"));
    }

    #[test]
    fn test_get_message_with_args() {
        let msg = t_with_args("en", "send.progress", &["2", "5"]);
        assert!(msg.contains("(2/5)"));
    }

    #[test]
    fn test_braces_in_arguments_are_not_placeholders() {
        let msg = t_with_args(
            "en",
            "schedule.completed",
            &["7", "https://ngl.link/a{}b", "3", "1"],
        );
        assert!(msg.contains("#7 to https://ngl.link/a{}b was sent"));
        assert!(msg.contains("Successful: 3"));
        assert!(msg.contains("Failed: 1"));
    }

    #[test]
    fn test_missing_arguments_leave_placeholders() {
        let msg = t_with_args("en", "send.progress", &["2"]);
        assert!(msg.contains("(2/{})"));
    }

    #[test]
    fn test_missing_message() {
        assert!(t("en", "nonexistent.key").contains("Message not found"));
    }

    #[test]
    fn test_language_fallback() {
        assert_eq!(t("de", "common.cancelled"), t("en", "common.cancelled"));
    }

    #[test]
    fn test_resolve_language() {
        assert_eq!(resolve_language(Some("hi")), "hi");
        assert_eq!(resolve_language(Some("hi-IN")), "hi");
        assert_eq!(resolve_language(Some("en-US")), "en");
        assert_eq!(resolve_language(None), "en");
    }

    #[test]
    fn test_locales_share_keys() {
        fn keys(value: &Value, prefix: &str, out: &mut Vec<String>) {
            if let Value::Object(map) = value {
                for (k, v) in map {
                    let path = if prefix.is_empty() {
                        k.clone()
                    } else {
                        format!("{}.{}", prefix, k)
                    };
                    keys(v, &path, out);
                }
            } else {
                out.push(prefix.to_string());
            }
        }

        let translations = TRANSLATIONS.get_or_init(load_translations);
        let mut en = Vec::new();
        let mut hi = Vec::new();
        keys(&translations["en"], "", &mut en);
        keys(&translations["hi"], "", &mut hi);
        en.sort();
        hi.sort();
        assert_eq!(en, hi);
    }
}
