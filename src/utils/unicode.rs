use once_cell::sync::Lazy;
use regex::Regex;
use unicode_general_category::{get_general_category, GeneralCategory};

static ESCAPE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\(?:u([0-9a-fA-F]{4})|U([0-9a-fA-F]{8})|x([0-9a-fA-F]{2}))").unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharInfo {
    pub ch: char,
    pub code_point: u32,
    pub json: String,
    pub name: Option<String>,
    pub category: &'static str,
}

pub fn describe_char(ch: char) -> CharInfo {
    CharInfo {
        ch,
        code_point: u32::from(ch),
        json: json_escape(ch),
        name: unicode_names2::name(ch).map(|name| name.to_string()),
        category: category_abbreviation(ch),
    }
}

/// JSON string literal for `ch` with everything outside ASCII written as
/// `\uXXXX` UTF-16 escapes.
pub fn json_escape(ch: char) -> String {
    if ch.is_ascii() {
        return serde_json::Value::String(ch.to_string()).to_string();
    }
    let mut buffer = [0u16; 2];
    let escaped: String = ch
        .encode_utf16(&mut buffer)
        .iter()
        .map(|unit| format!("\\u{unit:04x}"))
        .collect();
    format!("\"{escaped}\"")
}

#[allow(unreachable_patterns)]
pub fn category_abbreviation(ch: char) -> &'static str {
    match get_general_category(ch) {
        GeneralCategory::UppercaseLetter => "Lu",
        GeneralCategory::LowercaseLetter => "Ll",
        GeneralCategory::TitlecaseLetter => "Lt",
        GeneralCategory::ModifierLetter => "Lm",
        GeneralCategory::OtherLetter => "Lo",
        GeneralCategory::NonspacingMark => "Mn",
        GeneralCategory::SpacingMark => "Mc",
        GeneralCategory::EnclosingMark => "Me",
        GeneralCategory::DecimalNumber => "Nd",
        GeneralCategory::LetterNumber => "Nl",
        GeneralCategory::OtherNumber => "No",
        GeneralCategory::ConnectorPunctuation => "Pc",
        GeneralCategory::DashPunctuation => "Pd",
        GeneralCategory::OpenPunctuation => "Ps",
        GeneralCategory::ClosePunctuation => "Pe",
        GeneralCategory::InitialPunctuation => "Pi",
        GeneralCategory::FinalPunctuation => "Pf",
        GeneralCategory::OtherPunctuation => "Po",
        GeneralCategory::MathSymbol => "Sm",
        GeneralCategory::CurrencySymbol => "Sc",
        GeneralCategory::ModifierSymbol => "Sk",
        GeneralCategory::OtherSymbol => "So",
        GeneralCategory::SpaceSeparator => "Zs",
        GeneralCategory::LineSeparator => "Zl",
        GeneralCategory::ParagraphSeparator => "Zp",
        GeneralCategory::Control => "Cc",
        GeneralCategory::Format => "Cf",
        GeneralCategory::Surrogate => "Cs",
        GeneralCategory::PrivateUse => "Co",
        GeneralCategory::Unassigned => "Cn",
        _ => "Cn",
    }
}

/// Decodes `\uXXXX`, `\UXXXXXXXX` and `\xXX` escapes, pairing UTF-16
/// surrogates. Returns `None` when an escape does not form a valid char.
pub fn decode_escapes(input: &str) -> Option<String> {
    let mut decoded = String::with_capacity(input.len());
    let mut pending_units: Vec<u16> = Vec::new();
    let mut last_end = 0;

    for captures in ESCAPE_PATTERN.captures_iter(input) {
        let whole = captures.get(0)?;
        if whole.start() > last_end {
            flush_units(&mut pending_units, &mut decoded)?;
            decoded.push_str(&input[last_end..whole.start()]);
        }
        last_end = whole.end();

        if let Some(hex) = captures.get(1) {
            pending_units.push(u16::from_str_radix(hex.as_str(), 16).ok()?);
            continue;
        }

        flush_units(&mut pending_units, &mut decoded)?;
        let hex = captures.get(2).or_else(|| captures.get(3))?;
        let value = u32::from_str_radix(hex.as_str(), 16).ok()?;
        decoded.push(char::from_u32(value)?);
    }

    flush_units(&mut pending_units, &mut decoded)?;
    decoded.push_str(&input[last_end..]);
    Some(decoded)
}

fn flush_units(units: &mut Vec<u16>, out: &mut String) -> Option<()> {
    for ch in char::decode_utf16(units.drain(..)) {
        out.push(ch.ok()?);
    }
    Some(())
}

/// Resolves a decimal code point, an escaped sequence or a Unicode name.
pub fn lookup_character(code: &str) -> Option<String> {
    let code = code.trim();
    if code.is_empty() {
        return None;
    }
    if code.chars().all(|ch| ch.is_ascii_digit()) {
        let value = code.parse::<u32>().ok()?;
        return char::from_u32(value).map(String::from);
    }
    if code.contains('\\') {
        return decode_escapes(code);
    }
    unicode_names2::character(code).map(String::from)
}
