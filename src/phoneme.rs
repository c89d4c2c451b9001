/// Normalize a phoneme label from the assessment provider to an IPA symbol.
///
/// The provider reports en-US phonemes as ARPAbet/SAPI labels (`th`, `ae`,
/// `ax`...), sometimes with stress digits or slash delimiters. Labels that are
/// already IPA pass through untouched. Returns an empty string for blank input.
pub fn normalize(symbol: &str) -> String {
    let trimmed = symbol
        .trim()
        .trim_matches(|c| matches!(c, '/' | '[' | ']'))
        .trim();

    if !trimmed.is_ascii() {
        return trimmed.to_string();
    }

    let label = trimmed
        .trim_end_matches(|c: char| c.is_ascii_digit())
        .to_ascii_lowercase();

    match arpabet_to_ipa(&label) {
        Some(ipa) => ipa.to_string(),
        None => label,
    }
}

fn arpabet_to_ipa(label: &str) -> Option<&'static str> {
    let ipa = match label {
        "aa" => "ɑ",
        "ae" => "æ",
        "ah" => "ʌ",
        "ao" => "ɔ",
        "aw" => "aʊ",
        "ax" => "ə",
        "ay" => "aɪ",
        "b" => "b",
        "ch" => "tʃ",
        "d" => "d",
        "dh" => "ð",
        "eh" => "ɛ",
        "er" => "ɝ",
        "ey" => "eɪ",
        "f" => "f",
        "g" => "ɡ",
        "h" | "hh" => "h",
        "ih" => "ɪ",
        "iy" => "i",
        "jh" => "dʒ",
        "k" => "k",
        "l" => "l",
        "m" => "m",
        "n" => "n",
        "ng" => "ŋ",
        "ow" => "oʊ",
        "oy" => "ɔɪ",
        "p" => "p",
        "r" => "ɹ",
        "s" => "s",
        "sh" => "ʃ",
        "t" => "t",
        "th" => "θ",
        "uh" => "ʊ",
        "uw" => "u",
        "v" => "v",
        "w" => "w",
        "y" => "j",
        "z" => "z",
        "zh" => "ʒ",
        _ => return None,
    };
    Some(ipa)
}
