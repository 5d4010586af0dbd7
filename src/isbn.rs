/// Strips hyphens and whitespace from an ISBN as it appears in the spreadsheet.
#[must_use]
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|ch| *ch != '-' && !ch.is_whitespace())
        .collect()
}

/// Derives the ISBN-10 form of a normalized 13-character ISBN.
///
/// The 3-character prefix and the ISBN-13 check digit are dropped, the middle
/// nine digits are kept, and a fresh mod-11 check digit is appended (`X` for 10).
/// Returns `None` when the input is not 13 characters or the body is not all
/// digits.
#[must_use]
pub fn isbn13_to_isbn10(isbn13: &str) -> Option<String> {
    if isbn13.len() != 13 || !isbn13.is_ascii() {
        return None;
    }

    let body = &isbn13[3..12];
    let mut sum = 0u32;
    for (i, ch) in body.chars().enumerate() {
        let digit = ch.to_digit(10)?;
        sum += digit * (10 - i as u32);
    }

    let check = (11 - sum % 11) % 11;
    let check = match check {
        10 => 'X',
        digit => char::from_digit(digit, 10)?,
    };

    Some(format!("{body}{check}"))
}
