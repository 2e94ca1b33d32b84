// SPDX-FileCopyrightText: 2026 Byfrost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Phone endpoint normalization and Brazilian mobile-digit variants.
//!
//! Messaging providers are inconsistent about the Brazilian mobile ninth
//! digit (10-digit vs 11-digit national forms), so identity matching
//! generates every plausible rendering of a number and matches any of them.
//! Group and broadcast identifiers are preserved opaque, never coerced into
//! phone form.

/// True when the endpoint is a group or broadcast identifier rather than an
/// individual phone.
///
/// Recognized shapes: `...@g.us` group jids, `...@broadcast`, and the legacy
/// `<digits>-<digits>` group id form.
pub fn is_group_endpoint(raw: &str) -> bool {
    let raw = raw.trim();
    if raw.ends_with("@g.us") || raw.ends_with("@broadcast") {
        return true;
    }
    // Legacy group ids: two digit runs joined by a dash (creator-timestamp).
    if let Some((left, right)) = raw.split_once('-') {
        let left = left.trim_start_matches('+');
        if !left.is_empty()
            && !right.is_empty()
            && left.chars().all(|c| c.is_ascii_digit())
            && right.chars().all(|c| c.is_ascii_digit())
        {
            return true;
        }
    }
    false
}

/// Normalize a raw endpoint to `+<countrycode><digits>` form.
///
/// Group/broadcast identifiers come back unchanged. Individual jid suffixes
/// (`@s.whatsapp.net`, `@c.us`) are stripped. Bare national numbers (10-11
/// digits) get the default country code. Returns `None` for values with no
/// digits at all.
pub fn normalize_phone(raw: &str, default_cc: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if is_group_endpoint(raw) {
        return Some(raw.to_string());
    }

    // Individual jids carry the number before the `@`.
    let raw = raw.split('@').next().unwrap_or(raw);

    let explicit_cc = raw.starts_with('+');
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }

    if explicit_cc {
        return Some(format!("+{digits}"));
    }
    // Already starts with the country code and is long enough to contain a
    // national number behind it.
    if digits.starts_with(default_cc) && digits.len() >= default_cc.len() + 10 {
        return Some(format!("+{digits}"));
    }
    // Bare national number.
    if (10..=11).contains(&digits.len()) {
        return Some(format!("+{default_cc}{digits}"));
    }
    Some(format!("+{digits}"))
}

/// All plausible renderings of a normalized Brazilian number.
///
/// For `+55` numbers the 11-digit mobile form (area code + `9` + 8 digits)
/// and the 10-digit form without the ninth digit are both generated; for
/// anything else the input is returned alone. The input is always first.
pub fn br_variants(phone: &str) -> Vec<String> {
    let mut variants = vec![phone.to_string()];

    let Some(national) = phone.strip_prefix("+55") else {
        return variants;
    };
    if !national.chars().all(|c| c.is_ascii_digit()) {
        return variants;
    }

    match national.len() {
        // Area code + 9 + subscriber: also match the form without the 9.
        11 if national.as_bytes()[2] == b'9' => {
            let (area, subscriber) = national.split_at(2);
            variants.push(format!("+55{}{}", area, &subscriber[1..]));
        }
        // Area code + 8-digit subscriber: also match the mobile form.
        10 => {
            let (area, subscriber) = national.split_at(2);
            variants.push(format!("+55{area}9{subscriber}"));
        }
        _ => {}
    }

    variants
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jid_suffix_is_stripped_and_cc_preserved() {
        assert_eq!(
            normalize_phone("5511999990000@s.whatsapp.net", "55").as_deref(),
            Some("+5511999990000")
        );
        assert_eq!(
            normalize_phone("5511999990000@c.us", "55").as_deref(),
            Some("+5511999990000")
        );
    }

    #[test]
    fn bare_national_numbers_get_the_default_country_code() {
        assert_eq!(
            normalize_phone("11999990000", "55").as_deref(),
            Some("+5511999990000")
        );
        assert_eq!(
            normalize_phone("1199990000", "55").as_deref(),
            Some("+551199990000")
        );
    }

    #[test]
    fn explicit_plus_is_authoritative() {
        assert_eq!(
            normalize_phone("+1 (415) 555-0100", "55").as_deref(),
            Some("+14155550100")
        );
    }

    #[test]
    fn group_identifiers_stay_opaque() {
        assert_eq!(
            normalize_phone("123456789-987654@g.us", "55").as_deref(),
            Some("123456789-987654@g.us")
        );
        assert_eq!(
            normalize_phone("5511999990000-1600000000", "55").as_deref(),
            Some("5511999990000-1600000000")
        );
        assert_eq!(
            normalize_phone("status@broadcast", "55").as_deref(),
            Some("status@broadcast")
        );
        assert!(is_group_endpoint("123-456@g.us"));
        assert!(!is_group_endpoint("+5511999990000"));
    }

    #[test]
    fn empty_and_digitless_values_degrade_to_none() {
        assert!(normalize_phone("", "55").is_none());
        assert!(normalize_phone("   ", "55").is_none());
        assert!(normalize_phone("unknown", "55").is_none());
    }

    #[test]
    fn eleven_digit_mobile_generates_the_ten_digit_variant() {
        let variants = br_variants("+5511987654321");
        assert_eq!(variants, vec!["+5511987654321", "+551187654321"]);
    }

    #[test]
    fn ten_digit_form_generates_the_mobile_variant() {
        let variants = br_variants("+551187654321");
        assert_eq!(variants, vec!["+551187654321", "+5511987654321"]);
    }

    #[test]
    fn non_brazilian_numbers_have_no_variants() {
        assert_eq!(br_variants("+14155550100"), vec!["+14155550100"]);
        assert_eq!(br_variants("123-456@g.us"), vec!["123-456@g.us"]);
    }

    mod properties {
        use super::super::*;
        use proptest::prelude::*;

        proptest! {
            /// Any variant of a BR mobile number, normalized and re-expanded,
            /// leads back to the same canonical form.
            #[test]
            fn variant_matching_round_trips(
                area in 11u32..=99,
                subscriber in 10_000_000u32..=99_999_999,
            ) {
                let canonical = format!("+55{area}9{subscriber}");
                for variant in br_variants(&canonical) {
                    let renormalized = normalize_phone(&variant, "55").unwrap();
                    prop_assert!(
                        br_variants(&renormalized).contains(&canonical),
                        "variant {variant} of {canonical} lost the identity"
                    );
                }
            }
        }
    }
}
