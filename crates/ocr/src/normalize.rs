use std::sync::OnceLock;

use docscan_core::{ExtractedRecord, FieldKind, NormalizedRecord};
use regex::Regex;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_date_noise, r"[^a-zA-Z0-9\s-]");
re!(re_non_digit, r"\D");

// ── Character confusion ──────────────────────────────────────────────────────

/// Upper bound on correction passes. The built-in table settles in two.
pub const MAX_PASSES: usize = 10;

/// Sequences OCR commonly misreads in numeric fields, applied in this order.
pub const DEFAULT_CONFUSIONS: &[(&str, &str)] = &[
    ("O", "0"),
    ("I", "1"),
    ("l", "1"),
    ("Z", "2"),
    ("S", "5"),
    ("B", "8"),
    ("G", "6"),
    ("q", "9"),
    ("ozz", "022"),
    ("zz", "22"),
    ("on", "01"),
    ("iO", "10"),
    ("O5", "05"),
    ("lo", "10"),
];

/// Ordered substring rewriter, iterated to a fixed point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionCorrector {
    table: Vec<(String, String)>,
}

impl Default for ConfusionCorrector {
    fn default() -> Self {
        Self::new(
            DEFAULT_CONFUSIONS
                .iter()
                .map(|&(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        )
    }
}

impl ConfusionCorrector {
    /// Rules with an empty pattern are dropped.
    pub fn new(table: Vec<(String, String)>) -> Self {
        let table = table.into_iter().filter(|(from, _)| !from.is_empty()).collect();
        Self { table }
    }

    pub fn table(&self) -> &[(String, String)] {
        &self.table
    }

    /// Apply every rule in order, repeating whole passes until one changes
    /// nothing or [`MAX_PASSES`] is reached.
    pub fn correct(&self, text: &str) -> String {
        let mut current = text.to_string();
        for _ in 0..MAX_PASSES {
            let next = self.pass(&current);
            if next == current {
                return next;
            }
            current = next;
        }
        tracing::warn!(input = text, output = %current, "Confusion table did not settle within {MAX_PASSES} passes");
        current
    }

    fn pass(&self, text: &str) -> String {
        self.table
            .iter()
            .fold(text.to_string(), |acc, (from, to)| acc.replace(from.as_str(), to))
    }
}

// ── Date ─────────────────────────────────────────────────────────────────────

const MONTHS: [(&str, &str); 12] = [
    ("Jan", "01"), ("Feb", "02"), ("Mar", "03"), ("Apr", "04"),
    ("May", "05"), ("Jun", "06"), ("Jul", "07"), ("Aug", "08"),
    ("Sep", "09"), ("Oct", "10"), ("Nov", "11"), ("Dec", "12"),
];

/// Result of [`canonicalize_date`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateOutcome {
    /// `DD/MM/YYYY`; month is `00` when the month token was not recognized.
    Canonical(String),
    /// The input, untouched, because it did not have a `DD-Mon-YYYY` shape.
    Unchanged(String),
}

impl DateOutcome {
    pub fn is_canonical(&self) -> bool {
        matches!(self, DateOutcome::Canonical(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            DateOutcome::Canonical(s) | DateOutcome::Unchanged(s) => s,
        }
    }

    pub fn into_string(self) -> String {
        match self {
            DateOutcome::Canonical(s) | DateOutcome::Unchanged(s) => s,
        }
    }
}

/// How the month token of a date is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonthMatch {
    /// `Jan`..`Dec` only. The confusion table has already run, so `Oct`,
    /// `Sep` and `Jul` arrive as `0ct`, `5ep` and `Ju1` and map to `00`.
    #[default]
    Exact,
    /// Also accept each abbreviation as the confusion table rewrites it.
    Corrected,
}

/// Turn OCR text like `O5-Jan-2O23` into `05/01/2023`.
///
/// Punctuation other than `-` is dropped and the confusion table applied
/// before splitting into day, month and year. Anything without a two-character
/// day and four-character year comes back as the original input.
pub fn canonicalize_date(text: &str, corrector: &ConfusionCorrector) -> DateOutcome {
    canonicalize_date_with(text, corrector, MonthMatch::Exact)
}

/// [`canonicalize_date`] with a choice of month lookup.
pub fn canonicalize_date_with(text: &str, corrector: &ConfusionCorrector, months: MonthMatch) -> DateOutcome {
    let cleaned = re_date_noise().replace_all(text, "");
    let cleaned = corrector.correct(&cleaned);

    let parts: Vec<&str> = cleaned.split('-').collect();
    if let &[day, month, year] = parts.as_slice() {
        if day.chars().count() == 2 && year.chars().count() == 4 {
            let month = month_number(month, corrector, months);
            return DateOutcome::Canonical(format!("{day}/{month}/{year}"));
        }
    }
    DateOutcome::Unchanged(text.to_string())
}

/// Two-digit month for a three-letter abbreviation, `00` when unknown.
fn month_number(token: &str, corrector: &ConfusionCorrector, months: MonthMatch) -> &'static str {
    MONTHS
        .iter()
        .find(|(abbr, _)| match months {
            MonthMatch::Exact => token == *abbr,
            MonthMatch::Corrected => token == *abbr || token == corrector.correct(abbr),
        })
        .map(|(_, num)| *num)
        .unwrap_or("00")
}

// ── Phone ────────────────────────────────────────────────────────────────────

/// Length of a complete mobile number, without country code.
pub const PHONE_DIGITS: usize = 10;

/// Keep only decimal digits (any script); a number shorter than
/// [`PHONE_DIGITS`] gets `prefix` put in front once. Short numbers are not
/// padded any further.
pub fn normalize_phone(text: &str, prefix: char) -> String {
    let digits = re_non_digit().replace_all(text, "");
    if digits.chars().count() < PHONE_DIGITS {
        format!("{prefix}{digits}")
    } else {
        digits.into_owned()
    }
}

// ── Record ───────────────────────────────────────────────────────────────────

/// Field-specific clean-up for a whole record.
#[derive(Debug, Clone)]
pub struct Normalizer {
    pub corrector: ConfusionCorrector,
    pub phone_prefix: char,
    pub months: MonthMatch,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(ConfusionCorrector::default(), '8')
    }
}

impl Normalizer {
    pub fn new(corrector: ConfusionCorrector, phone_prefix: char) -> Self {
        Self { corrector, phone_prefix, months: MonthMatch::default() }
    }

    pub fn with_months(mut self, months: MonthMatch) -> Self {
        self.months = months;
        self
    }

    pub fn normalize(&self, record: &ExtractedRecord) -> NormalizedRecord {
        let date = canonicalize_date_with(record.text(FieldKind::Date), &self.corrector, self.months);
        let date_canonical = date.is_canonical();
        NormalizedRecord {
            filename: record.filename.clone(),
            beneficiary_name: record.text(FieldKind::BeneficiaryName).trim().to_string(),
            record_number: record.text(FieldKind::RecordNumber).trim().to_string(),
            date: date.as_str().trim().to_string(),
            date_canonical,
            mobile: normalize_phone(record.text(FieldKind::Mobile), self.phone_prefix),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn date(text: &str) -> DateOutcome {
        canonicalize_date(text, &ConfusionCorrector::default())
    }

    // ── Confusion ─────────────────────────────────────────────────────────────

    #[test]
    fn corrects_letter_digit_confusions() {
        let c = ConfusionCorrector::default();
        assert_eq!(c.correct("O5-Jan-2O23"), "05-Jan-2023");
        assert_eq!(c.correct("IZSBGq"), "125869");
        assert_eq!(c.correct("ozz"), "022");
        assert_eq!(c.correct("on"), "01");
    }

    #[test]
    fn table_order_resolves_overlaps() {
        // `O` is rewritten before `O5` or `iO` get a chance.
        let c = ConfusionCorrector::default();
        assert_eq!(c.correct("iO"), "i0");
        assert_eq!(c.correct("lo"), "1o");
    }

    #[test]
    fn later_rule_exposes_earlier_match() {
        // Second rule produces text the first rule matches, needing another pass.
        let c = ConfusionCorrector::new(vec![
            ("ab".into(), "X".into()),
            ("cd".into(), "b".into()),
        ]);
        assert_eq!(c.correct("acd"), "X");
    }

    #[test]
    fn corrector_is_idempotent() {
        let c = ConfusionCorrector::default();
        for input in ["O5-Jan-2O23", "lOzzonSq", "", "plain text", "iiOOllqq", "ozzz"] {
            let once = c.correct(input);
            assert_eq!(c.correct(&once), once, "input {input:?}");
        }
    }

    #[test]
    fn divergent_table_stops_at_pass_cap() {
        let c = ConfusionCorrector::new(vec![("a".into(), "ab".into())]);
        let out = c.correct("a");
        assert_eq!(out, format!("a{}", "b".repeat(MAX_PASSES)));
    }

    #[test]
    fn default_table_settles_quickly_on_long_input() {
        let c = ConfusionCorrector::default();
        let input = "OIlZSBGq ozz zz on iO O5 lo ".repeat(40);
        let out = c.correct(&input);
        assert_eq!(c.pass(&out), out);
    }

    #[test]
    fn empty_patterns_are_dropped() {
        let c = ConfusionCorrector::new(vec![("".into(), "x".into()), ("O".into(), "0".into())]);
        assert_eq!(c.table().len(), 1);
        assert_eq!(c.correct("OK"), "0K");
    }

    // ── Date ─────────────────────────────────────────────────────────────────

    #[test]
    fn date_with_confusions_is_canonicalized() {
        assert_eq!(date("O5-Jan-2O23"), DateOutcome::Canonical("05/01/2023".into()));
    }

    #[test]
    fn date_unknown_month_is_zero() {
        assert_eq!(date("15-XYZ-2024"), DateOutcome::Canonical("15/00/2024".into()));
    }

    #[test]
    fn date_iso_is_returned_unchanged() {
        let out = date("2024-01-15");
        assert!(!out.is_canonical());
        assert_eq!(out.as_str(), "2024-01-15");
    }

    #[test]
    fn date_failure_returns_uncleaned_input() {
        // Punctuation and confusions are not applied to a failed date.
        assert_eq!(date("O5.Jan.2O23!"), DateOutcome::Unchanged("O5.Jan.2O23!".into()));
        assert_eq!(date(""), DateOutcome::Unchanged("".into()));
        assert_eq!(date("05-Jan"), DateOutcome::Unchanged("05-Jan".into()));
        assert_eq!(date("05-Jan-2023-x"), DateOutcome::Unchanged("05-Jan-2023-x".into()));
    }

    #[test]
    fn date_strips_punctuation_before_splitting() {
        assert_eq!(date("'12-Mar-2022."), DateOutcome::Canonical("12/03/2022".into()));
    }

    #[test]
    fn date_months_rewritten_by_confusions_are_unknown() {
        assert_eq!(date("01-Oct-2023").as_str(), "01/00/2023");
        assert_eq!(date("30-Sep-2023").as_str(), "30/00/2023");
        assert_eq!(date("14-Jul-2021").as_str(), "14/00/2021");
        assert_eq!(date("3O-Nov-2O22").as_str(), "30/11/2022");
    }

    #[test]
    fn date_corrected_month_lookup() {
        let c = ConfusionCorrector::default();
        let lenient = |text: &str| canonicalize_date_with(text, &c, MonthMatch::Corrected).into_string();
        assert_eq!(lenient("01-Oct-2023"), "01/10/2023");
        assert_eq!(lenient("30-Sep-2023"), "30/09/2023");
        assert_eq!(lenient("14-Jul-2021"), "14/07/2021");
        assert_eq!(lenient("15-XYZ-2024"), "15/00/2024");
    }

    #[test]
    fn date_month_is_case_sensitive() {
        assert_eq!(date("05-JAN-2023").as_str(), "05/00/2023");
    }

    #[test]
    fn date_is_idempotent() {
        for input in ["O5-Jan-2O23", "15-XYZ-2024", "2024-01-15", "", "garbage", "12-Dec-1999"] {
            let once = date(input).into_string();
            assert_eq!(date(&once).into_string(), once, "input {input:?}");
        }
    }

    // ── Phone ────────────────────────────────────────────────────────────────

    #[test]
    fn phone_nine_digits_gets_prefix() {
        assert_eq!(normalize_phone("98-7654-321", '8'), "8987654321");
    }

    #[test]
    fn phone_short_number_prefixed_only_once() {
        let out = normalize_phone("12-34", '8');
        assert_eq!(out, "81234");
        assert_eq!(out.len(), 5);
    }

    #[test]
    fn phone_full_number_kept() {
        assert_eq!(normalize_phone("+91 98765 43210", '8'), "919876543210");
        assert_eq!(normalize_phone("9876543210", '8'), "9876543210");
    }

    #[test]
    fn phone_keeps_non_ascii_decimal_digits() {
        // Devanagari digits, as OCR may return for Hindi-language forms.
        assert_eq!(normalize_phone("९८७६५-४३२१०", '8'), "९८७६५४३२१०");
        assert_eq!(normalize_phone("१२-३४", '8'), "8१२३४");
        // Fractions and other non-decimal numerics are dropped.
        assert_eq!(normalize_phone("½ 12", '8'), "812");
    }

    #[test]
    fn phone_empty_is_prefix_only() {
        assert_eq!(normalize_phone("", '8'), "8");
        assert_eq!(normalize_phone("n/a", '7'), "7");
    }

    #[test]
    fn phone_is_idempotent_on_full_length_output() {
        for input in ["98-7654-321", "9876543210", "(+91) 98765-43210", "987 654 321"] {
            let once = normalize_phone(input, '8');
            assert!(once.len() >= PHONE_DIGITS);
            assert_eq!(normalize_phone(&once, '8'), once, "input {input:?}");
        }
    }

    // ── Record ───────────────────────────────────────────────────────────────

    #[test]
    fn normalizer_applies_field_routines() {
        let mut raw = ExtractedRecord::new("scan_01.jpg");
        raw.fields.insert(FieldKind::BeneficiaryName, " SUNIL KUMAR ".into());
        raw.fields.insert(FieldKind::RecordNumber, "A-1O2".into());
        raw.fields.insert(FieldKind::Date, "O5-Jan-2O23".into());
        raw.fields.insert(FieldKind::Mobile, "98-7654-321".into());

        let n = Normalizer::default().normalize(&raw);
        assert_eq!(n.filename, "scan_01.jpg");
        // Names and record numbers are not run through the confusion table.
        assert_eq!(n.beneficiary_name, "SUNIL KUMAR");
        assert_eq!(n.record_number, "A-1O2");
        assert_eq!(n.date, "05/01/2023");
        assert!(n.date_canonical);
        assert_eq!(n.mobile, "8987654321");
    }

    #[test]
    fn normalizer_month_lookup_follows_setting() {
        let mut raw = ExtractedRecord::new("scan_02.jpg");
        raw.fields.insert(FieldKind::Date, "01-Oct-2023".into());

        assert_eq!(Normalizer::default().normalize(&raw).date, "01/00/2023");
        let lenient = Normalizer::default().with_months(MonthMatch::Corrected);
        assert_eq!(lenient.normalize(&raw).date, "01/10/2023");
    }

    #[test]
    fn normalizer_empty_fields() {
        let n = Normalizer::default().normalize(&ExtractedRecord::new("blank.png"));
        assert_eq!(n.beneficiary_name, "");
        assert_eq!(n.date, "");
        assert!(!n.date_canonical);
        assert_eq!(n.mobile, "8");
    }
}
