//! Arabic numerals to spoken Chinese.
//!
//! Applied before segmentation so the engine never sees raw digits. Rules run
//! in a fixed order; each one consumes the digits it rewrites, so later rules
//! only see what is left:
//!
//! 1. years, digit by digit: `2023年` -> `二零二三年`
//! 2. month and day as integers: `10月` -> `十月`
//! 3. fractions: `3/4` -> `四分之三`
//! 4. percentages: `-12.5%` -> `负百分之十二点五`
//! 5. Celsius: `25℃` -> `二十五摄氏度`
//! 6. any other integer or decimal: `1001` -> `一千零一`

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

const DIGITS: [char; 10] = ['零', '一', '二', '三', '四', '五', '六', '七', '八', '九'];
const BIG_UNITS: [char; 4] = ['万', '亿', '兆', '京'];

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9]+)年").unwrap());
static MONTH: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9]+)月").unwrap());
static DAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9]+)日").unwrap());
static FRACTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9]+)/([0-9]+)").unwrap());
static PERCENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(-?)([0-9]+(?:\.[0-9]+)?)%").unwrap());
static CELSIUS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(-?)([0-9]+)℃").unwrap());
static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(-?)([0-9]+(?:\.[0-9]+)?)").unwrap());

/// Read each ASCII digit on its own; other characters pass through.
pub fn digits_to_chinese(s: &str) -> String {
    s.chars()
        .map(|c| match c.to_digit(10) {
            Some(d) if c.is_ascii_digit() => DIGITS[d as usize],
            _ => c,
        })
        .collect()
}

/// Spoken form of one 4-digit group. `leading` marks the most significant
/// group, which never starts with 零 and says 十 instead of 一十.
fn group_to_chinese(part: u64, leading: bool) -> String {
    let qian = (part / 1000) as usize;
    let bai = (part % 1000 / 100) as usize;
    let shi = (part % 100 / 10) as usize;
    let ge = (part % 10) as usize;

    let mut out = String::new();
    if qian > 0 {
        out.push(DIGITS[qian]);
        out.push('千');
    } else if !leading {
        out.push('零');
    }

    if bai > 0 {
        out.push(DIGITS[bai]);
        out.push('百');
    } else if qian > 0 && (shi > 0 || ge > 0) {
        out.push('零');
    }

    if shi > 0 {
        if !(shi == 1 && qian == 0 && bai == 0 && leading) {
            out.push(DIGITS[shi]);
        }
        out.push('十');
    } else if bai > 0 && ge > 0 {
        out.push('零');
    }

    if ge > 0 {
        out.push(DIGITS[ge]);
    }
    out
}

fn collapse_zeros(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_zero = false;
    for c in s.chars() {
        if c == '零' {
            if !last_zero {
                out.push(c);
            }
            last_zero = true;
        } else {
            out.push(c);
            last_zero = false;
        }
    }
    out
}

/// Integer with 万/亿 grouping: `10000` -> `一万`, `1001` -> `一千零一`.
pub fn integer_to_chinese(n: i64) -> String {
    if n == 0 {
        return DIGITS[0].to_string();
    }

    let mut out = String::new();
    if n < 0 {
        out.push('负');
    }

    let mut rest = n.unsigned_abs();
    let mut groups = Vec::new();
    while rest > 0 {
        groups.push(rest % 10000);
        rest /= 10000;
    }

    let top = groups.len() - 1;
    let mut pending_zero = false;
    for (i, &part) in groups.iter().enumerate().rev() {
        if part == 0 {
            pending_zero = true;
            continue;
        }
        if pending_zero {
            out.push('零');
            pending_zero = false;
        }
        out.push_str(&collapse_zeros(&group_to_chinese(part, i == top)));
        if i > 0 {
            out.push(BIG_UNITS[i - 1]);
        }
    }

    let mut out = collapse_zeros(&out);
    if out.chars().count() > 1 && out.ends_with('零') {
        out.pop();
    }
    out
}

/// Integer or decimal digits (no sign). Values that overflow `i64` are read
/// digit by digit.
fn number_to_chinese(s: &str) -> String {
    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (s, None),
    };
    let mut out = match int_part.parse::<i64>() {
        Ok(n) => integer_to_chinese(n),
        Err(_) => digits_to_chinese(int_part),
    };
    if let Some(frac) = frac_part {
        out.push('点');
        out.push_str(&digits_to_chinese(frac));
    }
    out
}

fn sign(caps: &Captures<'_>) -> &'static str {
    if &caps[1] == "-" {
        "负"
    } else {
        ""
    }
}

pub fn normalize_numbers(text: &str) -> String {
    let text = YEAR.replace_all(text, |c: &Captures<'_>| {
        format!("{}年", digits_to_chinese(&c[1]))
    });
    let text = MONTH.replace_all(&text, |c: &Captures<'_>| {
        format!("{}月", number_to_chinese(&c[1]))
    });
    let text = DAY.replace_all(&text, |c: &Captures<'_>| {
        format!("{}日", number_to_chinese(&c[1]))
    });
    let text = FRACTION.replace_all(&text, |c: &Captures<'_>| {
        format!("{}分之{}", number_to_chinese(&c[2]), number_to_chinese(&c[1]))
    });
    let text = PERCENT.replace_all(&text, |c: &Captures<'_>| {
        format!("{}百分之{}", sign(c), number_to_chinese(&c[2]))
    });
    let text = CELSIUS.replace_all(&text, |c: &Captures<'_>| {
        format!("{}{}摄氏度", sign(c), number_to_chinese(&c[2]))
    });
    let text = NUMBER.replace_all(&text, |c: &Captures<'_>| {
        format!("{}{}", sign(c), number_to_chinese(&c[2]))
    });
    text.into_owned()
}
