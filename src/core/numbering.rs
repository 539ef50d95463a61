use crate::domain::model::NumberingStyle;

/// 依位置 (從 0 起算) 產生展品編號
pub fn exhibit_label(style: NumberingStyle, index: usize) -> String {
    match style {
        NumberingStyle::Letters => to_letters(index),
        NumberingStyle::Numbers => (index + 1).to_string(),
        NumberingStyle::Roman => to_roman(index + 1),
    }
}

/// A..Z, AA, AB, ... (試算表欄位式)
pub fn to_letters(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

pub fn to_roman(mut num: usize) -> String {
    const TABLE: [(usize, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];

    let mut roman = String::new();
    for (value, symbol) in TABLE {
        while num >= value {
            roman.push_str(symbol);
            num -= value;
        }
    }
    roman
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letter_labels() {
        assert_eq!(exhibit_label(NumberingStyle::Letters, 0), "A");
        assert_eq!(exhibit_label(NumberingStyle::Letters, 25), "Z");
        assert_eq!(exhibit_label(NumberingStyle::Letters, 26), "AA");
        assert_eq!(exhibit_label(NumberingStyle::Letters, 27), "AB");
        assert_eq!(exhibit_label(NumberingStyle::Letters, 51), "AZ");
        assert_eq!(exhibit_label(NumberingStyle::Letters, 52), "BA");
        assert_eq!(exhibit_label(NumberingStyle::Letters, 701), "ZZ");
        assert_eq!(exhibit_label(NumberingStyle::Letters, 702), "AAA");
    }

    #[test]
    fn test_number_labels() {
        assert_eq!(exhibit_label(NumberingStyle::Numbers, 0), "1");
        assert_eq!(exhibit_label(NumberingStyle::Numbers, 41), "42");
    }

    #[test]
    fn test_roman_labels() {
        assert_eq!(exhibit_label(NumberingStyle::Roman, 0), "I");
        assert_eq!(exhibit_label(NumberingStyle::Roman, 3), "IV");
        assert_eq!(exhibit_label(NumberingStyle::Roman, 8), "IX");
        assert_eq!(to_roman(14), "XIV");
        assert_eq!(to_roman(1994), "MCMXCIV");
    }
}
