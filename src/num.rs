/// Insert a `_` before every group of 3 digits, counting from the right.
fn group_digits(digits: &str) -> String {
    let len = digits.len();
    digits.chars().enumerate().fold(String::new(), |mut acc, (i, c)| {
        if i > 0 && (len - i) % 3 == 0 {
            acc.push('_');
        }
        acc.push(c);
        acc
    })
}

/// Format an offset the way segment ids are displayed: `1_000_000`, padded to
/// the max length of u64, 20 digits.
pub(crate) fn format_pad_u64(n: u64) -> String {
    group_digits(&format!("{:020}", n))
}

/// Format a position or size, padded to at least 9 digits.
pub(crate) fn format_pad9_u64(n: u64) -> String {
    group_digits(&format!("{:09}", n))
}
