//! Field extraction helpers
//!
//! Small parsers shared by page selectors: BV ids out of links, durations out
//! of card text, and the coin/like ratio out of API stats. All of them return
//! `None` instead of failing.

/// Length of a BV id including the `BV` prefix.
const BVID_LEN: usize = 12;

/// Extract the first BV id from a link or path.
pub fn match_bvid(href: &str) -> Option<&str> {
    let bytes = href.as_bytes();
    let mut start = 0;
    while let Some(pos) = href[start..].find("BV") {
        let begin = start + pos;
        let end = begin + BVID_LEN;
        if end <= bytes.len() && bytes[begin + 2..end].iter().all(u8::is_ascii_alphanumeric) {
            // reject ids glued to a longer alphanumeric run
            if end == bytes.len() || !bytes[end].is_ascii_alphanumeric() {
                return Some(&href[begin..end]);
            }
        }
        start = begin + 2;
    }
    None
}

/// Extract the `space.bilibili.com/<mid>` part of an uploader link.
pub fn match_space_link(href: &str) -> Option<&str> {
    const HOST: &str = "space.bilibili.com/";
    let begin = href.find(HOST)?;
    let digits = &href[begin + HOST.len()..];
    let len = digits.bytes().take_while(u8::is_ascii_digit).count();
    if len == 0 {
        return None;
    }
    Some(&href[begin..begin + HOST.len() + len])
}

/// Parse a duration in seconds from `"125"`, `"02:05"` or `"1:02:05"`.
pub fn parse_duration(text: &str) -> Option<u32> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let mut total: u32 = 0;
    let mut parts = 0;
    for part in text.split(':') {
        parts += 1;
        if parts > 3 || part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let value: u32 = part.parse().ok()?;
        total = total.checked_mul(60)?.checked_add(value)?;
    }

    Some(total)
}

/// Coin/like ratio, or `None` when either count is zero.
pub fn coin_like_ratio(coin: u64, like: u64) -> Option<f64> {
    if coin == 0 || like == 0 {
        return None;
    }
    Some(coin as f64 / like as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_bvid() {
        assert_eq!(match_bvid("https://www.bilibili.com/video/BV1xx411c7mD/?p=2"), Some("BV1xx411c7mD"));
        assert_eq!(match_bvid("//www.bilibili.com/video/BV1xx411c7mD"), Some("BV1xx411c7mD"));
        assert_eq!(match_bvid("/video/BV1xx4"), None);
        assert_eq!(match_bvid("/video/av170001"), None);
        assert_eq!(match_bvid("BVBV1xx411c7mD"), Some("BV1xx411c7mD"));
    }

    #[test]
    fn test_match_space_link() {
        assert_eq!(match_space_link("//space.bilibili.com/12345?spm=1"), Some("space.bilibili.com/12345"));
        assert_eq!(match_space_link("//space.bilibili.com/"), None);
        assert_eq!(match_space_link("https://www.bilibili.com/"), None);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("125"), Some(125));
        assert_eq!(parse_duration("02:05"), Some(125));
        assert_eq!(parse_duration("1:02:05"), Some(3725));
        assert_eq!(parse_duration(" 00:59 "), Some(59));
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("2:"), None);
        assert_eq!(parse_duration("live"), None);
        assert_eq!(parse_duration("1:2:3:4"), None);
    }

    #[test]
    fn test_coin_like_ratio() {
        assert_eq!(coin_like_ratio(1, 10), Some(0.1));
        assert_eq!(coin_like_ratio(1, 0), None);
        assert_eq!(coin_like_ratio(0, 10), None);
    }
}
