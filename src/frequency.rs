/// Parse how often a medication is taken into a number of doses per day.
///
/// Supported formats:
/// - "1" .. "4" -> that many doses
/// - "daily", "once daily", "qd" -> 1
/// - "twice daily", "bid" -> 2
/// - "three times daily", "tid" -> 3
/// - "four times daily", "qid" -> 4
/// - "X times daily", "X times a day" -> X
/// - "하루 X번", "하루 X회", "하루 한 번" .. "하루 네 번" -> X
///
/// Anything else, or a count outside 1..=4, returns `None`. Unlike an
/// interval, there is no safe default for a dose count.
pub fn parse_times_per_day(freq: &str) -> Option<u8> {
    let lower = freq.trim().to_lowercase();

    let count = match lower.as_str() {
        "daily" | "once daily" | "once a day" | "every day" | "qd" => Some(1),
        "twice daily" | "twice a day" | "bid" => Some(2),
        "tid" => Some(3),
        "qid" => Some(4),
        _ => None,
    };

    let count = count.or_else(|| lower.parse::<u8>().ok()).or_else(|| {
        // "3 times daily", "three times a day"
        let parts: Vec<&str> = lower.split_whitespace().collect();
        match parts.as_slice() {
            [n, "times", "daily"] | [n, "times", "a", "day"] | [n, "times", "per", "day"] => {
                count_word(n)
            }
            _ => None,
        }
    });

    let count = count.or_else(|| {
        // "하루 3번", "하루 세 번", "하루3회"
        let rest = lower.strip_prefix("하루")?.trim();
        let rest = rest
            .strip_suffix('번')
            .or_else(|| rest.strip_suffix('회'))?
            .trim();
        count_word(rest)
    });

    count.filter(|n| (1..=4).contains(n))
}

fn count_word(word: &str) -> Option<u8> {
    match word {
        "one" | "once" | "한" => Some(1),
        "two" | "두" => Some(2),
        "three" | "세" => Some(3),
        "four" | "네" => Some(4),
        other => other.parse().ok(),
    }
}
