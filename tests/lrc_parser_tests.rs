use cdn_player::lyrics::{LyricLine, parse_lrc};

fn line(time: f64, text: &str) -> LyricLine {
    LyricLine {
        time,
        text: text.to_string(),
    }
}

#[test]
fn test_lines_sorted_by_time() {
    let parsed = parse_lrc("[00:01.50]Hello\n[00:00.20]World");
    assert_eq!(parsed, vec![line(0.2, "World"), line(1.5, "Hello")]);
}

#[test]
fn test_non_time_tag_only_yields_nothing() {
    assert!(parse_lrc("[music]").is_empty());
    assert!(parse_lrc("[ti:Some Title]\n[ar:Someone]\n[00:03.00]").is_empty());
}

#[test]
fn test_multiple_timestamps_share_text() {
    let parsed = parse_lrc("[00:10.00][01:05.500]Chorus");
    assert_eq!(parsed, vec![line(10.0, "Chorus"), line(65.5, "Chorus")]);
}

#[test]
fn test_inline_tags_and_marker_are_stripped() {
    let parsed = parse_lrc("[00:02.00]>> [singing]Hey there");
    assert_eq!(parsed, vec![line(2.0, "Hey there")]);
}

#[test]
fn test_three_digit_fraction_is_milliseconds() {
    let parsed = parse_lrc("[02:00.125]Late line\r\n");
    assert_eq!(parsed, vec![line(120.125, "Late line")]);
}

#[test]
fn test_text_without_timestamps_is_dropped() {
    assert!(parse_lrc("just some words").is_empty());
    assert!(parse_lrc("").is_empty());
}
