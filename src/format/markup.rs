//! Conversion between Discord markdown and IRC formatting codes.
//!
//! Both directions are best-effort scanners: anything they cannot pair up is
//! emitted literally, so no input is ever rejected.

use crate::format::colors::{COLOR, RESET};

/// IRC bold toggle.
pub const BOLD: char = '\x02';
/// IRC italic toggle.
pub const ITALIC: char = '\x1D';
/// IRC underline toggle.
pub const UNDERLINE: char = '\x1F';
/// IRC reverse-video toggle. Rendered as italics on Discord.
pub const REVERSE: char = '\x16';
/// IRC hex colour introducer.
const HEX_COLOR: char = '\x04';
/// IRC monospace and strikethrough toggles; dropped.
const MONOSPACE: char = '\x11';
const STRIKETHROUGH: char = '\x1E';

/// Emphasis recognised in Discord markdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Emphasis {
    Bold,
    Italic,
    Underline,
}

impl Emphasis {
    fn irc_code(self) -> char {
        match self {
            Emphasis::Bold => BOLD,
            Emphasis::Italic => ITALIC,
            Emphasis::Underline => UNDERLINE,
        }
    }
}

/// A matched emphasis span: the inner range and where scanning resumes.
struct Span {
    emphasis: Emphasis,
    inner: (usize, usize),
    next: usize,
}

/// Convert Discord markdown to IRC control codes.
pub fn discord_to_irc(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    render_markdown(&chars, &mut out);
    out
}

fn render_markdown(chars: &[char], out: &mut String) {
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' if chars.get(i + 1).is_some_and(|&c| is_escapable(c)) => {
                out.push(chars[i + 1]);
                i += 2;
            }
            '`' => match find_code_end(chars, i) {
                Some(end) => {
                    out.extend(&chars[i..end]);
                    i = end;
                }
                None => {
                    let run = backtick_run(chars, i);
                    out.extend(&chars[i..i + run]);
                    i += run;
                }
            },
            '*' | '_' => match match_emphasis(chars, i) {
                Some(span) => {
                    let code = span.emphasis.irc_code();
                    out.push(code);
                    render_markdown(&chars[span.inner.0..span.inner.1], out);
                    out.push(code);
                    i = span.next;
                }
                None => {
                    out.push(chars[i]);
                    i += 1;
                }
            },
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
}

fn is_escapable(c: char) -> bool {
    !c.is_alphanumeric() && !c.is_whitespace()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn backtick_run(chars: &[char], start: usize) -> usize {
    chars[start..].iter().take_while(|&&c| c == '`').count()
}

/// End (exclusive) of an inline code span opened at `start`, if it closes.
fn find_code_end(chars: &[char], start: usize) -> Option<usize> {
    let run = backtick_run(chars, start);
    let mut j = start + run;
    while j < chars.len() {
        if chars[j] == '`' {
            let closing = backtick_run(chars, j);
            if closing == run && j > start + run {
                return Some(j + closing);
            }
            j += closing;
        } else {
            j += 1;
        }
    }
    None
}

fn match_emphasis(chars: &[char], i: usize) -> Option<Span> {
    let c = chars[i];
    let doubled = chars.get(i + 1) == Some(&c);

    if doubled {
        let emphasis = if c == '*' {
            Emphasis::Bold
        } else {
            Emphasis::Underline
        };
        if let Some(span) = match_double(chars, i, emphasis) {
            return Some(span);
        }
    }

    if c == '*' {
        match_star_italic(chars, i)
    } else {
        match_underscore_italic(chars, i)
    }
}

/// `**x**` or `__x__`: first closing pair not followed by a third marker.
fn match_double(chars: &[char], i: usize, emphasis: Emphasis) -> Option<Span> {
    let marker = chars[i];
    let mut j = i + 3;
    while j + 1 < chars.len() {
        if chars[j - 1] == '\\' && !preceded_by_escape(chars, j - 1) {
            j += 1;
            continue;
        }
        if chars[j] == marker && chars[j + 1] == marker && chars.get(j + 2) != Some(&marker) {
            return Some(Span {
                emphasis,
                inner: (i + 2, j),
                next: j + 2,
            });
        }
        j += 1;
    }
    None
}

/// `*x*`: opener followed by non-space, closer preceded by non-space.
fn match_star_italic(chars: &[char], i: usize) -> Option<Span> {
    match chars.get(i + 1) {
        Some(&c) if !c.is_whitespace() && c != '*' => {}
        _ => return None,
    }

    let mut j = i + 1;
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 2,
            '*' if chars.get(j + 1) == Some(&'*') => j += 2,
            '*' => {
                if j > i + 1 && !chars[j - 1].is_whitespace() {
                    return Some(Span {
                        emphasis: Emphasis::Italic,
                        inner: (i + 1, j),
                        next: j + 1,
                    });
                }
                return None;
            }
            _ => j += 1,
        }
    }
    None
}

/// `_x_`: both markers must sit on word boundaries.
fn match_underscore_italic(chars: &[char], i: usize) -> Option<Span> {
    if i > 0 && is_word_char(chars[i - 1]) {
        return None;
    }

    let mut j = i + 1;
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 2,
            '_' if chars.get(j + 1) == Some(&'_') => j += 2,
            '_' => {
                let at_boundary = chars.get(j + 1).map_or(true, |&c| !is_word_char(c));
                if j > i + 1 && at_boundary {
                    return Some(Span {
                        emphasis: Emphasis::Italic,
                        inner: (i + 1, j),
                        next: j + 1,
                    });
                }
                return None;
            }
            _ => j += 1,
        }
    }
    None
}

/// Whether the backslash at `pos` is itself escaped.
fn preceded_by_escape(chars: &[char], pos: usize) -> bool {
    chars[..pos].iter().rev().take_while(|&&c| c == '\\').count() % 2 == 1
}

/// Style state of a run of IRC text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct IrcStyle {
    bold: bool,
    italic: bool,
    underline: bool,
    reverse: bool,
}

impl IrcStyle {
    fn shows_italic(&self) -> bool {
        self.italic || self.reverse
    }
}

/// Convert IRC control codes to Discord markdown.
///
/// Colours are dropped. Markers open in the order italic, bold, underline
/// and close in reverse so nesting stays balanced.
pub fn irc_to_discord(text: &str) -> String {
    let runs = parse_irc_runs(text);
    let plain = IrcStyle::default();
    let mut out = String::with_capacity(text.len());

    for i in 0..=runs.len() {
        let (style, content) = runs
            .get(i)
            .map(|(style, content)| (*style, content.as_str()))
            .unwrap_or((plain, ""));
        let prev = if i == 0 { plain } else { runs[i - 1].0 };

        if !prev.shows_italic() && style.shows_italic() {
            out.push('*');
        }
        if !prev.bold && style.bold {
            out.push_str("**");
        }
        if !prev.underline && style.underline {
            out.push_str("__");
        }
        if prev.underline && !style.underline {
            out.push_str("__");
        }
        if prev.bold && !style.bold {
            out.push_str("**");
        }
        if prev.shows_italic() && !style.shows_italic() {
            out.push('*');
        }
        out.push_str(content);
    }

    out
}

/// Split IRC text into runs of uniformly styled content.
fn parse_irc_runs(text: &str) -> Vec<(IrcStyle, String)> {
    let mut runs: Vec<(IrcStyle, String)> = Vec::new();
    let mut style = IrcStyle::default();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            BOLD => style.bold = !style.bold,
            ITALIC => style.italic = !style.italic,
            UNDERLINE => style.underline = !style.underline,
            REVERSE => style.reverse = !style.reverse,
            RESET => style = IrcStyle::default(),
            COLOR => {
                let foreground = skip_while_max(&mut chars, 2, |c| c.is_ascii_digit());
                let mut lookahead = chars.clone();
                if foreground > 0
                    && lookahead.next() == Some(',')
                    && lookahead.peek().is_some_and(|c| c.is_ascii_digit())
                {
                    chars.next();
                    skip_while_max(&mut chars, 2, |c| c.is_ascii_digit());
                }
            }
            HEX_COLOR => {
                let foreground = skip_while_max(&mut chars, 6, |c| c.is_ascii_hexdigit());
                let mut lookahead = chars.clone();
                if foreground > 0
                    && lookahead.next() == Some(',')
                    && lookahead.peek().is_some_and(|c| c.is_ascii_hexdigit())
                {
                    chars.next();
                    skip_while_max(&mut chars, 6, |c| c.is_ascii_hexdigit());
                }
            }
            MONOSPACE | STRIKETHROUGH => {}
            c => match runs.last_mut() {
                Some((last, content)) if *last == style => content.push(c),
                _ => runs.push((style, c.to_string())),
            },
        }
    }

    runs
}

/// Consume up to `max` characters matching `pred`, returning how many.
fn skip_while_max<I, F>(chars: &mut std::iter::Peekable<I>, max: usize, pred: F) -> usize
where
    I: Iterator<Item = char>,
    F: Fn(char) -> bool,
{
    let mut skipped = 0;
    while skipped < max {
        match chars.peek() {
            Some(&c) if pred(c) => {
                chars.next();
                skipped += 1;
            }
            _ => break,
        }
    }
    skipped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discord_bold_italic_underline() {
        assert_eq!(discord_to_irc("**hi**"), "\x02hi\x02");
        assert_eq!(discord_to_irc("*hi*"), "\x1Dhi\x1D");
        assert_eq!(discord_to_irc("_hi_"), "\x1Dhi\x1D");
        assert_eq!(discord_to_irc("__hi__"), "\x1Fhi\x1F");
    }

    #[test]
    fn test_discord_mixed_sentence() {
        assert_eq!(
            discord_to_irc("this is **very** _important_ ok"),
            "this is \x02very\x02 \x1Dimportant\x1D ok"
        );
    }

    #[test]
    fn test_discord_nested_bold_italic() {
        assert_eq!(discord_to_irc("***both***"), "\x02\x1Dboth\x1D\x02");
        assert_eq!(discord_to_irc("**bold *and* more**"), "\x02bold \x1Dand\x1D more\x02");
    }

    #[test]
    fn test_discord_unmatched_markers_pass_through() {
        assert_eq!(discord_to_irc("**unclosed"), "**unclosed");
        assert_eq!(discord_to_irc("2 * 3 = 6"), "2 * 3 = 6");
        assert_eq!(discord_to_irc("a * b * c"), "a * b * c");
        assert_eq!(discord_to_irc("*"), "*");
        assert_eq!(discord_to_irc("****"), "****");
    }

    #[test]
    fn test_discord_snake_case_untouched() {
        assert_eq!(discord_to_irc("snake_case_name"), "snake_case_name");
        assert_eq!(discord_to_irc("call my_func_here()"), "call my_func_here()");
    }

    #[test]
    fn test_discord_escapes() {
        assert_eq!(discord_to_irc(r"\*not italic\*"), "*not italic*");
        assert_eq!(discord_to_irc(r"C:\Users\me"), r"C:\Users\me");
    }

    #[test]
    fn test_discord_code_span_is_verbatim() {
        assert_eq!(discord_to_irc("run `**x**` now"), "run `**x**` now");
        assert_eq!(discord_to_irc("lonely ` tick"), "lonely ` tick");
    }

    #[test]
    fn test_discord_plain_text_is_identity() {
        let samples = [
            "hello world",
            "what's up? (nothing much) #channel @someone",
            "url: https://example.com/a-b?c=d&e=f",
            "",
        ];
        for sample in samples {
            assert_eq!(discord_to_irc(sample), sample);
            assert_eq!(irc_to_discord(sample), sample);
            assert_eq!(discord_to_irc(&irc_to_discord(sample)), sample);
        }
    }

    #[test]
    fn test_irc_bold_to_markdown() {
        assert_eq!(irc_to_discord("\x02hi\x02 there"), "**hi** there");
    }

    #[test]
    fn test_irc_unterminated_style_closes_at_end() {
        assert_eq!(irc_to_discord("\x02bold to the end"), "**bold to the end**");
    }

    #[test]
    fn test_irc_italic_and_reverse() {
        assert_eq!(irc_to_discord("\x1Dslanted\x1D"), "*slanted*");
        assert_eq!(irc_to_discord("\x16inverted\x16"), "*inverted*");
    }

    #[test]
    fn test_irc_underline() {
        assert_eq!(irc_to_discord("\x1Funder\x1F"), "__under__");
    }

    #[test]
    fn test_irc_nested_styles_close_in_reverse() {
        assert_eq!(
            irc_to_discord("\x1D\x02\x1Fall\x0F plain"),
            "***__all__*** plain"
        );
    }

    #[test]
    fn test_irc_colors_are_stripped() {
        assert_eq!(irc_to_discord("\x0304red\x03 text"), "red text");
        assert_eq!(irc_to_discord("\x0312,04blue on red\x0F"), "blue on red");
        assert_eq!(irc_to_discord("\x033,5x"), "x");
        assert_eq!(irc_to_discord("\x03,5x"), ",5x");
        assert_eq!(irc_to_discord("\x04FF0000red"), "red");
    }

    #[test]
    fn test_irc_colored_nick_roundtrip() {
        assert_eq!(irc_to_discord("\x0308Bob\x0F: hey"), "Bob: hey");
    }

    #[test]
    fn test_irc_repeated_toggle_merges_runs() {
        assert_eq!(irc_to_discord("a\x02\x02b"), "ab");
    }
}
