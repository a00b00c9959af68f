//! Command string tokenizer.
//!
//! Every line on the control channel has the shape:
//!
//! ```text
//! <name> -flag1 <value> -flag2 <value> ... [;]
//! ```
//!
//! A flag may be followed by any number of values. Each value is one of:
//! - a brace-quoted string: `{beauty pass}`, where `\}` stands for a literal `}`
//! - a double-quoted string: `"James Brown"`, where `\"` stands for a literal `"`
//! - a bare word: any run of non-whitespace that does not look like a flag
//!
//! Quoted values may span whitespace and newlines. When a flag repeats, or is
//! followed by several values, the values are joined with a single space.
//!
//! Parsing never fails. If a flag is expected and the input does not contain
//! one, the command accumulated so far is returned unchanged. Clients rely on
//! partially understood lines still being dispatched by name.

use std::collections::HashMap;

/// One parsed control-channel line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    name: String,
    /// Flag names in the order they appeared, duplicates included.
    flags: Vec<String>,
    /// Accumulated value per flag; `None` when no value followed the flag.
    values: HashMap<String, Option<String>>,
}

impl Command {
    /// Parse one command line.
    ///
    /// The caller is responsible for removing the framing terminator; a
    /// single trailing `;` is removed here.
    pub fn parse(input: &[u8]) -> Self {
        let decoded = String::from_utf8_lossy(input);
        let line = decoded.strip_suffix(';').unwrap_or(decoded.as_ref());
        let (name, mut rest) = line.split_once(' ').unwrap_or((line, ""));

        let mut command = Command {
            name: name.to_string(),
            ..Default::default()
        };

        while !rest.is_empty() {
            let Some((flag, after_flag)) = take_flag(rest) else {
                break;
            };
            command.add_flag(flag);
            rest = after_flag;

            while let Some((value, after_value)) = take_value(rest) {
                command.add_value(flag, value);
                rest = after_value;
            }
        }

        command
    }

    /// The command name (first space-delimited token).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Flag names in encounter order, including repeats.
    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    /// Whether the flag appeared at all, with or without a value.
    #[allow(dead_code)]
    pub fn has_flag(&self, flag: &str) -> bool {
        self.values.contains_key(flag)
    }

    /// The accumulated value of a flag.
    ///
    /// Returns `None` both for absent flags and for flags that appeared
    /// without a value; use [`Command::has_flag`] to tell them apart.
    pub fn opt(&self, flag: &str) -> Option<&str> {
        self.values.get(flag).and_then(|v| v.as_deref())
    }

    /// The accumulated value of a flag, or `default` when it has none.
    pub fn opt_or<'a>(&'a self, flag: &str, default: &'a str) -> &'a str {
        self.opt(flag).unwrap_or(default)
    }

    /// Unique flags in first-appearance order with their accumulated values.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, Option<&str>)> + '_ {
        self.flags
            .iter()
            .enumerate()
            .filter(|(i, flag)| !self.flags[..*i].contains(*flag))
            .map(|(_, flag)| (flag.as_str(), self.opt(flag)))
    }

    fn add_flag(&mut self, flag: &str) {
        self.flags.push(flag.to_string());
        self.values.entry(flag.to_string()).or_insert(None);
    }

    fn add_value(&mut self, flag: &str, value: String) {
        match self.values.entry(flag.to_string()).or_insert(None) {
            Some(existing) => {
                existing.push(' ');
                existing.push_str(&value);
            }
            slot => *slot = Some(value),
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Match `\s*-(\w+)` at the start of `input`.
fn take_flag(input: &str) -> Option<(&str, &str)> {
    let body = input.trim_start().strip_prefix('-')?;
    let end = body
        .find(|c: char| !is_word_char(c))
        .unwrap_or(body.len());
    if end == 0 {
        return None;
    }
    Some((&body[..end], &body[end..]))
}

/// Match one value token at the start of `input`, quoted forms first.
fn take_value(input: &str) -> Option<(String, &str)> {
    let body = input.trim_start();
    take_quoted(body, '{', '}')
        .or_else(|| take_quoted(body, '"', '"'))
        .or_else(|| take_word(body))
}

fn take_quoted(body: &str, open: char, close: char) -> Option<(String, &str)> {
    let inner = body.strip_prefix(open)?;
    let end = closing_delimiter(inner, close)?;

    let escaped: String = ['\\', close].iter().collect();
    let value = inner[..end].replace(&escaped, &close.to_string());
    Some((value, &inner[end + close.len_utf8()..]))
}

/// Byte offset of the delimiter that closes a quoted value.
///
/// This is the first `close` not directly preceded by a backslash. When
/// every `close` is escaped, the last one terminates the value.
fn closing_delimiter(inner: &str, close: char) -> Option<usize> {
    let mut prev = None;
    let mut last = None;
    for (i, c) in inner.char_indices() {
        if c == close {
            if prev != Some('\\') {
                return Some(i);
            }
            last = Some(i);
        }
        prev = Some(c);
    }
    last
}

fn take_word(body: &str) -> Option<(String, &str)> {
    let mut chars = body.chars();
    let first = chars.next()?;
    if first.is_whitespace() || (first == '-' && chars.next().is_some_and(is_word_char)) {
        return None;
    }

    let end = body.find(char::is_whitespace).unwrap_or(body.len());
    Some((body[..end].to_string(), &body[end..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_and_single_value() {
        let cmd = Command::parse(b"dspyRender -frame 12");
        assert_eq!(cmd.name(), "dspyRender");
        assert_eq!(cmd.flags(), ["frame"]);
        assert_eq!(cmd.opt("frame"), Some("12"));
    }

    #[test]
    fn test_name_only() {
        let cmd = Command::parse(b"stopRender");
        assert_eq!(cmd.name(), "stopRender");
        assert!(cmd.flags().is_empty());
        assert_eq!(cmd.pairs().count(), 0);

        let cmd = Command::parse(b"stopRender ");
        assert_eq!(cmd.name(), "stopRender");
        assert!(cmd.flags().is_empty());
    }

    #[test]
    fn test_empty_input() {
        let cmd = Command::parse(b"");
        assert_eq!(cmd.name(), "");
        assert!(cmd.flags().is_empty());
    }

    #[test]
    fn test_trailing_semicolon() {
        assert_eq!(Command::parse(b"foo -x y;"), Command::parse(b"foo -x y"));
        assert_eq!(Command::parse(b"foo -x y;").opt("x"), Some("y"));
        assert_eq!(Command::parse(b"stopRender;").name(), "stopRender");
    }

    #[test]
    fn test_only_one_semicolon_stripped() {
        let cmd = Command::parse(b"foo -x y;;");
        assert_eq!(cmd.opt("x"), Some("y;"));
    }

    #[test]
    fn test_brace_quoted() {
        let cmd = Command::parse(b"dspyParams -name {beauty pass} -user {j\nb}");
        assert_eq!(cmd.opt("name"), Some("beauty pass"));
        assert_eq!(cmd.opt("user"), Some("j\nb"));
    }

    #[test]
    fn test_brace_escape() {
        let cmd = Command::parse(br"foo -x {a\}b}");
        assert_eq!(cmd.opt("x"), Some("a}b"));
    }

    #[test]
    fn test_double_quote_escape() {
        let cmd = Command::parse(br#"foo -baz "James Brown" -say "a \"b\" c""#);
        assert_eq!(cmd.opt("baz"), Some("James Brown"));
        assert_eq!(cmd.opt("say"), Some(r#"a "b" c"#));
    }

    #[test]
    fn test_quoted_value_may_contain_flag_text() {
        let cmd = Command::parse(b"foo -x {a -y b} -z 1");
        assert_eq!(cmd.opt("x"), Some("a -y b"));
        assert_eq!(cmd.opt("z"), Some("1"));
        assert!(!cmd.has_flag("y"));
    }

    #[test]
    fn test_unterminated_quote_falls_back_to_word() {
        let cmd = Command::parse(b"foo -x {abc def");
        assert_eq!(cmd.opt("x"), Some("{abc def"));
    }

    #[test]
    fn test_all_escaped_uses_last_delimiter() {
        let cmd = Command::parse(br"foo -x {a\}");
        assert_eq!(cmd.opt("x"), Some(r"a\"));
    }

    #[test]
    fn test_multiple_values_join() {
        let cmd = Command::parse(b"dspyParams -crop 0.0 1 0.0 1.0 -foo bar");
        assert_eq!(cmd.opt("crop"), Some("0.0 1 0.0 1.0"));
        assert_eq!(cmd.opt("foo"), Some("bar"));
    }

    #[test]
    fn test_repeated_flag_concatenates() {
        let cmd = Command::parse(b"foo -x a -x b");
        assert_eq!(cmd.flags(), ["x", "x"]);
        assert_eq!(cmd.opt("x"), Some("a b"));

        let pairs: Vec<_> = cmd.pairs().collect();
        assert_eq!(pairs, vec![("x", Some("a b"))]);
    }

    #[test]
    fn test_unset_flag() {
        let cmd = Command::parse(b"foo -x -y 1");
        assert_eq!(cmd.flags(), ["x", "y"]);
        assert!(cmd.has_flag("x"));
        assert_eq!(cmd.opt("x"), None);
        assert_eq!(cmd.opt("y"), Some("1"));
        assert_eq!(cmd.opt_or("x", "fallback"), "fallback");
        assert_eq!(cmd.opt_or("missing", "fallback"), "fallback");
        assert_eq!(cmd.opt_or("y", "fallback"), "1");
    }

    #[test]
    fn test_repeated_unset_then_set() {
        let cmd = Command::parse(b"foo -x -x v");
        assert_eq!(cmd.opt("x"), Some("v"));
    }

    #[test]
    fn test_malformed_stops_silently() {
        // `junk` is where a flag should be; parsing halts with nothing.
        let cmd = Command::parse(b"foo junk -x 1");
        assert_eq!(cmd.name(), "foo");
        assert!(cmd.flags().is_empty());

        // A lone dash in value position is a bare word, not a flag.
        let cmd = Command::parse(b"foo -a 1 -x 2 - -b 3");
        assert_eq!(cmd.opt("a"), Some("1"));
        assert_eq!(cmd.opt("x"), Some("2 -"));
        assert_eq!(cmd.opt("b"), Some("3"));
    }

    #[test]
    fn test_negative_number_reads_as_flag() {
        let cmd = Command::parse(b"foo -shift -1");
        assert_eq!(cmd.flags(), ["shift", "1"]);
        assert_eq!(cmd.opt("shift"), None);
    }

    #[test]
    fn test_dash_word_value() {
        let cmd = Command::parse(b"foo -offset -.5");
        assert_eq!(cmd.opt("offset"), Some("-.5"));
    }

    #[test]
    fn test_handshake_line() {
        let cmd = Command::parse(b"UtTcpOpen -proto it;");
        assert_eq!(cmd.name(), "UtTcpOpen");
        assert_eq!(cmd.opt("proto"), Some("it"));

        let cmd = Command::parse(b"UtTcpOpen -proto {it} -user {j\nb} -baz \"James Brown\"");
        assert_eq!(cmd.opt("proto"), Some("it"));
        let pairs: Vec<_> = cmd.pairs().collect();
        assert_eq!(
            pairs,
            vec![
                ("proto", Some("it")),
                ("user", Some("j\nb")),
                ("baz", Some("James Brown")),
            ]
        );
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let cmd = Command::parse(b"foo -x a\xffb");
        assert_eq!(cmd.opt("x"), Some("a\u{fffd}b"));
    }
}
