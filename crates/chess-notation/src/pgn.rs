//! PGN (Portable Game Notation) reading.
//!
//! Import-format parsing: the Seven Tag Roster plus arbitrary supplemental
//! tags, SAN move text with annotations, brace comments, nested variations,
//! and NAGs. Comments, variations, and NAGs are discarded; headers, cleaned
//! moves, and the result survive.

use serde::Serialize;

/// One parsed game.
///
/// `headers` preserves the order tags appeared in. `result` is one of
/// `1-0`, `0-1`, `1/2-1/2`, `*`, or empty when the game has no terminator.
/// `moves` holds SAN tokens with check, mate, and annotation symbols
/// stripped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PgnGame {
    /// Tag pairs in order of appearance.
    pub headers: Vec<(String, String)>,
    /// Cleaned SAN moves in game order.
    pub moves: Vec<String>,
    /// Result token, or empty if absent.
    pub result: String,
}

impl PgnGame {
    /// Looks up a header value by tag name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(tag, _)| tag == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Parser states for one game's token stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Initial,
    TagName,
    TagValue,
    TagClose,
    MoveText,
    Terminal,
}

/// Parses one game from PGN text.
///
/// Tolerant by design: malformed header pairs are silently dropped, unknown
/// move-text tokens are skipped, and a missing result terminator leaves
/// `result` empty.
pub fn parse_game(text: &str) -> PgnGame {
    let tokens = tokenize(text);
    let mut game = PgnGame::default();
    let mut state = State::Initial;
    let mut tag_name = String::new();
    let mut tag_value = String::new();

    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        match state {
            State::Initial => {
                if token == "[" {
                    state = State::TagName;
                } else {
                    state = State::MoveText;
                    continue; // Reprocess this token as move text.
                }
            }
            State::TagName => {
                tag_name = token.clone();
                state = State::TagValue;
            }
            State::TagValue => {
                tag_value = unquote(token).to_string();
                state = State::TagClose;
            }
            State::TagClose => {
                if token == "]" {
                    game.headers
                        .push((std::mem::take(&mut tag_name), std::mem::take(&mut tag_value)));
                    state = State::Initial;
                } else {
                    // Malformed pair: drop it and reprocess the token.
                    tag_name.clear();
                    tag_value.clear();
                    state = State::Initial;
                    continue;
                }
            }
            State::MoveText => {
                if is_result(token) {
                    game.result = token.clone();
                    state = State::Terminal;
                } else if !is_move_number(token) {
                    let cleaned = clean_move(token);
                    if is_san_move(cleaned) {
                        game.moves.push(cleaned.to_string());
                    }
                    // Everything else (en passant markers, stray symbols) is
                    // discarded.
                }
            }
            State::Terminal => {}
        }
        i += 1;
    }

    game
}

/// Splits PGN text into games and parses each.
///
/// A line beginning with `[Event ` starts a new game; content before the
/// first such line is ignored.
pub fn parse_games(text: &str) -> Vec<PgnGame> {
    let mut segments: Vec<String> = Vec::new();
    for line in text.lines() {
        if line.starts_with("[Event ") {
            segments.push(String::new());
        }
        if let Some(current) = segments.last_mut() {
            current.push_str(line);
            current.push('\n');
        }
    }
    segments.iter().map(|segment| parse_game(segment)).collect()
}

/// Formats a game back into PGN text.
///
/// Headers in their stored order, a blank separator line, then numbered
/// move text wrapped at 80 columns and closed by the result token (when
/// present). Parsing the output reproduces the game.
pub fn format_game(game: &PgnGame) -> String {
    let mut out = String::new();
    for (tag, value) in &game.headers {
        out.push_str(&format!("[{} \"{}\"]\n", tag, value));
    }
    if !game.headers.is_empty() {
        out.push('\n');
    }

    let mut tokens: Vec<String> = Vec::new();
    for (i, mv) in game.moves.iter().enumerate() {
        if i % 2 == 0 {
            tokens.push(format!("{}.", i / 2 + 1));
        }
        tokens.push(mv.clone());
    }
    if !game.result.is_empty() {
        tokens.push(game.result.clone());
    }

    let mut line_len = 0usize;
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            if line_len + 1 + token.len() > 80 {
                out.push('\n');
                line_len = 0;
            } else {
                out.push(' ');
                line_len += 1;
            }
        }
        out.push_str(token);
        line_len += token.len();
    }
    if !tokens.is_empty() {
        out.push('\n');
    }
    out
}

/// Single-pass PGN tokenizer.
///
/// `[` and `]` are single-character tokens, quoted strings are one token
/// (quotes included, unterminated strings close at end of input), brace
/// comments, nested parenthetical variations, and `$N` NAGs are consumed and
/// discarded, and any other run of plain characters is a token.
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '[' | ']' => tokens.push(c.to_string()),
            '"' => {
                let mut token = String::from('"');
                for next in chars.by_ref() {
                    token.push(next);
                    if next == '"' {
                        break;
                    }
                }
                // An unterminated string simply closes at end of input.
                tokens.push(token);
            }
            '{' => {
                for next in chars.by_ref() {
                    if next == '}' {
                        break;
                    }
                }
            }
            '(' => {
                let mut depth = 1usize;
                for next in chars.by_ref() {
                    match next {
                        '(' => depth += 1,
                        ')' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                }
            }
            '$' => {
                while chars.peek().is_some_and(|c| c.is_ascii_digit()) {
                    chars.next();
                }
            }
            _ => {
                let mut token = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_whitespace() || matches!(next, '[' | ']' | '{' | '}' | '(' | ')' | '"' | '$') {
                        break;
                    }
                    token.push(next);
                    chars.next();
                }
                tokens.push(token);
            }
        }
    }

    tokens
}

fn unquote(token: &str) -> &str {
    let token = token.strip_prefix('"').unwrap_or(token);
    token.strip_suffix('"').unwrap_or(token)
}

/// Move-number tokens: digits followed by one or more dots ("1.", "3...").
fn is_move_number(token: &str) -> bool {
    let digits_end = token.find(|c: char| !c.is_ascii_digit()).unwrap_or(token.len());
    digits_end > 0
        && digits_end < token.len()
        && token[digits_end..].chars().all(|c| c == '.')
}

fn is_result(token: &str) -> bool {
    matches!(token, "1-0" | "0-1" | "1/2-1/2" | "*")
}

/// Strips trailing annotation (`!`, `?`) and check/mate (`+`, `#`) symbols.
fn clean_move(token: &str) -> &str {
    token.trim_end_matches(['!', '?', '+', '#'])
}

/// Move-shaped tokens: castling, or piece/disambiguation/capture/destination
/// with an optional promotion.
fn is_san_move(token: &str) -> bool {
    if matches!(token, "O-O" | "O-O-O" | "0-0" | "0-0-0") {
        return true;
    }

    let mut body = token.as_bytes();
    if body.len() >= 2 && body[body.len() - 2] == b'=' {
        if !matches!(body[body.len() - 1], b'N' | b'B' | b'R' | b'Q') {
            return false;
        }
        body = &body[..body.len() - 2];
    }
    if body.len() < 2 {
        return false;
    }
    let (prefix, dest) = body.split_at(body.len() - 2);
    if !(dest[0].is_ascii_lowercase() && (b'a'..=b'h').contains(&dest[0])) {
        return false;
    }
    if !(b'1'..=b'8').contains(&dest[1]) {
        return false;
    }

    // Prefix shape: [NBRQK]? [a-h]? [1-8]? x?
    let mut i = 0;
    if i < prefix.len() && matches!(prefix[i], b'N' | b'B' | b'R' | b'Q' | b'K') {
        i += 1;
    }
    if i < prefix.len() && (b'a'..=b'h').contains(&prefix[i]) {
        i += 1;
    }
    if i < prefix.len() && (b'1'..=b'8').contains(&prefix[i]) {
        i += 1;
    }
    if i < prefix.len() && prefix[i] == b'x' {
        i += 1;
    }
    i == prefix.len()
}
