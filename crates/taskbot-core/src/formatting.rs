//! Telegram HTML helpers: escaping, previews, and splitting long messages.

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// First `max_chars` characters of `text`, with `...` appended when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Split HTML into chunks of at most `limit` bytes, preferring line breaks.
///
/// Lines that do not fit are cut between characters (never inside a tag or
/// an entity). Tags open at a cut are closed at the end of the chunk and
/// reopened at the start of the next one.
pub fn split_html_chunks(html: &str, limit: usize) -> Vec<String> {
    if html.len() <= limit {
        return vec![html.to_string()];
    }

    let mut chunker = Chunker::new(limit);
    for line in html.split_inclusive('\n') {
        if !chunker.fits(line) {
            chunker.flush();
        }
        if chunker.fits(line) {
            chunker.push(line);
            continue;
        }
        for token in html_tokens(line) {
            if !chunker.fits(token) {
                chunker.flush();
            }
            chunker.push(token);
        }
    }
    chunker.finish()
}

#[derive(Clone)]
struct OpenTag {
    raw: String,
    name: String,
}

struct Chunker {
    limit: usize,
    chunks: Vec<String>,
    current: String,
    /// Length of the reopened-tag prefix at the start of `current`.
    prefix_len: usize,
    open: Vec<OpenTag>,
}

impl Chunker {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            chunks: Vec::new(),
            current: String::new(),
            prefix_len: 0,
            open: Vec::new(),
        }
    }

    /// Whether `s` can be appended and the chunk still closed within the limit.
    fn fits(&self, s: &str) -> bool {
        let mut open = self.open.clone();
        track_tags(&mut open, s);
        let closing: usize = open.iter().map(|t| t.name.len() + 3).sum();
        self.current.len() + s.len() + closing <= self.limit
    }

    fn push(&mut self, s: &str) {
        self.current.push_str(s);
        track_tags(&mut self.open, s);
    }

    fn flush(&mut self) {
        if self.current[self.prefix_len..].trim().is_empty() {
            self.current.truncate(self.prefix_len);
            return;
        }
        for t in self.open.iter().rev() {
            self.current.push_str(&format!("</{}>", t.name));
        }
        self.chunks.push(std::mem::take(&mut self.current));
        for t in &self.open {
            self.current.push_str(&t.raw);
        }
        self.prefix_len = self.current.len();
    }

    fn finish(mut self) -> Vec<String> {
        if !self.current[self.prefix_len..].trim().is_empty() {
            self.chunks.push(self.current);
        }
        self.chunks
    }
}

fn track_tags(open: &mut Vec<OpenTag>, s: &str) {
    for token in html_tokens(s).filter(|t| t.starts_with('<')) {
        if let Some(rest) = token.strip_prefix("</") {
            let name = tag_name(rest);
            if let Some(pos) = open.iter().rposition(|t| t.name == name) {
                open.truncate(pos);
            }
        } else if !token.ends_with("/>") {
            open.push(OpenTag {
                raw: token.to_string(),
                name: tag_name(&token[1..]).to_string(),
            });
        }
    }
}

/// Tags, entities, and single characters.
fn html_tokens(s: &str) -> impl Iterator<Item = &str> {
    let mut rest = s;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let len = match first {
            '<' => rest.find('>').map(|i| i + 1),
            '&' => rest
                .find(';')
                .filter(|&i| i <= 10 && !rest[1..i].contains(char::is_whitespace))
                .map(|i| i + 1),
            _ => None,
        }
        .unwrap_or(first.len_utf8());
        let (token, tail) = rest.split_at(len);
        rest = tail;
        Some(token)
    })
}

fn tag_name(after_lt: &str) -> &str {
    let end = after_lt
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
        .unwrap_or(after_lt.len());
    &after_lt[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_user_text() {
        assert_eq!(
            escape_html(r#"<b>"Tom & Jerry"</b>"#),
            "&lt;b&gt;&quot;Tom &amp; Jerry&quot;&lt;/b&gt;"
        );
    }

    #[test]
    fn preview_counts_characters_not_bytes() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("ääääää", 3), "äää...");
        assert_eq!(preview("exactly8", 8), "exactly8");
    }

    #[test]
    fn keeps_short_html_intact() {
        let html = "📋 <b>Your Tasks:</b>\n\n⏳ <b>#1</b> x";
        assert_eq!(split_html_chunks(html, 4000), vec![html.to_string()]);
    }

    #[test]
    fn splits_task_list_on_line_boundaries() {
        let html = (1..=10)
            .map(|i| format!("⏳ <b>#{i}</b> task number {i}\n\n"))
            .collect::<String>();

        let chunks = split_html_chunks(&html, 80);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.len() <= 80, "{c}");
            assert_eq!(c.matches("<b>").count(), c.matches("</b>").count());
        }
        assert_eq!(chunks.concat(), html);
    }

    #[test]
    fn long_line_is_cut_with_tags_rebalanced() {
        let long = "x".repeat(200);
        let html = format!("head\n<b>{long}</b> &amp; tail");

        let chunks = split_html_chunks(&html, 50);
        assert!(chunks.len() > 2);
        for c in &chunks {
            assert!(c.len() <= 50, "{c}");
            assert_eq!(c.matches("<b>").count(), c.matches("</b>").count(), "{c}");
        }
        assert!(chunks.last().unwrap().ends_with("&amp; tail"));
    }

    #[test]
    fn multi_line_bold_is_closed_and_reopened_between_chunks() {
        let body = (0..20).map(|i| format!("line {i}\n")).collect::<String>();
        let html = format!("Add this?\n\n<b>\"{body}\"</b>");

        let chunks = split_html_chunks(&html, 60);
        assert!(chunks.len() > 2);
        for c in &chunks {
            assert!(c.len() <= 60, "{c}");
            assert_eq!(c.matches("<b>").count(), c.matches("</b>").count(), "{c}");
        }
        assert!(chunks[1].starts_with("<b>"));
    }

    #[test]
    fn tokens_keep_entities_whole() {
        let toks: Vec<&str> = html_tokens("a&amp;<i>é</i>& b").collect();
        assert_eq!(toks, vec!["a", "&amp;", "<i>", "é", "</i>", "&", " ", "b"]);
    }
}
