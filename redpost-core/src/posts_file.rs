use crate::types::PostRecord;
use tracing::debug;

#[derive(Debug, Default)]
struct PendingPost {
    subreddit: Option<String>,
    title: Option<String>,
    url: Option<String>,
    flair_id: Option<String>,
    flair_text: Option<String>,
    touched: bool,
}

impl PendingPost {
    fn into_record(self, id: u32) -> PostRecord {
        PostRecord::new(
            id,
            self.subreddit.unwrap_or_default(),
            self.title.unwrap_or_default(),
            self.url,
            self.flair_id,
            self.flair_text,
        )
    }
}

/// Parses an uploaded posts file.
///
/// Records are blocks of `key: value` lines separated by a blank line or a
/// `---` line. Ids are assigned from 1 in file order.
pub fn parse_posts_file(bytes: &[u8]) -> Vec<PostRecord> {
    let text = String::from_utf8_lossy(bytes);
    let mut posts = Vec::new();
    let mut pending = PendingPost::default();

    for (line_no, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();

        if line.is_empty() || line == "---" {
            flush(&mut pending, &mut posts);
            continue;
        }
        if line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            debug!("Ignoring line {} without a key: {:?}", line_no + 1, line);
            continue;
        };
        let value = value.trim().to_string();

        match key.trim().to_ascii_lowercase().as_str() {
            "subreddit" | "sr" | "r" => {
                pending.subreddit = Some(strip_subreddit_prefix(&value).to_string());
            }
            "title" => pending.title = Some(value),
            "url" | "link" => pending.url = Some(value),
            "flair_id" => pending.flair_id = Some(value),
            "flair" | "flair_text" => pending.flair_text = Some(value),
            other => {
                debug!("Ignoring unknown key '{}' on line {}", other, line_no + 1);
                continue;
            }
        }
        pending.touched = true;
    }
    flush(&mut pending, &mut posts);

    debug!("Parsed {} posts from upload", posts.len());
    posts
}

fn flush(pending: &mut PendingPost, posts: &mut Vec<PostRecord>) {
    let block = std::mem::take(pending);
    if block.touched {
        let id = posts.len() as u32 + 1;
        posts.push(block.into_record(id));
    }
}

fn strip_subreddit_prefix(value: &str) -> &str {
    value
        .trim_start_matches('/')
        .strip_prefix("r/")
        .unwrap_or(value.trim_start_matches('/'))
        .trim_end_matches('/')
}
