use serde::Serialize;

/// Slack rejects section text longer than this.
pub const SECTION_TEXT_LIMIT: usize = 3_000;
/// Slack rejects messages with more blocks than this.
pub const MESSAGE_BLOCK_LIMIT: usize = 50;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { block_id: String, text: TextObject },
    Divider { block_id: String },
    Context { block_id: String, elements: Vec<TextObject> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), text: builder.build() });
        self
    }

    pub fn divider(mut self, block_id: impl Into<String>) -> Self {
        self.blocks.push(Block::Divider { block_id: block_id.into() });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

/// The estimate split across as many sections as Slack's text limit requires,
/// followed by a context line naming the requester and task.
pub fn estimate_message(response_text: &str, requester: Option<&str>, task_id: &str) -> MessageTemplate {
    let chunks = chunk_text(response_text, SECTION_TEXT_LIMIT);
    // One block is reserved for the context footer.
    let section_budget = MESSAGE_BLOCK_LIMIT - 1;
    let truncated = chunks.len() > section_budget;

    let mut builder = MessageBuilder::new(fallback_summary(response_text));
    for (index, chunk) in chunks.into_iter().take(section_budget).enumerate() {
        builder = builder.section(format!("estimate.body.{index}.v1"), |section| {
            section.mrkdwn(chunk);
        });
    }

    builder
        .context("estimate.context.v1", |context| {
            if let Some(requester) = requester {
                context.mrkdwn(format!("Requested by <@{requester}>"));
            }
            context.plain(format!("Task ID: {task_id}"));
            if truncated {
                context.plain("Estimate truncated to fit one message.");
            }
        })
        .build()
}

/// Diagnostics can carry whole upstream error bodies, so they are chunked and
/// capped the same way estimates are.
pub fn error_message(summary: &str, correlation_id: &str) -> MessageTemplate {
    let chunks = chunk_text(&format!(":warning: {summary}"), SECTION_TEXT_LIMIT);
    let section_budget = MESSAGE_BLOCK_LIMIT - 1;
    let truncated = chunks.len() > section_budget;

    let mut builder = MessageBuilder::new(fallback_summary(summary));
    for (index, chunk) in chunks.into_iter().take(section_budget).enumerate() {
        builder = builder.section(format!("estimate.error.summary.{index}.v1"), |section| {
            section.mrkdwn(chunk);
        });
    }

    builder
        .context("estimate.error.context.v1", |context| {
            context.plain(format!("Correlation ID: {correlation_id}"));
            if truncated {
                context.plain("Diagnostic truncated to fit one message.");
            }
        })
        .build()
}

pub fn help_message() -> MessageTemplate {
    MessageBuilder::new("Cost estimator help")
        .section("estimate.help.summary.v1", |section| {
            section.mrkdwn(
                "*Usage*\n• `/estimate <architecture description>`\n• Mention me with a description\n• Reply in an estimate thread to ask again",
            );
        })
        .divider("estimate.help.divider.v1")
        .context("estimate.help.example.v1", |context| {
            context.mrkdwn(
                "Example: `/estimate one t3.medium EC2 instance and 100 GB of S3 Standard in us-east-1`",
            );
        })
        .build()
}

/// Splits on line boundaries where possible; a single line longer than
/// `limit` is split on character boundaries.
pub fn chunk_text(text: &str, limit: usize) -> Vec<String> {
    if text.chars().count() <= limit {
        return vec![text.to_owned()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len > limit {
            let mut piece = String::new();
            let mut piece_len = 0;
            for ch in line.chars() {
                if piece_len == limit {
                    chunks.push(std::mem::take(&mut piece));
                    piece_len = 0;
                }
                piece.push(ch);
                piece_len += 1;
            }
            current = piece;
            current_len = piece_len;
        } else {
            current.push_str(line);
            current_len += line_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn fallback_summary(text: &str) -> String {
    const FALLBACK_CHARS: usize = 200;
    let first_line = text.lines().find(|line| !line.trim().is_empty()).unwrap_or("Cost estimate");
    if first_line.chars().count() > FALLBACK_CHARS {
        let mut summary = first_line.chars().take(FALLBACK_CHARS).collect::<String>();
        summary.push('…');
        summary
    } else {
        first_line.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        chunk_text, error_message, estimate_message, help_message, Block, MessageBuilder, TextObject,
        MESSAGE_BLOCK_LIMIT, SECTION_TEXT_LIMIT,
    };

    #[test]
    fn message_builder_creates_typed_block_structure() {
        let message = MessageBuilder::new("fallback")
            .section("estimate.summary.v1", |section| {
                section.mrkdwn("*Monthly total*");
            })
            .divider("estimate.divider.v1")
            .build();

        assert_eq!(message.blocks.len(), 2);
        assert!(matches!(
            &message.blocks[0],
            Block::Section { block_id, text: TextObject::Mrkdwn { .. } } if block_id == "estimate.summary.v1"
        ));
        assert!(matches!(&message.blocks[1], Block::Divider { .. }));
    }

    #[test]
    fn blocks_serialize_with_slack_type_tags() {
        let message = error_message("Cannot estimate", "corr-1");
        let json = serde_json::to_value(&message.blocks).expect("serialize blocks");

        assert_eq!(json[0]["type"], "section");
        assert_eq!(json[0]["text"]["type"], "mrkdwn");
        assert_eq!(json[1]["type"], "context");
        assert_eq!(json[1]["elements"][0]["type"], "plain_text");
    }

    #[test]
    fn error_template_contains_correlation_id() {
        let message = error_message("Cannot process request", "req-123");
        let Block::Context { elements, .. } = &message.blocks[1] else {
            panic!("expected context block");
        };

        assert!(matches!(
            elements.first(),
            Some(TextObject::Plain { text }) if text.contains("req-123")
        ));
    }

    #[test]
    fn short_estimate_is_one_section_plus_context() {
        let message = estimate_message("*Total:* $2.30 per month", Some("U42"), "task-1");

        assert_eq!(message.blocks.len(), 2);
        assert_eq!(message.fallback_text, "*Total:* $2.30 per month");
        let Block::Context { elements, .. } = &message.blocks[1] else {
            panic!("expected context block");
        };
        assert!(matches!(&elements[0], TextObject::Mrkdwn { text } if text == "Requested by <@U42>"));
        assert!(matches!(&elements[1], TextObject::Plain { text } if text == "Task ID: task-1"));
    }

    #[test]
    fn long_estimate_is_split_under_section_limit() {
        let line = format!("{}\n", "x".repeat(1_000));
        let text = line.repeat(7);

        let message = estimate_message(&text, None, "task-2");
        let sections = message
            .blocks
            .iter()
            .filter_map(|block| match block {
                Block::Section { text: TextObject::Mrkdwn { text }, .. } => Some(text.clone()),
                _ => None,
            })
            .collect::<Vec<_>>();

        assert!(sections.len() > 1);
        assert!(sections.iter().all(|section| section.chars().count() <= SECTION_TEXT_LIMIT));
        assert_eq!(sections.concat(), text);
    }

    #[test]
    fn oversized_line_is_split_on_characters() {
        let chunks = chunk_text(&"é".repeat(25), 10);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chars().count(), 10);
        assert_eq!(chunks[2].chars().count(), 5);
    }

    #[test]
    fn block_count_never_exceeds_slack_limit() {
        let text = "y".repeat(SECTION_TEXT_LIMIT * (MESSAGE_BLOCK_LIMIT + 5));

        let message = estimate_message(&text, None, "task-3");

        assert_eq!(message.blocks.len(), MESSAGE_BLOCK_LIMIT);
        let Some(Block::Context { elements, .. }) = message.blocks.last() else {
            panic!("expected trailing context block");
        };
        assert!(elements
            .iter()
            .any(|element| matches!(element, TextObject::Plain { text } if text.contains("truncated"))));
    }

    #[test]
    fn oversized_diagnostic_stays_within_slack_limits() {
        let diagnostic = format!("model returned HTTP 500: {}", "<html>".repeat(2_000));

        let message = error_message(&diagnostic, "corr-9");

        assert!(message.blocks.len() <= MESSAGE_BLOCK_LIMIT);
        assert!(message.blocks.len() > 2);
        assert!(message.blocks.iter().all(|block| match block {
            Block::Section { text: TextObject::Mrkdwn { text }, .. } => text.chars().count() <= SECTION_TEXT_LIMIT,
            _ => true,
        }));
        assert!(message.fallback_text.chars().count() <= 201);
        assert!(matches!(
            message.blocks.last(),
            Some(Block::Context { elements, .. })
                if matches!(elements.first(), Some(TextObject::Plain { text }) if text == "Correlation ID: corr-9")
        ));
    }

    #[test]
    fn endless_diagnostic_is_capped_at_block_limit() {
        let diagnostic = "z".repeat(SECTION_TEXT_LIMIT * (MESSAGE_BLOCK_LIMIT + 2));

        let message = error_message(&diagnostic, "corr-10");

        assert_eq!(message.blocks.len(), MESSAGE_BLOCK_LIMIT);
        let Some(Block::Context { elements, .. }) = message.blocks.last() else {
            panic!("expected trailing context block");
        };
        assert!(elements
            .iter()
            .any(|element| matches!(element, TextObject::Plain { text } if text.contains("truncated"))));
    }

    #[test]
    fn help_mentions_estimate_command() {
        let message = help_message();
        let Block::Section { text: TextObject::Mrkdwn { text }, .. } = &message.blocks[0] else {
            panic!("expected markdown section");
        };

        assert!(text.contains("/estimate"));
    }
}
