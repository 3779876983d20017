//! Prompt builders for every backend call. All output is plain text; the
//! JSON-only contract is restated in each system prompt because the
//! `json_object` response format alone does not pin the shape.

use recast_schema::{ContentStyle, ContentType, FieldLimits, Idea, Violations};

/// How much source content the indexing prompt carries.
const INDEX_CONTENT_CHARS: usize = 4000;

pub fn idea_system(style: &ContentStyle, min_ideas: usize, max_ideas: usize) -> String {
    format!(
        r#"You are a social media content strategist. Read the source text and propose between {min_ideas} and {max_ideas} distinct content ideas.

{style}

Respond with JSON only, in exactly this shape:
{{
  "ideas": [
    {{
      "content_type": "reel" | "carousel" | "tweet",
      "title": "short working title",
      "snippet": "a direct quote from the source text that grounds this idea",
      "type_hints": {{}}
    }}
  ]
}}

Every idea must be grounded in the source text. The snippet must be copied verbatim from the source. Vary the content types across the list."#,
        style = style.to_prompt_text(),
    )
}

pub fn idea_user(source_text: &str) -> String {
    format!("Source text:\n\n{source_text}")
}

pub fn artifact_system(
    content_type: ContentType,
    limits: &FieldLimits,
    style: &ContentStyle,
) -> String {
    let schema = artifact_schema(content_type, limits);
    format!(
        r#"You are a social media copywriter. Produce one finished {kind} from the idea and source text you are given.

{style}

Respond with JSON only, in exactly this shape:
{schema}

Do not include an "id" field; ids are assigned by the caller. Stay within every stated length limit. Ground the piece in the source text, not in outside knowledge."#,
        kind = content_type.as_str(),
        style = style.to_prompt_text(),
    )
}

fn artifact_schema(content_type: ContentType, limits: &FieldLimits) -> String {
    match content_type {
        ContentType::Reel => format!(
            r##"{{
  "content_type": "reel",
  "title": "string, at most {title} characters",
  "caption": "string, at most {caption} characters",
  "hook": "opening line that stops the scroll, required",
  "body": "the full spoken script, required",
  "visual_hints": "optional string of shot suggestions",
  "hashtags": ["#tag", "..."]
}}"##,
            title = limits.title_max,
            caption = limits.caption_max,
        ),
        ContentType::Carousel => format!(
            r##"{{
  "content_type": "carousel",
  "title": "string, at most {title} characters",
  "caption": "string, at most {caption} characters",
  "slides": [
    {{
      "slide_no": 1,
      "step_no": 1,
      "heading": "string, at most {heading} characters",
      "text": "string, at most {slide_text} characters"
    }}
  ],
  "hashtags": ["#tag", "..."]
}}

The "slides" list must contain between {min_slides} and {max_slides} slides."##,
            title = limits.title_max,
            caption = limits.caption_max,
            heading = limits.heading_max,
            slide_text = limits.slide_text_max,
            min_slides = limits.min_slides,
            max_slides = limits.max_slides,
        ),
        ContentType::Tweet => format!(
            r##"{{
  "content_type": "tweet",
  "title": "string, at most {title} characters",
  "text": "the tweet body, at most {tweet} characters",
  "thread": ["optional follow-up tweets, each at most {tweet} characters"],
  "hashtags": ["#tag", "..."]
}}"##,
            title = limits.title_max,
            tweet = limits.tweet_max,
        ),
    }
}

pub fn artifact_user(idea: &Idea, source_text: &str) -> String {
    let hints = if idea.type_hints.is_empty() {
        String::new()
    } else {
        format!(
            "\nType-specific suggestions:\n{}",
            serde_json::Value::Object(idea.type_hints.clone())
        )
    };
    format!(
        "Idea title: {title}\nGrounding quote: {snippet}{hints}\n\nFull source text:\n\n{source_text}",
        title = idea.title,
        snippet = idea.snippet,
    )
}

pub fn repair_user(idea: &Idea, failing_json: &serde_json::Value, violations: &Violations) -> String {
    format!(
        r#"Your previous answer violated these constraints:
{violations}

Previous answer:
{failing}

Fix every listed violation and respond again with the corrected JSON only. Keep the idea intact:
Idea title: {title}
Grounding quote: {snippet}"#,
        violations = violations.describe(),
        failing = failing_json,
        title = idea.title,
        snippet = idea.snippet,
    )
}

pub fn edit_system(content_type: ContentType, limits: &FieldLimits, style: &ContentStyle) -> String {
    let schema = artifact_schema(content_type, limits);
    format!(
        r#"You are editing an existing {kind}. Apply the requested change and nothing else: every field the instruction does not mention must come back unchanged.

{style}

Respond with JSON only, in exactly this shape:
{schema}

Do not include an "id" field. Stay within every stated length limit."#,
        kind = content_type.as_str(),
        style = style.to_prompt_text(),
    )
}

pub fn edit_user(original: &serde_json::Value, instruction: &str) -> String {
    format!("Current piece:\n{original}\n\nRequested change: {instruction}")
}

pub fn index_system() -> String {
    r#"You are a knowledge-base curator. Read the source material and extract its subject matter.

Respond with JSON only, in exactly this shape:
{
  "topics": ["3 to 7 short topic phrases"],
  "summary": "a 200 to 500 character summary of the material"
}"#
    .to_string()
}

pub fn index_user(title: &str, content: &str) -> String {
    let truncated: String = content.chars().take(INDEX_CONTENT_CHARS).collect();
    format!("Title: {title}\n\nContent:\n\n{truncated}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idea_system_carries_count_range_and_style() {
        let prompt = idea_system(&ContentStyle::default(), 5, 10);
        assert!(prompt.contains("between 5 and 10"));
        assert!(prompt.contains("Target Audience:"));
        assert!(prompt.contains("\"ideas\""));
    }

    #[test]
    fn carousel_schema_substitutes_limits() {
        let limits = FieldLimits {
            min_slides: 4,
            max_slides: 8,
            slide_text_max: 250,
            ..FieldLimits::default()
        };
        let prompt = artifact_system(ContentType::Carousel, &limits, &ContentStyle::default());
        assert!(prompt.contains("between 4 and 8 slides"));
        assert!(prompt.contains("at most 250 characters"));
        assert!(prompt.contains("Do not include an \"id\" field"));
    }

    #[test]
    fn tweet_schema_carries_tweet_limit() {
        let prompt = artifact_system(
            ContentType::Tweet,
            &FieldLimits::default(),
            &ContentStyle::default(),
        );
        assert!(prompt.contains("at most 280 characters"));
    }

    #[test]
    fn repair_prompt_lists_violations_and_previous_answer() {
        let idea = Idea {
            content_type: ContentType::Carousel,
            title: "Three steps".to_string(),
            snippet: "step one is scope".to_string(),
            type_hints: serde_json::Map::new(),
        };
        let violations = Violations::single("slides", "slide count 3 outside allowed range 4..=10");
        let failing = serde_json::json!({"content_type": "carousel", "slides": []});
        let prompt = repair_user(&idea, &failing, &violations);
        assert!(prompt.contains("- field 'slides'"));
        assert!(prompt.contains("\"carousel\""));
        assert!(prompt.contains("Three steps"));
    }

    #[test]
    fn index_user_truncates_long_content() {
        let content = "x".repeat(10_000);
        let prompt = index_user("Big", &content);
        assert!(prompt.len() < 4200);
    }
}
