use serde::{Deserialize, Serialize};

fn default_audience() -> String {
    "general audience interested in the topic".to_string()
}

fn default_tone() -> String {
    "Professional and engaging".to_string()
}

fn default_goal() -> String {
    "education, engagement".to_string()
}

fn default_call_to_action() -> String {
    "engage with our content and follow for more".to_string()
}

fn default_language() -> String {
    "English".to_string()
}

/// Editorial parameters rendered into every generation prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentStyle {
    #[serde(default = "default_audience")]
    pub audience: String,
    #[serde(default = "default_tone")]
    pub tone: String,
    #[serde(default = "default_goal")]
    pub goal: String,
    #[serde(default = "default_call_to_action")]
    pub call_to_action: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub instructions: Option<String>,
}

impl Default for ContentStyle {
    fn default() -> Self {
        Self {
            audience: default_audience(),
            tone: default_tone(),
            goal: default_goal(),
            call_to_action: default_call_to_action(),
            language: default_language(),
            instructions: None,
        }
    }
}

impl ContentStyle {
    /// Render the style block embedded verbatim into system prompts.
    pub fn to_prompt_text(&self) -> String {
        let mut lines = vec![
            format!("Target Audience: {}", self.audience),
            format!("Tone: {}", self.tone),
            format!("Content Goal: {}", self.goal),
            format!("Call To Action: {}", self.call_to_action),
            format!("Language: {}", self.language),
        ];
        if let Some(extra) = &self.instructions {
            lines.push(format!("Additional Instructions: {extra}"));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_style_renders_all_required_lines() {
        let text = ContentStyle::default().to_prompt_text();
        assert!(text.contains("Target Audience:"));
        assert!(text.contains("Language: English"));
        assert!(!text.contains("Additional Instructions"));
    }

    #[test]
    fn extra_instructions_are_appended() {
        let style = ContentStyle {
            instructions: Some("Write in Roman Urdu, never the native script.".to_string()),
            ..ContentStyle::default()
        };
        assert!(style
            .to_prompt_text()
            .ends_with("Additional Instructions: Write in Roman Urdu, never the native script."));
    }
}
