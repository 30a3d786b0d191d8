//! Chat-template rendering.
//!
//! The model expects its conversation wrapped in the role markup of the
//! family it was trained on.  [`PromptFormatter`] renders the optional system
//! prompt and the user's message through a Jinja template (via `minijinja`)
//! with the generation prompt appended, exactly like a tokenizer's
//! `apply_chat_template(..., add_generation_prompt=True)` would.

use minijinja::{Environment, context};
use serde::Serialize;
use thiserror::Error;

use crate::cleaner::TemplateVariant;

/// Role tags with answers closed by `<|endofanswer|>`.
const GENERIC_TEMPLATE: &str = "{% for message in messages %}<|{{ message.role }}|>\n\
{{ message.content }}\n\
{% if message.role == 'assistant' %}<|endofanswer|>\n{% endif %}\
{% endfor %}\
{% if add_generation_prompt %}<|assistant|>\n{% endif %}";

/// Gemma 2 has no system role; the formatter folds it into the user turn.
const GEMMA2_TEMPLATE: &str = "{{ bos_token }}{% for message in messages %}<start_of_turn>\
{% if message.role == 'assistant' %}model{% else %}user{% endif %}\n\
{{ message.content }}<end_of_turn>\n\
{% endfor %}\
{% if add_generation_prompt %}<start_of_turn>model\n{% endif %}";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("chat template is invalid: {0}")]
    Template(#[from] minijinja::Error),

    #[error("failed to read chat template from {path}")]
    ReadTemplate {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A message in the shape chat templates iterate over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateMessage {
    pub role: &'static str,
    pub content: String,
}

/// Renders prompts for one template variant.
#[derive(Debug, Clone)]
pub struct PromptFormatter {
    variant: TemplateVariant,
    template: String,
    system_prompt: Option<String>,
}

impl PromptFormatter {
    /// Formatter using the built-in template of `variant`.
    pub fn new(variant: TemplateVariant) -> Self {
        let template = match variant {
            TemplateVariant::GenericAssistantTag => GENERIC_TEMPLATE,
            TemplateVariant::Gemma2Style => GEMMA2_TEMPLATE,
        };
        Self {
            variant,
            template: template.to_owned(),
            system_prompt: None,
        }
    }

    /// Formatter with a custom Jinja template; it is compiled once here so a
    /// broken template fails at startup rather than on the first request.
    pub fn with_template(
        variant: TemplateVariant,
        template: impl Into<String>,
    ) -> Result<Self, PromptError> {
        let template = template.into();
        Environment::new().template_from_str(&template)?;
        Ok(Self {
            variant,
            template,
            system_prompt: None,
        })
    }

    /// Load a custom template from disk.
    pub fn from_template_file(
        variant: TemplateVariant,
        path: impl AsRef<std::path::Path>,
    ) -> Result<Self, PromptError> {
        let path = path.as_ref();
        let template =
            std::fs::read_to_string(path).map_err(|source| PromptError::ReadTemplate {
                path: path.display().to_string(),
                source,
            })?;
        Self::with_template(variant, template)
    }

    pub fn with_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.system_prompt = system_prompt.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn variant(&self) -> TemplateVariant {
        self.variant
    }

    /// Messages handed to the template for a single user turn.
    pub fn messages(&self, user_message: &str) -> Vec<TemplateMessage> {
        match (&self.system_prompt, self.variant) {
            (None, _) => vec![TemplateMessage {
                role: "user",
                content: user_message.to_owned(),
            }],
            (Some(system), TemplateVariant::Gemma2Style) => vec![TemplateMessage {
                role: "user",
                content: format!("{system}\n\n{user_message}"),
            }],
            (Some(system), TemplateVariant::GenericAssistantTag) => vec![
                TemplateMessage {
                    role: "system",
                    content: system.clone(),
                },
                TemplateMessage {
                    role: "user",
                    content: user_message.to_owned(),
                },
            ],
        }
    }

    /// Render the full prompt, ending with the assistant generation prompt.
    pub fn render(&self, user_message: &str) -> Result<String, PromptError> {
        let env = Environment::new();
        let template = env.template_from_str(&self.template)?;
        let prompt = template.render(context! {
            messages => self.messages(user_message),
            add_generation_prompt => true,
            bos_token => "<bos>",
            eos_token => "<eos>",
        })?;
        Ok(prompt)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
