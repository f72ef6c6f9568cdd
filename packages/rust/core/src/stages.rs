//! Data-driven generation stages.
//!
//! Every model-backed step of the pipeline is a [`Stage`]: a role, a
//! [`StageProfile`], and a [`TextGenerator`]. Prompts are rendered from the
//! role and profile, so a new tone or checklist is configuration, not code.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use articleforge_llm::{GenerationParams, Prompt, TextGenerator};
use articleforge_shared::{ArticleForgeError, Result, StageProfile};
use articleforge_text::{clean_generated, is_approval_sentinel};

const DEFAULT_TARGET_WORDS: u32 = 400;
const DEFAULT_STRICTNESS: u8 = 5;

// ---------------------------------------------------------------------------
// Roles and inputs
// ---------------------------------------------------------------------------

/// Which step of the pipeline a stage performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageRole {
    /// Routes raw facts to headings (JSON reply).
    Distributor,
    /// Drafts one section.
    Producer,
    /// Neutralizes unsupported claims in a draft.
    Verifier,
    /// Normalizes style without changing meaning.
    Stylist,
}

impl StageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Distributor => "distributor",
            Self::Producer => "producer",
            Self::Verifier => "verifier",
            Self::Stylist => "stylist",
        }
    }

    fn default_temperature(&self) -> f32 {
        match self {
            Self::Distributor => 0.2,
            Self::Producer => 0.3,
            Self::Verifier => 0.0,
            Self::Stylist => 0.3,
        }
    }

    /// Roles that rewrite an existing text and must always hand one back.
    fn is_revision(&self) -> bool {
        matches!(self, Self::Verifier | Self::Stylist)
    }
}

impl std::fmt::Display for StageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a stage is asked to work on. Each role accepts one shape.
#[derive(Debug, Clone, Copy)]
pub enum StageInput<'a> {
    Distribute {
        raw_facts: &'a str,
        headings: &'a [String],
    },
    Produce {
        heading: &'a str,
        topic: &'a str,
        facts: &'a [String],
    },
    Revise {
        text: &'a str,
    },
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// One configured pipeline step.
#[derive(Clone)]
pub struct Stage {
    role: StageRole,
    profile: StageProfile,
    default_model: String,
    generator: Arc<dyn TextGenerator>,
    call_timeout: Duration,
}

impl Stage {
    pub fn new(
        role: StageRole,
        profile: StageProfile,
        default_model: impl Into<String>,
        generator: Arc<dyn TextGenerator>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            role,
            profile,
            default_model: default_model.into(),
            generator,
            call_timeout,
        }
    }

    pub fn role(&self) -> StageRole {
        self.role
    }

    /// Sampling parameters: profile values over role defaults.
    pub fn params(&self) -> GenerationParams {
        let p = &self.profile;
        GenerationParams {
            model: p
                .model
                .clone()
                .unwrap_or_else(|| self.default_model.clone()),
            temperature: Some(p.temperature.unwrap_or(self.role.default_temperature())),
            top_p: p.top_p,
            presence_penalty: p.presence_penalty,
            frequency_penalty: p.frequency_penalty,
            max_tokens: p.max_tokens,
        }
    }

    /// Render the prompt for `input`. The input shape must match the role.
    pub fn render(&self, input: &StageInput<'_>) -> Result<Prompt> {
        let (system, user) = match (self.role, input) {
            (StageRole::Distributor, StageInput::Distribute { raw_facts, headings }) => (
                distributor_system(),
                distributor_user(raw_facts, headings),
            ),
            (StageRole::Producer, StageInput::Produce { heading, topic, facts }) => (
                producer_system(&self.profile, facts),
                producer_user(&self.profile, heading, topic),
            ),
            (StageRole::Verifier, StageInput::Revise { text }) => {
                (verifier_system(&self.profile), verifier_user(text))
            }
            (StageRole::Stylist, StageInput::Revise { text }) => {
                (stylist_system(&self.profile), stylist_user(text))
            }
            (role, _) => {
                return Err(ArticleForgeError::validation(format!(
                    "{role} stage received an input it does not accept"
                )));
            }
        };

        Ok(Prompt {
            system,
            user,
            params: self.params(),
        })
    }

    /// Render, call the generator under the per-call deadline, and normalize
    /// the reply.
    ///
    /// Producer replies that clean up to nothing are a generation failure.
    /// Verifier and stylist replies that are empty or a bare approval fall
    /// back to the input text. Distributor replies are returned raw.
    #[instrument(skip_all, fields(role = %self.role))]
    pub async fn run(&self, input: StageInput<'_>) -> Result<String> {
        let prompt = self.render(&input)?;

        let reply = tokio::time::timeout(self.call_timeout, self.generator.complete(&prompt))
            .await
            .map_err(|_| {
                ArticleForgeError::Generation(format!(
                    "{} call timed out after {:?}",
                    self.role, self.call_timeout
                ))
            })??;

        if self.role == StageRole::Distributor {
            return Ok(reply);
        }

        let cleaned = clean_generated(&reply);

        match input {
            StageInput::Revise { text } if self.role.is_revision() => {
                if cleaned.is_empty() || is_approval_sentinel(&cleaned) {
                    warn!(role = %self.role, "reply carried no text, keeping input");
                    return Ok(text.trim().to_string());
                }
            }
            _ => {
                if cleaned.is_empty() {
                    return Err(ArticleForgeError::Generation(format!(
                        "{} returned an empty text",
                        self.role
                    )));
                }
            }
        }

        debug!(chars = cleaned.len(), "stage output ready");
        Ok(cleaned)
    }
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("role", &self.role)
            .field("model", &self.params().model)
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Prompt rendering
// ---------------------------------------------------------------------------

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|i| format!("- {}", i.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn distributor_system() -> String {
    "You filter and condense facts for an article.\n\
     1. You receive a list of raw facts, possibly overlapping, and a list of section headings.\n\
     2. Assign each fact to the one heading it clearly belongs to. Drop facts that fit no heading.\n\
     3. Remove duplicates and doubtful claims. Reword each fact briefly instead of copying the source.\n\
     4. Do not invent facts. Do not add commentary.\n\n\
     Reply with a single JSON object whose keys are the headings exactly as given and whose \
     values are arrays of short fact strings, for example:\n\
     {\"Heading one\": [\"Fact 1\", \"Fact 2\"], \"Heading two\": []}"
        .to_string()
}

fn distributor_user(raw_facts: &str, headings: &[String]) -> String {
    format!(
        "Raw facts:\n{raw_facts}\n\nHeadings:\n{}",
        bullet_list(headings)
    )
}

fn producer_system(p: &StageProfile, facts: &[String]) -> String {
    let style = p.style.as_deref().unwrap_or("informative");
    let tone = p.tone.as_deref().unwrap_or("neutral");

    let mut s = format!(
        "You are an experienced writer producing informative article sections.\n\
         Style: {style}. Tone: {tone}.\n\n\
         Write only to the point:\n\
         - No introductions, filler, or transitions between sections.\n\
         - No cliches or boilerplate phrases.\n\
         - Do not repeat yourself.\n\
         - Do not repeat the heading. Plain paragraphs only, separated by blank lines.\n"
    );

    if let Some(example) = p.example_text.as_deref().filter(|e| !e.trim().is_empty()) {
        let _ = write!(
            s,
            "\nExample of the wanted style. Follow its structure and wording, not its content:\n{}\n",
            example.trim()
        );
    }

    let mut criteria = Vec::new();
    if p.criteria.use_examples {
        criteria.push("- Give concrete examples.".to_string());
    }
    if p.criteria.use_numerical_data {
        criteria.push("- Use numerical data where the facts provide it.".to_string());
    }
    if p.criteria.min_paragraphs.is_some() || p.criteria.max_paragraphs.is_some() {
        criteria.push(format!(
            "- Between {} and {} paragraphs.",
            p.criteria.min_paragraphs.unwrap_or(2),
            p.criteria.max_paragraphs.unwrap_or(4)
        ));
    }
    let _ = write!(
        s,
        "\nCriteria:\n{}\n",
        if criteria.is_empty() {
            "- No additional criteria.".to_string()
        } else {
            criteria.join("\n")
        }
    );

    if facts.is_empty() {
        s.push_str(
            "\nNo facts are available. Write from general principles and do not state \
             specific figures, dates, or sources.\n",
        );
    } else {
        let _ = write!(
            s,
            "\nFacts you may use. Do not introduce facts beyond this list:\n{}\n",
            bullet_list(facts)
        );
        if p.use_citations {
            let _ = write!(
                s,
                "Cite the facts you use in {} style.\n",
                p.citation_style.as_deref().unwrap_or("APA")
            );
        }
    }

    s
}

fn producer_user(p: &StageProfile, heading: &str, topic: &str) -> String {
    format!(
        "Write the content for the heading:\n\"{heading}\"\n\n\
         In the context of the overall topic:\n\"{topic}\"\n\n\
         Length: about {} words.",
        p.target_words.unwrap_or(DEFAULT_TARGET_WORDS)
    )
}

fn verifier_system(p: &StageProfile) -> String {
    let strictness = p.strictness.unwrap_or(DEFAULT_STRICTNESS).clamp(1, 10);
    let checklist = if p.checklist.is_empty() {
        "- none".to_string()
    } else {
        bullet_list(&p.checklist)
    };
    let fallback = if p.fallback_strategies.is_empty() {
        "- none".to_string()
    } else {
        bullet_list(&p.fallback_strategies)
    };

    format!(
        "You are a fact-checking editor. Check the factual accuracy of the text.\n\
         Strictness: {strictness}/10.\n\n\
         Checklist:\n{checklist}\n\n\
         Fallback strategies:\n{fallback}\n\n\
         On a critical error: {}.\n\
         On a minor error: {}.\n\n\
         Correct factual inaccuracies you find. If a claim is not supported, rephrase it in \
         neutral form instead of asserting it.\n\
         Always reply with the full text. If nothing needs fixing, reply with the text \
         unchanged. Never reply with a remark such as \"no changes needed\".",
        p.on_critical_error
            .as_deref()
            .unwrap_or("rewrite the claim in neutral form"),
        p.on_minor_error.as_deref().unwrap_or("correct it in place"),
    )
}

fn verifier_user(text: &str) -> String {
    format!(
        "Check and, if needed, correct the text inside the <text> block. Keep its overall \
         style. Reply with the text only, without the tags.\n\n{}",
        text_block(text)
    )
}

fn stylist_system(p: &StageProfile) -> String {
    let mut rules = vec![format!("- Tone: {}.", p.tone.as_deref().unwrap_or("neutral"))];
    if let Some(person) = &p.preferred_person {
        rules.push(format!("- Write in the {person} person."));
    }
    if let Some(lang) = &p.language {
        rules.push(format!("- Language: {lang}."));
    }
    if let Some(max) = p.max_line_length {
        rules.push(format!("- Keep sentences under {max} characters."));
    }
    if p.spell_check.unwrap_or(true) {
        rules.push("- Fix spelling.".into());
    }
    if p.punctuation_check.unwrap_or(true) {
        rules.push("- Fix punctuation.".into());
    }
    if p.avoid_jargon {
        rules.push("- Replace jargon with plain words.".into());
    }
    if p.simplify {
        rules.push("- Simplify convoluted sentences.".into());
    }
    rules.extend(p.additional_rules.iter().map(|r| format!("- {}", r.trim())));

    format!(
        "You are a style editor. Bring the text to a consistent style without changing \
         its meaning or facts.\n\nRules:\n{}\n\n\
         Reply with the edited text only, keeping the paragraph breaks.",
        rules.join("\n")
    )
}

fn stylist_user(text: &str) -> String {
    format!(
        "Edit the text inside the <text> block. Reply with the text only, without the \
         tags.\n\n{}",
        text_block(text)
    )
}

/// Delimit text under edit so its own quotes stay part of the content.
fn text_block(text: &str) -> String {
    format!("<text>\n{}\n</text>", text.trim())
}
