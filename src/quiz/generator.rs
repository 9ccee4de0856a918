use chatgpt::client::ChatGPT;
use chatgpt::types::CompletionResponse;

use crate::quiz::QuizQuestion;

pub const GENERATION_FAILED_MESSAGE: &str =
    "Failed to generate quiz. The topic might be too restrictive or the service may be unavailable.";

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("chat backend error: {0}")]
    Backend(#[from] chatgpt::err::Error),
    #[error("the reply is not a valid question array: {0}")]
    BadJson(#[from] serde_json::Error),
    #[error("the reply contains no questions")]
    Empty,
    #[error("question {index} is malformed: {reason}")]
    BadShape { index: usize, reason: String },
}

pub struct QuizGenerator {
    chat_gpt: ChatGPT,
}

impl QuizGenerator {
    pub fn new(chat_gpt: ChatGPT) -> Self {
        Self { chat_gpt }
    }

    pub async fn generate(
        &self,
        topic: &str,
        count: usize,
    ) -> Result<Vec<QuizQuestion>, GenerateError> {
        log::debug!("Requesting {} questions on {:?}", count, topic);

        let prompt = build_prompt(topic, count);
        let response: CompletionResponse = self.chat_gpt.send_message(&prompt).await?;
        let content = response.message().clone().content;

        log::debug!("Completion: {:?}", content);

        parse_questions(&content)
    }
}

fn build_prompt(topic: &str, count: usize) -> String {
    format!(
        "Generate a JSON array of {count} unique and challenging multiple-choice quiz questions on the topic: \"{topic}\".\n\
         Each question must have exactly 4 options.\n\
         Ensure one option is clearly the correct answer.\n\
         The other three options should be plausible but incorrect distractors.\n\
         The \"correctAnswer\" field must be an exact match to one of the strings in the \"options\" array.\n\
         Reply with nothing but the raw JSON array, no markdown fences and no commentary, shaped like:\n\
         [{{\"question\": \"...\", \"options\": [\"...\", \"...\", \"...\", \"...\"], \"correctAnswer\": \"...\"}}]"
    )
}

fn parse_questions(reply: &str) -> Result<Vec<QuizQuestion>, GenerateError> {
    let questions: Vec<QuizQuestion> = serde_json::from_str(strip_code_fences(reply))?;

    if questions.is_empty() {
        return Err(GenerateError::Empty);
    }
    for (index, question) in questions.iter().enumerate() {
        if question.options.len() != 4 {
            return Err(GenerateError::BadShape {
                index,
                reason: format!("expected 4 options, got {}", question.options.len()),
            });
        }
        if !question.options.contains(&question.correct_answer) {
            return Err(GenerateError::BadShape {
                index,
                reason: "correctAnswer does not match any option".to_string(),
            });
        }
    }

    Ok(questions)
}

// The model sometimes wraps the array in a ```json fence despite being told not to.
fn strip_code_fences(reply: &str) -> &str {
    let reply = reply.trim();
    let reply = reply
        .strip_prefix("```json")
        .or_else(|| reply.strip_prefix("```"))
        .unwrap_or(reply);
    let reply = reply.strip_suffix("```").unwrap_or(reply);
    reply.trim()
}
