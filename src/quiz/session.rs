use crate::quiz::QuizQuestion;

pub const QUIZ_LENGTH: usize = 5;

pub const EMPTY_TOPIC_ERROR: &str = "Please enter a topic.";
pub const TOO_FEW_QUESTIONS_ERROR: &str =
    "Could not generate enough questions for the quiz. Please try a different topic.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Phase {
    #[default]
    TopicSelection,
    Loading,
    QuizActive,
    Score,
}

#[derive(Debug, Clone)]
pub enum Event {
    SubmitTopic(String),
    QuestionsReady(Vec<QuizQuestion>),
    GenerationFailed(String),
    Answer { correct: bool },
    Restart,
    NewTopic,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Generate { topic: String },
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct QuizSession {
    pub topic: String,
    pub questions: Vec<QuizQuestion>,
    pub current_index: usize,
    pub score: usize,
    pub phase: Phase,
    pub last_error: Option<String>,
}

impl QuizSession {
    pub fn current_question(&self) -> Option<&QuizQuestion> {
        self.questions.get(self.current_index)
    }

    // Runs one transition. The returned command, if any, is the side effect
    // the caller must perform (there is only one: request a question set).
    pub fn apply(&mut self, event: Event) -> Option<Command> {
        match (self.phase, event) {
            (Phase::TopicSelection, Event::SubmitTopic(topic)) => {
                let topic = topic.trim().to_string();
                if topic.is_empty() {
                    self.last_error = Some(EMPTY_TOPIC_ERROR.to_string());
                    return None;
                }
                self.topic = topic;
                self.last_error = None;
                self.score = 0;
                self.current_index = 0;
                self.phase = Phase::Loading;
                Some(Command::Generate {
                    topic: self.topic.clone(),
                })
            }
            (Phase::Loading, Event::QuestionsReady(mut questions)) => {
                if questions.len() < QUIZ_LENGTH {
                    self.questions.clear();
                    self.last_error = Some(TOO_FEW_QUESTIONS_ERROR.to_string());
                    self.phase = Phase::TopicSelection;
                    return None;
                }
                questions.truncate(QUIZ_LENGTH);
                self.questions = questions;
                self.phase = Phase::QuizActive;
                None
            }
            (Phase::Loading, Event::GenerationFailed(message)) => {
                self.questions.clear();
                self.last_error = Some(message);
                self.phase = Phase::TopicSelection;
                None
            }
            (Phase::QuizActive, Event::Answer { correct }) => {
                if correct {
                    self.score += 1;
                }
                if self.current_index + 1 < self.questions.len() {
                    self.current_index += 1;
                } else {
                    self.phase = Phase::Score;
                }
                None
            }
            (Phase::Score, Event::Restart) => {
                self.score = 0;
                self.current_index = 0;
                self.questions.clear();
                self.phase = Phase::Loading;
                Some(Command::Generate {
                    topic: self.topic.clone(),
                })
            }
            (Phase::Score, Event::NewTopic) => {
                *self = Self::default();
                None
            }
            // Everything else is out of phase (e.g. a stale generation result)
            // and leaves the session untouched.
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn questions(n: usize) -> Vec<QuizQuestion> {
        (0..n)
            .map(|i| QuizQuestion {
                question: format!("Question {i}"),
                options: vec![
                    "A".to_string(),
                    "B".to_string(),
                    "C".to_string(),
                    "D".to_string(),
                ],
                correct_answer: "A".to_string(),
            })
            .collect()
    }

    fn loaded_session(topic: &str) -> QuizSession {
        let mut session = QuizSession::default();
        session.apply(Event::SubmitTopic(topic.to_string()));
        session.apply(Event::QuestionsReady(questions(QUIZ_LENGTH)));
        session
    }

    #[test]
    fn submitting_a_topic_starts_loading_and_clears_the_error() {
        let mut session = QuizSession {
            last_error: Some("old error".to_string()),
            ..QuizSession::default()
        };

        let command = session.apply(Event::SubmitTopic("  Roman History  ".to_string()));

        assert_eq!(session.phase, Phase::Loading);
        assert_eq!(session.topic, "Roman History");
        assert_eq!(session.last_error, None);
        assert_eq!(session.score, 0);
        assert_eq!(session.current_index, 0);
        assert_eq!(
            command,
            Some(Command::Generate {
                topic: "Roman History".to_string()
            })
        );
    }

    #[test]
    fn submitting_a_blank_topic_stays_put_with_an_error() {
        for blank in ["", "   ", "\t\n"] {
            let mut session = QuizSession::default();
            let command = session.apply(Event::SubmitTopic(blank.to_string()));

            assert_eq!(session.phase, Phase::TopicSelection);
            assert_eq!(session.last_error.as_deref(), Some(EMPTY_TOPIC_ERROR));
            assert_eq!(command, None);
        }
    }

    #[test]
    fn enough_questions_start_the_quiz_with_exactly_quiz_length_retained() {
        let mut session = QuizSession::default();
        session.apply(Event::SubmitTopic("Rust".to_string()));

        session.apply(Event::QuestionsReady(questions(QUIZ_LENGTH + 3)));

        assert_eq!(session.phase, Phase::QuizActive);
        assert_eq!(session.questions.len(), QUIZ_LENGTH);
        assert_eq!(session.current_index, 0);
        assert_eq!(session.score, 0);
    }

    #[test]
    fn too_few_questions_fall_back_to_topic_selection() {
        let mut session = QuizSession::default();
        session.apply(Event::SubmitTopic("Rust".to_string()));

        session.apply(Event::QuestionsReady(questions(QUIZ_LENGTH - 1)));

        assert_eq!(session.phase, Phase::TopicSelection);
        assert!(session.questions.is_empty());
        assert_eq!(
            session.last_error.as_deref(),
            Some(TOO_FEW_QUESTIONS_ERROR)
        );
    }

    #[test]
    fn a_failed_generation_falls_back_with_its_message() {
        let mut session = QuizSession::default();
        session.apply(Event::SubmitTopic("Rust".to_string()));

        session.apply(Event::GenerationFailed("backend is down".to_string()));

        assert_eq!(session.phase, Phase::TopicSelection);
        assert!(session.questions.is_empty());
        assert_eq!(session.last_error.as_deref(), Some("backend is down"));
    }

    #[test]
    fn answers_advance_through_the_quiz_and_tally_the_score() {
        let mut session = loaded_session("Roman History");

        // 3 correct and 2 wrong, in order
        for correct in [true, false, true, true, false] {
            assert_eq!(session.phase, Phase::QuizActive);
            session.apply(Event::Answer { correct });
        }

        assert_eq!(session.phase, Phase::Score);
        assert_eq!(session.score, 3);
        assert_eq!(session.questions.len(), QUIZ_LENGTH);
        assert_eq!(crate::quiz::percentage(session.score, QUIZ_LENGTH), 60);
        assert_eq!(crate::quiz::verdict(60), "Good Job!");
    }

    #[test]
    fn the_last_answer_moves_to_score_even_when_wrong() {
        let mut session = loaded_session("Rust");

        for _ in 0..QUIZ_LENGTH {
            session.apply(Event::Answer { correct: false });
        }

        assert_eq!(session.phase, Phase::Score);
        assert_eq!(session.score, 0);
    }

    #[test]
    fn restart_keeps_the_topic_and_requests_a_fresh_set() {
        let mut session = loaded_session("Rust");
        for _ in 0..QUIZ_LENGTH {
            session.apply(Event::Answer { correct: true });
        }

        let command = session.apply(Event::Restart);

        assert_eq!(session.phase, Phase::Loading);
        assert_eq!(session.topic, "Rust");
        assert!(session.questions.is_empty());
        assert_eq!(session.score, 0);
        assert_eq!(session.current_index, 0);
        assert_eq!(
            command,
            Some(Command::Generate {
                topic: "Rust".to_string()
            })
        );
    }

    #[test]
    fn new_topic_resets_the_whole_session() {
        let mut session = loaded_session("Rust");
        for _ in 0..QUIZ_LENGTH {
            session.apply(Event::Answer { correct: true });
        }

        session.apply(Event::NewTopic);

        assert_eq!(session.phase, Phase::TopicSelection);
        assert_eq!(session.topic, "");
        assert!(session.questions.is_empty());
        assert_eq!(session.score, 0);
        assert_eq!(session.current_index, 0);
        assert_eq!(session.last_error, None);
    }

    #[test]
    fn back_to_back_sessions_do_not_leak_state() {
        let mut session = loaded_session("Rust");
        for _ in 0..QUIZ_LENGTH {
            session.apply(Event::Answer { correct: true });
        }
        session.apply(Event::NewTopic);

        session.apply(Event::SubmitTopic("Rust".to_string()));
        session.apply(Event::QuestionsReady(questions(QUIZ_LENGTH)));

        assert_eq!(session.phase, Phase::QuizActive);
        assert_eq!(session.score, 0);
        assert_eq!(session.current_index, 0);
    }

    #[test]
    fn out_of_phase_events_are_ignored() {
        let mut session = loaded_session("Rust");
        let before = format!("{session:?}");

        assert_eq!(session.apply(Event::Restart), None);
        assert_eq!(
            session.apply(Event::QuestionsReady(questions(QUIZ_LENGTH))),
            None
        );
        assert_eq!(
            session.apply(Event::SubmitTopic("other".to_string())),
            None
        );

        assert_eq!(format!("{session:?}"), before);
    }

    #[test]
    fn current_question_follows_the_index() {
        let mut session = loaded_session("Rust");

        assert_eq!(
            session.current_question().map(|q| q.question.as_str()),
            Some("Question 0")
        );
        session.apply(Event::Answer { correct: true });
        assert_eq!(
            session.current_question().map(|q| q.question.as_str()),
            Some("Question 1")
        );
    }
}
