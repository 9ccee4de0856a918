mod quiz;

use std::sync::Arc;
use std::time::Duration;

use chatgpt::{client::ChatGPT, config::ChatGPTEngine};
use dotenv::dotenv;
use quiz::generator::{QuizGenerator, GENERATION_FAILED_MESSAGE};
use quiz::session::{Command, Event, Phase, QuizSession, QUIZ_LENGTH};
use teloxide::{
    dispatching::dialogue::{serializer::Json, ErasedStorage, SqliteStorage, Storage},
    prelude::*,
    types::{ChatAction, ChatId, KeyboardButton, KeyboardMarkup, KeyboardRemove, ParseMode},
};

type QuizDialogue = Dialogue<State, ErasedStorage<State>>;
type SessionStorage = Arc<ErasedStorage<State>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
pub enum State {
    #[default]
    Start,
    ReceiveTopic { session: QuizSession },
    Generating { session: QuizSession },
    AnswerQuestion { session: QuizSession },
    ShowScore { session: QuizSession },
}

// The session's phase decides which dialogue state (and thus which handler)
// is active. Handlers never build State variants by hand.
impl From<QuizSession> for State {
    fn from(session: QuizSession) -> Self {
        match session.phase {
            Phase::TopicSelection => State::ReceiveTopic { session },
            Phase::Loading => State::Generating { session },
            Phase::QuizActive => State::AnswerQuestion { session },
            Phase::Score => State::ShowScore { session },
        }
    }
}

#[tokio::main]
async fn main() {
    dotenv().expect("Failed to load .env file");
    let openai_api_key = std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY is not set");

    pretty_env_logger::init();
    log::info!("Starting topic quiz bot...");

    let bot = Bot::from_env();

    println!("Establishing connection to the database...");
    let storage: SessionStorage = SqliteStorage::open("db.sqlite", Json)
        .await
        .expect("Failed to open the dialogue database")
        .erase();
    println!("Connection established");

    let gpt = {
        let mut gpt = ChatGPT::new(openai_api_key).expect("Unable to connect with ChatGPT");

        gpt.config.engine = ChatGPTEngine::Gpt35Turbo;
        gpt.config.temperature = 0.8;
        gpt.config.timeout = Duration::from_secs(15);

        gpt
    };

    let generator = Arc::new(QuizGenerator::new(gpt));
    let generator_for_resume = generator.clone();
    let generator_for_restart = generator.clone();

    Dispatcher::builder(
        bot,
        Update::filter_message()
            .enter_dialogue::<Message, ErasedStorage<State>, State>()
            .branch(dptree::case![State::Start].endpoint(start))
            .branch(dptree::case![State::ReceiveTopic { session }].endpoint(
                move |bot: Bot, dialogue: QuizDialogue, session: QuizSession, msg: Message| {
                    receive_topic(generator.clone(), bot, dialogue, session, msg)
                },
            ))
            .branch(dptree::case![State::Generating { session }].endpoint(
                move |bot: Bot, dialogue: QuizDialogue, session: QuizSession, msg: Message| {
                    resume_generation(generator_for_resume.clone(), bot, dialogue, session, msg)
                },
            ))
            .branch(dptree::case![State::AnswerQuestion { session }].endpoint(answer_question))
            .branch(dptree::case![State::ShowScore { session }].endpoint(
                move |bot: Bot, dialogue: QuizDialogue, session: QuizSession, msg: Message| {
                    score_choice(generator_for_restart.clone(), bot, dialogue, session, msg)
                },
            )),
    )
    .dependencies(dptree::deps![storage])
    .enable_ctrlc_handler()
    .build()
    .dispatch()
    .await;
}

const GREETING_TEXT: &str =
    "Hi! I'm the AI quiz bot. I can put together a quiz on just about anything.";
async fn start(bot: Bot, dialogue: QuizDialogue, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, GREETING_TEXT).await?;
    prompt_for_topic(&bot, msg.chat.id, None).await?;

    dialogue
        .update(State::from(QuizSession::default()))
        .await?;
    Ok(())
}

const TOPIC_PROMPT: &str = "What do you want to be quizzed on?\nEnter any topic below to begin (e.g. Roman History, React.js, Marine Biology).";
async fn prompt_for_topic(bot: &Bot, chat_id: ChatId, error: Option<&str>) -> HandlerResult {
    if let Some(error) = error {
        bot.send_message(chat_id, format!("Error: {}", error))
            .await?;
    }
    bot.send_message(chat_id, TOPIC_PROMPT)
        .reply_markup(KeyboardRemove::new())
        .await?;
    Ok(())
}

async fn receive_topic(
    generator: Arc<QuizGenerator>,
    bot: Bot,
    dialogue: QuizDialogue,
    mut session: QuizSession,
    msg: Message,
) -> HandlerResult {
    let topic = msg.text().unwrap_or_default().to_string();

    match session.apply(Event::SubmitTopic(topic)) {
        Some(Command::Generate { topic }) => {
            run_generation(generator, bot, dialogue, session, topic, msg.chat.id).await
        }
        // Blank or non-text input; the session stayed put with an error set.
        None => {
            prompt_for_topic(&bot, msg.chat.id, session.last_error.as_deref()).await?;
            dialogue.update(State::from(session)).await?;
            Ok(())
        }
    }
}

async fn run_generation(
    generator: Arc<QuizGenerator>,
    bot: Bot,
    dialogue: QuizDialogue,
    mut session: QuizSession,
    topic: String,
    chat_id: ChatId,
) -> HandlerResult {
    // Park the dialogue on the loading screen before awaiting anything, so a
    // message arriving mid-generation cannot start a second request.
    dialogue.update(State::from(session.clone())).await?;

    bot.send_message(chat_id, format!("Generating your quiz on \"{}\"...", topic))
        .await?;
    // Best effort; the typing hint just bridges the wait for the model.
    let _ = bot.send_chat_action(chat_id, ChatAction::Typing).await;

    let event = match generator.generate(&topic, QUIZ_LENGTH).await {
        Ok(questions) => Event::QuestionsReady(questions),
        Err(err) => {
            log::error!("Quiz generation on {:?} failed: {}", topic, err);
            Event::GenerationFailed(GENERATION_FAILED_MESSAGE.to_string())
        }
    };

    // The dialogue may have moved on while the model was thinking; a result
    // for a session that is no longer loading must not be applied.
    if !matches!(dialogue.get().await?, Some(State::Generating { .. })) {
        log::debug!("Dropping a stale generation result for {:?}", topic);
        return Ok(());
    }

    session.apply(event);
    match session.phase {
        Phase::QuizActive => send_question(&bot, chat_id, &session).await?,
        _ => prompt_for_topic(&bot, chat_id, session.last_error.as_deref()).await?,
    }

    dialogue.update(State::from(session)).await?;
    Ok(())
}

// A message can only reach this handler when the stored dialogue was left on
// the loading screen, e.g. a restart cut a generation short. Updates from one
// chat are handled in turn, so no request can still be in flight; pick the
// generation back up instead of leaving the chat stuck.
async fn resume_generation(
    generator: Arc<QuizGenerator>,
    bot: Bot,
    dialogue: QuizDialogue,
    session: QuizSession,
    msg: Message,
) -> HandlerResult {
    let topic = session.topic.clone();
    run_generation(generator, bot, dialogue, session, topic, msg.chat.id).await
}

// How long the answer verdict stays on screen before the quiz moves on.
const ANSWER_PAUSE: Duration = Duration::from_millis(1500);

async fn answer_question(
    bot: Bot,
    dialogue: QuizDialogue,
    mut session: QuizSession,
    msg: Message,
) -> HandlerResult {
    let question = match session.current_question() {
        Some(question) => question.clone(),
        // An active quiz always has a current question; recover anyway.
        None => {
            prompt_for_topic(&bot, msg.chat.id, None).await?;
            dialogue.update(State::from(QuizSession::default())).await?;
            return Ok(());
        }
    };

    let answer = msg.text().unwrap_or_default();
    if !question.options.iter().any(|option| option == answer) {
        bot.send_message(
            msg.chat.id,
            "Please answer with one of the options on the keyboard.",
        )
        .await?;
        return Ok(());
    }

    let correct = answer == question.correct_answer;
    if correct {
        bot.send_message(msg.chat.id, "✅ Correct!").await?;
    } else {
        bot.send_message(
            msg.chat.id,
            format!("❌ Wrong. The correct answer is: {}", question.correct_answer),
        )
        .await?;
    }

    // Let the verdict sit on screen before the quiz moves on.
    tokio::time::sleep(ANSWER_PAUSE).await;

    session.apply(Event::Answer { correct });
    match session.phase {
        Phase::QuizActive => send_question(&bot, msg.chat.id, &session).await?,
        _ => send_score(&bot, msg.chat.id, &session).await?,
    }

    dialogue.update(State::from(session)).await?;
    Ok(())
}

async fn send_question(bot: &Bot, chat_id: ChatId, session: &QuizSession) -> HandlerResult {
    let question = match session.current_question() {
        Some(question) => question,
        None => return Ok(()),
    };

    let keyboard = KeyboardMarkup::new(
        question
            .options
            .iter()
            .map(|option| vec![KeyboardButton::new(option.clone())])
            .collect::<Vec<_>>(),
    );

    bot.send_message(
        chat_id,
        format!(
            "Question {} of {}:\n\n{}",
            session.current_index + 1,
            session.questions.len(),
            question.question
        ),
    )
    .parse_mode(ParseMode::Html)
    .reply_markup(keyboard)
    .await?;
    Ok(())
}

const PLAY_AGAIN: &str = "Play Again";
const NEW_TOPIC: &str = "Choose New Topic";
async fn send_score(bot: &Bot, chat_id: ChatId, session: &QuizSession) -> HandlerResult {
    let total = session.questions.len();
    let percentage = quiz::percentage(session.score, total);

    let keyboard = KeyboardMarkup::new(vec![vec![
        KeyboardButton::new(PLAY_AGAIN),
        KeyboardButton::new(NEW_TOPIC),
    ]]);
    let summary = format!(
        "{}\nYou completed the quiz on \"{}\"!\n\nYour Score: {} / {} ({}%)\n\nWhat would you like to do next?",
        quiz::verdict(percentage),
        session.topic,
        session.score,
        total,
        percentage
    );
    bot.send_message(chat_id, summary)
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

async fn score_choice(
    generator: Arc<QuizGenerator>,
    bot: Bot,
    dialogue: QuizDialogue,
    mut session: QuizSession,
    msg: Message,
) -> HandlerResult {
    match msg.text() {
        Some(PLAY_AGAIN) => match session.apply(Event::Restart) {
            Some(Command::Generate { topic }) => {
                run_generation(generator, bot, dialogue, session, topic, msg.chat.id).await
            }
            None => Ok(()),
        },
        Some(NEW_TOPIC) => {
            session.apply(Event::NewTopic);
            prompt_for_topic(&bot, msg.chat.id, None).await?;
            dialogue.update(State::from(session)).await?;
            Ok(())
        }
        _ => {
            bot.send_message(msg.chat.id, "Please choose one of the options.")
                .await?;
            Ok(())
        }
    }
}
