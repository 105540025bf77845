use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use quizgen::client::QuizApiClient;
use quizgen::generation::DEFAULT_QUESTION_COUNT;
use quizgen::models::QuestionRecord;
use quizgen::session::{Feedback, QuizSession, QuizSummary, SessionError, SessionPhase};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quiz-player", about = "Play generated quizzes and revise topics in the terminal")]
struct Cli {
    /// Base URL of the quizgen server.
    #[arg(long, env = "QUIZGEN_SERVER", default_value = "http://127.0.0.1:5000")]
    server: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a quiz from source text and play it.
    Quiz {
        #[arg(long, conflicts_with = "text", required_unless_present = "text")]
        file: Option<PathBuf>,
        #[arg(long)]
        text: Option<String>,
        #[arg(long, default_value_t = DEFAULT_QUESTION_COUNT)]
        count: u32,
    },
    /// Read about a topic and ask follow-up questions.
    Revise {
        #[arg(long)]
        topic: String,
    },
}

type Input = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let api = QuizApiClient::new(cli.server);
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    match cli.command {
        Command::Quiz { file, text, count } => {
            let source = match (file, text) {
                (Some(path), _) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("cannot read {}", path.display()))?,
                (None, Some(text)) => text,
                (None, None) => anyhow::bail!("either --file or --text is required"),
            };
            println!("Generating...");
            let questions = api.generate_questions(&source, count).await?;
            play(questions, &mut input).await
        }
        Command::Revise { topic } => revise(&api, &topic, &mut input).await,
    }
}

async fn play(questions: Vec<QuestionRecord>, input: &mut Input) -> anyhow::Result<()> {
    let mut session = QuizSession::start(questions)?;
    loop {
        match session.phase() {
            SessionPhase::Displaying(index) => {
                if let Some(notice) = skip_malformed(&mut session)? {
                    println!("{}", notice);
                    continue;
                }
                if let Some(question) = session.current_question() {
                    print!("{}", render_question(question, index, session.total()));
                }
                let Some(line) = input.next_line().await? else {
                    return Ok(());
                };
                let selection = session
                    .current_question()
                    .and_then(|q| selection_from_input(&line, q));
                let feedback = session.submit_answer(selection.as_deref())?;
                println!("{}", render_feedback(&feedback));
            }
            SessionPhase::Answered(_) => {
                println!("Press Enter for the next question.");
                if input.next_line().await?.is_none() {
                    return Ok(());
                }
                session.advance()?;
            }
            SessionPhase::Completed => {
                print!("{}", render_summary(&session.summary()?));
                println!("Type r to restart, anything else to quit.");
                match input.next_line().await? {
                    Some(line) if line.trim().eq_ignore_ascii_case("r") => session.restart(),
                    _ => return Ok(()),
                }
            }
        }
    }
}

async fn revise(api: &QuizApiClient, topic: &str, input: &mut Input) -> anyhow::Result<()> {
    println!("Generating information...");
    let mut current = api.generate_info(topic).await?;
    println!("\n{}\n", current);
    loop {
        println!("Ask a follow-up question (blank line to finish):");
        let Some(query) = input.next_line().await? else {
            return Ok(());
        };
        if query.trim().is_empty() {
            return Ok(());
        }
        println!("Expanding information...");
        match api.expand_info(topic, &current, &query).await {
            Ok(text) => {
                current = text;
                println!("\n{}\n", current);
            }
            Err(err) => eprintln!("{} {}", "Error:".red(), err),
        }
    }
}

/// Moves past a displayed record whose answer cannot be checked, returning the
/// notice to show.
fn skip_malformed(session: &mut QuizSession) -> Result<Option<String>, SessionError> {
    let index = match session.phase() {
        SessionPhase::Displaying(index) => index,
        _ => return Ok(None),
    };
    if session.current_question().map_or(true, QuestionRecord::is_well_formed) {
        return Ok(None);
    }
    session.advance()?;
    Ok(Some(render_feedback(&Feedback::DataError { index })))
}

/// Maps a typed line to an option: either its 1-based number or its exact text.
fn selection_from_input(line: &str, question: &QuestionRecord) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if let Ok(n) = line.parse::<usize>() {
        return n
            .checked_sub(1)
            .and_then(|i| question.options.get(i))
            .cloned();
    }
    question.options.iter().find(|o| o.as_str() == line).cloned()
}

fn render_question(question: &QuestionRecord, index: usize, total: usize) -> String {
    let mut out = format!("\nQuestion {} of {}\n{}\n", index + 1, total, question.prompt.bold());
    for (i, option) in question.options.iter().enumerate() {
        out.push_str(&format!("  {}. {}\n", i + 1, option));
    }
    out.push_str("Your answer: ");
    out
}

fn render_feedback(feedback: &Feedback) -> String {
    match feedback {
        Feedback::NoSelection => "Please select an option.".yellow().to_string(),
        Feedback::Correct { explanation } => {
            with_explanation("Correct!".green().to_string(), explanation.as_deref())
        }
        Feedback::Incorrect {
            correct_answer,
            explanation,
        } => with_explanation(
            format!("Incorrect. The correct answer was: {}", correct_answer)
                .red()
                .to_string(),
            explanation.as_deref(),
        ),
        Feedback::DataError { index } => format!(
            "Error: cannot check question {} because its data is malformed; skipping it.",
            index + 1
        )
        .red()
        .to_string(),
    }
}

fn with_explanation(head: String, explanation: Option<&str>) -> String {
    match explanation {
        Some(text) => format!("{}\n{}", head, text),
        None => head,
    }
}

fn render_summary(summary: &QuizSummary) -> String {
    let mut out = format!(
        "\nQuiz Completed!\nYou scored {} out of {} ({:.1}%).\n\nAnswer Review:\n",
        summary.score, summary.total, summary.percentage
    );
    for item in &summary.review {
        out.push_str(&format!("Question {}: {}\n", item.index + 1, item.prompt));
        let answer = if item.is_correct {
            item.answer.label().green()
        } else {
            item.answer.label().red()
        };
        out.push_str(&format!("  Your answer: {}\n", answer));
        if !item.is_correct {
            out.push_str(&format!("  Correct answer: {}\n", item.correct_answer));
        }
        if let Some(explanation) = &item.explanation {
            out.push_str(&format!("  Explanation: {}\n", explanation));
        }
    }
    out
}
