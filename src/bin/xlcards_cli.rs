//! CLI for xlcards - inspect spreadsheets and study them in the terminal
//!
//! Usage:
//!   xlcards_cli sheets words.xlsx
//!   xlcards_cli columns words.xlsx --sheet 1
//!   xlcards_cli deck words.xlsx -q A -a B -a C --shuffle > deck.json
//!   xlcards_cli study words.csv -q 1 -a 2 --start 2 --end 50

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use xlcards::cell_ref::parse_cell_ref;
use xlcards::columns::derive_columns;
use xlcards::deck::default_row_range;
use xlcards::{
    Card, Event, Intent, Rating, SessionConfig, StudySession, TabularSource, Workbook,
};

#[derive(Parser)]
#[command(name = "xlcards_cli")]
#[command(about = "Flashcards from XLSX/CSV sheets")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the sheets of a workbook
    Sheets {
        file: PathBuf,
    },

    /// List the columns that can be used as question or answer
    Columns {
        file: PathBuf,

        /// Sheet index, starting at 0
        #[arg(long, short = 's', default_value_t = 0)]
        sheet: usize,
    },

    /// Build a deck and print it as JSON
    Deck(DeckArgs),

    /// Study a deck interactively
    #[command(after_help = "\
Keys while studying:
  <enter>  flip the card
  h/m/e    rate hard / medium / easy
  p        previous card
  r        restart (forget all progress)
  s        show stats
  q        quit")]
    Study(DeckArgs),
}

#[derive(Args)]
struct DeckArgs {
    file: PathBuf,

    /// Sheet index, starting at 0
    #[arg(long, short = 's', default_value_t = 0)]
    sheet: usize,

    /// Question column, as a letter (B) or 1-based number (2)
    #[arg(long, short = 'q', value_parser = parse_column)]
    question: Option<u32>,

    /// Answer column; repeat for several
    #[arg(long = "answer", short = 'a', value_parser = parse_column)]
    answers: Vec<u32>,

    /// First row to study (row 1 is the header)
    #[arg(long)]
    start: Option<u32>,

    /// Last row to study
    #[arg(long)]
    end: Option<u32>,

    #[arg(long)]
    shuffle: bool,

    /// Seed for reproducible shuffles
    #[arg(long)]
    seed: Option<u64>,
}

fn parse_column(value: &str) -> Result<u32, String> {
    if let Ok(n) = value.parse::<u32>() {
        return if n == 0 {
            Err("columns start at 1".to_string())
        } else {
            Ok(n)
        };
    }
    parse_cell_ref(&format!("{}1", value.to_ascii_uppercase()))
        .map(|(col, _)| col + 1)
        .ok_or_else(|| format!("not a column: {value}"))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn read_workbook(path: &Path) -> Result<Workbook, String> {
    let data = fs::read(path).map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    Workbook::load(&file_name(path), &data).map_err(|e| format!("Error parsing {}: {e}", path.display()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

/// Load, select and start a session as the arguments describe.
fn start_session(args: &DeckArgs) -> Result<StudySession, String> {
    let workbook = read_workbook(&args.file)?;
    let (min_row, max_row) = workbook
        .sheet(args.sheet)
        .map(default_row_range)
        .map(|(min, max, _, _)| (min, max))
        .ok_or_else(|| format!("Sheet {} not found", args.sheet))?;

    let mut session = StudySession::new(SessionConfig { seed: args.seed });
    session.open(file_name(&args.file), workbook);
    if args.sheet != 0 {
        session.dispatch(Intent::SheetSelected { index: args.sheet });
    }
    if let Some(index) = args.question {
        if session
            .dispatch(Intent::QuestionColumnSelected { index })
            .is_empty()
        {
            return Err(format!("Column {index} has no data"));
        }
    }
    if !args.answers.is_empty() {
        session.dispatch(Intent::AnswerColumnsSelected {
            indices: args.answers.clone(),
        });
    }

    let events = session.dispatch(Intent::StartStudy {
        start_row: args.start.unwrap_or(min_row),
        end_row: args.end.unwrap_or(max_row),
        shuffle: args.shuffle,
    });
    for event in events {
        if let Event::ValidationFailed { message, .. } = event {
            return Err(message);
        }
    }
    Ok(session)
}

fn cmd_sheets(file: &Path, out: &mut impl Write) -> Result<(), String> {
    let workbook = read_workbook(file)?;
    for (i, name) in workbook.sheet_names().iter().enumerate() {
        writeln!(out, "{i}\t{name}").map_err(|e| e.to_string())?;
    }
    Ok(())
}

fn cmd_columns(file: &Path, sheet: usize, out: &mut impl Write) -> Result<(), String> {
    let workbook = read_workbook(file)?;
    let grid = workbook
        .sheet(sheet)
        .ok_or_else(|| format!("Sheet {sheet} not found"))?;
    for col in derive_columns(grid) {
        writeln!(
            out,
            "{}\t{}\t{}",
            col.index,
            xlcards::cell_ref::column_letter(col.index),
            col.label
        )
        .map_err(|e| e.to_string())?;
    }
    Ok(())
}

fn cmd_deck(args: &DeckArgs, out: &mut impl Write) -> Result<(), String> {
    let session = start_session(args)?;
    let cards: &[Card] = session.engine().map(|engine| engine.cards()).unwrap_or_default();
    let json = serde_json::to_string_pretty(&serde_json::json!({
        "prompt": session.prompt(),
        "cards": cards,
    }))
    .map_err(|e| format!("Error serializing JSON: {e}"))?;
    writeln!(out, "{json}").map_err(|e| e.to_string())
}

fn render(event: &Event, out: &mut impl Write) -> io::Result<()> {
    match event {
        Event::StudyStarted {
            prompt,
            total_cards,
        } => writeln!(out, "{prompt} ({total_cards} cards)"),
        Event::CardChanged {
            card: Some(card),
            showing_answer,
            position,
            queue_len,
        } => {
            writeln!(out, "\n[{}/{}] {}", position + 1, queue_len, card.question)?;
            if *showing_answer {
                writeln!(out, "{}", indent(&card.answer.to_string()))?;
                writeln!(out, "rate: h/m/e")?;
            }
            Ok(())
        }
        Event::CardChanged { card: None, .. } => writeln!(out, "No cards to study!"),
        Event::StatsChanged { stats } => writeln!(
            out,
            "{} mastered, {} learning, {} to learn",
            stats.mastered, stats.learning, stats.new
        ),
        Event::SessionComplete {
            total_cards,
            mastered_count,
            elapsed_minutes,
        } => writeln!(
            out,
            "\nAll done! {mastered_count}/{total_cards} mastered in {elapsed_minutes} min. (r to go again, q to quit)"
        ),
        _ => Ok(()),
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("  {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn cmd_study(args: &DeckArgs, input: impl BufRead, out: &mut impl Write) -> Result<(), String> {
    let mut session = start_session(args)?;
    let io_err = |e: io::Error| e.to_string();

    writeln!(out, "{}", session.prompt()).map_err(io_err)?;
    if let Some(card) = session.current_card() {
        let position = session.engine().map_or(0, |e| e.position());
        let queue_len = session.engine().map_or(0, |e| e.queue_len());
        render(
            &Event::CardChanged {
                card: Some(card.clone()),
                showing_answer: false,
                position,
                queue_len,
            },
            out,
        )
        .map_err(io_err)?;
    }

    for line in input.lines() {
        let line = line.map_err(io_err)?;
        let command = line.trim();
        let events = match command {
            "q" | "quit" => break,
            "" | "f" => session.dispatch(Intent::FlipCard),
            "p" => session.dispatch(Intent::PreviousCard),
            "r" => session.dispatch(Intent::Restart),
            "s" => session
                .stats()
                .map(|stats| vec![Event::StatsChanged { stats }])
                .unwrap_or_default(),
            other => match other.parse::<Rating>() {
                Ok(rating) => session.dispatch(Intent::Rate { rating }),
                Err(message) => {
                    writeln!(out, "{message}").map_err(io_err)?;
                    continue;
                }
            },
        };
        for event in &events {
            render(event, out).map_err(io_err)?;
        }
        out.flush().map_err(io_err)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let result = match &cli.command {
        Commands::Sheets { file } => cmd_sheets(file, &mut out),
        Commands::Columns { file, sheet } => cmd_columns(file, *sheet, &mut out),
        Commands::Deck(args) => cmd_deck(args, &mut out),
        Commands::Study(args) => cmd_study(args, io::stdin().lock(), &mut out),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}
