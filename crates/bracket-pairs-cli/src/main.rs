use anyhow::{Context, Result};
use bracket_pairs_config::Config;
use bracket_pairs_engine::{
    BracketSession, BracketsConfiguration, Position, RawBracketsConfiguration, TextDocument,
};
use std::{env, path::PathBuf, process};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "<file> [--config PATH] [--pairs | --brackets | --match LINE:COL] [--edit L:C-L:C=TEXT]...";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Query {
    Pairs,
    Brackets,
    Match(Position),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Edit {
    start: Position,
    end: Position,
    text: String,
}

#[derive(Debug, PartialEq, Eq)]
struct Args {
    file: PathBuf,
    config: Option<PathBuf>,
    query: Query,
    edits: Vec<Edit>,
}

/// Parses `LINE:COL`, both zero based.
fn parse_position(value: &str) -> Option<Position> {
    let (line, column) = value.split_once(':')?;
    Some(Position::new(line.trim().parse().ok()?, column.trim().parse().ok()?))
}

/// Parses `L:C-L:C=TEXT`. `\n` and `\t` in TEXT are unescaped.
fn parse_edit(value: &str) -> Option<Edit> {
    let (range, text) = value.split_once('=')?;
    let (start, end) = range.split_once('-')?;
    Some(Edit {
        start: parse_position(start)?,
        end: parse_position(end)?,
        text: text.replace("\\n", "\n").replace("\\t", "\t"),
    })
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut file = None;
    let mut config = None;
    let mut query = None;
    let mut edits = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut set_query = |next: Query| match query.replace(next) {
            Some(_) => Err("only one of --pairs, --brackets, --match may be given".to_string()),
            None => Ok(()),
        };
        match arg.as_str() {
            "--pairs" => set_query(Query::Pairs)?,
            "--brackets" => set_query(Query::Brackets)?,
            "--match" => {
                let value = iter.next().ok_or("--match needs LINE:COL")?;
                let position = parse_position(value).ok_or_else(|| format!("bad position '{value}'"))?;
                set_query(Query::Match(position))?;
            }
            "--edit" => {
                let value = iter.next().ok_or("--edit needs L:C-L:C=TEXT")?;
                edits.push(parse_edit(value).ok_or_else(|| format!("bad edit '{value}'"))?);
            }
            "--config" => {
                let value = iter.next().ok_or("--config needs a path")?;
                config = Some(PathBuf::from(value));
            }
            flag if flag.starts_with("--") => return Err(format!("unknown option '{flag}'")),
            path if file.is_none() => file = Some(PathBuf::from(path)),
            extra => return Err(format!("unexpected argument '{extra}'")),
        }
    }

    Ok(Args {
        file: file.ok_or("no input file given")?,
        config,
        query: query.unwrap_or(Query::Pairs),
        edits,
    })
}

fn init_logging(config_filter: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config_filter.unwrap_or("warn")))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => {
            let expanded = Config::expand_path(path).unwrap_or_else(|| path.clone());
            Config::load_from_path(&expanded)?
                .with_context(|| format!("config file '{}' does not exist", expanded.display()))?
        }
        None => Config::load()?.unwrap_or_default(),
    };
    Ok(config)
}

fn brackets_configuration(config: &Config) -> BracketsConfiguration {
    let mut raw = RawBracketsConfiguration::new(config.bracket_pairs());
    if let Some(colorized) = config.colorized_pairs() {
        raw = raw.with_colorized(colorized);
    }
    BracketsConfiguration::new(&raw)
}

fn print_query(session: &BracketSession, query: &Query) {
    let range = session.full_range();
    match query {
        Query::Pairs => {
            for pair in session.bracket_pairs_in_range(range, true) {
                let closing = pair
                    .closing_range
                    .map_or_else(|| "unclosed".to_string(), |closing| closing.to_string());
                let indentation = pair
                    .min_indentation
                    .map_or_else(|| "-".to_string(), |indent| indent.to_string());
                println!(
                    "{} {} {} level={} indent={}",
                    pair.opening.text(),
                    pair.opening_range,
                    closing,
                    pair.level,
                    indentation
                );
            }
        }
        Query::Brackets => {
            for bracket in session.brackets_in_range(range, false) {
                let text = bracket.kind.as_ref().map_or("?", |kind| kind.text());
                let marker = if bracket.is_invalid { " invalid" } else { "" };
                println!("{text} {} level={}{marker}", bracket.range, bracket.level);
            }
        }
        Query::Match(position) => match session.match_bracket_at(*position) {
            Some(found) => match found.closing {
                Some(closing) => println!("{} {}", found.opening, closing),
                None => println!("{} unclosed", found.opening),
            },
            None => println!("no bracket at {position}"),
        },
    }
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map_or("bracket-pairs-cli", String::as_str);

    let parsed = match parse_args(args.get(1..).unwrap_or_default()) {
        Ok(parsed) => parsed,
        Err(message) => {
            eprintln!("Error: {message}");
            eprintln!("Usage: {program} {USAGE}");
            process::exit(1);
        }
    };

    let config = match load_config(parsed.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: Failed to load config: {e:#}");
            eprintln!("Or fix the config file at {}", Config::config_path().display());
            process::exit(1);
        }
    };
    init_logging(config.log_filter.as_deref());

    let bytes = std::fs::read(&parsed.file)
        .with_context(|| format!("failed to read '{}'", parsed.file.display()))?;
    let document = TextDocument::from_bytes(&bytes)?.with_tab_size(config.tab_size);
    let session = BracketSession::new(document, &brackets_configuration(&config))?;
    info!(file = %parsed.file.display(), nodes = session.stats().nodes_constructed, "parsed");

    for edit in &parsed.edits {
        session.apply_edit(edit.start, edit.end, &edit.text);
        session.flush();
        let stats = session.stats();
        info!(
            start = %edit.start,
            end = %edit.end,
            constructed = stats.nodes_constructed,
            reused = stats.nodes_reused,
            "applied edit"
        );
    }
    debug!(range = %session.full_range(), "document range");

    print_query(&session, &parsed.query);
    Ok(())
}
