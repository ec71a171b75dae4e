use std::cmp;
use std::error::Error;

use atty::Stream;
use clap::{Parser, Subcommand};
use fluency_rs::{ContentRouter, Glossary, GlossaryEntry, PromptLibrary, TermAnnotator, router};
use serde_json::json;
use termimad::{FmtText, MadSkin, terminal_size};

#[derive(Parser, Debug)]
#[command(name = "fluency-rs", about = "Explore the AI fluency course data", version)]
pub struct Cli {
    /// Emit JSON instead of human-readable tables.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Operations related to the glossary.
    #[command(subcommand)]
    Glossary(GlossaryCommand),
    /// Operations related to the prompt library.
    #[command(subcommand)]
    Prompts(PromptCommand),
    /// List the navigation tokens and the fragments they resolve to.
    Routes,
    /// Render a course fragment with glossary terms annotated.
    Annotate {
        /// Navigation token to render.
        token: String,
    },
    /// Run the HTTP server.
    #[cfg(feature = "web")]
    Serve {
        /// Address to bind.
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: std::net::SocketAddr,
    },
}

#[derive(Subcommand, Debug)]
enum GlossaryCommand {
    /// Search entries by substring across every field.
    Search {
        /// Substring to match; omit to list every entry.
        #[arg(default_value = "")]
        query: String,
        /// Maximum number of matches to return.
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Show the full entry for a term.
    Show {
        /// Localized or English term to display.
        term: String,
    },
}

#[derive(Subcommand, Debug)]
enum PromptCommand {
    /// List prompt categories, or the prompts of one category.
    List {
        /// Category name to expand.
        category: Option<String>,
    },
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::Glossary(GlossaryCommand::Search { query, limit }) => {
            handle_search(query, limit, cli.json)
        }
        Command::Glossary(GlossaryCommand::Show { term }) => handle_show(term, cli.json),
        Command::Prompts(PromptCommand::List { category }) => handle_prompts(category, cli.json),
        Command::Routes => handle_routes(cli.json),
        Command::Annotate { token } => handle_annotate(token, cli.json),
        #[cfg(feature = "web")]
        Command::Serve { addr } => handle_serve(addr),
    }
}

fn handle_search(query: String, limit: usize, as_json: bool) -> Result<(), Box<dyn Error>> {
    let limit = cmp::max(1, limit);
    let matches: Vec<&GlossaryEntry> = Glossary::search(&query).into_iter().take(limit).collect();

    if as_json {
        let payload = json!({
            "query": query,
            "limit": limit,
            "results": matches,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_search_table(&query, &matches);
    }
    Ok(())
}

fn handle_show(term: String, as_json: bool) -> Result<(), Box<dyn Error>> {
    let entry =
        Glossary::entry_by_term(&term).ok_or_else(|| format!("No entry found for {term:?}"))?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(entry)?);
    } else {
        print_entry(entry);
    }
    Ok(())
}

fn handle_prompts(category: Option<String>, as_json: bool) -> Result<(), Box<dyn Error>> {
    match category {
        Some(name) => {
            let category = PromptLibrary::category(&name)
                .ok_or_else(|| format!("No prompt category named {name:?}"))?;
            if as_json {
                println!("{}", serde_json::to_string_pretty(category)?);
            } else {
                println!("{} ({} prompts)", category.category, category.prompts.len());
                for prompt in &category.prompts {
                    println!("\n## {}", prompt.title);
                    println!("{}", prompt.prompt);
                    println!("팁: {}", prompt.tip);
                }
            }
        }
        None => {
            let categories = PromptLibrary::categories();
            if as_json {
                println!("{}", serde_json::to_string_pretty(&categories)?);
            } else {
                print_category_table(categories);
            }
        }
    }
    Ok(())
}

fn handle_routes(as_json: bool) -> Result<(), Box<dyn Error>> {
    let routes = router::routes();
    if as_json {
        let payload: Vec<_> = routes
            .iter()
            .map(|(token, path)| json!({ "token": token, "path": path }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        let width = routes
            .iter()
            .map(|(token, _)| token.len())
            .max()
            .unwrap_or(5)
            .max("TOKEN".len());
        println!("{:<width$}  {}", "TOKEN", "FRAGMENT", width = width);
        println!("{:-<width$}  {}", "", "--------", width = width);
        for (token, path) in routes {
            println!("{:<width$}  {}", token, path, width = width);
        }
    }
    Ok(())
}

fn handle_annotate(token: String, as_json: bool) -> Result<(), Box<dyn Error>> {
    let router = ContentRouter::embedded();
    let annotator = TermAnnotator::new(Glossary::entries());
    let html = annotator.annotate(&router.navigate(&token));

    if as_json {
        let payload = json!({ "token": token, "html": html });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("{html}");
    }
    Ok(())
}

#[cfg(feature = "web")]
fn handle_serve(addr: std::net::SocketAddr) -> Result<(), Box<dyn Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(fluency_rs::web::serve(fluency_rs::web::WebConfig { addr }))?;
    Ok(())
}

fn print_search_table(query: &str, rows: &[&GlossaryEntry]) {
    if rows.is_empty() {
        println!("No entries matched \"{query}\".");
        return;
    }
    let width = rows
        .iter()
        .map(|entry| entry.korean_term.chars().count())
        .max()
        .unwrap_or(4)
        .max("TERM".len());
    if !query.trim().is_empty() {
        println!("Matches for \"{query}\":");
    }
    println!("{:<width$}  {}", "TERM", "DESCRIPTION", width = width);
    println!("{:-<width$}  {}", "", "-----------", width = width);
    for entry in rows {
        println!(
            "{:<width$}  {}",
            entry.korean_term,
            entry.description,
            width = width
        );
    }
}

fn print_category_table(categories: &[fluency_rs::PromptCategory]) {
    if categories.is_empty() {
        println!("No prompt categories available.");
        return;
    }
    let width = categories
        .iter()
        .map(|category| category.category.chars().count())
        .max()
        .unwrap_or(8)
        .max("CATEGORY".len());
    println!("{:<width$}  {}", "CATEGORY", "PROMPTS", width = width);
    println!("{:-<width$}  {}", "", "-------", width = width);
    for category in categories {
        println!(
            "{:<width$}  {}",
            category.category,
            category.prompts.len(),
            width = width
        );
    }
}

fn print_entry(entry: &GlossaryEntry) {
    println!("{} ({})", entry.korean_term, entry.term);
    render_markdown_block("설명", &entry.description);
    render_markdown_block("활용 예시", &entry.example);
}

fn stdout_is_tty() -> bool {
    atty::is(Stream::Stdout)
}

fn markdown_width() -> usize {
    let (width, _) = terminal_size();
    width.max(60) as usize
}

fn render_markdown_block(title: &str, body: &str) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return;
    }
    println!("\n{title}:");
    if stdout_is_tty() {
        let skin = MadSkin::default();
        let formatted = FmtText::from(&skin, trimmed, Some(markdown_width()));
        println!("{formatted}");
    } else {
        println!("{trimmed}");
    }
}
