use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use navigator::QuestionStore;
use shared::domain::{attach_children, Media, MediaKind, NodeId, QuestionNode, UserId};
use storage::Storage;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/faq.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every question of a language, one per line.
    List {
        #[arg(long, default_value = "en")]
        lang: String,
    },
    /// Print the question hierarchy of a language.
    Tree {
        #[arg(long, default_value = "en")]
        lang: String,
    },
    Add {
        #[arg(long, default_value = "en")]
        lang: String,
        #[arg(long, default_value_t = 0)]
        parent: i64,
        #[arg(long)]
        text: String,
        #[arg(long)]
        answer: String,
    },
    Edit {
        id: i64,
        #[arg(long)]
        text: String,
        #[arg(long)]
        answer: String,
    },
    Media {
        id: i64,
        /// `doc` or `photo`.
        #[arg(long)]
        kind: String,
        #[arg(long)]
        handle: String,
    },
    /// Delete a question and everything below it.
    Delete { id: i64 },
    SetLanguage { user_id: i64, lang: String },
    /// Question counts per language.
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::List { lang } => {
            for node in storage.questions_by_language(&lang).await? {
                println!(
                    "{}\tparent={}\tchildren={}\t{}",
                    node.id,
                    node.parent_id,
                    node.children.len(),
                    node.text
                );
            }
        }
        Command::Tree { lang } => {
            let nodes = storage.questions_by_language(&lang).await?;
            for line in render_tree(nodes) {
                println!("{line}");
            }
        }
        Command::Add {
            lang,
            parent,
            text,
            answer,
        } => {
            let id = storage
                .create_node(&lang, &text, &answer, NodeId(parent))
                .await?;
            println!("created question_id={id}");
        }
        Command::Edit { id, text, answer } => {
            storage.update_node(NodeId(id), &text, &answer).await?;
            println!("updated question_id={id}");
        }
        Command::Media { id, kind, handle } => {
            let Some(kind) = MediaKind::parse(&kind) else {
                bail!("unknown media kind '{kind}', expected doc or photo");
            };
            storage
                .update_media(NodeId(id), &Media { kind, handle })
                .await?;
            println!("attached media to question_id={id}");
        }
        Command::Delete { id } => {
            let deleted = storage.delete_node(NodeId(id)).await?;
            if deleted.is_empty() {
                bail!("question {id} does not exist");
            }
            let ids: Vec<String> = deleted.iter().map(ToString::to_string).collect();
            println!("deleted {} question(s): {}", deleted.len(), ids.join(", "));
        }
        Command::SetLanguage { user_id, lang } => {
            storage.set_language(UserId(user_id), &lang).await?;
            println!("user {user_id} now reads '{lang}'");
        }
        Command::Stats => {
            for line in stats_lines(&storage).await? {
                println!("{line}");
            }
        }
    }

    Ok(())
}

async fn stats_lines(storage: &Storage) -> Result<Vec<String>> {
    let counts = storage.language_counts().await?;
    if counts.is_empty() {
        return Ok(vec!["no questions".to_string()]);
    }
    let total: i64 = counts.iter().map(|(_, count)| count).sum();
    let mut lines: Vec<String> = counts
        .into_iter()
        .map(|(lang, count)| format!("lang={lang}\tquestions={count}"))
        .collect();
    lines.push(format!("total\tquestions={total}"));
    Ok(lines)
}

/// Indented outline, top-level questions first, each followed by its subtree.
fn render_tree(mut nodes: Vec<QuestionNode>) -> Vec<String> {
    attach_children(&mut nodes);
    let mut lines = Vec::new();
    let mut stack: Vec<(NodeId, usize)> = nodes
        .iter()
        .filter(|n| n.is_top_level())
        .rev()
        .map(|n| (n.id, 0))
        .collect();
    let mut seen = std::collections::HashSet::new();

    while let Some((id, depth)) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        let Some(node) = nodes.iter().find(|n| n.id == id) else {
            continue;
        };
        lines.push(format!("{}[{}] {}", "  ".repeat(depth), node.id, node.text));
        stack.extend(node.children.iter().rev().map(|child| (*child, depth + 1)));
    }
    lines
}
