//! Command-line interface.

use std::io::Write;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::chat::{ChatContext, TurnContext};
use crate::config::Config;
use crate::render::render_markup;
use crate::repl::{self, PROMPT_PREFIX};

#[derive(Parser)]
#[command(name = "shopchat")]
#[command(version)]
#[command(about = "Streaming chat client for the ShopMind assistant")]
pub struct Cli {
    /// Override the assistant service base URL
    #[arg(long, global = true, env = "SHOPCHAT_SERVICE_URL", value_name = "URL")]
    pub service_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat
    Chat {
        /// Ask about a specific product
        #[arg(long, value_name = "PRODUCT_ID")]
        product: Option<String>,
        /// Ask about a specific order
        #[arg(long, value_name = "ORDER_ID")]
        order: Option<String>,
    },
    /// Ask a single question and print the answer
    Ask {
        /// The question to send
        question: String,
        /// Ask about a specific product
        #[arg(long, value_name = "PRODUCT_ID")]
        product: Option<String>,
        /// Ask about a specific order
        #[arg(long, value_name = "ORDER_ID")]
        order: Option<String>,
        /// Print rendered HTML markup instead of raw text
        #[arg(long)]
        html: bool,
    },
    /// Reload and print this session's conversation history
    History {
        /// Print assistant messages as rendered HTML markup
        #[arg(long)]
        html: bool,
    },
    /// Clear the conversation and request a backend history purge
    Clear,
    /// Create a default config file
    Init,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    if matches!(cli.command, Commands::Init) {
        let path = crate::paths::config_path();
        Config::init(&path)?;
        println!("Created {}", path.display());
        return Ok(());
    }

    let mut config = Config::load()?;
    if let Some(url) = cli.service_url {
        config.service_base_url = url;
    }
    let mut ctx = ChatContext::new(config)?;

    match cli.command {
        Commands::Chat { product, order } => {
            let turn = turn_context(product, order);
            let stdin = std::io::stdin();
            let mut stdout = std::io::stdout();

            writeln!(stdout, "ShopMind Chat (type :q to quit)")?;
            writeln!(stdout, "Session: {}", ctx.session_id())?;
            write!(stdout, "{PROMPT_PREFIX}")?;
            stdout.flush()?;

            repl::run_repl(stdin.lock(), &mut stdout, &mut ctx, &turn).await
        }
        Commands::Ask {
            question,
            product,
            order,
            html,
        } => {
            let turn = turn_context(product, order);
            if html {
                let answer = ctx.ask(&question, &turn).await?;
                println!("{}", render_markup(&answer));
            } else {
                let mut stdout = std::io::stdout();
                let answer = ctx
                    .ask_with(&question, &turn, |piece| {
                        let _ = write!(stdout, "{piece}");
                        let _ = stdout.flush();
                    })
                    .await?;
                if !answer.is_empty() {
                    writeln!(stdout)?;
                }
            }
            Ok(())
        }
        Commands::History { html } => {
            ctx.load_history().await?;
            for message in ctx.messages() {
                if html && message.role == crate::message::Role::Assistant {
                    println!("{}> {}", message.role, render_markup(&message.content));
                } else {
                    println!("{}> {}", message.role, message.content);
                }
            }
            Ok(())
        }
        Commands::Clear => {
            ctx.clear().await;
            println!("Conversation cleared.");
            Ok(())
        }
        Commands::Init => unreachable!("handled above"),
    }
}

fn turn_context(product: Option<String>, order: Option<String>) -> TurnContext {
    TurnContext {
        product_id: product,
        order_id: order,
    }
}
