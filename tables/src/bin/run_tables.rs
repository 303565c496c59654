use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use database::{DatabaseConfig, SqliteGateway};
use tables::{ServerConfig, ServerContext, Session, TableState};
use types::{game::MAX_CLUE_TOKENS, Action, Clue, Game, GameOptions};

#[derive(Parser, Debug)]
struct Params {
    #[arg(short, long)]
    player: Vec<String>,

    #[arg(short, long)]
    seed: Option<u64>,

    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    database_url: Option<String>,

    #[arg(long, default_value = "No Variant")]
    variant: String,

    #[arg(long)]
    timed: bool,
}

fn bot_action(game: &Game) -> Action {
    let seat = game.active_player;
    let hand = &game.players[seat].hand;
    if let Some(card) = hand.iter().find(|c| game.stacks[c.suit] + 1 == c.rank) {
        return Action::Play {
            player: seat,
            target: card.order,
        };
    }
    let next = (seat + 1) % game.players.len();
    match (game.clue_tokens, game.players[next].hand.first(), hand.first()) {
        (MAX_CLUE_TOKENS, Some(card), _) => Action::Clue {
            player: seat,
            target: next,
            clue: Clue::Rank(card.rank),
        },
        (_, _, Some(card)) if game.clue_tokens < MAX_CLUE_TOKENS => Action::Discard {
            player: seat,
            target: card.order,
        },
        (_, _, Some(card)) => Action::Play {
            player: seat,
            target: card.order,
        },
        // empty hand at the end of the deck
        _ => Action::Clue {
            player: seat,
            target: next,
            clue: Clue::Rank(1),
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Params::parse();
    log::info!("args: {args:?}");

    let config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    let catalog = config.catalog()?;
    let db_config = DatabaseConfig::from_cli_or_env_or_yaml(
        args.database_url.clone(),
        config.database_url.clone(),
    );
    let gateway = SqliteGateway::new(db_config.create_pool().await?);
    gateway.run_migrations().await?;

    let ctx = ServerContext::new(config, catalog, Arc::new(gateway));

    let mut sessions = Vec::new();
    for (i, name) in args.player.iter().enumerate() {
        let (session, mut rx) = Session::new(i as i64 + 1, name.as_str());
        ctx.sessions.register(session.clone()).await;
        let name = name.clone();
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                log::debug!("{name} <- {}", message.event_name());
            }
        });
        sessions.push(session);
    }
    let Some(owner) = sessions.first().cloned() else {
        return Err("at least one --player is needed".into());
    };

    let options = GameOptions {
        variant: args.variant.clone(),
        timed: args.timed,
        ..GameOptions::default()
    };
    let table = ctx
        .create_table(owner.clone(), format!("{}'s game", owner.name), options)
        .await?;
    for session in sessions.iter().skip(1) {
        table.join(session.clone()).await?;
    }
    table.start(owner.user_id, args.seed).await?;

    loop {
        let snapshot = table.snapshot().await?;
        let Some(game) = snapshot.game.as_ref().filter(|_| snapshot.state == TableState::Running)
        else {
            break;
        };
        let user_id = snapshot.players[game.active_player].user_id;
        let action = bot_action(game);
        log::info!("Turn {}: {action}", game.turn);
        match table.perform(user_id, action).await {
            Ok(TableState::Running) => {}
            Ok(state) => {
                log::info!("Table is now {state:?}");
                break;
            }
            Err(err) => {
                log::error!("Bot action rejected: {err}");
                break;
            }
        }
    }

    match table.snapshot().await {
        Ok(snapshot) => println!("{}", serde_json::to_string_pretty(&snapshot.summary())?),
        Err(err) => println!("Table closed: {err}"),
    }
    Ok(())
}
