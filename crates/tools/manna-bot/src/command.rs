use manna_ledger::{Category, PlayerId};
use thiserror::Error;

/// One entry of a `buy` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuyItem {
    Upgrade(Category),
    Unknown(String),
}

impl BuyItem {
    /// `l...` is a licence, `ta...` a talent and `tr...` training.
    pub fn parse(request: &str) -> Self {
        let lower = request.to_lowercase();
        if lower.starts_with('l') {
            BuyItem::Upgrade(Category::Licence)
        } else if lower.starts_with("ta") {
            BuyItem::Upgrade(Category::Talent)
        } else if lower.starts_with("tr") {
            BuyItem::Upgrade(Category::Training)
        } else {
            BuyItem::Unknown(request.to_string())
        }
    }
}

/// A parsed bot command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Init { manna: u64, callsign: String },
    Delete,
    Check,
    UpdateCallsign { callsign: String },
    Buy { items: Vec<BuyItem> },
    CompleteMission { manna: u64, players: Vec<PlayerId> },
    PlayerCompleteMission { manna: u64, gm: PlayerId, players: Vec<PlayerId> },
    Ping,
    Help,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("message is not a command")]
    NotACommand,

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("'{command}' requires {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    #[error("invalid {argument} '{value}'")]
    BadArgument {
        argument: &'static str,
        value: String,
    },
}

/// Name, aliases and usage of a command.
#[derive(Debug, Clone, Copy)]
pub struct CommandInfo {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub usage: &'static str,
}

/// Every command, in help order.
pub const COMMANDS: &[CommandInfo] = &[
    CommandInfo { name: "init", aliases: &["i"], usage: "[manna] <callsign> - Create a record." },
    CommandInfo { name: "delete", aliases: &[], usage: "Delete your record. WARNING: irreversible." },
    CommandInfo { name: "check", aliases: &["c"], usage: "Check your balance and purchases." },
    CommandInfo { name: "update_callsign", aliases: &["uc"], usage: "<callsign> - Update your callsign." },
    CommandInfo {
        name: "buy",
        aliases: &["b"],
        usage: "<items> - Spend manna. Options are l[icence], ta[lent] or tr[aining].",
    },
    CommandInfo {
        name: "complete_mission",
        aliases: &["cm"],
        usage: "<manna> <@player...> - Award manna for a mission you ran as GM.",
    },
    CommandInfo {
        name: "player_complete_mission",
        aliases: &["pcm"],
        usage: "<manna> <@gm> <@player...> - Award manna for a mission you played in.",
    },
    CommandInfo { name: "ping", aliases: &["p"], usage: "pong" },
    CommandInfo { name: "help", aliases: &["h"], usage: "Show this list." },
];

fn canonical_name(word: &str) -> Option<&'static str> {
    COMMANDS
        .iter()
        .find(|info| info.name == word || info.aliases.contains(&word))
        .map(|info| info.name)
}

/// Parse a chat message. Messages not starting with `prefix` are `NotACommand`.
pub fn parse(message: &str, prefix: &str) -> Result<Command, ParseError> {
    let body = message
        .trim()
        .strip_prefix(prefix)
        .ok_or(ParseError::NotACommand)?;
    let (word, rest) = split_word(body);
    if word.is_empty() {
        return Err(ParseError::NotACommand);
    }
    let name = canonical_name(word).ok_or_else(|| ParseError::UnknownCommand(word.to_string()))?;

    match name {
        "init" => parse_init(rest),
        "delete" => Ok(Command::Delete),
        "check" => Ok(Command::Check),
        "update_callsign" => {
            let callsign = required_text(rest, "update_callsign", "a callsign")?;
            Ok(Command::UpdateCallsign { callsign })
        }
        "buy" => {
            let items: Vec<BuyItem> = rest.split_whitespace().map(BuyItem::parse).collect();
            if items.is_empty() {
                return Err(ParseError::MissingArgument {
                    command: "buy",
                    argument: "a list of items",
                });
            }
            Ok(Command::Buy { items })
        }
        "complete_mission" => {
            let mut args = rest.split_whitespace();
            let manna = parse_manna(args.next(), "complete_mission")?;
            let players = parse_players(args)?;
            Ok(Command::CompleteMission { manna, players })
        }
        "player_complete_mission" => {
            let mut args = rest.split_whitespace();
            let manna = parse_manna(args.next(), "player_complete_mission")?;
            let gm = args
                .next()
                .ok_or(ParseError::MissingArgument {
                    command: "player_complete_mission",
                    argument: "the GM",
                })
                .and_then(parse_player)?;
            let players = parse_players(args)?;
            Ok(Command::PlayerCompleteMission { manna, gm, players })
        }
        "ping" => Ok(Command::Ping),
        _ => Ok(Command::Help),
    }
}

/// `init` takes an optional leading amount, so a callsign cannot start with
/// a number followed by a space.
fn parse_init(rest: &str) -> Result<Command, ParseError> {
    let (first, after) = split_word(rest);
    let (manna, callsign_text) = match first.parse::<u64>() {
        Ok(manna) => (manna, after),
        Err(_) => (0, rest),
    };
    let callsign = required_text(callsign_text, "init", "a callsign")?;
    Ok(Command::Init { manna, callsign })
}

fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (text, ""),
    }
}

fn required_text(
    text: &str,
    command: &'static str,
    argument: &'static str,
) -> Result<String, ParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ParseError::MissingArgument { command, argument });
    }
    Ok(text.to_string())
}

fn parse_manna(arg: Option<&str>, command: &'static str) -> Result<u64, ParseError> {
    let arg = arg.ok_or(ParseError::MissingArgument {
        command,
        argument: "an amount of manna",
    })?;
    arg.parse().map_err(|_| ParseError::BadArgument {
        argument: "manna",
        value: arg.to_string(),
    })
}

fn parse_player(arg: &str) -> Result<PlayerId, ParseError> {
    arg.parse().map_err(|_| ParseError::BadArgument {
        argument: "player",
        value: arg.to_string(),
    })
}

/// Mentions in order, each player once.
fn parse_players<'a>(args: impl Iterator<Item = &'a str>) -> Result<Vec<PlayerId>, ParseError> {
    let mut players = Vec::new();
    for arg in args {
        let id = parse_player(arg)?;
        if !players.contains(&id) {
            players.push(id);
        }
    }
    Ok(players)
}
