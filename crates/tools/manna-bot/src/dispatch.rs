use crate::command::{parse, BuyItem, Command, ParseError, COMMANDS};
use manna_ledger::{Ledger, LedgerError, PlayerId, PlayerRecord, PlayerStore};
use std::sync::Arc;
use tracing::{debug, info};

/// What the bot says back for one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    /// Lines sent back to the author.
    pub lines: Vec<String>,
    /// Line posted to the campaign's main channel, if any.
    pub announcement: Option<String>,
}

impl Reply {
    fn line(text: impl Into<String>) -> Self {
        Self {
            lines: vec![text.into()],
            announcement: None,
        }
    }

    fn push(&mut self, text: impl Into<String>) {
        self.lines.push(text.into());
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Turns command messages into ledger operations and reply text.
///
/// Rule violations become reply lines; only storage failures are returned as errors.
pub struct Dispatcher<S: PlayerStore> {
    ledger: Arc<Ledger<S>>,
    prefix: String,
    gm_manna: u64,
}

impl<S: PlayerStore> Dispatcher<S> {
    pub fn new(ledger: Arc<Ledger<S>>, prefix: impl Into<String>, gm_manna: u64) -> Self {
        Self {
            ledger,
            prefix: prefix.into(),
            gm_manna,
        }
    }

    pub fn ledger(&self) -> &Arc<Ledger<S>> {
        &self.ledger
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn no_mech(&self) -> String {
        format!(
            "You do not seem to have a mech. Run \"{}init <callsign>\" to create one.",
            self.prefix
        )
    }

    /// Handle a raw message. Returns `None` for messages that are not commands.
    pub fn handle_message(&self, author: PlayerId, message: &str) -> Result<Option<Reply>, LedgerError> {
        match parse(message, &self.prefix) {
            Ok(command) => self.execute(author, command).map(Some),
            Err(ParseError::NotACommand) => Ok(None),
            Err(e) => {
                debug!(%author, error = %e, "Rejected command");
                Ok(Some(Reply::line(self.parse_error_text(&e))))
            }
        }
    }

    fn parse_error_text(&self, error: &ParseError) -> String {
        match error {
            ParseError::UnknownCommand(_) => format!(
                "Command not found. Please check the \"{}help\" command for a list of commands.",
                self.prefix
            ),
            ParseError::MissingArgument { argument, .. } => {
                format!("This function requires input: please provide {}.", argument)
            }
            ParseError::BadArgument { .. } | ParseError::NotACommand => format!(
                "Incorrect arguments. Please check the \"{}help\" command for more information.",
                self.prefix
            ),
        }
    }

    pub fn execute(&self, author: PlayerId, command: Command) -> Result<Reply, LedgerError> {
        debug!(%author, ?command, "Executing command");
        match command {
            Command::Init { manna, callsign } => self.init(author, manna, callsign),
            Command::Delete => self.delete(author),
            Command::Check => self.with_mech(author, |_, record| Ok(Reply::line(record.to_string()))),
            Command::UpdateCallsign { callsign } => self.with_mech(author, |ledger, _| {
                let record = ledger.rename(author, callsign)?;
                Ok(Reply::line(record.to_string()))
            }),
            Command::Buy { items } => self.buy(author, &items),
            Command::CompleteMission { manna, players } => {
                self.complete_mission(author, manna, &players)
            }
            Command::PlayerCompleteMission { manna, gm, players } => {
                self.player_complete_mission(author, manna, gm, &players)
            }
            Command::Ping => Ok(Reply::line("pong")),
            Command::Help => Ok(self.help()),
        }
    }

    fn with_mech<F>(&self, author: PlayerId, f: F) -> Result<Reply, LedgerError>
    where
        F: FnOnce(&Ledger<S>, PlayerRecord) -> Result<Reply, LedgerError>,
    {
        match self.ledger.find(author)? {
            Some(record) => f(&self.ledger, record),
            None => Ok(Reply::line(self.no_mech())),
        }
    }

    fn init(&self, author: PlayerId, manna: u64, callsign: String) -> Result<Reply, LedgerError> {
        if let Some(existing) = self.ledger.find(author)? {
            return Ok(self.already_has_mech(&existing));
        }
        match self.ledger.create(author, callsign, manna) {
            Ok(record) => Ok(Reply {
                lines: vec!["Created new mech.".to_string(), record.to_string()],
                announcement: None,
            }),
            // lost a race with another init for the same author
            Err(LedgerError::AlreadyExists(_)) => match self.ledger.find(author)? {
                Some(existing) => Ok(self.already_has_mech(&existing)),
                None => Ok(Reply::line(self.no_mech())),
            },
            Err(e) => Err(e),
        }
    }

    fn already_has_mech(&self, existing: &PlayerRecord) -> Reply {
        Reply::line(format!(
            "You already have a mech: {}. Run \"{}delete\" to remove it.",
            existing, self.prefix
        ))
    }

    fn delete(&self, author: PlayerId) -> Result<Reply, LedgerError> {
        self.with_mech(author, |ledger, record| match ledger.delete(author, true) {
            Ok(_) => Ok(Reply::line(format!("{} deleted.", record.callsign))),
            Err(LedgerError::NotFound(_)) => Ok(Reply::line(self.no_mech())),
            Err(e) => Err(e),
        })
    }

    fn buy(&self, author: PlayerId, items: &[BuyItem]) -> Result<Reply, LedgerError> {
        self.with_mech(author, |ledger, _| {
            let mut reply = Reply::default();
            for item in items {
                match item {
                    BuyItem::Upgrade(category) => match ledger.purchase(author, *category) {
                        Ok(_) => reply.push(format!(
                            "Successfully bought {}.",
                            category.with_article()
                        )),
                        Err(e) if e.is_rule_violation() => reply.push(format!(
                            "Unable to buy {}. {}",
                            category.with_article(),
                            e
                        )),
                        Err(e) => return Err(e),
                    },
                    BuyItem::Unknown(request) => reply.push(format!(
                        "I don't know what to do with {}. Options are: l[icence], ta[lent] or tr[aining]",
                        request
                    )),
                }
            }
            reply.push("");
            reply.push(ledger.summary(author)?);
            Ok(reply)
        })
    }

    /// Award `amount` to `player` if they have a record. Returns whether they did.
    fn award(&self, player: PlayerId, amount: u64) -> Result<bool, LedgerError> {
        match self.ledger.grant(player, amount) {
            Ok(_) => Ok(true),
            Err(LedgerError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn complete_mission(
        &self,
        gm: PlayerId,
        manna: u64,
        players: &[PlayerId],
    ) -> Result<Reply, LedgerError> {
        let mut reply = Reply::default();
        if self.award(gm, self.gm_manna)? {
            reply.push(format!("giving {} Manna to {}", self.gm_manna, gm.mention()));
        } else {
            reply.push(format!("Unable to award GM Manna. {}", self.no_mech()));
        }

        for player in players {
            if self.award(*player, manna)? {
                reply.push(format!("giving {} Manna to {}", manna, player.mention()));
            } else {
                reply.push(format!("Unable to award {} Manna.", player.mention()));
            }
        }

        let attendees = mentions(players);
        info!(%gm, manna, players = players.len(), "Mission completed");
        reply.announcement = Some(format!(
            "A game run by {} completed attended by {}. {} Manna is awarded.",
            gm.mention(),
            attendees,
            manna
        ));
        Ok(reply)
    }

    fn player_complete_mission(
        &self,
        author: PlayerId,
        manna: u64,
        gm: PlayerId,
        players: &[PlayerId],
    ) -> Result<Reply, LedgerError> {
        let mut reply = Reply::default();
        if self.award(gm, self.gm_manna)? {
            reply.push(format!("giving {} Manna to {}", self.gm_manna, gm.mention()));
        } else {
            reply.push(format!("Unable to award GM Manna to {}.", gm.mention()));
        }

        for player in players {
            if self.award(*player, manna)? {
                reply.push(format!("giving {} Manna to {}", manna, player.mention()));
            } else {
                reply.push(format!(
                    "Unable to award {} Manna. {}",
                    player.mention(),
                    self.no_mech()
                ));
            }
        }

        let mut attendees: Vec<PlayerId> = players.to_vec();
        if !players.contains(&author) {
            if self.award(author, manna)? {
                reply.push(format!("giving {} Manna to {}", manna, author.mention()));
            } else {
                reply.push(format!("Unable to award you Manna. {}", self.no_mech()));
            }
            attendees.push(author);
        }

        info!(%gm, %author, manna, players = attendees.len(), "Mission completed");
        reply.announcement = Some(format!(
            "A mission by {} was successfully completed by {}. {} Manna is awarded.",
            gm.mention(),
            mentions(&attendees),
            manna
        ));
        Ok(reply)
    }

    fn help(&self) -> Reply {
        let mut reply = Reply::line("Commands:");
        for info in COMMANDS {
            let aliases = if info.aliases.is_empty() {
                String::new()
            } else {
                format!(" ({})", info.aliases.join(", "))
            };
            reply.push(format!("{}{}{} {}", self.prefix, info.name, aliases, info.usage));
        }
        reply
    }
}

fn mentions(players: &[PlayerId]) -> String {
    players
        .iter()
        .map(|p| p.mention())
        .collect::<Vec<_>>()
        .join(", ")
}
