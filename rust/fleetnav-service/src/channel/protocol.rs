//! Line-oriented text protocol spoken over the live channel.
//!
//! Inbound:
//! - `register <identity>`: bind this connection to an identity (may contain spaces)
//! - `location <botId> <lat> <lon>`: position report
//! - `join ...`: greeting from a client that does not receive commands
//!
//! Outbound commands are bare words (`up`, `down`, `left`, `right`, `ping`).

use std::fmt;

use fleetnav_core::{BotId, Location};

#[derive(Clone, Debug, PartialEq)]
pub enum Inbound {
    Register(String),
    Location { bot: BotId, location: Location },
    Join,
    Unknown,
}

impl Inbound {
    pub fn parse(line: &str) -> Inbound {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        match verb {
            "register" if !rest.is_empty() => Inbound::Register(rest.to_string()),
            "location" => parse_location(rest).unwrap_or(Inbound::Unknown),
            "join" => Inbound::Join,
            _ => Inbound::Unknown,
        }
    }
}

fn parse_location(rest: &str) -> Option<Inbound> {
    let mut parts = rest.split_whitespace();
    let bot = parts.next()?.parse::<BotId>().ok()?;
    let lat = parts.next()?.parse::<f64>().ok()?;
    let lon = parts.next()?.parse::<f64>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    let location = Location::validated(lat, lon).ok()?;
    Some(Inbound::Location { bot, location })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Welcome(Option<String>),
    LocationAccepted,
    Unrecognized,
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Welcome(Some(identity)) => write!(f, "welcome {identity}"),
            Reply::Welcome(None) => f.write_str("welcome"),
            Reply::LocationAccepted => f.write_str("location accepted"),
            Reply::Unrecognized => f.write_str("error: unrecognized message"),
        }
    }
}
