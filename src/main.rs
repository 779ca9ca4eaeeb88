//! edrelay binary: server-mode broker or one-shot client request.
//!
//! With no mode flag and no arguments the process is the broker itself,
//! serving the editor on its stdio. Otherwise it is a one-shot client:
//! it connects to the session broker, issues a single request built from
//! the command line, waits for the editor's reply, and exits.

use std::env;
use std::process;

use clap::Parser;

use edrelay::{protocol, Broker, Connection, RelayClient, Result};

#[derive(Parser, Debug)]
#[command(version, about = "Message relay between a text editor and its helper tools")]
struct Cli {
    /// Ask the editor to clear the session output buffer
    #[arg(short = 'c', long, group = "request")]
    clear: bool,

    /// Ask the editor to look up the given text
    #[arg(short = 'l', long, group = "request")]
    look: bool,

    /// Ask the editor to open a scratch buffer running the given command
    #[arg(short = 's', long, group = "request")]
    scratch: bool,

    /// Arguments appended to the request (file paths, search text).
    /// With no mode flag, these are files to edit.
    args: Vec<String>,
}

#[derive(Clone, Copy)]
enum RequestKind {
    Clear,
    Look,
    Scratch,
    Edit,
}

impl RequestKind {
    fn from_cli(cli: &Cli) -> Option<Self> {
        if cli.clear {
            Some(Self::Clear)
        } else if cli.look {
            Some(Self::Look)
        } else if cli.scratch {
            Some(Self::Scratch)
        } else if cli.args.is_empty() {
            None
        } else {
            Some(Self::Edit)
        }
    }

    fn command(self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Look => "look",
            Self::Scratch => "scratch",
            Self::Edit => "edit",
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match RequestKind::from_cli(&cli) {
        None => serve(),
        Some(kind) => run_request(kind, cli.args),
    };
    if let Err(err) = result {
        eprintln!("edrelay: {err}");
        process::exit(1);
    }
}

/// Server mode: broker on stdio, serving until the editor goes away.
fn serve() -> Result<()> {
    let editor = Connection::stdio("editor".to_string())?;
    let mut broker = Broker::bind(editor)?;
    broker.announce_port()?;
    broker.run()
}

/// Client mode: issue one request and wait for the editor's reply.
fn run_request(kind: RequestKind, args: Vec<String>) -> Result<()> {
    let command = kind.command();
    let mut fields: Vec<Vec<u8>> = vec![command.as_bytes().to_vec()];
    match kind {
        // edit and scratch are resolved relative to the caller, so they
        // carry the working directory as their first argument; scratch
        // also reserves the title field.
        RequestKind::Edit => fields.push(cwd()?),
        RequestKind::Scratch => {
            fields.push(cwd()?);
            fields.push(Vec::new());
        }
        RequestKind::Clear | RequestKind::Look => {}
    }
    fields.extend(args.into_iter().map(String::into_bytes));

    let response_tag = protocol::response_tag(command).expect("command is in the vocabulary");
    let mut client = RelayClient::connect()?;
    client.request_blocking(&fields, response_tag)?;
    Ok(())
}

fn cwd() -> Result<Vec<u8>> {
    Ok(env::current_dir()?.into_os_string().into_encoded_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Cli {
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_no_arguments_selects_server_mode() {
        let cli = parse(&["edrelay"]);
        assert!(RequestKind::from_cli(&cli).is_none());
    }

    #[test]
    fn test_bare_arguments_select_edit() {
        let cli = parse(&["edrelay", "src/lib.rs"]);
        let kind = RequestKind::from_cli(&cli).unwrap();
        assert_eq!(kind.command(), "edit");
    }

    #[test]
    fn test_mode_flags() {
        assert_eq!(
            RequestKind::from_cli(&parse(&["edrelay", "-c"])).unwrap().command(),
            "clear"
        );
        assert_eq!(
            RequestKind::from_cli(&parse(&["edrelay", "-l", "needle"]))
                .unwrap()
                .command(),
            "look"
        );
        assert_eq!(
            RequestKind::from_cli(&parse(&["edrelay", "-s", "git", "status"]))
                .unwrap()
                .command(),
            "scratch"
        );
    }

    #[test]
    fn test_mode_flags_are_mutually_exclusive() {
        assert!(Cli::try_parse_from(["edrelay", "-c", "-l"]).is_err());
        assert!(Cli::try_parse_from(["edrelay", "-s", "-c"]).is_err());
    }

    #[test]
    fn test_every_mode_has_a_response_tag() {
        for kind in [
            RequestKind::Clear,
            RequestKind::Look,
            RequestKind::Scratch,
            RequestKind::Edit,
        ] {
            assert!(protocol::response_tag(kind.command()).is_some());
        }
    }
}
