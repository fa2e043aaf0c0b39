use super::chat::{find_session, parse_command, ReplCommand};
use super::*;
use crate::core::message::Feedback;

fn parse_args(argv: &[&str]) -> Args {
    Args::try_parse_from(argv)
        .unwrap_or_else(|err| panic!("argv={argv:?} should parse successfully: {err}"))
}

#[test]
fn chat_is_the_default_command() {
    let args = parse_args(&["toolrelay"]);
    assert!(args.command.is_none());
    assert!(args.config.is_none());
    assert!(args.log.is_none());
}

#[test]
fn global_flags_parse_after_subcommands() {
    let args = parse_args(&[
        "toolrelay",
        "tools",
        "--config",
        "/tmp/relay.toml",
        "-l",
        "/tmp/relay.log",
    ]);
    assert!(matches!(args.command, Some(Commands::Tools)));
    assert_eq!(args.config, Some(PathBuf::from("/tmp/relay.toml")));
    assert_eq!(args.log, Some(PathBuf::from("/tmp/relay.log")));
}

#[test]
fn say_collects_every_word() {
    let argv = ["toolrelay", "say", "show", "patient", "-42"];
    let args = parse_args(&argv);
    match args.command {
        Some(Commands::Say { prompt }) => {
            assert_eq!(prompt, vec!["show", "patient", "-42"]);
        }
        _ => panic!("expected say for argv={argv:?}"),
    }

    let args = parse_args(&["toolrelay", "--auth-token", "t", "say", "hi"]);
    assert_eq!(args.auth_token.as_deref(), Some("t"));
}

#[test]
fn config_subcommands_parse() {
    let args = parse_args(&["toolrelay", "config", "init", "--force"]);
    assert!(matches!(
        args.command,
        Some(Commands::Config {
            command: ConfigCommands::Init { force: true }
        })
    ));
    assert!(Args::try_parse_from(["toolrelay", "config"]).is_err());
}

#[test]
fn slash_commands_parse() {
    assert_eq!(parse_command("/new"), Ok(ReplCommand::New(None)));
    assert_eq!(
        parse_command("/new  Ward rounds "),
        Ok(ReplCommand::New(Some("Ward rounds".into())))
    );
    assert_eq!(
        parse_command("/SWITCH abc"),
        Ok(ReplCommand::Switch("abc".into()))
    );
    assert_eq!(
        parse_command("/dislike"),
        Ok(ReplCommand::Rate(Feedback::Disliked))
    );
    assert_eq!(parse_command("/exit"), Ok(ReplCommand::Quit));
}

#[test]
fn slash_commands_report_usage_errors() {
    assert_eq!(
        parse_command("/rename"),
        Err("Usage: /rename <name>".to_string())
    );
    assert_eq!(
        parse_command("/frobnicate now"),
        Err("Unknown command: /frobnicate (try /help)".to_string())
    );
}

#[test]
fn sessions_are_found_by_id_prefix_or_name() {
    let store = SessionStore::new();
    store.create_with_id("abc-123", Some("Morning"));
    store.create_with_id("abd-456", Some("Evening"));

    assert_eq!(
        find_session(&store, "abc-123").map(|s| s.name),
        Some("Morning".to_string())
    );
    assert_eq!(
        find_session(&store, "abd").map(|s| s.id),
        Some("abd-456".to_string())
    );
    assert!(find_session(&store, "ab").is_none());
    assert_eq!(
        find_session(&store, "Evening").map(|s| s.id),
        Some("abd-456".to_string())
    );
}
