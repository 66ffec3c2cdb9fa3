use clap::CommandFactory;
use hrdesk_cli::Cli;

#[test]
fn cli_definition_is_internally_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn all_subcommands_are_listed() {
    let command = Cli::command();
    let names: Vec<&str> = command.get_subcommands().map(|sub| sub.get_name()).collect();
    assert!(names.contains(&"config"));
    assert!(names.contains(&"doctor"));
    assert!(names.contains(&"smoke"));
}

#[test]
fn doctor_accepts_the_json_flag() {
    use clap::Parser;
    assert!(Cli::try_parse_from(["hrdesk", "doctor", "--json"]).is_ok());
    assert!(Cli::try_parse_from(["hrdesk", "doctor", "--yaml"]).is_err());
    assert!(Cli::try_parse_from(["hrdesk", "restart"]).is_err());
}
