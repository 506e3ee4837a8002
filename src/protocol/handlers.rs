//! Command handlers module for the RAX FTP server.
//!
//! Each handler applies one command to the session's protocol state and
//! returns the replies to send. Handlers never touch the transport.

use log::{info, warn};

use crate::client::context::SessionContext;
use crate::client::state::{Client, SessionState, TransferMode, TransferType};
use crate::navigate;
use crate::protocol::responses::{self, Reply};
use crate::protocol::{Command, CommandStatus};

/// Capabilities advertised by FEAT. Declarative only: no data channel backs them.
pub const FEATURES: [&str; 4] = ["EPSV", "REST STREAM", "SIZE", "MDTM"];

/// Struct encapsulating the full result of a command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub status: CommandStatus,
    pub replies: Vec<Reply>,
}

impl CommandResult {
    fn success(reply: Reply) -> Self {
        Self {
            status: CommandStatus::Success,
            replies: vec![reply],
        }
    }

    fn failure(reason: &str, reply: Reply) -> Self {
        Self {
            status: CommandStatus::Failure(reason.to_string()),
            replies: vec![reply],
        }
    }

    fn close(replies: Vec<Reply>) -> Self {
        Self {
            status: CommandStatus::CloseConnection,
            replies,
        }
    }
}

/// Dispatches a received FTP command to its corresponding handler.
///
/// A closed client is terminal: nothing is dispatched and the caller is told
/// to drop the connection without a reply.
pub fn handle_command(
    client: &mut Client,
    command: &Command,
    context: &SessionContext,
) -> CommandResult {
    if client.is_closed() {
        return CommandResult::close(Vec::new());
    }

    match command {
        Command::User(username) => handle_cmd_user(client, username.as_deref()),
        Command::Pass(password) => handle_cmd_pass(client, password.as_deref(), context),
        Command::Quit => handle_cmd_quit(client),
        Command::Pwd => handle_cmd_pwd(client),
        Command::Cwd(path) => handle_cmd_cwd(client, path.as_deref()),
        Command::List(_) => handle_cmd_list(client),
        Command::Noop => CommandResult::success(Reply::new(responses::OK, "OK")),
        Command::Syst => {
            CommandResult::success(Reply::new(responses::SYSTEM_TYPE, "UNIX Type: L8"))
        }
        Command::Feat => handle_cmd_feat(),
        Command::Type(kind) => handle_cmd_type(client, kind.as_deref()),
        Command::Mode(mode) => handle_cmd_mode(client, mode.as_deref()),
        Command::Unknown(verb) => CommandResult::failure(
            "Unknown command",
            Reply::new(responses::SYNTAX_ERROR, format!("Unknown command: {}", verb)),
        ),
    }
}

fn not_logged_in() -> CommandResult {
    CommandResult::failure(
        "Not logged in",
        Reply::new(responses::NOT_LOGGED_IN, "Please login with USER and PASS."),
    )
}

fn syntax_error(reason: &str) -> CommandResult {
    CommandResult::failure(
        reason,
        Reply::new(
            responses::PARAMETER_ERROR,
            "Syntax error in parameters or arguments.",
        ),
    )
}

/// Handles the USER command: buffers the name and asks for a password.
fn handle_cmd_user(client: &mut Client, username: Option<&str>) -> CommandResult {
    let Some(username) = username else {
        return syntax_error("Missing username");
    };

    client.begin_login(username.to_string());
    CommandResult::success(Reply::new(
        responses::PASSWORD_REQUIRED,
        format!("User {} OK. Password required.", username),
    ))
}

/// Handles the PASS command: checks the buffered name's credentials.
///
/// After a rejected password the name stays buffered, so another PASS retries
/// the same user without a new USER.
fn handle_cmd_pass(
    client: &mut Client,
    password: Option<&str>,
    context: &SessionContext,
) -> CommandResult {
    let Some(password) = password else {
        return syntax_error("Missing password");
    };

    let may_authenticate = match client.state() {
        SessionState::AwaitingPassword => true,
        SessionState::Connected => client.pending_username().is_some(),
        SessionState::Authenticated | SessionState::Closed => false,
    };
    let username = match client.pending_username() {
        Some(name) if may_authenticate => name.to_string(),
        _ => {
            return CommandResult::failure(
                "Username not provided",
                Reply::new(responses::BAD_SEQUENCE, "Login with USER first."),
            );
        }
    };

    match context.authenticator.authenticate(&username, password) {
        Ok(()) => {
            client.complete_login();
            context.stats.login_succeeded();
            info!(
                "User {} authenticated from {}",
                username,
                client.client_addr()
            );
            CommandResult::success(Reply::new(
                responses::LOGIN_SUCCESS,
                format!("User {} logged in.", username),
            ))
        }
        Err(e) => {
            client.fail_login();
            context.stats.login_failed();
            warn!(
                "Failed login attempt for user {} from {}: {}",
                username,
                client.client_addr(),
                e
            );

            let incorrect = Reply::new(responses::NOT_LOGGED_IN, "Login incorrect.");
            let limit = u64::from(context.max_login_attempts);
            if limit > 0 && client.failed_logins() >= limit {
                warn!(
                    "Closing {} after {} failed login attempts",
                    client.client_addr(),
                    client.failed_logins()
                );
                return CommandResult::close(vec![
                    incorrect,
                    Reply::new(
                        responses::SERVICE_UNAVAILABLE,
                        "Too many failed login attempts",
                    ),
                ]);
            }
            CommandResult::failure("Login incorrect", incorrect)
        }
    }
}

/// Handles the QUIT command: closes the session from any state.
fn handle_cmd_quit(client: &mut Client) -> CommandResult {
    client.close();
    CommandResult::close(vec![Reply::new(responses::GOODBYE, "Goodbye")])
}

/// Handles the PWD command: returns the current virtual directory.
fn handle_cmd_pwd(client: &Client) -> CommandResult {
    if !client.is_logged_in() {
        return not_logged_in();
    }

    CommandResult::success(Reply::new(
        responses::PATH_CREATED,
        format!("\"{}\" is current directory", client.current_virtual_path()),
    ))
}

/// Handles the CWD command using the minimal virtual path model.
fn handle_cmd_cwd(client: &mut Client, path: Option<&str>) -> CommandResult {
    if !client.is_logged_in() {
        return not_logged_in();
    }

    let Some(path) = path else {
        return syntax_error("Missing directory path");
    };

    match navigate::change_directory(path) {
        Ok(new_path) => {
            let reply = Reply::new(
                responses::FILE_ACTION_OK,
                format!("Directory changed to {}", new_path),
            );
            client.set_current_virtual_path(new_path);
            CommandResult::success(reply)
        }
        Err(e) => {
            warn!("CWD rejected for {}: {}", client.client_addr(), e);
            syntax_error("Invalid path")
        }
    }
}

/// Handles the LIST command. No data connection exists, so the listing is
/// acknowledged without payload.
fn handle_cmd_list(client: &Client) -> CommandResult {
    if !client.is_logged_in() {
        return not_logged_in();
    }

    CommandResult {
        status: CommandStatus::Success,
        replies: vec![
            Reply::new(responses::OPENING_DATA, "Here comes the directory listing"),
            Reply::new(responses::TRANSFER_COMPLETE, "Directory send OK"),
        ],
    }
}

fn handle_cmd_feat() -> CommandResult {
    let lines = std::iter::once("Features:".to_string())
        .chain(FEATURES.iter().map(|feature| format!(" {}", feature)))
        .chain(std::iter::once("End".to_string()));
    CommandResult::success(Reply::multiline(responses::FEATURES, lines))
}

fn handle_cmd_type(client: &mut Client, kind: Option<&str>) -> CommandResult {
    if !client.is_logged_in() {
        return not_logged_in();
    }

    let Some(kind) = kind else {
        return syntax_error("Missing type");
    };

    let transfer_type = match kind.to_ascii_uppercase().as_str() {
        "A" => TransferType::Ascii,
        "I" => TransferType::Binary,
        _ => {
            return CommandResult::failure(
                "Unsupported type",
                Reply::new(
                    responses::PARAMETER_NOT_IMPLEMENTED,
                    format!("Type {} not implemented.", kind),
                ),
            );
        }
    };

    client.set_transfer_type(transfer_type);
    let label = match transfer_type {
        TransferType::Ascii => "A",
        TransferType::Binary => "I",
    };
    CommandResult::success(Reply::new(responses::OK, format!("Type set to {}", label)))
}

fn handle_cmd_mode(client: &mut Client, mode: Option<&str>) -> CommandResult {
    if !client.is_logged_in() {
        return not_logged_in();
    }

    match mode {
        None => syntax_error("Missing mode"),
        Some(mode) if mode.eq_ignore_ascii_case("S") => {
            client.set_transfer_mode(TransferMode::Stream);
            CommandResult::success(Reply::new(responses::OK, "Mode set to S"))
        }
        Some(mode) => CommandResult::failure(
            "Unsupported mode",
            Reply::new(
                responses::PARAMETER_NOT_IMPLEMENTED,
                format!("Mode {} not implemented.", mode),
            ),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::test_context;
    use crate::protocol::parse_command;

    fn new_client() -> Client {
        Client::new("127.0.0.1:40000".parse().unwrap())
    }

    /// Runs one line and returns the wire text of its replies.
    fn run(client: &mut Client, context: &SessionContext, line: &str) -> String {
        let command = parse_command(line).expect("non-empty line");
        handle_command(client, &command, context)
            .replies
            .iter()
            .map(Reply::to_string)
            .collect()
    }

    fn code(client: &mut Client, context: &SessionContext, line: &str) -> u16 {
        let command = parse_command(line).expect("non-empty line");
        handle_command(client, &command, context).replies[0].code()
    }

    #[test]
    fn test_pass_without_user_asks_for_login_first() {
        let context = test_context(3);
        let mut client = new_client();
        assert_eq!(
            run(&mut client, &context, "PASS secret"),
            "503 Login with USER first.\r\n"
        );
        assert_eq!(client.state(), SessionState::Connected);
        assert_eq!(client.failed_logins(), 0);
    }

    #[test]
    fn test_user_wrong_then_correct_password() {
        let context = test_context(3);
        let mut client = new_client();

        assert_eq!(code(&mut client, &context, "USER alice"), 331);
        assert_eq!(client.state(), SessionState::AwaitingPassword);
        assert_eq!(code(&mut client, &context, "PASS wrong"), 530);
        assert_eq!(client.state(), SessionState::Connected);
        assert_eq!(code(&mut client, &context, "PASS correct"), 230);
        assert_eq!(client.state(), SessionState::Authenticated);
        assert_eq!(client.username(), Some("alice"));
    }

    #[test]
    fn test_closed_client_ignores_further_commands() {
        let context = test_context(3);
        let mut client = new_client();
        client.close();

        let user = handle_command(&mut client, &parse_command("USER admin").unwrap(), &context);
        assert_eq!(user.status, CommandStatus::CloseConnection);
        assert!(user.replies.is_empty());
        let pass = handle_command(&mut client, &parse_command("PASS admin").unwrap(), &context);
        assert!(pass.replies.is_empty());

        assert_eq!(client.state(), SessionState::Closed);
        assert_eq!(client.username(), None);
        assert_eq!(client.successful_logins(), 0);
        assert_eq!(context.stats.snapshot().successful_logins, 0);
    }

    #[test]
    fn test_login_counters() {
        let context = test_context(3);
        let mut client = new_client();
        run(&mut client, &context, "USER admin");
        run(&mut client, &context, "PASS admin");
        assert_eq!(client.successful_logins(), 1);
        assert_eq!(client.failed_logins(), 0);
        let stats = context.stats.snapshot();
        assert_eq!((stats.successful_logins, stats.failed_logins), (1, 0));

        let context = test_context(3);
        let mut client = new_client();
        run(&mut client, &context, "USER admin");
        run(&mut client, &context, "PASS nope");
        assert_eq!(client.successful_logins(), 0);
        assert_eq!(client.failed_logins(), 1);
        let stats = context.stats.snapshot();
        assert_eq!((stats.successful_logins, stats.failed_logins), (0, 1));
    }

    #[test]
    fn test_pass_after_login_is_rejected() {
        let context = test_context(3);
        let mut client = new_client();
        run(&mut client, &context, "USER admin");
        run(&mut client, &context, "PASS admin");
        assert_eq!(code(&mut client, &context, "PASS admin"), 503);
        assert_eq!(client.state(), SessionState::Authenticated);
        assert_eq!(client.successful_logins(), 1);
    }

    #[test]
    fn test_navigation_requires_login() {
        let context = test_context(3);
        let mut client = new_client();
        for line in ["PWD", "CWD /pub", "LIST", "TYPE I", "MODE S"] {
            assert_eq!(
                run(&mut client, &context, line),
                "530 Please login with USER and PASS.\r\n",
                "{}",
                line
            );
            assert_eq!(client.state(), SessionState::Connected);
        }

        run(&mut client, &context, "USER admin");
        run(&mut client, &context, "PASS admin");
        assert_eq!(
            run(&mut client, &context, "PWD"),
            "257 \"/\" is current directory\r\n"
        );
    }

    #[test]
    fn test_cwd_model() {
        let context = test_context(3);
        let mut client = new_client();
        run(&mut client, &context, "USER admin");
        run(&mut client, &context, "PASS admin");

        assert_eq!(
            run(&mut client, &context, "CWD pub/incoming"),
            "250 Directory changed to pub/incoming\r\n"
        );
        assert_eq!(client.current_virtual_path(), "pub/incoming");
        assert_eq!(code(&mut client, &context, "CWD /"), 250);
        assert_eq!(client.current_virtual_path(), "/");
        assert_eq!(code(&mut client, &context, "CWD"), 501);
    }

    #[test]
    fn test_list_acknowledges_without_data() {
        let context = test_context(3);
        let mut client = new_client();
        run(&mut client, &context, "USER admin");
        run(&mut client, &context, "PASS admin");
        assert_eq!(
            run(&mut client, &context, "LIST"),
            "150 Here comes the directory listing\r\n226 Directory send OK\r\n"
        );
    }

    #[test]
    fn test_commands_available_before_login() {
        let context = test_context(3);
        let mut client = new_client();
        assert_eq!(run(&mut client, &context, "NOOP"), "200 OK\r\n");
        assert_eq!(run(&mut client, &context, "SYST"), "215 UNIX Type: L8\r\n");
        assert_eq!(
            run(&mut client, &context, "FEAT"),
            "211-Features:\r\n211- EPSV\r\n211- REST STREAM\r\n211- SIZE\r\n211- MDTM\r\n211 End\r\n"
        );
        assert_eq!(
            run(&mut client, &context, "XYZZY now"),
            "500 Unknown command: XYZZY\r\n"
        );
        assert_eq!(client.state(), SessionState::Connected);
    }

    #[test]
    fn test_missing_arguments() {
        let context = test_context(3);
        let mut client = new_client();
        assert_eq!(code(&mut client, &context, "USER"), 501);
        assert_eq!(code(&mut client, &context, "PASS"), 501);
        assert_eq!(client.state(), SessionState::Connected);
    }

    #[test]
    fn test_type_and_mode() {
        let context = test_context(3);
        let mut client = new_client();
        run(&mut client, &context, "USER admin");
        run(&mut client, &context, "PASS admin");

        assert_eq!(run(&mut client, &context, "TYPE i"), "200 Type set to I\r\n");
        assert_eq!(client.transfer_type(), TransferType::Binary);
        assert_eq!(code(&mut client, &context, "TYPE E"), 504);
        assert_eq!(client.transfer_type(), TransferType::Binary);
        assert_eq!(code(&mut client, &context, "MODE S"), 200);
        assert_eq!(code(&mut client, &context, "MODE B"), 504);
    }

    #[test]
    fn test_quit_closes_from_any_state() {
        let context = test_context(3);
        let mut client = new_client();
        run(&mut client, &context, "USER admin");
        let command = parse_command("QUIT").unwrap();
        let result = handle_command(&mut client, &command, &context);
        assert_eq!(result.status, CommandStatus::CloseConnection);
        assert_eq!(result.replies[0].to_string(), "221 Goodbye\r\n");
        assert_eq!(client.state(), SessionState::Closed);
    }

    #[test]
    fn test_login_attempt_limit_closes_session() {
        let context = test_context(2);
        let mut client = new_client();
        run(&mut client, &context, "USER admin");
        let first = handle_command(&mut client, &parse_command("PASS a").unwrap(), &context);
        assert!(matches!(first.status, CommandStatus::Failure(_)));

        let second = handle_command(&mut client, &parse_command("PASS b").unwrap(), &context);
        assert_eq!(second.status, CommandStatus::CloseConnection);
        let codes: Vec<u16> = second.replies.iter().map(Reply::code).collect();
        assert_eq!(codes, vec![530, 421]);
    }
}
