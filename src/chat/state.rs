use crate::chat::persistence::SnapshotFile;
use crate::chat::snapshot::{Account, ReplicatedSnapshot};
use crate::replica::ApplicationAdapter;
use rand::Rng;
use regex::Regex;

/// A client operation, exactly as it arrived over the wire.
#[derive(Clone, Debug, PartialEq)]
pub enum ChatRequest {
    /// Log in, or create the account if the username is free.
    Authenticate { username: String, password: String },
    List { token: String, pattern: String },
    Send { token: String, recipient: String, body: String },
    Deliver { token: String },
    Delete { token: String, username: String },
}

#[derive(Clone, Debug, PartialEq)]
pub enum ChatResponse {
    Text { success: bool, response: String },
    Empty { success: bool },
}

impl ChatResponse {
    fn text(response: String) -> Self {
        ChatResponse::Text {
            success: true,
            response,
        }
    }

    fn text_failure() -> Self {
        ChatResponse::Text {
            success: false,
            response: String::new(),
        }
    }

    fn empty(success: bool) -> Self {
        ChatResponse::Empty { success }
    }

    pub fn is_success(&self) -> bool {
        match self {
            ChatResponse::Text { success, .. } | ChatResponse::Empty { success } => *success,
        }
    }
}

/// ChatStateMachine is the user directory and the mailboxes. It only ever runs on the replica
/// actor, either serving client requests (as leader) or adopting a leader's snapshot (as follower).
pub(crate) struct ChatStateMachine {
    logger: slog::Logger,
    state: ReplicatedSnapshot,
    snapshot_file: Option<SnapshotFile>,
}

impl ChatStateMachine {
    pub(crate) fn new(
        logger: slog::Logger,
        initial_state: ReplicatedSnapshot,
        snapshot_file: Option<SnapshotFile>,
    ) -> Self {
        ChatStateMachine {
            logger,
            state: initial_state,
            snapshot_file,
        }
    }

    fn save(&self) {
        if let Some(file) = &self.snapshot_file {
            file.save(&self.logger, &self.state);
        }
    }

    fn authenticate(&mut self, username: String, password: String) -> ChatResponse {
        if let Some(account) = self.state.account(&username) {
            return if account.password == password {
                slog::info!(self.logger, "User {} logged in", username);
                ChatResponse::text(account.token.clone())
            } else {
                slog::info!(self.logger, "User {} failed to log in", username);
                ChatResponse::text_failure()
            };
        }

        if !is_valid_username(&username) || password.is_empty() {
            slog::info!(self.logger, "Rejected sign up for {:?}", username);
            return ChatResponse::text_failure();
        }

        let token = new_token();
        self.state.insert(
            username.clone(),
            Account {
                password,
                token: token.clone(),
                pending: Vec::new(),
            },
        );
        self.save();
        slog::info!(self.logger, "User {} created", username);

        ChatResponse::text(token)
    }

    fn list(&self, token: &str, pattern: &str) -> ChatResponse {
        if self.state.username_for_token(token).is_none() {
            return ChatResponse::text_failure();
        }

        let matches: Vec<&str> = if pattern.is_empty() || pattern == "\n" {
            self.state.usernames().collect()
        } else {
            let regex = match Regex::new(pattern) {
                Ok(regex) => regex,
                Err(e) => {
                    slog::info!(self.logger, "Rejected list pattern {:?}: {}", pattern, e);
                    return ChatResponse::text_failure();
                }
            };
            self.state
                .usernames()
                .filter(|username| regex.is_match(username))
                .collect()
        };

        ChatResponse::text(matches.join(","))
    }

    fn send(&mut self, token: &str, recipient: &str, body: String) -> ChatResponse {
        if self.state.username_for_token(token).is_none() {
            return ChatResponse::empty(false);
        }

        match self.state.account_mut(recipient) {
            Some(account) => account.pending.push(body),
            None => return ChatResponse::empty(false),
        }
        self.save();

        ChatResponse::empty(true)
    }

    fn deliver(&mut self, token: &str) -> ChatResponse {
        let username = match self.state.username_for_token(token) {
            Some(username) => username.to_string(),
            None => return ChatResponse::text_failure(),
        };

        let pending = match self.state.account_mut(&username) {
            Some(account) => std::mem::take(&mut account.pending),
            None => return ChatResponse::text_failure(),
        };
        self.save();

        ChatResponse::text(pending.join("\n\n"))
    }

    fn delete(&mut self, token: &str, username: &str) -> ChatResponse {
        // Only the account owner may delete it.
        if self.state.username_for_token(token) != Some(username) {
            return ChatResponse::empty(false);
        }

        self.state.remove(username);
        self.save();
        slog::info!(self.logger, "Deleted account for {}", username);

        ChatResponse::empty(true)
    }
}

impl ApplicationAdapter for ChatStateMachine {
    fn load_snapshot(&self) -> ReplicatedSnapshot {
        self.state.clone()
    }

    fn on_snapshot_received(&mut self, snapshot: ReplicatedSnapshot) {
        if snapshot == self.state {
            return;
        }

        self.state = snapshot;
        self.save();
    }

    fn apply(&mut self, request: ChatRequest) -> ChatResponse {
        match request {
            ChatRequest::Authenticate { username, password } => self.authenticate(username, password),
            ChatRequest::List { token, pattern } => self.list(&token, &pattern),
            ChatRequest::Send { token, recipient, body } => self.send(&token, &recipient, body),
            ChatRequest::Deliver { token } => self.deliver(&token),
            ChatRequest::Delete { token, username } => self.delete(&token, &username),
        }
    }
}

fn is_valid_username(username: &str) -> bool {
    !username.is_empty() && username.chars().all(|c| c.is_ascii_alphabetic() || c == '_')
}

/// 128 random bits, hex encoded.
fn new_token() -> String {
    let bits: u128 = rand::thread_rng().gen();
    format!("{:032x}", bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_logger() -> slog::Logger {
        slog::Logger::root(slog::Discard, slog::o!())
    }

    fn new_machine() -> ChatStateMachine {
        ChatStateMachine::new(test_logger(), ReplicatedSnapshot::default(), None)
    }

    fn sign_up(machine: &mut ChatStateMachine, username: &str) -> String {
        match machine.apply(ChatRequest::Authenticate {
            username: username.to_string(),
            password: format!("{}-pw", username),
        }) {
            ChatResponse::Text { success: true, response } => response,
            other => panic!("Sign up failed: {:?}", other),
        }
    }

    fn text(response: ChatResponse) -> String {
        match response {
            ChatResponse::Text { success: true, response } => response,
            other => panic!("Expected successful text response, got {:?}", other),
        }
    }

    #[test]
    fn sign_up_then_log_in() {
        let mut machine = new_machine();
        let token = sign_up(&mut machine, "alice");
        assert_eq!(token.len(), 32);

        let login = machine.apply(ChatRequest::Authenticate {
            username: "alice".to_string(),
            password: "alice-pw".to_string(),
        });
        assert_eq!(text(login), token);

        let bad_login = machine.apply(ChatRequest::Authenticate {
            username: "alice".to_string(),
            password: "wrong".to_string(),
        });
        assert!(!bad_login.is_success());
    }

    #[test]
    fn invalid_sign_ups_are_rejected() {
        let mut machine = new_machine();
        for (username, password) in &[("bob1", "pw"), ("", "pw"), ("bob smith", "pw"), ("bob", "")] {
            let response = machine.apply(ChatRequest::Authenticate {
                username: username.to_string(),
                password: password.to_string(),
            });
            assert!(!response.is_success(), "{:?} should be rejected", username);
        }
        assert!(machine.load_snapshot().is_empty());

        sign_up(&mut machine, "Snake_Case");
    }

    #[test]
    fn list_requires_token_and_filters() {
        let mut machine = new_machine();
        let token = sign_up(&mut machine, "bob");
        sign_up(&mut machine, "alice");
        sign_up(&mut machine, "alfred");

        let all = |pattern: &str| ChatRequest::List {
            token: token.clone(),
            pattern: pattern.to_string(),
        };
        assert_eq!(text(machine.apply(all(""))), "alfred,alice,bob");
        assert_eq!(text(machine.apply(all("\n"))), "alfred,alice,bob");
        assert_eq!(text(machine.apply(all("al"))), "alfred,alice");
        assert_eq!(text(machine.apply(all("^b"))), "bob");
        assert_eq!(text(machine.apply(all("a.*e"))), "alfred,alice");
        assert_eq!(text(machine.apply(all("^al.*e$"))), "alice");
        assert_eq!(text(machine.apply(all("zzz"))), "");

        let malformed = machine.apply(all("("));
        assert_eq!(
            malformed,
            ChatResponse::Text {
                success: false,
                response: String::new()
            }
        );

        let anonymous = machine.apply(ChatRequest::List {
            token: "bogus".to_string(),
            pattern: String::new(),
        });
        assert!(!anonymous.is_success());
    }

    #[test]
    fn send_and_deliver() {
        let mut machine = new_machine();
        let alice = sign_up(&mut machine, "alice");
        let bob = sign_up(&mut machine, "bob");

        for body in &["hi", "you there?"] {
            let response = machine.apply(ChatRequest::Send {
                token: alice.clone(),
                recipient: "bob".to_string(),
                body: body.to_string(),
            });
            assert_eq!(response, ChatResponse::Empty { success: true });
        }

        let to_nobody = machine.apply(ChatRequest::Send {
            token: alice.clone(),
            recipient: "carol".to_string(),
            body: "hello?".to_string(),
        });
        assert!(!to_nobody.is_success());

        let deliver = || ChatRequest::Deliver { token: bob.clone() };
        assert_eq!(text(machine.apply(deliver())), "hi\n\nyou there?");
        // Delivery drains the mailbox.
        assert_eq!(text(machine.apply(deliver())), "");
    }

    #[test]
    fn delete_requires_owner_token() {
        let mut machine = new_machine();
        let alice = sign_up(&mut machine, "alice");
        let bob = sign_up(&mut machine, "bob");

        let by_bob = machine.apply(ChatRequest::Delete {
            token: bob,
            username: "alice".to_string(),
        });
        assert!(!by_bob.is_success());

        let by_alice = machine.apply(ChatRequest::Delete {
            token: alice.clone(),
            username: "alice".to_string(),
        });
        assert!(by_alice.is_success());

        let snapshot = machine.load_snapshot();
        assert_eq!(snapshot.usernames().collect::<Vec<_>>(), vec!["bob"]);
        assert_eq!(snapshot.username_for_token(&alice), None);
    }

    #[test]
    fn received_snapshot_replaces_everything() {
        let mut leader = new_machine();
        sign_up(&mut leader, "alice");
        let mut follower = new_machine();
        sign_up(&mut follower, "mallory");

        follower.on_snapshot_received(leader.load_snapshot());

        assert_eq!(follower.load_snapshot(), leader.load_snapshot());
    }

    #[test]
    fn mutations_are_saved() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("chat.bin"));
        let mut machine = ChatStateMachine::new(test_logger(), ReplicatedSnapshot::default(), Some(file.clone()));

        sign_up(&mut machine, "alice");

        assert_eq!(file.load().unwrap(), machine.load_snapshot());
    }
}
