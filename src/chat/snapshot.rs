use crate::grpc::{ProtoMailbox, ProtoSnapshot};
use prost::Message;
use std::collections::{BTreeMap, HashSet};
use std::convert::TryFrom;

/// One user's row of the directory. Keeping password, token, and mailbox in a single record means
/// the three logical mappings always share the same key set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub(crate) password: String,
    pub(crate) token: String,
    pub(crate) pending: Vec<String>,
}

/// ReplicatedSnapshot is the entire replicated application state, keyed by username.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplicatedSnapshot {
    accounts: BTreeMap<String, Account>,
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotDecodeError {
    #[error("username {0:?} is missing from at least one of messages/passwords/tokens")]
    MismatchedKeys(String),
    #[error("malformed snapshot bytes: {0}")]
    Malformed(#[from] prost::DecodeError),
}

impl ReplicatedSnapshot {
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Usernames in sorted order.
    pub fn usernames(&self) -> impl Iterator<Item = &str> {
        self.accounts.keys().map(String::as_str)
    }

    pub(crate) fn account(&self, username: &str) -> Option<&Account> {
        self.accounts.get(username)
    }

    pub(crate) fn account_mut(&mut self, username: &str) -> Option<&mut Account> {
        self.accounts.get_mut(username)
    }

    pub(crate) fn insert(&mut self, username: String, account: Account) {
        self.accounts.insert(username, account);
    }

    pub(crate) fn remove(&mut self, username: &str) -> Option<Account> {
        self.accounts.remove(username)
    }

    /// Resolve a session token to the username it belongs to.
    pub(crate) fn username_for_token(&self, token: &str) -> Option<&str> {
        if token.is_empty() {
            return None;
        }

        self.accounts
            .iter()
            .find(|(_, account)| account.token == token)
            .map(|(username, _)| username.as_str())
    }

    pub(crate) fn encode_to_bytes(&self) -> Result<Vec<u8>, prost::EncodeError> {
        let proto = ProtoSnapshot::from(self);
        let mut buf = Vec::with_capacity(proto.encoded_len());
        proto.encode(&mut buf)?;
        Ok(buf)
    }

    pub(crate) fn decode_from_bytes(bytes: &[u8]) -> Result<Self, SnapshotDecodeError> {
        let proto = ProtoSnapshot::decode(bytes)?;
        ReplicatedSnapshot::try_from(proto)
    }
}

impl From<&ReplicatedSnapshot> for ProtoSnapshot {
    fn from(snapshot: &ReplicatedSnapshot) -> Self {
        let mut proto = ProtoSnapshot::default();
        for (username, account) in &snapshot.accounts {
            proto.messages.insert(
                username.clone(),
                ProtoMailbox {
                    messages: account.pending.clone(),
                },
            );
            proto.passwords.insert(username.clone(), account.password.clone());
            proto.tokens.insert(username.clone(), account.token.clone());
        }

        proto
    }
}

impl TryFrom<ProtoSnapshot> for ReplicatedSnapshot {
    type Error = SnapshotDecodeError;

    fn try_from(proto: ProtoSnapshot) -> Result<Self, Self::Error> {
        let ProtoSnapshot {
            mut messages,
            mut passwords,
            mut tokens,
        } = proto;

        let all_usernames: HashSet<String> = messages
            .keys()
            .chain(passwords.keys())
            .chain(tokens.keys())
            .cloned()
            .collect();

        let mut accounts = BTreeMap::new();
        for username in all_usernames {
            match (
                messages.remove(&username),
                passwords.remove(&username),
                tokens.remove(&username),
            ) {
                (Some(mailbox), Some(password), Some(token)) => {
                    accounts.insert(
                        username,
                        Account {
                            password,
                            token,
                            pending: mailbox.messages,
                        },
                    );
                }
                _ => return Err(SnapshotDecodeError::MismatchedKeys(username)),
            }
        }

        Ok(ReplicatedSnapshot { accounts })
    }
}
