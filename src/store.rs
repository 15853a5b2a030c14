//! Application state and its reducer.
//!
//! State changes only through [`State::reduce`], one [`Action`] at a time.

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::history::HistoryRecord;
use crate::keys::KeyRecord;

/// Record collections held in the state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    ResolverHistory,
    Keys,
}

impl Collection {
    /// Storage key of the collection
    pub fn key(&self) -> &'static str {
        match self {
            Collection::ResolverHistory => "resolverHistory",
            Collection::Keys => "keys",
        }
    }
}

/// A record of any collection
#[derive(Debug, Clone, PartialEq)]
pub enum StateRecord {
    History(HistoryRecord),
    Key(KeyRecord),
}

impl StateRecord {
    pub fn id(&self) -> &str {
        match self {
            StateRecord::History(record) => &record.id,
            StateRecord::Key(record) => &record.id,
        }
    }

    pub fn collection(&self) -> Collection {
        match self {
            StateRecord::History(_) => Collection::ResolverHistory,
            StateRecord::Key(_) => Collection::Keys,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetConnecting(bool),
    SetAccount(Option<String>),
    SetIsRightNetwork(bool),
    SetNetworkId(Option<u64>),
    /// Adds a record, or replaces the one with the same id
    SetRecord(StateRecord),
    RemoveRecord { collection: Collection, id: String },
    AddError(String),
    RemoveError(usize),
    RemoveAllErrors,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    pub is_connecting: bool,
    pub network_id: Option<u64>,
    pub is_right_network: bool,
    pub account: Option<String>,
    pub errors: Vec<String>,
    pub keys: Vec<KeyRecord>,
    pub resolver_history: Vec<HistoryRecord>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            is_connecting: false,
            network_id: None,
            is_right_network: true,
            account: None,
            errors: Vec::new(),
            keys: Vec::new(),
            resolver_history: Vec::new(),
        }
    }
}

impl State {
    /// Applies one action. Invalid actions are logged and leave the state unchanged.
    pub fn reduce(&mut self, action: Action) {
        debug!(?action, "dispatch");

        match action {
            Action::SetConnecting(value) => self.is_connecting = value,
            Action::SetAccount(account) => self.account = account,
            Action::SetIsRightNetwork(value) => self.is_right_network = value,
            Action::SetNetworkId(network_id) => self.network_id = network_id,
            Action::SetRecord(record) => {
                if record.id().is_empty() {
                    error!("State record must have Id property defined");
                    return;
                }
                match record {
                    StateRecord::History(record) => upsert(&mut self.resolver_history, record, |r| &r.id),
                    StateRecord::Key(record) => upsert(&mut self.keys, record, |r| &r.id),
                }
            }
            Action::RemoveRecord { collection, id } => {
                if id.is_empty() {
                    error!("State record Id must be provided with a payload");
                    return;
                }
                match collection {
                    Collection::ResolverHistory => self.resolver_history.retain(|r| r.id != id),
                    Collection::Keys => self.keys.retain(|r| r.id != id),
                }
            }
            Action::AddError(message) => self.errors.push(message),
            Action::RemoveError(index) => {
                if index < self.errors.len() {
                    self.errors.remove(index);
                }
            }
            Action::RemoveAllErrors => self.errors.clear(),
        }
    }
}

/// Moves the record to the end of the collection, replacing any with the same id
fn upsert<T, F>(records: &mut Vec<T>, record: T, id: F)
where
    F: Fn(&T) -> &String,
{
    let new_id = id(&record).clone();
    records.retain(|r| *id(r) != new_id);
    records.push(record);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::normalize;
    use crate::keys::tests::raw_key;
    use chrono::Utc;

    fn history(id: &str, did: &str) -> StateRecord {
        StateRecord::History(HistoryRecord::new(
            id.to_string(),
            normalize(did, Utc::now(), None, Some("x".into())),
        ))
    }

    #[test]
    fn test_scalar_actions() {
        let mut state = State::default();
        state.reduce(Action::SetConnecting(true));
        state.reduce(Action::SetAccount(Some("0xabc".into())));
        state.reduce(Action::SetNetworkId(Some(4)));
        state.reduce(Action::SetIsRightNetwork(false));

        assert!(state.is_connecting);
        assert_eq!(state.account.as_deref(), Some("0xabc"));
        assert_eq!(state.network_id, Some(4));
        assert!(!state.is_right_network);
    }

    #[test]
    fn test_set_record_upserts() {
        let mut state = State::default();
        state.reduce(Action::SetRecord(history("a", "did:orgid:1:0xa")));
        state.reduce(Action::SetRecord(history("b", "did:orgid:1:0xb")));
        state.reduce(Action::SetRecord(history("a", "did:orgid:1:0xc")));

        let ids: Vec<&str> = state.resolver_history.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(state.resolver_history[1].did(), "did:orgid:1:0xc");
    }

    #[test]
    fn test_records_go_to_their_collection() {
        let mut state = State::default();
        let key = StateRecord::Key(KeyRecord::new("k1".into(), raw_key("owner")));
        assert_eq!(key.collection(), Collection::Keys);

        state.reduce(Action::SetRecord(key));
        state.reduce(Action::SetRecord(history("h1", "did:orgid:1:0xa")));
        assert_eq!(state.keys.len(), 1);
        assert_eq!(state.resolver_history.len(), 1);

        state.reduce(Action::RemoveRecord {
            collection: Collection::Keys,
            id: "h1".into(),
        });
        assert_eq!(state.keys.len(), 1);

        state.reduce(Action::RemoveRecord {
            collection: Collection::ResolverHistory,
            id: "h1".into(),
        });
        assert!(state.resolver_history.is_empty());
    }

    #[test]
    fn test_invalid_actions_leave_state_unchanged() {
        let mut state = State::default();
        state.reduce(Action::SetRecord(history("a", "did:orgid:1:0xa")));
        let before = state.clone();

        state.reduce(Action::SetRecord(history("", "did:orgid:1:0xb")));
        state.reduce(Action::RemoveRecord {
            collection: Collection::ResolverHistory,
            id: String::new(),
        });
        state.reduce(Action::RemoveError(3));

        assert_eq!(state, before);
    }

    #[test]
    fn test_errors() {
        let mut state = State::default();
        for message in ["first", "second", "third"] {
            state.reduce(Action::AddError(message.to_string()));
        }
        state.reduce(Action::RemoveError(1));
        assert_eq!(state.errors, vec!["first", "third"]);

        state.reduce(Action::RemoveAllErrors);
        assert!(state.errors.is_empty());
    }
}
