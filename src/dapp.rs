//! The dApp facade.
//!
//! [`Dapp`] owns the application state and exposes the operations the
//! dashboard performs: resolving DIDs into history records, managing the
//! history and managing keys. Every record change is persisted.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use tracing::{debug, error, info};

use crate::config::DappConfig;
use crate::did::{parse_did, ParsedDid};
use crate::error::{DappError, DappResult};
use crate::history::{cached_record, get_record_by_id, normalize, simple_uid, validate_record, HistoryRecord, HistoryRecordRaw};
use crate::ipfs::{GatewayIpfsNode, IpfsFetcher};
use crate::keys::{find_key_by_id, find_key_by_tag, validate_key, KeyRecord, KeyRecordRaw, Revocation, RevocationReason};
use crate::resolver::{DidResolver, ResolverContext};
use crate::storage::{load_json, save_json, JsonFileStorage, Storage};
use crate::store::{Action, Collection, State, StateRecord};

const RECORD_ID_LENGTH: usize = 8;
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Dapp {
    state: State,
    resolver: Arc<dyn DidResolver>,
    storage: Arc<dyn Storage>,
}

impl Dapp {
    /// Creates the dApp, loading persisted history and keys from `storage`
    pub fn new(resolver: Arc<dyn DidResolver>, storage: Arc<dyn Storage>) -> DappResult<Self> {
        let mut state = State::default();
        if let Some(history) = load_json(storage.as_ref(), Collection::ResolverHistory.key())? {
            state.resolver_history = history;
        }
        if let Some(keys) = load_json(storage.as_ref(), Collection::Keys.key())? {
            state.keys = keys;
        }
        debug!(
            history = state.resolver_history.len(),
            keys = state.keys.len(),
            "loaded persisted state"
        );

        Ok(Self {
            state,
            resolver,
            storage,
        })
    }

    /// Wires the network resolver, the IPFS gateway and file storage from configuration
    pub fn from_config(config: DappConfig) -> DappResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("orgid-dapp/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(HTTP_TIMEOUT)
            .build()?;

        let node = GatewayIpfsNode::new(client.clone(), &config.ipfs_gateway)?;
        let ipfs = IpfsFetcher::new(Arc::new(node)).with_timeout(config.ipfs_timeout);
        let storage = JsonFileStorage::open(&config.data_file)?;
        let context = ResolverContext::new(config, client, Arc::new(ipfs));

        Self::new(Arc::new(context), Arc::new(storage))
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn history(&self) -> &[HistoryRecord] {
        &self.state.resolver_history
    }

    pub fn keys(&self) -> &[KeyRecord] {
        &self.state.keys
    }

    /// Applies an action and persists the collection it touched
    ///
    /// The state only changes once the touched collection has been saved.
    pub fn dispatch(&mut self, action: Action) -> DappResult<()> {
        let touched = match &action {
            Action::SetRecord(record) => Some(record.collection()),
            Action::RemoveRecord { collection, .. } => Some(*collection),
            _ => None,
        };

        let Some(collection) = touched else {
            self.state.reduce(action);
            return Ok(());
        };

        let mut next = self.state.clone();
        next.reduce(action);

        match collection {
            Collection::ResolverHistory => {
                save_json(self.storage.as_ref(), collection.key(), &next.resolver_history)?
            }
            Collection::Keys => save_json(self.storage.as_ref(), collection.key(), &next.keys)?,
        }

        self.state = next;
        Ok(())
    }

    pub fn parse_did(&self, did: &str) -> DappResult<ParsedDid> {
        parse_did(did)
    }

    /// Resolves a DID and records the outcome in the history.
    ///
    /// An earlier successful record for the same DID is returned as is. A
    /// failed resolution produces an ERROR record, not an error; only
    /// persistence failures are returned as errors.
    pub async fn resolve(&mut self, did: &str) -> DappResult<HistoryRecord> {
        if let Some(existing) = cached_record(&self.state.resolver_history, did) {
            debug!(did, id = %existing.id, "reusing earlier resolution");
            return Ok(existing.clone());
        }

        let started = Utc::now();
        let raw = match self.resolver.resolve(did).await {
            Ok(response) => normalize(did, started, Some(response), None),
            Err(e) => {
                error!(did, error = %e, "DID resolution failed");
                let message = e.to_string();
                self.dispatch(Action::AddError(message.clone()))?;
                normalize(did, started, None, Some(message))
            }
        };

        let id = self.add_history_record(raw)?;
        get_record_by_id(&self.state.resolver_history, &id)
            .cloned()
            .ok_or(DappError::RecordNotFound(id))
    }

    /// Validates a record, gives it an id and stores it
    pub fn add_history_record(&mut self, record: HistoryRecordRaw) -> DappResult<String> {
        validate_record(&record)?;

        let id = simple_uid(RECORD_ID_LENGTH);
        info!(%id, did = %record.did, result = ?record.result, "adding history record");
        self.dispatch(Action::SetRecord(StateRecord::History(HistoryRecord::new(id.clone(), record))))?;
        Ok(id)
    }

    pub fn remove_history_record(&mut self, id: &str) -> DappResult<String> {
        if get_record_by_id(&self.state.resolver_history, id).is_none() {
            return Err(DappError::RecordNotFound(id.to_string()));
        }

        self.dispatch(Action::RemoveRecord {
            collection: Collection::ResolverHistory,
            id: id.to_string(),
        })?;
        Ok(id.to_string())
    }

    /// Stores a new key under a fresh id; the tag must not be taken
    pub fn add_key(&mut self, key: KeyRecordRaw) -> DappResult<String> {
        let record = KeyRecord::new(simple_uid(RECORD_ID_LENGTH), key);
        validate_key(&record)?;

        if find_key_by_id(&self.state.keys, &record.id).is_some() {
            return Err(DappError::InvalidRecord("Provided key already exists".to_string()));
        }
        if find_key_by_tag(&self.state.keys, record.tag()).is_some() {
            return Err(DappError::DuplicateTag(record.key.tag));
        }

        let id = record.id.clone();
        self.dispatch(Action::SetRecord(StateRecord::Key(record)))?;
        Ok(id)
    }

    pub fn update_key(&mut self, record: KeyRecord) -> DappResult<()> {
        validate_key(&record)?;

        if find_key_by_id(&self.state.keys, &record.id).is_none() {
            return Err(DappError::KeyNotFound(record.id));
        }
        if let Some(other) = find_key_by_tag(&self.state.keys, record.tag()) {
            if other.id != record.id {
                return Err(DappError::DuplicateTag(record.key.tag));
            }
        }

        self.dispatch(Action::SetRecord(StateRecord::Key(record)))
    }

    pub fn remove_key(&mut self, tag: &str) -> DappResult<()> {
        let id = find_key_by_tag(&self.state.keys, tag)
            .map(|k| k.id.clone())
            .ok_or_else(|| DappError::KeyNotFound(tag.to_string()))?;

        self.dispatch(Action::RemoveRecord {
            collection: Collection::Keys,
            id,
        })
    }

    pub fn revoke_key(&mut self, tag: &str, reason: RevocationReason) -> DappResult<KeyRecord> {
        let mut record = find_key_by_tag(&self.state.keys, tag)
            .cloned()
            .ok_or_else(|| DappError::KeyNotFound(tag.to_string()))?;

        record.key.revocation = Some(Revocation {
            reason,
            invalidity_date: Utc::now(),
        });
        info!(tag, %reason, "revoking key");

        self.dispatch(Action::SetRecord(StateRecord::Key(record.clone())))?;
        Ok(record)
    }
}
