//! Transport-neutral request/response types for exposing a [`Db`] as a
//! remote service.
//!
//! Engine errors never cross the boundary; they are logged and reported as
//! [`Status::Failed`].

use log::warn;
use std::sync::Arc;

use crate::Db;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutArgs {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutReply {
    pub status: Status,
}

/// `value` is empty unless `status` is [`Status::Ok`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetReply {
    pub status: Status,
    pub value: Vec<u8>,
}

/// Handles `Put` and `Get` requests against a shared database.
#[derive(Debug, Clone)]
pub struct Service {
    db: Arc<Db>,
}

impl Service {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    #[must_use]
    pub fn db(&self) -> &Arc<Db> {
        &self.db
    }

    pub fn put(&self, args: PutArgs) -> PutReply {
        match self.db.put(&args.key, &args.value) {
            Ok(()) => PutReply { status: Status::Ok },
            Err(e) => {
                warn!("put failed: {}", e);
                PutReply {
                    status: Status::Failed,
                }
            }
        }
    }

    pub fn get(&self, key: &[u8]) -> GetReply {
        match self.db.get(key) {
            Ok(value) => GetReply {
                status: Status::Ok,
                value,
            },
            Err(e) => {
                if !e.is_not_found() {
                    warn!("get failed: {}", e);
                }
                GetReply {
                    status: Status::Failed,
                    value: Vec::new(),
                }
            }
        }
    }
}
