//! Cancellation registry for running operations
//!
//! Cooperative cancellation with owner verification, plus RAII cleanup via
//! `OperationGuard`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

struct TokenEntry {
    token: CancellationToken,
    owner: Uuid,
}

/// Removes the operation from the registry when dropped.
/// Hold it for the whole lifetime of the operation task.
pub struct OperationGuard {
    operation_id: Uuid,
    registry: CancellationRegistry,
}

impl OperationGuard {
    pub fn operation_id(&self) -> Uuid {
        self.operation_id
    }
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.operation_id);
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum CancelError {
    /// Caller's session does not own this operation
    NotOwner,
}

/// Tokens of operations that are still running, keyed by operation id
#[derive(Clone, Default)]
pub struct CancellationRegistry {
    tokens: Arc<Mutex<HashMap<Uuid, TokenEntry>>>,
}

impl CancellationRegistry {
    /// Register an operation. The returned token is what the worker polls;
    /// the guard must outlive the work.
    pub fn register(&self, operation_id: Uuid, owner: Uuid) -> (CancellationToken, OperationGuard) {
        let token = CancellationToken::new();
        self.tokens.lock().insert(
            operation_id,
            TokenEntry {
                token: token.clone(),
                owner,
            },
        );
        let guard = OperationGuard {
            operation_id,
            registry: self.clone(),
        };
        (token, guard)
    }

    /// Cancel an operation, only for its owner.
    ///
    /// `Ok(false)` means it is no longer registered (already finished).
    pub fn cancel(&self, operation_id: &Uuid, caller: Uuid) -> Result<bool, CancelError> {
        let tokens = self.tokens.lock();
        match tokens.get(operation_id) {
            Some(entry) if entry.owner != caller => Err(CancelError::NotOwner),
            Some(entry) => {
                entry.token.cancel();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn remove(&self, operation_id: &Uuid) {
        self.tokens.lock().remove(operation_id);
    }
}

#[cfg(test)]
impl CancellationRegistry {
    pub fn is_cancelled(&self, operation_id: &Uuid) -> bool {
        self.tokens
            .lock()
            .get(operation_id)
            .map_or(false, |e| e.token.is_cancelled())
    }

    pub fn is_registered(&self, operation_id: &Uuid) -> bool {
        self.tokens.lock().contains_key(operation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_is_cancelled_false() {
        let reg = CancellationRegistry::default();
        let id = Uuid::new_v4();
        let (token, _guard) = reg.register(id, Uuid::new_v4());
        assert!(!reg.is_cancelled(&id));
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_owner_cancel_reaches_worker_token() {
        let reg = CancellationRegistry::default();
        let id = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let (token, _guard) = reg.register(id, owner);

        assert_eq!(reg.cancel(&id, owner), Ok(true));
        assert!(token.is_cancelled());
        assert!(reg.is_cancelled(&id));
    }

    #[test]
    fn test_cancel_not_owner_rejected() {
        let reg = CancellationRegistry::default();
        let id = Uuid::new_v4();
        let (token, _guard) = reg.register(id, Uuid::new_v4());

        assert_eq!(reg.cancel(&id, Uuid::new_v4()), Err(CancelError::NotOwner));
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_unknown_returns_false() {
        let reg = CancellationRegistry::default();
        assert_eq!(reg.cancel(&Uuid::new_v4(), Uuid::new_v4()), Ok(false));
    }

    #[test]
    fn test_guard_drop_unregisters() {
        let reg = CancellationRegistry::default();
        let id = Uuid::new_v4();
        {
            let (_token, guard) = reg.register(id, Uuid::new_v4());
            assert_eq!(guard.operation_id(), id);
            assert!(reg.is_registered(&id));
        }
        assert!(!reg.is_registered(&id));
    }

    #[test]
    fn test_guard_drop_on_panic_unwinding() {
        let reg = CancellationRegistry::default();
        let id = Uuid::new_v4();
        let inner = reg.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let (_token, _guard) = inner.register(id, Uuid::new_v4());
            panic!("worker blew up");
        }));
        assert!(result.is_err());
        assert!(!reg.is_registered(&id));
    }
}
