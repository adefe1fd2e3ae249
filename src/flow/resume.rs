//! One-shot resumption of a social login after the provider redirect.

use crate::flow::{FlowEffect, LoginFlow, SessionInstaller};
use log::debug;

/// Dispatches the raw callback query into the exchange step exactly once.
///
/// The callback route can be evaluated more than once for a single arrival
/// (reloads, duplicate navigation events). The consumed flag makes the
/// dispatch idempotent; the HTTP layer adds a second guard by consuming the
/// pending-login cookie on first arrival.
pub struct CallbackResumer {
    dispatched: bool,
}

impl CallbackResumer {
    #[must_use]
    pub fn new() -> Self {
        Self { dispatched: false }
    }

    /// Whether this resumer has already dispatched its exchange.
    #[must_use]
    pub fn is_dispatched(&self) -> bool {
        self.dispatched
    }

    /// Forward the callback result into the flow's exchange step. Every call
    /// after the first is a no-op.
    pub async fn resume(
        &mut self,
        flow: &mut LoginFlow,
        provider: &str,
        raw_query: &str,
        sessions: &dyn SessionInstaller,
    ) -> FlowEffect {
        if self.dispatched {
            debug!("callback already dispatched for this arrival; ignoring");
            return FlowEffect::Stay;
        }
        self.dispatched = true;
        flow.exchange_callback(provider, raw_query, sessions).await
    }
}

impl Default for CallbackResumer {
    fn default() -> Self {
        Self::new()
    }
}
