//! Recovery Dispatcher
//!
//! Routes a transaction whose partition this node can't serve right now.
//! During rebalancing this is the normal path, not an error path.
//!
//! | origin        | action                                   |
//! |---------------|------------------------------------------|
//! | Client, Batch | proxy to the owner, else reply UNKNOWN   |
//! | Proxy         | return to the proxying node              |
//! | InternalUdf   | failure callback with UNKNOWN            |
//! | NsUp          | drop silently                            |

use crate::namespace::Namespace;
use crate::protocol::ResultCode;
use crate::subsystems::Subsystems;
use crate::transaction::{NodeId, Origin, Outcome, Recovery, Transaction};

use super::processor::Step;

pub(crate) fn dispatch(
    subsystems: &Subsystems,
    tr: &mut Transaction,
    ns: &Namespace,
    dest: NodeId,
    cluster_key: u64,
) -> Step {
    match tr.origin {
        Origin::Client { .. } | Origin::Batch { .. } => {
            if subsystems.proxy.divert(dest, tr, ns, cluster_key) {
                tracing::trace!(%dest, "proxied transaction");
                // Client: the proxy owns the message. Batch: it's shared.
                Step::handed_off(Outcome::Recovered(Recovery::Proxied))
            } else {
                tr.result_code = ResultCode::Unknown;
                subsystems
                    .responder
                    .transaction_error(tr, Some(ns), ResultCode::Unknown);
                Step::done(Outcome::Recovered(Recovery::ProxyFailed))
            }
        }
        Origin::Proxy { .. } => {
            subsystems.proxy.return_to_sender(tr, ns);
            if let Origin::Proxy { node, .. } = &mut tr.origin {
                *node = NodeId::NONE;
            }
            Step::done(Outcome::Recovered(Recovery::ReturnedToSender))
        }
        Origin::InternalUdf { ref mut orig } => {
            match orig.take() {
                Some(orig) => orig.complete(ResultCode::Unknown),
                None => crash!("internal UDF transaction has no origin"),
            }
            Step::done(Outcome::Recovered(Recovery::CallbackInvoked))
        }
        Origin::NsUp => Step::done(Outcome::Recovered(Recovery::Dropped)),
    }
}
