//! Handlers for the sample events. Each one acts only on its own variant.

use std::sync::atomic::{AtomicU64, Ordering};

use event_dispatcher::Handler;
use tracing::debug;

use crate::events::SamplePayload;

/// Generates a handler that extracts its own variant and counts it.
macro_rules! variant_handler {
    ($name:ident, $variant:ident) => {
        #[derive(Debug, Default)]
        pub struct $name {
            handled: AtomicU64,
        }

        impl $name {
            /// Events of this handler's own variant handled so far.
            pub fn handled(&self) -> u64 {
                self.handled.load(Ordering::Relaxed)
            }
        }

        impl Handler<SamplePayload> for $name {
            fn handle(&self, payload: &SamplePayload) {
                match payload {
                    SamplePayload::$variant(_) => {
                        payload.extract();
                        self.handled.fetch_add(1, Ordering::Relaxed);
                    }
                    other => debug!(
                        handler = stringify!($name),
                        payload = ?other,
                        "ignoring payload of another shape"
                    ),
                }
            }

            fn name(&self) -> &'static str {
                stringify!($name)
            }
        }
    };
}

variant_handler!(HandlerA, A);
variant_handler!(HandlerB, B);
variant_handler!(HandlerC, C);
