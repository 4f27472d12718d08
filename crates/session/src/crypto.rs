// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Once;

static PROVIDER_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
///
/// Only the first call has effect; losing the race to another installer is
/// fine.
pub fn ensure_provider() {
    PROVIDER_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
