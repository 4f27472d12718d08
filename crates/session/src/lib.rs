// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod clock;
pub mod command;
pub mod config;
pub mod context;
pub mod crypto;
pub mod error;
pub mod events;
pub mod keeper;
pub mod permission;
pub mod refresh;
pub mod session;
pub mod storage;
pub mod test_support;
pub mod timer;
pub mod token;
