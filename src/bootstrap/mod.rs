// Copyright (c) 2026 Emberchain
// Licensed under the Apache License, Version 2.0

//! Ledger bootstrap over TCP streams: frontier walk, then bulk chain pulls.

pub mod initiator;
pub mod responder;

pub use initiator::BootstrapError;
